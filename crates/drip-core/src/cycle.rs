//! Cycle arithmetic.
//!
//! Time is bucketed into cycles of `cycle_secs` seconds. Funds streamed
//! during a cycle become receivable once the cycle ends. Cycle indices are
//! shifted by one so that index `0` can mean "never set":
//!
//! - `cycle_of(t) = t / cycle_secs + 1`
//! - cycle `c` covers `[(c - 1) * cycle_secs, c * cycle_secs)`
//!
//! All amounts derived here use the same per-cycle flooring, so the amount a
//! sender is charged for `[start, end)` ([`CycleMath::streamed_amt`]) always
//! equals what the receiving side accumulates from the matching deltas
//! ([`CycleMath::split_delta`]).

use serde::{Deserialize, Serialize};

use crate::constants::{AMT_PER_SEC_MULTIPLIER, MIN_CYCLE_SECS};

/// Cycle arithmetic for a fixed cycle length.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct CycleMath {
    cycle_secs: u32,
}

impl CycleMath {
    /// Create cycle math for `cycle_secs`-long cycles.
    ///
    /// Returns `None` if `cycle_secs` is below [`MIN_CYCLE_SECS`].
    pub fn new(cycle_secs: u32) -> Option<Self> {
        (cycle_secs >= MIN_CYCLE_SECS).then_some(Self { cycle_secs })
    }

    /// Cycle length in seconds.
    pub fn cycle_secs(&self) -> u32 {
        self.cycle_secs
    }

    /// Index of the cycle containing `timestamp`.
    ///
    /// # Examples
    ///
    /// ```
    /// use drip_core::cycle::CycleMath;
    /// let m = CycleMath::new(10).unwrap();
    /// assert_eq!(m.cycle_of(0), 1);
    /// assert_eq!(m.cycle_of(9), 1);
    /// assert_eq!(m.cycle_of(10), 2);
    /// ```
    pub fn cycle_of(&self, timestamp: u32) -> u32 {
        timestamp / self.cycle_secs + 1
    }

    /// First second of the cycle containing `timestamp`.
    pub fn cycle_start(&self, timestamp: u32) -> u32 {
        timestamp - timestamp % self.cycle_secs
    }

    /// Smallest accepted rate: one unit per cycle.
    pub fn min_amt_per_sec(&self) -> u128 {
        AMT_PER_SEC_MULTIPLIER.div_ceil(self.cycle_secs as u128)
    }

    /// Amount streamed over one full cycle at `amt_per_sec`.
    pub fn amt_per_cycle(&self, amt_per_sec: u128) -> u128 {
        (self.cycle_secs as u128).saturating_mul(amt_per_sec) / AMT_PER_SEC_MULTIPLIER
    }

    /// Bucket a rate change taking effect at `timestamp`.
    ///
    /// Returns the contribution to the per-cycle amount of the cycle
    /// containing `timestamp` and of the cycle after it. The seconds of the
    /// current cycle before `timestamp` are moved into the next cycle, so the
    /// pair sums to a full cycle's worth. Division truncates towards zero,
    /// which makes `split_delta(t, -r)` the exact negation of
    /// `split_delta(t, r)`.
    ///
    /// `amt_per_sec_delta` must not exceed
    /// [`MAX_AMT_PER_SEC`](crate::constants::MAX_AMT_PER_SEC) in magnitude.
    pub fn split_delta(&self, timestamp: u32, amt_per_sec_delta: i128) -> (i128, i128) {
        let multiplier = AMT_PER_SEC_MULTIPLIER as i128;
        let full_cycle = (self.cycle_secs as i128).wrapping_mul(amt_per_sec_delta) / multiplier;
        let offset = (timestamp % self.cycle_secs) as i128;
        let next_cycle = offset.wrapping_mul(amt_per_sec_delta) / multiplier;
        (full_cycle.wrapping_sub(next_cycle), next_cycle)
    }

    /// Amount streamed at `amt_per_sec` over `[start, end)`.
    ///
    /// Floors per cycle exactly like the delta ledger: whole cycles are
    /// charged [`amt_per_cycle`](Self::amt_per_cycle) each, the partial
    /// cycles at both ends are charged by their offset within the cycle.
    /// Returns 0 if `end <= start`. Saturates instead of overflowing.
    pub fn streamed_amt(&self, amt_per_sec: u128, start: u32, end: u32) -> u128 {
        if end <= start {
            return 0;
        }
        let secs = self.cycle_secs;
        let ended_cycles = (end / secs - start / secs) as u128;
        let whole = ended_cycles.saturating_mul(self.amt_per_cycle(amt_per_sec));
        // Offset into its cycle, charged at the rate.
        let part = |t: u32| {
            ((t % secs) as u128).saturating_mul(amt_per_sec) / AMT_PER_SEC_MULTIPLIER
        };
        whole
            .saturating_add(part(end))
            .saturating_sub(part(start))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::MAX_AMT_PER_SEC;
    use proptest::prelude::*;

    const UNIT: u128 = AMT_PER_SEC_MULTIPLIER;

    fn math() -> CycleMath {
        CycleMath::new(10).unwrap()
    }

    #[test]
    fn rejects_degenerate_cycles() {
        assert!(CycleMath::new(0).is_none());
        assert!(CycleMath::new(1).is_none());
        assert!(CycleMath::new(2).is_some());
    }

    #[test]
    fn cycle_zero_is_never_produced() {
        assert_eq!(math().cycle_of(0), 1);
        assert_eq!(math().cycle_of(u32::MAX), u32::MAX / 10 + 1);
    }

    #[test]
    fn cycle_start_rounds_down() {
        assert_eq!(math().cycle_start(0), 0);
        assert_eq!(math().cycle_start(19), 10);
        assert_eq!(math().cycle_start(20), 20);
    }

    #[test]
    fn split_delta_at_cycle_boundary_is_all_this_cycle() {
        assert_eq!(math().split_delta(20, UNIT as i128), (10, 0));
    }

    #[test]
    fn split_delta_mid_cycle_prorates() {
        // 3 seconds into the cycle: 7 seconds this cycle, 3 spill into the next.
        assert_eq!(math().split_delta(23, UNIT as i128), (7, 3));
    }

    #[test]
    fn split_delta_negation_is_exact_for_fractional_rates() {
        let m = math();
        let rate = (UNIT / 3) as i128;
        let (a, b) = m.split_delta(27, rate);
        let (c, d) = m.split_delta(27, -rate);
        assert_eq!((a + c, b + d), (0, 0));
    }

    #[test]
    fn min_amt_per_sec_is_one_unit_per_cycle() {
        let m = math();
        assert_eq!(m.amt_per_cycle(m.min_amt_per_sec()), 1);
        assert_eq!(m.amt_per_cycle(m.min_amt_per_sec() - 1), 0);
    }

    #[test]
    fn streamed_amt_whole_rate() {
        assert_eq!(math().streamed_amt(2 * UNIT, 3, 28), 50);
        assert_eq!(math().streamed_amt(2 * UNIT, 28, 3), 0);
        assert_eq!(math().streamed_amt(2 * UNIT, 5, 5), 0);
    }

    #[test]
    fn streamed_amt_floors_per_cycle() {
        // 0.5 per second, 10 second cycles: 5 per full cycle.
        let m = math();
        assert_eq!(m.streamed_amt(UNIT / 2, 0, 10), 5);
        // [1, 2) lands between floors: floor(1.0) - floor(0.5).
        assert_eq!(m.streamed_amt(UNIT / 2, 1, 2), 1);
        assert_eq!(m.streamed_amt(UNIT / 2, 0, 1), 0);
    }

    proptest! {
        #[test]
        fn streamed_amt_is_additive(
            rate in 1u128..=(1000 * UNIT),
            a in 0u32..100_000,
            b in 0u32..100_000,
            c in 0u32..100_000,
        ) {
            let m = math();
            let mut ts = [a, b, c];
            ts.sort();
            let [a, b, c] = ts;
            prop_assert_eq!(
                m.streamed_amt(rate, a, b) + m.streamed_amt(rate, b, c),
                m.streamed_amt(rate, a, c)
            );
        }

        #[test]
        fn streamed_amt_matches_split_deltas(
            rate in 1u128..=MAX_AMT_PER_SEC / 1_000_000,
            start in 0u32..1_000,
            len in 0u32..1_000,
        ) {
            let m = math();
            let end = start + len;
            // Sum the per-cycle amounts produced by +rate at start, -rate at end.
            let mut buckets = std::collections::BTreeMap::<u32, (i128, i128)>::new();
            for (t, r) in [(start, rate as i128), (end, -(rate as i128))] {
                let (this, next) = m.split_delta(t, r);
                let e = buckets.entry(m.cycle_of(t)).or_default();
                e.0 += this;
                e.1 += next;
            }
            let mut per_cycle = 0i128;
            let mut total = 0i128;
            for cycle in m.cycle_of(start)..=m.cycle_of(end) + 1 {
                let (this, next) = buckets.get(&cycle).copied().unwrap_or_default();
                per_cycle += this;
                total += per_cycle;
                per_cycle += next;
            }
            prop_assert_eq!(total as u128, m.streamed_amt(rate, start, end));
        }
    }
}
