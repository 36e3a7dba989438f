//! Per-account amount-delta ledger.
//!
//! Instead of recording what an account receives every second, the ledger
//! stores, per cycle, how the per-cycle amount changes: `this_cycle` applies
//! from the given cycle, `next_cycle` from the cycle after it. A rate change
//! at an arbitrary timestamp is then exactly two bucket updates (see
//! [`CycleMath::split_delta`]), and receiving walks the buckets keeping a
//! running per-cycle amount.
//!
//! Invariants:
//! - every bucket before `next_receivable_cycle` is empty;
//! - the bucket at `next_receivable_cycle` holds an absolute per-cycle
//!   amount, not a change relative to the cycle before.
//!
//! Bucket arithmetic wraps. Every delta is eventually matched by its
//! opposite, so an intermediate overflow always cancels out.

use std::collections::BTreeMap;

use drip_core::cycle::CycleMath;
use serde::{Deserialize, Serialize};

/// Change of the per-cycle amount, keyed by cycle in [`AmtDeltaLedger`].
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AmtDelta {
    /// Applied from the keyed cycle on.
    pub this_cycle: i128,
    /// Applied from the cycle after the keyed one on.
    pub next_cycle: i128,
}

impl AmtDelta {
    fn is_zero(&self) -> bool {
        self.this_cycle == 0 && self.next_cycle == 0
    }
}

/// Result of walking the ledger's finalized cycles.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FlushResult {
    /// Total amount of the walked cycles.
    pub amt: u128,
    /// First walked cycle.
    pub from_cycle: u32,
    /// First cycle not walked; the watermark after flushing.
    pub to_cycle: u32,
    /// Finalized cycles left unwalked because of the cycle cap.
    pub remaining_cycles: u32,
    /// Per-cycle amount carried into `to_cycle`.
    pub carry: i128,
}

/// Sparse cycle → [`AmtDelta`] map of one account for one asset, with its
/// receive watermark.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct AmtDeltaLedger {
    deltas: BTreeMap<u32, AmtDelta>,
    /// First cycle not yet received. `0` until the account is first streamed to.
    next_receivable_cycle: u32,
}

impl AmtDeltaLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// The receive watermark. `0` if the account was never streamed to.
    pub fn next_receivable_cycle(&self) -> u32 {
        self.next_receivable_cycle
    }

    /// The stored delta of `cycle` (zero if absent).
    pub fn delta(&self, cycle: u32) -> AmtDelta {
        self.deltas.get(&cycle).copied().unwrap_or_default()
    }

    /// Number of non-empty buckets.
    pub fn len(&self) -> usize {
        self.deltas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty()
    }

    fn update(&mut self, cycle: u32, this_cycle: i128, next_cycle: i128) {
        let entry = self.deltas.entry(cycle).or_default();
        entry.this_cycle = entry.this_cycle.wrapping_add(this_cycle);
        entry.next_cycle = entry.next_cycle.wrapping_add(next_cycle);
        if entry.is_zero() {
            self.deltas.remove(&cycle);
        }
    }

    /// Change the streaming rate by `amt_per_sec` from `timestamp` on.
    pub fn add_delta(&mut self, math: &CycleMath, timestamp: u32, amt_per_sec: i128) {
        let (this_cycle, next_cycle) = math.split_delta(timestamp, amt_per_sec);
        self.update(math.cycle_of(timestamp), this_cycle, next_cycle);
    }

    /// Stream at `amt_per_sec` over `[start, end)`. No-op if `start == end`.
    pub fn add_delta_range(
        &mut self,
        math: &CycleMath,
        start: u32,
        end: u32,
        amt_per_sec: i128,
    ) {
        if start == end {
            return;
        }
        self.add_delta(math, start, amt_per_sec);
        self.add_delta(math, end, amt_per_sec.wrapping_neg());
    }

    /// Undo a previous [`add_delta_range`](Self::add_delta_range) with the
    /// same arguments.
    pub fn clear_delta_range(
        &mut self,
        math: &CycleMath,
        start: u32,
        end: u32,
        amt_per_sec: i128,
    ) {
        self.add_delta_range(math, start, end, amt_per_sec.wrapping_neg());
    }

    /// Move a stream window from `curr` to `new`, both `(start, end)`.
    ///
    /// Same effect as clearing `curr` and adding `new`, but unchanged edges
    /// touch no buckets.
    pub fn move_delta_range(
        &mut self,
        math: &CycleMath,
        curr: (u32, u32),
        new: (u32, u32),
        amt_per_sec: i128,
    ) {
        self.add_delta_range(math, curr.0, new.0, amt_per_sec.wrapping_neg());
        self.add_delta_range(math, curr.1, new.1, amt_per_sec);
    }

    /// Remove `amt` from what `cycle` pays out, leaving later cycles intact.
    pub fn subtract_from_cycle(&mut self, cycle: u32, amt: i128) {
        self.update(cycle, amt.wrapping_neg(), amt);
    }

    /// Make sure receiving starts no later than `cycle`.
    pub fn receive_from(&mut self, cycle: u32) {
        if self.next_receivable_cycle == 0 || self.next_receivable_cycle > cycle {
            self.next_receivable_cycle = cycle;
        }
    }

    /// Finalized cycles not yet received, given the current cycle.
    pub fn receivable_cycles(&self, current_cycle: u32) -> u32 {
        let (from, to) = self.receivable_range(current_cycle);
        to - from
    }

    fn receivable_range(&self, current_cycle: u32) -> (u32, u32) {
        let from = self.next_receivable_cycle;
        if from == 0 || current_cycle < from {
            return (from, from);
        }
        (from, current_cycle)
    }

    /// Walk up to `max_cycles` finalized cycles without changing anything.
    pub fn preview(&self, current_cycle: u32, max_cycles: u32) -> FlushResult {
        let (from_cycle, mut to_cycle) = self.receivable_range(current_cycle);
        let mut remaining_cycles = 0;
        if to_cycle - from_cycle > max_cycles {
            remaining_cycles = to_cycle - from_cycle - max_cycles;
            to_cycle -= remaining_cycles;
        }
        let mut received: i128 = 0;
        let mut per_cycle: i128 = 0;
        let mut cursor = from_cycle;
        for (&cycle, delta) in self.deltas.range(from_cycle..to_cycle) {
            // Cycles without a bucket pay the running amount unchanged.
            let skipped = (cycle - cursor) as i128;
            received = received.wrapping_add(per_cycle.wrapping_mul(skipped));
            per_cycle = per_cycle.wrapping_add(delta.this_cycle);
            received = received.wrapping_add(per_cycle);
            per_cycle = per_cycle.wrapping_add(delta.next_cycle);
            cursor = cycle + 1;
        }
        received = received.wrapping_add(per_cycle.wrapping_mul((to_cycle - cursor) as i128));
        FlushResult {
            amt: received as u128,
            from_cycle,
            to_cycle,
            remaining_cycles,
            carry: per_cycle,
        }
    }

    /// Receive up to `max_cycles` finalized cycles.
    ///
    /// Empties the walked buckets, advances the watermark and re-deposits the
    /// running per-cycle amount as an absolute value at the new watermark.
    pub fn flush(&mut self, current_cycle: u32, max_cycles: u32) -> FlushResult {
        let result = self.preview(current_cycle, max_cycles);
        if result.from_cycle == result.to_cycle {
            return result;
        }
        self.next_receivable_cycle = result.to_cycle;
        let walked: Vec<u32> = self
            .deltas
            .range(result.from_cycle..result.to_cycle)
            .map(|(cycle, _)| *cycle)
            .collect();
        for cycle in walked {
            self.deltas.remove(&cycle);
        }
        if result.carry != 0 {
            self.update(result.to_cycle, result.carry, 0);
        }
        result
    }
}
