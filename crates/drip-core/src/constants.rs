//! Ledger constants. Token amounts are in the asset's smallest unit; rates
//! carry [`AMT_PER_SEC_EXTRA_DECIMALS`] extra decimals.

/// Default cycle length: one week.
pub const DEFAULT_CYCLE_SECS: u32 = 7 * 24 * 60 * 60;

/// Shortest cycle accepted by the engines. A one-second cycle would leave no
/// room for mid-cycle rate changes.
pub const MIN_CYCLE_SECS: u32 = 2;

/// Extra decimals carried by `amt_per_sec`, so sub-unit per-second rates are
/// expressible.
pub const AMT_PER_SEC_EXTRA_DECIMALS: u32 = 9;

/// Fixed-point scale of `amt_per_sec`: `10^AMT_PER_SEC_EXTRA_DECIMALS`.
///
/// A rate of one token unit per second is `AMT_PER_SEC_MULTIPLIER`.
///
/// # Examples
///
/// ```
/// use drip_core::constants::{AMT_PER_SEC_EXTRA_DECIMALS, AMT_PER_SEC_MULTIPLIER};
/// assert_eq!(AMT_PER_SEC_MULTIPLIER, 10u128.pow(AMT_PER_SEC_EXTRA_DECIMALS));
/// ```
pub const AMT_PER_SEC_MULTIPLIER: u128 = 1_000_000_000;

/// Largest accepted `amt_per_sec`.
///
/// Chosen so that a rate multiplied by any `u32` number of seconds still fits
/// in an `i128`, which keeps every per-cycle delta representable.
pub const MAX_AMT_PER_SEC: u128 = (i128::MAX as u128) >> 32;

/// Maximum number of stream receivers in one configuration.
pub const MAX_STREAMS_RECEIVERS: usize = 100;

/// Maximum number of splits receivers in one configuration.
pub const MAX_SPLITS_RECEIVERS: usize = 200;

/// Sum of weights representing 100% of the splittable amount.
pub const TOTAL_SPLITS_WEIGHT: u32 = 1_000_000;

/// Cap on the total balance the ledger tracks for a single asset.
///
/// Keeps every accounted amount within signed 128-bit arithmetic.
pub const MAX_TOTAL_BALANCE: u128 = i128::MAX as u128;

/// Number of low bits of an account ID owned by its controller; the
/// remaining high 32 bits are the controller ID.
pub const CONTROLLER_ID_OFFSET: u32 = 96;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multiplier_matches_decimals() {
        assert_eq!(AMT_PER_SEC_MULTIPLIER, 10u128.pow(AMT_PER_SEC_EXTRA_DECIMALS));
    }

    #[test]
    fn max_rate_times_any_duration_fits_i128() {
        let product = MAX_AMT_PER_SEC.checked_mul(u32::MAX as u128);
        assert!(product.is_some());
        assert!(product.unwrap() <= i128::MAX as u128);
    }

    #[test]
    fn default_cycle_is_a_week() {
        assert_eq!(DEFAULT_CYCLE_SECS, 604_800);
        assert!(DEFAULT_CYCLE_SECS >= MIN_CYCLE_SECS);
    }

    #[test]
    fn controller_bits_leave_32_high_bits() {
        assert_eq!(128 - CONTROLLER_ID_OFFSET, 32);
    }
}
