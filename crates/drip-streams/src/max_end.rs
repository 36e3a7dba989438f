//! Stream windows, balances, and the "funds run out" time.
//!
//! A receiver's window starts at its configured `start` (or the update time
//! when `start == 0`). Receivers with a `duration` stream for exactly that
//! long and are funded up front. Receivers without one share whatever
//! balance is left and stop together at `max_end`.
//!
//! `max_end` is found with a sweep over the distinct start times of the
//! open-ended receivers: between two consecutive starts the set of active
//! receivers, and so their combined rate, is fixed. The first segment whose
//! end the remaining balance cannot reach contains `max_end`.

use drip_core::constants::AMT_PER_SEC_MULTIPLIER;
use drip_core::cycle::CycleMath;
use drip_core::error::StreamsError;
use drip_core::types::StreamReceiver;

/// Window `[start, end)` during which `receiver` streams, clamped to
/// `[start_cap, end_cap)`. Returns an empty window (`start == end`) when the
/// two do not overlap.
pub fn stream_range(
    receiver: &StreamReceiver,
    update_time: u32,
    max_end: u32,
    start_cap: u32,
    end_cap: u32,
) -> (u32, u32) {
    let config = receiver.config;
    let mut start = if config.start == 0 {
        update_time
    } else {
        config.start
    };
    let mut end = if config.duration == 0 {
        max_end
    } else {
        start.saturating_add(config.duration)
    };
    start = start.max(start_cap);
    end = end.min(end_cap);
    (start, end.max(start))
}

/// The part of [`stream_range`] at or after `now`.
pub fn stream_range_in_future(
    receiver: &StreamReceiver,
    update_time: u32,
    max_end: u32,
    now: u32,
) -> (u32, u32) {
    stream_range(receiver, update_time, max_end, now, u32::MAX)
}

/// Balance left at `timestamp` of a configuration set at `update_time` with
/// `balance`.
pub fn calc_balance(
    math: &CycleMath,
    balance: u128,
    update_time: u32,
    max_end: u32,
    receivers: &[StreamReceiver],
    timestamp: u32,
) -> u128 {
    receivers.iter().fold(balance, |left, receiver| {
        let (start, end) =
            stream_range(receiver, update_time, max_end, update_time, timestamp);
        left.saturating_sub(math.streamed_amt(receiver.config.amt_per_sec, start, end))
    })
}

/// Latest timestamp until which `balance` keeps every open-ended receiver in
/// `receivers` streaming, for a configuration set at `now`.
///
/// Fixed-duration receivers are charged their whole remaining window first;
/// if that exceeds `balance` the configuration is rejected with
/// [`StreamsError::InsufficientBalance`]. With no open-ended receivers the
/// result is the end of the last fixed window (or `now`).
///
/// The result saturates at `u32::MAX` when the balance outlasts the
/// timestamp range.
pub fn calc_max_end(
    math: &CycleMath,
    balance: u128,
    receivers: &[StreamReceiver],
    now: u32,
) -> Result<u32, StreamsError> {
    let mut fixed_spend: u128 = 0;
    let mut fixed_end = now;
    let mut pool: Vec<(u32, u128)> = Vec::new();

    for receiver in receivers {
        let amt_per_sec = receiver.config.amt_per_sec;
        if receiver.config.duration == 0 {
            let (start, _) = stream_range_in_future(receiver, now, now, now);
            pool.push((start, amt_per_sec));
            continue;
        }
        let (start, end) = stream_range_in_future(receiver, now, now, now);
        fixed_spend = fixed_spend.saturating_add(math.streamed_amt(amt_per_sec, start, end));
        fixed_end = fixed_end.max(end);
    }

    if fixed_spend > balance {
        return Err(StreamsError::InsufficientBalance {
            have: balance,
            need: fixed_spend,
        });
    }
    if pool.is_empty() {
        return Ok(fixed_end);
    }
    let available = balance - fixed_spend;
    if available == 0 {
        return Ok(now);
    }

    pool.sort_unstable_by_key(|&(start, _)| start);
    let spent = |timestamp: u32| -> u128 {
        pool.iter()
            .map(|&(start, amt_per_sec)| math.streamed_amt(amt_per_sec, start, timestamp))
            .fold(0u128, u128::saturating_add)
    };

    let mut idx = 0;
    let mut rate: u128 = 0;
    while idx < pool.len() {
        let segment_start = pool[idx].0;
        while idx < pool.len() && pool[idx].0 == segment_start {
            rate = rate.saturating_add(pool[idx].1);
            idx += 1;
        }
        let segment_end = pool.get(idx).map_or(u32::MAX, |&(start, _)| start);
        if spent(segment_end) <= available {
            continue;
        }
        // `spent(segment_start) <= available < spent(segment_end)`.
        let mut lo = segment_start;
        let mut hi = segment_end;
        // First guess: where the combined rate alone would run out.
        let left = available - spent(segment_start);
        let secs = left.saturating_mul(AMT_PER_SEC_MULTIPLIER) / rate.max(1);
        let guess = (segment_start as u128).saturating_add(secs);
        if guess > lo as u128 && guess < hi as u128 {
            let guess = guess as u32;
            if spent(guess) <= available {
                lo = guess;
            } else {
                hi = guess;
            }
        }
        while hi - lo > 1 {
            let mid = lo + (hi - lo) / 2;
            if spent(mid) <= available {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        return Ok(lo);
    }
    Ok(u32::MAX)
}
