//! Streams engine: per-account stream configurations and receiving.
//!
//! Senders commit to their configuration by hash only. Every mutating call
//! resupplies the current receiver list, last update time and balance, which
//! are checked against the stored [`StreamsState::config_hash`] before
//! anything changes.
//!
//! What a receiver is owed lives in its [`AmtDeltaLedger`]. Changing a
//! configuration diffs the old and new receiver lists and moves, clears, or
//! adds delta windows in the receivers' ledgers accordingly.

use std::collections::{BTreeMap, HashMap};

use drip_core::constants::{MAX_AMT_PER_SEC, MAX_STREAMS_RECEIVERS};
use drip_core::cycle::CycleMath;
use drip_core::error::{ReceiverListError, StreamsError};
use drip_core::hashing::{hash_streams, hash_streams_config, hash_streams_history};
use drip_core::types::{AccountId, AssetId, Hash256, StreamReceiver, StreamsHistory};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::deltas::AmtDeltaLedger;
use crate::max_end::{calc_balance, calc_max_end, stream_range, stream_range_in_future};

/// Streams state of one account for one asset.
///
/// Holds both sides: the account's own configuration as a sender and the
/// ledger of what it receives.
#[derive(Clone, Debug, Default)]
pub struct StreamsState {
    /// Commitment to `(receivers, update_time, balance)`.
    pub config_hash: Hash256,
    /// Head of the configuration history hash chain.
    pub history_hash: Hash256,
    pub update_time: u32,
    /// Balance at `update_time`.
    pub balance: u128,
    pub max_end: u32,
    /// Configurations set during the cycle of `update_time`, counting the
    /// one carried over from the previous cycle.
    pub curr_cycle_configs: u32,
    /// Per sender, the next squeezable timestamp of each configuration
    /// index in the sender's current cycle.
    pub next_squeezed: HashMap<AccountId, BTreeMap<u32, u32>>,
    /// What this account receives.
    pub ledger: AmtDeltaLedger,
}

/// Serializable summary of a [`StreamsState`].
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StreamsSnapshot {
    pub config_hash: Hash256,
    pub history_hash: Hash256,
    pub update_time: u32,
    pub balance: u128,
    pub max_end: u32,
    pub curr_cycle_configs: u32,
    pub next_receivable_cycle: u32,
}

/// The configuration a caller claims is current.
#[derive(Clone, Copy, Debug)]
pub struct CurrStreams<'a> {
    pub receivers: &'a [StreamReceiver],
    pub update_time: u32,
    pub balance: u128,
}

impl<'a> CurrStreams<'a> {
    /// The configuration of an account that was never configured.
    pub fn empty() -> Self {
        Self {
            receivers: &[],
            update_time: 0,
            balance: 0,
        }
    }
}

/// Result of a successful [`StreamsEngine::set_streams`].
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct SetStreamsOutcome {
    /// Balance change actually applied. Withdrawals are clamped to what is left.
    pub real_balance_delta: i128,
    pub balance: u128,
    pub max_end: u32,
    pub update_time: u32,
    pub config_hash: Hash256,
    pub history_hash: Hash256,
}

/// Amount a receive would deliver.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReceiveResult {
    pub amt: u128,
    /// Finalized cycles left over because of `max_cycles`.
    pub remaining_cycles: u32,
}

/// Result of a squeeze.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct SqueezeOutcome {
    pub amt: u128,
    /// History hash preceding each supplied entry.
    pub history_hashes: Vec<Hash256>,
}

struct SqueezePlan {
    amt: u128,
    history_hashes: Vec<Hash256>,
    /// Configuration indices in the sender's current cycle that were squeezed.
    squeezed: Vec<u32>,
}

/// Stream configurations and receiving, for all accounts and assets.
#[derive(Clone, Debug)]
pub struct StreamsEngine {
    math: CycleMath,
    states: HashMap<AssetId, HashMap<AccountId, StreamsState>>,
}

impl StreamsEngine {
    pub fn new(math: CycleMath) -> Self {
        Self {
            math,
            states: HashMap::new(),
        }
    }

    pub fn cycle_math(&self) -> &CycleMath {
        &self.math
    }

    fn state(&self, account: AccountId, asset: AssetId) -> Option<&StreamsState> {
        self.states.get(&asset)?.get(&account)
    }

    fn state_mut(&mut self, account: AccountId, asset: AssetId) -> &mut StreamsState {
        self.states
            .entry(asset)
            .or_default()
            .entry(account)
            .or_default()
    }

    /// Check a receiver list: at most [`MAX_STREAMS_RECEIVERS`], strictly
    /// ascending, every rate within bounds.
    pub fn validate_receivers(
        &self,
        receivers: &[StreamReceiver],
    ) -> Result<(), ReceiverListError> {
        if receivers.len() > MAX_STREAMS_RECEIVERS {
            return Err(ReceiverListError::TooMany {
                len: receivers.len(),
                max: MAX_STREAMS_RECEIVERS,
            });
        }
        let min = self.math.min_amt_per_sec();
        for (index, receiver) in receivers.iter().enumerate() {
            if index > 0 && receivers[index - 1] >= *receiver {
                return Err(ReceiverListError::NotSorted(index));
            }
            let amt_per_sec = receiver.config.amt_per_sec;
            if amt_per_sec < min {
                return Err(ReceiverListError::RateTooLow {
                    index,
                    amt_per_sec,
                    min,
                });
            }
            if amt_per_sec > MAX_AMT_PER_SEC {
                return Err(ReceiverListError::RateTooHigh {
                    index,
                    amt_per_sec,
                });
            }
        }
        Ok(())
    }

    fn verify_current(
        &self,
        account: AccountId,
        asset: AssetId,
        curr: &CurrStreams<'_>,
    ) -> Result<StreamsState, StreamsError> {
        let state = self.state(account, asset).cloned().unwrap_or_default();
        let claimed = hash_streams_config(curr.receivers, curr.update_time, curr.balance);
        if claimed != state.config_hash {
            return Err(StreamsError::InvalidCurrentConfig);
        }
        Ok(state)
    }

    /// Balance of `account` at `timestamp`, which must not precede the last update.
    pub fn balance_at(
        &self,
        account: AccountId,
        asset: AssetId,
        curr: &CurrStreams<'_>,
        timestamp: u32,
    ) -> Result<u128, StreamsError> {
        let state = self.verify_current(account, asset, curr)?;
        if timestamp < state.update_time {
            return Err(StreamsError::TimestampBeforeUpdate {
                timestamp,
                update_time: state.update_time,
            });
        }
        Ok(calc_balance(
            &self.math,
            state.balance,
            state.update_time,
            state.max_end,
            curr.receivers,
            timestamp,
        ))
    }

    /// Replace the configuration of `account` at `now`.
    ///
    /// `balance_delta` is added to the balance left at `now`; a withdrawal
    /// larger than that balance withdraws everything. Nothing changes if any
    /// check fails.
    pub fn set_streams(
        &mut self,
        account: AccountId,
        asset: AssetId,
        curr: &CurrStreams<'_>,
        balance_delta: i128,
        new_receivers: &[StreamReceiver],
        now: u32,
    ) -> Result<SetStreamsOutcome, StreamsError> {
        let state = self.verify_current(account, asset, curr)?;
        if now < state.update_time {
            return Err(StreamsError::TimestampBeforeUpdate {
                timestamp: now,
                update_time: state.update_time,
            });
        }
        let curr_balance = calc_balance(
            &self.math,
            state.balance,
            state.update_time,
            state.max_end,
            curr.receivers,
            now,
        );
        let curr_balance =
            i128::try_from(curr_balance).map_err(|_| StreamsError::ArithmeticOverflow)?;
        let real_balance_delta = balance_delta.max(-curr_balance);
        let new_balance = curr_balance
            .checked_add(real_balance_delta)
            .ok_or(StreamsError::ArithmeticOverflow)? as u128;

        self.validate_receivers(new_receivers)
            .map_err(StreamsError::ReceiverListInvalid)?;
        let new_max_end = calc_max_end(&self.math, new_balance, new_receivers, now)?;

        self.update_receiver_states(
            asset,
            curr.receivers,
            state.update_time,
            state.max_end,
            new_receivers,
            new_max_end,
            now,
        );

        let math = self.math;
        let sender = self.state_mut(account, asset);
        sender.curr_cycle_configs = if !sender.history_hash.is_zero()
            && math.cycle_of(sender.update_time) != math.cycle_of(now)
        {
            2
        } else {
            sender.curr_cycle_configs + 1
        };
        sender.update_time = now;
        sender.balance = new_balance;
        sender.max_end = new_max_end;
        sender.config_hash = hash_streams_config(new_receivers, now, new_balance);
        sender.history_hash = hash_streams_history(
            &sender.history_hash,
            &hash_streams(new_receivers),
            now,
            new_max_end,
        );

        debug!(
            account = %account,
            asset = %asset,
            receivers = new_receivers.len(),
            balance = new_balance,
            max_end = new_max_end,
            "streams: configured"
        );
        Ok(SetStreamsOutcome {
            real_balance_delta,
            balance: new_balance,
            max_end: new_max_end,
            update_time: now,
            config_hash: sender.config_hash,
            history_hash: sender.history_hash,
        })
    }

    /// Merge-walk both sorted lists and move receivers' delta windows.
    ///
    /// A receiver present in both lists with the same account and rate keeps
    /// its window and only has the edges moved.
    #[allow(clippy::too_many_arguments)]
    fn update_receiver_states(
        &mut self,
        asset: AssetId,
        curr_receivers: &[StreamReceiver],
        last_update: u32,
        curr_max_end: u32,
        new_receivers: &[StreamReceiver],
        new_max_end: u32,
        now: u32,
    ) {
        let math = self.math;
        let states = self.states.entry(asset).or_default();
        let (mut curr_idx, mut new_idx) = (0, 0);
        loop {
            let curr = curr_receivers.get(curr_idx);
            let new = new_receivers.get(new_idx);
            let (pick_curr, pick_new) = match (curr, new) {
                (None, None) => break,
                (Some(c), Some(n))
                    if c.account_id == n.account_id
                        && c.config.amt_per_sec == n.config.amt_per_sec =>
                {
                    (true, true)
                }
                (Some(c), Some(n)) => (c < n, c >= n),
                (Some(_), None) => (true, false),
                (None, Some(_)) => (false, true),
            };
            match (curr, new) {
                (Some(c), Some(n)) if pick_curr && pick_new => {
                    let curr_range = stream_range_in_future(c, last_update, curr_max_end, now);
                    let new_range = stream_range_in_future(n, now, new_max_end, now);
                    let ledger = &mut states.entry(c.account_id).or_default().ledger;
                    let rate = c.config.amt_per_sec as i128;
                    ledger.move_delta_range(&math, curr_range, new_range, rate);
                    ledger.receive_from(math.cycle_of(new_range.0));
                }
                (Some(c), _) if pick_curr => {
                    let (start, end) =
                        stream_range_in_future(c, last_update, curr_max_end, now);
                    let ledger = &mut states.entry(c.account_id).or_default().ledger;
                    ledger.clear_delta_range(&math, start, end, c.config.amt_per_sec as i128);
                }
                (_, Some(n)) => {
                    let (start, end) = stream_range_in_future(n, now, new_max_end, now);
                    let ledger = &mut states.entry(n.account_id).or_default().ledger;
                    ledger.add_delta_range(&math, start, end, n.config.amt_per_sec as i128);
                    ledger.receive_from(math.cycle_of(start));
                }
                _ => break,
            }
            if pick_curr {
                curr_idx += 1;
            }
            if pick_new {
                new_idx += 1;
            }
        }
    }

    /// Finalized cycles `account` has not received yet.
    pub fn receivable_cycles(&self, account: AccountId, asset: AssetId, now: u32) -> u32 {
        self.state(account, asset).map_or(0, |state| {
            state
                .ledger
                .receivable_cycles(self.math.cycle_of(now))
        })
    }

    /// What [`receive`](Self::receive) would deliver, without receiving it.
    pub fn receive_result(
        &self,
        account: AccountId,
        asset: AssetId,
        max_cycles: u32,
        now: u32,
    ) -> ReceiveResult {
        self.state(account, asset)
            .map_or_else(ReceiveResult::default, |state| {
                let flush = state.ledger.preview(self.math.cycle_of(now), max_cycles);
                ReceiveResult {
                    amt: flush.amt,
                    remaining_cycles: flush.remaining_cycles,
                }
            })
    }

    /// Receive up to `max_cycles` finalized cycles streamed to `account`.
    ///
    /// The caller credits the returned amount to the account's splittable
    /// balance.
    pub fn receive(
        &mut self,
        account: AccountId,
        asset: AssetId,
        max_cycles: u32,
        now: u32,
    ) -> u128 {
        let current_cycle = self.math.cycle_of(now);
        let Some(state) = self
            .states
            .get_mut(&asset)
            .and_then(|assets| assets.get_mut(&account))
        else {
            return 0;
        };
        let flush = state.ledger.flush(current_cycle, max_cycles);
        if flush.from_cycle != flush.to_cycle {
            debug!(
                account = %account,
                asset = %asset,
                amt = flush.amt,
                from_cycle = flush.from_cycle,
                to_cycle = flush.to_cycle,
                "streams: received"
            );
        }
        flush.amt
    }

    /// Re-derive the history hash chain from `history_hash` over `history`
    /// and check it ends at `final_hash`.
    ///
    /// Returns the hash preceding each entry.
    pub fn verify_streams_history(
        history_hash: Hash256,
        history: &[StreamsHistory],
        final_hash: Hash256,
    ) -> Result<Vec<Hash256>, StreamsError> {
        let mut hash = history_hash;
        let mut hashes = Vec::with_capacity(history.len());
        for (index, entry) in history.iter().enumerate() {
            let streams_hash = if entry.receivers.is_empty() {
                entry.streams_hash
            } else {
                if !entry.streams_hash.is_zero() {
                    return Err(StreamsError::InvalidStreamsHistory(format!(
                        "entry {index} has both a hash and receivers"
                    )));
                }
                hash_streams(&entry.receivers)
            };
            hashes.push(hash);
            hash = hash_streams_history(&hash, &streams_hash, entry.update_time, entry.max_end);
        }
        if hash != final_hash {
            return Err(StreamsError::InvalidStreamsHistory(
                "hash chain does not match the sender's".into(),
            ));
        }
        Ok(hashes)
    }

    fn squeeze_plan(
        &self,
        account: AccountId,
        asset: AssetId,
        sender: AccountId,
        history_hash: Hash256,
        history: &[StreamsHistory],
        now: u32,
    ) -> Result<SqueezePlan, StreamsError> {
        let sender_state = self.state(sender, asset).cloned().unwrap_or_default();
        let history_hashes =
            Self::verify_streams_history(history_hash, history, sender_state.history_hash)?;
        let cycle_start = self.math.cycle_start(now);
        // Only the latest configuration streams into this cycle unless the
        // sender reconfigured during it.
        let curr_cycle_configs = if sender_state.update_time >= cycle_start {
            sender_state.curr_cycle_configs
        } else {
            1
        };
        let next_squeezed = self
            .state(account, asset)
            .and_then(|state| state.next_squeezed.get(&sender));

        let mut plan = SqueezePlan {
            amt: 0,
            history_hashes,
            squeezed: Vec::new(),
        };
        let newest_first = history.iter().enumerate().rev();
        for (rev_idx, (i, entry)) in (1u32..).zip(newest_first) {
            if rev_idx > curr_cycle_configs {
                break;
            }
            if entry.receivers.is_empty() {
                continue;
            }
            let config_idx = curr_cycle_configs - rev_idx;
            let squeezed_until = next_squeezed
                .and_then(|map| map.get(&config_idx).copied())
                .unwrap_or(0);
            let start_cap = squeezed_until.max(cycle_start).max(entry.update_time);
            if start_cap >= now {
                continue;
            }
            let end_cap = if rev_idx == 1 {
                now
            } else {
                history[i + 1].update_time
            };
            plan.squeezed.push(config_idx);
            plan.amt = plan
                .amt
                .saturating_add(self.squeezed_amt(account, entry, start_cap, end_cap));
        }
        Ok(plan)
    }

    /// Amount `entry` streamed to `account` within `[start_cap, end_cap)`.
    fn squeezed_amt(
        &self,
        account: AccountId,
        entry: &StreamsHistory,
        start_cap: u32,
        end_cap: u32,
    ) -> u128 {
        let receivers = &entry.receivers;
        let first = receivers.partition_point(|r| r.account_id < account);
        receivers[first..]
            .iter()
            .take_while(|r| r.account_id == account)
            .map(|r| {
                let (start, end) =
                    stream_range(r, entry.update_time, entry.max_end, start_cap, end_cap);
                self.math.streamed_amt(r.config.amt_per_sec, start, end)
            })
            .fold(0u128, u128::saturating_add)
    }

    /// What [`squeeze`](Self::squeeze) would deliver, without squeezing.
    pub fn squeeze_result(
        &self,
        account: AccountId,
        asset: AssetId,
        sender: AccountId,
        history_hash: Hash256,
        history: &[StreamsHistory],
        now: u32,
    ) -> Result<u128, StreamsError> {
        let plan = self.squeeze_plan(account, asset, sender, history_hash, history, now)?;
        Ok(plan.amt)
    }

    /// Receive what `sender` streamed to `account` so far in the running cycle.
    ///
    /// `history` lists the sender's configurations after `history_hash`, up
    /// to the current one. The squeezed amount is taken out of the running
    /// cycle's bucket so a later [`receive`](Self::receive) does not deliver
    /// it again.
    pub fn squeeze(
        &mut self,
        account: AccountId,
        asset: AssetId,
        sender: AccountId,
        history_hash: Hash256,
        history: &[StreamsHistory],
        now: u32,
    ) -> Result<SqueezeOutcome, StreamsError> {
        let plan = self.squeeze_plan(account, asset, sender, history_hash, history, now)?;
        if plan.amt > 0 {
            let current_cycle = self.math.cycle_of(now);
            let amt =
                i128::try_from(plan.amt).map_err(|_| StreamsError::ArithmeticOverflow)?;
            let state = self.state_mut(account, asset);
            let next_squeezed = state.next_squeezed.entry(sender).or_default();
            for config_idx in &plan.squeezed {
                next_squeezed.insert(*config_idx, now);
            }
            state.ledger.subtract_from_cycle(current_cycle, amt);
            debug!(
                account = %account,
                asset = %asset,
                sender = %sender,
                amt = plan.amt,
                "streams: squeezed"
            );
        }
        Ok(SqueezeOutcome {
            amt: plan.amt,
            history_hashes: plan.history_hashes,
        })
    }

    /// Snapshot of the stored state of `account`. Zeroed if never touched.
    pub fn streams_state(&self, account: AccountId, asset: AssetId) -> StreamsSnapshot {
        self.state(account, asset)
            .map_or_else(StreamsSnapshot::default, |state| StreamsSnapshot {
                config_hash: state.config_hash,
                history_hash: state.history_hash,
                update_time: state.update_time,
                balance: state.balance,
                max_end: state.max_end,
                curr_cycle_configs: state.curr_cycle_configs,
                next_receivable_cycle: state.ledger.next_receivable_cycle(),
            })
    }
}
