//! Splits engine.
//!
//! Each account commits to its splits receivers by hash. Splitting requires
//! the list to be resupplied and checked against that hash.
//!
//! Shares use running-remainder rounding: receiver `i` gets
//! `floor(amt * W_i / TOTAL) - floor(amt * W_{i-1} / TOTAL)` where `W_i` is
//! the cumulative weight up to and including `i`. The shares never sum to
//! more than `amt` and rounding dust stays with the splitting account.

use std::collections::HashMap;

use drip_core::constants::{MAX_SPLITS_RECEIVERS, TOTAL_SPLITS_WEIGHT};
use drip_core::error::{ReceiverListError, SplitsError};
use drip_core::hashing::hash_splits;
use drip_core::types::{AccountId, AssetId, Hash256, SplitsReceiver};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Balances of one account in one asset.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SplitsBalance {
    /// Received, waiting to be split.
    pub splittable: u128,
    /// Split off to this account itself, waiting to be collected.
    pub collectable: u128,
}

/// Result of a split.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct SplitOutcome {
    /// Moved to the splitting account's collectable balance.
    pub collectable_amt: u128,
    /// Passed on to the receivers, in total.
    pub split_amt: u128,
    /// What each receiver got, in list order.
    pub shares: Vec<(AccountId, u128)>,
}

#[derive(Clone, Debug, Default)]
struct SplitsState {
    splits_hash: Hash256,
    balances: HashMap<AssetId, SplitsBalance>,
}

/// `floor(amt * weight / TOTAL_SPLITS_WEIGHT)` without overflowing.
fn weighted(amt: u128, weight: u64) -> u128 {
    let total = TOTAL_SPLITS_WEIGHT as u128;
    let weight = weight as u128;
    (amt / total) * weight + (amt % total) * weight / total
}

/// Splits configurations and balances for all accounts.
#[derive(Clone, Debug, Default)]
pub struct SplitsEngine {
    states: HashMap<AccountId, SplitsState>,
}

impl SplitsEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check a receiver list: at most [`MAX_SPLITS_RECEIVERS`], strictly
    /// ascending by account, every weight positive, total weight at most
    /// [`TOTAL_SPLITS_WEIGHT`].
    pub fn validate_receivers(receivers: &[SplitsReceiver]) -> Result<(), ReceiverListError> {
        if receivers.len() > MAX_SPLITS_RECEIVERS {
            return Err(ReceiverListError::TooMany {
                len: receivers.len(),
                max: MAX_SPLITS_RECEIVERS,
            });
        }
        let mut total: u64 = 0;
        for (index, receiver) in receivers.iter().enumerate() {
            if receiver.weight == 0 {
                return Err(ReceiverListError::ZeroWeight(index));
            }
            if index > 0 && receivers[index - 1].account_id >= receiver.account_id {
                return Err(ReceiverListError::NotSorted(index));
            }
            total += receiver.weight as u64;
        }
        if total > TOTAL_SPLITS_WEIGHT as u64 {
            return Err(ReceiverListError::WeightsTooHigh {
                total,
                max: TOTAL_SPLITS_WEIGHT,
            });
        }
        Ok(())
    }

    /// Replace the splits receivers of `account`. Returns the new commitment.
    pub fn set_splits(
        &mut self,
        account: AccountId,
        receivers: &[SplitsReceiver],
    ) -> Result<Hash256, SplitsError> {
        Self::validate_receivers(receivers).map_err(SplitsError::ReceiverListInvalid)?;
        let hash = hash_splits(receivers);
        self.states.entry(account).or_default().splits_hash = hash;
        debug!(account = %account, receivers = receivers.len(), "splits: configured");
        Ok(hash)
    }

    /// Commitment to the current splits receivers of `account`.
    pub fn splits_hash(&self, account: AccountId) -> Hash256 {
        self.states
            .get(&account)
            .map_or(Hash256::ZERO, |s| s.splits_hash)
    }

    fn assert_curr_splits(
        &self,
        account: AccountId,
        receivers: &[SplitsReceiver],
    ) -> Result<(), SplitsError> {
        if hash_splits(receivers) != self.splits_hash(account) {
            return Err(SplitsError::InvalidCurrentConfig);
        }
        Ok(())
    }

    pub fn balance(&self, account: AccountId, asset: AssetId) -> SplitsBalance {
        self.states
            .get(&account)
            .and_then(|s| s.balances.get(&asset))
            .copied()
            .unwrap_or_default()
    }

    fn balance_mut(&mut self, account: AccountId, asset: AssetId) -> &mut SplitsBalance {
        self.states
            .entry(account)
            .or_default()
            .balances
            .entry(asset)
            .or_default()
    }

    pub fn splittable(&self, account: AccountId, asset: AssetId) -> u128 {
        self.balance(account, asset).splittable
    }

    pub fn collectable(&self, account: AccountId, asset: AssetId) -> u128 {
        self.balance(account, asset).collectable
    }

    /// Credit `amt` to the splittable balance of `account`.
    pub fn add_splittable(
        &mut self,
        account: AccountId,
        asset: AssetId,
        amt: u128,
    ) -> Result<(), SplitsError> {
        let balance = self.balance_mut(account, asset);
        balance.splittable = balance
            .splittable
            .checked_add(amt)
            .ok_or(SplitsError::ArithmeticOverflow)?;
        Ok(())
    }

    /// How splitting `amt` with `curr_receivers` would divide it.
    pub fn split_result(
        &self,
        account: AccountId,
        curr_receivers: &[SplitsReceiver],
        amt: u128,
    ) -> Result<SplitOutcome, SplitsError> {
        self.assert_curr_splits(account, curr_receivers)?;
        let mut outcome = SplitOutcome::default();
        let mut cumulative_weight: u64 = 0;
        for receiver in curr_receivers {
            cumulative_weight += receiver.weight as u64;
            let share = weighted(amt, cumulative_weight) - outcome.split_amt;
            outcome.split_amt += share;
            outcome.shares.push((receiver.account_id, share));
        }
        outcome.collectable_amt = amt - outcome.split_amt;
        Ok(outcome)
    }

    /// Split the whole splittable balance of `account`.
    ///
    /// Receivers' splittable balances are credited, the rest becomes
    /// collectable. A receiver may be `account` itself; its share is then
    /// splittable again.
    pub fn split(
        &mut self,
        account: AccountId,
        asset: AssetId,
        curr_receivers: &[SplitsReceiver],
    ) -> Result<SplitOutcome, SplitsError> {
        let amt = self.splittable(account, asset);
        let outcome = self.split_result(account, curr_receivers, amt)?;
        // Check every credit before applying any.
        for (receiver, share) in &outcome.shares {
            let held = if *receiver == account {
                0
            } else {
                self.splittable(*receiver, asset)
            };
            held.checked_add(*share).ok_or(SplitsError::ArithmeticOverflow)?;
        }
        self.collectable(account, asset)
            .checked_add(outcome.collectable_amt)
            .ok_or(SplitsError::ArithmeticOverflow)?;

        let own = self.balance_mut(account, asset);
        own.splittable = 0;
        own.collectable += outcome.collectable_amt;
        for (receiver, share) in &outcome.shares {
            self.balance_mut(*receiver, asset).splittable += *share;
        }
        debug!(
            account = %account,
            asset = %asset,
            collectable = outcome.collectable_amt,
            split = outcome.split_amt,
            "splits: split"
        );
        Ok(outcome)
    }

    /// Zero the collectable balance of `account` and return what it held.
    pub fn collect(&mut self, account: AccountId, asset: AssetId) -> u128 {
        let balance = self.balance_mut(account, asset);
        std::mem::take(&mut balance.collectable)
    }

    /// Credit `amt` straight to the splittable balance of `receiver`.
    pub fn give(
        &mut self,
        account: AccountId,
        receiver: AccountId,
        asset: AssetId,
        amt: u128,
    ) -> Result<(), SplitsError> {
        self.add_splittable(receiver, asset, amt)?;
        debug!(from = %account, to = %receiver, asset = %asset, amt, "splits: given");
        Ok(())
    }
}
