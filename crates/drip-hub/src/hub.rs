//! The ledger facade.
//!
//! Every operation validates first and mutates after, so a rejected call
//! leaves no trace. Token movements are requested from the vault only once
//! the ledger state is committed; if the vault then fails, the error is
//! returned and undoing the operation is up to the host.

use std::collections::HashMap;

use drip_core::constants::MAX_TOTAL_BALANCE;
use drip_core::cycle::CycleMath;
use drip_core::error::SplitsError;
use drip_core::traits::{Clock, ControllerLookup, TokenVault};
use drip_core::types::{
    AccountId, Address, AssetId, ControllerId, Hash256, SplitsReceiver, StreamReceiver,
    StreamsHistory,
};
use drip_splits::{SplitOutcome, SplitsEngine};
use drip_streams::{
    CurrStreams, ReceiveResult, SetStreamsOutcome, StreamsEngine, StreamsSnapshot,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::HubConfig;
use crate::error::HubError;
use crate::events::{AccountMetadata, HubEvent};
use crate::ownership::{OwnershipAttestation, OwnershipOracle};
use crate::registry::ControllerRegistry;

/// Tokens of one asset the ledger accounts for.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssetBalance {
    /// Held in stream balances or streamed but not yet received.
    pub streams: u128,
    /// Held in splittable and collectable balances.
    pub splits: u128,
}

impl AssetBalance {
    pub fn total(&self) -> u128 {
        self.streams.saturating_add(self.splits)
    }
}

/// The Drip ledger: streams, splits, controllers and per-asset totals.
#[derive(Debug)]
pub struct DripHub<V, K> {
    math: CycleMath,
    streams: StreamsEngine,
    splits: SplitsEngine,
    registry: ControllerRegistry,
    oracles: HashMap<ControllerId, OwnershipOracle>,
    balances: HashMap<AssetId, AssetBalance>,
    vault: V,
    clock: K,
    events: Vec<HubEvent>,
}

impl<V: TokenVault, K: Clock> DripHub<V, K> {
    pub fn new(config: HubConfig, vault: V, clock: K) -> Result<Self, HubError> {
        let math = config.validate()?;
        Ok(Self {
            math,
            streams: StreamsEngine::new(math),
            splits: SplitsEngine::new(),
            registry: ControllerRegistry::new(),
            oracles: HashMap::new(),
            balances: HashMap::new(),
            vault,
            clock,
            events: Vec::new(),
        })
    }

    pub fn cycle_secs(&self) -> u32 {
        self.math.cycle_secs()
    }

    pub fn now(&self) -> u32 {
        self.clock.now()
    }

    pub fn vault(&self) -> &V {
        &self.vault
    }

    pub fn clock(&self) -> &K {
        &self.clock
    }

    /// Events recorded since the last drain, oldest first.
    pub fn events(&self) -> &[HubEvent] {
        &self.events
    }

    pub fn drain_events(&mut self) -> Vec<HubEvent> {
        std::mem::take(&mut self.events)
    }

    // --- Controllers -----------------------------------------------------

    pub fn register_controller(&mut self, address: Address) -> ControllerId {
        let controller = self.registry.register(address);
        debug!(controller = %controller, address = %address, "hub: controller registered");
        self.events.push(HubEvent::ControllerRegistered {
            controller,
            address,
        });
        controller
    }

    pub fn next_controller_id(&self) -> ControllerId {
        self.registry.next_id()
    }

    pub fn controller_address(&self, controller: ControllerId) -> Option<Address> {
        self.registry.address(controller)
    }

    pub fn update_controller_address(
        &mut self,
        controller: ControllerId,
        caller: &Address,
        new: Address,
    ) -> Result<(), HubError> {
        let old = self.registry.update(controller, caller, new)?;
        self.events.push(HubEvent::ControllerAddressUpdated {
            controller,
            old,
            new,
        });
        Ok(())
    }

    /// Hand authorization for the accounts of `controller` to the owners
    /// attested by the oracle with `oracle_key`.
    pub fn enable_attested_ownership(
        &mut self,
        controller: ControllerId,
        caller: &Address,
        oracle_key: &[u8; 32],
    ) -> Result<(), HubError> {
        let address = self
            .registry
            .address(controller)
            .ok_or(HubError::UnknownController(controller))?;
        if address != *caller {
            return Err(HubError::InvalidCaller(*caller));
        }
        let oracle = OwnershipOracle::new(oracle_key)?;
        self.oracles.insert(controller, oracle);
        self.events.push(HubEvent::AttestedOwnershipEnabled { controller });
        Ok(())
    }

    /// Apply an oracle attestation. Anyone may submit one.
    pub fn submit_ownership(
        &mut self,
        attestation: &OwnershipAttestation,
    ) -> Result<(), HubError> {
        let controller = attestation.account_id.controller_id();
        let oracle = self
            .oracles
            .get_mut(&controller)
            .ok_or(HubError::UnknownController(controller))?;
        oracle.apply(attestation).inspect_err(|err| {
            warn!(account = %attestation.account_id, %err, "hub: attestation rejected");
        })?;
        self.events.push(HubEvent::OwnerUpdated {
            account: attestation.account_id,
            owner: attestation.owner,
        });
        Ok(())
    }

    fn authorize(&self, caller: &Address, account: AccountId) -> Result<(), HubError> {
        if self.is_authorized(caller, account) {
            return Ok(());
        }
        warn!(caller = %caller, account = %account, "hub: unauthorized caller");
        Err(HubError::InvalidCaller(*caller))
    }

    // --- Balances --------------------------------------------------------

    pub fn asset_balance(&self, asset: AssetId) -> AssetBalance {
        self.balances.get(&asset).copied().unwrap_or_default()
    }

    fn check_increase(&self, asset: AssetId, amt: u128) -> Result<(), HubError> {
        let total = self.asset_balance(asset).total();
        match total.checked_add(amt) {
            Some(new_total) if new_total <= MAX_TOTAL_BALANCE => Ok(()),
            _ => {
                warn!(asset = %asset, total, amt, "hub: total balance cap reached");
                Err(HubError::TotalBalanceTooHigh(asset))
            }
        }
    }

    fn streams_to_splits(&mut self, asset: AssetId, amt: u128) {
        let balance = self.balances.entry(asset).or_default();
        balance.streams = balance.streams.saturating_sub(amt);
        balance.splits += amt;
    }

    // --- Streams ---------------------------------------------------------

    /// Replace the streams configuration of `account`.
    ///
    /// A positive real balance change is pulled from `caller`; a negative
    /// one is paid to `transfer_to`.
    #[allow(clippy::too_many_arguments)]
    pub fn set_streams(
        &mut self,
        caller: &Address,
        account: AccountId,
        asset: AssetId,
        curr: &CurrStreams<'_>,
        balance_delta: i128,
        new_receivers: &[StreamReceiver],
        transfer_to: &Address,
    ) -> Result<SetStreamsOutcome, HubError> {
        self.authorize(caller, account)?;
        if balance_delta > 0 {
            self.check_increase(asset, balance_delta as u128)?;
        }
        let now = self.clock.now();
        let outcome = self
            .streams
            .set_streams(account, asset, curr, balance_delta, new_receivers, now)
            .inspect_err(|err| {
                warn!(account = %account, asset = %asset, %err, "hub: set_streams rejected");
            })?;

        let real = outcome.real_balance_delta;
        let balance = self.balances.entry(asset).or_default();
        if real >= 0 {
            balance.streams += real as u128;
        } else {
            balance.streams = balance.streams.saturating_sub(real.unsigned_abs());
        }
        self.events.push(HubEvent::StreamsSet {
            account,
            asset,
            receivers: new_receivers.to_vec(),
            history_hash: outcome.history_hash,
            balance: outcome.balance,
            max_end: outcome.max_end,
            real_balance_delta: real,
        });

        if real > 0 {
            self.vault.transfer_in(asset, caller, real as u128)?;
        } else if real < 0 {
            self.vault
                .transfer_out(asset, transfer_to, real.unsigned_abs())?;
        }
        Ok(outcome)
    }

    pub fn streams_state(&self, account: AccountId, asset: AssetId) -> StreamsSnapshot {
        self.streams.streams_state(account, asset)
    }

    /// Stream balance of `account` at `timestamp`.
    pub fn balance_at(
        &self,
        account: AccountId,
        asset: AssetId,
        curr: &CurrStreams<'_>,
        timestamp: u32,
    ) -> Result<u128, HubError> {
        Ok(self.streams.balance_at(account, asset, curr, timestamp)?)
    }

    /// Stream balance of `account` now.
    pub fn current_balance(
        &self,
        account: AccountId,
        asset: AssetId,
        curr: &CurrStreams<'_>,
    ) -> Result<u128, HubError> {
        self.balance_at(account, asset, curr, self.clock.now())
    }

    pub fn receivable_cycles(&self, account: AccountId, asset: AssetId) -> u32 {
        self.streams
            .receivable_cycles(account, asset, self.clock.now())
    }

    pub fn receive_result(
        &self,
        account: AccountId,
        asset: AssetId,
        max_cycles: u32,
    ) -> ReceiveResult {
        self.streams
            .receive_result(account, asset, max_cycles, self.clock.now())
    }

    /// Receive up to `max_cycles` finalized cycles into the splittable
    /// balance of `account`. Anyone may call this.
    pub fn receive_streams(
        &mut self,
        account: AccountId,
        asset: AssetId,
        max_cycles: u32,
    ) -> Result<u128, HubError> {
        let now = self.clock.now();
        let preview = self
            .streams
            .receive_result(account, asset, max_cycles, now);
        self.splits
            .splittable(account, asset)
            .checked_add(preview.amt)
            .ok_or(SplitsError::ArithmeticOverflow)?;

        let amt = self.streams.receive(account, asset, max_cycles, now);
        self.splits.add_splittable(account, asset, amt)?;
        self.streams_to_splits(asset, amt);
        if amt > 0 {
            self.events.push(HubEvent::StreamsReceived {
                account,
                asset,
                amt,
                remaining_cycles: preview.remaining_cycles,
            });
        }
        Ok(amt)
    }

    pub fn squeeze_result(
        &self,
        account: AccountId,
        asset: AssetId,
        sender: AccountId,
        history_hash: Hash256,
        history: &[StreamsHistory],
    ) -> Result<u128, HubError> {
        let now = self.clock.now();
        Ok(self
            .streams
            .squeeze_result(account, asset, sender, history_hash, history, now)?)
    }

    /// Receive what `sender` streamed to `account` in the running cycle.
    /// Anyone may call this.
    pub fn squeeze_streams(
        &mut self,
        account: AccountId,
        asset: AssetId,
        sender: AccountId,
        history_hash: Hash256,
        history: &[StreamsHistory],
    ) -> Result<u128, HubError> {
        let now = self.clock.now();
        let outcome = self
            .streams
            .squeeze(account, asset, sender, history_hash, history, now)?;
        // Splittable and the squeezed amount are both capped by
        // MAX_TOTAL_BALANCE, so crediting cannot overflow.
        self.splits.add_splittable(account, asset, outcome.amt)?;
        self.streams_to_splits(asset, outcome.amt);
        self.events.push(HubEvent::StreamsSqueezed {
            account,
            asset,
            sender,
            amt: outcome.amt,
            history_hashes: outcome.history_hashes,
        });
        Ok(outcome.amt)
    }

    // --- Splits ----------------------------------------------------------

    pub fn set_splits(
        &mut self,
        caller: &Address,
        account: AccountId,
        receivers: &[SplitsReceiver],
    ) -> Result<Hash256, HubError> {
        self.authorize(caller, account)?;
        let splits_hash = self.splits.set_splits(account, receivers)?;
        self.events.push(HubEvent::SplitsSet {
            account,
            splits_hash,
        });
        Ok(splits_hash)
    }

    pub fn splits_hash(&self, account: AccountId) -> Hash256 {
        self.splits.splits_hash(account)
    }

    pub fn splittable(&self, account: AccountId, asset: AssetId) -> u128 {
        self.splits.splittable(account, asset)
    }

    pub fn collectable(&self, account: AccountId, asset: AssetId) -> u128 {
        self.splits.collectable(account, asset)
    }

    pub fn split_result(
        &self,
        account: AccountId,
        curr_receivers: &[SplitsReceiver],
        amt: u128,
    ) -> Result<SplitOutcome, HubError> {
        Ok(self.splits.split_result(account, curr_receivers, amt)?)
    }

    /// Split the splittable balance of `account`. Anyone may call this.
    pub fn split(
        &mut self,
        account: AccountId,
        asset: AssetId,
        curr_receivers: &[SplitsReceiver],
    ) -> Result<SplitOutcome, HubError> {
        let outcome = self.splits.split(account, asset, curr_receivers)?;
        for &(receiver, amt) in &outcome.shares {
            if amt > 0 {
                self.events.push(HubEvent::Split {
                    account,
                    receiver,
                    asset,
                    amt,
                });
            }
        }
        self.events.push(HubEvent::Collectable {
            account,
            asset,
            amt: outcome.collectable_amt,
        });
        Ok(outcome)
    }

    /// Credit `amt` pulled from `caller` straight to the splittable balance
    /// of `receiver`.
    pub fn give(
        &mut self,
        caller: &Address,
        account: AccountId,
        receiver: AccountId,
        asset: AssetId,
        amt: u128,
    ) -> Result<(), HubError> {
        self.authorize(caller, account)?;
        self.check_increase(asset, amt)?;
        self.splits.give(account, receiver, asset, amt)?;
        self.balances.entry(asset).or_default().splits += amt;
        self.events.push(HubEvent::Given {
            account,
            receiver,
            asset,
            amt,
        });
        self.vault.transfer_in(asset, caller, amt)?;
        Ok(())
    }

    /// Pay the collectable balance of `account` out to `transfer_to`.
    pub fn collect(
        &mut self,
        caller: &Address,
        account: AccountId,
        asset: AssetId,
        transfer_to: &Address,
    ) -> Result<u128, HubError> {
        self.authorize(caller, account)?;
        let amt = self.splits.collect(account, asset);
        let balance = self.balances.entry(asset).or_default();
        balance.splits = balance.splits.saturating_sub(amt);
        self.events.push(HubEvent::Collected {
            account,
            asset,
            amt,
        });
        if amt > 0 {
            self.vault.transfer_out(asset, transfer_to, amt)?;
        }
        Ok(amt)
    }

    // --- Metadata --------------------------------------------------------

    pub fn emit_account_metadata(
        &mut self,
        caller: &Address,
        account: AccountId,
        entries: &[AccountMetadata],
    ) -> Result<(), HubError> {
        self.authorize(caller, account)?;
        self.events
            .extend(entries.iter().map(|entry| HubEvent::AccountMetadataEmitted {
                account,
                key: entry.key.clone(),
                value: entry.value.clone(),
            }));
        Ok(())
    }
}

impl<V, K> ControllerLookup for DripHub<V, K> {
    /// The attested owner for controllers in attested mode, the controller's
    /// registered address otherwise.
    fn controller_of(&self, account: AccountId) -> Option<Address> {
        let controller = account.controller_id();
        match self.oracles.get(&controller) {
            Some(oracle) => oracle.owner_of(account),
            None => self.registry.controller_of(account),
        }
    }
}
