//! Shared helpers for the integration tests.

use drip_core::types::{AccountId, Address, AssetId, Hash256, StreamReceiver, StreamsHistory};
use drip_hub::{DripHub, HubConfig, HubError, ManualClock, MemoryVault};
use drip_streams::{CurrStreams, SetStreamsOutcome};

/// Cycle length used by the tests.
pub const CYCLE: u32 = 600;
/// A cycle-aligned start time.
pub const T0: u32 = 1_800_000;
pub const ASSET: AssetId = AssetId(1);

pub type TestHub = DripHub<MemoryVault, ManualClock>;

/// A controller address from a seed byte.
pub fn addr(seed: u8) -> Address {
    Address::repeat(seed)
}

/// A hub with 600 s cycles and one controller per address, registered in order.
pub fn hub_with(controllers: &[Address]) -> (TestHub, ManualClock) {
    let clock = ManualClock::new(T0);
    let config = HubConfig::with_cycle_secs(CYCLE);
    let mut hub = DripHub::new(config, MemoryVault::new(), clock.clone()).expect("valid config");
    for address in controllers {
        hub.register_controller(*address);
    }
    (hub, clock)
}

/// The caller-side view of one sender, as a controller would keep it.
#[derive(Debug, Clone)]
pub struct Sender {
    pub account: AccountId,
    pub controller: Address,
    pub asset: AssetId,
    pub receivers: Vec<StreamReceiver>,
    pub update_time: u32,
    pub balance: u128,
    /// Every configuration since the first, for squeezing.
    pub history: Vec<StreamsHistory>,
}

impl Sender {
    pub fn new(account: AccountId, controller: Address, asset: AssetId) -> Self {
        Self {
            account,
            controller,
            asset,
            receivers: Vec::new(),
            update_time: 0,
            balance: 0,
            history: Vec::new(),
        }
    }

    pub fn curr(&self) -> CurrStreams<'_> {
        CurrStreams {
            receivers: &self.receivers,
            update_time: self.update_time,
            balance: self.balance,
        }
    }

    /// Reconfigure, sorting `receivers` first and recording the result.
    pub fn set(
        &mut self,
        hub: &mut TestHub,
        balance_delta: i128,
        mut receivers: Vec<StreamReceiver>,
    ) -> Result<SetStreamsOutcome, HubError> {
        receivers.sort();
        let out = hub.set_streams(
            &self.controller,
            self.account,
            self.asset,
            &self.curr(),
            balance_delta,
            &receivers,
            &self.controller,
        )?;
        self.history.push(StreamsHistory {
            streams_hash: Hash256::ZERO,
            receivers: receivers.clone(),
            update_time: out.update_time,
            max_end: out.max_end,
        });
        self.receivers = receivers;
        self.update_time = out.update_time;
        self.balance = out.balance;
        Ok(out)
    }

    /// Withdraw everything left.
    pub fn drain(&mut self, hub: &mut TestHub) -> Result<u128, HubError> {
        let left = hub.current_balance(self.account, self.asset, &self.curr())?;
        let receivers = self.receivers.clone();
        self.set(hub, -(left as i128), receivers)?;
        Ok(left)
    }

    /// Stream balance now.
    pub fn balance_now(&self, hub: &TestHub) -> u128 {
        hub.current_balance(self.account, self.asset, &self.curr())
            .expect("timestamp after the last update")
    }
}
