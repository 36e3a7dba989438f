//! Scenario files and the simulation that runs them.
//!
//! A scenario names its accounts, registers their controllers, and lists
//! steps that run against a [`DripHub`] with a manual clock. The simulation
//! plays the part of every controller: it remembers each sender's current
//! receivers, balance and history so steps never have to restate them.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use anyhow::{Context, Result, anyhow, bail};
use drip_core::traits::Clock;
use drip_core::types::{
    AccountId, Address, AssetId, ControllerId, Hash256, SplitsReceiver, StreamConfig,
    StreamReceiver, StreamsHistory,
};
use drip_hub::vault::MemoryVault;
use drip_hub::{AccountMetadata, AssetBalance, DripHub, HubConfig, HubEvent, ManualClock};
use drip_streams::CurrStreams;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

fn all_cycles() -> u32 {
    u32::MAX
}

#[derive(Deserialize, Debug, Clone)]
pub struct AccountSpec {
    /// Index into [`Scenario::controllers`].
    pub controller: u32,
    pub local: u128,
}

/// A stream receiver by account name.
#[derive(Deserialize, Debug, Clone)]
pub struct StreamTarget {
    pub to: String,
    pub amt_per_sec: u128,
    #[serde(default)]
    pub stream_id: u32,
    #[serde(default)]
    pub start: u32,
    #[serde(default)]
    pub duration: u32,
}

impl StreamTarget {
    fn config(&self) -> StreamConfig {
        StreamConfig::new(self.amt_per_sec)
            .with_stream_id(self.stream_id)
            .with_start(self.start)
            .with_duration(self.duration)
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct SplitTarget {
    pub to: String,
    pub weight: u32,
}

/// One scenario step, written as `{"<action>": {...}}`.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Advance {
        secs: u32,
    },
    SetStreams {
        account: String,
        asset: AssetId,
        #[serde(default)]
        balance_delta: i128,
        #[serde(default)]
        receivers: Vec<StreamTarget>,
        #[serde(default)]
        transfer_to: Option<Address>,
    },
    SetSplits {
        account: String,
        #[serde(default)]
        receivers: Vec<SplitTarget>,
    },
    Give {
        account: String,
        to: String,
        asset: AssetId,
        amt: u128,
    },
    Receive {
        account: String,
        asset: AssetId,
        #[serde(default = "all_cycles")]
        max_cycles: u32,
    },
    Squeeze {
        account: String,
        sender: String,
        asset: AssetId,
    },
    Split {
        account: String,
        asset: AssetId,
    },
    Collect {
        account: String,
        asset: AssetId,
        #[serde(default)]
        transfer_to: Option<Address>,
    },
    Metadata {
        account: String,
        key: String,
        value: String,
    },
}

impl Step {
    fn name(&self) -> &'static str {
        match self {
            Step::Advance { .. } => "advance",
            Step::SetStreams { .. } => "set_streams",
            Step::SetSplits { .. } => "set_splits",
            Step::Give { .. } => "give",
            Step::Receive { .. } => "receive",
            Step::Squeeze { .. } => "squeeze",
            Step::Split { .. } => "split",
            Step::Collect { .. } => "collect",
            Step::Metadata { .. } => "metadata",
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct Scenario {
    pub start_time: u32,
    /// Overrides the configured cycle length.
    #[serde(default)]
    pub cycle_secs: Option<u32>,
    pub controllers: Vec<Address>,
    pub accounts: BTreeMap<String, AccountSpec>,
    pub steps: Vec<Step>,
}

impl Scenario {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("parsing scenario")
    }
}

/// Balances of one account in one asset at the end of a run.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct AccountReport {
    pub name: String,
    pub account: AccountId,
    pub asset: AssetId,
    pub stream_balance: u128,
    pub splittable: u128,
    pub collectable: u128,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct AssetReport {
    pub asset: AssetId,
    pub balance: AssetBalance,
    pub custody: u128,
}

#[derive(Serialize, Debug, Clone)]
pub struct Report {
    pub final_time: u32,
    pub accounts: Vec<AccountReport>,
    pub assets: Vec<AssetReport>,
    pub events: Vec<HubEvent>,
}

/// Caller-side view of one sender's streams in one asset.
#[derive(Debug, Clone, Default)]
struct SenderView {
    receivers: Vec<StreamReceiver>,
    update_time: u32,
    balance: u128,
    history: Vec<StreamsHistory>,
}

impl SenderView {
    fn curr(&self) -> CurrStreams<'_> {
        CurrStreams {
            receivers: &self.receivers,
            update_time: self.update_time,
            balance: self.balance,
        }
    }
}

pub struct Simulation {
    hub: DripHub<MemoryVault, ManualClock>,
    clock: ManualClock,
    accounts: BTreeMap<String, AccountId>,
    senders: HashMap<(AccountId, AssetId), SenderView>,
    splits: HashMap<AccountId, Vec<SplitsReceiver>>,
    assets: BTreeSet<AssetId>,
    events: Vec<HubEvent>,
}

impl Simulation {
    pub fn new(scenario: &Scenario, mut hub_config: HubConfig) -> Result<Self> {
        if let Some(cycle_secs) = scenario.cycle_secs {
            hub_config.cycle_secs = cycle_secs;
        }
        let clock = ManualClock::new(scenario.start_time);
        let mut hub = DripHub::new(hub_config, MemoryVault::new(), clock.clone())?;
        for address in &scenario.controllers {
            hub.register_controller(*address);
        }
        let mut accounts = BTreeMap::new();
        for (name, entry) in &scenario.accounts {
            if entry.controller as usize >= scenario.controllers.len() {
                bail!(
                    "account {name} refers to unknown controller {}",
                    entry.controller
                );
            }
            let id = AccountId::new(ControllerId(entry.controller), entry.local);
            accounts.insert(name.clone(), id);
        }
        Ok(Self {
            hub,
            clock,
            accounts,
            senders: HashMap::new(),
            splits: HashMap::new(),
            assets: BTreeSet::new(),
            events: Vec::new(),
        })
    }

    pub fn hub(&self) -> &DripHub<MemoryVault, ManualClock> {
        &self.hub
    }

    pub fn account(&self, name: &str) -> Result<AccountId> {
        self.accounts
            .get(name)
            .copied()
            .ok_or_else(|| anyhow!("unknown account {name}"))
    }

    fn caller(&self, account: AccountId) -> Result<Address> {
        self.hub
            .controller_address(account.controller_id())
            .ok_or_else(|| anyhow!("account {account} has no controller"))
    }

    /// Run every step, stopping at the first failure.
    pub fn run(&mut self, steps: &[Step]) -> Result<()> {
        for (index, step) in steps.iter().enumerate() {
            self.apply(step)
                .with_context(|| format!("step {index} ({})", step.name()))?;
            self.events.extend(self.hub.drain_events());
        }
        Ok(())
    }

    fn apply(&mut self, step: &Step) -> Result<()> {
        debug!(step = step.name(), now = self.clock.now(), "sim: applying step");
        match step {
            Step::Advance { secs } => {
                self.clock.advance(*secs);
            }
            Step::SetStreams {
                account,
                asset,
                balance_delta,
                receivers,
                transfer_to,
            } => {
                let id = self.account(account)?;
                let caller = self.caller(id)?;
                let mut list = receivers
                    .iter()
                    .map(|t| Ok(StreamReceiver::new(self.account(&t.to)?, t.config())))
                    .collect::<Result<Vec<_>>>()?;
                list.sort();
                let view = self.senders.entry((id, *asset)).or_default();
                let outcome = self.hub.set_streams(
                    &caller,
                    id,
                    *asset,
                    &view.curr(),
                    *balance_delta,
                    &list,
                    &transfer_to.unwrap_or(caller),
                )?;
                view.history.push(StreamsHistory {
                    streams_hash: Hash256::ZERO,
                    receivers: list.clone(),
                    update_time: outcome.update_time,
                    max_end: outcome.max_end,
                });
                view.receivers = list;
                view.update_time = outcome.update_time;
                view.balance = outcome.balance;
                self.assets.insert(*asset);
            }
            Step::SetSplits { account, receivers } => {
                let id = self.account(account)?;
                let caller = self.caller(id)?;
                let mut list = receivers
                    .iter()
                    .map(|t| Ok(SplitsReceiver::new(self.account(&t.to)?, t.weight)))
                    .collect::<Result<Vec<_>>>()?;
                list.sort();
                self.hub.set_splits(&caller, id, &list)?;
                self.splits.insert(id, list);
            }
            Step::Give {
                account,
                to,
                asset,
                amt,
            } => {
                let id = self.account(account)?;
                let caller = self.caller(id)?;
                self.hub.give(&caller, id, self.account(to)?, *asset, *amt)?;
                self.assets.insert(*asset);
            }
            Step::Receive {
                account,
                asset,
                max_cycles,
            } => {
                let id = self.account(account)?;
                let amt = self.hub.receive_streams(id, *asset, *max_cycles)?;
                info!(account = %account, amt, "sim: received");
            }
            Step::Squeeze {
                account,
                sender,
                asset,
            } => {
                let id = self.account(account)?;
                let sender_id = self.account(sender)?;
                let history = self
                    .senders
                    .get(&(sender_id, *asset))
                    .map(|view| view.history.clone())
                    .unwrap_or_default();
                let amt = self
                    .hub
                    .squeeze_streams(id, *asset, sender_id, Hash256::ZERO, &history)?;
                info!(account = %account, sender = %sender, amt, "sim: squeezed");
            }
            Step::Split { account, asset } => {
                let id = self.account(account)?;
                let receivers = self.splits.get(&id).cloned().unwrap_or_default();
                self.hub.split(id, *asset, &receivers)?;
            }
            Step::Collect {
                account,
                asset,
                transfer_to,
            } => {
                let id = self.account(account)?;
                let caller = self.caller(id)?;
                let to = transfer_to.unwrap_or(caller);
                let amt = self.hub.collect(&caller, id, *asset, &to)?;
                info!(account = %account, amt, "sim: collected");
            }
            Step::Metadata { account, key, value } => {
                let id = self.account(account)?;
                let caller = self.caller(id)?;
                let entry = AccountMetadata::new(key.clone(), value.clone());
                self.hub.emit_account_metadata(&caller, id, &[entry])?;
            }
        }
        Ok(())
    }

    /// Balances of every account in every asset touched, plus the event log.
    pub fn report(&self) -> Result<Report> {
        let now = self.clock.now();
        let mut accounts = Vec::new();
        for asset in &self.assets {
            for (name, id) in &self.accounts {
                let stream_balance = match self.senders.get(&(*id, *asset)) {
                    Some(view) => self.hub.balance_at(*id, *asset, &view.curr(), now)?,
                    None => 0,
                };
                accounts.push(AccountReport {
                    name: name.clone(),
                    account: *id,
                    asset: *asset,
                    stream_balance,
                    splittable: self.hub.splittable(*id, *asset),
                    collectable: self.hub.collectable(*id, *asset),
                });
            }
        }
        let assets = self
            .assets
            .iter()
            .map(|asset| AssetReport {
                asset: *asset,
                balance: self.hub.asset_balance(*asset),
                custody: self.hub.vault().custody(*asset),
            })
            .collect();
        Ok(Report {
            final_time: now,
            accounts,
            assets,
            events: self.events.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ONE_HOUR: &str = include_str!("../scenarios/one_hour.json");

    fn run(json: &str) -> Result<Simulation> {
        let scenario = Scenario::from_json(json)?;
        let mut sim = Simulation::new(&scenario, HubConfig::default())?;
        sim.run(&scenario.steps)?;
        Ok(sim)
    }

    fn find<'a>(report: &'a Report, name: &str) -> &'a AccountReport {
        report.accounts.iter().find(|a| a.name == name).unwrap()
    }

    #[test]
    fn one_hour_scenario_delivers_everything() {
        let sim = run(ONE_HOUR).unwrap();
        let report = sim.report().unwrap();
        let bob = find(&report, "bob");
        let carol = find(&report, "carol");
        let alice = find(&report, "alice");
        assert_eq!(alice.stream_balance, 0);
        // Bob splits 25% to Carol and collected the rest.
        assert_eq!(bob.collectable, 0);
        assert_eq!(carol.splittable, 900);
        let bob_payee: Address = "0x00000000000000000000000000000000000000b0".parse().unwrap();
        assert_eq!(sim.hub().vault().paid_to(AssetId(1), &bob_payee), 2_700);
        let asset = &report.assets[0];
        assert_eq!(asset.custody, asset.balance.total());
    }

    #[test]
    fn unknown_account_fails_with_step_context() {
        let json = r#"{
            "start_time": 0,
            "controllers": ["0x0000000000000000000000000000000000000001"],
            "accounts": {"a": {"controller": 0, "local": 1}},
            "steps": [{"give": {"account": "a", "to": "nobody", "asset": 1, "amt": 5}}]
        }"#;
        let err = run(json).err().unwrap();
        let msg = format!("{err:#}");
        assert!(msg.contains("step 0 (give)"), "{msg}");
        assert!(msg.contains("unknown account nobody"), "{msg}");
    }

    #[test]
    fn account_with_unknown_controller_is_rejected() {
        let json = r#"{
            "start_time": 0,
            "controllers": [],
            "accounts": {"a": {"controller": 3, "local": 1}},
            "steps": []
        }"#;
        assert!(run(json).is_err());
    }

    #[test]
    fn receivers_are_sorted_for_the_caller() {
        let json = r#"{
            "start_time": 6000,
            "cycle_secs": 600,
            "controllers": ["0x0000000000000000000000000000000000000001"],
            "accounts": {
                "a": {"controller": 0, "local": 1},
                "b": {"controller": 0, "local": 2},
                "c": {"controller": 0, "local": 3}
            },
            "steps": [
                {"set_streams": {"account": "a", "asset": 1, "balance_delta": 100,
                 "receivers": [
                     {"to": "c", "amt_per_sec": 1000000000},
                     {"to": "b", "amt_per_sec": 1000000000}
                 ]}},
                {"advance": {"secs": 600}},
                {"receive": {"account": "b", "asset": 1}},
                {"receive": {"account": "c", "asset": 1}}
            ]
        }"#;
        let sim = run(json).unwrap();
        let report = sim.report().unwrap();
        assert_eq!(find(&report, "b").splittable, 50);
        assert_eq!(find(&report, "c").splittable, 50);
    }

    #[test]
    fn squeeze_step_uses_recorded_history() {
        let json = r#"{
            "start_time": 6000,
            "cycle_secs": 600,
            "controllers": ["0x0000000000000000000000000000000000000001"],
            "accounts": {
                "a": {"controller": 0, "local": 1},
                "b": {"controller": 0, "local": 2}
            },
            "steps": [
                {"set_streams": {"account": "a", "asset": 1, "balance_delta": 1000,
                 "receivers": [{"to": "b", "amt_per_sec": 1000000000}]}},
                {"advance": {"secs": 100}},
                {"set_streams": {"account": "a", "asset": 1,
                 "receivers": [{"to": "b", "amt_per_sec": 2000000000}]}},
                {"advance": {"secs": 50}},
                {"squeeze": {"account": "b", "sender": "a", "asset": 1}},
                {"advance": {"secs": 1200}},
                {"receive": {"account": "b", "asset": 1}}
            ]
        }"#;
        let sim = run(json).unwrap();
        let report = sim.report().unwrap();
        assert_eq!(find(&report, "b").splittable, 1_000);
        assert!(
            report
                .events
                .iter()
                .any(|e| matches!(e, HubEvent::StreamsSqueezed { amt: 200, .. }))
        );
    }
}
