//! Ledger events.
//!
//! The hub appends one [`HubEvent`] per observable state change, in order.
//! Hosts drain them with [`DripHub::drain_events`](crate::DripHub::drain_events).

use drip_core::types::{AccountId, Address, AssetId, ControllerId, Hash256, StreamReceiver};
use serde::{Deserialize, Serialize};

/// One key/value pair of account metadata.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AccountMetadata {
    pub key: String,
    pub value: String,
}

impl AccountMetadata {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Serialized externally tagged, `{"collected": {...}}`, so 128-bit fields
/// read back without buffering.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HubEvent {
    ControllerRegistered {
        controller: ControllerId,
        address: Address,
    },
    ControllerAddressUpdated {
        controller: ControllerId,
        old: Address,
        new: Address,
    },
    AttestedOwnershipEnabled {
        controller: ControllerId,
    },
    OwnerUpdated {
        account: AccountId,
        owner: Address,
    },
    StreamsSet {
        account: AccountId,
        asset: AssetId,
        receivers: Vec<StreamReceiver>,
        history_hash: Hash256,
        balance: u128,
        max_end: u32,
        real_balance_delta: i128,
    },
    StreamsReceived {
        account: AccountId,
        asset: AssetId,
        amt: u128,
        remaining_cycles: u32,
    },
    StreamsSqueezed {
        account: AccountId,
        asset: AssetId,
        sender: AccountId,
        amt: u128,
        history_hashes: Vec<Hash256>,
    },
    SplitsSet {
        account: AccountId,
        splits_hash: Hash256,
    },
    Split {
        account: AccountId,
        receiver: AccountId,
        asset: AssetId,
        amt: u128,
    },
    Collectable {
        account: AccountId,
        asset: AssetId,
        amt: u128,
    },
    Given {
        account: AccountId,
        receiver: AccountId,
        asset: AssetId,
        amt: u128,
    },
    Collected {
        account: AccountId,
        asset: AssetId,
        amt: u128,
    },
    AccountMetadataEmitted {
        account: AccountId,
        key: String,
        value: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_under_their_name() {
        let event = HubEvent::Collected {
            account: AccountId(5),
            asset: AssetId(1),
            amt: 10,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["collected"]["amt"], 10);
        assert_eq!(json["collected"]["account"], 5);
    }

    #[test]
    fn events_with_wide_amounts_read_back() {
        let wide = u64::MAX as u128 + 1;
        let events = [
            HubEvent::StreamsReceived {
                account: AccountId(wide),
                asset: AssetId(1),
                amt: wide,
                remaining_cycles: 3,
            },
            HubEvent::StreamsSet {
                account: AccountId(1),
                asset: AssetId(2),
                receivers: Vec::new(),
                history_hash: Hash256::ZERO,
                balance: wide,
                max_end: u32::MAX,
                real_balance_delta: -(wide as i128),
            },
            HubEvent::Collected {
                account: AccountId(1),
                asset: AssetId(1),
                amt: 5,
            },
        ];
        for event in events {
            let json = serde_json::to_string(&event).unwrap();
            let back: HubEvent = serde_json::from_str(&json).unwrap();
            assert_eq!(back, event);
        }
    }
}
