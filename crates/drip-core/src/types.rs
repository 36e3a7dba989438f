//! Core ledger types: identifiers, stream and splits receivers, history entries.
//!
//! Amounts are `u128` in the asset's smallest unit. Rates (`amt_per_sec`) are
//! fixed point with [`AMT_PER_SEC_MULTIPLIER`](crate::constants::AMT_PER_SEC_MULTIPLIER)
//! as the denominator. Timestamps are Unix seconds in a `u32`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::constants::{AMT_PER_SEC_MULTIPLIER, CONTROLLER_ID_OFFSET};

/// A 32-byte hash value.
///
/// Used for receiver list commitments, configuration hashes and history
/// hash chains.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    /// The zero hash. Commitment of an empty configuration.
    pub const ZERO: Self = Self([0u8; 32]);

    /// Return the underlying bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Check if this is the zero hash.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl From<[u8; 32]> for Hash256 {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

/// Identifier of a registered controller: the party allowed to act on behalf
/// of every account ID carrying it in its high bits.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[serde(transparent)]
pub struct ControllerId(pub u32);

impl fmt::Display for ControllerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A ledger account.
///
/// The top 32 bits are the [`ControllerId`], the low 96 bits are chosen by
/// that controller.
///
/// # Examples
///
/// ```
/// use drip_core::types::{AccountId, ControllerId};
/// let id = AccountId::new(ControllerId(7), 42);
/// assert_eq!(id.controller_id(), ControllerId(7));
/// assert_eq!(id.local_id(), 42);
/// ```
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[serde(transparent)]
pub struct AccountId(pub u128);

impl AccountId {
    const LOCAL_MASK: u128 = (1u128 << CONTROLLER_ID_OFFSET) - 1;

    /// Build an account ID from a controller and a controller-local ID.
    /// Bits of `local` above the low 96 are dropped.
    pub fn new(controller: ControllerId, local: u128) -> Self {
        Self(((controller.0 as u128) << CONTROLLER_ID_OFFSET) | (local & Self::LOCAL_MASK))
    }

    /// The controller allowed to mutate this account.
    pub fn controller_id(&self) -> ControllerId {
        ControllerId((self.0 >> CONTROLLER_ID_OFFSET) as u32)
    }

    /// The controller-local part of the ID.
    pub fn local_id(&self) -> u128 {
        self.0 & Self::LOCAL_MASK
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.controller_id(), self.local_id())
    }
}

/// Opaque identifier of a streamed asset (a token).
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[serde(transparent)]
pub struct AssetId(pub u64);

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "asset#{}", self.0)
    }
}

/// A 20-byte caller identity, serialized as `0x`-prefixed hex.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address(pub [u8; 20]);

impl Address {
    /// Address with every byte set to `byte`. Handy for fixtures.
    pub fn repeat(byte: u8) -> Self {
        Self([byte; 20])
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 20];
        hex::decode_to_slice(s.trim_start_matches("0x"), &mut bytes)?;
        Ok(Self(bytes))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Parameters of one stream.
///
/// Field order is the ordering key: configs compare by `stream_id`, then
/// `amt_per_sec`, then `start`, then `duration`.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct StreamConfig {
    /// Free-form discriminator, lets a sender run identical streams side by side.
    #[serde(default)]
    pub stream_id: u32,
    /// Rate with [`AMT_PER_SEC_MULTIPLIER`] as the denominator.
    pub amt_per_sec: u128,
    /// Start timestamp. `0` means "when the configuration is set".
    #[serde(default)]
    pub start: u32,
    /// Duration in seconds. `0` means "until the balance runs out".
    #[serde(default)]
    pub duration: u32,
}

impl StreamConfig {
    /// A stream that starts immediately and runs until the balance is gone.
    pub fn new(amt_per_sec: u128) -> Self {
        Self {
            stream_id: 0,
            amt_per_sec,
            start: 0,
            duration: 0,
        }
    }

    /// A stream of whole token units per second.
    pub fn per_sec(units: u128) -> Self {
        Self::new(units * AMT_PER_SEC_MULTIPLIER)
    }

    pub fn with_stream_id(mut self, stream_id: u32) -> Self {
        self.stream_id = stream_id;
        self
    }

    pub fn with_start(mut self, start: u32) -> Self {
        self.start = start;
        self
    }

    pub fn with_duration(mut self, duration: u32) -> Self {
        self.duration = duration;
        self
    }
}

/// A receiver of a stream.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamReceiver {
    pub account_id: AccountId,
    pub config: StreamConfig,
}

impl StreamReceiver {
    pub fn new(account_id: AccountId, config: StreamConfig) -> Self {
        Self { account_id, config }
    }
}

/// A receiver of splits and the share of the splittable amount it gets,
/// out of [`TOTAL_SPLITS_WEIGHT`](crate::constants::TOTAL_SPLITS_WEIGHT).
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SplitsReceiver {
    pub account_id: AccountId,
    pub weight: u32,
}

impl SplitsReceiver {
    pub fn new(account_id: AccountId, weight: u32) -> Self {
        Self { account_id, weight }
    }
}

/// One past configuration of a sender, as supplied to a squeeze.
///
/// Either `receivers` is non-empty and `streams_hash` is zero, or
/// `receivers` is empty and `streams_hash` stands in for the list. The
/// second form lets callers skip configurations that never streamed to
/// the squeezing account.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
pub struct StreamsHistory {
    #[serde(default)]
    pub streams_hash: Hash256,
    #[serde(default)]
    pub receivers: Vec<StreamReceiver>,
    pub update_time: u32,
    pub max_end: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_id_round_trips_parts() {
        let id = AccountId::new(ControllerId(u32::MAX), u128::MAX);
        assert_eq!(id.controller_id(), ControllerId(u32::MAX));
        assert_eq!(id.local_id(), (1u128 << 96) - 1);
    }

    #[test]
    fn account_ids_order_by_controller_first() {
        let a = AccountId::new(ControllerId(1), 999);
        let b = AccountId::new(ControllerId(2), 0);
        assert!(a < b);
    }

    #[test]
    fn address_hex_round_trip() {
        let addr = Address::repeat(0xAB);
        let s = addr.to_string();
        assert!(s.starts_with("0xabab"));
        assert_eq!(s.parse::<Address>().unwrap(), addr);
    }

    #[test]
    fn address_rejects_short_hex() {
        assert!("0x1234".parse::<Address>().is_err());
    }

    #[test]
    fn address_serde_is_hex_string() {
        let json = serde_json::to_string(&Address::repeat(1)).unwrap();
        assert_eq!(json, format!("\"0x{}\"", "01".repeat(20)));
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Address::repeat(1));
    }

    #[test]
    fn stream_config_orders_by_fields_in_declaration_order() {
        let a = StreamConfig::new(5).with_stream_id(1);
        let b = StreamConfig::new(1).with_stream_id(2);
        assert!(a < b, "stream_id is the leading key");
        let c = StreamConfig::new(5).with_start(10);
        let d = StreamConfig::new(5).with_start(11);
        assert!(c < d);
    }

    #[test]
    fn stream_receivers_order_by_account_then_config() {
        let low = StreamReceiver::new(AccountId(1), StreamConfig::per_sec(100));
        let high = StreamReceiver::new(AccountId(2), StreamConfig::per_sec(1));
        assert!(low < high);
    }

    #[test]
    fn stream_config_json_defaults() {
        let cfg: StreamConfig = serde_json::from_str(r#"{"amt_per_sec": 1000000000}"#).unwrap();
        assert_eq!(cfg, StreamConfig::per_sec(1));
    }

    #[test]
    fn hash_display_is_hex() {
        assert_eq!(Hash256::ZERO.to_string(), "0".repeat(64));
        assert!(Hash256::ZERO.is_zero());
    }
}
