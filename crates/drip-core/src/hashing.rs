//! BLAKE3 content commitments for configurations.
//!
//! Each commitment is domain separated and hashes a fixed-width
//! little-endian encoding of its fields, in list order:
//! - Streams list: `"drip.streams" || n || (account || stream_id ||
//!   amt_per_sec || start || duration)*`
//! - Streams config: `"drip.streams-config" || streams_hash ||
//!   update_time || balance`
//! - History link: `"drip.streams-history" || prev || streams_hash ||
//!   update_time || max_end`
//! - Splits list: `"drip.splits" || n || (account || weight)*`
//!
//! Empty configurations commit to [`Hash256::ZERO`], so an account that was
//! never configured passes the same checks as one reset to empty.

use crate::types::{Hash256, SplitsReceiver, StreamReceiver};

const STREAMS_DOMAIN: &[u8] = b"drip.streams";
const STREAMS_CONFIG_DOMAIN: &[u8] = b"drip.streams-config";
const STREAMS_HISTORY_DOMAIN: &[u8] = b"drip.streams-history";
const SPLITS_DOMAIN: &[u8] = b"drip.splits";

fn hasher(domain: &[u8]) -> blake3::Hasher {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&(domain.len() as u32).to_le_bytes());
    hasher.update(domain);
    hasher
}

/// Commitment to a stream receiver list. Zero for an empty list.
pub fn hash_streams(receivers: &[StreamReceiver]) -> Hash256 {
    if receivers.is_empty() {
        return Hash256::ZERO;
    }
    let mut hasher = hasher(STREAMS_DOMAIN);
    hasher.update(&(receivers.len() as u64).to_le_bytes());
    for receiver in receivers {
        hasher.update(&receiver.account_id.0.to_le_bytes());
        hasher.update(&receiver.config.stream_id.to_le_bytes());
        hasher.update(&receiver.config.amt_per_sec.to_le_bytes());
        hasher.update(&receiver.config.start.to_le_bytes());
        hasher.update(&receiver.config.duration.to_le_bytes());
    }
    Hash256(hasher.finalize().into())
}

/// Commitment to a full streams configuration: receivers, last update time
/// and balance at that time.
///
/// Zero when there are no receivers and no balance, whatever the update time:
/// such a configuration streams nothing and holds nothing.
pub fn hash_streams_config(
    receivers: &[StreamReceiver],
    update_time: u32,
    balance: u128,
) -> Hash256 {
    if receivers.is_empty() && balance == 0 {
        return Hash256::ZERO;
    }
    let mut hasher = hasher(STREAMS_CONFIG_DOMAIN);
    hasher.update(hash_streams(receivers).as_bytes());
    hasher.update(&update_time.to_le_bytes());
    hasher.update(&balance.to_le_bytes());
    Hash256(hasher.finalize().into())
}

/// Extend a streams history hash chain with one configuration.
pub fn hash_streams_history(
    prev: &Hash256,
    streams_hash: &Hash256,
    update_time: u32,
    max_end: u32,
) -> Hash256 {
    let mut hasher = hasher(STREAMS_HISTORY_DOMAIN);
    hasher.update(prev.as_bytes());
    hasher.update(streams_hash.as_bytes());
    hasher.update(&update_time.to_le_bytes());
    hasher.update(&max_end.to_le_bytes());
    Hash256(hasher.finalize().into())
}

/// Commitment to a splits receiver list. Zero for an empty list.
pub fn hash_splits(receivers: &[SplitsReceiver]) -> Hash256 {
    if receivers.is_empty() {
        return Hash256::ZERO;
    }
    let mut hasher = hasher(SPLITS_DOMAIN);
    hasher.update(&(receivers.len() as u64).to_le_bytes());
    for receiver in receivers {
        hasher.update(&receiver.account_id.0.to_le_bytes());
        hasher.update(&receiver.weight.to_le_bytes());
    }
    Hash256(hasher.finalize().into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AccountId, StreamConfig};

    fn receiver(account: u128, units: u128) -> StreamReceiver {
        StreamReceiver::new(AccountId(account), StreamConfig::per_sec(units))
    }

    #[test]
    fn empty_lists_hash_to_zero() {
        assert_eq!(hash_streams(&[]), Hash256::ZERO);
        assert_eq!(hash_splits(&[]), Hash256::ZERO);
        assert_eq!(hash_streams_config(&[], 0, 0), Hash256::ZERO);
        assert_eq!(hash_streams_config(&[], 1_000, 0), Hash256::ZERO);
    }

    #[test]
    fn balance_alone_is_committed() {
        assert_ne!(hash_streams_config(&[], 0, 1), Hash256::ZERO);
        assert_ne!(hash_streams_config(&[], 0, 1), hash_streams_config(&[], 0, 2));
    }

    #[test]
    fn streams_hash_is_order_sensitive() {
        let a = receiver(1, 1);
        let b = receiver(2, 1);
        assert_ne!(hash_streams(&[a, b]), hash_streams(&[b, a]));
    }

    #[test]
    fn config_hash_commits_to_update_time() {
        let list = [receiver(1, 1)];
        assert_ne!(
            hash_streams_config(&list, 10, 5),
            hash_streams_config(&list, 11, 5)
        );
    }

    #[test]
    fn domains_are_separated() {
        // One-entry splits and streams lists for the same account differ.
        let streams = hash_streams(&[receiver(1, 0)]);
        let splits = hash_splits(&[SplitsReceiver::new(AccountId(1), 0)]);
        assert_ne!(streams, splits);
    }

    #[test]
    fn history_chain_depends_on_every_link() {
        let h1 = hash_streams_history(&Hash256::ZERO, &Hash256::ZERO, 1, 2);
        let h2 = hash_streams_history(&h1, &Hash256::ZERO, 3, 4);
        let h2_alt = hash_streams_history(&Hash256::ZERO, &Hash256::ZERO, 3, 4);
        assert_ne!(h2, h2_alt);
        assert!(!h1.is_zero());
    }
}
