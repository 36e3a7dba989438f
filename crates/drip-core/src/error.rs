//! Error types for the Drip ledger.
use thiserror::Error;

/// Why a receiver list was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReceiverListError {
    #[error("too many receivers: {len} > {max}")]
    TooMany { len: usize, max: usize },
    #[error("receivers not sorted or duplicated at index {0}")]
    NotSorted(usize),
    #[error("amt_per_sec {amt_per_sec} below minimum {min} at index {index}")]
    RateTooLow {
        index: usize,
        amt_per_sec: u128,
        min: u128,
    },
    #[error("amt_per_sec {amt_per_sec} above maximum at index {index}")]
    RateTooHigh { index: usize, amt_per_sec: u128 },
    #[error("zero weight at index {0}")]
    ZeroWeight(usize),
    #[error("weights sum to {total}, more than {max}")]
    WeightsTooHigh { total: u64, max: u32 },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamsError {
    #[error("current streams configuration does not match the stored one")]
    InvalidCurrentConfig,
    #[error("invalid stream receivers: {0}")]
    ReceiverListInvalid(ReceiverListError),
    #[error("insufficient balance: have {have}, need {need}")]
    InsufficientBalance { have: u128, need: u128 },
    #[error("invalid streams history: {0}")]
    InvalidStreamsHistory(String),
    #[error("timestamp {timestamp} before last update {update_time}")]
    TimestampBeforeUpdate { timestamp: u32, update_time: u32 },
    #[error("arithmetic overflow")]
    ArithmeticOverflow,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SplitsError {
    #[error("current splits receivers do not match the stored ones")]
    InvalidCurrentConfig,
    #[error("invalid splits receivers: {0}")]
    ReceiverListInvalid(ReceiverListError),
    #[error("arithmetic overflow")]
    ArithmeticOverflow,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VaultError {
    #[error("insufficient tokens: have {have}, need {need}")]
    InsufficientTokens { have: u128, need: u128 },
    #[error("transfer rejected: {0}")]
    Rejected(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OwnershipError {
    #[error("payload obsolete: timestamp {timestamp} not after {last}")]
    PayloadObsolete { timestamp: u64, last: u64 },
    #[error("invalid signature")]
    InvalidSignature,
    #[error("invalid oracle key")]
    InvalidOracleKey,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn receiver_list_error_nests_in_streams_error() {
        let err = StreamsError::ReceiverListInvalid(ReceiverListError::NotSorted(3));
        assert_eq!(
            err.to_string(),
            "invalid stream receivers: receivers not sorted or duplicated at index 3"
        );
    }

    #[test]
    fn insufficient_balance_reports_amounts() {
        let err = StreamsError::InsufficientBalance { have: 5, need: 9 };
        assert_eq!(err.to_string(), "insufficient balance: have 5, need 9");
    }
}
