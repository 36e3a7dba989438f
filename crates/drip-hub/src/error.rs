//! Facade errors.
use drip_core::error::{OwnershipError, SplitsError, StreamsError, VaultError};
use drip_core::types::{Address, AssetId, ControllerId};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HubError {
    #[error("caller {0} is not authorized")]
    InvalidCaller(Address),
    #[error("total balance of {0} would exceed the maximum")]
    TotalBalanceTooHigh(AssetId),
    #[error("unknown controller {0}")]
    UnknownController(ControllerId),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Streams(#[from] StreamsError),
    #[error(transparent)]
    Splits(#[from] SplitsError),
    #[error(transparent)]
    Vault(#[from] VaultError),
    #[error(transparent)]
    Ownership(#[from] OwnershipError),
}
