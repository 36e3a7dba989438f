//! Interfaces to the ledger's external collaborators.
//!
//! - [`TokenVault`] — moves real tokens in and out (implemented by the host)
//! - [`ControllerLookup`] — maps an account to the caller allowed to mutate it
//! - [`Clock`] — current time in Unix seconds

use crate::error::VaultError;
use crate::types::{AccountId, Address, AssetId};

/// Token movement.
///
/// The ledger calls these exactly once per externally visible balance change
/// and only after its own state is consistent. A failed transfer is reported
/// to the caller; rolling back the whole operation is the host's job.
pub trait TokenVault {
    /// Pull `amt` of `asset` from `from` into the ledger's custody.
    fn transfer_in(&mut self, asset: AssetId, from: &Address, amt: u128) -> Result<(), VaultError>;

    /// Pay `amt` of `asset` out of the ledger's custody to `to`.
    fn transfer_out(&mut self, asset: AssetId, to: &Address, amt: u128) -> Result<(), VaultError>;
}

/// Resolves who may act for an account.
pub trait ControllerLookup {
    /// The address authorized to mutate `account`, if its controller is registered.
    fn controller_of(&self, account: AccountId) -> Option<Address>;

    /// Whether `caller` may mutate `account`.
    ///
    /// Default implementation compares against [`controller_of`](Self::controller_of).
    fn is_authorized(&self, caller: &Address, account: AccountId) -> bool {
        self.controller_of(account).as_ref() == Some(caller)
    }
}

/// Source of the current timestamp.
pub trait Clock {
    /// Current Unix time in seconds.
    fn now(&self) -> u32;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ControllerId;
    use std::collections::HashMap;

    struct MapLookup(HashMap<ControllerId, Address>);

    impl ControllerLookup for MapLookup {
        fn controller_of(&self, account: AccountId) -> Option<Address> {
            self.0.get(&account.controller_id()).copied()
        }
    }

    #[test]
    fn default_authorization_matches_controller_address() {
        let lookup = MapLookup(HashMap::from([(ControllerId(3), Address::repeat(3))]));
        let account = AccountId::new(ControllerId(3), 1);
        assert!(lookup.is_authorized(&Address::repeat(3), account));
        assert!(!lookup.is_authorized(&Address::repeat(4), account));
    }

    #[test]
    fn unregistered_controller_authorizes_nobody() {
        let lookup = MapLookup(HashMap::new());
        let account = AccountId::new(ControllerId(9), 1);
        assert!(!lookup.is_authorized(&Address::default(), account));
    }
}
