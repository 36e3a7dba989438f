//! Controller registry.
//!
//! Controllers register once and receive sequential IDs starting at 0. The
//! registered address may hand the registration over to another address.

use drip_core::traits::ControllerLookup;
use drip_core::types::{AccountId, Address, ControllerId};

use crate::error::HubError;

#[derive(Debug, Clone, Default)]
pub struct ControllerRegistry {
    addresses: Vec<Address>,
}

impl ControllerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `address` as a new controller.
    pub fn register(&mut self, address: Address) -> ControllerId {
        let id = self.next_id();
        self.addresses.push(address);
        id
    }

    /// The ID the next registration will get.
    pub fn next_id(&self) -> ControllerId {
        ControllerId(self.addresses.len() as u32)
    }

    pub fn address(&self, id: ControllerId) -> Option<Address> {
        self.addresses.get(id.0 as usize).copied()
    }

    /// Move controller `id` to `new_address`. Only its current address may do so.
    ///
    /// Returns the previous address.
    pub fn update(
        &mut self,
        id: ControllerId,
        caller: &Address,
        new_address: Address,
    ) -> Result<Address, HubError> {
        let slot = self
            .addresses
            .get_mut(id.0 as usize)
            .ok_or(HubError::UnknownController(id))?;
        if slot != caller {
            return Err(HubError::InvalidCaller(*caller));
        }
        Ok(std::mem::replace(slot, new_address))
    }
}

impl ControllerLookup for ControllerRegistry {
    fn controller_of(&self, account: AccountId) -> Option<Address> {
        self.address(account.controller_id())
    }
}
