//! In-memory token vault.
//!
//! [`MemoryVault`] accepts every deposit and pays out of what it holds per
//! asset. It keeps a log of all transfers so tests and the simulator can
//! check exactly what moved.

use std::collections::HashMap;

use drip_core::error::VaultError;
use drip_core::traits::TokenVault;
use drip_core::types::{Address, AssetId};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    In,
    Out,
}

/// One recorded token movement.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    pub asset: AssetId,
    pub direction: Direction,
    pub address: Address,
    pub amt: u128,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryVault {
    custody: HashMap<AssetId, u128>,
    transfers: Vec<Transfer>,
}

impl MemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tokens of `asset` currently held.
    pub fn custody(&self, asset: AssetId) -> u128 {
        self.custody.get(&asset).copied().unwrap_or(0)
    }

    pub fn transfers(&self) -> &[Transfer] {
        &self.transfers
    }

    /// Total ever moved in `direction` for `asset`.
    pub fn total(&self, asset: AssetId, direction: Direction) -> u128 {
        self.transfers
            .iter()
            .filter(|t| t.asset == asset && t.direction == direction)
            .map(|t| t.amt)
            .sum()
    }

    /// Total paid out to `address` in `asset`.
    pub fn paid_to(&self, asset: AssetId, address: &Address) -> u128 {
        self.transfers
            .iter()
            .filter(|t| t.asset == asset && t.direction == Direction::Out && t.address == *address)
            .map(|t| t.amt)
            .sum()
    }
}

impl TokenVault for MemoryVault {
    fn transfer_in(&mut self, asset: AssetId, from: &Address, amt: u128) -> Result<(), VaultError> {
        let held = self.custody.entry(asset).or_default();
        *held = held
            .checked_add(amt)
            .ok_or_else(|| VaultError::Rejected(format!("custody of {asset} overflows")))?;
        self.transfers.push(Transfer {
            asset,
            direction: Direction::In,
            address: *from,
            amt,
        });
        Ok(())
    }

    fn transfer_out(&mut self, asset: AssetId, to: &Address, amt: u128) -> Result<(), VaultError> {
        let held = self.custody.entry(asset).or_default();
        if *held < amt {
            return Err(VaultError::InsufficientTokens {
                have: *held,
                need: amt,
            });
        }
        *held -= amt;
        self.transfers.push(Transfer {
            asset,
            direction: Direction::Out,
            address: *to,
            amt,
        });
        Ok(())
    }
}
