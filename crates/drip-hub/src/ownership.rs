//! Attested account ownership.
//!
//! A controller can hand authorization for its accounts to an off-ledger
//! oracle. The oracle signs `(account, owner, timestamp)` attestations with
//! an Ed25519 key; anyone may submit them. An attestation only replaces an
//! older one for the same account.

use std::collections::HashMap;

use drip_core::error::OwnershipError;
use drip_core::types::{AccountId, Address};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};

const ATTESTATION_DOMAIN: &[u8] = b"drip.ownership.v1";

/// A signed statement that `owner` controls `account_id` as of `timestamp`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct OwnershipAttestation {
    pub account_id: AccountId,
    pub owner: Address,
    pub timestamp: u64,
    pub signature: Signature,
}

impl OwnershipAttestation {
    /// Bytes the oracle signs.
    pub fn message(account_id: AccountId, owner: &Address, timestamp: u64) -> Vec<u8> {
        let mut msg = Vec::with_capacity(ATTESTATION_DOMAIN.len() + 16 + 20 + 8);
        msg.extend_from_slice(ATTESTATION_DOMAIN);
        msg.extend_from_slice(&account_id.0.to_le_bytes());
        msg.extend_from_slice(&owner.0);
        msg.extend_from_slice(&timestamp.to_le_bytes());
        msg
    }

    /// Sign an attestation. Used by oracles and in tests.
    pub fn sign(key: &SigningKey, account_id: AccountId, owner: Address, timestamp: u64) -> Self {
        let signature = key.sign(&Self::message(account_id, &owner, timestamp));
        Self {
            account_id,
            owner,
            timestamp,
            signature,
        }
    }
}

/// Verifies attestations of one oracle and remembers the latest owner per account.
#[derive(Debug, Clone)]
pub struct OwnershipOracle {
    key: VerifyingKey,
    owners: HashMap<AccountId, (Address, u64)>,
}

impl OwnershipOracle {
    pub fn new(key: &[u8; 32]) -> Result<Self, OwnershipError> {
        let key =
            VerifyingKey::from_bytes(key).map_err(|_| OwnershipError::InvalidOracleKey)?;
        Ok(Self {
            key,
            owners: HashMap::new(),
        })
    }

    pub fn oracle_key(&self) -> [u8; 32] {
        self.key.to_bytes()
    }

    /// Check an attestation without applying it.
    pub fn verify(&self, attestation: &OwnershipAttestation) -> Result<(), OwnershipError> {
        let msg = OwnershipAttestation::message(
            attestation.account_id,
            &attestation.owner,
            attestation.timestamp,
        );
        self.key
            .verify(&msg, &attestation.signature)
            .map_err(|_| OwnershipError::InvalidSignature)?;
        if let Some(&(_, last)) = self.owners.get(&attestation.account_id) {
            if attestation.timestamp <= last {
                return Err(OwnershipError::PayloadObsolete {
                    timestamp: attestation.timestamp,
                    last,
                });
            }
        }
        Ok(())
    }

    /// Verify and record an attestation.
    pub fn apply(&mut self, attestation: &OwnershipAttestation) -> Result<(), OwnershipError> {
        self.verify(attestation)?;
        self.owners.insert(
            attestation.account_id,
            (attestation.owner, attestation.timestamp),
        );
        Ok(())
    }

    pub fn owner_of(&self, account: AccountId) -> Option<Address> {
        self.owners.get(&account).map(|(owner, _)| *owner)
    }
}
