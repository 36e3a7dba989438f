//! # drip-hub — The Drip ledger facade.
//!
//! [`DripHub`] owns every piece of ledger state and is the only entry point
//! for callers:
//! - **Authorization**: account IDs carry their controller in the top bits;
//!   mutating calls must come from that controller's registered address (or
//!   from the attested owner, for controllers in attested mode).
//! - **Balance caps**: per-asset totals never exceed `MAX_TOTAL_BALANCE`.
//! - **Vault wiring**: token movements are requested from a [`TokenVault`]
//!   after the ledger state is committed.
//! - **Events**: every state change is recorded as a [`HubEvent`].
//!
//! [`TokenVault`]: drip_core::traits::TokenVault

pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod hub;
pub mod ownership;
pub mod registry;
pub mod vault;

pub use clock::{ManualClock, SystemClock};
pub use config::HubConfig;
pub use error::HubError;
pub use events::{AccountMetadata, HubEvent};
pub use hub::{AssetBalance, DripHub};
pub use ownership::{OwnershipAttestation, OwnershipOracle};
pub use registry::ControllerRegistry;
pub use vault::MemoryVault;
