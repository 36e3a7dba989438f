//! # drip-core
//! Foundation types, cycle arithmetic and collaborator traits for the Drip ledger.

pub mod constants;
pub mod cycle;
pub mod error;
pub mod hashing;
pub mod traits;
pub mod types;
