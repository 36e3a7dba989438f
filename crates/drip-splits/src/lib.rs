//! # drip-splits — Weighted redistribution of received funds.
//!
//! Funds an account receives land in its *splittable* balance. Splitting
//! passes weighted shares on to the account's splits receivers and moves the
//! unallocated rest to its *collectable* balance, from which it is paid out.

pub mod engine;

pub use engine::{SplitOutcome, SplitsBalance, SplitsEngine};
