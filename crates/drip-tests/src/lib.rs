//! End-to-end and adversarial test suite for the Drip ledger.
//!
//! The tests drive a full [`drip_hub::DripHub`] over an in-memory vault and
//! a manual clock, checking that funds are conserved and that no caller can
//! move tokens it does not control.

pub mod helpers;
