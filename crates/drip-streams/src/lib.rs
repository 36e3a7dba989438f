//! # drip-streams — Continuous streams between accounts.
//!
//! Senders fund a balance and stream it at fixed per-second rates to up to
//! `MAX_STREAMS_RECEIVERS` receivers. Receipt is settled per cycle:
//! - **Delta ledger**: each receiver keeps sparse per-cycle rate changes, so
//!   a configuration change costs two bucket updates per receiver.
//! - **Max end**: the time the balance runs out is solved once per change
//!   with a sweep over stream start times.
//! - **Squeeze**: the running, unfinalized cycle can be received early from
//!   one sender by replaying that sender's configuration history.

pub mod deltas;
pub mod engine;
pub mod max_end;

pub use deltas::{AmtDelta, AmtDeltaLedger, FlushResult};
pub use engine::{
    CurrStreams, ReceiveResult, SetStreamsOutcome, SqueezeOutcome, StreamsEngine, StreamsSnapshot,
};
pub use max_end::calc_max_end;
