#![forbid(unsafe_code)]

//! Quarter Engine Runtime
//!
//! Wraps the `ceo_engine` kernel with persistence: a protobuf choice log,
//! replay, snapshots, sessions and drift reports.
//!
//! No game rules live here. Every transition and invariant is delegated
//! to the kernel.

pub mod error;
pub mod proto_types;
pub mod proto_bridge;
pub mod choice_log;
pub mod replay;
pub mod snapshot;
pub mod snapshot_codec;
pub mod session;
pub mod drift;

pub use error::{RuntimeError, SnapshotError};
