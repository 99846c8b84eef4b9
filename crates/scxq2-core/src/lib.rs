//! Proof chain, capture, and replay verification for SCXQ2 streams.
//!
//! This crate provides:
//! - The linear proof chain `link(prev, payload)` and its verifier
//! - An in-process capture service with deterministic stream ids
//! - Offline replay verification of an exported frame list
//!
//! Core invariants:
//! - Frames are immutable once appended; streams are append-only
//! - Every appended frame stores its chain link in `ch`
//! - Stream ids are `{session_id}:{counter}`; nothing is random
//! - Verification reads only the frames it is given
//!
#![deny(missing_docs)]

/// In-process capture service.
pub mod capture;
/// Linear proof chain.
pub mod chain;
/// Error types for core operations.
pub mod errors;
/// Replay verification.
pub mod verification;

pub use capture::{CaptureService, StreamHandle, StreamSnapshot};
pub use chain::{link, link_value, verify_chain, verify_chain_json, ChainMismatch};
pub use errors::CoreError;
pub use verification::{verify, verify_json, CallIdentity, FaultCode, Verdict};
