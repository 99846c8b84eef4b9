//! Canonical data primitives for SCXQ2 capture streams.
//!
//! Everything that participates in an identity hash lives in this crate:
//! the canonical serializer, the FNV-1a hash engine, and the locked proof
//! payloads whose hashes identify a pack or an inference call.
//!
//! Hash inputs are always the UTF-8 bytes of the canonical text.
//!
#![deny(missing_docs)]

/// Canonical text form for any acyclic data value.
pub mod canonicalizer;
/// FNV-1a hash engine and the `h:xxxxxxxx` proof hash type.
pub mod digest;
/// Validated identifiers shared by the capture and routing layers.
pub mod identifiers;
/// Locked proof payloads (pack and infer).
pub mod proof;
/// Validation helpers used by canonical types.
pub mod validation;
/// Value model accepted by the canonicalizer.
pub mod value;

pub use canonicalizer::{
    canonicalize, canonicalize_json, canonicalize_serialize, CanonicalizationError,
    CIRCULAR_MARKER, NON_FINITE_PLACEHOLDER,
};
pub use digest::{fnv1a32, hash_serialize, ProofHash, HASH_PREFIX};
pub use identifiers::{ContractId, HandlerId, SessionId};
pub use proof::{InferProofPayload, PackProofPayload};
pub use validation::ValidationError;
pub use value::CanonicalValue;
