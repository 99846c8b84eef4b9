use scxq2_canonical::ValidationError;
use scxq2_core::CoreError;
use scxq2_journal::JournalError;
use thiserror::Error;

/// Errors raised while building or configuring a gateway.
///
/// Per-call failures never use this type; they become a [`crate::Fault`].
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Manifest has no `kuhul_server` block.
    #[error("manifest missing kuhul_server")]
    NoServer,

    /// A routing entry failed load-time validation.
    #[error("invalid route {path}: {reason}")]
    InvalidRoute {
        /// Route path.
        path: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A contract descriptor is not an object of field rules.
    #[error("invalid contract {id}: {reason}")]
    InvalidContract {
        /// Contract id.
        id: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A capability descriptor has an unknown kind.
    #[error("invalid cap {id}: {reason}")]
    InvalidCap {
        /// Capability id.
        id: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A policy entry is malformed.
    #[error("invalid policy {field}: {reason}")]
    InvalidPolicy {
        /// Dotted path under `policies`.
        field: String,
        /// What is wrong with it.
        reason: String,
    },

    /// Session id does not match the identifier pattern.
    #[error("invalid session id: {0}")]
    InvalidSession(#[from] ValidationError),

    /// Capture service failure.
    #[error("capture error: {0}")]
    Core(#[from] CoreError),

    /// Frame serialization failure.
    #[error("journal error: {0}")]
    Journal(#[from] JournalError),

    /// JSON (de)serialization failure.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
