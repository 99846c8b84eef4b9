//! Sectioned faults.
//!
//! Every failure that leaves the router is a [`Fault`] with a stable
//! `(section, code)` pair. Sections name the component that raised it
//! (`K100` for the router, the handler id otherwise).

use serde_json::{json, Value};
use thiserror::Error;

/// Stable gateway fault codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultCode {
    /// No route for the path.
    NoRoute,
    /// Method does not match the route.
    Method,
    /// Route names a handler outside the registry.
    NoHandler,
    /// Body is missing a required contract field.
    Contract,
    /// Route names a contract the manifest does not declare.
    NoContract,
    /// Downstream failure.
    Upstream,
    /// No adapter is registered for the pack's ABI.
    NoAdapter,
    /// Adapter output is not exactly `{text, tokens_used, output_ref?}`.
    UnsealedOutput,
    /// Handler is deliberately stubbed.
    NotImpl,
    /// The post-collapse barrier is locked for this route.
    Barrier,
    /// Anything not otherwise classified.
    Unknown,
}

impl FaultCode {
    /// Wire code, e.g. `E_NO_ROUTE`.
    pub fn as_str(self) -> &'static str {
        match self {
            FaultCode::NoRoute => "E_NO_ROUTE",
            FaultCode::Method => "E_METHOD",
            FaultCode::NoHandler => "E_NO_HANDLER",
            FaultCode::Contract => "E_CONTRACT",
            FaultCode::NoContract => "E_NO_CONTRACT",
            FaultCode::Upstream => "E_UPSTREAM",
            FaultCode::NoAdapter => "E_NO_ADAPTER",
            FaultCode::UnsealedOutput => "E_UNSEALED_OUTPUT",
            FaultCode::NotImpl => "E_NOT_IMPL",
            FaultCode::Barrier => "E_BARRIER",
            FaultCode::Unknown => "E_UNKNOWN",
        }
    }

    /// Default response status.
    pub fn status(self) -> u16 {
        match self {
            FaultCode::NoRoute => 404,
            FaultCode::Method => 405,
            FaultCode::Contract => 400,
            FaultCode::Barrier => 423,
            FaultCode::Upstream | FaultCode::UnsealedOutput => 502,
            FaultCode::NoAdapter => 503,
            FaultCode::NoHandler
            | FaultCode::NoContract
            | FaultCode::NotImpl
            | FaultCode::Unknown => 500,
        }
    }
}

impl std::fmt::Display for FaultCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured gateway failure.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{section}:{code}: {message}")]
pub struct Fault {
    /// Raising component, e.g. `K100` or `K041`.
    pub section: String,
    /// Stable code.
    pub code: FaultCode,
    /// Human-readable message.
    pub message: String,
    /// Extra data, `null` when none.
    pub meta: Value,
    /// Response status.
    pub status: u16,
}

impl Fault {
    /// Creates a fault with the code's default status and no meta.
    pub fn new(section: impl Into<String>, code: FaultCode, message: impl Into<String>) -> Self {
        Self {
            section: section.into(),
            code,
            message: message.into(),
            meta: Value::Null,
            status: code.status(),
        }
    }

    /// Normalizes any other error to `E_UNKNOWN`.
    pub fn unknown(section: impl Into<String>, err: &dyn std::error::Error) -> Self {
        Self::new(section, FaultCode::Unknown, err.to_string())
    }

    /// Attaches metadata.
    pub fn with_meta(mut self, meta: Value) -> Self {
        self.meta = meta;
        self
    }

    /// `section:code`.
    pub fn label(&self) -> String {
        format!("{}:{}", self.section, self.code)
    }

    /// `{ok:false, fault, message, meta}`.
    pub fn body(&self) -> Value {
        json!({
            "ok": false,
            "fault": self.label(),
            "message": self.message,
            "meta": self.meta,
        })
    }
}
