//! Contract-gated router for SCXQ2 sealed compute.
//!
//! A [`Gateway`] resolves each [`Request`] against a server manifest,
//! shallow-validates the body against the route's contract, runs a handler
//! from the fixed registry, and brackets the call with capture frames.
//! Every failure leaves as a sectioned [`Fault`] response.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use scxq2_gate::{AdapterRegistry, EchoAdapter, Gateway, GatewayConfig, Request, ServerManifest};
//! use serde_json::json;
//!
//! let server = ServerManifest::from_manifest(&json!({
//!     "kuhul_server": {"routes": {"/api/ggl/health": {"method": "GET", "handler": "K040"}}}
//! }))?;
//! let mut adapters = AdapterRegistry::new();
//! adapters.register(Arc::new(EchoAdapter::default()));
//! let gateway = Gateway::new(GatewayConfig::default(), server, adapters)?;
//!
//! let response = gateway.dispatch(&Request::new("GET", "/api/ggl/health", json!(null)));
//! assert_eq!(response.status, 200);
//! assert_eq!(response.body["provider"], "ggl");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
#![deny(missing_docs)]

/// Sealed execution adapters and the sealed output check.
pub mod adapter;
/// Gateway configuration and server manifest.
pub mod config;
/// Request, response, and per-call context.
pub mod context;
/// Shallow contract validation.
pub mod contract;
/// Error types for gateway construction.
pub mod errors;
/// Sectioned faults.
pub mod fault;
/// Fixed handler registry.
pub mod handlers;
/// The router.
pub mod router;

pub use adapter::{Adapter, AdapterRegistry, EchoAdapter, SealedOutput, DEFAULT_ABI_ID};
pub use config::{
    CapDescriptor, CaptureMode, GatewayConfig, Policies, ProofPin, ProofPolicy, Route, ServerManifest,
    CAP_KINDS, SAFE_AFTER_COLLAPSE,
};
pub use context::{CallContext, Request, Response};
pub use contract::{Contract, ContractViolation, FieldRule};
pub use errors::GatewayError;
pub use fault::{Fault, FaultCode};
pub use handlers::{handler_ids, Handler, DEFAULT_INFER_CONTRACT, INFER_HANDLER};
pub use router::{Barrier, Gateway};
