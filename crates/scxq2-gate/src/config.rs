//! Gateway configuration and the external server manifest.
//!
//! The manifest is server law: routes, contracts, and capability
//! descriptors are consumed as given and never mutated by the gateway.

use std::collections::BTreeMap;

use scxq2_canonical::{ContractId, HandlerId, ProofHash};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::contract::Contract;
use crate::errors::GatewayError;

/// Capability policy that keeps a route callable once the barrier is locked.
pub const SAFE_AFTER_COLLAPSE: &str = "safe_after_collapse";

/// Capability kinds a manifest may declare.
pub const CAP_KINDS: &[&str] = &["local_model", "addon_model", "vfs", "tool", "language", "service"];

/// Name of the manifest block that holds the server definition.
pub const SERVER_BLOCK: &str = "kuhul_server";

/// Where per-call frames are captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureMode {
    /// Only the gateway's active stream.
    #[default]
    Targeted,
    /// Every open stream, in creation order.
    Broadcast,
}

/// Runtime configuration for a [`crate::Gateway`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Session id that prefixes every stream id.
    pub session_id: String,
    /// Capture fan-out.
    pub capture_mode: CaptureMode,
    /// Fault section used by the router itself.
    pub section: String,
    /// Lock the barrier after every successful inference.
    pub lock_after_infer: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            session_id: "scxq2".to_string(),
            capture_mode: CaptureMode::Targeted,
            section: "K100".to_string(),
            lock_after_infer: false,
        }
    }
}

fn default_method() -> String {
    "POST".to_string()
}

/// One routing entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    /// Required method; `POST` when omitted.
    #[serde(default = "default_method")]
    pub method: String,
    /// Handler id, e.g. `K041`.
    pub handler: String,
    /// Capability id looked up in [`ServerManifest::caps`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cap: Option<String>,
    /// Contract id looked up in [`ServerManifest::contracts`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract: Option<String>,
}

/// Capability descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapDescriptor {
    /// Capability kind, one of [`CAP_KINDS`].
    pub kind: String,
    /// Optional policy, e.g. [`SAFE_AFTER_COLLAPSE`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy: Option<String>,
}

impl CapDescriptor {
    /// Whether the route stays callable once the barrier is locked.
    pub fn safe_after_collapse(&self) -> bool {
        self.policy.as_deref() == Some(SAFE_AFTER_COLLAPSE)
    }
}

/// Pinned proof hash under `policies.proof.pin`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProofPin {
    /// Expected pack hash, `h:` + 8 hex digits.
    pub hash: String,
}

/// Proof policy under `policies.proof`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProofPolicy {
    /// Optional pin.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pin: Option<ProofPin>,
}

/// The `policies` block: the proof pin plus allowlists and denies kept as given.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Policies {
    /// Proof policy.
    pub proof: ProofPolicy,
    /// Every other policy entry.
    #[serde(flatten)]
    pub other: BTreeMap<String, Value>,
}

impl Policies {
    /// Pinned pack hash, if one is declared.
    pub fn pin(&self) -> Option<&str> {
        self.proof.pin.as_ref().map(|pin| pin.hash.as_str())
    }

    /// Whether `expected` carries exactly the pinned hash.
    ///
    /// Without a pin nothing matches.
    pub fn pin_matches(&self, expected: Option<ProofHash>) -> bool {
        match (self.pin(), expected) {
            (Some(pin), Some(expected)) => pin == expected.to_string(),
            _ => false,
        }
    }
}

/// The `kuhul_server` block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerManifest {
    /// Path → routing entry.
    pub routes: BTreeMap<String, Route>,
    /// Contract id → field rules.
    pub contracts: BTreeMap<String, Value>,
    /// Capability id → descriptor.
    pub caps: BTreeMap<String, CapDescriptor>,
    /// Pins, allowlists, and denies.
    pub policies: Policies,
}

impl ServerManifest {
    /// Extracts and validates the `kuhul_server` block of a full manifest.
    pub fn from_manifest(manifest: &Value) -> Result<Self, GatewayError> {
        let block = manifest.get(SERVER_BLOCK).ok_or(GatewayError::NoServer)?;
        let server: ServerManifest = serde_json::from_value(block.clone())?;
        server.validate()?;
        Ok(server)
    }

    /// Load-time checks: handler and contract ids match their patterns,
    /// every contract descriptor parses, every cap kind is known, and a proof
    /// pin is a well-formed hash.
    pub fn validate(&self) -> Result<(), GatewayError> {
        for (path, route) in &self.routes {
            let invalid = |reason: String| GatewayError::InvalidRoute {
                path: path.clone(),
                reason,
            };
            if !path.starts_with('/') {
                return Err(invalid("path must start with '/'".to_string()));
            }
            if !HandlerId::is_valid(&route.handler) {
                return Err(invalid(format!("handler id '{}' is malformed", route.handler)));
            }
            if let Some(contract) = &route.contract {
                if !ContractId::is_valid(contract) {
                    return Err(invalid(format!("contract id '{}' is malformed", contract)));
                }
            }
        }
        for (id, descriptor) in &self.contracts {
            Contract::from_value(id, descriptor)?;
        }
        for (id, cap) in &self.caps {
            if !CAP_KINDS.contains(&cap.kind.as_str()) {
                return Err(GatewayError::InvalidCap {
                    id: id.clone(),
                    reason: format!("kind '{}' is not one of {}", cap.kind, CAP_KINDS.join(", ")),
                });
            }
        }
        if let Some(pin) = self.policies.pin() {
            ProofHash::parse(pin).map_err(|_| GatewayError::InvalidPolicy {
                field: "proof.pin.hash".to_string(),
                reason: format!("'{}' is not a proof hash", pin),
            })?;
        }
        Ok(())
    }

    /// Capability descriptor for a route, if it names one the manifest declares.
    pub fn cap_for(&self, route: &Route) -> Option<&CapDescriptor> {
        route.cap.as_ref().and_then(|cap| self.caps.get(cap))
    }
}
