//! Sealed execution adapters.
//!
//! An adapter is a black box keyed by ABI id. It receives the pack proof
//! payload and a pure input object and must return exactly
//! `{text, tokens_used, output_ref?}`; anything else is rejected before a
//! hash is taken.

use std::collections::BTreeMap;
use std::sync::Arc;

use scxq2_canonical::PackProofPayload;
use serde_json::{json, Value};

use crate::fault::{Fault, FaultCode};

/// Default ABI id when a pack does not name one.
pub const DEFAULT_ABI_ID: &str = "transformers.py:v1";

/// A sealed inference backend.
pub trait Adapter: Send + Sync {
    /// ABI id this adapter serves.
    fn abi_id(&self) -> &str;

    /// Runs one call. Errors should carry an `E_UPSTREAM` fault.
    fn run(&self, pack: &PackProofPayload, input: &Value) -> Result<Value, Fault>;
}

/// ABI id → adapter.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: BTreeMap<String, Arc<dyn Adapter>>,
}

impl AdapterRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an adapter under its own ABI id, replacing any previous one.
    pub fn register(&mut self, adapter: Arc<dyn Adapter>) {
        self.adapters.insert(adapter.abi_id().to_string(), adapter);
    }

    /// Adapter for an ABI id.
    pub fn get(&self, abi_id: &str) -> Option<Arc<dyn Adapter>> {
        self.adapters.get(abi_id).cloned()
    }

    /// Registered ABI ids in order.
    pub fn abi_ids(&self) -> Vec<&str> {
        self.adapters.keys().map(String::as_str).collect()
    }

    /// Number of registered adapters.
    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    /// Whether no adapter is registered.
    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("abi_ids", &self.abi_ids())
            .finish()
    }
}

/// Adapter output after the sealed check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedOutput {
    /// Generated text.
    pub text: String,
    /// Tokens consumed.
    pub tokens_used: u32,
    /// Optional out-of-band reference.
    pub output_ref: Option<String>,
}

impl SealedOutput {
    /// Checks raw adapter output. Unknown keys, missing keys, or wrong
    /// types fail with `E_UNSEALED_OUTPUT`.
    pub fn check(section: &str, raw: &Value) -> Result<Self, Fault> {
        let unsealed = |message: &str| {
            Fault::new(section, FaultCode::UnsealedOutput, message).with_meta(raw.clone())
        };
        let object = raw
            .as_object()
            .ok_or_else(|| unsealed("adapter output must be an object"))?;
        if let Some(key) = object
            .keys()
            .find(|k| !matches!(k.as_str(), "text" | "tokens_used" | "output_ref"))
        {
            return Err(unsealed(&format!("unexpected output field: {}", key)));
        }
        let text = object
            .get("text")
            .and_then(Value::as_str)
            .ok_or_else(|| unsealed("text must be a string"))?;
        let tokens_used = object
            .get("tokens_used")
            .and_then(Value::as_u64)
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| unsealed("tokens_used must be a non-negative integer"))?;
        let output_ref = match object.get("output_ref") {
            None => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(_) => return Err(unsealed("output_ref must be a string")),
        };
        Ok(Self {
            text: text.to_string(),
            tokens_used,
            output_ref,
        })
    }

    /// The hashed output object, `{text, tokens_used}`.
    pub fn payload(&self) -> Value {
        json!({"text": self.text, "tokens_used": self.tokens_used})
    }
}

/// Deterministic adapter that echoes the prompt back.
///
/// Token usage is the prompt's whitespace-separated word count, capped at
/// `max_tokens`.
#[derive(Debug, Clone)]
pub struct EchoAdapter {
    abi_id: String,
}

impl EchoAdapter {
    /// Echo adapter for an ABI id.
    pub fn new(abi_id: impl Into<String>) -> Self {
        Self {
            abi_id: abi_id.into(),
        }
    }
}

impl Default for EchoAdapter {
    fn default() -> Self {
        Self::new(DEFAULT_ABI_ID)
    }
}

impl Adapter for EchoAdapter {
    fn abi_id(&self) -> &str {
        &self.abi_id
    }

    fn run(&self, pack: &PackProofPayload, input: &Value) -> Result<Value, Fault> {
        let prompt = input.get("prompt").and_then(Value::as_str).unwrap_or_default();
        let max_tokens = input
            .get("max_tokens")
            .and_then(Value::as_u64)
            .unwrap_or(u64::MAX);
        let words = prompt.split_whitespace().count() as u64;
        Ok(json!({
            "text": format!("[{}] {}", pack.model_id, prompt),
            "tokens_used": words.min(max_tokens),
        }))
    }
}
