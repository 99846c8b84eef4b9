//! Locked proof payloads.
//!
//! A proof payload is a projection of caller data onto a fixed field set.
//! Fields outside the set are dropped, required text fields are always
//! present, and optional fields are always an explicit `null` when absent,
//! so the identity hash only moves when a locked field moves.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::canonicalizer::canonicalize_json;
use crate::digest::ProofHash;
use crate::value::CanonicalValue;

/// `@type` of the pack proof payload.
pub const PACK_PROOF_TYPE: &str = "ggltensors.pack.proof.payload";
/// `@type` of the infer proof payload.
pub const INFER_PROOF_TYPE: &str = "ggl.infer.proof.payload";
/// `@v` of both proof payloads.
pub const PROOF_PAYLOAD_VERSION: &str = "1.0.0";

/// Proof payload identifying the weights, tensor representation, and runtime behind a call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackProofPayload {
    /// Model identifier.
    pub model_id: String,
    /// Optional hash of the model artifact.
    pub model_hash: Option<String>,
    /// Hash of the weights artifact.
    pub weights_hash: String,
    /// Hash of the tensor representation.
    pub tensor_hash: String,
    /// Hash of the glyph grammar used to interpret the tensors.
    pub glyph_hash: String,
    /// Adapter ABI identifier, e.g. `transformers.py:v1`.
    pub abi_id: String,
    /// Hash of the adapter ABI contract.
    pub abi_hash: String,
    /// Runtime device, e.g. `cpu` or `webgpu`.
    pub runtime_device: String,
    /// Runtime precision, e.g. `fp32`.
    pub runtime_precision: String,
    /// Optional explicit seed.
    pub seed: Option<i32>,
    /// Sealed-compute policy pin.
    pub policy_sealed: bool,
    /// No-network policy pin.
    pub policy_no_network: bool,
    /// No-filesystem policy pin.
    pub policy_no_fs: bool,
    /// No-eval policy pin.
    pub policy_no_eval: bool,
}

impl PackProofPayload {
    /// Projects a raw pack descriptor onto the locked field set.
    ///
    /// # Example
    ///
    /// ```rust
    /// use scxq2_canonical::PackProofPayload;
    /// use serde_json::json;
    ///
    /// let plain = json!({"model_id": "m", "weights_hash": "h:00000001"});
    /// let decorated = json!({"model_id": "m", "weights_hash": "h:00000001", "ui": {"color": "red"}});
    /// assert_eq!(
    ///     PackProofPayload::from_descriptor(&plain).pack_hash(),
    ///     PackProofPayload::from_descriptor(&decorated).pack_hash(),
    /// );
    /// ```
    pub fn from_descriptor(raw: &Value) -> Self {
        let field = |name: &str| raw.get(name);
        Self {
            model_id: to_text(field("model_id")),
            model_hash: to_opt_text(field("model_hash")),
            weights_hash: to_text(field("weights_hash")),
            tensor_hash: to_text(field("tensor_hash")),
            glyph_hash: to_text(field("glyph_hash")),
            abi_id: to_text(field("abi_id")),
            abi_hash: to_text(field("abi_hash")),
            runtime_device: to_text(field("runtime_device")),
            runtime_precision: to_text(field("runtime_precision")),
            seed: to_opt_int32(field("seed")),
            policy_sealed: is_truthy(field("policy_sealed")),
            policy_no_network: is_truthy(field("policy_no_network")),
            policy_no_fs: is_truthy(field("policy_no_fs")),
            policy_no_eval: is_truthy(field("policy_no_eval")),
        }
    }

    /// Canonical value that is hashed, including `@type` and `@v`.
    pub fn canonical_value(&self) -> CanonicalValue {
        CanonicalValue::object([
            ("@type", CanonicalValue::from(PACK_PROOF_TYPE)),
            ("@v", CanonicalValue::from(PROOF_PAYLOAD_VERSION)),
            ("model_id", CanonicalValue::from(self.model_id.as_str())),
            ("model_hash", CanonicalValue::opt_string(self.model_hash.as_deref())),
            ("weights_hash", CanonicalValue::from(self.weights_hash.as_str())),
            ("tensor_hash", CanonicalValue::from(self.tensor_hash.as_str())),
            ("glyph_hash", CanonicalValue::from(self.glyph_hash.as_str())),
            ("abi_id", CanonicalValue::from(self.abi_id.as_str())),
            ("abi_hash", CanonicalValue::from(self.abi_hash.as_str())),
            ("runtime_device", CanonicalValue::from(self.runtime_device.as_str())),
            ("runtime_precision", CanonicalValue::from(self.runtime_precision.as_str())),
            ("seed", self.seed.map_or(CanonicalValue::Null, CanonicalValue::from)),
            ("policy_sealed", CanonicalValue::from(self.policy_sealed)),
            ("policy_no_network", CanonicalValue::from(self.policy_no_network)),
            ("policy_no_fs", CanonicalValue::from(self.policy_no_fs)),
            ("policy_no_eval", CanonicalValue::from(self.policy_no_eval)),
        ])
    }

    /// `Hash(Canon(payload))`.
    pub fn pack_hash(&self) -> ProofHash {
        ProofHash::of_canonical(&self.canonical_value())
    }
}

/// Proof payload binding a pack to the input and output of one call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InferProofPayload {
    /// Active pack hash.
    pub pack_hash: String,
    /// Model identifier.
    pub model_id: String,
    /// Hash of the canonical input object.
    pub input_hash: String,
    /// Hash of the canonical output object.
    pub output_hash: String,
    /// Seed, if the call was seeded.
    pub seed: Option<i32>,
    /// Adapter ABI hash.
    pub abi_hash: String,
}

impl InferProofPayload {
    /// Projects a raw infer descriptor onto the locked field set.
    pub fn from_descriptor(raw: &Value) -> Self {
        let field = |name: &str| raw.get(name);
        Self {
            pack_hash: to_text(field("pack_hash")),
            model_id: to_text(field("model_id")),
            input_hash: to_text(field("input_hash")),
            output_hash: to_text(field("output_hash")),
            seed: to_opt_int32(field("seed")),
            abi_hash: to_text(field("abi_hash")),
        }
    }

    /// Canonical value that is hashed, including `@type` and `@v`.
    pub fn canonical_value(&self) -> CanonicalValue {
        CanonicalValue::object([
            ("@type", CanonicalValue::from(INFER_PROOF_TYPE)),
            ("@v", CanonicalValue::from(PROOF_PAYLOAD_VERSION)),
            ("pack_hash", CanonicalValue::from(self.pack_hash.as_str())),
            ("model_id", CanonicalValue::from(self.model_id.as_str())),
            ("input_hash", CanonicalValue::from(self.input_hash.as_str())),
            ("output_hash", CanonicalValue::from(self.output_hash.as_str())),
            ("seed", self.seed.map_or(CanonicalValue::Null, CanonicalValue::from)),
            ("abi_hash", CanonicalValue::from(self.abi_hash.as_str())),
        ])
    }

    /// `infer_proof_hash = Hash(Canon(payload))`.
    pub fn proof_hash(&self) -> ProofHash {
        ProofHash::of_canonical(&self.canonical_value())
    }
}

/// Coerces any value to text: strings as-is, `null`/missing as `""`,
/// everything else as its canonical text.
pub fn to_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => canonicalize_json(other),
    }
}

/// Like [`to_text`], but `null`/missing stays absent.
pub fn to_opt_text(value: Option<&Value>) -> Option<String> {
    match value {
        None | Some(Value::Null) => None,
        some => Some(to_text(some)),
    }
}

/// Coerces to a 32-bit integer: truncate toward zero, wrap modulo 2^32.
/// Non-numeric input becomes `0`.
pub fn to_int32(value: Option<&Value>) -> i32 {
    let number = match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse::<f64>().unwrap_or(0.0),
        Some(Value::Bool(true)) => 1.0,
        _ => 0.0,
    };
    wrap_int32(number)
}

/// Like [`to_int32`], but `null`/missing stays absent.
pub fn to_opt_int32(value: Option<&Value>) -> Option<i32> {
    match value {
        None | Some(Value::Null) => None,
        some => Some(to_int32(some)),
    }
}

/// Truthiness: `false`, `0`, `""`, `null`, and missing are false.
pub fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

fn wrap_int32(number: f64) -> i32 {
    if !number.is_finite() {
        return 0;
    }
    let truncated = number.trunc();
    let modulus = 4_294_967_296.0_f64;
    let wrapped = truncated.rem_euclid(modulus);
    wrapped as u32 as i32
}
