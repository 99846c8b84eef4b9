//! Replay verification of an exported frame list.
//!
//! Verification is deterministic and offline: it reads only the frames it is
//! given and never consults a capture service.

use scxq2_canonical::proof::{is_truthy, to_text};
use scxq2_journal::Frame;
use serde::Serialize;
use serde_json::{json, Value};

use crate::errors::CoreError;

/// Stable verifier fault codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultCode {
    /// No `infer.pack` frame.
    NoPack,
    /// No `infer.start` frame.
    NoStart,
    /// No `infer.end` frame.
    NoEnd,
    /// The active pack frame has no `pack_hash`.
    PackHashMissing,
    /// No start or end frame carries the active `pack_hash`.
    LinkFail,
    /// The linked start frame has an empty `input_hash`.
    InputHashMissing,
    /// The linked end frame has an empty `output_hash`.
    OutputHashMissing,
    /// The seed for the active pack is not an integer.
    BadSeed,
    /// A stored chain link disagrees with the recomputed one.
    ChainMismatch,
}

impl FaultCode {
    /// Wire code, e.g. `E_NO_PACK`.
    pub fn as_str(self) -> &'static str {
        match self {
            FaultCode::NoPack => "E_NO_PACK",
            FaultCode::NoStart => "E_NO_START",
            FaultCode::NoEnd => "E_NO_END",
            FaultCode::PackHashMissing => "E_PACK_HASH_MISSING",
            FaultCode::LinkFail => "E_LINK_FAIL",
            FaultCode::InputHashMissing => "E_INPUT_HASH_MISSING",
            FaultCode::OutputHashMissing => "E_OUTPUT_HASH_MISSING",
            FaultCode::BadSeed => "E_BAD_SEED",
            FaultCode::ChainMismatch => "E_CHAIN_MISMATCH",
        }
    }
}

impl std::fmt::Display for FaultCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for FaultCode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// The identity of a verified call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallIdentity {
    /// Active pack hash.
    pub pack_hash: String,
    /// Input hash of the linked start frame.
    pub input_hash: String,
    /// Output hash of the linked end frame.
    pub output_hash: String,
}

/// Verification verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The frames establish one consistent call.
    Verified(CallIdentity),
    /// The frames do not; the code says why.
    Failed(FaultCode),
}

impl Verdict {
    /// Whether verification succeeded.
    pub fn is_ok(&self) -> bool {
        matches!(self, Verdict::Verified(_))
    }

    /// Fault code, if verification failed.
    pub fn fault(&self) -> Option<FaultCode> {
        match self {
            Verdict::Verified(_) => None,
            Verdict::Failed(code) => Some(*code),
        }
    }

    /// `{ok:true, pack_hash, input_hash, output_hash}` or `{ok:false, fault}`.
    pub fn to_value(&self) -> Value {
        match self {
            Verdict::Verified(id) => json!({
                "ok": true,
                "pack_hash": id.pack_hash,
                "input_hash": id.input_hash,
                "output_hash": id.output_hash,
            }),
            Verdict::Failed(code) => json!({"ok": false, "fault": code.as_str()}),
        }
    }
}

impl Serialize for Verdict {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

/// Verifies typed frames through their JSON projection.
pub fn verify(frames: &[Frame]) -> Result<Verdict, CoreError> {
    let values = frames
        .iter()
        .map(Frame::to_value)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(verify_json(&values))
}

/// Verifies exported JSON frames.
///
/// Frames may name their kind with `kind` or `k` and their payload with `p`
/// or `payload`; a frame with neither is read as a flat payload. Hash fields
/// are compared as text, so numeric hashes count as present. Frames of
/// other kinds are ignored.
///
/// # Example
///
/// ```rust
/// use scxq2_core::verification::verify_json;
/// use serde_json::json;
///
/// let frames = vec![
///     json!({"kind": "infer.pack", "t": 0, "p": {"pack_hash": "h:00000001"}}),
///     json!({"kind": "infer.start", "t": 1, "p": {"pack_hash": "h:00000001", "input_hash": "h:0a"}}),
///     json!({"kind": "infer.end", "t": 2, "p": {"pack_hash": "h:00000001", "output_hash": "h:0b"}}),
/// ];
/// assert_eq!(
///     verify_json(&frames).to_value(),
///     json!({"ok": true, "pack_hash": "h:00000001", "input_hash": "h:0a", "output_hash": "h:0b"}),
/// );
/// ```
pub fn verify_json(frames: &[Value]) -> Verdict {
    let mut packs = Vec::new();
    let mut seeds = Vec::new();
    let mut starts = Vec::new();
    let mut ends = Vec::new();
    for frame in frames {
        let kind = frame
            .get("kind")
            .or_else(|| frame.get("k"))
            .and_then(Value::as_str);
        let payload = ["p", "payload"]
            .iter()
            .filter_map(|key| frame.get(*key))
            .find(|p| p.is_object())
            .unwrap_or(frame);
        match kind {
            Some("infer.pack") => packs.push(payload),
            Some("infer.seed") => seeds.push(payload),
            Some("infer.start") => starts.push(payload),
            Some("infer.end") => ends.push(payload),
            _ => {}
        }
    }

    let verdict = check(&packs, &seeds, &starts, &ends);
    if let Verdict::Failed(code) = &verdict {
        tracing::debug!(fault = %code, frames = frames.len(), "verification failed");
    }
    verdict
}

fn check(packs: &[&Value], seeds: &[&Value], starts: &[&Value], ends: &[&Value]) -> Verdict {
    let (Some(pack), false, false) = (packs.last(), starts.is_empty(), ends.is_empty()) else {
        let code = if packs.is_empty() {
            FaultCode::NoPack
        } else if starts.is_empty() {
            FaultCode::NoStart
        } else {
            FaultCode::NoEnd
        };
        return Verdict::Failed(code);
    };

    let active = text(pack, "pack_hash");
    if active.is_empty() {
        return Verdict::Failed(FaultCode::PackHashMissing);
    }

    let linked = |bucket: &[&Value]| -> Option<Value> {
        bucket
            .iter()
            .rev()
            .find(|p| text(p, "pack_hash") == active)
            .map(|p| (*p).clone())
    };
    let (Some(start), Some(end)) = (linked(starts), linked(ends)) else {
        return Verdict::Failed(FaultCode::LinkFail);
    };

    let input_hash = text(&start, "input_hash");
    if input_hash.is_empty() {
        return Verdict::Failed(FaultCode::InputHashMissing);
    }
    let output_hash = text(&end, "output_hash");
    if output_hash.is_empty() {
        return Verdict::Failed(FaultCode::OutputHashMissing);
    }

    if let Some(seed) = linked(seeds) {
        if !is_integer(seed.get("seed")) {
            return Verdict::Failed(FaultCode::BadSeed);
        }
    }

    Verdict::Verified(CallIdentity {
        pack_hash: active,
        input_hash,
        output_hash,
    })
}

/// Falsy values read as `""`; any other scalar as its text.
fn text(payload: &Value, field: &str) -> String {
    let value = payload.get(field);
    if is_truthy(value) {
        to_text(value)
    } else {
        String::new()
    }
}

fn is_integer(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Number(n)) => {
            n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.is_finite() && f.fract() == 0.0)
        }
        _ => false,
    }
}
