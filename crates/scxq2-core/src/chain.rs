use scxq2_canonical::{canonicalize_json, ProofHash};
use scxq2_journal::{Frame, FramePayload};
use serde::Serialize;
use serde_json::Value;

use crate::errors::CoreError;

/// Separator between the canonical payload and the previous link.
pub const LINK_SEPARATOR: char = '|';

/// `Hash(Canon(payload) + "|" + prev)`; a missing `prev` is `h:00000000`.
///
/// # Example
///
/// ```rust
/// use scxq2_canonical::ProofHash;
/// use scxq2_core::chain::link_value;
/// use serde_json::json;
///
/// let first = link_value(None, &json!({"a": 1}));
/// assert_eq!(first, link_value(Some(ProofHash::ZERO), &json!({"a": 1})));
/// assert_ne!(first, link_value(Some(first), &json!({"a": 1})));
/// ```
pub fn link_value(prev: Option<ProofHash>, payload: &Value) -> ProofHash {
    let prev = prev.unwrap_or(ProofHash::ZERO);
    let mut text = canonicalize_json(payload);
    text.push(LINK_SEPARATOR);
    text.push_str(&prev.to_string());
    ProofHash::of_text(&text)
}

/// Links a typed payload through its JSON projection.
pub fn link(prev: Option<ProofHash>, payload: &FramePayload) -> Result<ProofHash, CoreError> {
    Ok(link_value(prev, &payload.to_value()?))
}

/// Where a recomputed chain first disagrees with the stored one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainMismatch {
    /// Index of the first offending frame.
    pub index: usize,
    /// Value the frame should carry.
    pub expected: ProofHash,
    /// Value the frame carries; `None` if the frame is unchained or the
    /// stored text is not a proof hash.
    pub found: Option<String>,
    /// Which value disagreed: `ch` or `final_chain_hash`.
    pub field: &'static str,
}

/// Recomputes every link in order and returns the last one.
///
/// A terminator's `final_chain_hash` must equal the link over every frame
/// before it.
pub fn verify_chain(frames: &[Frame]) -> Result<Result<ProofHash, ChainMismatch>, CoreError> {
    let values = frames
        .iter()
        .map(Frame::to_value)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(verify_chain_json(&values))
}

/// Like [`verify_chain`], over exported JSON frames (`p` or `payload`).
pub fn verify_chain_json(frames: &[Value]) -> Result<ProofHash, ChainMismatch> {
    let empty = Value::Object(Default::default());
    let mut running: Option<ProofHash> = None;
    for (index, frame) in frames.iter().enumerate() {
        let payload = frame
            .get("p")
            .or_else(|| frame.get("payload"))
            .unwrap_or(&empty);
        let kind = frame.get("kind").or_else(|| frame.get("k"));
        if kind.and_then(Value::as_str) == Some("end") {
            let expected = running.unwrap_or(ProofHash::ZERO);
            let found = payload.get("final_chain_hash").and_then(Value::as_str);
            if found != Some(expected.to_string().as_str()) {
                return Err(ChainMismatch {
                    index,
                    expected,
                    found: found.map(str::to_string),
                    field: "final_chain_hash",
                });
            }
        }
        let next = link_value(running, payload);
        let stored = frame.get("ch").and_then(Value::as_str);
        if stored != Some(next.to_string().as_str()) {
            return Err(ChainMismatch {
                index,
                expected: next,
                found: stored.map(str::to_string),
                field: "ch",
            });
        }
        running = Some(next);
    }
    Ok(running.unwrap_or(ProofHash::ZERO))
}
