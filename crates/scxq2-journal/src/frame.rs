//! Frame kinds, typed payloads, and the JSON frame shape.

use scxq2_canonical::{canonicalize_json, ProofHash};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::errors::JournalError;
use crate::schema::FieldValue;

/// Version tag written into every header frame.
pub const SPEC_VERSION: &str = "ggl.frames.v1";

/// MIME type of `meta` blobs (canonical JSON text).
pub const META_MIME: &str = "application/json";

/// Closed set of frame kinds for an inference session stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FrameKind {
    /// Stream header; starts the chain.
    #[serde(rename = "hdr")]
    Header,
    /// Binds model, tensor, glyph, and ABI hashes under a pack hash.
    #[serde(rename = "infer.pack")]
    Pack,
    /// Explicit seed for a pack.
    #[serde(rename = "infer.seed")]
    Seed,
    /// Call start with its input hash.
    #[serde(rename = "infer.start")]
    Start,
    /// Call end with its output hash.
    #[serde(rename = "infer.end")]
    End,
    /// Call failure.
    #[serde(rename = "infer.error")]
    Error,
    /// Stream terminator carrying the final chain hash.
    #[serde(rename = "end")]
    Terminator,
    /// Router accepted a call.
    #[serde(rename = "route.start")]
    RouteStart,
    /// Router finished a call.
    #[serde(rename = "route.end")]
    RouteEnd,
}

impl FrameKind {
    /// Every kind, in wire-tag order.
    pub const ALL: [FrameKind; 9] = [
        FrameKind::Header,
        FrameKind::Pack,
        FrameKind::Seed,
        FrameKind::Start,
        FrameKind::End,
        FrameKind::Error,
        FrameKind::Terminator,
        FrameKind::RouteStart,
        FrameKind::RouteEnd,
    ];

    /// Wire tag (`u16` in the record lane).
    pub fn tag(self) -> u16 {
        match self {
            FrameKind::Header => 1,
            FrameKind::Pack => 2,
            FrameKind::Seed => 3,
            FrameKind::Start => 4,
            FrameKind::End => 5,
            FrameKind::Error => 6,
            FrameKind::Terminator => 7,
            FrameKind::RouteStart => 8,
            FrameKind::RouteEnd => 9,
        }
    }

    /// Kind for a wire tag.
    pub fn from_tag(tag: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.tag() == tag)
    }

    /// Name used in the JSON frame shape.
    pub fn name(self) -> &'static str {
        match self {
            FrameKind::Header => "hdr",
            FrameKind::Pack => "infer.pack",
            FrameKind::Seed => "infer.seed",
            FrameKind::Start => "infer.start",
            FrameKind::End => "infer.end",
            FrameKind::Error => "infer.error",
            FrameKind::Terminator => "end",
            FrameKind::RouteStart => "route.start",
            FrameKind::RouteEnd => "route.end",
        }
    }

    /// Kind for a JSON name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

/// Header payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeaderPayload {
    /// Frame format tag, [`SPEC_VERSION`].
    pub spec_v: String,
    /// Owning stream id.
    pub stream_id: String,
    /// Policy contract hash, empty when unpinned.
    pub policy_hash: String,
    /// Caller metadata.
    pub meta: Value,
}

/// Pack payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackPayload {
    /// Pack proof hash.
    pub pack_hash: String,
    /// Model identifier.
    pub model_id: String,
    /// Adapter ABI identifier.
    pub abi_id: String,
    /// Tensor representation hash.
    pub tensor_hash: String,
    /// Glyph grammar hash.
    pub glyph_hash: String,
    /// Adapter ABI hash.
    pub abi_hash: String,
    /// Weights artifact hash.
    pub weights_hash: String,
    /// Runtime device.
    pub runtime_device: String,
    /// Runtime precision.
    pub runtime_precision: String,
    /// Policy pins as bits: sealed, no_network, no_fs, no_eval.
    pub policy_flags: u8,
}

/// Seed payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedPayload {
    /// Pack the seed belongs to.
    pub pack_hash: String,
    /// Seed value.
    pub seed: i32,
}

/// Call start payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StartPayload {
    /// Active pack hash.
    pub pack_hash: String,
    /// Call id, monotonic per stream.
    pub call_id: u32,
    /// Hash of the canonical input.
    pub input_hash: String,
    /// Optional input reference, empty when none.
    pub input_ref: String,
    /// Input size in bytes, when known.
    pub input_bytes: u32,
}

/// Call end payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndPayload {
    /// Active pack hash.
    pub pack_hash: String,
    /// Call id of the matching start.
    pub call_id: u32,
    /// Hash of the start payload.
    pub start_hash: String,
    /// Hash of the canonical output.
    pub output_hash: String,
    /// Optional output reference, empty when none.
    pub output_ref: String,
    /// Output size in bytes, when known.
    pub output_bytes: u32,
    /// Tokens reported by the adapter.
    pub tokens_used: u32,
}

/// Call failure payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorPayload {
    /// Active pack hash, empty if the call failed before a pack was bound.
    pub pack_hash: String,
    /// Call id.
    pub call_id: u32,
    /// Hash of the start payload, empty if the call never started.
    pub start_hash: String,
    /// `section:code`.
    pub fault: String,
    /// Fault message.
    pub message: String,
    /// Fault metadata.
    pub meta: Value,
}

/// Terminator payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminatorPayload {
    /// Chain link over every frame before the terminator.
    pub final_chain_hash: String,
    /// Number of frames before the terminator.
    pub frame_count: u32,
    /// Caller metadata.
    pub meta: Value,
}

/// Route start payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteStartPayload {
    /// Request path.
    pub path: String,
    /// Request method.
    pub method: String,
    /// Handler id.
    pub handler: String,
}

/// Route end payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteEndPayload {
    /// Request path.
    pub path: String,
    /// Handler id.
    pub handler: String,
    /// Response status.
    pub status: u16,
}

/// Closed union of frame payloads, one variant per [`FrameKind`].
#[derive(Debug, Clone, PartialEq)]
pub enum FramePayload {
    /// `hdr`.
    Header(HeaderPayload),
    /// `infer.pack`.
    Pack(PackPayload),
    /// `infer.seed`.
    Seed(SeedPayload),
    /// `infer.start`.
    Start(StartPayload),
    /// `infer.end`.
    End(EndPayload),
    /// `infer.error`.
    Error(ErrorPayload),
    /// `end`.
    Terminator(TerminatorPayload),
    /// `route.start`.
    RouteStart(RouteStartPayload),
    /// `route.end`.
    RouteEnd(RouteEndPayload),
}

impl FramePayload {
    /// Kind of this payload.
    pub fn kind(&self) -> FrameKind {
        match self {
            FramePayload::Header(_) => FrameKind::Header,
            FramePayload::Pack(_) => FrameKind::Pack,
            FramePayload::Seed(_) => FrameKind::Seed,
            FramePayload::Start(_) => FrameKind::Start,
            FramePayload::End(_) => FrameKind::End,
            FramePayload::Error(_) => FrameKind::Error,
            FramePayload::Terminator(_) => FrameKind::Terminator,
            FramePayload::RouteStart(_) => FrameKind::RouteStart,
            FramePayload::RouteEnd(_) => FrameKind::RouteEnd,
        }
    }

    /// Pack hash carried by pack/seed/start/end/error payloads.
    pub fn pack_hash(&self) -> Option<&str> {
        match self {
            FramePayload::Pack(p) => Some(&p.pack_hash),
            FramePayload::Seed(p) => Some(&p.pack_hash),
            FramePayload::Start(p) => Some(&p.pack_hash),
            FramePayload::End(p) => Some(&p.pack_hash),
            FramePayload::Error(p) => Some(&p.pack_hash),
            _ => None,
        }
    }

    /// Parses a JSON payload for `kind`. Missing fields take their defaults.
    pub fn from_value(kind: FrameKind, value: Value) -> Result<Self, JournalError> {
        let payload = match kind {
            FrameKind::Header => FramePayload::Header(serde_json::from_value(value)?),
            FrameKind::Pack => FramePayload::Pack(serde_json::from_value(value)?),
            FrameKind::Seed => FramePayload::Seed(serde_json::from_value(value)?),
            FrameKind::Start => FramePayload::Start(serde_json::from_value(value)?),
            FrameKind::End => FramePayload::End(serde_json::from_value(value)?),
            FrameKind::Error => FramePayload::Error(serde_json::from_value(value)?),
            FrameKind::Terminator => FramePayload::Terminator(serde_json::from_value(value)?),
            FrameKind::RouteStart => FramePayload::RouteStart(serde_json::from_value(value)?),
            FrameKind::RouteEnd => FramePayload::RouteEnd(serde_json::from_value(value)?),
        };
        Ok(payload)
    }

    /// JSON projection of the payload.
    pub fn to_value(&self) -> Result<Value, JournalError> {
        Ok(serde_json::to_value(self)?)
    }

    /// Column values in schema order.
    pub fn to_fields(&self) -> Vec<FieldValue> {
        use FieldValue::{Bytes, Str, I32, U16, U32, U8};
        match self {
            FramePayload::Header(p) => vec![
                Str(p.spec_v.clone()),
                Str(p.stream_id.clone()),
                Str(p.policy_hash.clone()),
                Str(META_MIME.to_string()),
                Bytes(meta_bytes(&p.meta)),
            ],
            FramePayload::Pack(p) => vec![
                Str(p.pack_hash.clone()),
                Str(p.model_id.clone()),
                Str(p.abi_id.clone()),
                Str(p.tensor_hash.clone()),
                Str(p.glyph_hash.clone()),
                Str(p.abi_hash.clone()),
                Str(p.weights_hash.clone()),
                Str(p.runtime_device.clone()),
                Str(p.runtime_precision.clone()),
                U8(p.policy_flags),
            ],
            FramePayload::Seed(p) => vec![Str(p.pack_hash.clone()), I32(p.seed)],
            FramePayload::Start(p) => vec![
                Str(p.pack_hash.clone()),
                U32(p.call_id),
                Str(p.input_hash.clone()),
                Str(p.input_ref.clone()),
                U32(p.input_bytes),
            ],
            FramePayload::End(p) => vec![
                Str(p.pack_hash.clone()),
                U32(p.call_id),
                Str(p.start_hash.clone()),
                Str(p.output_hash.clone()),
                Str(p.output_ref.clone()),
                U32(p.output_bytes),
                U32(p.tokens_used),
            ],
            FramePayload::Error(p) => vec![
                Str(p.pack_hash.clone()),
                U32(p.call_id),
                Str(p.start_hash.clone()),
                Str(p.fault.clone()),
                Str(p.message.clone()),
                Bytes(meta_bytes(&p.meta)),
            ],
            FramePayload::Terminator(p) => vec![
                Str(p.final_chain_hash.clone()),
                U32(p.frame_count),
                Bytes(meta_bytes(&p.meta)),
            ],
            FramePayload::RouteStart(p) => vec![
                Str(p.path.clone()),
                Str(p.method.clone()),
                Str(p.handler.clone()),
            ],
            FramePayload::RouteEnd(p) => vec![
                Str(p.path.clone()),
                Str(p.handler.clone()),
                U16(p.status),
            ],
        }
    }

    /// Rebuilds a payload from column values in schema order.
    pub fn from_fields(kind: FrameKind, fields: Vec<FieldValue>) -> Result<Self, JournalError> {
        let mut cols = Columns {
            kind,
            values: fields.into_iter(),
        };
        let payload = match kind {
            FrameKind::Header => {
                let spec_v = cols.text()?;
                let stream_id = cols.text()?;
                let policy_hash = cols.text()?;
                let mime = cols.text()?;
                if mime != META_MIME {
                    return Err(cols.invalid(format!("unsupported meta mime {:?}", mime)));
                }
                FramePayload::Header(HeaderPayload {
                    spec_v,
                    stream_id,
                    policy_hash,
                    meta: cols.meta()?,
                })
            }
            FrameKind::Pack => FramePayload::Pack(PackPayload {
                pack_hash: cols.text()?,
                model_id: cols.text()?,
                abi_id: cols.text()?,
                tensor_hash: cols.text()?,
                glyph_hash: cols.text()?,
                abi_hash: cols.text()?,
                weights_hash: cols.text()?,
                runtime_device: cols.text()?,
                runtime_precision: cols.text()?,
                policy_flags: cols.u8()?,
            }),
            FrameKind::Seed => FramePayload::Seed(SeedPayload {
                pack_hash: cols.text()?,
                seed: cols.i32()?,
            }),
            FrameKind::Start => FramePayload::Start(StartPayload {
                pack_hash: cols.text()?,
                call_id: cols.u32()?,
                input_hash: cols.text()?,
                input_ref: cols.text()?,
                input_bytes: cols.u32()?,
            }),
            FrameKind::End => FramePayload::End(EndPayload {
                pack_hash: cols.text()?,
                call_id: cols.u32()?,
                start_hash: cols.text()?,
                output_hash: cols.text()?,
                output_ref: cols.text()?,
                output_bytes: cols.u32()?,
                tokens_used: cols.u32()?,
            }),
            FrameKind::Error => FramePayload::Error(ErrorPayload {
                pack_hash: cols.text()?,
                call_id: cols.u32()?,
                start_hash: cols.text()?,
                fault: cols.text()?,
                message: cols.text()?,
                meta: cols.meta()?,
            }),
            FrameKind::Terminator => FramePayload::Terminator(TerminatorPayload {
                final_chain_hash: cols.text()?,
                frame_count: cols.u32()?,
                meta: cols.meta()?,
            }),
            FrameKind::RouteStart => FramePayload::RouteStart(RouteStartPayload {
                path: cols.text()?,
                method: cols.text()?,
                handler: cols.text()?,
            }),
            FrameKind::RouteEnd => FramePayload::RouteEnd(RouteEndPayload {
                path: cols.text()?,
                handler: cols.text()?,
                status: cols.u16()?,
            }),
        };
        if cols.values.next().is_some() {
            return Err(cols.invalid("more columns than the schema declares".to_string()));
        }
        Ok(payload)
    }
}

impl Serialize for FramePayload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FramePayload::Header(p) => p.serialize(serializer),
            FramePayload::Pack(p) => p.serialize(serializer),
            FramePayload::Seed(p) => p.serialize(serializer),
            FramePayload::Start(p) => p.serialize(serializer),
            FramePayload::End(p) => p.serialize(serializer),
            FramePayload::Error(p) => p.serialize(serializer),
            FramePayload::Terminator(p) => p.serialize(serializer),
            FramePayload::RouteStart(p) => p.serialize(serializer),
            FramePayload::RouteEnd(p) => p.serialize(serializer),
        }
    }
}

/// `meta` blobs are stored as canonical JSON text so re-encoding is byte-stable.
fn meta_bytes(meta: &Value) -> Vec<u8> {
    canonicalize_json(meta).into_bytes()
}

struct Columns {
    kind: FrameKind,
    values: std::vec::IntoIter<FieldValue>,
}

impl Columns {
    fn invalid(&self, reason: String) -> JournalError {
        JournalError::InvalidPayload {
            kind: self.kind.name(),
            reason,
        }
    }

    fn next(&mut self) -> Result<FieldValue, JournalError> {
        self.values
            .next()
            .ok_or_else(|| self.invalid("fewer columns than the schema declares".to_string()))
    }

    fn text(&mut self) -> Result<String, JournalError> {
        match self.next()? {
            FieldValue::Str(s) => Ok(s),
            other => Err(self.invalid(format!("expected Str, found {:?}", other.field_type()))),
        }
    }

    fn u8(&mut self) -> Result<u8, JournalError> {
        match self.next()? {
            FieldValue::U8(v) => Ok(v),
            other => Err(self.invalid(format!("expected U8, found {:?}", other.field_type()))),
        }
    }

    fn u16(&mut self) -> Result<u16, JournalError> {
        match self.next()? {
            FieldValue::U16(v) => Ok(v),
            other => Err(self.invalid(format!("expected U16, found {:?}", other.field_type()))),
        }
    }

    fn u32(&mut self) -> Result<u32, JournalError> {
        match self.next()? {
            FieldValue::U32(v) => Ok(v),
            other => Err(self.invalid(format!("expected U32, found {:?}", other.field_type()))),
        }
    }

    fn i32(&mut self) -> Result<i32, JournalError> {
        match self.next()? {
            FieldValue::I32(v) => Ok(v),
            other => Err(self.invalid(format!("expected I32, found {:?}", other.field_type()))),
        }
    }

    fn meta(&mut self) -> Result<Value, JournalError> {
        match self.next()? {
            FieldValue::Bytes(bytes) => Ok(serde_json::from_slice(&bytes)?),
            other => Err(self.invalid(format!("expected Bytes, found {:?}", other.field_type()))),
        }
    }
}

/// One immutable, ordered record in a capture stream.
///
/// JSON shape: `{"kind": "...", "t": 0, "p": {...}, "ch": "h:........"}`;
/// `ch` is omitted when the frame is unchained. Input also accepts `k` for
/// `kind` and `payload` for `p`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawFrame")]
pub struct Frame {
    /// Monotonic tick within the stream.
    pub tick: u32,
    /// Typed payload; also determines the kind.
    pub payload: FramePayload,
    /// Chain link after this frame.
    pub chain: Option<ProofHash>,
}

impl Frame {
    /// Creates an unchained frame.
    pub fn new(tick: u32, payload: FramePayload) -> Self {
        Self {
            tick,
            payload,
            chain: None,
        }
    }

    /// Kind of the frame.
    pub fn kind(&self) -> FrameKind {
        self.payload.kind()
    }

    /// JSON projection in the external frame shape.
    pub fn to_value(&self) -> Result<Value, JournalError> {
        Ok(serde_json::to_value(self)?)
    }
}

impl Serialize for Frame {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = if self.chain.is_some() { 4 } else { 3 };
        let mut state = serializer.serialize_struct("Frame", len)?;
        state.serialize_field("kind", &self.kind())?;
        state.serialize_field("t", &self.tick)?;
        state.serialize_field("p", &self.payload)?;
        if let Some(chain) = &self.chain {
            state.serialize_field("ch", chain)?;
        }
        state.end()
    }
}

#[derive(Deserialize)]
struct RawFrame {
    #[serde(alias = "k")]
    kind: FrameKind,
    #[serde(default)]
    t: u64,
    #[serde(alias = "payload", default)]
    p: Value,
    #[serde(default)]
    ch: Option<ProofHash>,
}

impl TryFrom<RawFrame> for Frame {
    type Error = JournalError;

    fn try_from(raw: RawFrame) -> Result<Self, Self::Error> {
        let p = if raw.p.is_null() {
            Value::Object(Default::default())
        } else {
            raw.p
        };
        let tick = u32::try_from(raw.t).map_err(|_| JournalError::TickOutOfRange(raw.t))?;
        Ok(Frame {
            tick,
            payload: FramePayload::from_value(raw.kind, p)?,
            chain: raw.ch,
        })
    }
}
