//! Four-lane stream encoder.

use crate::dictionary::{DictCategory, Dictionary, DictionaryBuilder};
use crate::errors::JournalError;
use crate::frame::{Frame, FrameKind};
use crate::header::{Lane, StreamHeader, MAX_PAYLOAD_SIZE};
use crate::schema::{schema_for, FieldValue};
use crate::wire::write_varint;
use std::collections::BTreeSet;

/// Accumulates frames and encodes them as one `GGL1` stream.
///
/// The dictionary and field lanes depend on every frame, so nothing is
/// written until [`StreamWriter::finish`].
///
/// # Example
///
/// ```rust
/// use scxq2_journal::{decode, FramePayload, Frame, ReadMode, SeedPayload, StreamWriter};
///
/// let mut writer = StreamWriter::new();
/// writer.push(Frame::new(0, FramePayload::Seed(SeedPayload {
///     pack_hash: "h:0badf00d".into(),
///     seed: 7,
/// })));
/// let bytes = writer.finish()?;
/// let decoded = decode(&bytes, ReadMode::Strict)?;
/// assert_eq!(decoded.frames.len(), 1);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Default, Clone)]
pub struct StreamWriter {
    frames: Vec<Frame>,
}

impl StreamWriter {
    /// Creates an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a frame.
    pub fn push(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    /// Number of frames pushed so far.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Whether no frame has been pushed.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Encodes header and lanes.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::PayloadTooLarge`] if a record body or lane
    /// exceeds its size limit.
    pub fn finish(self) -> Result<Vec<u8>, JournalError> {
        encode(&self.frames)
    }
}

/// Encodes `frames` as a `GGL1` stream.
///
/// Output is a pure function of the frames: the dictionary is sorted and
/// the field lane lists only the kinds present, in tag order.
pub fn encode(frames: &[Frame]) -> Result<Vec<u8>, JournalError> {
    let columns: Vec<Vec<FieldValue>> = frames.iter().map(|f| f.payload.to_fields()).collect();
    let kinds: BTreeSet<FrameKind> = frames.iter().map(Frame::kind).collect();

    let mut builder = DictionaryBuilder::new();
    for kind in &kinds {
        for slot in schema_for(*kind) {
            builder.insert(DictCategory::Symbol, slot.name);
        }
    }
    for (frame, values) in frames.iter().zip(&columns) {
        for (slot, value) in schema_for(frame.kind()).iter().zip(values) {
            if let FieldValue::Str(text) = value {
                builder.insert(slot.category, text);
            }
        }
    }
    let dictionary = builder.build();

    let mut dict_lane = Vec::new();
    dictionary.encode_into(&mut dict_lane);

    let mut field_lane = Vec::new();
    write_varint(&mut field_lane, kinds.len() as u64);
    for kind in &kinds {
        let schema = schema_for(*kind);
        field_lane.extend_from_slice(&kind.tag().to_le_bytes());
        write_varint(&mut field_lane, schema.len() as u64);
        for slot in schema {
            field_lane.push(slot.ty.to_byte());
            let index = lookup(&dictionary, DictCategory::Symbol, slot.name)?;
            write_varint(&mut field_lane, u64::from(index));
        }
    }

    let mut record_lane = Vec::new();
    write_varint(&mut record_lane, frames.len() as u64);
    for (frame, values) in frames.iter().zip(&columns) {
        let body = encode_body(&dictionary, frame.kind(), values)?;
        let len = body.len() as u64;
        if len > u64::from(MAX_PAYLOAD_SIZE) {
            return Err(JournalError::PayloadTooLarge {
                size: len,
                max: MAX_PAYLOAD_SIZE,
            });
        }
        record_lane.extend_from_slice(&frame.kind().tag().to_le_bytes());
        record_lane.extend_from_slice(&frame.tick.to_le_bytes());
        record_lane.extend_from_slice(&(len as u32).to_le_bytes());
        // 0 doubles as "no link"; a real h:00000000 link reads back as None
        let chain = frame.chain.map(|c| c.value()).unwrap_or(0);
        record_lane.extend_from_slice(&chain.to_le_bytes());
        record_lane.extend_from_slice(&body);
    }

    let edge_lane: Vec<u8> = Vec::new();
    let mut out = Vec::new();
    out.extend_from_slice(&StreamHeader::new().to_bytes());
    for (lane, bytes) in [
        (Lane::Dict, &dict_lane),
        (Lane::Field, &field_lane),
        (Lane::Record, &record_lane),
        (Lane::Edge, &edge_lane),
    ] {
        let len = u32::try_from(bytes.len()).map_err(|_| JournalError::PayloadTooLarge {
            size: bytes.len() as u64,
            max: u32::MAX,
        })?;
        out.push(lane.id());
        out.extend_from_slice(&len.to_le_bytes());
        out.extend_from_slice(bytes);
    }

    tracing::debug!(
        frames = frames.len(),
        dict_entries = dictionary.len(),
        bytes = out.len(),
        "encoded stream"
    );
    Ok(out)
}

fn lookup(dictionary: &Dictionary, category: DictCategory, text: &str) -> Result<u32, JournalError> {
    dictionary
        .index_of(category, text)
        .ok_or_else(|| JournalError::InvalidDictionary(format!("missing entry {:?}", text)))
}

fn encode_body(
    dictionary: &Dictionary,
    kind: FrameKind,
    values: &[FieldValue],
) -> Result<Vec<u8>, JournalError> {
    let schema = schema_for(kind);
    if schema.len() != values.len() {
        return Err(JournalError::InvalidPayload {
            kind: kind.name(),
            reason: format!("{} columns for a {}-field schema", values.len(), schema.len()),
        });
    }
    let mut body = Vec::new();
    for (slot, value) in schema.iter().zip(values) {
        if slot.ty != value.field_type() {
            return Err(JournalError::InvalidPayload {
                kind: kind.name(),
                reason: format!(
                    "field {} is {:?}, schema says {:?}",
                    slot.name,
                    value.field_type(),
                    slot.ty
                ),
            });
        }
        match value {
            FieldValue::U8(v) => body.push(*v),
            FieldValue::U16(v) => body.extend_from_slice(&v.to_le_bytes()),
            FieldValue::U32(v) => body.extend_from_slice(&v.to_le_bytes()),
            FieldValue::I32(v) => body.extend_from_slice(&v.to_le_bytes()),
            FieldValue::F32(v) => body.extend_from_slice(&v.to_le_bytes()),
            FieldValue::Str(text) => {
                let index = lookup(dictionary, slot.category, text)?;
                body.extend_from_slice(&index.to_le_bytes());
            }
            FieldValue::Bytes(bytes) => {
                let len = u32::try_from(bytes.len()).map_err(|_| JournalError::PayloadTooLarge {
                    size: bytes.len() as u64,
                    max: MAX_PAYLOAD_SIZE,
                })?;
                body.extend_from_slice(&len.to_le_bytes());
                body.extend_from_slice(bytes);
            }
        }
    }
    Ok(body)
}
