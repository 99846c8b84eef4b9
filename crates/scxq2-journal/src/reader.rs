//! Four-lane stream decoder.

use crate::dictionary::{DictCategory, Dictionary};
use crate::errors::JournalError;
use crate::frame::{Frame, FrameKind, FramePayload};
use crate::header::{Lane, StreamHeader, HEADER_SIZE, MAX_PAYLOAD_SIZE};
use crate::schema::{schema_for, FieldType, FieldValue};
use crate::wire::Cursor;
use scxq2_canonical::ProofHash;
use std::collections::BTreeSet;

/// Read mode for handling truncation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    /// Strict mode: truncated records are errors.
    Strict,
    /// Permissive mode: truncation inside the record lane is treated as
    /// end of stream; every complete record before it is returned.
    Permissive,
}

/// Position and size of one lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaneInfo {
    /// Lane id.
    pub lane: Lane,
    /// Absolute offset of the lane bytes (after the 5-byte prefix).
    pub offset: u64,
    /// Lane length in bytes.
    pub len: u32,
}

/// A decoded stream.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedStream {
    /// Stream header.
    pub header: StreamHeader,
    /// String dictionary.
    pub dictionary: Dictionary,
    /// Kinds declared in the field lane, in tag order.
    pub kinds: Vec<FrameKind>,
    /// Records in append order.
    pub frames: Vec<Frame>,
    /// Lane layout as read.
    pub lanes: Vec<LaneInfo>,
    /// Whether a permissive read stopped at a truncated record.
    pub truncated: bool,
}

/// Decodes a `GGL1` stream.
///
/// # Errors
///
/// Rejects bad magic/version/lane count, lanes out of order, a non-empty
/// edge lane, a field lane that disagrees with the built-in schemas, a
/// record whose kind has no schema, dictionary indices out of range,
/// trailing bytes, and (in [`ReadMode::Strict`]) any truncation.
pub fn decode(bytes: &[u8], mode: ReadMode) -> Result<DecodedStream, JournalError> {
    decode_inner(bytes, mode).map_err(|e| {
        tracing::debug!(error = %e, len = bytes.len(), "rejected stream");
        e
    })
}

fn decode_inner(bytes: &[u8], mode: ReadMode) -> Result<DecodedStream, JournalError> {
    let header = StreamHeader::from_bytes(bytes)?;
    let mut cursor = Cursor::new(&bytes[HEADER_SIZE..], HEADER_SIZE as u64);
    let mut lanes = Vec::with_capacity(Lane::ALL.len());

    let (info, dict_bytes) = read_lane(&mut cursor, Lane::Dict, ReadMode::Strict)?;
    lanes.push(info);
    let dictionary = Dictionary::decode(dict_bytes, info.offset)?;

    let (info, field_bytes) = read_lane(&mut cursor, Lane::Field, ReadMode::Strict)?;
    lanes.push(info);
    let kinds = decode_field_lane(field_bytes, info.offset, &dictionary)?;

    let (info, record_bytes) = read_lane(&mut cursor, Lane::Record, mode)?;
    lanes.push(info);
    let declared_short = u64::from(info.len) > record_bytes.len() as u64;
    let (frames, cut) = decode_record_lane(record_bytes, info.offset, &dictionary, &kinds, mode)?;
    // a permissive read may also lose the edge lane entirely
    let truncated =
        declared_short || cut || (mode == ReadMode::Permissive && cursor.remaining() == 0);

    if truncated {
        return Ok(DecodedStream {
            header,
            dictionary,
            kinds,
            frames,
            lanes,
            truncated,
        });
    }

    let (info, edge_bytes) = read_lane(&mut cursor, Lane::Edge, ReadMode::Strict)?;
    lanes.push(info);
    if !edge_bytes.is_empty() {
        return Err(JournalError::EdgeLaneNotEmpty { len: info.len });
    }

    if cursor.remaining() != 0 {
        return Err(JournalError::TrailingBytes {
            count: cursor.remaining() as u64,
        });
    }

    Ok(DecodedStream {
        header,
        dictionary,
        kinds,
        frames,
        lanes,
        truncated,
    })
}

/// Reads a lane prefix and its bytes. In permissive mode a declared length
/// longer than what is left yields the remaining bytes instead of an error.
fn read_lane<'a>(
    cursor: &mut Cursor<'a>,
    expected: Lane,
    mode: ReadMode,
) -> Result<(LaneInfo, &'a [u8]), JournalError> {
    let id = cursor.read_u8()?;
    if id != expected.id() {
        return Err(JournalError::InvalidLane {
            lane: id,
            reason: format!("expected lane {} ({})", expected.id(), expected.name()),
        });
    }
    let len = cursor.read_u32()?;
    let offset = cursor.offset();
    let bytes = if mode == ReadMode::Permissive && u64::from(len) > cursor.remaining() as u64 {
        cursor.take_rest()
    } else {
        cursor.take(u64::from(len))?
    };
    Ok((
        LaneInfo {
            lane: expected,
            offset,
            len,
        },
        bytes,
    ))
}

fn decode_field_lane(
    bytes: &[u8],
    base_offset: u64,
    dictionary: &Dictionary,
) -> Result<Vec<FrameKind>, JournalError> {
    let mut cursor = Cursor::new(bytes, base_offset);
    let count = cursor.read_varint()?;
    let mut kinds: Vec<FrameKind> = Vec::new();
    for _ in 0..count {
        let offset = cursor.offset();
        let tag = cursor.read_u16()?;
        let kind = FrameKind::from_tag(tag).ok_or(JournalError::UnknownKind { tag, offset })?;
        if kinds.last().is_some_and(|last| *last >= kind) {
            return Err(JournalError::SchemaMismatch(format!(
                "kind {} listed out of order",
                kind.name()
            )));
        }
        let schema = schema_for(kind);
        let n = cursor.read_varint()?;
        if n != schema.len() as u64 {
            return Err(JournalError::SchemaMismatch(format!(
                "{} declares {} fields, expected {}",
                kind.name(),
                n,
                schema.len()
            )));
        }
        for slot in schema {
            let byte = cursor.read_u8()?;
            let index = cursor.read_varint()?;
            let name = u32::try_from(index)
                .ok()
                .and_then(|i| dictionary.get(i));
            if FieldType::from_byte(byte) != Some(slot.ty)
                || name != Some((DictCategory::Symbol, slot.name))
            {
                return Err(JournalError::SchemaMismatch(format!(
                    "{} field {} does not match type byte {} name index {}",
                    kind.name(),
                    slot.name,
                    byte,
                    index
                )));
            }
        }
        kinds.push(kind);
    }
    if cursor.remaining() != 0 {
        return Err(JournalError::InvalidLane {
            lane: Lane::Field.id(),
            reason: format!("{} unread bytes", cursor.remaining()),
        });
    }
    Ok(kinds)
}

/// Returns the records and whether a permissive read stopped early.
fn decode_record_lane(
    bytes: &[u8],
    base_offset: u64,
    dictionary: &Dictionary,
    kinds: &[FrameKind],
    mode: ReadMode,
) -> Result<(Vec<Frame>, bool), JournalError> {
    let declared: BTreeSet<FrameKind> = kinds.iter().copied().collect();
    let mut cursor = Cursor::new(bytes, base_offset);
    let count = match cursor.read_varint() {
        Ok(count) => count,
        Err(JournalError::Truncated { .. }) if mode == ReadMode::Permissive => {
            return Ok((Vec::new(), true))
        }
        Err(e) => return Err(e),
    };
    let mut frames = Vec::new();
    for _ in 0..count {
        match decode_record(&mut cursor, dictionary, &declared) {
            Ok(frame) => frames.push(frame),
            Err(JournalError::Truncated { .. }) if mode == ReadMode::Permissive => {
                return Ok((frames, true))
            }
            Err(e) => return Err(e),
        }
    }
    if cursor.remaining() != 0 {
        return Err(JournalError::InvalidLane {
            lane: Lane::Record.id(),
            reason: format!("{} unread bytes after {} records", cursor.remaining(), count),
        });
    }
    Ok((frames, false))
}

fn decode_record(
    cursor: &mut Cursor<'_>,
    dictionary: &Dictionary,
    declared: &BTreeSet<FrameKind>,
) -> Result<Frame, JournalError> {
    let offset = cursor.offset();
    let tag = cursor.read_u16()?;
    let kind = FrameKind::from_tag(tag)
        .filter(|kind| declared.contains(kind))
        .ok_or(JournalError::UnknownKind { tag, offset })?;
    let tick = cursor.read_u32()?;
    let payload_ref = cursor.read_u32()?;
    let chain = cursor.read_u32()?;
    if payload_ref > MAX_PAYLOAD_SIZE {
        return Err(JournalError::PayloadTooLarge {
            size: u64::from(payload_ref),
            max: MAX_PAYLOAD_SIZE,
        });
    }
    let body_offset = cursor.offset();
    let body = cursor.take(u64::from(payload_ref))?;

    let values = decode_body(kind, body, body_offset, dictionary).map_err(|e| match e {
        // the body length was declared, so a short body is corruption
        JournalError::Truncated { .. } => JournalError::InvalidFrame {
            offset,
            reason: e.to_string(),
        },
        other => other,
    })?;
    let payload = FramePayload::from_fields(kind, values)?;
    Ok(Frame {
        tick,
        payload,
        // 0 is the "no link" sentinel, shared with a genuine h:00000000 link
        chain: (chain != 0).then(|| ProofHash::from_u32(chain)),
    })
}

fn decode_body(
    kind: FrameKind,
    body: &[u8],
    body_offset: u64,
    dictionary: &Dictionary,
) -> Result<Vec<FieldValue>, JournalError> {
    let invalid = |reason: String| JournalError::InvalidFrame {
        offset: body_offset,
        reason,
    };
    let mut fields = Cursor::new(body, body_offset);
    let mut values = Vec::new();
    for slot in schema_for(kind) {
        let value = match slot.ty {
            FieldType::U8 => FieldValue::U8(fields.read_u8()?),
            FieldType::U16 => FieldValue::U16(fields.read_u16()?),
            FieldType::U32 => FieldValue::U32(fields.read_u32()?),
            FieldType::I32 => FieldValue::I32(fields.read_i32()?),
            FieldType::F32 => FieldValue::F32(fields.read_f32()?),
            FieldType::Str => {
                let index = fields.read_u32()?;
                let (category, text) = dictionary.get(index).ok_or_else(|| {
                    invalid(format!(
                        "field {} dictionary index {} out of range",
                        slot.name, index
                    ))
                })?;
                if category != slot.category {
                    return Err(invalid(format!(
                        "field {} points at a {:?} entry",
                        slot.name, category
                    )));
                }
                FieldValue::Str(text.to_string())
            }
            FieldType::Bytes => {
                let len = fields.read_u32()?;
                FieldValue::Bytes(fields.take(u64::from(len))?.to_vec())
            }
        };
        values.push(value);
    }
    if fields.remaining() != 0 {
        return Err(invalid(format!(
            "{} bytes left in {} body",
            fields.remaining(),
            kind.name()
        )));
    }
    Ok(values)
}

