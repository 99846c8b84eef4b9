use thiserror::Error;

/// Errors that can occur while building, encoding, or decoding frames.
#[derive(Error, Debug)]
pub enum JournalError {
    /// Invalid stream header (magic, version, lane count, or reserved byte).
    #[error("invalid stream header: {0}")]
    InvalidHeader(String),
    /// A lane is missing, out of order, or malformed.
    #[error("invalid lane {lane}: {reason}")]
    InvalidLane {
        /// Lane id.
        lane: u8,
        /// Reason for invalidity.
        reason: String,
    },
    /// The reserved edge lane carried data.
    #[error("edge lane must be empty, found {len} bytes")]
    EdgeLaneNotEmpty {
        /// Byte length of the edge lane.
        len: u32,
    },
    /// Dictionary section is malformed or unsorted.
    #[error("invalid dictionary: {0}")]
    InvalidDictionary(String),
    /// The field-schema lane disagrees with the built-in schema.
    #[error("field schema mismatch: {0}")]
    SchemaMismatch(String),
    /// A record's kind has no schema.
    #[error("unknown frame kind {tag} at offset {offset}")]
    UnknownKind {
        /// Wire tag found in the record.
        tag: u16,
        /// Byte offset of the record.
        offset: u64,
    },
    /// Invalid record structure.
    #[error("invalid frame at offset {offset}: {reason}")]
    InvalidFrame {
        /// Byte offset where the record starts.
        offset: u64,
        /// Reason for invalidity.
        reason: String,
    },
    /// A declared length runs past the end of the available bytes.
    #[error("truncated stream at offset {offset}: need {needed} bytes, {available} available")]
    Truncated {
        /// Byte offset where the read started.
        offset: u64,
        /// Bytes the declared length requires.
        needed: u64,
        /// Bytes actually left.
        available: u64,
    },
    /// Bytes left over after the last lane.
    #[error("{count} trailing bytes after the last lane")]
    TrailingBytes {
        /// Number of unread bytes.
        count: u64,
    },
    /// Payload exceeds maximum size limit.
    #[error("payload size {size} exceeds maximum {max}")]
    PayloadTooLarge {
        /// Actual payload size.
        size: u64,
        /// Maximum allowed size.
        max: u32,
    },
    /// Frame payload does not fit its kind.
    #[error("invalid {kind} payload: {reason}")]
    InvalidPayload {
        /// Frame kind name.
        kind: &'static str,
        /// Reason for invalidity.
        reason: String,
    },
    /// Invalid UTF-8 in a dictionary entry.
    #[error("invalid UTF-8 in dictionary entry: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),
    /// A JSON frame's tick does not fit the `u32` record field.
    #[error("tick {0} exceeds u32; ticks are per-stream counters")]
    TickOutOfRange(u64),
    /// JSON error while projecting or parsing a payload.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
