//! Frame schema and binary layout for SCXQ2 capture streams.
//!
//! This crate provides:
//! - The closed set of frame kinds and their typed payloads
//! - A sorted string dictionary shared by every record in a stream
//! - The four-lane `GGL1` encoder and a strict/permissive decoder
//!
//! ## Quick Start
//!
//! ```rust
//! use scxq2_journal::{decode, encode, Frame, FramePayload, ReadMode, RouteStartPayload};
//!
//! let frames = vec![Frame::new(0, FramePayload::RouteStart(RouteStartPayload {
//!     path: "/api/ggl/health".into(),
//!     method: "GET".into(),
//!     handler: "K040".into(),
//! }))];
//!
//! let bytes = encode(&frames)?;
//! let decoded = decode(&bytes, ReadMode::Strict)?;
//! assert_eq!(decoded.frames, frames);
//! assert_eq!(encode(&decoded.frames)?, bytes);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Layout
//!
//! ```text
//! magic "GGL1" | version u16 | lane_count u8 | reserved u8
//! 4x: lane_id u8 | lane_len u32 | lane bytes
//!   0 dict  : varint count | [category u8 | varint len | utf8]*
//!   1 field : varint kinds | [kind u16 | varint n | [type u8 | name varint]*]*
//!   2 lane  : varint count | [kind u16 | tick u32 | payload_ref u32 | chain u32 | body]*
//!   3 edge  : empty
//! ```
//!
//! All integers are little-endian. A record's `chain` of `0` means "no link",
//! so a frame whose link is exactly `h:00000000` decodes with `chain: None`.
//! Ticks are `u32`; wall-clock millisecond ticks do not fit and are rejected
//! when frames are parsed from JSON.

#![deny(missing_docs)]

/// String dictionary (lane 0).
pub mod dictionary;
/// Error types for journal operations.
pub mod errors;
/// Frame kinds and payloads.
pub mod frame;
/// Stream header and lane ids.
pub mod header;
/// Stream decoder.
pub mod reader;
/// Per-kind field schemas (lane 1).
pub mod schema;
/// Low-level byte cursor and varints.
pub mod wire;
/// Stream encoder.
pub mod writer;

pub use dictionary::{DictCategory, Dictionary, DictionaryBuilder};
pub use errors::JournalError;
pub use frame::{
    EndPayload, ErrorPayload, Frame, FrameKind, FramePayload, HeaderPayload, PackPayload,
    RouteEndPayload, RouteStartPayload, SeedPayload, StartPayload, TerminatorPayload,
    SPEC_VERSION,
};
pub use header::{Lane, StreamHeader, MAX_PAYLOAD_SIZE};
pub use reader::{decode, DecodedStream, LaneInfo, ReadMode};
pub use schema::{schema_for, FieldSpec, FieldType, FieldValue};
pub use writer::{encode, StreamWriter};
