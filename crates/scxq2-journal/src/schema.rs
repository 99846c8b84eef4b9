//! Fixed per-kind field schemas (lane 1).

use crate::dictionary::DictCategory;
use crate::frame::FrameKind;

/// Column type of a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FieldType {
    /// Unsigned 8-bit integer.
    U8 = 1,
    /// Unsigned 16-bit integer.
    U16 = 2,
    /// Unsigned 32-bit integer.
    U32 = 3,
    /// Signed 32-bit integer.
    I32 = 4,
    /// 32-bit float.
    F32 = 5,
    /// String stored as a `u32` dictionary index.
    Str = 6,
    /// `u32` length followed by raw bytes.
    Bytes = 7,
}

impl FieldType {
    /// Parses the wire byte.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(FieldType::U8),
            2 => Some(FieldType::U16),
            3 => Some(FieldType::U32),
            4 => Some(FieldType::I32),
            5 => Some(FieldType::F32),
            6 => Some(FieldType::Str),
            7 => Some(FieldType::Bytes),
            _ => None,
        }
    }

    /// Wire byte.
    pub fn to_byte(self) -> u8 {
        self as u8
    }
}

/// One column of a frame kind's schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Field name; stored in the dictionary as a symbol.
    pub name: &'static str,
    /// Column type.
    pub ty: FieldType,
    /// Dictionary category for `Str` fields.
    pub category: DictCategory,
}

const fn field(name: &'static str, ty: FieldType) -> FieldSpec {
    FieldSpec {
        name,
        ty,
        category: DictCategory::Symbol,
    }
}

const fn text(name: &'static str, category: DictCategory) -> FieldSpec {
    FieldSpec {
        name,
        ty: FieldType::Str,
        category,
    }
}

use DictCategory::{Abi, Mime, Model, Symbol, Uri};
use FieldType::{Bytes, U16, U32, U8, I32};

const HEADER: &[FieldSpec] = &[
    text("spec_v", Symbol),
    text("stream_id", Symbol),
    text("policy_hash", Symbol),
    text("meta_mime", Mime),
    field("meta", Bytes),
];

const PACK: &[FieldSpec] = &[
    text("pack_hash", Symbol),
    text("model_id", Model),
    text("abi_id", Abi),
    text("tensor_hash", Symbol),
    text("glyph_hash", Symbol),
    text("abi_hash", Symbol),
    text("weights_hash", Model),
    text("runtime_device", Symbol),
    text("runtime_precision", Symbol),
    field("policy_flags", U8),
];

const SEED: &[FieldSpec] = &[text("pack_hash", Symbol), field("seed", I32)];

const START: &[FieldSpec] = &[
    text("pack_hash", Symbol),
    field("call_id", U32),
    text("input_hash", Symbol),
    text("input_ref", Uri),
    field("input_bytes", U32),
];

const END: &[FieldSpec] = &[
    text("pack_hash", Symbol),
    field("call_id", U32),
    text("start_hash", Symbol),
    text("output_hash", Symbol),
    text("output_ref", Uri),
    field("output_bytes", U32),
    field("tokens_used", U32),
];

const ERROR: &[FieldSpec] = &[
    text("pack_hash", Symbol),
    field("call_id", U32),
    text("start_hash", Symbol),
    text("fault", Symbol),
    text("message", Symbol),
    field("meta", Bytes),
];

const TERMINATOR: &[FieldSpec] = &[
    text("final_chain_hash", Symbol),
    field("frame_count", U32),
    field("meta", Bytes),
];

const ROUTE_START: &[FieldSpec] = &[
    text("path", Uri),
    text("method", Symbol),
    text("handler", Symbol),
];

const ROUTE_END: &[FieldSpec] = &[
    text("path", Uri),
    text("handler", Symbol),
    field("status", U16),
];

/// Ordered field schema of `kind`.
pub fn schema_for(kind: FrameKind) -> &'static [FieldSpec] {
    match kind {
        FrameKind::Header => HEADER,
        FrameKind::Pack => PACK,
        FrameKind::Seed => SEED,
        FrameKind::Start => START,
        FrameKind::End => END,
        FrameKind::Error => ERROR,
        FrameKind::Terminator => TERMINATOR,
        FrameKind::RouteStart => ROUTE_START,
        FrameKind::RouteEnd => ROUTE_END,
    }
}

/// A typed column value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// `U8` column.
    U8(u8),
    /// `U16` column.
    U16(u16),
    /// `U32` column.
    U32(u32),
    /// `I32` column.
    I32(i32),
    /// `F32` column.
    F32(f32),
    /// `Str` column, before dictionary indexing.
    Str(String),
    /// `Bytes` column.
    Bytes(Vec<u8>),
}

impl FieldValue {
    /// Column type of this value.
    pub fn field_type(&self) -> FieldType {
        match self {
            FieldValue::U8(_) => FieldType::U8,
            FieldValue::U16(_) => FieldType::U16,
            FieldValue::U32(_) => FieldType::U32,
            FieldValue::I32(_) => FieldType::I32,
            FieldValue::F32(_) => FieldType::F32,
            FieldValue::Str(_) => FieldType::Str,
            FieldValue::Bytes(_) => FieldType::Bytes,
        }
    }
}
