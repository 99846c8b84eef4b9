use crate::errors::JournalError;

/// Stream magic bytes: `b"GGL1"`.
pub const MAGIC: &[u8; 4] = b"GGL1";

/// Current layout version: `0x0001`.
pub const VERSION: u16 = 0x0001;

/// Number of lanes in every stream.
pub const LANE_COUNT: u8 = 4;

/// Header size in bytes: 8 bytes.
pub const HEADER_SIZE: usize = 8;

/// Lane prefix size in bytes: `lane_id u8 | lane_len u32`.
pub const LANE_PREFIX_SIZE: usize = 5;

/// Record prefix size in bytes: `kind u16 | tick u32 | payload_ref u32 | chain u32`.
pub const RECORD_PREFIX_SIZE: usize = 14;

/// Maximum record body size: 16 MiB.
pub const MAX_PAYLOAD_SIZE: u32 = 16 * 1024 * 1024;

/// Lane ids, in the order they appear on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Lane {
    /// String dictionary.
    Dict = 0,
    /// Per-kind field schemas.
    Field = 1,
    /// Append-ordered records.
    Record = 2,
    /// Reserved for partial-order edges; always empty.
    Edge = 3,
}

impl Lane {
    /// Every lane, in wire order.
    pub const ALL: [Lane; 4] = [Lane::Dict, Lane::Field, Lane::Record, Lane::Edge];

    /// Wire id.
    pub fn id(self) -> u8 {
        self as u8
    }

    /// Short display name.
    pub fn name(self) -> &'static str {
        match self {
            Lane::Dict => "dict",
            Lane::Field => "field",
            Lane::Record => "lane",
            Lane::Edge => "edge",
        }
    }
}

/// Stream header (8 bytes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamHeader {
    /// Magic bytes: `"GGL1"`.
    pub magic: [u8; 4],
    /// Layout version: `0x0001`.
    pub version: u16,
    /// Lane count: `4`.
    pub lane_count: u8,
    /// Reserved (must be 0).
    pub reserved: u8,
}

impl StreamHeader {
    /// Creates a header for the current layout.
    pub fn new() -> Self {
        Self {
            magic: *MAGIC,
            version: VERSION,
            lane_count: LANE_COUNT,
            reserved: 0,
        }
    }

    /// Serializes the header to bytes.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4..6].copy_from_slice(&self.version.to_le_bytes());
        bytes[6] = self.lane_count;
        bytes[7] = self.reserved;
        bytes
    }

    /// Deserializes a header from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, JournalError> {
        if bytes.len() < HEADER_SIZE {
            return Err(JournalError::InvalidHeader(format!(
                "header too short: {} bytes",
                bytes.len()
            )));
        }

        let magic = [bytes[0], bytes[1], bytes[2], bytes[3]];
        if magic != *MAGIC {
            return Err(JournalError::InvalidHeader(format!(
                "invalid magic: {:?}, expected {:?}",
                magic, MAGIC
            )));
        }

        let version = u16::from_le_bytes([bytes[4], bytes[5]]);
        if version != VERSION {
            return Err(JournalError::InvalidHeader(format!(
                "unsupported version: 0x{:04x}, expected 0x{:04x}",
                version, VERSION
            )));
        }

        let lane_count = bytes[6];
        if lane_count != LANE_COUNT {
            return Err(JournalError::InvalidHeader(format!(
                "lane count {}, expected {}",
                lane_count, LANE_COUNT
            )));
        }

        let reserved = bytes[7];
        if reserved != 0 {
            return Err(JournalError::InvalidHeader(format!(
                "non-zero reserved byte: 0x{:02x}",
                reserved
            )));
        }

        Ok(Self {
            magic,
            version,
            lane_count,
            reserved,
        })
    }
}

impl Default for StreamHeader {
    fn default() -> Self {
        Self::new()
    }
}
