use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::canonicalizer::{canonicalize, canonicalize_serialize, CanonicalizationError};
use crate::validation::ValidationError;
use crate::value::CanonicalValue;

/// Prefix of every rendered proof hash.
pub const HASH_PREFIX: &str = "h:";

/// FNV-1a 32-bit offset basis.
const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;

/// FNV-1a 32-bit over raw bytes.
///
/// The multiply step is spelled as the shift-add form
/// `h + (h<<1) + (h<<4) + (h<<7) + (h<<8) + (h<<24)`, i.e. `h * 0x01000193 mod 2^32`.
pub fn fnv1a32(bytes: &[u8]) -> u32 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |h, byte| {
        let h = h ^ u32::from(*byte);
        h.wrapping_add(h << 1)
            .wrapping_add(h << 4)
            .wrapping_add(h << 7)
            .wrapping_add(h << 8)
            .wrapping_add(h << 24)
    })
}

/// 32-bit identity fingerprint rendered as `h:` + 8 lowercase hex digits.
///
/// This is not a security primitive; collisions are expected to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ProofHash(u32);

impl ProofHash {
    /// The all-zero sentinel `h:00000000`, used as the chain seed.
    pub const ZERO: ProofHash = ProofHash(0);

    /// Wraps a raw 32-bit value.
    pub fn from_u32(value: u32) -> Self {
        Self(value)
    }

    /// Raw 32-bit value.
    pub fn value(self) -> u32 {
        self.0
    }

    /// Hashes the UTF-8 bytes of `text`.
    pub fn of_text(text: &str) -> Self {
        Self(fnv1a32(text.as_bytes()))
    }

    /// Hashes the canonical text of `value`.
    pub fn of_canonical(value: &CanonicalValue) -> Self {
        Self::of_text(&canonicalize(value))
    }

    /// Parses `h:` + exactly 8 lowercase hex digits.
    pub fn parse(text: &str) -> Result<Self, ValidationError> {
        let re = Regex::new(r"^h:[0-9a-f]{8}$").expect("invalid regex");
        let mismatch = || ValidationError::PatternMismatch {
            field: "proof_hash",
            value: text.to_string(),
        };
        if !re.is_match(text) {
            return Err(mismatch());
        }
        u32::from_str_radix(&text[HASH_PREFIX.len()..], 16)
            .map(Self)
            .map_err(|_| mismatch())
    }
}

/// Hashes the canonical JSON projection of any serializable value.
pub fn hash_serialize<T: Serialize + ?Sized>(value: &T) -> Result<ProofHash, CanonicalizationError> {
    Ok(ProofHash::of_text(&canonicalize_serialize(value)?))
}

impl fmt::Display for ProofHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:08x}", HASH_PREFIX, self.0)
    }
}

impl FromStr for ProofHash {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<ProofHash> for String {
    fn from(value: ProofHash) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for ProofHash {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}
