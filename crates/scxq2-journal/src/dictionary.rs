//! String deduplication dictionary (lane 0).

use crate::errors::JournalError;
use crate::wire::{write_varint, Cursor};
use std::collections::BTreeSet;

/// Dictionary entry category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum DictCategory {
    /// Keys, field names, hashes, and other short symbols.
    Symbol = 1,
    /// Model and weights identifiers.
    Model = 2,
    /// Adapter ABI identifiers.
    Abi = 3,
    /// MIME types.
    Mime = 4,
    /// URIs such as `idb://...` or `mem://...`, and route paths.
    Uri = 5,
}

impl DictCategory {
    /// Parses the wire byte.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(DictCategory::Symbol),
            2 => Some(DictCategory::Model),
            3 => Some(DictCategory::Abi),
            4 => Some(DictCategory::Mime),
            5 => Some(DictCategory::Uri),
            _ => None,
        }
    }

    /// Wire byte.
    pub fn to_byte(self) -> u8 {
        self as u8
    }
}

/// Collects strings in any order; the built dictionary is sorted.
#[derive(Debug, Default, Clone)]
pub struct DictionaryBuilder {
    entries: BTreeSet<(DictCategory, String)>,
}

impl DictionaryBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a string; duplicates are ignored.
    pub fn insert(&mut self, category: DictCategory, text: &str) {
        self.entries.insert((category, text.to_string()));
    }

    /// Freezes the entries into index order.
    pub fn build(self) -> Dictionary {
        Dictionary {
            entries: self.entries.into_iter().collect(),
        }
    }
}

/// Sorted, deduplicated string table. An entry's index is its position
/// in `(category, text)` order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dictionary {
    entries: Vec<(DictCategory, String)>,
}

impl Dictionary {
    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the dictionary has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in index order.
    pub fn entries(&self) -> &[(DictCategory, String)] {
        &self.entries
    }

    /// Index of `(category, text)`, if present.
    pub fn index_of(&self, category: DictCategory, text: &str) -> Option<u32> {
        self.entries
            .binary_search_by(|(c, t)| (*c, t.as_str()).cmp(&(category, text)))
            .ok()
            .map(|idx| idx as u32)
    }

    /// Entry at `index`.
    pub fn get(&self, index: u32) -> Option<(DictCategory, &str)> {
        self.entries
            .get(index as usize)
            .map(|(c, t)| (*c, t.as_str()))
    }

    /// Appends the lane bytes: `varint count | [category u8 | varint len | utf8]*`.
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        write_varint(out, self.entries.len() as u64);
        for (category, text) in &self.entries {
            out.push(category.to_byte());
            write_varint(out, text.len() as u64);
            out.extend_from_slice(text.as_bytes());
        }
    }

    /// Parses lane bytes, requiring strictly increasing `(category, text)` order.
    pub fn decode(bytes: &[u8], base_offset: u64) -> Result<Self, JournalError> {
        let mut cursor = Cursor::new(bytes, base_offset);
        let count = cursor.read_varint()?;
        let mut entries: Vec<(DictCategory, String)> = Vec::new();
        for _ in 0..count {
            let byte = cursor.read_u8()?;
            let category = DictCategory::from_byte(byte).ok_or_else(|| {
                JournalError::InvalidDictionary(format!("unknown category {}", byte))
            })?;
            let len = cursor.read_varint()?;
            let raw = cursor.take(len)?;
            let text = std::str::from_utf8(raw)?.to_string();
            if let Some(last) = entries.last() {
                if (last.0, last.1.as_str()) >= (category, text.as_str()) {
                    return Err(JournalError::InvalidDictionary(format!(
                        "entry {} is out of order or duplicated",
                        entries.len()
                    )));
                }
            }
            entries.push((category, text));
        }
        if cursor.remaining() != 0 {
            return Err(JournalError::InvalidDictionary(format!(
                "{} unread bytes after {} entries",
                cursor.remaining(),
                count
            )));
        }
        Ok(Self { entries })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_is_independent_of_insertion() {
        let mut first = DictionaryBuilder::new();
        first.insert(DictCategory::Uri, "mem://a");
        first.insert(DictCategory::Symbol, "pack_hash");
        first.insert(DictCategory::Model, "qwen");
        first.insert(DictCategory::Symbol, "call_id");

        let mut second = DictionaryBuilder::new();
        second.insert(DictCategory::Symbol, "call_id");
        second.insert(DictCategory::Model, "qwen");
        second.insert(DictCategory::Symbol, "pack_hash");
        second.insert(DictCategory::Uri, "mem://a");
        second.insert(DictCategory::Symbol, "call_id");

        let first = first.build();
        assert_eq!(first, second.build());
        assert_eq!(first.len(), 4);
        assert_eq!(first.get(0), Some((DictCategory::Symbol, "call_id")));
        assert_eq!(first.index_of(DictCategory::Uri, "mem://a"), Some(3));
    }

    #[test]
    fn same_text_in_two_categories_is_two_entries() {
        let mut builder = DictionaryBuilder::new();
        builder.insert(DictCategory::Symbol, "x");
        builder.insert(DictCategory::Model, "x");
        let dict = builder.build();
        assert_eq!(dict.len(), 2);
        assert_ne!(
            dict.index_of(DictCategory::Symbol, "x"),
            dict.index_of(DictCategory::Model, "x")
        );
    }

    #[test]
    fn lane_round_trip() {
        let mut builder = DictionaryBuilder::new();
        builder.insert(DictCategory::Abi, "transformers.py:v1");
        builder.insert(DictCategory::Symbol, "");
        let dict = builder.build();
        let mut bytes = Vec::new();
        dict.encode_into(&mut bytes);
        assert_eq!(Dictionary::decode(&bytes, 0).unwrap(), dict);
    }

    #[test]
    fn decode_rejects_unsorted_entries() {
        // two Symbol entries, "b" then "a"
        let bytes = [2, 1, 1, b'b', 1, 1, b'a'];
        assert!(matches!(
            Dictionary::decode(&bytes, 0),
            Err(JournalError::InvalidDictionary(_))
        ));
    }

    #[test]
    fn decode_rejects_truncated_entry() {
        let bytes = [1, 1, 5, b'a', b'b'];
        assert!(matches!(
            Dictionary::decode(&bytes, 0),
            Err(JournalError::Truncated { .. })
        ));
    }
}
