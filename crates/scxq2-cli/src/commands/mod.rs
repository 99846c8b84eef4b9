//! Subcommands and the input helpers they share.

pub mod canonicalize;
pub mod decode;
pub mod dispatch;
pub mod encode;
pub mod hash;
pub mod inspect;
pub mod verify;

use std::io::Read;

use scxq2_journal::{decode as decode_stream, Frame, ReadMode};
use serde_json::Value;

use crate::errors::CliError;

/// Reads a file, or stdin when no path is given.
pub fn read_input(path: Option<&str>) -> Result<Vec<u8>, CliError> {
    match path {
        Some(path) => std::fs::read(path).map_err(|source| CliError::Read {
            path: path.to_string(),
            source,
        }),
        None => {
            let mut buffer = Vec::new();
            std::io::stdin()
                .read_to_end(&mut buffer)
                .map_err(|source| CliError::Read {
                    path: "<stdin>".to_string(),
                    source,
                })?;
            Ok(buffer)
        }
    }
}

/// Reads and parses a JSON file, or stdin when no path is given.
pub fn read_json(path: Option<&str>) -> Result<Value, Box<dyn std::error::Error>> {
    let bytes = read_input(path)?;
    serde_json::from_slice(&bytes).map_err(|e| format!("Invalid JSON: {}", e).into())
}

/// Frames from JSON (an array, or an object with `frames`) or from a GGL1
/// binary stream, as JSON values.
pub fn load_frames(bytes: &[u8]) -> Result<Vec<Value>, Box<dyn std::error::Error>> {
    if bytes.starts_with(scxq2_journal::header::MAGIC) {
        let decoded = decode_stream(bytes, ReadMode::Strict)?;
        return Ok(decoded
            .frames
            .iter()
            .map(Frame::to_value)
            .collect::<Result<Vec<_>, _>>()?);
    }
    let value: Value =
        serde_json::from_slice(bytes).map_err(|e| format!("Invalid JSON: {}", e))?;
    frame_list(value)
}

/// Unwraps `{frames: [...]}` or `[...]`.
pub fn frame_list(value: Value) -> Result<Vec<Value>, Box<dyn std::error::Error>> {
    match value {
        Value::Array(frames) => Ok(frames),
        Value::Object(mut object) => match object.remove("frames") {
            Some(Value::Array(frames)) => Ok(frames),
            _ => Err(CliError::InvalidFrames("object has no frames array".to_string()).into()),
        },
        _ => Err(CliError::InvalidFrames("expected an array of frames".to_string()).into()),
    }
}
