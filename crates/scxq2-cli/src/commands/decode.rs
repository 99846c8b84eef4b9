//! Decode command implementation.

use scxq2_journal::{decode, Frame, ReadMode};
use serde_json::json;

use super::read_input;
use crate::output::format_json;

pub fn run(input: String, permissive: bool) -> Result<(), Box<dyn std::error::Error>> {
    let bytes = read_input(Some(input.as_str()))?;
    let mode = if permissive {
        ReadMode::Permissive
    } else {
        ReadMode::Strict
    };
    let stream = decode(&bytes, mode)?;
    if stream.truncated {
        eprintln!("Warning: stream truncated after {} frames", stream.frames.len());
    }

    let frames = stream
        .frames
        .iter()
        .map(Frame::to_value)
        .collect::<Result<Vec<_>, _>>()?;
    println!(
        "{}",
        format_json(&json!({"truncated": stream.truncated, "frames": frames}))
    );
    Ok(())
}
