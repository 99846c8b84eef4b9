//! Encode command implementation.

use scxq2_journal::{Frame, StreamWriter};

use super::{frame_list, read_json};

pub fn run(input: String, output: String) -> Result<(), Box<dyn std::error::Error>> {
    let frames = frame_list(read_json(Some(input.as_str()))?)?;

    let mut writer = StreamWriter::new();
    for (index, value) in frames.into_iter().enumerate() {
        let frame: Frame = serde_json::from_value(value)
            .map_err(|e| format!("Invalid frame at index {}: {}", index, e))?;
        writer.push(frame);
    }
    let count = writer.len();
    let bytes = writer.finish()?;

    std::fs::write(&output, &bytes)
        .map_err(|e| format!("Failed to write file {}: {}", output, e))?;
    tracing::info!(frames = count, bytes = bytes.len(), output = %output, "stream encoded");
    println!("Wrote {} frames ({} bytes) to {}", count, bytes.len(), output);
    Ok(())
}
