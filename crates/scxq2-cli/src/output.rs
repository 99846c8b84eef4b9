//! Output formatting utilities.

use serde_json::Value;

/// Formats a value as pretty JSON.
pub fn format_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}

/// Formats a frame as a simple table row.
pub fn format_frame_row(frame: &Value) -> String {
    let tick = frame
        .get("t")
        .and_then(|v| v.as_u64())
        .map(|t| t.to_string())
        .unwrap_or_else(|| "?".to_string());
    let kind = frame
        .get("kind")
        .or_else(|| frame.get("k"))
        .and_then(|v| v.as_str())
        .unwrap_or("?");
    let pack_hash = frame
        .get("p")
        .or_else(|| frame.get("payload"))
        .and_then(|p| p.get("pack_hash"))
        .and_then(|v| v.as_str())
        .unwrap_or("-");
    let chain = frame.get("ch").and_then(|v| v.as_str()).unwrap_or("-");

    format!(
        "{:<6} {:<14} {:<12} {}",
        tick,
        truncate(kind, 14),
        truncate(pack_hash, 12),
        chain
    )
}

/// Prints frame table header.
#[allow(clippy::print_literal)]
pub fn print_frame_header() {
    println!("{:<6} {:<14} {:<12} {}", "TICK", "KIND", "PACK_HASH", "CHAIN");
    println!("{}", "-".repeat(46));
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
