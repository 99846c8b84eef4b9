//! Inspect command implementation.

use std::collections::BTreeMap;

use scxq2_journal::{decode, DictCategory, ReadMode};
use serde_json::json;

use super::read_input;
use crate::output::format_json;

fn category_name(category: DictCategory) -> &'static str {
    match category {
        DictCategory::Symbol => "symbol",
        DictCategory::Model => "model",
        DictCategory::Abi => "abi",
        DictCategory::Mime => "mime",
        DictCategory::Uri => "uri",
    }
}

pub fn run(input: String, json_output: bool) -> Result<(), Box<dyn std::error::Error>> {
    let bytes = read_input(Some(input.as_str()))?;
    let stream = decode(&bytes, ReadMode::Permissive)?;

    let mut per_category: BTreeMap<&str, usize> = BTreeMap::new();
    for (category, _) in stream.dictionary.entries() {
        *per_category.entry(category_name(*category)).or_default() += 1;
    }
    let mut per_kind: BTreeMap<&str, usize> = BTreeMap::new();
    for frame in &stream.frames {
        *per_kind.entry(frame.kind().name()).or_default() += 1;
    }

    if json_output {
        let output = json!({
            "bytes": bytes.len(),
            "version": stream.header.version,
            "lanes": stream.lanes.iter().map(|l| json!({
                "id": l.lane.id(),
                "name": l.lane.name(),
                "offset": l.offset,
                "len": l.len,
            })).collect::<Vec<_>>(),
            "dictionary": {"entries": stream.dictionary.len(), "categories": per_category},
            "kinds": stream.kinds.iter().map(|k| k.name()).collect::<Vec<_>>(),
            "records": {"count": stream.frames.len(), "per_kind": per_kind},
            "truncated": stream.truncated,
        });
        println!("{}", format_json(&output));
        return Ok(());
    }

    println!("GGL1 v{}  {} bytes", stream.header.version, bytes.len());
    println!();
    println!("{:<4} {:<6} {:>8} {:>8}", "ID", "LANE", "OFFSET", "LEN");
    for lane in &stream.lanes {
        println!(
            "{:<4} {:<6} {:>8} {:>8}",
            lane.lane.id(),
            lane.lane.name(),
            lane.offset,
            lane.len
        );
    }
    println!();
    println!("dictionary: {} entries", stream.dictionary.len());
    for (category, count) in &per_category {
        println!("  {:<8} {}", category, count);
    }
    println!("records: {}", stream.frames.len());
    for (kind, count) in &per_kind {
        println!("  {:<12} {}", kind, count);
    }
    if stream.truncated {
        println!("truncated: yes");
    }
    Ok(())
}
