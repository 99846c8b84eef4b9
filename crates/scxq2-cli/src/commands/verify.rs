//! Verify command implementation.

use scxq2_core::{verify_chain_json, verify_json, FaultCode};
use serde_json::json;

use super::{load_frames, read_input};
use crate::errors::CliError;
use crate::output::{format_frame_row, format_json, print_frame_header};

pub fn run(stream: String, chain: bool, json_output: bool) -> Result<(), Box<dyn std::error::Error>> {
    let bytes = read_input(Some(stream.as_str()))?;
    let frames = load_frames(&bytes)?;

    let verdict = verify_json(&frames);
    let chain_result = chain.then(|| verify_chain_json(&frames));

    if json_output {
        let chain_json = match &chain_result {
            None => serde_json::Value::Null,
            Some(Ok(head)) => json!({"ok": true, "head": head.to_string()}),
            Some(Err(mismatch)) => json!({
                "ok": false,
                "fault": FaultCode::ChainMismatch.as_str(),
                "mismatch": mismatch,
            }),
        };
        println!(
            "{}",
            format_json(&json!({
                "frames": frames.len(),
                "verdict": verdict.to_value(),
                "chain": chain_json,
            }))
        );
    } else {
        print_frame_header();
        for frame in &frames {
            println!("{}", format_frame_row(frame));
        }
        println!();
        match verdict.fault() {
            None => println!("VERDICT  ok"),
            Some(code) => println!("VERDICT  {}", code.as_str()),
        }
        match &chain_result {
            None => {}
            Some(Ok(head)) => println!("CHAIN    ok {}", head),
            Some(Err(mismatch)) => println!(
                "CHAIN    {} at frame {} ({})",
                FaultCode::ChainMismatch.as_str(),
                mismatch.index,
                mismatch.field
            ),
        }
    }

    if let Some(code) = verdict.fault() {
        return Err(CliError::VerificationFailed(code.as_str().to_string()).into());
    }
    if let Some(Err(mismatch)) = chain_result {
        return Err(CliError::VerificationFailed(format!(
            "{} at frame {}",
            FaultCode::ChainMismatch.as_str(),
            mismatch.index
        ))
        .into());
    }
    Ok(())
}
