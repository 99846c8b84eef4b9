//! Dispatch command implementation.

use std::sync::Arc;

use scxq2_gate::{
    AdapterRegistry, CaptureMode, EchoAdapter, Gateway, GatewayConfig, Request, ServerManifest,
};
use scxq2_journal::Frame;
use serde_json::{json, Value};

use super::read_json;
use crate::errors::CliError;
use crate::output::format_json;

pub struct DispatchArgs {
    pub manifest: String,
    pub config: Option<String>,
    pub session_id: Option<String>,
    pub broadcast: bool,
    pub method: String,
    pub path: String,
    pub body: Option<String>,
    pub frames: bool,
}

pub fn run(args: DispatchArgs) -> Result<(), Box<dyn std::error::Error>> {
    let server = ServerManifest::from_manifest(&read_json(Some(args.manifest.as_str()))?)?;

    let mut config: GatewayConfig = match &args.config {
        Some(path) => serde_json::from_value(read_json(Some(path.as_str()))?)
            .map_err(|e| format!("Invalid config {}: {}", path, e))?,
        None => GatewayConfig::default(),
    };
    if let Some(session_id) = args.session_id {
        config.session_id = session_id;
    }
    if args.broadcast {
        config.capture_mode = CaptureMode::Broadcast;
    }

    let mut adapters = AdapterRegistry::new();
    adapters.register(Arc::new(EchoAdapter::default()));
    let gateway = Gateway::new(config, server, adapters)?;

    let body = match &args.body {
        Some(path) => read_json(Some(path.as_str()))?,
        None => Value::Null,
    };
    let response = gateway.dispatch(&Request::new(args.method, args.path, body));

    let mut output = json!({"status": response.status, "body": response.body});
    if args.frames {
        let frames = gateway
            .capture()
            .export(&gateway.active_stream())?
            .frames
            .iter()
            .map(Frame::to_value)
            .collect::<Result<Vec<_>, _>>()?;
        output["frames"] = Value::Array(frames);
    }
    println!("{}", format_json(&output));

    if !response.is_success() {
        let fault = response
            .body
            .get("fault")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        return Err(CliError::CallFailed {
            status: response.status,
            fault,
        }
        .into());
    }
    Ok(())
}
