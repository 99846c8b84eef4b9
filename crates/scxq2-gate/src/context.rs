//! Request, response, and the per-call context handed to handlers.

use std::sync::Arc;

use scxq2_canonical::{canonicalize_json, ProofHash};
use scxq2_core::{CaptureService, StreamHandle, StreamSnapshot};
use scxq2_journal::{ErrorPayload, FramePayload};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::adapter::{Adapter, AdapterRegistry};
use crate::config::CaptureMode;
use crate::fault::{Fault, FaultCode};

/// An inbound call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// HTTP-style method.
    pub method: String,
    /// Exact route path.
    pub path: String,
    /// Parsed body, `null` when empty.
    #[serde(default)]
    pub body: Value,
}

impl Request {
    /// Builds a request.
    pub fn new(method: impl Into<String>, path: impl Into<String>, body: Value) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            body,
        }
    }

    /// Shorthand for a `POST`.
    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new("POST", path, body)
    }
}

/// A response: status plus JSON body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Status code.
    pub status: u16,
    /// JSON body.
    pub body: Value,
}

impl Response {
    /// `200` with a body.
    pub fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    /// The normalized fault response.
    pub fn from_fault(fault: &Fault) -> Self {
        Self {
            status: fault.status,
            body: fault.body(),
        }
    }

    /// Whether the status is 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// State for one in-flight call.
///
/// Handlers capture through the context so every frame lands in the
/// gateway's configured targets, and so a fault can be mirrored with the
/// pack hash and call id the handler established.
pub struct CallContext<'a> {
    capture: &'a CaptureService,
    stream: &'a StreamHandle,
    mode: CaptureMode,
    adapters: &'a AdapterRegistry,
    path: String,
    handler: String,
    contract: Option<String>,
    pack_hash: Option<String>,
    call_id: u32,
    start_hash: Option<String>,
}

impl<'a> CallContext<'a> {
    pub(crate) fn new(
        capture: &'a CaptureService,
        stream: &'a StreamHandle,
        mode: CaptureMode,
        adapters: &'a AdapterRegistry,
        path: &str,
        handler: &str,
        contract: Option<&str>,
    ) -> Self {
        Self {
            capture,
            stream,
            mode,
            adapters,
            path: path.to_string(),
            handler: handler.to_string(),
            contract: contract.map(str::to_string),
            pack_hash: None,
            call_id: 0,
            start_hash: None,
        }
    }

    /// Route path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Handler id; also the section of faults the handler raises.
    pub fn handler(&self) -> &str {
        &self.handler
    }

    /// Contract id declared by the route.
    pub fn contract(&self) -> Option<&str> {
        self.contract.as_deref()
    }

    /// Pack hash bound by [`CallContext::begin_call`].
    pub fn pack_hash(&self) -> Option<&str> {
        self.pack_hash.as_deref()
    }

    /// Call id, `0` before [`CallContext::begin_call`].
    pub fn call_id(&self) -> u32 {
        self.call_id
    }

    /// Adapter for an ABI id.
    pub fn adapter(&self, abi_id: &str) -> Option<Arc<dyn Adapter>> {
        self.adapters.get(abi_id)
    }

    /// Binds the call to a pack and allocates its call id.
    pub fn begin_call(&mut self, pack_hash: &str) -> Result<u32, Fault> {
        let call_id = self
            .capture
            .next_call_id(self.stream)
            .map_err(|err| Fault::unknown(self.handler.as_str(), &err))?;
        self.pack_hash = Some(pack_hash.to_string());
        self.call_id = call_id;
        Ok(call_id)
    }

    /// Records the hash of the start payload; returns it.
    pub fn mark_started(&mut self, start: &FramePayload) -> Result<String, Fault> {
        let value = start
            .to_value()
            .map_err(|err| Fault::unknown(self.handler.as_str(), &err))?;
        let hash = ProofHash::of_text(&canonicalize_json(&value)).to_string();
        self.start_hash = Some(hash.clone());
        Ok(hash)
    }

    /// Captures a frame into the configured targets.
    pub fn capture(&self, payload: FramePayload) -> Result<(), Fault> {
        capture_into(self.capture, self.stream, self.mode, payload)
            .map_err(|err| Fault::unknown(self.handler.as_str(), &err))
    }

    /// Snapshot of a retained stream; `None` is the gateway's active stream.
    pub fn snapshot(&self, stream_id: Option<&str>) -> Result<StreamSnapshot, Fault> {
        let handle = match stream_id {
            None => self.stream.clone(),
            Some(id) => self.capture.find(id).ok_or_else(|| {
                Fault::new(
                    self.handler.as_str(),
                    FaultCode::Contract,
                    format!("unknown stream: {}", id),
                )
                .with_meta(json!({"stream_id": id}))
            })?,
        };
        self.capture
            .export(&handle)
            .map_err(|err| Fault::unknown(self.handler.as_str(), &err))
    }

    /// Mirror of a fault as an `infer.error` payload.
    pub(crate) fn error_payload(&self, fault: &Fault) -> FramePayload {
        FramePayload::Error(ErrorPayload {
            pack_hash: self.pack_hash.clone().unwrap_or_default(),
            call_id: self.call_id,
            start_hash: self.start_hash.clone().unwrap_or_default(),
            fault: fault.label(),
            message: fault.message.clone(),
            meta: fault.meta.clone(),
        })
    }
}

pub(crate) fn capture_into(
    capture: &CaptureService,
    stream: &StreamHandle,
    mode: CaptureMode,
    payload: FramePayload,
) -> Result<(), scxq2_core::CoreError> {
    match mode {
        CaptureMode::Targeted => capture.capture(stream, payload).map(|_| ()),
        CaptureMode::Broadcast => capture.broadcast(payload).map(|_| ()),
    }
}
