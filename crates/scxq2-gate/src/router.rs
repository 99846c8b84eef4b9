//! Contract-gated router.
//!
//! Per call: exact path lookup, method check, handler lookup, then
//! `route.start`, barrier, contract, handler, and `route.end`. A locked
//! barrier admits safe routes and calls whose pack hash matches the
//! manifest's proof pin. Faults raised after `route.start` are mirrored into
//! an `infer.error` frame on a best-effort basis; failure to capture never
//! changes the response. A panicking handler is answered as `E_UNKNOWN` and
//! still gets `route.end`.

use std::any::Any;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Mutex, MutexGuard, PoisonError};

use scxq2_canonical::SessionId;
use scxq2_core::{CaptureService, StreamHandle};
use scxq2_journal::{FramePayload, RouteEndPayload, RouteStartPayload};
use serde_json::{json, Value};

use crate::adapter::AdapterRegistry;
use crate::config::{CaptureMode, GatewayConfig, Route, ServerManifest};
use crate::context::{capture_into, CallContext, Request, Response};
use crate::contract::Contract;
use crate::errors::GatewayError;
use crate::fault::{Fault, FaultCode};
use crate::handlers::{self, INFER_HANDLER};

/// Post-collapse barrier state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Barrier {
    /// Every route may run.
    Open,
    /// Only routes whose cap is `safe_after_collapse` may run.
    Locked,
}

#[derive(Debug)]
struct Epoch {
    barrier: Barrier,
    stream: StreamHandle,
}

/// Routes calls to handlers and captures every call into the session's streams.
#[derive(Debug)]
pub struct Gateway {
    config: GatewayConfig,
    server: ServerManifest,
    contracts: BTreeMap<String, Contract>,
    adapters: AdapterRegistry,
    capture: CaptureService,
    epoch: Mutex<Epoch>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A panicking handler or adapter becomes an `E_UNKNOWN` fault.
fn panic_fault(section: &str, payload: &(dyn Any + Send)) -> Fault {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "handler panicked".to_string());
    Fault::new(section, FaultCode::Unknown, message)
}

fn stream_meta(config: &GatewayConfig) -> Value {
    json!({"section": config.section, "capture_mode": config.capture_mode})
}

impl Gateway {
    /// Builds a gateway and opens its first stream.
    pub fn new(
        config: GatewayConfig,
        server: ServerManifest,
        adapters: AdapterRegistry,
    ) -> Result<Self, GatewayError> {
        server.validate()?;
        let contracts = server
            .contracts
            .iter()
            .map(|(id, descriptor)| Ok((id.clone(), Contract::from_value(id, descriptor)?)))
            .collect::<Result<BTreeMap<_, _>, GatewayError>>()?;
        let capture = CaptureService::new(SessionId::parse(config.session_id.as_str())?);
        let stream = capture.begin(stream_meta(&config))?;
        tracing::debug!(
            session = %config.session_id,
            routes = server.routes.len(),
            adapters = adapters.len(),
            "gateway ready"
        );
        Ok(Self {
            config,
            server,
            contracts,
            adapters,
            capture,
            epoch: Mutex::new(Epoch {
                barrier: Barrier::Open,
                stream,
            }),
        })
    }

    /// Gateway configuration.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Server manifest the gateway routes by.
    pub fn server(&self) -> &ServerManifest {
        &self.server
    }

    /// Capture service owning every stream of this session.
    pub fn capture(&self) -> &CaptureService {
        &self.capture
    }

    /// Stream that targeted captures land in.
    pub fn active_stream(&self) -> StreamHandle {
        lock(&self.epoch).stream.clone()
    }

    /// Current barrier state.
    pub fn barrier(&self) -> Barrier {
        lock(&self.epoch).barrier
    }

    /// Locks the barrier.
    pub fn collapse(&self) {
        let mut epoch = lock(&self.epoch);
        if epoch.barrier == Barrier::Open {
            tracing::debug!(stream = %epoch.stream, "barrier locked");
        }
        epoch.barrier = Barrier::Locked;
    }

    /// Ends the active stream, drops every retained stream, reopens the
    /// barrier, and starts a fresh active stream.
    ///
    /// Returns the frozen end hash of the stream that was active.
    pub fn new_epoch(&self) -> Result<Option<scxq2_canonical::ProofHash>, GatewayError> {
        let mut epoch = lock(&self.epoch);
        let end_hash = self.capture.end(&epoch.stream, json!({"reason": "epoch"}))?;
        self.capture.reset_all();
        epoch.stream = self.capture.begin(stream_meta(&self.config))?;
        epoch.barrier = Barrier::Open;
        tracing::debug!(stream = %epoch.stream, "epoch started");
        Ok(end_hash)
    }

    /// Runs one call. Never fails; every failure is a fault response.
    pub fn dispatch(&self, request: &Request) -> Response {
        let section = self.config.section.as_str();
        let route = match self.resolve(request) {
            Ok(route) => route,
            Err(fault) => {
                tracing::warn!(fault = %fault.label(), path = %request.path, "call rejected");
                return Response::from_fault(&fault);
            }
        };
        let Some(handler) = handlers::lookup(&route.handler) else {
            let fault = Fault::new(
                section,
                FaultCode::NoHandler,
                format!("no handler {}", route.handler),
            )
            .with_meta(json!({"handler": route.handler}));
            tracing::warn!(fault = %fault.label(), path = %request.path, "call rejected");
            return Response::from_fault(&fault);
        };

        let (stream, barrier) = {
            let epoch = lock(&self.epoch);
            (epoch.stream.clone(), epoch.barrier)
        };
        let mode = self.config.capture_mode;
        self.capture_best_effort(
            &stream,
            mode,
            FramePayload::RouteStart(RouteStartPayload {
                path: request.path.clone(),
                method: request.method.clone(),
                handler: route.handler.clone(),
            }),
        );

        let mut ctx = CallContext::new(
            &self.capture,
            &stream,
            mode,
            &self.adapters,
            &request.path,
            &route.handler,
            route.contract.as_deref(),
        );
        let outcome = self.admit(route, barrier, &request.body).and_then(|()| {
            panic::catch_unwind(AssertUnwindSafe(|| handler(&mut ctx, &request.body)))
                .unwrap_or_else(|payload| Err(panic_fault(section, payload.as_ref())))
        });

        let response = match outcome {
            Ok(response) => {
                if self.config.lock_after_infer && route.handler == INFER_HANDLER {
                    self.collapse();
                }
                response
            }
            Err(fault) => {
                tracing::warn!(
                    fault = %fault.label(),
                    path = %request.path,
                    call_id = ctx.call_id(),
                    "call failed"
                );
                self.capture_best_effort(&stream, mode, ctx.error_payload(&fault));
                Response::from_fault(&fault)
            }
        };

        self.capture_best_effort(
            &stream,
            mode,
            FramePayload::RouteEnd(RouteEndPayload {
                path: request.path.clone(),
                handler: route.handler.clone(),
                status: response.status,
            }),
        );
        response
    }

    fn resolve(&self, request: &Request) -> Result<&Route, Fault> {
        let section = self.config.section.as_str();
        let route = self.server.routes.get(&request.path).ok_or_else(|| {
            Fault::new(section, FaultCode::NoRoute, format!("no route for {}", request.path))
                .with_meta(json!({"path": request.path}))
        })?;
        if route.method != request.method {
            return Err(Fault::new(
                section,
                FaultCode::Method,
                format!("{} expects {}", request.path, route.method),
            )
            .with_meta(json!({"expected": route.method, "found": request.method})));
        }
        Ok(route)
    }

    fn admit(&self, route: &Route, barrier: Barrier, body: &Value) -> Result<(), Fault> {
        let section = self.config.section.as_str();
        if barrier == Barrier::Locked
            && !self
                .server
                .cap_for(route)
                .is_some_and(|cap| cap.safe_after_collapse())
        {
            let pinned = handlers::requested_pack_hash(body);
            if !self.server.policies.pin_matches(pinned) {
                return Err(Fault::new(section, FaultCode::Barrier, "barrier locked after collapse")
                    .with_meta(json!({
                        "handler": route.handler,
                        "cap": route.cap,
                        "pin": self.server.policies.pin(),
                        "pack_hash": pinned.map(|hash| hash.to_string()),
                    })));
            }
        }
        let Some(contract_id) = route.contract.as_deref() else {
            return Ok(());
        };
        let contract = self.contracts.get(contract_id).ok_or_else(|| {
            Fault::new(section, FaultCode::NoContract, format!("unknown contract {}", contract_id))
                .with_meta(json!({"contract": contract_id}))
        })?;
        contract.validate(body).map_err(|violation| {
            Fault::new(section, FaultCode::Contract, violation.to_string())
                .with_meta(json!({"contract": contract_id, "field": violation.field()}))
        })
    }

    fn capture_best_effort(&self, stream: &StreamHandle, mode: CaptureMode, payload: FramePayload) {
        let kind = payload.kind().name();
        if let Err(err) = capture_into(&self.capture, stream, mode, payload) {
            tracing::warn!(stream = %stream, kind, error = %err, "capture dropped");
        }
    }
}
