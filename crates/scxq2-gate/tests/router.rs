use std::sync::Arc;

use scxq2_gate::{
    AdapterRegistry, Barrier, CaptureMode, EchoAdapter, Gateway, GatewayConfig, GatewayError,
    Request, ServerManifest,
};
use scxq2_journal::{FrameKind, FramePayload};
use serde_json::{json, Value};

fn manifest() -> Value {
    json!({
        "kuhul_server": {
            "routes": {
                "/api/ggl/health": {"method": "GET", "handler": "K040", "cap": "status"},
                "/api/ggl/infer": {
                    "handler": "K041",
                    "cap": "compute",
                    "contract": "xjson://contract/ggl.infer/v1"
                },
                "/api/ggl/verify": {"handler": "K042", "cap": "replay"},
                "/api/fs/list": {"handler": "K110"},
                "/api/ghost": {"handler": "K999"},
                "/api/loose": {"handler": "K040", "contract": "xjson://contract/undeclared/v1"}
            },
            "contracts": {
                "xjson://contract/ggl.infer/v1": {
                    "pack": {"model_id": "string"},
                    "infer": {"prompt": "string"},
                    "trace": "string?"
                }
            },
            "caps": {
                "status": {"kind": "service", "policy": "safe_after_collapse"},
                "compute": {"kind": "local_model"},
                "replay": {"kind": "tool", "policy": "safe_after_collapse"}
            }
        }
    })
}

fn gateway_with(config: GatewayConfig) -> Gateway {
    let server = ServerManifest::from_manifest(&manifest()).unwrap();
    let mut adapters = AdapterRegistry::new();
    adapters.register(Arc::new(EchoAdapter::default()));
    Gateway::new(config, server, adapters).unwrap()
}

fn gateway() -> Gateway {
    gateway_with(GatewayConfig::default())
}

fn infer_body() -> Value {
    json!({
        "pack": {"model_id": "qwen2.5-0.5b", "tensor_hash": "h:00000010", "glyph_hash": "h:00000020"},
        "infer": {"prompt": "hello sealed world", "seed": 7}
    })
}

fn kinds(gateway: &Gateway) -> Vec<FrameKind> {
    gateway
        .capture()
        .export(&gateway.active_stream())
        .unwrap()
        .frames
        .iter()
        .map(|f| f.kind())
        .collect()
}

#[test]
fn test_unknown_path_is_no_route() {
    let gateway = gateway();
    let response = gateway.dispatch(&Request::post("/api/nope", json!({})));
    assert_eq!(response.status, 404);
    assert_eq!(response.body["ok"], false);
    assert_eq!(response.body["fault"], "K100:E_NO_ROUTE");
    assert_eq!(kinds(&gateway), vec![FrameKind::Header]);
}

#[test]
fn test_method_mismatch() {
    let gateway = gateway();
    let response = gateway.dispatch(&Request::post("/api/ggl/health", json!({})));
    assert_eq!(response.status, 405);
    assert_eq!(response.body["fault"], "K100:E_METHOD");
}

#[test]
fn test_unregistered_handler() {
    let gateway = gateway();
    let response = gateway.dispatch(&Request::post("/api/ghost", json!({})));
    assert_eq!(response.status, 500);
    assert_eq!(response.body["fault"], "K100:E_NO_HANDLER");
    assert_eq!(response.body["meta"]["handler"], "K999");
}

#[test]
fn test_undeclared_contract() {
    let gateway = gateway();
    let response = gateway.dispatch(&Request::post("/api/loose", json!({})));
    assert_eq!(response.status, 500);
    assert_eq!(response.body["fault"], "K100:E_NO_CONTRACT");
}

#[test]
fn test_contract_names_missing_field() {
    let gateway = gateway();
    let response = gateway.dispatch(&Request::post("/api/ggl/infer", json!({"pack": {}})));
    assert_eq!(response.status, 400);
    assert_eq!(response.body["fault"], "K100:E_CONTRACT");
    assert_eq!(response.body["message"], "missing field: infer");
    assert_eq!(response.body["meta"]["field"], "infer");
}

#[test]
fn test_health_is_bracketed() {
    let gateway = gateway();
    let response = gateway.dispatch(&Request::new("GET", "/api/ggl/health", Value::Null));
    assert_eq!(response.status, 200);
    assert_eq!(response.body, json!({"ok": true, "provider": "ggl", "plane": 2}));
    assert_eq!(
        kinds(&gateway),
        vec![FrameKind::Header, FrameKind::RouteStart, FrameKind::RouteEnd]
    );
}

#[test]
fn test_not_impl_is_labeled_failure_with_error_frame() {
    let gateway = gateway();
    let response = gateway.dispatch(&Request::post("/api/fs/list", json!({})));
    assert_eq!(response.status, 500);
    assert_eq!(response.body["fault"], "K110:E_NOT_IMPL");
    assert_eq!(response.body["message"], "fs.list adapter not wired yet");

    let snapshot = gateway.capture().export(&gateway.active_stream()).unwrap();
    let error = snapshot
        .frames
        .iter()
        .find_map(|f| match &f.payload {
            FramePayload::Error(p) => Some(p.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(error.fault, "K110:E_NOT_IMPL");
    assert_eq!(error.call_id, 0);
    match &snapshot.frames.last().unwrap().payload {
        FramePayload::RouteEnd(end) => assert_eq!(end.status, 500),
        other => panic!("expected route.end, got {:?}", other),
    }
}

#[test]
fn test_barrier_only_admits_safe_routes() {
    let gateway = gateway();
    gateway.collapse();
    assert_eq!(gateway.barrier(), Barrier::Locked);

    let blocked = gateway.dispatch(&Request::post("/api/ggl/infer", infer_body()));
    assert_eq!(blocked.status, 423);
    assert_eq!(blocked.body["fault"], "K100:E_BARRIER");

    let allowed = gateway.dispatch(&Request::new("GET", "/api/ggl/health", Value::Null));
    assert_eq!(allowed.status, 200);

    let first = gateway.active_stream();
    gateway.new_epoch().unwrap();
    assert_eq!(gateway.barrier(), Barrier::Open);
    assert_ne!(gateway.active_stream(), first);
    assert_eq!(gateway.capture().export_all().len(), 1);
    assert_eq!(gateway.dispatch(&Request::post("/api/ggl/infer", infer_body())).status, 200);
}

fn pinned_gateway(pin: &str) -> Gateway {
    let mut manifest = manifest();
    manifest["kuhul_server"]["policies"] = json!({"proof": {"pin": {"hash": pin}}});
    let server = ServerManifest::from_manifest(&manifest).unwrap();
    let mut adapters = AdapterRegistry::new();
    adapters.register(Arc::new(EchoAdapter::default()));
    Gateway::new(GatewayConfig::default(), server, adapters).unwrap()
}

#[test]
fn test_locked_barrier_admits_pinned_pack() {
    let open = gateway();
    let pack_hash = open.dispatch(&Request::post("/api/ggl/infer", infer_body())).body["pack"]
        ["pack_hash"]
        .as_str()
        .unwrap()
        .to_string();

    let pinned = pinned_gateway(&pack_hash);
    pinned.collapse();
    let admitted = pinned.dispatch(&Request::post("/api/ggl/infer", infer_body()));
    assert_eq!(admitted.status, 200, "{}", admitted.body);
    assert_eq!(admitted.body["pack"]["pack_hash"], pack_hash.as_str());

    let mut other = infer_body();
    other["pack"]["model_id"] = json!("another-model");
    let blocked = pinned.dispatch(&Request::post("/api/ggl/infer", other));
    assert_eq!(blocked.status, 423);
    assert_eq!(blocked.body["fault"], "K100:E_BARRIER");
    assert_eq!(blocked.body["meta"]["pin"], pack_hash.as_str());
    assert_ne!(blocked.body["meta"]["pack_hash"], pack_hash.as_str());
}

#[test]
fn test_pin_mismatch_stays_locked() {
    let gateway = pinned_gateway("h:00000000");
    gateway.collapse();
    let blocked = gateway.dispatch(&Request::post("/api/ggl/infer", infer_body()));
    assert_eq!(blocked.status, 423);
    assert_eq!(blocked.body["meta"]["pin"], "h:00000000");
}

#[test]
fn test_manifest_rejects_unknown_cap_kind_and_bad_pin() {
    let mut bad_cap = manifest();
    bad_cap["kuhul_server"]["caps"]["compute"]["kind"] = json!("infer");
    assert!(matches!(
        ServerManifest::from_manifest(&bad_cap),
        Err(GatewayError::InvalidCap { .. })
    ));

    let mut bad_pin = manifest();
    bad_pin["kuhul_server"]["policies"] = json!({"proof": {"pin": {"hash": "0000abcd"}}});
    assert!(matches!(
        ServerManifest::from_manifest(&bad_pin),
        Err(GatewayError::InvalidPolicy { .. })
    ));
}

#[test]
fn test_lock_after_infer() {
    let gateway = gateway_with(GatewayConfig {
        lock_after_infer: true,
        ..GatewayConfig::default()
    });
    assert_eq!(gateway.dispatch(&Request::post("/api/ggl/infer", infer_body())).status, 200);
    assert_eq!(gateway.barrier(), Barrier::Locked);
    assert_eq!(gateway.dispatch(&Request::post("/api/ggl/infer", infer_body())).status, 423);
}

#[test]
fn test_broadcast_mode_reaches_every_open_stream() {
    let gateway = gateway_with(GatewayConfig {
        capture_mode: CaptureMode::Broadcast,
        ..GatewayConfig::default()
    });
    let side = gateway.capture().begin(json!({"observer": true})).unwrap();
    gateway.dispatch(&Request::new("GET", "/api/ggl/health", Value::Null));

    let side_kinds: Vec<FrameKind> = gateway
        .capture()
        .export(&side)
        .unwrap()
        .frames
        .iter()
        .map(|f| f.kind())
        .collect();
    assert_eq!(
        side_kinds,
        vec![FrameKind::Header, FrameKind::RouteStart, FrameKind::RouteEnd]
    );
    assert_eq!(kinds(&gateway), side_kinds);
}

#[test]
fn test_targeted_mode_leaves_other_streams_alone() {
    let gateway = gateway();
    let side = gateway.capture().begin(json!({})).unwrap();
    gateway.dispatch(&Request::new("GET", "/api/ggl/health", Value::Null));
    assert_eq!(gateway.capture().export(&side).unwrap().frames.len(), 1);
}

#[test]
fn test_invalid_session_id_rejected() {
    let server = ServerManifest::from_manifest(&manifest()).unwrap();
    let config = GatewayConfig {
        session_id: "not a session".into(),
        ..GatewayConfig::default()
    };
    assert!(Gateway::new(config, server, AdapterRegistry::new()).is_err());
}
