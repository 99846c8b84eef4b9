//! Integration tests for CLI commands.

use scxq2_canonical::SessionId;
use scxq2_core::CaptureService;
use scxq2_journal::{EndPayload, Frame, FramePayload, PackPayload, StartPayload};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

const PACK: &str = "h:00000001";

fn captured_frames() -> Vec<Frame> {
    let service = CaptureService::new(SessionId::parse("cli").unwrap());
    let stream = service.begin(json!({"agent": "cli-test"})).unwrap();
    service
        .capture(
            &stream,
            FramePayload::Pack(PackPayload {
                pack_hash: PACK.into(),
                model_id: "m".into(),
                ..Default::default()
            }),
        )
        .unwrap();
    service
        .capture(
            &stream,
            FramePayload::Start(StartPayload {
                pack_hash: PACK.into(),
                call_id: 1,
                input_hash: "h:0000000a".into(),
                ..Default::default()
            }),
        )
        .unwrap();
    service
        .capture(
            &stream,
            FramePayload::End(EndPayload {
                pack_hash: PACK.into(),
                call_id: 1,
                output_hash: "h:0000000b".into(),
                ..Default::default()
            }),
        )
        .unwrap();
    service.end(&stream, json!({})).unwrap();
    service.export(&stream).unwrap().frames
}

fn write_json(dir: &TempDir, name: &str, value: &Value) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, serde_json::to_vec_pretty(value).unwrap()).unwrap();
    path
}

fn create_frames_file(dir: &TempDir) -> PathBuf {
    let frames: Vec<Value> = captured_frames()
        .iter()
        .map(|f| f.to_value().unwrap())
        .collect();
    write_json(dir, "frames.json", &Value::Array(frames))
}

fn run_cli(args: &[&str]) -> (bool, String, String) {
    let output = Command::new(env!("CARGO_BIN_EXE_scxq2"))
        .args(args)
        .output()
        .expect("Failed to execute CLI");

    let stdout = String::from_utf8(output.stdout).unwrap();
    let stderr = String::from_utf8(output.stderr).unwrap();
    (output.status.success(), stdout, stderr)
}

fn path_str(path: &Path) -> &str {
    path.to_str().unwrap()
}

#[test]
fn test_canonicalize_command() {
    let dir = TempDir::new().unwrap();
    let input = write_json(&dir, "in.json", &json!({"b": 2, "a": [1, {"d": null, "c": true}]}));

    let (success, stdout, _) = run_cli(&["canonicalize", path_str(&input)]);
    assert!(success);
    assert_eq!(stdout.trim(), r#"{"a":[1,{"c":true,"d":null}],"b":2}"#);
}

#[test]
fn test_hash_command_is_order_independent() {
    let dir = TempDir::new().unwrap();
    let a = write_json(&dir, "a.json", &json!({"x": 1, "y": 2}));
    let b = dir.path().join("b.json");
    std::fs::write(&b, r#"{"y":2,"x":1}"#).unwrap();

    let (ok_a, hash_a, _) = run_cli(&["hash", path_str(&a)]);
    let (ok_b, hash_b, _) = run_cli(&["hash", path_str(&b)]);
    assert!(ok_a && ok_b);
    assert_eq!(hash_a, hash_b);
    assert!(hash_a.trim().starts_with("h:"));
    assert_eq!(hash_a.trim().len(), 10);
}

#[test]
fn test_hash_pack_ignores_unlocked_fields() {
    let dir = TempDir::new().unwrap();
    let plain = write_json(&dir, "plain.json", &json!({"model_id": "m", "seed": 3}));
    let decorated = write_json(
        &dir,
        "decorated.json",
        &json!({"model_id": "m", "seed": 3, "ui": {"theme": "dark"}}),
    );

    let (_, plain_hash, _) = run_cli(&["hash", "--pack", path_str(&plain)]);
    let (_, decorated_hash, _) = run_cli(&["hash", "--pack", path_str(&decorated)]);
    let (_, raw_hash, _) = run_cli(&["hash", path_str(&decorated)]);
    assert_eq!(plain_hash, decorated_hash);
    assert_ne!(plain_hash, raw_hash);
}

#[test]
fn test_verify_command_with_chain() {
    let dir = TempDir::new().unwrap();
    let frames = create_frames_file(&dir);

    let (success, stdout, _) = run_cli(&["verify", path_str(&frames), "--chain", "--json"]);
    assert!(success);
    let parsed: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(parsed["verdict"]["ok"], true);
    assert_eq!(parsed["verdict"]["pack_hash"], PACK);
    assert_eq!(parsed["chain"]["ok"], true);
}

#[test]
fn test_verify_command_table() {
    let dir = TempDir::new().unwrap();
    let frames = create_frames_file(&dir);

    let (success, stdout, _) = run_cli(&["verify", path_str(&frames)]);
    assert!(success);
    assert!(stdout.contains("KIND"));
    assert!(stdout.contains("infer.start"));
    assert!(stdout.contains("VERDICT  ok"));
}

#[test]
fn test_verify_command_detects_tampering() {
    let dir = TempDir::new().unwrap();
    let mut frames: Vec<Value> = captured_frames()
        .iter()
        .map(|f| f.to_value().unwrap())
        .collect();
    frames[2]["p"]["input_hash"] = json!("h:000000ff");
    let path = write_json(&dir, "tampered.json", &Value::Array(frames));

    let (success, stdout, stderr) = run_cli(&["verify", path_str(&path), "--chain", "--json"]);
    assert!(!success);
    let parsed: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(parsed["verdict"]["ok"], true);
    assert_eq!(parsed["chain"]["fault"], "E_CHAIN_MISMATCH");
    assert_eq!(parsed["chain"]["mismatch"]["index"], 2);
    assert!(stderr.contains("E_CHAIN_MISMATCH"));
}

#[test]
fn test_verify_command_reports_fault() {
    let dir = TempDir::new().unwrap();
    let path = write_json(
        &dir,
        "nostart.json",
        &json!({"frames": [{"k": "infer.pack", "p": {"pack_hash": PACK}}]}),
    );

    let (success, _, stderr) = run_cli(&["verify", path_str(&path)]);
    assert!(!success);
    assert!(stderr.contains("E_NO_START"));
}

#[test]
fn test_encode_decode_inspect_round_trip() {
    let dir = TempDir::new().unwrap();
    let frames = create_frames_file(&dir);
    let binary = dir.path().join("stream.ggl");

    let (success, stdout, _) = run_cli(&["encode", path_str(&frames), "-o", path_str(&binary)]);
    assert!(success);
    assert!(stdout.contains("Wrote 5 frames"));
    assert_eq!(&std::fs::read(&binary).unwrap()[..4], b"GGL1");

    let (success, stdout, _) = run_cli(&["decode", path_str(&binary)]);
    assert!(success);
    let decoded: Value = serde_json::from_str(&stdout).unwrap();
    let original: Value = serde_json::from_slice(&std::fs::read(&frames).unwrap()).unwrap();
    assert_eq!(decoded["frames"], original);
    assert_eq!(decoded["truncated"], false);

    let (success, stdout, _) = run_cli(&["inspect", path_str(&binary), "--json"]);
    assert!(success);
    let summary: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(summary["lanes"].as_array().unwrap().len(), 4);
    assert_eq!(summary["lanes"][3]["len"], 0);
    assert_eq!(summary["records"]["count"], 5);
    assert_eq!(summary["records"]["per_kind"]["infer.pack"], 1);

    let (success, _, _) = run_cli(&["verify", path_str(&binary), "--chain"]);
    assert!(success);
}

#[test]
fn test_decode_truncated_stream() {
    let dir = TempDir::new().unwrap();
    let frames = create_frames_file(&dir);
    let binary = dir.path().join("stream.ggl");
    assert!(run_cli(&["encode", path_str(&frames), "-o", path_str(&binary)]).0);

    let bytes = std::fs::read(&binary).unwrap();
    let cut = dir.path().join("cut.ggl");
    // lose the edge lane and part of the terminator record
    std::fs::write(&cut, &bytes[..bytes.len() - 12]).unwrap();

    let (strict_ok, _, stderr) = run_cli(&["decode", path_str(&cut)]);
    assert!(!strict_ok);
    assert!(stderr.contains("Error"));

    let (success, stdout, _) = run_cli(&["decode", path_str(&cut), "--permissive"]);
    assert!(success);
    let decoded: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(decoded["truncated"], true);
    assert_eq!(decoded["frames"].as_array().unwrap().len(), 4);
}

#[test]
fn test_dispatch_command() {
    let dir = TempDir::new().unwrap();
    let manifest = write_json(
        &dir,
        "manifest.json",
        &json!({
            "kuhul_server": {
                "routes": {
                    "/api/ggl/infer": {"handler": "K041"},
                    "/api/fs/read": {"handler": "K111"}
                }
            }
        }),
    );
    let body = write_json(
        &dir,
        "body.json",
        &json!({"pack": {"model_id": "m"}, "infer": {"prompt": "hi there"}}),
    );

    let (success, stdout, _) = run_cli(&[
        "dispatch",
        "--manifest",
        path_str(&manifest),
        "--session-id",
        "cli-run",
        "--body",
        path_str(&body),
        "--frames",
        "/api/ggl/infer",
    ]);
    assert!(success);
    let parsed: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(parsed["status"], 200);
    assert_eq!(parsed["body"]["infer"]["output"]["tokens_used"], 2);
    let kinds: Vec<&str> = parsed["frames"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["kind"].as_str().unwrap())
        .collect();
    assert_eq!(
        kinds,
        vec!["hdr", "route.start", "infer.pack", "infer.start", "infer.end", "route.end"]
    );
    assert_eq!(parsed["frames"][0]["p"]["stream_id"], "cli-run:0");

    let (success, stdout, stderr) = run_cli(&[
        "dispatch",
        "--manifest",
        path_str(&manifest),
        "/api/fs/read",
    ]);
    assert!(!success);
    let parsed: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(parsed["body"]["fault"], "K111:E_NOT_IMPL");
    assert!(stderr.contains("K111:E_NOT_IMPL"));
}

#[test]
fn test_dispatch_requires_server_block() {
    let dir = TempDir::new().unwrap();
    let manifest = write_json(&dir, "manifest.json", &json!({"name": "app"}));
    let (success, _, stderr) = run_cli(&["dispatch", "--manifest", path_str(&manifest), "/api/x"]);
    assert!(!success);
    assert!(stderr.contains("kuhul_server"));
}
