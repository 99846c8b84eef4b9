use scxq2_canonical::{PackProofPayload, SessionId};
use scxq2_core::{verify, verify_chain, verify_json, CaptureService, FaultCode, Verdict};
use scxq2_journal::{EndPayload, FramePayload, PackPayload, SeedPayload, StartPayload};
use serde_json::{json, Value};

const PACK: &str = "h:00000001";

fn make_frames() -> Vec<Value> {
    vec![
        json!({"kind": "infer.pack", "t": 0, "p": {"pack_hash": PACK}}),
        json!({"kind": "infer.start", "t": 1, "p": {"pack_hash": PACK, "input_hash": "h:0a"}}),
        json!({"kind": "infer.end", "t": 2, "p": {"pack_hash": PACK, "output_hash": "h:0b"}}),
    ]
}

#[test]
fn test_verify_minimal_call() {
    let verdict = verify_json(&make_frames());
    assert_eq!(
        verdict.to_value(),
        json!({"ok": true, "pack_hash": PACK, "input_hash": "h:0a", "output_hash": "h:0b"})
    );
}

#[test]
fn test_verify_accepts_short_keys() {
    let frames: Vec<Value> = make_frames()
        .into_iter()
        .map(|f| json!({"k": f["kind"], "t": f["t"], "payload": f["p"]}))
        .collect();
    assert!(verify_json(&frames).is_ok());
}

#[test]
fn test_missing_start_is_no_start() {
    let mut frames = make_frames();
    frames.remove(1);
    assert_eq!(verify_json(&frames), Verdict::Failed(FaultCode::NoStart));
}

#[test]
fn test_end_with_other_pack_is_link_fail() {
    let mut frames = make_frames();
    frames[2]["p"]["pack_hash"] = json!("h:00000002");
    assert_eq!(verify_json(&frames).fault(), Some(FaultCode::LinkFail));
}

#[test]
fn test_non_integer_seed_is_bad_seed() {
    let mut frames = make_frames();
    frames.push(json!({"kind": "infer.seed", "t": 3, "p": {"pack_hash": PACK, "seed": 1.5}}));
    assert_eq!(verify_json(&frames).fault(), Some(FaultCode::BadSeed));

    frames[3]["p"]["seed"] = json!("42");
    assert_eq!(verify_json(&frames).fault(), Some(FaultCode::BadSeed));

    frames[3]["p"]["seed"] = json!(42);
    assert!(verify_json(&frames).is_ok());
}

#[test]
fn test_seed_for_other_pack_is_ignored() {
    let mut frames = make_frames();
    frames.push(json!({"kind": "infer.seed", "t": 3, "p": {"pack_hash": "h:00000009", "seed": "x"}}));
    assert!(verify_json(&frames).is_ok());
}

#[test]
fn test_empty_hashes_fail() {
    let mut frames = make_frames();
    frames[1]["p"]["input_hash"] = json!("");
    assert_eq!(verify_json(&frames).fault(), Some(FaultCode::InputHashMissing));

    let mut frames = make_frames();
    frames[2]["p"].as_object_mut().unwrap().remove("output_hash");
    assert_eq!(verify_json(&frames).fault(), Some(FaultCode::OutputHashMissing));
}

#[test]
fn test_active_pack_is_most_recent() {
    let mut frames = make_frames();
    // a later pack with its own call; linkage is by value, not position
    frames.insert(
        0,
        json!({"kind": "infer.start", "t": 9, "p": {"pack_hash": "h:00000002", "input_hash": "h:1a"}}),
    );
    frames.push(json!({"kind": "infer.end", "t": 10, "p": {"pack_hash": "h:00000002", "output_hash": "h:1b"}}));
    frames.push(json!({"kind": "infer.pack", "t": 11, "p": {"pack_hash": "h:00000002"}}));
    let verdict = verify_json(&frames).to_value();
    assert_eq!(verdict["pack_hash"], "h:00000002");
    assert_eq!(verdict["input_hash"], "h:1a");
    assert_eq!(verdict["output_hash"], "h:1b");
}

#[test]
fn test_captured_session_verifies_and_chains() {
    let service = CaptureService::new(SessionId::parse("verify-test").unwrap());
    let stream = service.begin(json!({"agent": "test"})).unwrap();

    let descriptor = json!({
        "model_id": "qwen2.5-0.5b",
        "weights_hash": "h:00000030",
        "tensor_hash": "h:00000010",
        "glyph_hash": "h:00000020",
        "abi_id": "transformers.py:v1",
        "abi_hash": "h:00000000",
        "runtime_device": "cpu",
        "runtime_precision": "fp32",
        "seed": 42,
        "policy_sealed": true,
        "policy_no_network": true,
        "policy_no_fs": true,
        "policy_no_eval": true,
    });
    let pack = PackProofPayload::from_descriptor(&descriptor);
    let pack_hash = pack.pack_hash().to_string();

    let capture = |payload| service.capture(&stream, payload).unwrap();
    capture(FramePayload::Pack(PackPayload {
        pack_hash: pack_hash.clone(),
        model_id: pack.model_id.clone(),
        abi_id: pack.abi_id.clone(),
        policy_flags: 0b1111,
        ..Default::default()
    }));
    capture(FramePayload::Seed(SeedPayload {
        pack_hash: pack_hash.clone(),
        seed: 42,
    }));
    capture(FramePayload::Start(StartPayload {
        pack_hash: pack_hash.clone(),
        call_id: 1,
        input_hash: "h:0000000a".into(),
        ..Default::default()
    }));
    capture(FramePayload::End(EndPayload {
        pack_hash: pack_hash.clone(),
        call_id: 1,
        output_hash: "h:0000000b".into(),
        tokens_used: 3,
        ..Default::default()
    }));
    let end_hash = service.end(&stream, json!({})).unwrap().unwrap();

    let snapshot = service.export(&stream).unwrap();
    let verdict = verify(&snapshot.frames).unwrap();
    assert_eq!(verdict.to_value()["pack_hash"], json!(pack_hash));
    assert_eq!(verdict.to_value()["input_hash"], "h:0000000a");

    let last = verify_chain(&snapshot.frames).unwrap().unwrap();
    assert_eq!(Some(last), snapshot.frames.last().unwrap().chain);
    assert_ne!(last, end_hash);

    let mut tampered = snapshot.frames.clone();
    if let FramePayload::Seed(seed) = &mut tampered[2].payload {
        seed.seed = 43;
    }
    let mismatch = verify_chain(&tampered).unwrap().unwrap_err();
    assert_eq!(mismatch.index, 2);
}
