//! Fixed handler registry.
//!
//! Handler ids are numbered sections. K040..K049 are sealed compute;
//! K110 and up are host adapters that are not wired in this kernel and
//! always fail with `E_NOT_IMPL`.

use base64::Engine;
use scxq2_canonical::proof::to_opt_int32;
use scxq2_canonical::{canonicalize_json, InferProofPayload, PackProofPayload, ProofHash};
use scxq2_core::{verify_chain_json, verify_json};
use scxq2_journal::{encode, EndPayload, Frame, FramePayload, PackPayload, SeedPayload, StartPayload};
use serde_json::{json, Value};

use crate::adapter::{SealedOutput, DEFAULT_ABI_ID};
use crate::context::{CallContext, Response};
use crate::fault::{Fault, FaultCode};

/// A handler: context plus parsed body in, response or fault out.
pub type Handler = fn(&mut CallContext<'_>, &Value) -> Result<Response, Fault>;

/// Handler id of the sealed inference call.
pub const INFER_HANDLER: &str = "K041";

/// Contract reported when the route declares none.
pub const DEFAULT_INFER_CONTRACT: &str = "xjson://contract/ggl.infer/v1";

const DEFAULT_ABI_HASH: &str = "h:00000000";
const DEFAULT_DEVICE: &str = "cpu";
const DEFAULT_PRECISION: &str = "fp32";
const DEFAULT_MODE: &str = "chat";
const DEFAULT_MAX_TOKENS: i32 = 1024;

static HANDLERS: &[(&str, Handler)] = &[
    ("K040", health),
    ("K041", infer),
    ("K042", verify),
    ("K043", export),
    ("K110", fs_list),
    ("K111", fs_read),
    ("K112", fs_write),
    ("K130", cli_run),
    ("K210", ast_parse),
];

/// Looks a handler up by id.
pub fn lookup(id: &str) -> Option<Handler> {
    HANDLERS
        .iter()
        .find(|(handler_id, _)| *handler_id == id)
        .map(|(_, handler)| *handler)
}

/// Every registered handler id, in section order.
pub fn handler_ids() -> impl Iterator<Item = &'static str> {
    HANDLERS.iter().map(|(id, _)| *id)
}

/// K040: liveness.
fn health(_ctx: &mut CallContext<'_>, _body: &Value) -> Result<Response, Fault> {
    Ok(Response::ok(json!({"ok": true, "provider": "ggl", "plane": 2})))
}

/// K041: sealed inference.
///
/// Frames: `infer.pack`, `infer.seed` (seeded calls only), `infer.start`,
/// then `infer.end` once the adapter output passes the sealed check.
fn infer(ctx: &mut CallContext<'_>, body: &Value) -> Result<Response, Fault> {
    let section = ctx.handler().to_string();
    let contract_fault = |message: &str| Fault::new(section.as_str(), FaultCode::Contract, message);

    if !body.is_object() {
        return Err(contract_fault("request body must be JSON object"));
    }
    let (pack, infer) = match (body.get("pack"), body.get("infer")) {
        (Some(pack), Some(infer)) if pack.is_object() && infer.is_object() => (pack, infer),
        _ => return Err(contract_fault("missing pack/infer")),
    };

    let proof = pack_proof(pack, infer);
    let pack_hash = proof.pack_hash().to_string();
    let call_id = ctx.begin_call(&pack_hash)?;

    ctx.capture(FramePayload::Pack(PackPayload {
        pack_hash: pack_hash.clone(),
        model_id: proof.model_id.clone(),
        abi_id: proof.abi_id.clone(),
        tensor_hash: proof.tensor_hash.clone(),
        glyph_hash: proof.glyph_hash.clone(),
        abi_hash: proof.abi_hash.clone(),
        weights_hash: proof.weights_hash.clone(),
        runtime_device: proof.runtime_device.clone(),
        runtime_precision: proof.runtime_precision.clone(),
        policy_flags: policy_flags(&proof),
    }))?;
    if let Some(seed) = proof.seed {
        ctx.capture(FramePayload::Seed(SeedPayload {
            pack_hash: pack_hash.clone(),
            seed,
        }))?;
    }

    let input = input_object(infer);
    let input_text = canonicalize_json(&input);
    let input_hash = ProofHash::of_text(&input_text).to_string();
    let start = FramePayload::Start(StartPayload {
        pack_hash: pack_hash.clone(),
        call_id,
        input_hash: input_hash.clone(),
        input_ref: String::new(),
        input_bytes: byte_len(&input_text),
    });
    let start_hash = ctx.mark_started(&start)?;
    ctx.capture(start)?;

    let adapter = ctx.adapter(&proof.abi_id).ok_or_else(|| {
        Fault::new(section.as_str(), FaultCode::NoAdapter, "no adapter for abi_id")
            .with_meta(json!({"abi_id": proof.abi_id}))
    })?;
    let raw = adapter.run(&proof, &input)?;
    let output = SealedOutput::check(&section, &raw)?;
    let output_payload = output.payload();
    let output_text = canonicalize_json(&output_payload);
    let output_hash = ProofHash::of_text(&output_text).to_string();
    ctx.capture(FramePayload::End(EndPayload {
        pack_hash: pack_hash.clone(),
        call_id,
        start_hash,
        output_hash: output_hash.clone(),
        output_ref: output.output_ref.clone().unwrap_or_default(),
        output_bytes: byte_len(&output_text),
        tokens_used: output.tokens_used,
    }))?;

    let proof_hash = InferProofPayload {
        pack_hash: pack_hash.clone(),
        model_id: proof.model_id.clone(),
        input_hash: input_hash.clone(),
        output_hash: output_hash.clone(),
        seed: proof.seed,
        abi_hash: proof.abi_hash.clone(),
    }
    .proof_hash();

    Ok(Response::ok(json!({
        "ok": true,
        "contract": ctx.contract().unwrap_or(DEFAULT_INFER_CONTRACT),
        "pack": {
            "model_id": proof.model_id,
            "pack_hash": pack_hash,
            "tensor_hash": proof.tensor_hash,
            "glyph_hash": proof.glyph_hash,
            "abi_id": proof.abi_id,
            "abi_hash": proof.abi_hash,
            "runtime_device": proof.runtime_device,
            "runtime_precision": proof.runtime_precision,
            "seed": proof.seed,
        },
        "infer": {
            "call_id": call_id,
            "input_hash": input_hash,
            "output_hash": output_hash,
            "output": output_payload,
            "proof_hash": proof_hash.to_string(),
        },
    })))
}

/// Pack proof with runtime defaults filled and policies pinned.
/// The infer seed, when present, overrides the pack seed.
/// Pack hash an infer call with this body would run under, if it names a pack.
pub(crate) fn requested_pack_hash(body: &Value) -> Option<ProofHash> {
    let pack = body.get("pack").filter(|pack| pack.is_object())?;
    let infer = body.get("infer").unwrap_or(&Value::Null);
    Some(pack_proof(pack, infer).pack_hash())
}

fn pack_proof(pack: &Value, infer: &Value) -> PackProofPayload {
    let mut proof = PackProofPayload::from_descriptor(pack);
    let fill = |field: &mut String, default: &str| {
        if field.is_empty() {
            *field = default.to_string();
        }
    };
    fill(&mut proof.abi_id, DEFAULT_ABI_ID);
    fill(&mut proof.abi_hash, DEFAULT_ABI_HASH);
    fill(&mut proof.runtime_device, DEFAULT_DEVICE);
    fill(&mut proof.runtime_precision, DEFAULT_PRECISION);
    proof.seed = to_opt_int32(infer.get("seed")).or(proof.seed);
    proof.policy_sealed = true;
    proof.policy_no_network = true;
    proof.policy_no_fs = true;
    proof.policy_no_eval = true;
    proof
}

fn policy_flags(proof: &PackProofPayload) -> u8 {
    [
        proof.policy_sealed,
        proof.policy_no_network,
        proof.policy_no_fs,
        proof.policy_no_eval,
    ]
    .iter()
    .enumerate()
    .filter(|(_, pinned)| **pinned)
    .fold(0u8, |flags, (bit, _)| flags | (1u8 << bit))
}

/// `{prompt, mode, max_tokens}` with defaults.
fn input_object(infer: &Value) -> Value {
    let prompt = match infer.get("prompt") {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => canonicalize_json(other),
    };
    let mode = match infer.get("mode") {
        None | Some(Value::Null) => DEFAULT_MODE.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => canonicalize_json(other),
    };
    let max_tokens = to_opt_int32(infer.get("max_tokens")).unwrap_or(DEFAULT_MAX_TOKENS);
    json!({"prompt": prompt, "mode": mode, "max_tokens": max_tokens})
}

fn byte_len(text: &str) -> u32 {
    u32::try_from(text.len()).unwrap_or(u32::MAX)
}

fn frames_of(ctx: &CallContext<'_>, body: &Value) -> Result<(Option<String>, Vec<Frame>), Fault> {
    let stream_id = body.get("stream_id").and_then(Value::as_str);
    let snapshot = ctx.snapshot(stream_id)?;
    Ok((Some(snapshot.stream_id), snapshot.frames))
}

fn to_values(section: &str, frames: &[Frame]) -> Result<Vec<Value>, Fault> {
    frames
        .iter()
        .map(Frame::to_value)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| Fault::unknown(section, &err))
}

/// K042: replay-verify posted frames, or a retained stream.
fn verify(ctx: &mut CallContext<'_>, body: &Value) -> Result<Response, Fault> {
    let section = ctx.handler().to_string();
    let (stream_id, frames) = match body.get("frames") {
        Some(Value::Array(frames)) => (None, frames.clone()),
        Some(_) => {
            return Err(Fault::new(section.as_str(), FaultCode::Contract, "frames must be an array"))
        }
        None => {
            let (stream_id, frames) = frames_of(ctx, body)?;
            (stream_id, to_values(&section, &frames)?)
        }
    };

    let verdict = verify_json(&frames);
    let chain = match verify_chain_json(&frames) {
        Ok(head) => json!({"ok": true, "head": head.to_string()}),
        Err(mismatch) => json!({
            "ok": false,
            "fault": scxq2_core::FaultCode::ChainMismatch.as_str(),
            "index": mismatch.index,
            "field": mismatch.field,
            "expected": mismatch.expected.to_string(),
            "found": mismatch.found,
        }),
    };
    Ok(Response::ok(json!({
        "stream_id": stream_id,
        "frames": frames.len(),
        "verdict": verdict.to_value(),
        "chain": chain,
    })))
}

/// K043: a stream as JSON frames plus its base64 binary encoding.
fn export(ctx: &mut CallContext<'_>, body: &Value) -> Result<Response, Fault> {
    let section = ctx.handler().to_string();
    let stream_id = body.get("stream_id").and_then(Value::as_str);
    let snapshot = ctx.snapshot(stream_id)?;
    let bytes = encode(&snapshot.frames).map_err(|err| Fault::unknown(section.as_str(), &err))?;
    let frames = to_values(&section, &snapshot.frames)?;
    Ok(Response::ok(json!({
        "ok": true,
        "stream_id": snapshot.stream_id,
        "closed": snapshot.closed,
        "end_hash": snapshot.end_hash.map(|h| h.to_string()),
        "frames": frames,
        "binary": base64::engine::general_purpose::STANDARD.encode(bytes),
    })))
}

fn not_wired(section: &str, what: &str) -> Result<Response, Fault> {
    Err(Fault::new(
        section,
        FaultCode::NotImpl,
        format!("{} adapter not wired yet", what),
    ))
}

fn fs_list(ctx: &mut CallContext<'_>, _body: &Value) -> Result<Response, Fault> {
    not_wired(ctx.handler(), "fs.list")
}

fn fs_read(ctx: &mut CallContext<'_>, _body: &Value) -> Result<Response, Fault> {
    not_wired(ctx.handler(), "fs.read")
}

fn fs_write(ctx: &mut CallContext<'_>, _body: &Value) -> Result<Response, Fault> {
    not_wired(ctx.handler(), "fs.write")
}

fn cli_run(ctx: &mut CallContext<'_>, _body: &Value) -> Result<Response, Fault> {
    not_wired(ctx.handler(), "cli.run")
}

fn ast_parse(ctx: &mut CallContext<'_>, _body: &Value) -> Result<Response, Fault> {
    not_wired(ctx.handler(), "ast.parse")
}
