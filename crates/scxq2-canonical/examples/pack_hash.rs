use scxq2_canonical::{canonicalize, PackProofPayload};
use serde_json::json;

fn main() {
    let descriptor = json!({
        "model_id": "qwen-0.5b",
        "weights_hash": "h:11111111",
        "tensor_hash": "h:22222222",
        "glyph_hash": "h:33333333",
        "abi_id": "transformers.py:v1",
        "abi_hash": "h:00000000",
        "runtime_device": "cpu",
        "runtime_precision": "fp32",
        "policy_sealed": true,
        "policy_no_network": true,
        "policy_no_fs": true,
        "policy_no_eval": true
    });

    let payload = PackProofPayload::from_descriptor(&descriptor);
    println!("{}", canonicalize(&payload.canonical_value()));
    println!("{}", payload.pack_hash());
}
