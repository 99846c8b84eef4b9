//! Hash command implementation.

use scxq2_canonical::{canonicalize_json, InferProofPayload, PackProofPayload, ProofHash};

use super::read_json;

pub fn run(input: Option<String>, pack: bool, infer: bool) -> Result<(), Box<dyn std::error::Error>> {
    let value = read_json(input.as_deref())?;
    let hash = if pack {
        PackProofPayload::from_descriptor(&value).pack_hash()
    } else if infer {
        InferProofPayload::from_descriptor(&value).proof_hash()
    } else {
        ProofHash::of_text(&canonicalize_json(&value))
    };
    println!("{}", hash);
    Ok(())
}
