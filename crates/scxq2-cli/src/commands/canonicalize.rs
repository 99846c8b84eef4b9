//! Canonicalize command implementation.

use scxq2_canonical::canonicalize_json;

use super::read_json;

pub fn run(input: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let value = read_json(input.as_deref())?;
    println!("{}", canonicalize_json(&value));
    Ok(())
}
