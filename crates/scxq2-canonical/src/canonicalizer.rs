use serde::Serialize;
use serde_json::Value;

use crate::value::CanonicalValue;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt::Write;

/// Text emitted in place of NaN and infinities.
pub const NON_FINITE_PLACEHOLDER: &str = "0";

/// Text emitted when a shared node re-enters one of its own ancestors.
pub const CIRCULAR_MARKER: &str = "\"[circular]\"";

/// Largest magnitude for which an integral float is rendered as an integer.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Error returned when a value cannot be projected into the canonical model.
#[derive(thiserror::Error, Debug)]
pub enum CanonicalizationError {
    /// The value's `Serialize` impl failed or produced a non-JSON shape.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Produces the canonical text of `value`.
///
/// Object keys are sorted, arrays keep their order, no whitespace is emitted.
/// Non-finite floats collapse to [`NON_FINITE_PLACEHOLDER`] and cycles through
/// shared nodes collapse to [`CIRCULAR_MARKER`]; both are lossy by intent and
/// only acyclic, finite inputs round-trip.
///
/// # Example
///
/// ```rust
/// use scxq2_canonical::{canonicalize, CanonicalValue};
///
/// let value = CanonicalValue::object([
///     ("b", CanonicalValue::from(1)),
///     ("a", CanonicalValue::from("x")),
/// ]);
/// assert_eq!(canonicalize(&value), r#"{"a":"x","b":1}"#);
/// ```
pub fn canonicalize(value: &CanonicalValue) -> String {
    let mut walker = Walker {
        out: String::new(),
        ancestors: Vec::new(),
    };
    walker.walk(value);
    walker.out
}

/// Canonical text of a parsed JSON value.
pub fn canonicalize_json(value: &Value) -> String {
    canonicalize(&CanonicalValue::from(value))
}

/// Canonical text of any serializable value, via its JSON projection.
pub fn canonicalize_serialize<T: Serialize + ?Sized>(
    value: &T,
) -> Result<String, CanonicalizationError> {
    let json = serde_json::to_value(value)?;
    Ok(canonicalize_json(&json))
}

struct Walker {
    out: String,
    /// Shared nodes currently on the path from the root.
    ancestors: Vec<*const RefCell<CanonicalValue>>,
}

impl Walker {
    fn walk(&mut self, value: &CanonicalValue) {
        match value {
            CanonicalValue::Null => self.out.push_str("null"),
            CanonicalValue::Bool(true) => self.out.push_str("true"),
            CanonicalValue::Bool(false) => self.out.push_str("false"),
            CanonicalValue::Int(i) => {
                let _ = write!(self.out, "{}", i);
            }
            CanonicalValue::UInt(u) => {
                let _ = write!(self.out, "{}", u);
            }
            CanonicalValue::Float(f) => self.float(*f),
            CanonicalValue::String(s) => escape_into(&mut self.out, s),
            CanonicalValue::Array(items) => {
                self.out.push('[');
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        self.out.push(',');
                    }
                    self.walk(item);
                }
                self.out.push(']');
            }
            CanonicalValue::Object(members) => {
                let sorted: BTreeMap<&str, &CanonicalValue> =
                    members.iter().map(|(k, v)| (k.as_str(), v)).collect();
                self.out.push('{');
                for (idx, (key, child)) in sorted.into_iter().enumerate() {
                    if idx > 0 {
                        self.out.push(',');
                    }
                    escape_into(&mut self.out, key);
                    self.out.push(':');
                    self.walk(child);
                }
                self.out.push('}');
            }
            CanonicalValue::Shared(node) => {
                let ptr = std::rc::Rc::as_ptr(node);
                if self.ancestors.contains(&ptr) {
                    self.out.push_str(CIRCULAR_MARKER);
                    return;
                }
                // A node that is mutably borrowed is being built right now;
                // treat it like an ancestor.
                let Ok(inner) = node.try_borrow() else {
                    self.out.push_str(CIRCULAR_MARKER);
                    return;
                };
                self.ancestors.push(ptr);
                self.walk(&inner);
                self.ancestors.pop();
            }
        }
    }

    fn float(&mut self, f: f64) {
        if !f.is_finite() {
            self.out.push_str(NON_FINITE_PLACEHOLDER);
        } else if f.fract() == 0.0 && f.abs() < MAX_SAFE_INTEGER {
            let _ = write!(self.out, "{}", f as i64);
        } else {
            write_number(&mut self.out, f);
        }
    }
}

/// Writes a finite float in ECMAScript `Number#toString` form: shortest
/// round-trip digits, plain notation for decimal exponents in `-7..21`,
/// otherwise `d.ddde±x`.
fn write_number(out: &mut String, f: f64) {
    let sci = format!("{:e}", f.abs());
    let (mantissa, exp) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
    let digits: String = mantissa.chars().filter(char::is_ascii_digit).collect();
    let k = digits.len() as i32;
    let n = exp.parse::<i32>().unwrap_or(0) + 1;

    if f < 0.0 {
        out.push('-');
    }
    if k <= n && n <= 21 {
        out.push_str(&digits);
        out.extend(std::iter::repeat('0').take((n - k) as usize));
    } else if 0 < n && n <= 21 {
        let (int, frac) = digits.split_at(n as usize);
        let _ = write!(out, "{}.{}", int, frac);
    } else if -6 < n && n <= 0 {
        out.push_str("0.");
        out.extend(std::iter::repeat('0').take((-n) as usize));
        out.push_str(&digits);
    } else {
        let (lead, rest) = digits.split_at(1);
        out.push_str(lead);
        if !rest.is_empty() {
            let _ = write!(out, ".{}", rest);
        }
        let sign = if n - 1 < 0 { '-' } else { '+' };
        let _ = write!(out, "e{}{}", sign, (n - 1).abs());
    }
}

/// Writes `s` as a JSON string literal.
fn escape_into(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sorts_keys_at_every_depth() {
        let value = json!({"z": {"b": [3, 1], "a": null}, "a": true});
        assert_eq!(
            canonicalize_json(&value),
            r#"{"a":true,"z":{"a":null,"b":[3,1]}}"#
        );
    }

    #[test]
    fn insertion_order_does_not_matter() {
        let first = CanonicalValue::object([
            ("model_id", CanonicalValue::from("m")),
            ("seed", CanonicalValue::from(7)),
        ]);
        let second = CanonicalValue::object([
            ("seed", CanonicalValue::from(7)),
            ("model_id", CanonicalValue::from("m")),
        ]);
        assert_eq!(canonicalize(&first), canonicalize(&second));
    }

    #[test]
    fn last_duplicate_key_wins() {
        let value = CanonicalValue::object([
            ("k", CanonicalValue::from(1)),
            ("k", CanonicalValue::from(2)),
        ]);
        assert_eq!(canonicalize(&value), r#"{"k":2}"#);
    }

    #[test]
    fn non_finite_numbers_collapse() {
        let value = CanonicalValue::Array(vec![
            CanonicalValue::Float(f64::NAN),
            CanonicalValue::Float(f64::INFINITY),
            CanonicalValue::Float(f64::NEG_INFINITY),
        ]);
        assert_eq!(canonicalize(&value), "[0,0,0]");
    }

    #[test]
    fn integral_floats_render_as_integers() {
        assert_eq!(canonicalize(&CanonicalValue::Float(3.0)), "3");
        assert_eq!(canonicalize(&CanonicalValue::Float(-0.0)), "0");
        assert_eq!(canonicalize(&CanonicalValue::Float(1.5)), "1.5");
    }

    #[test]
    fn floats_follow_ecmascript_number_text() {
        let text = |f: f64| canonicalize(&CanonicalValue::Float(f));
        assert_eq!(text(1e-7), "1e-7");
        assert_eq!(text(-1.5e-7), "-1.5e-7");
        assert_eq!(text(0.000001), "0.000001");
        assert_eq!(text(0.1), "0.1");
        assert_eq!(text(123.456), "123.456");
        assert_eq!(text(-0.5), "-0.5");
        assert_eq!(text(1e21), "1e+21");
        assert_eq!(text(1.2345e22), "1.2345e+22");
        assert_eq!(text(1e20), "100000000000000000000");
    }

    #[test]
    fn strings_are_json_escaped() {
        let value = CanonicalValue::from("a\"b\\c\nd\u{01}é");
        assert_eq!(canonicalize(&value), "\"a\\\"b\\\\c\\nd\\u0001é\"");
    }

    #[test]
    fn self_cycle_emits_marker() {
        let node = CanonicalValue::shared(CanonicalValue::Null);
        *node.borrow_mut() = CanonicalValue::object([
            ("name", CanonicalValue::from("loop")),
            ("next", CanonicalValue::Shared(node.clone())),
        ]);
        let text = canonicalize(&CanonicalValue::Shared(node.clone()));
        assert_eq!(text, r#"{"name":"loop","next":"[circular]"}"#);
        // break the cycle so the test does not leak
        *node.borrow_mut() = CanonicalValue::Null;
    }

    #[test]
    fn shared_siblings_are_not_cycles() {
        let leaf = CanonicalValue::shared(CanonicalValue::from("x"));
        let value = CanonicalValue::Array(vec![
            CanonicalValue::Shared(leaf.clone()),
            CanonicalValue::Shared(leaf),
        ]);
        assert_eq!(canonicalize(&value), r#"["x","x"]"#);
    }

    #[test]
    fn repeated_calls_are_identical() {
        let value = json!({"b": [1, {"y": 2, "x": 1}], "a": "s"});
        let first = canonicalize_json(&value);
        for _ in 0..10 {
            assert_eq!(canonicalize_json(&value), first);
        }
    }
}
