use serde_json::Value;
use std::cell::RefCell;
use std::rc::Rc;

/// JSON-like value accepted by the canonicalizer.
///
/// Unlike `serde_json::Value`, this model can carry non-finite floats and
/// shared (possibly cyclic) nodes, both of which the canonical form handles
/// with fixed lossy output instead of failing.
#[derive(Debug, Clone)]
pub enum CanonicalValue {
    /// `null`.
    Null,
    /// `true` / `false`.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Unsigned integer above `i64::MAX`.
    UInt(u64),
    /// Float; NaN and infinities collapse to the placeholder.
    Float(f64),
    /// UTF-8 string.
    String(String),
    /// Ordered sequence.
    Array(Vec<CanonicalValue>),
    /// Members in insertion order; the last duplicate key wins.
    Object(Vec<(String, CanonicalValue)>),
    /// Node reachable from more than one place. May form a cycle.
    Shared(Rc<RefCell<CanonicalValue>>),
}

impl CanonicalValue {
    /// Builds an object from `(key, value)` pairs.
    pub fn object<K, I>(members: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, CanonicalValue)>,
    {
        CanonicalValue::Object(members.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Wraps the value in a shared node.
    pub fn shared(value: CanonicalValue) -> Rc<RefCell<CanonicalValue>> {
        Rc::new(RefCell::new(value))
    }

    /// Optional string: `None` becomes an explicit `null`.
    pub fn opt_string(value: Option<&str>) -> Self {
        value.map_or(CanonicalValue::Null, CanonicalValue::from)
    }
}

impl From<&str> for CanonicalValue {
    fn from(value: &str) -> Self {
        CanonicalValue::String(value.to_string())
    }
}

impl From<String> for CanonicalValue {
    fn from(value: String) -> Self {
        CanonicalValue::String(value)
    }
}

impl From<bool> for CanonicalValue {
    fn from(value: bool) -> Self {
        CanonicalValue::Bool(value)
    }
}

impl From<i32> for CanonicalValue {
    fn from(value: i32) -> Self {
        CanonicalValue::Int(i64::from(value))
    }
}

impl From<i64> for CanonicalValue {
    fn from(value: i64) -> Self {
        CanonicalValue::Int(value)
    }
}

impl From<f64> for CanonicalValue {
    fn from(value: f64) -> Self {
        CanonicalValue::Float(value)
    }
}

impl From<&Value> for CanonicalValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => CanonicalValue::Null,
            Value::Bool(b) => CanonicalValue::Bool(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    CanonicalValue::Int(i)
                } else if let Some(u) = n.as_u64() {
                    CanonicalValue::UInt(u)
                } else {
                    CanonicalValue::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Value::String(s) => CanonicalValue::String(s.clone()),
            Value::Array(items) => {
                CanonicalValue::Array(items.iter().map(CanonicalValue::from).collect())
            }
            Value::Object(map) => CanonicalValue::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), CanonicalValue::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<Value> for CanonicalValue {
    fn from(value: Value) -> Self {
        CanonicalValue::from(&value)
    }
}
