use crate::validation::ValidationError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! newtype {
    ($name:ident, $doc:expr, $pattern:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new instance without validation; callers are responsible for conformity.
            pub fn new(value: String) -> Self {
                Self(value)
            }

            /// Parses a validated identifier from a string.
            pub fn parse(value: impl Into<String>) -> Result<Self, ValidationError> {
                let s = value.into();
                if !Self::is_valid(&s) {
                    return Err(ValidationError::PatternMismatch {
                        field: stringify!($name),
                        value: s,
                    });
                }
                Ok(Self(s))
            }

            /// Whether `value` matches the identifier pattern.
            pub fn is_valid(value: &str) -> bool {
                Regex::new($pattern).expect("invalid regex").is_match(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

newtype!(
    SessionId,
    "Session identifier that prefixes every stream id (pattern: `[A-Za-z0-9_.-]{1,64}`).",
    r"^[A-Za-z0-9_.-]{1,64}$"
);
newtype!(
    HandlerId,
    "Numbered kernel section that owns a handler, like `K041`.",
    r"^K[0-9]{3}$"
);
newtype!(
    ContractId,
    "Contract reference like `xjson://contract/ggl.infer/v1`.",
    r"^xjson://contract/[A-Za-z0-9_.-]+(/[A-Za-z0-9_.-]+)*$"
);
