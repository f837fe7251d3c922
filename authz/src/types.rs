//! Core value types shared by the aggregates and the evaluator.
//!
//! Identifiers are ULID-backed newtypes. Resource and action types are open,
//! string-backed tokens: the known set is exposed as associated constants,
//! but the evaluator compares them opaquely so new tokens need no engine
//! changes. Attribute values carry the facts conditions are matched against.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::de::{self, Deserializer, SeqAccess, Visitor};
use serde::{Deserialize, Serialize};
use thiserror::Error;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Generates a fresh ULID-backed identifier.
            pub fn generate() -> Self {
                Self(ulid::Ulid::new().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn is_empty(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
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
    };
}

string_id!(
    /// Identifier of the subject an access decision is made for.
    UserId
);
string_id!(
    /// Identifier of a [`crate::Role`].
    RoleId
);
string_id!(
    /// Identifier of a [`crate::Permission`].
    PermissionId
);
string_id!(
    /// Identifier of a [`crate::Policy`]. Also the secondary sort key when
    /// two policies share a priority.
    PolicyId
);

/// A resource or action token failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {kind} {value:?}: {reason}")]
pub struct ParseTokenError {
    pub kind: &'static str,
    pub value: String,
    pub reason: &'static str,
}

fn validate_token(kind: &'static str, value: &str) -> Result<(), ParseTokenError> {
    let fail = |reason| ParseTokenError {
        kind,
        value: value.to_string(),
        reason,
    };

    if value.is_empty() {
        return Err(fail("must not be empty"));
    }
    if !value
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
    {
        return Err(fail("only lowercase letters, digits, '_' and '-' are allowed"));
    }
    Ok(())
}

macro_rules! token_type {
    ($(#[$meta:meta])* $name:ident, $kind:literal, [$($konst:ident => $value:literal),* $(,)?]) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(Cow<'static, str>);

        impl $name {
            $(pub const $konst: $name = $name(Cow::Borrowed($value));)*

            /// Every token known at compile time.
            pub const KNOWN: &'static [$name] = &[$($name::$konst),*];

            /// Validates and wraps a token.
            pub fn new(value: impl Into<String>) -> Result<Self, ParseTokenError> {
                let value = value.into();
                validate_token($kind, &value)?;
                Ok(Self(Cow::Owned(value)))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Whether this token belongs to the compile-time set.
            pub fn is_known(&self) -> bool {
                Self::KNOWN.contains(self)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseTokenError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = ParseTokenError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0.into_owned()
            }
        }
    };
}

token_type!(
    /// The kind of object being accessed (e.g. `task`, `project`).
    ResourceType,
    "resource type",
    [
        PROJECT => "project",
        TASK => "task",
        USER => "user",
        FILE => "file",
    ]
);

token_type!(
    /// The operation being attempted on a resource (e.g. `read`, `update`).
    ActionType,
    "action",
    [
        CREATE => "create",
        READ => "read",
        UPDATE => "update",
        DELETE => "delete",
        ASSIGN => "assign",
        APPROVE => "approve",
        EXECUTE => "execute",
    ]
);

/// The outcome a decision or matched policy asserts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effect {
    Allow,
    Deny,
}

impl Effect {
    pub fn is_allow(&self) -> bool {
        matches!(self, Effect::Allow)
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Effect::Allow => f.write_str("allow"),
            Effect::Deny => f.write_str("deny"),
        }
    }
}

/// A fact about the subject, resource or environment.
///
/// JSON/YAML integers deserialize to [`AttributeValue::Int`] and only
/// non-integral numbers to [`AttributeValue::Float`]. Integers outside the
/// `i64` range are rejected rather than widened to a float.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<AttributeValue>),
}

impl<'de> Deserialize<'de> for AttributeValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(AttributeValueVisitor)
    }
}

struct AttributeValueVisitor;

impl<'de> Visitor<'de> for AttributeValueVisitor {
    type Value = AttributeValue;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a bool, number, string or list of attribute values")
    }

    fn visit_bool<E: de::Error>(self, value: bool) -> Result<Self::Value, E> {
        Ok(AttributeValue::Bool(value))
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<Self::Value, E> {
        Ok(AttributeValue::Int(value))
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<Self::Value, E> {
        i64::try_from(value)
            .map(AttributeValue::Int)
            .map_err(|_| E::custom(format!("integer {} is out of range", value)))
    }

    fn visit_f64<E: de::Error>(self, value: f64) -> Result<Self::Value, E> {
        Ok(AttributeValue::Float(value))
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
        Ok(AttributeValue::String(value.to_string()))
    }

    fn visit_string<E: de::Error>(self, value: String) -> Result<Self::Value, E> {
        Ok(AttributeValue::String(value))
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(AttributeValue::List(items))
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Bool(b) => write!(f, "{}", b),
            AttributeValue::Int(i) => write!(f, "{}", i),
            AttributeValue::Float(x) => write!(f, "{}", x),
            AttributeValue::String(s) => f.write_str(s),
            AttributeValue::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::String(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Int(value)
    }
}

impl From<i32> for AttributeValue {
    fn from(value: i32) -> Self {
        AttributeValue::Int(value.into())
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Float(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Bool(value)
    }
}

impl<T: Into<AttributeValue>> From<Vec<T>> for AttributeValue {
    fn from(values: Vec<T>) -> Self {
        AttributeValue::List(values.into_iter().map(Into::into).collect())
    }
}

/// Named attributes attached to a resource or to the request environment.
pub type Attributes = BTreeMap<String, AttributeValue>;
