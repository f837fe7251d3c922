//! Policy conditions and their evaluation.
//!
//! A condition set maps an attribute key to an expected value. Expected
//! values are a closed variant: a scalar literal, a list of alternatives, or
//! a `${path}` reference resolved against the evaluation context. Conditions
//! are persisted as JSON and decoded on use, so a stored document that does
//! not fit the variant surfaces as a [`ConditionError`] instead of a silent
//! mismatch.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::{Map, Number, Value};
use thiserror::Error;

use crate::context::EvaluationContext;
use crate::types::{AttributeValue, Attributes};

/// Fixed lookup keys filled from the context before resource and environment attributes.
pub const KEY_USER_ID: &str = "user_id";
pub const KEY_USER_ROLES: &str = "user_roles";
pub const KEY_RESOURCE: &str = "resource";
pub const KEY_ACTION: &str = "action";

/// A scalar expected value. Comparison is type-exact.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl Literal {
    /// Exact, type-matched equality. Floats compare with `==`; an integer
    /// never equals a float.
    pub fn matches(&self, actual: &AttributeValue) -> bool {
        match (self, actual) {
            (Literal::String(expected), AttributeValue::String(actual)) => expected == actual,
            (Literal::Int(expected), AttributeValue::Int(actual)) => expected == actual,
            (Literal::Float(expected), AttributeValue::Float(actual)) => expected == actual,
            (Literal::Bool(expected), AttributeValue::Bool(actual)) => expected == actual,
            _ => false,
        }
    }
}

/// A `${root.segment}` reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableRef {
    path: String,
}

impl VariableRef {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    /// Parses `${path}`; returns `None` for anything else.
    pub fn parse(raw: &str) -> Option<Self> {
        let path = raw.strip_prefix("${")?.strip_suffix('}')?;
        Some(Self::new(path))
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Resolves the reference. Only `resource.<key>` and `user.id` are
    /// defined; every other path resolves to nothing.
    pub fn resolve(&self, ctx: &EvaluationContext) -> Option<AttributeValue> {
        let segments: Vec<&str> = self.path.split('.').collect();
        match segments.as_slice() {
            ["resource", key] => ctx.resource_ctx.get(*key).cloned(),
            ["user", "id"] => Some(AttributeValue::String(ctx.user_id.to_string())),
            _ => None,
        }
    }
}

impl fmt::Display for VariableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${{{}}}", self.path)
    }
}

/// What a single condition key expects.
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionValue {
    Literal(Literal),
    /// Passes when the actual value matches any element.
    List(Vec<ConditionValue>),
    Variable(VariableRef),
}

impl ConditionValue {
    pub fn string(value: impl Into<String>) -> Self {
        ConditionValue::Literal(Literal::String(value.into()))
    }

    pub fn int(value: i64) -> Self {
        ConditionValue::Literal(Literal::Int(value))
    }

    pub fn float(value: f64) -> Self {
        ConditionValue::Literal(Literal::Float(value))
    }

    pub fn bool(value: bool) -> Self {
        ConditionValue::Literal(Literal::Bool(value))
    }

    pub fn variable(path: impl Into<String>) -> Self {
        ConditionValue::Variable(VariableRef::new(path))
    }

    pub fn any_of(values: impl IntoIterator<Item = ConditionValue>) -> Self {
        ConditionValue::List(values.into_iter().collect())
    }

    /// Decodes a stored JSON value.
    pub fn from_json(value: &Value) -> std::result::Result<Self, String> {
        match value {
            Value::Bool(b) => Ok(ConditionValue::bool(*b)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(ConditionValue::int(i))
                } else if n.is_u64() {
                    Err(format!("integer {} is out of range", n))
                } else {
                    n.as_f64()
                        .map(ConditionValue::float)
                        .ok_or_else(|| format!("unsupported number {}", n))
                }
            }
            Value::String(s) => match VariableRef::parse(s) {
                Some(var) if var.path().is_empty() => {
                    Err("variable reference has an empty path".to_string())
                }
                Some(var) => Ok(ConditionValue::Variable(var)),
                None => Ok(ConditionValue::string(s.clone())),
            },
            Value::Array(items) => items
                .iter()
                .map(ConditionValue::from_json)
                .collect::<std::result::Result<Vec<_>, _>>()
                .map(ConditionValue::List),
            Value::Null => Err("null is not a valid expected value".to_string()),
            Value::Object(_) => Err("nested objects are not supported".to_string()),
        }
    }

    /// Encodes to the stored JSON form.
    pub fn to_json(&self) -> std::result::Result<Value, String> {
        match self {
            ConditionValue::Literal(Literal::String(s)) => Ok(Value::String(s.clone())),
            ConditionValue::Literal(Literal::Int(i)) => Ok(Value::Number((*i).into())),
            ConditionValue::Literal(Literal::Float(x)) => Number::from_f64(*x)
                .map(Value::Number)
                .ok_or_else(|| format!("{} cannot be stored", x)),
            ConditionValue::Literal(Literal::Bool(b)) => Ok(Value::Bool(*b)),
            ConditionValue::List(items) => items
                .iter()
                .map(ConditionValue::to_json)
                .collect::<std::result::Result<Vec<_>, _>>()
                .map(Value::Array),
            ConditionValue::Variable(var) => Ok(Value::String(var.to_string())),
        }
    }
}

/// Attribute key to expected value. All entries must hold.
pub type Conditions = BTreeMap<String, ConditionValue>;

/// A stored condition document could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConditionError {
    #[error("conditions must be a JSON object, found {0}")]
    NotAnObject(&'static str),

    #[error("condition {key:?}: {reason}")]
    InvalidValue { key: String, reason: String },
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Decodes a stored condition document. `null` decodes to an empty set.
pub fn decode_conditions(raw: &Value) -> std::result::Result<Conditions, ConditionError> {
    let object = match raw {
        Value::Null => return Ok(Conditions::new()),
        Value::Object(object) => object,
        other => return Err(ConditionError::NotAnObject(json_type_name(other))),
    };

    object
        .iter()
        .map(|(key, value)| {
            ConditionValue::from_json(value)
                .map(|decoded| (key.clone(), decoded))
                .map_err(|reason| ConditionError::InvalidValue {
                    key: key.clone(),
                    reason,
                })
        })
        .collect()
}

/// Encodes a condition set into its stored form.
pub fn encode_conditions(conditions: &Conditions) -> std::result::Result<Value, ConditionError> {
    let mut object = Map::new();
    for (key, value) in conditions {
        let encoded = value
            .to_json()
            .map_err(|reason| ConditionError::InvalidValue {
                key: key.clone(),
                reason,
            })?;
        object.insert(key.clone(), encoded);
    }
    Ok(Value::Object(object))
}

/// Why a condition set did not hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionFailure {
    /// The key is not present in the lookup table.
    MissingAttribute(String),
    /// The key is present but its value does not match.
    Mismatch(String),
}

impl fmt::Display for ConditionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConditionFailure::MissingAttribute(key) => write!(f, "attribute {} is missing", key),
            ConditionFailure::Mismatch(key) => write!(f, "attribute {} does not match", key),
        }
    }
}

/// Matches condition sets against one evaluation context.
///
/// The lookup table is built once and reused for every policy scanned in
/// the same call.
pub struct ConditionEvaluator<'a> {
    ctx: &'a EvaluationContext,
    table: Attributes,
}

impl<'a> ConditionEvaluator<'a> {
    pub fn new(ctx: &'a EvaluationContext) -> Self {
        let mut table = Attributes::new();
        table.insert(
            KEY_USER_ID.to_string(),
            AttributeValue::String(ctx.user_id.to_string()),
        );
        table.insert(
            KEY_USER_ROLES.to_string(),
            AttributeValue::List(
                ctx.user_roles
                    .iter()
                    .map(|role| AttributeValue::String(role.to_string()))
                    .collect(),
            ),
        );
        table.insert(
            KEY_RESOURCE.to_string(),
            AttributeValue::String(ctx.resource.to_string()),
        );
        table.insert(
            KEY_ACTION.to_string(),
            AttributeValue::String(ctx.action.to_string()),
        );
        // Later sources overwrite earlier ones
        table.extend(ctx.resource_ctx.iter().map(|(k, v)| (k.clone(), v.clone())));
        table.extend(ctx.environment.iter().map(|(k, v)| (k.clone(), v.clone())));

        Self { ctx, table }
    }

    /// The merged attribute table conditions are looked up in.
    pub fn table(&self) -> &Attributes {
        &self.table
    }

    /// True when every condition holds. An empty set always holds.
    pub fn matches(&self, conditions: &Conditions) -> bool {
        self.first_failure(conditions).is_none()
    }

    /// The first condition (in key order) that does not hold, if any.
    pub fn first_failure(&self, conditions: &Conditions) -> Option<ConditionFailure> {
        for (key, expected) in conditions {
            let Some(actual) = self.table.get(key) else {
                return Some(ConditionFailure::MissingAttribute(key.clone()));
            };
            if !self.value_matches(expected, actual) {
                return Some(ConditionFailure::Mismatch(key.clone()));
            }
        }
        None
    }

    fn value_matches(&self, expected: &ConditionValue, actual: &AttributeValue) -> bool {
        match expected {
            ConditionValue::Literal(literal) => literal.matches(actual),
            ConditionValue::List(options) => options
                .iter()
                .any(|option| self.value_equals(option, actual)),
            ConditionValue::Variable(var) => match var.resolve(self.ctx) {
                Some(resolved) => resolved == *actual,
                None => false,
            },
        }
    }

    /// Equality for one member of a list condition. A nested list is a value
    /// compared element-wise, not another set of alternatives.
    fn value_equals(&self, expected: &ConditionValue, actual: &AttributeValue) -> bool {
        match (expected, actual) {
            (ConditionValue::List(items), AttributeValue::List(values)) => {
                items.len() == values.len()
                    && items
                        .iter()
                        .zip(values)
                        .all(|(item, value)| self.value_equals(item, value))
            }
            (ConditionValue::List(_), _) => false,
            _ => self.value_matches(expected, actual),
        }
    }
}
