use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::condition::{decode_conditions, encode_conditions, ConditionError, Conditions};
use crate::error::{AuthzError, Result};
use crate::types::{ActionType, Effect, PolicyId, ResourceType};

/// An attribute-based rule for one resource/action pair.
///
/// Conditions are kept in their stored JSON form and decoded when the policy
/// is evaluated, so a policy loaded from a corrupt record can still be held,
/// listed and deactivated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    id: PolicyId,
    name: String,
    #[serde(default)]
    description: String,
    resource: ResourceType,
    action: ActionType,
    effect: Effect,
    #[serde(default)]
    conditions: Value,
    #[serde(default)]
    priority: i32,
    #[serde(default = "default_active")]
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn default_active() -> bool {
    true
}

/// Fields changed by [`Policy::update_policy`]. `None` leaves a field as is.
#[derive(Debug, Clone, Default)]
pub struct PolicyUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub effect: Option<Effect>,
    pub conditions: Option<Conditions>,
    pub priority: Option<i32>,
}

impl Policy {
    /// Creates an active policy with no conditions and a fresh identifier.
    pub fn new(
        name: impl Into<String>,
        resource: ResourceType,
        action: ActionType,
        effect: Effect,
        priority: i32,
    ) -> Result<Self> {
        Self::with_id(PolicyId::generate(), name, resource, action, effect, priority)
    }

    /// Creates an active policy with a caller-chosen identifier.
    pub fn with_id(
        id: PolicyId,
        name: impl Into<String>,
        resource: ResourceType,
        action: ActionType,
        effect: Effect,
        priority: i32,
    ) -> Result<Self> {
        let name = name.into();
        if id.is_empty() {
            return Err(AuthzError::InvalidPolicy("policy id cannot be empty".to_string()));
        }
        if name.trim().is_empty() {
            return Err(AuthzError::InvalidPolicy(
                "policy name cannot be empty".to_string(),
            ));
        }

        let now = Utc::now();
        Ok(Self {
            id,
            name,
            description: String::new(),
            resource,
            action,
            effect,
            conditions: Value::Object(Default::default()),
            priority,
            is_active: true,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_conditions(mut self, conditions: &Conditions) -> Result<Self> {
        self.conditions = encode(conditions)?;
        Ok(self)
    }

    /// Stores a condition document without decoding it. Used when rehydrating
    /// records whose validity is only checked at evaluation time.
    pub fn with_raw_conditions(mut self, conditions: Value) -> Self {
        self.conditions = conditions;
        self
    }

    /// True when the policy is active and targets exactly `resource`/`action`.
    /// Conditions and priority play no part here.
    pub fn matches(&self, resource: &ResourceType, action: &ActionType) -> bool {
        self.is_active && self.resource == *resource && self.action == *action
    }

    /// Decodes the stored condition document.
    pub fn conditions(&self) -> std::result::Result<Conditions, ConditionError> {
        decode_conditions(&self.conditions)
    }

    pub fn raw_conditions(&self) -> &Value {
        &self.conditions
    }

    pub fn activate(&mut self) {
        self.is_active = true;
        self.updated_at = Utc::now();
    }

    pub fn deactivate(&mut self) {
        self.is_active = false;
        self.updated_at = Utc::now();
    }

    /// Applies an update. Nothing changes if the update is invalid.
    pub fn update_policy(&mut self, update: PolicyUpdate) -> Result<()> {
        if let Some(name) = &update.name {
            if name.trim().is_empty() {
                return Err(AuthzError::InvalidPolicy(
                    "policy name cannot be empty".to_string(),
                ));
            }
        }
        let conditions = update.conditions.as_ref().map(encode).transpose()?;

        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(description) = update.description {
            self.description = description;
        }
        if let Some(effect) = update.effect {
            self.effect = effect;
        }
        if let Some(conditions) = conditions {
            self.conditions = conditions;
        }
        if let Some(priority) = update.priority {
            self.priority = priority;
        }
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn id(&self) -> &PolicyId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn resource(&self) -> &ResourceType {
        &self.resource
    }

    pub fn action(&self) -> &ActionType {
        &self.action
    }

    pub fn effect(&self) -> Effect {
        self.effect
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

fn encode(conditions: &Conditions) -> Result<Value> {
    encode_conditions(conditions).map_err(|e| AuthzError::InvalidPolicy(e.to_string()))
}
