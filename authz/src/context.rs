//! Per-call evaluation input and output.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{AuthzError, Result};
use crate::types::{
    ActionType, AttributeValue, Attributes, Effect, PermissionId, PolicyId, ResourceType, RoleId,
    UserId,
};

/// Everything a single access decision is computed over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationContext {
    pub user_id: UserId,
    /// Role ids in the order RBAC should try them.
    #[serde(default)]
    pub user_roles: Vec<RoleId>,
    pub resource: ResourceType,
    pub action: ActionType,
    #[serde(default)]
    pub resource_ctx: Attributes,
    #[serde(default)]
    pub environment: Attributes,
}

impl EvaluationContext {
    pub fn new(user_id: impl Into<UserId>, resource: ResourceType, action: ActionType) -> Self {
        Self {
            user_id: user_id.into(),
            user_roles: Vec::new(),
            resource,
            action,
            resource_ctx: Attributes::new(),
            environment: Attributes::new(),
        }
    }

    pub fn with_roles(mut self, roles: Vec<RoleId>) -> Self {
        self.user_roles = roles;
        self
    }

    pub fn with_resource_ctx(mut self, attributes: Attributes) -> Self {
        self.resource_ctx = attributes;
        self
    }

    pub fn with_resource_attr(
        mut self,
        key: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) -> Self {
        self.resource_ctx.insert(key.into(), value.into());
        self
    }

    pub fn with_environment(mut self, attributes: Attributes) -> Self {
        self.environment = attributes;
        self
    }

    pub fn with_environment_attr(
        mut self,
        key: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }

    /// Rejects a context that does not identify a subject.
    pub fn validate(&self) -> Result<()> {
        if self.user_id.is_empty() {
            return Err(AuthzError::InvalidEvaluationContext(
                "user id is required".to_string(),
            ));
        }
        if self.user_roles.iter().any(RoleId::is_empty) {
            return Err(AuthzError::InvalidEvaluationContext(
                "role ids cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// The rule that produced a non-default decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MatchedRule {
    RolePermission {
        role_id: RoleId,
        permission_id: PermissionId,
    },
    Policy {
        policy_id: PolicyId,
    },
}

impl fmt::Display for MatchedRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchedRule::RolePermission {
                role_id,
                permission_id,
            } => write!(f, "role:{}:permission:{}", role_id, permission_id),
            MatchedRule::Policy { policy_id } => write!(f, "policy:{}", policy_id),
        }
    }
}

/// The outcome of an evaluation. `matched_rule` is `None` when no explicit
/// rule fired and the result is a default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub allowed: bool,
    pub effect: Effect,
    pub reason: String,
    pub matched_rule: Option<MatchedRule>,
}

impl EvaluationResult {
    /// A deny produced because nothing matched.
    pub fn default_deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            effect: Effect::Deny,
            reason: reason.into(),
            matched_rule: None,
        }
    }

    /// A decision asserted by an explicit rule.
    pub fn from_rule(effect: Effect, reason: impl Into<String>, rule: MatchedRule) -> Self {
        Self {
            allowed: effect.is_allow(),
            effect,
            reason: reason.into(),
            matched_rule: Some(rule),
        }
    }

    pub fn is_explicit(&self) -> bool {
        self.matched_rule.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matched_rule_display() {
        let rule = MatchedRule::RolePermission {
            role_id: RoleId::from("r1"),
            permission_id: PermissionId::from("p1"),
        };
        assert_eq!(rule.to_string(), "role:r1:permission:p1");

        let rule = MatchedRule::Policy {
            policy_id: PolicyId::from("pol1"),
        };
        assert_eq!(rule.to_string(), "policy:pol1");
    }

    #[test]
    fn test_result_constructors() {
        let deny = EvaluationResult::default_deny("nothing matched");
        assert!(!deny.allowed);
        assert!(!deny.is_explicit());

        let allow = EvaluationResult::from_rule(
            Effect::Allow,
            "policy x matched",
            MatchedRule::Policy {
                policy_id: PolicyId::from("x"),
            },
        );
        assert!(allow.allowed);
        assert!(allow.is_explicit());
    }

    #[test]
    fn test_validate_requires_user() {
        let ctx = EvaluationContext::new("", ResourceType::TASK, ActionType::READ);
        assert!(matches!(
            ctx.validate(),
            Err(AuthzError::InvalidEvaluationContext(_))
        ));

        let ctx = EvaluationContext::new("u1", ResourceType::TASK, ActionType::READ)
            .with_roles(vec![RoleId::from(" ")]);
        assert!(ctx.validate().is_err());

        let ctx = EvaluationContext::new("u1", ResourceType::TASK, ActionType::READ);
        assert!(ctx.validate().is_ok());
    }

    #[test]
    fn test_context_builders() {
        let ctx = EvaluationContext::new("u1", ResourceType::PROJECT, ActionType::APPROVE)
            .with_resource_attr("owner_id", "u2")
            .with_environment_attr("hour", 14);
        assert_eq!(ctx.resource_ctx["owner_id"], AttributeValue::from("u2"));
        assert_eq!(ctx.environment["hour"], AttributeValue::Int(14));
    }
}
