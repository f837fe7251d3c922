//! Permission domain service.
//!
//! The upward-facing entry point: resolves a user's roles, builds the
//! evaluation context, asks the [`Evaluator`], and manages user/role
//! assignment.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::context::{EvaluationContext, EvaluationResult};
use crate::engine::{Evaluator, Explanation};
use crate::error::{AuthzError, Result};
use crate::permission::Permission;
use crate::repository::{PolicyRepository, RoleRepository, UserRoleRepository};
use crate::role::Role;
use crate::types::{ActionType, Attributes, ResourceType, RoleId, UserId};

/// Orchestrates role assignment and access evaluation.
pub struct PermissionService {
    roles: Arc<dyn RoleRepository>,
    user_roles: Arc<dyn UserRoleRepository>,
    evaluator: Evaluator,
}

impl PermissionService {
    pub fn new(
        roles: Arc<dyn RoleRepository>,
        policies: Arc<dyn PolicyRepository>,
        user_roles: Arc<dyn UserRoleRepository>,
    ) -> Self {
        Self {
            evaluator: Evaluator::new(roles.clone(), policies),
            roles,
            user_roles,
        }
    }

    /// Builds the evaluation context for a user, resolving their roles.
    pub async fn build_context(
        &self,
        user_id: &UserId,
        resource: ResourceType,
        action: ActionType,
        resource_ctx: Attributes,
        environment: Attributes,
    ) -> Result<EvaluationContext> {
        let roles = self.user_roles.find_roles_by_user(user_id).await?;
        Ok(EvaluationContext::new(user_id.clone(), resource, action)
            .with_roles(roles.iter().map(|r| r.id().clone()).collect())
            .with_resource_ctx(resource_ctx)
            .with_environment(environment))
    }

    /// Whether the user may perform `action` on `resource`.
    pub async fn can_user_perform_action(
        &self,
        user_id: &UserId,
        resource: ResourceType,
        action: ActionType,
        resource_ctx: Attributes,
    ) -> Result<bool> {
        let result = self
            .evaluate_access(user_id, resource, action, resource_ctx, Attributes::new())
            .await?;
        Ok(result.allowed)
    }

    /// Full decision for a request, with caller-supplied environment attributes.
    pub async fn evaluate_access(
        &self,
        user_id: &UserId,
        resource: ResourceType,
        action: ActionType,
        resource_ctx: Attributes,
        environment: Attributes,
    ) -> Result<EvaluationResult> {
        Ok(self
            .explain_access(user_id, resource, action, resource_ctx, environment)
            .await?
            .result)
    }

    /// Like [`Self::evaluate_access`] but keeps both sub-decisions and the policy trace.
    pub async fn explain_access(
        &self,
        user_id: &UserId,
        resource: ResourceType,
        action: ActionType,
        resource_ctx: Attributes,
        environment: Attributes,
    ) -> Result<Explanation> {
        let ctx = self
            .build_context(user_id, resource, action, resource_ctx, environment)
            .await?;
        let explanation = self.evaluator.explain(&ctx).await?;
        debug!(
            "User {} {} {}: allowed={}",
            user_id, ctx.action, ctx.resource, explanation.result.allowed
        );
        Ok(explanation)
    }

    /// Fails with `PermissionDenied` unless the user may perform the action.
    pub async fn require_permission(
        &self,
        user_id: &UserId,
        resource: ResourceType,
        action: ActionType,
        resource_ctx: Attributes,
    ) -> Result<()> {
        let (resource_name, action_name) = (resource.to_string(), action.to_string());
        let result = self
            .evaluate_access(user_id, resource, action, resource_ctx, Attributes::new())
            .await?;
        if !result.allowed {
            warn!(
                "Denied {} {} for user {}: {}",
                action_name, resource_name, user_id, result.reason
            );
            return Err(AuthzError::PermissionDenied(format!(
                "user {} cannot {} {}",
                user_id, action_name, resource_name
            )));
        }
        Ok(())
    }

    /// Grants a role to a user. System roles cannot be granted here.
    pub async fn assign_role_to_user(&self, user_id: &UserId, role_id: &RoleId) -> Result<()> {
        let role = self.require_role(role_id).await?;

        if self.user_roles.has_role(user_id, role_id).await? {
            return Err(AuthzError::RoleAlreadyAssigned {
                user_id: user_id.to_string(),
                role_id: role_id.to_string(),
            });
        }
        if role.is_system() {
            return Err(AuthzError::SystemRoleImmutable(role.name().to_string()));
        }

        self.user_roles.assign_role(user_id, role_id).await?;
        info!("Assigned role {} to user {}", role.name(), user_id);
        Ok(())
    }

    /// Takes a role away from a user. System roles cannot be revoked here.
    pub async fn revoke_role_from_user(&self, user_id: &UserId, role_id: &RoleId) -> Result<()> {
        let role = self.require_role(role_id).await?;

        if !self.user_roles.has_role(user_id, role_id).await? {
            return Err(AuthzError::RoleNotAssigned {
                user_id: user_id.to_string(),
                role_id: role_id.to_string(),
            });
        }
        if role.is_system() {
            return Err(AuthzError::SystemRoleImmutable(role.name().to_string()));
        }

        self.user_roles.revoke_role(user_id, role_id).await?;
        info!("Revoked role {} from user {}", role.name(), user_id);
        Ok(())
    }

    /// Every permission reachable through the user's roles, each listed once,
    /// in the order first reached.
    pub async fn get_user_permissions(&self, user_id: &UserId) -> Result<Vec<Permission>> {
        let roles = self.user_roles.find_roles_by_user(user_id).await?;

        let mut seen = HashSet::new();
        let mut permissions = Vec::new();
        for role in &roles {
            for permission in self.roles.find_permissions_by_role(role.id()).await? {
                if seen.insert(permission.id().clone()) {
                    permissions.push(permission);
                }
            }
        }
        Ok(permissions)
    }

    pub async fn get_user_roles(&self, user_id: &UserId) -> Result<Vec<Role>> {
        self.user_roles.find_roles_by_user(user_id).await
    }

    async fn require_role(&self, role_id: &RoleId) -> Result<Role> {
        self.roles
            .find_by_id(role_id)
            .await?
            .ok_or_else(|| AuthzError::RoleNotFound(role_id.to_string()))
    }
}
