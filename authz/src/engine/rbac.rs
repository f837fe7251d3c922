use std::sync::Arc;

use tracing::debug;

use crate::context::{EvaluationContext, EvaluationResult, MatchedRule};
use crate::error::{EvaluationPhase, Result};
use crate::repository::RoleRepository;
use crate::types::Effect;

pub(crate) const NO_ROLE_MATCH: &str = "no matching role permissions";

/// Grants access when one of the subject's roles holds a matching permission.
pub struct RbacEvaluator {
    roles: Arc<dyn RoleRepository>,
}

impl RbacEvaluator {
    pub fn new(roles: Arc<dyn RoleRepository>) -> Self {
        Self { roles }
    }

    /// Tries roles in the order given and stops at the first role holding a
    /// permission for the requested resource and action.
    pub async fn evaluate(&self, ctx: &EvaluationContext) -> Result<EvaluationResult> {
        for role_id in &ctx.user_roles {
            let permissions = self
                .roles
                .find_permissions_by_role(role_id)
                .await
                .map_err(|e| e.in_phase(EvaluationPhase::Rbac))?;

            if let Some(permission) = permissions
                .iter()
                .find(|p| p.matches(&ctx.resource, &ctx.action))
            {
                debug!(
                    "RBAC: role {} grants {} on {} via permission {}",
                    role_id,
                    ctx.action,
                    ctx.resource,
                    permission.id()
                );
                return Ok(EvaluationResult::from_rule(
                    Effect::Allow,
                    format!("RBAC: role {} has permission {}", role_id, permission.id()),
                    MatchedRule::RolePermission {
                        role_id: role_id.clone(),
                        permission_id: permission.id().clone(),
                    },
                ));
            }
        }

        Ok(EvaluationResult::default_deny(NO_ROLE_MATCH))
    }
}
