//! Administrative operations over the permission, role and policy catalog.

use std::sync::Arc;

use tracing::info;

use crate::error::{AuthzError, Result};
use crate::permission::Permission;
use crate::policy::{Policy, PolicyUpdate};
use crate::repository::{PermissionRepository, PolicyRepository, RoleRepository};
use crate::role::Role;
use crate::types::{ActionType, PermissionId, PolicyId, ResourceType, RoleId};

pub struct CatalogService {
    permissions: Arc<dyn PermissionRepository>,
    roles: Arc<dyn RoleRepository>,
    policies: Arc<dyn PolicyRepository>,
}

impl CatalogService {
    pub fn new(
        permissions: Arc<dyn PermissionRepository>,
        roles: Arc<dyn RoleRepository>,
        policies: Arc<dyn PolicyRepository>,
    ) -> Self {
        Self {
            permissions,
            roles,
            policies,
        }
    }

    /// Registers a permission. At most one permission may exist per
    /// (resource, action) pair.
    pub async fn create_permission(
        &self,
        name: impl Into<String>,
        resource: ResourceType,
        action: ActionType,
        description: impl Into<String>,
    ) -> Result<Permission> {
        if let Some(existing) = self
            .permissions
            .find_by_resource_and_action(&resource, &action)
            .await?
        {
            return Err(AuthzError::InvalidPermission(format!(
                "permission for {} {} already exists: {}",
                action,
                resource,
                existing.id()
            )));
        }

        let permission = Permission::new(name, resource, action, description)?;
        self.permissions.save(&permission).await?;
        info!("Created permission {}", permission.name());
        Ok(permission)
    }

    pub async fn create_role(
        &self,
        name: impl Into<String>,
        display_name: impl Into<String>,
        description: impl Into<String>,
        is_system: bool,
    ) -> Result<Role> {
        let name = name.into();
        if self.roles.find_by_name(&name).await?.is_some() {
            return Err(AuthzError::InvalidRole(format!(
                "role {} already exists",
                name
            )));
        }

        let role = Role::new(name, display_name, description, is_system)?;
        self.roles.save(&role).await?;
        info!("Created role {}", role.name());
        Ok(role)
    }

    pub async fn grant_permission(
        &self,
        role_id: &RoleId,
        permission_id: &PermissionId,
    ) -> Result<()> {
        let mut role = self.require_role(role_id).await?;
        if self.permissions.find_by_id(permission_id).await?.is_none() {
            return Err(AuthzError::PermissionNotFound(permission_id.to_string()));
        }

        role.add_permission(permission_id.clone())?;
        self.roles.save(&role).await?;
        info!("Granted {} to role {}", permission_id, role.name());
        Ok(())
    }

    pub async fn revoke_permission(
        &self,
        role_id: &RoleId,
        permission_id: &PermissionId,
    ) -> Result<()> {
        let mut role = self.require_role(role_id).await?;
        role.remove_permission(permission_id)?;
        self.roles.save(&role).await?;
        info!("Revoked {} from role {}", permission_id, role.name());
        Ok(())
    }

    pub async fn update_role_info(
        &self,
        role_id: &RoleId,
        display_name: impl Into<String>,
        description: impl Into<String>,
    ) -> Result<Role> {
        let mut role = self.require_role(role_id).await?;
        role.update_info(display_name, description)?;
        self.roles.save(&role).await?;
        Ok(role)
    }

    /// Deletes a role along with its user assignments. System roles stay.
    pub async fn delete_role(&self, role_id: &RoleId) -> Result<()> {
        let role = self.require_role(role_id).await?;
        if role.is_system() {
            return Err(AuthzError::SystemRoleImmutable(role.name().to_string()));
        }
        self.roles.delete(role_id).await?;
        info!("Deleted role {}", role.name());
        Ok(())
    }

    pub async fn create_policy(&self, policy: Policy) -> Result<Policy> {
        if self.policies.find_by_id(policy.id()).await?.is_some() {
            return Err(AuthzError::InvalidPolicy(format!(
                "policy {} already exists",
                policy.id()
            )));
        }
        // Stored documents may be malformed, new ones may not
        policy
            .conditions()
            .map_err(|e| AuthzError::InvalidPolicy(e.to_string()))?;

        self.policies.save(&policy).await?;
        info!(
            "Created {} policy {} on {} {}",
            policy.effect(),
            policy.name(),
            policy.action(),
            policy.resource()
        );
        Ok(policy)
    }

    pub async fn set_policy_active(&self, policy_id: &PolicyId, active: bool) -> Result<Policy> {
        let mut policy = self.require_policy(policy_id).await?;
        if active {
            policy.activate();
        } else {
            policy.deactivate();
        }
        self.policies.save(&policy).await?;
        info!(
            "Policy {} is now {}",
            policy.name(),
            if active { "active" } else { "inactive" }
        );
        Ok(policy)
    }

    pub async fn update_policy(&self, policy_id: &PolicyId, update: PolicyUpdate) -> Result<Policy> {
        let mut policy = self.require_policy(policy_id).await?;
        policy.update_policy(update)?;
        self.policies.save(&policy).await?;
        Ok(policy)
    }

    pub async fn delete_policy(&self, policy_id: &PolicyId) -> Result<()> {
        self.policies.delete(policy_id).await?;
        info!("Deleted policy {}", policy_id);
        Ok(())
    }

    /// Number of policies, active or not, attached to a resource type.
    pub async fn count_policies(&self, resource: &ResourceType) -> Result<usize> {
        self.policies.count_by_resource(resource).await
    }

    pub async fn list_active_policies(&self) -> Result<Vec<Policy>> {
        self.policies.find_all_active().await
    }

    async fn require_role(&self, role_id: &RoleId) -> Result<Role> {
        self.roles
            .find_by_id(role_id)
            .await?
            .ok_or_else(|| AuthzError::RoleNotFound(role_id.to_string()))
    }

    async fn require_policy(&self, policy_id: &PolicyId) -> Result<Policy> {
        self.policies
            .find_by_id(policy_id)
            .await?
            .ok_or_else(|| AuthzError::PolicyNotFound(policy_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::{ConditionValue, Conditions};
    use crate::error::ErrorKind;
    use crate::memory::InMemoryStore;
    use crate::repository::UserRoleRepository;
    use crate::types::{Effect, UserId};
    use serde_json::json;

    fn catalog() -> (Arc<InMemoryStore>, CatalogService) {
        let store = Arc::new(InMemoryStore::new());
        let catalog = CatalogService::new(store.clone(), store.clone(), store.clone());
        (store, catalog)
    }

    #[tokio::test]
    async fn test_create_permission_rejects_duplicate_pair() {
        let (_store, catalog) = catalog();
        catalog
            .create_permission("task:update", ResourceType::TASK, ActionType::UPDATE, "")
            .await
            .unwrap();

        let err = catalog
            .create_permission("edit tasks", ResourceType::TASK, ActionType::UPDATE, "")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidPermission);
    }

    #[tokio::test]
    async fn test_create_role_rejects_duplicate_name() {
        let (_store, catalog) = catalog();
        catalog.create_role("manager", "Manager", "", false).await.unwrap();

        let err = catalog
            .create_role("manager", "Other", "", false)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRole);
    }

    #[tokio::test]
    async fn test_grant_and_revoke_permission() {
        let (store, catalog) = catalog();
        let permission = catalog
            .create_permission("task:read", ResourceType::TASK, ActionType::READ, "")
            .await
            .unwrap();
        let role = catalog.create_role("member", "Member", "", false).await.unwrap();

        catalog.grant_permission(role.id(), permission.id()).await.unwrap();
        let granted = store.find_permissions_by_role(role.id()).await.unwrap();
        assert_eq!(granted.len(), 1);

        let err = catalog
            .grant_permission(role.id(), permission.id())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRole);

        catalog.revoke_permission(role.id(), permission.id()).await.unwrap();
        assert!(store.find_permissions_by_role(role.id()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_grant_checks_references() {
        let (_store, catalog) = catalog();
        let role = catalog.create_role("member", "Member", "", false).await.unwrap();

        let err = catalog
            .grant_permission(&RoleId::from("ghost"), &PermissionId::from("p"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RoleNotFound);

        let err = catalog
            .grant_permission(role.id(), &PermissionId::from("ghost"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionNotFound);
    }

    #[tokio::test]
    async fn test_system_role_guards() {
        let (store, catalog) = catalog();
        let permission = catalog
            .create_permission("task:read", ResourceType::TASK, ActionType::READ, "")
            .await
            .unwrap();
        let admin = catalog
            .create_role("admin", "Administrator", "", true)
            .await
            .unwrap();

        catalog.grant_permission(admin.id(), permission.id()).await.unwrap();

        let err = catalog
            .revoke_permission(admin.id(), permission.id())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SystemRoleImmutable);

        let err = catalog
            .update_role_info(admin.id(), "Root", "")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SystemRoleImmutable);

        let err = catalog.delete_role(admin.id()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SystemRoleImmutable);
        assert!(RoleRepository::find_by_id(store.as_ref(), admin.id())
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_delete_role_drops_assignments() {
        let (store, catalog) = catalog();
        let role = catalog.create_role("member", "Member", "", false).await.unwrap();
        let user = UserId::from("u1");
        store.assign_role(&user, role.id()).await.unwrap();

        let updated = catalog
            .update_role_info(role.id(), "Team Member", "Default role")
            .await
            .unwrap();
        assert_eq!(updated.display_name(), "Team Member");

        catalog.delete_role(role.id()).await.unwrap();
        assert!(!store.has_role(&user, role.id()).await.unwrap());

        let err = catalog.delete_role(role.id()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RoleNotFound);
    }

    #[tokio::test]
    async fn test_policy_lifecycle() {
        let (_store, catalog) = catalog();
        let mut conditions = Conditions::new();
        conditions.insert("owner_id".into(), ConditionValue::variable("user.id"));
        let policy = Policy::new(
            "owner-edit",
            ResourceType::TASK,
            ActionType::UPDATE,
            Effect::Allow,
            10,
        )
        .unwrap()
        .with_conditions(&conditions)
        .unwrap();
        let id = policy.id().clone();

        catalog.create_policy(policy.clone()).await.unwrap();
        let err = catalog.create_policy(policy).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidPolicy);

        assert_eq!(catalog.count_policies(&ResourceType::TASK).await.unwrap(), 1);
        assert_eq!(catalog.list_active_policies().await.unwrap().len(), 1);

        let paused = catalog.set_policy_active(&id, false).await.unwrap();
        assert!(!paused.is_active());
        assert!(catalog.list_active_policies().await.unwrap().is_empty());
        assert_eq!(catalog.count_policies(&ResourceType::TASK).await.unwrap(), 1);

        let updated = catalog
            .update_policy(
                &id,
                PolicyUpdate {
                    effect: Some(Effect::Deny),
                    priority: Some(50),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.effect(), Effect::Deny);
        assert_eq!(updated.priority(), 50);

        catalog.delete_policy(&id).await.unwrap();
        let err = catalog.delete_policy(&id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PolicyNotFound);

        let err = catalog.set_policy_active(&id, true).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PolicyNotFound);
    }

    #[tokio::test]
    async fn test_create_policy_rejects_malformed_conditions() {
        let (_store, catalog) = catalog();
        let policy = Policy::new("bad", ResourceType::FILE, ActionType::READ, Effect::Deny, 0)
            .unwrap()
            .with_raw_conditions(json!({"owner_id": null}));

        let err = catalog.create_policy(policy).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidPolicy);
        assert_eq!(catalog.count_policies(&ResourceType::FILE).await.unwrap(), 0);
    }
}
