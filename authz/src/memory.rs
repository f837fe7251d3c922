//! In-process implementation of every repository trait.
//!
//! Backs the CLI and the test suites. All tables live behind one
//! [`tokio::sync::RwLock`], so each trait call observes a consistent
//! snapshot. Policies keep their insertion order, which lets tests check
//! that evaluation does not depend on storage order.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{AuthzError, Result};
use crate::permission::Permission;
use crate::policy::Policy;
use crate::repository::{
    PermissionRepository, PolicyRepository, RoleRepository, UserRoleRepository,
};
use crate::role::Role;
use crate::types::{ActionType, PermissionId, PolicyId, ResourceType, RoleId, UserId};

#[derive(Debug, Default)]
struct Tables {
    permissions: BTreeMap<PermissionId, Permission>,
    roles: BTreeMap<RoleId, Role>,
    policies: Vec<Policy>,
    /// Role ids per user, in assignment order.
    user_roles: BTreeMap<UserId, Vec<RoleId>>,
}

/// Thread-safe in-memory store.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a permission.
    pub async fn insert_permission(&self, permission: Permission) {
        let mut tables = self.tables.write().await;
        tables.permissions.insert(permission.id().clone(), permission);
    }

    /// Inserts or replaces a role.
    pub async fn insert_role(&self, role: Role) {
        let mut tables = self.tables.write().await;
        tables.roles.insert(role.id().clone(), role);
    }

    /// Inserts a policy, replacing one with the same id in place.
    pub async fn insert_policy(&self, policy: Policy) {
        let mut tables = self.tables.write().await;
        upsert_policy(&mut tables.policies, policy);
    }

    /// Every stored policy, active or not, in insertion order.
    pub async fn all_policies(&self) -> Vec<Policy> {
        self.tables.read().await.policies.clone()
    }

    /// Users with at least one role, with their role ids in assignment order.
    pub async fn assignments(&self) -> BTreeMap<UserId, Vec<RoleId>> {
        self.tables.read().await.user_roles.clone()
    }
}

fn upsert_policy(policies: &mut Vec<Policy>, policy: Policy) {
    match policies.iter_mut().find(|p| p.id() == policy.id()) {
        Some(existing) => *existing = policy,
        None => policies.push(policy),
    }
}

#[async_trait]
impl PermissionRepository for InMemoryStore {
    async fn save(&self, permission: &Permission) -> Result<()> {
        self.insert_permission(permission.clone()).await;
        Ok(())
    }

    async fn find_by_id(&self, id: &PermissionId) -> Result<Option<Permission>> {
        Ok(self.tables.read().await.permissions.get(id).cloned())
    }

    async fn find_by_resource_and_action(
        &self,
        resource: &ResourceType,
        action: &ActionType,
    ) -> Result<Option<Permission>> {
        let tables = self.tables.read().await;
        Ok(tables
            .permissions
            .values()
            .find(|p| p.matches(resource, action))
            .cloned())
    }

    async fn find_all(&self) -> Result<Vec<Permission>> {
        Ok(self.tables.read().await.permissions.values().cloned().collect())
    }

    async fn delete(&self, id: &PermissionId) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.permissions.remove(id).is_none() {
            return Err(AuthzError::PermissionNotFound(id.to_string()));
        }
        for role in tables.roles.values_mut() {
            if role.detach_permission(id) {
                debug!("Detached deleted permission {} from role {}", id, role.name());
            }
        }
        Ok(())
    }
}

#[async_trait]
impl RoleRepository for InMemoryStore {
    async fn save(&self, role: &Role) -> Result<()> {
        self.insert_role(role.clone()).await;
        Ok(())
    }

    async fn find_by_id(&self, id: &RoleId) -> Result<Option<Role>> {
        Ok(self.tables.read().await.roles.get(id).cloned())
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Role>> {
        let tables = self.tables.read().await;
        Ok(tables.roles.values().find(|r| r.name() == name).cloned())
    }

    async fn find_all(&self) -> Result<Vec<Role>> {
        Ok(self.tables.read().await.roles.values().cloned().collect())
    }

    async fn delete(&self, id: &RoleId) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.roles.remove(id).is_none() {
            return Err(AuthzError::RoleNotFound(id.to_string()));
        }
        for roles in tables.user_roles.values_mut() {
            roles.retain(|role_id| role_id != id);
        }
        tables.user_roles.retain(|_, roles| !roles.is_empty());
        Ok(())
    }

    async fn add_permission_to_role(
        &self,
        role_id: &RoleId,
        permission_id: &PermissionId,
    ) -> Result<()> {
        let mut tables = self.tables.write().await;
        if !tables.permissions.contains_key(permission_id) {
            return Err(AuthzError::PermissionNotFound(permission_id.to_string()));
        }
        let role = tables
            .roles
            .get_mut(role_id)
            .ok_or_else(|| AuthzError::RoleNotFound(role_id.to_string()))?;
        role.add_permission(permission_id.clone())
    }

    async fn remove_permission_from_role(
        &self,
        role_id: &RoleId,
        permission_id: &PermissionId,
    ) -> Result<()> {
        let mut tables = self.tables.write().await;
        let role = tables
            .roles
            .get_mut(role_id)
            .ok_or_else(|| AuthzError::RoleNotFound(role_id.to_string()))?;
        role.remove_permission(permission_id)
    }

    async fn find_permissions_by_role(&self, role_id: &RoleId) -> Result<Vec<Permission>> {
        let tables = self.tables.read().await;
        let Some(role) = tables.roles.get(role_id) else {
            return Ok(Vec::new());
        };
        Ok(role
            .permissions()
            .iter()
            .filter_map(|id| tables.permissions.get(id).cloned())
            .collect())
    }
}

#[async_trait]
impl PolicyRepository for InMemoryStore {
    async fn save(&self, policy: &Policy) -> Result<()> {
        self.insert_policy(policy.clone()).await;
        Ok(())
    }

    async fn find_by_id(&self, id: &PolicyId) -> Result<Option<Policy>> {
        let tables = self.tables.read().await;
        Ok(tables.policies.iter().find(|p| p.id() == id).cloned())
    }

    async fn find_by_resource_and_action(
        &self,
        resource: &ResourceType,
        action: &ActionType,
    ) -> Result<Vec<Policy>> {
        let tables = self.tables.read().await;
        Ok(tables
            .policies
            .iter()
            .filter(|p| p.resource() == resource && p.action() == action)
            .cloned()
            .collect())
    }

    async fn find_all_active(&self) -> Result<Vec<Policy>> {
        let tables = self.tables.read().await;
        Ok(tables
            .policies
            .iter()
            .filter(|p| p.is_active())
            .cloned()
            .collect())
    }

    async fn delete(&self, id: &PolicyId) -> Result<()> {
        let mut tables = self.tables.write().await;
        let before = tables.policies.len();
        tables.policies.retain(|p| p.id() != id);
        if tables.policies.len() == before {
            return Err(AuthzError::PolicyNotFound(id.to_string()));
        }
        Ok(())
    }

    async fn count_by_resource(&self, resource: &ResourceType) -> Result<usize> {
        let tables = self.tables.read().await;
        Ok(tables
            .policies
            .iter()
            .filter(|p| p.resource() == resource)
            .count())
    }
}

#[async_trait]
impl UserRoleRepository for InMemoryStore {
    async fn assign_role(&self, user_id: &UserId, role_id: &RoleId) -> Result<()> {
        let mut tables = self.tables.write().await;
        if !tables.roles.contains_key(role_id) {
            return Err(AuthzError::RoleNotFound(role_id.to_string()));
        }
        let roles = tables.user_roles.entry(user_id.clone()).or_default();
        if roles.contains(role_id) {
            return Err(AuthzError::RoleAlreadyAssigned {
                user_id: user_id.to_string(),
                role_id: role_id.to_string(),
            });
        }
        roles.push(role_id.clone());
        Ok(())
    }

    async fn revoke_role(&self, user_id: &UserId, role_id: &RoleId) -> Result<()> {
        let mut tables = self.tables.write().await;
        let not_assigned = || AuthzError::RoleNotAssigned {
            user_id: user_id.to_string(),
            role_id: role_id.to_string(),
        };
        let roles = tables.user_roles.get_mut(user_id).ok_or_else(not_assigned)?;
        let position = roles
            .iter()
            .position(|r| r == role_id)
            .ok_or_else(not_assigned)?;
        roles.remove(position);
        if roles.is_empty() {
            tables.user_roles.remove(user_id);
        }
        Ok(())
    }

    async fn find_roles_by_user(&self, user_id: &UserId) -> Result<Vec<Role>> {
        let tables = self.tables.read().await;
        let Some(role_ids) = tables.user_roles.get(user_id) else {
            return Ok(Vec::new());
        };
        Ok(role_ids
            .iter()
            .filter_map(|id| tables.roles.get(id).cloned())
            .collect())
    }

    async fn find_users_by_role(&self, role_id: &RoleId) -> Result<Vec<UserId>> {
        let tables = self.tables.read().await;
        Ok(tables
            .user_roles
            .iter()
            .filter(|(_, roles)| roles.contains(role_id))
            .map(|(user, _)| user.clone())
            .collect())
    }

    async fn has_role(&self, user_id: &UserId, role_id: &RoleId) -> Result<bool> {
        let tables = self.tables.read().await;
        Ok(tables
            .user_roles
            .get(user_id)
            .is_some_and(|roles| roles.contains(role_id)))
    }
}
