//! Storage interfaces the engine consumes.
//!
//! Implementations own persistence and transactions; the engine only calls
//! these methods. Cancellation follows the usual async contract: dropping
//! the future returned by a method abandons the call.

use async_trait::async_trait;

use crate::error::Result;
use crate::permission::Permission;
use crate::policy::Policy;
use crate::role::Role;
use crate::types::{ActionType, PermissionId, PolicyId, ResourceType, RoleId, UserId};

#[async_trait]
pub trait PermissionRepository: Send + Sync {
    /// Inserts or replaces a permission.
    async fn save(&self, permission: &Permission) -> Result<()>;

    async fn find_by_id(&self, id: &PermissionId) -> Result<Option<Permission>>;

    async fn find_by_resource_and_action(
        &self,
        resource: &ResourceType,
        action: &ActionType,
    ) -> Result<Option<Permission>>;

    async fn find_all(&self) -> Result<Vec<Permission>>;

    /// Fails with `PermissionNotFound` if nothing was deleted.
    async fn delete(&self, id: &PermissionId) -> Result<()>;
}

#[async_trait]
pub trait RoleRepository: Send + Sync {
    /// Inserts or replaces a role, including its permission set.
    async fn save(&self, role: &Role) -> Result<()>;

    async fn find_by_id(&self, id: &RoleId) -> Result<Option<Role>>;

    async fn find_by_name(&self, name: &str) -> Result<Option<Role>>;

    async fn find_all(&self) -> Result<Vec<Role>>;

    /// Fails with `RoleNotFound` if nothing was deleted.
    async fn delete(&self, id: &RoleId) -> Result<()>;

    async fn add_permission_to_role(
        &self,
        role_id: &RoleId,
        permission_id: &PermissionId,
    ) -> Result<()>;

    async fn remove_permission_from_role(
        &self,
        role_id: &RoleId,
        permission_id: &PermissionId,
    ) -> Result<()>;

    /// The permissions granted by a role. An unknown role grants nothing.
    async fn find_permissions_by_role(&self, role_id: &RoleId) -> Result<Vec<Permission>>;
}

#[async_trait]
pub trait PolicyRepository: Send + Sync {
    /// Inserts or replaces a policy.
    async fn save(&self, policy: &Policy) -> Result<()>;

    async fn find_by_id(&self, id: &PolicyId) -> Result<Option<Policy>>;

    /// Every policy registered for the pair, active or not, in no particular order.
    async fn find_by_resource_and_action(
        &self,
        resource: &ResourceType,
        action: &ActionType,
    ) -> Result<Vec<Policy>>;

    async fn find_all_active(&self) -> Result<Vec<Policy>>;

    /// Fails with `PolicyNotFound` if nothing was deleted.
    async fn delete(&self, id: &PolicyId) -> Result<()>;

    async fn count_by_resource(&self, resource: &ResourceType) -> Result<usize>;
}

#[async_trait]
pub trait UserRoleRepository: Send + Sync {
    async fn assign_role(&self, user_id: &UserId, role_id: &RoleId) -> Result<()>;

    async fn revoke_role(&self, user_id: &UserId, role_id: &RoleId) -> Result<()>;

    /// The user's roles in assignment order.
    async fn find_roles_by_user(&self, user_id: &UserId) -> Result<Vec<Role>>;

    async fn find_users_by_role(&self, role_id: &RoleId) -> Result<Vec<UserId>>;

    async fn has_role(&self, user_id: &UserId, role_id: &RoleId) -> Result<bool>;
}
