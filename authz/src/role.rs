use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AuthzError, Result};
use crate::types::{PermissionId, RoleId};

/// A named bundle of permissions.
///
/// System roles are protected: their descriptive fields cannot be edited and
/// permissions cannot be taken away from them. Granting additional
/// permissions is still allowed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Role {
    id: RoleId,
    name: String,
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    permissions: BTreeSet<PermissionId>,
    #[serde(default)]
    is_system: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Role {
    /// Creates a role with a fresh identifier and no permissions.
    pub fn new(
        name: impl Into<String>,
        display_name: impl Into<String>,
        description: impl Into<String>,
        is_system: bool,
    ) -> Result<Self> {
        Self::with_id(RoleId::generate(), name, display_name, description, is_system)
    }

    /// Creates a role with a caller-chosen identifier.
    pub fn with_id(
        id: RoleId,
        name: impl Into<String>,
        display_name: impl Into<String>,
        description: impl Into<String>,
        is_system: bool,
    ) -> Result<Self> {
        let name = name.into();
        if id.is_empty() {
            return Err(AuthzError::InvalidRole("role id cannot be empty".to_string()));
        }
        if name.trim().is_empty() {
            return Err(AuthzError::InvalidRole("role name cannot be empty".to_string()));
        }

        let now = Utc::now();
        Ok(Self {
            id,
            name,
            display_name: display_name.into(),
            description: description.into(),
            permissions: BTreeSet::new(),
            is_system,
            created_at: now,
            updated_at: now,
        })
    }

    /// Grants a permission. Fails if the role already holds it.
    pub fn add_permission(&mut self, permission_id: PermissionId) -> Result<()> {
        if self.permissions.contains(&permission_id) {
            return Err(AuthzError::InvalidRole(format!(
                "permission {} already exists in role {}",
                permission_id, self.name
            )));
        }
        self.permissions.insert(permission_id);
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Takes a permission away. Always fails on system roles.
    pub fn remove_permission(&mut self, permission_id: &PermissionId) -> Result<()> {
        if self.is_system {
            return Err(AuthzError::SystemRoleImmutable(self.name.clone()));
        }
        if !self.permissions.remove(permission_id) {
            return Err(AuthzError::PermissionNotFound(format!(
                "{} is not granted to role {}",
                permission_id, self.name
            )));
        }
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Storage-level cascade when a permission is deleted outright. Bypasses
    /// the system-role guard because the permission no longer exists.
    pub(crate) fn detach_permission(&mut self, permission_id: &PermissionId) -> bool {
        let removed = self.permissions.remove(permission_id);
        if removed {
            self.updated_at = Utc::now();
        }
        removed
    }

    pub fn has_permission(&self, permission_id: &PermissionId) -> bool {
        self.permissions.contains(permission_id)
    }

    /// Edits the descriptive fields. Always fails on system roles.
    pub fn update_info(
        &mut self,
        display_name: impl Into<String>,
        description: impl Into<String>,
    ) -> Result<()> {
        if self.is_system {
            return Err(AuthzError::SystemRoleImmutable(self.name.clone()));
        }
        self.display_name = display_name.into();
        self.description = description.into();
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn id(&self) -> &RoleId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn permissions(&self) -> &BTreeSet<PermissionId> {
        &self.permissions
    }

    pub fn is_system(&self) -> bool {
        self.is_system
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}
