use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AuthzError, Result};
use crate::types::{ActionType, PermissionId, ResourceType};

/// A capability to perform one action on one resource type.
///
/// Identity, resource and action never change after construction; only the
/// description can be edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Permission {
    id: PermissionId,
    name: String,
    resource: ResourceType,
    action: ActionType,
    #[serde(default)]
    description: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Permission {
    /// Creates a permission with a fresh identifier.
    pub fn new(
        name: impl Into<String>,
        resource: ResourceType,
        action: ActionType,
        description: impl Into<String>,
    ) -> Result<Self> {
        Self::with_id(PermissionId::generate(), name, resource, action, description)
    }

    /// Creates a permission with a caller-chosen identifier.
    pub fn with_id(
        id: PermissionId,
        name: impl Into<String>,
        resource: ResourceType,
        action: ActionType,
        description: impl Into<String>,
    ) -> Result<Self> {
        let name = name.into();
        if id.is_empty() {
            return Err(AuthzError::InvalidPermission(
                "permission id cannot be empty".to_string(),
            ));
        }
        if name.trim().is_empty() {
            return Err(AuthzError::InvalidPermission(
                "permission name cannot be empty".to_string(),
            ));
        }

        let now = Utc::now();
        Ok(Self {
            id,
            name,
            resource,
            action,
            description: description.into(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Conventional name for a resource/action pair, e.g. `task:update`.
    pub fn default_name(resource: &ResourceType, action: &ActionType) -> String {
        format!("{}:{}", resource, action)
    }

    /// True when this permission grants exactly `action` on `resource`.
    pub fn matches(&self, resource: &ResourceType, action: &ActionType) -> bool {
        self.resource == *resource && self.action == *action
    }

    pub fn update_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
        self.updated_at = Utc::now();
    }

    pub fn id(&self) -> &PermissionId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn resource(&self) -> &ResourceType {
        &self.resource
    }

    pub fn action(&self) -> &ActionType {
        &self.action
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}
