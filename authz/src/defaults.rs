//! The built-in permission catalog and its three standard roles.

use serde::Serialize;
use tracing::{debug, info};

use crate::error::Result;
use crate::permission::Permission;
use crate::repository::{PermissionRepository, RoleRepository};
use crate::role::Role;
use crate::types::{ActionType, ResourceType};

/// A role installed by [`install_defaults`] and the permissions it receives.
#[derive(Debug, Clone, Serialize)]
pub struct RoleTemplate {
    pub name: &'static str,
    pub display_name: &'static str,
    pub description: &'static str,
    pub is_system: bool,
    pub grants: Vec<String>,
}

/// What [`install_defaults`] actually created.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallReport {
    pub permissions_created: usize,
    pub roles_created: usize,
}

/// Every (resource, action) pair of the known vocabulary.
pub fn default_permissions() -> Vec<(ResourceType, ActionType)> {
    ResourceType::KNOWN
        .iter()
        .flat_map(|resource| {
            ActionType::KNOWN
                .iter()
                .map(move |action| (resource.clone(), action.clone()))
        })
        .collect()
}

fn manager_grants(resource: &ResourceType, action: &ActionType) -> bool {
    let work_item = *resource == ResourceType::PROJECT || *resource == ResourceType::TASK;
    let work_action = [
        ActionType::CREATE,
        ActionType::READ,
        ActionType::UPDATE,
        ActionType::ASSIGN,
        ActionType::APPROVE,
    ]
    .contains(action);
    let file_action = *action == ActionType::READ || *action == ActionType::CREATE;

    (work_item && work_action) || (*resource == ResourceType::FILE && file_action)
}

fn member_grants(resource: &ResourceType, action: &ActionType) -> bool {
    *action == ActionType::READ
        || (*resource == ResourceType::TASK && *action == ActionType::UPDATE)
}

pub fn default_roles() -> Vec<RoleTemplate> {
    let grants = |allowed: fn(&ResourceType, &ActionType) -> bool| -> Vec<String> {
        default_permissions()
            .iter()
            .filter(|(r, a)| allowed(r, a))
            .map(|(r, a)| Permission::default_name(r, a))
            .collect()
    };

    vec![
        RoleTemplate {
            name: "admin",
            display_name: "Administrator",
            description: "Full system access",
            is_system: true,
            grants: grants(|_, _| true),
        },
        RoleTemplate {
            name: "manager",
            display_name: "Manager",
            description: "Plans and approves project work",
            is_system: false,
            grants: grants(manager_grants),
        },
        RoleTemplate {
            name: "member",
            display_name: "Member",
            description: "Reads everything and works on tasks",
            is_system: false,
            grants: grants(member_grants),
        },
    ]
}

/// Installs the default catalog. Permissions already present for a
/// (resource, action) pair and roles already present by name are left as
/// they are, so calling this repeatedly is harmless.
pub async fn install_defaults(
    permissions: &dyn PermissionRepository,
    roles: &dyn RoleRepository,
) -> Result<InstallReport> {
    let mut report = InstallReport::default();

    let mut catalog = Vec::new();
    for (resource, action) in default_permissions() {
        let permission = match permissions
            .find_by_resource_and_action(&resource, &action)
            .await?
        {
            Some(existing) => existing,
            None => {
                let name = Permission::default_name(&resource, &action);
                let permission = Permission::new(name, resource, action, "")?;
                permissions.save(&permission).await?;
                report.permissions_created += 1;
                permission
            }
        };
        catalog.push(permission);
    }

    for template in default_roles() {
        if roles.find_by_name(template.name).await?.is_some() {
            debug!("Role {} already exists, skipping", template.name);
            continue;
        }

        let mut role = Role::new(
            template.name,
            template.display_name,
            template.description,
            template.is_system,
        )?;
        for permission in catalog
            .iter()
            .filter(|p| {
                let key = Permission::default_name(p.resource(), p.action());
                template.grants.contains(&key)
            })
        {
            role.add_permission(permission.id().clone())?;
        }
        roles.save(&role).await?;
        report.roles_created += 1;
        info!("Created default role: {}", template.name);
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStore;

    async fn role_permission_names(store: &InMemoryStore, name: &str) -> Vec<String> {
        let role = store.find_by_name(name).await.unwrap().unwrap();
        store
            .find_permissions_by_role(role.id())
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name().to_string())
            .collect()
    }

    #[test]
    fn test_default_permissions_cover_vocabulary() {
        let pairs = default_permissions();
        assert_eq!(
            pairs.len(),
            ResourceType::KNOWN.len() * ActionType::KNOWN.len()
        );
        assert!(pairs.contains(&(ResourceType::FILE, ActionType::EXECUTE)));
    }

    #[tokio::test]
    async fn test_install_defaults() {
        let store = InMemoryStore::new();
        let report = install_defaults(&store, &store).await.unwrap();
        assert_eq!(report.permissions_created, default_permissions().len());
        assert_eq!(report.roles_created, 3);

        let admin = store.find_by_name("admin").await.unwrap().unwrap();
        assert!(admin.is_system());
        assert_eq!(
            role_permission_names(&store, "admin").await.len(),
            default_permissions().len()
        );

        let manager = role_permission_names(&store, "manager").await;
        assert!(manager.contains(&"task:approve".to_string()));
        assert!(manager.contains(&"file:create".to_string()));
        assert!(!manager.contains(&"file:delete".to_string()));
        assert!(!manager.contains(&"user:read".to_string()));

        let member = role_permission_names(&store, "member").await;
        assert!(member.contains(&"user:read".to_string()));
        assert!(member.contains(&"task:update".to_string()));
        assert!(!member.contains(&"project:update".to_string()));
        assert_eq!(member.len(), ResourceType::KNOWN.len() + 1);
    }

    #[tokio::test]
    async fn test_install_defaults_is_idempotent() {
        let store = InMemoryStore::new();
        install_defaults(&store, &store).await.unwrap();
        let before = PermissionRepository::find_all(&store).await.unwrap().len();

        let report = install_defaults(&store, &store).await.unwrap();
        assert_eq!(report, InstallReport::default());
        assert_eq!(
            PermissionRepository::find_all(&store).await.unwrap().len(),
            before
        );
        assert_eq!(RoleRepository::find_all(&store).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_existing_role_left_untouched() {
        let store = InMemoryStore::new();
        let custom = Role::new("member", "Guest", "Seeded earlier", false).unwrap();
        store.insert_role(custom).await;

        install_defaults(&store, &store).await.unwrap();
        let member = store.find_by_name("member").await.unwrap().unwrap();
        assert_eq!(member.display_name(), "Guest");
        assert!(member.permissions().is_empty());
    }
}
