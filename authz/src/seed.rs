//! YAML seed documents.
//!
//! A seed describes a complete catalog (permissions, roles, policies and
//! user assignments) and installs it into a store in one pass:
//!
//! ```yaml
//! defaults: true
//! permissions:
//!   - resource: report
//!     action: read
//! roles:
//!   - name: auditor
//!     permissions: [report:read]
//! policies:
//!   - name: deny-archived-updates
//!     resource: task
//!     action: update
//!     effect: deny
//!     priority: 100
//!     conditions:
//!       status: archived
//! user_roles:
//!   alice: [auditor, manager]
//! ```
//!
//! Records without an `id` use their name as identifier. References from
//! roles to permissions and from users to roles may use either.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::defaults::install_defaults;
use crate::error::{AuthzError, Result};
use crate::permission::Permission;
use crate::policy::Policy;
use crate::repository::{
    PermissionRepository, PolicyRepository, RoleRepository, UserRoleRepository,
};
use crate::role::Role;
use crate::types::{ActionType, Effect, PermissionId, PolicyId, ResourceType, RoleId, UserId};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Seed {
    /// Install the default catalog before the records below.
    #[serde(default)]
    pub defaults: bool,
    #[serde(default)]
    pub permissions: Vec<PermissionRecord>,
    #[serde(default)]
    pub roles: Vec<RoleRecord>,
    #[serde(default)]
    pub policies: Vec<PolicyRecord>,
    /// User id to role references, in assignment order.
    #[serde(default)]
    pub user_roles: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionRecord {
    #[serde(default)]
    pub id: Option<String>,
    /// Defaults to `<resource>:<action>`.
    #[serde(default)]
    pub name: Option<String>,
    pub resource: ResourceType,
    pub action: ActionType,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleRecord {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_system: bool,
    #[serde(default)]
    pub permissions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyRecord {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub resource: ResourceType,
    pub action: ActionType,
    pub effect: Effect,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_active")]
    pub active: bool,
    /// Kept verbatim; decoded only when the policy is evaluated.
    #[serde(default)]
    pub conditions: Value,
}

fn default_active() -> bool {
    true
}

/// Counts of what [`Seed::install`] wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub permissions: usize,
    pub roles: usize,
    pub policies: usize,
    pub assignments: usize,
}

impl Seed {
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| AuthzError::InvalidSeed(e.to_string()))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AuthzError::InvalidSeed(format!("{}: {}", path.display(), e)))?;
        debug!("Loaded seed from {}", path.display());
        Self::from_yaml(&content)
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| AuthzError::InvalidSeed(e.to_string()))
    }

    /// Writes every record into `store`.
    ///
    /// User assignments are written straight to the store, so a seed is the
    /// one place system roles such as `admin` can be handed out.
    pub async fn install<S>(&self, store: &S) -> Result<SeedReport>
    where
        S: PermissionRepository + RoleRepository + PolicyRepository + UserRoleRepository,
    {
        let mut report = SeedReport::default();

        if self.defaults {
            let installed = install_defaults(store, store).await?;
            report.permissions += installed.permissions_created;
            report.roles += installed.roles_created;
        }

        for record in &self.permissions {
            if let Some(existing) =
                PermissionRepository::find_by_resource_and_action(store, &record.resource, &record.action)
                    .await?
            {
                return Err(AuthzError::InvalidPermission(format!(
                    "permission for {} {} already exists: {}",
                    record.action,
                    record.resource,
                    existing.name()
                )));
            }
            let name = record
                .name
                .clone()
                .unwrap_or_else(|| Permission::default_name(&record.resource, &record.action));
            let id = PermissionId::from(record.id.clone().unwrap_or_else(|| name.clone()));
            let permission = Permission::with_id(
                id,
                name,
                record.resource.clone(),
                record.action.clone(),
                record.description.clone(),
            )?;
            PermissionRepository::save(store, &permission).await?;
            report.permissions += 1;
        }

        let permission_refs = lookup(
            PermissionRepository::find_all(store)
                .await?
                .iter()
                .map(|p| (p.id().clone(), p.name().to_string())),
        );
        for record in &self.roles {
            let id = RoleId::from(record.id.clone().unwrap_or_else(|| record.name.clone()));
            let mut role = Role::with_id(
                id,
                record.name.clone(),
                record.display_name.clone(),
                record.description.clone(),
                record.is_system,
            )?;
            for reference in &record.permissions {
                let permission_id = permission_refs
                    .get(reference.as_str())
                    .ok_or_else(|| AuthzError::PermissionNotFound(reference.clone()))?;
                role.add_permission(permission_id.clone())?;
            }
            RoleRepository::save(store, &role).await?;
            report.roles += 1;
        }

        for record in &self.policies {
            let id = PolicyId::from(record.id.clone().unwrap_or_else(|| record.name.clone()));
            let mut policy = Policy::with_id(
                id,
                record.name.clone(),
                record.resource.clone(),
                record.action.clone(),
                record.effect,
                record.priority,
            )?
            .with_description(record.description.clone())
            .with_raw_conditions(record.conditions.clone());
            if !record.active {
                policy.deactivate();
            }
            PolicyRepository::save(store, &policy).await?;
            report.policies += 1;
        }

        let role_refs = lookup(
            RoleRepository::find_all(store)
                .await?
                .iter()
                .map(|r| (r.id().clone(), r.name().to_string())),
        );
        for (user, references) in &self.user_roles {
            let user_id = UserId::from(user.as_str());
            for reference in references {
                let role_id = role_refs
                    .get(reference.as_str())
                    .ok_or_else(|| AuthzError::RoleNotFound(reference.clone()))?;
                store.assign_role(&user_id, role_id).await?;
                report.assignments += 1;
            }
        }

        info!(
            "Seed installed: {} permissions, {} roles, {} policies, {} assignments",
            report.permissions, report.roles, report.policies, report.assignments
        );
        Ok(report)
    }
}

/// Maps both ids and names onto ids. An id wins over another record's
/// identical name.
fn lookup<T>(records: impl Iterator<Item = (T, String)>) -> HashMap<String, T>
where
    T: Clone + AsRef<str>,
{
    let records: Vec<_> = records.collect();
    let mut refs = HashMap::new();
    for (id, name) in &records {
        refs.insert(name.clone(), id.clone());
    }
    for (id, _) in records {
        refs.insert(id.as_ref().to_string(), id);
    }
    refs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::memory::InMemoryStore;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SEED: &str = r#"
defaults: true
permissions:
  - id: report-read
    resource: report
    action: read
    description: Read reports
roles:
  - name: auditor
    display_name: Auditor
    permissions: [report:read, task:read]
policies:
  - name: deny-archived-updates
    resource: task
    action: update
    effect: deny
    priority: 100
    conditions:
      status: archived
  - name: owner-edit
    resource: task
    action: update
    effect: allow
    priority: 10
    active: false
    conditions:
      owner_id: "${user.id}"
user_roles:
  alice: [auditor, manager]
  root: [admin]
"#;

    #[tokio::test]
    async fn test_install_seed() {
        let seed = Seed::from_yaml(SEED).unwrap();
        let store = InMemoryStore::new();
        let report = seed.install(&store).await.unwrap();

        assert_eq!(report.roles, 4);
        assert_eq!(report.policies, 2);
        assert_eq!(report.assignments, 3);

        let auditor = store.find_by_name("auditor").await.unwrap().unwrap();
        assert_eq!(auditor.id().as_str(), "auditor");
        assert!(auditor.has_permission(&PermissionId::from("report-read")));
        assert_eq!(auditor.permissions().len(), 2);

        let alice = store.find_roles_by_user(&UserId::from("alice")).await.unwrap();
        let names: Vec<_> = alice.iter().map(|r| r.name()).collect();
        assert_eq!(names, vec!["auditor", "manager"]);

        let root = store.find_roles_by_user(&UserId::from("root")).await.unwrap();
        assert!(root[0].is_system());

        let policies = store.all_policies().await;
        assert_eq!(policies[0].id().as_str(), "deny-archived-updates");
        assert!(!policies[1].is_active());
        assert_eq!(policies[1].conditions().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_references_fail() {
        let store = InMemoryStore::new();
        let seed = Seed::from_yaml("roles:\n  - name: auditor\n    permissions: [report:read]\n").unwrap();
        let err = seed.install(&store).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionNotFound);

        let store = InMemoryStore::new();
        let seed = Seed::from_yaml("user_roles:\n  alice: [ghost]\n").unwrap();
        let err = seed.install(&store).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RoleNotFound);
    }

    #[tokio::test]
    async fn test_permission_pair_must_be_unique() {
        let store = InMemoryStore::new();
        let seed =
            Seed::from_yaml("defaults: true\npermissions:\n  - resource: task\n    action: read\n")
                .unwrap();
        let err = seed.install(&store).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidPermission);

        let store = InMemoryStore::new();
        let yaml = r#"
permissions:
  - resource: report
    action: read
  - id: report-read-again
    resource: report
    action: read
"#;
        let err = Seed::from_yaml(yaml).unwrap().install(&store).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidPermission);

        let report_read = PermissionRepository::find_all(&store)
            .await
            .unwrap()
            .iter()
            .filter(|p| p.resource().to_string() == "report")
            .count();
        assert_eq!(report_read, 1);
    }

    #[tokio::test]
    async fn test_malformed_conditions_are_loaded_verbatim() {
        let yaml = r#"
policies:
  - name: broken
    resource: file
    action: read
    effect: deny
    conditions:
      owner_id: ~
"#;
        let store = InMemoryStore::new();
        Seed::from_yaml(yaml).unwrap().install(&store).await.unwrap();

        let policies = store.all_policies().await;
        assert_eq!(policies.len(), 1);
        assert!(policies[0].conditions().is_err());
    }

    #[test]
    fn test_invalid_documents() {
        let err = Seed::from_yaml("permissions:\n  - resource: Task!\n    action: read\n").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidSeed);

        let err = Seed::from_file(Path::new("/nonexistent/authz.yaml")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidSeed);
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(SEED.as_bytes()).unwrap();

        let seed = Seed::from_file(file.path()).unwrap();
        assert!(seed.defaults);
        assert_eq!(seed.policies.len(), 2);
        assert_eq!(seed.user_roles["alice"], vec!["auditor", "manager"]);

        let reparsed = Seed::from_yaml(&seed.to_yaml().unwrap()).unwrap();
        assert_eq!(reparsed.roles[0].permissions, seed.roles[0].permissions);
    }
}
