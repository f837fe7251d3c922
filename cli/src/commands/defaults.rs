use anyhow::Result;
use authz::defaults::{default_permissions, default_roles};
use authz::Permission;
use colored::*;
use serde_json::json;

/// Print the built-in permission catalog and roles
pub fn execute(format: String) -> Result<()> {
    let permissions: Vec<String> = default_permissions()
        .iter()
        .map(|(resource, action)| Permission::default_name(resource, action))
        .collect();
    let roles = default_roles();

    match format.as_str() {
        "json" => {
            let output = json!({ "permissions": permissions, "roles": roles });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        "text" => {
            println!("{}", "Permissions:".bold());
            for permission in &permissions {
                println!("  {}", permission);
            }
            println!("{}", "Roles:".bold());
            for role in &roles {
                let system = if role.is_system { " [system]" } else { "" };
                println!(
                    "  {}{} {}",
                    role.name.cyan(),
                    system.magenta(),
                    format!("({} permissions)", role.grants.len()).bright_black()
                );
            }
        }
        _ => {
            let output = json!({ "permissions": permissions, "roles": roles });
            print!("{}", serde_yaml::to_string(&output)?);
        }
    }

    Ok(())
}
