use anyhow::Result;
use authz::UserId;
use colored::*;

use super::{load_store, permission_service};
use crate::utils::env_paths::EnvPaths;

/// List every permission a user holds through their roles
pub async fn permissions(paths: &EnvPaths, user: String, format: String) -> Result<()> {
    let store = load_store(paths).await?;
    let service = permission_service(&store);
    let permissions = service
        .get_user_permissions(&UserId::from(user.as_str()))
        .await?;

    match format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&permissions)?),
        "yaml" => print!("{}", serde_yaml::to_string(&permissions)?),
        _ => {
            if permissions.is_empty() {
                println!("{}", format!("User {} has no permissions", user).yellow());
                return Ok(());
            }
            println!("{}", format!("Permissions for {}:", user).bold());
            for permission in &permissions {
                println!(
                    "  {} {}",
                    permission.name().cyan(),
                    format!("({} {})", permission.action(), permission.resource()).bright_black()
                );
            }
        }
    }

    Ok(())
}

/// List the roles assigned to a user, in assignment order
pub async fn roles(paths: &EnvPaths, user: String, format: String) -> Result<()> {
    let store = load_store(paths).await?;
    let service = permission_service(&store);
    let roles = service.get_user_roles(&UserId::from(user.as_str())).await?;

    match format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&roles)?),
        "yaml" => print!("{}", serde_yaml::to_string(&roles)?),
        _ => {
            if roles.is_empty() {
                println!("{}", format!("User {} has no roles", user).yellow());
                return Ok(());
            }
            println!("{}", format!("Roles for {}:", user).bold());
            for role in &roles {
                let system = if role.is_system() { " [system]" } else { "" };
                println!(
                    "  {}{} {}",
                    role.name().cyan(),
                    system.magenta(),
                    role.display_name().bright_black()
                );
            }
        }
    }

    Ok(())
}
