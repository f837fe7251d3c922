use anyhow::Result;
use colored::*;
use serde_json::json;

use super::load_store;
use crate::utils::env_paths::EnvPaths;

/// Checks that every policy in the seed has decodable conditions.
/// Returns false when any policy is malformed.
pub async fn execute(paths: &EnvPaths, format: String) -> Result<bool> {
    let store = load_store(paths).await?;
    let policies = store.all_policies().await;

    let malformed: Vec<_> = policies
        .iter()
        .filter_map(|policy| policy.conditions().err().map(|err| (policy, err)))
        .collect();

    match format.as_str() {
        "json" => {
            let output = json!({
                "seed": paths.seed_path.display().to_string(),
                "policies": policies.len(),
                "malformed": malformed
                    .iter()
                    .map(|(policy, err)| json!({
                        "id": policy.id().as_str(),
                        "name": policy.name(),
                        "error": err.to_string(),
                    }))
                    .collect::<Vec<_>>(),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        _ => {
            println!(
                "{} {}",
                "Seed:".bold(),
                paths.seed_path.display().to_string().cyan()
            );
            if malformed.is_empty() {
                println!(
                    "{}",
                    format!("All {} policies have valid conditions", policies.len()).green()
                );
            } else {
                println!(
                    "{}",
                    format!(
                        "{} of {} policies have malformed conditions:",
                        malformed.len(),
                        policies.len()
                    )
                    .red()
                    .bold()
                );
                for (policy, err) in &malformed {
                    println!("  {} ({}): {}", policy.name().yellow(), policy.id(), err);
                }
            }
        }
    }

    Ok(malformed.is_empty())
}
