pub mod check;
pub mod defaults;
pub mod user;
pub mod validate;

use anyhow::{Context, Result};
use authz::{InMemoryStore, PermissionService, Seed};
use std::sync::Arc;

use crate::utils::env_paths::EnvPaths;

/// Loads the seed document into a fresh in-memory store.
pub async fn load_store(paths: &EnvPaths) -> Result<Arc<InMemoryStore>> {
    let seed = Seed::from_file(&paths.seed_path)
        .with_context(|| format!("Failed to load seed {}", paths.seed_path.display()))?;

    let store = Arc::new(InMemoryStore::new());
    seed.install(store.as_ref())
        .await
        .context("Failed to install seed")?;
    Ok(store)
}

pub fn permission_service(store: &Arc<InMemoryStore>) -> PermissionService {
    PermissionService::new(store.clone(), store.clone(), store.clone())
}
