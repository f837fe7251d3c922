use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};

const DEFAULT_SEED_PATH: &str = "./config/authz.yaml";

/// Loads `.env` from the working directory, if present, so its values are
/// visible to clap's `env` lookups.
pub fn load_dotenv() {
    if let Ok(cwd) = env::current_dir() {
        let env_file = cwd.join(".env");
        if env_file.exists() {
            dotenv::from_path(&env_file).ok();
        }
    }
}

/// File locations used by the CLI.
#[derive(Debug, Clone)]
pub struct EnvPaths {
    pub seed_path: PathBuf,
    pub log_dir: Option<PathBuf>,
}

impl EnvPaths {
    /// Resolves paths from explicit values (flags or their env fallbacks),
    /// defaulting the seed path. Relative paths resolve against the working
    /// directory.
    pub fn resolve(seed_path: Option<PathBuf>, log_dir: Option<PathBuf>) -> Result<Self> {
        let base = env::current_dir().context("Failed to get current directory")?;
        Ok(Self::resolve_with_base(seed_path, log_dir, &base))
    }

    pub fn resolve_with_base(
        seed_path: Option<PathBuf>,
        log_dir: Option<PathBuf>,
        base_dir: &Path,
    ) -> Self {
        let seed_path = seed_path.unwrap_or_else(|| PathBuf::from(DEFAULT_SEED_PATH));
        Self {
            seed_path: absolutize(seed_path, base_dir),
            log_dir: log_dir.map(|dir| absolutize(dir, base_dir)),
        }
    }
}

fn absolutize(path: PathBuf, base_dir: &Path) -> PathBuf {
    if path.is_relative() {
        base_dir.join(path)
    } else {
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_relative_to_base() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path();

        let paths = EnvPaths::resolve_with_base(None, None, base);
        assert_eq!(paths.seed_path, base.join("./config/authz.yaml"));
        assert!(paths.seed_path.ends_with("config/authz.yaml"));
        assert!(paths.log_dir.is_none());
    }

    #[test]
    fn test_relative_overrides() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path();

        let paths = EnvPaths::resolve_with_base(
            Some(PathBuf::from("seeds/dev.yaml")),
            Some(PathBuf::from("logs")),
            base,
        );
        assert_eq!(paths.seed_path, base.join("seeds/dev.yaml"));
        assert_eq!(paths.log_dir, Some(base.join("logs")));
    }

    #[test]
    fn test_absolute_paths_used_as_is() {
        let temp_dir = TempDir::new().unwrap();
        let seed = temp_dir.path().join("authz.yaml");

        let paths = EnvPaths::resolve_with_base(Some(seed.clone()), None, Path::new("/elsewhere"));
        assert_eq!(paths.seed_path, seed);
    }
}
