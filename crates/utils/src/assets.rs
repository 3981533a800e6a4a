use std::path::PathBuf;

use directories::ProjectDirs;

pub const ASSET_DIR_ENV: &str = "HK_ASSET_DIR";

const PROJECT_ROOT: &str = env!("CARGO_MANIFEST_DIR");

fn ensure_dir(path: PathBuf) -> PathBuf {
    if !path.exists()
        && let Err(err) = std::fs::create_dir_all(&path)
    {
        tracing::warn!(path = %path.display(), error = %err, "Failed to create directory");
    }
    path
}

/// Root for config, database and stored files.
///
/// `HK_ASSET_DIR` wins; debug builds use `dev_assets/` in the workspace,
/// release builds the platform data directory.
pub fn asset_dir() -> PathBuf {
    if let Ok(override_dir) = std::env::var(ASSET_DIR_ENV) {
        let override_dir = override_dir.trim();
        if !override_dir.is_empty() {
            return ensure_dir(PathBuf::from(override_dir));
        }
    }

    let path = if cfg!(debug_assertions) {
        PathBuf::from(PROJECT_ROOT).join("../../dev_assets")
    } else {
        ProjectDirs::from("app", "homekeep", "homekeep")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from(".homekeep"))
    };

    ensure_dir(path)
}

pub fn config_path() -> PathBuf {
    asset_dir().join("config.json")
}

pub fn storage_dir() -> PathBuf {
    ensure_dir(asset_dir().join("storage"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_override_is_created_and_used() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path().join("assets");
        // SAFETY: this crate's only env-mutating test
        unsafe { std::env::set_var(ASSET_DIR_ENV, &root) };

        assert_eq!(asset_dir(), root);
        assert!(root.exists());
        assert_eq!(config_path(), root.join("config.json"));
        assert!(storage_dir().ends_with("storage"));
        assert!(root.join("storage").exists());

        unsafe { std::env::remove_var(ASSET_DIR_ENV) };
    }
}
