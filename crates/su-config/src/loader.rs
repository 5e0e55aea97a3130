use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::Config;

/// Resolve a user-supplied path, expanding ~ to the home directory.
pub fn resolve_path(path: &str) -> PathBuf {
    if path.starts_with("~/") || path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home.join(path.strip_prefix("~/").unwrap_or(""));
        }
    }
    PathBuf::from(path)
}

/// Find the config file by searching standard locations.
pub fn find_config_path() -> PathBuf {
    // 1. Current directory
    let local = Path::new("su-cli.json");
    if local.exists() {
        return local.to_path_buf();
    }

    // 2. ~/.su-cli/config.json
    if let Some(home) = dirs::home_dir() {
        let home_config = home.join(".su-cli").join("config.json");
        if home_config.exists() {
            return home_config;
        }
    }

    // Default: ~/.su-cli/config.json (defaults are used while it is missing)
    dirs::home_dir()
        .map(|h| h.join(".su-cli").join("config.json"))
        .unwrap_or_else(|| PathBuf::from("su-cli.json"))
}

/// Load configuration from a JSON file. A missing file yields defaults.
pub fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config '{}'", path.display()))?;
        let config: Config = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse config '{}'", path.display()))?;
        Ok(config)
    } else {
        Ok(Config::default())
    }
}

/// Save configuration to a JSON file.
pub fn save_config(path: &Path, config: &Config) -> Result<()> {
    let contents = serde_json::to_string_pretty(config)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).with_context(|| {
            format!(
                "failed to create config directory '{}'",
                parent.to_string_lossy()
            )
        })?;
    }
    std::fs::write(path, contents)
        .with_context(|| format!("failed to write config '{}'", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = load_config(&tmp.path().join("nope.json")).unwrap();
        assert_eq!(cfg.agents_dir, "agents");
        assert_eq!(cfg.language, "en");
    }

    #[test]
    fn save_then_load_keeps_language() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("config.json");
        let mut cfg = Config::default();
        cfg.language = "zh".into();
        save_config(&path, &cfg).unwrap();

        let loaded = load_config(&path).unwrap();
        assert_eq!(loaded.language, "zh");
    }

    #[test]
    fn malformed_file_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = load_config(&path).unwrap_err();
        assert!(format!("{err:#}").contains("failed to parse config"));
    }

    #[test]
    fn resolve_path_expands_home() {
        let resolved = resolve_path("~/.su-cli/history");
        if let Some(home) = dirs::home_dir() {
            assert_eq!(resolved, home.join(".su-cli/history"));
        }
        assert_eq!(resolve_path("agents"), PathBuf::from("agents"));
    }
}
