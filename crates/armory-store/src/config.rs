use std::path::{Path, PathBuf};
use std::{env, fs};

use armory_core::ArmoryConfig;

use crate::error::{Result, StoreError};

pub const CONFIG_FILE: &str = "armory.toml";

/// Overrides the base directory for the database and config file.
pub const DATA_DIR_ENV: &str = "ARMORY_DATA_DIR";

/// Default base directory for all armory storage.
pub fn default_base_dir() -> PathBuf {
    resolve_base_dir(env::var(DATA_DIR_ENV).ok().as_deref())
}

fn resolve_base_dir(override_dir: Option<&str>) -> PathBuf {
    match override_dir {
        Some(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
        _ => dirs_home().join(".shadow-armory"),
    }
}

fn dirs_home() -> PathBuf {
    env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

pub fn config_path(base: &Path) -> PathBuf {
    base.join(CONFIG_FILE)
}

/// Load `armory.toml` from `base`. A missing file yields defaults; a file
/// that exists but does not parse is an error rather than a silent reset.
pub fn load_config(base: &Path) -> Result<ArmoryConfig> {
    let path = config_path(base);
    let text = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("no config at {}, using defaults", path.display());
            return Ok(ArmoryConfig::default());
        }
        Err(e) => return Err(e.into()),
    };
    let config = parse_config(&text)?;
    tracing::debug!("loaded config from {}", path.display());
    Ok(config)
}

pub fn parse_config(text: &str) -> Result<ArmoryConfig> {
    Ok(toml::from_str(text)?)
}

/// Render a config as TOML, e.g. to seed a fresh `armory.toml`.
pub fn render_config(config: &ArmoryConfig) -> Result<String> {
    toml::to_string_pretty(config).map_err(|e| StoreError::Config(e.to_string()))
}
