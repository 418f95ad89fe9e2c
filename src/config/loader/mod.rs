use crate::config::Config;
use crate::config::overrides::apply_env_overrides;
use crate::utils::get_wahub_home;
use anyhow::{Context, Result};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub fn get_config_path() -> Result<PathBuf> {
    Ok(get_wahub_home()?.join("config.json"))
}

/// Load `config.json` (or defaults if absent), apply environment overrides
/// and validate.
pub fn load_config(config_path: Option<&Path>) -> Result<Config> {
    let default_path = get_config_path().unwrap_or_else(|_| PathBuf::from("config.json"));
    let path = config_path.unwrap_or(default_path.as_path());

    let mut config = if path.exists() {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        check_file_permissions(path);
        parse_config(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))?
    } else {
        debug!("no config at {}, using defaults", path.display());
        Config::default()
    };

    apply_env_overrides(&mut config);
    config
        .validate()
        .with_context(|| "Configuration validation failed")?;
    Ok(config)
}

/// Parse config JSON, migrating legacy keys. Does not validate.
pub fn parse_config(content: &str) -> Result<Config> {
    let data: Value = serde_json::from_str(content).context("Failed to parse config JSON")?;
    let data = migrate_config(data);
    serde_json::from_value(data).context("Failed to deserialize config")
}

/// Config files hold tenant secrets; warn once if they are group/world readable.
#[cfg(unix)]
fn check_file_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    use std::sync::Once;

    static WARNED: Once = Once::new();
    WARNED.call_once(|| {
        if let Ok(meta) = fs::metadata(path) {
            let mode = meta.permissions().mode();
            if mode & 0o077 != 0 {
                warn!(
                    "config file {} has permissions {:o}, recommend 0600",
                    path.display(),
                    mode & 0o777
                );
            }
        }
    });
}

#[cfg(not(unix))]
fn check_file_permissions(_path: &Path) {}

fn migrate_config(data: Value) -> Value {
    // session.transcriptBound → session.maxUserTurns + session.maxAssistantTurns
    if let Value::Object(mut map) = data {
        if let Some(Value::Object(session)) = map.get_mut("session")
            && let Some(bound) = session.remove("transcriptBound")
        {
            for key in ["maxUserTurns", "maxAssistantTurns"] {
                if !session.contains_key(key) {
                    session.insert(key.to_string(), bound.clone());
                }
            }
        }
        Value::Object(map)
    } else {
        data
    }
}

#[cfg(test)]
mod tests;
