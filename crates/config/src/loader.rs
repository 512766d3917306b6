use std::path::{Path, PathBuf};

use {secrecy::Secret, tracing::debug};

use crate::{
    env_subst::substitute_env,
    error::{Error, Result},
    schema::CourierConfig,
};

const CONFIG_FILENAME: &str = "courier.toml";

/// Load config from the given TOML file, substituting `${ENV_VAR}` placeholders.
pub fn load_config(path: &Path) -> Result<CourierConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");
    if ext != "toml" {
        return Err(Error::UnsupportedFormat(ext.to_string()));
    }
    let raw = std::fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let raw = substitute_env(&raw);
    toml::from_str(&raw).map_err(|source| Error::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Load config from `explicit`, or discover it in the standard locations,
/// then apply `LP_*` environment overrides.
///
/// Search order when no path is given:
/// 1. `./courier.toml` (project-local)
/// 2. `~/.config/courier/courier.toml` (user-global)
///
/// A missing file is not an error: defaults plus the environment are used.
pub fn discover_and_load(explicit: Option<&Path>) -> Result<CourierConfig> {
    let path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => find_config_file(),
    };

    let mut config = match path {
        Some(path) => {
            debug!(path = %path.display(), "loading config");
            load_config(&path)?
        },
        None => {
            debug!("no config file found, using defaults");
            CourierConfig::default()
        },
    };

    apply_env_overrides(&mut config, |name| std::env::var(name).ok());
    Ok(config)
}

/// Overlay credentials from the `LP_*` variables. Empty values are ignored.
pub fn apply_env_overrides(config: &mut CourierConfig, lookup: impl Fn(&str) -> Option<String>) {
    let get = |name: &str| lookup(name).filter(|v| !v.is_empty());
    let creds = &mut config.credentials;

    if let Some(v) = get("LP_ACCOUNT") {
        creds.account_id = v;
    }
    if let Some(v) = get("LP_USER") {
        creds.username = v;
    }
    if let Some(v) = get("LP_APPKEY") {
        creds.app_key = Secret::new(v);
    }
    if let Some(v) = get("LP_SECRET") {
        creds.secret = Secret::new(v);
    }
    if let Some(v) = get("LP_ACCESSTOKEN") {
        creds.access_token = Secret::new(v);
    }
    if let Some(v) = get("LP_ACCESSTOKENSECRET") {
        creds.access_token_secret = Secret::new(v);
    }
}

/// Find the config file in standard locations.
fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from(CONFIG_FILENAME);
    if local.exists() {
        return Some(local);
    }

    config_dir()
        .map(|dir| dir.join(CONFIG_FILENAME))
        .filter(|p| p.exists())
}

/// Returns the user-global config directory (`~/.config/courier/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "courier").map(|d| d.config_dir().to_path_buf())
}
