//! Configuration loading, env substitution, environment overrides and validation.
//!
//! Config file: `courier.toml`, searched in `./` then `~/.config/courier/`.
//! The file is optional; the `LP_*` environment variables alone are enough.
//!
//! Supports `${ENV_VAR}` substitution in all string values.

pub mod env_subst;
pub mod error;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    error::{Error, Result},
    loader::{apply_env_overrides, config_dir, discover_and_load, load_config},
    schema::{AgentSettings, CourierConfig, Credentials, ReconnectSettings},
    validate::validate,
};
