//! Configuration loading, env substitution and validation.
//!
//! Config files: `chatdesk.toml`, `chatdesk.yaml`, or `chatdesk.json`
//! Searched in `./` then `~/.config/chatdesk/`.
//!
//! Supports `${ENV_VAR}` and `${ENV_VAR:-default}` substitution in all string
//! values, plus `CHATDESK_*` overrides for credentials.

pub mod env_subst;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    loader::{apply_env_overrides, config_dir, discover_and_load, find_config_file, load_config},
    schema::{
        AuthConfig, ChatdeskConfig, DatabaseConfig, ServerConfig, TemplatesConfig, WhatsAppConfig,
    },
    validate::{Diagnostic, Severity, ValidationResult, validate_config},
};
