use std::path::{Path, PathBuf};

use {
    secrecy::Secret,
    tracing::{debug, warn},
};

use crate::{env_subst::substitute_env, schema::ChatdeskConfig};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "chatdesk.toml",
    "chatdesk.yaml",
    "chatdesk.yml",
    "chatdesk.json",
];

/// Load config from the given path (any supported format), then apply
/// `CHATDESK_*` environment overrides.
pub fn load_config(path: &Path) -> anyhow::Result<ChatdeskConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let raw = substitute_env(&raw);
    let mut config = parse_config(&raw, path)?;
    apply_env_overrides(&mut config);
    Ok(config)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./chatdesk.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/chatdesk/chatdesk.{toml,yaml,yml,json}` (user-global)
///
/// Falls back to `ChatdeskConfig::default()` (with env overrides) when no
/// file is found or the file fails to parse.
pub fn discover_and_load() -> ChatdeskConfig {
    if let Some(path) = find_config_file() {
        debug!(path = %path.display(), "loading config");
        match load_config(&path) {
            Ok(cfg) => return cfg,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            },
        }
    } else {
        debug!("no config file found, using defaults");
    }
    let mut config = ChatdeskConfig::default();
    apply_env_overrides(&mut config);
    config
}

/// Find the first config file in standard locations.
pub fn find_config_file() -> Option<PathBuf> {
    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }

    let config_dir = config_dir()?;
    CONFIG_FILENAMES
        .iter()
        .map(|name| config_dir.join(name))
        .find(|p| p.exists())
}

/// Returns the user-global config directory (`~/.config/chatdesk/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "chatdesk").map(|d| d.config_dir().to_path_buf())
}

/// Overlay credentials and deployment knobs from the process environment.
///
/// `DATABASE_URL` and `PORT` are honoured as well so the binary drops into
/// the usual PaaS conventions.
pub fn apply_env_overrides(config: &mut ChatdeskConfig) {
    apply_env_overrides_with(config, |name| std::env::var(name).ok());
}

fn apply_env_overrides_with(config: &mut ChatdeskConfig, lookup: impl Fn(&str) -> Option<String>) {
    let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(v) = get("CHATDESK_ACCESS_TOKEN") {
        config.whatsapp.access_token = Some(Secret::new(v));
    }
    if let Some(v) = get("CHATDESK_PHONE_NUMBER_ID") {
        config.whatsapp.phone_number_id = v;
    }
    if let Some(v) = get("CHATDESK_WABA_ID") {
        config.whatsapp.waba_id = Some(v);
    }
    if let Some(v) = get("CHATDESK_VERIFY_TOKEN") {
        config.whatsapp.verify_token = v;
    }
    if let Some(v) = get("CHATDESK_APP_SECRET") {
        config.whatsapp.app_secret = Some(Secret::new(v));
    }
    if let Some(v) = get("CHATDESK_GRAPH_VERSION") {
        config.whatsapp.api_version = v;
    }
    if let Some(v) = get("CHATDESK_API_KEY") {
        config.auth.api_key = Some(Secret::new(v));
    }
    if let Some(v) = get("CHATDESK_DATABASE_URL").or_else(|| get("DATABASE_URL")) {
        config.database.url = v;
    }
    if let Some(v) = get("CHATDESK_PORT").or_else(|| get("PORT")) {
        match v.parse() {
            Ok(port) => config.server.port = port,
            Err(e) => warn!(value = %v, error = %e, "ignoring invalid port override"),
        }
    }
}

fn parse_config(raw: &str, path: &Path) -> anyhow::Result<ChatdeskConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, secrecy::ExposeSecret, std::collections::HashMap};

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn load_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chatdesk.toml");
        std::fs::write(
            &path,
            "[server]\nport = 8080\n\n[whatsapp]\nphone_number_id = \"42\"\n",
        )
        .unwrap();

        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.whatsapp.phone_number_id, "42");
    }

    #[test]
    fn load_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chatdesk.json");
        std::fs::write(&path, r#"{"templates": {"default_language": "en_US"}}"#).unwrap();

        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.templates.default_language, "en_US");
    }

    #[test]
    fn rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chatdesk.ini");
        std::fs::write(&path, "port=1").unwrap();
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn env_overrides_fill_credentials() {
        let mut cfg = ChatdeskConfig::default();
        apply_env_overrides_with(
            &mut cfg,
            lookup_from(&[
                ("CHATDESK_ACCESS_TOKEN", "EAAG-token"),
                ("CHATDESK_PHONE_NUMBER_ID", "1099"),
                ("CHATDESK_API_KEY", "panel-key"),
                ("DATABASE_URL", "sqlite::memory:"),
                ("PORT", "3000"),
            ]),
        );
        assert_eq!(
            cfg.whatsapp.access_token.as_ref().unwrap().expose_secret(),
            "EAAG-token"
        );
        assert_eq!(cfg.whatsapp.phone_number_id, "1099");
        assert_eq!(cfg.auth.api_key.as_ref().unwrap().expose_secret(), "panel-key");
        assert_eq!(cfg.database.url, "sqlite::memory:");
        assert_eq!(cfg.server.port, 3000);
    }

    #[test]
    fn prefixed_database_url_wins() {
        let mut cfg = ChatdeskConfig::default();
        apply_env_overrides_with(
            &mut cfg,
            lookup_from(&[
                ("CHATDESK_DATABASE_URL", "sqlite://a.db"),
                ("DATABASE_URL", "sqlite://b.db"),
            ]),
        );
        assert_eq!(cfg.database.url, "sqlite://a.db");
    }

    #[test]
    fn invalid_port_is_ignored() {
        let mut cfg = ChatdeskConfig::default();
        apply_env_overrides_with(&mut cfg, lookup_from(&[("PORT", "not-a-port")]));
        assert_eq!(cfg.server.port, 10000);
    }
}
