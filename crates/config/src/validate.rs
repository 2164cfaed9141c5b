//! Configuration validation.
//!
//! Checks a loaded [`ChatdeskConfig`] for settings that would make the
//! gateway misbehave at runtime: missing Graph API credentials, zero
//! timeouts, an open API on a public bind address.

use std::path::PathBuf;

use secrecy::ExposeSecret;

use crate::schema::ChatdeskConfig;

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Category: "credentials", "timeouts", "security", "templates"
    pub category: &'static str,
    /// Dotted path, e.g. "whatsapp.phone_number_id"
    pub path: String,
    pub message: String,
}

/// Result of validating a configuration.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
    pub config_path: Option<PathBuf>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Count diagnostics by severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    fn push(
        &mut self,
        severity: Severity,
        category: &'static str,
        path: &str,
        message: impl Into<String>,
    ) {
        self.diagnostics.push(Diagnostic {
            severity,
            category,
            path: path.into(),
            message: message.into(),
        });
    }
}

/// Validate an already-parsed config.
#[must_use]
pub fn validate_config(config: &ChatdeskConfig) -> ValidationResult {
    let mut result = ValidationResult::default();
    let wa = &config.whatsapp;

    if wa.access_token.is_none() {
        result.push(
            Severity::Warning,
            "credentials",
            "whatsapp.access_token",
            "no access token; outbound sends, templates and media will fail",
        );
    }
    if wa.phone_number_id.trim().is_empty() {
        result.push(
            Severity::Warning,
            "credentials",
            "whatsapp.phone_number_id",
            "no phone number id; outbound sends will fail",
        );
    }
    if wa.waba_id.as_deref().is_none_or(|id| id.trim().is_empty()) {
        result.push(
            Severity::Info,
            "templates",
            "whatsapp.waba_id",
            "no business account id; template cache cannot refresh",
        );
    }
    if wa.verify_token.is_empty() {
        result.push(
            Severity::Warning,
            "credentials",
            "whatsapp.verify_token",
            "empty verify token; webhook subscription handshake will be rejected",
        );
    }
    if wa.app_secret.is_none() {
        result.push(
            Severity::Warning,
            "security",
            "whatsapp.app_secret",
            "no app secret; inbound webhook signatures are not verified",
        );
    }
    if wa.request_timeout_secs == 0 {
        result.push(
            Severity::Error,
            "timeouts",
            "whatsapp.request_timeout_secs",
            "gateway calls must have a bounded timeout",
        );
    }
    if config.database.max_connections == 0 {
        result.push(
            Severity::Error,
            "timeouts",
            "database.max_connections",
            "pool needs at least one connection",
        );
    }
    if config.database.acquire_timeout_secs == 0 {
        result.push(
            Severity::Error,
            "timeouts",
            "database.acquire_timeout_secs",
            "pool acquisition must have a bounded timeout",
        );
    }
    if config.templates.default_language.trim().is_empty() {
        result.push(
            Severity::Error,
            "templates",
            "templates.default_language",
            "default template language must not be empty",
        );
    }

    let api_open = config
        .auth
        .api_key
        .as_ref()
        .is_none_or(|k| k.expose_secret().is_empty());
    if api_open && !is_loopback(&config.server.bind) {
        result.push(
            Severity::Warning,
            "security",
            "auth.api_key",
            format!(
                "no api key while binding {}; the chat panel API is open to the network",
                config.server.bind
            ),
        );
    }

    result
}

fn is_loopback(bind: &str) -> bool {
    matches!(bind, "127.0.0.1" | "::1" | "localhost")
}
