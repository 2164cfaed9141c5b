use std::sync::Arc;

use secrecy::{ExposeSecret, Secret};

use {chatdesk_config::ChatdeskConfig, chatdesk_inbox::Inbox};

use crate::broadcast::Broadcaster;

/// Shared state behind every route.
pub struct GatewayState {
    pub inbox: Arc<Inbox>,
    pub broadcaster: Arc<Broadcaster>,
    /// Expected `hub.verify_token` for the subscription handshake.
    pub verify_token: String,
    /// Key for `X-Hub-Signature-256`; `None` skips the check.
    pub app_secret: Option<Secret<String>>,
    /// Bearer key for `/api/*` and `/ws`; `None` leaves them open.
    pub api_key: Option<Secret<String>>,
    pub version: String,
}

impl GatewayState {
    pub fn new(
        inbox: Arc<Inbox>,
        broadcaster: Arc<Broadcaster>,
        config: &ChatdeskConfig,
    ) -> Arc<Self> {
        let non_empty =
            |s: &Option<Secret<String>>| s.clone().filter(|v| !v.expose_secret().is_empty());
        Arc::new(Self {
            inbox,
            broadcaster,
            verify_token: config.whatsapp.verify_token.clone(),
            app_secret: non_empty(&config.whatsapp.app_secret),
            api_key: non_empty(&config.auth.api_key),
            version: env!("CARGO_PKG_VERSION").to_string(),
        })
    }
}
