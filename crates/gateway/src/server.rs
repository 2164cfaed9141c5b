use std::sync::Arc;

use {
    anyhow::Context,
    axum::{
        Json, Router,
        extract::State,
        http::{HeaderValue, Method, header},
        response::IntoResponse,
        routing::{get, post, put},
    },
    tokio_util::sync::CancellationToken,
    tower_http::{
        cors::{AllowOrigin, Any, CorsLayer},
        trace::TraceLayer,
    },
    tracing::{info, warn},
};

use {
    chatdesk_config::ChatdeskConfig,
    chatdesk_inbox::{Inbox, InboxOptions, open_pool, run_migrations},
    chatdesk_whatsapp_business::GraphClient,
};

use crate::{
    auth_middleware::require_auth, broadcast::Broadcaster, chat_routes, media_routes,
    send_routes, state::GatewayState, template_routes, webhook_routes, ws::ws_upgrade_handler,
};

#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<GatewayState>,
}

/// Build the gateway router (shared between production startup and tests).
pub fn build_gateway_app(state: Arc<GatewayState>, cors_origins: &[String]) -> Router {
    let app_state = AppState { gateway: state };

    let protected = Router::new()
        .route("/api/chats", get(chat_routes::list_chats))
        .route("/api/chats/{phone}/messages", get(chat_routes::list_messages))
        .route("/api/chats/{phone}/read", post(chat_routes::mark_read))
        .route("/api/chats/{phone}/pin", put(chat_routes::set_pinned))
        .route("/api/send-message", post(send_routes::send_message))
        .route("/api/send-template", post(send_routes::send_template))
        .route("/api/templates", get(template_routes::list_templates))
        .route(
            "/api/templates/refresh",
            post(template_routes::refresh_templates),
        )
        .route("/api/media/{media_id}", get(media_routes::media_proxy))
        .route("/ws", get(ws_upgrade_handler))
        .layer(axum::middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    Router::new()
        .route("/health", get(health_handler))
        .route(
            "/webhook",
            get(webhook_routes::webhook_verify).post(webhook_routes::webhook_receive),
        )
        .merge(protected)
        .layer(cors_layer(cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "ignoring invalid CORS origin");
                None
            },
        })
        .collect();

    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);
    if allowed.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(AllowOrigin::list(allowed))
    }
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "ok": true,
        "version": state.gateway.version,
        "connections": state.gateway.broadcaster.client_count(),
    }))
}

/// Open the database, wire the inbox and serve until Ctrl-C / SIGTERM.
pub async fn start_gateway(config: ChatdeskConfig) -> anyhow::Result<()> {
    let pool = open_pool(&config.database)
        .await
        .context("failed to open database")?;
    run_migrations(&pool)
        .await
        .context("failed to run migrations")?;

    let broadcaster = Arc::new(Broadcaster::default());
    let graph = Arc::new(GraphClient::new(&config.whatsapp)?);
    let inbox = Arc::new(Inbox::new(
        pool.clone(),
        graph,
        broadcaster.clone(),
        InboxOptions::from_config(&config),
    ));

    if !config.whatsapp.can_send() {
        warn!("whatsapp credentials incomplete; outbound sends will fail");
    }

    let cancel = CancellationToken::new();
    let refresh = if config.whatsapp.waba_id.is_some() && config.whatsapp.access_token.is_some() {
        inbox.spawn_template_refresh(config.templates.refresh_interval(), cancel.clone())
    } else {
        info!("template refresh disabled: no business account id or access token");
        None
    };

    let state = GatewayState::new(inbox, broadcaster, &config);
    if state.api_key.is_none() {
        warn!("no api key configured; chat panel API is open");
    }
    let app = build_gateway_app(state, &config.server.cors_origins);

    let listener = tokio::net::TcpListener::bind((config.server.bind.as_str(), config.server.port))
        .await
        .with_context(|| {
            format!(
                "failed to bind {}:{}",
                config.server.bind, config.server.port
            )
        })?;
    info!(addr = %listener.local_addr()?, "chatdesk gateway listening");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel.clone()))
        .await;

    cancel.cancel();
    if let Some(handle) = refresh
        && let Err(e) = handle.await
    {
        warn!(error = %e, "template refresh task ended abnormally");
    }
    pool.close().await;
    info!("chatdesk gateway stopped");
    served.context("server error")
}

/// Resolves on Ctrl-C, SIGTERM, or when `cancel` fires.
async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            },
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            },
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("shutdown requested (ctrl-c)"),
        () = terminate => info!("shutdown requested (SIGTERM)"),
        () = cancel.cancelled() => {},
    }
}
