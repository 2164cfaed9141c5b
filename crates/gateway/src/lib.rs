//! HTTP surface of chatdesk: the WhatsApp webhook, the chat panel API, the
//! media proxy and the live WebSocket feed.

pub mod auth_middleware;
pub mod broadcast;
pub mod chat_routes;
pub mod error;
pub mod media_routes;
pub mod send_routes;
pub mod server;
pub mod state;
pub mod template_routes;
pub mod webhook_routes;
pub mod ws;

pub use {
    server::{AppState, build_gateway_app, start_gateway},
    state::GatewayState,
};
