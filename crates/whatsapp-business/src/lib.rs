//! WhatsApp Business Cloud API integration: the Graph API client used for
//! sends, templates and media, plus webhook authenticity checks.

pub mod client;
pub mod types;
pub mod webhook;

pub use {
    client::GraphClient,
    webhook::{SIGNATURE_HEADER, constant_time_eq, verify_signature, verify_webhook_subscription},
};
