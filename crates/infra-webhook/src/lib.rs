// Herald Infrastructure - Webhook Adapter
// Implements: WebhookClient over HTTP (reqwest)

mod client;
mod html;

pub use client::{HttpWebhookClient, DEFAULT_TIMEOUT, NON_HTML_ERROR_MESSAGE};
