// HTTP WebhookClient Implementation

use crate::html::{extract_title, is_html};
use async_trait::async_trait;
use herald_core::error::{AppError, Result};
use herald_core::port::{SendMessageRequest, SendMessageResponse, WebhookClient, WebhookError};
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use tracing::{error, info, warn};

/// Per-request timeout when none is configured
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Error message for error replies that carry no usable HTML title
pub const NON_HTML_ERROR_MESSAGE: &str = "HTTP error occurred with non-HTML response";

/// POSTs `{"to", "content"}` as JSON to a single endpoint
pub struct HttpWebhookClient {
    client: reqwest::Client,
    url: String,
}

impl HttpWebhookClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let url = url.into();
        if url.trim().is_empty() {
            return Err(AppError::Config("Webhook URL is empty".to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, url })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl WebhookClient for HttpWebhookClient {
    async fn send(&self, request: &SendMessageRequest) -> std::result::Result<SendMessageResponse, WebhookError> {
        let response = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                error!(url = %self.url, error = %e, "Failed to send webhook request");
                WebhookError::Transport(e.to_string())
            })?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let body = response.bytes().await.map_err(|e| {
            error!(url = %self.url, error = %e, "Failed to read webhook response body");
            WebhookError::Transport(e.to_string())
        })?;

        if status.is_client_error() || status.is_server_error() {
            warn!(status_code = status.as_u16(), "Webhook returned error status");

            let title = if is_html(&content_type) {
                let title = extract_title(&String::from_utf8_lossy(&body));
                if title.is_none() {
                    error!(status_code = status.as_u16(), "No <title> in HTML error response");
                }
                title
            } else {
                None
            };

            return Err(WebhookError::Status {
                code: status.as_u16(),
                message: title.unwrap_or_else(|| NON_HTML_ERROR_MESSAGE.to_string()),
            });
        }

        let parsed: SendMessageResponse = serde_json::from_slice(&body).map_err(|e| {
            error!(
                url = %self.url,
                status_code = status.as_u16(),
                body = %String::from_utf8_lossy(&body),
                error = %e,
                "Failed to parse webhook response"
            );
            WebhookError::Decode(e.to_string())
        })?;

        info!(
            to = %request.to,
            status_code = status.as_u16(),
            response_id = %parsed.response_id,
            "Message sent"
        );
        Ok(parsed)
    }
}
