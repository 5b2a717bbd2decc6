// Webhook Client Port
// One outbound delivery attempt to the configured endpoint

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Request body sent to the webhook
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendMessageRequest {
    pub to: String,
    pub content: String,
}

/// Successful webhook reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageResponse {
    pub state: String,
    pub response_id: Uuid,
}

/// Delivery errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WebhookError {
    /// Connection, DNS, TLS or timeout failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// Non-2xx reply; `message` is the HTML `<title>` when the body is a page
    #[error("Webhook returned {code}: {message}")]
    Status { code: u16, message: String },

    /// 2xx reply whose body is not a `SendMessageResponse`
    #[error("Invalid webhook response: {0}")]
    Decode(String),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WebhookClient: Send + Sync {
    async fn send(&self, request: &SendMessageRequest) -> Result<SendMessageResponse, WebhookError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

#[cfg(any(test, feature = "mocks"))]
pub mod mocks {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Outcome of one scripted call
    #[derive(Debug, Clone)]
    pub enum Outcome {
        Accept,
        Reject(WebhookError),
    }

    impl Outcome {
        pub fn server_error() -> Self {
            Outcome::Reject(WebhookError::Status {
                code: 500,
                message: "Internal Server Error".to_string(),
            })
        }
    }

    /// Webhook fake that plays back scripted outcomes, then a fallback
    pub struct ScriptedWebhookClient {
        script: Mutex<VecDeque<Outcome>>,
        fallback: Outcome,
        latency: Duration,
        requests: Mutex<Vec<SendMessageRequest>>,
    }

    impl ScriptedWebhookClient {
        pub fn new(script: impl IntoIterator<Item = Outcome>, fallback: Outcome) -> Self {
            Self {
                script: Mutex::new(script.into_iter().collect()),
                fallback,
                latency: Duration::ZERO,
                requests: Mutex::new(Vec::new()),
            }
        }

        /// Hold every call for `latency` before answering
        pub fn with_latency(mut self, latency: Duration) -> Self {
            self.latency = latency;
            self
        }

        pub fn always_accept() -> Self {
            Self::new([], Outcome::Accept)
        }

        pub fn always_fail() -> Self {
            Self::new([], Outcome::server_error())
        }

        pub fn requests(&self) -> Vec<SendMessageRequest> {
            self.requests.lock().unwrap().clone()
        }

        pub fn call_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl WebhookClient for ScriptedWebhookClient {
        async fn send(&self, request: &SendMessageRequest) -> Result<SendMessageResponse, WebhookError> {
            self.requests.lock().unwrap().push(request.clone());
            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }
            let outcome = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| self.fallback.clone());
            match outcome {
                Outcome::Accept => Ok(SendMessageResponse {
                    state: "Accepted".to_string(),
                    response_id: Uuid::new_v4(),
                }),
                Outcome::Reject(err) => Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_response_wire_format() {
        let body = json!({
            "state": "Accepted",
            "responseId": "67f2f8a8-ea58-4ed0-a6f9-ff217df4d849"
        });
        let parsed: SendMessageResponse = serde_json::from_value(body).unwrap();
        assert_eq!(parsed.state, "Accepted");
        assert_eq!(
            parsed.response_id.to_string(),
            "67f2f8a8-ea58-4ed0-a6f9-ff217df4d849"
        );
    }

    #[test]
    fn test_request_wire_format() {
        let req = SendMessageRequest {
            to: "+905551112233".to_string(),
            content: "hi".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({"to": "+905551112233", "content": "hi"})
        );
    }
}
