//! Outbound webhook delivery
//!
//! A transport posts one JSON body to one endpoint and reports whether the
//! endpoint accepted it. Only the status matters; the response body is
//! never read.

use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use url::Url;

/// Delivery errors
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("Webhook endpoint could not be reached: {reason}")]
    Transport { reason: String },

    #[error("Webhook endpoint rejected the submission with status {status}")]
    Rejected { status: u16 },

    #[error("Failed to serialize submission payload: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed to build HTTP client: {0}")]
    ClientSetup(String),
}

/// Proof that the endpoint accepted a delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryReceipt {
    pub status: u16,
}

/// Something that can POST a JSON body to an endpoint
#[allow(async_fn_in_trait)]
pub trait WebhookTransport {
    /// Sends `body` once. Any non-2xx status is a `Rejected` error.
    async fn deliver(&self, endpoint: &Url, body: Vec<u8>) -> Result<DeliveryReceipt, WebhookError>;
}

/// Maps a response status to the delivery outcome
pub fn receipt_for_status(status: u16) -> Result<DeliveryReceipt, WebhookError> {
    if (200..300).contains(&status) {
        Ok(DeliveryReceipt { status })
    } else {
        Err(WebhookError::Rejected { status })
    }
}

/// HTTP transport backed by reqwest
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Creates a transport whose requests give up after `timeout`
    pub fn new(timeout: Duration) -> Result<Self, WebhookError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| WebhookError::ClientSetup(e.to_string()))?;
        Ok(Self { client })
    }
}

impl WebhookTransport for ReqwestTransport {
    async fn deliver(
        &self,
        endpoint: &Url,
        body: Vec<u8>,
    ) -> Result<DeliveryReceipt, WebhookError> {
        let response = self
            .client
            .post(endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| WebhookError::Transport {
                reason: describe_transport_error(&e),
            })?;

        receipt_for_status(response.status().as_u16())
    }
}

fn describe_transport_error(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        format!("request timed out ({error})")
    } else if error.is_connect() {
        format!("connection failed ({error})")
    } else {
        error.to_string()
    }
}
