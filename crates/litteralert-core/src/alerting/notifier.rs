//! SMS delivery through the gateway collaborator

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::SmsConfig;
use crate::error::{Error, Result};

/// Accepted send, with the balance the gateway reported afterwards
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SendReceipt {
    pub quota_remaining: Option<i64>,
}

/// An SMS gateway able to text one number and report its balance
#[async_trait]
pub trait SmsGateway: Send + Sync {
    /// Send `message` to a single `phone` number
    async fn send(&self, phone: &str, message: &str) -> std::result::Result<SendReceipt, NotificationError>;

    /// Remaining message credits
    async fn quota(&self) -> std::result::Result<i64, NotificationError>;
}

/// Result of texting one recipient
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryResult {
    pub recipient: String,
    pub success: bool,
    pub error: Option<String>,
    pub sent_at: DateTime<Utc>,
}

/// Per-recipient outcome of one dispatch
#[derive(Debug, Clone, Default, Serialize)]
pub struct DispatchReport {
    pub results: Vec<DeliveryResult>,
    /// Lowest balance reported by the gateway during the dispatch
    pub quota_remaining: Option<i64>,
}

impl DispatchReport {
    /// Number of recipients that could not be reached
    pub fn failed(&self) -> usize {
        self.results.iter().filter(|r| !r.success).count()
    }

    /// Number of recipients a send was attempted for
    pub fn attempted(&self) -> usize {
        self.results.len()
    }

    /// `Err(Error::Dispatch)` if any recipient failed
    pub fn into_result(self) -> Result<Self> {
        match self.failed() {
            0 => Ok(self),
            failed => Err(Error::Dispatch {
                failed,
                attempted: self.attempted(),
            }),
        }
    }
}

/// Fans a message out to every recipient through a gateway.
///
/// Recipients are texted one after another; a failure for one is recorded
/// and never stops the rest.
pub struct NotificationSender<'g> {
    gateway: &'g dyn SmsGateway,
}

impl<'g> NotificationSender<'g> {
    /// Create a sender over `gateway`
    pub fn new(gateway: &'g dyn SmsGateway) -> Self {
        Self { gateway }
    }

    /// Send `message` to each of `recipients`
    pub async fn dispatch(&self, recipients: &[String], message: &str) -> DispatchReport {
        let mut report = DispatchReport::default();

        for recipient in recipients {
            let sent_at = Utc::now();
            let result = self.gateway.send(recipient, message).await;

            match &result {
                Ok(receipt) => {
                    info!(recipient = %recipient, "Text sent");
                    if let Some(remaining) = receipt.quota_remaining {
                        report.quota_remaining = Some(
                            report.quota_remaining.map_or(remaining, |q| q.min(remaining)),
                        );
                    }
                }
                Err(e) => warn!(recipient = %recipient, error = %e, "Text failed"),
            }

            report.results.push(DeliveryResult {
                recipient: recipient.clone(),
                success: result.is_ok(),
                error: result.err().map(|e| e.to_string()),
                sent_at,
            });
        }

        report
    }
}

/// Notification errors
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("HTTP error: {0}")]
    HttpError(String),

    #[error("Gateway rejected message: {0}")]
    Rejected(String),
}

/// Textbelt SMS gateway
pub struct TextbeltClient {
    client: Client,
    base_url: String,
    key: String,
}

impl TextbeltClient {
    /// Create a client from the SMS configuration
    pub fn new(config: &SmsConfig) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            key: config.textbelt_key.clone(),
        })
    }
}

#[async_trait]
impl SmsGateway for TextbeltClient {
    async fn send(&self, phone: &str, message: &str) -> std::result::Result<SendReceipt, NotificationError> {
        let form = TextbeltSend {
            phone,
            message,
            key: &self.key,
        };

        let response = self
            .client
            .post(format!("{}/text", self.base_url))
            .form(&form)
            .send()
            .await
            .map_err(|e| NotificationError::HttpError(e.to_string()))?;

        let status = response.status();
        let body: TextbeltResponse = response
            .json()
            .await
            .map_err(|e| NotificationError::HttpError(format!("Textbelt returned {status}: {e}")))?;

        debug!(phone = %phone, quota_remaining = ?body.quota_remaining, "Textbelt response");

        if body.success {
            Ok(SendReceipt {
                quota_remaining: body.quota_remaining,
            })
        } else {
            Err(NotificationError::Rejected(
                body.error
                    .or(body.message)
                    .unwrap_or_else(|| format!("status {status}")),
            ))
        }
    }

    async fn quota(&self) -> std::result::Result<i64, NotificationError> {
        let response = self
            .client
            .get(format!("{}/quota/{}", self.base_url, self.key))
            .send()
            .await
            .map_err(|e| NotificationError::HttpError(e.to_string()))?;

        let status = response.status();
        let body: TextbeltResponse = response
            .json()
            .await
            .map_err(|e| NotificationError::HttpError(format!("Textbelt returned {status}: {e}")))?;

        match body.quota_remaining {
            Some(remaining) if body.success => Ok(remaining),
            _ => Err(NotificationError::Rejected(
                body.error
                    .unwrap_or_else(|| "quota lookup failed".to_string()),
            )),
        }
    }
}

#[derive(Debug, Serialize)]
struct TextbeltSend<'a> {
    phone: &'a str,
    message: &'a str,
    key: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TextbeltResponse {
    success: bool,
    quota_remaining: Option<i64>,
    error: Option<String>,
    message: Option<String>,
}
