//! Outbound mail.
//!
//! Handlers never send inline. They build a [`Message`] and hand it to a
//! tracked background task that calls [`send_with_retry`].

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;

use crate::database::models::User;

pub const SEND_ATTEMPTS: u32 = 3;
pub const RETRY_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail delivery failed: {0}")]
    Delivery(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub recipient: String,
    pub template: &'static str,
    pub data: Value,
}

impl Message {
    /// Welcome mail carrying the activation token
    pub fn welcome(user: &User, activation_token: &str) -> Self {
        Self {
            recipient: user.email.clone(),
            template: "user_welcome",
            data: json!({
                "user_id": user.id,
                "name": user.name,
                "activation_token": activation_token,
            }),
        }
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &Message) -> Result<(), MailError>;
}

/// Writes messages to the log instead of delivering them
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: &Message) -> Result<(), MailError> {
        tracing::info!(
            recipient = %message.recipient,
            template = message.template,
            data = %message.data,
            "mail delivered to log"
        );
        Ok(())
    }
}

/// Up to [`SEND_ATTEMPTS`] tries, [`RETRY_DELAY`] apart. Returns the last error.
pub async fn send_with_retry(mailer: &dyn Mailer, message: &Message) -> Result<(), MailError> {
    let mut attempt = 1;
    loop {
        match mailer.send(message).await {
            Ok(()) => return Ok(()),
            Err(err) if attempt < SEND_ATTEMPTS => {
                tracing::warn!(attempt, recipient = %message.recipient, error = %err, "mail attempt failed, retrying");
                attempt += 1;
                tokio::time::sleep(RETRY_DELAY).await;
            }
            Err(err) => return Err(err),
        }
    }
}
