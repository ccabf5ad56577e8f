use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;

use crate::error::AppResult;

/// A text message for an operator chat, optionally with a button that opens
/// the web app.
#[derive(Debug, Clone, PartialEq)]
pub struct OperatorMessage {
    pub text: String,
    pub button: Option<WebAppButton>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WebAppButton {
    pub label: String,
    pub url: String,
}

impl OperatorMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            button: None,
        }
    }

    pub fn with_button(mut self, label: impl Into<String>, url: impl Into<String>) -> Self {
        self.button = Some(WebAppButton {
            label: label.into(),
            url: url.into(),
        });
        self
    }
}

/// Outbound channel to operator chats.
#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    async fn send_message(&self, chat_id: i64, message: &OperatorMessage) -> AppResult<()>;

    async fn send_document(&self, chat_id: i64, path: &Path, caption: &str) -> AppResult<()>;

    /// Install a chat's menu button that opens the web app. Channels without
    /// menu buttons ignore this.
    async fn set_menu_button(&self, _chat_id: i64, _label: &str, _url: &str) -> AppResult<()> {
        Ok(())
    }
}

/// Result of a single delivery attempt
#[derive(Debug, Clone)]
pub struct DeliveryResult {
    pub chat_id: i64,
    pub success: bool,
    pub error: Option<String>,
}

/// Send `message` to every chat concurrently. Each delivery gets its own
/// timeout; a slow or failing chat never affects the others.
pub async fn broadcast(
    notifier: &Arc<dyn Notifier>,
    chat_ids: &[i64],
    message: &OperatorMessage,
    timeout: Duration,
) -> Vec<DeliveryResult> {
    let deliveries = chat_ids.iter().map(|&chat_id| async move {
        let outcome = tokio::time::timeout(timeout, notifier.send_message(chat_id, message)).await;
        let error = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(_) => Some(format!("timed out after {:?}", timeout)),
        };

        tracing::debug!("Delivery to chat {}: {:?}", chat_id, error);

        DeliveryResult {
            chat_id,
            success: error.is_none(),
            error,
        }
    });

    join_all(deliveries).await
}
