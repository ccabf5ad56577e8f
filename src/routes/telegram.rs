use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Router,
};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use teloxide::types::Update;

use crate::error::AppError;
use crate::AppState;

const SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/", post(handle_telegram_webhook))
}

/// Compares MACs of both values so neither length nor content leaks through timing.
fn secrets_match(expected: &str, received: &str) -> bool {
    let mac = |value: &str| {
        Hmac::<Sha256>::new_from_slice(expected.as_bytes()).map(|mut mac| {
            mac.update(value.as_bytes());
            mac
        })
    };
    match (mac(expected), mac(received)) {
        (Ok(expected), Ok(received)) => received
            .verify_slice(&expected.finalize().into_bytes())
            .is_ok(),
        _ => false,
    }
}

/// Telegram expects a quick 200; the update is handled on its own task.
async fn handle_telegram_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, &'static str), AppError> {
    if let Some(expected) = state.config.telegram.webhook_secret.as_deref() {
        let received = headers
            .get(SECRET_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if !secrets_match(expected, received) {
            tracing::warn!("Rejected Telegram webhook call with a wrong secret token");
            return Err(AppError::Unauthorized);
        }
    }

    let Some(bot) = state.bot.clone() else {
        tracing::debug!("Telegram update received but the bot is not configured");
        return Ok((StatusCode::OK, "OK"));
    };

    let update: Update = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(e) => {
            // Telegram redelivers anything that is not a 2xx
            tracing::warn!("Ignoring unparsable Telegram update: {}", e);
            return Ok((StatusCode::OK, "OK"));
        }
    };

    tokio::spawn(async move {
        if let Err(e) = bot.handle_update(&update).await {
            tracing::warn!("Failed to handle Telegram update: {:?}", e);
        }
    });

    Ok((StatusCode::OK, "OK"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compares_secrets() {
        assert!(secrets_match("s3cret", "s3cret"));
        assert!(!secrets_match("s3cret", "s3creT"));
        assert!(!secrets_match("s3cret", "s3cret!"));
        assert!(!secrets_match("s3cret", ""));
    }
}
