use std::sync::Arc;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

use crate::error::{AppError, AppResult};
use crate::AppState;

type HmacSha256 = Hmac<Sha256>;

/// The Telegram user a Web App session was opened by.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct WebAppUser {
    pub id: i64,
    pub first_name: String,
    #[serde(default)]
    pub username: Option<String>,
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> AppResult<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to initialize HMAC: {}", e)))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Verify Telegram Web App init data according to Telegram's docs:
/// https://core.telegram.org/bots/webapps#validating-data-received-via-the-mini-app
///
/// `now` and `max_age_seconds` are unix seconds.
pub fn verify_init_data(
    raw: &str,
    bot_token: &str,
    max_age_seconds: i64,
    now: i64,
) -> AppResult<WebAppUser> {
    let mut pairs: Vec<(String, String)> = url::form_urlencoded::parse(raw.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let hash_index = pairs
        .iter()
        .position(|(k, _)| k == "hash")
        .ok_or(AppError::Unauthorized)?;
    let (_, received_hash) = pairs.remove(hash_index);
    let received = hex::decode(received_hash.trim()).map_err(|_| AppError::Unauthorized)?;

    pairs.sort_by(|a, b| a.0.cmp(&b.0));
    let data_check_string = pairs
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<String>>()
        .join("\n");

    // Secret key is HMAC_SHA256("WebAppData", bot_token)
    let secret_key = hmac_sha256(b"WebAppData", bot_token.as_bytes())?;
    let mut mac = HmacSha256::new_from_slice(&secret_key)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to initialize HMAC: {}", e)))?;
    mac.update(data_check_string.as_bytes());
    if mac.verify_slice(&received).is_err() {
        tracing::debug!("Telegram init data hash mismatch");
        return Err(AppError::Unauthorized);
    }

    let field = |name: &str| {
        pairs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    };

    let auth_date: i64 = field("auth_date")
        .and_then(|v| v.parse().ok())
        .ok_or(AppError::Unauthorized)?;
    if now - auth_date > max_age_seconds {
        tracing::debug!("Telegram init data is too old (auth_date={})", auth_date);
        return Err(AppError::Unauthorized);
    }

    let user = field("user").ok_or(AppError::Unauthorized)?;
    serde_json::from_str(user).map_err(|e| {
        tracing::debug!("Invalid user in Telegram init data: {}", e);
        AppError::Unauthorized
    })
}

/// Extractor guarding the booking API.
///
/// When init data is not required every request passes with `Operator(None)`.
/// Otherwise the request must carry `Authorization: tma <initData>` signed for
/// our bot by one of the operator accounts.
pub struct Operator(pub Option<WebAppUser>);

impl Operator {
    /// Who made the request, for audit logs.
    pub fn describe(&self) -> String {
        match &self.0 {
            Some(WebAppUser {
                id,
                username: Some(username),
                ..
            }) => format!("{} (@{})", id, username),
            Some(user) => format!("{} ({})", user.id, user.first_name),
            None => "unauthenticated client".to_string(),
        }
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for Operator {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let auth = &state.config.auth;
        if !auth.require_init_data {
            return Ok(Operator(None));
        }

        let bot_token = state
            .config
            .telegram
            .bot_token
            .as_deref()
            .ok_or_else(|| AppError::Config("TELEGRAM_BOT_TOKEN is not set".to_string()))?;

        let header = parts
            .headers
            .get(http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                tracing::debug!("Missing or invalid Authorization header");
                AppError::Unauthorized
            })?;

        let (scheme, init_data) = header.split_once(' ').ok_or(AppError::Unauthorized)?;
        if !scheme.eq_ignore_ascii_case("tma") || init_data.trim().is_empty() {
            tracing::debug!("Authorization header doesn't use the 'tma' scheme");
            return Err(AppError::Unauthorized);
        }

        let user = verify_init_data(
            init_data.trim(),
            bot_token,
            auth.init_data_max_age_seconds,
            chrono::Utc::now().timestamp(),
        )?;

        if !state.config.telegram.operator_chat_ids.contains(&user.id) {
            tracing::warn!("Telegram user {} is not an operator", user.id);
            return Err(AppError::Forbidden);
        }

        Ok(Operator(Some(user)))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const BOT_TOKEN: &str = "123456:TEST-TOKEN";

    /// Build init data the way Telegram does.
    pub(crate) fn sign_init_data(user_id: i64, auth_date: i64, bot_token: &str) -> String {
        let user = format!(r#"{{"id":{},"first_name":"Ирина","language_code":"ru"}}"#, user_id);
        let mut fields = vec![
            ("auth_date".to_string(), auth_date.to_string()),
            ("query_id".to_string(), "AAF4".to_string()),
            ("user".to_string(), user),
        ];
        fields.sort();
        let check = fields
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("\n");
        let secret = hmac_sha256(b"WebAppData", bot_token.as_bytes()).unwrap();
        let hash = hex::encode(hmac_sha256(&secret, check.as_bytes()).unwrap());

        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (k, v) in &fields {
            serializer.append_pair(k, v);
        }
        serializer.append_pair("hash", &hash);
        serializer.finish()
    }

    #[test]
    fn accepts_valid_init_data() {
        let now = 1_770_000_000;
        let raw = sign_init_data(100, now - 60, BOT_TOKEN);
        let user = verify_init_data(&raw, BOT_TOKEN, 86400, now).unwrap();
        assert_eq!(user.id, 100);
        assert_eq!(user.first_name, "Ирина");
        assert_eq!(Operator(Some(user)).describe(), "100 (Ирина)");
    }

    #[test]
    fn rejects_tampered_init_data() {
        let now = 1_770_000_000;
        let raw = sign_init_data(100, now, BOT_TOKEN).replace("%22id%22%3A100", "%22id%22%3A101");
        assert!(matches!(
            verify_init_data(&raw, BOT_TOKEN, 86400, now),
            Err(AppError::Unauthorized)
        ));

        let other_bot = sign_init_data(100, now, "654321:OTHER");
        assert!(verify_init_data(&other_bot, BOT_TOKEN, 86400, now).is_err());

        assert!(verify_init_data("auth_date=1&user=%7B%7D", BOT_TOKEN, 86400, now).is_err());
        assert!(verify_init_data("", BOT_TOKEN, 86400, now).is_err());
    }

    #[test]
    fn describes_operators() {
        let user = WebAppUser {
            id: 7,
            first_name: "Максим".to_string(),
            username: Some("max".to_string()),
        };
        assert_eq!(Operator(Some(user)).describe(), "7 (@max)");
        assert_eq!(Operator(None).describe(), "unauthenticated client");
    }

    #[test]
    fn rejects_stale_init_data() {
        let now = 1_770_000_000;
        let raw = sign_init_data(100, now - 86401, BOT_TOKEN);
        assert!(verify_init_data(&raw, BOT_TOKEN, 86400, now).is_err());
    }
}
