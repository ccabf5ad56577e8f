use std::env;

use chrono::{FixedOffset, NaiveTime, Offset, Utc};

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub property: PropertyConfig,
    pub telegram: TelegramConfig,
    pub reminders: ReminderConfig,
    pub backup: BackupConfig,
    pub auth: AuthConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Public base URL of the web app. Used for the Telegram webhook and for
    /// the "open booking" buttons in reminders.
    pub public_url: String,
    /// Allowed CORS origin for a front-end served from a different host.
    pub frontend_url: String,
    /// Directory with the built front-end. When set, non-API paths are served
    /// from it with an `index.html` fallback.
    pub static_dir: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct PropertyConfig {
    /// UTC offset of the guesthouse. Booking times are wall-clock values in this offset.
    pub utc_offset: FixedOffset,
}

#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: Option<String>,
    /// Operator chats: receive reminders and backups, may run bot commands.
    pub operator_chat_ids: Vec<i64>,
    /// Expected value of the `X-Telegram-Bot-Api-Secret-Token` webhook header.
    pub webhook_secret: Option<String>,
    /// Upper bound for a single reminder delivery.
    pub delivery_timeout_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct ReminderConfig {
    pub enabled: bool,
    /// How often (seconds) upcoming check-ins are scanned.
    pub scan_interval_seconds: u64,
    /// Delay before the first scan after startup.
    pub startup_delay_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct BackupConfig {
    pub enabled: bool,
    /// Local (property) time of the daily backup.
    pub time: NaiveTime,
    /// Where snapshots are written before being sent. Files are removed afterwards.
    pub dir: String,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Require Telegram Web App init data on the booking API.
    pub require_init_data: bool,
    pub init_data_max_age_seconds: i64,
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Allowed requests per second (per IP) for the Telegram webhook
    pub webhook_per_second: u32,
    /// Burst size for the Telegram webhook
    pub webhook_burst: u32,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let defaults = Config::default();

        Ok(Config {
            server: ServerConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("PORT")
                    .unwrap_or_else(|_| "3000".to_string())
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue("PORT".to_string()))?,
                public_url: env::var("PUBLIC_URL")
                    .or_else(|_| env::var("WEBHOOK_URL"))
                    .unwrap_or_else(|_| "http://localhost:3000".to_string())
                    .trim_end_matches('/')
                    .to_string(),
                frontend_url: env::var("FRONTEND_URL")
                    .unwrap_or_else(|_| "http://localhost:5173".to_string()),
                static_dir: env::var("STATIC_DIR").ok().filter(|s| !s.is_empty()),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "sqlite://data/guesthouse.db".to_string()),
                max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()
                    .unwrap_or(5),
            },
            property: PropertyConfig {
                utc_offset: match env::var("PROPERTY_UTC_OFFSET") {
                    Ok(v) => parse_utc_offset(&v).ok_or_else(|| {
                        ConfigError::InvalidValue("PROPERTY_UTC_OFFSET".to_string())
                    })?,
                    Err(_) => defaults.property.utc_offset,
                },
            },
            telegram: TelegramConfig {
                bot_token: env::var("TELEGRAM_BOT_TOKEN").ok().filter(|s| !s.is_empty()),
                operator_chat_ids: match env::var("TELEGRAM_OPERATOR_CHAT_IDS") {
                    Ok(v) => parse_chat_ids(&v).ok_or_else(|| {
                        ConfigError::InvalidValue("TELEGRAM_OPERATOR_CHAT_IDS".to_string())
                    })?,
                    Err(_) => Vec::new(),
                },
                webhook_secret: env::var("TELEGRAM_WEBHOOK_SECRET")
                    .ok()
                    .filter(|s| !s.is_empty()),
                delivery_timeout_seconds: env::var("TELEGRAM_DELIVERY_TIMEOUT_SECONDS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .unwrap_or(10u64),
            },
            reminders: ReminderConfig {
                enabled: parse_bool(env::var("REMINDER_ENABLED").ok().as_deref(), true),
                scan_interval_seconds: env::var("REMINDER_SCAN_INTERVAL_SECONDS")
                    .unwrap_or_else(|_| "3600".to_string())
                    .parse()
                    .map_err(|_| {
                        ConfigError::InvalidValue("REMINDER_SCAN_INTERVAL_SECONDS".to_string())
                    })?,
                startup_delay_seconds: env::var("REMINDER_STARTUP_DELAY_SECONDS")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()
                    .unwrap_or(5u64),
            },
            backup: BackupConfig {
                enabled: parse_bool(env::var("BACKUP_ENABLED").ok().as_deref(), true),
                time: match env::var("BACKUP_TIME") {
                    Ok(v) => NaiveTime::parse_from_str(v.trim(), "%H:%M")
                        .map_err(|_| ConfigError::InvalidValue("BACKUP_TIME".to_string()))?,
                    Err(_) => defaults.backup.time,
                },
                dir: env::var("BACKUP_DIR").unwrap_or(defaults.backup.dir),
            },
            auth: AuthConfig {
                require_init_data: parse_bool(
                    env::var("AUTH_REQUIRE_INIT_DATA").ok().as_deref(),
                    false,
                ),
                init_data_max_age_seconds: env::var("AUTH_INIT_DATA_MAX_AGE_SECONDS")
                    .unwrap_or_else(|_| "86400".to_string())
                    .parse()
                    .unwrap_or(86400),
            },
            rate_limit: RateLimitConfig {
                webhook_per_second: env::var("RATE_LIMIT_WEBHOOKS_PER_SECOND")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .unwrap_or(10),
                webhook_burst: env::var("RATE_LIMIT_WEBHOOKS_BURST")
                    .unwrap_or_else(|_| "50".to_string())
                    .parse()
                    .unwrap_or(50),
            },
        })
        .and_then(Config::validated)
    }

    fn validated(self) -> Result<Self, ConfigError> {
        if self.reminders.scan_interval_seconds == 0 {
            return Err(ConfigError::InvalidValue(
                "REMINDER_SCAN_INTERVAL_SECONDS".to_string(),
            ));
        }
        if self.auth.require_init_data && self.telegram.bot_token.is_none() {
            return Err(ConfigError::MissingEnv("TELEGRAM_BOT_TOKEN".to_string()));
        }
        Ok(self)
    }
}

/// Accepts "1"/"0", "true"/"false", "yes"/"no" (case-insensitive); anything else is `default`.
fn parse_bool(value: Option<&str>, default: bool) -> bool {
    match value.map(|v| v.trim().to_lowercase()) {
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" => true,
            "0" | "false" | "no" => false,
            _ => default,
        },
        None => default,
    }
}

/// Parse a comma separated list of Telegram chat ids. Empty entries are skipped.
fn parse_chat_ids(value: &str) -> Option<Vec<i64>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<i64>().ok())
        .collect()
}

/// Parse an offset such as `+03:00` or `-05:30`.
pub fn parse_utc_offset(value: &str) -> Option<FixedOffset> {
    value.trim().parse().ok()
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
                public_url: "http://localhost:3000".to_string(),
                frontend_url: "http://localhost:5173".to_string(),
                static_dir: None,
            },
            database: DatabaseConfig {
                url: "sqlite://data/guesthouse.db".to_string(),
                max_connections: 5,
            },
            property: PropertyConfig {
                // Europe/Moscow, no DST
                utc_offset: FixedOffset::east_opt(3 * 3600).unwrap_or_else(|| Utc.fix()),
            },
            telegram: TelegramConfig {
                bot_token: None,
                operator_chat_ids: Vec::new(),
                webhook_secret: None,
                delivery_timeout_seconds: 10,
            },
            reminders: ReminderConfig {
                enabled: true,
                scan_interval_seconds: 3600,
                startup_delay_seconds: 5,
            },
            backup: BackupConfig {
                enabled: true,
                time: NaiveTime::from_hms_opt(3, 0, 0).unwrap_or(NaiveTime::MIN),
                dir: env::temp_dir().to_string_lossy().into_owned(),
            },
            auth: AuthConfig {
                require_init_data: false,
                init_data_max_age_seconds: 86400,
            },
            rate_limit: RateLimitConfig {
                webhook_per_second: 10,
                webhook_burst: 50,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_utc_offsets() {
        assert_eq!(parse_utc_offset("+03:00").unwrap().local_minus_utc(), 3 * 3600);
        assert_eq!(parse_utc_offset("-05:30").unwrap().local_minus_utc(), -(5 * 3600 + 1800));
        assert_eq!(parse_utc_offset(" +00:00 ").unwrap().local_minus_utc(), 0);
        assert!(parse_utc_offset("+25:00").is_none());
        assert!(parse_utc_offset("moscow").is_none());
        assert!(parse_utc_offset("").is_none());
    }

    #[test]
    fn parses_operator_chat_ids() {
        assert_eq!(
            parse_chat_ids("878338264, 1091714465,,-1001234567890"),
            Some(vec![878338264, 1091714465, -1001234567890])
        );
        assert_eq!(parse_chat_ids(""), Some(vec![]));
        assert_eq!(parse_chat_ids("123,abc"), None);
    }

    #[test]
    fn parses_bool_flags() {
        assert!(parse_bool(Some("YES"), false));
        assert!(!parse_bool(Some("0"), true));
        assert!(parse_bool(Some("maybe"), true));
        assert!(!parse_bool(None, false));
    }

    #[test]
    fn defaults_match_the_property() {
        let config = Config::default();
        assert_eq!(config.property.utc_offset.local_minus_utc(), 3 * 3600);
        assert_eq!(config.backup.time, NaiveTime::from_hms_opt(3, 0, 0).unwrap());
        assert_eq!(config.reminders.scan_interval_seconds, 3600);
        assert_eq!(config.telegram.delivery_timeout_seconds, 10);
        assert!(!config.auth.require_init_data);
    }
}
