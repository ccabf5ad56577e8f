use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{
    ChatId, InlineKeyboardButton, InlineKeyboardMarkup, InputFile, MenuButton, Update,
    UpdateKind, WebAppInfo,
};
use url::Url;

use crate::error::{AppError, AppResult};
use crate::i18n;
use crate::services::backup::BackupService;
use crate::services::notifications::{Notifier, OperatorMessage};

fn web_app(url: &str) -> AppResult<WebAppInfo> {
    let url = Url::parse(url)
        .map_err(|e| AppError::Config(format!("Invalid web app URL '{}': {}", url, e)))?;
    Ok(WebAppInfo { url })
}

#[derive(Clone)]
pub struct TelegramService {
    bot: Bot,
    username: String,
}

impl TelegramService {
    pub async fn new(token: String) -> AppResult<Self> {
        let bot = Bot::new(token);

        // Verify the bot token by getting bot info
        match bot.get_me().await {
            Ok(me) => {
                let username = me.username().to_string();
                tracing::info!("Telegram bot initialized: @{}", username);
                Ok(Self { bot, username })
            }
            Err(e) => {
                tracing::error!("Failed to initialize Telegram bot: {}", e);
                Err(AppError::Telegram(format!(
                    "Failed to initialize bot: {}",
                    e
                )))
            }
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Point Telegram at `{public_url}/api/telegram-webhook` and install the
    /// default "open app" menu button for every chat.
    pub async fn register_webhook(&self, public_url: &str, secret: Option<&str>) -> AppResult<()> {
        let endpoint = format!("{}/api/telegram-webhook", public_url);
        let endpoint_url = Url::parse(&endpoint)
            .map_err(|e| AppError::Config(format!("Invalid webhook URL '{}': {}", endpoint, e)))?;

        let mut request = self.bot.set_webhook(endpoint_url);
        if let Some(secret) = secret {
            request = request.secret_token(secret.to_string());
        }
        request
            .await
            .map_err(|e| AppError::Telegram(format!("Failed to set webhook: {}", e)))?;
        tracing::info!("Telegram webhook set to {}", endpoint);

        self.bot
            .set_chat_menu_button()
            .menu_button(MenuButton::WebApp {
                text: i18n::t("bot.menu_button"),
                web_app: web_app(public_url)?,
            })
            .await
            .map_err(|e| AppError::Telegram(format!("Failed to set menu button: {}", e)))?;
        tracing::info!("Telegram default menu button set");

        Ok(())
    }
}

#[async_trait]
impl Notifier for TelegramService {
    async fn send_message(&self, chat_id: i64, message: &OperatorMessage) -> AppResult<()> {
        let mut request = self.bot.send_message(ChatId(chat_id), &message.text);

        if let Some(button) = &message.button {
            request = request.reply_markup(InlineKeyboardMarkup::new(vec![vec![
                InlineKeyboardButton::web_app(button.label.clone(), web_app(&button.url)?),
            ]]));
        }

        match request.await {
            Ok(sent_message) => {
                tracing::debug!(
                    "Telegram message sent to {}: message_id={}",
                    chat_id,
                    sent_message.id.0
                );
                Ok(())
            }
            Err(e) => Err(AppError::Telegram(format!("Failed to send message: {}", e))),
        }
    }

    async fn send_document(&self, chat_id: i64, path: &Path, caption: &str) -> AppResult<()> {
        self.bot
            .send_document(ChatId(chat_id), InputFile::file(path.to_path_buf()))
            .caption(caption)
            .await
            .map(|_| ())
            .map_err(|e| AppError::Telegram(format!("Failed to send document: {}", e)))
    }

    async fn set_menu_button(&self, chat_id: i64, label: &str, url: &str) -> AppResult<()> {
        self.bot
            .set_chat_menu_button()
            .chat_id(ChatId(chat_id))
            .menu_button(MenuButton::WebApp {
                text: label.to_string(),
                web_app: web_app(url)?,
            })
            .await
            .map(|_| ())
            .map_err(|e| AppError::Telegram(format!("Failed to set menu button: {}", e)))
    }
}

/// Commands the bot answers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotCommand {
    Start,
    Backup,
}

impl BotCommand {
    /// `/start`, `/start@my_bot payload`, `/BACKUP`. Mentions of another
    /// bot are ignored.
    pub fn parse(text: &str, bot_username: &str) -> Option<Self> {
        let first = text.split_whitespace().next()?;
        let command = first.strip_prefix('/')?;
        let name = match command.split_once('@') {
            Some((name, mention)) if mention.eq_ignore_ascii_case(bot_username) => name,
            Some(_) => return None,
            None => command,
        };

        match name.to_lowercase().as_str() {
            "start" => Some(BotCommand::Start),
            "backup" => Some(BotCommand::Backup),
            _ => None,
        }
    }
}

/// A text message received by the bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IncomingText<'a> {
    pub chat_id: i64,
    pub text: &'a str,
    /// The sender's Telegram client language, e.g. `en-US`.
    pub language_code: Option<&'a str>,
}

pub fn message_text(update: &Update) -> Option<IncomingText<'_>> {
    match &update.kind {
        UpdateKind::Message(message) => message.text().map(|text| IncomingText {
            chat_id: message.chat.id.0,
            text,
            language_code: message.from().and_then(|user| user.language_code.as_deref()),
        }),
        _ => None,
    }
}

/// Answers bot commands coming in through the webhook.
pub struct BotCommandHandler {
    notifier: Arc<dyn Notifier>,
    operators: Vec<i64>,
    public_url: String,
    bot_username: String,
    backups: Option<Arc<BackupService>>,
}

impl BotCommandHandler {
    pub fn new(
        notifier: Arc<dyn Notifier>,
        operators: Vec<i64>,
        public_url: String,
        bot_username: String,
        backups: Option<Arc<BackupService>>,
    ) -> Self {
        Self {
            notifier,
            operators,
            public_url,
            bot_username,
            backups,
        }
    }

    fn is_operator(&self, chat_id: i64) -> bool {
        self.operators.contains(&chat_id)
    }

    pub async fn handle_update(&self, update: &Update) -> AppResult<()> {
        let Some(incoming) = message_text(update) else {
            tracing::debug!("Ignoring Telegram update without message text");
            return Ok(());
        };

        match BotCommand::parse(incoming.text, &self.bot_username) {
            Some(command) => {
                let lang = i18n::resolve_language(incoming.language_code);
                self.handle_command(command, incoming.chat_id, lang).await
            }
            None => Ok(()),
        }
    }

    /// `lang` picks the reply language; reminders and backups stay in the default one.
    pub async fn handle_command(&self, command: BotCommand, chat_id: i64, lang: &str) -> AppResult<()> {
        tracing::info!("Received {:?} from chat {} ({})", command, chat_id, lang);
        match command {
            BotCommand::Start => self.start(chat_id, lang).await,
            BotCommand::Backup => self.backup(chat_id, lang).await,
        }
    }

    fn reply(lang: &str, key: &str) -> OperatorMessage {
        OperatorMessage::text(i18n::tr(Some(lang), key, None))
    }

    async fn start(&self, chat_id: i64, lang: &str) -> AppResult<()> {
        let label = i18n::tr(Some(lang), "bot.menu_button", None);
        if let Err(e) = self
            .notifier
            .set_menu_button(chat_id, &label, &self.public_url)
            .await
        {
            tracing::warn!("Failed to set menu button for chat {}: {}", chat_id, e);
        }

        let message = if self.is_operator(chat_id) {
            Self::reply(lang, "bot.activated").with_button(
                i18n::tr(Some(lang), "bot.open_app", None),
                self.public_url.clone(),
            )
        } else {
            OperatorMessage::text(i18n::tr(
                Some(lang),
                "bot.not_registered",
                Some(&[("chat_id", chat_id.to_string().as_str())]),
            ))
        };

        self.notifier.send_message(chat_id, &message).await
    }

    async fn backup(&self, chat_id: i64, lang: &str) -> AppResult<()> {
        if !self.is_operator(chat_id) {
            return self
                .notifier
                .send_message(chat_id, &Self::reply(lang, "bot.backup_no_access"))
                .await;
        }

        self.notifier
            .send_message(chat_id, &Self::reply(lang, "bot.backup_started"))
            .await?;

        let outcome = match &self.backups {
            Some(backups) => backups.create_and_send(chrono::Utc::now()).await.map(|_| ()),
            None => Err(AppError::Config("Backups are disabled".to_string())),
        };

        if let Err(e) = outcome {
            tracing::warn!("Backup requested by chat {} failed: {}", chat_id, e);
            self.notifier
                .send_message(chat_id, &Self::reply(lang, "bot.backup_failed"))
                .await?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::file_test_pool;
    use crate::services::clock::PropertyClock;
    use crate::services::notifications::tests::RecordingNotifier;
    use chrono::FixedOffset;

    fn handler(recorder: Arc<RecordingNotifier>, backups: Option<Arc<BackupService>>) -> BotCommandHandler {
        BotCommandHandler::new(
            recorder,
            vec![100],
            "https://guesthouse.example".to_string(),
            "guesthouse_bot".to_string(),
            backups,
        )
    }

    #[test]
    fn parses_commands() {
        assert_eq!(BotCommand::parse("/start", "guesthouse_bot"), Some(BotCommand::Start));
        assert_eq!(
            BotCommand::parse("/start@GuestHouse_Bot deep-link", "guesthouse_bot"),
            Some(BotCommand::Start)
        );
        assert_eq!(BotCommand::parse("/Backup", "guesthouse_bot"), Some(BotCommand::Backup));
        assert_eq!(BotCommand::parse("/start@other_bot", "guesthouse_bot"), None);
        assert_eq!(BotCommand::parse("start", "guesthouse_bot"), None);
        assert_eq!(BotCommand::parse("/help", "guesthouse_bot"), None);
        assert_eq!(BotCommand::parse("", "guesthouse_bot"), None);
    }

    fn update_from(chat_id: i64, language_code: &str, text: &str) -> Update {
        let raw = serde_json::json!({
            "update_id": 10,
            "message": {
                "message_id": 5,
                "date": 1770000000,
                "chat": { "id": chat_id, "type": "private", "first_name": "Ирина" },
                "from": {
                    "id": chat_id,
                    "is_bot": false,
                    "first_name": "Ирина",
                    "language_code": language_code
                },
                "text": text
            }
        })
        .to_string();
        // Same path as the webhook handler
        serde_json::from_str(&raw).unwrap()
    }

    #[test]
    fn extracts_text_messages() {
        let update = update_from(100, "en-US", "/start");
        assert_eq!(
            message_text(&update),
            Some(IncomingText {
                chat_id: 100,
                text: "/start",
                language_code: Some("en-US"),
            })
        );
    }

    #[tokio::test]
    async fn replies_in_the_senders_language() {
        let recorder = Arc::new(RecordingNotifier::default());
        let bot = handler(recorder.clone(), None);

        bot.handle_update(&update_from(100, "en-US", "/start")).await.unwrap();
        bot.handle_update(&update_from(555, "de", "/backup")).await.unwrap();

        let messages = recorder.messages.lock().unwrap();
        assert_eq!(messages.len(), 2);
        assert!(messages[0].1.text.contains("Bot activated"));
        assert_eq!(
            messages[0].1.button.as_ref().unwrap().label,
            "🏠 Open Guesthouse"
        );
        // unsupported languages fall back to Russian
        assert!(messages[1].1.text.contains("нет доступа"));
    }

    #[tokio::test]
    async fn start_greets_operators_with_app_button() {
        let recorder = Arc::new(RecordingNotifier::default());
        handler(recorder.clone(), None)
            .handle_command(BotCommand::Start, 100, "ru")
            .await
            .unwrap();

        let messages = recorder.messages.lock().unwrap();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].1.text.contains("Бот активирован"));
        assert_eq!(
            messages[0].1.button.as_ref().unwrap().url,
            "https://guesthouse.example"
        );
    }

    #[tokio::test]
    async fn start_tells_strangers_their_chat_id() {
        let recorder = Arc::new(RecordingNotifier::default());
        handler(recorder.clone(), None)
            .handle_command(BotCommand::Start, 555, "ru")
            .await
            .unwrap();

        let messages = recorder.messages.lock().unwrap();
        assert!(messages[0].1.text.contains("Ваш ID: 555"));
        assert!(messages[0].1.button.is_none());
    }

    #[tokio::test]
    async fn backup_is_operator_only() {
        let recorder = Arc::new(RecordingNotifier::default());
        handler(recorder.clone(), None)
            .handle_command(BotCommand::Backup, 555, "ru")
            .await
            .unwrap();

        let messages = recorder.messages.lock().unwrap();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].1.text.contains("нет доступа"));
    }

    #[tokio::test]
    async fn backup_runs_and_ships_the_file() {
        let recorder = Arc::new(RecordingNotifier::default());
        let scratch = std::env::temp_dir().join(format!("guesthouse-bot-{}", uuid::Uuid::new_v4()));
        let backups = Arc::new(BackupService::new(
            file_test_pool(&scratch).await,
            recorder.clone(),
            vec![100],
            PropertyClock::new(FixedOffset::east_opt(3 * 3600).unwrap()),
            scratch.join("backups"),
        ));

        handler(recorder.clone(), Some(backups))
            .handle_command(BotCommand::Backup, 100, "ru")
            .await
            .unwrap();

        assert!(recorder.messages.lock().unwrap()[0].1.text.contains("Создаю бекап"));
        assert_eq!(recorder.documents.lock().unwrap().len(), 1);
        assert_eq!(recorder.messages.lock().unwrap().len(), 1);
        let _ = std::fs::remove_dir_all(&scratch);
    }

    #[tokio::test]
    async fn backup_failure_is_reported_to_the_chat() {
        let recorder = Arc::new(RecordingNotifier::default());
        handler(recorder.clone(), None)
            .handle_command(BotCommand::Backup, 100, "ru")
            .await
            .unwrap();

        let messages = recorder.messages.lock().unwrap();
        assert_eq!(messages.len(), 2);
        assert!(messages[1].1.text.contains("Ошибка при создании бекапа"));
    }
}
