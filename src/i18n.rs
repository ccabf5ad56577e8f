/*
Operator-facing strings for the backend.

This module provides:
- A tiny embedded translations store for RU/EN (compile-time embedded JSON).
- A `tr` function to lookup translations by key + optional params.
- `resolve_language` to map a Telegram `language_code` onto a table.
- `t` / `t_with` convenience wrappers using the default language (DEFAULT_LANG).

Usage:
    use crate::i18n;
    let msg = i18n::t("bot.backup_no_access");
    let caption = i18n::t_with("backup.caption", &[("date", "5 февраля 2026"), ("size", "12.50"), ("count", "42")]);

Notes:
- Placeholders in translation strings use single-brace format: `{name}`.
- Default language is `ru`: the guesthouse staff read Russian. If a key is
  missing for the requested language, the default language is used.
*/

use std::collections::HashMap;
use std::sync::OnceLock;

pub const DEFAULT_LANG: &str = "ru";

static TRANSLATIONS: OnceLock<HashMap<String, HashMap<String, String>>> = OnceLock::new();

const RU_JSON: &str = r#"
{
  "booking.collision": "Ошибка: На эти даты в этом номере уже есть бронь ({guest})",
  "validation.unknown_room": "Неизвестный номер: {room}",
  "validation.guest_name_required": "Укажите имя гостя",
  "validation.guest_phone_required": "Укажите номер телефона гостя",
  "validation.dates_order": "Дата выезда не может быть раньше даты заезда",
  "validation.total_too_large": "Слишком большая сумма бронирования",
  "validation.adults": "Должен быть хотя бы один взрослый гость",
  "validation.kids": "Количество детей не может быть отрицательным",
  "validation.prices": "Цена и предоплата не могут быть отрицательными",
  "validation.time_format": "Неверный формат времени для {field}: ожидается ЧЧ:ММ",
  "not_found.booking": "Бронирование не найдено",
  "reminder.window.24h": "24 часа",
  "reminder.window.2h": "2 часа",
  "reminder.title": "🔔 Напоминание о заселении через {window}!",
  "reminder.guest": "👤 Гость: {name}",
  "reminder.phone": "📞 Телефон: {phone}",
  "reminder.room": "🏠 Номер: {room}",
  "reminder.check_in": "📅 Заселение: {date}",
  "reminder.adults": "👥 Гости: {adults} взрослых",
  "reminder.kids": ", {kids} детей",
  "reminder.remaining": "💰 Осталось оплатить: {amount} ₽",
  "reminder.paid": "✅ Полностью оплачено",
  "reminder.special_header": "📋 Особые требования:",
  "reminder.parking": "🚗 Парковка",
  "reminder.early_check_in": "⏰ Ранний заезд ({time})",
  "reminder.late_check_out": "⏰ Поздний выезд ({time})",
  "reminder.comment": "💬 Комментарий: {comment}",
  "reminder.open_booking": "👁 Открыть бронь",
  "reminder.room_fallback": "Номер {room}",
  "bot.menu_button": "🏠 Гостевой дом",
  "bot.open_app": "🏠 Открыть Гостевой дом",
  "bot.activated": "✅ Бот активирован!\n\nВы будете получать уведомления о заселениях:\n• За 24 часа до заселения\n• За 2 часа до заселения",
  "bot.not_registered": "⚠️ Ваш chat ID не зарегистрирован.\n\nВаш ID: {chat_id}\n\nОбратитесь к администратору для добавления.",
  "bot.backup_no_access": "⚠️ У вас нет доступа к этой команде.",
  "bot.backup_started": "📦 Создаю бекап базы данных...",
  "bot.backup_failed": "❌ Ошибка при создании бекапа. Проверьте логи.",
  "backup.caption": "💾 Бекап базы данных\n📅 {date}\n📦 Размер: {size} KB\n📋 Бронирований: {count}",
  "month.1": "января",
  "month.2": "февраля",
  "month.3": "марта",
  "month.4": "апреля",
  "month.5": "мая",
  "month.6": "июня",
  "month.7": "июля",
  "month.8": "августа",
  "month.9": "сентября",
  "month.10": "октября",
  "month.11": "ноября",
  "month.12": "декабря"
}
"#;

// Only the bot replies follow the sender's language; everything else is
// read by the guesthouse staff and falls back to Russian.
const EN_JSON: &str = r#"
{
  "bot.menu_button": "🏠 Guesthouse",
  "bot.open_app": "🏠 Open Guesthouse",
  "bot.activated": "✅ Bot activated!\n\nYou will receive check-in reminders:\n• 24 hours before check-in\n• 2 hours before check-in",
  "bot.not_registered": "⚠️ Your chat ID is not registered.\n\nYour ID: {chat_id}\n\nAsk the administrator to add it.",
  "bot.backup_no_access": "⚠️ You do not have access to this command.",
  "bot.backup_started": "📦 Creating database backup...",
  "bot.backup_failed": "❌ Backup failed. Check the logs."
}
"#;

/// Initialize translations map (lazy).
fn build_translations() -> HashMap<String, HashMap<String, String>> {
    let mut out: HashMap<String, HashMap<String, String>> = HashMap::new();

    // Parse RU
    let ru_map: HashMap<String, String> = serde_json::from_str(RU_JSON).unwrap_or_else(|e| {
        panic!("failed to parse RU_JSON in i18n module: {}", e);
    });
    out.insert("ru".to_string(), ru_map);

    // Parse EN
    let en_map: HashMap<String, String> = serde_json::from_str(EN_JSON).unwrap_or_else(|e| {
        panic!("failed to parse EN_JSON in i18n module: {}", e);
    });
    out.insert("en".to_string(), en_map);

    out
}

/// Returns the global translations map (lang -> (key -> message)).
fn translations() -> &'static HashMap<String, HashMap<String, String>> {
    TRANSLATIONS.get_or_init(build_translations)
}

/// Normalize a language tag into a short, lowercase code (e.g. "en-US" -> "en").
///
/// Telegram reports `language_code` as an IETF tag; the translation tables are
/// keyed by the short form.
pub fn normalize_language(lang: &str) -> String {
    lang.split('-').next().unwrap_or(lang).to_lowercase()
}

/// Returns true if the given language code is supported (e.g. "ru", "en").
pub fn is_supported_language(lang: &str) -> bool {
    translations().contains_key(lang)
}

/// Map an optional client language tag to a supported language code.
pub fn resolve_language(lang: Option<&str>) -> &'static str {
    match lang.map(normalize_language) {
        Some(l) if l == "en" && is_supported_language("en") => "en",
        _ => DEFAULT_LANG,
    }
}

/// Translate a key using an explicit language (or default if None).
///
/// Returns the translated and parameter-substituted string. If no translation is found,
/// returns the default language value or the key itself.
pub fn tr(lang: Option<&str>, key: &str, params: Option<&[(&str, &str)]>) -> String {
    let map = translations();

    let desired = lang.unwrap_or(DEFAULT_LANG);

    let val = map
        .get(desired)
        .and_then(|m| m.get(key))
        .cloned()
        .or_else(|| map.get(DEFAULT_LANG).and_then(|m| m.get(key)).cloned())
        // If still missing, return the key itself (useful in logs)
        .unwrap_or_else(|| key.to_string());

    if let Some(params) = params {
        let mut s = val;
        for (k, v) in params {
            s = s.replace(&format!("{{{}}}", k), v);
        }
        s
    } else {
        val
    }
}

/// Convenience wrapper: translate using default language (DEFAULT_LANG).
pub fn t(key: &str) -> String {
    tr(None, key, None)
}

/// Convenience wrapper with params (default language).
pub fn t_with(key: &str, params: &[(&str, &str)]) -> String {
    tr(None, key, Some(params))
}
