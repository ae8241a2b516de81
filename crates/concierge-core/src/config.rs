use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{ConciergeError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub ollama: OllamaConfig,
    #[serde(default)]
    pub corpus: CorpusConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub ranking: RankingConfig,
    #[serde(default)]
    pub engagement: EngagementConfig,
    #[serde(default)]
    pub intents: IntentConfig,
    #[serde(default)]
    pub replies: RepliesConfig,
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub token: String,
    /// Chat that receives escalation notices. 0 disables notifications.
    #[serde(default)]
    pub admin_user_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,
    #[serde(default)]
    pub api_key: String,
    /// Questions per request when building the index.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_embedding_provider() -> String {
    "ollama".to_string()
}

fn default_embedding_model() -> String {
    "nomic-embed-text".to_string()
}

fn default_dimensions() -> usize {
    768
}

fn default_batch_size() -> usize {
    64
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: default_embedding_model(),
            dimensions: default_dimensions(),
            api_key: String::new(),
            batch_size: default_batch_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    #[serde(default = "default_ollama_url")]
    pub base_url: String,
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: default_ollama_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusConfig {
    #[serde(default = "default_corpus_path")]
    pub path: String,
    #[serde(default = "default_question_column")]
    pub question_column: String,
    #[serde(default = "default_answer_column")]
    pub answer_column: String,
}

fn default_corpus_path() -> String {
    "data/qa.csv".to_string()
}

fn default_question_column() -> String {
    "Вопросы".to_string()
}

fn default_answer_column() -> String {
    "Ответы".to_string()
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            path: default_corpus_path(),
            question_column: default_question_column(),
            answer_column: default_answer_column(),
        }
    }
}

/// Where the weekly schedule table comes from.
///
/// A non-empty `path` wins; otherwise the sheet is fetched as a CSV export
/// of `spreadsheet_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub spreadsheet_id: String,
    #[serde(default = "default_sheet")]
    pub sheet: String,
    #[serde(default = "default_time_column")]
    pub time_column: String,
}

fn default_sheet() -> String {
    "ТЦ «Сити Парк»".to_string()
}

fn default_time_column() -> String {
    "Время".to_string()
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            spreadsheet_id: String::new(),
            sheet: default_sheet(),
            time_column: default_time_column(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingConfig {
    #[serde(default = "default_candidates")]
    pub candidates: usize,
    /// Reuse the first query embedding for the second ranking pass instead
    /// of embedding the query again.
    #[serde(default)]
    pub reuse_query_embedding: bool,
}

fn default_candidates() -> usize {
    3
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            candidates: default_candidates(),
            reuse_query_embedding: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngagementConfig {
    #[serde(default = "default_inactivity_secs")]
    pub inactivity_secs: u64,
    #[serde(default = "default_grace_secs")]
    pub grace_secs: u64,
}

fn default_inactivity_secs() -> u64 {
    15
}

fn default_grace_secs() -> u64 {
    10
}

impl Default for EngagementConfig {
    fn default() -> Self {
        Self {
            inactivity_secs: default_inactivity_secs(),
            grace_secs: default_grace_secs(),
        }
    }
}

/// Phrase sets for the fast-path intents. Matching is case-insensitive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentConfig {
    #[serde(default = "default_free_slot_phrases")]
    pub free_slot_phrases: Vec<String>,
    #[serde(default = "default_greeting_stems")]
    pub greeting_stems: Vec<String>,
    #[serde(default = "default_thanks_phrases")]
    pub thanks_phrases: Vec<String>,
    #[serde(default = "default_pricing_phrases")]
    pub pricing_phrases: Vec<String>,
    #[serde(default = "default_weekdays")]
    pub weekdays: Vec<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn default_free_slot_phrases() -> Vec<String> {
    strings(&["свободные окошки", "свободное время"])
}

fn default_greeting_stems() -> Vec<String> {
    strings(&["здраст", "привет", "добр"])
}

fn default_thanks_phrases() -> Vec<String> {
    strings(&["Спасибо", "Благодарю", "Ок"])
}

fn default_pricing_phrases() -> Vec<String> {
    strings(&["цена", "записаться", "стоит"])
}

fn default_weekdays() -> Vec<String> {
    strings(&[
        "понедельник",
        "вторник",
        "среда",
        "четверг",
        "пятница",
        "суббота",
        "воскресенье",
    ])
}

impl Default for IntentConfig {
    fn default() -> Self {
        Self {
            free_slot_phrases: default_free_slot_phrases(),
            greeting_stems: default_greeting_stems(),
            thanks_phrases: default_thanks_phrases(),
            pricing_phrases: default_pricing_phrases(),
            weekdays: default_weekdays(),
        }
    }
}

/// User-visible texts. Placeholders in braces are substituted where noted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepliesConfig {
    #[serde(default = "default_ask_day")]
    pub ask_day: String,
    /// `{name}`
    #[serde(default = "default_greeting")]
    pub greeting: String,
    #[serde(default = "default_thanks")]
    pub thanks: String,
    #[serde(default = "default_escalation")]
    pub escalation: String,
    /// Sent to the admin on escalation. `{name}`, `{user_id}`, `{text}`
    #[serde(default = "default_admin_notice")]
    pub admin_notice: String,
    /// `{day}`, `{slots}`
    #[serde(default = "default_free_slots")]
    pub free_slots: String,
    /// `{day}`
    #[serde(default = "default_no_slots")]
    pub no_slots: String,
    #[serde(default = "default_unknown_day")]
    pub unknown_day: String,
    #[serde(default = "default_model_unavailable")]
    pub model_unavailable: String,
    /// `{name}`
    #[serde(default = "default_reengage")]
    pub reengage: String,
    /// `{name}`
    #[serde(default = "default_farewell")]
    pub farewell: String,
}

fn default_ask_day() -> String {
    "Какой день недели вас интересует?".to_string()
}

fn default_greeting() -> String {
    "Здравствуйте, {name}!\n\nЧем я могу помочь?".to_string()
}

fn default_thanks() -> String {
    "Спасибо, что написали, если у Вас еще остались вопросы, с радостью ответим на них!"
        .to_string()
}

fn default_escalation() -> String {
    "На этот вопрос Вам ответит наш администратор, он свяжется с вами в ближайшее время."
        .to_string()
}

fn default_admin_notice() -> String {
    "Клиенту нужна помощь!\n{name} (id {user_id}): {text}".to_string()
}

fn default_free_slots() -> String {
    "Мастер может вас принять в {day}:\n{slots}".to_string()
}

fn default_no_slots() -> String {
    "К сожалению, в {day} свободного времени нет.".to_string()
}

fn default_unknown_day() -> String {
    "Извините, я не знаю такого дня недели.".to_string()
}

fn default_model_unavailable() -> String {
    "Извините, сейчас я не могу ответить на этот вопрос. Попробуйте чуть позже.".to_string()
}

fn default_reengage() -> String {
    "{name}, у Вас еще остались вопросы?".to_string()
}

fn default_farewell() -> String {
    "Спасибо, {name}, за проявленный интерес! Мы всегда готовы ответить на ваши вопросы."
        .to_string()
}

impl Default for RepliesConfig {
    fn default() -> Self {
        Self {
            ask_day: default_ask_day(),
            greeting: default_greeting(),
            thanks: default_thanks(),
            escalation: default_escalation(),
            admin_notice: default_admin_notice(),
            free_slots: default_free_slots(),
            no_slots: default_no_slots(),
            unknown_day: default_unknown_day(),
            model_unavailable: default_model_unavailable(),
            reengage: default_reengage(),
            farewell: default_farewell(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// JSON-lines file; empty disables the audit trail.
    #[serde(default = "default_audit_path")]
    pub path: String,
}

fn default_audit_path() -> String {
    "chat_log.jsonl".to_string()
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            path: default_audit_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

impl Config {
    /// Load config: defaults → concierge.toml → env vars (env wins).
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .map_err(|e| ConciergeError::Config(format!("failed to read config: {e}")))?;
            Self::from_toml(&content)?
        } else {
            Self::default()
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| ConciergeError::Config(format!("failed to parse config: {e}")))
    }

    /// Override fields from the environment. `lookup` is `std::env::var` in production.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(v) = lookup("CONCIERGE_TELEGRAM_TOKEN") {
            self.telegram.token = v;
        }
        if let Some(v) = lookup("CONCIERGE_ADMIN_USER_ID") {
            self.telegram.admin_user_id = v.trim().parse().map_err(|_| {
                ConciergeError::Config(format!("CONCIERGE_ADMIN_USER_ID is not a number: '{v}'"))
            })?;
        }
        if let Some(v) = lookup("CONCIERGE_EMBEDDING_API_KEY") {
            self.embedding.api_key = v;
        }
        if let Some(v) = lookup("CONCIERGE_SPREADSHEET_ID") {
            self.schedule.spreadsheet_id = v;
        }
        if let Some(v) = lookup("CONCIERGE_LOG") {
            self.log.filter = v;
        }
        Ok(())
    }

    /// Checks that must pass before the bot starts talking to anyone.
    pub fn validate(&self) -> Result<()> {
        if self.telegram.token.is_empty() {
            return Err(ConciergeError::Config(
                "telegram token is not set (CONCIERGE_TELEGRAM_TOKEN)".to_string(),
            ));
        }
        if self.schedule.path.is_empty() && self.schedule.spreadsheet_id.is_empty() {
            return Err(ConciergeError::Config(
                "schedule source is not set: provide schedule.path or schedule.spreadsheet_id"
                    .to_string(),
            ));
        }
        if self.ranking.candidates == 0 {
            return Err(ConciergeError::Config(
                "ranking.candidates must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
