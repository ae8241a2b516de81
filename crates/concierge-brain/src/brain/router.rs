use std::sync::Arc;
use std::time::Duration;

use concierge_core::error::{ConciergeError, Result};
use concierge_core::types::{now_unix, AuditEntry};
use concierge_llm::provider::EmbeddingProvider;
use concierge_telegram::bot::TelegramBot;
use concierge_telegram::types::{TelegramMessage, Update};
use tracing::{debug, info, warn};

use super::Brain;
use crate::service::intent::Intent;
use crate::util::render;

const POLL_TIMEOUT_SECS: u32 = 30;
const POLL_RETRY: Duration = Duration::from_secs(5);

/// A text message reduced to what the handlers need.
#[derive(Debug, Clone)]
pub struct Inbound {
    pub user_id: i64,
    pub chat_id: i64,
    pub message_id: i64,
    pub display_name: String,
    pub text: String,
}

impl Inbound {
    /// `None` for messages without a sender or without text.
    pub fn from_message(msg: &TelegramMessage) -> Option<Self> {
        let from = msg.from.as_ref()?;
        let text = msg.text.as_deref().map(str::trim).filter(|t| !t.is_empty())?;
        Some(Self {
            user_id: from.id,
            chat_id: msg.chat.id,
            message_id: msg.message_id,
            display_name: from.first_name.clone(),
            text: text.to_string(),
        })
    }
}

/// Offset that acknowledges everything up to and including `updates`.
fn next_offset(current: i64, updates: &[Update]) -> i64 {
    updates
        .iter()
        .map(|u| u.update_id + 1)
        .fold(current, i64::max)
}

/// Messages that queued up while the bot was down are dropped, not answered.
async fn skip_pending_updates(bot: &TelegramBot) -> i64 {
    match bot.get_updates(-1, 0).await {
        Ok(updates) => {
            let offset = next_offset(0, &updates);
            if offset > 0 {
                info!("[brain] skipping pending updates up to {}", offset - 1);
            }
            offset
        }
        Err(e) => {
            warn!("[brain] could not skip pending updates: {e}");
            0
        }
    }
}

impl<E: EmbeddingProvider + 'static> Brain<E> {
    /// The main run loop: long-poll Telegram for updates, handle each message
    /// on its own task.
    pub async fn run(self: &Arc<Self>, bot: &TelegramBot) -> Result<()> {
        let me = bot.get_me().await?;
        info!(
            "[brain] bot started as @{}",
            me.username.as_deref().unwrap_or("unknown")
        );

        let mut offset = skip_pending_updates(bot).await;
        loop {
            let updates = match bot.get_updates(offset, POLL_TIMEOUT_SECS).await {
                Ok(u) => u,
                Err(e) => {
                    warn!("[brain] error polling updates: {e}");
                    tokio::time::sleep(POLL_RETRY).await;
                    continue;
                }
            };

            offset = next_offset(offset, &updates);
            for update in updates {
                if let Some(msg) = update.message {
                    let brain = Arc::clone(self);
                    tokio::spawn(async move {
                        if let Err(e) = brain.handle_message(&msg).await {
                            warn!("[brain] error handling message {}: {e}", msg.message_id);
                        }
                    });
                }
            }
        }
    }
}

impl<E: EmbeddingProvider> Brain<E> {
    /// Route an incoming Telegram message. Non-text messages are ignored.
    pub async fn handle_message(&self, msg: &TelegramMessage) -> Result<()> {
        match Inbound::from_message(msg) {
            Some(inbound) => self.handle_inbound(&inbound).await,
            None => {
                debug!("[recv] ignoring non-text message {} in chat {}", msg.message_id, msg.chat.id);
                Ok(())
            }
        }
    }

    pub async fn handle_inbound(&self, msg: &Inbound) -> Result<()> {
        info!("[recv] from={} (id={}) chat={}", msg.display_name, msg.user_id, msg.chat_id);

        // Any message from the user ends the follow-up cycle.
        if self.engagement.cancel(msg.user_id) {
            debug!("[engage] user={} wrote back", msg.user_id);
        }

        let intent = self.router.classify(&msg.text);
        info!("[intent] user={} {intent:?}", msg.user_id);

        let replies = &self.config.replies;
        match intent {
            Intent::FreeSlotRequest => {
                self.awaiting_day.lock().insert(msg.user_id);
                self.messenger.send_message(msg.chat_id, &replies.ask_day).await
            }
            Intent::Greeting => {
                let text = render(&replies.greeting, &[("name", msg.display_name.as_str())]);
                self.messenger.send_reply(msg.chat_id, &text, msg.message_id).await
            }
            Intent::Thanks => {
                self.messenger
                    .send_reply(msg.chat_id, &replies.thanks, msg.message_id)
                    .await
            }
            Intent::PricingEscalation => {
                // The admin hears about it even if the reply to the user fails.
                self.notify_admin(msg).await;
                self.messenger
                    .send_reply(msg.chat_id, &replies.escalation, msg.message_id)
                    .await?;
                self.engagement.schedule(msg.user_id, &msg.display_name);
                Ok(())
            }
            Intent::WeekdayQuery { day } => self.handle_weekday(msg, &day).await,
            Intent::Fallback => self.handle_fallback(msg).await,
        }
    }

    async fn handle_weekday(&self, msg: &Inbound, day: &str) -> Result<()> {
        let was_waiting = self.awaiting_day.lock().remove(&msg.user_id);
        debug!("[schedule] user={} day={day} was_waiting={was_waiting}", msg.user_id);

        let replies = &self.config.replies;
        let text = match self.schedule.free_slots(day) {
            Ok(slots) if slots.is_empty() => render(&replies.no_slots, &[("day", day)]),
            Ok(slots) => {
                let slots = slots.join("\n");
                render(&replies.free_slots, &[("day", day), ("slots", slots.as_str())])
            }
            Err(ConciergeError::UnknownScheduleDay(day)) => {
                info!("[schedule] no column for '{day}'");
                replies.unknown_day.clone()
            }
            Err(e) => return Err(e),
        };
        self.messenger.send_message(msg.chat_id, &text).await
    }

    async fn handle_fallback(&self, msg: &Inbound) -> Result<()> {
        let answer = match self.ranker.rank_match(&msg.text).await {
            Ok(m) => {
                debug!(
                    "[rank] user={} matched #{} '{}' score={:.3}",
                    msg.user_id, m.index, m.entry.question, m.score
                );
                m.entry.answer.clone()
            }
            Err(e) => {
                // The user still gets an answer, whatever broke.
                warn!("[rank] no match for user={}: {e}", msg.user_id);
                return self
                    .messenger
                    .send_reply(msg.chat_id, &self.config.replies.model_unavailable, msg.message_id)
                    .await;
            }
        };

        let text = format!("{}!\n{}", msg.display_name, answer.trim_end());
        self.messenger.send_reply(msg.chat_id, &text, msg.message_id).await?;

        let entry = AuditEntry {
            user_id: msg.user_id,
            user_name: msg.display_name.clone(),
            question: msg.text.clone(),
            answer,
            timestamp: now_unix(),
        };
        if let Err(e) = self.audit.record(&entry).await {
            warn!("[audit] {e}");
        }

        self.engagement.schedule(msg.user_id, &msg.display_name);
        Ok(())
    }

    async fn notify_admin(&self, msg: &Inbound) {
        let admin = self.config.telegram.admin_user_id;
        if admin == 0 {
            warn!("[admin] no admin_user_id configured, escalation from {} not forwarded", msg.user_id);
            return;
        }

        let user_id = msg.user_id.to_string();
        let notice = render(
            &self.config.replies.admin_notice,
            &[
                ("name", msg.display_name.as_str()),
                ("user_id", user_id.as_str()),
                ("text", msg.text.as_str()),
            ],
        );
        if let Err(e) = self.messenger.send_message(admin, &notice).await {
            warn!("[admin] failed to notify admin: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::engagement::EngagementState;
    use crate::service::index::EmbeddingIndex;
    use crate::service::messenger::Messenger;
    use crate::service::schedule::SheetSchedule;
    use crate::testing::{HashEmbedder, RecordingMessenger};
    use concierge_core::config::Config;
    use concierge_core::types::QaPair;
    use concierge_telegram::types::{Chat, User};

    const USER: i64 = 42;
    const ADMIN: i64 = 1000;

    const SCHEDULE: &str = "\
Время,Вторник,Среда,Четверг
10:00,,Иванова,x
12:00,Петров,,x
";

    struct Harness {
        brain: Brain<Arc<HashEmbedder>>,
        embedder: Arc<HashEmbedder>,
        messenger: Arc<RecordingMessenger>,
    }

    async fn harness(audit_path: &str) -> Harness {
        let mut config = Config::default();
        config.telegram.admin_user_id = ADMIN;
        config.audit.path = audit_path.to_string();

        let embedder = Arc::new(HashEmbedder::new(256));
        let pairs = vec![
            QaPair::new("Где вы находитесь?", "ТЦ «Сити Парк», второй этаж."),
            QaPair::new("Сколько длится сеанс массажа?", "Сеанс длится 60 минут."),
            QaPair::new("Можно ли оплатить картой?", "Да, принимаем карты."),
        ];
        let index = EmbeddingIndex::build(Arc::clone(&embedder), pairs, 16).await.unwrap();
        let schedule = SheetSchedule::from_csv(SCHEDULE, "Время").unwrap();
        let messenger = Arc::new(RecordingMessenger::default());

        let brain = Brain::from_parts(
            config,
            index,
            Arc::new(schedule),
            Arc::clone(&messenger) as Arc<dyn Messenger>,
        );
        Harness { brain, embedder, messenger }
    }

    fn inbound(text: &str) -> Inbound {
        Inbound {
            user_id: USER,
            chat_id: USER,
            message_id: 7,
            display_name: "Анна".to_string(),
            text: text.to_string(),
        }
    }

    async fn sleep_secs(secs: u64) {
        tokio::time::sleep(Duration::from_secs(secs)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_greeting_uses_name_without_timer() {
        let h = harness("").await;
        h.brain.handle_inbound(&inbound("Привет")).await.unwrap();
        assert_eq!(
            h.messenger.texts_to(USER),
            vec!["Здравствуйте, Анна!\n\nЧем я могу помочь?".to_string()]
        );
        assert_eq!(h.brain.engagement().state(USER), EngagementState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_weekday_apologises() {
        let h = harness("").await;
        h.brain.handle_inbound(&inbound("понедельник")).await.unwrap();
        assert_eq!(
            h.messenger.texts_to(USER),
            vec!["Извините, я не знаю такого дня недели.".to_string()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_weekday_lists_free_slots() {
        let h = harness("").await;
        h.brain.handle_inbound(&inbound("А во вторник?")).await.unwrap();
        h.brain.handle_inbound(&inbound("в четверг")).await.unwrap();
        assert_eq!(
            h.messenger.texts_to(USER),
            vec![
                "Мастер может вас принять в вторник:\n10:00".to_string(),
                "К сожалению, в четверг свободного времени нет.".to_string(),
            ]
        );
        assert_eq!(h.brain.engagement().state(USER), EngagementState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_free_slot_request_waits_for_day() {
        let h = harness("").await;
        h.brain.handle_inbound(&inbound("Есть свободные окошки?")).await.unwrap();
        assert!(h.brain.is_awaiting_day(USER));
        assert_eq!(
            h.messenger.texts_to(USER),
            vec!["Какой день недели вас интересует?".to_string()]
        );

        h.brain.handle_inbound(&inbound("Среда")).await.unwrap();
        assert!(!h.brain.is_awaiting_day(USER));
        assert_eq!(h.messenger.texts_to(USER)[1], "Мастер может вас принять в среда:\n12:00");
    }

    #[tokio::test(start_paused = true)]
    async fn test_fallback_then_follow_up_cycle() {
        let h = harness("").await;
        h.brain.handle_inbound(&inbound("где вы находитесь")).await.unwrap();
        assert_eq!(
            h.messenger.texts_to(USER),
            vec!["Анна!\nТЦ «Сити Парк», второй этаж.".to_string()]
        );
        assert_eq!(h.brain.engagement().state(USER), EngagementState::Pending);

        sleep_secs(16).await;
        assert_eq!(h.messenger.texts_to(USER)[1], "Анна, у Вас еще остались вопросы?");
        assert_eq!(h.brain.engagement().state(USER), EngagementState::Prompted);

        sleep_secs(10).await;
        let texts = h.messenger.texts_to(USER);
        assert_eq!(texts.len(), 3);
        assert!(texts[2].starts_with("Спасибо, Анна, за проявленный интерес!"));
        assert_eq!(h.brain.engagement().state(USER), EngagementState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reply_while_pending_cancels_cycle() {
        let h = harness("").await;
        h.brain.handle_inbound(&inbound("где вы находитесь")).await.unwrap();
        sleep_secs(5).await;
        h.brain.handle_inbound(&inbound("Спасибо")).await.unwrap();
        assert_eq!(h.brain.engagement().state(USER), EngagementState::Idle);

        sleep_secs(60).await;
        let texts = h.messenger.texts_to(USER);
        assert_eq!(texts.len(), 2);
        assert!(texts[1].starts_with("Спасибо, что написали"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pricing_escalates_to_admin() {
        let h = harness("").await;
        h.brain.handle_inbound(&inbound("Сколько стоит?")).await.unwrap();

        assert_eq!(
            h.messenger.texts_to(USER),
            vec!["На этот вопрос Вам ответит наш администратор, он свяжется с вами в ближайшее время."
                .to_string()]
        );
        let notices = h.messenger.texts_to(ADMIN);
        assert_eq!(notices.len(), 1);
        assert!(notices[0].starts_with("Клиенту нужна помощь!"));
        assert!(notices[0].contains("Анна"));
        assert!(notices[0].contains("Сколько стоит?"));
        assert_eq!(h.brain.engagement().state(USER), EngagementState::Pending);
    }

    #[tokio::test(start_paused = true)]
    async fn test_model_failure_degrades_to_apology() {
        let h = harness("").await;
        h.embedder.set_failing(true);
        h.brain.handle_inbound(&inbound("где вы находитесь")).await.unwrap();
        assert_eq!(
            h.messenger.texts_to(USER),
            vec!["Извините, сейчас я не могу ответить на этот вопрос. Попробуйте чуть позже."
                .to_string()]
        );
        assert_eq!(h.brain.engagement().state(USER), EngagementState::Idle);
    }

    #[tokio::test]
    async fn test_fallback_is_audited() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chat_log.jsonl");
        let h = harness(&path.to_string_lossy()).await;

        h.brain.handle_inbound(&inbound("можно оплатить картой")).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 1);
        let entry: AuditEntry = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(entry.user_id, USER);
        assert_eq!(entry.question, "можно оплатить картой");
        assert_eq!(entry.answer, "Да, принимаем карты.");
    }

    #[tokio::test]
    async fn test_non_text_messages_are_ignored() {
        let h = harness("").await;
        let from = User {
            id: USER,
            first_name: "Анна".to_string(),
            username: None,
        };
        let photo = TelegramMessage {
            message_id: 1,
            from: Some(from.clone()),
            chat: Chat { id: USER },
            text: None,
        };
        let blank = TelegramMessage {
            message_id: 2,
            from: Some(from),
            chat: Chat { id: USER },
            text: Some("   ".to_string()),
        };
        let anonymous = TelegramMessage {
            message_id: 3,
            from: None,
            chat: Chat { id: USER },
            text: Some("Привет".to_string()),
        };

        for msg in [&photo, &blank, &anonymous] {
            h.brain.handle_message(msg).await.unwrap();
        }
        assert!(h.messenger.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_embedding_http_error_still_apologises() {
        let h = harness("").await;
        h.embedder.set_http_status(500);
        let result = h.brain.handle_inbound(&inbound("где вы")).await;
        assert!(result.is_ok());
        assert_eq!(
            h.messenger.texts_to(USER),
            vec!["Извините, сейчас я не могу ответить на этот вопрос. Попробуйте чуть позже."
                .to_string()]
        );
        assert_eq!(h.brain.engagement().state(USER), EngagementState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_admin_notified_when_user_reply_fails() {
        let h = harness("").await;
        h.messenger.set_failing_replies(true);
        let result = h.brain.handle_inbound(&inbound("Хочу записаться")).await;
        assert!(result.is_err());

        let notices = h.messenger.texts_to(ADMIN);
        assert_eq!(notices.len(), 1);
        assert!(notices[0].contains("Хочу записаться"));
        assert!(h.messenger.texts_to(USER).is_empty());
        assert_eq!(h.brain.engagement().state(USER), EngagementState::Idle);
    }

    #[test]
    fn test_next_offset_acknowledges_latest_update() {
        let updates = vec![
            Update { update_id: 12, message: None },
            Update { update_id: 10, message: None },
        ];
        assert_eq!(next_offset(0, &updates), 13);
        assert_eq!(next_offset(20, &updates), 20);
        assert_eq!(next_offset(5, &[]), 5);
    }

    #[test]
    fn test_inbound_from_message_trims_text() {
        let msg = TelegramMessage {
            message_id: 9,
            from: Some(User {
                id: 5,
                first_name: "Борис".to_string(),
                username: Some("boris".to_string()),
            }),
            chat: Chat { id: 77 },
            text: Some("  Привет \n".to_string()),
        };
        let inbound = Inbound::from_message(&msg).unwrap();
        assert_eq!(inbound.user_id, 5);
        assert_eq!(inbound.chat_id, 77);
        assert_eq!(inbound.display_name, "Борис");
        assert_eq!(inbound.text, "Привет");
    }
}
