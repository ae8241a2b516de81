use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use concierge_core::config::{EngagementConfig, RepliesConfig};
use concierge_core::error::ConciergeError;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::messenger::Messenger;
use crate::util::render;

/// Where a user is in the follow-up cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngagementState {
    /// No timer armed.
    Idle,
    /// Bot replied; waiting out the inactivity window.
    Pending,
    /// Follow-up question sent; waiting out the grace window.
    Prompted,
}

impl std::fmt::Display for EngagementState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Pending => write!(f, "pending"),
            Self::Prompted => write!(f, "prompted"),
        }
    }
}

/// One live follow-up cycle.
struct Conversation {
    display_name: String,
    last_reply_at: Instant,
    state: EngagementState,
    generation: u64,
    timer: Option<JoinHandle<()>>,
}

struct TrackerInner {
    /// user_id → live cycle. Absent means `Idle`.
    conversations: Mutex<HashMap<i64, Conversation>>,
    next_generation: AtomicU64,
    messenger: Arc<dyn Messenger>,
    inactivity: Duration,
    grace: Duration,
    reengage_template: String,
    farewell_template: String,
}

/// Per-user re-engagement timers.
///
/// Every arm, cancel and fire decision for a user happens under the
/// `conversations` lock, and a timer acts only if its cycle's generation is
/// still the live one. A cancelled or replaced cycle therefore never sends
/// anything. The lock is never held across an `.await`.
#[derive(Clone)]
pub struct EngagementTracker {
    inner: Arc<TrackerInner>,
}

impl EngagementTracker {
    pub fn new(
        messenger: Arc<dyn Messenger>,
        config: &EngagementConfig,
        replies: &RepliesConfig,
    ) -> Self {
        Self {
            inner: Arc::new(TrackerInner {
                conversations: Mutex::new(HashMap::new()),
                next_generation: AtomicU64::new(1),
                messenger,
                inactivity: Duration::from_secs(config.inactivity_secs),
                grace: Duration::from_secs(config.grace_secs),
                reengage_template: replies.reengage.clone(),
                farewell_template: replies.farewell.clone(),
            }),
        }
    }

    /// Arm a fresh cycle after a bot reply, replacing any cycle already armed.
    pub fn schedule(&self, user_id: i64, display_name: &str) {
        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
        let mut conversations = self.inner.conversations.lock();

        if let Some(previous) = conversations.remove(&user_id) {
            if let Some(timer) = previous.timer {
                timer.abort();
            }
            debug!(
                "[engage] user={user_id} replaced {} cycle {}",
                previous.state, previous.generation
            );
        }

        // The task cannot touch the map before this insert: we hold the lock.
        let inner = Arc::clone(&self.inner);
        let timer = tokio::spawn(async move { inner.run_cycle(user_id, generation).await });

        conversations.insert(
            user_id,
            Conversation {
                display_name: display_name.to_string(),
                last_reply_at: Instant::now(),
                state: EngagementState::Pending,
                generation,
                timer: Some(timer),
            },
        );
        debug!("[engage] user={user_id} armed cycle {generation}");
    }

    /// The user wrote again: drop the cycle. Returns whether one was armed.
    pub fn cancel(&self, user_id: i64) -> bool {
        let removed = self.inner.conversations.lock().remove(&user_id);
        match removed {
            Some(conversation) => {
                if let Some(timer) = conversation.timer {
                    timer.abort();
                }
                debug!(
                    "[engage] user={user_id} cancelled {} cycle {} after {:?}",
                    conversation.state,
                    conversation.generation,
                    conversation.last_reply_at.elapsed()
                );
                true
            }
            None => false,
        }
    }

    pub fn state(&self, user_id: i64) -> EngagementState {
        self.inner
            .conversations
            .lock()
            .get(&user_id)
            .map(|c| c.state)
            .unwrap_or(EngagementState::Idle)
    }

    /// Number of users with a live cycle.
    pub fn active(&self) -> usize {
        self.inner.conversations.lock().len()
    }
}

impl TrackerInner {
    async fn run_cycle(self: Arc<Self>, user_id: i64, generation: u64) {
        tokio::time::sleep(self.inactivity).await;
        let Some(name) = self.advance(user_id, generation, EngagementState::Pending) else {
            return;
        };
        info!("[engage] user={user_id} inactive, sending follow-up");
        self.send(user_id, &render(&self.reengage_template, &[("name", name.as_str())])).await;

        tokio::time::sleep(self.grace).await;
        let Some(name) = self.advance(user_id, generation, EngagementState::Prompted) else {
            return;
        };
        info!("[engage] user={user_id} no answer, closing cycle");
        self.send(user_id, &render(&self.farewell_template, &[("name", name.as_str())])).await;
    }

    /// Move the cycle on from `expected`: `Pending` becomes `Prompted`,
    /// `Prompted` ends the cycle. Returns the display name if this timer
    /// still owns the cycle.
    fn advance(&self, user_id: i64, generation: u64, expected: EngagementState) -> Option<String> {
        let mut conversations = self.conversations.lock();
        let conversation = conversations.get_mut(&user_id)?;
        if conversation.generation != generation {
            return None;
        }
        if conversation.state != expected {
            error!(
                "[engage] {} (state {}, expected {expected})",
                ConciergeError::TimerRace { user_id },
                conversation.state
            );
            conversations.remove(&user_id);
            return None;
        }

        let name = conversation.display_name.clone();
        match expected {
            EngagementState::Pending => conversation.state = EngagementState::Prompted,
            _ => {
                // Dropping our own handle only detaches it.
                conversations.remove(&user_id);
            }
        }
        Some(name)
    }

    async fn send(&self, user_id: i64, text: &str) {
        if let Err(e) = self.messenger.send_message(user_id, text).await {
            warn!("[engage] user={user_id} send failed: {e}");
        }
    }
}
