use std::collections::HashSet;
use std::sync::Arc;

use concierge_core::config::Config;
use concierge_core::error::Result;
use concierge_llm::provider::EmbeddingProvider;
use parking_lot::Mutex;
use tracing::info;

use crate::service::audit::AuditLog;
use crate::service::corpus::load_corpus;
use crate::service::engagement::EngagementTracker;
use crate::service::index::EmbeddingIndex;
use crate::service::intent::IntentRouter;
use crate::service::llm::Embedder;
use crate::service::messenger::Messenger;
use crate::service::ranker::MatchRanker;
use crate::service::schedule::{load_schedule, ScheduleStore};

mod router;

pub use router::Inbound;

/// The process-wide context that ties all components together.
///
/// Built once in `main` and shared behind an `Arc`; nothing in it is torn down
/// or reloaded while the bot runs.
pub struct Brain<E = Embedder> {
    pub(crate) config: Config,
    pub(crate) ranker: MatchRanker<E>,
    pub(crate) router: IntentRouter,
    pub(crate) engagement: EngagementTracker,
    pub(crate) schedule: Arc<dyn ScheduleStore>,
    pub(crate) messenger: Arc<dyn Messenger>,
    pub(crate) audit: AuditLog,
    /// Users who asked for free slots and were asked which day.
    pub(crate) awaiting_day: Mutex<HashSet<i64>>,
}

impl Brain<Embedder> {
    /// Load the corpus and schedule, embed the corpus, and wire everything up.
    /// Any failure here is fatal for the process.
    pub async fn new(config: Config, messenger: Arc<dyn Messenger>) -> Result<Self> {
        let embedder = Embedder::new(&config)?;
        let pairs = load_corpus(&config.corpus)?;
        let index = EmbeddingIndex::build(embedder, pairs, config.embedding.batch_size).await?;
        let schedule = load_schedule(&config.schedule).await?;

        Ok(Self::from_parts(config, index, Arc::new(schedule), messenger))
    }
}

impl<E: EmbeddingProvider> Brain<E> {
    pub fn from_parts(
        config: Config,
        index: EmbeddingIndex<E>,
        schedule: Arc<dyn ScheduleStore>,
        messenger: Arc<dyn Messenger>,
    ) -> Self {
        let ranker = MatchRanker::new(Arc::new(index), &config.ranking);
        let router = IntentRouter::new(&config.intents);
        let engagement =
            EngagementTracker::new(Arc::clone(&messenger), &config.engagement, &config.replies);
        let audit = AuditLog::new(&config.audit.path);

        info!(
            "[brain] ready: {} corpus entries, audit {}",
            ranker.index().len(),
            if audit.is_enabled() { "on" } else { "off" }
        );

        Self {
            config,
            ranker,
            router,
            engagement,
            schedule,
            messenger,
            audit,
            awaiting_day: Mutex::new(HashSet::new()),
        }
    }

    pub fn engagement(&self) -> &EngagementTracker {
        &self.engagement
    }

    pub fn is_awaiting_day(&self, user_id: i64) -> bool {
        self.awaiting_day.lock().contains(&user_id)
    }
}
