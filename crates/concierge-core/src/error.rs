use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConciergeError {
    #[error("telegram error: {0}")]
    Telegram(String),
    /// The embedding model could not produce vectors for a request.
    #[error("embedding model unavailable: {0}")]
    ModelUnavailable(String),
    /// The question corpus has no usable rows.
    #[error("embedding index is empty")]
    EmptyIndex,
    #[error("unknown schedule day: {0}")]
    UnknownScheduleDay(String),
    /// A timer observed a record it should never see. Never user-facing.
    #[error("engagement timer race for user {user_id}")]
    TimerRace { user_id: i64 },
    #[error("corpus error: {0}")]
    Corpus(String),
    #[error("schedule error: {0}")]
    Schedule(String),
    #[error("audit log error: {0}")]
    Audit(String),
    #[error("config error: {0}")]
    Config(String),
    #[error("http error ({status}): {body}")]
    Http { status: u16, body: String },
}

pub type Result<T> = std::result::Result<T, ConciergeError>;
