use thiserror::Error;

/// Errors returned by the study engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("pool of {available} items is too small to build a quiz (need at least {required})")]
    InsufficientPool { available: usize, required: usize },

    #[error("no question could be generated from the pool")]
    NoGenerableQuestions,

    #[error("deck has no usable items")]
    EmptyDeck,

    #[error("no checkpoint is active")]
    NoActiveCheckpoint,

    #[error("the final checkpoint cannot be skipped")]
    CannotSkipFinal,

    #[error("the active checkpoint has no quiz to submit")]
    QuizUnavailable,

    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Errors raised by a `StudyBackend` implementation.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("request to study server failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("study server rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("local ledger database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("local ledger migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("unknown study set {0:?}")]
    UnknownSet(String),
}
