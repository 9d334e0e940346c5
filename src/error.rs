use derive_more::{Display, Error};

#[derive(Debug, Display, Error)]
pub enum ConfigError {
    #[display("failed to read config file")]
    ReadFile,
    #[display("failed to parse config: {reason}")]
    Parse { reason: String },
    #[display("invalid config: {field}")]
    Validation { field: String },
}

/// Errors surfaced by `AlertStore` operations.
#[derive(Debug, Display, Error)]
pub enum StoreError {
    #[display("invalid alert parameters: {reason}")]
    Validation { reason: String },
    #[display("no alert with id {id}")]
    NotFound { id: String },
    /// The durable write failed. The in-memory collection already reflects
    /// the change; it may not survive a restart.
    #[display("failed to persist alert collection")]
    Persistence,
}

/// Errors from the durable record backend beneath the store.
#[derive(Debug, Display, Error)]
pub enum StorageError {
    #[display("database migration failed")]
    Migration,
    #[display("failed to read persisted record")]
    Read,
    #[display("failed to write persisted record")]
    Write,
}

/// Failure of a single notification channel. Swallowed at the dispatcher
/// boundary; never reaches the evaluator.
#[derive(Debug, Display, Error)]
pub enum NotifyError {
    #[display("failed to deliver desktop notification")]
    Desktop,
}

#[derive(Debug, Display, Error)]
pub enum FeedError {
    #[display("failed to sample price for {symbol}")]
    Sample { symbol: String },
}
