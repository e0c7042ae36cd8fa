use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("rate limited by {domain} (retry after {retry_after_secs}s)")]
    RateLimited {
        domain: String,
        retry_after_secs: u64,
    },

    #[error("endpoint not found: {url}")]
    NotFound { url: String },

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("no recognizable records in {context}")]
    UnrecognizedPayload { context: String },

    #[error("account \"{handle}\" has no resolved platform id")]
    Unresolved { handle: String },

    #[error("harvest deadline exceeded")]
    DeadlineExceeded,

    #[error("invalid URL \"{url}\": {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl HarvestError {
    pub(crate) fn unrecognized(context: impl Into<String>) -> Self {
        Self::UnrecognizedPayload {
            context: context.into(),
        }
    }

    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
            || matches!(self, Self::Http(e) if e.status() == Some(reqwest::StatusCode::TOO_MANY_REQUESTS))
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Db(#[from] creatordb_db::DbError),

    #[error("{0}")]
    Other(String),
}
