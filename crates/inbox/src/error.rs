use std::error::Error as StdError;

/// Crate-wide result type for inbox operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Failure taxonomy for ingestion, reconciliation and outbound sends.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An inbound event is missing required fields or has the wrong shape.
    /// Only that event is skipped; sibling events keep processing.
    #[error("malformed event: {reason}")]
    MalformedEvent { reason: String },

    /// The store is unavailable or a write failed.
    #[error("persistence failed: {0}")]
    Persistence(#[from] sqlx::Error),

    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),

    /// The messaging gateway rejected, failed or timed out a request.
    #[error("gateway request failed: {message}")]
    Gateway {
        message: String,
        status: Option<u16>,
    },

    /// The caller lacks the credentials for a protected operation.
    #[error("not authorized: {message}")]
    Authorization { message: String },

    /// An outbound request failed validation before anything was sent.
    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    /// The gateway accepted the message but recording it locally failed.
    /// Retrying would send it twice.
    #[error("message was sent (id {external_id:?}) but could not be recorded: {source}")]
    SentButNotRecorded {
        external_id: Option<String>,
        #[source]
        source: Box<Error>,
    },

    #[error("{context}: {source}")]
    External {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
}

impl Error {
    #[must_use]
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedEvent {
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn gateway(message: impl Into<String>, status: Option<u16>) -> Self {
        Self::Gateway {
            message: message.into(),
            status,
        }
    }

    #[must_use]
    pub fn authorization(message: impl Into<String>) -> Self {
        Self::Authorization {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn external(
        context: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::External {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// Whether the failure came from the store rather than the caller or the
    /// gateway.
    #[must_use]
    pub fn is_persistence(&self) -> bool {
        matches!(self, Self::Persistence(_) | Self::Migrate(_))
    }
}

impl From<chatdesk_common::Error> for Error {
    fn from(err: chatdesk_common::Error) -> Self {
        match err {
            chatdesk_common::Error::InvalidPhone { .. } => Self::invalid_input(err.to_string()),
        }
    }
}
