//! Error type shared by every stage of the sync pipeline.

/// Machine-readable classification of a [`SyncError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Fetch,
    Write,
    Configuration,
    NotFound,
}

/// Errors raised by the fetch, write and scheduling stages.
///
/// `Write` errors never escape the write stage: they are folded into the
/// `errors` list of a [`crate::contract::SyncOutcome`]. `Fetch` errors from a
/// single-endpoint fetch propagate to `sync()`, which turns them into a failed
/// outcome. `Configuration` and `NotFound` surface to callers of the registry.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("fetch failed{}: {message}", status_suffix(.status))]
    Fetch {
        status: Option<u16>,
        message: String,
    },

    #[error("failed to write {item}: {message}")]
    Write { item: String, message: String },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("source not found: {0}")]
    NotFound(String),
}

fn status_suffix(status: &Option<u16>) -> String {
    status
        .map(|s| format!(" with status {s}"))
        .unwrap_or_default()
}

impl SyncError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::Fetch { .. } => ErrorKind::Fetch,
            SyncError::Write { .. } => ErrorKind::Write,
            SyncError::Configuration(_) => ErrorKind::Configuration,
            SyncError::NotFound(_) => ErrorKind::NotFound,
        }
    }

    pub(crate) fn fetch(status: Option<u16>, message: impl Into<String>) -> Self {
        SyncError::Fetch {
            status,
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(e: reqwest::Error) -> Self {
        SyncError::Fetch {
            status: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
        }
    }
}
