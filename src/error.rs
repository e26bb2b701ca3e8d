use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("source unavailable: {url}: {reason}")]
    SourceUnavailable { url: String, reason: String },

    #[error("malformed row {row}: missing {missing}")]
    MalformedRow { row: usize, missing: &'static str },

    /// Component names a food code that is not in storage.
    #[error("component references unknown food {food_code}")]
    OrphanComponent { food_code: String },

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl HarvestError {
    pub fn source_unavailable(url: &str, reason: impl ToString) -> Self {
        HarvestError::SourceUnavailable {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, HarvestError>;
