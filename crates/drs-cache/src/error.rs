use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("failed to decode cache entry {}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("`{0}` is not a valid encoded path name")]
    PathEncoding(String),

    #[error("cache entry for `{entry}` has an invalid timestamp `{timestamp}`")]
    Timestamp { entry: String, timestamp: String },

    #[error("cached external URL `{cached}` contradicts the authoritative `{authoritative}`")]
    UrlMismatch {
        cached: String,
        authoritative: String,
    },
}
