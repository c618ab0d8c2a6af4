use thiserror::Error;

#[derive(Debug, Error)]
pub enum GitError {
    #[error("failed to run git {command}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("git {command} failed: {stderr}")]
    Command { command: String, stderr: String },

    #[error("git produced non-UTF-8 output for {command}")]
    Utf8 { command: String },

    #[error("`{path}` is not an LFS pointer: {reason}")]
    NotAPointer { path: String, reason: String },

    #[error("malformed pre-push ref line `{0}`")]
    MalformedRefLine(String),

    #[error("unrecognized status letter `{status}` in staged change `{path}`")]
    UnknownStatus { status: String, path: String },

    #[error(transparent)]
    Cache(#[from] drs_cache::CacheError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
