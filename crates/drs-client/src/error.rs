use std::fmt;

use reqwest::StatusCode;
use thiserror::Error;

/// Substring indexd uses to signal a duplicate registration. Responses
/// carrying it are terminal regardless of status class.
pub(crate) const ALREADY_EXISTS: &str = "already exists";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    UrlParse(#[from] url::ParseError),

    #[error(transparent)]
    Request(#[from] reqwest::Error),

    #[error(transparent)]
    Middleware(#[from] reqwest_middleware::Error),

    #[error(transparent)]
    Types(#[from] drs_types::TypeError),

    #[error("received unexpected JSON from {url}")]
    BadJson {
        source: serde_json::Error,
        url: String,
    },

    #[error("no DRS object `{did}` exists on the server")]
    NotFound { did: String },

    #[error("record already exists: {0}")]
    AlreadyExists(String),

    #[error("record `{did}` carries no rev; cannot update or delete it")]
    MissingRev { did: String },

    #[error("no matching record found for project {project} (oid {oid})")]
    NoMatchingRecord { project: String, oid: String },

    #[error("DRS object `{did}` has no access methods")]
    NoAccessMethods { did: String },

    #[error("DRS object `{did}` has an access method without a type")]
    EmptyAccessType { did: String },

    #[error("server returned an empty download URL for `{did}`")]
    EmptyAccessUrl { did: String },

    #[error("server returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("listing completed with decode errors: {0}")]
    Partial(MultiError),
}

impl ClientError {
    /// Classify a non-success response, preserving the `already exists`
    /// business error verbatim.
    pub(crate) fn from_response(status: StatusCode, body: String) -> Self {
        if body.contains(ALREADY_EXISTS) {
            Self::AlreadyExists(body)
        } else {
            Self::Status { status, body }
        }
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists(_))
    }

    pub fn from_json_err(err: serde_json::Error, url: impl Into<String>) -> Self {
        Self::BadJson {
            source: err,
            url: url.into(),
        }
    }
}

/// Decode failures accumulated across a paginated listing, surfaced as the
/// stream's final item.
#[derive(Debug)]
pub struct MultiError(pub Vec<ClientError>);

impl fmt::Display for MultiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error(s)", self.0.len())?;
        for err in &self.0 {
            write!(f, "; {err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for MultiError {}
