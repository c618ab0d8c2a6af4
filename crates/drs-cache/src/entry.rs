use std::time::Duration;

use jiff::{SignedDuration, Timestamp};
use serde::{Deserialize, Serialize};

use crate::error::CacheError;

/// One cached path → OID binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathEntry {
    pub path: String,
    pub lfs_oid: String,
    pub updated_at: String,
}

impl PathEntry {
    pub fn updated_at(&self) -> Result<Timestamp, CacheError> {
        parse_timestamp(&self.path, &self.updated_at)
    }

    pub fn is_stale(&self, max_age: Duration) -> bool {
        stale_after(&self.updated_at, max_age)
    }
}

/// The reverse side: one OID and every path currently pointing at it, plus
/// an optional hint at where the bytes live externally.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OidEntry {
    pub lfs_oid: String,
    #[serde(default)]
    pub paths: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_url: Option<String>,
    pub updated_at: String,
    /// Set when a path re-pointed to this OID from a different one.
    #[serde(default)]
    pub content_changed: bool,
}

/// Deletion record kept for later reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tombstone {
    pub path: String,
    pub deleted_at: String,
}

/// Cache-wide state written at hook completion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub head_commit: Option<String>,
    pub updated_at: String,
}

/// Whether a timestamp is older than `max_age`.
///
/// Unparseable timestamps are NOT stale; callers that care surface them as
/// parse errors instead.
pub fn stale_after(timestamp: &str, max_age: Duration) -> bool {
    let Ok(parsed) = timestamp.parse::<Timestamp>() else {
        return false;
    };
    let Ok(max_age) = SignedDuration::try_from(max_age) else {
        return false;
    };
    Timestamp::now().duration_since(parsed) > max_age
}

/// A cached URL hint only contradicts the authoritative value when both are
/// present and differ; an empty side is merely missing.
pub fn check_external_url_mismatch(hint: &str, authoritative: &str) -> Result<(), CacheError> {
    if hint.is_empty() || authoritative.is_empty() || hint == authoritative {
        Ok(())
    } else {
        Err(CacheError::UrlMismatch {
            cached: hint.to_string(),
            authoritative: authoritative.to_string(),
        })
    }
}

fn parse_timestamp(entry: &str, timestamp: &str) -> Result<Timestamp, CacheError> {
    timestamp
        .parse()
        .map_err(|_| CacheError::Timestamp {
            entry: entry.to_string(),
            timestamp: timestamp.to_string(),
        })
}
