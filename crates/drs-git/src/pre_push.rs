use std::collections::BTreeSet;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};

use drs_cache::PreCommitCache;

use crate::error::GitError;
use crate::pointer::LfsPointer;
use crate::repo::GitRepo;

/// One line of the pre-push refs stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefSpec {
    pub local_ref: String,
    pub local_sha: String,
    pub remote_ref: String,
    pub remote_sha: String,
}

impl RefSpec {
    pub fn parse(line: &str) -> Result<Self, GitError> {
        let mut fields = line.split_whitespace();
        let spec = Self {
            local_ref: fields.next().unwrap_or_default().to_string(),
            local_sha: fields.next().unwrap_or_default().to_string(),
            remote_ref: fields.next().unwrap_or_default().to_string(),
            remote_sha: fields.next().unwrap_or_default().to_string(),
        };
        if spec.remote_sha.is_empty() || fields.next().is_some() {
            return Err(GitError::MalformedRefLine(line.to_string()));
        }
        Ok(spec)
    }

    /// Parse the whole stdin stream, skipping blank lines.
    pub fn parse_stream(input: &str) -> Result<Vec<Self>, GitError> {
        input
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(Self::parse)
            .collect()
    }

    /// A push that deletes the remote ref carries an all-zero local sha and
    /// nothing to upload.
    pub fn is_delete(&self) -> bool {
        self.local_sha.bytes().all(|b| b == b'0')
    }
}

/// One object the push needs present on the remote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushItem {
    pub path: String,
    pub oid: String,
    pub oid_type: String,
    pub size: u64,
}

/// Resolve the LFS objects a push needs, consulting the pre-commit cache
/// first and falling back to reading pointers out of the pushed commits when
/// an entry is missing or stale.
pub async fn plan_push(
    repo: &GitRepo,
    cache: &PreCommitCache,
    refs: &[RefSpec],
    max_age: Duration,
) -> Result<Vec<PushItem>, GitError> {
    match cache.read_state() {
        Ok(Some(state)) if state.head_commit.is_some() => {}
        Ok(_) => warn!("pre-commit cache has no recorded HEAD; expect slow pointer scans"),
        Err(err) => warn!("unreadable cache state: {err}"),
    }

    let mut seen = BTreeSet::new();
    let mut plan = Vec::new();

    for spec in refs {
        if spec.is_delete() {
            continue;
        }

        for path in repo.changed_paths(&spec.remote_sha, &spec.local_sha).await? {
            if !seen.insert(path.clone()) {
                continue;
            }
            if let Some(item) = resolve_path(repo, cache, &spec.local_sha, &path, max_age).await? {
                plan.push(item);
            }
        }
    }

    Ok(plan)
}

async fn resolve_path(
    repo: &GitRepo,
    cache: &PreCommitCache,
    local_sha: &str,
    path: &str,
    max_age: Duration,
) -> Result<Option<PushItem>, GitError> {
    let cached = cache.path_entry(path)?;

    let (oid, pointer_size) = match cached {
        Some(entry) if !entry.is_stale(max_age) => (entry.lfs_oid, None),
        stale => {
            if stale.is_some() {
                debug!("cache entry for {path} is stale; re-reading the pointer");
            }
            // The working tree holds smudged content; the pointer lives in
            // the pushed commit.
            match repo.blob_at(local_sha, path).await {
                Ok(blob) => match LfsPointer::parse(path, &blob) {
                    Ok(pointer) => (pointer.oid.clone(), Some(pointer.size)),
                    Err(_) => return Ok(None),
                },
                // Binary blobs and vanished paths are simply not LFS pointers.
                Err(GitError::Utf8 { .. } | GitError::Command { .. }) => return Ok(None),
                Err(err) => return Err(err),
            }
        }
    };

    let size = match fs_err::metadata(repo.workdir().join(path)) {
        Ok(metadata) => metadata.len(),
        Err(_) => match pointer_size {
            Some(size) => size,
            None => match repo.blob_at(local_sha, path).await {
                Ok(blob) => LfsPointer::parse(path, &blob).map(|p| p.size).unwrap_or(0),
                Err(_) => 0,
            },
        },
    };

    let oid = oid.strip_prefix("sha256:").unwrap_or(&oid).to_string();
    Ok(Some(PushItem {
        path: path.to_string(),
        oid,
        oid_type: "sha256".to_string(),
        size,
    }))
}
