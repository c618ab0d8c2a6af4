use std::fmt::Write;

use anyhow::Result;
use tracing::{debug, warn};

use drs_cache::PreCommitCache;
use drs_git::{GitRepo, LfsPointer, StagedChange};

use crate::commands::ExitStatus;
use crate::printer::Printer;

/// Mirror the staged LFS pointers into the hook cache so pre-push can run
/// without re-scanning them. No network I/O happens here.
pub(crate) async fn pre_commit(mut printer: Printer) -> Result<ExitStatus> {
    let repo = GitRepo::open(std::env::current_dir()?);
    let cache = PreCommitCache::open(repo.git_dir().await?);

    let mut cached = 0usize;
    for change in repo.staged_changes().await? {
        match change {
            StagedChange::Added(path) | StagedChange::Modified(path) => {
                cached += usize::from(upsert_pointer(&repo, &cache, &path).await?);
            }
            StagedChange::Deleted(path) => {
                cache.delete(&path)?;
            }
            StagedChange::Renamed { from, to } => {
                cache.delete(&from)?;
                cached += usize::from(upsert_pointer(&repo, &cache, &to).await?);
            }
        }
    }

    cache.write_state(repo.head_commit().await)?;
    writeln!(printer, "Cached {cached} staged LFS object(s)")?;
    Ok(ExitStatus::Success)
}

/// Cache one staged path if it holds an LFS pointer. Untracked paths and
/// non-pointer blobs are skipped quietly.
async fn upsert_pointer(
    repo: &GitRepo,
    cache: &PreCommitCache,
    path: &str,
) -> Result<bool> {
    if !repo.is_lfs_tracked(path).await? {
        debug!("{path} is not LFS-tracked; skipping");
        return Ok(false);
    }

    let blob = match repo.staged_blob(path).await {
        Ok(blob) => blob,
        Err(err) => {
            warn!("could not read the staged blob for {path}: {err}");
            return Ok(false);
        }
    };

    match LfsPointer::parse(path, &blob) {
        Ok(pointer) => {
            cache.upsert(path, &pointer.oid, None)?;
            Ok(true)
        }
        Err(err) => {
            warn!("{path} is LFS-tracked but not a pointer: {err}");
            Ok(false)
        }
    }
}
