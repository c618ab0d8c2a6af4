use std::path::{Path, PathBuf};

use tokio::process::Command;
use tracing::trace;

use crate::error::GitError;

/// Hash of git's well-known empty tree; diffing against it enumerates every
/// path reachable from a commit.
const EMPTY_TREE: &str = "4b825dc642cb6eb9a060e54bf8d69288fbee4904";

/// One staged change, as reported by `git diff --cached --name-status -z`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StagedChange {
    Added(String),
    Modified(String),
    Deleted(String),
    Renamed { from: String, to: String },
}

/// A repository driven through the `git` binary.
#[derive(Debug, Clone)]
pub struct GitRepo {
    workdir: PathBuf,
}

impl GitRepo {
    pub fn open(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    async fn run(&self, args: &[&str]) -> Result<Vec<u8>, GitError> {
        let command = args.join(" ");
        trace!("git {command}");

        let output = Command::new("git")
            .args(args)
            .current_dir(&self.workdir)
            .output()
            .await
            .map_err(|source| GitError::Spawn {
                command: command.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(GitError::Command {
                command,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output.stdout)
    }

    async fn run_utf8(&self, args: &[&str]) -> Result<String, GitError> {
        let stdout = self.run(args).await?;
        String::from_utf8(stdout).map_err(|_| GitError::Utf8 {
            command: args.join(" "),
        })
    }

    /// Absolute path of the repository's git directory.
    pub async fn git_dir(&self) -> Result<PathBuf, GitError> {
        let output = self.run_utf8(&["rev-parse", "--git-dir"]).await?;
        let dir = PathBuf::from(output.trim());
        Ok(if dir.is_absolute() {
            dir
        } else {
            self.workdir.join(dir)
        })
    }

    /// The current HEAD commit, or `None` in an unborn repository.
    pub async fn head_commit(&self) -> Option<String> {
        self.run_utf8(&["rev-parse", "HEAD"])
            .await
            .ok()
            .map(|sha| sha.trim().to_string())
    }

    /// Enumerate staged changes.
    pub async fn staged_changes(&self) -> Result<Vec<StagedChange>, GitError> {
        let raw = self
            .run_utf8(&["diff", "--cached", "--name-status", "-z"])
            .await?;
        parse_name_status(&raw)
    }

    /// Content of the staged blob for `path` (index stage 0).
    pub async fn staged_blob(&self, path: &str) -> Result<String, GitError> {
        self.run_utf8(&["cat-file", "blob", &format!(":0:{path}")])
            .await
    }

    /// Content of the blob at `commit:path`.
    pub async fn blob_at(&self, commit: &str, path: &str) -> Result<String, GitError> {
        self.run_utf8(&["cat-file", "blob", &format!("{commit}:{path}")])
            .await
    }

    /// Paths touched in `remote_sha..local_sha`. An all-zero remote (a new
    /// ref) diffs against the empty tree instead.
    pub async fn changed_paths(
        &self,
        remote_sha: &str,
        local_sha: &str,
    ) -> Result<Vec<String>, GitError> {
        let base = if remote_sha.bytes().all(|b| b == b'0') {
            EMPTY_TREE
        } else {
            remote_sha
        };
        let raw = self
            .run_utf8(&["diff", "--name-only", "-z", &format!("{base}..{local_sha}")])
            .await?;
        Ok(raw
            .split('\0')
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Whether `path` is tracked by the LFS filter per `.gitattributes`.
    pub async fn is_lfs_tracked(&self, path: &str) -> Result<bool, GitError> {
        let raw = self
            .run_utf8(&["check-attr", "filter", "-z", "--", path])
            .await?;
        Ok(parse_check_attr(&raw).as_deref() == Some("lfs"))
    }
}

/// Parse `git diff --name-status -z` output. Copies count as adds of the
/// destination; typechanges as modifications.
fn parse_name_status(raw: &str) -> Result<Vec<StagedChange>, GitError> {
    let mut fields = raw.split('\0').filter(|f| !f.is_empty());
    let mut changes = Vec::new();

    while let Some(status) = fields.next() {
        let mut next_path = || {
            fields
                .next()
                .map(str::to_string)
                .ok_or_else(|| GitError::UnknownStatus {
                    status: status.to_string(),
                    path: String::new(),
                })
        };

        match status.as_bytes().first() {
            Some(b'A') => changes.push(StagedChange::Added(next_path()?)),
            Some(b'M' | b'T') => changes.push(StagedChange::Modified(next_path()?)),
            Some(b'D') => changes.push(StagedChange::Deleted(next_path()?)),
            Some(b'R') => {
                let from = next_path()?;
                let to = next_path()?;
                changes.push(StagedChange::Renamed { from, to });
            }
            Some(b'C') => {
                let _source = next_path()?;
                changes.push(StagedChange::Added(next_path()?));
            }
            _ => {
                return Err(GitError::UnknownStatus {
                    status: status.to_string(),
                    path: next_path().unwrap_or_default(),
                })
            }
        }
    }

    Ok(changes)
}

/// Extract the attribute value from `git check-attr <attr> -z` output:
/// `<path> NUL <attr> NUL <value> NUL`. `unspecified` means not set.
fn parse_check_attr(raw: &str) -> Option<String> {
    let value = raw.split('\0').nth(2)?;
    if value.is_empty() || value == "unspecified" || value == "unset" {
        None
    } else {
        Some(value.to_string())
    }
}
