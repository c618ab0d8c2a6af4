use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use fs_err as fs;
use jiff::Timestamp;
use lru::LruCache;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::encoding::{encode_path, oid_file_name};
use crate::entry::{CacheState, OidEntry, PathEntry, Tombstone};
use crate::error::CacheError;

/// Entries older than this are treated as potentially stale.
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);

const PATH_HOT_CAPACITY: usize = 10_000;
const OID_HOT_CAPACITY: usize = 1_000;

/// The two-sided path ↔ OID index under `<gitdir>/drs/pre-commit/v1/`.
///
/// Reads miss through the bounded hot layer to disk; writes update both
/// layers and land via tmp-file + rename. Concurrent hook processes are
/// tolerated with last-writer-wins at file granularity.
#[derive(Debug)]
pub struct PreCommitCache {
    root: PathBuf,
    paths_hot: Mutex<LruCache<String, PathEntry>>,
    oids_hot: Mutex<LruCache<String, OidEntry>>,
}

impl PreCommitCache {
    /// Open the cache rooted in the given git directory. Directories are
    /// created lazily on first write.
    pub fn open(git_dir: impl Into<PathBuf>) -> Self {
        let root = git_dir.into().join("drs").join("pre-commit").join("v1");
        Self {
            root,
            paths_hot: Mutex::new(LruCache::new(
                NonZeroUsize::new(PATH_HOT_CAPACITY).expect("capacity is nonzero"),
            )),
            oids_hot: Mutex::new(LruCache::new(
                NonZeroUsize::new(OID_HOT_CAPACITY).expect("capacity is nonzero"),
            )),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_file(&self, path: &str) -> PathBuf {
        self.root
            .join("paths")
            .join(format!("{}.json", encode_path(path)))
    }

    fn oid_file(&self, oid: &str) -> PathBuf {
        self.root
            .join("oids")
            .join(format!("{}.json", oid_file_name(oid)))
    }

    fn tombstone_file(&self, path: &str) -> PathBuf {
        self.root
            .join("tombstones")
            .join(format!("{}.json", encode_path(path)))
    }

    fn state_file(&self) -> PathBuf {
        self.root.join("state.json")
    }

    /// Look up the entry for a repo-relative path.
    pub fn path_entry(&self, path: &str) -> Result<Option<PathEntry>, CacheError> {
        let path = normalize(path);
        if let Some(entry) = self.paths_hot.lock().expect("poisoned").get(&path) {
            return Ok(Some(entry.clone()));
        }

        let entry: Option<PathEntry> = read_json(&self.path_file(&path))?;
        if let Some(entry) = &entry {
            self.paths_hot
                .lock()
                .expect("poisoned")
                .put(path, entry.clone());
        }
        Ok(entry)
    }

    /// Look up the entry for an LFS OID.
    pub fn oid_entry(&self, oid: &str) -> Result<Option<OidEntry>, CacheError> {
        if let Some(entry) = self.oids_hot.lock().expect("poisoned").get(oid) {
            return Ok(Some(entry.clone()));
        }

        let entry: Option<OidEntry> = read_json(&self.oid_file(oid))?;
        if let Some(entry) = &entry {
            self.oids_hot
                .lock()
                .expect("poisoned")
                .put(oid.to_string(), entry.clone());
        }
        Ok(entry)
    }

    /// Bind `path` to `new_oid`, unlinking it from its previous OID entry
    /// when the pointer moved.
    pub fn upsert(
        &self,
        path: &str,
        new_oid: &str,
        external_url: Option<&str>,
    ) -> Result<(), CacheError> {
        let path = normalize(path);
        let now = Timestamp::now().to_string();

        let old_oid = self
            .path_entry(&path)?
            .map(|entry| entry.lfs_oid)
            .unwrap_or_default();

        let path_entry = PathEntry {
            path: path.clone(),
            lfs_oid: new_oid.to_string(),
            updated_at: now.clone(),
        };
        self.write_path_entry(&path_entry)?;

        let oid_moved = !old_oid.is_empty() && old_oid != new_oid;

        let mut oid_entry = self.oid_entry(new_oid)?.unwrap_or_else(|| OidEntry {
            lfs_oid: new_oid.to_string(),
            ..Default::default()
        });
        if !oid_entry.paths.iter().any(|p| *p == path) {
            oid_entry.paths.push(path.clone());
        }
        oid_entry.content_changed = oid_entry.content_changed || oid_moved;
        if let Some(url) = external_url.filter(|u| !u.is_empty()) {
            oid_entry.external_url = Some(url.to_string());
        }
        oid_entry.updated_at = now.clone();
        self.write_oid_entry(&oid_entry)?;

        if oid_moved {
            if let Some(mut previous) = self.oid_entry(&old_oid)? {
                previous.paths.retain(|p| *p != path);
                previous.updated_at = now;
                self.write_oid_entry(&previous)?;
            }
        }

        debug!("cached {path} -> {new_oid}");
        Ok(())
    }

    /// Drop `path` from the cache, leaving a tombstone behind.
    pub fn delete(&self, path: &str) -> Result<(), CacheError> {
        let path = normalize(path);
        let Some(entry) = self.path_entry(&path)? else {
            return Ok(());
        };
        let now = Timestamp::now().to_string();

        fs::remove_file(self.path_file(&path))?;
        self.paths_hot.lock().expect("poisoned").pop(&path);

        if let Some(mut oid_entry) = self.oid_entry(&entry.lfs_oid)? {
            oid_entry.paths.retain(|p| *p != path);
            oid_entry.updated_at = now.clone();
            self.write_oid_entry(&oid_entry)?;
        }

        let tombstone = Tombstone {
            path: path.clone(),
            deleted_at: now,
        };
        write_atomic(&self.tombstone_file(&path), &tombstone)?;

        debug!("evicted {path}");
        Ok(())
    }

    pub fn tombstone(&self, path: &str) -> Result<Option<Tombstone>, CacheError> {
        read_json(&self.tombstone_file(&normalize(path)))
    }

    /// Stamp the cache-wide state; called once at hook completion.
    pub fn write_state(&self, head_commit: Option<String>) -> Result<(), CacheError> {
        let state = CacheState {
            head_commit,
            updated_at: Timestamp::now().to_string(),
        };
        write_atomic(&self.state_file(), &state)
    }

    pub fn read_state(&self) -> Result<Option<CacheState>, CacheError> {
        read_json(&self.state_file())
    }

    fn write_path_entry(&self, entry: &PathEntry) -> Result<(), CacheError> {
        write_atomic(&self.path_file(&entry.path), entry)?;
        self.paths_hot
            .lock()
            .expect("poisoned")
            .put(entry.path.clone(), entry.clone());
        Ok(())
    }

    fn write_oid_entry(&self, entry: &OidEntry) -> Result<(), CacheError> {
        write_atomic(&self.oid_file(&entry.lfs_oid), entry)?;
        self.oids_hot
            .lock()
            .expect("poisoned")
            .put(entry.lfs_oid.clone(), entry.clone());
        Ok(())
    }
}

fn normalize(path: &str) -> String {
    path.replace('\\', "/")
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, CacheError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    serde_json::from_str(&contents)
        .map(Some)
        .map_err(|source| CacheError::Json {
            path: path.to_path_buf(),
            source,
        })
}

/// Serialize to `<target>.tmp` and rename over the target.
fn write_atomic<T: Serialize>(target: &Path, value: &T) -> Result<(), CacheError> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = target.with_extension("json.tmp");
    let contents = serde_json::to_vec_pretty(value).map_err(|source| CacheError::Json {
        path: target.to_path_buf(),
        source,
    })?;
    fs::write(&tmp, contents)?;
    fs::rename(tmp, target)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const OID_ONE: &str = "sha256:1111111111111111111111111111111111111111111111111111111111111111";
    const OID_TWO: &str = "sha256:2222222222222222222222222222222222222222222222222222222222222222";

    fn cache() -> (tempfile::TempDir, PreCommitCache) {
        let dir = tempfile::tempdir().unwrap();
        let cache = PreCommitCache::open(dir.path());
        (dir, cache)
    }

    #[test]
    fn upsert_populates_both_sides() {
        let (_dir, cache) = cache();
        cache.upsert("data/foo.bin", OID_ONE, None).unwrap();

        let entry = cache.path_entry("data/foo.bin").unwrap().unwrap();
        assert_eq!(entry.lfs_oid, OID_ONE);

        let oid = cache.oid_entry(OID_ONE).unwrap().unwrap();
        assert!(oid.paths.contains(&"data/foo.bin".to_string()));
        assert!(!oid.content_changed);
    }

    #[test]
    fn upsert_survives_a_cold_restart() {
        let dir = tempfile::tempdir().unwrap();
        PreCommitCache::open(dir.path())
            .upsert("data/foo.bin", OID_ONE, Some("s3://bucket/key"))
            .unwrap();

        // A fresh instance reads from disk, not the hot layer.
        let reopened = PreCommitCache::open(dir.path());
        let entry = reopened.path_entry("data/foo.bin").unwrap().unwrap();
        assert_eq!(entry.lfs_oid, OID_ONE);
        let oid = reopened.oid_entry(OID_ONE).unwrap().unwrap();
        assert_eq!(oid.external_url.as_deref(), Some("s3://bucket/key"));
    }

    #[test]
    fn repointing_a_path_unlinks_the_old_oid() {
        let (_dir, cache) = cache();
        cache.upsert("data/foo.bin", OID_ONE, None).unwrap();
        cache.upsert("data/foo.bin", OID_TWO, None).unwrap();

        let entry = cache.path_entry("data/foo.bin").unwrap().unwrap();
        assert_eq!(entry.lfs_oid, OID_TWO);

        let new_oid = cache.oid_entry(OID_TWO).unwrap().unwrap();
        assert!(new_oid.paths.contains(&"data/foo.bin".to_string()));
        assert!(new_oid.content_changed);

        let old_oid = cache.oid_entry(OID_ONE).unwrap().unwrap();
        assert!(!old_oid.paths.contains(&"data/foo.bin".to_string()));
    }

    #[test]
    fn upsert_is_idempotent_for_the_same_oid() {
        let (_dir, cache) = cache();
        cache.upsert("data/foo.bin", OID_ONE, None).unwrap();
        cache.upsert("data/foo.bin", OID_ONE, None).unwrap();

        let oid = cache.oid_entry(OID_ONE).unwrap().unwrap();
        assert_eq!(oid.paths, vec!["data/foo.bin"]);
        assert!(!oid.content_changed);
    }

    #[test]
    fn two_paths_can_share_one_oid() {
        let (_dir, cache) = cache();
        cache.upsert("data/foo.bin", OID_ONE, None).unwrap();
        cache.upsert("data/bar.bin", OID_ONE, None).unwrap();

        let oid = cache.oid_entry(OID_ONE).unwrap().unwrap();
        assert_eq!(oid.paths, vec!["data/foo.bin", "data/bar.bin"]);
    }

    #[test]
    fn delete_removes_the_entry_and_leaves_a_tombstone() {
        let (_dir, cache) = cache();
        cache.upsert("data/foo.bin", OID_TWO, None).unwrap();
        cache.delete("data/foo.bin").unwrap();

        assert!(cache.path_entry("data/foo.bin").unwrap().is_none());
        let oid = cache.oid_entry(OID_TWO).unwrap().unwrap();
        assert!(!oid.paths.contains(&"data/foo.bin".to_string()));
        assert!(cache.tombstone("data/foo.bin").unwrap().is_some());
    }

    #[test]
    fn deleting_an_unknown_path_is_a_no_op() {
        let (_dir, cache) = cache();
        cache.delete("never/seen.bin").unwrap();
        assert!(cache.tombstone("never/seen.bin").unwrap().is_none());
    }

    #[test]
    fn state_round_trips() {
        let (_dir, cache) = cache();
        assert!(cache.read_state().unwrap().is_none());
        cache.write_state(Some("abc123".into())).unwrap();
        let state = cache.read_state().unwrap().unwrap();
        assert_eq!(state.head_commit.as_deref(), Some("abc123"));
    }

    #[test]
    fn external_url_hint_is_kept_and_updated() {
        let (_dir, cache) = cache();
        cache.upsert("data/foo.bin", OID_ONE, None).unwrap();
        assert!(cache.oid_entry(OID_ONE).unwrap().unwrap().external_url.is_none());

        cache
            .upsert("data/foo.bin", OID_ONE, Some("s3://bucket/key"))
            .unwrap();
        assert_eq!(
            cache.oid_entry(OID_ONE).unwrap().unwrap().external_url.as_deref(),
            Some("s3://bucket/key")
        );
    }
}
