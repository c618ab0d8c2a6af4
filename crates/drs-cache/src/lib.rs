pub use encoding::{decode_path, encode_path, oid_file_name};
pub use entry::{
    check_external_url_mismatch, stale_after, CacheState, OidEntry, PathEntry, Tombstone,
};
pub use error::CacheError;
pub use store::{PreCommitCache, DEFAULT_MAX_AGE};

mod encoding;
mod entry;
mod error;
mod store;
