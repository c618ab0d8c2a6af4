use base64::prelude::{Engine, BASE64_URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};

use crate::error::CacheError;

/// Encode a repo-relative path into a filesystem-safe file name.
///
/// Unpadded base64url keeps the mapping reversible for every byte string a
/// POSIX path can hold.
pub fn encode_path(path: &str) -> String {
    BASE64_URL_SAFE_NO_PAD.encode(path.as_bytes())
}

/// Exact inverse of [`encode_path`].
pub fn decode_path(encoded: &str) -> Result<String, CacheError> {
    let bytes = BASE64_URL_SAFE_NO_PAD
        .decode(encoded)
        .map_err(|_| CacheError::PathEncoding(encoded.to_string()))?;
    String::from_utf8(bytes).map_err(|_| CacheError::PathEncoding(encoded.to_string()))
}

/// File name for an OID entry.
///
/// Hashing tolerates LFS OIDs whose literal bytes are filesystem-unfriendly
/// (the `sha256:` prefix alone rules out NTFS).
pub fn oid_file_name(oid: &str) -> String {
    hex::encode(Sha256::digest(oid.as_bytes()))
}
