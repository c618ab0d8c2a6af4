use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// The closed set of checksum algorithms indexd records carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumKind {
    Md5,
    Sha1,
    Sha256,
    Sha512,
    Crc32c,
    Etag,
}

impl ChecksumKind {
    /// Expected digest length in hex characters, if the kind has a fixed one.
    ///
    /// S3 ETags of multipart uploads carry a `-<parts>` suffix, so `etag`
    /// digests are only checked for a hex prefix, not a length.
    pub fn digest_len(self) -> Option<usize> {
        match self {
            ChecksumKind::Md5 => Some(32),
            ChecksumKind::Sha1 => Some(40),
            ChecksumKind::Sha256 => Some(64),
            ChecksumKind::Sha512 => Some(128),
            ChecksumKind::Crc32c => Some(8),
            ChecksumKind::Etag => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ChecksumKind::Md5 => "md5",
            ChecksumKind::Sha1 => "sha1",
            ChecksumKind::Sha256 => "sha256",
            ChecksumKind::Sha512 => "sha512",
            ChecksumKind::Crc32c => "crc32c",
            ChecksumKind::Etag => "etag",
        }
    }
}

impl fmt::Display for ChecksumKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChecksumKind {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "md5" => Ok(ChecksumKind::Md5),
            "sha1" => Ok(ChecksumKind::Sha1),
            "sha256" => Ok(ChecksumKind::Sha256),
            "sha512" => Ok(ChecksumKind::Sha512),
            "crc32c" => Ok(ChecksumKind::Crc32c),
            "etag" => Ok(ChecksumKind::Etag),
            _ => Err(TypeError::UnknownChecksumKind(s.to_string())),
        }
    }
}

/// A tagged digest in its single canonical representation: lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Checksum {
    #[serde(rename = "type")]
    pub kind: ChecksumKind,
    pub checksum: String,
}

impl Checksum {
    /// Canonicalize and validate a digest for the given kind.
    pub fn new(kind: ChecksumKind, digest: &str) -> Result<Self, TypeError> {
        let digest = digest.to_ascii_lowercase();

        if let Some(expected) = kind.digest_len() {
            if digest.len() != expected {
                return Err(TypeError::ChecksumLength {
                    kind: kind.to_string(),
                    digest,
                    expected,
                });
            }
        }

        // ETags may carry a `-<parts>` suffix; everything before it must decode.
        let hex_part = digest.split('-').next().unwrap_or(&digest);
        if hex::decode(hex_part).is_err() {
            return Err(TypeError::ChecksumHex {
                kind: kind.to_string(),
                digest,
            });
        }

        Ok(Self {
            kind,
            checksum: digest,
        })
    }

    pub fn sha256(digest: &str) -> Result<Self, TypeError> {
        Self::new(ChecksumKind::Sha256, digest)
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.checksum)
    }
}
