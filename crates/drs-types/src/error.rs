use thiserror::Error;

#[derive(Debug, Error)]
pub enum TypeError {
    #[error("invalid {kind} digest `{digest}`: expected {expected} hex characters")]
    ChecksumLength {
        kind: String,
        digest: String,
        expected: usize,
    },

    #[error("invalid {kind} digest `{digest}`: not a hex string")]
    ChecksumHex { kind: String, digest: String },

    #[error("unknown checksum kind `{0}`")]
    UnknownChecksumKind(String),

    #[error("invalid project id `{0}`: expected `<program>-<project>`")]
    InvalidProjectId(String),

    #[error("invalid s3 url `{0}`: must start with `s3://`")]
    InvalidS3Url(String),

    #[error("invalid sha256 `{0}`: expected 64 hex characters")]
    InvalidSha256(String),

    #[error("DRS object has an empty id")]
    EmptyId,

    #[error("DRS object `{id}` has no checksums")]
    NoChecksums { id: String },

    #[error("record `{did}` produces an access method for `{url}` without an authorization")]
    MissingAuthz { did: String, url: String },
}
