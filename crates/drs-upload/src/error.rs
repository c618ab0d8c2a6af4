use thiserror::Error;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error(transparent)]
    Types(#[from] drs_types::TypeError),

    #[error(transparent)]
    Client(#[from] drs_client::ClientError),

    #[error(transparent)]
    Git(#[from] drs_git::GitError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    UrlParse(#[from] url::ParseError),

    #[error(transparent)]
    Request(#[from] reqwest::Error),

    #[error(transparent)]
    Middleware(#[from] reqwest_middleware::Error),

    #[error(
        "`{path}` is not tracked by Git LFS; add a line like `{path} filter=lfs diff=lfs merge=lfs -text` to .gitattributes and re-stage the file"
    )]
    NotLfsTracked { path: String },

    #[error("bucket `{bucket}` does not accept uploads for program `{program}`")]
    BucketProgramMismatch { bucket: String, program: String },

    #[error("missing AWS configuration:\n{}", .0.join("\n"))]
    MissingAwsConfig(Vec<String>),

    #[error("HEAD s3://{bucket}/{key} failed: {message}")]
    Head {
        bucket: String,
        key: String,
        message: String,
    },

    #[error("`{path}` does not exist locally; nothing to upload")]
    LocalFileMissing { path: String },

    #[error("{endpoint} returned {status}: {body}")]
    Fence {
        endpoint: String,
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("unexpected JSON from {endpoint}")]
    FenceDecode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("part {part_number} upload returned {status}: {body}")]
    PartFailed {
        part_number: u64,
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("part {part_number} response carried no ETag")]
    MissingEtag { part_number: u64 },

    #[error("single-shot upload returned {status}: {body}")]
    PutFailed {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("upload cancelled")]
    Cancelled,
}
