pub use error::UploadError;
pub use multipart::{chunk_size, MultipartConfig, DEFAULT_MAX_CONCURRENT_UPLOADS};
pub use pipeline::{add_url, AddUrlOptions, AddUrlReport, DEFAULT_MULTIPART_THRESHOLD};
pub use progress::{NullReporter, Reporter};
pub use s3::{parse_s3_url, S3Options};

mod error;
mod fence;
mod multipart;
mod pipeline;
mod progress;
mod s3;
