use std::io::SeekFrom;
use std::path::Path;
use std::sync::Arc;

use futures::StreamExt;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;

use crate::error::UploadError;

/// Byte-granular upload progress. Implementations must tolerate calls from
/// multiple worker tasks; the counter is monotonic.
pub trait Reporter: Send + Sync {
    fn on_upload_progress(&self, bytes: u64);

    fn on_upload_complete(&self) {}
}

/// Reporter that swallows everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn on_upload_progress(&self, _bytes: u64) {}
}

/// Stream `len` bytes of `path` starting at `offset`, reporting each chunk as
/// it is read. The result feeds straight into a request body.
pub(crate) async fn file_body(
    path: &Path,
    offset: u64,
    len: u64,
    reporter: Arc<dyn Reporter>,
) -> Result<reqwest::Body, UploadError> {
    let mut file = tokio::fs::File::open(path).await?;
    file.seek(SeekFrom::Start(offset)).await?;

    let stream = ReaderStream::new(file.take(len)).map(move |chunk| {
        if let Ok(chunk) = &chunk {
            reporter.on_upload_progress(chunk.len() as u64);
        }
        chunk
    });
    Ok(reqwest::Body::wrap_stream(stream))
}
