use std::path::Path;
use std::sync::{Arc, Mutex};

use reqwest::header::{CONTENT_LENGTH, ETAG};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use drs_client::IndexdClient;

use crate::error::UploadError;
use crate::fence::{self, CompletedPart};
use crate::progress::{file_body, Reporter};

const MIB: u64 = 1024 * 1024;

/// Files at or below this size use the fixed small chunk.
const SMALL_FILE_CUTOFF: u64 = 512 * MIB;
const SMALL_CHUNK: u64 = 32 * MIB;

/// Floor for the computed chunk of larger files.
const MIN_LARGE_CHUNK: u64 = 128 * MIB;

/// S3's hard cap on part count.
const MAX_PARTS: u64 = 10_000;

pub const DEFAULT_MAX_CONCURRENT_UPLOADS: usize = 4;

/// Pick the part size for a file: 32 MiB up to 512 MiB, then the smallest
/// MiB-aligned chunk that stays within the part-count cap.
pub fn chunk_size(size: u64) -> u64 {
    if size <= SMALL_FILE_CUTOFF {
        SMALL_CHUNK
    } else {
        let per_part = size.div_ceil(MAX_PARTS).max(MIN_LARGE_CHUNK);
        per_part.div_ceil(MIB) * MIB
    }
}

/// Knobs for the bounded-concurrency uploader.
#[derive(Debug, Clone)]
pub struct MultipartConfig {
    pub max_concurrent: usize,
    /// Test hook; production sizes come from [`chunk_size`].
    pub chunk_override: Option<u64>,
}

impl Default for MultipartConfig {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_MAX_CONCURRENT_UPLOADS,
            chunk_override: None,
        }
    }
}

pub(crate) struct MultipartUpload<'a> {
    pub(crate) client: &'a IndexdClient,
    pub(crate) file: &'a Path,
    pub(crate) bucket: &'a str,
    pub(crate) guid: &'a str,
    pub(crate) file_name: &'a str,
    pub(crate) size: u64,
}

/// Upload a file in parts: a producer enqueues part numbers into a bounded
/// channel, a fixed worker pool drains it, and completion sorts the captured
/// ETags by part number. The first error cancels outstanding work and is
/// returned once the pool settles.
#[instrument(skip_all, fields(file = %upload.file.display(), size = upload.size))]
pub(crate) async fn upload_multipart(
    upload: MultipartUpload<'_>,
    config: &MultipartConfig,
    reporter: Arc<dyn Reporter>,
) -> Result<(), UploadError> {
    let key = format!("{}/{}", upload.guid, upload.file_name);
    let init = fence::init_multipart(upload.client, &key, upload.bucket).await?;
    debug!("multipart upload {} started for {}", init.upload_id, init.guid);

    let chunk = config.chunk_override.unwrap_or_else(|| chunk_size(upload.size));
    let parts = upload.size.div_ceil(chunk).max(1);

    let (tx, rx) = mpsc::channel::<u64>(config.max_concurrent.max(1) * 2);
    let rx = Arc::new(tokio::sync::Mutex::new(rx));
    let cancel = CancellationToken::new();
    let completed: Arc<Mutex<Vec<CompletedPart>>> = Arc::new(Mutex::new(Vec::new()));
    let errors: Arc<Mutex<Vec<UploadError>>> = Arc::new(Mutex::new(Vec::new()));

    let mut workers = JoinSet::new();
    for _ in 0..config.max_concurrent.max(1) {
        let rx = Arc::clone(&rx);
        let cancel = cancel.clone();
        let completed = Arc::clone(&completed);
        let errors = Arc::clone(&errors);
        let reporter = Arc::clone(&reporter);
        let client = upload.client.clone();
        let key = key.clone();
        let upload_id = init.upload_id.clone();
        let bucket = upload.bucket.to_string();
        let file = upload.file.to_path_buf();
        let size = upload.size;

        workers.spawn(async move {
            loop {
                let part_number = { rx.lock().await.recv().await };
                let Some(part_number) = part_number else { break };
                if cancel.is_cancelled() {
                    break;
                }

                let offset = (part_number - 1) * chunk;
                let len = chunk.min(size - offset);

                let result = tokio::select! {
                    () = cancel.cancelled() => Err(UploadError::Cancelled),
                    result = upload_part(
                        &client, &key, &upload_id, part_number, &bucket,
                        &file, offset, len, Arc::clone(&reporter),
                    ) => result,
                };

                match result {
                    Ok(part) => completed.lock().expect("poisoned").push(part),
                    Err(err) => {
                        errors.lock().expect("poisoned").push(err);
                        cancel.cancel();
                        break;
                    }
                }
            }
        });
    }

    for part_number in 1..=parts {
        if cancel.is_cancelled() || tx.send(part_number).await.is_err() {
            break;
        }
    }
    drop(tx);

    while workers.join_next().await.is_some() {}

    let mut errors = errors.lock().expect("poisoned");
    if !errors.is_empty() {
        return Err(errors.remove(0));
    }

    let mut parts = completed.lock().expect("poisoned").clone();
    parts.sort_by_key(|part| part.part_number);
    fence::complete_multipart(upload.client, &key, &init.upload_id, &parts, upload.bucket).await?;

    reporter.on_upload_complete();
    debug!("multipart upload {} completed with {} parts", init.upload_id, parts.len());
    Ok(())
}

async fn upload_part(
    client: &IndexdClient,
    key: &str,
    upload_id: &str,
    part_number: u64,
    bucket: &str,
    file: &Path,
    offset: u64,
    len: u64,
    reporter: Arc<dyn Reporter>,
) -> Result<CompletedPart, UploadError> {
    let presigned = fence::part_upload_url(client, key, upload_id, part_number, bucket).await?;

    let body = file_body(file, offset, len, reporter).await?;
    let response = client
        .raw_client()
        .put(&presigned)
        .header(CONTENT_LENGTH, len)
        .body(body)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        return Err(UploadError::PartFailed {
            part_number,
            status,
            body: response.text().await.unwrap_or_default(),
        });
    }

    let etag = response
        .headers()
        .get(ETAG)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim_matches('"').to_string())
        .ok_or(UploadError::MissingEtag { part_number })?;

    Ok(CompletedPart { part_number, etag })
}
