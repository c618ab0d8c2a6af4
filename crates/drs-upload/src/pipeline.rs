use std::path::Path;
use std::sync::Arc;

use indexmap::IndexMap;
use reqwest::header::{CONTENT_LENGTH, RANGE};
use tracing::{debug, info, warn};

use drs_client::{ClientError, IndexdClient};
use drs_git::GitRepo;
use drs_types::{
    object_guid, validate_inputs, AccessMethod, AccessUrl, Authorizations, ChecksumKind, Checksum,
    DrsObject, IndexdRecord,
};

use crate::error::UploadError;
use crate::fence;
use crate::multipart::{upload_multipart, MultipartConfig, MultipartUpload};
use crate::progress::{file_body, Reporter};
use crate::s3::{head_object, parse_s3_url, resolve_s3, S3Options};

const MIB: u64 = 1024 * 1024;

/// Default threshold above which uploads go multipart.
pub const DEFAULT_MULTIPART_THRESHOLD: u64 = 500 * MIB;

/// Inputs to the register-and-upload pipeline.
#[derive(Debug, Clone)]
pub struct AddUrlOptions {
    pub s3_url: String,
    pub sha256: String,
    pub s3: S3Options,
    pub multipart_threshold: u64,
    pub multipart: MultipartConfig,
    /// Delete and re-register when the server already holds the record.
    pub replace_on_conflict: bool,
}

/// What the pipeline ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddUrlReport {
    pub did: String,
    pub registered: bool,
    pub uploaded_bytes: u64,
}

/// Idempotently ensure an indexd record binds (project, sha256) to `s3_url`
/// and that the bytes are present in the bucket.
pub async fn add_url(
    client: &IndexdClient,
    repo: &GitRepo,
    options: &AddUrlOptions,
    reporter: Arc<dyn Reporter>,
) -> Result<AddUrlReport, UploadError> {
    validate_inputs(&options.s3_url, &options.sha256)?;
    let sha256 = options.sha256.to_ascii_lowercase();
    let (bucket, key) = parse_s3_url(&options.s3_url)?;

    if !repo.is_lfs_tracked(&key).await? {
        return Err(UploadError::NotLfsTracked { path: key });
    }

    // Bucket details feed the S3 settings; explicit options outrank them.
    let registry = client.get_buckets().await?;
    let detail = registry.s3_bucket(&bucket);
    if let Some(detail) = detail {
        let program = client.project().program();
        if !detail.programs.is_empty() && !detail.programs.iter().any(|p| p == program) {
            return Err(UploadError::BucketProgramMismatch {
                bucket,
                program: program.to_string(),
            });
        }
    }
    let resolved = resolve_s3(&options.s3, detail)?;

    let local_file = repo.workdir().join(&key);
    let head = head_object(&resolved, &bucket, &key).await?;
    let size = match &head {
        Some(head) => head.size,
        None => match fs_err::metadata(&local_file) {
            Ok(metadata) => metadata.len(),
            Err(_) => {
                return Err(UploadError::LocalFileMissing {
                    path: local_file.display().to_string(),
                })
            }
        },
    };

    let did = object_guid(client.project().as_str(), &sha256).to_string();
    let registered = upsert_record(client, options, &did, &key, &sha256, size).await?;

    // Skip the upload when the object is already retrievable.
    if probe_downloadable(client, &sha256).await {
        info!("{} is already downloadable; skipping upload", options.s3_url);
        return Ok(AddUrlReport {
            did,
            registered,
            uploaded_bytes: 0,
        });
    }

    if !local_file.exists() {
        return Err(UploadError::LocalFileMissing {
            path: local_file.display().to_string(),
        });
    }

    let file_name = key.rsplit('/').next().unwrap_or(&key).to_string();
    if size < options.multipart_threshold {
        single_shot_upload(
            client,
            &local_file,
            &did,
            &file_name,
            &bucket,
            size,
            Arc::clone(&reporter),
        )
        .await?;
    } else {
        upload_multipart(
            MultipartUpload {
                client,
                file: &local_file,
                bucket: &bucket,
                guid: &did,
                file_name: &file_name,
                size,
            },
            &options.multipart,
            Arc::clone(&reporter),
        )
        .await?;
    }

    Ok(AddUrlReport {
        did,
        registered,
        uploaded_bytes: size,
    })
}

/// Create-or-update the record. Returns whether a new record was created.
async fn upsert_record(
    client: &IndexdClient,
    options: &AddUrlOptions,
    did: &str,
    key: &str,
    sha256: &str,
    size: u64,
) -> Result<bool, UploadError> {
    let candidates = client
        .get_objects_by_hash(&Checksum::sha256(sha256)?)
        .await?;

    if let Some(existing) = candidates.iter().find(|c| c.id == did) {
        if existing.access_urls().any(|url| url == options.s3_url) {
            debug!("record {did} already carries {}", options.s3_url);
            return Ok(false);
        }

        let partial = DrsObject {
            id: did.to_string(),
            access_methods: vec![access_method(&options.s3_url, client)],
            ..Default::default()
        };
        client.update_record(&partial, did).await?;
        debug!("appended {} to record {did}", options.s3_url);
        return Ok(false);
    }

    let record = new_record(client, did, key, sha256, size, &options.s3_url);
    match client.register_record(record).await {
        Ok(_) => Ok(true),
        Err(err) if err.is_already_exists() => {
            if options.replace_on_conflict {
                warn!("record {did} exists; replacing it");
                client.delete_record(sha256).await?;
                let record = new_record(client, did, key, sha256, size, &options.s3_url);
                client.register_record(record).await?;
                Ok(true)
            } else {
                // Deterministic ids make registration idempotent; a
                // concurrent winner changes nothing for us.
                debug!("record {did} already registered elsewhere");
                Ok(false)
            }
        }
        Err(err) => Err(err.into()),
    }
}

fn new_record(
    client: &IndexdClient,
    did: &str,
    key: &str,
    sha256: &str,
    size: u64,
    s3_url: &str,
) -> IndexdRecord {
    let mut hashes = IndexMap::new();
    hashes.insert(ChecksumKind::Sha256.to_string(), sha256.to_string());

    let mut metadata = IndexMap::new();
    metadata.insert("remote".to_string(), "true".to_string());

    IndexdRecord {
        did: did.to_string(),
        file_name: key.to_string(),
        size,
        hashes,
        urls: vec![s3_url.to_string()],
        authz: vec![client.project().resource_path()],
        metadata,
        ..Default::default()
    }
}

fn access_method(s3_url: &str, client: &IndexdClient) -> AccessMethod {
    AccessMethod {
        kind: "s3".to_string(),
        access_url: Some(AccessUrl {
            url: s3_url.to_string(),
            headers: Vec::new(),
        }),
        access_id: None,
        authorizations: Some(Authorizations {
            value: client.project().resource_path(),
        }),
    }
}

/// Resolve a signed URL and probe the first byte. Any failure simply means
/// the bytes still need uploading.
async fn probe_downloadable(client: &IndexdClient, sha256: &str) -> bool {
    let access = match client.get_download_url(sha256).await {
        Ok(access) => access,
        Err(ClientError::NoMatchingRecord { .. }) => return false,
        Err(err) => {
            debug!("download probe failed to resolve a URL: {err}");
            return false;
        }
    };

    match client
        .raw_client()
        .get(&access.url)
        .header(RANGE, "bytes=0-0")
        .send()
        .await
    {
        Ok(response) => response.status().is_success(),
        Err(err) => {
            debug!("download probe failed: {err}");
            false
        }
    }
}

async fn single_shot_upload(
    client: &IndexdClient,
    file: &Path,
    guid: &str,
    file_name: &str,
    bucket: &str,
    size: u64,
    reporter: Arc<dyn Reporter>,
) -> Result<(), UploadError> {
    let presigned = fence::single_upload_url(client, guid, file_name, Some(bucket)).await?;

    let body = file_body(file, 0, size, Arc::clone(&reporter)).await?;
    let response = client
        .raw_client()
        .put(&presigned)
        .header(CONTENT_LENGTH, size)
        .body(body)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        return Err(UploadError::PutFailed {
            status,
            body: response.text().await.unwrap_or_default(),
        });
    }

    reporter.on_upload_complete();
    Ok(())
}
