use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use reqwest::{Client, ClientBuilder, StatusCode};
use reqwest_middleware::ClientWithMiddleware;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tracing::{debug, warn};
use url::Url;

use drs_types::{to_drs, AccessUrl, Checksum, DrsObject, IndexdRecord, ProjectId, RecordList};

use crate::auth::{AuthHandler, AuthMiddleware};
use crate::buckets::BucketRegistry;
use crate::error::{ClientError, MultiError};
use crate::middleware::{RetryMiddleware, RetryPolicy};

/// Server page size for the lazy list streams.
pub const PAGE_SIZE: usize = 50;

/// A builder for an [`IndexdClient`].
#[derive(Debug)]
pub struct IndexdClientBuilder {
    endpoint: Url,
    project: ProjectId,
    auth: Arc<dyn AuthHandler>,
    retry: RetryPolicy,
    timeout: Duration,
}

impl IndexdClientBuilder {
    pub fn new(endpoint: Url, project: ProjectId, auth: Arc<dyn AuthHandler>) -> Self {
        Self {
            endpoint,
            project,
            auth,
            retry: RetryPolicy::default(),
            timeout: Duration::from_secs(10),
        }
    }

    #[must_use]
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> IndexdClient {
        let mut endpoint = self.endpoint;
        if !endpoint.path().ends_with('/') {
            let path = format!("{}/", endpoint.path());
            endpoint.set_path(&path);
        }

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/json"),
        );

        let raw = ClientBuilder::new()
            .user_agent("git-drs")
            .build()
            .expect("failed to build HTTP client");

        let metadata_client = ClientBuilder::new()
            .user_agent("git-drs")
            .default_headers(headers)
            .timeout(self.timeout)
            .build()
            .expect("failed to build HTTP client");

        // Retry wraps auth so every attempt re-attaches a fresh header.
        let client = reqwest_middleware::ClientBuilder::new(metadata_client)
            .with(RetryMiddleware::new(self.retry))
            .with(AuthMiddleware::new(self.auth))
            .build();

        IndexdClient {
            endpoint,
            project: self.project,
            client,
            raw,
        }
    }
}

/// A client for one indexd/DRS endpoint, scoped to a single project.
#[derive(Debug, Clone)]
pub struct IndexdClient {
    endpoint: Url,
    project: ProjectId,
    client: ClientWithMiddleware,
    raw: Client,
}

/// Wire shape of the DRS catalog listing.
#[derive(Debug, Default, Deserialize)]
struct DrsObjectList {
    #[serde(default)]
    drs_objects: Vec<DrsObject>,
}

/// Minimal create response; the authoritative object is re-fetched.
#[derive(Debug, Deserialize)]
struct CreatedDid {
    did: String,
}

impl IndexdClient {
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn project(&self) -> &ProjectId {
        &self.project
    }

    /// The authenticated, retrying client, for fence-side calls.
    pub fn http(&self) -> &ClientWithMiddleware {
        &self.client
    }

    /// A bare client for presigned URLs, which carry their own signature and
    /// must not receive an `Authorization` header.
    pub fn raw_client(&self) -> &Client {
        &self.raw
    }

    fn url(&self, path: &str) -> Result<Url, ClientError> {
        Ok(self.endpoint.join(path)?)
    }

    /// Fetch one DRS object.
    pub async fn get_object(&self, did: &str) -> Result<DrsObject, ClientError> {
        let url = self.url(&format!("ga4gh/drs/v1/objects/{did}"))?;
        let response = self.client.get(url.clone()).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(ClientError::NotFound {
                did: did.to_string(),
            });
        }
        decode(response, url.as_str()).await
    }

    /// Fetch the authoritative indexd record, including its `rev`.
    pub async fn get_record(&self, did: &str) -> Result<IndexdRecord, ClientError> {
        let url = self.url(&format!("index/{did}"))?;
        let response = self.client.get(url.clone()).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(ClientError::NotFound {
                did: did.to_string(),
            });
        }
        decode(response, url.as_str()).await
    }

    /// Query records by hash, filtered to this client's project.
    pub async fn get_objects_by_hash(
        &self,
        checksum: &Checksum,
    ) -> Result<Vec<DrsObject>, ClientError> {
        let url = self.url("index/index")?;
        let response = self
            .client
            .get(url.clone())
            .query(&[("hash", checksum.to_string())])
            .send()
            .await?;
        let list: RecordList = decode(response, url.as_str()).await?;

        let resource_path = self.project.resource_path();
        let mut objects = Vec::new();
        for record in &list.records {
            if record.authz.iter().any(|a| *a == resource_path) {
                objects.push(to_drs(record)?);
            }
        }
        Ok(objects)
    }

    /// Lazily stream every object in this client's project.
    ///
    /// Pages of [`PAGE_SIZE`] are fetched until the first empty page. Records
    /// that fail to convert are accumulated and surfaced as one final
    /// [`ClientError::Partial`] item; transport errors end the stream
    /// immediately. Dropping the stream stops the producer.
    pub fn list_objects_by_project(&self) -> ReceiverStream<Result<DrsObject, ClientError>> {
        let client = self.clone();
        let resource_path = self.project.resource_path();
        let (tx, rx) = mpsc::channel(PAGE_SIZE);

        tokio::spawn(async move {
            let mut conversion_errors: Vec<ClientError> = Vec::new();
            let mut page = 0usize;
            loop {
                let limit = PAGE_SIZE.to_string();
                let page_param = page.to_string();
                let list: Result<RecordList, ClientError> = async {
                    let url = client.url("index/index")?;
                    let response = client
                        .client
                        .get(url.clone())
                        .query(&[
                            ("authz", resource_path.as_str()),
                            ("limit", limit.as_str()),
                            ("page", page_param.as_str()),
                        ])
                        .send()
                        .await?;
                    decode(response, url.as_str()).await
                }
                .await;

                match list {
                    Ok(list) if list.records.is_empty() => break,
                    Ok(list) => {
                        for record in &list.records {
                            match to_drs(record) {
                                Ok(object) => {
                                    if tx.send(Ok(object)).await.is_err() {
                                        return;
                                    }
                                }
                                Err(err) => conversion_errors.push(err.into()),
                            }
                        }
                    }
                    Err(err) => {
                        let _ = tx.send(Err(err)).await;
                        return;
                    }
                }

                page += 1;
            }

            if !conversion_errors.is_empty() {
                let _ = tx
                    .send(Err(ClientError::Partial(MultiError(conversion_errors))))
                    .await;
            }
        });

        ReceiverStream::new(rx)
    }

    /// Lazily stream the whole DRS catalog. Fatal errors close the stream.
    pub fn list_objects(&self) -> ReceiverStream<Result<DrsObject, ClientError>> {
        let client = self.clone();
        let (tx, rx) = mpsc::channel(PAGE_SIZE);

        tokio::spawn(async move {
            let mut page = 0usize;
            loop {
                let list: Result<DrsObjectList, ClientError> = async {
                    let url = client.url("ga4gh/drs/v1/objects")?;
                    let response = client
                        .client
                        .get(url.clone())
                        .query(&[("limit", &PAGE_SIZE.to_string()), ("page", &page.to_string())])
                        .send()
                        .await?;
                    decode(response, url.as_str()).await
                }
                .await;

                match list {
                    Ok(list) if list.drs_objects.is_empty() => break,
                    Ok(list) => {
                        for object in list.drs_objects {
                            if tx.send(Ok(object)).await.is_err() {
                                return;
                            }
                        }
                    }
                    Err(err) => {
                        let _ = tx.send(Err(err)).await;
                        return;
                    }
                }

                page += 1;
            }
        });

        ReceiverStream::new(rx)
    }

    /// Take up to `limit` objects from the project listing, then detach a
    /// background drain so the producer is never left blocked on a full
    /// channel.
    pub async fn project_sample(&self, limit: usize) -> Result<Vec<DrsObject>, ClientError> {
        debug_assert!(limit >= 1);
        let mut stream = self.list_objects_by_project();
        let mut sample = Vec::with_capacity(limit);

        while sample.len() < limit {
            match stream.next().await {
                Some(Ok(object)) => sample.push(object),
                Some(Err(err)) => return Err(err),
                None => return Ok(sample),
            }
        }

        tokio::spawn(async move { while stream.next().await.is_some() {} });
        Ok(sample)
    }

    /// Create a record. `already exists` from the server is surfaced
    /// verbatim; on success the authoritative object is re-fetched.
    pub async fn register_record(&self, record: IndexdRecord) -> Result<DrsObject, ClientError> {
        let url = self.url("index/index")?;
        let response = self
            .client
            .post(url.clone())
            .json(&record.into_create_form())
            .send()
            .await?;

        let created: CreatedDid = decode(response, url.as_str()).await?;
        self.get_object(&created.did).await
    }

    /// Merge the caller's partial object into the server record and PUT it
    /// back under the captured `rev`, then return the server's authoritative
    /// view.
    pub async fn update_record(
        &self,
        partial: &DrsObject,
        did: &str,
    ) -> Result<DrsObject, ClientError> {
        let record = self.get_record(did).await?;
        let rev = record.rev.clone().ok_or_else(|| ClientError::MissingRev {
            did: did.to_string(),
        })?;

        let payload = merge_update(&record, partial);
        let url = self.url(&format!("index/index/{did}"))?;
        let response = self
            .client
            .put(url.clone())
            .query(&[("rev", rev.as_str())])
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::from_response(status, body));
        }

        self.get_object(did).await
    }

    /// Delete the record for `oid` (a bare sha256 digest) owned by this
    /// client's project. The current `rev` rides along as the concurrency
    /// guard.
    pub async fn delete_record(&self, oid: &str) -> Result<(), ClientError> {
        let matches = self.get_objects_by_hash(&Checksum::sha256(oid)?).await?;
        let object = matches.first().ok_or_else(|| ClientError::NoMatchingRecord {
            project: self.project.to_string(),
            oid: oid.to_string(),
        })?;

        self.delete_record_by_did(&object.id).await
    }

    async fn delete_record_by_did(&self, did: &str) -> Result<(), ClientError> {
        let record = self.get_record(did).await?;
        let rev = record.rev.ok_or_else(|| ClientError::MissingRev {
            did: did.to_string(),
        })?;

        let url = self.url(&format!("index/index/{did}"))?;
        let response = self
            .client
            .delete(url)
            .query(&[("rev", rev.as_str())])
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() < 400 {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(ClientError::from_response(status, body))
        }
    }

    /// Sweep every record in the project. Per-record failures are logged and
    /// the sweep continues; only a failed enumeration fails the call.
    pub async fn delete_records_by_project(&self) -> Result<(), ClientError> {
        let mut stream = self.list_objects_by_project();
        while let Some(item) = stream.next().await {
            match item {
                Ok(object) => {
                    if let Err(err) = self.delete_record_by_did(&object.id).await {
                        warn!("failed to delete record {}: {err}", object.id);
                    }
                }
                // Trailing decode errors mean the enumeration itself finished.
                Err(ClientError::Partial(errors)) => {
                    warn!("sweep skipped undecodable records: {errors}");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    /// Resolve a signed download URL for `oid` (a bare sha256 digest).
    pub async fn get_download_url(&self, oid: &str) -> Result<AccessUrl, ClientError> {
        let matches = self.get_objects_by_hash(&Checksum::sha256(oid)?).await?;
        let object = matches
            .into_iter()
            .next()
            .ok_or_else(|| ClientError::NoMatchingRecord {
                project: self.project.to_string(),
                oid: oid.to_string(),
            })?;

        let method = object
            .access_methods
            .first()
            .ok_or_else(|| ClientError::NoAccessMethods {
                did: object.id.clone(),
            })?;
        if method.kind.is_empty() {
            return Err(ClientError::EmptyAccessType {
                did: object.id.clone(),
            });
        }

        let url = self.url(&format!(
            "ga4gh/drs/v1/objects/{}/access/{}",
            object.id, method.kind
        ))?;
        let response = self.client.get(url.clone()).send().await?;
        let access: AccessUrl = decode(response, url.as_str()).await?;

        if access.url.is_empty() {
            return Err(ClientError::EmptyAccessUrl { did: object.id });
        }
        debug!("resolved download URL for oid {oid}");
        Ok(access)
    }

    /// Fetch the bucket registry.
    pub async fn get_buckets(&self) -> Result<BucketRegistry, ClientError> {
        let url = self.url("user/data/buckets")?;
        let response = self.client.get(url.clone()).send().await?;
        decode(response, url.as_str()).await
    }
}

/// The PUT payload: the fetched record's fields with the caller's partial
/// object merged in (URL/authz set-union, replace-if-nonempty scalars).
#[derive(Debug, Serialize)]
struct UpdatePayload {
    urls: Vec<String>,
    file_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<String>,
    authz: Vec<String>,
    acl: Vec<String>,
    metadata: IndexMap<String, String>,
}

fn merge_update(record: &IndexdRecord, partial: &DrsObject) -> UpdatePayload {
    let mut urls = record.urls.clone();
    let mut authz = record.authz.clone();

    for method in &partial.access_methods {
        if let Some(url) = method.url().filter(|u| !u.is_empty()) {
            if !urls.iter().any(|u| u == url) {
                urls.push(url.to_string());
            }
        }
        if let Some(value) = method.authz_value() {
            if !authz.iter().any(|a| a == value) {
                authz.push(value.to_string());
            }
        }
    }

    let file_name = if partial.name.is_empty() {
        record.file_name.clone()
    } else {
        partial.name.clone()
    };

    let version = match partial.version.as_deref() {
        Some(version) if !version.is_empty() => Some(version.to_string()),
        _ => record.version.clone(),
    };

    let mut metadata = record.metadata.clone();
    if let Some(description) = partial.description.as_deref().filter(|d| !d.is_empty()) {
        metadata.insert("description".to_string(), description.to_string());
    }

    UpdatePayload {
        urls,
        file_name,
        version,
        authz,
        acl: record.acl.clone(),
        metadata,
    }
}

/// Decode a JSON response, classifying non-success statuses first.
async fn decode<T: DeserializeOwned>(
    response: reqwest::Response,
    url: &str,
) -> Result<T, ClientError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ClientError::from_response(status, body));
    }

    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|err| ClientError::from_json_err(err, url))
}
