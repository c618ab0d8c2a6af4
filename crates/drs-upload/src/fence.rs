use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use drs_client::IndexdClient;

use crate::error::UploadError;

/// Response of the multipart init endpoint.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct MultipartInit {
    #[serde(rename = "uploadId")]
    pub(crate) upload_id: String,
    pub(crate) guid: String,
}

/// One uploaded part, in completion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct CompletedPart {
    #[serde(rename = "partNumber")]
    pub(crate) part_number: u64,
    #[serde(rename = "ETag")]
    pub(crate) etag: String,
}

#[derive(Debug, Deserialize)]
struct SignedUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct PresignedPartUrl {
    #[serde(rename = "presignedURL")]
    presigned_url: String,
}

/// Fetch a presigned URL for a single-shot object upload.
pub(crate) async fn single_upload_url(
    client: &IndexdClient,
    guid: &str,
    file_name: &str,
    bucket: Option<&str>,
) -> Result<String, UploadError> {
    let url = client.endpoint().join(&format!("user/data/upload/{guid}"))?;
    let mut request = client
        .http()
        .get(url.clone())
        .query(&[("file_name", file_name)]);
    if let Some(bucket) = bucket {
        request = request.query(&[("bucket", bucket)]);
    }

    let response = request.send().await?;
    let signed: SignedUrl = decode(url.as_str(), response).await?;
    Ok(signed.url)
}

/// Start a multipart upload for `key`.
pub(crate) async fn init_multipart(
    client: &IndexdClient,
    key: &str,
    bucket: &str,
) -> Result<MultipartInit, UploadError> {
    let url = client.endpoint().join("user/data/multipart/init")?;
    let response = client
        .http()
        .post(url.clone())
        .json(&serde_json::json!({ "key": key, "bucket": bucket }))
        .send()
        .await?;
    decode(url.as_str(), response).await
}

/// Fetch the presigned URL for one part.
pub(crate) async fn part_upload_url(
    client: &IndexdClient,
    key: &str,
    upload_id: &str,
    part_number: u64,
    bucket: &str,
) -> Result<String, UploadError> {
    let url = client.endpoint().join("user/data/multipart/upload")?;
    let response = client
        .http()
        .post(url.clone())
        .json(&serde_json::json!({
            "key": key,
            "uploadId": upload_id,
            "partNumber": part_number,
            "bucket": bucket,
        }))
        .send()
        .await?;
    let presigned: PresignedPartUrl = decode(url.as_str(), response).await?;
    Ok(presigned.presigned_url)
}

/// Complete a multipart upload. `parts` must already be sorted by part
/// number.
pub(crate) async fn complete_multipart(
    client: &IndexdClient,
    key: &str,
    upload_id: &str,
    parts: &[CompletedPart],
    bucket: &str,
) -> Result<(), UploadError> {
    let url = client.endpoint().join("user/data/multipart/complete")?;
    let response = client
        .http()
        .post(url.clone())
        .json(&serde_json::json!({
            "key": key,
            "uploadId": upload_id,
            "parts": parts,
            "bucket": bucket,
        }))
        .send()
        .await?;

    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(UploadError::Fence {
            endpoint: url.to_string(),
            status,
            body: response.text().await.unwrap_or_default(),
        })
    }
}

async fn decode<T: DeserializeOwned>(
    endpoint: &str,
    response: reqwest::Response,
) -> Result<T, UploadError> {
    let status = response.status();
    if !status.is_success() {
        return Err(UploadError::Fence {
            endpoint: endpoint.to_string(),
            status,
            body: response.text().await.unwrap_or_default(),
        });
    }

    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|source| UploadError::FenceDecode {
        endpoint: endpoint.to_string(),
        source,
    })
}
