use std::path::PathBuf;

use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use tracing::debug;

use drs_client::BucketDetail;
use drs_types::TypeError;

use crate::error::UploadError;

/// Explicit S3 settings from flags or the environment. Each one outranks the
/// bucket registry, which outranks the ambient AWS configuration chain.
#[derive(Debug, Clone, Default)]
pub struct S3Options {
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub region: Option<String>,
    pub endpoint: Option<String>,
}

/// Split `s3://bucket/key` into its bucket and key.
pub fn parse_s3_url(s3_url: &str) -> Result<(String, String), UploadError> {
    let rest = s3_url
        .strip_prefix("s3://")
        .ok_or_else(|| TypeError::InvalidS3Url(s3_url.to_string()))?;
    let (bucket, key) = rest
        .split_once('/')
        .filter(|(bucket, key)| !bucket.is_empty() && !key.is_empty())
        .ok_or_else(|| TypeError::InvalidS3Url(s3_url.to_string()))?;
    Ok((bucket.to_string(), key.to_string()))
}

/// The subset of HEAD output the pipeline uses.
#[derive(Debug, Clone)]
pub(crate) struct ObjectHead {
    pub(crate) size: u64,
}

/// Settings after the explicit ≻ registry ≻ ambient merge.
#[derive(Debug, Clone, Default)]
pub(crate) struct ResolvedS3 {
    access_key: Option<String>,
    secret_key: Option<String>,
    region: Option<String>,
    endpoint: Option<String>,
}

/// Merge explicit options with the server-provided bucket detail and verify
/// that everything the SDK will need is available somewhere. Every missing
/// item is reported at once.
pub(crate) fn resolve_s3(
    explicit: &S3Options,
    detail: Option<&BucketDetail>,
) -> Result<ResolvedS3, UploadError> {
    let resolved = ResolvedS3 {
        access_key: explicit.access_key.clone(),
        secret_key: explicit.secret_key.clone(),
        region: explicit
            .region
            .clone()
            .or_else(|| detail.and_then(|d| d.region.clone())),
        endpoint: explicit
            .endpoint
            .clone()
            .or_else(|| detail.and_then(|d| d.endpoint_url.clone())),
    };

    let ambient_credentials = std::env::var_os("AWS_ACCESS_KEY_ID").is_some()
        || aws_file("credentials").is_some_and(|path| path.exists());
    let ambient_region = std::env::var_os("AWS_REGION").is_some()
        || std::env::var_os("AWS_DEFAULT_REGION").is_some();
    let ambient_endpoint = std::env::var_os("AWS_ENDPOINT_URL").is_some()
        || aws_file("config").is_some_and(|path| path.exists());

    let mut missing = Vec::new();
    if resolved.access_key.is_none() && !ambient_credentials {
        missing.push(
            "  - access key: pass --aws-key, set AWS_ACCESS_KEY_ID, or add a profile to ~/.aws/credentials".to_string(),
        );
    }
    if resolved.secret_key.is_none() && resolved.access_key.is_some() {
        missing.push(
            "  - secret key: pass --aws-secret or set AWS_SECRET_ACCESS_KEY alongside the access key".to_string(),
        );
    }
    if resolved.region.is_none() && !ambient_region {
        missing.push(
            "  - region: pass --region, set AWS_REGION, or register the bucket's region with the indexing service".to_string(),
        );
    }
    if resolved.endpoint.is_none() && !ambient_endpoint {
        missing.push(
            "  - endpoint: pass --endpoint, set AWS_ENDPOINT, or register the bucket's endpoint_url with the indexing service".to_string(),
        );
    }

    if missing.is_empty() {
        Ok(resolved)
    } else {
        Err(UploadError::MissingAwsConfig(missing))
    }
}

fn aws_file(name: &str) -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".aws").join(name))
}

/// HEAD the object, distinguishing "not there yet" from configuration and
/// transport failures.
pub(crate) async fn head_object(
    resolved: &ResolvedS3,
    bucket: &str,
    key: &str,
) -> Result<Option<ObjectHead>, UploadError> {
    let shared = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .load()
        .await;
    let mut builder = aws_sdk_s3::config::Builder::from(&shared);
    if let Some(region) = &resolved.region {
        builder = builder.region(Region::new(region.clone()));
    }
    if let Some(endpoint) = &resolved.endpoint {
        builder = builder.endpoint_url(endpoint.clone()).force_path_style(true);
    }
    if let (Some(access_key), Some(secret_key)) = (&resolved.access_key, &resolved.secret_key) {
        builder = builder.credentials_provider(Credentials::new(
            access_key.clone(),
            secret_key.clone(),
            None,
            None,
            "git-drs",
        ));
    }
    let client = aws_sdk_s3::Client::from_conf(builder.build());

    match client.head_object().bucket(bucket).key(key).send().await {
        Ok(head) => {
            let size = u64::try_from(head.content_length().unwrap_or(0)).unwrap_or(0);
            debug!("HEAD s3://{bucket}/{key}: {size} bytes");
            Ok(Some(ObjectHead { size }))
        }
        Err(err) => {
            if err
                .as_service_error()
                .is_some_and(aws_sdk_s3::operation::head_object::HeadObjectError::is_not_found)
            {
                return Ok(None);
            }
            Err(UploadError::Head {
                bucket: bucket.to_string(),
                key: key.to_string(),
                message: DisplayErrorContext(&err).to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s3_urls_split_into_bucket_and_key() {
        let (bucket, key) = parse_s3_url("s3://my-bucket/data/foo.bin").unwrap();
        assert_eq!(bucket, "my-bucket");
        assert_eq!(key, "data/foo.bin");
    }

    #[test]
    fn bad_s3_urls_are_rejected() {
        assert!(parse_s3_url("https://my-bucket/key").is_err());
        assert!(parse_s3_url("s3://only-bucket").is_err());
        assert!(parse_s3_url("s3:///no-bucket").is_err());
    }

    #[test]
    fn explicit_settings_outrank_the_registry() {
        let explicit = S3Options {
            region: Some("us-east-1".into()),
            access_key: Some("AKIA".into()),
            secret_key: Some("secret".into()),
            ..Default::default()
        };
        let detail = BucketDetail {
            region: Some("us-west-2".into()),
            endpoint_url: Some("https://s3.example.org".into()),
            programs: Vec::new(),
        };

        let resolved = resolve_s3(&explicit, Some(&detail)).unwrap();
        assert_eq!(resolved.region.as_deref(), Some("us-east-1"));
        assert_eq!(resolved.endpoint.as_deref(), Some("https://s3.example.org"));
    }

    #[test]
    fn missing_settings_are_reported_together() {
        let err = resolve_s3(
            &S3Options {
                access_key: Some("AKIA".into()),
                ..Default::default()
            },
            None,
        );

        // The access key is present but its secret is not; the secret always
        // shows up, and the region and endpoint ride in the same error when
        // the ambient environment does not provide them either.
        if let Err(UploadError::MissingAwsConfig(missing)) = err {
            assert!(missing.iter().any(|m| m.contains("secret key")));

            let ambient_region = std::env::var_os("AWS_REGION").is_some()
                || std::env::var_os("AWS_DEFAULT_REGION").is_some();
            if !ambient_region {
                assert!(missing.iter().any(|m| m.contains("region")));
            }
            let ambient_endpoint = std::env::var_os("AWS_ENDPOINT_URL").is_some()
                || aws_file("config").is_some_and(|path| path.exists());
            if !ambient_endpoint {
                assert!(missing.iter().any(|m| m.contains("endpoint")));
            }
        }
    }

    #[test]
    fn a_missing_endpoint_alone_is_still_reported() {
        let explicit = S3Options {
            access_key: Some("AKIA".into()),
            secret_key: Some("secret".into()),
            region: Some("us-east-1".into()),
            endpoint: None,
        };

        let ambient_endpoint = std::env::var_os("AWS_ENDPOINT_URL").is_some()
            || aws_file("config").is_some_and(|path| path.exists());
        match resolve_s3(&explicit, None) {
            Ok(_) => assert!(ambient_endpoint, "resolution needs an endpoint source"),
            Err(UploadError::MissingAwsConfig(missing)) => {
                assert_eq!(missing.len(), 1);
                assert!(missing[0].contains("endpoint"));
            }
            Err(err) => panic!("unexpected error: {err}"),
        }
    }
}
