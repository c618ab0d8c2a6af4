use std::collections::BTreeMap;

use serde::Deserialize;

/// One bucket's registration in the indexing service.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BucketDetail {
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub endpoint_url: Option<String>,
    /// Programs whose projects may write to this bucket.
    #[serde(default)]
    pub programs: Vec<String>,
}

/// Response of `GET /user/data/buckets`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BucketRegistry {
    #[serde(rename = "S3_BUCKETS", default)]
    pub s3_buckets: BTreeMap<String, BucketDetail>,
    #[serde(rename = "GS_BUCKETS", default)]
    pub gs_buckets: BTreeMap<String, BucketDetail>,
}

impl BucketRegistry {
    pub fn s3_bucket(&self, name: &str) -> Option<&BucketDetail> {
        self.s3_buckets.get(name)
    }
}
