use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// The on-the-wire indexd record.
///
/// `rev` is server-assigned and doubles as the optimistic-concurrency token
/// for PUT and DELETE; it is absent on records the client builds itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexdRecord {
    pub did: String,
    #[serde(default)]
    pub file_name: String,
    pub size: u64,
    #[serde(default)]
    pub hashes: IndexMap<String, String>,
    #[serde(default)]
    pub urls: Vec<String>,
    #[serde(default)]
    pub authz: Vec<String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub metadata: IndexMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub acl: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl IndexdRecord {
    /// Wrap the record in the `form: "object"` envelope the create endpoint
    /// expects.
    pub fn into_create_form(self) -> CreateForm {
        CreateForm {
            form: "object",
            record: self,
        }
    }
}

/// The POST /index/index payload: a record plus the `form` sentinel.
#[derive(Debug, Clone, Serialize)]
pub struct CreateForm {
    pub form: &'static str,
    #[serde(flatten)]
    pub record: IndexdRecord,
}

/// Response shape of the hash and authz query endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordList {
    #[serde(default)]
    pub records: Vec<IndexdRecord>,
}
