use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::checksum::Checksum;
use crate::error::TypeError;

/// A signed (or at least resolvable) location for an object's bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessUrl {
    pub url: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<String>,
}

/// The resource path the server evaluates ACLs against for one access method.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authorizations {
    pub value: String,
}

/// One way of reaching an object's bytes: a transport tag plus a URL and the
/// authorization scope covering it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessMethod {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_url: Option<AccessUrl>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorizations: Option<Authorizations>,
}

impl AccessMethod {
    pub fn url(&self) -> Option<&str> {
        self.access_url.as_ref().map(|u| u.url.as_str())
    }

    pub fn authz_value(&self) -> Option<&str> {
        self.authorizations
            .as_ref()
            .map(|a| a.value.as_str())
            .filter(|v| !v.is_empty())
    }
}

/// The neutral GA4GH-style DRS object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DrsObject {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_time: Option<jiff::Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    pub checksums: Vec<Checksum>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub access_methods: Vec<AccessMethod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<IndexMap<String, String>>,
}

impl DrsObject {
    /// Check the structural invariants: nonempty id, at least one checksum,
    /// and an authorization on every access method that carries a URL.
    pub fn validate(&self) -> Result<(), TypeError> {
        if self.id.is_empty() {
            return Err(TypeError::EmptyId);
        }
        if self.checksums.is_empty() {
            return Err(TypeError::NoChecksums {
                id: self.id.clone(),
            });
        }
        for method in &self.access_methods {
            if let Some(url) = method.url() {
                if !url.is_empty() && method.authz_value().is_none() {
                    return Err(TypeError::MissingAuthz {
                        did: self.id.clone(),
                        url: url.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// The first checksum of the given kind, if any.
    pub fn checksum(&self, kind: crate::ChecksumKind) -> Option<&str> {
        self.checksums
            .iter()
            .find(|c| c.kind == kind)
            .map(|c| c.checksum.as_str())
    }

    /// All nonempty access URLs, in declaration order.
    pub fn access_urls(&self) -> impl Iterator<Item = &str> {
        self.access_methods
            .iter()
            .filter_map(|m| m.url())
            .filter(|u| !u.is_empty())
    }
}
