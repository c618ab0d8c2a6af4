use std::str::FromStr;

use tracing::warn;

use crate::checksum::{Checksum, ChecksumKind};
use crate::drs::{AccessMethod, AccessUrl, Authorizations, DrsObject};
use crate::error::TypeError;
use crate::record::IndexdRecord;

/// Flatten a DRS object into the indexd wire form.
///
/// `urls` and `authz` are extracted from the access methods in input order.
/// Every checksum kind lands in `hashes` verbatim; metadata beyond the
/// description does not survive the trip and is not meant to.
pub fn to_record(object: &DrsObject) -> IndexdRecord {
    let mut record = IndexdRecord {
        did: object.id.clone(),
        file_name: object.name.clone(),
        size: object.size,
        version: object.version.clone(),
        ..Default::default()
    };

    for checksum in &object.checksums {
        record
            .hashes
            .insert(checksum.kind.to_string(), checksum.checksum.clone());
    }

    for method in &object.access_methods {
        if let Some(url) = method.url().filter(|u| !u.is_empty()) {
            record.urls.push(url.to_string());
        }
        if let Some(value) = method.authz_value() {
            record.authz.push(value.to_string());
        }
    }

    if let Some(metadata) = &object.metadata {
        record.metadata = metadata.clone();
    }
    if let Some(description) = object.description.as_deref().filter(|d| !d.is_empty()) {
        record
            .metadata
            .insert("description".to_string(), description.to_string());
    }

    record
}

/// Rehydrate an indexd record into the neutral DRS form.
///
/// Fails when any produced access method would lack an authorization.
/// `urls[i]` pairs with `authz[i]`, reusing the final authz entry when the
/// server holds fewer scopes than URLs. Hash keys outside the closed kind
/// set are logged and skipped, never silently dropped.
pub fn to_drs(record: &IndexdRecord) -> Result<DrsObject, TypeError> {
    if record.did.is_empty() {
        return Err(TypeError::EmptyId);
    }

    let mut checksums = Vec::with_capacity(record.hashes.len());
    for (key, digest) in &record.hashes {
        match ChecksumKind::from_str(key) {
            Ok(kind) => checksums.push(Checksum::new(kind, digest)?),
            Err(_) => {
                warn!("record {}: skipping unknown hash kind `{key}`", record.did);
            }
        }
    }

    let mut access_methods = Vec::with_capacity(record.urls.len());
    for (index, url) in record.urls.iter().enumerate() {
        let authz = record
            .authz
            .get(index)
            .or_else(|| record.authz.last())
            .ok_or_else(|| TypeError::MissingAuthz {
                did: record.did.clone(),
                url: url.clone(),
            })?;

        access_methods.push(AccessMethod {
            kind: url_scheme(url).to_string(),
            access_url: Some(AccessUrl {
                url: url.clone(),
                headers: Vec::new(),
            }),
            access_id: None,
            authorizations: Some(Authorizations {
                value: authz.clone(),
            }),
        });
    }

    let description = record
        .metadata
        .get("description")
        .filter(|d| !d.is_empty())
        .cloned();

    Ok(DrsObject {
        id: record.did.clone(),
        name: record.file_name.clone(),
        size: record.size,
        created_time: None,
        description,
        version: record.version.clone(),
        checksums,
        access_methods,
        metadata: (!record.metadata.is_empty()).then(|| record.metadata.clone()),
    })
}

fn url_scheme(url: &str) -> &str {
    url.split_once("://").map(|(scheme, _)| scheme).unwrap_or("https")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_object() -> DrsObject {
        DrsObject {
            id: "did-1".into(),
            name: "file.txt".into(),
            size: 123,
            checksums: vec![
                Checksum::sha256(
                    "b5bb9d8014a0f9b1d61e21e796d78dccdf1352f23cd32812f4850b878ae4944c",
                )
                .unwrap(),
                Checksum::new(ChecksumKind::Md5, "d41d8cd98f00b204e9800998ecf8427e").unwrap(),
            ],
            access_methods: vec![AccessMethod {
                kind: "s3".into(),
                access_url: Some(AccessUrl {
                    url: "s3://bucket/key".into(),
                    headers: Vec::new(),
                }),
                access_id: None,
                authorizations: Some(Authorizations {
                    value: "/programs/test/projects/proj".into(),
                }),
            }],
            ..Default::default()
        }
    }

    #[test]
    fn round_trip_preserves_the_projection() {
        let object = sample_object();
        let record = to_record(&object);
        let back = to_drs(&record).unwrap();

        assert_eq!(back.id, object.id);
        assert_eq!(back.name, object.name);
        assert_eq!(back.size, object.size);
        assert_eq!(back.checksums, object.checksums);

        let pairs = |o: &DrsObject| -> Vec<(String, String)> {
            o.access_methods
                .iter()
                .map(|m| {
                    (
                        m.url().unwrap_or_default().to_string(),
                        m.authz_value().unwrap_or_default().to_string(),
                    )
                })
                .collect()
        };
        assert_eq!(pairs(&back), pairs(&object));
    }

    #[test]
    fn to_record_extracts_in_input_order() {
        let mut object = sample_object();
        object.access_methods.push(AccessMethod {
            kind: "s3".into(),
            access_url: Some(AccessUrl {
                url: "s3://bucket/other".into(),
                headers: Vec::new(),
            }),
            access_id: None,
            authorizations: Some(Authorizations {
                value: "/programs/test/projects/proj".into(),
            }),
        });

        let record = to_record(&object);
        assert_eq!(record.urls, vec!["s3://bucket/key", "s3://bucket/other"]);
        assert_eq!(record.authz.len(), 2);
        assert_eq!(record.hashes.get("sha256").map(String::as_str), Some(
            "b5bb9d8014a0f9b1d61e21e796d78dccdf1352f23cd32812f4850b878ae4944c"
        ));
    }

    #[test]
    fn to_drs_requires_authz_for_urls() {
        let record = IndexdRecord {
            did: "did-1".into(),
            size: 1,
            urls: vec!["s3://bucket/key".into()],
            ..Default::default()
        };
        assert!(matches!(
            to_drs(&record),
            Err(TypeError::MissingAuthz { .. })
        ));
    }

    #[test]
    fn to_drs_reuses_last_authz_when_short() {
        let record = IndexdRecord {
            did: "did-1".into(),
            size: 1,
            urls: vec!["s3://bucket/a".into(), "s3://bucket/b".into()],
            authz: vec!["/programs/test/projects/proj".into()],
            ..Default::default()
        };
        let object = to_drs(&record).unwrap();
        assert_eq!(object.access_methods.len(), 2);
        assert!(object
            .access_methods
            .iter()
            .all(|m| m.authz_value() == Some("/programs/test/projects/proj")));
    }

    #[test]
    fn to_drs_skips_unknown_hash_kinds() {
        let mut record = to_record(&sample_object());
        record.hashes.insert("blake3".into(), "ff".into());
        let object = to_drs(&record).unwrap();
        assert_eq!(object.checksums.len(), 2);
    }

    #[test]
    fn description_lands_in_metadata() {
        let mut object = sample_object();
        object.description = Some("updated".into());
        let record = to_record(&object);
        assert_eq!(
            record.metadata.get("description").map(String::as_str),
            Some("updated")
        );

        let back = to_drs(&record).unwrap();
        assert_eq!(back.description.as_deref(), Some("updated"));
    }
}
