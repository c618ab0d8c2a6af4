//! Integration tests for the indexd client against a mock server.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio_stream::StreamExt;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use drs_client::{ClientError, IndexdClient, IndexdClientBuilder, RetryPolicy, StaticTokenAuth};
use drs_types::{AccessMethod, AccessUrl, Authorizations, Checksum, DrsObject, IndexdRecord, ProjectId};

const SHA: &str = "b5bb9d8014a0f9b1d61e21e796d78dccdf1352f23cd32812f4850b878ae4944c";
const AUTHZ: &str = "/programs/test/projects/proj";

fn client(server: &MockServer) -> IndexdClient {
    IndexdClientBuilder::new(
        server.uri().parse().unwrap(),
        ProjectId::new("test-proj").unwrap(),
        Arc::new(StaticTokenAuth::new("test-token")),
    )
    .retry(RetryPolicy {
        min_backoff: Duration::from_millis(5),
        max_backoff: Duration::from_millis(20),
        max_attempts: 5,
    })
    .build()
}

fn record_json(did: &str, urls: &[&str], authz: &str) -> serde_json::Value {
    json!({
        "did": did,
        "file_name": "file.txt",
        "size": 123,
        "hashes": { "sha256": SHA },
        "urls": urls,
        "authz": [authz],
        "rev": "rev-1"
    })
}

fn drs_object_json(did: &str, url: &str) -> serde_json::Value {
    json!({
        "id": did,
        "name": "file.txt",
        "size": 123,
        "checksums": [{ "type": "sha256", "checksum": SHA }],
        "access_methods": [{
            "type": "s3",
            "access_url": { "url": url },
            "authorizations": { "value": AUTHZ }
        }]
    })
}

#[tokio::test]
async fn register_then_query_by_hash_returns_the_record() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/index/index"))
        .and(header("Authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "did": "did-1" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ga4gh/drs/v1/objects/did-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(drs_object_json("did-1", "s3://bucket/key")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/index/index"))
        .and(query_param("hash", format!("sha256:{SHA}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "records": [record_json("did-1", &["s3://bucket/key"], AUTHZ)]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);

    let record = IndexdRecord {
        did: "did-1".into(),
        file_name: "file.txt".into(),
        size: 123,
        urls: vec!["s3://bucket/key".into()],
        authz: vec![AUTHZ.into()],
        ..Default::default()
    };
    let registered = client.register_record(record).await.unwrap();
    assert_eq!(registered.id, "did-1");

    let matches = client
        .get_objects_by_hash(&Checksum::sha256(SHA).unwrap())
        .await
        .unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].id, "did-1");
    assert_eq!(
        matches[0].access_urls().collect::<Vec<_>>(),
        vec!["s3://bucket/key"]
    );
    assert_eq!(
        matches[0].access_methods[0].authz_value(),
        Some(AUTHZ)
    );
}

#[tokio::test]
async fn update_merges_urls_and_metadata_then_refetches() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/index/did-1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(record_json("did-1", &["s3://bucket/key"], AUTHZ)),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/index/index/did-1"))
        .and(query_param("rev", "rev-1"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ga4gh/drs/v1/objects/did-1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(drs_object_json("did-1", "s3://bucket/other")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    let partial = DrsObject {
        id: "did-1".into(),
        name: "file-updated.txt".into(),
        version: Some("v2".into()),
        description: Some("updated".into()),
        access_methods: vec![AccessMethod {
            kind: "s3".into(),
            access_url: Some(AccessUrl {
                url: "s3://bucket/other".into(),
                headers: Vec::new(),
            }),
            access_id: None,
            authorizations: Some(Authorizations {
                value: AUTHZ.into(),
            }),
        }],
        ..Default::default()
    };

    let updated = client.update_record(&partial, "did-1").await.unwrap();
    assert_eq!(updated.id, "did-1");

    // The PUT payload must carry the merged view.
    let requests = server.received_requests().await.unwrap();
    let put = requests.iter().find(|r| r.method == "PUT").unwrap();
    let body: serde_json::Value = serde_json::from_slice(&put.body).unwrap();
    assert_eq!(
        body["urls"],
        json!(["s3://bucket/key", "s3://bucket/other"])
    );
    assert_eq!(body["file_name"], "file-updated.txt");
    assert_eq!(body["version"], "v2");
    assert_eq!(body["metadata"]["description"], "updated");
}

#[tokio::test]
async fn download_url_happy_path_resolves_without_retries() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/index/index"))
        .and(query_param("hash", format!("sha256:{SHA}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "records": [record_json("did-1", &["s3://bucket/key"], AUTHZ)]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ga4gh/drs/v1/objects/did-1/access/s3"))
        .and(header("Authorization", "Bearer test-token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "url": "https://signed.example.org/key" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let access = client(&server).get_download_url(SHA).await.unwrap();
    assert_eq!(access.url, "https://signed.example.org/key");
}

#[tokio::test]
async fn download_url_fails_when_no_record_matches_the_project() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/index/index"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "records": [record_json("did-1", &["s3://bucket/key"], "/programs/other/projects/proj")]
        })))
        .mount(&server)
        .await;

    let err = client(&server).get_download_url(SHA).await.unwrap_err();
    assert!(
        err.to_string().contains("no matching record found for project"),
        "unexpected error: {err}"
    );
}

#[tokio::test]
async fn server_errors_are_retried_to_the_limit() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/index/did-1"))
        .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
        .expect(5)
        .mount(&server)
        .await;

    let err = client(&server).get_record("did-1").await.unwrap_err();
    assert!(matches!(err, ClientError::Status { status, .. } if status.as_u16() == 503));
}

#[tokio::test]
async fn client_errors_are_never_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/index/did-1"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad request"))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server).get_record("did-1").await.unwrap_err();
    assert!(matches!(err, ClientError::Status { status, .. } if status.as_u16() == 400));
}

#[tokio::test]
async fn already_exists_bodies_are_terminal_even_on_5xx() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/index/index"))
        .respond_with(
            ResponseTemplate::new(503).set_body_string("record did-1 already exists"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let record = IndexdRecord {
        did: "did-1".into(),
        size: 1,
        authz: vec![AUTHZ.into()],
        ..Default::default()
    };
    let err = client(&server).register_record(record).await.unwrap_err();
    assert!(err.is_already_exists(), "unexpected error: {err}");
}

#[tokio::test]
async fn project_listing_pages_until_the_first_empty_page() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/index/index"))
        .and(query_param("authz", AUTHZ))
        .and(query_param("page", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "records": [
                record_json("did-1", &["s3://bucket/a"], AUTHZ),
                record_json("did-2", &["s3://bucket/b"], AUTHZ)
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/index/index"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "records": [] })))
        .expect(1)
        .mount(&server)
        .await;

    let objects: Vec<_> = client(&server)
        .list_objects_by_project()
        .collect::<Vec<_>>()
        .await;
    let ids: Vec<_> = objects
        .into_iter()
        .map(|r| r.unwrap().id)
        .collect();
    assert_eq!(ids, vec!["did-1", "did-2"]);
}

#[tokio::test]
async fn undecodable_records_surface_as_a_final_composite_error() {
    let server = MockServer::start().await;

    // did-2 carries a URL with no authz: conversion must fail for it alone.
    Mock::given(method("GET"))
        .and(path("/index/index"))
        .and(query_param("page", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "records": [
                record_json("did-1", &["s3://bucket/a"], AUTHZ),
                { "did": "did-2", "size": 1, "urls": ["s3://bucket/b"], "authz": [] }
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/index/index"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "records": [] })))
        .mount(&server)
        .await;

    let items: Vec<_> = client(&server)
        .list_objects_by_project()
        .collect::<Vec<_>>()
        .await;
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].as_ref().unwrap().id, "did-1");
    assert!(matches!(items[1], Err(ClientError::Partial(_))));
}

#[tokio::test]
async fn project_sample_stops_at_the_limit() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/index/index"))
        .and(query_param("page", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "records": [
                record_json("did-1", &["s3://bucket/a"], AUTHZ),
                record_json("did-2", &["s3://bucket/b"], AUTHZ),
                record_json("did-3", &["s3://bucket/c"], AUTHZ)
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/index/index"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "records": [] })))
        .mount(&server)
        .await;

    let sample = client(&server).project_sample(2).await.unwrap();
    assert_eq!(sample.len(), 2);
}

#[tokio::test]
async fn project_sweep_continues_past_failing_records() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/index/index"))
        .and(query_param("authz", AUTHZ))
        .and(query_param("page", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "records": [
                record_json("did-1", &["s3://bucket/a"], AUTHZ),
                record_json("did-2", &["s3://bucket/b"], AUTHZ)
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/index/index"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "records": [] })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/index/did-1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(record_json("did-1", &["s3://bucket/a"], AUTHZ)),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/index/did-2"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(record_json("did-2", &["s3://bucket/b"], AUTHZ)),
        )
        .mount(&server)
        .await;
    // did-1 deletes cleanly; did-2 is rejected. The sweep still succeeds.
    Mock::given(method("DELETE"))
        .and(path("/index/index/did-1"))
        .and(query_param("rev", "rev-1"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/index/index/did-2"))
        .respond_with(ResponseTemplate::new(409).set_body_string("rev mismatch"))
        .expect(1)
        .mount(&server)
        .await;

    client(&server).delete_records_by_project().await.unwrap();
}

#[tokio::test]
async fn missing_object_is_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/ga4gh/drs/v1/objects/did-404"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = client(&server).get_object("did-404").await.unwrap_err();
    assert!(matches!(err, ClientError::NotFound { did } if did == "did-404"));
}
