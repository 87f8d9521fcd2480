//! HTTP endpoint tests driven through the router with `oneshot`

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header::CONTENT_LENGTH, Request, StatusCode},
    Router,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use http_body_util::BodyExt;
use lopdf::{dictionary, Document, Object, Stream};
use pretty_assertions::assert_eq;
use quota_engine::{SqliteBackend, StorageBackend, StorageRecord};
use serde_json::{json, Value};
use tower::ServiceExt;

use crate::auth::{ADMIN_TOKEN_HEADER, USER_ID_HEADER};
use crate::build_router;
use crate::state::AppState;

const MB: i64 = 1024 * 1024;
const ADMIN_TOKEN: &str = "test-admin-token";

/// Letter-sized PDF with `num_pages` blank pages
fn sample_pdf(num_pages: u32) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();

    let kids: Vec<Object> = (0..num_pages)
        .map(|_| {
            let content_id = doc.add_object(Stream::new(dictionary! {}, b"0 0 m 10 10 l S".to_vec()));
            doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Contents" => content_id,
            })
            .into()
        })
        .collect();

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Count" => i64::from(num_pages),
            "Kids" => kids,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

async fn test_app() -> (Router, SqliteBackend) {
    let backend = SqliteBackend::in_memory().await.unwrap();
    let state = AppState::with_backend(Arc::new(backend.clone()), 10_000)
        .with_admin_token(Some(ADMIN_TOKEN.to_string()));
    (build_router(state, 20 * MB as usize), backend)
}

fn pdf_request(uri: &str, user: Option<&str>, body: Vec<u8>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(CONTENT_LENGTH, body.len());
    if let Some(user) = user {
        builder = builder.header(USER_ID_HEADER, user);
    }
    builder.body(Body::from(body)).unwrap()
}

fn json_request(method: &str, uri: &str, user: Option<&str>, body: &Value) -> Request<Body> {
    let bytes = serde_json::to_vec(body).unwrap();
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .header(CONTENT_LENGTH, bytes.len());
    if let Some(user) = user {
        builder = builder.header(USER_ID_HEADER, user);
    }
    builder.body(Body::from(bytes)).unwrap()
}

fn get_request(uri: &str, user: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(user) = user {
        builder = builder.header(USER_ID_HEADER, user);
    }
    builder.body(Body::empty()).unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

async fn stored_usage(backend: &SqliteBackend, user: &str) -> Option<i64> {
    backend
        .storage_record(user)
        .await
        .unwrap()
        .map(|record| record.total_storage_used)
}

#[tokio::test]
async fn test_health_returns_200() {
    let (app, _) = test_app().await;
    let (status, json) = send(&app, get_request("/health", None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["service"], "revise-server");
}

#[tokio::test]
async fn test_tiers_lists_catalog() {
    let (app, _) = test_app().await;
    let (status, json) = send(&app, get_request("/api/subscription/tiers", None)).await;

    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = json
        .as_array()
        .unwrap()
        .iter()
        .map(|tier| tier["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Basic", "Pro", "Enterprise"]);
    assert_eq!(json[1]["maxFileSize"], 52_428_800);
}

#[tokio::test]
async fn test_gate_requires_user() {
    let (app, _) = test_app().await;
    let (status, json) = send(
        &app,
        pdf_request("/api/process-pdf?type=compress", None, sample_pdf(1)),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["success"], false);
    assert_eq!(json["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_gate_requires_content_length() {
    let (app, _) = test_app().await;
    let request = Request::builder()
        .method("POST")
        .uri("/api/upload")
        .header(USER_ID_HEADER, "alice")
        .body(Body::from(sample_pdf(1)))
        .unwrap();

    let (status, json) = send(&app, request).await;
    assert_eq!(status, StatusCode::LENGTH_REQUIRED);
    assert_eq!(json["code"], "LENGTH_REQUIRED");
}

#[tokio::test]
async fn test_gate_denies_oversized_file_before_handler() {
    let (app, backend) = test_app().await;
    let pdf = sample_pdf(1);
    backend
        .upsert_storage_record(&StorageRecord {
            user_id: "alice".to_string(),
            max_file_size_limit: 100,
            total_storage_limit: 10 * MB,
            total_storage_used: 0,
        })
        .await
        .unwrap();

    let (status, json) = send(&app, pdf_request("/api/upload", Some("alice"), pdf.clone())).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["canUpload"], false);
    assert_eq!(
        json["reason"],
        format!(
            "File size ({}) exceeds your plan limit of 100 Bytes",
            quota_engine::format_bytes(pdf.len() as i64)
        )
    );
    assert_eq!(stored_usage(&backend, "alice").await, Some(0));
}

#[tokio::test]
async fn test_gate_denies_when_storage_full() {
    let (app, backend) = test_app().await;
    backend
        .upsert_storage_record(&StorageRecord {
            user_id: "bob".to_string(),
            max_file_size_limit: 10 * MB,
            total_storage_limit: MB,
            total_storage_used: MB,
        })
        .await
        .unwrap();

    let (status, json) = send(
        &app,
        pdf_request("/api/process-pdf?type=compress", Some("bob"), sample_pdf(1)),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(json["reason"]
        .as_str()
        .unwrap()
        .starts_with("Not enough storage space"));
    assert_eq!(json["availableStorage"], 0);
}

#[tokio::test]
async fn test_upload_returns_metadata_and_records_usage() {
    let (app, backend) = test_app().await;
    let pdf = sample_pdf(3);

    let (status, json) = send(&app, pdf_request("/api/upload", Some("carol"), pdf.clone())).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["metadata"]["pageCount"], 3);
    assert_eq!(json["usageRecorded"], true);
    assert_eq!(stored_usage(&backend, "carol").await, Some(pdf.len() as i64));
}

#[tokio::test]
async fn test_upload_rejects_invalid_pdf_without_recording() {
    let (app, backend) = test_app().await;
    let (status, json) = send(
        &app,
        pdf_request("/api/upload", Some("dave"), b"not a pdf".to_vec()),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["code"], "INVALID_PDF");
    assert_eq!(stored_usage(&backend, "dave").await, None);
}

#[tokio::test]
async fn test_process_rotate_returns_document_and_records_usage() {
    let (app, backend) = test_app().await;
    let pdf = sample_pdf(2);

    let (status, json) = send(
        &app,
        pdf_request(
            "/api/process-pdf?type=rotate&rotationAngle=90",
            Some("erin"),
            pdf.clone(),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["operation"], "Rotate PDF");
    assert_eq!(json["originalSize"], pdf.len());

    let data = BASE64.decode(json["data"].as_str().unwrap()).unwrap();
    assert_eq!(json["processedSize"], data.len());
    let doc = Document::load_mem(&data).unwrap();
    let pages = revise_core::document::page_ids(&doc);
    assert_eq!(pages.len(), 2);
    for page in pages {
        assert_eq!(revise_core::document::rotation(&doc, page), 90);
    }

    assert_eq!(stored_usage(&backend, "erin").await, Some(pdf.len() as i64));
}

#[tokio::test]
async fn test_process_split_uses_page_list() {
    let (app, _) = test_app().await;
    let (status, json) = send(
        &app,
        pdf_request(
            "/api/process-pdf?type=split&pages=3,1",
            Some("frank"),
            sample_pdf(3),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let data = BASE64.decode(json["data"].as_str().unwrap()).unwrap();
    assert_eq!(revise_core::page_count(&data).unwrap(), 2);
}

#[tokio::test]
async fn test_process_requires_type() {
    let (app, _) = test_app().await;
    let (status, json) = send(
        &app,
        pdf_request("/api/process-pdf", Some("gina"), sample_pdf(1)),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Missing processing type");
}

#[tokio::test]
async fn test_process_failure_is_not_recorded() {
    let (app, backend) = test_app().await;
    let (status, json) = send(
        &app,
        pdf_request(
            "/api/process-pdf?type=rotate&rotationAngle=45",
            Some("hank"),
            sample_pdf(1),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["code"], "PROCESSING_FAILED");
    assert_eq!(stored_usage(&backend, "hank").await, None);
}

#[tokio::test]
async fn test_merge_concatenates_and_records_input_size() {
    let (app, backend) = test_app().await;
    let first = sample_pdf(2);
    let second = sample_pdf(1);
    let body = json!({ "files": [BASE64.encode(&first), BASE64.encode(&second)] });

    let (status, json) = send(
        &app,
        json_request("POST", "/api/process-pdf/merge", Some("ivy"), &body),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["operation"], "Merge PDFs");
    let data = BASE64.decode(json["data"].as_str().unwrap()).unwrap();
    assert_eq!(revise_core::page_count(&data).unwrap(), 3);

    let input = (first.len() + second.len()) as i64;
    assert_eq!(json["originalSize"], input);
    assert_eq!(stored_usage(&backend, "ivy").await, Some(input));
}

#[tokio::test]
async fn test_merge_rejects_bad_base64() {
    let (app, _) = test_app().await;
    let body = json!({ "files": ["%%%"] });
    let (status, json) = send(
        &app,
        json_request("POST", "/api/process-pdf/merge", Some("jack"), &body),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"]
        .as_str()
        .unwrap()
        .starts_with("Invalid base64 in file 0"));
}

#[tokio::test]
async fn test_metadata_is_ungated() {
    let (app, _) = test_app().await;
    let (status, json) = send(&app, pdf_request("/api/metadata", None, sample_pdf(4))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["pageCount"], 4);
    assert_eq!(json["dimensions"]["width"], 612.0);
}

#[tokio::test]
async fn test_metadata_rejects_garbage() {
    let (app, _) = test_app().await;
    let (status, json) = send(
        &app,
        pdf_request("/api/metadata", None, b"%PDF-1.7 broken".to_vec()),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(json["error"]
        .as_str()
        .unwrap()
        .starts_with("Failed to read PDF metadata"));
}

#[tokio::test]
async fn test_validate_reports_result() {
    let (app, _) = test_app().await;

    let (status, json) = send(&app, pdf_request("/api/validate", None, sample_pdf(1))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({ "isValid": true }));

    let (status, json) = send(&app, pdf_request("/api/validate", None, b"junk".to_vec())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["isValid"], false);
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn test_subscription_reports_usage() {
    let (app, backend) = test_app().await;
    backend
        .upsert_storage_record(&StorageRecord {
            user_id: "kate".to_string(),
            max_file_size_limit: 10 * MB,
            total_storage_limit: 100 * MB,
            total_storage_used: 50 * MB,
        })
        .await
        .unwrap();

    let (status, json) = send(&app, get_request("/api/subscription", Some("kate"))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["usagePercentage"], 50);
    assert_eq!(json["storageUsed"], "50 MB");
    assert_eq!(json["storageLimit"], "100 MB");
    assert_eq!(json["limits"]["tierName"], "Basic");
    assert_eq!(json["tier"]["price"], "$9/month");
}

#[tokio::test]
async fn test_subscription_requires_user() {
    let (app, _) = test_app().await;
    let (status, _) = send(&app, get_request("/api/subscription", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

fn limits_request(user: Option<&str>, admin_token: Option<&str>, body: &Value) -> Request<Body> {
    let mut request = json_request("PUT", "/api/subscription/limits", user, body);
    if let Some(token) = admin_token {
        request
            .headers_mut()
            .insert(ADMIN_TOKEN_HEADER, token.parse().unwrap());
    }
    request
}

#[tokio::test]
async fn test_update_limits_applies_tier_for_admin() {
    let (app, backend) = test_app().await;
    backend.update_storage_usage("liam", 1234).await.unwrap();

    let (status, json) = send(
        &app,
        limits_request(
            None,
            Some(ADMIN_TOKEN),
            &json!({ "userId": "liam", "productName": "Pro" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["limits"]["maxFileSize"], 50 * MB);
    assert_eq!(json["limits"]["totalStorageLimit"], 1024 * MB);
    assert_eq!(json["limits"]["currentStorageUsed"], 1234);
}

#[tokio::test]
async fn test_user_cannot_raise_own_limits() {
    let (app, backend) = test_app().await;
    let seeded = StorageRecord {
        user_id: "mallory".to_string(),
        max_file_size_limit: 100,
        total_storage_limit: 100,
        total_storage_used: 100,
    };
    backend.upsert_storage_record(&seeded).await.unwrap();

    let (status, _) = send(&app, pdf_request("/api/upload", Some("mallory"), sample_pdf(1))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let body = json!({ "userId": "mallory", "productName": "Enterprise" });
    for token in [None, Some("guessed-token")] {
        let (status, json) = send(&app, limits_request(Some("mallory"), token, &body)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(json["code"], "FORBIDDEN");
    }

    let stored = backend.storage_record("mallory").await.unwrap().unwrap();
    assert_eq!(stored.max_file_size_limit, 100);
    assert_eq!(stored.total_storage_limit, 100);
    assert_eq!(stored.total_storage_used, 100);

    let (status, _) = send(&app, pdf_request("/api/upload", Some("mallory"), sample_pdf(1))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_update_limits_disabled_without_admin_token() {
    let backend = SqliteBackend::in_memory().await.unwrap();
    let state = AppState::with_backend(Arc::new(backend.clone()), 10_000);
    let app = build_router(state, 20 * MB as usize);

    let (status, _) = send(
        &app,
        limits_request(
            None,
            Some(""),
            &json!({ "userId": "nina", "productName": "Enterprise" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(backend.storage_record("nina").await.unwrap(), None);
}

#[tokio::test]
async fn test_update_limits_requires_user_id() {
    let (app, _) = test_app().await;
    let (status, json) = send(
        &app,
        limits_request(
            None,
            Some(ADMIN_TOKEN),
            &json!({ "userId": " ", "productName": "Pro" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "INVALID_REQUEST");
}

mod property_tests {
    use proptest::prelude::*;

    use crate::api::ProcessQuery;
    use revise_core::OperationType;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        /// Page lists from the query string keep order and duplicates
        #[test]
        fn page_list_query_round_trips(pages in prop::collection::vec(1i64..500, 1..20)) {
            let joined = pages
                .iter()
                .map(|p| p.to_string())
                .collect::<Vec<_>>()
                .join(",");
            let query = ProcessQuery {
                operation: Some("split".to_string()),
                pages: Some(joined),
                ..Default::default()
            };

            let options = query.into_options().unwrap();
            prop_assert_eq!(options.operation, OperationType::Split);
            prop_assert_eq!(options.pages, Some(pages));
        }

        /// Unrecognised operation tags map to the passthrough variant
        #[test]
        fn unknown_tags_pass_through(tag in "[a-z]{3,12}") {
            let query = ProcessQuery {
                operation: Some(tag.clone()),
                ..Default::default()
            };
            let options = query.into_options().unwrap();
            if !["merge", "split", "compress", "watermark", "rotate"].contains(&tag.as_str()) {
                prop_assert_eq!(options.operation, OperationType::Unknown);
            }
        }
    }
}
