//! Router-level tests over in-memory stores and scripted collaborators.

use api_lib::adapters::fetcher::{AssetFetcher, FetchError, FetchedAsset};
use api_lib::web::{
    router,
    state::{AppState, Ports},
};
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tower::ServiceExt;
use trip_mate_core::ingestion::IngestionLimits;
use trip_mate_core::memory::{MemoryDocumentStore, MemoryLedger, MemoryObjectStore};
use trip_mate_core::ports::{
    AiGateway, EncodedImage, ImageProcessor, ItemStore, PortResult, TripStore,
};
use trip_mate_core::view_model::compute_stats;

//=========================================================================================
// Scripted Collaborators
//=========================================================================================

/// Classifies images by their leading bytes: "garbage" gets prose back,
/// anything else a fenced expense object.
struct ScriptedGateway;

#[async_trait]
impl AiGateway for ScriptedGateway {
    async fn analyze_image_raw(&self, base64_data: &str, _mime_type: &str) -> PortResult<String> {
        let bytes = STANDARD.decode(base64_data).unwrap_or_default();
        if bytes.starts_with(b"garbage") {
            return Ok("I could not read that receipt.".to_string());
        }
        Ok("```json\n{\"type\":\"expense\",\"category\":\"food\",\"name\":\"Banh mi\",\"amount\":30000,\"description\":\"lunch\"}\n```".to_string())
    }

    async fn summarize_expenses(&self, expenses_json: &str) -> PortResult<String> {
        let count = serde_json::from_str::<Vec<Value>>(expenses_json)
            .map(|v| v.len())
            .unwrap_or(0);
        Ok(format!("You logged {} expenses.", count))
    }
}

struct PassThroughImaging;

#[async_trait]
impl ImageProcessor for PassThroughImaging {
    async fn compress(&self, data: Bytes, content_type: &str) -> PortResult<EncodedImage> {
        Ok(EncodedImage {
            data,
            content_type: content_type.to_string(),
        })
    }

    async fn thumbnail(&self, _data: Bytes) -> PortResult<EncodedImage> {
        Ok(EncodedImage {
            data: Bytes::from_static(b"thumb"),
            content_type: "image/webp".to_string(),
        })
    }

    async fn blur_placeholder(&self, _data: Bytes) -> PortResult<String> {
        Ok("data:image/webp;base64,AAAA".to_string())
    }
}

#[derive(Default)]
struct CountingFetcher {
    calls: AtomicUsize,
}

#[async_trait]
impl AssetFetcher for CountingFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedAsset, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if url.contains("missing") {
            return Err(FetchError::Upstream(404));
        }
        Ok(FetchedAsset {
            data: Bytes::from_static(b"jpeg-bytes"),
            content_type: Some("image/jpeg".to_string()),
        })
    }
}

//=========================================================================================
// Harness
//=========================================================================================

struct TestApp {
    router: Router,
    store: Arc<MemoryDocumentStore>,
    objects: Arc<MemoryObjectStore>,
    fetcher: Arc<CountingFetcher>,
}

fn test_app_with(limits: IngestionLimits) -> TestApp {
    let store = Arc::new(MemoryDocumentStore::new());
    let objects = Arc::new(MemoryObjectStore::new());
    let fetcher = Arc::new(CountingFetcher::default());
    let state = AppState::new(
        Ports {
            trips: store.clone(),
            items: store.clone(),
            objects: objects.clone(),
            ledger: Arc::new(MemoryLedger::new()),
            ai: Arc::new(ScriptedGateway),
            imaging: Arc::new(PassThroughImaging),
            fetcher: fetcher.clone(),
        },
        limits,
        8,
    );
    TestApp {
        router: router(Arc::new(state)),
        store,
        objects,
        fetcher,
    }
}

fn test_app() -> TestApp {
    test_app_with(IngestionLimits::default())
}

impl TestApp {
    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Request::get(uri).body(Body::empty()).unwrap()).await
    }

    async fn json(&self, method: &str, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(
            Request::builder()
                .method(method)
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    async fn delete(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Request::delete(uri).body(Body::empty()).unwrap())
            .await
    }

    async fn create_trip(&self) -> String {
        let (status, body) = self
            .json(
                "POST",
                "/trips",
                json!({
                    "tripName": "Test",
                    "totalBudget": 1000,
                    "startDate": "2025-01-01",
                    "currency": "VND",
                    "memberCount": 2,
                    "createdBy": "u1"
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        body["tripId"].as_str().unwrap().to_string()
    }
}

const BOUNDARY: &str = "trip-mate-test-boundary";

enum Part<'a> {
    Text(&'a str, &'a str),
    File {
        field: &'a str,
        file_name: &'a str,
        content_type: &'a str,
        data: &'a [u8],
    },
}

fn multipart_request(uri: &str, parts: &[Part<'_>]) -> Request<Body> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name)
                        .as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            Part::File {
                field,
                file_name,
                content_type,
                data,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                        field, file_name, content_type
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(data);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    Request::post(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

//=========================================================================================
// Trips
//=========================================================================================

#[tokio::test]
async fn created_trip_reads_back() {
    let app = test_app();
    let trip_id = app.create_trip().await;

    let (status, body) = app.get(&format!("/trips/{}", trip_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["trip"]["tripName"], "Test");
    assert_eq!(body["trip"]["memberCount"], 2);
    assert_eq!(body["trip"]["currency"], "VND");

    let (status, body) = app.get("/trips?userId=u1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["trips"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn listing_trips_requires_a_user() {
    let app = test_app();
    let (status, body) = app.get("/trips").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("userId"));
}

#[tokio::test]
async fn creating_a_trip_reports_the_missing_field() {
    let app = test_app();
    let (status, body) = app
        .json(
            "POST",
            "/trips",
            json!({ "tripName": "Test", "startDate": "2025-01-01", "currency": "VND", "memberCount": 2, "createdBy": "u1" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("totalBudget"));
}

#[tokio::test]
async fn unknown_trip_is_not_found() {
    let app = test_app();
    let (status, body) = app.get("/trips/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn patch_changes_only_the_given_fields() {
    let app = test_app();
    let trip_id = app.create_trip().await;
    let (status, _) = app
        .json("PATCH", &format!("/trips/{}", trip_id), json!({ "memberCount": 4 }))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app.get(&format!("/trips/{}", trip_id)).await;
    assert_eq!(body["trip"]["memberCount"], 4);
    assert_eq!(body["trip"]["tripName"], "Test");
}

#[tokio::test]
async fn patch_with_null_end_date_clears_it() {
    let app = test_app();
    let trip_id = app.create_trip().await;
    let uri = format!("/trips/{}", trip_id);
    let (status, _) = app.json("PATCH", &uri, json!({ "endDate": "2025-03-01" })).await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = app.get(&uri).await;
    assert!(body["trip"]["endDate"].is_string());

    let (status, _) = app.json("PATCH", &uri, json!({ "endDate": null })).await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = app.get(&uri).await;
    assert!(body["trip"]["endDate"].is_null());
}

#[tokio::test]
async fn default_trip_is_created_once() {
    let app = test_app();
    let (status, first) = app
        .json("POST", "/trips/default", json!({ "userId": "u9" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(first["created"], true);

    let (status, second) = app
        .json("POST", "/trips/default", json!({ "userId": "u9" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["created"], false);
    assert_eq!(first["tripId"], second["tripId"]);
}

#[tokio::test]
async fn deleting_a_trip_removes_its_items() {
    let app = test_app();
    let trip_id = app.create_trip().await;
    for name in ["Taxi", "Hotel"] {
        app.json(
            "POST",
            &format!("/trips/{}/items", trip_id),
            json!({ "name": name, "category": "transport", "type": "expense", "createdBy": "u1", "amount": 10 }),
        )
        .await;
    }

    let (status, body) = app.delete(&format!("/trips/{}", trip_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["itemsDeleted"], 2);
    assert_eq!(body["partial"], false);

    let (status, _) = app.get(&format!("/trips/{}", trip_id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

//=========================================================================================
// Items
//=========================================================================================

#[tokio::test]
async fn created_item_feeds_the_stats() {
    let app = test_app();
    let trip_id = app.create_trip().await;
    let (status, body) = app
        .json(
            "POST",
            &format!("/trips/{}/items", trip_id),
            json!({ "name": "Dinner", "category": "food", "type": "expense", "createdBy": "u1", "amount": 100 }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(body["itemId"].is_string());

    let (status, body) = app.get(&format!("/trips/{}/items", trip_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["items"].as_array().unwrap().len(), 1);
    assert_eq!(body["items"][0]["type"], "expense");

    let trip = app.store.get_trip(&trip_id).await.unwrap();
    let items = app.store.list_items(&trip_id).await.unwrap();
    let stats = compute_stats(&items, trip.member_count);
    assert_eq!(stats.total, 100.0);
    assert_eq!(stats.per_person, 50.0);
}

#[tokio::test]
async fn item_without_a_name_is_rejected() {
    let app = test_app();
    let trip_id = app.create_trip().await;
    let (status, body) = app
        .json(
            "POST",
            &format!("/trips/{}/items", trip_id),
            json!({ "category": "food", "type": "expense", "createdBy": "u1" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("name"));
}

#[tokio::test]
async fn deleting_a_missing_item_succeeds() {
    let app = test_app();
    let trip_id = app.create_trip().await;
    let (status, body) = app
        .delete(&format!("/trips/{}/items/nonexistent", trip_id))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["alreadyDeleted"], true);
}

#[tokio::test]
async fn second_delete_reports_already_deleted() {
    let app = test_app();
    let trip_id = app.create_trip().await;
    let (_, created) = app
        .json(
            "POST",
            &format!("/trips/{}/items", trip_id),
            json!({ "name": "Beach", "category": "scenery", "type": "memory", "createdBy": "u1" }),
        )
        .await;
    let uri = format!("/trips/{}/items/{}", trip_id, created["itemId"].as_str().unwrap());

    let (_, first) = app.delete(&uri).await;
    assert_eq!(first["alreadyDeleted"], false);
    let (_, second) = app.delete(&uri).await;
    assert_eq!(second["alreadyDeleted"], true);

    let (status, _) = app.get(&uri).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn replacing_an_item_keeps_its_owner() {
    let app = test_app();
    let trip_id = app.create_trip().await;
    let (_, created) = app
        .json(
            "POST",
            &format!("/trips/{}/items", trip_id),
            json!({ "name": "Coffee", "category": "food", "type": "expense", "createdBy": "u1", "amount": 3 }),
        )
        .await;
    let uri = format!("/trips/{}/items/{}", trip_id, created["itemId"].as_str().unwrap());

    let (status, body) = app
        .json(
            "PUT",
            &uri,
            json!({ "name": "Iced coffee", "category": "food", "type": "expense", "amount": 4 }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["item"]["name"], "Iced coffee");
    assert_eq!(body["item"]["amount"], 4.0);
    assert_eq!(body["item"]["createdBy"], "u1");
}

#[tokio::test]
async fn live_feed_opens_with_a_snapshot() {
    let app = test_app();
    let trip_id = app.create_trip().await;
    app.json(
        "POST",
        &format!("/trips/{}/items", trip_id),
        json!({ "name": "Museum", "category": "entertainment", "type": "expense", "createdBy": "u1", "amount": 12 }),
    )
    .await;

    let response = app
        .router
        .clone()
        .oneshot(
            Request::get(format!("/trips/{}/items/live", trip_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let mut body = response.into_body();
    let frame = body.frame().await.unwrap().unwrap();
    let text = String::from_utf8(frame.into_data().unwrap().to_vec()).unwrap();
    assert!(text.contains("event: snapshot"));
    assert!(text.contains("Museum"));
}

#[tokio::test]
async fn live_feed_for_unknown_trip_is_not_found() {
    let app = test_app();
    let (status, _) = app.get("/trips/nope/items/live").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

//=========================================================================================
// Uploads and Ingestion
//=========================================================================================

#[tokio::test]
async fn upload_stores_original_and_thumbnail() {
    let app = test_app();
    let (status, body) = app
        .send(multipart_request(
            "/upload",
            &[
                Part::Text("tripId", "t1"),
                Part::File {
                    field: "file",
                    file_name: "receipt.jpg",
                    content_type: "image/jpeg",
                    data: b"receipt-bytes",
                },
            ],
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isVideo"], false);
    assert!(body["path"].as_str().unwrap().starts_with("trips/t1/"));
    assert_eq!(app.objects.len(), 2);

    let path = body["path"].as_str().unwrap().to_string();
    let (status, _) = app.json("DELETE", "/upload", json!({ "path": path })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.objects.len(), 1);
}

#[tokio::test]
async fn oversized_image_is_rejected() {
    let app = test_app_with(IngestionLimits {
        max_image_bytes: 8,
        max_video_bytes: 1024,
    });
    let (status, body) = app
        .send(multipart_request(
            "/upload",
            &[
                Part::Text("tripId", "t1"),
                Part::File {
                    field: "file",
                    file_name: "big.jpg",
                    content_type: "image/jpeg",
                    data: b"far more than eight bytes",
                },
            ],
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("exceeds"));
    assert!(app.objects.is_empty());
}

#[tokio::test]
async fn upload_without_trip_is_rejected() {
    let app = test_app();
    let (status, body) = app
        .send(multipart_request(
            "/upload",
            &[Part::File {
                field: "file",
                file_name: "a.jpg",
                content_type: "image/jpeg",
                data: b"abc",
            }],
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No tripId provided");
}

#[tokio::test]
async fn ingest_reports_the_failing_file() {
    let app = test_app();
    let trip_id = app.create_trip().await;
    let (status, body) = app
        .send(multipart_request(
            &format!("/trips/{}/ingest", trip_id),
            &[
                Part::Text("createdBy", "u1"),
                Part::File {
                    field: "file",
                    file_name: "lunch.jpg",
                    content_type: "image/jpeg",
                    data: b"receipt",
                },
                Part::File {
                    field: "file",
                    file_name: "blurry.jpg",
                    content_type: "image/jpeg",
                    data: b"garbage",
                },
            ],
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);
    assert_eq!(body["succeeded"], 1);
    assert_eq!(body["outcome"], "partial_failure");
    assert_eq!(body["failures"][0]["fileName"], "blurry.jpg");

    let items = app.store.list_items(&trip_id).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].name, "Banh mi");
}

fn receipt_of(len: usize) -> Vec<u8> {
    let mut data = b"receipt".to_vec();
    data.resize(len, b'.');
    data
}

#[tokio::test]
async fn ingest_accepts_a_batch_larger_than_any_single_file_ceiling() {
    let app = test_app_with(IngestionLimits {
        max_image_bytes: 600 * 1024,
        max_video_bytes: 600 * 1024,
    });
    let trip_id = app.create_trip().await;
    let photo = receipt_of(500 * 1024);
    let names = ["a.jpg", "b.jpg", "c.jpg", "d.jpg"];
    let mut parts = vec![Part::Text("createdBy", "u1")];
    parts.extend(names.iter().map(|name| Part::File {
        field: "files",
        file_name: *name,
        content_type: "image/jpeg",
        data: &photo,
    }));

    let (status, body) = app
        .send(multipart_request(&format!("/trips/{}/ingest", trip_id), &parts))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 4);
    assert_eq!(body["succeeded"], 4);
    assert_eq!(body["outcome"], "all_succeeded");
    assert_eq!(app.store.list_items(&trip_id).await.unwrap().len(), 4);
}

#[tokio::test]
async fn ingest_skips_only_the_file_over_its_ceiling() {
    let app = test_app_with(IngestionLimits {
        max_image_bytes: 600 * 1024,
        max_video_bytes: 600 * 1024,
    });
    let trip_id = app.create_trip().await;
    let small = receipt_of(100 * 1024);
    let huge = receipt_of(2 * 1024 * 1024);
    let (status, body) = app
        .send(multipart_request(
            &format!("/trips/{}/ingest", trip_id),
            &[
                Part::Text("createdBy", "u1"),
                Part::File {
                    field: "file",
                    file_name: "small.jpg",
                    content_type: "image/jpeg",
                    data: &small,
                },
                Part::File {
                    field: "file",
                    file_name: "huge.jpg",
                    content_type: "image/jpeg",
                    data: &huge,
                },
                Part::File {
                    field: "file",
                    file_name: "also-small.jpg",
                    content_type: "image/jpeg",
                    data: &small,
                },
            ],
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 3);
    assert_eq!(body["succeeded"], 2);
    assert_eq!(body["outcome"], "partial_failure");
    assert_eq!(body["failures"][0]["fileName"], "huge.jpg");
    assert_eq!(body["failures"][0]["stage"], "size_validation");
    // Only the two accepted originals and their thumbnails were stored.
    assert_eq!(app.objects.len(), 4);
}

//=========================================================================================
// AI and Downloads
//=========================================================================================

#[tokio::test]
async fn analyze_image_decodes_fenced_replies() {
    let app = test_app();
    let (status, body) = app
        .json(
            "POST",
            "/ai/analyze-image",
            json!({ "base64Data": STANDARD.encode(b"receipt"), "mimeType": "image/jpeg" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["type"], "expense");
    assert_eq!(body["category"], "food");
    assert_eq!(body["amount"], 30000.0);
}

#[tokio::test]
async fn analyze_image_with_unreadable_reply_fails() {
    let app = test_app();
    let (status, body) = app
        .json(
            "POST",
            "/ai/analyze-image",
            json!({ "base64Data": STANDARD.encode(b"garbage"), "mimeType": "image/jpeg" }),
        )
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Failed to analyze image");
}

#[tokio::test]
async fn analyze_expenses_requires_an_array() {
    let app = test_app();
    let (status, body) = app
        .json("POST", "/ai/analyze-expenses", json!({ "expenses": "lots" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing or invalid expenses array");

    let (status, body) = app
        .json(
            "POST",
            "/ai/analyze-expenses",
            json!({ "expenses": [{ "name": "Taxi", "amount": 5 }] }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["analysis"], "You logged 1 expenses.");
}

#[tokio::test]
async fn download_is_served_as_attachment_and_cached() {
    let app = test_app();
    let uri = "/download?url=https%3A%2F%2Fcdn.example.com%2Fa.jpg&filename=beach.jpg";
    for _ in 0..2 {
        let response = app
            .router
            .clone()
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/jpeg");
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"beach.jpg\""
        );
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"jpeg-bytes");
    }
    assert_eq!(app.fetcher.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn download_rejects_non_http_urls() {
    let app = test_app();
    let (status, _) = app.get("/download?url=file%3A%2F%2F%2Fetc%2Fpasswd").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = app.get("/download").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(app.fetcher.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn download_passes_upstream_status_through() {
    let app = test_app();
    let (status, body) = app
        .get("/download?url=https%3A%2F%2Fcdn.example.com%2Fmissing.jpg")
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Failed to fetch file");
}
