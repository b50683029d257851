mod support;

use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{
        Request, StatusCode,
        header::{ACCEPT_ENCODING, CACHE_CONTROL, CONTENT_ENCODING, CONTENT_TYPE, RETRY_AFTER, VARY},
    },
    response::Response,
};
use serde_json::{Value, json};
use tower::ServiceExt;

use support::{MemoryTraceRepo, cache_settings, window_settings};
use vestige::application::repos::TraceRepo;
use vestige::cache::gunzip;
use vestige::infra::{
    context::TraceServices,
    http::{REQUEST_ID_HEADER, build_router},
};

fn router(repo: &Arc<MemoryTraceRepo>) -> Router {
    let repo: Arc<dyn TraceRepo> = repo.clone();
    let services =
        TraceServices::build(repo, &cache_settings(), &window_settings()).expect("services");
    build_router(services.http_state())
}

async fn post_json(router: &Router, body: Value) -> Response {
    router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/add-object")
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .expect("request"),
        )
        .await
        .expect("response")
}

async fn get_objects(router: &Router, accept_encoding: Option<&str>) -> Response {
    let mut request = Request::builder().uri("/get-objects");
    if let Some(value) = accept_encoding {
        request = request.header(ACCEPT_ENCODING, value);
    }
    router
        .clone()
        .oneshot(request.body(Body::empty()).expect("request"))
        .await
        .expect("response")
}

async fn body_bytes(response: Response) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body")
        .to_vec()
}

async fn json_body(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).expect("json body")
}

fn object_payload() -> Value {
    json!({
        "obj": {"u_uuid": "u1", "o_type": 1, "o_pos": "1,2,3", "o_rot": "0,0,0"},
        "phantom": {"u_uuid": "u1", "data": [["1,2,3", "0,0,0"]]}
    })
}

#[tokio::test]
async fn written_object_is_served_first() {
    let repo = MemoryTraceRepo::new();
    let router = router(&repo);

    let response = post_json(&router, object_payload()).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = json_body(response).await;
    assert_eq!(created["status"], "created");
    assert_eq!(created["object_id"], 1);
    assert_eq!(created["message_id"], Value::Null);
    assert_eq!(created["phantom_id"], 1);

    let response = get_objects(&router, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let window = json_body(response).await;
    let first = &window["objects"][0];
    assert_eq!(first["o_type"], 1);
    assert_eq!(first["o_pos"], "1,2,3");
    assert_eq!(first["o_rot"], "0,0,0");
    assert_eq!(window["phantoms"][0]["data"], json!([["1,2,3", "0,0,0"]]));
}

#[tokio::test]
async fn phantom_only_bundle_is_rejected() {
    let repo = MemoryTraceRepo::new();
    let router = router(&repo);

    let response = post_json(
        &router,
        json!({"phantom": {"u_uuid": "u1", "data": [["1,2,3", "0,0,0"]]}}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "invalid_bundle");
    assert_eq!(repo.counts().await, (0, 0, 0));
}

#[tokio::test]
async fn malformed_json_is_rejected() {
    let repo = MemoryTraceRepo::new();
    let router = router(&repo);

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/add-object")
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from("{\"obj\": "))
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "bad_request");
    assert_eq!(repo.counts().await, (0, 0, 0));
}

#[tokio::test]
async fn gzip_clients_receive_the_cached_bytes() {
    let repo = MemoryTraceRepo::new();
    let router = router(&repo);
    post_json(&router, object_payload()).await;

    let response = get_objects(&router, Some("gzip, deflate")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers().clone();
    assert_eq!(headers[CONTENT_ENCODING], "gzip");
    assert_eq!(headers[CONTENT_TYPE], "application/json");
    assert_eq!(headers[CACHE_CONTROL], "public, max-age=30");
    assert_eq!(headers[VARY], "accept-encoding");
    assert!(headers.contains_key(REQUEST_ID_HEADER));

    let compressed = body_bytes(response).await;
    let window: Value = serde_json::from_slice(&gunzip(&compressed).expect("gunzip")).expect("json");
    assert_eq!(window["objects"].as_array().map(Vec::len), Some(1));

    let again = body_bytes(get_objects(&router, Some("gzip")).await).await;
    assert_eq!(again, compressed);
    assert_eq!(repo.window_reads(), 1);
}

#[tokio::test]
async fn plain_clients_receive_decompressed_json() {
    let repo = MemoryTraceRepo::new();
    let router = router(&repo);

    let response = get_objects(&router, Some("identity")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(CONTENT_ENCODING).is_none());
    let window = json_body(response).await;
    assert_eq!(window, json!({"objects": [], "messages": [], "phantoms": []}));
}

#[tokio::test]
async fn store_outage_on_read_is_a_server_error() {
    let repo = MemoryTraceRepo::new();
    let router = router(&repo);
    repo.fail_reads(true);

    let response = get_objects(&router, None).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "repo_error");
}

#[tokio::test]
async fn health_reports_store_availability() {
    let repo = MemoryTraceRepo::new();
    let router = router(&repo);

    let health = |router: Router| async move {
        router
            .oneshot(
                Request::builder()
                    .uri("/_health/db")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response")
    };

    assert_eq!(health(router.clone()).await.status(), StatusCode::NO_CONTENT);
    repo.fail_ping(true);
    assert_eq!(
        health(router.clone()).await.status(),
        StatusCode::SERVICE_UNAVAILABLE
    );
}

#[tokio::test]
async fn unknown_routes_return_json_not_found() {
    let repo = MemoryTraceRepo::new();
    let router = router(&repo);

    let response = get_objects(&router, None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/objects")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await["error"]["code"], "not_found");
}

#[tokio::test]
async fn exhausted_pool_asks_writers_to_retry() {
    let repo = MemoryTraceRepo::new();
    let router = router(&repo);
    repo.exhaust_pool(true);

    let response = post_json(&router, object_payload()).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.headers()[RETRY_AFTER], "1");
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "pool_exhausted");
}

#[tokio::test]
async fn nul_characters_are_a_client_error() {
    let repo = MemoryTraceRepo::new();
    let router = router(&repo);

    let response = post_json(
        &router,
        json!({
            "message": {"u_uuid": "u1", "part1": "look\u{0}", "part2": "", "part3": ""},
            "phantom": {"u_uuid": "u1", "data": [["1,2,3", "0,0,0"]]}
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "invalid_bundle");
    assert_eq!(repo.counts().await, (0, 0, 0));
}
