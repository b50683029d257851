use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::{
        HeaderMap, HeaderValue, StatusCode,
        header::{ACCEPT_ENCODING, CACHE_CONTROL, CONTENT_ENCODING, CONTENT_TYPE, VARY},
    },
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use bytes::Bytes;
use serde::Serialize;

use crate::{
    application::{repos::TraceRepo, traces::TraceWriteService, window::WindowService},
    domain::traces::TraceBundleDraft,
};

use super::{
    db_health_response,
    error::ApiError,
    middleware::{log_responses, set_request_context},
};

#[derive(Clone)]
pub struct HttpState {
    pub window: Arc<WindowService>,
    pub traces: Arc<TraceWriteService>,
    pub repo: Arc<dyn TraceRepo>,
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/get-objects", get(get_objects))
        .route("/add-object", post(add_object))
        .route("/_health/db", get(db_health))
        .fallback(fallback)
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

async fn get_objects(State(state): State<HttpState>, headers: HeaderMap) -> Response {
    let snapshot = match state.window.snapshot().await {
        Ok(snapshot) => snapshot,
        Err(err) => return ApiError::from(err).into_response(),
    };
    let max_age = state.window.ttl().as_secs();

    if accepts_gzip(&headers) {
        return window_response(snapshot.into_gzip(), true, max_age);
    }

    match snapshot.json() {
        Ok(json) => window_response(json, false, max_age),
        Err(err) => ApiError::from(err).into_response(),
    }
}

fn window_response(body: Bytes, gzip: bool, max_age: u64) -> Response {
    let mut response = (StatusCode::OK, body).into_response();
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(VARY, HeaderValue::from_static("accept-encoding"));
    if let Ok(value) = HeaderValue::from_str(&format!("public, max-age={max_age}")) {
        headers.insert(CACHE_CONTROL, value);
    }
    if gzip {
        headers.insert(CONTENT_ENCODING, HeaderValue::from_static("gzip"));
    }
    response
}

#[derive(Debug, Serialize)]
struct CreatedBody {
    status: &'static str,
    object_id: Option<i64>,
    message_id: Option<i64>,
    phantom_id: i64,
}

async fn add_object(
    State(state): State<HttpState>,
    payload: Result<Json<TraceBundleDraft>, JsonRejection>,
) -> Response {
    let Json(draft) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            return ApiError::bad_request("Malformed JSON body", Some(rejection.body_text()))
                .into_response();
        }
    };

    match state.traces.record(draft).await {
        Ok(inserted) => (
            StatusCode::CREATED,
            Json(CreatedBody {
                status: "created",
                object_id: inserted.object_id,
                message_id: inserted.message_id,
                phantom_id: inserted.phantom_id,
            }),
        )
            .into_response(),
        Err(err) => ApiError::from(err).into_response(),
    }
}

async fn db_health(State(state): State<HttpState>) -> Response {
    db_health_response(state.repo.ping().await)
}

async fn fallback() -> Response {
    ApiError::not_found("Route not found").into_response()
}

/// Whether `Accept-Encoding` admits gzip, honouring `q=0` and `*`.
fn accepts_gzip(headers: &HeaderMap) -> bool {
    let mut wildcard = None;
    for value in headers.get_all(ACCEPT_ENCODING) {
        let Ok(value) = value.to_str() else {
            continue;
        };
        for item in value.split(',') {
            let mut parts = item.split(';');
            let coding = parts.next().unwrap_or("").trim();
            let quality = parts
                .find_map(|param| param.trim().strip_prefix("q="))
                .and_then(|q| q.trim().parse::<f32>().ok())
                .unwrap_or(1.0);

            if coding.eq_ignore_ascii_case("gzip") || coding.eq_ignore_ascii_case("x-gzip") {
                return quality > 0.0;
            }
            if coding == "*" {
                wildcard = Some(quality > 0.0);
            }
        }
    }
    wildcard.unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT_ENCODING, HeaderValue::from_str(value).expect("header"));
        headers
    }

    #[test]
    fn gzip_negotiation() {
        assert!(accepts_gzip(&headers("gzip")));
        assert!(accepts_gzip(&headers("br, GZIP;q=0.5")));
        assert!(accepts_gzip(&headers("*")));
        assert!(!accepts_gzip(&headers("gzip;q=0")));
        assert!(!accepts_gzip(&headers("*, gzip;q=0")));
        assert!(!accepts_gzip(&headers("identity")));
        assert!(!accepts_gzip(&HeaderMap::new()));
    }
}
