//! Response cache middleware.
//!
//! Attached per route group with that group's policy preset. Serves cached
//! responses with their captured headers replayed and an `x-cache` header
//! describing how the response was served; passes through everything the
//! cache must not touch (non-GET methods, event-stream requests, a disabled
//! cache).

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, HeaderValue, Method, Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{instrument, warn};

use crate::cache::{ResponseCache, ServedAs};
use crate::entry::{CachedResponse, Produced};
use crate::error::BoxError;
use crate::keys::RequestDescriptor;
use crate::policy::CachePolicy;

/// Diagnostic header attached to every response served through the cache:
/// `HIT`, `STALE`, or `MISS`.
pub const CACHE_STATUS_HEADER: &str = "x-cache";

/// Shared state for [`response_cache_layer`]; one per cached route group.
#[derive(Clone)]
pub struct CacheState {
    pub cache: ResponseCache,
    pub policy: CachePolicy,
}

/// Middleware caching GET responses for one route group under its policy.
///
/// On a stale hit the cached response is returned immediately and the
/// remaining handler chain re-runs in the background to refresh the entry.
#[instrument(skip_all, fields(path = %request.uri().path()))]
pub async fn response_cache_layer(
    State(state): State<CacheState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !state.cache.config().enabled {
        return next.run(request).await;
    }
    if request.method() != Method::GET {
        return next.run(request).await;
    }
    // streaming responses cannot be buffered into a cache entry
    if wants_event_stream(request.headers()) {
        return next.run(request).await;
    }

    let descriptor = RequestDescriptor::new(
        request.method().clone(),
        request.uri(),
        request.headers().clone(),
    );
    let max_body_bytes = state.cache.config().max_body_bytes;

    let result = state
        .cache
        .lookup_or_compute(&descriptor, &state.policy, move || async move {
            let response = next.run(request).await;
            buffer_for_cache(response, max_body_bytes).await
        })
        .await;

    match result {
        Ok((cached, served_as)) => build_response(cached, served_as),
        Err(error) => {
            warn!(error = %error, "failed to buffer response for caching");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn wants_event_stream(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.contains("text/event-stream"))
}

/// Decide whether a handler response may enter the cache.
///
/// Only successful responses are stored; responses that set cookies or
/// stream are returned to the client uncached.
fn should_store_response(response: &Response) -> bool {
    if !response.status().is_success() {
        return false;
    }

    if response.headers().contains_key(header::SET_COOKIE) {
        return false;
    }

    if response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("text/event-stream"))
    {
        return false;
    }

    true
}

/// Buffer a handler response into the cache's stored form.
async fn buffer_for_cache(response: Response, limit: usize) -> Result<Produced, BoxError> {
    let storable = should_store_response(&response);
    let (parts, body) = response.into_parts();
    let bytes = axum::body::to_bytes(body, limit).await?;
    let cached = CachedResponse::new(parts.status, &parts.headers, bytes);
    Ok(if storable {
        Produced::Cacheable(cached)
    } else {
        Produced::Uncacheable(cached)
    })
}

fn build_response(cached: CachedResponse, served_as: ServedAs) -> Response {
    let mut response = cached.into_response();
    response.headers_mut().insert(
        CACHE_STATUS_HEADER,
        HeaderValue::from_static(served_as.as_header_value()),
    );
    response
}

#[cfg(test)]
mod tests {
    use axum::http::header::{CONTENT_TYPE, SET_COOKIE};
    use bytes::Bytes;

    use super::*;

    #[test]
    fn stores_successful_response() {
        let response = (StatusCode::OK, "body").into_response();
        assert!(should_store_response(&response));
    }

    #[test]
    fn skips_error_responses() {
        let response = (StatusCode::NOT_FOUND, "missing").into_response();
        assert!(!should_store_response(&response));
    }

    #[test]
    fn skips_responses_setting_cookies() {
        let response =
            (StatusCode::OK, [(SET_COOKIE, "session=abc")], "body").into_response();
        assert!(!should_store_response(&response));
    }

    #[test]
    fn skips_event_stream_responses() {
        let response = (
            StatusCode::OK,
            [(CONTENT_TYPE, "text/event-stream")],
            "data: x",
        )
            .into_response();
        assert!(!should_store_response(&response));
    }

    #[test]
    fn detects_event_stream_requests() {
        let mut headers = HeaderMap::new();
        assert!(!wants_event_stream(&headers));
        headers.insert(header::ACCEPT, "text/event-stream".parse().unwrap());
        assert!(wants_event_stream(&headers));
    }

    #[tokio::test]
    async fn buffer_classifies_cacheability() {
        let ok = (StatusCode::OK, "body").into_response();
        assert!(matches!(
            buffer_for_cache(ok, 1024).await.unwrap(),
            Produced::Cacheable(_)
        ));

        let not_found = (StatusCode::NOT_FOUND, "missing").into_response();
        assert!(matches!(
            buffer_for_cache(not_found, 1024).await.unwrap(),
            Produced::Uncacheable(_)
        ));
    }

    #[tokio::test]
    async fn buffer_enforces_body_limit() {
        let big = (StatusCode::OK, "x".repeat(64)).into_response();
        assert!(buffer_for_cache(big, 16).await.is_err());
    }

    #[test]
    fn built_response_carries_cache_status_header() {
        let cached = CachedResponse::new(
            StatusCode::OK,
            &HeaderMap::new(),
            Bytes::from_static(b"body"),
        );
        let response = build_response(cached, ServedAs::Stale);
        assert_eq!(
            response.headers().get(CACHE_STATUS_HEADER).unwrap(),
            "STALE"
        );
    }
}
