//! Request correlation IDs.
//!
//! Every request gets an `x-request-id`: an incoming header survives
//! the hop (so IDs stay stable through a reverse proxy), otherwise a
//! UUID v4 is minted. The ID rides a `tracing` span around the whole
//! request and is echoed back in the response.

use axum::http::HeaderValue;
use axum::{body::Body, http::Request, middleware::Next, response::Response};
use tracing::Instrument;
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Stored in request extensions; handlers take
/// `Extension(RequestId(id)): Extension<RequestId>` when they need it.
#[derive(Clone, Debug)]
pub struct RequestId(pub String);

fn correlation_id(request: &Request<Body>) -> String {
    request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

pub async fn request_id_middleware(mut request: Request<Body>, next: Next) -> Response {
    let request_id = correlation_id(&request);
    request
        .extensions_mut()
        .insert(RequestId(request_id.clone()));

    let span = tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %request.method(),
        uri = %request.uri(),
    );

    // Instrument instead of entering the span: the guard must not be
    // held across the await.
    let mut response = next.run(request).instrument(span).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    response
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;
    use axum::Router;
    use tower::Service;

    async fn echo() -> &'static str {
        "ok"
    }

    #[tokio::test]
    async fn incoming_id_survives_the_round_trip() {
        let mut svc = Router::new()
            .route("/", get(echo))
            .layer(axum::middleware::from_fn(request_id_middleware))
            .into_service();

        let req = Request::builder()
            .uri("/")
            .header(REQUEST_ID_HEADER, "corr-1234")
            .body(Body::empty())
            .unwrap();
        let resp = svc.call(req).await.unwrap();

        assert_eq!(
            resp.headers().get(REQUEST_ID_HEADER).unwrap(),
            &HeaderValue::from_static("corr-1234")
        );
    }

    #[tokio::test]
    async fn missing_id_gets_minted() {
        let mut svc = Router::new()
            .route("/", get(echo))
            .layer(axum::middleware::from_fn(request_id_middleware))
            .into_service();

        let req = Request::builder().uri("/").body(Body::empty()).unwrap();
        let resp = svc.call(req).await.unwrap();

        let echoed = resp.headers().get(REQUEST_ID_HEADER).unwrap();
        // UUID v4 text form
        assert_eq!(echoed.to_str().unwrap().len(), 36);
    }
}
