//! Per-request metrics layer.

use axum::{body::Body, extract::MatchedPath, http::Request, middleware::Next, response::Response};
use std::time::Instant;

/// Route template of the request (`/api/v1/rides/{id}`), falling back
/// to the raw path outside the router. Templates keep label
/// cardinality bounded.
fn route_template(request: &Request<Body>) -> String {
    match request.extensions().get::<MatchedPath>() {
        Some(matched) => matched.as_str().to_string(),
        None => request.uri().path().to_string(),
    }
}

/// Records `mobility_http_requests_total` (method/path/status) and
/// `mobility_http_request_duration_seconds` (method/path).
pub async fn http_metrics_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().to_string();
    let path = route_template(&request);

    let started = Instant::now();
    let response = next.run(request).await;

    metrics::histogram!(
        "mobility_http_request_duration_seconds",
        "method" => method.clone(),
        "path" => path.clone()
    )
    .record(started.elapsed().as_secs_f64());
    metrics::counter!(
        "mobility_http_requests_total",
        "method" => method,
        "path" => path,
        "status" => response.status().as_u16().to_string()
    )
    .increment(1);

    response
}
