//! JSON extractor with request validation.
//!
//! `ValidatedJson<T>` deserializes like `axum::Json<T>` and then runs
//! the `validator` rules declared on `T`. Malformed JSON is a 400,
//! a rule violation is a 422; both reply with the standard
//! `ApiResponse` error envelope so clients parse one shape everywhere.

use axum::extract::rejection::JsonRejection;
use axum::extract::FromRequest;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::de::DeserializeOwned;
use validator::{Validate, ValidationErrors};

use super::ApiResponse;

/// Extractor used by every body-taking handler:
///
/// ```ignore
/// async fn credit_balance(
///     State(state): State<RiderAppState>,
///     Path(id): Path<String>,
///     ValidatedJson(body): ValidatedJson<TopUpRequest>,
/// ) -> ApiResult<RiderDto> { /* body already passed validation */ }
/// ```
pub struct ValidatedJson<T>(pub T);

/// Why extraction failed.
pub enum ValidatedJsonRejection {
    /// The body never deserialized.
    Malformed(JsonRejection),
    /// The body deserialized but broke a validation rule.
    Invalid(ValidationErrors),
}

/// Render `field: message` pairs, one per violated rule.
fn describe_violations(errors: &ValidationErrors) -> String {
    let mut parts = Vec::new();
    for (field, violations) in errors.field_errors() {
        for violation in violations {
            let detail = match &violation.message {
                Some(message) => message.to_string(),
                None => format!("{:?}", violation.code),
            };
            parts.push(format!("{field}: {detail}"));
        }
    }
    if parts.is_empty() {
        "Validation failed".to_string()
    } else {
        parts.join("; ")
    }
}

impl IntoResponse for ValidatedJsonRejection {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Malformed(rejection) => (
                StatusCode::BAD_REQUEST,
                format!("Invalid JSON: {rejection}"),
            ),
            Self::Invalid(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                describe_violations(&errors),
            ),
        };
        (status, Json(ApiResponse::<()>::error(message))).into_response()
    }
}

impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ValidatedJsonRejection;

    async fn from_request(
        req: axum::extract::Request,
        state: &S,
    ) -> Result<Self, Self::Rejection> {
        let Json(body) = Json::<T>::from_request(req, state)
            .await
            .map_err(ValidatedJsonRejection::Malformed)?;
        body.validate().map_err(ValidatedJsonRejection::Invalid)?;
        Ok(ValidatedJson(body))
    }
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use axum::routing::post;
    use axum::Router;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, Validate)]
    struct CreateLotBody {
        #[validate(length(min = 1, max = 100, message = "must be 1..=100 chars"))]
        name: String,
        #[validate(range(min = 1, max = 500))]
        capacity: u32,
    }

    async fn handler(ValidatedJson(_body): ValidatedJson<CreateLotBody>) -> &'static str {
        "ok"
    }

    async fn post_body(raw: &str) -> (StatusCode, serde_json::Value) {
        use tower::Service;
        let mut svc = Router::new().route("/lots", post(handler)).into_service();
        let req = Request::builder()
            .method("POST")
            .uri("/lots")
            .header("content-type", "application/json")
            .body(Body::from(raw.to_string()))
            .unwrap();
        let resp = svc.call(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    #[tokio::test]
    async fn valid_body_reaches_the_handler() {
        let (status, _) = post_body(r#"{"name": "Central", "capacity": 10}"#).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn malformed_json_is_a_400_with_error_envelope() {
        let (status, body) = post_body("definitely not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().starts_with("Invalid JSON"));
    }

    #[tokio::test]
    async fn rule_violation_is_a_422_naming_the_field() {
        let (status, body) = post_body(r#"{"name": "", "capacity": 10}"#).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["success"], false);
        let error = body["error"].as_str().unwrap();
        assert!(error.contains("name"), "unexpected error: {error}");
        assert!(error.contains("must be 1..=100 chars"));
    }

    #[tokio::test]
    async fn out_of_range_capacity_is_rejected() {
        let (status, body) = post_body(r#"{"name": "Central", "capacity": 0}"#).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["error"].as_str().unwrap().contains("capacity"));
    }
}
