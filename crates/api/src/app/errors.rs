use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::OriginalUri;
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde_json::json;

use cook_core::DomainError;
use cook_infra::UseCaseError;

/// Error body shared by every endpoint: `{statusCode, message, timestamp, path}`.
pub fn json_error(status: StatusCode, message: impl Into<String>, path: &str) -> Response {
    (
        status,
        Json(json!({
            "statusCode": status.as_u16(),
            "message": message.into(),
            "timestamp": Utc::now().to_rfc3339(),
            "path": path,
        })),
    )
        .into_response()
}

pub fn use_case_error_to_response(err: UseCaseError, path: &str) -> Response {
    match err {
        UseCaseError::NotFound(msg) => json_error(StatusCode::NOT_FOUND, msg, path),
        UseCaseError::Conflict(msg) => json_error(StatusCode::CONFLICT, msg, path),
        UseCaseError::InvalidInput(e) => json_error(StatusCode::BAD_REQUEST, e.to_string(), path),
        UseCaseError::Failed(_) => json_error(StatusCode::INTERNAL_SERVER_ERROR, err.to_string(), path),
    }
}

pub fn domain_error_to_response(err: DomainError, path: &str) -> Response {
    use_case_error_to_response(UseCaseError::from(err), path)
}

pub fn json_rejection(rejection: JsonRejection, path: &str) -> Response {
    json_error(StatusCode::BAD_REQUEST, rejection.body_text(), path)
}

pub fn query_rejection(rejection: QueryRejection, path: &str) -> Response {
    json_error(StatusCode::BAD_REQUEST, rejection.body_text(), path)
}

/// Parse a path segment into a typed value; failures become a 400 body.
pub fn parse<T>(raw: &str, path: &str) -> Result<T, Response>
where
    T: std::str::FromStr<Err = DomainError>,
{
    raw.parse().map_err(|e| domain_error_to_response(e, path))
}

pub async fn route_not_found(method: Method, OriginalUri(uri): OriginalUri) -> Response {
    json_error(
        StatusCode::NOT_FOUND,
        format!("Cannot {method} {}", uri.path()),
        uri.path(),
    )
}
