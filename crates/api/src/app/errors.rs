use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use warden_core::DomainError;

/// Map a domain error to its HTTP response.
///
/// Denials all render the same way whatever their reason; backend failures carry only
/// their fixed generic message.
pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    match err {
        DomainError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        DomainError::InvalidId(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_id", msg),
        DomainError::NotFound(msg) => json_error(StatusCode::NOT_FOUND, "not_found", msg),
        DomainError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        DomainError::Unauthorized(_) => {
            json_error(StatusCode::BAD_REQUEST, "unauthorized", "not authorized")
        }
        DomainError::Backend(msg) => json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg),
    }
}

/// A body or query string that failed to parse is a validation failure.
pub fn malformed_request(rejection: impl std::fmt::Display) -> DomainError {
    DomainError::validation(rejection.to_string())
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// Success envelope: `{ "data": ..., "message": ... }`.
pub fn json_ok(status: StatusCode, data: serde_json::Value, message: &str) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "data": data,
            "message": message,
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_error_class() {
        let cases = [
            (DomainError::validation("x"), StatusCode::BAD_REQUEST),
            (DomainError::invalid_id("x"), StatusCode::BAD_REQUEST),
            (DomainError::unauthorized("token_missing"), StatusCode::BAD_REQUEST),
            (DomainError::not_found("x"), StatusCode::NOT_FOUND),
            (DomainError::conflict("x"), StatusCode::CONFLICT),
            (DomainError::Backend("user creation failed"), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(domain_error_to_response(err).status(), status);
        }
    }

    #[test]
    fn malformed_request_is_validation() {
        let err = malformed_request("Failed to parse the request body as JSON");
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(domain_error_to_response(err).status(), StatusCode::BAD_REQUEST);
    }
}
