use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, rejection::JsonRejection},
    http::StatusCode,
};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::LoginRequest>, JsonRejection>,
) -> axum::response::Response {
    let result = async {
        let Json(body) = body.map_err(errors::malformed_request)?;
        services.credentials.authenticate(&body.email, &body.password).await
    }
    .await;

    match result {
        Ok(token) => errors::json_ok(
            StatusCode::OK,
            dto::to_json(dto::TokenResponse::from(token)),
            "Login successful.",
        ),
        Err(e) => errors::domain_error_to_response(e),
    }
}
