use std::sync::Arc;

use axum::{
    Json,
    extract::{
        Extension, Path, Query,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::IntoResponse,
};

use warden_core::DomainError;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::CallerContext;

pub async fn create_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
    body: Result<Json<dto::UserRequest>, JsonRejection>,
) -> axum::response::Response {
    let result = async {
        caller.require_authenticated()?;
        let Json(body) = body.map_err(errors::malformed_request)?;
        let entity = body.into_entity()?;
        caller.authorize(entity.role)?;
        services.directory.create(entity, false).await
    }
    .await;

    match result {
        Ok(id) => errors::json_ok(
            StatusCode::CREATED,
            serde_json::json!({ "userId": id }),
            "User created successfully.",
        ),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn list_users(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
    Path(kind): Path<String>,
    params: Result<Query<dto::ListUsersParams>, QueryRejection>,
) -> axum::response::Response {
    let result = async {
        caller.require_authenticated()?;
        let Query(params) = params.map_err(errors::malformed_request)?;
        let role = dto::parse_role(&kind)?;
        caller.authorize(role)?;
        services.directory.get_all_users(role, params.page_number).await
    }
    .await;

    match result {
        Ok(users) if users.is_empty() => {
            errors::json_error(StatusCode::NOT_FOUND, "not_found", "No users found.")
        }
        Ok(users) => {
            let items = users
                .into_iter()
                .map(dto::UserResponse::from)
                .collect::<Vec<_>>();
            errors::json_ok(StatusCode::OK, dto::to_json(items), "Users retrieved successfully.")
        }
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn get_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let result = async {
        caller.require_authenticated()?;
        let id = dto::parse_user_id(&id)?;
        let user = services
            .directory
            .get_user_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found("User not found."))?;
        caller.authorize(user.role)?;
        Ok::<_, DomainError>(user)
    }
    .await;

    match result {
        Ok(user) => errors::json_ok(
            StatusCode::OK,
            dto::to_json(dto::UserResponse::from(user)),
            "User retrieved successfully.",
        ),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn update_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<String>,
    body: Result<Json<dto::UserRequest>, JsonRejection>,
) -> axum::response::Response {
    let result = async {
        caller.require_authenticated()?;
        let id = dto::parse_user_id(&id)?;
        let Json(body) = body.map_err(errors::malformed_request)?;
        if body.user_id != Some(id) {
            return Err(DomainError::validation("userId in body must match the path"));
        }
        let entity = body.into_entity()?;
        caller.authorize(entity.role)?;
        services.directory.update_user(entity, id, caller.caller()).await
    }
    .await;

    match result {
        Ok(()) => errors::json_ok(StatusCode::OK, serde_json::Value::Null, "User updated successfully."),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn delete_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let result = async {
        caller.require_authenticated()?;
        let id = dto::parse_user_id(&id)?;
        services.directory.delete_user(id, caller.caller()).await
    }
    .await;

    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}
