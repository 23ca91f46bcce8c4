use axum::{
    Router,
    routing::{get, post},
};

pub mod login;
pub mod system;
pub mod users;

/// Router for the identity endpoints (mounted under the API prefix).
pub fn router() -> Router {
    Router::new()
        .route("/login", post(login::login))
        .route("/users", post(users::create_user))
        .route("/users/type/:type", get(users::list_users))
        .route(
            "/users/:id",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        )
}
