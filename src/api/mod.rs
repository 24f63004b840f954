use axum::Router;

pub mod admin;
pub mod applications;
pub mod auth;
pub mod catalogue;
pub mod ngo;
pub mod user;

pub fn app() -> Router {
    Router::new()
        .nest("/auth", auth::app())
        .nest("/ngo", ngo::app())
        .nest("/admin", admin::app())
        .nest("/user", user::app())
        .nest("/applications", applications::app())
        .merge(catalogue::app())
}
