use axum::http::Method;
use axum::Extension;
use envconfig::Envconfig;
use ngo_hub::{auth::ensure_jwt_secret_is_valid, connect_to_db, seed_admin};
use std::time::Duration;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing_subscriber::EnvFilter;

#[derive(Envconfig)]
struct Config {
    #[envconfig(from = "DATABASE_URL")]
    pub db_url: String,
    #[envconfig(from = "PORT", default = "8080")]
    pub port: u16,
    #[envconfig(from = "ADMIN_EMAIL")]
    pub admin_email: Option<String>,
    #[envconfig(from = "ADMIN_PASSWORD")]
    pub admin_password: Option<String>,
}

// Caller-facing bound; a request past this fails rather than hang. The
// approve transaction commits or rolls back as a unit either way.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::init_from_env().unwrap();
    ensure_jwt_secret_is_valid();

    let pool = connect_to_db(&config.db_url);

    if let (Some(email), Some(password)) = (&config.admin_email, &config.admin_password) {
        if let Err(e) = seed_admin(&pool, email, password).await {
            tracing::warn!(error = %e, "admin account seeding failed");
        }
    }

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any)
        .allow_origin(Any);

    let app = ngo_hub::app()
        .layer(Extension(pool))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT));

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port))
        .await
        .unwrap();
    tracing::info!(port = config.port, "listening");
    axum::serve(listener, app).await.unwrap();
}
