use axum::Router;
use diesel_async::{
    pooled_connection::{
        deadpool::{Object, Pool},
        AsyncDieselConnectionManager,
    },
    AsyncPgConnection, RunQueryDsl,
};
use error::{AppError, AppResult, ErrorKind};

pub mod api;
pub mod auth;
pub mod error;
pub mod models;
pub mod schema;

pub type DbPool = Pool<AsyncPgConnection>;
pub type DbConn = Object<AsyncPgConnection>;

pub fn connect_to_db(db_url: &str) -> DbPool {
    let db_config = AsyncDieselConnectionManager::<AsyncPgConnection>::new(db_url);
    Pool::builder(db_config)
        .build()
        .expect("failed to build database pool")
}

/// Pool acquisition for mutating operations. A transient failure surfaces as
/// `unavailable` instead of being retried, so a state transition can never be
/// applied twice on the caller's behalf.
pub async fn write_conn(pool: &DbPool) -> AppResult<DbConn> {
    pool.get().await.map_err(|e| {
        tracing::warn!(error = %e, "connection pool unavailable");
        AppError::new(ErrorKind::Unavailable, "storage temporarily unavailable")
    })
}

/// Pool acquisition for read-only operations; retries once, reads are safe
/// to repeat.
pub async fn read_conn(pool: &DbPool) -> AppResult<DbConn> {
    if let Ok(conn) = pool.get().await {
        return Ok(conn);
    }
    write_conn(pool).await
}

pub fn app() -> Router {
    Router::new().nest("/api", api::app())
}

/// Idempotently creates the admin account from config. This is the only way
/// an admin account comes to exist; no runtime operation can mint one.
pub async fn seed_admin(pool: &DbPool, email: &str, password: &str) -> anyhow::Result<()> {
    use crate::schema::accounts;
    use diesel::prelude::Insertable;

    #[derive(Insertable)]
    #[diesel(table_name = accounts)]
    struct NewAccount<'a> {
        name: &'a str,
        email: &'a str,
        password_hash: String,
        role: &'a str,
    }

    let conn = &mut pool.get().await?;

    let inserted = diesel::insert_into(accounts::table)
        .values(NewAccount {
            name: "Administrator",
            email,
            password_hash: auth::hash_password(password)?,
            role: auth::Role::Admin.as_str(),
        })
        .on_conflict(accounts::email)
        .do_nothing()
        .execute(conn)
        .await?;

    if inserted > 0 {
        tracing::info!(%email, "seeded admin account");
    }
    Ok(())
}
