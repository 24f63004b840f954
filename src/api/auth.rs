use crate::{
    auth::{self, valid_email, Auth, Role, MIN_PASSWORD_LEN},
    error::{AppError, AppResult, ErrorKind},
    models::Account,
    read_conn,
    schema::*,
    write_conn, DbPool,
};
use axum::{
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const TOKEN_LIFETIME: Duration = Duration::from_secs(7 * 24 * 60 * 60);

// No role field on purpose: self-registration can only mint a plain user,
// whatever the client sends.
#[derive(Deserialize)]
struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountResponse {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

impl AccountResponse {
    pub fn from_account(account: Account) -> AccountResponse {
        AccountResponse {
            id: account.id,
            name: account.name,
            email: account.email,
            role: account.role,
            created_at: account.created_at,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AuthorizedResponse {
    token: String,
    account: AccountResponse,
}

async fn register(
    Extension(pool): Extension<DbPool>,
    Json(req): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<AccountResponse>)> {
    #[derive(Insertable)]
    #[diesel(table_name = accounts)]
    struct NewAccount {
        name: String,
        email: String,
        password_hash: String,
        role: String,
    }

    if req.name.trim().is_empty() {
        return Err(AppError::new(ErrorKind::InvalidInput, "name must not be empty"));
    }
    if !valid_email(&req.email) {
        return Err(AppError::new(ErrorKind::InvalidInput, "email is malformed"));
    }
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::new(
            ErrorKind::InvalidInput,
            "password must be at least 6 characters",
        ));
    }

    let conn = &mut write_conn(&pool).await?;

    let new_account = diesel::insert_into(accounts::table)
        .values(NewAccount {
            name: req.name,
            email: req.email,
            password_hash: auth::hash_password(req.password)?,
            role: Role::User.as_str().to_string(),
        })
        .on_conflict(accounts::email)
        .do_nothing()
        .get_result::<Account>(conn)
        .await
        .optional()?;

    let Some(account) = new_account else {
        return Err(AppError::new(
            ErrorKind::DuplicateEmail,
            "an account with this email already exists",
        ));
    };

    Ok((StatusCode::CREATED, Json(AccountResponse::from_account(account))))
}

async fn login(
    Extension(pool): Extension<DbPool>,
    Json(req): Json<LoginRequest>,
) -> AppResult<Json<AuthorizedResponse>> {
    let conn = &mut read_conn(&pool).await?;

    if let Some(account) = accounts::table
        .filter(accounts::email.eq(req.email))
        .first::<Account>(conn)
        .await
        .optional()?
    {
        if auth::verify_password(req.password, &account.password_hash)? {
            let role = Role::parse(&account.role)
                .ok_or_else(|| anyhow::anyhow!("account {} has unknown role", account.id))?;
            let token = auth::generate_jwt(account.id, role, TOKEN_LIFETIME)?;
            return Ok(Json(AuthorizedResponse {
                token,
                account: AccountResponse::from_account(account),
            }));
        }
    }

    // one answer for unknown email and wrong password, so callers cannot
    // probe which emails are registered
    Err(AppError::new(
        ErrorKind::InvalidCredentials,
        "invalid email or password",
    ))
}

async fn me(
    Extension(pool): Extension<DbPool>,
    Auth(claims): Auth,
) -> AppResult<Json<AccountResponse>> {
    let conn = &mut read_conn(&pool).await?;

    let account = accounts::table
        .find(claims.account_id)
        .first::<Account>(conn)
        .await
        .optional()?
        .ok_or_else(|| AppError::new(ErrorKind::Unauthenticated, "account no longer exists"))?;

    Ok(Json(AccountResponse::from_account(account)))
}

pub fn app() -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/me", get(me))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_payload_has_no_role_escalation_path() {
        let req: RegisterRequest = serde_json::from_str(
            r#"{"name":"A","email":"a@example.org","password":"secret1","role":"admin"}"#,
        )
        .unwrap();
        // the role key is simply dropped during deserialization
        assert_eq!(req.name, "A");
        assert_eq!(req.email, "a@example.org");
    }
}
