use crate::{
    auth::{Auth, Role},
    error::{AppError, AppResult, ErrorKind},
    models::{Application, ApplicationStatus, VolunteerPost},
    schema::*,
    write_conn, DbPool,
};
use axum::{http::StatusCode, routing::post, Extension, Json, Router};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationResponse {
    pub id: i32,
    pub volunteer_post_id: i32,
    pub account_id: i32,
    pub message: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl ApplicationResponse {
    pub(crate) fn from_application(application: Application) -> ApplicationResponse {
        ApplicationResponse {
            id: application.id,
            volunteer_post_id: application.volunteer_post_id,
            account_id: application.account_id,
            message: application.message,
            status: application.status,
            created_at: application.created_at,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApplyRequest {
    volunteer_post_id: i32,
    message: String,
}

async fn apply(
    Extension(pool): Extension<DbPool>,
    Auth(claims): Auth,
    Json(req): Json<ApplyRequest>,
) -> AppResult<(StatusCode, Json<ApplicationResponse>)> {
    #[derive(Insertable)]
    #[diesel(table_name = applications)]
    struct NewApplication {
        volunteer_post_id: i32,
        account_id: i32,
        message: String,
        status: String,
    }

    claims.require(Role::User)?;

    if req.message.trim().is_empty() {
        return Err(AppError::new(ErrorKind::InvalidInput, "a message is required"));
    }

    let conn = &mut write_conn(&pool).await?;

    // inactive posts read the same as missing ones to applicants
    let post = volunteer_posts::table
        .find(req.volunteer_post_id)
        .first::<VolunteerPost>(conn)
        .await
        .optional()?;
    match post {
        Some(post) if post.active => {}
        _ => return Err(AppError::new(ErrorKind::NotFound, "no such volunteer post")),
    }

    // the unique (post, applicant) index is the arbiter under concurrency
    let application = diesel::insert_into(applications::table)
        .values(NewApplication {
            volunteer_post_id: req.volunteer_post_id,
            account_id: claims.account_id,
            message: req.message,
            status: ApplicationStatus::Pending.as_str().to_string(),
        })
        .on_conflict((
            applications::volunteer_post_id,
            applications::account_id,
        ))
        .do_nothing()
        .get_result::<Application>(conn)
        .await
        .optional()?;

    let Some(application) = application else {
        return Err(AppError::new(
            ErrorKind::Conflict,
            "you have already applied to this post",
        ));
    };

    Ok((
        StatusCode::CREATED,
        Json(ApplicationResponse::from_application(application)),
    ))
}

pub fn app() -> Router {
    Router::new().route("/", post(apply))
}
