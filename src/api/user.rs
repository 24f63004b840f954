use crate::{
    auth::{Auth, Role},
    error::{AppError, AppResult, ErrorKind},
    models::{Application, ApplicationStatus, Bookmark, Like, Ngo, VolunteerPost},
    read_conn,
    schema::*,
    write_conn, DbPool,
};
use axum::{
    extract::Path,
    http::StatusCode,
    routing::{self, get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serde::{Deserialize, Serialize};

use super::catalogue::{NgoResponse, VolunteerPostResponse};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UserApplicationResponse {
    id: i32,
    volunteer_post_id: i32,
    volunteer_post_title: String,
    ngo_name: String,
    message: String,
    status: String,
    created_at: DateTime<Utc>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BookmarkResponse {
    id: i32,
    volunteer_post: VolunteerPostResponse,
    created_at: DateTime<Utc>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LikeResponse {
    id: i32,
    ngo: NgoResponse,
    created_at: DateTime<Utc>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UserStats {
    total_applications: i64,
    pending_applications: i64,
    accepted_applications: i64,
    bookmarks_count: i64,
    likes_count: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UserDashboardResponse {
    applications: Vec<UserApplicationResponse>,
    bookmarks: Vec<BookmarkResponse>,
    liked_ngos: Vec<LikeResponse>,
    stats: UserStats,
}

async fn dashboard(
    Extension(pool): Extension<DbPool>,
    Auth(claims): Auth,
) -> AppResult<Json<UserDashboardResponse>> {
    claims.require(Role::User)?;

    let conn = &mut read_conn(&pool).await?;

    let own_applications = applications::table
        .inner_join(volunteer_posts::table.inner_join(ngos::table))
        .filter(applications::account_id.eq(claims.account_id))
        .order(applications::created_at.desc())
        .load::<(Application, (VolunteerPost, Ngo))>(conn)
        .await?;

    let own_bookmarks = bookmarks::table
        .inner_join(volunteer_posts::table)
        .filter(bookmarks::account_id.eq(claims.account_id))
        .order(bookmarks::created_at.desc())
        .load::<(Bookmark, VolunteerPost)>(conn)
        .await?;

    let own_likes = likes::table
        .inner_join(ngos::table)
        .filter(likes::account_id.eq(claims.account_id))
        .order(likes::created_at.desc())
        .load::<(Like, Ngo)>(conn)
        .await?;

    let stats = UserStats {
        total_applications: own_applications.len() as i64,
        pending_applications: own_applications
            .iter()
            .filter(|(a, _)| a.status == ApplicationStatus::Pending.as_str())
            .count() as i64,
        accepted_applications: own_applications
            .iter()
            .filter(|(a, _)| a.status == ApplicationStatus::Accepted.as_str())
            .count() as i64,
        bookmarks_count: own_bookmarks.len() as i64,
        likes_count: own_likes.len() as i64,
    };

    Ok(Json(UserDashboardResponse {
        applications: own_applications
            .into_iter()
            .map(|(application, (post, ngo))| UserApplicationResponse {
                id: application.id,
                volunteer_post_id: post.id,
                volunteer_post_title: post.title,
                ngo_name: ngo.name,
                message: application.message,
                status: application.status,
                created_at: application.created_at,
            })
            .collect(),
        bookmarks: own_bookmarks
            .into_iter()
            .map(|(bookmark, post)| BookmarkResponse {
                id: bookmark.id,
                volunteer_post: VolunteerPostResponse::from_post(post),
                created_at: bookmark.created_at,
            })
            .collect(),
        liked_ngos: own_likes
            .into_iter()
            .map(|(like, ngo)| LikeResponse {
                id: like.id,
                ngo: NgoResponse::from_ngo(ngo),
                created_at: like.created_at,
            })
            .collect(),
        stats,
    }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BookmarkRowResponse {
    id: i32,
    volunteer_post_id: i32,
    created_at: DateTime<Utc>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddBookmarkRequest {
    volunteer_post_id: i32,
}

async fn add_bookmark(
    Extension(pool): Extension<DbPool>,
    Auth(claims): Auth,
    Json(req): Json<AddBookmarkRequest>,
) -> AppResult<(StatusCode, Json<BookmarkRowResponse>)> {
    #[derive(Insertable)]
    #[diesel(table_name = bookmarks)]
    struct NewBookmark {
        account_id: i32,
        volunteer_post_id: i32,
    }

    claims.require(Role::User)?;

    let conn = &mut write_conn(&pool).await?;

    let post_exists = diesel::select(diesel::dsl::exists(
        volunteer_posts::table.find(req.volunteer_post_id),
    ))
    .get_result::<bool>(conn)
    .await?;
    if !post_exists {
        return Err(AppError::new(ErrorKind::NotFound, "no such volunteer post"));
    }

    // adding twice is not an error; hand back the existing row. If a
    // concurrent delete wins between the insert and the fetch, the next
    // insert attempt takes over.
    let (status, bookmark) = loop {
        let inserted = diesel::insert_into(bookmarks::table)
            .values(NewBookmark {
                account_id: claims.account_id,
                volunteer_post_id: req.volunteer_post_id,
            })
            .on_conflict((bookmarks::account_id, bookmarks::volunteer_post_id))
            .do_nothing()
            .get_result::<Bookmark>(conn)
            .await
            .optional()?;
        if let Some(bookmark) = inserted {
            break (StatusCode::CREATED, bookmark);
        }

        let existing = bookmarks::table
            .filter(bookmarks::account_id.eq(claims.account_id))
            .filter(bookmarks::volunteer_post_id.eq(req.volunteer_post_id))
            .first::<Bookmark>(conn)
            .await
            .optional()?;
        if let Some(bookmark) = existing {
            break (StatusCode::OK, bookmark);
        }
    };

    Ok((
        status,
        Json(BookmarkRowResponse {
            id: bookmark.id,
            volunteer_post_id: bookmark.volunteer_post_id,
            created_at: bookmark.created_at,
        }),
    ))
}

async fn remove_bookmark(
    Extension(pool): Extension<DbPool>,
    Path(bookmark_id): Path<i32>,
    Auth(claims): Auth,
) -> AppResult<StatusCode> {
    claims.require(Role::User)?;

    let conn = &mut write_conn(&pool).await?;

    let bookmark = bookmarks::table
        .find(bookmark_id)
        .first::<Bookmark>(conn)
        .await
        .optional()?;

    // removing something already gone is a no-op
    let Some(bookmark) = bookmark else {
        return Ok(StatusCode::NO_CONTENT);
    };

    if bookmark.account_id != claims.account_id {
        return Err(AppError::new(
            ErrorKind::Forbidden,
            "bookmark belongs to another account",
        ));
    }

    diesel::delete(bookmarks::table.find(bookmark_id))
        .execute(conn)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LikeRowResponse {
    id: i32,
    ngo_id: i32,
    created_at: DateTime<Utc>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddLikeRequest {
    ngo_id: i32,
}

async fn add_like(
    Extension(pool): Extension<DbPool>,
    Auth(claims): Auth,
    Json(req): Json<AddLikeRequest>,
) -> AppResult<(StatusCode, Json<LikeRowResponse>)> {
    #[derive(Insertable)]
    #[diesel(table_name = likes)]
    struct NewLike {
        account_id: i32,
        ngo_id: i32,
    }

    claims.require(Role::User)?;

    let conn = &mut write_conn(&pool).await?;

    let ngo_exists = diesel::select(diesel::dsl::exists(ngos::table.find(req.ngo_id)))
        .get_result::<bool>(conn)
        .await?;
    if !ngo_exists {
        return Err(AppError::new(ErrorKind::NotFound, "no such NGO"));
    }

    // same insert-or-fetch shape as bookmarks; a concurrent unlike between
    // the two statements just hands the win back to the insert
    let (status, like) = loop {
        let inserted = diesel::insert_into(likes::table)
            .values(NewLike {
                account_id: claims.account_id,
                ngo_id: req.ngo_id,
            })
            .on_conflict((likes::account_id, likes::ngo_id))
            .do_nothing()
            .get_result::<Like>(conn)
            .await
            .optional()?;
        if let Some(like) = inserted {
            break (StatusCode::CREATED, like);
        }

        let existing = likes::table
            .filter(likes::account_id.eq(claims.account_id))
            .filter(likes::ngo_id.eq(req.ngo_id))
            .first::<Like>(conn)
            .await
            .optional()?;
        if let Some(like) = existing {
            break (StatusCode::OK, like);
        }
    };

    Ok((
        status,
        Json(LikeRowResponse {
            id: like.id,
            ngo_id: like.ngo_id,
            created_at: like.created_at,
        }),
    ))
}

async fn remove_like(
    Extension(pool): Extension<DbPool>,
    Path(like_id): Path<i32>,
    Auth(claims): Auth,
) -> AppResult<StatusCode> {
    claims.require(Role::User)?;

    let conn = &mut write_conn(&pool).await?;

    let like = likes::table
        .find(like_id)
        .first::<Like>(conn)
        .await
        .optional()?;

    let Some(like) = like else {
        return Ok(StatusCode::NO_CONTENT);
    };

    if like.account_id != claims.account_id {
        return Err(AppError::new(
            ErrorKind::Forbidden,
            "like belongs to another account",
        ));
    }

    diesel::delete(likes::table.find(like_id))
        .execute(conn)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub fn app() -> Router {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/bookmarks", post(add_bookmark))
        .route("/bookmarks/:id", routing::delete(remove_bookmark))
        .route("/likes", post(add_like))
        .route("/likes/:id", routing::delete(remove_like))
}
