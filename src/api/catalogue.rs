use crate::{
    error::{AppError, AppResult, ErrorKind},
    models::{Event, Ngo, VolunteerPost},
    read_conn,
    schema::*,
    DbPool,
};
use axum::{
    extract::{Path, Query},
    routing::get,
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NgoResponse {
    pub id: i32,
    pub name: String,
    pub registration_no: String,
    pub darpan_id: Option<String>,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub mission: Option<String>,
    pub description: Option<String>,
    pub website: Option<String>,
    pub verified: bool,
    pub blacklisted: bool,
    pub transparency_score: i32,
    pub created_at: DateTime<Utc>,
}

impl NgoResponse {
    pub fn from_ngo(ngo: Ngo) -> NgoResponse {
        NgoResponse {
            id: ngo.id,
            name: ngo.name,
            registration_no: ngo.registration_no,
            darpan_id: ngo.darpan_id,
            email: ngo.email,
            phone: ngo.phone,
            address: ngo.address,
            city: ngo.city,
            state: ngo.state,
            mission: ngo.mission,
            description: ngo.description,
            website: ngo.website,
            verified: ngo.verified,
            blacklisted: ngo.blacklisted,
            transparency_score: ngo.transparency_score,
            created_at: ngo.created_at,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VolunteerPostResponse {
    pub id: i32,
    pub ngo_id: i32,
    pub title: String,
    pub description: Option<String>,
    pub requirements: Option<String>,
    pub location: Option<String>,
    pub deadline: Option<DateTime<Utc>>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl VolunteerPostResponse {
    pub fn from_post(post: VolunteerPost) -> VolunteerPostResponse {
        VolunteerPostResponse {
            id: post.id,
            ngo_id: post.ngo_id,
            title: post.title,
            description: post.description,
            requirements: post.requirements,
            location: post.location,
            deadline: post.deadline,
            active: post.active,
            created_at: post.created_at,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventResponse {
    pub id: i32,
    pub ngo_id: i32,
    pub title: String,
    pub description: Option<String>,
    pub event_date: DateTime<Utc>,
    pub location: Option<String>,
    pub registration_link: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl EventResponse {
    pub fn from_event(event: Event) -> EventResponse {
        EventResponse {
            id: event.id,
            ngo_id: event.ngo_id,
            title: event.title,
            description: event.description,
            event_date: event.event_date,
            location: event.location,
            registration_link: event.registration_link,
            created_at: event.created_at,
        }
    }
}

#[derive(Deserialize)]
struct ListNgosQuery {
    verified: Option<bool>,
}

async fn list_ngos(
    Extension(pool): Extension<DbPool>,
    Query(query): Query<ListNgosQuery>,
) -> AppResult<Json<Vec<NgoResponse>>> {
    let conn = &mut read_conn(&pool).await?;

    let mut ngo_query = ngos::table
        .filter(ngos::blacklisted.eq(false))
        .order(ngos::created_at.desc())
        .into_boxed();

    if query.verified == Some(true) {
        ngo_query = ngo_query.filter(ngos::verified.eq(true));
    }

    let listed = ngo_query.load::<Ngo>(conn).await?;

    Ok(Json(listed.into_iter().map(NgoResponse::from_ngo).collect()))
}

async fn ngo_info(
    Extension(pool): Extension<DbPool>,
    Path(ngo_id): Path<i32>,
) -> AppResult<Json<NgoResponse>> {
    let conn = &mut read_conn(&pool).await?;

    let ngo = ngos::table
        .find(ngo_id)
        .first::<Ngo>(conn)
        .await
        .optional()?
        .ok_or_else(|| AppError::new(ErrorKind::NotFound, "no such NGO"))?;

    Ok(Json(NgoResponse::from_ngo(ngo)))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PostListItem {
    #[serde(flatten)]
    post: VolunteerPostResponse,
    ngo_name: String,
}

#[derive(Deserialize)]
struct ListPostsQuery {
    active: Option<bool>,
}

async fn list_posts(
    Extension(pool): Extension<DbPool>,
    Query(query): Query<ListPostsQuery>,
) -> AppResult<Json<Vec<PostListItem>>> {
    let conn = &mut read_conn(&pool).await?;

    let mut post_query = volunteer_posts::table
        .inner_join(ngos::table)
        .filter(ngos::blacklisted.eq(false))
        .order(volunteer_posts::created_at.desc())
        .into_boxed();

    // hide expired/closed posts unless explicitly asked for
    if query.active.unwrap_or(true) {
        post_query = post_query.filter(volunteer_posts::active.eq(true));
    }

    let posts = post_query.load::<(VolunteerPost, Ngo)>(conn).await?;

    Ok(Json(
        posts
            .into_iter()
            .map(|(post, ngo)| PostListItem {
                post: VolunteerPostResponse::from_post(post),
                ngo_name: ngo.name,
            })
            .collect(),
    ))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EventListItem {
    #[serde(flatten)]
    event: EventResponse,
    ngo_name: String,
}

#[derive(Deserialize)]
struct ListEventsQuery {
    upcoming: Option<bool>,
}

async fn list_events(
    Extension(pool): Extension<DbPool>,
    Query(query): Query<ListEventsQuery>,
) -> AppResult<Json<Vec<EventListItem>>> {
    let conn = &mut read_conn(&pool).await?;

    let mut event_query = events::table
        .inner_join(ngos::table)
        .filter(ngos::blacklisted.eq(false))
        .order(events::event_date.asc())
        .into_boxed();

    if query.upcoming.unwrap_or(true) {
        event_query = event_query.filter(events::event_date.ge(Utc::now()));
    }

    let listed = event_query.load::<(Event, Ngo)>(conn).await?;

    Ok(Json(
        listed
            .into_iter()
            .map(|(event, ngo)| EventListItem {
                event: EventResponse::from_event(event),
                ngo_name: ngo.name,
            })
            .collect(),
    ))
}

pub fn app() -> Router {
    Router::new()
        .route("/ngos", get(list_ngos))
        .route("/ngos/:id", get(ngo_info))
        .route("/volunteer-posts", get(list_posts))
        .route("/events", get(list_events))
}
