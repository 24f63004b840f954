use crate::{
    auth::{valid_email, Auth, Role},
    error::{AppError, AppResult, ErrorKind},
    models::{
        Account, Application, ApplicationStatus, Event, Ngo, RegistrationRequest, RequestStatus,
        VolunteerPost,
    },
    read_conn,
    schema::*,
    write_conn, DbPool,
};
use axum::{
    extract::Path,
    http::StatusCode,
    routing::{get, post, put},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};

use super::admin::RequestResponse;
use super::applications::ApplicationResponse;
use super::catalogue::{EventResponse, NgoResponse, VolunteerPostResponse};

/// The caller's NGO profile; every NGO-scoped operation resolves ownership
/// through this lookup rather than trusting anything client-sent.
async fn ngo_profile(conn: &mut AsyncPgConnection, account_id: i32) -> AppResult<Ngo> {
    ngos::table
        .filter(ngos::account_id.eq(account_id))
        .first::<Ngo>(conn)
        .await
        .optional()?
        .ok_or_else(|| AppError::new(ErrorKind::NotFound, "NGO profile not found"))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitRequest {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub registration_no: String,
    pub darpan_id: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub mission: Option<String>,
    pub description: Option<String>,
    pub website: Option<String>,
}

/// Public intake. Nothing here can create an account; an admin decision does
/// that later, so the registration surface stays free of privileged paths.
async fn submit_request(
    Extension(pool): Extension<DbPool>,
    Json(req): Json<SubmitRequest>,
) -> AppResult<(StatusCode, Json<RequestResponse>)> {
    #[derive(Insertable)]
    #[diesel(table_name = registration_requests)]
    struct NewRequest {
        name: String,
        email: String,
        phone: Option<String>,
        registration_no: String,
        darpan_id: Option<String>,
        address: Option<String>,
        city: Option<String>,
        state: Option<String>,
        mission: Option<String>,
        description: Option<String>,
        website: Option<String>,
        status: String,
    }

    if req.name.trim().is_empty() || req.registration_no.trim().is_empty() {
        return Err(AppError::new(
            ErrorKind::InvalidInput,
            "name and registration number are required",
        ));
    }
    if !valid_email(&req.email) {
        return Err(AppError::new(ErrorKind::InvalidInput, "email is malformed"));
    }

    let conn = &mut write_conn(&pool).await?;

    let email_taken = diesel::select(diesel::dsl::exists(
        accounts::table.filter(accounts::email.eq(&req.email)),
    ))
    .get_result::<bool>(conn)
    .await?;
    if email_taken {
        return Err(AppError::new(
            ErrorKind::DuplicateEmail,
            "an account with this email already exists",
        ));
    }

    let request = diesel::insert_into(registration_requests::table)
        .values(NewRequest {
            name: req.name,
            email: req.email,
            phone: req.phone,
            registration_no: req.registration_no,
            darpan_id: req.darpan_id,
            address: req.address,
            city: req.city,
            state: req.state,
            mission: req.mission,
            description: req.description,
            website: req.website,
            status: RequestStatus::Pending.as_str().to_string(),
        })
        .get_result::<RegistrationRequest>(conn)
        .await?;

    Ok((StatusCode::CREATED, Json(RequestResponse::from_request(request))))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NgoApplicationResponse {
    id: i32,
    volunteer_post_id: i32,
    volunteer_post_title: String,
    applicant_name: String,
    applicant_email: String,
    message: String,
    status: String,
    created_at: DateTime<Utc>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NgoStats {
    total_posts: i64,
    active_posts: i64,
    total_events: i64,
    upcoming_events: i64,
    total_applications: i64,
    pending_applications: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NgoDashboardResponse {
    ngo: NgoResponse,
    volunteer_posts: Vec<VolunteerPostResponse>,
    events: Vec<EventResponse>,
    applications: Vec<NgoApplicationResponse>,
    stats: NgoStats,
}

async fn dashboard(
    Extension(pool): Extension<DbPool>,
    Auth(claims): Auth,
) -> AppResult<Json<NgoDashboardResponse>> {
    claims.require(Role::Ngo)?;

    let conn = &mut read_conn(&pool).await?;

    let ngo = ngo_profile(conn, claims.account_id).await?;

    let posts = volunteer_posts::table
        .filter(volunteer_posts::ngo_id.eq(ngo.id))
        .order(volunteer_posts::created_at.desc())
        .load::<VolunteerPost>(conn)
        .await?;

    let ngo_events = events::table
        .filter(events::ngo_id.eq(ngo.id))
        .order(events::event_date.asc())
        .load::<Event>(conn)
        .await?;

    let ngo_applications = applications::table
        .inner_join(volunteer_posts::table)
        .inner_join(accounts::table)
        .filter(volunteer_posts::ngo_id.eq(ngo.id))
        .order(applications::created_at.desc())
        .load::<(Application, VolunteerPost, Account)>(conn)
        .await?;

    let now = Utc::now();
    let stats = NgoStats {
        total_posts: posts.len() as i64,
        active_posts: posts.iter().filter(|p| p.active).count() as i64,
        total_events: ngo_events.len() as i64,
        upcoming_events: ngo_events.iter().filter(|e| e.event_date >= now).count() as i64,
        total_applications: ngo_applications.len() as i64,
        pending_applications: ngo_applications
            .iter()
            .filter(|(a, _, _)| a.status == ApplicationStatus::Pending.as_str())
            .count() as i64,
    };

    Ok(Json(NgoDashboardResponse {
        ngo: NgoResponse::from_ngo(ngo),
        volunteer_posts: posts.into_iter().map(VolunteerPostResponse::from_post).collect(),
        events: ngo_events.into_iter().map(EventResponse::from_event).collect(),
        applications: ngo_applications
            .into_iter()
            .map(|(application, post, applicant)| NgoApplicationResponse {
                id: application.id,
                volunteer_post_id: post.id,
                volunteer_post_title: post.title,
                applicant_name: applicant.name,
                applicant_email: applicant.email,
                message: application.message,
                status: application.status,
                created_at: application.created_at,
            })
            .collect(),
        stats,
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatePostRequest {
    title: String,
    description: Option<String>,
    requirements: Option<String>,
    location: Option<String>,
    deadline: Option<DateTime<Utc>>,
}

async fn create_post(
    Extension(pool): Extension<DbPool>,
    Auth(claims): Auth,
    Json(req): Json<CreatePostRequest>,
) -> AppResult<(StatusCode, Json<VolunteerPostResponse>)> {
    #[derive(Insertable)]
    #[diesel(table_name = volunteer_posts)]
    struct NewPost {
        ngo_id: i32,
        title: String,
        description: Option<String>,
        requirements: Option<String>,
        location: Option<String>,
        deadline: Option<DateTime<Utc>>,
        active: bool,
    }

    claims.require(Role::Ngo)?;

    if req.title.trim().is_empty() {
        return Err(AppError::new(ErrorKind::InvalidInput, "title must not be empty"));
    }

    let conn = &mut write_conn(&pool).await?;
    let ngo = ngo_profile(conn, claims.account_id).await?;

    let post = diesel::insert_into(volunteer_posts::table)
        .values(NewPost {
            ngo_id: ngo.id,
            title: req.title,
            description: req.description,
            requirements: req.requirements,
            location: req.location,
            deadline: req.deadline,
            active: true,
        })
        .get_result::<VolunteerPost>(conn)
        .await?;

    Ok((StatusCode::CREATED, Json(VolunteerPostResponse::from_post(post))))
}

#[derive(AsChangeset, Deserialize)]
#[diesel(table_name = volunteer_posts)]
#[serde(rename_all = "camelCase")]
struct UpdatePostRequest {
    title: Option<String>,
    description: Option<String>,
    requirements: Option<String>,
    location: Option<String>,
    deadline: Option<DateTime<Utc>>,
    active: Option<bool>,
}

/// Partial update; absent fields stay as they are. Closing a post
/// (`active = false`) is how it leaves the catalogue and stops taking
/// applications.
async fn update_post(
    Extension(pool): Extension<DbPool>,
    Path(post_id): Path<i32>,
    Auth(claims): Auth,
    Json(req): Json<UpdatePostRequest>,
) -> AppResult<Json<VolunteerPostResponse>> {
    claims.require(Role::Ngo)?;

    if matches!(&req.title, Some(title) if title.trim().is_empty()) {
        return Err(AppError::new(ErrorKind::InvalidInput, "title must not be empty"));
    }
    let has_changes = req.title.is_some()
        || req.description.is_some()
        || req.requirements.is_some()
        || req.location.is_some()
        || req.deadline.is_some()
        || req.active.is_some();
    if !has_changes {
        return Err(AppError::new(ErrorKind::InvalidInput, "no fields to update"));
    }

    let conn = &mut write_conn(&pool).await?;
    let ngo = ngo_profile(conn, claims.account_id).await?;

    let post = volunteer_posts::table
        .find(post_id)
        .first::<VolunteerPost>(conn)
        .await
        .optional()?
        .ok_or_else(|| AppError::new(ErrorKind::NotFound, "no such volunteer post"))?;

    if post.ngo_id != ngo.id {
        return Err(AppError::new(
            ErrorKind::Forbidden,
            "post belongs to another NGO",
        ));
    }

    let post = diesel::update(volunteer_posts::table.find(post_id))
        .set(req)
        .get_result::<VolunteerPost>(conn)
        .await?;

    Ok(Json(VolunteerPostResponse::from_post(post)))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateEventRequest {
    title: String,
    description: Option<String>,
    event_date: DateTime<Utc>,
    location: Option<String>,
    registration_link: Option<String>,
}

async fn create_event(
    Extension(pool): Extension<DbPool>,
    Auth(claims): Auth,
    Json(req): Json<CreateEventRequest>,
) -> AppResult<(StatusCode, Json<EventResponse>)> {
    #[derive(Insertable)]
    #[diesel(table_name = events)]
    struct NewEvent {
        ngo_id: i32,
        title: String,
        description: Option<String>,
        event_date: DateTime<Utc>,
        location: Option<String>,
        registration_link: Option<String>,
    }

    claims.require(Role::Ngo)?;

    if req.title.trim().is_empty() {
        return Err(AppError::new(ErrorKind::InvalidInput, "title must not be empty"));
    }

    let conn = &mut write_conn(&pool).await?;
    let ngo = ngo_profile(conn, claims.account_id).await?;

    let event = diesel::insert_into(events::table)
        .values(NewEvent {
            ngo_id: ngo.id,
            title: req.title,
            description: req.description,
            event_date: req.event_date,
            location: req.location,
            registration_link: req.registration_link,
        })
        .get_result::<Event>(conn)
        .await?;

    Ok((StatusCode::CREATED, Json(EventResponse::from_event(event))))
}

#[derive(AsChangeset, Deserialize)]
#[diesel(table_name = ngos)]
#[serde(rename_all = "camelCase")]
struct UpdateProfileRequest {
    name: Option<String>,
    phone: Option<String>,
    address: Option<String>,
    city: Option<String>,
    state: Option<String>,
    mission: Option<String>,
    description: Option<String>,
    website: Option<String>,
}

/// Partial update of the caller's own profile. Identity fields (email,
/// registration number, Darpan id) never change after approval.
async fn update_profile(
    Extension(pool): Extension<DbPool>,
    Auth(claims): Auth,
    Json(req): Json<UpdateProfileRequest>,
) -> AppResult<Json<NgoResponse>> {
    claims.require(Role::Ngo)?;

    if matches!(&req.name, Some(name) if name.trim().is_empty()) {
        return Err(AppError::new(ErrorKind::InvalidInput, "name must not be empty"));
    }
    let has_changes = req.name.is_some()
        || req.phone.is_some()
        || req.address.is_some()
        || req.city.is_some()
        || req.state.is_some()
        || req.mission.is_some()
        || req.description.is_some()
        || req.website.is_some();
    if !has_changes {
        return Err(AppError::new(ErrorKind::InvalidInput, "no fields to update"));
    }

    let conn = &mut write_conn(&pool).await?;
    let ngo = ngo_profile(conn, claims.account_id).await?;

    let updated = diesel::update(ngos::table.find(ngo.id))
        .set(req)
        .get_result::<Ngo>(conn)
        .await?;

    // profile fields feed the transparency score, recompute from the new row
    let score = updated.transparency_profile().score();
    let ngo = diesel::update(ngos::table.find(updated.id))
        .set(ngos::transparency_score.eq(score))
        .get_result::<Ngo>(conn)
        .await?;

    Ok(Json(NgoResponse::from_ngo(ngo)))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusRequest {
    status: String,
}

async fn update_application_status(
    Extension(pool): Extension<DbPool>,
    Path(application_id): Path<i32>,
    Auth(claims): Auth,
    Json(req): Json<StatusRequest>,
) -> AppResult<Json<ApplicationResponse>> {
    claims.require(Role::Ngo)?;

    let decision = ApplicationStatus::parse_decision(&req.status).ok_or_else(|| {
        AppError::new(
            ErrorKind::InvalidInput,
            "status must be accepted or rejected",
        )
    })?;

    let conn = &mut write_conn(&pool).await?;
    let ngo = ngo_profile(conn, claims.account_id).await?;

    let target = applications::table
        .inner_join(volunteer_posts::table)
        .filter(applications::id.eq(application_id))
        .first::<(Application, VolunteerPost)>(conn)
        .await
        .optional()?;

    let Some((_, post)) = target else {
        return Err(AppError::new(ErrorKind::NotFound, "no such application"));
    };

    if post.ngo_id != ngo.id {
        return Err(AppError::new(
            ErrorKind::Forbidden,
            "application belongs to another NGO's post",
        ));
    }

    // only a pending application can be resolved, and only once
    let updated = diesel::update(
        applications::table
            .find(application_id)
            .filter(applications::status.eq(ApplicationStatus::Pending.as_str())),
    )
    .set(applications::status.eq(decision.as_str()))
    .get_result::<Application>(conn)
    .await
    .optional()?;

    let Some(application) = updated else {
        return Err(AppError::new(
            ErrorKind::InvalidState,
            "application is already resolved",
        ));
    };

    Ok(Json(ApplicationResponse::from_application(application)))
}

pub fn app() -> Router {
    Router::new()
        .route("/request", post(submit_request))
        .route("/dashboard", get(dashboard))
        .route("/profile", put(update_profile))
        .route("/volunteer-posts", post(create_post))
        .route("/volunteer-posts/:id", put(update_post))
        .route("/events", post(create_event))
        .route("/applications/:id/status", put(update_application_status))
}
