use crate::{
    auth::{self, Auth, Role, MIN_PASSWORD_LEN},
    error::{AppError, AppResult, ErrorKind},
    models::{Account, Ngo, RegistrationRequest, RequestStatus},
    read_conn,
    schema::*,
    write_conn, DbPool,
};
use axum::{
    extract::{Path, Query},
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{scoped_futures::ScopedFutureExt, AsyncConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};

use super::catalogue::NgoResponse;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestResponse {
    pub id: i32,
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
    pub status: String,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl RequestResponse {
    pub(crate) fn from_request(request: RegistrationRequest) -> RequestResponse {
        RequestResponse {
            id: request.id,
            name: request.name,
            email: request.email,
            phone: request.phone,
            registration_no: request.registration_no,
            darpan_id: request.darpan_id,
            address: request.address,
            city: request.city,
            state: request.state,
            mission: request.mission,
            description: request.description,
            website: request.website,
            status: request.status,
            rejection_reason: request.rejection_reason,
            created_at: request.created_at,
        }
    }
}

#[derive(Deserialize)]
struct ListRequestsQuery {
    status: Option<String>,
}

async fn list_requests(
    Extension(pool): Extension<DbPool>,
    Query(query): Query<ListRequestsQuery>,
    Auth(claims): Auth,
) -> AppResult<Json<Vec<RequestResponse>>> {
    claims.require(Role::Admin)?;

    let status = match query.status.as_deref() {
        None => RequestStatus::Pending,
        Some(s) => RequestStatus::parse(s)
            .ok_or_else(|| AppError::new(ErrorKind::InvalidInput, "unknown request status"))?,
    };

    let conn = &mut read_conn(&pool).await?;

    let requests = registration_requests::table
        .filter(registration_requests::status.eq(status.as_str()))
        .order(registration_requests::created_at.desc())
        .load::<RegistrationRequest>(conn)
        .await?;

    Ok(Json(
        requests.into_iter().map(RequestResponse::from_request).collect(),
    ))
}

#[derive(Deserialize)]
struct ApproveRequest {
    password: String,
}

/// Approval is one transaction: flip the request to approved (only from
/// pending, so two concurrent approves cannot both pass), create the NGO
/// account, create the NGO profile. Any failure rolls the whole thing back
/// and the request stays pending.
async fn approve_request(
    Extension(pool): Extension<DbPool>,
    Path(request_id): Path<i32>,
    Auth(claims): Auth,
    Json(req): Json<ApproveRequest>,
) -> AppResult<Json<NgoResponse>> {
    #[derive(Insertable)]
    #[diesel(table_name = accounts)]
    struct NewAccount<'a> {
        name: &'a str,
        email: &'a str,
        password_hash: &'a str,
        role: &'a str,
    }

    #[derive(Insertable)]
    #[diesel(table_name = ngos)]
    struct NewNgo<'a> {
        account_id: i32,
        name: &'a str,
        registration_no: &'a str,
        darpan_id: Option<&'a str>,
        email: &'a str,
        phone: Option<&'a str>,
        address: Option<&'a str>,
        city: Option<&'a str>,
        state: Option<&'a str>,
        mission: Option<&'a str>,
        description: Option<&'a str>,
        website: Option<&'a str>,
        verified: bool,
        transparency_score: i32,
    }

    claims.require(Role::Admin)?;

    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::new(
            ErrorKind::InvalidInput,
            "initial password must be at least 6 characters",
        ));
    }
    let password_hash = auth::hash_password(req.password)?;

    let conn = &mut write_conn(&pool).await?;

    let ngo = conn
        .transaction::<Ngo, AppError, _>(|conn| {
            async move {
                let request = diesel::update(
                    registration_requests::table
                        .find(request_id)
                        .filter(registration_requests::status.eq(RequestStatus::Pending.as_str())),
                )
                .set(registration_requests::status.eq(RequestStatus::Approved.as_str()))
                .get_result::<RegistrationRequest>(conn)
                .await
                .optional()?;

                let Some(request) = request else {
                    let exists = diesel::select(diesel::dsl::exists(
                        registration_requests::table.find(request_id),
                    ))
                    .get_result::<bool>(conn)
                    .await?;
                    return Err(if exists {
                        AppError::new(ErrorKind::InvalidState, "request is already resolved")
                    } else {
                        AppError::new(ErrorKind::NotFound, "no such registration request")
                    });
                };

                let account = diesel::insert_into(accounts::table)
                    .values(NewAccount {
                        name: &request.name,
                        email: &request.email,
                        password_hash: &password_hash,
                        role: Role::Ngo.as_str(),
                    })
                    .on_conflict(accounts::email)
                    .do_nothing()
                    .get_result::<Account>(conn)
                    .await
                    .optional()?;

                let Some(account) = account else {
                    return Err(AppError::new(
                        ErrorKind::DuplicateEmail,
                        "an account with the applicant email already exists",
                    ));
                };

                let ngo = diesel::insert_into(ngos::table)
                    .values(NewNgo {
                        account_id: account.id,
                        name: &request.name,
                        registration_no: &request.registration_no,
                        darpan_id: request.darpan_id.as_deref(),
                        email: &request.email,
                        phone: request.phone.as_deref(),
                        address: request.address.as_deref(),
                        city: request.city.as_deref(),
                        state: request.state.as_deref(),
                        mission: request.mission.as_deref(),
                        description: request.description.as_deref(),
                        website: request.website.as_deref(),
                        verified: true,
                        transparency_score: request.transparency_profile(true).score(),
                    })
                    .get_result::<Ngo>(conn)
                    .await?;

                Ok(ngo)
            }
            .scope_boxed()
        })
        .await?;

    tracing::info!(request_id, ngo_id = ngo.id, "registration request approved");

    Ok(Json(NgoResponse::from_ngo(ngo)))
}

#[derive(Deserialize)]
struct RejectRequest {
    reason: String,
}

async fn reject_request(
    Extension(pool): Extension<DbPool>,
    Path(request_id): Path<i32>,
    Auth(claims): Auth,
    Json(req): Json<RejectRequest>,
) -> AppResult<Json<RequestResponse>> {
    claims.require(Role::Admin)?;

    if req.reason.trim().is_empty() {
        return Err(AppError::new(
            ErrorKind::InvalidInput,
            "a rejection reason is required",
        ));
    }

    let conn = &mut write_conn(&pool).await?;

    let request = diesel::update(
        registration_requests::table
            .find(request_id)
            .filter(registration_requests::status.eq(RequestStatus::Pending.as_str())),
    )
    .set((
        registration_requests::status.eq(RequestStatus::Rejected.as_str()),
        registration_requests::rejection_reason.eq(req.reason),
    ))
    .get_result::<RegistrationRequest>(conn)
    .await
    .optional()?;

    let Some(request) = request else {
        let exists = diesel::select(diesel::dsl::exists(
            registration_requests::table.find(request_id),
        ))
        .get_result::<bool>(conn)
        .await?;
        return Err(if exists {
            AppError::new(ErrorKind::InvalidState, "request is already resolved")
        } else {
            AppError::new(ErrorKind::NotFound, "no such registration request")
        });
    };

    tracing::info!(request_id, "registration request rejected");

    Ok(Json(RequestResponse::from_request(request)))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AdminStats {
    total_users: i64,
    total_ngos: i64,
    pending_verifications: i64,
    blacklisted_ngos: i64,
    total_applications: i64,
    total_volunteer_posts: i64,
    total_events: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AdminDashboardResponse {
    stats: AdminStats,
    pending_requests: Vec<RequestResponse>,
}

async fn dashboard(
    Extension(pool): Extension<DbPool>,
    Auth(claims): Auth,
) -> AppResult<Json<AdminDashboardResponse>> {
    claims.require(Role::Admin)?;

    let conn = &mut read_conn(&pool).await?;

    let pending_requests = registration_requests::table
        .filter(registration_requests::status.eq(RequestStatus::Pending.as_str()))
        .order(registration_requests::created_at.desc())
        .load::<RegistrationRequest>(conn)
        .await?;

    let total_users = accounts::table
        .filter(accounts::role.eq(Role::User.as_str()))
        .count()
        .get_result::<i64>(conn)
        .await?;
    let total_ngos = ngos::table.count().get_result::<i64>(conn).await?;
    let blacklisted_ngos = ngos::table
        .filter(ngos::blacklisted.eq(true))
        .count()
        .get_result::<i64>(conn)
        .await?;
    let total_applications = applications::table.count().get_result::<i64>(conn).await?;
    let total_volunteer_posts = volunteer_posts::table.count().get_result::<i64>(conn).await?;
    let total_events = events::table.count().get_result::<i64>(conn).await?;

    Ok(Json(AdminDashboardResponse {
        stats: AdminStats {
            total_users,
            total_ngos,
            pending_verifications: pending_requests.len() as i64,
            blacklisted_ngos,
            total_applications,
            total_volunteer_posts,
            total_events,
        },
        pending_requests: pending_requests
            .into_iter()
            .map(RequestResponse::from_request)
            .collect(),
    }))
}

async fn verify_ngo(
    Extension(pool): Extension<DbPool>,
    Path(ngo_id): Path<i32>,
    Auth(claims): Auth,
) -> AppResult<Json<NgoResponse>> {
    claims.require(Role::Admin)?;

    let conn = &mut write_conn(&pool).await?;

    let mut ngo = ngos::table
        .find(ngo_id)
        .first::<Ngo>(conn)
        .await
        .optional()?
        .ok_or_else(|| AppError::new(ErrorKind::NotFound, "no such NGO"))?;

    // verification feeds the transparency score, so recompute alongside
    ngo.verified = true;
    let score = ngo.transparency_profile().score();

    let ngo = diesel::update(ngos::table.find(ngo_id))
        .set((ngos::verified.eq(true), ngos::transparency_score.eq(score)))
        .get_result::<Ngo>(conn)
        .await?;

    Ok(Json(NgoResponse::from_ngo(ngo)))
}

async fn blacklist_ngo(
    Extension(pool): Extension<DbPool>,
    Path(ngo_id): Path<i32>,
    Auth(claims): Auth,
) -> AppResult<Json<NgoResponse>> {
    claims.require(Role::Admin)?;

    let conn = &mut write_conn(&pool).await?;

    let ngo = diesel::update(ngos::table.find(ngo_id))
        .set(ngos::blacklisted.eq(true))
        .get_result::<Ngo>(conn)
        .await
        .optional()?
        .ok_or_else(|| AppError::new(ErrorKind::NotFound, "no such NGO"))?;

    tracing::info!(ngo_id, "NGO blacklisted");

    Ok(Json(NgoResponse::from_ngo(ngo)))
}

async fn unblacklist_ngo(
    Extension(pool): Extension<DbPool>,
    Path(ngo_id): Path<i32>,
    Auth(claims): Auth,
) -> AppResult<Json<NgoResponse>> {
    claims.require(Role::Admin)?;

    let conn = &mut write_conn(&pool).await?;

    let ngo = diesel::update(ngos::table.find(ngo_id))
        .set(ngos::blacklisted.eq(false))
        .get_result::<Ngo>(conn)
        .await
        .optional()?
        .ok_or_else(|| AppError::new(ErrorKind::NotFound, "no such NGO"))?;

    Ok(Json(NgoResponse::from_ngo(ngo)))
}

pub fn app() -> Router {
    Router::new()
        .route("/ngo-requests", get(list_requests))
        .route("/ngo-requests/:id/approve", post(approve_request))
        .route("/ngo-requests/:id/reject", post(reject_request))
        .route("/dashboard", get(dashboard))
        .route("/ngos/:id/verify", post(verify_ngo))
        .route("/ngos/:id/blacklist", post(blacklist_ngo))
        .route("/ngos/:id/unblacklist", post(unblacklist_ngo))
}
