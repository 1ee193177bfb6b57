use crate::{
    auth::auth::AuthUser,
    error::{ApiError, ApiResult},
    leave::{
        validator::{LeaveCandidate, validate_leave},
        workflow::{LeaveUpdate, transition_leave},
    },
    model::account::BLANK_FIELD,
    model::leave_request::{self, LeaveResponse, LeaveStatus, LeaveType, NewLeave},
    model::profile,
    utils::date_utils::deserialize_datetime,
    utils::db_utils::{WhereClause, fetch_or_not_found},
};
use actix_web::{HttpResponse, web};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::MySqlPool;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, ToSchema)]
pub struct CreateLeave {
    #[schema(example = "sick")]
    pub leave_type: LeaveType,
    #[serde(deserialize_with = "deserialize_datetime")]
    #[schema(example = "2026-11-02T00:00:00Z", format = "date-time", value_type = String)]
    pub start_date: DateTime<Utc>,
    #[serde(deserialize_with = "deserialize_datetime")]
    #[schema(example = "2026-11-04T00:00:00Z", format = "date-time", value_type = String)]
    pub end_date: DateTime<Utc>,
    #[schema(example = "Flu")]
    pub reason: String,
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct LeaveFilter {
    /// Filter by leave status
    #[schema(example = "pending")]
    #[param(value_type = Option<String>)]
    pub status: Option<LeaveStatus>,
    /// Filter by owner account id
    #[schema(example = 7)]
    pub user_id: Option<u64>,
}

fn today() -> chrono::NaiveDate {
    Utc::now().date_naive()
}

/* =========================
Create leave request
========================= */
/// Apply for leave
#[utoipa::path(
    post,
    path = "/api/employee/leave",
    request_body(
        content = CreateLeave,
        description = "Leave request payload",
        content_type = "application/json"
    ),
    responses(
        (status = 201, description = "Leave request submitted", body = LeaveResponse),
        (status = 400, description = "Field validation errors", body = Object, example = json!({
            "leave_type": ["Insufficient casual leave balance."]
        })),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn create_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateLeave>,
) -> ApiResult<HttpResponse> {
    let reason = payload.reason.trim();
    if reason.is_empty() {
        return Err(ApiError::field("reason", BLANK_FIELD));
    }

    let mut tx = pool.begin().await?;

    // Holding the profile lock serialises submissions by the same user, so
    // the overlap and balance checks see every committed request.
    let owner_profile = fetch_or_not_found(
        profile::lock_for_account(&mut *tx, auth.account_id).await?,
        "Profile",
    )?;
    let existing = leave_request::for_account(&mut *tx, auth.account_id).await?;

    let candidate = LeaveCandidate {
        leave_type: payload.leave_type,
        start_date: payload.start_date,
        end_date: payload.end_date,
        editing: None,
    };
    validate_leave(&candidate, &existing, &owner_profile, today())?;

    let leave_id = NewLeave {
        account_id: auth.account_id,
        leave_type: payload.leave_type,
        start_date: payload.start_date,
        end_date: payload.end_date,
        reason,
    }
    .insert(&mut *tx)
    .await?;

    let row = fetch_or_not_found(leave_request::fetch_view(&mut *tx, leave_id).await?, "Leave request")?;
    tx.commit().await?;

    info!(
        leave_id,
        account_id = auth.account_id,
        leave_type = %payload.leave_type,
        no_days = row.leave.no_days,
        "Leave request submitted"
    );

    Ok(HttpResponse::Created().json(LeaveResponse::from(row)))
}

/// List own leave requests
#[utoipa::path(
    get,
    path = "/api/employee/leave",
    responses(
        (status = 200, description = "Caller's leave requests", body = [LeaveResponse]),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn my_leaves(auth: AuthUser, pool: web::Data<MySqlPool>) -> ApiResult<HttpResponse> {
    let rows = leave_request::list_views_for_account(pool.get_ref(), auth.account_id).await?;
    let data: Vec<LeaveResponse> = rows.into_iter().map(LeaveResponse::from).collect();
    Ok(HttpResponse::Ok().json(data))
}

/// Leave request details; employees only see their own
#[utoipa::path(
    get,
    path = "/api/employee/leave/{leave_id}",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to fetch")
    ),
    responses(
        (status = 200, description = "Leave request found", body = LeaveResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Leave request not found", body = Object, example = json!({
            "detail": "Leave request not found."
        }))
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn get_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> ApiResult<HttpResponse> {
    let leave_id = path.into_inner();

    let row = leave_request::fetch_view(pool.get_ref(), leave_id)
        .await?
        .filter(|row| auth.can_view(row.leave.account_id));
    let row = fetch_or_not_found(row, "Leave request")?;

    Ok(HttpResponse::Ok().json(LeaveResponse::from(row)))
}

/* =========================
Admin: all leave requests
========================= */
/// List every leave request (admin)
#[utoipa::path(
    get,
    path = "/api/manager/leaves",
    params(LeaveFilter),
    responses(
        (status = 200, description = "Leave requests", body = [LeaveResponse]),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Manager"
)]
pub async fn leave_list(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<LeaveFilter>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;

    let filter = WhereClause::for_leaves(query.status, query.user_id);
    let rows = leave_request::list_views(pool.get_ref(), &filter).await?;
    let data: Vec<LeaveResponse> = rows.into_iter().map(LeaveResponse::from).collect();

    Ok(HttpResponse::Ok().json(data))
}

/* =========================
Admin: status workflow
========================= */
/// Change status and/or edit a leave request (admin)
#[utoipa::path(
    put,
    path = "/api/manager/leave/{leave_id}/status",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to update")
    ),
    request_body = LeaveUpdate,
    responses(
        (status = 200, description = "Updated leave request", body = LeaveResponse),
        (status = 400, description = "Field validation errors", body = Object, example = json!({
            "status": ["Insufficient sick leave balance to approve this request."]
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Leave request not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Manager"
)]
pub async fn update_leave_status(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<LeaveUpdate>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;

    let leave_id = path.into_inner();
    let updated = transition_leave(pool.get_ref(), leave_id, &payload, today()).await?;
    info!(leave_id, status = %updated.status, reviewed_by = %auth.username, "Leave request reviewed");

    let row = fetch_or_not_found(
        leave_request::fetch_view(pool.get_ref(), leave_id).await?,
        "Leave request",
    )?;
    Ok(HttpResponse::Ok().json(LeaveResponse::from(row)))
}
