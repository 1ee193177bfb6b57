use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{MySql, MySqlConnection};
use strum_macros::{AsRefStr, Display, EnumString};
use tracing::debug;
use utoipa::ToSchema;

use crate::model::account::AccountSummary;
use crate::utils::db_utils::{FilterValue, WhereClause};

const SECONDS_PER_DAY: i64 = 86_400;

pub const LEAVE_COLUMNS: &str = "id, account_id, leave_type, start_date, end_date, no_days, reason, status, reason_not_approved";

const LEAVE_VIEW_SELECT: &str = r#"
    SELECT l.id, l.account_id, l.leave_type, l.start_date, l.end_date, l.no_days,
           l.reason, l.status, l.reason_not_approved,
           a.username, a.email, a.first_name, a.last_name
    FROM leave_requests l
    JOIN accounts a ON a.id = l.account_id
"#;

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LeaveType {
    Casual,
    Sick,
    Other,
}

#[derive(
    Debug,
    Copy,
    Clone,
    Default,
    Eq,
    PartialEq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LeaveStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl TryFrom<String> for LeaveType {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl TryFrom<String> for LeaveStatus {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Whole days between the two instants (floored) plus one. Time of day only
/// matters through the floor: 09:00 to 08:00 the next morning is one day.
pub fn count_days(start: DateTime<Utc>, end: DateTime<Utc>) -> i32 {
    let whole_days = (end - start).num_seconds().div_euclid(SECONDS_PER_DAY);
    (whole_days + 1) as i32
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct LeaveRequest {
    pub id: u64,
    pub account_id: u64,
    #[sqlx(try_from = "String")]
    pub leave_type: LeaveType,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub no_days: i32,
    pub reason: String,
    #[sqlx(try_from = "String")]
    pub status: LeaveStatus,
    pub reason_not_approved: Option<String>,
}

impl LeaveRequest {
    pub fn recompute_days(&mut self) {
        self.no_days = count_days(self.start_date, self.end_date);
    }

    /// Inclusive overlap with `[start, end]`.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start_date <= end && self.end_date >= start
    }
}

/// Row from the leave/account join used for every response.
#[derive(Debug, sqlx::FromRow)]
pub struct LeaveRow {
    #[sqlx(flatten)]
    pub leave: LeaveRequest,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[schema(example = json!({
    "id": 12,
    "user": {
        "id": 7,
        "email": "jane@company.com",
        "username": "jane",
        "first_name": "Jane",
        "last_name": "Doe"
    },
    "leave_type": "sick",
    "start_date": "2026-11-02T00:00:00Z",
    "end_date": "2026-11-04T00:00:00Z",
    "no_days": 3,
    "reason": "Flu",
    "status": "pending",
    "reason_not_approved": null
}))]
pub struct LeaveResponse {
    pub id: u64,
    pub user: AccountSummary,
    pub leave_type: LeaveType,
    #[schema(example = "2026-11-02T00:00:00Z", format = "date-time", value_type = String)]
    pub start_date: DateTime<Utc>,
    #[schema(example = "2026-11-04T00:00:00Z", format = "date-time", value_type = String)]
    pub end_date: DateTime<Utc>,
    pub no_days: i32,
    pub reason: String,
    pub status: LeaveStatus,
    pub reason_not_approved: Option<String>,
}

impl From<LeaveRow> for LeaveResponse {
    fn from(row: LeaveRow) -> Self {
        let leave = row.leave;
        Self {
            id: leave.id,
            user: AccountSummary {
                id: leave.account_id,
                email: row.email,
                username: row.username,
                first_name: row.first_name,
                last_name: row.last_name,
            },
            leave_type: leave.leave_type,
            start_date: leave.start_date,
            end_date: leave.end_date,
            no_days: leave.no_days,
            reason: leave.reason,
            status: leave.status,
            reason_not_approved: leave.reason_not_approved,
        }
    }
}

/// Field values for a new request; `no_days` is derived on insert.
#[derive(Debug, Clone)]
pub struct NewLeave<'a> {
    pub account_id: u64,
    pub leave_type: LeaveType,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub reason: &'a str,
}

impl NewLeave<'_> {
    pub async fn insert(&self, conn: &mut MySqlConnection) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO leave_requests
                (account_id, leave_type, start_date, end_date, no_days, reason, status)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(self.account_id)
        .bind(self.leave_type.as_ref())
        .bind(self.start_date)
        .bind(self.end_date)
        .bind(count_days(self.start_date, self.end_date))
        .bind(self.reason)
        .bind(LeaveStatus::Pending.as_ref())
        .execute(conn)
        .await?;
        Ok(result.last_insert_id())
    }
}

pub async fn lock_by_id(
    conn: &mut MySqlConnection,
    id: u64,
) -> Result<Option<LeaveRequest>, sqlx::Error> {
    sqlx::query_as::<_, LeaveRequest>(&format!(
        "SELECT {LEAVE_COLUMNS} FROM leave_requests WHERE id = ? FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(conn)
    .await
}

pub async fn for_account<'e, E>(executor: E, account_id: u64) -> Result<Vec<LeaveRequest>, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = MySql>,
{
    sqlx::query_as::<_, LeaveRequest>(&format!(
        "SELECT {LEAVE_COLUMNS} FROM leave_requests WHERE account_id = ?"
    ))
    .bind(account_id)
    .fetch_all(executor)
    .await
}

/// Writes every mutable column, `no_days` included, so the stored value
/// always matches the stored dates.
pub async fn save(conn: &mut MySqlConnection, leave: &LeaveRequest) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE leave_requests
        SET leave_type = ?, start_date = ?, end_date = ?, no_days = ?,
            reason = ?, status = ?, reason_not_approved = ?
        WHERE id = ?
        "#,
    )
    .bind(leave.leave_type.as_ref())
    .bind(leave.start_date)
    .bind(leave.end_date)
    .bind(count_days(leave.start_date, leave.end_date))
    .bind(&leave.reason)
    .bind(leave.status.as_ref())
    .bind(&leave.reason_not_approved)
    .bind(leave.id)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn fetch_view<'e, E>(executor: E, id: u64) -> Result<Option<LeaveRow>, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = MySql>,
{
    sqlx::query_as::<_, LeaveRow>(&format!("{LEAVE_VIEW_SELECT} WHERE l.id = ?"))
        .bind(id)
        .fetch_optional(executor)
        .await
}

pub async fn list_views_for_account<'e, E>(
    executor: E,
    account_id: u64,
) -> Result<Vec<LeaveRow>, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = MySql>,
{
    sqlx::query_as::<_, LeaveRow>(&format!(
        "{LEAVE_VIEW_SELECT} WHERE l.account_id = ? ORDER BY l.start_date DESC, l.id DESC"
    ))
    .bind(account_id)
    .fetch_all(executor)
    .await
}

pub async fn list_views<'e, E>(executor: E, filter: &WhereClause) -> Result<Vec<LeaveRow>, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = MySql>,
{
    let sql = format!("{LEAVE_VIEW_SELECT}{} ORDER BY l.id DESC", filter.sql());
    debug!(sql = %sql, bindings = ?filter.values(), "Fetching leave requests");

    let mut query = sqlx::query_as::<_, LeaveRow>(&sql);
    for value in filter.values() {
        query = match value {
            FilterValue::U64(v) => query.bind(*v),
            FilterValue::Str(s) => query.bind(s.as_str()),
        };
    }
    query.fetch_all(executor).await
}
