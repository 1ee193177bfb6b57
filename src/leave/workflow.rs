use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use sqlx::MySqlPool;
use tracing::{debug, info, instrument};
use utoipa::ToSchema;

use crate::error::{ApiResult, FieldErrors};
use crate::leave::validator::{LeaveCandidate, validate_leave};
use crate::model::account::BLANK_FIELD;
use crate::model::leave_request::{self, LeaveRequest, LeaveStatus, LeaveType};
use crate::model::profile::{self, Profile};
use crate::utils::date_utils::deserialize_optional_datetime;
use crate::utils::db_utils::fetch_or_not_found;

pub const APPROVED_SCHEDULE_LOCKED: &str =
    "Approved leave cannot be re-scheduled; set it back to pending first.";

/// What a status change does to the owner's balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerEffect {
    Debit,
    Credit,
    Unchanged,
}

pub fn ledger_effect(previous: LeaveStatus, next: LeaveStatus) -> LedgerEffect {
    use LeaveStatus::Approved;
    match (previous == Approved, next == Approved) {
        (false, true) => LedgerEffect::Debit,
        (true, false) => LedgerEffect::Credit,
        _ => LedgerEffect::Unchanged,
    }
}

pub fn insufficient_balance_to_approve(leave_type: LeaveType) -> String {
    format!("Insufficient {leave_type} leave balance to approve this request.")
}

/// Partial edit sent by an admin. Absent fields keep their stored value.
#[derive(Debug, Default, Clone, Deserialize, ToSchema)]
pub struct LeaveUpdate {
    #[schema(example = "approved")]
    pub status: Option<LeaveStatus>,
    #[schema(example = "Team is short-staffed that week")]
    pub reason_not_approved: Option<String>,
    pub leave_type: Option<LeaveType>,
    #[serde(default, deserialize_with = "deserialize_optional_datetime")]
    #[schema(example = "2026-11-02T00:00:00Z", format = "date-time", value_type = Option<String>)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "deserialize_optional_datetime")]
    #[schema(example = "2026-11-04T00:00:00Z", format = "date-time", value_type = Option<String>)]
    pub end_date: Option<DateTime<Utc>>,
    pub reason: Option<String>,
}

impl LeaveUpdate {
    /// True when the edit changes which days (or which ledger) the request uses.
    pub fn touches_schedule(&self) -> bool {
        self.leave_type.is_some() || self.start_date.is_some() || self.end_date.is_some()
    }

    /// Copy of `leave` with the edit applied and `no_days` recomputed.
    pub fn apply(&self, leave: &LeaveRequest) -> LeaveRequest {
        let mut updated = leave.clone();
        if let Some(status) = self.status {
            updated.status = status;
        }
        if let Some(leave_type) = self.leave_type {
            updated.leave_type = leave_type;
        }
        if let Some(start) = self.start_date {
            updated.start_date = start;
        }
        if let Some(end) = self.end_date {
            updated.end_date = end;
        }
        if let Some(reason) = &self.reason {
            updated.reason = reason.trim().to_string();
        }
        if let Some(note) = &self.reason_not_approved {
            updated.reason_not_approved = Some(note.clone());
        }
        updated.recompute_days();
        updated
    }
}

/// Outcome of a planned update, ready to persist.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub leave: LeaveRequest,
    pub profile: Profile,
    pub effect: LedgerEffect,
}

/// Decides the result of applying `update` to `current` without touching
/// storage. `others` are the owner's stored requests, `profile` is the
/// owner's profile as currently stored.
pub fn plan_transition(
    current: &LeaveRequest,
    update: &LeaveUpdate,
    profile: &Profile,
    others: &[LeaveRequest],
    today: NaiveDate,
) -> Result<Transition, FieldErrors> {
    let previous = current.status;

    if update.reason.as_deref().is_some_and(|r| r.trim().is_empty()) {
        return Err(FieldErrors::single("reason", BLANK_FIELD));
    }

    if update.touches_schedule() && previous == LeaveStatus::Approved {
        return Err(FieldErrors::single("status", APPROVED_SCHEDULE_LOCKED));
    }

    let leave = update.apply(current);

    if update.touches_schedule() {
        validate_leave(&LeaveCandidate::from_request(&leave), others, profile, today)?;
    }

    let effect = ledger_effect(previous, leave.status);
    let mut profile = profile.clone();

    if let Some(balance) = profile.balance_mut(leave.leave_type) {
        match effect {
            LedgerEffect::Debit => {
                // Balance may have moved since the request was submitted.
                if *balance < leave.no_days {
                    return Err(FieldErrors::single(
                        "status",
                        insufficient_balance_to_approve(leave.leave_type),
                    ));
                }
                *balance -= leave.no_days;
            }
            LedgerEffect::Credit => *balance += leave.no_days,
            LedgerEffect::Unchanged => {}
        }
    }

    Ok(Transition {
        leave,
        profile,
        effect,
    })
}

/// Applies an admin edit to a stored request and adjusts the owner's balance
/// in the same transaction. The request row is locked first, then the
/// profile row.
#[instrument(name = "leave_transition", skip(pool, update))]
pub async fn transition_leave(
    pool: &MySqlPool,
    leave_id: u64,
    update: &LeaveUpdate,
    today: NaiveDate,
) -> ApiResult<LeaveRequest> {
    let mut tx = pool.begin().await?;

    let current = fetch_or_not_found(
        leave_request::lock_by_id(&mut *tx, leave_id).await?,
        "Leave request",
    )?;
    let owner_profile = fetch_or_not_found(
        profile::lock_for_account(&mut *tx, current.account_id).await?,
        "Profile",
    )?;

    let others = if update.touches_schedule() {
        leave_request::for_account(&mut *tx, current.account_id).await?
    } else {
        Vec::new()
    };

    let transition = plan_transition(&current, update, &owner_profile, &others, today)?;
    debug!(
        previous = %current.status,
        next = %transition.leave.status,
        effect = ?transition.effect,
        "Planned leave transition"
    );

    leave_request::save(&mut *tx, &transition.leave).await?;
    if transition.effect != LedgerEffect::Unchanged {
        profile::save_balances(&mut *tx, &transition.profile).await?;
    }

    tx.commit().await?;

    info!(
        account_id = current.account_id,
        status = %transition.leave.status,
        casual_leave_balance = transition.profile.casual_leave_balance,
        sick_leave_balance = transition.profile.sick_leave_balance,
        "Leave request updated"
    );

    Ok(transition.leave)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leave::validator::PAST_DATES;
    use crate::model::leave_request::count_days;
    use crate::model::role::Role;
    use chrono::TimeZone;

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 11, d, 0, 0, 0).unwrap()
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 11, 1).unwrap()
    }

    fn profile(casual: i32, sick: i32) -> Profile {
        Profile {
            id: 1,
            account_id: 7,
            role: Role::Employee,
            casual_leave_balance: casual,
            sick_leave_balance: sick,
        }
    }

    fn leave(leave_type: LeaveType, start: u32, end: u32, status: LeaveStatus) -> LeaveRequest {
        LeaveRequest {
            id: 12,
            account_id: 7,
            leave_type,
            start_date: day(start),
            end_date: day(end),
            no_days: count_days(day(start), day(end)),
            reason: "flu".into(),
            status,
            reason_not_approved: None,
        }
    }

    fn set_status(status: LeaveStatus) -> LeaveUpdate {
        LeaveUpdate {
            status: Some(status),
            ..LeaveUpdate::default()
        }
    }

    #[test]
    fn ledger_effect_covers_every_transition() {
        use LeaveStatus::*;
        assert_eq!(ledger_effect(Pending, Approved), LedgerEffect::Debit);
        assert_eq!(ledger_effect(Rejected, Approved), LedgerEffect::Debit);
        assert_eq!(ledger_effect(Approved, Pending), LedgerEffect::Credit);
        assert_eq!(ledger_effect(Approved, Rejected), LedgerEffect::Credit);
        assert_eq!(ledger_effect(Pending, Rejected), LedgerEffect::Unchanged);
        assert_eq!(ledger_effect(Rejected, Pending), LedgerEffect::Unchanged);
        assert_eq!(ledger_effect(Approved, Approved), LedgerEffect::Unchanged);
        assert_eq!(ledger_effect(Pending, Pending), LedgerEffect::Unchanged);
    }

    #[test]
    fn approve_then_revert_restores_the_sick_balance() {
        let pending = leave(LeaveType::Sick, 2, 4, LeaveStatus::Pending);
        let start = profile(10, 10);

        let approved =
            plan_transition(&pending, &set_status(LeaveStatus::Approved), &start, &[], today())
                .unwrap();
        assert_eq!(approved.effect, LedgerEffect::Debit);
        assert_eq!(approved.profile.sick_leave_balance, 7);
        assert_eq!(approved.profile.casual_leave_balance, 10);

        let reverted = plan_transition(
            &approved.leave,
            &set_status(LeaveStatus::Rejected),
            &approved.profile,
            &[],
            today(),
        )
        .unwrap();
        assert_eq!(reverted.effect, LedgerEffect::Credit);
        assert_eq!(reverted.profile, start);
    }

    #[test]
    fn rejecting_a_pending_request_leaves_balances_alone() {
        let pending = leave(LeaveType::Casual, 2, 4, LeaveStatus::Pending);
        let t = plan_transition(
            &pending,
            &set_status(LeaveStatus::Rejected),
            &profile(10, 10),
            &[],
            today(),
        )
        .unwrap();
        assert_eq!(t.effect, LedgerEffect::Unchanged);
        assert_eq!(t.profile, profile(10, 10));
    }

    #[test]
    fn other_leave_never_moves_a_balance() {
        let pending = leave(LeaveType::Other, 2, 30, LeaveStatus::Pending);
        let t = plan_transition(
            &pending,
            &set_status(LeaveStatus::Approved),
            &profile(1, 1),
            &[],
            today(),
        )
        .unwrap();
        assert_eq!(t.effect, LedgerEffect::Debit);
        assert_eq!(t.profile, profile(1, 1));
    }

    #[test]
    fn approval_rechecks_a_depleted_balance() {
        let pending = leave(LeaveType::Casual, 2, 4, LeaveStatus::Pending);
        let errors = plan_transition(
            &pending,
            &set_status(LeaveStatus::Approved),
            &profile(2, 10),
            &[],
            today(),
        )
        .unwrap_err();
        assert_eq!(
            errors.get("status").unwrap(),
            ["Insufficient casual leave balance to approve this request."]
        );
    }

    #[test]
    fn past_requests_can_still_change_status() {
        let old = leave(LeaveType::Sick, 2, 3, LeaveStatus::Approved);
        let later = NaiveDate::from_ymd_opt(2026, 12, 1).unwrap();
        let t = plan_transition(&old, &set_status(LeaveStatus::Pending), &profile(10, 8), &[], later)
            .unwrap();
        assert_eq!(t.profile.sick_leave_balance, 10);
    }

    #[test]
    fn rescheduling_recomputes_days_and_revalidates() {
        let pending = leave(LeaveType::Casual, 2, 4, LeaveStatus::Pending);
        let update = LeaveUpdate {
            end_date: Some(day(6)),
            ..LeaveUpdate::default()
        };
        let t = plan_transition(&pending, &update, &profile(10, 10), &[pending.clone()], today())
            .unwrap();
        assert_eq!(t.leave.no_days, 5);
        assert_eq!(t.effect, LedgerEffect::Unchanged);

        let backdated = LeaveUpdate {
            start_date: Some(Utc.with_ymd_and_hms(2026, 10, 20, 0, 0, 0).unwrap()),
            ..LeaveUpdate::default()
        };
        let errors =
            plan_transition(&pending, &backdated, &profile(10, 10), &[], today()).unwrap_err();
        assert_eq!(errors.get("start_date").unwrap(), [PAST_DATES]);
    }

    #[test]
    fn approved_requests_cannot_be_rescheduled() {
        let approved = leave(LeaveType::Casual, 2, 4, LeaveStatus::Approved);
        let update = LeaveUpdate {
            end_date: Some(day(8)),
            ..LeaveUpdate::default()
        };
        let errors =
            plan_transition(&approved, &update, &profile(10, 10), &[], today()).unwrap_err();
        assert_eq!(errors.get("status").unwrap(), [APPROVED_SCHEDULE_LOCKED]);
    }

    #[test]
    fn reason_not_approved_is_a_plain_edit() {
        let pending = leave(LeaveType::Casual, 2, 4, LeaveStatus::Pending);
        let update = LeaveUpdate {
            status: Some(LeaveStatus::Rejected),
            reason_not_approved: Some("Quarter-end freeze".into()),
            ..LeaveUpdate::default()
        };
        let t = plan_transition(&pending, &update, &profile(10, 10), &[], today()).unwrap();
        assert_eq!(t.leave.reason_not_approved.as_deref(), Some("Quarter-end freeze"));
        assert_eq!(t.leave.status, LeaveStatus::Rejected);
    }

    #[test]
    fn blank_reason_is_rejected() {
        let pending = leave(LeaveType::Casual, 2, 4, LeaveStatus::Pending);
        let update = LeaveUpdate {
            reason: Some("   ".into()),
            ..LeaveUpdate::default()
        };
        let errors = plan_transition(&pending, &update, &profile(10, 10), &[], today()).unwrap_err();
        assert_eq!(errors.get("reason").unwrap(), [BLANK_FIELD]);
    }

    #[test]
    fn update_payload_accepts_partial_json() {
        let update: LeaveUpdate =
            serde_json::from_value(serde_json::json!({ "status": "approved" })).unwrap();
        assert_eq!(update.status, Some(LeaveStatus::Approved));
        assert!(!update.touches_schedule());

        let update: LeaveUpdate =
            serde_json::from_value(serde_json::json!({ "start_date": "2026-11-05" })).unwrap();
        assert_eq!(update.start_date, Some(day(5)));
        assert!(update.touches_schedule());
    }

    mod store {
        use super::*;
        use crate::model::account::{NewAccount, insert_with_profile};
        use crate::model::leave_request::NewLeave;

        async fn seed_sick_leave(pool: &MySqlPool, days: u32) -> (u64, u64) {
            let mut tx = pool.begin().await.unwrap();
            let account_id = insert_with_profile(
                &mut *tx,
                &NewAccount {
                    username: "jane".into(),
                    email: "jane@company.com".into(),
                    first_name: "Jane".into(),
                    last_name: "Doe".into(),
                    password_hash: "unused".into(),
                    is_superuser: false,
                },
            )
            .await
            .unwrap();
            let start = Utc::now() + chrono::Duration::days(7);
            let leave_id = NewLeave {
                account_id,
                leave_type: LeaveType::Sick,
                start_date: start,
                end_date: start + chrono::Duration::days(i64::from(days) - 1),
                reason: "surgery",
            }
            .insert(&mut *tx)
            .await
            .unwrap();
            tx.commit().await.unwrap();
            (account_id, leave_id)
        }

        async fn sick_balance(pool: &MySqlPool, account_id: u64) -> i32 {
            sqlx::query_scalar("SELECT sick_leave_balance FROM profiles WHERE account_id = ?")
                .bind(account_id)
                .fetch_one(pool)
                .await
                .unwrap()
        }

        #[sqlx::test(migrations = "./migrations")]
        #[ignore = "needs a MySQL DATABASE_URL"]
        async fn approval_and_revert_persist_together(pool: MySqlPool) {
            let (account_id, leave_id) = seed_sick_leave(&pool, 3).await;
            let today = Utc::now().date_naive();

            let approved =
                transition_leave(&pool, leave_id, &set_status(LeaveStatus::Approved), today)
                    .await
                    .unwrap();
            assert_eq!(approved.no_days, 3);
            assert_eq!(sick_balance(&pool, account_id).await, 7);

            transition_leave(&pool, leave_id, &set_status(LeaveStatus::Rejected), today)
                .await
                .unwrap();
            assert_eq!(sick_balance(&pool, account_id).await, 10);
        }

        #[sqlx::test(migrations = "./migrations")]
        #[ignore = "needs a MySQL DATABASE_URL"]
        async fn failed_recheck_rolls_back_the_status(pool: MySqlPool) {
            let (account_id, leave_id) = seed_sick_leave(&pool, 4).await;
            sqlx::query("UPDATE profiles SET sick_leave_balance = 1 WHERE account_id = ?")
                .bind(account_id)
                .execute(&pool)
                .await
                .unwrap();

            let today = Utc::now().date_naive();
            let result =
                transition_leave(&pool, leave_id, &set_status(LeaveStatus::Approved), today).await;
            assert!(result.is_err());

            let status: String = sqlx::query_scalar("SELECT status FROM leave_requests WHERE id = ?")
                .bind(leave_id)
                .fetch_one(&pool)
                .await
                .unwrap();
            assert_eq!(status, "pending");
            assert_eq!(sick_balance(&pool, account_id).await, 1);
        }

        #[sqlx::test(migrations = "./migrations")]
        #[ignore = "needs a MySQL DATABASE_URL"]
        async fn every_account_gets_exactly_one_profile(pool: MySqlPool) {
            let (account_id, _) = seed_sick_leave(&pool, 1).await;
            let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM profiles WHERE account_id = ?")
                .bind(account_id)
                .fetch_one(&pool)
                .await
                .unwrap();
            assert_eq!(count, 1);

            sqlx::query("UPDATE accounts SET is_superuser = TRUE WHERE id = ?")
                .bind(account_id)
                .execute(&pool)
                .await
                .unwrap();
            let role: String = sqlx::query_scalar("SELECT role FROM profiles WHERE account_id = ?")
                .bind(account_id)
                .fetch_one(&pool)
                .await
                .unwrap();
            assert_eq!(role, "employee");
        }
    }
}
