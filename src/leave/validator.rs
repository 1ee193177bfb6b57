use chrono::{DateTime, NaiveDate, Utc};

use crate::error::FieldErrors;
use crate::model::leave_request::{LeaveRequest, LeaveStatus, LeaveType, count_days};
use crate::model::profile::Profile;

pub const REVERSED_DATES: &str = "End date cannot be before start date.";
pub const PAST_DATES: &str = "Leave dates cannot be in the past.";
pub const OVERLAPPING_DATES: &str = "You have already taken leave on these dates.";

/// The fields of a request that decide whether it may exist.
#[derive(Debug, Clone, Copy)]
pub struct LeaveCandidate {
    pub leave_type: LeaveType,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    /// Id of the stored request being edited; it never overlaps itself.
    pub editing: Option<u64>,
}

impl LeaveCandidate {
    pub fn from_request(leave: &LeaveRequest) -> Self {
        Self {
            leave_type: leave.leave_type,
            start_date: leave.start_date,
            end_date: leave.end_date,
            editing: Some(leave.id),
        }
    }

    pub fn no_days(&self) -> i32 {
        count_days(self.start_date, self.end_date)
    }
}

pub fn insufficient_balance(leave_type: LeaveType) -> String {
    format!("Insufficient {leave_type} leave balance.")
}

/// Checks a candidate against the calendar, the owner's other requests and
/// the owner's balance. Stops at the first failing check; the date checks
/// flag both date fields.
pub fn validate_leave(
    candidate: &LeaveCandidate,
    existing: &[LeaveRequest],
    profile: &Profile,
    today: NaiveDate,
) -> Result<(), FieldErrors> {
    if candidate.start_date > candidate.end_date {
        return Err(FieldErrors::single("end_date", REVERSED_DATES));
    }

    if candidate.start_date.date_naive() < today || candidate.end_date.date_naive() < today {
        return Err(both_dates(PAST_DATES));
    }

    let overlapping = existing.iter().any(|other| {
        other.status != LeaveStatus::Rejected
            && Some(other.id) != candidate.editing
            && other.overlaps(candidate.start_date, candidate.end_date)
    });
    if overlapping {
        return Err(both_dates(OVERLAPPING_DATES));
    }

    if let Some(balance) = profile.balance_for(candidate.leave_type) {
        if balance < candidate.no_days() {
            return Err(FieldErrors::single(
                "leave_type",
                insufficient_balance(candidate.leave_type),
            ));
        }
    }

    Ok(())
}

fn both_dates(message: &str) -> FieldErrors {
    let mut errors = FieldErrors::new();
    errors.add("start_date", message);
    errors.add("end_date", message);
    errors
}
