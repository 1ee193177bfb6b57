use crate::error::ApiError;
use crate::model::leave_request::LeaveStatus;

/// Lookup-or-fail: turns a missing row into a 404 for `entity`.
pub fn fetch_or_not_found<T>(row: Option<T>, entity: &'static str) -> Result<T, ApiError> {
    row.ok_or(ApiError::NotFound(entity))
}

/// ===============================
/// SQL bindable filter value
/// ===============================
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    U64(u64),
    Str(String),
}

/// ===============================
/// WHERE clause builder
/// ===============================
#[derive(Debug, Default)]
pub struct WhereClause {
    conditions: Vec<&'static str>,
    values: Vec<FilterValue>,
}

impl WhereClause {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, condition: &'static str, value: FilterValue) {
        self.conditions.push(condition);
        self.values.push(value);
    }

    pub fn sql(&self) -> String {
        if self.conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.conditions.join(" AND "))
        }
    }

    pub fn values(&self) -> &[FilterValue] {
        &self.values
    }

    /// Filters for the admin leave list.
    pub fn for_leaves(status: Option<LeaveStatus>, account_id: Option<u64>) -> Self {
        let mut clause = Self::new();
        if let Some(status) = status {
            clause.push("l.status = ?", FilterValue::Str(status.as_ref().to_string()));
        }
        if let Some(account_id) = account_id {
            clause.push("l.account_id = ?", FilterValue::U64(account_id));
        }
        clause
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_clause_renders_nothing() {
        let clause = WhereClause::for_leaves(None, None);
        assert_eq!(clause.sql(), "");
        assert!(clause.values().is_empty());
    }

    #[test]
    fn filters_render_in_bind_order() {
        let clause = WhereClause::for_leaves(Some(LeaveStatus::Pending), Some(9));
        assert_eq!(clause.sql(), " WHERE l.status = ? AND l.account_id = ?");
        assert_eq!(
            clause.values(),
            [FilterValue::Str("pending".into()), FilterValue::U64(9)]
        );
    }

    #[test]
    fn missing_rows_become_not_found() {
        let err = fetch_or_not_found::<u64>(None, "Leave request").unwrap_err();
        assert!(matches!(err, ApiError::NotFound("Leave request")));
        assert_eq!(fetch_or_not_found(Some(3), "Leave request").unwrap(), 3);
    }
}
