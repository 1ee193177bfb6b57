use serde::Serialize;
use sqlx::{MySql, MySqlConnection};
use utoipa::ToSchema;

use crate::model::account::AccountSummary;
use crate::model::leave_request::LeaveType;
use crate::model::role::Role;

pub const DEFAULT_LEAVE_BALANCE: i32 = 10;

const PROFILE_COLUMNS: &str =
    "id, account_id, role, casual_leave_balance, sick_leave_balance";

const PROFILE_VIEW_SELECT: &str = r#"
    SELECT p.id, p.account_id, p.role, p.casual_leave_balance, p.sick_leave_balance,
           a.username, a.email, a.first_name, a.last_name
    FROM profiles p
    JOIN accounts a ON a.id = p.account_id
"#;

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Profile {
    pub id: u64,
    pub account_id: u64,
    #[sqlx(try_from = "String")]
    pub role: Role,
    pub casual_leave_balance: i32,
    pub sick_leave_balance: i32,
}

impl Profile {
    /// Balance backing a leave type; `None` for types without a ledger.
    pub fn balance_for(&self, leave_type: LeaveType) -> Option<i32> {
        match leave_type {
            LeaveType::Casual => Some(self.casual_leave_balance),
            LeaveType::Sick => Some(self.sick_leave_balance),
            LeaveType::Other => None,
        }
    }

    pub(crate) fn balance_mut(&mut self, leave_type: LeaveType) -> Option<&mut i32> {
        match leave_type {
            LeaveType::Casual => Some(&mut self.casual_leave_balance),
            LeaveType::Sick => Some(&mut self.sick_leave_balance),
            LeaveType::Other => None,
        }
    }
}

/// Profile created together with its account.
#[derive(Debug, Clone, PartialEq)]
pub struct NewProfile {
    pub account_id: u64,
    pub role: Role,
    pub casual_leave_balance: i32,
    pub sick_leave_balance: i32,
}

impl NewProfile {
    pub fn for_account(account_id: u64, is_superuser: bool) -> Self {
        Self {
            account_id,
            role: Role::for_new_account(is_superuser),
            casual_leave_balance: DEFAULT_LEAVE_BALANCE,
            sick_leave_balance: DEFAULT_LEAVE_BALANCE,
        }
    }

    pub async fn insert(&self, conn: &mut MySqlConnection) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO profiles
                (account_id, role, casual_leave_balance, sick_leave_balance)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(self.account_id)
        .bind(self.role.as_ref())
        .bind(self.casual_leave_balance)
        .bind(self.sick_leave_balance)
        .execute(conn)
        .await?;
        Ok(result.last_insert_id())
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct ProfileRow {
    #[sqlx(flatten)]
    pub profile: Profile,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[schema(example = json!({
    "id": 1,
    "user": {
        "id": 7,
        "email": "jane@company.com",
        "username": "jane",
        "first_name": "Jane",
        "last_name": "Doe"
    },
    "role": "employee",
    "casual_leave_balance": 10,
    "sick_leave_balance": 10
}))]
pub struct ProfileResponse {
    pub id: u64,
    pub user: AccountSummary,
    pub role: Role,
    pub casual_leave_balance: i32,
    pub sick_leave_balance: i32,
}

impl From<ProfileRow> for ProfileResponse {
    fn from(row: ProfileRow) -> Self {
        Self {
            id: row.profile.id,
            user: AccountSummary {
                id: row.profile.account_id,
                email: row.email,
                username: row.username,
                first_name: row.first_name,
                last_name: row.last_name,
            },
            role: row.profile.role,
            casual_leave_balance: row.profile.casual_leave_balance,
            sick_leave_balance: row.profile.sick_leave_balance,
        }
    }
}

/// Reads the profile row and holds a write lock on it until the surrounding
/// transaction ends.
pub async fn lock_for_account(
    conn: &mut MySqlConnection,
    account_id: u64,
) -> Result<Option<Profile>, sqlx::Error> {
    sqlx::query_as::<_, Profile>(&format!(
        "SELECT {PROFILE_COLUMNS} FROM profiles WHERE account_id = ? FOR UPDATE"
    ))
    .bind(account_id)
    .fetch_optional(conn)
    .await
}

pub async fn save_balances(conn: &mut MySqlConnection, profile: &Profile) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE profiles SET casual_leave_balance = ?, sick_leave_balance = ? WHERE id = ?",
    )
    .bind(profile.casual_leave_balance)
    .bind(profile.sick_leave_balance)
    .bind(profile.id)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn fetch_view<'e, E>(executor: E, account_id: u64) -> Result<Option<ProfileRow>, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = MySql>,
{
    sqlx::query_as::<_, ProfileRow>(&format!("{PROFILE_VIEW_SELECT} WHERE p.account_id = ?"))
        .bind(account_id)
        .fetch_optional(executor)
        .await
}

/// Profiles of every account without the admin flag.
pub async fn list_non_admin<'e, E>(executor: E) -> Result<Vec<ProfileRow>, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = MySql>,
{
    sqlx::query_as::<_, ProfileRow>(&format!(
        "{PROFILE_VIEW_SELECT} WHERE a.is_superuser = FALSE ORDER BY p.id"
    ))
    .fetch_all(executor)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(casual: i32, sick: i32) -> Profile {
        Profile {
            id: 1,
            account_id: 7,
            role: Role::Employee,
            casual_leave_balance: casual,
            sick_leave_balance: sick,
        }
    }

    #[test]
    fn new_profiles_start_with_default_balances() {
        let p = NewProfile::for_account(7, false);
        assert_eq!(p.role, Role::Employee);
        assert_eq!(p.casual_leave_balance, DEFAULT_LEAVE_BALANCE);
        assert_eq!(p.sick_leave_balance, DEFAULT_LEAVE_BALANCE);

        assert_eq!(NewProfile::for_account(8, true).role, Role::Admin);
    }

    #[test]
    fn other_leave_has_no_balance() {
        let p = profile(4, 6);
        assert_eq!(p.balance_for(LeaveType::Casual), Some(4));
        assert_eq!(p.balance_for(LeaveType::Sick), Some(6));
        assert_eq!(p.balance_for(LeaveType::Other), None);
    }

    #[test]
    fn response_nests_the_account() {
        let row = ProfileRow {
            profile: profile(10, 9),
            username: "jane".into(),
            email: "jane@company.com".into(),
            first_name: "Jane".into(),
            last_name: "Doe".into(),
        };
        let json = serde_json::to_value(ProfileResponse::from(row)).unwrap();
        assert_eq!(json["user"]["id"], 7);
        assert_eq!(json["role"], "employee");
        assert_eq!(json["sick_leave_balance"], 9);
    }
}
