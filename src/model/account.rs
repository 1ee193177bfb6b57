use serde::{Deserialize, Serialize};
use sqlx::{MySql, MySqlConnection};
use utoipa::ToSchema;

use crate::error::FieldErrors;
use crate::model::profile::NewProfile;

pub const ACCOUNT_COLUMNS: &str =
    "id, username, email, first_name, last_name, password_hash, is_active, is_superuser";

const USERNAME_MAX_LEN: usize = 150;
const NAME_MAX_LEN: usize = 150;

pub const BLANK_FIELD: &str = "This field may not be blank.";
pub const INVALID_USERNAME: &str = "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.";
pub const INVALID_EMAIL: &str = "Enter a valid email address.";
pub const USERNAME_TAKEN: &str = "A user with that username already exists.";

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Account {
    pub id: u64,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
    pub is_active: bool,
    pub is_superuser: bool,
}

/// Public shape of an account, nested inside profiles and leave requests.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct AccountSummary {
    #[schema(example = 7)]
    pub id: u64,
    #[schema(example = "jane@company.com")]
    pub email: String,
    #[schema(example = "jane")]
    pub username: String,
    #[schema(example = "Jane")]
    pub first_name: String,
    #[schema(example = "Doe")]
    pub last_name: String,
}

impl From<&Account> for AccountSummary {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            email: account.email.clone(),
            username: account.username.clone(),
            first_name: account.first_name.clone(),
            last_name: account.last_name.clone(),
        }
    }
}

/// Validated input for account creation; `password_hash` is already hashed.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
    pub is_superuser: bool,
}

pub fn validate_username(username: &str, errors: &mut FieldErrors) {
    if username.is_empty() {
        errors.add("username", BLANK_FIELD);
    } else if username.chars().count() > USERNAME_MAX_LEN
        || !username
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
    {
        errors.add("username", INVALID_USERNAME);
    }
}

/// Blank is allowed; anything else needs a local part and a dotted domain.
pub fn validate_email(email: &str, errors: &mut FieldErrors) {
    if email.is_empty() {
        return;
    }
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if !valid {
        errors.add("email", INVALID_EMAIL);
    }
}

pub fn validate_name(field: &str, value: &str, errors: &mut FieldErrors) {
    if value.chars().count() > NAME_MAX_LEN {
        errors.add(field, format!("Ensure this field has no more than {NAME_MAX_LEN} characters."));
    }
}

pub async fn find_by_id<'e, E>(executor: E, id: u64) -> Result<Option<Account>, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = MySql>,
{
    sqlx::query_as::<_, Account>(&format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ?"))
        .bind(id)
        .fetch_optional(executor)
        .await
}

pub async fn find_by_username<'e, E>(
    executor: E,
    username: &str,
) -> Result<Option<Account>, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = MySql>,
{
    sqlx::query_as::<_, Account>(&format!(
        "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE username = ?"
    ))
    .bind(username)
    .fetch_optional(executor)
    .await
}

pub async fn username_taken<'e, E>(executor: E, username: &str) -> Result<bool, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = MySql>,
{
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM accounts WHERE username = ?")
        .bind(username)
        .fetch_one(executor)
        .await?;
    Ok(count > 0)
}

/// Inserts the account and its profile on the same connection. Callers run
/// this inside a transaction so both rows commit together.
pub async fn insert_with_profile(
    conn: &mut MySqlConnection,
    new: &NewAccount,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO accounts
            (username, email, first_name, last_name, password_hash, is_superuser)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&new.username)
    .bind(&new.email)
    .bind(&new.first_name)
    .bind(&new.last_name)
    .bind(&new.password_hash)
    .bind(new.is_superuser)
    .execute(&mut *conn)
    .await?;

    let account_id = result.last_insert_id();
    NewProfile::for_account(account_id, new.is_superuser)
        .insert(&mut *conn)
        .await?;

    Ok(account_id)
}
