use crate::{
    auth::{auth::AuthUser, password::hash_password},
    error::{ApiError, ApiResult, FieldErrors},
    model::account::{
        self, AccountSummary, BLANK_FIELD, NewAccount, USERNAME_TAKEN, validate_email,
        validate_name, validate_username,
    },
    model::profile::{self, ProfileResponse},
    utils::db_utils::fetch_or_not_found,
};
use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use tracing::{error, info};
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateAccount {
    #[schema(example = "jane")]
    pub username: String,
    #[schema(example = "s3cret-pass")]
    pub password: String,
    #[serde(default)]
    #[schema(example = "jane@company.com", format = "email")]
    pub email: String,
    #[serde(default)]
    #[schema(example = "Jane")]
    pub first_name: String,
    #[serde(default)]
    #[schema(example = "Doe")]
    pub last_name: String,
    /// Grants admin rights; the profile role is derived from it once
    #[serde(default)]
    pub is_superuser: bool,
}

impl CreateAccount {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        validate_username(self.username.trim(), &mut errors);
        if self.password.is_empty() {
            errors.add("password", BLANK_FIELD);
        }
        validate_email(self.email.trim(), &mut errors);
        validate_name("first_name", &self.first_name, &mut errors);
        validate_name("last_name", &self.last_name, &mut errors);
        errors.into_result()
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AccountStatusResponse {
    #[schema(example = 7)]
    pub id: u64,
    #[schema(example = false)]
    pub is_active: bool,
}

/// List profiles of every non-admin account (admin)
#[utoipa::path(
    get,
    path = "/api/manager/all-users",
    responses(
        (status = 200, description = "Non-admin profiles", body = [ProfileResponse]),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Manager"
)]
pub async fn all_users(auth: AuthUser, pool: web::Data<MySqlPool>) -> ApiResult<HttpResponse> {
    auth.require_admin()?;

    let rows = profile::list_non_admin(pool.get_ref()).await?;
    let data: Vec<ProfileResponse> = rows.into_iter().map(ProfileResponse::from).collect();
    Ok(HttpResponse::Ok().json(data))
}

/// Flip an account's active flag (admin)
#[utoipa::path(
    put,
    path = "/api/manager/users/{user_id}/status",
    params(
        ("user_id" = u64, Path, description = "Account ID")
    ),
    responses(
        (status = 200, description = "New active flag", body = AccountStatusResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Account not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Manager"
)]
pub async fn toggle_user_status(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;

    let account_id = path.into_inner();
    let mut tx = pool.begin().await?;

    let is_active = sqlx::query_scalar::<_, bool>(
        "SELECT is_active FROM accounts WHERE id = ? FOR UPDATE",
    )
    .bind(account_id)
    .fetch_optional(&mut *tx)
    .await?;
    let is_active = !fetch_or_not_found(is_active, "Account")?;

    sqlx::query("UPDATE accounts SET is_active = ? WHERE id = ?")
        .bind(is_active)
        .bind(account_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    info!(account_id, is_active, changed_by = %auth.username, "Account status toggled");

    Ok(HttpResponse::Ok().json(AccountStatusResponse {
        id: account_id,
        is_active,
    }))
}

/// Create an account and its profile (admin)
#[utoipa::path(
    post,
    path = "/api/manager/users/create",
    request_body = CreateAccount,
    responses(
        (status = 201, description = "Account created", body = AccountSummary),
        (status = 400, description = "Field validation errors", body = Object, example = json!({
            "username": ["A user with that username already exists."]
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Manager"
)]
pub async fn create_user(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateAccount>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;
    payload.validate()?;

    let username = payload.username.trim();
    let password_hash = hash_password(&payload.password).map_err(|e| {
        error!(error = %e, "Failed to hash password");
        ApiError::Internal("Failed to hash password".into())
    })?;

    let mut tx = pool.begin().await?;

    if account::username_taken(&mut *tx, username).await? {
        return Err(ApiError::field("username", USERNAME_TAKEN));
    }

    let new = NewAccount {
        username: username.to_string(),
        email: payload.email.trim().to_string(),
        first_name: payload.first_name.clone(),
        last_name: payload.last_name.clone(),
        password_hash,
        is_superuser: payload.is_superuser,
    };
    let account_id = account::insert_with_profile(&mut *tx, &new).await?;
    let created = fetch_or_not_found(account::find_by_id(&mut *tx, account_id).await?, "Account")?;
    tx.commit().await?;

    info!(
        account_id,
        username = %created.username,
        is_superuser = created.is_superuser,
        created_by = %auth.username,
        "Account created"
    );

    Ok(HttpResponse::Created().json(AccountSummary::from(&created)))
}
