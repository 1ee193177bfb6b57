use crate::{
    auth::auth::AuthUser,
    error::{ApiResult, FieldErrors},
    model::account::{validate_email, validate_name},
    model::profile::{self, ProfileResponse},
    utils::db_utils::fetch_or_not_found,
};
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use sqlx::MySqlPool;
use tracing::info;
use utoipa::ToSchema;

/// Display fields a user may change on their own account. Role and
/// balances are not editable here.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateProfile {
    #[schema(example = "jane.doe@company.com")]
    pub email: Option<String>,
    #[schema(example = "Jane")]
    pub first_name: Option<String>,
    #[schema(example = "Doe")]
    pub last_name: Option<String>,
}

impl UpdateProfile {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        if let Some(email) = &self.email {
            validate_email(email.trim(), &mut errors);
        }
        if let Some(first_name) = &self.first_name {
            validate_name("first_name", first_name, &mut errors);
        }
        if let Some(last_name) = &self.last_name {
            validate_name("last_name", last_name, &mut errors);
        }
        errors.into_result()
    }
}

/// Read own profile
#[utoipa::path(
    get,
    path = "/api/employee/profile",
    responses(
        (status = 200, description = "Profile of the caller", body = ProfileResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Profile not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Profile"
)]
pub async fn get_profile(auth: AuthUser, pool: web::Data<MySqlPool>) -> ApiResult<HttpResponse> {
    let row = fetch_or_not_found(
        profile::fetch_view(pool.get_ref(), auth.account_id).await?,
        "Profile",
    )?;
    Ok(HttpResponse::Ok().json(ProfileResponse::from(row)))
}

/// Update own display fields
#[utoipa::path(
    put,
    path = "/api/employee/profile",
    request_body = UpdateProfile,
    responses(
        (status = 200, description = "Updated profile", body = ProfileResponse),
        (status = 400, description = "Field validation errors"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Profile"
)]
pub async fn update_profile(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<UpdateProfile>,
) -> ApiResult<HttpResponse> {
    payload.validate()?;

    sqlx::query(
        r#"
        UPDATE accounts
        SET email = COALESCE(?, email),
            first_name = COALESCE(?, first_name),
            last_name = COALESCE(?, last_name)
        WHERE id = ?
        "#,
    )
    .bind(payload.email.as_deref().map(str::trim))
    .bind(payload.first_name.as_deref())
    .bind(payload.last_name.as_deref())
    .bind(auth.account_id)
    .execute(pool.get_ref())
    .await?;

    info!(account_id = auth.account_id, "Profile updated");

    let row = fetch_or_not_found(
        profile::fetch_view(pool.get_ref(), auth.account_id).await?,
        "Profile",
    )?;
    Ok(HttpResponse::Ok().json(ProfileResponse::from(row)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_email_is_reported_per_field() {
        let update = UpdateProfile {
            email: Some("not-an-email".into()),
            ..UpdateProfile::default()
        };
        let errors = update.validate().unwrap_err();
        assert!(errors.get("email").is_some());
    }

    #[test]
    fn role_and_balances_are_ignored_in_the_payload() {
        let update: UpdateProfile = serde_json::from_value(serde_json::json!({
            "first_name": "Janet",
            "role": "admin",
            "casual_leave_balance": 99
        }))
        .unwrap();
        assert_eq!(update.first_name.as_deref(), Some("Janet"));
        assert!(update.validate().is_ok());
    }
}
