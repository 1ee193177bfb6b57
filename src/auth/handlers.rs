use crate::{
    auth::{
        jwt::{generate_access_token, generate_refresh_token, verify_token},
        password::verify_password,
    },
    config::Config,
    error::{ApiError, ApiResult, FieldErrors},
    model::account::{self, BLANK_FIELD},
    models::{AccessToken, LoginReqDto, RefreshReqDto, TokenPair, TokenType},
};
use actix_web::{HttpResponse, web};
use sqlx::{MySql, MySqlPool};
use tracing::{debug, error, info, instrument};

const NO_ACTIVE_ACCOUNT: &str = "No active account found with the given credentials";
const INVALID_TOKEN: &str = "Token is invalid or expired";

fn token_error(e: jsonwebtoken::errors::Error) -> ApiError {
    ApiError::Internal(format!("Failed to sign token: {e}"))
}

/// Verifies a refresh token and confirms it has not been revoked.
async fn verified_refresh_claims(
    token: &str,
    pool: &MySqlPool,
    config: &Config,
) -> ApiResult<crate::models::Claims> {
    let claims = verify_token(token, &config.jwt_secret)
        .map_err(|_| ApiError::Unauthorized(INVALID_TOKEN.into()))?;

    if claims.token_type != TokenType::Refresh {
        return Err(ApiError::Unauthorized(INVALID_TOKEN.into()));
    }

    let revoked = sqlx::query_scalar::<_, bool>("SELECT revoked FROM refresh_tokens WHERE jti = ?")
        .bind(&claims.jti)
        .fetch_optional(pool)
        .await?;

    match revoked {
        Some(false) => Ok(claims),
        Some(true) => Err(ApiError::Unauthorized("Token is blacklisted".into())),
        None => Err(ApiError::Unauthorized(INVALID_TOKEN.into())),
    }
}

/// Deletes the account's refresh tokens that are past `expires_at`.
pub async fn prune_expired_refresh_tokens<'e, E>(executor: E, account_id: u64) -> Result<u64, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = MySql>,
{
    let result = sqlx::query("DELETE FROM refresh_tokens WHERE account_id = ? AND expires_at < NOW()")
        .bind(account_id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}

/// Exchange credentials for an access/refresh token pair
#[utoipa::path(
    post,
    path = "/api/employee/token",
    request_body = LoginReqDto,
    responses(
        (status = 200, description = "Token pair issued", body = TokenPair),
        (status = 400, description = "Blank username or password"),
        (status = 401, description = "No active account found with the given credentials")
    ),
    tag = "Auth"
)]
#[instrument(
    name = "auth_login",
    skip(pool, config, user),
    fields(username = %user.username)
)]
pub async fn login(
    user: web::Json<LoginReqDto>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> ApiResult<HttpResponse> {
    info!("Login request received");

    // 1️⃣ Basic validation
    let mut errors = FieldErrors::new();
    if user.username.trim().is_empty() {
        errors.add("username", BLANK_FIELD);
    }
    if user.password.is_empty() {
        errors.add("password", BLANK_FIELD);
    }
    errors.into_result()?;

    // 2️⃣ Fetch account
    debug!("Fetching account from database");
    let Some(db_user) = account::find_by_username(pool.get_ref(), user.username.trim()).await?
    else {
        info!("Invalid credentials: user not found");
        return Err(ApiError::Unauthorized(NO_ACTIVE_ACCOUNT.into()));
    };

    // 3️⃣ Verify password and active flag
    if !verify_password(&user.password, &db_user.password_hash) {
        info!("Invalid credentials: password mismatch");
        return Err(ApiError::Unauthorized(NO_ACTIVE_ACCOUNT.into()));
    }
    if !db_user.is_active {
        info!(user_id = db_user.id, "Login refused: account inactive");
        return Err(ApiError::Unauthorized(NO_ACTIVE_ACCOUNT.into()));
    }

    // 4️⃣ Issue tokens
    let access = generate_access_token(&db_user, &config.jwt_secret, config.access_token_ttl)
        .map_err(token_error)?;
    let (refresh, refresh_claims) =
        generate_refresh_token(&db_user, &config.jwt_secret, config.refresh_token_ttl)
            .map_err(token_error)?;

    // 5️⃣ Store refresh token so it can be revoked
    debug!(user_id = db_user.id, jti = %refresh_claims.jti, "Storing refresh token");
    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (account_id, jti, expires_at)
        VALUES (?, ?, FROM_UNIXTIME(?))
        "#,
    )
    .bind(db_user.id)
    .bind(&refresh_claims.jti)
    .bind(refresh_claims.exp as i64)
    .execute(pool.get_ref())
    .await?;

    // 6️⃣ Drop this account's expired refresh tokens (non-fatal)
    match prune_expired_refresh_tokens(pool.get_ref(), db_user.id).await {
        Ok(0) => {}
        Ok(pruned) => debug!(user_id = db_user.id, pruned, "Pruned expired refresh tokens"),
        Err(e) => error!(error = %e, "Failed to prune expired refresh tokens"),
    }

    // 7️⃣ Update last_login_at (non-fatal)
    if let Err(e) = sqlx::query("UPDATE accounts SET last_login_at = NOW() WHERE id = ?")
        .bind(db_user.id)
        .execute(pool.get_ref())
        .await
    {
        error!(error = %e, "Failed to update last_login_at");
    }

    info!("Login successful");
    Ok(HttpResponse::Ok().json(TokenPair { access, refresh }))
}

/// Exchange a refresh token for a new access token
#[utoipa::path(
    post,
    path = "/api/employee/token/refresh",
    request_body = RefreshReqDto,
    responses(
        (status = 200, description = "New access token", body = AccessToken),
        (status = 401, description = "Refresh token invalid, expired or revoked")
    ),
    tag = "Auth"
)]
pub async fn refresh_token(
    body: web::Json<RefreshReqDto>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> ApiResult<HttpResponse> {
    let claims = verified_refresh_claims(&body.refresh, pool.get_ref(), &config).await?;

    let db_user = account::find_by_id(pool.get_ref(), claims.user_id)
        .await?
        .filter(|a| a.is_active)
        .ok_or_else(|| ApiError::Unauthorized(NO_ACTIVE_ACCOUNT.into()))?;

    let access = generate_access_token(&db_user, &config.jwt_secret, config.access_token_ttl)
        .map_err(token_error)?;

    Ok(HttpResponse::Ok().json(AccessToken { access }))
}

/// Blacklist a refresh token
#[utoipa::path(
    post,
    path = "/api/employee/logout",
    request_body = RefreshReqDto,
    responses(
        (status = 205, description = "Refresh token revoked"),
        (status = 401, description = "Refresh token invalid or expired")
    ),
    tag = "Auth"
)]
pub async fn logout(
    body: web::Json<RefreshReqDto>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> ApiResult<HttpResponse> {
    let claims = verify_token(&body.refresh, &config.jwt_secret)
        .map_err(|_| ApiError::Unauthorized(INVALID_TOKEN.into()))?;

    if claims.token_type != TokenType::Refresh {
        return Err(ApiError::Unauthorized(INVALID_TOKEN.into()));
    }

    // revoking twice is harmless
    sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE jti = ?")
        .bind(&claims.jti)
        .execute(pool.get_ref())
        .await?;

    info!(user_id = claims.user_id, "Refresh token revoked");
    Ok(HttpResponse::ResetContent().finish())
}
