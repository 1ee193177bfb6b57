use crate::auth::auth::AuthUser;
use crate::auth::jwt::verify_token;
use crate::config::Config;
use crate::error::ApiError;
use crate::model::account;
use crate::models::TokenType;
use actix_web::middleware::Next;
use actix_web::{
    Error, HttpMessage, ResponseError,
    body::BoxBody,
    dev::{ServiceRequest, ServiceResponse},
    web::Data,
};
use sqlx::MySqlPool;
use tracing::debug;

fn reject(req: ServiceRequest, detail: &str) -> Result<ServiceResponse<BoxBody>, Error> {
    let resp = ApiError::Unauthorized(detail.to_string()).error_response();
    Ok(req.into_response(resp.map_into_boxed_body()))
}

/// Authenticates the bearer access token, then loads the account so that
/// deactivation and admin-flag changes take effect on the next request.
pub async fn auth_middleware(
    req: ServiceRequest,
    next: Next<BoxBody>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let config = req
        .app_data::<Data<Config>>()
        .cloned()
        .ok_or_else(|| ApiError::Internal("App config missing".into()))?;
    let pool = req
        .app_data::<Data<MySqlPool>>()
        .cloned()
        .ok_or_else(|| ApiError::Internal("Database pool missing".into()))?;

    let header_value = req
        .headers()
        .get("Authorization")
        .map(|h| h.to_str().map(str::to_owned));
    let header_value = match header_value {
        Some(Ok(v)) => v,
        Some(Err(_)) => return reject(req, "Invalid Authorization header encoding"),
        None => return reject(req, "Authentication credentials were not provided."),
    };

    let token = match header_value.strip_prefix("Bearer ") {
        Some(t) => t,
        None => return reject(req, "Authorization header must start with Bearer"),
    };

    let claims = match verify_token(token, &config.jwt_secret) {
        Ok(c) => c,
        Err(e) => {
            debug!(error = %e, "Rejected bearer token");
            return reject(req, "Given token not valid for any token type");
        }
    };

    if claims.token_type != TokenType::Access {
        return reject(req, "Given token not valid for any token type");
    }

    let account = match account::find_by_id(pool.get_ref(), claims.user_id)
        .await
        .map_err(ApiError::from)?
    {
        Some(account) => account,
        None => return reject(req, "User not found"),
    };

    if !account.is_active {
        return reject(req, "User is inactive");
    }

    req.extensions_mut().insert(AuthUser {
        account_id: account.id,
        username: account.username,
        is_admin: account.is_superuser,
    });

    next.call(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::{generate_refresh_token, tests::account};
    use crate::db::lazy_test_pool;
    use actix_web::http::StatusCode;
    use actix_web::{App, HttpResponse, middleware::from_fn, test, web};

    async fn call(authorization: Option<String>) -> StatusCode {
        let app = test::init_service(
            App::new()
                .app_data(Data::new(Config::for_tests()))
                .app_data(Data::new(lazy_test_pool()))
                .wrap(from_fn(auth_middleware))
                .route("/ping", web::get().to(HttpResponse::Ok)),
        )
        .await;

        let mut req = test::TestRequest::get().uri("/ping");
        if let Some(value) = authorization {
            req = req.insert_header(("Authorization", value));
        }
        test::call_service(&app, req.to_request()).await.status()
    }

    #[actix_web::test]
    async fn missing_header_is_unauthorized() {
        assert_eq!(call(None).await, StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn non_bearer_scheme_is_unauthorized() {
        assert_eq!(call(Some("Token abc".into())).await, StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn garbage_token_is_unauthorized() {
        assert_eq!(call(Some("Bearer abc.def.ghi".into())).await, StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn refresh_token_cannot_authenticate_requests() {
        let secret = Config::for_tests().jwt_secret;
        let (refresh, _) = generate_refresh_token(&account(false), &secret, 600).unwrap();
        assert_eq!(
            call(Some(format!("Bearer {refresh}"))).await,
            StatusCode::UNAUTHORIZED
        );
    }
}
