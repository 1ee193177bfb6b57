use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload};
use futures::future::{Ready, ready};

use crate::error::ApiError;

pub const ADMIN_ONLY: &str = "You do not have permission to perform this action.";

/// Caller identity placed in request extensions by `auth_middleware`.
/// `is_admin` mirrors the account's superuser flag as read from the database
/// for this request.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub account_id: u64,
    pub username: String,
    pub is_admin: bool,
}

impl FromRequest for AuthUser {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<AuthUser>()
                .cloned()
                .ok_or_else(|| {
                    ApiError::Unauthorized("Authentication credentials were not provided.".into())
                }),
        )
    }
}

impl AuthUser {
    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.is_admin {
            Ok(())
        } else {
            Err(ApiError::Forbidden(ADMIN_ONLY.into()))
        }
    }

    /// Admins see every record; employees only their own.
    pub fn can_view(&self, owner_id: u64) -> bool {
        self.is_admin || self.account_id == owner_id
    }
}
