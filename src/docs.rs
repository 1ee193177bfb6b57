use crate::api::account::{AccountStatusResponse, CreateAccount};
use crate::api::leave_request::{CreateLeave, LeaveFilter};
use crate::api::profile::UpdateProfile;
use crate::leave::workflow::LeaveUpdate;
use crate::model::account::AccountSummary;
use crate::model::leave_request::{LeaveResponse, LeaveStatus, LeaveType};
use crate::model::profile::ProfileResponse;
use crate::model::role::Role;
use crate::models::{AccessToken, LoginReqDto, RefreshReqDto, TokenPair};
use utoipa::Modify;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Leave Desk API",
        version = "1.0.0",
        description = r#"
## Leave Management Backend

Employees apply for casual, sick or other leave against a per-person balance;
administrators review the requests and manage accounts.

### 🔹 Key Features
- **Authentication**
  - Username/password login issuing short-lived access and day-long refresh tokens
- **Leave Requests**
  - Apply, list and view own requests with overlap and balance checks
- **Review Workflow**
  - Approve, reject or edit requests; balances are debited on approval and credited back when it is withdrawn
- **Accounts**
  - Create accounts, list employees, activate or deactivate users

### 🔐 Security
All endpoints except the token endpoints need a **JWT Bearer** access token.
Only administrators may use the `/manager` endpoints.

### 📦 Response Format
- JSON bodies
- Validation failures return `400` with a map of field name to messages
"#,
    ),
    paths(
        crate::auth::handlers::login,
        crate::auth::handlers::refresh_token,
        crate::auth::handlers::logout,

        crate::api::profile::get_profile,
        crate::api::profile::update_profile,

        crate::api::leave_request::create_leave,
        crate::api::leave_request::my_leaves,
        crate::api::leave_request::get_leave,
        crate::api::leave_request::leave_list,
        crate::api::leave_request::update_leave_status,

        crate::api::account::all_users,
        crate::api::account::toggle_user_status,
        crate::api::account::create_user
    ),
    components(
        schemas(
            LoginReqDto,
            RefreshReqDto,
            TokenPair,
            AccessToken,
            ProfileResponse,
            UpdateProfile,
            AccountSummary,
            CreateAccount,
            AccountStatusResponse,
            CreateLeave,
            LeaveFilter,
            LeaveResponse,
            LeaveUpdate,
            LeaveType,
            LeaveStatus,
            Role
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Token issue, refresh and revocation"),
        (name = "Profile", description = "Own profile and leave balances"),
        (name = "Leave", description = "Employee leave request APIs"),
        (name = "Manager", description = "Administrator APIs"),
    )
)]
pub struct ApiDoc;

/// Prefix written into the `#[utoipa::path]` attributes.
const DOCUMENTED_PREFIX: &str = "/api";

/// The API document with its paths moved under the configured prefix.
pub fn openapi_for(prefix: &str) -> openapi::OpenApi {
    let mut doc = ApiDoc::openapi();
    let prefix = prefix.trim_end_matches('/');
    if prefix != DOCUMENTED_PREFIX {
        let paths = std::mem::take(&mut doc.paths.paths);
        doc.paths.paths = paths
            .into_iter()
            .map(|(path, item)| match path.strip_prefix(DOCUMENTED_PREFIX) {
                Some(rest) => (format!("{prefix}{rest}"), item),
                None => (path, item),
            })
            .collect();
    }
    doc
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_route_is_documented_under_the_api_prefix() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/employee/token",
            "/api/employee/token/refresh",
            "/api/employee/logout",
            "/api/employee/profile",
            "/api/employee/leave",
            "/api/employee/leave/{leave_id}",
            "/api/manager/all-users",
            "/api/manager/users/{user_id}/status",
            "/api/manager/users/create",
            "/api/manager/leaves",
            "/api/manager/leave/{leave_id}/status",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }

    #[test]
    fn bearer_scheme_is_registered() {
        let doc = ApiDoc::openapi();
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }

    #[test]
    fn paths_follow_the_configured_prefix() {
        let doc = openapi_for("/v2/");
        assert!(doc.paths.paths.contains_key("/v2/employee/token"));
        assert!(doc.paths.paths.contains_key("/v2/manager/leave/{leave_id}/status"));
        assert!(!doc.paths.paths.keys().any(|p| p.starts_with("/api/")));

        let default = openapi_for("/api");
        assert_eq!(default.paths.paths.len(), ApiDoc::openapi().paths.paths.len());
        assert!(default.paths.paths.contains_key("/api/employee/token"));
    }
}
