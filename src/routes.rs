use crate::{
    api::{account, leave_request, profile},
    auth::{handlers, middleware::auth_middleware},
    config::Config,
    error::{json_error_handler, query_error_handler},
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use std::sync::Arc;

// Helper to build per-route limiter
fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
    let burst = requests_per_min.max(1);
    let per_ms = (60_000 / u64::from(burst)).max(1);
    let cfg = GovernorConfigBuilder::default()
        .per_millisecond(per_ms)
        .burst_size(burst)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .expect("period and burst size are non-zero");
    Governor::new(&cfg)
}

/// Body and query decode failures answer with the 400 field map.
pub fn payload_config(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(json_error_handler))
        .app_data(web::QueryConfig::default().error_handler(query_error_handler));
}

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    payload_config(cfg);

    let login_limiter = Arc::new(build_limiter(config.rate_login_per_min));
    let refresh_limiter = Arc::new(build_limiter(config.rate_refresh_per_min));
    let protected_limiter = Arc::new(build_limiter(config.rate_protected_per_min));

    cfg.service(
        web::scope(&config.api_prefix)
            // Public routes
            .service(
                web::resource("/employee/token")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/employee/token/refresh")
                    .wrap(refresh_limiter.clone())
                    .route(web::post().to(handlers::refresh_token)),
            )
            .service(
                web::resource("/employee/logout")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::logout)),
            )
            // Protected routes
            .service(
                web::scope("")
                    .wrap(from_fn(auth_middleware)) // authentication
                    .wrap(protected_limiter) // rate limiting
                    .service(
                        web::scope("/employee")
                            // /employee/profile
                            .service(
                                web::resource("/profile")
                                    .route(web::get().to(profile::get_profile))
                                    .route(web::put().to(profile::update_profile)),
                            )
                            // /employee/leave
                            .service(
                                web::resource("/leave")
                                    .route(web::get().to(leave_request::my_leaves))
                                    .route(web::post().to(leave_request::create_leave)),
                            )
                            // /employee/leave/{id}
                            .service(
                                web::resource("/leave/{id}")
                                    .route(web::get().to(leave_request::get_leave)),
                            ),
                    )
                    .service(
                        web::scope("/manager")
                            .service(
                                web::resource("/all-users")
                                    .route(web::get().to(account::all_users)),
                            )
                            .service(
                                web::resource("/users/create")
                                    .route(web::post().to(account::create_user)),
                            )
                            .service(
                                web::resource("/users/{id}/status")
                                    .route(web::put().to(account::toggle_user_status)),
                            )
                            .service(
                                web::resource("/leaves")
                                    .route(web::get().to(leave_request::leave_list)),
                            )
                            .service(
                                web::resource("/leave/{id}/status")
                                    .route(web::put().to(leave_request::update_leave_status)),
                            ),
                    ),
            ),
    );
}

// LOGIN
//  ├─ access (5 min)
//  └─ refresh (1 day, jti stored for revocation)

// API REQUEST
//  └─ Authorization: Bearer access

// ACCESS EXPIRED
//  └─ POST /employee/token/refresh with {"refresh": ...}
//       └─ returns new access token
