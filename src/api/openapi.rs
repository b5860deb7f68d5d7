use super::handlers::{auth, health, pages, signup, UserSummary};
use crate::{
    notify::{Notification, Severity},
    signup::{FlowState, OtpPair},
};
use axum::response::{IntoResponse, Json};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        signup::start,
        signup::details,
        signup::human_check,
        signup::resend_otp,
        signup::verify,
        auth::login,
        auth::logout,
        auth::session,
        pages::dashboard,
        pages::admin,
    ),
    components(schemas(
        health::Health,
        signup::SignupResponse,
        signup::ChallengeView,
        signup::DetailsRequest,
        signup::HumanCheckRequest,
        auth::LoginRequest,
        auth::AuthResponse,
        pages::DashboardPage,
        pages::AdminPage,
        pages::QueueItem,
        UserSummary,
        Notification,
        Severity,
        FlowState,
        OtpPair,
    )),
    tags(
        (name = "health", description = "Liveness"),
        (name = "signup", description = "Three step signup with OTP verification"),
        (name = "auth", description = "Password login and session cookie"),
        (name = "pages", description = "Guarded dashboard and admin area")
    )
)]
pub struct ApiDoc;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    let mut doc = ApiDoc::openapi();
    // Use Cargo.toml metadata instead of the derive defaults.
    doc.info.title = env!("CARGO_PKG_NAME").to_string();
    doc.info.version = env!("CARGO_PKG_VERSION").to_string();
    doc
}

pub async fn openapi_json() -> impl IntoResponse {
    Json(openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documents_every_route() {
        let doc = openapi();
        for path in [
            "/health",
            "/v1/signup",
            "/v1/signup/{id}/details",
            "/v1/signup/{id}/human-check",
            "/v1/signup/{id}/otp",
            "/v1/signup/{id}/verify",
            "/v1/auth/login",
            "/v1/auth/logout",
            "/v1/auth/session",
            "/dashboard",
            "/admin",
        ] {
            assert!(doc.paths.paths.contains_key(path), "{path}");
        }
        assert_eq!(doc.info.title, "sura");
    }
}
