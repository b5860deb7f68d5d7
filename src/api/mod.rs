//! HTTP shell around the signup flow, the auth operations and the guard.

use crate::{
    guard::{self, GuardState},
    identity::IdentityService,
    signup::OtpPolicy,
};
use anyhow::Result;
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Request},
    middleware::from_fn_with_state,
    routing::{get, post},
    Extension, Router,
};
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{info, info_span, warn, Span};
use ulid::Ulid;

pub mod flows;
pub mod handlers;
mod openapi;

pub use self::flows::FlowStore;
pub use self::openapi::openapi;

use self::handlers::{auth, health, pages, signup};

/// Session cookie lifetime, matching the backend's default access token TTL.
pub const SESSION_COOKIE_MAX_AGE: Duration = Duration::from_secs(3600);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CookieConfig {
    pub secure: bool,
    pub max_age: Duration,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            secure: false,
            max_age: SESSION_COOKIE_MAX_AGE,
        }
    }
}

/// Shared by every handler.
pub struct AppState {
    /// `None` when the backend is not configured.
    pub identity: Option<Arc<dyn IdentityService>>,
    pub policy: OtpPolicy,
    pub cookie: CookieConfig,
    pub flows: FlowStore,
}

impl AppState {
    #[must_use]
    pub fn new(
        identity: Option<Arc<dyn IdentityService>>,
        policy: OtpPolicy,
        cookie: CookieConfig,
    ) -> Self {
        Self {
            identity,
            policy,
            cookie,
            flows: FlowStore::new(),
        }
    }
}

/// All routes, with the guard applied to the authenticated area.
pub fn router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/dashboard", get(pages::dashboard))
        .route("/dashboard/*rest", get(pages::dashboard))
        .route("/admin", get(pages::admin))
        .route("/admin/*rest", get(pages::admin))
        .route_layer(from_fn_with_state(
            GuardState::new(state.identity.clone()),
            guard::enforce,
        ));

    Router::new()
        .route("/health", get(health).options(health))
        .route("/openapi.json", get(openapi::openapi_json))
        .route("/v1/signup", post(signup::start))
        .route("/v1/signup/:id/details", post(signup::details))
        .route("/v1/signup/:id/human-check", post(signup::human_check))
        .route("/v1/signup/:id/otp", post(signup::resend_otp))
        .route("/v1/signup/:id/verify", post(signup::verify))
        .route("/v1/auth/login", post(auth::login))
        .route("/v1/auth/logout", post(auth::logout))
        .route("/v1/auth/session", get(auth::session))
        .merge(protected)
        .layer(Extension(state))
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(port: u16, state: AppState) -> Result<()> {
    if state.identity.is_none() {
        warn!("Backend not configured; signup and login will report it to users");
    }

    let app = router(Arc::new(state)).layer(
        ServiceBuilder::new()
            .layer(SetRequestHeaderLayer::if_not_present(
                HeaderName::from_static("x-request-id"),
                |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
            ))
            .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                "x-request-id",
            )))
            .layer(TraceLayer::new_for_http().make_span_with(make_span)),
    );

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {err}");
                std::future::pending::<()>().await;
            }
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
