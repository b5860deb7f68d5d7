//! Route guard for the authenticated area.
//!
//! `/dashboard` requires a signed-in user and `/admin` additionally requires
//! the admin role. The decision is a pure function so it can be checked
//! without a server; `enforce` wires it into axum.

use crate::identity::{IdentityService, Session};
use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, header::COOKIE, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use std::sync::Arc;
use tracing::{debug, warn};

pub const SESSION_COOKIE_NAME: &str = "sura_session";
pub const LOGIN_PATH: &str = "/login";
pub const DASHBOARD_PATH: &str = "/dashboard";
pub const ADMIN_PATH: &str = "/admin";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    Redirect(&'static str),
}

/// Path prefixes that need a session, and the subset that needs the admin role.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProtectedPrefixes {
    pub authenticated: Vec<String>,
    pub admin: Vec<String>,
}

impl Default for ProtectedPrefixes {
    fn default() -> Self {
        Self {
            authenticated: vec![DASHBOARD_PATH.to_string()],
            admin: vec![ADMIN_PATH.to_string()],
        }
    }
}

impl ProtectedPrefixes {
    #[must_use]
    pub fn decide(&self, session: Option<&Session>, path: &str) -> GuardDecision {
        let admin = self.admin.iter().any(|prefix| is_under(path, prefix));
        let authenticated = admin || self.authenticated.iter().any(|prefix| is_under(path, prefix));

        match session {
            None if authenticated => GuardDecision::Redirect(LOGIN_PATH),
            Some(session) if admin && !session.user.is_admin() => {
                GuardDecision::Redirect(DASHBOARD_PATH)
            }
            _ => GuardDecision::Allow,
        }
    }
}

/// Decision under the default prefixes.
#[must_use]
pub fn decide(session: Option<&Session>, path: &str) -> GuardDecision {
    ProtectedPrefixes::default().decide(session, path)
}

/// `/dashboard` covers `/dashboard` and `/dashboard/...` but not `/dashboards`.
fn is_under(path: &str, prefix: &str) -> bool {
    path.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

/// Access token from the session cookie, falling back to a bearer header.
#[must_use]
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = headers.get(COOKIE).and_then(|header| header.to_str().ok()) {
        for pair in value.split(';') {
            let mut parts = pair.trim().splitn(2, '=');
            let (Some(key), Some(val)) = (parts.next(), parts.next()) else {
                continue;
            };
            if key.trim() == SESSION_COOKIE_NAME && !val.trim().is_empty() {
                return Some(val.trim().to_string());
            }
        }
    }
    extract_bearer_token(headers)
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Resolve the request's session. Missing backend, missing token and failed
/// lookups all count as "no session".
pub async fn resolve_session(
    identity: Option<&Arc<dyn IdentityService>>,
    headers: &HeaderMap,
) -> Option<Session> {
    let identity = identity?;
    let token = extract_session_token(headers)?;
    match identity.current_session(&token).await {
        Ok(session) => session,
        Err(err) => {
            warn!(error = %err, "session lookup failed");
            None
        }
    }
}

#[derive(Clone)]
pub struct GuardState {
    pub identity: Option<Arc<dyn IdentityService>>,
    pub prefixes: Arc<ProtectedPrefixes>,
}

impl GuardState {
    #[must_use]
    pub fn new(identity: Option<Arc<dyn IdentityService>>) -> Self {
        Self {
            identity,
            prefixes: Arc::new(ProtectedPrefixes::default()),
        }
    }
}

/// Middleware: forwards allowed requests with the `Session` as an extension,
/// answers everything else with `303 See Other`.
pub async fn enforce(State(state): State<GuardState>, mut request: Request, next: Next) -> Response {
    let session = resolve_session(state.identity.as_ref(), request.headers()).await;
    let path = request.uri().path().to_string();

    match state.prefixes.decide(session.as_ref(), &path) {
        GuardDecision::Allow => {
            if let Some(session) = session {
                request.extensions_mut().insert(session);
            }
            next.run(request).await
        }
        GuardDecision::Redirect(location) => {
            debug!(%path, location, "guard redirect");
            Redirect::to(location).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::fake::{admin, renter, FakeIdentity};
    use axum::{
        body::Body,
        http::{header::LOCATION, Request as HttpRequest, StatusCode},
        middleware::from_fn_with_state,
        routing::get,
        Extension, Router,
    };
    use secrecy::SecretString;
    use tower::ServiceExt;

    fn session(user: crate::identity::User) -> Session {
        Session::new(SecretString::from("token"), user)
    }

    #[test]
    fn anonymous_visitors_go_to_login() {
        assert_eq!(decide(None, "/dashboard"), GuardDecision::Redirect("/login"));
        assert_eq!(
            decide(None, "/dashboard/bookings/42"),
            GuardDecision::Redirect("/login")
        );
        assert_eq!(decide(None, "/admin"), GuardDecision::Redirect("/login"));
        assert_eq!(decide(None, "/admin/listings"), GuardDecision::Redirect("/login"));
    }

    #[test]
    fn renters_are_kept_out_of_admin() {
        let renter = session(renter());
        assert_eq!(
            decide(Some(&renter), "/admin/listings"),
            GuardDecision::Redirect("/dashboard")
        );
        assert_eq!(decide(Some(&renter), "/dashboard"), GuardDecision::Allow);
    }

    #[test]
    fn admins_reach_admin_pages() {
        let admin = session(admin());
        assert_eq!(decide(Some(&admin), "/admin"), GuardDecision::Allow);
        assert_eq!(decide(Some(&admin), "/admin/listings"), GuardDecision::Allow);
        assert_eq!(decide(Some(&admin), "/dashboard"), GuardDecision::Allow);
    }

    #[test]
    fn public_paths_are_untouched() {
        for path in ["/", "/login", "/signup", "/dashboards", "/administrator", "/health"] {
            assert_eq!(decide(None, path), GuardDecision::Allow, "{path}");
        }
    }

    #[test]
    fn custom_prefixes() {
        let prefixes = ProtectedPrefixes {
            authenticated: vec!["/bookings".to_string()],
            admin: vec!["/ops".to_string()],
        };
        assert_eq!(prefixes.decide(None, "/bookings/1"), GuardDecision::Redirect("/login"));
        assert_eq!(prefixes.decide(None, "/dashboard"), GuardDecision::Allow);
        assert_eq!(
            prefixes.decide(Some(&session(renter())), "/ops"),
            GuardDecision::Redirect("/dashboard")
        );
    }

    #[test]
    fn token_from_cookie_or_bearer() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_session_token(&headers), None);

        headers.insert(COOKIE, "theme=dark; sura_session=abc123; other".parse().unwrap());
        assert_eq!(extract_session_token(&headers).as_deref(), Some("abc123"));

        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, "sura_session=".parse().unwrap());
        assert_eq!(extract_session_token(&headers), None);

        headers.insert(AUTHORIZATION, "Bearer xyz".parse().unwrap());
        assert_eq!(extract_session_token(&headers).as_deref(), Some("xyz"));
    }

    fn app(identity: Option<Arc<dyn IdentityService>>) -> Router {
        Router::new()
            .route(
                "/dashboard",
                get(|Extension(session): Extension<Session>| async move {
                    session.user.email.unwrap_or_default()
                }),
            )
            .route("/admin/listings", get(|| async { "queue" }))
            .route("/", get(|| async { "home" }))
            .layer(from_fn_with_state(GuardState::new(identity), enforce))
    }

    async fn call(app: Router, path: &str, cookie: Option<&str>) -> Response {
        let mut request = HttpRequest::builder().uri(path);
        if let Some(cookie) = cookie {
            request = request.header(COOKIE, cookie);
        }
        app.oneshot(request.body(Body::empty()).unwrap()).await.unwrap()
    }

    #[tokio::test]
    async fn middleware_redirects_with_see_other() {
        let fake: Arc<dyn IdentityService> =
            Arc::new(FakeIdentity::new().with_session("renter-token", renter()));

        let response = call(app(Some(fake.clone())), "/dashboard", None).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[LOCATION], "/login");

        let response = call(
            app(Some(fake.clone())),
            "/admin/listings",
            Some("sura_session=renter-token"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[LOCATION], "/dashboard");

        let response = call(app(Some(fake)), "/", None).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn middleware_passes_session_to_handlers() {
        let fake: Arc<dyn IdentityService> =
            Arc::new(FakeIdentity::new().with_session("admin-token", admin()));

        let response = call(
            app(Some(fake.clone())),
            "/dashboard",
            Some("sura_session=admin-token"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"renter@sura.lk");

        let response = call(app(Some(fake)), "/admin/listings", Some("sura_session=admin-token")).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn lookup_failure_and_missing_backend_mean_no_session() {
        let fake = FakeIdentity::new().with_session("renter-token", renter());
        fake.fail("current_session", "Network error: connection refused");
        let fake: Arc<dyn IdentityService> = Arc::new(fake);

        let response = call(app(Some(fake)), "/dashboard", Some("sura_session=renter-token")).await;
        assert_eq!(response.headers()[LOCATION], "/login");

        let response = call(app(None), "/dashboard", Some("sura_session=renter-token")).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[LOCATION], "/login");
    }
}
