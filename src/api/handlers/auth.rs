//! Login, logout and session endpoints backed by the `sura_session` cookie.

use crate::{
    api::{AppState, CookieConfig},
    auth,
    guard::{self, DASHBOARD_PATH, SESSION_COOKIE_NAME},
    notify::{LogSink, Notification, ToastQueue},
};
use axum::{
    extract::Extension,
    http::{
        header::{InvalidHeaderValue, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Json, Response},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, instrument};
use utoipa::ToSchema;

use super::{status_for, UserSummary};

#[derive(ToSchema, Deserialize, Debug)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(ToSchema, Serialize, Debug)]
pub struct AuthResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserSummary>,
    pub toasts: Vec<Notification>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect: Option<String>,
}

#[utoipa::path(
    post,
    path = "/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in, session cookie set", body = AuthResponse),
        (status = 502, description = "Credentials rejected", body = AuthResponse),
        (status = 503, description = "Backend not configured", body = AuthResponse)
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn login(state: Extension<Arc<AppState>>, Json(request): Json<LoginRequest>) -> Response {
    let sink = (ToastQueue::new(), LogSink);
    let password = SecretString::from(request.password);

    let result = auth::sign_in(state.identity.as_ref(), &sink, &request.email, &password, None).await;
    let toasts = sink.0.drain();

    match result {
        Ok(session) => {
            let mut headers = HeaderMap::new();
            match session_cookie(&state.cookie, session.token()) {
                Ok(cookie) => {
                    headers.insert(SET_COOKIE, cookie);
                }
                Err(err) => {
                    error!("Failed to build session cookie: {err}");
                    return StatusCode::INTERNAL_SERVER_ERROR.into_response();
                }
            }
            let body = AuthResponse {
                user: Some(UserSummary::from(&session.user)),
                toasts,
                error: None,
                redirect: Some(DASHBOARD_PATH.to_string()),
            };
            (StatusCode::OK, headers, Json(body)).into_response()
        }
        Err(err) => {
            let body = AuthResponse {
                user: None,
                toasts,
                error: Some(err.to_string()),
                redirect: None,
            };
            (status_for(&err), Json(body)).into_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    responses(
        (status = 200, description = "Session revoked and cookie cleared", body = AuthResponse),
        (status = 204, description = "No session; cookie cleared"),
        (status = 502, description = "Backend failed to revoke; cookie cleared anyway", body = AuthResponse)
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn logout(headers: HeaderMap, state: Extension<Arc<AppState>>) -> Response {
    let mut response_headers = HeaderMap::new();
    if let Ok(cookie) = clear_session_cookie(&state.cookie) {
        response_headers.insert(SET_COOKIE, cookie);
    }

    let Some(token) = guard::extract_session_token(&headers) else {
        return (StatusCode::NO_CONTENT, response_headers).into_response();
    };

    let sink = (ToastQueue::new(), LogSink);
    let result = auth::sign_out(state.identity.as_ref(), &sink, &token, None).await;
    let (status, error) = match &result {
        Ok(()) => (StatusCode::OK, None),
        Err(err) => (status_for(err), Some(err.to_string())),
    };
    let body = AuthResponse {
        user: None,
        toasts: sink.0.drain(),
        error,
        redirect: None,
    };
    (status, response_headers, Json(body)).into_response()
}

#[utoipa::path(
    get,
    path = "/v1/auth/session",
    responses(
        (status = 200, description = "Session is active", body = UserSummary),
        (status = 204, description = "No active session")
    ),
    tag = "auth"
)]
pub async fn session(headers: HeaderMap, state: Extension<Arc<AppState>>) -> Response {
    match guard::resolve_session(state.identity.as_ref(), &headers).await {
        Some(session) => (StatusCode::OK, Json(UserSummary::from(&session.user))).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

/// `HttpOnly` cookie carrying the access token.
pub(crate) fn session_cookie(
    config: &CookieConfig,
    token: &str,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!(
        "{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        config.max_age.as_secs()
    );
    if config.secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

fn clear_session_cookie(config: &CookieConfig) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if config.secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}
