//! Signup endpoints. Each flow gets an id on `POST /v1/signup`; the remaining
//! calls drive it one step at a time and return the toasts it raised.

use crate::{
    api::{flows::FlowHandle, AppState},
    error::FlowError,
    guard::DASHBOARD_PATH,
    notify::Notification,
    signup::{FlowState, OtpPair, LOCATIONS},
};
use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument};
use ulid::Ulid;
use utoipa::ToSchema;

use super::status_for;

#[derive(ToSchema, Serialize, Debug)]
pub struct ChallengeView {
    pub first: u8,
    pub second: u8,
    pub question: String,
}

#[derive(ToSchema, Serialize, Debug)]
pub struct SignupResponse {
    pub flow_id: String,
    pub step: FlowState,
    pub challenge: Option<ChallengeView>,
    pub toasts: Vec<Notification>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect: Option<String>,
}

#[derive(ToSchema, Deserialize, Debug)]
pub struct DetailsRequest {
    pub full_name: String,
    #[serde(default)]
    pub location: String,
    pub email: String,
    pub phone: String,
    pub password: String,
    pub confirm_password: String,
}

#[derive(ToSchema, Deserialize, Debug)]
pub struct HumanCheckRequest {
    pub answer: String,
}

fn respond(id: Ulid, handle: &FlowHandle, result: Result<(), FlowError>) -> Response {
    let step = handle.flow.state();
    let challenge = handle.flow.challenge().map(|challenge| ChallengeView {
        first: challenge.first,
        second: challenge.second,
        question: challenge.question(),
    });
    let (status, error) = match &result {
        Ok(()) => (StatusCode::OK, None),
        Err(err) => (status_for(err), Some(err.to_string())),
    };
    let redirect = (step == FlowState::Verified).then(|| DASHBOARD_PATH.to_string());

    let body = SignupResponse {
        flow_id: id.to_string(),
        step,
        challenge,
        toasts: handle.toasts.drain(),
        error,
        redirect,
    };
    (status, Json(body)).into_response()
}

fn lookup(state: &AppState, id: &str) -> Result<(Ulid, FlowHandle), Response> {
    let not_found = || (StatusCode::NOT_FOUND, "Signup flow not found").into_response();
    let id = Ulid::from_string(id).map_err(|_| not_found())?;
    let handle = state.flows.get(&id).ok_or_else(not_found)?;
    Ok((id, handle))
}

#[utoipa::path(
    post,
    path = "/v1/signup",
    responses(
        (status = 201, description = "Signup flow started", body = SignupResponse),
        (status = 503, description = "Too many signups in progress")
    ),
    tag = "signup"
)]
pub async fn start(state: Extension<Arc<AppState>>) -> impl IntoResponse {
    let Some(id) = state.flows.start(state.identity.clone(), state.policy) else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            "Too many signups in progress",
        )
            .into_response();
    };
    debug!(flow_id = %id, "signup flow started");
    match state.flows.get(&id) {
        Some(handle) => {
            let mut response = respond(id, &handle, Ok(()));
            *response.status_mut() = StatusCode::CREATED;
            response
        }
        None => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/v1/signup/{id}/details",
    params(("id" = String, Path, description = "Signup flow id")),
    request_body = DetailsRequest,
    responses(
        (status = 200, description = "Details accepted, human check issued", body = SignupResponse),
        (status = 404, description = "Unknown signup flow"),
        (status = 409, description = "Busy or wrong step", body = SignupResponse),
        (status = 422, description = "Invalid phone or password mismatch", body = SignupResponse)
    ),
    tag = "signup"
)]
#[instrument(skip(state, request))]
pub async fn details(
    Path(id): Path<String>,
    state: Extension<Arc<AppState>>,
    Json(request): Json<DetailsRequest>,
) -> Response {
    let (id, handle) = match lookup(&state, &id) {
        Ok(found) => found,
        Err(response) => return response,
    };

    let result = handle
        .flow
        .submit_details(|draft| {
            draft.full_name = request.full_name;
            let location = request.location.trim();
            if !location.is_empty() {
                draft.location = LOCATIONS
                    .iter()
                    .find(|known| known.eq_ignore_ascii_case(location))
                    .map_or_else(|| location.to_string(), |known| (*known).to_string());
            }
            draft.email = request.email;
            draft.phone = request.phone;
            draft.password = SecretString::from(request.password);
            draft.confirm_password = SecretString::from(request.confirm_password);
        })
        .await
        .map(|_| ());
    respond(id, &handle, result)
}

#[utoipa::path(
    post,
    path = "/v1/signup/{id}/human-check",
    params(("id" = String, Path, description = "Signup flow id")),
    request_body = HumanCheckRequest,
    responses(
        (status = 200, description = "Account created, OTP codes sent", body = SignupResponse),
        (status = 404, description = "Unknown signup flow"),
        (status = 409, description = "Busy or wrong step", body = SignupResponse),
        (status = 422, description = "Wrong answer, new challenge issued", body = SignupResponse),
        (status = 502, description = "Backend rejected the signup", body = SignupResponse),
        (status = 503, description = "Backend not configured", body = SignupResponse)
    ),
    tag = "signup"
)]
#[instrument(skip(state, request))]
pub async fn human_check(
    Path(id): Path<String>,
    state: Extension<Arc<AppState>>,
    Json(request): Json<HumanCheckRequest>,
) -> Response {
    let (id, handle) = match lookup(&state, &id) {
        Ok(found) => found,
        Err(response) => return response,
    };

    let result = handle
        .flow
        .submit_human_check(&request.answer)
        .await
        .map(|_| ());
    respond(id, &handle, result)
}

#[utoipa::path(
    post,
    path = "/v1/signup/{id}/otp",
    params(("id" = String, Path, description = "Signup flow id")),
    responses(
        (status = 200, description = "OTP codes sent again", body = SignupResponse),
        (status = 404, description = "Unknown signup flow"),
        (status = 502, description = "Backend failed to send a code", body = SignupResponse)
    ),
    tag = "signup"
)]
#[instrument(skip(state))]
pub async fn resend_otp(Path(id): Path<String>, state: Extension<Arc<AppState>>) -> Response {
    let (id, handle) = match lookup(&state, &id) {
        Ok(found) => found,
        Err(response) => return response,
    };

    let result = handle.flow.resend_otp().await;
    respond(id, &handle, result)
}

#[utoipa::path(
    post,
    path = "/v1/signup/{id}/verify",
    params(("id" = String, Path, description = "Signup flow id")),
    request_body = OtpPair,
    responses(
        (status = 200, description = "Both codes verified", body = SignupResponse),
        (status = 404, description = "Unknown signup flow"),
        (status = 502, description = "A code was rejected", body = SignupResponse)
    ),
    tag = "signup"
)]
#[instrument(skip(state, codes))]
pub async fn verify(
    Path(id): Path<String>,
    state: Extension<Arc<AppState>>,
    Json(codes): Json<OtpPair>,
) -> Response {
    let (id, handle) = match lookup(&state, &id) {
        Ok(found) => found,
        Err(response) => return response,
    };

    let result = handle.flow.verify(codes).await.map(|_| ());
    if result.is_ok() {
        state.flows.remove(&id);
    }
    respond(id, &handle, result)
}
