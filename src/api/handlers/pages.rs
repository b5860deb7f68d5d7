//! Authenticated area. Both pages sit behind `guard::enforce`, which inserts the
//! resolved `Session` into the request.

use crate::{auth, guard::LOGIN_PATH, identity::Session};
use axum::{
    extract::Extension,
    response::{IntoResponse, Json, Redirect, Response},
};
use serde::Serialize;
use utoipa::ToSchema;

use super::UserSummary;

#[derive(ToSchema, Serialize, Debug)]
pub struct DashboardPage {
    pub user: UserSummary,
}

/// A document waiting for an admin to review it.
#[derive(ToSchema, Serialize, Debug)]
pub struct QueueItem {
    pub id: String,
    pub name: String,
    pub document: String,
    pub status: String,
}

// Placeholder until listings and documents have their own store.
const VERIFICATION_QUEUE: [(&str, &str, &str); 3] = [
    ("user-001", "Chamari Silva", "Driving license"),
    ("car-001", "Honda Vezel 2021", "RC document"),
    ("user-002", "Kasun Abeyratne", "Profile photo"),
];

fn verification_queue() -> Vec<QueueItem> {
    VERIFICATION_QUEUE
        .iter()
        .map(|(id, name, document)| QueueItem {
            id: (*id).to_string(),
            name: (*name).to_string(),
            document: (*document).to_string(),
            status: "Pending".to_string(),
        })
        .collect()
}

#[derive(ToSchema, Serialize, Debug)]
pub struct AdminPage {
    pub user: UserSummary,
    pub verification_queue: Vec<QueueItem>,
}

#[utoipa::path(
    get,
    path = "/dashboard",
    responses(
        (status = 200, description = "Signed-in user", body = DashboardPage),
        (status = 303, description = "Redirect to /login")
    ),
    tag = "pages"
)]
pub async fn dashboard(session: Option<Extension<Session>>) -> Response {
    let session = session.map(|Extension(session)| session);
    match auth::require_session(session.as_ref()) {
        Ok(session) => Json(DashboardPage {
            user: UserSummary::from(&session.user),
        })
        .into_response(),
        Err(_) => Redirect::to(LOGIN_PATH).into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/admin",
    responses(
        (status = 200, description = "Admin review queue", body = AdminPage),
        (status = 303, description = "Redirect to /login or /dashboard")
    ),
    tag = "pages"
)]
pub async fn admin(session: Option<Extension<Session>>) -> Response {
    let session = session.map(|Extension(session)| session);
    match auth::require_session(session.as_ref()) {
        Ok(session) => Json(AdminPage {
            user: UserSummary::from(&session.user),
            verification_queue: verification_queue(),
        })
        .into_response(),
        Err(_) => Redirect::to(LOGIN_PATH).into_response(),
    }
}
