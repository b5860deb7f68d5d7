pub mod health;
pub use self::health::health;

pub mod auth;
pub mod pages;
pub mod signup;

// common types for the handlers
use crate::{error::FlowError, identity::User};
use axum::http::StatusCode;
use serde::Serialize;
use utoipa::ToSchema;

/// Public view of an authenticated user.
#[derive(ToSchema, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct UserSummary {
    pub id: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub full_name: Option<String>,
    pub role: Option<String>,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.to_string(),
            email: user.email.clone(),
            phone: user.phone.clone(),
            full_name: user
                .user_metadata
                .get("full_name")
                .and_then(serde_json::Value::as_str)
                .map(str::to_string),
            role: user.role().map(str::to_string),
        }
    }
}

#[must_use]
pub fn status_for(err: &FlowError) -> StatusCode {
    match err {
        FlowError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        FlowError::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
        FlowError::Remote(_) => StatusCode::BAD_GATEWAY,
        FlowError::Session(_) => StatusCode::UNAUTHORIZED,
        FlowError::Busy | FlowError::InvalidStep(_) => StatusCode::CONFLICT,
    }
}
