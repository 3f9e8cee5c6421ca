//! Caller identity forwarded by the auth gateway.
//!
//! Tokens are verified upstream; this service only trusts the `x-user-id`
//! and `x-user-role` headers the gateway sets.

use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::{request::Parts, StatusCode}, response::{IntoResponse, Response}, Json};
use uuid::Uuid;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser(pub Uuid);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdminUser(pub Uuid);

#[derive(Debug)]
pub enum AuthRejection { MissingUser, InvalidUser, NotAdmin }

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::MissingUser => (StatusCode::UNAUTHORIZED, "missing caller identity"),
            Self::InvalidUser => (StatusCode::UNAUTHORIZED, "invalid caller identity"),
            Self::NotAdmin => (StatusCode::FORBIDDEN, "admin role required"),
        };
        (status, Json(serde_json::json!({ "error": "unauthorized", "message": message }))).into_response()
    }
}

fn user_id(parts: &Parts) -> Result<Uuid, AuthRejection> {
    let raw = parts.headers.get(USER_ID_HEADER).ok_or(AuthRejection::MissingUser)?;
    let raw = raw.to_str().map_err(|_| AuthRejection::InvalidUser)?;
    Uuid::parse_str(raw.trim()).map_err(|_| AuthRejection::InvalidUser)
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        user_id(parts).map(Self)
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for AdminUser {
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = user_id(parts)?;
        let is_admin = parts.headers.get(USER_ROLE_HEADER)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|role| role.eq_ignore_ascii_case("admin"));
        if !is_admin { return Err(AuthRejection::NotAdmin); }
        Ok(Self(id))
    }
}
