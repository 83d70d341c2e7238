//! Caller principal extracted from trusted gateway headers.
//!
//! Authentication happens upstream. The gateway forwards the verified
//! identity as `x-actor-uid`, `x-actor-role` and optionally `x-actor-org`.
//! A request without a uid or with an unknown role is rejected with 403.

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::request::Parts;

use super::response::ApiError;
use crate::domain::{Principal, Role, TradeError};

pub const UID_HEADER: &str = "x-actor-uid";
pub const ROLE_HEADER: &str = "x-actor-role";
pub const ORG_HEADER: &str = "x-actor-org";

/// Extractor wrapper around the authenticated `Principal`.
#[derive(Debug, Clone)]
pub struct Actor(pub Principal);

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Read the principal from request headers.
pub fn principal_from_headers(headers: &HeaderMap) -> Result<Principal, TradeError> {
    let uid = header(headers, UID_HEADER)
        .ok_or_else(|| TradeError::Authorization(format!("missing {UID_HEADER} header")))?;
    let raw_role = header(headers, ROLE_HEADER)
        .ok_or_else(|| TradeError::Authorization(format!("missing {ROLE_HEADER} header")))?;
    let role = Role::parse(raw_role)
        .ok_or_else(|| TradeError::Authorization(format!("unknown role '{raw_role}'")))?;
    let org_id = header(headers, ORG_HEADER).map(ToString::to_string);

    Ok(Principal::new(uid, role, org_id))
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        principal_from_headers(&parts.headers)
            .map(Actor)
            .map_err(ApiError)
    }
}
