//! Caller-identity extractors.
//!
//! Authentication itself is an external collaborator: an upstream auth
//! proxy verifies the session and injects the caller's identity as
//! headers. The extractors here turn those headers into an explicit
//! [`Caller`] value that handlers thread into every service call - no
//! ambient "current user" exists anywhere downstream.

use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};

use sundrop_core::{Caller, CustomerId, Role};

use crate::error::ErrorBody;

/// Header carrying the authenticated customer ID (a UUID).
pub const CUSTOMER_ID_HEADER: &str = "x-customer-id";

/// Header carrying the caller role (`customer` or `admin`).
pub const ROLE_HEADER: &str = "x-customer-role";

/// Error returned when caller identity is missing or malformed.
#[derive(Debug)]
pub enum AuthRejection {
    /// No identity headers present.
    Unauthenticated,
    /// Identity headers present but unparseable.
    Malformed(String),
    /// Authenticated, but the route needs admin rights.
    AdminRequired,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            Self::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                "unauthenticated",
                "caller identity headers missing".to_string(),
            ),
            Self::Malformed(detail) => (
                StatusCode::BAD_REQUEST,
                "validation",
                format!("invalid caller identity: {detail}"),
            ),
            Self::AdminRequired => (
                StatusCode::FORBIDDEN,
                "forbidden",
                "admin role required".to_string(),
            ),
        };
        (status, Json(ErrorBody { code, message })).into_response()
    }
}

fn caller_from_parts(parts: &Parts) -> Result<Caller, AuthRejection> {
    let customer_id = parts
        .headers
        .get(CUSTOMER_ID_HEADER)
        .ok_or(AuthRejection::Unauthenticated)?
        .to_str()
        .map_err(|e| AuthRejection::Malformed(e.to_string()))?
        .parse::<CustomerId>()
        .map_err(|e| AuthRejection::Malformed(e.to_string()))?;

    let role = match parts.headers.get(ROLE_HEADER) {
        Some(value) => value
            .to_str()
            .map_err(|e| AuthRejection::Malformed(e.to_string()))?
            .parse::<Role>()
            .map_err(AuthRejection::Malformed)?,
        None => Role::Customer,
    };

    Ok(Caller { customer_id, role })
}

/// Extractor that requires an authenticated caller (any role).
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(RequireCustomer(caller): RequireCustomer) -> impl IntoResponse {
///     format!("hello, {}", caller.customer_id)
/// }
/// ```
pub struct RequireCustomer(pub Caller);

impl<S> FromRequestParts<S> for RequireCustomer
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(caller_from_parts(parts)?))
    }
}

/// Extractor that requires an authenticated admin caller.
pub struct RequireAdmin(pub Caller);

impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let caller = caller_from_parts(parts)?;
        if !caller.role.is_admin() {
            return Err(AuthRejection::AdminRequired);
        }
        Ok(Self(caller))
    }
}
