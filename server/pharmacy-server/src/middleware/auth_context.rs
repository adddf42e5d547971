//! Authentication context extraction
//!
//! Verifies the bearer token on the request and exposes the principal
//! (numeric user id and role) to handlers.

use crate::auth::Role;
use crate::error::ApiError;
use crate::middleware::RequestContext;
use crate::server::PharmacyServer;
use async_trait::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::{header::AUTHORIZATION, request::Parts};

#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: i64,
    pub role: Role,
    pub request: RequestContext,
}

impl AuthContext {
    pub fn new(user_id: i64, role: Role) -> Self {
        Self {
            user_id,
            role,
            request: RequestContext::from_headers(&Default::default()),
        }
    }

    /// Reject the request with 403 unless the principal has `role`.
    pub fn require_role(&self, role: Role) -> Result<(), ApiError> {
        if self.role == role {
            Ok(())
        } else {
            Err(ApiError::authorization(format!(
                "This operation requires a {role} account"
            )))
        }
    }
}

fn extract_token(parts: &Parts) -> Result<&str, ApiError> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .ok_or_else(|| ApiError::authentication("Missing Authorization header"))?
        .to_str()
        .map_err(|_| ApiError::authentication("Authorization header is not valid ASCII"))?;

    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| {
            ApiError::authentication("Invalid Authorization header format. Expected: Bearer <token>")
        })
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    PharmacyServer: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let request = RequestContext::from_request_parts(parts, state).await?;
        let server = PharmacyServer::from_ref(state);

        let token = extract_token(parts)?;
        let claims = server
            .tokens
            .verify(token)
            .map_err(|e| ApiError::authentication(e.to_string()))?;
        let user_id = claims
            .user_id()
            .map_err(|e| ApiError::authentication(e.to_string()))?;

        tracing::debug!(
            request_id = %request.request_id,
            user_id,
            role = %claims.role,
            "Authenticated request"
        );

        Ok(AuthContext {
            user_id,
            role: claims.role,
            request,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_role_matches_exactly() {
        let ctx = AuthContext::new(1, Role::Pharmacy);
        assert!(ctx.require_role(Role::Pharmacy).is_ok());
        let err = ctx.require_role(Role::Doctor).unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::FORBIDDEN);
    }
}
