use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;

use crate::auth::claims::TokenKind;
use crate::auth::jwt::JwtKeys;
use crate::error::AppError;
use crate::state::AppState;

/// Extracts and validates the access JWT, returning the user id.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub i64);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        let auth = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".into()))?;

        // Expect "Bearer <token>"
        let token = auth
            .strip_prefix("Bearer ")
            .or_else(|| auth.strip_prefix("bearer "))
            .ok_or_else(|| AppError::Unauthorized("Invalid Authorization header".into()))?;

        let claims = keys.verify(token).map_err(|_| {
            warn!("invalid or expired token");
            AppError::Unauthorized("Invalid or expired token".into())
        })?;

        if claims.kind != TokenKind::Access {
            return Err(AppError::Unauthorized("Access token required".into()));
        }

        Ok(AuthUser(claims.sub))
    }
}

/// An authenticated user holding one of the roles allowed to manage
/// accounts (`AppConfig::manage_roles`).
#[derive(Debug, Clone, Copy)]
pub struct ManageUsers(pub AuthUser);

impl ManageUsers {
    pub fn id(&self) -> i64 {
        self.0 .0
    }
}

#[async_trait]
impl FromRequestParts<AppState> for ManageUsers {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;

        if state.users.find(user.0).await?.is_none() {
            warn!(user_id = user.0, "token for unknown user");
            return Err(AppError::Unauthorized("User not found".into()));
        }

        let roles = state.users.roles_of(user.0).await?;
        let allowed = roles
            .iter()
            .any(|r| state.config.manage_roles.iter().any(|m| m == &r.name));
        if !allowed {
            warn!(user_id = user.0, "user management denied");
            return Err(AppError::Forbidden("Not allowed to manage users".into()));
        }

        Ok(ManageUsers(user))
    }
}
