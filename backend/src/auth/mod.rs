pub mod jwt;
pub mod password;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use axum_extra::headers::{authorization::Bearer, Authorization};
use axum_extra::TypedHeader;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    domain::Role,
    error::{AppError, AppResult},
    state::AppState,
};

/// Role sets used by the per-endpoint checks.
pub const ANY_ROLE: &[Role] = &[Role::Vendedor, Role::Pricing, Role::Admin];
pub const SALES: &[Role] = &[Role::Vendedor];
pub const PRICING: &[Role] = &[Role::Pricing];
pub const SALES_OR_PRICING: &[Role] = &[Role::Vendedor, Role::Pricing];
pub const PRICING_OR_ADMIN: &[Role] = &[Role::Pricing, Role::Admin];
pub const ADMIN: &[Role] = &[Role::Admin];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub employee_id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
}

impl AuthenticatedUser {
    pub fn require_role(&self, allowed: &[Role]) -> AppResult<()> {
        if allowed.contains(&self.role) {
            Ok(())
        } else {
            Err(AppError::forbidden(format!(
                "role {} may not perform this operation",
                self.role
            )))
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| AppError::unauthorized())?;

        let claims = state
            .jwt
            .verify_token(bearer.token())
            .map_err(|_| AppError::unauthorized())?;

        Ok(AuthenticatedUser {
            employee_id: claims.eid,
            email: claims.sub,
            name: claims.nombre,
            role: claims.rol,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role) -> AuthenticatedUser {
        AuthenticatedUser {
            employee_id: Uuid::new_v4(),
            email: "x@example.com".into(),
            name: "X".into(),
            role,
        }
    }

    #[test]
    fn role_check_accepts_listed_roles() {
        assert!(user(Role::Pricing).require_role(PRICING_OR_ADMIN).is_ok());
        assert!(user(Role::Vendedor).require_role(ANY_ROLE).is_ok());
    }

    #[test]
    fn role_check_rejects_other_roles_with_forbidden() {
        let err = user(Role::Vendedor).require_role(PRICING).unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::FORBIDDEN);
        assert!(user(Role::Admin).require_role(SALES).is_err());
    }
}
