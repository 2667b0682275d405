use crate::error::AppError;
use crate::models::{Principal, Role};
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

/// Header carrying the authenticated actor's id, set by the identity gateway
pub const PRINCIPAL_ID_HEADER: &str = "x-principal-id";
/// Header carrying the actor's role: player, coach or admin
pub const PRINCIPAL_ROLE_HEADER: &str = "x-principal-role";

fn header<'a>(parts: &'a Parts, name: &str) -> Result<&'a str, AppError> {
    parts
        .headers
        .get(name)
        .ok_or_else(|| AppError::Unauthenticated(format!("Missing {} header", name)))?
        .to_str()
        .map_err(|_| AppError::Unauthenticated(format!("Malformed {} header", name)))
}

#[async_trait]
impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = Uuid::parse_str(header(parts, PRINCIPAL_ID_HEADER)?.trim())
            .map_err(|_| AppError::Unauthenticated("Principal id is not a UUID".into()))?;
        let role = Role::from_str(header(parts, PRINCIPAL_ROLE_HEADER)?.trim())
            .map_err(AppError::Unauthenticated)?;

        Ok(Principal { id, role })
    }
}
