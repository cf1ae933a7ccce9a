use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::IntoResponse,
};

use crate::services::{TenantClaims, TokenError};
use crate::AppState;
use gateway_core::error::AppError;

/// Verifies the forwarded bearer token and stores the tenant claims in the
/// request extensions. Applied to every route except the health probe.
///
/// Verification failures become a 400 response for this request only; they
/// never affect the serving loop or other in-flight requests.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, AppError> {
    let header_value = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or(TokenError::MissingHeader)?;

    let claims = state.verifier.verify(header_value)?;

    tracing::debug!(
        subject = %claims.sub,
        tenant_id = %claims.tenant_id,
        tenant_tier = %claims.tenant_tier,
        "Bearer token verified"
    );

    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}

/// Extractor handing verified claims to handlers behind the auth layer.
pub struct Identity(pub TenantClaims);

#[axum::async_trait]
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let claims = parts.extensions.get::<TenantClaims>().ok_or_else(|| {
            AppError::InternalError(anyhow::anyhow!(
                "Tenant claims missing from request extensions"
            ))
        })?;

        Ok(Identity(claims.clone()))
    }
}
