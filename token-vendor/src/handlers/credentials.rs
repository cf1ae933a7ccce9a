use axum::{extract::State, Json};
use serde::Serialize;

use crate::middleware::Identity;
use crate::services::TemporaryCredentials;
use crate::AppState;
use gateway_core::error::AppError;

/// Response shape of the credential route. Key casing matches the broker's
/// wire format, which existing consumers already parse.
#[derive(Debug, Serialize)]
pub struct CredentialResponse {
    #[serde(rename = "Credentials")]
    pub credentials: TemporaryCredentials,
    #[serde(rename = "TenantId")]
    pub tenant_id: String,
    #[serde(rename = "TenantTier")]
    pub tenant_tier: String,
}

/// Exchange the verified tenant identity for tenant-tagged temporary
/// credentials.
pub async fn vend_credentials(
    State(state): State<AppState>,
    Identity(claims): Identity,
) -> Result<Json<CredentialResponse>, AppError> {
    let credentials = state.broker.vend(&claims.tenant_id).await.map_err(|e| {
        tracing::error!(
            subject = %claims.sub,
            tenant_id = %claims.tenant_id,
            error = %e,
            "Credential exchange failed"
        );
        AppError::from(e)
    })?;

    tracing::info!(
        subject = %claims.sub,
        tenant_id = %claims.tenant_id,
        tenant_tier = %claims.tenant_tier,
        "Vended tenant-scoped credentials"
    );

    Ok(Json(CredentialResponse {
        credentials,
        tenant_id: claims.tenant_id,
        tenant_tier: claims.tenant_tier,
    }))
}
