use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};

use crate::middleware::Identity;
use crate::services::Decision;
use crate::AppState;
use gateway_core::error::AppError;

/// Original request method, forwarded by the ingress auth filter.
pub const AUTH_REQUEST_METHOD_HEADER: &str = "x-auth-request-method";
/// Original request path, forwarded by the ingress auth filter.
pub const AUTH_REQUEST_PATH_HEADER: &str = "x-auth-request-path";

/// Authorize the original request the ingress is holding: map its
/// (method, path) to an action, then ask the policy engine for a decision.
///
/// A route with no matching action rule is denied outright; an empty action
/// is never forwarded to the policy engine, where it could match an
/// unintended wildcard policy.
pub async fn authorize(
    State(state): State<AppState>,
    Identity(claims): Identity,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let method = required_header(&headers, AUTH_REQUEST_METHOD_HEADER)?;
    let path = required_header(&headers, AUTH_REQUEST_PATH_HEADER)?;

    let Some(action) = state.actions.resolve(method, path) else {
        tracing::info!(
            subject = %claims.sub,
            tenant_id = %claims.tenant_id,
            method,
            path,
            "No action rule matched the route; denying"
        );
        return Err(AppError::Forbidden(anyhow::anyhow!("Access denied!")));
    };

    let decision = state
        .authz
        .authorize(&claims, action, path)
        .await
        .map_err(|e| {
            tracing::error!(
                subject = %claims.sub,
                tenant_id = %claims.tenant_id,
                action,
                error = %e,
                "Policy engine call failed; denying"
            );
            AppError::from(e)
        })?;

    tracing::info!(
        subject = %claims.sub,
        tenant_id = %claims.tenant_id,
        action,
        path,
        decision = ?decision,
        "Authorization decision"
    );

    match decision {
        Decision::Allow => Ok(StatusCode::OK.into_response()),
        Decision::Deny => Err(AppError::Forbidden(anyhow::anyhow!("Access denied!"))),
    }
}

fn required_header<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, AppError> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Missing {} header", name)))
}
