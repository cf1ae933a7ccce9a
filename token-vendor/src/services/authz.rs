use async_trait::async_trait;
use aws_sdk_verifiedpermissions::error::DisplayErrorContext;
use aws_sdk_verifiedpermissions::types::{
    ActionIdentifier, Decision as SdkDecision, EntitiesDefinition, EntityIdentifier, EntityItem,
};
use thiserror::Error;

use crate::config::AuthzConfig;
use crate::services::TenantClaims;
use gateway_core::error::AppError;

/// The policy engine's verdict. No partial or conditional decisions are
/// modeled; anything that is not an explicit allow is a deny.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

/// Failures while obtaining a decision from the policy engine. The gateway
/// treats all of them as deny and surfaces a 5xx (fail-closed).
#[derive(Debug, Error)]
pub enum PolicyEngineError {
    #[error("Policy engine request failed: {0}")]
    Request(anyhow::Error),

    #[error("Policy engine returned a malformed response: {0}")]
    MalformedResponse(String),
}

impl From<PolicyEngineError> for AppError {
    fn from(err: PolicyEngineError) -> Self {
        AppError::InternalError(anyhow::Error::new(err))
    }
}

/// Decision oracle for proxied requests.
#[async_trait]
pub trait DecisionClient: Send + Sync {
    async fn authorize(
        &self,
        claims: &TenantClaims,
        action: &str,
        path: &str,
    ) -> Result<Decision, PolicyEngineError>;
}

/// The principal/action/resource triple plus the entity graph sent to the
/// policy engine. The graph always carries exactly one principal→role parent
/// edge so role-based policies evaluate transitively; an empty role claim is
/// sent as an empty-string role entity, understood as "no role".
struct AuthorizationRequest {
    principal: EntityIdentifier,
    action: ActionIdentifier,
    resource: EntityIdentifier,
    entities: EntitiesDefinition,
}

/// Amazon Verified Permissions-backed decision client.
pub struct VerifiedPermissionsClient {
    client: aws_sdk_verifiedpermissions::Client,
    policy_store_id: String,
    resource_type: String,
}

impl VerifiedPermissionsClient {
    pub fn new(client: aws_sdk_verifiedpermissions::Client, config: &AuthzConfig) -> Self {
        Self {
            client,
            policy_store_id: config.policy_store_id.clone(),
            resource_type: config.resource_type.clone(),
        }
    }

    fn build_request(
        &self,
        claims: &TenantClaims,
        action: &str,
        path: &str,
    ) -> Result<AuthorizationRequest, PolicyEngineError> {
        let invalid = |e: aws_sdk_verifiedpermissions::error::BuildError| {
            PolicyEngineError::Request(anyhow::Error::new(e))
        };

        let principal = EntityIdentifier::builder()
            .entity_type("User")
            .entity_id(&claims.sub)
            .build()
            .map_err(invalid)?;

        let role = EntityIdentifier::builder()
            .entity_type("Role")
            .entity_id(&claims.user_role)
            .build()
            .map_err(invalid)?;

        let action = ActionIdentifier::builder()
            .action_type("Action")
            .action_id(action)
            .build()
            .map_err(invalid)?;

        let resource = EntityIdentifier::builder()
            .entity_type(&self.resource_type)
            .entity_id(path)
            .build()
            .map_err(invalid)?;

        let principal_entity = EntityItem::builder()
            .identifier(principal.clone())
            .parents(role.clone())
            .build();

        let role_entity = EntityItem::builder().identifier(role).build();

        Ok(AuthorizationRequest {
            principal,
            action,
            resource,
            entities: EntitiesDefinition::EntityList(vec![principal_entity, role_entity]),
        })
    }
}

#[async_trait]
impl DecisionClient for VerifiedPermissionsClient {
    async fn authorize(
        &self,
        claims: &TenantClaims,
        action: &str,
        path: &str,
    ) -> Result<Decision, PolicyEngineError> {
        let request = self.build_request(claims, action, path)?;

        let response = self
            .client
            .is_authorized()
            .policy_store_id(&self.policy_store_id)
            .principal(request.principal)
            .action(request.action)
            .resource(request.resource)
            .entities(request.entities)
            .send()
            .await
            .map_err(|e| {
                PolicyEngineError::Request(anyhow::anyhow!("{}", DisplayErrorContext(&e)))
            })?;

        // Anything other than an explicit allow, including decision values
        // added to the API later, is treated as deny.
        let decision = match response.decision() {
            SdkDecision::Allow => Decision::Allow,
            _ => Decision::Deny,
        };

        Ok(decision)
    }
}
