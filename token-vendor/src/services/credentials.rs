use async_trait::async_trait;
use aws_sdk_sts::error::DisplayErrorContext;
use aws_sdk_sts::operation::assume_role::AssumeRoleInput;
use aws_sdk_sts::types::Tag;
use serde::Serialize;
use thiserror::Error;

use crate::config::AwsConfig;
use gateway_core::error::AppError;

/// Failures while exchanging a tenant identity for temporary credentials.
/// All of them surface as a 502 to the caller; credentials are never
/// synthesized on error.
#[derive(Debug, Error)]
pub enum CredentialExchangeError {
    #[error("Failed getting caller identity!")]
    CallerIdentity(#[source] anyhow::Error),

    #[error("Failed assuming role!")]
    AssumeRole(#[source] anyhow::Error),

    #[error("Credential broker returned a malformed response: {0}")]
    MalformedResponse(String),
}

impl From<CredentialExchangeError> for AppError {
    fn from(err: CredentialExchangeError) -> Self {
        AppError::BadGateway(err.to_string())
    }
}

/// Temporary credentials vended by the broker. Opaque pass-through data:
/// forwarded to the caller, never parsed or mutated here. Field names match
/// the broker's wire format.
#[derive(Debug, Clone, Serialize)]
pub struct TemporaryCredentials {
    #[serde(rename = "AccessKeyId")]
    pub access_key_id: String,
    #[serde(rename = "SecretAccessKey")]
    pub secret_access_key: String,
    #[serde(rename = "SessionToken")]
    pub session_token: String,
    #[serde(rename = "Expiration")]
    pub expiration: chrono::DateTime<chrono::Utc>,
}

/// Credential oracle: exchanges a validated tenant id for tenant-tagged
/// temporary credentials. A fresh exchange happens per request; nothing is
/// cached across requests.
#[async_trait]
pub trait CredentialBroker: Send + Sync {
    async fn vend(&self, tenant_id: &str) -> Result<TemporaryCredentials, CredentialExchangeError>;
}

/// STS-backed credential broker assuming a fixed target role.
pub struct StsCredentialBroker {
    client: aws_sdk_sts::Client,
    role_arn: String,
    tag_key: String,
    verify_caller: bool,
}

impl StsCredentialBroker {
    pub fn new(client: aws_sdk_sts::Client, config: &AwsConfig) -> Self {
        Self {
            client,
            role_arn: config.role_arn.clone(),
            tag_key: config.tenant_tag_key.clone(),
            verify_caller: config.verify_caller,
        }
    }

    /// Session name and the single session tag both carry the tenant id
    /// unmodified; that pairing is what makes the vended credentials
    /// traceable and isolatable per tenant.
    fn assume_role_input(
        &self,
        tenant_id: &str,
    ) -> Result<AssumeRoleInput, CredentialExchangeError> {
        let invalid = |e: aws_sdk_sts::error::BuildError| {
            CredentialExchangeError::AssumeRole(anyhow::Error::new(e))
        };

        let tag = Tag::builder()
            .key(&self.tag_key)
            .value(tenant_id)
            .build()
            .map_err(invalid)?;

        AssumeRoleInput::builder()
            .role_arn(&self.role_arn)
            .role_session_name(tenant_id)
            .tags(tag)
            .build()
            .map_err(invalid)
    }
}

#[async_trait]
impl CredentialBroker for StsCredentialBroker {
    async fn vend(&self, tenant_id: &str) -> Result<TemporaryCredentials, CredentialExchangeError> {
        if self.verify_caller {
            let identity = self.client.get_caller_identity().send().await.map_err(|e| {
                CredentialExchangeError::CallerIdentity(anyhow::anyhow!(
                    "{}",
                    DisplayErrorContext(&e)
                ))
            })?;
            tracing::debug!(
                caller_arn = identity.arn().unwrap_or("unknown"),
                "Verified broker caller identity"
            );
        }

        let input = self.assume_role_input(tenant_id)?;
        let response = self
            .client
            .assume_role()
            .set_role_arn(input.role_arn)
            .set_role_session_name(input.role_session_name)
            .set_tags(input.tags)
            .send()
            .await
            .map_err(|e| {
                CredentialExchangeError::AssumeRole(anyhow::anyhow!("{}", DisplayErrorContext(&e)))
            })?;

        let credentials = response.credentials().ok_or_else(|| {
            CredentialExchangeError::MalformedResponse(
                "assume-role response carried no credentials".to_string(),
            )
        })?;

        let expiration = chrono::DateTime::from_timestamp(
            credentials.expiration().secs(),
            credentials.expiration().subsec_nanos(),
        )
        .ok_or_else(|| {
            CredentialExchangeError::MalformedResponse(
                "credential expiration is out of range".to_string(),
            )
        })?;

        Ok(TemporaryCredentials {
            access_key_id: credentials.access_key_id().to_string(),
            secret_access_key: credentials.secret_access_key().to_string(),
            session_token: credentials.session_token().to_string(),
            expiration,
        })
    }
}
