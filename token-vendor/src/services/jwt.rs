use jsonwebtoken::{decode, decode_header, jwk::JwkSet, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use thiserror::Error;

use crate::config::TokenConfig;
use gateway_core::error::AppError;

/// Failures while turning a bearer token into validated claims.
/// All of these are client errors and map to a 400 response.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("BearerToken missing!")]
    MissingHeader,

    #[error("Failed to parse claims: {0}")]
    Malformed(String),

    #[error("Token rejected: {0}")]
    Invalid(#[from] jsonwebtoken::errors::Error),

    #[error("Token signed with unknown key id")]
    UnknownKeyId,

    #[error("Token is missing a tenant id claim")]
    MissingTenant,
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        AppError::BadRequest(anyhow::Error::new(err))
    }
}

/// Validated claims of an end-user identity token.
///
/// The custom claim names follow the identity provider's attribute schema;
/// `tenant_id` drives both credential tagging and authorization scoping.
#[derive(Debug, Clone, Deserialize)]
pub struct TenantClaims {
    pub sub: String,
    #[serde(rename = "custom:tenant_id", default)]
    pub tenant_id: String,
    #[serde(rename = "custom:tenant_tier", default)]
    pub tenant_tier: String,
    #[serde(rename = "custom:user_role", default)]
    pub user_role: String,
    pub iss: String,
    #[serde(default)]
    pub iat: i64,
    pub exp: i64,
}

/// Verifies identity tokens against the issuer's published key material.
///
/// Keys are resolved once at startup, either from a JWKS document (selected
/// per token by `kid`) or from a single configured PEM public key.
#[derive(Clone)]
pub struct TokenVerifier {
    keys: HashMap<String, DecodingKey>,
    default_key: Option<DecodingKey>,
    validation: Validation,
}

impl TokenVerifier {
    pub async fn from_config(config: &TokenConfig) -> Result<Self, anyhow::Error> {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.set_issuer(&[&config.issuer]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);

        let mut keys = HashMap::new();
        let mut default_key = None;

        if let Some(url) = &config.jwks_url {
            let jwks: JwkSet = reqwest::get(url)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to fetch JWKS from {}: {}", url, e))?
                .error_for_status()
                .map_err(|e| anyhow::anyhow!("JWKS endpoint {} returned an error: {}", url, e))?
                .json()
                .await
                .map_err(|e| anyhow::anyhow!("Failed to parse JWKS from {}: {}", url, e))?;

            for jwk in &jwks.keys {
                let Some(kid) = jwk.common.key_id.clone() else {
                    continue;
                };
                let key = DecodingKey::from_jwk(jwk)
                    .map_err(|e| anyhow::anyhow!("Unusable JWKS key {}: {}", kid, e))?;
                keys.insert(kid, key);
            }

            if keys.is_empty() {
                return Err(anyhow::anyhow!("JWKS from {} contained no usable keys", url));
            }

            tracing::info!(count = keys.len(), "Token verifier initialized from JWKS");
        } else if let Some(path) = &config.public_key_path {
            let public_key_pem = fs::read_to_string(path)
                .map_err(|e| anyhow::anyhow!("Failed to read public key from {}: {}", path, e))?;

            default_key = Some(
                DecodingKey::from_rsa_pem(public_key_pem.as_bytes())
                    .map_err(|e| anyhow::anyhow!("Failed to parse public key: {}", e))?,
            );

            tracing::info!("Token verifier initialized with RS256 public key");
        } else {
            return Err(anyhow::anyhow!(
                "Token verifier requires a JWKS URL or a public key path"
            ));
        }

        Ok(Self {
            keys,
            default_key,
            validation,
        })
    }

    /// Verify a bearer token and extract its tenant claims.
    ///
    /// Accepts the raw Authorization header value with or without the
    /// `Bearer ` prefix, matching what the ingress forwards.
    pub fn verify(&self, header_value: &str) -> Result<TenantClaims, TokenError> {
        let token = header_value
            .strip_prefix("Bearer ")
            .unwrap_or(header_value)
            .trim();
        if token.is_empty() {
            return Err(TokenError::MissingHeader);
        }

        let header = decode_header(token).map_err(|e| TokenError::Malformed(e.to_string()))?;

        let key = match header.kid.as_deref() {
            Some(kid) => self
                .keys
                .get(kid)
                .or(self.default_key.as_ref())
                .ok_or(TokenError::UnknownKeyId)?,
            None => self.default_key.as_ref().ok_or(TokenError::UnknownKeyId)?,
        };

        let data = decode::<TenantClaims>(token, key, &self.validation)?;

        if data.claims.tenant_id.is_empty() {
            return Err(TokenError::MissingTenant);
        }

        Ok(data.claims)
    }
}
