#![allow(dead_code)]

use async_trait::async_trait;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::{RsaPrivateKey, RsaPublicKey};
use std::io::Write;
use std::sync::{Mutex, OnceLock};
use std::time::Duration;
use tempfile::NamedTempFile;

use gateway_core::config::Config as CoreConfig;
use token_vendor::config::{
    ActionRuleConfig, AuthzConfig, AwsConfig, Environment, GatewayConfig, TokenConfig,
};
use token_vendor::services::{
    CredentialBroker, CredentialExchangeError, Decision, DecisionClient, PolicyEngineError,
    TemporaryCredentials, TenantClaims,
};
use token_vendor::startup::Application;

pub const TEST_ISSUER: &str = "https://issuer.test";

pub struct TestKeys {
    pub private_pem: String,
    public_key_file: NamedTempFile,
}

impl TestKeys {
    pub fn public_key_path(&self) -> String {
        self.public_key_file.path().to_str().unwrap().to_string()
    }
}

/// One RSA keypair per test binary; 2048-bit generation is too slow to
/// repeat per test.
pub fn test_keys() -> &'static TestKeys {
    static KEYS: OnceLock<TestKeys> = OnceLock::new();
    KEYS.get_or_init(|| {
        let mut rng = rand::thread_rng();
        let private_key = RsaPrivateKey::new(&mut rng, 2048).expect("failed to generate RSA key");
        let public_pem = RsaPublicKey::from(&private_key)
            .to_public_key_pem(LineEnding::LF)
            .expect("failed to encode public key");

        let mut public_key_file = NamedTempFile::new().expect("failed to create temp file");
        public_key_file
            .write_all(public_pem.as_bytes())
            .expect("failed to write public key");

        TestKeys {
            private_pem: private_key
                .to_pkcs8_pem(LineEnding::LF)
                .expect("failed to encode private key")
                .to_string(),
            public_key_file,
        }
    })
}

pub fn test_config() -> GatewayConfig {
    let rules = vec![
        action_rule("^POST /products/?$", "CreateProduct"),
        action_rule("^GET /products(?:/.*)?$", "ViewProduct"),
        action_rule("^POST /orders/?$", "CreateOrder"),
        action_rule("^GET /orders(?:/.*)?$", "ViewOrder"),
    ];

    GatewayConfig {
        common: CoreConfig { port: 0 },
        environment: Environment::Dev,
        service_name: "token-vendor".to_string(),
        service_version: "0.0.0-test".to_string(),
        log_level: "info".to_string(),
        token: TokenConfig {
            issuer: TEST_ISSUER.to_string(),
            jwks_url: None,
            public_key_path: Some(test_keys().public_key_path()),
        },
        aws: AwsConfig {
            region: "us-west-2".to_string(),
            role_arn: "arn:aws:iam::123456789012:role/tenant-access".to_string(),
            tenant_tag_key: "TenantID".to_string(),
            verify_caller: false,
            request_timeout_seconds: 5,
        },
        authz: AuthzConfig {
            policy_store_id: "test-store".to_string(),
            resource_type: "Route".to_string(),
        },
        action_rules: rules,
    }
}

fn action_rule(pattern: &str, action: &str) -> ActionRuleConfig {
    ActionRuleConfig {
        pattern: pattern.to_string(),
        action: action.to_string(),
    }
}

/// Sign a well-formed token for the given tenant with the test keypair.
pub fn token_for(tenant_id: &str) -> String {
    token_with(|claims| {
        claims["custom:tenant_id"] = serde_json::json!(tenant_id);
    })
}

/// Sign a token after applying `mutate` to the default claim set.
pub fn token_with(mutate: impl FnOnce(&mut serde_json::Value)) -> String {
    let now = chrono::Utc::now().timestamp();
    let mut claims = serde_json::json!({
        "sub": "user-123",
        "custom:tenant_id": "tenant-a",
        "custom:tenant_tier": "premium",
        "custom:user_role": "TenantAdmin",
        "iss": TEST_ISSUER,
        "iat": now,
        "exp": now + 3600,
    });
    mutate(&mut claims);

    let key = EncodingKey::from_rsa_pem(test_keys().private_pem.as_bytes())
        .expect("failed to parse signing key");
    encode(&Header::new(Algorithm::RS256), &claims, &key).expect("failed to sign token")
}

/// Decision client that always answers with a fixed decision and records
/// the (action, path) pairs it was asked about.
pub struct RecordingDecision {
    decision: Decision,
    pub calls: Mutex<Vec<(String, String)>>,
}

impl RecordingDecision {
    pub fn new(decision: Decision) -> Self {
        Self {
            decision,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl DecisionClient for RecordingDecision {
    async fn authorize(
        &self,
        _claims: &TenantClaims,
        action: &str,
        path: &str,
    ) -> Result<Decision, PolicyEngineError> {
        self.calls
            .lock()
            .unwrap()
            .push((action.to_string(), path.to_string()));
        Ok(self.decision)
    }
}

/// Decision client whose every call fails, for fail-closed checks.
pub struct FailingDecision;

#[async_trait]
impl DecisionClient for FailingDecision {
    async fn authorize(
        &self,
        _claims: &TenantClaims,
        _action: &str,
        _path: &str,
    ) -> Result<Decision, PolicyEngineError> {
        Err(PolicyEngineError::Request(anyhow::anyhow!(
            "injected policy engine outage"
        )))
    }
}

/// Broker that vends canned credentials and records the tenant ids it saw.
pub struct RecordingBroker {
    pub calls: Mutex<Vec<String>>,
}

impl RecordingBroker {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl CredentialBroker for RecordingBroker {
    async fn vend(&self, tenant_id: &str) -> Result<TemporaryCredentials, CredentialExchangeError> {
        self.calls.lock().unwrap().push(tenant_id.to_string());
        Ok(TemporaryCredentials {
            access_key_id: "ASIATESTACCESSKEY".to_string(),
            secret_access_key: "test-secret".to_string(),
            session_token: "test-session-token".to_string(),
            expiration: chrono::Utc::now() + chrono::Duration::hours(1),
        })
    }
}

/// Broker whose every call fails, for upstream-outage checks.
pub struct FailingBroker;

#[async_trait]
impl CredentialBroker for FailingBroker {
    async fn vend(
        &self,
        _tenant_id: &str,
    ) -> Result<TemporaryCredentials, CredentialExchangeError> {
        Err(CredentialExchangeError::AssumeRole(anyhow::anyhow!(
            "injected broker outage"
        )))
    }
}

pub struct TestApp {
    pub address: String,
}

impl TestApp {
    pub async fn spawn(
        authz: std::sync::Arc<dyn DecisionClient>,
        broker: std::sync::Arc<dyn CredentialBroker>,
    ) -> Self {
        let app = Application::build_with(test_config(), authz, broker)
            .await
            .expect("Failed to build test application");

        let port = app.port();
        let address = format!("http://127.0.0.1:{}", port);

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        // Wait for the server to accept connections
        let client = reqwest::Client::new();
        let health_url = format!("{}/health", address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        TestApp { address }
    }
}
