use aws_config::timeout::TimeoutConfig;
use aws_config::{BehaviorVersion, Region};
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use crate::config::GatewayConfig;
use crate::services::{
    ActionTable, CredentialBroker, DecisionClient, StsCredentialBroker, TokenVerifier,
    VerifiedPermissionsClient,
};
use crate::{build_router, AppState};
use gateway_core::error::AppError;

pub struct Application {
    port: u16,
    server: Box<dyn std::future::Future<Output = std::io::Result<()>> + Send + Unpin>,
}

impl Application {
    /// Build the gateway with AWS-backed policy and credential clients.
    pub async fn build(config: GatewayConfig) -> Result<Self, AppError> {
        // Outbound calls inherit a bounded per-operation timeout instead of
        // running until the peer gives up.
        let timeout = TimeoutConfig::builder()
            .operation_timeout(Duration::from_secs(config.aws.request_timeout_seconds))
            .build();

        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.aws.region.clone()))
            .timeout_config(timeout)
            .load()
            .await;

        let authz: Arc<dyn DecisionClient> = Arc::new(VerifiedPermissionsClient::new(
            aws_sdk_verifiedpermissions::Client::new(&sdk_config),
            &config.authz,
        ));
        let broker: Arc<dyn CredentialBroker> = Arc::new(StsCredentialBroker::new(
            aws_sdk_sts::Client::new(&sdk_config),
            &config.aws,
        ));

        Self::build_with(config, authz, broker).await
    }

    /// Build the gateway with injected collaborators. Integration tests use
    /// this to substitute fakes for the policy engine and broker.
    pub async fn build_with(
        config: GatewayConfig,
        authz: Arc<dyn DecisionClient>,
        broker: Arc<dyn CredentialBroker>,
    ) -> Result<Self, AppError> {
        let verifier = TokenVerifier::from_config(&config.token)
            .await
            .map_err(AppError::ConfigError)?;
        tracing::info!("Token verifier initialized");

        let actions =
            Arc::new(ActionTable::compile(&config.action_rules).map_err(AppError::ConfigError)?);
        tracing::info!(rules = config.action_rules.len(), "Action table compiled");

        let state = AppState {
            config: config.clone(),
            verifier,
            actions,
            authz,
            broker,
        };

        let app = build_router(state);

        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(port, "Listening");

        let server = axum::serve(listener, app);

        Ok(Self {
            port,
            server: Box::new(server.into_future()),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        self.server.await
    }
}
