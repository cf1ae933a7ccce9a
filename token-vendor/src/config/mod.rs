use gateway_core::config as core_config;
use gateway_core::error::AppError;
use serde::Deserialize;
use std::env;

/// Action table used when ACTION_RULES is not set. Matches the product and
/// order routes fronted by the gateway in the default deployment.
const DEFAULT_ACTION_RULES: &str = r#"[
  {"pattern": "^POST /products/?$", "action": "CreateProduct"},
  {"pattern": "^GET /products(?:/.*)?$", "action": "ViewProduct"},
  {"pattern": "^PUT /products/.*", "action": "UpdateProduct"},
  {"pattern": "^DELETE /products/.*", "action": "DeleteProduct"},
  {"pattern": "^POST /orders/?$", "action": "CreateOrder"},
  {"pattern": "^GET /orders(?:/.*)?$", "action": "ViewOrder"}
]"#;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub token: TokenConfig,
    pub aws: AwsConfig,
    pub authz: AuthzConfig,
    pub action_rules: Vec<ActionRuleConfig>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    Dev,
    Prod,
}

/// Identity token verification settings. Exactly one of `jwks_url` and
/// `public_key_path` must be configured.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub issuer: String,
    pub jwks_url: Option<String>,
    pub public_key_path: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AwsConfig {
    pub region: String,
    pub role_arn: String,
    pub tenant_tag_key: String,
    pub verify_caller: bool,
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct AuthzConfig {
    pub policy_store_id: String,
    pub resource_type: String,
}

/// One entry of the ordered action table. Declaration order is significant:
/// the first matching pattern wins.
#[derive(Debug, Clone, Deserialize)]
pub struct ActionRuleConfig {
    pub pattern: String,
    pub action: String,
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;

        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;

        let action_rules_json = get_env("ACTION_RULES", Some(DEFAULT_ACTION_RULES), is_prod)?;
        let action_rules: Vec<ActionRuleConfig> = serde_json::from_str(&action_rules_json)
            .map_err(|e| {
                AppError::ConfigError(anyhow::anyhow!("ACTION_RULES is not valid JSON: {}", e))
            })?;

        let config = GatewayConfig {
            common: common_config,
            environment,
            service_name: get_env("SERVICE_NAME", Some("token-vendor"), is_prod)?,
            service_version: get_env("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")), is_prod)?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            token: TokenConfig {
                issuer: get_env("TOKEN_ISSUER", None, is_prod)?,
                jwks_url: env::var("TOKEN_JWKS_URL").ok(),
                public_key_path: env::var("TOKEN_PUBLIC_KEY_PATH").ok(),
            },
            aws: AwsConfig {
                region: get_env("AWS_DEFAULT_REGION", Some("us-west-2"), is_prod)?,
                role_arn: get_env("ROLE_ARN", None, is_prod)?,
                tenant_tag_key: get_env("TENANT_TAG_KEY", Some("TenantID"), is_prod)?,
                verify_caller: parse_env(
                    "STS_VERIFY_CALLER",
                    &get_env("STS_VERIFY_CALLER", Some("false"), is_prod)?,
                )?,
                request_timeout_seconds: parse_env(
                    "UPSTREAM_TIMEOUT_SECONDS",
                    &get_env("UPSTREAM_TIMEOUT_SECONDS", Some("10"), is_prod)?,
                )?,
            },
            authz: AuthzConfig {
                policy_store_id: get_env("POLICY_STORE_ID", None, is_prod)?,
                resource_type: get_env("AUTHZ_RESOURCE_TYPE", Some("Route"), is_prod)?,
            },
            action_rules,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 && self.environment == Environment::Prod {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PORT must be greater than 0"
            )));
        }

        if self.aws.role_arn.trim().is_empty() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "ROLE_ARN must not be empty"
            )));
        }

        if self.aws.tenant_tag_key.trim().is_empty() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "TENANT_TAG_KEY must not be empty"
            )));
        }

        if self.authz.policy_store_id.trim().is_empty() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "POLICY_STORE_ID must not be empty"
            )));
        }

        match (&self.token.jwks_url, &self.token.public_key_path) {
            (None, None) => {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "either TOKEN_JWKS_URL or TOKEN_PUBLIC_KEY_PATH must be set"
                )));
            }
            (Some(_), Some(_)) => {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "TOKEN_JWKS_URL and TOKEN_PUBLIC_KEY_PATH are mutually exclusive"
                )));
            }
            _ => {}
        }

        if self.aws.request_timeout_seconds == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "UPSTREAM_TIMEOUT_SECONDS must be positive"
            )));
        }

        if self.action_rules.is_empty() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "ACTION_RULES must contain at least one rule"
            )));
        }

        Ok(())
    }
}

/// Parse a setting that arrived as a string. A malformed value fails the
/// boot like any other configuration error instead of being coerced to a
/// default.
fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, AppError> {
    value.parse().map_err(|_| {
        AppError::ConfigError(anyhow::anyhow!("{} has an invalid value: {:?}", key, value))
    })
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required in production but not set",
                    key
                ))))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required but not set",
                    key
                ))))
            }
        }
    }
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}
