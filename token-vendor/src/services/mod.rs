//! Services layer for the tenant token gateway.
//!
//! Pure computation (token verification, action mapping) plus the two
//! outbound collaborators (policy engine, credential broker) behind traits.

pub mod action_map;
pub mod authz;
pub mod credentials;
pub mod jwt;

pub use action_map::ActionTable;
pub use authz::{Decision, DecisionClient, PolicyEngineError, VerifiedPermissionsClient};
pub use credentials::{
    CredentialBroker, CredentialExchangeError, StsCredentialBroker, TemporaryCredentials,
};
pub use jwt::{TenantClaims, TokenError, TokenVerifier};
