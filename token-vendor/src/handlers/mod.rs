pub mod authorize;
pub mod credentials;
pub mod health;

pub use authorize::authorize;
pub use credentials::vend_credentials;
pub use health::health_check;
