//! # Tripwire Axum Integration
//!
//! Axum routes that put the tripwire login throttle in front of an
//! application's own credential check.
//!
//! - `POST /sign-in` takes `{ "email", "password" }`. Locked identities get
//!   `429 Too Many Requests` with a `Retry-After` header and the password is
//!   never checked. Wrong passwords and unknown emails both get
//!   `401 Invalid credentials`.
//! - `GET /health` checks the attempt storage.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use axum::Router;
//! use tripwire_axum::{AuthError, CredentialVerifier, routes};
//! use tripwire_core::{AttemptKey, InMemoryAttemptRepository, ThrottleConfig, ThrottleService};
//!
//! struct Users;
//!
//! #[async_trait]
//! impl CredentialVerifier for Users {
//!     type Principal = String;
//!
//!     async fn verify(&self, key: &AttemptKey, password: &str) -> Result<Option<String>, AuthError> {
//!         Ok((password == "hunter2").then(|| key.to_string()))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let service = Arc::new(ThrottleService::new(
//!         Arc::new(InMemoryAttemptRepository::new()),
//!         ThrottleConfig::default(),
//!     ));
//!
//!     let app = Router::new().nest("/auth", routes(service, Arc::new(Users)).build());
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
//!     axum::serve(listener, app).await.unwrap();
//! }
//! ```

mod error;
mod routes;
mod types;
mod verifier;

pub use error::{AuthError, Result};
pub use routes::{ThrottleState, create_router};
pub use types::{HealthResponse, SignInRequest, SignInResponse};
pub use verifier::CredentialVerifier;

use axum::Router;
use std::sync::Arc;
use tripwire_core::{ThrottleService, repositories::AttemptRepository};

/// Create throttled sign-in routes for your Axum application.
///
/// # Arguments
///
/// * `service` - The throttle service guarding sign in
/// * `verifier` - The application's credential check
///
/// # Returns
///
/// A builder whose router can be nested at any path (e.g., "/auth")
pub fn routes<R, V>(
    service: Arc<ThrottleService<R>>,
    verifier: Arc<V>,
) -> ThrottleRouterBuilder<R, V>
where
    R: AttemptRepository,
    V: CredentialVerifier,
{
    ThrottleRouterBuilder { service, verifier }
}

/// Builder for the throttled routes
pub struct ThrottleRouterBuilder<R: AttemptRepository, V: CredentialVerifier> {
    service: Arc<ThrottleService<R>>,
    verifier: Arc<V>,
}

impl<R: AttemptRepository, V: CredentialVerifier> ThrottleRouterBuilder<R, V> {
    /// Build the router
    pub fn build(self) -> Router {
        create_router(self.service, self.verifier)
    }
}

impl<R: AttemptRepository, V: CredentialVerifier> From<ThrottleRouterBuilder<R, V>> for Router {
    fn from(builder: ThrottleRouterBuilder<R, V>) -> Self {
        builder.build()
    }
}
