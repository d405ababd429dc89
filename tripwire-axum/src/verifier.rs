use async_trait::async_trait;
use serde::Serialize;
use tripwire_core::AttemptKey;

use crate::error::AuthError;

/// Checks a password for an identity.
///
/// Implementations return `Ok(None)` both for unknown identities and for wrong
/// passwords so callers cannot tell the two apart. An `Err` aborts the sign in
/// without counting it as a failed attempt.
#[async_trait]
pub trait CredentialVerifier: Send + Sync + 'static {
    /// What a successful sign in hands back to the client (a user, a token...).
    type Principal: Serialize + Send + 'static;

    async fn verify(
        &self,
        key: &AttemptKey,
        password: &str,
    ) -> Result<Option<Self::Principal>, AuthError>;
}
