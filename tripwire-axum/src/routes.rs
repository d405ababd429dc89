use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    response::IntoResponse,
    routing::{get, post},
};
use tripwire_core::{
    AttemptKey, AttemptOutcome, Decision, ThrottleService, repositories::AttemptRepository,
};

use crate::{
    error::{AuthError, Result},
    types::*,
    verifier::CredentialVerifier,
};

pub struct ThrottleState<R: AttemptRepository, V: CredentialVerifier> {
    pub service: Arc<ThrottleService<R>>,
    pub verifier: Arc<V>,
}

impl<R: AttemptRepository, V: CredentialVerifier> Clone for ThrottleState<R, V> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
            verifier: self.verifier.clone(),
        }
    }
}

pub fn create_router<R, V>(service: Arc<ThrottleService<R>>, verifier: Arc<V>) -> Router
where
    R: AttemptRepository,
    V: CredentialVerifier,
{
    let state = ThrottleState { service, verifier };

    Router::new()
        .route("/sign-in", post(sign_in_handler::<R, V>))
        .route("/health", get(health_handler::<R, V>))
        .with_state(state)
}

async fn sign_in_handler<R, V>(
    State(state): State<ThrottleState<R, V>>,
    Json(request): Json<SignInRequest>,
) -> Result<impl IntoResponse>
where
    R: AttemptRepository,
    V: CredentialVerifier,
{
    let key =
        AttemptKey::email(&request.email).map_err(|e| AuthError::BadRequest(e.to_string()))?;

    let outcome = state
        .service
        .attempt(&key, || state.verifier.verify(&key, &request.password))
        .await?;

    match outcome {
        AttemptOutcome::Authenticated(principal) => Ok(Json(SignInResponse { principal })),
        AttemptOutcome::Rejected { .. } => Err(AuthError::InvalidCredentials),
        AttemptOutcome::Denied { retry_after } => Err(AuthError::Locked {
            retry_after_seconds: Decision::Denied { retry_after }
                .retry_after_seconds()
                .unwrap_or_default(),
        }),
    }
}

async fn health_handler<R, V>(State(state): State<ThrottleState<R, V>>) -> Result<impl IntoResponse>
where
    R: AttemptRepository,
    V: CredentialVerifier,
{
    state.service.health_check().await?;

    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }))
}
