//! Auth adapter over the hosted authentication functions.
//!
//! Sign-in, sign-out, registration and password-reset dispatch are all
//! delegated to the backend; this layer validates input up front, rejects
//! inactive accounts, and maps provider error codes onto [`AuthError`].

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use crate::convex_client::RapportConvexClient;
use crate::error::{AuthError, DataError, Result};
use crate::types::{NewUser, UserRecord};

/// Minimal email shape check; the provider performs the real validation.
pub fn is_plausible_email(email: &str) -> bool {
    let mut parts = email.split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.')
        }
        _ => false,
    }
}

/// Client for the hosted auth contract.
pub struct AuthClient {
    client: Arc<Mutex<RapportConvexClient>>,
}

impl AuthClient {
    pub fn new(client: Arc<Mutex<RapportConvexClient>>) -> Self {
        Self { client }
    }

    /// Email/password sign-in. Disabled accounts are rejected even when the
    /// credentials are correct.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<UserRecord> {
        if !is_plausible_email(email) {
            return Err(DataError::Auth(AuthError::InvalidEmail));
        }
        if password.is_empty() {
            return Err(DataError::Auth(AuthError::InvalidCredentials));
        }

        let user = self.client.lock().await.sign_in(email, password).await?;
        if !user.is_active {
            return Err(DataError::Auth(AuthError::AccountDisabled));
        }
        info!(uid = %user.uid, role = %user.role, "user signed in");
        Ok(user)
    }

    pub async fn sign_out(&self, uid: &str) -> Result<()> {
        self.client.lock().await.sign_out(uid).await
    }

    /// Dispatch a password-reset email via the provider.
    pub async fn send_password_reset(&self, email: &str) -> Result<()> {
        if !is_plausible_email(email) {
            return Err(DataError::Auth(AuthError::InvalidEmail));
        }
        self.client.lock().await.send_password_reset(email).await
    }

    /// Create an account and its user document. Role membership is already
    /// constrained by the [`crate::types::Role`] type; password strength is
    /// pre-checked to spare a round trip.
    pub async fn register(&self, user: &NewUser) -> Result<String> {
        if !is_plausible_email(&user.email) {
            return Err(DataError::Auth(AuthError::InvalidEmail));
        }
        if user.password.len() < 6 {
            return Err(DataError::Auth(AuthError::WeakPassword));
        }
        if user.full_name.trim().is_empty() {
            return Err(DataError::MissingField("full_name".to_string()));
        }
        let uid = self.client.lock().await.register(user).await?;
        info!(uid = %uid, role = %user.role, "user registered");
        Ok(uid)
    }
}
