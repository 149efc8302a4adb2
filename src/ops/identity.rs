use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::info;

use crate::io::remote::{IdentityService, RemoteError};
use crate::model::session::User;

/// Shown when the server rejects a login without saying why
pub const GENERIC_LOGIN_FAILURE: &str = "login failed";

/// Error type for login
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("email cannot be empty")]
    EmptyEmail,
    #[error("a login is already in progress")]
    LoginInProgress,
    /// The server answered and said no
    #[error("{0}")]
    Rejected(String),
    /// The server could not be reached (or answered with garbage)
    #[error("could not connect to the server: {0}")]
    Connectivity(String),
    #[error("no identity endpoint configured (set remote.auth_url)")]
    Unavailable,
}

/// Trim and lowercase an email, rejecting blank input.
pub fn normalize_email(raw: &str) -> Result<String, IdentityError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(IdentityError::EmptyEmail);
    }
    Ok(trimmed.to_lowercase())
}

/// Email login against the identity endpoint.
///
/// Only one login may be in flight at a time; a second attempt while the
/// first is waiting on the network fails with `LoginInProgress` instead of
/// sending another request.
pub struct IdentitySession {
    service: Arc<dyn IdentityService>,
    in_flight: AtomicBool,
}

impl IdentitySession {
    pub fn new(service: Arc<dyn IdentityService>) -> Self {
        IdentitySession {
            service,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Validate, normalize and send `email`. Nothing is sent for blank input.
    pub fn login(&self, email: &str) -> Result<User, IdentityError> {
        let email = normalize_email(email)?;
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(IdentityError::LoginInProgress);
        }
        let _guard = InFlight(&self.in_flight);

        let user = self.service.login(&email).map_err(classify)?;
        info!(user_id = user.id, "logged in");
        Ok(user)
    }
}

/// Clears the in-flight flag however `login` returns
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn classify(err: RemoteError) -> IdentityError {
    match err {
        RemoteError::Status { message, .. } => {
            IdentityError::Rejected(message.unwrap_or_else(|| GENERIC_LOGIN_FAILURE.to_string()))
        }
        RemoteError::Connectivity { message, .. }
        | RemoteError::Decode { message, .. }
        | RemoteError::Setup { message } => IdentityError::Connectivity(message),
    }
}
