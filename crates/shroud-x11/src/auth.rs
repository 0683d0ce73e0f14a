//! PAM credential authority.
//!
//! Wraps a PAM conversation into the plain [`CredentialAuthority`] contract.
//! The username is resolved from `$USER` at call time, and every internal
//! PAM failure is folded into `Rejected` so a misconfigured or broken stack
//! can never unlock the screen.

use pam::Authenticator;
use secrecy::{ExposeSecret, SecretString};
use shroud_core::traits::{CredentialAuthority, Verdict};
use tracing::{debug, warn};

/// Screen lockers conventionally authenticate against the login service.
const DEFAULT_SERVICE: &str = "login";

/// Credential authority backed by PAM.
pub struct PamAuthority {
    service: String,
}

impl PamAuthority {
    /// Authenticate against the `login` service.
    pub fn new() -> Self {
        Self::with_service(DEFAULT_SERVICE)
    }

    /// Authenticate against a specific PAM service.
    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }
}

impl Default for PamAuthority {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialAuthority for PamAuthority {
    fn verify(&self, secret: &SecretString) -> Verdict {
        let user = match std::env::var("USER") {
            Ok(user) if !user.is_empty() => user,
            _ => {
                warn!("USER is not set, rejecting credential");
                return Verdict::Rejected;
            }
        };

        let mut authenticator = match Authenticator::with_password(&self.service) {
            Ok(authenticator) => authenticator,
            Err(e) => {
                warn!(service = %self.service, error = %e, "PAM session could not start");
                return Verdict::Rejected;
            }
        };

        authenticator
            .get_handler()
            .set_credentials(user.as_str(), secret.expose_secret());

        match authenticator.authenticate() {
            Ok(()) => Verdict::Accepted,
            Err(e) => {
                // The error never reaches the user; rejection is visible only
                // as a bell and a visual reset.
                debug!(error = %e, "PAM rejected credential");
                Verdict::Rejected
            }
        }
    }
}
