//! Identity verification hook.
//!
//! Lodestone doesn't talk to the identity service itself. It computes the
//! login hash and hands `(username, hash, route)` to an
//! [`IdentityVerifier`], which performs the network call and reports one
//! of three outcomes:
//!
//! - `Ok(Some(profile))`: the player is who they claim to be
//! - `Ok(None)`: the service answered, and the answer is "no"
//! - `Err(_)`: the service couldn't be asked
//!
//! The session handler treats both failure outcomes as fatal for that
//! session. There are no retries.

use std::future::Future;
use std::time::Duration;

use lodestone_protocol::Profile;

use crate::ProxyRoute;

/// Errors an [`IdentityVerifier`] reports when the service can't answer.
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    /// The request couldn't be made or the connection failed.
    #[error("verification request failed: {0}")]
    Request(String),

    /// The service answered with an unexpected status.
    #[error("verification service returned status {0}")]
    Status(u16),

    /// No answer within the configured timeout.
    #[error("verification timed out after {0:?}")]
    TimedOut(Duration),
}

/// Checks a login hash with the identity service.
///
/// # Trait bounds
///
/// - `Send + Sync + 'static` → one verifier is shared by every session's
///   verification task.
/// - The returned future is `Send` so it can run on a spawned Tokio task.
///
/// Implementations may write `async fn verify(..)` directly.
///
/// # Example
///
/// ```rust
/// use lodestone_protocol::Profile;
/// use lodestone_session::{IdentityVerifier, ProxyRoute, VerifyError, offline_profile};
///
/// /// Trusts every login. Only for local testing!
/// struct TrustingVerifier;
///
/// impl IdentityVerifier for TrustingVerifier {
///     async fn verify(
///         &self,
///         username: &str,
///         _server_hash: &str,
///         _route: &ProxyRoute,
///     ) -> Result<Option<Profile>, VerifyError> {
///         Ok(Some(offline_profile(username)))
///     }
/// }
/// ```
pub trait IdentityVerifier: Send + Sync + 'static {
    fn verify(
        &self,
        username: &str,
        server_hash: &str,
        route: &ProxyRoute,
    ) -> impl Future<Output = Result<Option<Profile>, VerifyError>> + Send;
}
