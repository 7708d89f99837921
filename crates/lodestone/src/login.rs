//! Login completion: compression, login success, identity verification.

use lodestone_protocol::{Phase, Profile, ServerMessage};
use lodestone_session::{IdentityVerifier, LoginStage, VerifyError, server_id_hash};
use lodestone_transport::{EncryptionKey, Session};
use tracing::{debug, info};

use crate::LodestoneError;
use crate::handler::SessionHandler;

/// Finishes a login with `profile`.
///
/// Order on the wire: SetCompression, LoginSuccess. The phase then moves to
/// Game, the login callback runs, and the keep-alive task starts. A session
/// that disconnected in the meantime is left alone.
pub(crate) fn finalize<S: Session, V: IdentityVerifier>(
    handler: &SessionHandler<S, V>,
    profile: Profile,
) -> Result<(), LodestoneError> {
    let session = &handler.inner.session;
    {
        // Held across the sends so a concurrent disconnect sees either
        // Login with nothing sent, or Game with everything sent.
        let mut state = handler.inner.state.lock();
        if state.is_disconnected() {
            debug!(conn_id = %session.id(), "login finished after disconnect, discarded");
            return Ok(());
        }

        let threshold = state.compression_threshold;
        session.send(ServerMessage::SetCompression { threshold })?;
        session.set_compression_threshold(threshold)?;

        session.send(ServerMessage::LoginSuccess {
            profile: profile.clone(),
        })?;
        state.set_profile(profile.clone())?;
        state.advance_phase(Phase::Game)?;
        state.set_login_stage(LoginStage::Complete);
    }

    info!(conn_id = %session.id(), player = %profile, "player logged in");

    if let Some(login_handler) = &handler.inner.ctx.login_handler {
        login_handler.logged_in(&handler.peer_info());
    }
    handler.start_keep_alive();
    Ok(())
}

/// Runs identity verification on its own task.
///
/// The outcome is applied only if the session is still connected. Any
/// failure ends the session.
pub(crate) fn spawn_verification<S: Session, V: IdentityVerifier>(
    handler: SessionHandler<S, V>,
    key: EncryptionKey,
) {
    tokio::spawn(async move {
        let outcome = verify(&handler, &key).await;
        if handler.inner.state.lock().is_disconnected() {
            debug!(conn_id = %handler.id(), "verification outcome discarded after disconnect");
            return;
        }
        let result = match outcome {
            Ok(profile) => finalize(&handler, profile),
            Err(err) => Err(err),
        };
        if let Err(err) = result {
            handler.fail(&err);
        }
    });
}

async fn verify<S: Session, V: IdentityVerifier>(
    handler: &SessionHandler<S, V>,
    key: &EncryptionKey,
) -> Result<Profile, LodestoneError> {
    let ctx = &handler.inner.ctx;
    let (username, route) = {
        let state = handler.inner.state.lock();
        (
            state.username().unwrap_or_default().to_string(),
            state.proxy_route.clone(),
        )
    };
    let hash = server_id_hash(&ctx.config.server_id, ctx.keys.public_key_der(), key);
    let timeout = ctx.config.verify_timeout;

    debug!(conn_id = %handler.id(), %username, ?route, "verifying identity");

    let answer = tokio::time::timeout(timeout, ctx.verifier.verify(&username, &hash, &route))
        .await
        .unwrap_or(Err(VerifyError::TimedOut(timeout)));

    match answer {
        Ok(Some(profile)) => Ok(profile),
        Ok(None) => Err(LodestoneError::VerificationRejected),
        Err(e) => Err(LodestoneError::VerificationFailed(e)),
    }
}
