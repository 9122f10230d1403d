//! Identity provider seam.
//!
//! The core never manages credentials; it only reads the currently bound
//! identity. Sign-in and sign-out transitions are pushed in by the outer
//! application and observed through a watch channel.

use boardsync_engine::OwnerId;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// The identity bound to a signed-in principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub uid: OwnerId,
    pub email: String,
}

impl Session {
    pub fn new(uid: impl Into<OwnerId>, email: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            email: email.into(),
        }
    }
}

/// Holds the current authentication state.
///
/// `None` means signed out. The access layer reads [`current`], the outer
/// application drives [`sign_in`]/[`sign_out`].
///
/// [`current`]: IdentityProvider::current
/// [`sign_in`]: IdentityProvider::sign_in
/// [`sign_out`]: IdentityProvider::sign_out
#[derive(Debug)]
pub struct IdentityProvider {
    state: watch::Sender<Option<Session>>,
}

impl Default for IdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityProvider {
    /// Start signed out.
    pub fn new() -> Self {
        let (state, _) = watch::channel(None);
        Self { state }
    }

    /// Start with `session` already bound. Convenient for tests and
    /// restored sessions.
    pub fn signed_in(session: Session) -> Self {
        let (state, _) = watch::channel(Some(session));
        Self { state }
    }

    /// Bind an identity.
    pub fn sign_in(&self, uid: impl Into<OwnerId>, email: impl Into<String>) {
        let session = Session::new(uid, email);
        tracing::info!(uid = %session.uid, "identity bound");
        self.state.send_replace(Some(session));
    }

    /// Drop the bound identity.
    pub fn sign_out(&self) {
        tracing::info!("identity unbound");
        self.state.send_replace(None);
    }

    /// The currently bound identity, if any.
    pub fn current(&self) -> Option<Session> {
        self.state.borrow().clone()
    }

    /// Observe authentication state transitions.
    pub fn changes(&self) -> watch::Receiver<Option<Session>> {
        self.state.subscribe()
    }
}
