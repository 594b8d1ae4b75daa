// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

//! Decides whether whoever is at the keyboard may use the application.

use std::{fmt, sync::Arc};

use log::{debug, info, warn};
use secrecy::{ExposeSecret as _, SecretString};
use tokio::sync::watch;

use crate::{
    allow_list::AllowList,
    backend::{Auth, AuthChange, Session, Subscription},
    error::{Error, Result, Validation},
    preference::RememberPreference,
    storage::Storage,
};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Denial {
    /// Valid credentials for an address that is not on the allow-list.
    InviteOnly,
    /// No backend is configured, so nobody can be admitted.
    Unconfigured,
}

impl fmt::Display for Denial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::InviteOnly => write!(f, "invite-only"),
            Self::Unconfigured => write!(f, "unconfigured"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum GateState {
    Initializing,
    LoggedOut,
    Denied(Denial),
    Authenticated(String),
}

impl fmt::Display for GateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initializing => write!(f, "checking access"),
            Self::LoggedOut => write!(f, "signed out"),
            Self::Denied(Denial::InviteOnly) => write!(f, "denied: this dashboard is invite-only"),
            Self::Denied(Denial::Unconfigured) => {
                write!(f, "denied: no backend is configured")
            }
            Self::Authenticated(email) => write!(f, "signed in as {email}"),
        }
    }
}

/// The result of judging a session report against the current state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Transition {
    pub(crate) state: GateState,
    /// The reported session must be revoked at the backend.
    pub(crate) revoke: bool,
}

/// Judges a report of the backend session, whether it came from a lookup or
/// an asynchronous notification.
///
/// A session is only ever admitted if its address is on the allow-list.
/// Losing the session signs out an authenticated user but leaves a denial in
/// place, so that the echo of our own revocation does not hide the reason.
pub(crate) fn transition(
    allow_list: &AllowList,
    current: &GateState,
    session: Option<&Session>,
) -> Transition {
    match session {
        Some(session) => match allow_list.admit(session.user.email.as_deref()) {
            Some(email) => Transition {
                state: GateState::Authenticated(email),
                revoke: false,
            },
            None => Transition {
                state: GateState::Denied(Denial::InviteOnly),
                revoke: true,
            },
        },
        None => Transition {
            state: match current {
                GateState::Initializing | GateState::Authenticated(_) => GateState::LoggedOut,
                GateState::LoggedOut | GateState::Denied(_) => current.clone(),
            },
            revoke: false,
        },
    }
}

pub(crate) struct AccessGate<A: Auth, S: Storage<RememberPreference>> {
    auth: Option<Arc<A>>,
    allow_list: AllowList,
    preference: S,
    tx: watch::Sender<GateState>,
    rx: watch::Receiver<GateState>,
    listener: Option<Subscription<AuthChange>>,
    sign_out_on_close: bool,
}

impl<A: Auth, S: Storage<RememberPreference>> AccessGate<A, S> {
    pub(crate) fn new(auth: Arc<A>, allow_list: AllowList, preference: S) -> Self {
        Self::with_auth(Some(auth), allow_list, preference)
    }

    /// A gate with no backend behind it. It denies everyone.
    pub(crate) fn unconfigured(allow_list: AllowList, preference: S) -> Self {
        Self::with_auth(None, allow_list, preference)
    }

    fn with_auth(auth: Option<Arc<A>>, allow_list: AllowList, preference: S) -> Self {
        let (tx, rx) = watch::channel(GateState::Initializing);
        Self {
            auth,
            allow_list,
            preference,
            tx,
            rx,
            listener: None,
            sign_out_on_close: false,
        }
    }

    pub(crate) fn state(&self) -> GateState {
        self.rx.borrow().clone()
    }

    pub(crate) fn watch(&self) -> watch::Receiver<GateState> {
        self.rx.clone()
    }

    fn publish(&self, state: GateState) -> GateState {
        if *self.rx.borrow() != state {
            info!("Access is now {}", state);
        }
        // Our own receiver keeps the channel open.
        let _ = self.tx.send(state.clone());
        state
    }

    async fn revoke(auth: &A) {
        if let Err(e) = auth.sign_out().await {
            warn!("Failed to revoke the backend session: {}", e);
        }
    }

    /// Judges a session report and revokes it if it must not stand.
    async fn judge(&self, auth: &A, current: &GateState, session: Option<&Session>) -> Transition {
        let outcome = transition(&self.allow_list, current, session);
        if outcome.revoke {
            warn!(
                "{} is not on the allow-list, revoking the session",
                session
                    .and_then(|session| session.user.email.as_deref())
                    .unwrap_or("A user with no email address")
            );
            Self::revoke(auth).await;
        }
        outcome
    }

    /// Notifications caused by our own calls to the backend carry nothing we
    /// do not already know.
    fn discard_echoes(&mut self) {
        if let Some(listener) = self.listener.as_mut() {
            while let Some(change) = listener.try_next() {
                debug!("Ignoring echo of our own {:?}", change.event);
            }
        }
    }

    async fn startup(&mut self, auth: &A) -> GateState {
        let preference = match self.preference.get().await {
            Ok(preference) => preference,
            Err(e) => {
                warn!("Failed to read the remember-me preference, not remembering: {}", e);
                Some(RememberPreference::new(false))
            }
        };
        if RememberPreference::forces_sign_out(preference) {
            info!("The previous session was not meant to be remembered, signing out");
            Self::revoke(auth).await;
            return GateState::LoggedOut;
        }

        match auth.session().await {
            Ok(session) => {
                self.judge(auth, &GateState::Initializing, session.as_ref())
                    .await
                    .state
            }
            Err(e) => {
                warn!("Failed to look up the current session, treating it as absent: {}", e);
                GateState::LoggedOut
            }
        }
    }

    /// Establishes the initial state.
    ///
    /// The listener is attached before the session is looked up. Anything it
    /// hears in the meantime is applied afterwards, in arrival order, so a
    /// slow lookup can never overwrite a newer notification.
    pub(crate) async fn initialize(&mut self) -> GateState {
        let Some(auth) = self.auth.clone() else {
            warn!("No backend is configured, so access is denied");
            return self.publish(GateState::Denied(Denial::Unconfigured));
        };

        let mut listener = auth.subscribe();
        let mut state = self.startup(&auth).await;
        while let Some(change) = listener.try_next() {
            debug!("Applying {:?} received during startup", change.event);
            state = self.judge(&auth, &state, change.session.as_ref()).await.state;
        }

        self.listener = Some(listener);
        self.publish(state)
    }

    /// Signs in with a password and returns the admitted address.
    ///
    /// The address must be on the allow-list before anyone is told that the
    /// sign-in worked. If it is not, the fresh session is revoked at once.
    pub(crate) async fn sign_in(
        &mut self,
        email: &str,
        password: &SecretString,
        remember: bool,
    ) -> Result<String> {
        let email = email.trim();
        if !email.contains('@') {
            return Err(Validation::Email.into());
        }
        if password.expose_secret().is_empty() {
            return Err(Validation::MissingField("password").into());
        }
        let auth = self
            .auth
            .clone()
            .ok_or(Error::AccessDenied(Denial::Unconfigured))?;

        let session = auth.sign_in_with_password(email, password).await?;
        let state = self.judge(&auth, &self.state(), Some(&session)).await.state;
        self.discard_echoes();

        let GateState::Authenticated(admitted) = state else {
            let _ = self.publish(state);
            return Err(Error::AccessDenied(Denial::InviteOnly));
        };

        if let Err(e) = self
            .preference
            .update(&RememberPreference::new(remember))
            .await
        {
            warn!("Failed to store the remember-me preference: {}", e);
        }
        self.sign_out_on_close = !remember;

        let _ = self.publish(GateState::Authenticated(admitted.clone()));
        Ok(admitted)
    }

    /// Ends the session. Signing out while signed out does nothing.
    pub(crate) async fn sign_out(&mut self) -> Result<()> {
        if self.state() == GateState::LoggedOut {
            debug!("Already signed out");
            return Ok(());
        }
        let Some(auth) = self.auth.clone() else {
            return Ok(());
        };

        self.sign_out_on_close = false;
        if let Err(e) = self.preference.clear().await {
            warn!("Failed to clear the remember-me preference: {}", e);
        }
        let result = auth.sign_out().await;
        self.discard_echoes();
        let _ = self.publish(GateState::LoggedOut);
        result
    }

    /// Judges a notification and publishes the outcome, revoking the session
    /// first if it must not stand.
    ///
    /// Not safe to cancel: a dropped call may leave a revocation unfinished.
    pub(crate) async fn apply(&mut self, change: &AuthChange) -> GateState {
        let Some(auth) = self.auth.clone() else {
            return self.state();
        };
        debug!("Session changed: {:?}", change.event);
        let outcome = self
            .judge(&auth, &self.state(), change.session.as_ref())
            .await;
        if outcome.revoke {
            self.sign_out_on_close = false;
            self.discard_echoes();
        }
        self.publish(outcome.state)
    }

    /// Waits for the next session notification without applying it. Returns
    /// `None` once notifications can no longer arrive.
    ///
    /// Safe to cancel: nothing is lost if the call is dropped before it
    /// completes.
    pub(crate) async fn receive(&mut self) -> Option<AuthChange> {
        self.listener.as_mut()?.next().await
    }

    /// Applies every notification that has already arrived.
    pub(crate) async fn process_pending(&mut self) -> GateState {
        while let Some(change) = self.listener.as_mut().and_then(Subscription::try_next) {
            let _ = self.apply(&change).await;
        }
        self.state()
    }

    /// Detaches from the backend. A session that was not meant to be
    /// remembered is signed out here, on a best-effort basis.
    pub(crate) async fn close(mut self) {
        if let Some(listener) = self.listener.take() {
            listener.unsubscribe();
        }
        if !self.sign_out_on_close {
            return;
        }
        if let Some(auth) = self.auth.as_ref() {
            debug!("Signing out of a session that is not remembered");
            Self::revoke(auth).await;
        }
    }
}
