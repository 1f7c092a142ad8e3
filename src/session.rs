//! The signed in user and their token.
//!
//! The session survives restarts: it is saved after every log in and removed
//! on log out.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

use crate::{
    Error,
    api::{AuthResponse, FinanceApi},
    http::HttpClient,
    notification::{Notification, Notifier},
    persistence::{SESSION_KEY, StateStorage, load_snapshot, remove_snapshot, save_snapshot},
    request_sequence::LoadingCounter,
    user::{AuthToken, User},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Session {
    user: User,
    token: AuthToken,
}

#[derive(Debug, Default)]
struct SessionState {
    session: Option<Session>,
    error: Option<Error>,
}

/// Logs the user in and out and holds their credentials.
pub struct SessionStore<C> {
    api: FinanceApi<C>,
    state: Mutex<SessionState>,
    loading: LoadingCounter,
    notifier: Arc<dyn Notifier>,
    storage: Arc<dyn StateStorage>,
}

impl<C: HttpClient> SessionStore<C> {
    /// Create a store, restoring the session saved in `storage` if there is one.
    pub fn new(
        api: FinanceApi<C>,
        notifier: Arc<dyn Notifier>,
        storage: Arc<dyn StateStorage>,
    ) -> Self {
        let session: Option<Session> = load_snapshot(storage.as_ref(), SESSION_KEY);

        if let Some(session) = &session {
            tracing::debug!("Restored session for \"{}\".", session.user.username);
        }

        Self {
            api,
            state: Mutex::new(SessionState {
                session,
                error: None,
            }),
            loading: LoadingCounter::default(),
            notifier,
            storage,
        }
    }

    /// The signed in user.
    pub fn user(&self) -> Option<User> {
        self.state()
            .session
            .as_ref()
            .map(|session| session.user.clone())
    }

    /// The token for authenticated requests.
    pub fn token(&self) -> Option<AuthToken> {
        self.state()
            .session
            .as_ref()
            .map(|session| session.token.clone())
    }

    /// Whether a user is signed in.
    pub fn is_authenticated(&self) -> bool {
        self.state().session.is_some()
    }

    /// Whether a log in or registration is in flight.
    pub fn is_loading(&self) -> bool {
        self.loading.is_loading()
    }

    /// The error from the last action, cleared when the next action starts.
    pub fn error(&self) -> Option<Error> {
        self.state().error.clone()
    }

    /// Log in with a username and password.
    ///
    /// On failure the error carries the server's message, e.g. "Unable to log
    /// in with provided credentials.", and any existing session is kept.
    pub async fn login(&self, username: &str, password: &str) -> Result<User, Error> {
        let _loading = self.loading.start();
        self.state().error = None;

        let result = self.api.log_in(username, password).await;

        self.establish(result, "Logged in successfully")
    }

    /// Create an account and log in as the new user.
    ///
    /// # Errors
    /// Returns [Error::PasswordMismatch] without contacting the API if
    /// `password` and `confirm_password` differ.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
        confirm_password: &str,
    ) -> Result<User, Error> {
        let _loading = self.loading.start();
        self.state().error = None;

        let result = if password != confirm_password {
            Err(Error::PasswordMismatch)
        } else {
            self.api
                .register(username, email, password, confirm_password)
                .await
        };

        self.establish(result, "Account created successfully")
    }

    /// Forget the user and their token. No request is sent.
    pub fn logout(&self) {
        {
            let mut state = self.state();
            state.session = None;
            state.error = None;
        }

        remove_snapshot(self.storage.as_ref(), SESSION_KEY);
        tracing::debug!("Logged out.");
        self.notifier.notify(Notification::success("Logged out"));
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn establish(
        &self,
        result: Result<AuthResponse, Error>,
        success_message: &str,
    ) -> Result<User, Error> {
        match result {
            Ok(AuthResponse { token, user }) => {
                let session = Session {
                    user: user.clone(),
                    token,
                };
                save_snapshot(self.storage.as_ref(), SESSION_KEY, &session);
                self.state().session = Some(session);

                tracing::debug!("Signed in as \"{}\".", user.username);
                self.notifier.notify(Notification::success(success_message));

                Ok(user)
            }
            Err(error) => {
                tracing::warn!("Could not sign in: {error}");
                self.state().error = Some(error.clone());
                self.notifier.notify(Notification::error(error.to_string()));

                Err(error)
            }
        }
    }
}
