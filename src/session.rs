use std::sync::{Arc, Mutex, MutexGuard};

use reqwest::Method;
use serde_json::{Value, json};
use tokio::sync::watch;

use crate::api::{ApiRequest, ApiResponse, LOGIN_PATH, PROFILE_PATH, Transport};
use crate::error::AuthError;
use crate::models::{AuthResponse, Credentials, Profile, Role, Session, SessionStatus};
use crate::registration::RegistrationForm;
use crate::storage::TokenStore;

struct SessionState {
    session: Option<Session>,
    /// Bumped on every login, registration and logout. Async work captures it
    /// at start and drops its result if it changed meanwhile.
    generation: u64,
}

impl SessionState {
    fn status(&self) -> SessionStatus {
        match &self.session {
            None => SessionStatus::Anonymous,
            Some(session) => match session.role() {
                Some(role) => SessionStatus::Authenticated(role),
                None => SessionStatus::Resolving,
            },
        }
    }
}

struct Inner {
    transport: Arc<dyn Transport>,
    store: Arc<dyn TokenStore>,
    state: Mutex<SessionState>,
    status: watch::Sender<SessionStatus>,
}

/// Owner of the current session. Cheap to clone; all clones share one session.
///
/// Tokens, the in-memory session and the bearer credential used for outgoing
/// requests are all changed under a single lock, so a request never goes out
/// with a token that has already been logged out.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl SessionManager {
    /// Pick up whatever tokens the store holds without contacting the server.
    ///
    /// A stored token leaves the manager in `Resolving` until
    /// [`SessionManager::refresh_profile`] settles, and until then
    /// [`SessionManager::wait_resolved`] (and so `RouteGuard::navigate`) does
    /// not return. Use [`SessionManager::start`] unless the caller runs the
    /// profile check itself.
    pub fn new(transport: Arc<dyn Transport>, store: Arc<dyn TokenStore>) -> Self {
        let stored = match store.load() {
            Ok(tokens) => tokens,
            Err(e) => {
                tracing::warn!("discarding unreadable token store: {e}");
                if let Err(e) = store.clear() {
                    tracing::warn!("failed to clear token store: {e}");
                }
                None
            }
        };

        let state = SessionState {
            session: stored.map(|tokens| Session::new(tokens, None)),
            generation: 0,
        };
        let (status, _) = watch::channel(state.status());

        Self {
            inner: Arc::new(Inner {
                transport,
                store,
                state: Mutex::new(state),
                status,
            }),
        }
    }

    /// `new` followed by the startup profile check.
    pub async fn start(transport: Arc<dyn Transport>, store: Arc<dyn TokenStore>) -> Self {
        let manager = Self::new(transport, store);
        manager.refresh_profile().await;
        manager
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn publish(&self, state: &SessionState) {
        self.inner.status.send_replace(state.status());
    }

    /* -------------------------
       Observers
    --------------------------*/

    pub fn status(&self) -> SessionStatus {
        self.lock().status()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.inner.status.subscribe()
    }

    /// Waits until the startup check has settled, then reports the status.
    /// Pending forever on a manager built with `new` whose stored token is
    /// never checked.
    pub async fn wait_resolved(&self) -> SessionStatus {
        let mut rx = self.subscribe();
        let status = match rx.wait_for(|s| s.is_resolved()).await {
            Ok(status) => *status,
            Err(_) => self.status(),
        };
        status
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.status(), SessionStatus::Authenticated(_))
    }

    pub fn role(&self) -> Option<Role> {
        self.status().role()
    }

    pub fn session(&self) -> Option<Session> {
        self.lock().session.clone()
    }

    pub fn profile(&self) -> Option<Profile> {
        self.lock().session.as_ref().and_then(|s| s.profile.clone())
    }

    /// `Authorization` header value currently attached to outgoing requests.
    pub fn authorization_header(&self) -> Option<String> {
        self.lock()
            .session
            .as_ref()
            .map(|s| format!("Bearer {}", s.tokens.access))
    }

    /* -------------------------
       Operations
    --------------------------*/

    pub async fn login(&self, credentials: &Credentials) -> Result<Session, AuthError> {
        let request = ApiRequest::post(
            LOGIN_PATH,
            json!({ "username": credentials.username, "password": credentials.password }),
        );
        let resp = self.send(request).await?;

        if resp.is_success() {
            let auth = parse_auth(resp)?;
            return self.establish(auth);
        }

        tracing::info!(username = %credentials.username, status = resp.status, "login rejected");
        if resp.is_client_error() {
            Err(AuthError::Credential(
                resp.body.unwrap_or_else(|| json!({ "detail": "Login failed" })),
            ))
        } else {
            Err(server_error(&resp))
        }
    }

    pub async fn register(&self, form: &RegistrationForm, role: Role) -> Result<Session, AuthError> {
        form.validate(role)?;
        let path = role.registration_path().ok_or_else(|| {
            AuthError::validation(json!({ "user_type": [format!("cannot register as {role}")] }))
        })?;

        let resp = self.send(ApiRequest::post(path, form.payload(role))).await?;

        if resp.is_success() {
            let auth = parse_auth(resp)?;
            return self.establish(auth);
        }

        tracing::info!(username = %form.username, %role, status = resp.status, "registration rejected");
        if resp.is_client_error() {
            Err(AuthError::validation(
                resp.body
                    .unwrap_or_else(|| json!({ "detail": "Registration failed" })),
            ))
        } else {
            Err(server_error(&resp))
        }
    }

    /// Drop the session and both stored tokens. Safe to call in any state.
    pub fn logout(&self) {
        let mut state = self.lock();
        self.clear_locked(&mut state);
    }

    /// Verify the current token by fetching the profile. Any failure ends the
    /// session; a result that arrives after the session changed is ignored.
    pub async fn refresh_profile(&self) {
        let (generation, token) = {
            let state = self.lock();
            match state.session.as_ref() {
                Some(session) => (state.generation, session.tokens.access.clone()),
                None => {
                    self.publish(&state);
                    return;
                }
            }
        };

        let result = self
            .send(ApiRequest::get(PROFILE_PATH).bearer(Some(token)))
            .await
            .and_then(parse_profile);

        let mut state = self.lock();
        if state.generation != generation {
            tracing::debug!("discarding stale profile response");
            return;
        }

        match result {
            Ok(profile) => {
                tracing::info!(
                    username = %profile.user.username,
                    role = %profile.role(),
                    "session restored"
                );
                if let Some(session) = state.session.as_mut() {
                    session.profile = Some(profile);
                }
                self.publish(&state);
            }
            Err(e) => {
                tracing::warn!("profile fetch failed, signing out: {e}");
                self.clear_locked(&mut state);
            }
        }
    }

    /// Any backend call made on behalf of the signed-in user. A 401 means the
    /// token is no longer accepted: the session is dropped.
    pub async fn send_authorized(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<ApiResponse, AuthError> {
        let (generation, bearer) = {
            let state = self.lock();
            (
                state.generation,
                state.session.as_ref().map(|s| s.tokens.access.clone()),
            )
        };

        let mut request = ApiRequest::new(method, path).bearer(bearer);
        request.body = body;
        let resp = self.send(request).await?;

        if resp.status == 401 {
            let mut state = self.lock();
            if state.generation == generation && state.session.is_some() {
                tracing::warn!(path, "token rejected, signing out");
                self.clear_locked(&mut state);
            }
            return Err(AuthError::SessionInvalid);
        }
        Ok(resp)
    }

    /* -------------------------
       Internals
    --------------------------*/

    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, AuthError> {
        self.inner
            .transport
            .send(request)
            .await
            .map_err(|e| AuthError::Network(e.to_string()))
    }

    fn establish(&self, auth: AuthResponse) -> Result<Session, AuthError> {
        let mut state = self.lock();

        // TokenStore::save writes both entries or neither
        self.inner.store.save(&auth.tokens).map_err(|e| {
            tracing::warn!("failed to persist tokens: {e}");
            AuthError::Storage(e.to_string())
        })?;

        let session = Session::new(auth.tokens, Some(auth.profile));
        state.generation += 1;
        state.session = Some(session.clone());
        self.publish(&state);

        if let Some(profile) = session.profile.as_ref() {
            tracing::info!(
                username = %profile.user.username,
                role = %profile.role(),
                session_id = %session.id,
                "signed in"
            );
        }
        Ok(session)
    }

    fn clear_locked(&self, state: &mut SessionState) {
        state.generation += 1;
        let previous = state.session.take();
        if let Err(e) = self.inner.store.clear() {
            tracing::warn!("failed to clear token store: {e}");
        }
        self.publish(state);
        if let Some(session) = previous {
            tracing::info!(session_id = %session.id, "signed out");
        }
    }
}

fn parse_auth(resp: ApiResponse) -> Result<AuthResponse, AuthError> {
    let body = resp
        .body
        .ok_or_else(|| AuthError::Network("empty response body".into()))?;
    serde_json::from_value(body).map_err(|e| AuthError::Network(format!("unexpected response: {e}")))
}

fn parse_profile(resp: ApiResponse) -> Result<Profile, AuthError> {
    if resp.status == 401 || resp.status == 403 {
        return Err(AuthError::SessionInvalid);
    }
    if !resp.is_success() {
        return Err(server_error(&resp));
    }
    let body = resp
        .body
        .ok_or_else(|| AuthError::Network("empty profile body".into()))?;
    serde_json::from_value(body).map_err(|e| AuthError::Network(format!("unexpected profile: {e}")))
}

fn server_error(resp: &ApiResponse) -> AuthError {
    AuthError::Network(format!("server responded with status {}", resp.status))
}
