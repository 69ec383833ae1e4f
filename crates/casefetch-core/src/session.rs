//! Session re-authentication and the process-wide token cache.
//!
//! [`SessionManager`] sits in front of a [`CredentialStore`] and a
//! [`SessionRefresher`]. Tokens are assumed valid until a request proves
//! otherwise; there is no local expiry check.
//!
//! Refreshes are single-flight: callers that observed the same stale token
//! queue behind one another, and only the first one drives a login. The rest
//! pick up the token it produced, or its error if the login failed.

use std::fmt;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use crate::credential::{Credential, CredentialStore};
use crate::error::AuthenticationError;

/// Obtains a brand-new session credential out-of-band.
#[async_trait]
pub trait SessionRefresher: Send + Sync {
    /// Runs a full login and returns the resulting credential.
    async fn refresh(&self) -> Result<Credential, AuthenticationError>;
}

/// Account identifier and secret used by the login flow.
#[derive(Clone)]
pub struct AccountSecrets {
    pub email: String,
    pub password: String,
}

impl AccountSecrets {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    /// Reads `EMAIL` and `PASSWORD` from the environment.
    pub fn from_env() -> Result<Self, AuthenticationError> {
        let email = std::env::var("EMAIL")
            .ok()
            .filter(|v| !v.is_empty())
            .ok_or(AuthenticationError::MissingSecret("EMAIL"))?;
        let password = std::env::var("PASSWORD")
            .ok()
            .filter(|v| !v.is_empty())
            .ok_or(AuthenticationError::MissingSecret("PASSWORD"))?;
        Ok(Self { email, password })
    }
}

impl fmt::Debug for AccountSecrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountSecrets")
            .field("email", &self.email)
            .field("password", &"***")
            .finish()
    }
}

/// Runs an external login helper (typically a headless browser script).
///
/// The helper receives the account secrets as `EMAIL` and `PASSWORD`
/// environment variables and must print the session token on stdout, either
/// bare or as `{"token": "..."}`. It is killed if it outlives the timeout.
///
/// Without explicit secrets, they are read from the environment when a
/// login is actually needed.
#[derive(Debug, Clone)]
pub struct CommandRefresher {
    program: String,
    args: Vec<String>,
    secrets: Option<AccountSecrets>,
    timeout: Duration,
}

impl CommandRefresher {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            secrets: None,
            timeout: Duration::from_secs(60),
        }
    }

    #[must_use]
    pub fn with_secrets(mut self, secrets: AccountSecrets) -> Self {
        self.secrets = Some(secrets);
        self
    }

    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl SessionRefresher for CommandRefresher {
    async fn refresh(&self) -> Result<Credential, AuthenticationError> {
        let secrets = match &self.secrets {
            Some(secrets) => secrets.clone(),
            None => AccountSecrets::from_env()?,
        };
        tracing::info!(program = %self.program, "Starting portal login");

        let child = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .env("EMAIL", &secrets.email)
            .env("PASSWORD", &secrets.password)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| AuthenticationError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| AuthenticationError::Timeout(self.timeout))?
            .map_err(|source| AuthenticationError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(AuthenticationError::LoginFailed {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let credential = parse_login_output(&String::from_utf8_lossy(&output.stdout))?;
        tracing::info!("Portal login completed");
        Ok(credential)
    }
}

/// Extracts the token from login helper output.
fn parse_login_output(stdout: &str) -> Result<Credential, AuthenticationError> {
    let trimmed = stdout.trim();
    if trimmed.starts_with('{') {
        return serde_json::from_str::<Credential>(trimmed)
            .ok()
            .filter(|c| !c.is_empty())
            .ok_or(AuthenticationError::EmptyToken);
    }
    trimmed
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(Credential::new)
        .ok_or(AuthenticationError::EmptyToken)
}

/// Outcome of the most recent login attempt, guarded by the refresh lock.
#[derive(Default)]
struct RefreshState {
    last_failure: Option<Arc<AuthenticationError>>,
}

/// Owner of the process-wide credential.
pub struct SessionManager {
    store: Arc<dyn CredentialStore>,
    refresher: Arc<dyn SessionRefresher>,
    current: RwLock<Option<Credential>>,
    refresh_lock: Mutex<RefreshState>,
    /// Bumped after every login attempt, successful or not.
    generation: AtomicU64,
    refreshes: AtomicUsize,
}

impl SessionManager {
    pub fn new(store: Arc<dyn CredentialStore>, refresher: Arc<dyn SessionRefresher>) -> Self {
        Self {
            store,
            refresher,
            current: RwLock::new(None),
            refresh_lock: Mutex::new(RefreshState::default()),
            generation: AtomicU64::new(0),
            refreshes: AtomicUsize::new(0),
        }
    }

    /// Returns the current token, logging in if none is cached or stored.
    pub async fn token(&self) -> Result<String, AuthenticationError> {
        if let Some(credential) = self.current.read().await.as_ref() {
            tracing::trace!("Session cache hit");
            return Ok(credential.token.clone());
        }

        if let Some(credential) = self.store.load() {
            tracing::debug!("Loaded stored session credential");
            let token = credential.token.clone();
            *self.current.write().await = Some(credential);
            return Ok(token);
        }

        tracing::debug!("No stored session credential");
        self.refresh_after(None).await
    }

    /// Replaces `stale` with a fresh token.
    ///
    /// If another caller already replaced `stale` while this one waited, its
    /// token is returned and no second login happens. Login failures are
    /// returned as [`AuthenticationError::Shared`], and callers that queued
    /// behind a failed login get the same error without another attempt.
    pub async fn refresh_after(&self, stale: Option<&str>) -> Result<String, AuthenticationError> {
        let observed = self.generation.load(Ordering::SeqCst);
        let mut state = self.refresh_lock.lock().await;

        if let Some(credential) = self.current.read().await.as_ref()
            && Some(credential.token()) != stale
        {
            tracing::debug!("Session already refreshed by a concurrent request");
            return Ok(credential.token.clone());
        }

        if self.generation.load(Ordering::SeqCst) != observed
            && let Some(failure) = &state.last_failure
        {
            tracing::debug!("Concurrent login failed, not retrying");
            return Err(AuthenticationError::Shared(failure.clone()));
        }

        tracing::info!("Refreshing portal session");
        let outcome = match self.refresher.refresh().await {
            Ok(credential) if credential.is_empty() => Err(AuthenticationError::EmptyToken),
            other => other,
        };
        self.generation.fetch_add(1, Ordering::SeqCst);

        let credential = match outcome {
            Ok(credential) => {
                state.last_failure = None;
                credential
            }
            Err(e) => {
                tracing::warn!("Portal login failed: {}", e);
                let failure = Arc::new(e);
                state.last_failure = Some(failure.clone());
                return Err(AuthenticationError::Shared(failure));
            }
        };

        if let Err(e) = self.store.save(&credential) {
            tracing::warn!("Failed to persist refreshed credential: {}", e);
        }

        let token = credential.token.clone();
        *self.current.write().await = Some(credential);
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        Ok(token)
    }

    /// Logs in again regardless of the cached token.
    pub async fn force_refresh(&self) -> Result<String, AuthenticationError> {
        let stale = self.current.read().await.as_ref().map(|c| c.token.clone());
        self.refresh_after(stale.as_deref()).await
    }

    /// The credential in use, or the stored one if none is cached yet.
    pub async fn current(&self) -> Option<Credential> {
        if let Some(credential) = self.current.read().await.clone() {
            return Some(credential);
        }
        self.store.load()
    }

    /// Drops the cached credential and removes the persisted one.
    ///
    /// Returns `false` if nothing was persisted.
    pub async fn sign_out(&self) -> Result<bool, crate::error::CredentialStoreError> {
        *self.current.write().await = None;
        self.store.clear()
    }

    /// Number of logins performed by this manager.
    pub fn refresh_count(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("refreshes", &self.refresh_count())
            .finish_non_exhaustive()
    }
}
