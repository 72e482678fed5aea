//! Identity provider seam, shared session state and the in-memory provider.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use chrono::Utc;
use dash_core::error::{DashError, Result};
use dash_core::models::{Session, User};
use dash_core::settings::app_dir;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::store::BoxFuture;

/// Auth state transitions, delivered to every subscriber.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthEvent {
    SignedIn(User),
    SignedOut,
}

/// Account management against the hosted identity service.
pub trait IdentityProvider: Send + Sync {
    /// Register an account. Signs in immediately when the service returns a
    /// session; otherwise the account awaits email confirmation.
    fn sign_up<'a>(&'a self, email: &'a str, password: &'a str) -> BoxFuture<'a, Result<User>>;

    fn sign_in_with_password<'a>(
        &'a self,
        email: &'a str,
        password: &'a str,
    ) -> BoxFuture<'a, Result<Session>>;

    fn sign_out(&self) -> BoxFuture<'_, Result<()>>;

    /// The signed-in user, or `None`.
    fn current_user(&self) -> BoxFuture<'_, Result<Option<User>>>;

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;
}

// ── SessionFile ───────────────────────────────────────────────────────────────

/// The signed-in session persisted between runs.
#[derive(Debug, Clone)]
pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    /// `~/.finance-dash/session.json`.
    pub fn default_location() -> Self {
        Self::at(app_dir().join("session.json"))
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `None` when the file is absent or unreadable.
    pub fn load(&self) -> Option<Session> {
        let content = std::fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str(&content) {
            Ok(session) => Some(session),
            Err(e) => {
                warn!("Ignoring unreadable session file {}: {}", self.path.display(), e);
                None
            }
        }
    }

    /// Atomically write `session`, creating parent directories.
    pub fn save(&self, session: &Session) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(session)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}

// ── SessionState ──────────────────────────────────────────────────────────────

/// Session shared by an identity provider and the stores that need the
/// user's access token. Changes are persisted and broadcast.
#[derive(Debug)]
pub struct SessionState {
    current: RwLock<Option<Session>>,
    events: broadcast::Sender<AuthEvent>,
    file: Option<SessionFile>,
}

impl SessionState {
    /// State that lives only as long as the process.
    pub fn ephemeral() -> Arc<Self> {
        Arc::new(Self::build(None, None))
    }

    /// State restored from, and saved to, `file`. An expired saved session
    /// is discarded.
    pub fn persistent(file: SessionFile) -> Arc<Self> {
        let restored = file.load().filter(|s| {
            let live = !s.is_expired(Utc::now());
            if !live {
                debug!("Saved session has expired");
            }
            live
        });
        Arc::new(Self::build(restored, Some(file)))
    }

    fn build(current: Option<Session>, file: Option<SessionFile>) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            current: RwLock::new(current),
            events,
            file,
        }
    }

    pub fn get(&self) -> Option<Session> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn access_token(&self) -> Option<String> {
        self.get().map(|s| s.access_token)
    }

    /// Install `session`, persist it and announce [`AuthEvent::SignedIn`].
    pub fn set(&self, session: Session) -> Result<()> {
        if let Some(file) = &self.file {
            file.save(&session)?;
        }
        let user = session.user.clone();
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = Some(session);
        info!(user = %user.id, "Signed in");
        let _ = self.events.send(AuthEvent::SignedIn(user));
        Ok(())
    }

    /// Drop the session, remove the saved copy and announce
    /// [`AuthEvent::SignedOut`].
    pub fn clear(&self) -> Result<()> {
        if let Some(file) = &self.file {
            file.clear()?;
        }
        let had_session = self
            .current
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .is_some();
        if had_session {
            info!("Signed out");
        }
        let _ = self.events.send(AuthEvent::SignedOut);
        Ok(())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}

// ── MemoryIdentity ────────────────────────────────────────────────────────────

struct Account {
    password: String,
    user: User,
}

/// Process-local identity provider for offline mode and tests. Accounts are
/// confirmed on sign-up.
pub struct MemoryIdentity {
    accounts: Mutex<HashMap<String, Account>>,
    state: Arc<SessionState>,
    counter: AtomicU64,
}

impl MemoryIdentity {
    pub fn new(state: Arc<SessionState>) -> Self {
        Self {
            accounts: Mutex::new(HashMap::new()),
            state,
            counter: AtomicU64::new(1),
        }
    }

    pub fn session_state(&self) -> Arc<SessionState> {
        Arc::clone(&self.state)
    }

    fn issue_session(&self, user: User) -> Session {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        Session {
            access_token: format!("memory-token-{}", n),
            refresh_token: None,
            expires_at: None,
            user,
        }
    }
}

impl IdentityProvider for MemoryIdentity {
    fn sign_up<'a>(&'a self, email: &'a str, password: &'a str) -> BoxFuture<'a, Result<User>> {
        Box::pin(async move {
            let user = {
                let mut accounts = self.accounts.lock().unwrap_or_else(|e| e.into_inner());
                if accounts.contains_key(email) {
                    return Err(DashError::Auth("User already registered".to_string()));
                }
                let n = self.counter.fetch_add(1, Ordering::SeqCst);
                let user = User {
                    id: format!("user-{}", n),
                    email: Some(email.to_string()),
                };
                accounts.insert(
                    email.to_string(),
                    Account {
                        password: password.to_string(),
                        user: user.clone(),
                    },
                );
                user
            };
            self.state.set(self.issue_session(user.clone()))?;
            Ok(user)
        })
    }

    fn sign_in_with_password<'a>(
        &'a self,
        email: &'a str,
        password: &'a str,
    ) -> BoxFuture<'a, Result<Session>> {
        Box::pin(async move {
            let user = {
                let accounts = self.accounts.lock().unwrap_or_else(|e| e.into_inner());
                match accounts.get(email) {
                    Some(account) if account.password == password => account.user.clone(),
                    _ => return Err(DashError::Auth("Invalid login credentials".to_string())),
                }
            };
            let session = self.issue_session(user);
            self.state.set(session.clone())?;
            Ok(session)
        })
    }

    fn sign_out(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move { self.state.clear() })
    }

    fn current_user(&self) -> BoxFuture<'_, Result<Option<User>>> {
        Box::pin(async move { Ok(self.state.get().map(|s| s.user)) })
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.state.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn session(token: &str, expires_at: Option<i64>) -> Session {
        Session {
            access_token: token.to_string(),
            refresh_token: Some("refresh".to_string()),
            expires_at,
            user: User {
                id: "u1".to_string(),
                email: Some("a@b.c".to_string()),
            },
        }
    }

    #[test]
    fn test_session_file_round_trip_and_clear() {
        let tmp = TempDir::new().unwrap();
        let file = SessionFile::at(tmp.path().join(".finance-dash").join("session.json"));

        assert!(file.load().is_none());
        file.save(&session("tok", None)).unwrap();
        assert_eq!(file.load().unwrap().access_token, "tok");

        file.clear().unwrap();
        assert!(file.load().is_none());
    }

    #[test]
    fn test_persistent_state_restores_live_session() {
        let tmp = TempDir::new().unwrap();
        let file = SessionFile::at(tmp.path().join("session.json"));
        file.save(&session("tok", None)).unwrap();

        let state = SessionState::persistent(file);
        assert_eq!(state.access_token().as_deref(), Some("tok"));
    }

    #[test]
    fn test_persistent_state_drops_expired_session() {
        let tmp = TempDir::new().unwrap();
        let file = SessionFile::at(tmp.path().join("session.json"));
        file.save(&session("old", Some(1))).unwrap();

        let state = SessionState::persistent(file);
        assert!(state.get().is_none());
    }

    #[test]
    fn test_state_set_and_clear_update_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("session.json");
        let state = SessionState::persistent(SessionFile::at(&path));

        state.set(session("tok", None)).unwrap();
        assert!(path.exists());

        state.clear().unwrap();
        assert!(!path.exists());
        assert!(state.get().is_none());
    }

    #[tokio::test]
    async fn test_memory_identity_sign_up_signs_in() {
        let identity = MemoryIdentity::new(SessionState::ephemeral());
        let mut events = identity.subscribe();

        let user = identity.sign_up("ada@example.com", "pw").await.unwrap();
        assert_eq!(user.email.as_deref(), Some("ada@example.com"));
        assert_eq!(identity.current_user().await.unwrap(), Some(user.clone()));
        assert_eq!(events.recv().await.unwrap(), AuthEvent::SignedIn(user));
    }

    #[tokio::test]
    async fn test_memory_identity_duplicate_sign_up() {
        let identity = MemoryIdentity::new(SessionState::ephemeral());
        identity.sign_up("a@b.c", "pw").await.unwrap();
        let err = identity.sign_up("a@b.c", "pw").await.unwrap_err();
        assert_eq!(err.to_string(), "Authentication error: User already registered");
    }

    #[tokio::test]
    async fn test_memory_identity_sign_in_and_out() {
        let identity = MemoryIdentity::new(SessionState::ephemeral());
        identity.sign_up("a@b.c", "pw").await.unwrap();
        identity.sign_out().await.unwrap();
        assert!(identity.current_user().await.unwrap().is_none());

        let bad = identity.sign_in_with_password("a@b.c", "nope").await.unwrap_err();
        assert!(matches!(bad, DashError::Auth(_)));

        let mut events = identity.subscribe();
        let session = identity.sign_in_with_password("a@b.c", "pw").await.unwrap();
        assert!(session.access_token.starts_with("memory-token-"));
        assert!(matches!(events.recv().await.unwrap(), AuthEvent::SignedIn(_)));

        identity.sign_out().await.unwrap();
        assert_eq!(events.recv().await.unwrap(), AuthEvent::SignedOut);
    }
}
