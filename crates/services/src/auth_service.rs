//! Client-side mirror of the auth provider's session.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::watch;

use quiz_core::model::{AuthEvent, AuthSession, PersistedAuth, Profile, SessionUser, UserId};
use storage::local::LocalStore;
use storage::repository::ProfileRepository;

use crate::error::{AuthError, AuthProviderError};

/// Local storage key holding the session snapshot.
pub const AUTH_KEY: &str = "auth-storage";

/// Identity as reported by the auth provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderUser {
    pub id: UserId,
    pub email: String,
}

/// Port to the hosted auth service.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn current_user(&self) -> Result<Option<ProviderUser>, AuthProviderError>;
    async fn sign_in(&self, email: &str, password: &str) -> Result<ProviderUser, AuthProviderError>;
    async fn sign_up(&self, email: &str, password: &str) -> Result<ProviderUser, AuthProviderError>;
    async fn sign_out(&self) -> Result<(), AuthProviderError>;
}

#[derive(Default)]
struct ProviderState {
    accounts: HashMap<String, (ProviderUser, String)>,
    current: Option<ProviderUser>,
}

/// Provider that keeps accounts in process memory. Used by tests and in-memory services.
#[derive(Clone, Default)]
pub struct InMemoryAuthProvider {
    state: Arc<Mutex<ProviderState>>,
}

impl InMemoryAuthProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<T>(
        &self,
        f: impl FnOnce(&mut ProviderState) -> Result<T, AuthProviderError>,
    ) -> Result<T, AuthProviderError> {
        let mut guard = self
            .state
            .lock()
            .map_err(|e| AuthProviderError::Unavailable(e.to_string()))?;
        f(&mut guard)
    }
}

#[async_trait]
impl AuthProvider for InMemoryAuthProvider {
    async fn current_user(&self) -> Result<Option<ProviderUser>, AuthProviderError> {
        self.with_state(|s| Ok(s.current.clone()))
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<ProviderUser, AuthProviderError> {
        let key = email.trim().to_lowercase();
        self.with_state(|s| {
            let user = match s.accounts.get(&key) {
                Some((user, stored)) if stored == password => user.clone(),
                _ => return Err(AuthProviderError::InvalidCredentials),
            };
            s.current = Some(user.clone());
            Ok(user)
        })
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<ProviderUser, AuthProviderError> {
        let key = email.trim().to_lowercase();
        self.with_state(|s| {
            if s.accounts.contains_key(&key) {
                return Err(AuthProviderError::AlreadyRegistered);
            }
            let user = ProviderUser {
                id: UserId::random(),
                email: key.clone(),
            };
            s.accounts.insert(key, (user.clone(), password.to_owned()));
            s.current = Some(user.clone());
            Ok(user)
        })
    }

    async fn sign_out(&self) -> Result<(), AuthProviderError> {
        self.with_state(|s| {
            s.current = None;
            Ok(())
        })
    }
}

/// Session store: provider session plus profile flags, published over a watch channel.
#[derive(Clone)]
pub struct AuthStore {
    provider: Arc<dyn AuthProvider>,
    profiles: Arc<dyn ProfileRepository>,
    local: Arc<dyn LocalStore>,
    tx: Arc<watch::Sender<AuthSession>>,
}

impl AuthStore {
    /// Create the store seeded from the persisted snapshot, if any.
    #[must_use]
    pub fn new(
        provider: Arc<dyn AuthProvider>,
        profiles: Arc<dyn ProfileRepository>,
        local: Arc<dyn LocalStore>,
    ) -> Self {
        let initial = load_snapshot(local.as_ref());
        let (tx, _rx) = watch::channel(initial);
        Self {
            provider,
            profiles,
            local,
            tx: Arc::new(tx),
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> AuthSession {
        self.tx.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AuthSession> {
        self.tx.subscribe()
    }

    /// Re-read the provider session and the matching profile.
    ///
    /// Provider errors clear the session instead of failing.
    ///
    /// # Errors
    ///
    /// Returns `AuthError` if the profile lookup fails.
    pub async fn rehydrate(&self) -> Result<AuthSession, AuthError> {
        let user = match self.provider.current_user().await {
            Ok(user) => user,
            Err(e) => {
                tracing::warn!(error = %e, "auth provider unavailable; clearing session");
                None
            }
        };
        let session = match user {
            Some(user) => AuthSession::signed_in(self.session_user(&user).await?),
            None => AuthSession::anonymous(),
        };
        self.publish(session.clone());
        Ok(session)
    }

    /// # Errors
    ///
    /// Returns `AuthError` for rejected credentials or profile lookup failures.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        let user = self.provider.sign_in(email, password).await?;
        let session = AuthSession::signed_in(self.session_user(&user).await?);
        tracing::info!(user_id = %user.id, "signed in");
        self.publish(session.clone());
        Ok(session)
    }

    /// Register with the provider and create a non-admin profile.
    ///
    /// # Errors
    ///
    /// Returns `AuthError` if the provider rejects the account or the profile
    /// cannot be stored.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        name: Option<String>,
    ) -> Result<AuthSession, AuthError> {
        let user = self.provider.sign_up(email, password).await?;
        let profile = Profile::new(user.id, &user.email, name)?;
        self.profiles.upsert_profile(&profile).await?;
        let session = AuthSession::signed_in(SessionUser::from_profile(&profile));
        tracing::info!(user_id = %user.id, "signed up");
        self.publish(session.clone());
        Ok(session)
    }

    /// Always clears the local session, even if the provider call fails.
    pub async fn sign_out(&self) -> AuthSession {
        if let Err(e) = self.provider.sign_out().await {
            tracing::warn!(error = %e, "provider sign-out failed; clearing local session anyway");
        }
        let session = AuthSession::anonymous();
        self.publish(session.clone());
        session
    }

    /// Apply a change notification from the provider.
    pub fn apply(&self, event: AuthEvent) -> AuthSession {
        let session = match event {
            AuthEvent::SignedIn(user) => AuthSession::signed_in(user),
            AuthEvent::SignedOut => AuthSession::anonymous(),
        };
        self.publish(session.clone());
        session
    }

    async fn session_user(&self, user: &ProviderUser) -> Result<SessionUser, AuthError> {
        match self.profiles.get_profile(user.id).await? {
            Some(profile) => Ok(SessionUser::from_profile(&profile)),
            None => Ok(SessionUser {
                id: user.id,
                email: user.email.clone(),
                name: None,
                is_admin: false,
            }),
        }
    }

    fn publish(&self, session: AuthSession) {
        persist_snapshot(self.local.as_ref(), &session);
        self.tx.send_replace(session);
    }
}

fn load_snapshot(local: &dyn LocalStore) -> AuthSession {
    match local.get_item(AUTH_KEY) {
        Ok(Some(raw)) => serde_json::from_str::<PersistedAuth>(&raw)
            .map(|p| p.state)
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "discarding corrupt auth snapshot");
                AuthSession::anonymous()
            }),
        Ok(None) => AuthSession::anonymous(),
        Err(e) => {
            tracing::warn!(error = %e, "failed to read auth snapshot");
            AuthSession::anonymous()
        }
    }
}

fn persist_snapshot(local: &dyn LocalStore, session: &AuthSession) {
    let persisted = PersistedAuth {
        state: session.clone(),
        version: 0,
    };
    match serde_json::to_string(&persisted) {
        Ok(raw) => {
            if let Err(e) = local.set_item(AUTH_KEY, &raw) {
                tracing::warn!(error = %e, "failed to persist auth snapshot");
            }
        }
        Err(e) => tracing::warn!(error = %e, "failed to encode auth snapshot"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local_auth::LocalAuthProvider;
    use storage::local::InMemoryLocalStore;
    use storage::repository::InMemoryRepository;

    struct BrokenProvider;

    #[async_trait]
    impl AuthProvider for BrokenProvider {
        async fn current_user(&self) -> Result<Option<ProviderUser>, AuthProviderError> {
            Err(AuthProviderError::Unavailable("offline".into()))
        }
        async fn sign_in(&self, _: &str, _: &str) -> Result<ProviderUser, AuthProviderError> {
            Err(AuthProviderError::Unavailable("offline".into()))
        }
        async fn sign_up(&self, _: &str, _: &str) -> Result<ProviderUser, AuthProviderError> {
            Err(AuthProviderError::Unavailable("offline".into()))
        }
        async fn sign_out(&self) -> Result<(), AuthProviderError> {
            Err(AuthProviderError::Unavailable("offline".into()))
        }
    }

    fn store_with(provider: Arc<dyn AuthProvider>) -> (AuthStore, Arc<dyn LocalStore>) {
        let local: Arc<dyn LocalStore> = Arc::new(InMemoryLocalStore::new());
        let store = AuthStore::new(
            provider,
            Arc::new(InMemoryRepository::new()),
            Arc::clone(&local),
        );
        (store, local)
    }

    #[tokio::test]
    async fn sign_up_creates_non_admin_profile_and_publishes() {
        let (store, local) = store_with(Arc::new(InMemoryAuthProvider::new()));
        let mut rx = store.subscribe();

        let session = store
            .sign_up("Learner@SecQuiz.io", "hunter2", Some("Ada".into()))
            .await
            .unwrap();
        assert!(session.is_authenticated());
        assert!(!session.is_admin());
        assert_eq!(session.user().unwrap().email, "learner@secquiz.io");

        rx.changed().await.unwrap();
        assert!(rx.borrow().is_authenticated());
        assert!(local.get_item(AUTH_KEY).unwrap().unwrap().contains("\"isAuthenticated\":true"));
    }

    #[tokio::test]
    async fn rehydrate_reads_profile_flags() {
        let provider = Arc::new(InMemoryAuthProvider::new());
        let (store, _) = store_with(provider.clone());
        store.sign_up("admin@secquiz.io", "pw", None).await.unwrap();
        let user_id = store.snapshot().user_id().unwrap();

        let mut profile = store.profiles.get_profile(user_id).await.unwrap().unwrap();
        profile.set_admin(true);
        store.profiles.upsert_profile(&profile).await.unwrap();

        let session = store.rehydrate().await.unwrap();
        assert!(session.is_admin());
    }

    #[tokio::test]
    async fn provider_errors_clear_the_session() {
        let (store, _) = store_with(Arc::new(BrokenProvider));
        store.apply(AuthEvent::SignedIn(SessionUser {
            id: UserId::random(),
            email: "a@b.c".into(),
            name: None,
            is_admin: false,
        }));
        assert!(store.snapshot().is_authenticated());

        let session = store.rehydrate().await.unwrap();
        assert!(!session.is_authenticated());

        store.apply(AuthEvent::SignedIn(SessionUser {
            id: UserId::random(),
            email: "a@b.c".into(),
            name: None,
            is_admin: false,
        }));
        assert!(!store.sign_out().await.is_authenticated());
    }

    #[tokio::test]
    async fn wrong_password_is_rejected() {
        let (store, _) = store_with(Arc::new(InMemoryAuthProvider::new()));
        store.sign_up("a@b.c", "right", None).await.unwrap();
        store.sign_out().await;
        let err = store.sign_in("a@b.c", "wrong").await.unwrap_err();
        assert!(matches!(
            err,
            AuthError::Provider(AuthProviderError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn local_accounts_need_the_password_after_restart() {
        let local: Arc<dyn LocalStore> = Arc::new(InMemoryLocalStore::new());
        let repo = Arc::new(InMemoryRepository::new());
        let first = AuthStore::new(
            Arc::new(LocalAuthProvider::new(Arc::clone(&local))),
            repo.clone(),
            Arc::clone(&local),
        );
        first.sign_up("admin@secquiz.io", "s3cret", None).await.unwrap();
        first.sign_out().await;

        let user_id = repo
            .find_profile_by_email("admin@secquiz.io")
            .await
            .unwrap()
            .unwrap()
            .id();
        let mut profile = repo.get_profile(user_id).await.unwrap().unwrap();
        profile.set_admin(true);
        repo.upsert_profile(&profile).await.unwrap();

        let second = AuthStore::new(
            Arc::new(LocalAuthProvider::new(Arc::clone(&local))),
            repo,
            local,
        );
        assert!(!second.rehydrate().await.unwrap().is_authenticated());
        assert!(matches!(
            second.sign_in("admin@secquiz.io", "guess").await,
            Err(AuthError::Provider(AuthProviderError::InvalidCredentials))
        ));
        let session = second.sign_in("admin@secquiz.io", "s3cret").await.unwrap();
        assert!(session.is_admin());
        assert_eq!(session.user_id(), Some(user_id));
    }

    #[tokio::test]
    async fn snapshot_is_restored_on_construction() {
        let local: Arc<dyn LocalStore> = Arc::new(InMemoryLocalStore::new());
        let repo = Arc::new(InMemoryRepository::new());
        let provider = Arc::new(InMemoryAuthProvider::new());
        let first = AuthStore::new(provider.clone(), repo.clone(), Arc::clone(&local));
        first.sign_up("a@b.c", "pw", None).await.unwrap();

        let second = AuthStore::new(provider, repo, local);
        assert!(second.snapshot().is_authenticated());
    }
}
