//! Auth provider whose accounts live in the local store.
//!
//! Used by single-user hosts such as the CLI, where there is no hosted auth
//! service but sign-in still has to prove knowledge of the password.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use quiz_core::model::UserId;
use storage::local::LocalStore;

use crate::auth_service::{AuthProvider, ProviderUser};
use crate::error::AuthProviderError;

/// Local storage key holding registered accounts and the current sign-in.
pub const ACCOUNTS_KEY: &str = "auth-accounts";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Account {
    id: UserId,
    password_hash: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Accounts {
    #[serde(default)]
    users: HashMap<String, Account>,
    #[serde(default)]
    current: Option<String>,
}

impl Accounts {
    fn user(&self, email: &str) -> Option<ProviderUser> {
        self.users.get(email).map(|account| ProviderUser {
            id: account.id,
            email: email.to_owned(),
        })
    }
}

#[derive(Clone)]
pub struct LocalAuthProvider {
    local: Arc<dyn LocalStore>,
    write_lock: Arc<Mutex<()>>,
}

impl LocalAuthProvider {
    #[must_use]
    pub fn new(local: Arc<dyn LocalStore>) -> Self {
        Self {
            local,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    fn read(&self) -> Result<Accounts, AuthProviderError> {
        match self.local.get_item(ACCOUNTS_KEY).map_err(unavailable)? {
            Some(raw) => serde_json::from_str(&raw).map_err(unavailable),
            None => Ok(Accounts::default()),
        }
    }

    fn update<T>(
        &self,
        f: impl FnOnce(&mut Accounts) -> Result<T, AuthProviderError>,
    ) -> Result<T, AuthProviderError> {
        let _guard = self.write_lock.lock().map_err(unavailable)?;
        let mut accounts = self.read()?;
        let out = f(&mut accounts)?;
        let raw = serde_json::to_string(&accounts).map_err(unavailable)?;
        self.local.set_item(ACCOUNTS_KEY, &raw).map_err(unavailable)?;
        Ok(out)
    }
}

fn unavailable(e: impl fmt::Display) -> AuthProviderError {
    AuthProviderError::Unavailable(e.to_string())
}

fn account_key(email: &str) -> String {
    email.trim().to_lowercase()
}

fn hash_password(password: &str) -> Result<String, AuthProviderError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(unavailable)?
        .to_string();
    Ok(hash)
}

/// A stored hash that no longer parses never matches.
fn verify_password(password: &str, password_hash: &str) -> bool {
    PasswordHash::new(password_hash).is_ok_and(|parsed| {
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    })
}

#[async_trait]
impl AuthProvider for LocalAuthProvider {
    async fn current_user(&self) -> Result<Option<ProviderUser>, AuthProviderError> {
        let accounts = self.read()?;
        Ok(accounts
            .current
            .as_deref()
            .and_then(|email| accounts.user(email)))
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<ProviderUser, AuthProviderError> {
        let key = account_key(email);
        self.update(|accounts| {
            let user = match accounts.users.get(&key) {
                Some(account) if verify_password(password, &account.password_hash) => {
                    ProviderUser {
                        id: account.id,
                        email: key.clone(),
                    }
                }
                _ => return Err(AuthProviderError::InvalidCredentials),
            };
            accounts.current = Some(key);
            Ok(user)
        })
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<ProviderUser, AuthProviderError> {
        let key = account_key(email);
        let password_hash = hash_password(password)?;
        self.update(|accounts| {
            if accounts.users.contains_key(&key) {
                return Err(AuthProviderError::AlreadyRegistered);
            }
            let id = UserId::random();
            accounts.users.insert(key.clone(), Account { id, password_hash });
            accounts.current = Some(key.clone());
            Ok(ProviderUser { id, email: key })
        })
    }

    async fn sign_out(&self) -> Result<(), AuthProviderError> {
        self.update(|accounts| {
            accounts.current = None;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::local::InMemoryLocalStore;

    fn provider() -> (LocalAuthProvider, Arc<dyn LocalStore>) {
        let local: Arc<dyn LocalStore> = Arc::new(InMemoryLocalStore::new());
        (LocalAuthProvider::new(Arc::clone(&local)), local)
    }

    #[tokio::test]
    async fn accounts_survive_a_new_provider() {
        let (first, local) = provider();
        let user = first.sign_up("Learner@SecQuiz.io", "hunter2").await.unwrap();
        assert_eq!(user.email, "learner@secquiz.io");

        let second = LocalAuthProvider::new(local);
        assert_eq!(second.current_user().await.unwrap(), Some(user.clone()));

        second.sign_out().await.unwrap();
        assert_eq!(second.current_user().await.unwrap(), None);
        assert_eq!(second.sign_in("learner@secquiz.io", "hunter2").await.unwrap(), user);
    }

    #[tokio::test]
    async fn sign_in_checks_the_password() {
        let (auth, local) = provider();
        auth.sign_up("a@b.c", "right").await.unwrap();
        auth.sign_out().await.unwrap();

        assert_eq!(
            auth.sign_in("a@b.c", "wrong").await,
            Err(AuthProviderError::InvalidCredentials)
        );
        assert_eq!(
            auth.sign_in("nobody@b.c", "right").await,
            Err(AuthProviderError::InvalidCredentials)
        );
        assert_eq!(auth.current_user().await.unwrap(), None);

        let raw = local.get_item(ACCOUNTS_KEY).unwrap().unwrap();
        assert!(!raw.contains("\"right\""));
    }

    #[tokio::test]
    async fn duplicate_sign_up_is_rejected() {
        let (auth, _) = provider();
        auth.sign_up("a@b.c", "pw").await.unwrap();
        assert_eq!(
            auth.sign_up(" A@B.C ", "other").await,
            Err(AuthProviderError::AlreadyRegistered)
        );
    }
}
