use serde::{Deserialize, Serialize};

use crate::model::ids::UserId;
use crate::model::profile::Profile;

/// The user subset mirrored from the auth provider and profile row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: UserId,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub is_admin: bool,
}

impl SessionUser {
    #[must_use]
    pub fn from_profile(profile: &Profile) -> Self {
        Self {
            id: profile.id(),
            email: profile.email().to_owned(),
            name: profile.name().map(str::to_owned),
            is_admin: profile.is_admin(),
        }
    }
}

/// Client-side mirror of the backend session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    is_authenticated: bool,
    is_admin: bool,
    user: Option<SessionUser>,
}

impl AuthSession {
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn signed_in(user: SessionUser) -> Self {
        Self {
            is_authenticated: true,
            is_admin: user.is_admin,
            user: Some(user),
        }
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.is_authenticated
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.is_admin
    }

    #[must_use]
    pub fn user(&self) -> Option<&SessionUser> {
        self.user.as_ref()
    }

    /// Id of the signed-in user, if any.
    #[must_use]
    pub fn user_id(&self) -> Option<UserId> {
        self.user.as_ref().filter(|_| self.is_authenticated).map(|u| u.id)
    }
}

/// Provider-side session change delivered to the session store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn(SessionUser),
    SignedOut,
}

/// Envelope the snapshot is persisted in, matching the browser store layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedAuth {
    pub state: AuthSession,
    #[serde(default)]
    pub version: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_has_no_user_id() {
        assert_eq!(AuthSession::anonymous().user_id(), None);
    }

    #[test]
    fn signed_in_mirrors_admin_flag() {
        let user = SessionUser {
            id: UserId::random(),
            email: "admin@secquiz.io".into(),
            name: None,
            is_admin: true,
        };
        let session = AuthSession::signed_in(user.clone());
        assert!(session.is_authenticated());
        assert!(session.is_admin());
        assert_eq!(session.user_id(), Some(user.id));
    }

    #[test]
    fn snapshot_uses_camel_case_keys() {
        let json = serde_json::to_value(PersistedAuth {
            state: AuthSession::anonymous(),
            version: 0,
        })
        .unwrap();
        assert_eq!(json["state"]["isAuthenticated"], serde_json::json!(false));
        assert!(json["state"]["user"].is_null());
    }
}
