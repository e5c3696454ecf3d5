use std::sync::Arc;

use quiz_core::Clock;
use quiz_core::model::{
    APP_SETTINGS_KEY, AuthSession, FREE_QUESTIONS_LIMIT_KEY, FreemiumSettings,
    FreemiumSettingsDraft, QuestionCounter, SettingEntry, UserId, enabled_from_value,
    limit_from_value,
};
use storage::local::LocalStore;
use storage::repository::{ProfileRepository, SettingsRepository};

use crate::counter_service::QuestionCounterStore;
use crate::error::SettingsServiceError;

/// Local storage key mirroring the freemium toggle.
pub const FREEMIUM_KEY: &str = "freemium-enabled";

/// Backend value wins, then the local mirror (anything but `"false"` is on), then on.
#[must_use]
pub fn resolve_enabled(backend: Option<bool>, local: Option<&str>) -> bool {
    backend.unwrap_or_else(|| local.is_none_or(|raw| raw != "false"))
}

/// Values actually present in the settings table.
#[derive(Debug, Clone, Copy, Default)]
struct StoredSettings {
    limit: Option<u32>,
    enabled: Option<bool>,
}

/// Freemium configuration shared by the admin screen, counter, and access gate.
#[derive(Clone)]
pub struct FreemiumSettingsService {
    clock: Clock,
    repo: Arc<dyn SettingsRepository>,
    profiles: Arc<dyn ProfileRepository>,
    local: Arc<dyn LocalStore>,
    counter: QuestionCounterStore,
}

impl FreemiumSettingsService {
    #[must_use]
    pub fn new(
        clock: Clock,
        repo: Arc<dyn SettingsRepository>,
        profiles: Arc<dyn ProfileRepository>,
        local: Arc<dyn LocalStore>,
        counter: QuestionCounterStore,
    ) -> Self {
        Self {
            clock,
            repo,
            profiles,
            local,
            counter,
        }
    }

    /// Load settings from the backend, filling gaps from local state.
    ///
    /// Without a stored limit the counter's current limit is reported.
    ///
    /// # Errors
    ///
    /// Returns `SettingsServiceError` if the backend cannot be read.
    pub async fn load(&self) -> Result<FreemiumSettings, SettingsServiceError> {
        let stored = self.stored().await?;
        Ok(self.merge(stored))
    }

    /// Like [`Self::load`], but a backend failure falls back to local state.
    pub async fn resolve(&self) -> FreemiumSettings {
        self.merge(self.stored_or_local().await)
    }

    /// Resolve settings and push a stored limit into the counter.
    ///
    /// The counter keeps its own limit when the backend has none.
    pub async fn sync_counter(&self) -> FreemiumSettings {
        let stored = self.stored_or_local().await;
        if let Some(limit) = stored.limit {
            self.counter.set_limit(limit);
        }
        self.merge(stored)
    }

    /// Persist an admin edit to the backend and the local mirror.
    ///
    /// # Errors
    ///
    /// Returns `SettingsServiceError::NotAdmin` unless the session's profile
    /// is an admin, a validation error for out-of-range limits, or a storage
    /// error.
    pub async fn save(
        &self,
        session: &AuthSession,
        draft: FreemiumSettingsDraft,
    ) -> Result<FreemiumSettings, SettingsServiceError> {
        let admin_id = self.require_admin(session).await?;
        let current = self.load().await?;
        let updated = draft.apply(current)?;
        let now = self.clock.now();

        for (key, value) in [
            (FREE_QUESTIONS_LIMIT_KEY, updated.limit_value()),
            (APP_SETTINGS_KEY, updated.app_settings_value()),
        ] {
            self.repo
                .put_setting(&SettingEntry {
                    key: key.to_owned(),
                    value,
                    updated_by: Some(admin_id),
                    updated_at: now,
                })
                .await?;
        }

        self.local
            .set_item(FREEMIUM_KEY, if updated.enabled() { "true" } else { "false" })?;
        self.counter.set_limit(updated.question_limit());
        tracing::info!(
            enabled = updated.enabled(),
            limit = updated.question_limit(),
            "freemium settings saved"
        );
        Ok(updated)
    }

    /// Zero the free question counter. Admin only, for testing the gate.
    ///
    /// # Errors
    ///
    /// Returns `SettingsServiceError::NotAdmin` unless the session's profile
    /// is an admin, or a storage error from the profile lookup.
    pub async fn reset_counter(
        &self,
        session: &AuthSession,
    ) -> Result<QuestionCounter, SettingsServiceError> {
        self.require_admin(session).await?;
        Ok(self.counter.reset())
    }

    /// The session only names the user; the admin flag is re-read from the profile.
    async fn require_admin(&self, session: &AuthSession) -> Result<UserId, SettingsServiceError> {
        let Some(user_id) = session.user_id() else {
            return Err(SettingsServiceError::NotAdmin);
        };
        match self.profiles.get_profile(user_id).await? {
            Some(profile) if profile.is_admin() => Ok(user_id),
            _ => {
                tracing::warn!(%user_id, "admin action refused");
                Err(SettingsServiceError::NotAdmin)
            }
        }
    }

    async fn stored(&self) -> Result<StoredSettings, SettingsServiceError> {
        let limit = self
            .repo
            .get_setting(FREE_QUESTIONS_LIMIT_KEY)
            .await?
            .and_then(|entry| limit_from_value(&entry.value));
        let enabled = self
            .repo
            .get_setting(APP_SETTINGS_KEY)
            .await?
            .and_then(|entry| enabled_from_value(&entry.value));
        Ok(StoredSettings { limit, enabled })
    }

    async fn stored_or_local(&self) -> StoredSettings {
        self.stored().await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "failed to load freemium settings; using local state");
            StoredSettings::default()
        })
    }

    fn merge(&self, stored: StoredSettings) -> FreemiumSettings {
        FreemiumSettings::new(
            resolve_enabled(stored.enabled, self.local_flag().as_deref()),
            stored
                .limit
                .unwrap_or_else(|| self.counter.snapshot().limit()),
        )
    }

    fn local_flag(&self) -> Option<String> {
        self.local.get_item(FREEMIUM_KEY).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "failed to read local freemium flag");
            None
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::{Profile, SessionUser};
    use quiz_core::time::fixed_clock;
    use storage::local::InMemoryLocalStore;
    use storage::repository::InMemoryRepository;

    struct Harness {
        svc: FreemiumSettingsService,
        counter: QuestionCounterStore,
        local: Arc<dyn LocalStore>,
        repo: InMemoryRepository,
    }

    fn service() -> Harness {
        let repo = InMemoryRepository::new();
        let local: Arc<dyn LocalStore> = Arc::new(InMemoryLocalStore::new());
        let counter = QuestionCounterStore::load(Arc::clone(&local));
        let svc = FreemiumSettingsService::new(
            fixed_clock(),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
            Arc::clone(&local),
            counter.clone(),
        );
        Harness {
            svc,
            counter,
            local,
            repo,
        }
    }

    fn session_for(id: UserId, is_admin: bool) -> AuthSession {
        AuthSession::signed_in(SessionUser {
            id,
            email: "admin@secquiz.io".into(),
            name: None,
            is_admin,
        })
    }

    async fn admin(h: &Harness) -> AuthSession {
        let id = UserId::random();
        let mut profile = Profile::new(id, "admin@secquiz.io", None).unwrap();
        profile.set_admin(true);
        h.repo.upsert_profile(&profile).await.unwrap();
        session_for(id, true)
    }

    #[test]
    fn toggle_resolution_order() {
        assert!(resolve_enabled(None, None));
        assert!(!resolve_enabled(None, Some("false")));
        assert!(resolve_enabled(None, Some("no")));
        assert!(resolve_enabled(Some(true), Some("false")));
        assert!(!resolve_enabled(Some(false), None));
    }

    #[tokio::test]
    async fn defaults_when_nothing_is_stored() {
        let h = service();
        assert_eq!(h.svc.load().await.unwrap(), FreemiumSettings::default());
    }

    #[tokio::test]
    async fn sync_keeps_counter_limit_without_a_stored_row() {
        let h = service();
        h.counter.set_limit(3);
        let settings = h.svc.sync_counter().await;
        assert_eq!(settings.question_limit(), 3);
        assert_eq!(h.counter.snapshot().limit(), 3);

        h.repo
            .put_setting(&SettingEntry {
                key: FREE_QUESTIONS_LIMIT_KEY.to_owned(),
                value: serde_json::json!(7),
                updated_by: None,
                updated_at: fixed_clock().now(),
            })
            .await
            .unwrap();
        assert_eq!(h.svc.sync_counter().await.question_limit(), 7);
        assert_eq!(h.counter.snapshot().limit(), 7);
    }

    #[tokio::test]
    async fn admin_save_updates_backend_local_and_counter() {
        let h = service();
        let session = admin(&h).await;
        let saved = h
            .svc
            .save(
                &session,
                FreemiumSettingsDraft {
                    enabled: Some(false),
                    question_limit: Some(3),
                },
            )
            .await
            .unwrap();

        assert!(!saved.enabled());
        assert_eq!(h.counter.snapshot().limit(), 3);
        assert_eq!(h.local.get_item(FREEMIUM_KEY).unwrap().as_deref(), Some("false"));
        assert_eq!(h.svc.load().await.unwrap(), saved);
        let entry = h.repo.get_setting(FREE_QUESTIONS_LIMIT_KEY).await.unwrap().unwrap();
        assert_eq!(entry.updated_by, session.user_id());
    }

    #[tokio::test]
    async fn non_admin_cannot_save() {
        let h = service();
        let err = h
            .svc
            .save(&AuthSession::anonymous(), FreemiumSettingsDraft::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SettingsServiceError::NotAdmin));
    }

    #[tokio::test]
    async fn session_admin_flag_alone_is_not_trusted() {
        let h = service();
        let forged = session_for(UserId::random(), true);
        let draft = FreemiumSettingsDraft {
            enabled: Some(false),
            question_limit: Some(1),
        };
        assert!(matches!(
            h.svc.save(&forged, draft).await,
            Err(SettingsServiceError::NotAdmin)
        ));

        let id = UserId::random();
        let profile = Profile::new(id, "learner@secquiz.io", None).unwrap();
        h.repo.upsert_profile(&profile).await.unwrap();
        assert!(matches!(
            h.svc.save(&session_for(id, true), draft).await,
            Err(SettingsServiceError::NotAdmin)
        ));
        assert!(h.repo.get_setting(APP_SETTINGS_KEY).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn counter_reset_requires_an_admin_profile() {
        let h = service();
        h.counter.increment();
        h.counter.increment();

        let forged = session_for(UserId::random(), true);
        assert!(matches!(
            h.svc.reset_counter(&forged).await,
            Err(SettingsServiceError::NotAdmin)
        ));
        assert_eq!(h.counter.snapshot().count(), 2);

        let session = admin(&h).await;
        assert_eq!(h.svc.reset_counter(&session).await.unwrap().count(), 0);
    }

    #[tokio::test]
    async fn negative_limit_is_rejected() {
        let h = service();
        let session = admin(&h).await;
        let err = h
            .svc
            .save(
                &session,
                FreemiumSettingsDraft {
                    enabled: None,
                    question_limit: Some(-5),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SettingsServiceError::Settings(_)));
    }
}
