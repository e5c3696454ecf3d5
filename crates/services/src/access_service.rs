use std::sync::Arc;

use quiz_core::gate::{self, GateDecision, GateFlags, GateInput};
use quiz_core::model::AuthSession;

use crate::counter_service::QuestionCounterStore;
use crate::payment_service::PaymentService;
use crate::settings_service::FreemiumSettingsService;

/// Gathers counter, session, settings, and paid-access state for the gate.
#[derive(Clone)]
pub struct AccessService {
    counter: QuestionCounterStore,
    settings: Arc<FreemiumSettingsService>,
    payments: Arc<PaymentService>,
    payment_wall_enabled: bool,
}

impl AccessService {
    #[must_use]
    pub fn new(
        counter: QuestionCounterStore,
        settings: Arc<FreemiumSettingsService>,
        payments: Arc<PaymentService>,
        payment_wall_enabled: bool,
    ) -> Self {
        Self {
            counter,
            settings,
            payments,
            payment_wall_enabled,
        }
    }

    #[must_use]
    pub fn payment_wall_enabled(&self) -> bool {
        self.payment_wall_enabled
    }

    /// Current toggles; also pushes a stored limit into the counter.
    pub async fn flags(&self) -> GateFlags {
        let settings = self.settings.sync_counter().await;
        GateFlags {
            freemium_enabled: settings.enabled(),
            payment_wall_enabled: self.payment_wall_enabled,
        }
    }

    /// Evaluate the gate for `session`.
    ///
    /// A failed paid-access lookup counts as no access and is logged.
    pub async fn evaluate(&self, session: &AuthSession) -> GateDecision {
        let flags = self.flags().await;
        let has_paid_access = match session.user_id() {
            Some(user_id) if flags.payment_wall_enabled => {
                self.payments.check_access(user_id).await.unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "paid access lookup failed");
                    false
                })
            }
            _ => false,
        };

        let decision = gate::evaluate(&GateInput {
            counter: self.counter.snapshot(),
            authenticated: session.is_authenticated(),
            has_paid_access,
            flags,
        });
        if !decision.is_allow() {
            tracing::debug!(?decision, "access gate interrupted");
        }
        decision
    }

    /// Value for the "free questions left" badge, if shown.
    pub async fn free_questions_left(&self, session: &AuthSession) -> Option<u32> {
        let flags = self.flags().await;
        gate::free_questions_left(
            &self.counter.snapshot(),
            session.is_authenticated(),
            flags.freemium_enabled,
        )
    }
}
