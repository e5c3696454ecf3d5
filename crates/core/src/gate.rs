//! Freemium and payment gating decisions.
//!
//! Pure functions over a snapshot of counter, session, and flag state. The
//! services layer gathers the inputs and decides how to present the result.

use crate::model::QuestionCounter;

/// Feature toggles that switch the two gates on and off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateFlags {
    /// Anonymous usage is limited by the question counter.
    pub freemium_enabled: bool,
    /// Signed-in users without paid access are asked to pay.
    pub payment_wall_enabled: bool,
}

impl Default for GateFlags {
    fn default() -> Self {
        Self {
            freemium_enabled: true,
            payment_wall_enabled: false,
        }
    }
}

/// Everything the gate looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateInput {
    pub counter: QuestionCounter,
    pub authenticated: bool,
    /// Whether the user holds valid paid access. Ignored while the payment wall is off.
    pub has_paid_access: bool,
    pub flags: GateFlags,
}

/// Outcome of a gate check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Allow,
    /// Ask an anonymous user to sign up. Dismissible; the quiz continues.
    SignupPrompt { answered: u32, limit: u32 },
    /// Ask a signed-in user to purchase access. Blocks the quiz.
    PaymentPrompt,
}

impl GateDecision {
    /// True when the user must not continue until the prompt is resolved.
    #[must_use]
    pub fn blocks(&self) -> bool {
        matches!(self, Self::PaymentPrompt)
    }

    #[must_use]
    pub fn is_allow(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// Decide whether to interrupt the user.
#[must_use]
pub fn evaluate(input: &GateInput) -> GateDecision {
    if input.flags.freemium_enabled && !input.authenticated && input.counter.has_reached_limit() {
        return GateDecision::SignupPrompt {
            answered: input.counter.count(),
            limit: input.counter.limit(),
        };
    }

    if input.authenticated && !effective_paid_access(input) {
        return GateDecision::PaymentPrompt;
    }

    GateDecision::Allow
}

/// Paid access as the gate sees it: always granted while the payment wall is off.
#[must_use]
pub fn effective_paid_access(input: &GateInput) -> bool {
    !input.flags.payment_wall_enabled || input.has_paid_access
}

/// Number shown on the "free questions left" badge, if the badge is visible.
#[must_use]
pub fn free_questions_left(
    counter: &QuestionCounter,
    authenticated: bool,
    freemium_enabled: bool,
) -> Option<u32> {
    (!authenticated && freemium_enabled).then(|| counter.remaining())
}
