use serde::{Deserialize, Serialize};

use crate::model::settings::DEFAULT_QUESTION_LIMIT;

/// Free questions answered in this browser profile, with the configured limit.
///
/// Not tied to any user. Overflowing the limit is allowed; callers decide
/// what to do once [`QuestionCounter::has_reached_limit`] returns true.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionCounter {
    #[serde(rename = "questionsAnswered")]
    count: u32,
    #[serde(rename = "QUESTION_LIMIT")]
    limit: u32,
}

impl Default for QuestionCounter {
    fn default() -> Self {
        Self {
            count: 0,
            limit: DEFAULT_QUESTION_LIMIT,
        }
    }
}

impl QuestionCounter {
    #[must_use]
    pub fn new(count: u32, limit: u32) -> Self {
        Self { count, limit }
    }

    #[must_use]
    pub fn count(&self) -> u32 {
        self.count
    }

    #[must_use]
    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn increment(&mut self) {
        self.count = self.count.saturating_add(1);
    }

    pub fn reset(&mut self) {
        self.count = 0;
    }

    pub fn set_limit(&mut self, limit: u32) {
        self.limit = limit;
    }

    #[must_use]
    pub fn has_reached_limit(&self) -> bool {
        self.count >= self.limit
    }

    /// Free questions left before the limit, never negative.
    #[must_use]
    pub fn remaining(&self) -> u32 {
        self.limit.saturating_sub(self.count)
    }
}

/// Envelope the counter is persisted in, matching the browser store layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedCounter {
    pub state: QuestionCounter,
    #[serde(default)]
    pub version: u32,
}

impl From<QuestionCounter> for PersistedCounter {
    fn from(state: QuestionCounter) -> Self {
        Self { state, version: 0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_is_inclusive_and_sticky() {
        let mut counter = QuestionCounter::new(0, 2);
        assert!(!counter.has_reached_limit());
        counter.increment();
        assert!(!counter.has_reached_limit());
        counter.increment();
        assert!(counter.has_reached_limit());
        for _ in 0..5 {
            counter.increment();
            assert!(counter.has_reached_limit());
        }
        assert_eq!(counter.count(), 7);
        assert_eq!(counter.remaining(), 0);
    }

    #[test]
    fn reset_clears_count_only() {
        let mut counter = QuestionCounter::new(9, 3);
        counter.reset();
        assert_eq!(counter, QuestionCounter::new(0, 3));
    }

    #[test]
    fn zero_limit_is_reached_immediately() {
        let mut counter = QuestionCounter::default();
        counter.set_limit(0);
        assert!(counter.has_reached_limit());
    }

    #[test]
    fn persisted_layout_matches_browser_store() {
        let json = serde_json::to_string(&PersistedCounter::from(QuestionCounter::new(3, 10)))
            .unwrap();
        assert_eq!(
            json,
            r#"{"state":{"questionsAnswered":3,"QUESTION_LIMIT":10},"version":0}"#
        );
        let back: PersistedCounter =
            serde_json::from_str(r#"{"state":{"questionsAnswered":4,"QUESTION_LIMIT":5}}"#)
                .unwrap();
        assert_eq!(back.state, QuestionCounter::new(4, 5));
    }
}
