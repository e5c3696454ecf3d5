//! Read-time reconciliation of the two progress sources.
//!
//! The per-topic tally and the per-attempt log are written separately and
//! without a transaction, so they may disagree. The tally seeds the view and
//! the attempt log is folded over it afterwards, which lets attempt-derived
//! averages take precedence wherever both sources know a topic.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};

use crate::model::{TopicId, percentage};

/// Number of attempts listed as recent activity.
pub const RECENT_ACTIVITY_LEN: usize = 5;

/// A tally row joined with its topic title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressSeed {
    pub topic_id: TopicId,
    pub topic_title: Option<String>,
    pub questions_attempted: u32,
    pub completion_percentage: u32,
    pub last_activity: DateTime<Utc>,
}

/// An attempt row joined with its topic title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptRecord {
    pub topic_id: TopicId,
    pub topic_title: Option<String>,
    pub score: u32,
    pub total_questions: u32,
    pub completed_at: DateTime<Utc>,
}

impl AttemptRecord {
    #[must_use]
    pub fn percentage(&self) -> Option<f64> {
        percentage(self.score, self.total_questions)
    }
}

/// Unified per-topic view.
#[derive(Debug, Clone, PartialEq)]
pub struct TopicSummary {
    pub topic_id: TopicId,
    pub topic_title: String,
    pub attempts: u32,
    pub best_score: f64,
    pub last_attempt: DateTime<Utc>,
    pub average_score: f64,
    pub total_questions: u32,
}

/// Totals across every attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressStats {
    pub total_quizzes: usize,
    /// Mean of per-attempt percentages, not of per-topic averages.
    pub average_score: f64,
    pub topics_attempted: usize,
    pub best_topic: Option<String>,
    pub recent_activity: Vec<AttemptRecord>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressReport {
    /// Topics in first-seen order.
    pub topics: Vec<TopicSummary>,
    pub stats: ProgressStats,
}

impl ProgressReport {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.topics.is_empty() && self.stats.total_quizzes == 0
    }

    #[must_use]
    pub fn topic(&self, id: &TopicId) -> Option<&TopicSummary> {
        self.topics.iter().find(|t| &t.topic_id == id)
    }
}

/// Merge tally rows and attempt rows into one report.
///
/// Attempts are processed newest first regardless of input order. Rows whose
/// topic title is unknown, and attempts with zero questions, are skipped from
/// the per-topic fold.
#[must_use]
pub fn aggregate(seeds: &[ProgressSeed], attempts: &[AttemptRecord]) -> ProgressReport {
    let mut topics: Vec<TopicSummary> = Vec::new();
    let mut index: HashMap<TopicId, usize> = HashMap::new();

    for seed in seeds {
        let Some(title) = seed.topic_title.as_ref() else {
            tracing::warn!(topic_id = %seed.topic_id, "skipping progress row without topic title");
            continue;
        };
        let pct = f64::from(seed.completion_percentage);
        let summary = TopicSummary {
            topic_id: seed.topic_id.clone(),
            topic_title: title.clone(),
            attempts: seed.questions_attempted,
            best_score: pct,
            last_attempt: seed.last_activity,
            average_score: pct,
            total_questions: seed.questions_attempted,
        };
        match index.get(&seed.topic_id) {
            Some(&i) => topics[i] = summary,
            None => {
                index.insert(seed.topic_id.clone(), topics.len());
                topics.push(summary);
            }
        }
    }

    let mut ordered: Vec<&AttemptRecord> = attempts.iter().collect();
    ordered.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));

    for attempt in &ordered {
        let Some(title) = attempt.topic_title.as_ref() else {
            tracing::warn!(topic_id = %attempt.topic_id, "skipping result without topic title");
            continue;
        };
        let Some(pct) = attempt.percentage() else {
            tracing::warn!(topic_id = %attempt.topic_id, "skipping result with zero questions");
            continue;
        };

        match index.get(&attempt.topic_id) {
            None => {
                index.insert(attempt.topic_id.clone(), topics.len());
                topics.push(TopicSummary {
                    topic_id: attempt.topic_id.clone(),
                    topic_title: title.clone(),
                    attempts: 1,
                    best_score: pct,
                    last_attempt: attempt.completed_at,
                    average_score: pct,
                    total_questions: attempt.total_questions,
                });
            }
            Some(&i) => {
                let existing = &mut topics[i];
                let prior = f64::from(existing.attempts);
                existing.average_score = (existing.average_score * prior + pct) / (prior + 1.0);
                existing.best_score = existing.best_score.max(pct);
                existing.attempts = existing.attempts.saturating_add(1);
                existing.last_attempt = attempt.completed_at;
            }
        }
    }

    let stats = compute_stats(&topics, &ordered);
    ProgressReport { topics, stats }
}

fn compute_stats(topics: &[TopicSummary], ordered: &[&AttemptRecord]) -> ProgressStats {
    let percentages: Vec<f64> = ordered.iter().filter_map(|a| a.percentage()).collect();
    #[allow(clippy::cast_precision_loss)]
    let average_score = if percentages.is_empty() {
        0.0
    } else {
        percentages.iter().sum::<f64>() / percentages.len() as f64
    };

    let topics_attempted = ordered
        .iter()
        .map(|a| &a.topic_id)
        .collect::<HashSet<_>>()
        .len();

    let mut best_topic = None;
    let mut best = 0.0_f64;
    for topic in topics {
        if topic.best_score > best {
            best = topic.best_score;
            best_topic = Some(topic.topic_title.clone());
        }
    }

    ProgressStats {
        total_quizzes: ordered.len(),
        average_score,
        topics_attempted,
        best_topic,
        recent_activity: ordered
            .iter()
            .take(RECENT_ACTIVITY_LEN)
            .map(|a| (*a).clone())
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;
    use chrono::Duration;

    fn attempt(topic: &str, score: u32, total: u32, minutes: i64) -> AttemptRecord {
        AttemptRecord {
            topic_id: TopicId::new(topic),
            topic_title: Some(topic.to_uppercase()),
            score,
            total_questions: total,
            completed_at: fixed_now() + Duration::minutes(minutes),
        }
    }

    fn seed(topic: &str, attempted: u32, completion: u32) -> ProgressSeed {
        ProgressSeed {
            topic_id: TopicId::new(topic),
            topic_title: Some(topic.to_uppercase()),
            questions_attempted: attempted,
            completion_percentage: completion,
            last_activity: fixed_now(),
        }
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn two_attempts_average_and_best_in_either_order() {
        let a = attempt("crypto", 4, 5, 1);
        let b = attempt("crypto", 5, 5, 2);

        for input in [vec![a.clone(), b.clone()], vec![b, a]] {
            let report = aggregate(&[], &input);
            let topic = report.topic(&TopicId::new("crypto")).unwrap();
            assert!(close(topic.average_score, 90.0));
            assert!(close(topic.best_score, 100.0));
            assert_eq!(topic.attempts, 2);
        }
    }

    #[test]
    fn result_log_is_folded_over_progress_snapshot() {
        let report = aggregate(&[seed("net", 1, 50)], &[attempt("net", 1, 1, 0)]);
        let topic = report.topic(&TopicId::new("net")).unwrap();
        assert_eq!(topic.attempts, 2);
        assert!(close(topic.average_score, 75.0));
        assert!(close(topic.best_score, 100.0));
        assert_eq!(topic.total_questions, 1);
    }

    #[test]
    fn fold_is_deterministic_for_shuffled_inputs() {
        let attempts = vec![
            attempt("net", 1, 4, 3),
            attempt("net", 3, 4, 1),
            attempt("web", 2, 2, 2),
            attempt("net", 0, 4, 4),
        ];
        let seeds = vec![seed("net", 8, 40), seed("crypto", 10, 70)];
        let baseline = aggregate(&seeds, &attempts);

        let mut reversed = attempts.clone();
        reversed.reverse();
        let again = aggregate(&seeds, &reversed);
        for topic in &baseline.topics {
            let other = again.topic(&topic.topic_id).unwrap();
            assert!(close(topic.average_score, other.average_score));
            assert!(close(topic.best_score, other.best_score));
        }
    }

    #[test]
    fn best_score_never_decreases_as_attempts_are_added() {
        let mut attempts = Vec::new();
        let mut last_best = 0.0;
        for (i, score) in [3, 1, 4, 0, 2].into_iter().enumerate() {
            attempts.push(attempt("net", score, 4, i64::try_from(i).unwrap()));
            let report = aggregate(&[], &attempts);
            let best = report.topic(&TopicId::new("net")).unwrap().best_score;
            assert!(best >= last_best);
            last_best = best;
        }
        assert!(close(last_best, 100.0));
    }

    #[test]
    fn missing_title_is_skipped_but_still_counted_in_totals() {
        let mut orphan = attempt("gone", 1, 2, 5);
        orphan.topic_title = None;
        let report = aggregate(&[], &[orphan, attempt("net", 2, 2, 1)]);

        assert_eq!(report.topics.len(), 1);
        assert_eq!(report.stats.total_quizzes, 2);
        assert_eq!(report.stats.topics_attempted, 2);
        assert!(close(report.stats.average_score, 75.0));
    }

    #[test]
    fn zero_question_attempts_do_not_poison_averages() {
        let report = aggregate(&[], &[attempt("net", 0, 0, 0), attempt("net", 1, 2, 1)]);
        let topic = report.topic(&TopicId::new("net")).unwrap();
        assert_eq!(topic.attempts, 1);
        assert!(close(report.stats.average_score, 50.0));
    }

    #[test]
    fn best_topic_prefers_first_seen_on_ties() {
        let report = aggregate(
            &[],
            &[attempt("late", 1, 1, 1), attempt("early", 1, 1, 2)],
        );
        // newest first, so "early" (minute 2) is seen before "late"
        assert_eq!(report.stats.best_topic.as_deref(), Some("EARLY"));
    }

    #[test]
    fn no_best_topic_when_everything_scored_zero() {
        let report = aggregate(&[], &[attempt("net", 0, 3, 0)]);
        assert_eq!(report.stats.best_topic, None);
    }

    #[test]
    fn recent_activity_is_newest_first_and_capped() {
        let attempts: Vec<_> = (0..8).map(|m| attempt("net", 1, 1, m)).collect();
        let report = aggregate(&[], &attempts);
        assert_eq!(report.stats.recent_activity.len(), RECENT_ACTIVITY_LEN);
        assert_eq!(
            report.stats.recent_activity[0].completed_at,
            fixed_now() + Duration::minutes(7)
        );
    }

    #[test]
    fn empty_inputs_give_empty_report() {
        let report = aggregate(&[], &[]);
        assert!(report.is_empty());
        assert!(close(report.stats.average_score, 0.0));
    }
}
