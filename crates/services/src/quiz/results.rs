use serde::{Deserialize, Serialize};

use quiz_core::model::{TopicId, percentage};

/// Navigation state handed from a finished quiz to the results route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultsState {
    pub score: u32,
    pub total: u32,
    pub topic_id: TopicId,
}

/// Routes the results screen can send the user to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Topics,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultsView {
    Render {
        score: u32,
        total: u32,
        topic_id: TopicId,
        /// Rounded to the nearest whole percent.
        percentage: u32,
    },
    Redirect(Route),
}

/// Decide what the results route shows. Missing or empty state redirects.
#[must_use]
pub fn resolve(state: Option<&ResultsState>) -> ResultsView {
    let Some(state) = state else {
        return ResultsView::Redirect(Route::Topics);
    };
    let Some(pct) = percentage(state.score, state.total) else {
        return ResultsView::Redirect(Route::Topics);
    };
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let percentage = pct.round() as u32;
    ResultsView::Render {
        score: state.score,
        total: state.total,
        topic_id: state.topic_id.clone(),
        percentage,
    }
}
