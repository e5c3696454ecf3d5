use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::TopicId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TopicError {
    #[error("topic title cannot be empty")]
    EmptyTitle,
}

/// A named category of questions, e.g. "Network Security".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    id: TopicId,
    title: String,
    description: Option<String>,
    image_url: Option<String>,
    created_at: DateTime<Utc>,
}

impl Topic {
    /// Creates a new topic.
    ///
    /// # Errors
    ///
    /// Returns `TopicError::EmptyTitle` if the title is blank.
    pub fn new(
        id: TopicId,
        title: impl Into<String>,
        description: Option<String>,
        image_url: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, TopicError> {
        let title = title.into().trim().to_owned();
        if title.is_empty() {
            return Err(TopicError::EmptyTitle);
        }

        Ok(Self {
            id,
            title,
            description: description
                .map(|d| d.trim().to_owned())
                .filter(|d| !d.is_empty()),
            image_url: image_url.filter(|u| !u.trim().is_empty()),
            created_at,
        })
    }

    #[must_use]
    pub fn id(&self) -> &TopicId {
        &self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    #[must_use]
    pub fn image_url(&self) -> Option<&str> {
        self.image_url.as_deref()
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn blank_title_is_rejected() {
        let err = Topic::new(TopicId::new("x"), "   ", None, None, fixed_now()).unwrap_err();
        assert_eq!(err, TopicError::EmptyTitle);
    }

    #[test]
    fn blank_description_becomes_none() {
        let topic = Topic::new(
            TopicId::new("cryptography"),
            " Cryptography ",
            Some(" ".into()),
            None,
            fixed_now(),
        )
        .unwrap();
        assert_eq!(topic.title(), "Cryptography");
        assert_eq!(topic.description(), None);
    }
}
