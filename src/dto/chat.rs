use validator::Validate;

use crate::dto::validation::validate_not_blank;

/// Chat message typed by the local participant.
#[derive(Debug, Clone, Validate)]
pub struct OutgoingMessage {
    /// Message text.
    #[validate(custom(function = "validate_not_blank"))]
    pub content: String,
}

impl OutgoingMessage {
    /// Wrap typed text; validation runs separately.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}
