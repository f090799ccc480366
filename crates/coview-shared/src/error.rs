use thiserror::Error;

/// Input rejected before any store call is made.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Email address is required")]
    EmptyEmail,

    #[error("Email address is not valid: {0}")]
    InvalidEmail(String),

    #[error("Comment cannot be empty")]
    EmptyContent,

    #[error("Comment is too long ({len} characters, max {max})")]
    ContentTooLong { len: usize, max: usize },

    #[error("Too many tags ({count}, max {max})")]
    TooManyTags { count: usize, max: usize },

    #[error("Invitation message is too long ({len} characters, max {max})")]
    MessageTooLong { len: usize, max: usize },

    #[error("Replies can only be attached to a top-level comment of the same share")]
    InvalidParent,

    #[error("Unknown {kind}: {value}")]
    UnknownVariant { kind: &'static str, value: String },
}
