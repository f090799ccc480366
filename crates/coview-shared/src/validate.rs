//! Input checks that run before anything touches the store.

use std::collections::BTreeSet;

use crate::constants::{MAX_COMMENT_CHARS, MAX_COMMENT_TAGS, MAX_INVITATION_MESSAGE_CHARS};
use crate::error::ValidationError;

/// Trim, lowercase and check that an email address is syntactically plausible.
pub fn normalize_email(raw: &str) -> Result<String, ValidationError> {
    let email = raw.trim();
    if email.is_empty() {
        return Err(ValidationError::EmptyEmail);
    }

    let invalid = || ValidationError::InvalidEmail(email.to_string());

    if email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }
    // Domain needs at least one dot with non-empty labels on both sides.
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 || labels.iter().any(|l| l.is_empty()) {
        return Err(invalid());
    }

    Ok(email.to_lowercase())
}

/// Trim comment content and enforce the length bounds.
pub fn comment_content(raw: &str) -> Result<String, ValidationError> {
    let content = raw.trim();
    if content.is_empty() {
        return Err(ValidationError::EmptyContent);
    }
    let len = content.chars().count();
    if len > MAX_COMMENT_CHARS {
        return Err(ValidationError::ContentTooLong {
            len,
            max: MAX_COMMENT_CHARS,
        });
    }
    Ok(content.to_string())
}

/// Normalize free-form tags into a sorted set: trimmed, lowercased, no blanks.
pub fn tags<I, S>(raw: I) -> Result<BTreeSet<String>, ValidationError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let set: BTreeSet<String> = raw
        .into_iter()
        .map(|t| t.as_ref().trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect();
    if set.len() > MAX_COMMENT_TAGS {
        return Err(ValidationError::TooManyTags {
            count: set.len(),
            max: MAX_COMMENT_TAGS,
        });
    }
    Ok(set)
}

/// Trim an optional invitation message; blank messages become `None`.
pub fn invitation_message(raw: Option<&str>) -> Result<Option<String>, ValidationError> {
    let Some(message) = raw.map(str::trim).filter(|m| !m.is_empty()) else {
        return Ok(None);
    };
    let len = message.chars().count();
    if len > MAX_INVITATION_MESSAGE_CHARS {
        return Err(ValidationError::MessageTooLong {
            len,
            max: MAX_INVITATION_MESSAGE_CHARS,
        });
    }
    Ok(Some(message.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_normalized() {
        assert_eq!(normalize_email("  A@Example.com ").unwrap(), "a@example.com");
    }

    #[test]
    fn email_rejections() {
        assert_eq!(normalize_email("   "), Err(ValidationError::EmptyEmail));
        for bad in ["plainaddress", "@example.com", "a@", "a@b", "a@b.", "a b@c.com", "a@b@c.com"] {
            assert!(
                matches!(normalize_email(bad), Err(ValidationError::InvalidEmail(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn comment_content_trimmed_and_bounded() {
        assert_eq!(comment_content("  hi  ").unwrap(), "hi");
        assert_eq!(comment_content(" \n\t "), Err(ValidationError::EmptyContent));
        let long = "x".repeat(MAX_COMMENT_CHARS + 1);
        assert!(matches!(
            comment_content(&long),
            Err(ValidationError::ContentTooLong { .. })
        ));
    }

    #[test]
    fn tags_deduplicated() {
        let set = tags(["Risk", " risk ", "", "needs-review"]).unwrap();
        assert_eq!(set.into_iter().collect::<Vec<_>>(), vec!["needs-review", "risk"]);
    }

    #[test]
    fn blank_message_is_none() {
        assert_eq!(invitation_message(Some("   ")).unwrap(), None);
        assert_eq!(invitation_message(None).unwrap(), None);
        assert_eq!(
            invitation_message(Some(" hello ")).unwrap().as_deref(),
            Some("hello")
        );
    }
}
