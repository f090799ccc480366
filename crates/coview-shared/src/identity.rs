use serde::{Deserialize, Serialize};

/// The authenticated caller, as reported by the identity provider.
///
/// Coview never authenticates anybody itself; it only asks "who is this, if
/// anyone". An anonymous visitor is represented as `Option<Identity>::None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Opaque user id from the identity provider.
    pub id: String,
    /// Email address, when the provider shares it.
    pub email: Option<String>,
}

impl Identity {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Build an identity from raw header values. Blank ids count as anonymous.
    pub fn from_parts(id: Option<&str>, email: Option<&str>) -> Option<Self> {
        let id = id.map(str::trim).filter(|s| !s.is_empty())?;
        let email = email
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        Some(Self {
            id: id.to_string(),
            email,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_id_is_anonymous() {
        assert!(Identity::from_parts(None, Some("a@example.com")).is_none());
        assert!(Identity::from_parts(Some("   "), None).is_none());
    }

    #[test]
    fn from_parts_trims() {
        let id = Identity::from_parts(Some(" u1 "), Some(" ")).unwrap();
        assert_eq!(id, Identity::new("u1"));

        let id = Identity::from_parts(Some("u2"), Some("b@example.com")).unwrap();
        assert_eq!(id.email.as_deref(), Some("b@example.com"));
    }
}
