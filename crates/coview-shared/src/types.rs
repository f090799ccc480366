use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Capability tier granted by an invitation.
///
/// Variants are declared in ascending order so that `Ord` follows the role
/// hierarchy: `Viewer < Commenter < Editor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Viewer,
    Commenter,
    Editor,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Viewer => "viewer",
            Self::Commenter => "commenter",
            Self::Editor => "editor",
        }
    }
}

impl FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "viewer" => Ok(Self::Viewer),
            "commenter" => Ok(Self::Commenter),
            "editor" => Ok(Self::Editor),
            other => Err(unknown("role", other)),
        }
    }
}

/// Who an invitation is addressed to. Informational only, it never changes
/// what the invitee may do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudienceType {
    Family,
    TaxAccountant,
    Consultant,
    General,
}

impl AudienceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Family => "family",
            Self::TaxAccountant => "tax_accountant",
            Self::Consultant => "consultant",
            Self::General => "general",
        }
    }
}

impl Default for AudienceType {
    fn default() -> Self {
        Self::General
    }
}

impl FromStr for AudienceType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "family" => Ok(Self::Family),
            "tax_accountant" => Ok(Self::TaxAccountant),
            "consultant" => Ok(Self::Consultant),
            "general" => Ok(Self::General),
            other => Err(unknown("audience type", other)),
        }
    }
}

/// Invitation lifecycle. The only transition is `Pending -> Accepted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvitationStatus {
    Pending,
    Accepted,
}

impl InvitationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
        }
    }
}

impl FromStr for InvitationStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            other => Err(unknown("invitation status", other)),
        }
    }
}

/// Action recorded in the access log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessAction {
    View,
    Comment,
    Edit,
    Download,
}

impl AccessAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::View => "view",
            Self::Comment => "comment",
            Self::Edit => "edit",
            Self::Download => "download",
        }
    }
}

impl FromStr for AccessAction {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "view" => Ok(Self::View),
            "comment" => Ok(Self::Comment),
            "edit" => Ok(Self::Edit),
            "download" => Ok(Self::Download),
            other => Err(unknown("access action", other)),
        }
    }
}

/// Fixed set of reactions a participant can attach to a comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReactionKind {
    Agree,
    Disagree,
    Question,
}

impl ReactionKind {
    pub const ALL: [ReactionKind; 3] = [Self::Agree, Self::Disagree, Self::Question];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Agree => "agree",
            Self::Disagree => "disagree",
            Self::Question => "question",
        }
    }
}

impl FromStr for ReactionKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "agree" => Ok(Self::Agree),
            "disagree" => Ok(Self::Disagree),
            "question" => Ok(Self::Question),
            other => Err(unknown("reaction", other)),
        }
    }
}

macro_rules! display_as_str {
    ($($ty:ty),*) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(self.as_str())
                }
            }
        )*
    };
}

display_as_str!(Role, AudienceType, InvitationStatus, AccessAction, ReactionKind);

fn unknown(kind: &'static str, value: &str) -> ValidationError {
    ValidationError::UnknownVariant {
        kind,
        value: value.to_string(),
    }
}
