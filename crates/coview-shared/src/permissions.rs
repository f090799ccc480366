//! Role to capability mapping.
//!
//! | capability            | viewer | commenter | editor |
//! |-----------------------|--------|-----------|--------|
//! | view share & thread   | yes    | yes       | yes    |
//! | post comment/reaction | no     | yes       | yes    |
//! | modify inputs         | no     | no        | yes    |

use serde::{Deserialize, Serialize};

use crate::identity::Identity;
use crate::types::Role;

/// Something a caller may be allowed to do against a share.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    View,
    Comment,
    ModifyInputs,
}

impl Capability {
    /// Lowest role that carries this capability.
    pub fn minimum_role(&self) -> Role {
        match self {
            Self::View => Role::Viewer,
            Self::Comment => Role::Commenter,
            Self::ModifyInputs => Role::Editor,
        }
    }
}

/// Everything the caller needs to know about one share, flattened for the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
    pub role: Option<Role>,
    pub can_view: bool,
    pub can_comment: bool,
    pub can_modify_inputs: bool,
}

impl Permissions {
    pub fn for_role(role: Option<Role>) -> Self {
        let allows = |cap: Capability| role.map_or(false, |r| PermissionGate::allows(r, cap));
        Self {
            role,
            can_view: allows(Capability::View),
            can_comment: allows(Capability::Comment),
            can_modify_inputs: allows(Capability::ModifyInputs),
        }
    }

    pub fn allows(&self, capability: Capability) -> bool {
        match capability {
            Capability::View => self.can_view,
            Capability::Comment => self.can_comment,
            Capability::ModifyInputs => self.can_modify_inputs,
        }
    }
}

/// What the gate knows about the caller's relationship to a share.
#[derive(Debug, Clone, Default)]
pub struct AccessContext<'a> {
    /// Owner of the share being accessed.
    pub owner_id: &'a str,
    /// Caller, if identified.
    pub identity: Option<&'a Identity>,
    /// Role of the invitation token the caller arrived with, if any.
    pub invitation_role: Option<Role>,
    /// Highest role among invitations the caller has accepted on this share.
    pub accepted_role: Option<Role>,
    /// Set when the share is a synthesized fallback.
    pub degraded: bool,
}

/// Maps a (role, identity) pair to allowed capabilities.
pub struct PermissionGate;

impl PermissionGate {
    /// Role hierarchy is monotonic: a role allows everything a lower role does.
    pub fn allows(role: Role, capability: Capability) -> bool {
        role >= capability.minimum_role()
    }

    /// Effective role of the caller.
    ///
    /// A degraded share is view-only for everybody. Anonymous callers are
    /// capped at viewer whatever their invitation says.
    pub fn effective_role(ctx: &AccessContext<'_>) -> Role {
        if ctx.degraded {
            return Role::Viewer;
        }
        let Some(identity) = ctx.identity else {
            return Role::Viewer;
        };
        if identity.id == ctx.owner_id {
            return Role::Editor;
        }
        [ctx.invitation_role, ctx.accepted_role]
            .into_iter()
            .flatten()
            .max()
            .unwrap_or(Role::Viewer)
    }

    pub fn permissions(ctx: &AccessContext<'_>) -> Permissions {
        let role = Self::effective_role(ctx);
        let mut permissions = Permissions::for_role(Some(role));
        if ctx.degraded {
            permissions.can_comment = false;
            permissions.can_modify_inputs = false;
        }
        permissions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx<'a>(identity: Option<&'a Identity>) -> AccessContext<'a> {
        AccessContext {
            owner_id: "owner",
            identity,
            ..Default::default()
        }
    }

    #[test]
    fn capability_table() {
        assert!(PermissionGate::allows(Role::Viewer, Capability::View));
        assert!(!PermissionGate::allows(Role::Viewer, Capability::Comment));
        assert!(!PermissionGate::allows(Role::Viewer, Capability::ModifyInputs));

        assert!(PermissionGate::allows(Role::Commenter, Capability::View));
        assert!(PermissionGate::allows(Role::Commenter, Capability::Comment));
        assert!(!PermissionGate::allows(Role::Commenter, Capability::ModifyInputs));

        assert!(PermissionGate::allows(Role::Editor, Capability::View));
        assert!(PermissionGate::allows(Role::Editor, Capability::Comment));
        assert!(PermissionGate::allows(Role::Editor, Capability::ModifyInputs));
    }

    #[test]
    fn anonymous_is_capped_at_viewer() {
        let mut c = ctx(None);
        c.invitation_role = Some(Role::Editor);
        assert_eq!(PermissionGate::effective_role(&c), Role::Viewer);
        assert!(!PermissionGate::permissions(&c).can_comment);
    }

    #[test]
    fn owner_is_editor() {
        let owner = Identity::new("owner");
        let c = ctx(Some(&owner));
        let p = PermissionGate::permissions(&c);
        assert_eq!(p.role, Some(Role::Editor));
        assert!(p.can_modify_inputs);
    }

    #[test]
    fn highest_invitation_role_wins() {
        let u1 = Identity::new("u1");
        let mut c = ctx(Some(&u1));
        c.invitation_role = Some(Role::Viewer);
        c.accepted_role = Some(Role::Commenter);
        let p = PermissionGate::permissions(&c);
        assert_eq!(p.role, Some(Role::Commenter));
        assert!(p.can_comment);
        assert!(!p.can_modify_inputs);
    }

    #[test]
    fn identified_without_invitation_is_viewer() {
        let u1 = Identity::new("u1");
        assert_eq!(PermissionGate::effective_role(&ctx(Some(&u1))), Role::Viewer);
    }

    #[test]
    fn degraded_share_is_read_only_even_for_owner() {
        let owner = Identity::new("owner");
        let mut c = ctx(Some(&owner));
        c.degraded = true;
        let p = PermissionGate::permissions(&c);
        assert!(p.can_view);
        assert!(!p.can_comment);
        assert!(!p.can_modify_inputs);
    }
}
