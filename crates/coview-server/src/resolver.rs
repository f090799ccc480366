//! Turning a bearer token from a URL into the share it grants access to.
//!
//! Tokens are tried as an invitation token first, then as a share token.
//! When neither yields a usable share the caller still gets a page: a
//! synthesized demo share, flagged as degraded so that nothing can be
//! written through it.

use chrono::Utc;
use coview_shared::constants::{FALLBACK_RESOURCE_ID, FALLBACK_SHARE_TITLE};
use coview_shared::{AccessContext, Identity, PermissionGate, Permissions, Role, TokenCodec};
use coview_store::Share;
use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::backend::Backend;
use crate::error::ServerError;

/// Why a token resolved to the fallback share.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    /// Not shaped like a token at all.
    Malformed,
    /// Matches no invitation and no share.
    Unknown,
    /// Matches a share whose expiry has passed.
    Expired,
    /// The store could not be asked.
    BackendUnavailable,
}

/// How a share was reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionSource {
    Invitation {
        invitation_id: Uuid,
        role: Role,
        /// Identity the invitation is bound to once accepted.
        accepted_by: Option<String>,
    },
    ShareToken,
    Fallback { reason: FallbackReason },
}

#[derive(Debug, Clone)]
pub struct Resolution {
    pub share: Share,
    pub source: ResolutionSource,
}

impl Resolution {
    pub fn is_degraded(&self) -> bool {
        matches!(self.source, ResolutionSource::Fallback { .. })
    }

    pub fn fallback_reason(&self) -> Option<FallbackReason> {
        match self.source {
            ResolutionSource::Fallback { reason } => Some(reason),
            _ => None,
        }
    }

    /// Role the invitation token grants to `identity`.
    ///
    /// A pending invitation grants its role to whoever holds the link. Once
    /// accepted it is bound to the accepting identity; for anyone else the
    /// link is no better than the plain share link.
    pub fn invitation_role_for(&self, identity: Option<&Identity>) -> Option<Role> {
        match &self.source {
            ResolutionSource::Invitation {
                role, accepted_by, ..
            } => match accepted_by {
                None => Some(*role),
                Some(bound) if identity.is_some_and(|i| &i.id == bound) => Some(*role),
                Some(_) => None,
            },
            _ => None,
        }
    }

    fn via_invitation(&self) -> bool {
        matches!(self.source, ResolutionSource::Invitation { .. })
    }
}

/// Lookup tiers, in the order they are tried.
#[derive(Clone, Copy)]
enum Lookup {
    Invitation,
    ShareToken,
}

/// Outcome of one lookup tier.
enum Tier {
    Found(Resolution),
    Expired,
    Missing,
    Failed,
}

#[derive(Clone)]
pub struct AccessResolver {
    backend: Backend,
}

impl AccessResolver {
    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }

    /// Resolve a token. Never fails: every error ends in the fallback share.
    pub async fn resolve(&self, token: &str) -> Resolution {
        let fingerprint = TokenCodec::fingerprint(token);

        if !TokenCodec::is_well_formed(token) {
            debug!(token = %fingerprint, "malformed token");
            return fallback_resolution(token, FallbackReason::Malformed);
        }

        let mut expired = false;
        let mut failed = false;

        for lookup in [Lookup::Invitation, Lookup::ShareToken] {
            let tier = match lookup {
                Lookup::Invitation => self.by_invitation(token).await,
                Lookup::ShareToken => self.by_share_token(token).await,
            };
            match tier {
                Tier::Found(resolution) => {
                    debug!(
                        token = %fingerprint,
                        share_id = %resolution.share.id,
                        via_invitation = resolution.via_invitation(),
                        "token resolved"
                    );
                    return resolution;
                }
                Tier::Expired => expired = true,
                Tier::Failed => failed = true,
                Tier::Missing => {}
            }
        }

        let reason = if expired {
            FallbackReason::Expired
        } else if failed {
            FallbackReason::BackendUnavailable
        } else {
            FallbackReason::Unknown
        };
        debug!(token = %fingerprint, ?reason, "serving fallback share");
        fallback_resolution(token, reason)
    }

    async fn by_invitation(&self, token: &str) -> Tier {
        let token = token.to_string();
        let lookup = self
            .backend
            .call(move |db| {
                let invitation = db.get_invitation_by_token(&token)?;
                let share = db.get_share(invitation.share_id)?;
                Ok((invitation, share))
            })
            .await;

        match lookup {
            Ok((invitation, share)) => live(Resolution {
                share,
                source: ResolutionSource::Invitation {
                    invitation_id: invitation.id,
                    role: invitation.role,
                    accepted_by: invitation.accepted_by,
                },
            }),
            Err(e) => missing_or_failed(e, "invitation"),
        }
    }

    async fn by_share_token(&self, token: &str) -> Tier {
        let token = token.to_string();
        match self.backend.call(move |db| db.get_share_by_token(&token)).await {
            Ok(share) => live(Resolution {
                share,
                source: ResolutionSource::ShareToken,
            }),
            Err(e) => missing_or_failed(e, "share"),
        }
    }

    /// Effective permissions of `identity` on a resolved share.
    pub async fn permissions(
        &self,
        resolution: &Resolution,
        identity: Option<&Identity>,
    ) -> Permissions {
        if resolution.is_degraded() {
            return PermissionGate::permissions(&AccessContext {
                owner_id: &resolution.share.owner_id,
                identity,
                degraded: true,
                ..Default::default()
            });
        }
        let invitation_role = resolution.invitation_role_for(identity);
        self.share_permissions(&resolution.share, invitation_role, identity)
            .await
    }

    /// Effective permissions on a stored share.
    ///
    /// Accepted invitations are looked up for identified non-owners; if that
    /// lookup fails the caller keeps whatever `invitation_role` alone grants.
    pub async fn share_permissions(
        &self,
        share: &Share,
        invitation_role: Option<Role>,
        identity: Option<&Identity>,
    ) -> Permissions {
        let accepted_role = match identity {
            Some(identity) => self.accepted_role(share, identity).await,
            None => None,
        };

        PermissionGate::permissions(&AccessContext {
            owner_id: &share.owner_id,
            identity,
            invitation_role,
            accepted_role,
            degraded: false,
        })
    }

    async fn accepted_role(&self, share: &Share, identity: &Identity) -> Option<Role> {
        if identity.id == share.owner_id {
            return None;
        }
        let share_id = share.id;
        let user_id = identity.id.clone();
        match self
            .backend
            .call(move |db| db.accepted_role(share_id, &user_id))
            .await
        {
            Ok(role) => role,
            Err(e) => {
                warn!(share_id = %share_id, error = %e, "accepted role lookup failed");
                None
            }
        }
    }
}

fn live(resolution: Resolution) -> Tier {
    if resolution.share.is_expired(Utc::now()) {
        Tier::Expired
    } else {
        Tier::Found(resolution)
    }
}

fn missing_or_failed(e: ServerError, tier: &str) -> Tier {
    match e {
        ServerError::NotFound(_) => Tier::Missing,
        other => {
            warn!(tier, error = %other, "token lookup failed");
            Tier::Failed
        }
    }
}

/// The demo share served for tokens that resolve to nothing usable. Its id
/// is derived from the token so every load of the same URL agrees.
pub fn fallback_share(token: &str) -> Share {
    let share_token = if TokenCodec::is_well_formed(token) {
        token.to_string()
    } else {
        String::new()
    };

    Share {
        id: TokenCodec::derive_id(token),
        resource_id: FALLBACK_RESOURCE_ID.to_string(),
        owner_id: String::new(),
        share_token,
        title: FALLBACK_SHARE_TITLE.to_string(),
        description: Some("This link could not be opened; showing a demo instead.".to_string()),
        created_at: Utc::now(),
        expires_at: None,
    }
}

fn fallback_resolution(token: &str, reason: FallbackReason) -> Resolution {
    Resolution {
        share: fallback_share(token),
        source: ResolutionSource::Fallback { reason },
    }
}
