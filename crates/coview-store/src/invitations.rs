//! Invitation lifecycle: issue, redeem, list.

use coview_shared::{validate, AudienceType, InvitationStatus, Role, TokenCodec};
use rusqlite::params;
use uuid::Uuid;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{AcceptOutcome, Invitation};
use crate::row::{now, opt_time_at, parsed_at, time_at, ts, uuid_at};

const SELECT_INVITATION: &str = "SELECT id, share_id, invitee_email, role, audience_type,
        invitation_token, status, invited_by, accepted_by, accepted_at, message, created_at
 FROM invitations";

impl Database {
    /// Issue a pending invitation against a share.
    ///
    /// The email is validated before anything is written. Delivering the
    /// invitation is somebody else's job.
    pub fn send_invitation(
        &self,
        share_id: Uuid,
        invited_by: &str,
        email: &str,
        role: Role,
        audience_type: AudienceType,
        message: Option<&str>,
    ) -> Result<Invitation> {
        let invitee_email = validate::normalize_email(email)?;
        let message = validate::invitation_message(message)?;

        // Surface a clean NotFound instead of a foreign key failure.
        self.get_share(share_id)?;

        let invitation = Invitation {
            id: Uuid::new_v4(),
            share_id,
            invitee_email,
            role,
            audience_type,
            invitation_token: TokenCodec::generate(),
            status: InvitationStatus::Pending,
            invited_by: invited_by.to_string(),
            accepted_by: None,
            accepted_at: None,
            message,
            created_at: now(),
        };

        self.conn().execute(
            "INSERT INTO invitations (id, share_id, invitee_email, role, audience_type,
                                      invitation_token, status, invited_by, message, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                invitation.id.to_string(),
                invitation.share_id.to_string(),
                invitation.invitee_email,
                invitation.role.as_str(),
                invitation.audience_type.as_str(),
                invitation.invitation_token,
                invitation.status.as_str(),
                invitation.invited_by,
                invitation.message,
                ts(&invitation.created_at),
            ],
        )?;

        tracing::info!(
            invitation_id = %invitation.id,
            share_id = %share_id,
            role = %role,
            audience = %audience_type,
            "invitation issued"
        );

        Ok(invitation)
    }

    /// Redeem an invitation token for `accepted_by`.
    ///
    /// The transition is a single conditional update, so only one call can
    /// ever win; later calls report [`AcceptOutcome::AlreadyAccepted`] and
    /// leave `accepted_by`/`accepted_at` untouched.
    pub fn accept_invitation(&self, token: &str, accepted_by: &str) -> Result<AcceptOutcome> {
        let now = now();
        let affected = self.conn().execute(
            "UPDATE invitations
             SET status = 'accepted', accepted_by = ?2, accepted_at = ?3
             WHERE invitation_token = ?1 AND status = 'pending'",
            params![token, accepted_by, ts(&now)],
        )?;

        if affected == 1 {
            let invitation = self.get_invitation_by_token(token)?;
            tracing::info!(
                invitation_id = %invitation.id,
                share_id = %invitation.share_id,
                accepted_by,
                "invitation accepted"
            );
            return Ok(AcceptOutcome::Accepted(invitation));
        }

        match self.get_invitation_by_token(token) {
            Ok(_) => Ok(AcceptOutcome::AlreadyAccepted),
            Err(StoreError::NotFound) => Ok(AcceptOutcome::NotFound),
            Err(e) => Err(e),
        }
    }

    pub fn get_invitation_by_token(&self, token: &str) -> Result<Invitation> {
        self.conn()
            .query_row(
                &format!("{SELECT_INVITATION} WHERE invitation_token = ?1"),
                params![token],
                row_to_invitation,
            )
            .map_err(StoreError::from_query)
    }

    /// Invitations for a share, newest first.
    pub fn list_invitations(&self, share_id: Uuid) -> Result<Vec<Invitation>> {
        let mut stmt = self.conn().prepare(&format!(
            "{SELECT_INVITATION} WHERE share_id = ?1 ORDER BY created_at DESC, rowid DESC"
        ))?;

        let rows = stmt.query_map(params![share_id.to_string()], row_to_invitation)?;

        let mut invitations = Vec::new();
        for row in rows {
            invitations.push(row?);
        }
        Ok(invitations)
    }

    /// Highest role among the invitations `user_id` has accepted on a share.
    pub fn accepted_role(&self, share_id: Uuid, user_id: &str) -> Result<Option<Role>> {
        let mut stmt = self.conn().prepare(
            "SELECT role FROM invitations
             WHERE share_id = ?1 AND accepted_by = ?2 AND status = 'accepted'",
        )?;

        let rows = stmt.query_map(params![share_id.to_string(), user_id], |row| {
            parsed_at::<Role>(row, 0)
        })?;

        let mut best = None;
        for row in rows {
            best = best.max(Some(row?));
        }
        Ok(best)
    }
}

fn row_to_invitation(row: &rusqlite::Row<'_>) -> rusqlite::Result<Invitation> {
    Ok(Invitation {
        id: uuid_at(row, 0)?,
        share_id: uuid_at(row, 1)?,
        invitee_email: row.get(2)?,
        role: parsed_at(row, 3)?,
        audience_type: parsed_at(row, 4)?,
        invitation_token: row.get(5)?,
        status: parsed_at(row, 6)?,
        invited_by: row.get(7)?,
        accepted_by: row.get(8)?,
        accepted_at: opt_time_at(row, 9)?,
        message: row.get(10)?,
        created_at: time_at(row, 11)?,
    })
}
