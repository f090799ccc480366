//! v001 -- Initial schema creation.
//!
//! Creates the five core tables: `shares`, `invitations`, `comments`,
//! `reactions` and `access_log`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Shares
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS shares (
    id          TEXT PRIMARY KEY NOT NULL,    -- UUID v4
    resource_id TEXT NOT NULL,                -- may be a synthesized draft-… id
    owner_id    TEXT NOT NULL,
    share_token TEXT NOT NULL UNIQUE,         -- opaque bearer token
    title       TEXT NOT NULL,
    description TEXT,
    created_at  TEXT NOT NULL,                -- RFC-3339, microseconds, UTC
    expires_at  TEXT
);

CREATE INDEX IF NOT EXISTS idx_shares_resource_owner
    ON shares(resource_id, owner_id, created_at DESC);

CREATE INDEX IF NOT EXISTS idx_shares_owner ON shares(owner_id);

-- ----------------------------------------------------------------
-- Invitations
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS invitations (
    id               TEXT PRIMARY KEY NOT NULL,   -- UUID v4
    share_id         TEXT NOT NULL,               -- FK -> shares(id)
    invitee_email    TEXT NOT NULL,
    role             TEXT NOT NULL CHECK (role IN ('viewer', 'commenter', 'editor')),
    audience_type    TEXT NOT NULL
        CHECK (audience_type IN ('family', 'tax_accountant', 'consultant', 'general')),
    invitation_token TEXT NOT NULL UNIQUE,
    status           TEXT NOT NULL DEFAULT 'pending' CHECK (status IN ('pending', 'accepted')),
    invited_by       TEXT NOT NULL,
    accepted_by      TEXT,
    accepted_at      TEXT,
    message          TEXT,
    created_at       TEXT NOT NULL,

    CHECK ((accepted_by IS NULL) = (accepted_at IS NULL)),
    FOREIGN KEY (share_id) REFERENCES shares(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_invitations_share ON invitations(share_id, created_at DESC);
CREATE INDEX IF NOT EXISTS idx_invitations_accepted_by ON invitations(share_id, accepted_by);

-- ----------------------------------------------------------------
-- Comments
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS comments (
    id         TEXT PRIMARY KEY NOT NULL,     -- UUID v4
    share_id   TEXT NOT NULL,                 -- FK -> shares(id)
    author_id  TEXT NOT NULL,
    content    TEXT NOT NULL,
    tags       TEXT NOT NULL DEFAULT '[]',    -- JSON array of strings
    parent_id  TEXT,                          -- top-level comment, no FK: replies outlive it
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,

    FOREIGN KEY (share_id) REFERENCES shares(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_comments_share ON comments(share_id);

-- ----------------------------------------------------------------
-- Reactions
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS reactions (
    id         TEXT PRIMARY KEY NOT NULL,     -- UUID v4
    comment_id TEXT NOT NULL,                 -- FK -> comments(id)
    author_id  TEXT NOT NULL,
    reaction   TEXT NOT NULL CHECK (reaction IN ('agree', 'disagree', 'question')),
    created_at TEXT NOT NULL,

    FOREIGN KEY (comment_id) REFERENCES comments(id) ON DELETE CASCADE
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_reactions_unique
    ON reactions(comment_id, author_id, reaction);

-- ----------------------------------------------------------------
-- Access log (append-only)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS access_log (
    id             TEXT PRIMARY KEY NOT NULL, -- UUID v4
    share_id       TEXT NOT NULL,             -- FK -> shares(id)
    actor_id       TEXT,                      -- NULL for anonymous visitors
    action         TEXT NOT NULL CHECK (action IN ('view', 'comment', 'edit', 'download')),
    client_context TEXT NOT NULL DEFAULT '',
    created_at     TEXT NOT NULL,

    FOREIGN KEY (share_id) REFERENCES shares(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_access_log_share ON access_log(share_id, created_at DESC);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
