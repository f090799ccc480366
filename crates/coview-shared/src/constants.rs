/// Application name
pub const APP_NAME: &str = "Coview";

/// Path segment under which shared views are served: `<origin>/collaborate/<token>`
pub const COLLABORATION_PATH: &str = "collaborate";

/// Number of random bytes in a freshly generated bearer token
pub const TOKEN_BYTES: usize = 32;

/// Accepted token length bounds (characters)
pub const TOKEN_MIN_LEN: usize = 16;
pub const TOKEN_MAX_LEN: usize = 128;

/// Maximum comment length in characters
pub const MAX_COMMENT_CHARS: usize = 10_000;

/// Maximum number of tags on a single comment
pub const MAX_COMMENT_TAGS: usize = 16;

/// Maximum invitation message length in characters
pub const MAX_INVITATION_MESSAGE_CHARS: usize = 2_000;

/// Resource ids that mean "not persisted yet"
pub const PLACEHOLDER_RESOURCE_IDS: &[&str] =
    &["", "new", "temp", "draft", "undefined", "null", "placeholder"];

/// Prefix of resource ids synthesized for shares created before their resource
pub const SYNTHETIC_RESOURCE_PREFIX: &str = "draft-";

/// Tags that pull a thread to the top of the priority ordering
pub const HIGH_ATTENTION_TAGS: &[&str] = &["risk", "needs-review", "important"];

/// Title shown on a synthesized fallback share
pub const FALLBACK_SHARE_TITLE: &str = "Demo simulation";

/// Resource id carried by every synthesized fallback share
pub const FALLBACK_RESOURCE_ID: &str = "demo";

/// Default HTTP API port (server)
pub const DEFAULT_HTTP_PORT: u16 = 8080;

/// Header carrying the authenticated user id, set by the identity provider
pub const USER_ID_HEADER: &str = "x-user-id";

/// Header carrying the authenticated user's email, set by the identity provider
pub const USER_EMAIL_HEADER: &str = "x-user-email";
