//! Opaque bearer tokens for shares and invitations.
//!
//! A token is 32 bytes from the OS RNG, base64url-encoded without padding.
//! It carries no embedded meaning; nothing may parse it for content.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use uuid::Uuid;

use crate::constants::{TOKEN_BYTES, TOKEN_MAX_LEN, TOKEN_MIN_LEN};

/// Generates and shape-checks bearer tokens.
pub struct TokenCodec;

impl TokenCodec {
    /// Generate a fresh unguessable token.
    pub fn generate() -> String {
        let mut bytes = [0u8; TOKEN_BYTES];
        OsRng.fill_bytes(&mut bytes);
        URL_SAFE_NO_PAD.encode(bytes)
    }

    /// Whether `token` could possibly have been issued by [`TokenCodec::generate`]
    /// (or by an older issuer using the same alphabet).
    ///
    /// This is a cheap shape check, not a lookup: a well-formed token may
    /// still be unknown.
    pub fn is_well_formed(token: &str) -> bool {
        (TOKEN_MIN_LEN..=TOKEN_MAX_LEN).contains(&token.len())
            && token
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
    }

    /// Short, non-reversible form of a token that is safe to put in logs.
    pub fn fingerprint(token: &str) -> String {
        let hash = blake3::hash(token.as_bytes());
        hex::encode(&hash.as_bytes()[..6])
    }

    /// Stable UUID derived from a token, used to give synthesized shares a
    /// deterministic id.
    pub fn derive_id(token: &str) -> Uuid {
        let mut hasher = blake3::Hasher::new_derive_key("coview-fallback-share-v1");
        hasher.update(token.as_bytes());
        let hash = hasher.finalize();
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&hash.as_bytes()[..16]);
        uuid::Builder::from_random_bytes(bytes).into_uuid()
    }
}
