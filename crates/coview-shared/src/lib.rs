//! # coview-shared
//!
//! Types shared by every Coview crate: the closed enums that describe roles,
//! audiences and actions, the caller identity, bearer token generation, the
//! role/capability table and the shareable URL format.

pub mod constants;
pub mod error;
pub mod identity;
pub mod links;
pub mod permissions;
pub mod token;
pub mod types;
pub mod validate;

pub use error::ValidationError;
pub use identity::Identity;
pub use permissions::{AccessContext, Capability, PermissionGate, Permissions};
pub use token::TokenCodec;
pub use types::{AccessAction, AudienceType, InvitationStatus, ReactionKind, Role};
