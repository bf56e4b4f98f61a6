//! Role-based access control.
//!
//! A user's effective permission at a path is the OR of every scope entry
//! covering it, across all of the user's roles. Metas add password gates,
//! hide patterns and write overrides on top.

mod engine;
mod error;
mod grants;
mod hide;
mod meta;
mod operation;

pub use engine::PermissionEngine;
pub use error::{AccessError, AccessResult};
pub use grants::Grants;
pub use hide::HideRules;
pub use meta::{MetaRules, MetaTable};
pub use operation::{Operation, Protocol};
