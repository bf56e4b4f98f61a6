//! Shared path, permission, role and user types for mosaic.
//!
//! This crate is the leaf of the workspace: plain data plus the pure
//! helpers every other layer agrees on. It has **no async and no I/O**;
//! path cleaning, scope matching and bitmask math live here so the
//! resolver, the permission engine and the stores all apply the same rules.
//!
//! # Key Types
//!
//! |--------------------|----------------------------------------------|
//! | Type               | Purpose                                      |
//! |--------------------|----------------------------------------------|
//! | [`Perm`]           | One permission bit (see-hides … path-limit)  |
//! | [`PermSet`]        | A bitmask of [`Perm`]s                       |
//! | [`PermissionEntry`]| `(path prefix, mask)` owned by a role        |
//! | [`Role`]           | Named, ordered list of permission entries    |
//! | [`User`]           | Username, base path, weak role references    |
//! | [`Meta`]           | Per-path password and hide rules             |
//! |--------------------|----------------------------------------------|

pub mod ids;
pub mod meta;
pub mod path;
pub mod perm;
pub mod role;
pub mod user;

pub use ids::{RoleId, UserId};
pub use meta::Meta;
pub use path::PathError;
pub use perm::{Perm, PermSet};
pub use role::{PermissionEntry, Role, ADMIN_ROLE_NAME, GUEST_ROLE_NAME};
pub use user::User;
