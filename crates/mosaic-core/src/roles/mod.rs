//! Roles, users and their caches.
//!
//! ```text
//! RoleManager ──plan──► store writes ──► cache invalidation
//!      │
//!      ▼
//! RoleCache / UserCache (moka, coalesced loads)
//!      │
//!      ▼
//! RoleStore (MemoryStore | SqliteStore)
//! ```

mod cache;
mod manager;
pub mod plan;
mod sqlite;
mod store;

pub use cache::{RoleCache, RoleKey, UserCache};
pub use manager::{PathRenameReport, RoleManager, RoleUpdateReport};
pub use sqlite::SqliteStore;
pub use store::{MemoryStore, RoleStore};
