//! Virtual filesystem layer.
//!
//! Mounts, listing merge and per-driver aggregation.
//!
//! # Architecture
//!
//! ```text
//! request path
//!     │
//!     ▼
//! MountSnapshot::resolve ──► Backend (longest prefix)
//!     │                        ├── Memory
//!     │                        └── Releases ──► MountAggregator ──► ReleasePoint*
//!     ▼
//! MountSnapshot::virtual_children (deeper mounts)
//!     │
//!     ▼
//! ObjMerge ──► Vec<Obj>
//! ```

pub mod aggregate;
pub mod backends;
pub mod error;
pub mod merge;
pub mod mount;
pub mod types;

pub use aggregate::{AggregateOptions, AggregatePoint, MountAggregator, Relation};
pub use backends::Backend;
pub use error::{VfsError, VfsResult};
pub use merge::{merge_objs, ObjMerge};
pub use mount::{Mount, MountInfo, MountSnapshot, MountTable, Resolved};
pub use types::{FileType, Link, ListArgs, Obj};
