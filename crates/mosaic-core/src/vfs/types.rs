//! Core VFS types.
//!
//! [`Obj`] is the unit every listing is made of, whether it came from a
//! backend, was synthesized for a deeper mount, or was folded out of an
//! aggregated upstream.

use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use tokio_util::sync::CancellationToken;

use mosaic_types::path::join_path;

/// File type enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileType {
    /// Regular file.
    File,
    /// Directory.
    Directory,
}

impl FileType {
    /// Returns true if this is a regular file.
    pub fn is_file(&self) -> bool {
        matches!(self, FileType::File)
    }

    /// Returns true if this is a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self, FileType::Directory)
    }
}

/// A listing entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Obj {
    /// Full virtual path.
    pub path: String,
    /// Entry name (last path segment).
    pub name: String,
    /// Size in bytes; for directories, the aggregate of what they contain.
    pub size: u64,
    pub created: SystemTime,
    pub modified: SystemTime,
    pub kind: FileType,
    /// Opaque backend reference used to produce a link.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locator: Option<String>,
}

impl Obj {
    /// A file entry named `name` inside `dir`.
    pub fn file(dir: &str, name: impl Into<String>, size: u64) -> Self {
        Self::new(dir, name, size, FileType::File)
    }

    /// A directory entry named `name` inside `dir`.
    pub fn directory(dir: &str, name: impl Into<String>, size: u64) -> Self {
        Self::new(dir, name, size, FileType::Directory)
    }

    fn new(dir: &str, name: impl Into<String>, size: u64, kind: FileType) -> Self {
        let name = name.into();
        let now = SystemTime::now();
        Self {
            path: join_path(dir, &name),
            name,
            size,
            created: now,
            modified: now,
            kind,
            locator: None,
        }
    }

    /// Set both timestamps.
    pub fn with_times(mut self, created: SystemTime, modified: SystemTime) -> Self {
        self.created = created;
        self.modified = modified;
        self
    }

    /// Attach a backend locator.
    pub fn with_locator(mut self, locator: impl Into<String>) -> Self {
        self.locator = Some(locator.into());
        self
    }

    /// Returns true if this is a directory.
    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }
}

/// Per-request listing options.
#[derive(Debug, Clone, Default)]
pub struct ListArgs {
    /// Bypass memoized upstream data.
    pub refresh: bool,
    /// Abandon in-flight fetches when cancelled.
    pub cancel: CancellationToken,
}

impl ListArgs {
    /// Options that force a re-fetch.
    pub fn refresh() -> Self {
        Self {
            refresh: true,
            ..Default::default()
        }
    }

    /// Bind to a caller's cancellation token.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// A downloadable/streamable link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub url: String,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
}

impl Link {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
        }
    }
}
