//! Protocol-level operations.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// The front end a request arrived through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Protocol {
    Http,
    WebDav,
    Ftp,
}

/// What a request wants to do at a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// List or download.
    Read,
    /// Re-fetch upstream data while listing.
    Refresh,
    /// Upload, create a directory.
    Write,
    /// Rename in place.
    Rename,
    /// Move to another directory; `renames` when the base name changes too.
    Move { renames: bool },
    Copy,
    Remove,
    /// Set properties (WebDAV PROPPATCH).
    SetProperties,
}

impl Operation {
    /// True for operations that change stored data.
    pub fn is_mutating(self) -> bool {
        !matches!(self, Operation::Read | Operation::Refresh)
    }
}
