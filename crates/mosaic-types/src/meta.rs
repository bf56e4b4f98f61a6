//! Per-path metadata: password gate, hide patterns, write override.

use serde::{Deserialize, Serialize};

use crate::path::{is_sub_path, path_equal};

/// Rules attached to a directory and, optionally, its subtree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    pub path: String,
    /// Empty means no password.
    #[serde(default)]
    pub password: String,
    /// Password also guards sub-folders.
    #[serde(default)]
    pub p_sub: bool,
    /// Grants write regardless of role bits.
    #[serde(default)]
    pub write: bool,
    #[serde(default)]
    pub w_sub: bool,
    /// Hide patterns, one regular expression per line.
    #[serde(default)]
    pub hide: String,
    /// Hide patterns also apply in sub-folders.
    #[serde(default)]
    pub h_sub: bool,
}

impl Meta {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Require `password`, optionally for the whole subtree.
    pub fn with_password(mut self, password: impl Into<String>, sub: bool) -> Self {
        self.password = password.into();
        self.p_sub = sub;
        self
    }

    /// Hide entries matching `patterns`, optionally for the whole subtree.
    pub fn with_hide(mut self, patterns: impl Into<String>, sub: bool) -> Self {
        self.hide = patterns.into();
        self.h_sub = sub;
        self
    }

    /// Grant write, optionally for the whole subtree.
    pub fn with_write(mut self, sub: bool) -> Self {
        self.write = true;
        self.w_sub = sub;
        self
    }

    /// True if a rule defined here with the given `sub` flag governs `path`.
    pub fn applies_to(&self, path: &str, sub: bool) -> bool {
        path_equal(&self.path, path) || (sub && is_sub_path(&self.path, path))
    }

    pub fn has_password(&self) -> bool {
        !self.password.is_empty()
    }

    pub fn has_hide(&self) -> bool {
        !self.hide.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_applies_to() {
        let meta = Meta::new("/docs");
        assert!(meta.applies_to("/docs", false));
        assert!(!meta.applies_to("/docs/x", false));
        assert!(meta.applies_to("/docs/x", true));
        assert!(!meta.applies_to("/other", true));
    }
}
