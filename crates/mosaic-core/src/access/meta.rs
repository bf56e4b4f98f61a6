//! Path metadata lookup.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

use mosaic_types::path::{clean_path, parent_path};
use mosaic_types::Meta;

use super::hide::HideRules;

/// A [`Meta`] with its hide patterns compiled once.
#[derive(Debug, Clone)]
pub struct MetaRules {
    meta: Meta,
    hide: HideRules,
}

impl MetaRules {
    pub fn new(mut meta: Meta) -> Self {
        meta.path = clean_path(&meta.path);
        let hide = if meta.has_hide() {
            HideRules::compile(&meta.hide)
        } else {
            HideRules::default()
        };
        Self { meta, hide }
    }

    pub fn meta(&self) -> &Meta {
        &self.meta
    }

    pub fn hide(&self) -> &HideRules {
        &self.hide
    }

    /// True if the hide rules govern entries listed in `dir`.
    pub fn hides_in(&self, dir: &str) -> bool {
        !self.hide.is_empty() && self.meta.applies_to(dir, self.meta.h_sub)
    }

    /// True if the password guards `path`.
    pub fn guards(&self, path: &str) -> bool {
        self.meta.has_password() && self.meta.applies_to(path, self.meta.p_sub)
    }

    /// True if the write override applies to `path`.
    pub fn grants_write(&self, path: &str) -> bool {
        self.meta.write && self.meta.applies_to(path, self.meta.w_sub)
    }
}

/// All configured metas, keyed by clean path.
#[derive(Debug, Default)]
pub struct MetaTable {
    metas: RwLock<BTreeMap<String, Arc<MetaRules>>>,
}

impl MetaTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the meta at its path.
    pub fn set(&self, meta: Meta) {
        let rules = Arc::new(MetaRules::new(meta));
        self.metas
            .write()
            .insert(rules.meta.path.clone(), rules);
    }

    pub fn remove(&self, path: &str) -> bool {
        self.metas.write().remove(&clean_path(path)).is_some()
    }

    /// The meta defined exactly at `path`.
    pub fn get(&self, path: &str) -> Option<Arc<MetaRules>> {
        self.metas.read().get(&clean_path(path)).cloned()
    }

    /// The meta at `path` or its closest ancestor.
    pub fn nearest(&self, path: &str) -> Option<Arc<MetaRules>> {
        let metas = self.metas.read();
        let mut candidate = clean_path(path);
        loop {
            if let Some(rules) = metas.get(&candidate) {
                return Some(Arc::clone(rules));
            }
            if candidate == "/" {
                return None;
            }
            candidate = parent_path(&candidate);
        }
    }

    pub fn clear(&self) {
        self.metas.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nearest_ancestor() {
        let table = MetaTable::new();
        table.set(Meta::new("/docs/").with_password("pw", true));
        table.set(Meta::new("/"));

        assert_eq!(table.nearest("/docs/a/b").unwrap().meta().path, "/docs");
        assert_eq!(table.nearest("/docsx").unwrap().meta().path, "/");
        assert!(table.get("/docs/a").is_none());
        assert!(table.remove("/"));
        assert!(table.nearest("/other").is_none());
    }

    #[test]
    fn test_rule_scopes() {
        let rules = MetaRules::new(
            Meta::new("/d")
                .with_password("pw", false)
                .with_hide("^x", true)
                .with_write(false),
        );
        assert!(rules.guards("/d"));
        assert!(!rules.guards("/d/sub"));
        assert!(rules.hides_in("/d/sub"));
        assert!(rules.grants_write("/d"));
        assert!(!rules.grants_write("/d/sub"));
    }

    #[test]
    fn test_blank_hide_hides_nothing() {
        let rules = MetaRules::new(Meta::new("/d").with_hide("  \n ", true));
        assert!(rules.hide().is_empty());
        assert!(!rules.hides_in("/d"));
    }
}
