//! Listing merge.
//!
//! Several sources can imply the same directory at one level: two mounts
//! under `/repo/a`, or a backend folder that shares its name with a deeper
//! mount. The user sees one node whose size is the sum of all of them.
//! Files are never folded; two files with one name are both listed.

use std::collections::HashMap;

use super::types::Obj;

/// Incremental merge accumulator.
///
/// Keeps supply order: base entries first, then each pushed entry that was
/// not folded into an existing directory.
#[derive(Debug, Default, Clone)]
pub struct ObjMerge {
    objs: Vec<Obj>,
    /// Directory name -> index of the node that absorbs same-named dirs.
    dirs: HashMap<String, usize>,
}

impl ObjMerge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a backend's real listing.
    ///
    /// Real entries are taken verbatim, even if the backend returned two
    /// directories with one name; only later pushes are folded.
    pub fn with_base(real: Vec<Obj>) -> Self {
        let mut dirs = HashMap::new();
        for (index, obj) in real.iter().enumerate() {
            if obj.is_dir() {
                dirs.entry(obj.name.clone()).or_insert(index);
            }
        }
        Self { objs: real, dirs }
    }

    /// Append one entry, folding it into a same-named directory if any.
    pub fn push(&mut self, obj: Obj) {
        if !obj.is_dir() {
            self.objs.push(obj);
            return;
        }
        match self.dirs.get(&obj.name) {
            Some(&index) => fold_dir(&mut self.objs[index], &obj),
            None => {
                self.dirs.insert(obj.name.clone(), self.objs.len());
                self.objs.push(obj);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.objs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objs.is_empty()
    }

    pub fn as_slice(&self) -> &[Obj] {
        &self.objs
    }

    pub fn into_vec(self) -> Vec<Obj> {
        self.objs
    }
}

impl Extend<Obj> for ObjMerge {
    fn extend<I: IntoIterator<Item = Obj>>(&mut self, iter: I) {
        for obj in iter {
            self.push(obj);
        }
    }
}

/// Fold `incoming` into `existing`.
///
/// Name, kind, path and locator stay as they were. Size accumulates; the
/// timestamps widen to the earliest creation and the latest modification
/// so the result does not depend on fold order.
fn fold_dir(existing: &mut Obj, incoming: &Obj) {
    existing.size = existing.size.saturating_add(incoming.size);
    existing.created = existing.created.min(incoming.created);
    existing.modified = existing.modified.max(incoming.modified);
}

/// Merge synthetic entries into a real listing.
pub fn merge_objs(real: Vec<Obj>, synthetic: impl IntoIterator<Item = Obj>) -> Vec<Obj> {
    let mut merge = ObjMerge::with_base(real);
    merge.extend(synthetic);
    merge.into_vec()
}
