//! Permission evaluation over a user's resolved roles.
//!
//! Every check is a pure function of the roles and the already-looked-up
//! meta; nothing here touches a store or a backend.

use std::sync::Arc;

use mosaic_types::path::{base_name, clean_path, join_path, parent_path};
use mosaic_types::{Perm, PermSet, Role};

use super::meta::MetaRules;
use super::operation::{Operation, Protocol};
use crate::vfs::Obj;

/// A user's roles, ready for evaluation.
#[derive(Debug, Clone, Default)]
pub struct Grants {
    roles: Vec<Arc<Role>>,
}

impl Grants {
    pub fn new(roles: Vec<Arc<Role>>) -> Self {
        Self { roles }
    }

    pub fn roles(&self) -> &[Arc<Role>] {
        &self.roles
    }

    /// OR of every scope entry covering `path`; zero when none does.
    pub fn effective_permission(&self, path: &str) -> PermSet {
        let path = clean_path(path);
        self.roles
            .iter()
            .flat_map(|role| role.permission_scopes.iter())
            .filter(|entry| entry.covers(&path))
            .fold(PermSet::NONE, |acc, entry| acc | entry.permission)
    }

    /// True if `perm` is granted at `path`.
    pub fn has(&self, path: &str, perm: Perm) -> bool {
        self.effective_permission(path).contains(perm)
    }

    /// True if any scope entry covers `path`.
    pub fn can_read_path(&self, path: &str) -> bool {
        let path = clean_path(path);
        self.roles
            .iter()
            .flat_map(|role| role.permission_scopes.iter())
            .any(|entry| entry.covers(&path))
    }

    /// With the path-limit bit set, `path` must be covered by a scope.
    pub fn check_path_limit(&self, path: &str) -> bool {
        !self.has(path, Perm::PathLimit) || self.can_read_path(path)
    }

    /// False if hide rules hide `path` from this user.
    ///
    /// `meta` is the nearest meta of `path`'s parent directory.
    pub fn is_visible(&self, meta: Option<&MetaRules>, path: &str) -> bool {
        let Some(rules) = meta else {
            return true;
        };
        if !rules.hides_in(&parent_path(path)) || !rules.hide().matches(&base_name(path)) {
            return true;
        }
        self.has(path, Perm::SeeHides)
    }

    /// Drop the entries of a listing of `dir` that are hidden from this
    /// user.
    pub fn filter_visible(&self, meta: Option<&MetaRules>, dir: &str, objs: Vec<Obj>) -> Vec<Obj> {
        let Some(rules) = meta.filter(|rules| rules.hides_in(dir)) else {
            return objs;
        };
        objs.into_iter()
            .filter(|obj| {
                !rules.hide().matches(&obj.name)
                    || self.has(&join_path(dir, &obj.name), Perm::SeeHides)
            })
            .collect()
    }

    /// Composite gate for reaching `path` with `password`.
    pub fn can_access(&self, meta: Option<&MetaRules>, path: &str, password: &str) -> bool {
        if !self.can_read_path(path) {
            return false;
        }
        if !self.is_visible(meta, path) {
            return false;
        }
        if self.has(path, Perm::AccessWithoutPassword) {
            return true;
        }
        match meta {
            Some(rules) if rules.guards(path) => rules.meta().password == password,
            _ => true,
        }
    }

    /// Write bit, or a meta write override that applies to `path`.
    pub fn can_write(&self, meta: Option<&MetaRules>, path: &str) -> bool {
        self.has(path, Perm::Write) || meta.is_some_and(|rules| rules.grants_write(path))
    }

    /// Decide whether `op` over `protocol` is allowed at `path`.
    pub fn authorize(
        &self,
        meta: Option<&MetaRules>,
        path: &str,
        protocol: Protocol,
        op: Operation,
    ) -> bool {
        if !self.check_path_limit(path) {
            return false;
        }
        let perm = self.effective_permission(path);
        let can_write = self.can_write(meta, path);
        if op == Operation::Refresh {
            return can_write;
        }

        match protocol {
            Protocol::Http => match op {
                op if !op.is_mutating() => true,
                Operation::Write | Operation::SetProperties => can_write,
                op => operation_bits(perm, op),
            },
            Protocol::WebDav => {
                if !perm.contains(Perm::WebdavRead) {
                    return false;
                }
                match op {
                    op if !op.is_mutating() => true,
                    Operation::SetProperties => perm.contains(Perm::WebdavManage),
                    op => perm.contains(Perm::WebdavManage) && operation_bits(perm, op),
                }
            }
            Protocol::Ftp => {
                if !perm.contains(Perm::FtpAccess) {
                    return false;
                }
                match op {
                    op if !op.is_mutating() => true,
                    Operation::Write => perm.contains(Perm::FtpManage) && can_write,
                    Operation::SetProperties => perm.contains(Perm::FtpManage),
                    op => perm.contains(Perm::FtpManage) && operation_bits(perm, op),
                }
            }
        }
    }
}

/// The operation's own bit(s).
fn operation_bits(perm: PermSet, op: Operation) -> bool {
    match op {
        Operation::Read | Operation::SetProperties => true,
        Operation::Refresh | Operation::Write => perm.contains(Perm::Write),
        Operation::Rename => perm.contains(Perm::Rename),
        Operation::Move { renames } => {
            perm.contains(Perm::Move) && (!renames || perm.contains(Perm::Rename))
        }
        Operation::Copy => perm.contains(Perm::Copy),
        Operation::Remove => perm.contains(Perm::Remove),
    }
}
