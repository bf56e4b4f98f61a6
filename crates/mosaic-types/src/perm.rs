//! Permission bits.
//!
//! Positions are fixed: they are persisted inside role scopes as a raw
//! integer mask, so reordering this enum would silently re-grant stored
//! permissions. Unknown high bits in a stored mask are preserved.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};
use strum::{EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

/// One permission bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumString, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
#[repr(u8)]
pub enum Perm {
    /// See entries matched by hide patterns.
    SeeHides = 0,
    /// Skip meta password prompts.
    AccessWithoutPassword = 1,
    /// Queue offline downloads.
    AddOfflineDownload = 2,
    /// Create and upload.
    Write = 3,
    Rename = 4,
    Move = 5,
    Copy = 6,
    Remove = 7,
    /// Read over WebDAV.
    WebdavRead = 8,
    /// Mutating WebDAV verbs (combined with the operation bit).
    WebdavManage = 9,
    /// Log in over FTP.
    FtpAccess = 10,
    /// Mutating FTP commands (combined with the operation bit).
    FtpManage = 11,
    ReadArchives = 12,
    Decompress = 13,
    /// Restrict the user to paths covered by one of their role scopes.
    PathLimit = 14,
}

impl Perm {
    /// The single-bit mask for this permission.
    pub const fn mask(self) -> u32 {
        1 << (self as u32)
    }

    /// Snake-case name, as used in config and logs.
    pub fn name(self) -> &'static str {
        self.into()
    }
}

impl fmt::Display for Perm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A permission bitmask.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermSet(u32);

impl PermSet {
    /// No permissions.
    pub const NONE: PermSet = PermSet(0);

    /// Every defined bit.
    pub const ALL: PermSet = PermSet((1 << 15) - 1);

    /// Wrap a raw mask, keeping any undefined bits.
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// The raw mask.
    pub const fn bits(&self) -> u32 {
        self.0
    }

    /// True if `perm` is set.
    pub const fn contains(&self, perm: Perm) -> bool {
        self.0 & perm.mask() != 0
    }

    /// True if every bit of `perms` is set.
    pub fn contains_all(&self, perms: &[Perm]) -> bool {
        perms.iter().all(|p| self.contains(*p))
    }

    /// Return a copy with `perm` set.
    pub const fn with(self, perm: Perm) -> Self {
        Self(self.0 | perm.mask())
    }

    /// Bitwise union.
    pub const fn union(self, other: PermSet) -> Self {
        Self(self.0 | other.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Iterate the defined bits that are set.
    pub fn iter(&self) -> impl Iterator<Item = Perm> + '_ {
        Perm::iter().filter(move |p| self.contains(*p))
    }
}

impl From<Perm> for PermSet {
    fn from(perm: Perm) -> Self {
        Self(perm.mask())
    }
}

impl FromIterator<Perm> for PermSet {
    fn from_iter<I: IntoIterator<Item = Perm>>(iter: I) -> Self {
        iter.into_iter().fold(PermSet::NONE, PermSet::with)
    }
}

impl BitOr for PermSet {
    type Output = PermSet;

    fn bitor(self, rhs: PermSet) -> PermSet {
        self.union(rhs)
    }
}

impl BitOr<Perm> for PermSet {
    type Output = PermSet;

    fn bitor(self, rhs: Perm) -> PermSet {
        self.with(rhs)
    }
}

impl BitOrAssign for PermSet {
    fn bitor_assign(&mut self, rhs: PermSet) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for PermSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PermSet({:#06x})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_bit_positions_are_stable() {
        assert_eq!(Perm::SeeHides.mask(), 1);
        assert_eq!(Perm::Write.mask(), 1 << 3);
        assert_eq!(Perm::WebdavManage.mask(), 1 << 9);
        assert_eq!(Perm::PathLimit.mask(), 1 << 14);
        assert_eq!(Perm::iter().count(), 15);
    }

    #[test]
    fn test_contains() {
        let set = PermSet::from_bits(0x33FF);
        assert!(set.contains(Perm::SeeHides));
        assert!(set.contains(Perm::WebdavManage));
        assert!(!set.contains(Perm::FtpAccess));
        assert!(set.contains(Perm::ReadArchives));
        assert!(!set.contains(Perm::PathLimit));
    }

    #[test]
    fn test_union_and_collect() {
        let set: PermSet = [Perm::Write, Perm::Remove].into_iter().collect();
        assert_eq!(set.bits(), (1 << 3) | (1 << 7));
        assert_eq!(PermSet::NONE | Perm::Write | PermSet::from(Perm::Remove), set);
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![Perm::Write, Perm::Remove]);
    }

    #[test]
    fn test_undefined_bits_survive() {
        let set = PermSet::from_bits(0xFFFF);
        assert_eq!(set.bits(), 0xFFFF);
        assert!(set.contains_all(&[Perm::SeeHides, Perm::PathLimit]));
    }

    #[test]
    fn test_names() {
        assert_eq!(Perm::WebdavRead.to_string(), "webdav_read");
        assert_eq!(Perm::from_str("path_limit").unwrap(), Perm::PathLimit);
    }
}
