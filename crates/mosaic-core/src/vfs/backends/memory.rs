//! In-memory storage backend.
//!
//! Used for scratch mounts and testing. All data is ephemeral.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::SystemTime;

use mosaic_types::path::{base_name, clean_path, is_strict_sub_path, join_path, parent_path};

use crate::vfs::error::{VfsError, VfsResult};
use crate::vfs::types::{FileType, Link, Obj};

/// Entry in the memory tree.
#[derive(Debug, Clone)]
struct Entry {
    kind: FileType,
    size: u64,
    created: SystemTime,
    modified: SystemTime,
    locator: Option<String>,
}

impl Entry {
    fn directory() -> Self {
        let now = SystemTime::now();
        Self {
            kind: FileType::Directory,
            size: 0,
            created: now,
            modified: now,
            locator: None,
        }
    }

    fn file(size: u64, locator: Option<String>) -> Self {
        Self {
            kind: FileType::File,
            size,
            ..Self::directory()
        }
        .with_locator(locator)
    }

    fn with_locator(mut self, locator: Option<String>) -> Self {
        self.locator = locator;
        self
    }

    fn to_obj(&self, path: &str) -> Obj {
        let dir = parent_path(path);
        let name = base_name(path);
        let obj = match self.kind {
            FileType::File => Obj::file(&dir, name, self.size),
            FileType::Directory => Obj::directory(&dir, name, self.size),
        };
        let obj = obj.with_times(self.created, self.modified);
        match &self.locator {
            Some(locator) => obj.with_locator(locator.clone()),
            None => obj,
        }
    }
}

/// In-memory backend.
///
/// Thread-safe via internal `RwLock`. All data is lost when dropped.
#[derive(Debug)]
pub struct MemoryBackend {
    entries: RwLock<HashMap<String, Entry>>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub const NAME: &'static str = "memory";

    /// Create a new empty tree.
    pub fn new() -> Self {
        let mut entries = HashMap::new();
        // Root directory always exists
        entries.insert("/".to_string(), Entry::directory());
        Self {
            entries: RwLock::new(entries),
        }
    }

    /// Seed a file, creating missing parents.
    pub fn add_file(&self, path: &str, size: u64, locator: Option<String>) -> VfsResult<Obj> {
        let path = clean_path(path);
        if path == "/" {
            return Err(VfsError::invalid_path(path));
        }
        let mut entries = self
            .entries
            .write()
            .map_err(|_| VfsError::other("lock poisoned"))?;
        Self::ensure_parents(&mut entries, &path)?;
        if entries.get(&path).is_some_and(|e| e.kind.is_dir()) {
            return Err(VfsError::already_exists(path));
        }
        let entry = Entry::file(size, locator);
        let obj = entry.to_obj(&path);
        entries.insert(path, entry);
        Ok(obj)
    }

    /// Seed a directory and its parents.
    pub fn add_dir(&self, path: &str) -> VfsResult<()> {
        let path = clean_path(path);
        let mut entries = self
            .entries
            .write()
            .map_err(|_| VfsError::other("lock poisoned"))?;
        Self::ensure_parents(&mut entries, &path)?;
        match entries.get(&path) {
            Some(e) if !e.kind.is_dir() => Err(VfsError::already_exists(path)),
            Some(_) => Ok(()),
            None => {
                entries.insert(path, Entry::directory());
                Ok(())
            }
        }
    }

    /// Ensure all parent directories exist.
    fn ensure_parents(entries: &mut HashMap<String, Entry>, path: &str) -> VfsResult<()> {
        let mut current = String::new();
        let parent = parent_path(path);
        for segment in parent.split('/').filter(|s| !s.is_empty()) {
            current.push('/');
            current.push_str(segment);
            let entry = entries
                .entry(current.clone())
                .or_insert_with(Entry::directory);
            if !entry.kind.is_dir() {
                return Err(VfsError::not_a_directory(current));
            }
        }
        Ok(())
    }

    /// Direct children of `path`, sorted by name.
    pub fn list(&self, path: &str) -> VfsResult<Vec<Obj>> {
        let path = clean_path(path);
        let entries = self
            .entries
            .read()
            .map_err(|_| VfsError::other("lock poisoned"))?;

        match entries.get(&path) {
            Some(e) if e.kind.is_dir() => {}
            Some(_) => return Err(VfsError::not_a_directory(path)),
            None => return Err(VfsError::not_found(path)),
        }

        let mut result: Vec<Obj> = entries
            .iter()
            .filter(|(p, _)| p.as_str() != "/" && parent_path(p) == path)
            .map(|(p, e)| {
                let mut obj = e.to_obj(p);
                if e.kind.is_dir() {
                    obj.size = Self::subtree_size(&entries, p);
                }
                obj
            })
            .collect();

        // Sort for consistent ordering
        result.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(result)
    }

    fn subtree_size(entries: &HashMap<String, Entry>, dir: &str) -> u64 {
        entries
            .iter()
            .filter(|(p, e)| !e.kind.is_dir() && is_strict_sub_path(dir, p))
            .map(|(_, e)| e.size)
            .sum()
    }

    /// Locator for a listed file; falls back to a `memory://` URL.
    pub fn link(&self, obj: &Obj) -> VfsResult<Link> {
        if obj.is_dir() {
            return Err(VfsError::invalid_path(obj.path.clone()));
        }
        let url = obj
            .locator
            .clone()
            .unwrap_or_else(|| format!("memory://{}", obj.path));
        Ok(Link::new(url))
    }

    pub fn make_dir(&self, parent: &str, name: &str) -> VfsResult<Obj> {
        let path = join_path(parent, name);
        let mut entries = self
            .entries
            .write()
            .map_err(|_| VfsError::other("lock poisoned"))?;
        match entries.get(&clean_path(parent)) {
            Some(e) if e.kind.is_dir() => {}
            Some(_) => return Err(VfsError::not_a_directory(parent)),
            None => return Err(VfsError::not_found(parent)),
        }
        if entries.contains_key(&path) {
            return Err(VfsError::already_exists(path));
        }
        let entry = Entry::directory();
        let obj = entry.to_obj(&path);
        entries.insert(path, entry);
        Ok(obj)
    }

    /// Remove an entry and everything beneath it.
    pub fn remove(&self, path: &str) -> VfsResult<()> {
        let path = clean_path(path);
        if path == "/" {
            return Err(VfsError::invalid_path(path));
        }
        let mut entries = self
            .entries
            .write()
            .map_err(|_| VfsError::other("lock poisoned"))?;
        if entries.remove(&path).is_none() {
            return Err(VfsError::not_found(path));
        }
        entries.retain(|p, _| !is_strict_sub_path(&path, p));
        Ok(())
    }

    /// Rename an entry in place, carrying its subtree along.
    pub fn rename(&self, path: &str, new_name: &str) -> VfsResult<Obj> {
        let path = clean_path(path);
        if path == "/" || new_name.is_empty() || new_name.contains(['/', '\\']) {
            return Err(VfsError::invalid_path(path));
        }
        let target = join_path(&parent_path(&path), new_name);
        let mut entries = self
            .entries
            .write()
            .map_err(|_| VfsError::other("lock poisoned"))?;
        if !entries.contains_key(&path) {
            return Err(VfsError::not_found(path));
        }
        if entries.contains_key(&target) {
            return Err(VfsError::already_exists(target));
        }

        let moved: Vec<String> = entries
            .keys()
            .filter(|p| p.as_str() == path || is_strict_sub_path(&path, p))
            .cloned()
            .collect();
        for old in moved {
            if let Some(mut entry) = entries.remove(&old) {
                entry.modified = SystemTime::now();
                let new = format!("{target}{}", &old[path.len()..]);
                entries.insert(new, entry);
            }
        }

        entries
            .get(&target)
            .map(|e| e.to_obj(&target))
            .ok_or_else(|| VfsError::not_found(target.clone()))
    }

    /// Total bytes held.
    pub fn usage(&self) -> u64 {
        self.entries
            .read()
            .map(|entries| Self::subtree_size(&entries, "/"))
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_sorted_with_dir_sizes() {
        let fs = MemoryBackend::new();
        fs.add_file("/docs/b.txt", 3, None).unwrap();
        fs.add_file("/docs/a.txt", 2, None).unwrap();
        fs.add_file("/docs/deep/c.txt", 5, None).unwrap();

        let root = fs.list("/").unwrap();
        assert_eq!(root.len(), 1);
        assert_eq!(root[0].name, "docs");
        assert_eq!(root[0].size, 10);

        let docs = fs.list("/docs").unwrap();
        let names: Vec<_> = docs.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "b.txt", "deep"]);
        assert_eq!(docs[0].path, "/docs/a.txt");
    }

    #[test]
    fn test_list_errors() {
        let fs = MemoryBackend::new();
        fs.add_file("/f", 1, None).unwrap();
        assert!(fs.list("/missing").unwrap_err().is_not_found());
        assert!(matches!(
            fs.list("/f").unwrap_err(),
            VfsError::NotADirectory(_)
        ));
    }

    #[test]
    fn test_rename_moves_subtree() {
        let fs = MemoryBackend::new();
        fs.add_file("/old/inner/x", 4, None).unwrap();
        let renamed = fs.rename("/old", "new").unwrap();
        assert_eq!(renamed.path, "/new");
        assert!(fs.list("/old").is_err());
        assert_eq!(fs.list("/new/inner").unwrap()[0].name, "x");
    }

    #[test]
    fn test_remove_and_usage() {
        let fs = MemoryBackend::new();
        fs.add_file("/a/x", 4, None).unwrap();
        fs.add_file("/b", 6, None).unwrap();
        assert_eq!(fs.usage(), 10);
        fs.remove("/a").unwrap();
        assert_eq!(fs.usage(), 6);
        assert!(fs.remove("/a").unwrap_err().is_not_found());
    }

    #[test]
    fn test_make_dir_and_link() {
        let fs = MemoryBackend::new();
        let dir = fs.make_dir("/", "new").unwrap();
        assert!(dir.is_dir());
        assert!(fs.make_dir("/", "new").is_err());

        let file = fs
            .add_file("/new/f.bin", 1, Some("https://cdn/f.bin".into()))
            .unwrap();
        assert_eq!(fs.link(&file).unwrap().url, "https://cdn/f.bin");
        assert!(fs.link(&dir).is_err());
    }
}
