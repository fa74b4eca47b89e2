//! File-system access used by the loader, the program index, and the resolver.
//!
//! Everything goes through the [`FileSystem`] trait so the provider can be
//! exercised against an in-memory tree in tests.

use std::collections::BTreeMap;
use std::io;
use std::path::{Component, Path, PathBuf};

use ignore::WalkBuilder;

/// Directories that wildcard matching never descends into.
const PACKAGE_DIRECTORIES: &[&str] = &["node_modules", "bower_components", "jspm_packages"];

/// Read-only file-system capability.
pub trait FileSystem: Send + Sync {
    fn is_file(&self, path: &Path) -> bool;

    fn is_dir(&self, path: &Path) -> bool;

    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// List every file below `root`, sorted, without descending into hidden
    /// directories or package directories (`node_modules` and friends).
    /// A missing root yields an empty list.
    fn walk_files(&self, root: &Path) -> io::Result<Vec<PathBuf>>;
}

/// Whether a directory name is skipped by [`FileSystem::walk_files`].
pub fn is_pruned_dir_name(name: &str) -> bool {
    name.starts_with('.') || PACKAGE_DIRECTORIES.contains(&name)
}

/// The host file system.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsFileSystem;

impl FileSystem for OsFileSystem {
    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn walk_files(&self, root: &Path) -> io::Result<Vec<PathBuf>> {
        if !root.is_dir() {
            return Ok(Vec::new());
        }

        let mut builder = WalkBuilder::new(root);
        builder
            .standard_filters(false)
            .follow_links(true)
            .filter_entry(|entry| {
                let is_dir = entry.file_type().is_some_and(|ft| ft.is_dir());
                if entry.depth() == 0 || !is_dir {
                    return true;
                }
                !entry.file_name().to_str().is_some_and(is_pruned_dir_name)
            });

        let mut files = Vec::new();
        for entry in builder.build() {
            let entry = entry.map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
            if entry.file_type().is_some_and(|ft| ft.is_file()) {
                files.push(normalize_path(entry.path()));
            }
        }
        files.sort();
        Ok(files)
    }
}

#[derive(Debug, Clone)]
enum MemoryEntry {
    Text(String),
    Unreadable,
}

/// An in-memory file tree. Directories exist implicitly as ancestors of files.
#[derive(Debug, Clone, Default)]
pub struct MemoryFileSystem {
    files: BTreeMap<PathBuf, MemoryEntry>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a tree from `(path, contents)` pairs.
    pub fn with_files<P, S>(files: impl IntoIterator<Item = (P, S)>) -> Self
    where
        P: AsRef<Path>,
        S: Into<String>,
    {
        let mut fs = Self::new();
        for (path, contents) in files {
            fs.add_file(path, contents);
        }
        fs
    }

    pub fn add_file(&mut self, path: impl AsRef<Path>, contents: impl Into<String>) {
        self.files.insert(
            normalize_path(path.as_ref()),
            MemoryEntry::Text(contents.into()),
        );
    }

    /// Add a file that exists but fails every read with `PermissionDenied`.
    pub fn add_unreadable(&mut self, path: impl AsRef<Path>) {
        self.files
            .insert(normalize_path(path.as_ref()), MemoryEntry::Unreadable);
    }
}

impl FileSystem for MemoryFileSystem {
    fn is_file(&self, path: &Path) -> bool {
        self.files.contains_key(&normalize_path(path))
    }

    fn is_dir(&self, path: &Path) -> bool {
        let dir = normalize_path(path);
        self.files
            .range(dir.clone()..)
            .next()
            .is_some_and(|(p, _)| p != &dir && p.starts_with(&dir))
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        match self.files.get(&normalize_path(path)) {
            Some(MemoryEntry::Text(text)) => Ok(text.clone()),
            Some(MemoryEntry::Unreadable) => Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("permission denied: {}", path.display()),
            )),
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no such file: {}", path.display()),
            )),
        }
    }

    fn walk_files(&self, root: &Path) -> io::Result<Vec<PathBuf>> {
        let root = normalize_path(root);
        let files = self
            .files
            .keys()
            .filter(|p| p.starts_with(&root) && **p != root)
            .filter(|p| {
                let relative = p.strip_prefix(&root).unwrap_or(p);
                !relative.parent().is_some_and(|dir| {
                    dir.components()
                        .any(|c| c.as_os_str().to_str().is_some_and(is_pruned_dir_name))
                })
            })
            .cloned()
            .collect();
        Ok(files)
    }
}

/// Convert a path written with either separator into a `/`-separated path.
pub fn to_slash(path: &str) -> PathBuf {
    PathBuf::from(path.replace('\\', "/"))
}

/// Normalize a path by resolving `.` and `..` components without touching the filesystem.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut components = Vec::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                // Only pop if there's a normal component to pop
                if components
                    .last()
                    .is_some_and(|c| matches!(c, Component::Normal(_)))
                {
                    components.pop();
                } else if !matches!(components.last(), Some(Component::RootDir)) {
                    components.push(component);
                }
            }
            Component::CurDir => {}
            other => components.push(other),
        }
    }
    components.iter().collect()
}

/// Whether any component of `path` is a `node_modules` directory.
pub fn is_in_node_modules(path: &Path) -> bool {
    path.components()
        .any(|c| c.as_os_str() == "node_modules")
}
