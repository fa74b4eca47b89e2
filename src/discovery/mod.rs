use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::{GlobBuilder, GlobMatcher};

use crate::fs::FileSystem;

/// Root file specs from a configuration, anchored to absolute `/`-separated paths.
#[derive(Debug, Clone, Default)]
pub struct FileSpecs {
    /// Explicit `files` entries. Kept even if missing; not subject to `exclude`.
    pub files: Vec<PathBuf>,
    /// `include` patterns.
    pub include: Vec<String>,
    /// `exclude` patterns. A match on any ancestor directory excludes the file.
    pub exclude: Vec<String>,
}

/// A pattern split into the literal directory to walk and the glob below it.
struct CompiledPattern {
    base: PathBuf,
    rest: Option<GlobMatcher>,
    matches_hidden: bool,
}

impl CompiledPattern {
    /// Compile an include or exclude pattern. A final component with no
    /// wildcard and no extension names a directory when `implicit_dir` is set.
    fn new(pattern: &str, implicit_dir: bool) -> Result<Self> {
        let mut components: Vec<&str> = pattern.split('/').collect();
        let last = components.last().copied().unwrap_or("");
        if implicit_dir && !last.contains(['.', '*', '?']) {
            components.extend(["**", "*"]);
        }

        let first_wild = components
            .iter()
            .position(|c| c.contains(['*', '?']))
            .unwrap_or(components.len());

        let base = match components[..first_wild].join("/") {
            b if b.is_empty() => PathBuf::from("/"),
            b => PathBuf::from(b),
        };

        if first_wild == components.len() {
            return Ok(Self {
                base,
                rest: None,
                matches_hidden: true,
            });
        }

        let rest = components[first_wild..].join("/");
        let matcher = GlobBuilder::new(&rest)
            .literal_separator(true)
            .build()
            .with_context(|| format!("invalid file pattern {:?}", pattern))?
            .compile_matcher();

        Ok(Self {
            base,
            matches_hidden: components[first_wild..].iter().any(|c| c.starts_with('.')),
            rest: Some(matcher),
        })
    }

    fn is_match(&self, path: &Path) -> bool {
        match &self.rest {
            None => path == self.base,
            Some(matcher) => path
                .strip_prefix(&self.base)
                .is_ok_and(|rel| matcher.is_match(rel) && (self.matches_hidden || !is_hidden(rel))),
        }
    }

    /// Exclusion matches the path itself or any of its ancestors.
    fn excludes(&self, path: &Path) -> bool {
        match &self.rest {
            None => path.starts_with(&self.base),
            Some(matcher) => path.strip_prefix(&self.base).is_ok_and(|rel| {
                rel.ancestors()
                    .filter(|a| !a.as_os_str().is_empty())
                    .any(|a| matcher.is_match(a))
            }),
        }
    }
}

fn is_hidden(rel: &Path) -> bool {
    rel.components()
        .any(|c| c.as_os_str().to_str().is_some_and(|s| s.starts_with('.')))
}

/// Expand file specs into the ordered, duplicate-free root file list.
///
/// Explicit files come first, in declared order; then wildcard matches per
/// include pattern, in path order. Wildcard matches must carry one of the
/// extensions in `extension_groups`, and a match is dropped when a sibling
/// with the same stem and an earlier extension of the same group was matched too.
pub fn expand_root_files(
    fs: &dyn FileSystem,
    specs: &FileSpecs,
    extension_groups: &[Vec<&'static str>],
) -> Result<Vec<PathBuf>> {
    let mut seen: HashSet<PathBuf> = HashSet::new();
    let mut files: Vec<PathBuf> = Vec::new();
    for file in &specs.files {
        if seen.insert(file.clone()) {
            files.push(file.clone());
        }
    }

    let excludes = specs
        .exclude
        .iter()
        .map(|p| CompiledPattern::new(p, false))
        .collect::<Result<Vec<_>>>()?;

    let mut matched: Vec<PathBuf> = Vec::new();
    for pattern in &specs.include {
        let include = CompiledPattern::new(pattern, true)?;
        let candidates = fs
            .walk_files(&include.base)
            .with_context(|| format!("failed to walk {}", include.base.display()))?;

        for path in candidates {
            if seen.contains(&path)
                || !include.is_match(&path)
                || split_extension(&path, extension_groups).is_none()
                || excludes.iter().any(|ex| ex.excludes(&path))
            {
                continue;
            }
            seen.insert(path.clone());
            matched.push(path);
        }
    }

    let kept: Vec<PathBuf> = matched
        .iter()
        .filter(|path| !is_shadowed(path, &seen, extension_groups))
        .cloned()
        .collect();

    files.extend(kept);
    Ok(files)
}

/// Find the longest extension from the groups that the file name ends with.
/// Returns (group index, position in group, stem).
fn split_extension<'a>(
    path: &'a Path,
    extension_groups: &[Vec<&'static str>],
) -> Option<(usize, usize, &'a str)> {
    let name = path.file_name()?.to_str()?;
    extension_groups
        .iter()
        .enumerate()
        .flat_map(|(g, group)| group.iter().enumerate().map(move |(i, ext)| (g, i, *ext)))
        .filter(|(_, _, ext)| name.len() > ext.len() && name.ends_with(ext))
        .max_by_key(|(_, _, ext)| ext.len())
        .map(|(g, i, ext)| (g, i, &name[..name.len() - ext.len()]))
}

fn is_shadowed(
    path: &Path,
    present: &HashSet<PathBuf>,
    extension_groups: &[Vec<&'static str>],
) -> bool {
    let Some((group, position, stem)) = split_extension(path, extension_groups) else {
        return false;
    };
    let own_ext = extension_groups[group][position];
    let is_js = own_ext == ".js" || own_ext == ".jsx";

    extension_groups[group][..position].iter().any(|higher| {
        // A declaration file next to a JavaScript file is its typing, not its source.
        if *higher == ".d.ts" && is_js {
            return false;
        }
        present.contains(&path.with_file_name(format!("{}{}", stem, higher)))
    })
}
