use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};

/// A single `compilerOptions.paths` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMapping {
    /// The pattern as written, e.g. "@utils/*".
    pub pattern: String,
    /// The prefix before the wildcard, e.g. "@utils/" for "@utils/*"
    pub prefix: String,
    /// The suffix after the wildcard (usually empty)
    pub suffix: String,
    /// Whether the pattern contains a `*` at all. Exact patterns win over wildcards.
    pub has_wildcard: bool,
    /// Substitution targets in declared priority order.
    pub substitutions: Vec<PathSubstitution>,
}

/// A single substitution target for a path mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSubstitution {
    /// Directory the substituted text is anchored to.
    pub base: PathBuf,
    /// The text before the wildcard, e.g. "src/lib" for "src/lib*".
    pub prefix: String,
    /// The suffix after the wildcard (usually empty).
    pub suffix: String,
}

impl PathSubstitution {
    /// Splice the matched wildcard text into the target as a string, then
    /// anchor it. `src/lib*` with `-util` is `src/lib-util`, not `src/lib/-util`.
    fn substitute(&self, matched_wildcard: &str) -> PathBuf {
        self.base
            .join(format!("{}{}{}", self.prefix, matched_wildcard, self.suffix))
    }
}

/// The alias table from `compilerOptions.paths`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathMappings {
    mappings: Vec<PathMapping>,
}

impl PathMappings {
    /// Build the table from raw `paths` entries.
    ///
    /// `resolution_base` is `baseUrl` when set, otherwise the directory of the
    /// configuration file that declared `paths`.
    pub fn new(raw: &BTreeMap<String, Vec<String>>, resolution_base: &Path) -> Result<Self> {
        let mut mappings = Vec::with_capacity(raw.len());

        for (pattern, targets) in raw {
            if pattern.matches('*').count() > 1 {
                bail!("pattern {:?} can have at most one '*' character", pattern);
            }
            let (prefix, suffix) = split_on_wildcard(pattern);

            let mut substitutions = Vec::with_capacity(targets.len());
            for target in targets {
                if target.matches('*').count() > 1 {
                    bail!(
                        "substitution {:?} in pattern {:?} can have at most one '*' character",
                        target,
                        pattern
                    );
                }
                let (t_prefix, t_suffix) = split_on_wildcard(target);
                substitutions.push(PathSubstitution {
                    base: resolution_base.to_path_buf(),
                    prefix: t_prefix.to_string(),
                    suffix: t_suffix.to_string(),
                });
            }

            mappings.push(PathMapping {
                pattern: pattern.clone(),
                prefix: prefix.to_string(),
                suffix: suffix.to_string(),
                has_wildcard: pattern.contains('*'),
                substitutions,
            });
        }

        Ok(Self { mappings })
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    /// Pick the mapping that governs `specifier`: an exact pattern if one
    /// equals it, otherwise the wildcard pattern with the longest prefix.
    pub fn best_match<'a>(&self, specifier: &'a str) -> Option<(&PathMapping, &'a str)> {
        if let Some(exact) = self
            .mappings
            .iter()
            .find(|m| !m.has_wildcard && m.pattern == specifier)
        {
            return Some((exact, ""));
        }

        self.mappings
            .iter()
            .filter(|m| m.has_wildcard)
            .filter_map(|m| match_pattern(specifier, &m.prefix, &m.suffix).map(|w| (m, w)))
            .max_by_key(|(m, _)| m.prefix.len())
    }

    /// Candidate paths for `specifier`, in substitution priority order.
    /// Returns `None` when no pattern matches (as opposed to a match whose
    /// substitutions are later found not to exist).
    pub fn candidates(&self, specifier: &str) -> Option<Vec<PathBuf>> {
        let (mapping, matched_wildcard) = self.best_match(specifier)?;
        let candidates = mapping
            .substitutions
            .iter()
            .map(|sub| sub.substitute(matched_wildcard))
            .collect();
        Some(candidates)
    }
}

/// Split a pattern string on the first "*" wildcard.
/// Returns (prefix, suffix). If no wildcard, the entire string is the prefix.
fn split_on_wildcard(pattern: &str) -> (&str, &str) {
    match pattern.find('*') {
        Some(pos) => (&pattern[..pos], &pattern[pos + 1..]),
        None => (pattern, ""),
    }
}

/// Match an import path against a tsconfig path pattern.
/// Returns the portion matched by the wildcard, or None if no match.
fn match_pattern<'a>(import_path: &'a str, prefix: &str, suffix: &str) -> Option<&'a str> {
    if import_path.len() < prefix.len() + suffix.len() {
        return None;
    }
    if import_path.starts_with(prefix) && import_path.ends_with(suffix) {
        Some(&import_path[prefix.len()..import_path.len() - suffix.len()])
    } else {
        None
    }
}
