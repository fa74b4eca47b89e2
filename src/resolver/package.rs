//! package.json handling for node-style resolution.

use std::fmt;
use std::path::Path;

use serde::de::{self, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::Deserialize;

use crate::config::jsonc::strip_jsonc;
use crate::fs::FileSystem;

/// The package.json fields module resolution reads.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PackageJson {
    pub types: Option<String>,
    pub typings: Option<String>,
    pub main: Option<String>,
    pub exports: Option<PackageExports>,
}

impl PackageJson {
    /// Read `<dir>/package.json`. A missing or malformed file yields `None`;
    /// the directory is then probed as a plain directory.
    pub fn read(fs: &dyn FileSystem, dir: &Path) -> Option<Self> {
        let path = dir.join("package.json");
        if !fs.is_file(&path) {
            return None;
        }
        let content = match fs.read_to_string(&path) {
            Ok(content) => content,
            Err(err) => {
                tracing::debug!(path = %path.display(), error = %err, "cannot read package.json");
                return None;
            }
        };
        match serde_json::from_str(&strip_jsonc(&content)) {
            Ok(package) => Some(package),
            Err(err) => {
                tracing::debug!(path = %path.display(), error = %err, "malformed package.json");
                None
            }
        }
    }

    /// Entry points for the package root, in lookup order: `types`, `typings`, `main`.
    pub fn entry_points(&self) -> impl Iterator<Item = &str> {
        [&self.types, &self.typings, &self.main]
            .into_iter()
            .filter_map(|field| field.as_deref())
            .filter(|entry| !entry.is_empty())
    }
}

/// The `exports` field. Object entries keep their JSON key order, which
/// decides condition precedence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageExports {
    Target(String),
    /// Keys start with `.`: `"."`, `"./feature"`, `"./lib/*"`.
    Subpaths(Vec<(String, PackageExports)>),
    /// Keys are condition names: `"types"`, `"import"`, `"default"`.
    Conditions(Vec<(String, PackageExports)>),
    /// An array of alternatives; the first that resolves wins.
    Fallbacks(Vec<PackageExports>),
    /// `null`: explicitly not exported.
    Blocked,
}

impl PackageExports {
    /// Map a package subpath (`"."` or `"./feature"`) to its export target,
    /// relative to the package directory, with any `*` substituted.
    pub fn resolve_subpath(&self, subpath: &str, conditions: &[&str]) -> Option<String> {
        match self {
            PackageExports::Subpaths(entries) => {
                if let Some((_, value)) = entries.iter().find(|(key, _)| key == subpath) {
                    return value.resolve_target(conditions, None);
                }
                let (value, wildcard) = entries
                    .iter()
                    .filter_map(|(key, value)| {
                        match_export_pattern(key, subpath).map(|w| (key, value, w))
                    })
                    .max_by_key(|(key, _, _)| key.find('*').unwrap_or(key.len()))
                    .map(|(_, value, wildcard)| (value, wildcard))?;
                value.resolve_target(conditions, Some(wildcard))
            }
            // Sugar for `{ ".": <value> }`
            _ if subpath == "." => self.resolve_target(conditions, None),
            _ => None,
        }
    }

    fn resolve_target(&self, conditions: &[&str], wildcard: Option<&str>) -> Option<String> {
        match self {
            PackageExports::Target(target) => {
                if !target.starts_with("./") {
                    return None;
                }
                Some(match wildcard {
                    Some(w) => target.replace('*', w),
                    None => target.clone(),
                })
            }
            PackageExports::Conditions(entries) => {
                for (condition, value) in entries {
                    if condition != "default" && !conditions.contains(&condition.as_str()) {
                        continue;
                    }
                    if *value == PackageExports::Blocked {
                        return None;
                    }
                    if let Some(target) = value.resolve_target(conditions, wildcard) {
                        return Some(target);
                    }
                }
                None
            }
            PackageExports::Fallbacks(values) => values
                .iter()
                .find_map(|value| value.resolve_target(conditions, wildcard)),
            PackageExports::Subpaths(_) | PackageExports::Blocked => None,
        }
    }
}

impl<'de> Deserialize<'de> for PackageExports {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct ExportsVisitor;

        impl<'de> Visitor<'de> for ExportsVisitor {
            type Value = PackageExports;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a string, array, object, or null")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                Ok(PackageExports::Target(v.to_string()))
            }

            fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
                Ok(PackageExports::Blocked)
            }

            fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
                Ok(PackageExports::Blocked)
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let mut values = Vec::new();
                while let Some(value) = seq.next_element::<PackageExports>()? {
                    values.push(value);
                }
                Ok(PackageExports::Fallbacks(values))
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries = Vec::new();
                while let Some((key, value)) = map.next_entry::<String, PackageExports>()? {
                    entries.push((key, value));
                }
                let is_subpath_map = entries.first().is_some_and(|(key, _)| key.starts_with('.'));
                if is_subpath_map {
                    Ok(PackageExports::Subpaths(entries))
                } else {
                    Ok(PackageExports::Conditions(entries))
                }
            }
        }

        deserializer.deserialize_any(ExportsVisitor)
    }
}

/// Split a bare specifier into package name and subpath.
/// e.g. "lodash/debounce" -> ("lodash", Some("debounce")),
/// "@scope/pkg/sub" -> ("@scope/pkg", Some("sub"))
pub fn parse_package_specifier(specifier: &str) -> (&str, Option<&str>) {
    let name_end = if specifier.starts_with('@') {
        // Scoped package: @scope/package or @scope/package/subpath
        match specifier.find('/') {
            Some(first_slash) => specifier[first_slash + 1..]
                .find('/')
                .map(|second| first_slash + 1 + second),
            None => None,
        }
    } else {
        specifier.find('/')
    };

    match name_end {
        Some(end) => (&specifier[..end], Some(&specifier[end + 1..])),
        None => (specifier, None),
    }
}

/// The `@types` package that carries typings for `package_name`.
/// `@scope/pkg` maps to `@types/scope__pkg`.
pub fn types_package_name(package_name: &str) -> String {
    let stripped = package_name.strip_prefix('@').unwrap_or(package_name);
    format!("@types/{}", stripped.replace('/', "__"))
}

/// Match an export pattern with at most one `*` against a subpath.
/// Returns the text matched by the wildcard.
fn match_export_pattern<'a>(pattern: &str, subpath: &'a str) -> Option<&'a str> {
    let (prefix, suffix) = pattern.split_once('*')?;
    if suffix.contains('*') || subpath.len() < prefix.len() + suffix.len() {
        return None;
    }
    if subpath.starts_with(prefix) && subpath.ends_with(suffix) {
        Some(&subpath[prefix.len()..subpath.len() - suffix.len()])
    } else {
        None
    }
}
