use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{CompilerOptions, ModuleResolution};
use crate::fs::{is_in_node_modules, normalize_path, to_slash, FileSystem};

use super::package::{parse_package_specifier, types_package_name, PackageJson};
use super::{Resolution, ResolutionCaveat, Resolver, UnresolvedReason};

/// Extensions that an explicit JavaScript extension in a specifier maps to.
const JS_SUBSTITUTIONS: &[(&str, &[&str])] = &[
    (".js", &[".ts", ".tsx", ".d.ts"]),
    (".jsx", &[".tsx", ".d.ts"]),
    (".mjs", &[".mts", ".d.mts"]),
    (".cjs", &[".cts", ".d.cts"]),
];

/// TypeScript module resolver.
///
/// Handles:
/// - tsconfig.json `paths` aliases (`@/components/Button`), then `baseUrl`
/// - Relative imports (`./foo`, `../bar`) and absolute paths
/// - Index file resolution (`./services` -> `./services/index.ts`)
/// - `node_modules` and `@types` lookup, package.json `types`/`main`/`exports`
/// - `classic` ancestor-directory lookup
///
/// No state is kept between calls; wrap it in a
/// [`CachedResolver`](super::CachedResolver) to memoize results.
pub struct ModuleResolver {
    options: CompilerOptions,
    fs: Arc<dyn FileSystem>,
}

impl ModuleResolver {
    pub fn new(options: CompilerOptions, fs: Arc<dyn FileSystem>) -> Self {
        ModuleResolver { options, fs }
    }

    fn is_classic(&self) -> bool {
        !self.options.module_resolution.is_node_style()
    }

    fn is_relative(specifier: &str) -> bool {
        specifier == "."
            || specifier == ".."
            || specifier.starts_with("./")
            || specifier.starts_with("../")
    }

    fn is_absolute(specifier: &str) -> bool {
        if specifier.starts_with('/') {
            return true;
        }
        // Windows drive paths: C:/...
        let bytes = specifier.as_bytes();
        bytes.len() > 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' && bytes[2] == b'/'
    }

    /// Whether a file named in a specifier can be used as-is.
    fn has_resolvable_extension(&self, name: &str) -> bool {
        let always: &[&str] = &[".mts", ".cts"];
        let js: &[&str] = if self.options.allow_js {
            &[".mjs", ".cjs"]
        } else {
            &[]
        };
        self.options
            .extensions()
            .iter()
            .chain(always)
            .chain(js)
            .any(|ext| name.ends_with(ext))
            || (self.options.resolve_json_module && name.ends_with(".json"))
    }

    /// Append every configured extension (and module suffix) to `base`.
    fn try_extensions(&self, base: &str) -> Option<PathBuf> {
        for ext in self.options.extensions() {
            for suffix in &self.options.module_suffixes {
                let candidate = PathBuf::from(format!("{}{}{}", base, suffix, ext));
                tracing::trace!(candidate = %candidate.display(), "probing");
                if self.fs.is_file(&candidate) {
                    return Some(candidate);
                }
            }
        }
        None
    }

    /// `./util.js` in source names the emitted file; look for its TypeScript input.
    fn try_js_substitution(&self, name: &str) -> Option<PathBuf> {
        let (stem, replacements) = JS_SUBSTITUTIONS
            .iter()
            .find_map(|(js, replacements)| name.strip_suffix(js).map(|stem| (stem, *replacements)))?;

        for ext in replacements {
            for suffix in &self.options.module_suffixes {
                let candidate = PathBuf::from(format!("{}{}{}", stem, suffix, ext));
                if self.fs.is_file(&candidate) {
                    return Some(candidate);
                }
            }
        }
        None
    }

    /// Try to resolve a candidate as a file: exact match, JS extension
    /// substitution, then each extension appended.
    fn try_file(&self, candidate: &Path) -> Option<PathBuf> {
        let name = candidate.to_str()?;

        if self.has_resolvable_extension(name) && self.fs.is_file(candidate) {
            return Some(candidate.to_path_buf());
        }

        self.try_js_substitution(name)
            .or_else(|| self.try_extensions(name))
    }

    fn try_index(&self, dir: &Path) -> Option<PathBuf> {
        let index = dir.join("index");
        self.try_extensions(index.to_str()?)
    }

    /// Try a directory: package.json entry points, then `index` files.
    fn try_directory(&self, dir: &Path) -> Option<PathBuf> {
        if !self.fs.is_dir(dir) {
            return None;
        }

        if let Some(package) = PackageJson::read(self.fs.as_ref(), dir) {
            for entry in package.entry_points() {
                let target = normalize_path(&dir.join(to_slash(entry)));
                if let Some(found) = self.try_file(&target).or_else(|| self.try_index(&target)) {
                    return Some(found);
                }
            }
        }

        self.try_index(dir)
    }

    fn try_file_or_directory(&self, candidate: &Path) -> Option<PathBuf> {
        self.try_file(candidate)
            .or_else(|| self.try_directory(candidate))
    }

    /// Candidate lookup for the current strategy; `classic` never probes directories.
    fn try_candidate(&self, candidate: &Path) -> Option<PathBuf> {
        if self.is_classic() {
            self.try_file(candidate)
        } else {
            self.try_file_or_directory(candidate)
        }
    }

    fn resolve_relative(&self, import_source: &str, from_dir: &Path) -> Resolution {
        let candidate = normalize_path(&from_dir.join(import_source));
        match self.try_candidate(&candidate) {
            Some(resolved) => Resolution::Resolved(resolved),
            None => {
                Resolution::Unresolved(UnresolvedReason::FileNotFound(import_source.to_string()))
            }
        }
    }

    /// Resolve using tsconfig.json paths aliases. `None` when no pattern
    /// matches or no substitution exists on disk.
    fn resolve_via_paths(&self, import_source: &str) -> Option<Resolution> {
        let candidates = self.options.paths.candidates(import_source)?;

        for candidate in &candidates {
            let normalized = normalize_path(candidate);
            if let Some(resolved) = self.try_candidate(&normalized) {
                return Some(Resolution::ResolvedWithCaveat(
                    resolved,
                    ResolutionCaveat::PathAlias,
                ));
            }
        }

        tracing::debug!(
            specifier = import_source,
            candidates = candidates.len(),
            "path mapping matched but no substitution exists"
        );
        None
    }

    fn resolve_via_base_url(&self, import_source: &str) -> Option<Resolution> {
        let base_url = self.options.base_url.as_ref()?;
        let candidate = normalize_path(&base_url.join(import_source));
        self.try_candidate(&candidate)
            .map(|resolved| Resolution::ResolvedWithCaveat(resolved, ResolutionCaveat::BaseUrl))
    }

    /// `classic`: look for `<dir>/<specifier>` in the containing directory and every ancestor.
    fn resolve_classic(&self, import_source: &str, from_dir: &Path) -> Resolution {
        for dir in from_dir.ancestors() {
            let candidate = normalize_path(&dir.join(import_source));
            if let Some(resolved) = self.try_file(&candidate) {
                return Resolution::Resolved(resolved);
            }
        }
        Resolution::Unresolved(UnresolvedReason::FileNotFound(import_source.to_string()))
    }

    /// Node-style: `node_modules/<pkg>` then `node_modules/@types/<pkg>` in
    /// the containing directory and every ancestor.
    fn resolve_node_modules(&self, import_source: &str, from_dir: &Path) -> Resolution {
        let (package_name, subpath) = parse_package_specifier(import_source);
        let types_name = types_package_name(package_name);

        for dir in from_dir.ancestors() {
            if dir.file_name().is_some_and(|name| name == "node_modules") {
                continue;
            }
            let node_modules = dir.join("node_modules");
            if !self.fs.is_dir(&node_modules) {
                continue;
            }

            for name in [package_name, types_name.as_str()] {
                if let Some(resolved) = self.resolve_package(&node_modules.join(name), subpath) {
                    return Resolution::External {
                        package: package_name.to_string(),
                        path: resolved,
                    };
                }
            }
        }

        Resolution::Unresolved(UnresolvedReason::PackageNotFound(import_source.to_string()))
    }

    fn resolve_package(&self, package_dir: &Path, subpath: Option<&str>) -> Option<PathBuf> {
        if !self.fs.is_dir(package_dir) {
            return None;
        }

        if self.options.module_resolution.uses_package_exports() {
            let exports = PackageJson::read(self.fs.as_ref(), package_dir)
                .and_then(|package| package.exports);
            if let Some(exports) = exports {
                // Exports are authoritative: an unexported subpath does not resolve
                let key = match subpath {
                    Some(sub) => format!("./{}", sub),
                    None => ".".to_string(),
                };
                let target = exports.resolve_subpath(&key, &self.export_conditions())?;
                return self.try_file(&normalize_path(&package_dir.join(target)));
            }
        }

        match subpath {
            Some(sub) => self.try_file_or_directory(&normalize_path(&package_dir.join(sub))),
            None => self.try_directory(package_dir),
        }
    }

    fn export_conditions(&self) -> Vec<&'static str> {
        let mut conditions = vec!["types", "import"];
        if matches!(
            self.options.module_resolution,
            ModuleResolution::Node16 | ModuleResolution::NodeNext
        ) {
            conditions.push("node");
        }
        conditions
    }

    fn resolve_non_relative(&self, import_source: &str, from_dir: &Path) -> Resolution {
        if let Some(resolution) = self.resolve_via_paths(import_source) {
            return resolution;
        }
        if let Some(resolution) = self.resolve_via_base_url(import_source) {
            return resolution;
        }

        if import_source.starts_with('#') {
            return Resolution::Unresolved(UnresolvedReason::UnsupportedSyntax(
                import_source.to_string(),
            ));
        }

        if self.is_classic() {
            self.resolve_classic(import_source, from_dir)
        } else {
            self.resolve_node_modules(import_source, from_dir)
        }
    }
}

impl Resolver for ModuleResolver {
    fn resolve(&self, import_source: &str, from_file: &Path) -> Resolution {
        // Empty import path
        if import_source.is_empty() {
            return Resolution::Unresolved(UnresolvedReason::UnsupportedSyntax(
                "empty import path".to_string(),
            ));
        }

        let specifier = import_source.replace('\\', "/");
        let from_file = normalize_path(&to_slash(&from_file.to_string_lossy()));
        let from_dir = from_file.parent().unwrap_or(Path::new("/"));

        let resolution = if Self::is_relative(&specifier) {
            self.resolve_relative(&specifier, from_dir)
        } else if Self::is_absolute(&specifier) {
            match self.try_candidate(&normalize_path(Path::new(&specifier))) {
                Some(resolved) => Resolution::Resolved(resolved),
                None => Resolution::Unresolved(UnresolvedReason::FileNotFound(specifier.clone())),
            }
        } else {
            self.resolve_non_relative(&specifier, from_dir)
        };

        let resolution = classify_external(resolution);
        tracing::debug!(
            specifier = import_source,
            from = %from_file.display(),
            resolution = ?resolution,
            "resolved module"
        );
        resolution
    }
}

/// Anything that landed inside `node_modules` is a third-party file.
fn classify_external(resolution: Resolution) -> Resolution {
    match resolution {
        Resolution::Resolved(path) | Resolution::ResolvedWithCaveat(path, _)
            if is_in_node_modules(&path) =>
        {
            Resolution::External {
                package: package_of(&path).unwrap_or_default(),
                path,
            }
        }
        other => other,
    }
}

/// The package a `node_modules` path belongs to, e.g. `@scope/pkg`.
fn package_of(path: &Path) -> Option<String> {
    let components: Vec<&str> = path
        .components()
        .filter_map(|c| c.as_os_str().to_str())
        .collect();
    let idx = components.iter().rposition(|c| *c == "node_modules")?;
    let first = components.get(idx + 1)?;
    if first.starts_with('@') {
        components
            .get(idx + 2)
            .map(|second| format!("{}/{}", first, second))
    } else {
        Some(first.to_string())
    }
}
