use std::fmt;
use std::path::{Path, PathBuf};

pub mod cache;
pub mod package;
pub mod typescript;

pub use cache::CachedResolver;
pub use typescript::ModuleResolver;

/// Result of resolving a module specifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Successfully resolved to an absolute file path.
    Resolved(PathBuf),
    /// Resolved, but through a configuration rule rather than the file layout.
    ResolvedWithCaveat(PathBuf, ResolutionCaveat),
    /// Resolved to a file inside a `node_modules` package.
    External { package: String, path: PathBuf },
    /// No candidate exists anywhere in the search order. Not an error.
    Unresolved(UnresolvedReason),
}

impl Resolution {
    /// The resolved file, for every variant except `Unresolved`.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Resolution::Resolved(path)
            | Resolution::ResolvedWithCaveat(path, _)
            | Resolution::External { path, .. } => Some(path),
            Resolution::Unresolved(_) => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        !matches!(self, Resolution::Unresolved(_))
    }

    pub fn is_external(&self) -> bool {
        matches!(self, Resolution::External { .. })
    }
}

/// Caveats about how a resolution was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolutionCaveat {
    /// Resolved via a `compilerOptions.paths` alias.
    PathAlias,
    /// Resolved relative to `compilerOptions.baseUrl`.
    BaseUrl,
}

/// Reasons why a specifier could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnresolvedReason {
    /// A relative, absolute, or aliased path that matched no file.
    FileNotFound(String),
    /// A bare specifier that matched no package.
    PackageNotFound(String),
    /// The specifier form is not handled by this resolver.
    UnsupportedSyntax(String),
}

impl fmt::Display for UnresolvedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnresolvedReason::FileNotFound(spec) => write!(f, "file not found: {}", spec),
            UnresolvedReason::PackageNotFound(spec) => write!(f, "package not found: {}", spec),
            UnresolvedReason::UnsupportedSyntax(spec) => {
                write!(f, "unsupported specifier: {}", spec)
            }
        }
    }
}

/// Module resolution.
///
/// The resolver takes a specifier exactly as written in source (e.g. `"./utils"`,
/// `"@/components/Button"`) and the file containing it, and resolves it to an
/// actual file path.
pub trait Resolver: Send + Sync {
    /// - `import_source`: the string literal from the import statement (e.g. `"./utils"`)
    /// - `from_file`: the absolute path of the file containing the import
    fn resolve(&self, import_source: &str, from_file: &Path) -> Resolution;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_path() {
        let resolved = Resolution::Resolved(PathBuf::from("/p/a.ts"));
        assert_eq!(resolved.path(), Some(Path::new("/p/a.ts")));
        assert!(resolved.is_resolved());

        let external = Resolution::External {
            package: "react".to_string(),
            path: PathBuf::from("/p/node_modules/react/index.d.ts"),
        };
        assert!(external.is_external());
        assert_eq!(
            external.path(),
            Some(Path::new("/p/node_modules/react/index.d.ts"))
        );

        let unresolved = Resolution::Unresolved(UnresolvedReason::FileNotFound("./x".into()));
        assert_eq!(unresolved.path(), None);
        assert!(!unresolved.is_resolved());
    }

    #[test]
    fn test_unresolved_reason_display() {
        assert_eq!(
            UnresolvedReason::PackageNotFound("lodash".into()).to_string(),
            "package not found: lodash"
        );
    }
}
