//! The source file provider: inventory, import extraction, and resolution
//! behind one capability trait.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{self, NormalizedOptions};
use crate::error::{ProviderError, Result};
use crate::fs::{normalize_path, to_slash, FileSystem, OsFileSystem};
use crate::model::{FileInventory, ImportRecord, ReferenceKind};
use crate::parser::{LanguageParser, ParsedFile, TypeScriptParser};
use crate::program::ProgramIndex;
use crate::resolver::{CachedResolver, ModuleResolver, Resolution, Resolver};

/// What a dependency-graph builder needs from a project.
///
/// Callers take the inventory once, extract the imports of each file, and
/// resolve each extracted specifier, assembling edges themselves.
pub trait SourceFileProvider: Send + Sync {
    /// First-party source files, declaration files excluded.
    fn source_files(&self) -> &FileInventory;

    /// Imports with a runtime effect, in source order, duplicates preserved.
    /// Works for any readable file, inside the inventory or not.
    fn imports_of(&self, file: &Path) -> Result<Vec<ImportRecord>>;

    /// Resolve `specifier` as written in `containing_file`.
    /// An unresolvable specifier is `Ok(Resolution::Unresolved(..))`.
    fn resolve(&self, containing_file: &Path, specifier: &str) -> Result<Resolution>;
}

/// [`SourceFileProvider`] for a TypeScript project configured by a tsconfig.json.
pub struct TypeScriptProvider {
    options: NormalizedOptions,
    fs: Arc<dyn FileSystem>,
    parser: Arc<dyn LanguageParser>,
    resolver: Arc<dyn Resolver>,
    index: ProgramIndex,
}

impl TypeScriptProvider {
    /// Load the configuration at `config_path` from disk and index the program.
    pub fn open(config_path: impl AsRef<Path>) -> Result<Self> {
        ProviderBuilder::new().build(config_path)
    }

    pub fn builder() -> ProviderBuilder {
        ProviderBuilder::new()
    }

    pub fn options(&self) -> &NormalizedOptions {
        &self.options
    }

    pub fn index(&self) -> &ProgramIndex {
        &self.index
    }

    /// Every import declaration, type-only ones included (with the flag set).
    pub fn declared_imports_of(&self, file: &Path) -> Result<Vec<ImportRecord>> {
        let parsed = self.parse_file(file)?;
        Ok(parsed
            .references
            .iter()
            .filter(|r| r.kind == ReferenceKind::Import)
            .map(ImportRecord::from)
            .collect())
    }

    /// Read and parse one file, surfacing every failure.
    fn parse_file(&self, file: &Path) -> Result<ParsedFile> {
        let path = canonical(file);
        let source = self
            .fs
            .read_to_string(&path)
            .map_err(|source| ProviderError::SourceUnavailable {
                path: path.clone(),
                source,
            })?;

        let parsed = self
            .parser
            .parse(&source, &path)
            .map_err(|err| ProviderError::Parser {
                path: path.clone(),
                message: format!("{:#}", err),
            })?;

        if let Some(error) = parsed.first_syntax_error() {
            return Err(ProviderError::Syntax {
                path,
                position: error.position,
                message: error.message.clone(),
            });
        }
        Ok(parsed)
    }
}

impl SourceFileProvider for TypeScriptProvider {
    fn source_files(&self) -> &FileInventory {
        self.index.inventory()
    }

    fn imports_of(&self, file: &Path) -> Result<Vec<ImportRecord>> {
        let records = self
            .declared_imports_of(file)?
            .into_iter()
            .filter(|record| !record.is_type_only)
            .collect();
        Ok(records)
    }

    fn resolve(&self, containing_file: &Path, specifier: &str) -> Result<Resolution> {
        if specifier.is_empty() {
            return Err(ProviderError::InvalidSpecifier {
                specifier: specifier.to_string(),
                reason: "specifier is empty".to_string(),
            });
        }
        let containing = canonical(containing_file);
        if !containing.has_root() {
            return Err(ProviderError::InvalidSpecifier {
                specifier: specifier.to_string(),
                reason: format!(
                    "containing file {} is not absolute",
                    containing_file.display()
                ),
            });
        }
        Ok(self.resolver.resolve(specifier, &containing))
    }
}

/// Normalized `/`-separated form of a caller-supplied path.
fn canonical(path: &Path) -> PathBuf {
    normalize_path(&to_slash(&path.to_string_lossy()))
}

/// Assembles a [`TypeScriptProvider`] with injected services.
pub struct ProviderBuilder {
    fs: Arc<dyn FileSystem>,
    parser: Arc<dyn LanguageParser>,
    cache_resolutions: bool,
}

impl Default for ProviderBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderBuilder {
    pub fn new() -> Self {
        ProviderBuilder {
            fs: Arc::new(OsFileSystem),
            parser: Arc::new(TypeScriptParser::new()),
            cache_resolutions: false,
        }
    }

    pub fn file_system(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.fs = fs;
        self
    }

    pub fn parser(mut self, parser: Arc<dyn LanguageParser>) -> Self {
        self.parser = parser;
        self
    }

    /// Memoize resolutions per (containing directory, specifier) for the
    /// provider's lifetime.
    pub fn cache_resolutions(mut self, enabled: bool) -> Self {
        self.cache_resolutions = enabled;
        self
    }

    /// Load the configuration and index the program.
    ///
    /// Configuration failures are fatal; per-file indexing failures are not
    /// (see [`ProgramIndex::skipped`]).
    pub fn build(self, config_path: impl AsRef<Path>) -> Result<TypeScriptProvider> {
        let options = config::load(self.fs.as_ref(), config_path.as_ref())?;

        let core = ModuleResolver::new(options.compiler.clone(), self.fs.clone());
        let resolver: Arc<dyn Resolver> = if self.cache_resolutions {
            Arc::new(CachedResolver::new(core))
        } else {
            Arc::new(core)
        };

        let index = ProgramIndex::build(
            &options,
            self.fs.as_ref(),
            self.parser.as_ref(),
            resolver.as_ref(),
        );

        Ok(TypeScriptProvider {
            options,
            fs: self.fs,
            parser: self.parser,
            resolver,
            index,
        })
    }
}
