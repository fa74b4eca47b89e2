//! Project configuration loading: tsconfig.json in, [`NormalizedOptions`] out.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};

use crate::discovery::{expand_root_files, FileSpecs};
use crate::error::ProviderError;
use crate::fs::{normalize_path, FileSystem};

pub mod jsonc;
pub mod paths;
pub mod tsconfig;

pub use paths::{PathMapping, PathMappings, PathSubstitution};
use tsconfig::{ConfigLayer, SpecList};

/// Directories excluded from `include` matching when `exclude` is not declared.
const DEFAULT_EXCLUDES: &[&str] = &["node_modules", "bower_components", "jspm_packages"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ScriptTarget {
    Es3,
    Es5,
    /// `es2015` through `es20xx`, keyed by year.
    Es(u16),
    EsNext,
}

impl FromStr for ScriptTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        match lower.as_str() {
            "es3" => Ok(ScriptTarget::Es3),
            "es5" => Ok(ScriptTarget::Es5),
            "es6" => Ok(ScriptTarget::Es(2015)),
            "esnext" | "latest" => Ok(ScriptTarget::EsNext),
            other => other
                .strip_prefix("es")
                .and_then(|year| year.parse::<u16>().ok())
                .filter(|year| *year >= 2015)
                .map(ScriptTarget::Es)
                .ok_or_else(|| format!("unknown target: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleKind {
    None,
    CommonJs,
    Amd,
    Umd,
    System,
    Es2015,
    Es2020,
    Es2022,
    EsNext,
    Node16,
    Node18,
    Node20,
    NodeNext,
    Preserve,
}

impl FromStr for ModuleKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(ModuleKind::None),
            "commonjs" => Ok(ModuleKind::CommonJs),
            "amd" => Ok(ModuleKind::Amd),
            "umd" => Ok(ModuleKind::Umd),
            "system" => Ok(ModuleKind::System),
            "es6" | "es2015" => Ok(ModuleKind::Es2015),
            "es2020" => Ok(ModuleKind::Es2020),
            "es2022" => Ok(ModuleKind::Es2022),
            "esnext" => Ok(ModuleKind::EsNext),
            "node16" => Ok(ModuleKind::Node16),
            "node18" => Ok(ModuleKind::Node18),
            "node20" => Ok(ModuleKind::Node20),
            "nodenext" => Ok(ModuleKind::NodeNext),
            "preserve" => Ok(ModuleKind::Preserve),
            _ => Err(format!("unknown module kind: {}", s)),
        }
    }
}

/// The lookup strategy for non-relative specifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleResolution {
    /// Walk ancestor directories for `<dir>/<specifier>`; no `node_modules`.
    Classic,
    /// CommonJS-era Node lookup (`node` / `node10`).
    Node10,
    Node16,
    NodeNext,
    Bundler,
}

impl ModuleResolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleResolution::Classic => "classic",
            ModuleResolution::Node10 => "node10",
            ModuleResolution::Node16 => "node16",
            ModuleResolution::NodeNext => "nodenext",
            ModuleResolution::Bundler => "bundler",
        }
    }

    pub fn is_node_style(&self) -> bool {
        !matches!(self, ModuleResolution::Classic)
    }

    /// Whether package.json `exports` is consulted.
    pub fn uses_package_exports(&self) -> bool {
        matches!(
            self,
            ModuleResolution::Node16 | ModuleResolution::NodeNext | ModuleResolution::Bundler
        )
    }

    fn default_for(module: ModuleKind) -> Self {
        match module {
            ModuleKind::CommonJs => ModuleResolution::Node10,
            ModuleKind::Node16 | ModuleKind::Node18 | ModuleKind::Node20 => {
                ModuleResolution::Node16
            }
            ModuleKind::NodeNext => ModuleResolution::NodeNext,
            ModuleKind::Preserve => ModuleResolution::Bundler,
            _ => ModuleResolution::Classic,
        }
    }
}

impl FromStr for ModuleResolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "classic" => Ok(ModuleResolution::Classic),
            "node" | "node10" => Ok(ModuleResolution::Node10),
            "node16" => Ok(ModuleResolution::Node16),
            "nodenext" => Ok(ModuleResolution::NodeNext),
            "bundler" => Ok(ModuleResolution::Bundler),
            _ => Err(format!("unknown moduleResolution: {}", s)),
        }
    }
}

impl fmt::Display for ModuleResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Compiler options relevant to module resolution, with defaults applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerOptions {
    pub target: ScriptTarget,
    pub module: ModuleKind,
    pub module_resolution: ModuleResolution,
    pub base_url: Option<PathBuf>,
    pub paths: PathMappings,
    pub allow_js: bool,
    pub resolve_json_module: bool,
    pub module_suffixes: Vec<String>,
    pub out_dir: Option<PathBuf>,
}

impl CompilerOptions {
    /// Extensions appended to an extensionless candidate, in priority order.
    pub fn extensions(&self) -> &'static [&'static str] {
        if self.allow_js {
            &[".ts", ".tsx", ".d.ts", ".js", ".jsx"]
        } else {
            &[".ts", ".tsx", ".d.ts"]
        }
    }

    /// Extension groups for root-file matching. Within a group, an earlier
    /// extension shadows a later one on a file with the same stem.
    pub fn root_extension_groups(&self) -> Vec<Vec<&'static str>> {
        if self.allow_js {
            vec![
                vec![".ts", ".tsx", ".d.ts", ".js", ".jsx"],
                vec![".cts", ".d.cts", ".cjs"],
                vec![".mts", ".d.mts", ".mjs"],
            ]
        } else {
            vec![
                vec![".ts", ".tsx", ".d.ts"],
                vec![".cts", ".d.cts"],
                vec![".mts", ".d.mts"],
            ]
        }
    }

    /// Whether a file with this name can be a program source file.
    pub fn is_script_file(&self, path: &Path) -> bool {
        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name,
            None => return false,
        };
        self.root_extension_groups()
            .iter()
            .flatten()
            .any(|ext| name.ends_with(ext))
    }

    fn from_layer(layer: &ConfigLayer) -> Result<Self> {
        let target = match &layer.target {
            Some(t) => t.parse::<ScriptTarget>().map_err(anyhow::Error::msg)?,
            None => ScriptTarget::Es5,
        };
        let module = match &layer.module {
            Some(m) => m.parse::<ModuleKind>().map_err(anyhow::Error::msg)?,
            None if target >= ScriptTarget::Es(2015) => ModuleKind::Es2015,
            None => ModuleKind::CommonJs,
        };
        let module_resolution = match &layer.module_resolution {
            Some(r) => r.parse::<ModuleResolution>().map_err(anyhow::Error::msg)?,
            None => ModuleResolution::default_for(module),
        };

        let paths = match &layer.paths {
            Some(declared) => {
                let base = layer.base_url.as_deref().unwrap_or(&declared.declared_in);
                PathMappings::new(&declared.entries, base).context("invalid paths")?
            }
            None => PathMappings::default(),
        };

        let module_suffixes = match &layer.module_suffixes {
            Some(suffixes) if !suffixes.is_empty() => suffixes.clone(),
            _ => vec![String::new()],
        };

        Ok(CompilerOptions {
            target,
            module,
            module_resolution,
            base_url: layer.base_url.clone(),
            paths,
            allow_js: layer.allow_js.unwrap_or(false),
            resolve_json_module: layer.resolve_json_module.unwrap_or(false),
            module_suffixes,
            out_dir: layer.out_dir.clone(),
        })
    }
}

/// A configuration file as read: its location, merged raw settings, and file specs.
#[derive(Debug, Clone)]
pub struct ProjectConfiguration {
    pub config_path: PathBuf,
    pub root_dir: PathBuf,
    layer: ConfigLayer,
}

impl ProjectConfiguration {
    /// Read a configuration file and everything it extends.
    pub fn read(fs: &dyn FileSystem, config_path: &Path) -> Result<Self> {
        let config_path = absolute(config_path)?;
        let root_dir = config_path
            .parent()
            .unwrap_or(Path::new("/"))
            .to_path_buf();
        let layer = tsconfig::read_config_chain(fs, &config_path)?;
        Ok(Self {
            config_path,
            root_dir,
            layer,
        })
    }

    /// Apply defaults and expand the root file list.
    pub fn normalize(&self, fs: &dyn FileSystem) -> Result<NormalizedOptions> {
        let compiler = CompilerOptions::from_layer(&self.layer)?;
        let specs = self.file_specs(&compiler);
        let root_files = expand_root_files(fs, &specs, &compiler.root_extension_groups())
            .context("failed to expand root files")?;

        tracing::debug!(
            config = %self.config_path.display(),
            module_resolution = %compiler.module_resolution,
            root_files = root_files.len(),
            "loaded project configuration"
        );

        Ok(NormalizedOptions {
            config_path: self.config_path.clone(),
            root_dir: self.root_dir.clone(),
            compiler,
            root_files,
        })
    }

    fn file_specs(&self, compiler: &CompilerOptions) -> FileSpecs {
        let anchor = |list: &SpecList| -> Vec<String> {
            list.entries
                .iter()
                .map(|entry| anchor_spec(&list.base, entry))
                .collect()
        };

        let files: Vec<PathBuf> = self
            .layer
            .files
            .as_ref()
            .map(|list| {
                list.entries
                    .iter()
                    .map(|entry| normalize_path(&list.base.join(crate::fs::to_slash(entry))))
                    .collect()
            })
            .unwrap_or_default();

        let include = match (&self.layer.include, &self.layer.files) {
            (Some(list), _) => anchor(list),
            (None, Some(_)) => Vec::new(),
            (None, None) => vec![anchor_spec(&self.root_dir, "**/*")],
        };

        let exclude = match &self.layer.exclude {
            Some(list) => anchor(list),
            None => {
                let mut defaults: Vec<String> = DEFAULT_EXCLUDES
                    .iter()
                    .map(|d| anchor_spec(&self.root_dir, d))
                    .collect();
                if let Some(out_dir) = &compiler.out_dir {
                    defaults.push(out_dir.to_string_lossy().replace('\\', "/"));
                }
                defaults
            }
        };

        FileSpecs {
            files,
            include,
            exclude,
        }
    }
}

/// [`ProjectConfiguration`] merged with resolution defaults and its expanded root file list.
#[derive(Debug, Clone)]
pub struct NormalizedOptions {
    pub config_path: PathBuf,
    pub root_dir: PathBuf,
    pub compiler: CompilerOptions,
    pub root_files: Vec<PathBuf>,
}

/// Load and normalize a configuration file. Any failure is a [`ProviderError::Configuration`].
pub fn load(fs: &dyn FileSystem, config_path: &Path) -> crate::Result<NormalizedOptions> {
    ProjectConfiguration::read(fs, config_path)
        .and_then(|config| config.normalize(fs))
        .map_err(|err| ProviderError::configuration(config_path, &err))
}

fn anchor_spec(base: &Path, spec: &str) -> String {
    normalize_path(&base.join(crate::fs::to_slash(spec)))
        .to_string_lossy()
        .replace('\\', "/")
}

fn absolute(path: &Path) -> Result<PathBuf> {
    let path = crate::fs::to_slash(&path.to_string_lossy());
    if path.is_absolute() {
        return Ok(normalize_path(&path));
    }
    let cwd = std::env::current_dir().context("failed to read current directory")?;
    Ok(normalize_path(&cwd.join(path)))
}
