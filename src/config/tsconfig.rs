use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use super::jsonc::strip_jsonc;
use crate::fs::{normalize_path, FileSystem};

/// tsconfig.json as written on disk. Unknown keys are ignored.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTsConfig {
    extends: Option<Extends>,
    files: Option<Vec<String>>,
    include: Option<Vec<String>>,
    exclude: Option<Vec<String>>,
    #[serde(default)]
    compiler_options: RawCompilerOptions,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Extends {
    One(String),
    Many(Vec<String>),
}

impl Extends {
    fn into_vec(self) -> Vec<String> {
        match self {
            Extends::One(name) => vec![name],
            Extends::Many(names) => names,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCompilerOptions {
    target: Option<String>,
    module: Option<String>,
    module_resolution: Option<String>,
    base_url: Option<String>,
    paths: Option<BTreeMap<String, Vec<String>>>,
    allow_js: Option<bool>,
    resolve_json_module: Option<bool>,
    module_suffixes: Option<Vec<String>>,
    out_dir: Option<String>,
}

/// A list of file specs together with the directory they are relative to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecList {
    pub entries: Vec<String>,
    pub base: PathBuf,
}

/// `paths` together with the directory of the file that declared it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredPaths {
    pub entries: BTreeMap<String, Vec<String>>,
    pub declared_in: PathBuf,
}

/// One configuration file's settings with relative paths already anchored,
/// so layers from different directories can be merged field by field.
#[derive(Debug, Clone, Default)]
pub struct ConfigLayer {
    pub target: Option<String>,
    pub module: Option<String>,
    pub module_resolution: Option<String>,
    pub base_url: Option<PathBuf>,
    pub paths: Option<DeclaredPaths>,
    pub allow_js: Option<bool>,
    pub resolve_json_module: Option<bool>,
    pub module_suffixes: Option<Vec<String>>,
    pub out_dir: Option<PathBuf>,
    pub files: Option<SpecList>,
    pub include: Option<SpecList>,
    pub exclude: Option<SpecList>,
}

impl ConfigLayer {
    fn from_raw(raw: RawTsConfig, dir: &Path) -> Self {
        let options = raw.compiler_options;
        let specs = |entries: Option<Vec<String>>| {
            entries.map(|entries| SpecList {
                entries,
                base: dir.to_path_buf(),
            })
        };

        ConfigLayer {
            target: options.target,
            module: options.module,
            module_resolution: options.module_resolution,
            base_url: options.base_url.map(|url| normalize_path(&dir.join(url))),
            paths: options.paths.map(|entries| DeclaredPaths {
                entries,
                declared_in: dir.to_path_buf(),
            }),
            allow_js: options.allow_js,
            resolve_json_module: options.resolve_json_module,
            module_suffixes: options.module_suffixes,
            out_dir: options.out_dir.map(|out| normalize_path(&dir.join(out))),
            files: specs(raw.files),
            include: specs(raw.include),
            exclude: specs(raw.exclude),
        }
    }

    /// Layer `child` on top of `self`; every value the child sets wins.
    fn overlay(self, child: ConfigLayer) -> ConfigLayer {
        ConfigLayer {
            target: child.target.or(self.target),
            module: child.module.or(self.module),
            module_resolution: child.module_resolution.or(self.module_resolution),
            base_url: child.base_url.or(self.base_url),
            paths: child.paths.or(self.paths),
            allow_js: child.allow_js.or(self.allow_js),
            resolve_json_module: child.resolve_json_module.or(self.resolve_json_module),
            module_suffixes: child.module_suffixes.or(self.module_suffixes),
            out_dir: child.out_dir.or(self.out_dir),
            files: child.files.or(self.files),
            include: child.include.or(self.include),
            exclude: child.exclude.or(self.exclude),
        }
    }
}

/// Read a tsconfig file and every configuration it extends, merged into one layer.
pub fn read_config_chain(fs: &dyn FileSystem, path: &Path) -> Result<ConfigLayer> {
    let mut visiting = Vec::new();
    read_layer(fs, &normalize_path(path), &mut visiting)
}

fn read_layer(fs: &dyn FileSystem, path: &Path, visiting: &mut Vec<PathBuf>) -> Result<ConfigLayer> {
    if visiting.iter().any(|p| p == path) {
        bail!(
            "circular extends: {}",
            visiting
                .iter()
                .chain(std::iter::once(&path.to_path_buf()))
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(" -> ")
        );
    }

    let content = fs
        .read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let mut raw: RawTsConfig = serde_json::from_str(&strip_jsonc(&content))
        .with_context(|| format!("failed to parse {}", path.display()))?;

    let dir = path.parent().unwrap_or(Path::new("/")).to_path_buf();
    let bases = raw.extends.take().map(Extends::into_vec).unwrap_or_default();

    visiting.push(path.to_path_buf());
    let mut merged = ConfigLayer::default();
    for name in &bases {
        let base_path = resolve_extends(fs, &dir, name)
            .with_context(|| format!("in {}", path.display()))?;
        tracing::debug!(config = %path.display(), base = %base_path.display(), "extending configuration");
        merged = merged.overlay(read_layer(fs, &base_path, visiting)?);
    }
    visiting.pop();

    Ok(merged.overlay(ConfigLayer::from_raw(raw, &dir)))
}

/// Locate the file named by an `extends` entry.
fn resolve_extends(fs: &dyn FileSystem, dir: &Path, name: &str) -> Result<PathBuf> {
    let is_path = name.starts_with("./")
        || name.starts_with("../")
        || name.starts_with('/')
        || name.starts_with(".\\")
        || name.starts_with("..\\");

    let mut candidates = Vec::new();
    if is_path {
        let base = normalize_path(&dir.join(crate::fs::to_slash(name)));
        candidates.push(base.clone());
        if !name.ends_with(".json") {
            candidates.push(with_json_suffix(&base));
        }
    } else {
        let mut current = Some(dir);
        while let Some(d) = current {
            if d.file_name().is_some_and(|n| n != "node_modules") || d.parent().is_none() {
                let base = d.join("node_modules").join(name);
                candidates.push(base.clone());
                if !name.ends_with(".json") {
                    candidates.push(with_json_suffix(&base));
                }
                candidates.push(base.join("tsconfig.json"));
            }
            current = d.parent();
        }
    }

    candidates
        .into_iter()
        .find(|c| fs.is_file(c))
        .with_context(|| format!("cannot find base configuration {:?}", name))
}

fn with_json_suffix(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(".json");
    PathBuf::from(os)
}
