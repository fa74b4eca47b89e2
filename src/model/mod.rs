use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Ordered, duplicate-free list of absolute first-party source paths.
pub type FileInventory = Vec<PathBuf>;

/// A 1-based line/column position in a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    TypeScript,
    Tsx,
    JavaScript,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::TypeScript => "typescript",
            Language::Tsx => "tsx",
            Language::JavaScript => "javascript",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "ts" | "mts" | "cts" => Some(Language::TypeScript),
            "tsx" => Some(Language::Tsx),
            "js" | "jsx" | "mjs" | "cjs" => Some(Language::JavaScript),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a module reference appears in source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    /// `import ... from "x"` or the side-effect form `import "x"`.
    Import,
    /// `import x = require("x")`
    ImportEquals,
    /// `export ... from "x"`
    ReExport,
    /// `import("x")` with a string literal argument.
    DynamicImport,
    /// `require("x")` with a string literal argument.
    Require,
    /// `/// <reference path="x" />`
    TripleSlash,
}

impl ReferenceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceKind::Import => "import",
            ReferenceKind::ImportEquals => "import_equals",
            ReferenceKind::ReExport => "re_export",
            ReferenceKind::DynamicImport => "dynamic_import",
            ReferenceKind::Require => "require",
            ReferenceKind::TripleSlash => "triple_slash",
        }
    }
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Any reference from one source file to another module, as written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleReference {
    pub specifier: String,
    pub kind: ReferenceKind,
    /// The whole declaration is marked `type`/`typeof` and is erased from emitted output.
    pub is_type_only: bool,
    pub position: Position,
}

/// An import declaration's module specifier, as returned by the import extractor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRecord {
    pub specifier: String,
    pub is_type_only: bool,
    pub position: Position,
}

impl From<&ModuleReference> for ImportRecord {
    fn from(reference: &ModuleReference) -> Self {
        ImportRecord {
            specifier: reference.specifier.clone(),
            is_type_only: reference.is_type_only,
            position: reference.position,
        }
    }
}

/// A syntax error found while parsing, with the position of the first offending node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntaxDiagnostic {
    pub position: Position,
    pub message: String,
}

/// Declaration-only file suffixes. These describe types and emit nothing.
const DECLARATION_SUFFIXES: &[&str] = &[".d.ts", ".d.mts", ".d.cts"];

/// Check whether a path names an ambient-declaration-only file
/// (`foo.d.ts`, `foo.d.mts`, `foo.d.cts`, or an arbitrary-extension declaration like `styles.d.css.ts`).
pub fn is_declaration_file(path: &Path) -> bool {
    let name = match path.file_name().and_then(|n| n.to_str()) {
        Some(name) => name,
        None => return false,
    };
    if DECLARATION_SUFFIXES.iter().any(|s| name.ends_with(s)) {
        return true;
    }
    match name.strip_suffix(".ts") {
        Some(stem) => stem
            .rsplit_once('.')
            .is_some_and(|(rest, _)| rest.ends_with(".d")),
        None => false,
    }
}
