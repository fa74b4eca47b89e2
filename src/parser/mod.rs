use std::path::Path;

use anyhow::Result;

use crate::model::{ModuleReference, SyntaxDiagnostic};

pub mod typescript;

pub use typescript::TypeScriptParser;

/// Everything the provider needs from one parsed file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedFile {
    /// Module references in source order.
    pub references: Vec<ModuleReference>,
    /// Syntax errors in source order. The references above are still
    /// extracted from the parts of the file that did parse.
    pub syntax_errors: Vec<SyntaxDiagnostic>,
}

impl ParsedFile {
    pub fn first_syntax_error(&self) -> Option<&SyntaxDiagnostic> {
        self.syntax_errors.first()
    }
}

/// Syntax-parsing capability.
///
/// Implementations turn source text into the module references it contains.
/// An `Err` means the parser itself could not run; a malformed file is
/// reported through [`ParsedFile::syntax_errors`] instead.
pub trait LanguageParser: Send + Sync {
    fn parse(&self, source: &str, path: &Path) -> Result<ParsedFile>;
}
