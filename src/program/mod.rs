//! The program index: every file reachable from the configured root files.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};

use crate::config::NormalizedOptions;
use crate::fs::{is_in_node_modules, FileSystem};
use crate::model::{is_declaration_file, FileInventory};
use crate::parser::{LanguageParser, ParsedFile};
use crate::resolver::Resolver;

/// A file that was reachable but could not be indexed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// A successfully read and parsed program file.
#[derive(Debug, Clone)]
pub struct IndexedFile {
    pub path: PathBuf,
    pub parsed: ParsedFile,
}

/// The closure of the root files under module resolution.
///
/// Built once; a changed project needs a new index.
#[derive(Debug, Default)]
pub struct ProgramIndex {
    files: Vec<IndexedFile>,
    by_path: HashMap<PathBuf, usize>,
    inventory: FileInventory,
    skipped: Vec<SkippedFile>,
}

impl ProgramIndex {
    /// Index the root files and everything they reference, breadth first.
    ///
    /// Files that cannot be read or parsed are skipped with a warning and
    /// recorded in [`skipped`](Self::skipped); the rest of the closure still builds.
    pub fn build(
        options: &NormalizedOptions,
        fs: &dyn FileSystem,
        parser: &dyn LanguageParser,
        resolver: &dyn Resolver,
    ) -> Self {
        let mut index = ProgramIndex::default();
        let mut seen: HashSet<PathBuf> = options.root_files.iter().cloned().collect();
        let mut queue: VecDeque<PathBuf> = options.root_files.iter().cloned().collect();

        while let Some(path) = queue.pop_front() {
            let parsed = match index.load(&path, fs, parser) {
                Some(parsed) => parsed,
                None => continue,
            };

            for reference in &parsed.references {
                let resolution = resolver.resolve(&reference.specifier, &path);
                let target = match resolution.path() {
                    Some(target) if !resolution.is_external() => target,
                    _ => continue,
                };
                if is_in_node_modules(target) || !options.compiler.is_script_file(target) {
                    continue;
                }
                if seen.insert(target.to_path_buf()) {
                    tracing::trace!(
                        from = %path.display(),
                        target = %target.display(),
                        kind = %reference.kind,
                        "discovered program file"
                    );
                    queue.push_back(target.to_path_buf());
                }
            }

            index.by_path.insert(path.clone(), index.files.len());
            if !is_declaration_file(&path) {
                index.inventory.push(path.clone());
            }
            index.files.push(IndexedFile { path, parsed });
        }

        tracing::debug!(
            indexed = index.files.len(),
            inventory = index.inventory.len(),
            skipped = index.skipped.len(),
            "built program index"
        );
        index
    }

    fn load(
        &mut self,
        path: &Path,
        fs: &dyn FileSystem,
        parser: &dyn LanguageParser,
    ) -> Option<ParsedFile> {
        let source = match fs.read_to_string(path) {
            Ok(source) => source,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "skipping unreadable file");
                self.skip(path, format!("cannot read: {}", err));
                return None;
            }
        };

        let parsed = match parser.parse(&source, path) {
            Ok(parsed) => parsed,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %format!("{:#}", err), "skipping file the parser rejected");
                self.skip(path, format!("parser failure: {:#}", err));
                return None;
            }
        };

        if let Some(error) = parsed.first_syntax_error() {
            tracing::warn!(
                path = %path.display(),
                position = %error.position,
                error = %error.message,
                "indexing file with syntax errors"
            );
        }
        Some(parsed)
    }

    fn skip(&mut self, path: &Path, reason: String) {
        self.skipped.push(SkippedFile {
            path: path.to_path_buf(),
            reason,
        });
    }

    /// First-party source files: every indexed file except declaration files,
    /// root files first, then discovered files in discovery order.
    pub fn inventory(&self) -> &FileInventory {
        &self.inventory
    }

    /// Every indexed file, declaration files included.
    pub fn files(&self) -> impl Iterator<Item = &IndexedFile> {
        self.files.iter()
    }

    pub fn get(&self, path: &Path) -> Option<&IndexedFile> {
        self.by_path.get(path).map(|&i| &self.files[i])
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.by_path.contains_key(path)
    }

    pub fn skipped(&self) -> &[SkippedFile] {
        &self.skipped
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config;
    use crate::fs::MemoryFileSystem;
    use crate::parser::TypeScriptParser;
    use crate::resolver::ModuleResolver;
    use std::sync::Arc;

    fn build(memory: MemoryFileSystem) -> ProgramIndex {
        let fs: Arc<dyn FileSystem> = Arc::new(memory);
        let options = config::load(fs.as_ref(), Path::new("/project/tsconfig.json")).unwrap();
        let resolver = ModuleResolver::new(options.compiler.clone(), fs.clone());
        ProgramIndex::build(&options, fs.as_ref(), &TypeScriptParser::new(), &resolver)
    }

    fn paths(files: &[PathBuf]) -> Vec<&str> {
        files
            .iter()
            .map(|p| p.strip_prefix("/project").unwrap().to_str().unwrap())
            .collect()
    }

    #[test]
    fn test_closure_includes_files_outside_root_list() {
        let index = build(MemoryFileSystem::with_files([
            ("/project/tsconfig.json", r#"{ "files": ["src/main.ts"] }"#),
            ("/project/src/main.ts", "import { a } from './a';"),
            ("/project/src/a.ts", "import type { T } from '../lib/types';"),
            ("/project/lib/types.ts", "export type T = string;"),
            ("/project/src/unreferenced.ts", ""),
        ]));
        assert_eq!(
            paths(index.inventory()),
            vec!["src/main.ts", "src/a.ts", "lib/types.ts"]
        );
        assert!(index.skipped().is_empty());
    }

    #[test]
    fn test_declaration_files_indexed_but_not_in_inventory() {
        let index = build(MemoryFileSystem::with_files([
            ("/project/tsconfig.json", "{}"),
            ("/project/src/main.ts", "import type { T } from './types.i';"),
            ("/project/src/types.i.d.ts", "export interface T {}"),
            ("/project/src/globals.d.ts", "declare const VERSION: string;"),
        ]));
        assert_eq!(paths(index.inventory()), vec!["src/main.ts"]);
        assert!(index.contains(Path::new("/project/src/types.i.d.ts")));
        assert!(index.contains(Path::new("/project/src/globals.d.ts")));
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn test_node_modules_targets_are_leaves() {
        let index = build(MemoryFileSystem::with_files([
            ("/project/tsconfig.json", r#"{ "include": ["src"] }"#),
            ("/project/src/main.ts", "import React from 'react';"),
            ("/project/node_modules/react/index.d.ts", "import './internal';"),
            ("/project/node_modules/react/internal.d.ts", ""),
        ]));
        assert_eq!(paths(index.inventory()), vec!["src/main.ts"]);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_unreadable_file_skipped_with_signal() {
        let mut memory = MemoryFileSystem::with_files([
            ("/project/tsconfig.json", "{}"),
            ("/project/src/main.ts", "import './locked'; import './ok';"),
            ("/project/src/ok.ts", ""),
        ]);
        memory.add_unreadable("/project/src/locked.ts");

        let index = build(memory);
        assert_eq!(paths(index.inventory()), vec!["src/main.ts", "src/ok.ts"]);
        assert_eq!(index.skipped().len(), 1);
        assert_eq!(index.skipped()[0].path, PathBuf::from("/project/src/locked.ts"));
        assert!(index.skipped()[0].reason.contains("permission denied"));
    }

    #[test]
    fn test_missing_explicit_file_skipped() {
        let index = build(MemoryFileSystem::with_files([
            (
                "/project/tsconfig.json",
                r#"{ "files": ["src/main.ts", "src/gone.ts"] }"#,
            ),
            ("/project/src/main.ts", ""),
        ]));
        assert_eq!(paths(index.inventory()), vec!["src/main.ts"]);
        assert_eq!(index.skipped()[0].path, PathBuf::from("/project/src/gone.ts"));
    }

    #[test]
    fn test_syntax_errors_still_indexed() {
        let index = build(MemoryFileSystem::with_files([
            ("/project/tsconfig.json", "{}"),
            ("/project/src/broken.ts", "import { a } from './a';\nconst = ;"),
            ("/project/src/a.ts", ""),
        ]));
        assert_eq!(index.len(), 2);
        let broken = index.get(Path::new("/project/src/broken.ts")).unwrap();
        assert!(broken.parsed.first_syntax_error().is_some());
    }

    #[test]
    fn test_cycles_terminate() {
        let index = build(MemoryFileSystem::with_files([
            ("/project/tsconfig.json", r#"{ "files": ["a.ts"] }"#),
            ("/project/a.ts", "import './b';"),
            ("/project/b.ts", "import './a';"),
        ]));
        assert_eq!(paths(index.inventory()), vec!["a.ts", "b.ts"]);
    }
}
