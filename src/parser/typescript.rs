use std::path::Path;
use std::sync::OnceLock;

use anyhow::{Context, Result};
use regex::Regex;
use tree_sitter::{Node, Parser, Tree};

use crate::model::{Language, ModuleReference, Position, ReferenceKind, SyntaxDiagnostic};

use super::{LanguageParser, ParsedFile};

/// Longest source snippet quoted in a syntax error message.
const SNIPPET_LIMIT: usize = 40;

/// tree-sitter backed parser for TypeScript, TSX and JavaScript sources.
#[derive(Default)]
pub struct TypeScriptParser {
    // We create parsers per-call since tree_sitter::Parser is not Sync
}

impl TypeScriptParser {
    pub fn new() -> Self {
        Self::default()
    }

    fn create_parser(language: Language) -> Result<Parser> {
        let mut parser = Parser::new();
        let ts_language = match language {
            Language::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Language::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
            Language::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
        };
        parser
            .set_language(&ts_language)
            .context("failed to set parser language")?;
        Ok(parser)
    }

    /// Anything without a recognized script extension is parsed as TypeScript.
    fn detect_language(path: &Path) -> Language {
        Language::from_path(path).unwrap_or(Language::TypeScript)
    }
}

impl LanguageParser for TypeScriptParser {
    fn parse(&self, source: &str, path: &Path) -> Result<ParsedFile> {
        let language = Self::detect_language(path);
        let mut parser = Self::create_parser(language)?;
        let tree = parser
            .parse(source, None)
            .context("tree-sitter failed to parse")?;

        let mut extractor = Extractor::new(source, &tree);
        extractor.extract();

        Ok(ParsedFile {
            references: extractor.references,
            syntax_errors: collect_syntax_errors(source, &tree),
        })
    }
}

/// Walks a tree-sitter CST and collects module references in source order.
struct Extractor<'a> {
    source: &'a str,
    tree: &'a Tree,
    references: Vec<ModuleReference>,
}

impl<'a> Extractor<'a> {
    fn new(source: &'a str, tree: &'a Tree) -> Self {
        Self {
            source,
            tree,
            references: Vec::new(),
        }
    }

    fn node_text(&self, node: Node) -> &str {
        node.utf8_text(self.source.as_bytes()).unwrap_or("")
    }

    fn extract(&mut self) {
        let root = self.tree.root_node();
        self.extract_reference_directives(root);
        self.visit_children(root);
    }

    fn visit_children(&mut self, node: Node) {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.visit_node(child);
        }
    }

    fn visit_node(&mut self, node: Node) {
        match node.kind() {
            "import_statement" => {
                self.extract_import(node);
            }
            "export_statement" => {
                self.extract_reexport(node);
                // Exported declarations can contain dynamic imports
                self.visit_children(node);
            }
            "call_expression" => {
                self.try_extract_call(node);
                // Still visit children for nested calls
                self.visit_children(node);
            }
            _ => {
                self.visit_children(node);
            }
        }
    }

    fn push(&mut self, node: Node, specifier: String, kind: ReferenceKind, is_type_only: bool) {
        if specifier.is_empty() {
            return;
        }
        self.references.push(ModuleReference {
            specifier,
            kind,
            is_type_only,
            position: position_of(self.source, node),
        });
    }

    /// `import type ...` / `export type ... from`: a `type` (or Flow-style
    /// `typeof`) keyword directly on the statement, not on a single specifier.
    fn has_type_keyword(&self, node: Node) -> bool {
        let mut cursor = node.walk();
        let result = node.children(&mut cursor).any(|c| {
            (!c.is_named() && matches!(c.kind(), "type" | "typeof"))
                || is_type_star_marker(self.source, c)
        });
        result
    }

    fn extract_import(&mut self, node: Node) {
        let is_type_only = self.has_type_keyword(node);

        // import x = require('...')
        let mut cursor = node.walk();
        let require_clause = node
            .children(&mut cursor)
            .find(|c| c.kind() == "import_require_clause");
        if let Some(clause) = require_clause {
            if let Some(specifier) = clause
                .child_by_field_name("source")
                .and_then(|s| self.string_value(s))
            {
                self.push(node, specifier, ReferenceKind::ImportEquals, is_type_only);
            }
            return;
        }

        if let Some(specifier) = node
            .child_by_field_name("source")
            .and_then(|s| self.string_value(s))
        {
            self.push(node, specifier, ReferenceKind::Import, is_type_only);
        }
    }

    fn extract_reexport(&mut self, node: Node) {
        if let Some(specifier) = node
            .child_by_field_name("source")
            .and_then(|s| self.string_value(s))
        {
            let is_type_only = self.has_type_keyword(node);
            self.push(node, specifier, ReferenceKind::ReExport, is_type_only);
        }
    }

    /// `import('./module')` and `require('./module')` with a string literal argument.
    /// Computed arguments can't be resolved statically and are skipped.
    fn try_extract_call(&mut self, node: Node) {
        let func_node = match node.child_by_field_name("function") {
            Some(n) => n,
            None => return,
        };

        let kind = match func_node.kind() {
            "import" => ReferenceKind::DynamicImport,
            "identifier" if self.node_text(func_node) == "require" => ReferenceKind::Require,
            _ => return,
        };

        let args_node = match node.child_by_field_name("arguments") {
            Some(n) => n,
            None => return,
        };

        let first_arg = args_node.named_child(0);
        if let Some(specifier) = first_arg
            .filter(|arg| arg.kind() == "string")
            .and_then(|arg| self.string_value(arg))
        {
            self.push(node, specifier, kind, false);
        }
    }

    /// `/// <reference path="..." />` directives in the file header.
    fn extract_reference_directives(&mut self, root: Node) {
        let mut cursor = root.walk();
        let header: Vec<Node> = root
            .children(&mut cursor)
            .take_while(|c| c.kind() == "comment")
            .collect();

        let Some(directive) = reference_path_regex() else {
            return;
        };
        for comment in header {
            let text = self.node_text(comment);
            let specifier = directive
                .captures(text)
                .and_then(|caps| caps.get(1).or_else(|| caps.get(2)))
                .map(|m| m.as_str().to_string());
            if let Some(specifier) = specifier {
                self.push(comment, specifier, ReferenceKind::TripleSlash, false);
            }
        }
    }

    /// The value of a string literal node, or `None` for anything else.
    fn string_value(&self, node: Node) -> Option<String> {
        if node.kind() != "string" {
            return None;
        }

        let mut value = String::new();
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            match child.kind() {
                "string_fragment" => value.push_str(self.node_text(child)),
                "escape_sequence" => value.push_str(&unescape(self.node_text(child))),
                _ => {}
            }
        }
        Some(value)
    }
}

fn reference_path_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"^///\s*<reference\s+path\s*=\s*(?:"([^"]*)"|'([^']*)')"#).ok()
    })
    .as_ref()
}

/// Decode one JavaScript escape sequence (`\n`, `\x41`, `\u0041`, `\u{1F600}`, ...).
fn unescape(sequence: &str) -> String {
    let body = match sequence.strip_prefix('\\') {
        Some(body) => body,
        None => return sequence.to_string(),
    };

    let hex = |digits: &str| {
        u32::from_str_radix(digits, 16)
            .ok()
            .and_then(char::from_u32)
            .map(String::from)
    };

    let decoded = match body.chars().next() {
        Some('n') => Some("\n".to_string()),
        Some('t') => Some("\t".to_string()),
        Some('r') => Some("\r".to_string()),
        Some('b') => Some("\u{8}".to_string()),
        Some('f') => Some("\u{c}".to_string()),
        Some('v') => Some("\u{b}".to_string()),
        Some('0') if body.len() == 1 => Some("\0".to_string()),
        Some('x') => hex(&body[1..]),
        Some('u') => hex(body[1..].trim_start_matches('{').trim_end_matches('}')),
        // Line continuations vanish
        Some('\n') | Some('\r') => Some(String::new()),
        Some(_) => Some(body.to_string()),
        None => None,
    };
    decoded.unwrap_or_else(|| sequence.to_string())
}

/// 1-based line and character column. tree-sitter reports byte columns, so
/// the line prefix is re-counted in chars.
fn position_of(source: &str, node: Node) -> Position {
    let point = node.start_position();
    let start = node.start_byte();
    let column = source
        .get(start.saturating_sub(point.column)..start)
        .map(|prefix| prefix.chars().count())
        .unwrap_or(point.column);
    Position {
        line: point.row + 1,
        column: column + 1,
    }
}

/// The grammar has no rule for `export type * from '...'` and leaves the
/// `type` keyword in an `ERROR` node under the export statement.
fn is_type_star_marker(source: &str, node: Node) -> bool {
    if !node.is_error() || node.utf8_text(source.as_bytes()).ok().map(str::trim) != Some("type") {
        return false;
    }
    let Some(parent) = node.parent() else {
        return false;
    };
    if parent.kind() != "export_statement" || parent.child_by_field_name("source").is_none() {
        return false;
    }
    let mut cursor = parent.walk();
    let has_star = parent.children(&mut cursor).any(|c| c.kind() == "*");
    has_star
}

/// Collect `ERROR` and missing nodes in source order.
fn collect_syntax_errors(source: &str, tree: &Tree) -> Vec<SyntaxDiagnostic> {
    let root = tree.root_node();
    let mut errors = Vec::new();
    if !root.has_error() {
        return errors;
    }

    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.is_missing() {
            errors.push(SyntaxDiagnostic {
                position: position_of(source, node),
                message: format!("missing {}", node.kind()),
            });
            continue;
        }
        if is_type_star_marker(source, node) {
            continue;
        }
        if node.is_error() {
            let text = node.utf8_text(source.as_bytes()).unwrap_or("");
            let snippet: String = text.chars().take(SNIPPET_LIMIT).collect();
            errors.push(SyntaxDiagnostic {
                position: position_of(source, node),
                message: format!("unexpected `{}`", snippet.trim()),
            });
            continue;
        }
        if !node.has_error() {
            continue;
        }
        // Push in reverse so children come off the stack in source order
        let mut cursor = node.walk();
        let children: Vec<Node> = node.children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }

    errors.sort_by_key(|e| e.position);
    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ts(source: &str) -> ParsedFile {
        let parser = TypeScriptParser::new();
        parser.parse(source, Path::new("test.ts")).unwrap()
    }

    fn parse_tsx(source: &str) -> ParsedFile {
        let parser = TypeScriptParser::new();
        parser.parse(source, Path::new("test.tsx")).unwrap()
    }

    fn parse_js(source: &str) -> ParsedFile {
        let parser = TypeScriptParser::new();
        parser.parse(source, Path::new("test.js")).unwrap()
    }

    fn specifiers(result: &ParsedFile) -> Vec<(&str, ReferenceKind, bool)> {
        result
            .references
            .iter()
            .map(|r| (r.specifier.as_str(), r.kind, r.is_type_only))
            .collect()
    }

    #[test]
    fn test_named_default_namespace_and_side_effect_imports() {
        let result = parse_ts(
            r#"
import { foo, bar as baz } from './utils';
import React from 'react';
import * as path from "path";
import './polyfill';
"#,
        );
        assert_eq!(
            specifiers(&result),
            vec![
                ("./utils", ReferenceKind::Import, false),
                ("react", ReferenceKind::Import, false),
                ("path", ReferenceKind::Import, false),
                ("./polyfill", ReferenceKind::Import, false),
            ]
        );
        assert!(result.syntax_errors.is_empty());
    }

    #[test]
    fn test_whole_declaration_type_only() {
        let result = parse_ts(
            r#"
import type { JustAType } from '../just-types/types.i';
import type Default from './default';
import type * as NS from './ns';
"#,
        );
        assert!(result.references.iter().all(|r| r.is_type_only));
        assert_eq!(result.references.len(), 3);
    }

    #[test]
    fn test_specifier_level_type_marker_is_not_type_only() {
        let result = parse_ts(
            r#"
import { type A, b } from './mixed';
import { type C, type D } from './all-types';
"#,
        );
        assert_eq!(
            specifiers(&result),
            vec![
                ("./mixed", ReferenceKind::Import, false),
                ("./all-types", ReferenceKind::Import, false),
            ]
        );
    }

    #[test]
    fn test_duplicates_preserved_in_source_order() {
        let result = parse_ts(
            r#"
import { a } from './shared';
import { b } from './other';
import { c } from './shared';
"#,
        );
        let specs: Vec<_> = result.references.iter().map(|r| r.specifier.as_str()).collect();
        assert_eq!(specs, vec!["./shared", "./other", "./shared"]);
        assert_eq!(result.references[0].position, Position { line: 2, column: 1 });
        assert_eq!(result.references[2].position, Position { line: 4, column: 1 });
    }

    #[test]
    fn test_reexports() {
        let result = parse_ts(
            r#"
export * from './all';
export { a, b as c } from './named';
export type { T } from './types';
export const local = 1;
"#,
        );
        assert_eq!(
            specifiers(&result),
            vec![
                ("./all", ReferenceKind::ReExport, false),
                ("./named", ReferenceKind::ReExport, false),
                ("./types", ReferenceKind::ReExport, true),
            ]
        );
    }

    #[test]
    fn test_export_type_star_is_type_only_reexport() {
        let result = parse_ts("export type * from './types';\nexport * from './values';\n");
        assert_eq!(
            specifiers(&result),
            vec![
                ("./types", ReferenceKind::ReExport, true),
                ("./values", ReferenceKind::ReExport, false),
            ]
        );
        assert!(result.syntax_errors.is_empty());
    }

    #[test]
    fn test_import_equals_require() {
        let result = parse_ts(
            r#"
import fs = require('fs');
import type Types = require('./types');
"#,
        );
        assert_eq!(
            specifiers(&result),
            vec![
                ("fs", ReferenceKind::ImportEquals, false),
                ("./types", ReferenceKind::ImportEquals, true),
            ]
        );
    }

    #[test]
    fn test_dynamic_import_and_require() {
        let result = parse_ts(
            r#"
const lazy = () => import('./lazy');
const name = './computed';
const skipped = import(name);
const templ = import(`./template/${name}`);
const cjs = require('./cjs');
"#,
        );
        assert_eq!(
            specifiers(&result),
            vec![
                ("./lazy", ReferenceKind::DynamicImport, false),
                ("./cjs", ReferenceKind::Require, false),
            ]
        );
    }

    #[test]
    fn test_imports_inside_ambient_module() {
        let result = parse_ts(
            r#"
declare module 'augmented' {
    import { Thing } from './thing';
}
"#,
        );
        assert_eq!(
            specifiers(&result),
            vec![("./thing", ReferenceKind::Import, false)]
        );
    }

    #[test]
    fn test_triple_slash_reference_path() {
        let result = parse_ts(
            r#"/// <reference path="./globals.d.ts" />
/// <reference types="node" />
import { a } from './a';
"#,
        );
        assert_eq!(
            specifiers(&result),
            vec![
                ("./globals.d.ts", ReferenceKind::TripleSlash, false),
                ("./a", ReferenceKind::Import, false),
            ]
        );
    }

    #[test]
    fn test_empty_specifier_skipped() {
        let result = parse_ts("import '';\nimport './real';\n");
        assert_eq!(
            specifiers(&result),
            vec![("./real", ReferenceKind::Import, false)]
        );
    }

    #[test]
    fn test_escaped_specifier() {
        let result = parse_ts(r#"import x from './caf\u00e9';"#);
        assert_eq!(result.references[0].specifier, "./café");
    }

    #[test]
    fn test_tsx_imports() {
        let result = parse_tsx(
            r#"
import React from 'react';
import { Button } from './Button';
export const App = () => <Button label="hi" />;
"#,
        );
        assert_eq!(result.references.len(), 2);
        assert!(result.syntax_errors.is_empty());
    }

    #[test]
    fn test_javascript_imports() {
        let result = parse_js(
            r#"
import { helper } from './helper.js';
const legacy = require('./legacy');
"#,
        );
        assert_eq!(
            specifiers(&result),
            vec![
                ("./helper.js", ReferenceKind::Import, false),
                ("./legacy", ReferenceKind::Require, false),
            ]
        );
    }

    #[test]
    fn test_syntax_error_reports_position() {
        let result = parse_ts("import { a } from './a';\nconst = ;\n");
        let error = result.first_syntax_error().unwrap();
        assert_eq!(error.position.line, 2);
        // The well-formed import before the error is still extracted
        assert_eq!(result.references.len(), 1);
    }

    #[test]
    fn test_column_counts_characters() {
        let result = parse_ts("/* \u{e9}t\u{e9} */ import './a';\n");
        assert_eq!(
            result.references[0].position,
            Position { line: 1, column: 11 }
        );
    }

    #[test]
    fn test_unescape() {
        assert_eq!(unescape(r"\n"), "\n");
        assert_eq!(unescape(r"\x41"), "A");
        assert_eq!(unescape(r"\u0041"), "A");
        assert_eq!(unescape(r"\u{1F600}"), "\u{1F600}");
        assert_eq!(unescape(r"\'"), "'");
    }
}
