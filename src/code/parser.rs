//! `Parser` trait and tree-sitter-backed implementations.
//!
//! Extraction is lexical/structural only (tree-sitter node kinds and name
//! captures), never full type-checking, per spec.

use crate::error::{IndexError, IndexResult};
use std::sync::{Arc, Mutex};
use tree_sitter::{Language, Query, QueryCursor, StreamingIterator};

/// A symbol extracted from a single file, before the indexer assigns an id
/// and rewrites `file_path` to be root-relative.
#[derive(Debug, Clone)]
pub struct ParsedSymbol {
    pub name: String,
    pub kind: String,
    pub signature: Option<String>,
    pub doc_comment: Option<String>,
    pub start_line: u32,
    pub end_line: u32,
}

/// Capability-set trait implemented once per supported language (spec §9).
/// Implementations must not touch the database.
pub trait Parser: Send + Sync {
    /// The language id this parser handles, matching `LanguageId::as_str`.
    fn language(&self) -> &'static str;

    /// Parses `content` and returns the symbols it declares.
    ///
    /// # Errors
    ///
    /// Returns `IndexError` if the grammar fails to produce a tree at all
    /// (malformed UTF-8, grammar mismatch). Partial/error nodes within an
    /// otherwise-parseable tree are not themselves failures.
    fn parse(&self, content: &str) -> IndexResult<Vec<ParsedSymbol>>;
}

/// A `Parser` driven by a tree-sitter grammar and a tag-style query: each
/// top-level query pattern captures the whole declaration under a capture
/// name that doubles as the symbol kind (`@function`, `@class`, ...) and the
/// identifier under `@name`.
pub struct TreeSitterParser {
    language_id: &'static str,
    query: Query,
    // tree_sitter::Parser is not Sync; one per parser instance, guarded.
    parser: Mutex<tree_sitter::Parser>,
    line_comment_prefix: &'static str,
}

impl TreeSitterParser {
    /// # Panics
    ///
    /// Panics if `query_source` fails to compile against `language`, or if
    /// `language` cannot be loaded into a fresh `tree_sitter::Parser` — both
    /// indicate a programming error in the built-in registry, not user input.
    #[must_use]
    pub fn new(
        language_id: &'static str,
        language: Language,
        query_source: &str,
        line_comment_prefix: &'static str,
    ) -> Self {
        let query = Query::new(&language, query_source)
            .unwrap_or_else(|e| panic!("invalid built-in query for {language_id}: {e}"));

        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(&language)
            .unwrap_or_else(|e| panic!("failed to load grammar for {language_id}: {e}"));

        Self {
            language_id,
            query,
            parser: Mutex::new(parser),
            line_comment_prefix,
        }
    }

    /// Scans the lines immediately above `start_line` (0-indexed) for a
    /// contiguous block of line comments, used as the doc comment.
    fn leading_comment(&self, lines: &[&str], start_line: usize) -> Option<String> {
        if start_line == 0 {
            return None;
        }
        let mut collected = Vec::new();
        let mut idx = start_line;
        while idx > 0 {
            let line = lines[idx - 1].trim();
            if line.is_empty() {
                break;
            }
            if let Some(stripped) = line.strip_prefix(self.line_comment_prefix) {
                collected.push(stripped.trim().to_string());
                idx -= 1;
            } else {
                break;
            }
        }
        if collected.is_empty() {
            return None;
        }
        collected.reverse();
        Some(collected.join("\n"))
    }
}

impl Parser for TreeSitterParser {
    fn language(&self) -> &'static str {
        self.language_id
    }

    fn parse(&self, content: &str) -> IndexResult<Vec<ParsedSymbol>> {
        let mut parser = self
            .parser
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let tree = parser.parse(content, None).ok_or_else(|| IndexError::Parse {
            path: std::path::PathBuf::from(self.language_id),
            reason: "tree-sitter produced no parse tree".to_string(),
        })?;

        let name_idx = self
            .query
            .capture_index_for_name("name")
            .expect("every built-in query declares a @name capture");

        let lines: Vec<&str> = content.lines().collect();
        let mut symbols = Vec::new();
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&self.query, tree.root_node(), content.as_bytes());

        while let Some(m) = matches.next() {
            let Some(name_capture) = m.captures.iter().find(|c| c.index == name_idx) else {
                continue;
            };
            let Ok(name) = name_capture.node.utf8_text(content.as_bytes()) else {
                continue;
            };

            // The item capture is whichever non-`name` capture fired; its
            // name is the symbol kind by convention.
            let Some(item_capture) = m.captures.iter().find(|c| c.index != name_idx) else {
                continue;
            };
            let kind = self.query.capture_names()[item_capture.index as usize].to_string();
            let node = item_capture.node;

            let start_line = node.start_position().row as u32;
            let end_line = node.end_position().row as u32;
            let signature = node
                .utf8_text(content.as_bytes())
                .ok()
                .and_then(|text| text.lines().next())
                .map(str::trim)
                .map(str::to_string);
            let doc_comment = self.leading_comment(&lines, start_line as usize);

            symbols.push(ParsedSymbol {
                name: name.to_string(),
                kind,
                signature,
                doc_comment,
                start_line: start_line + 1,
                end_line: end_line + 1,
            });
        }

        Ok(symbols)
    }
}

/// Instantiates one parser per grammar the registry ships with.
#[must_use]
pub fn builtin_parsers() -> Vec<Arc<dyn Parser>> {
    use super::languages::{
        c_parser, cpp_parser, go_parser, java_parser, javascript_parser, python_parser,
        rust_parser, ruby_parser, typescript_parser,
    };
    vec![
        Arc::new(rust_parser()),
        Arc::new(python_parser()),
        Arc::new(javascript_parser()),
        Arc::new(typescript_parser()),
        Arc::new(go_parser()),
        Arc::new(java_parser()),
        Arc::new(c_parser()),
        Arc::new(cpp_parser()),
        Arc::new(ruby_parser()),
    ]
}

#[cfg(test)]
mod tests {
    use super::super::languages::{python_parser, rust_parser};
    use super::*;

    #[test]
    fn rust_parser_extracts_function_and_struct() {
        let parser = rust_parser();
        let src = "/// doc for foo\nfn foo() {}\n\nstruct Bar { x: i32 }\n";
        let symbols = parser.parse(src).unwrap();

        let foo = symbols.iter().find(|s| s.name == "foo").unwrap();
        assert_eq!(foo.kind, "function");
        assert_eq!(foo.doc_comment.as_deref(), Some("/ doc for foo"));

        let bar = symbols.iter().find(|s| s.name == "Bar").unwrap();
        assert_eq!(bar.kind, "struct");
    }

    #[test]
    fn python_parser_extracts_class_and_method() {
        let parser = python_parser();
        let src = "class Greeter:\n    def greet(self):\n        return 'hi'\n";
        let symbols = parser.parse(src).unwrap();

        assert!(symbols.iter().any(|s| s.name == "Greeter" && s.kind == "class"));
        assert!(symbols.iter().any(|s| s.name == "greet" && s.kind == "function"));
    }

    #[test]
    fn unparseable_content_is_still_tolerated_by_tree_sitter_error_recovery() {
        let parser = rust_parser();
        // tree-sitter never refuses to produce a tree for text input; it
        // marks the offending region as an ERROR node instead.
        let symbols = parser.parse("fn foo( {{{ ").unwrap();
        assert!(symbols.is_empty() || symbols.iter().all(|s| s.name == "foo"));
    }
}
