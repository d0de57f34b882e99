//! Near-duplicate code detector (spec §4.4.4).
//!
//! Normalize → tokenize → sliding window → rolling hash → cluster. Clone
//! detection is inherently cross-file, so the runner builds a `CloneIndex`
//! once per run (`ClonesAnalyzer::build_index`) before calling `analyze` on
//! each file; per-file analysis then looks up which of that file's windows
//! recur elsewhere in the index.

use super::{Analyzer, AnalyzerContext};
use crate::error::FindingsResult;
use crate::store::findings::Finding;
use crate::types::{Id, Severity, Timestamp};
use std::collections::{BTreeMap, HashMap};
use xxhash_rust::xxh3::xxh3_64;

#[derive(Debug, Clone)]
struct Occurrence {
    file_path: String,
    start_line: u32,
    end_line: u32,
}

/// A precomputed map of window hash → every occurrence across the scanned
/// scope, built once per findings run.
#[derive(Default)]
pub struct CloneIndex {
    clusters: HashMap<u64, Vec<Occurrence>>,
}

pub struct ClonesAnalyzer {
    pub window_size: u32,
    pub min_lines: u32,
}

impl ClonesAnalyzer {
    #[must_use]
    pub fn new(window_size: u32, min_lines: u32) -> Self {
        Self { window_size, min_lines }
    }

    /// Normalizes source into a token stream: identifiers collapse to `ID`,
    /// numeric/string literals blank to `LIT`, everything else (keywords,
    /// punctuation, operators) passes through as its own token.
    fn tokenize(content: &str) -> Vec<(String, u32)> {
        let mut tokens = Vec::new();
        for (line_idx, line) in content.lines().enumerate() {
            let line_no = (line_idx + 1) as u32;
            let mut chars = line.char_indices().peekable();
            while let Some((i, c)) = chars.next() {
                if c.is_whitespace() {
                    continue;
                }
                if c.is_alphabetic() || c == '_' {
                    let start = i;
                    let mut end = i + c.len_utf8();
                    while let Some(&(j, c2)) = chars.peek() {
                        if c2.is_alphanumeric() || c2 == '_' {
                            end = j + c2.len_utf8();
                            chars.next();
                        } else {
                            break;
                        }
                    }
                    let word = &line[start..end];
                    if KEYWORDS.contains(&word) {
                        tokens.push((word.to_string(), line_no));
                    } else {
                        tokens.push(("ID".to_string(), line_no));
                    }
                } else if c.is_ascii_digit() {
                    while let Some(&(_, c2)) = chars.peek() {
                        if c2.is_alphanumeric() || c2 == '.' {
                            chars.next();
                        } else {
                            break;
                        }
                    }
                    tokens.push(("LIT".to_string(), line_no));
                } else if c == '"' || c == '\'' {
                    while let Some(&(_, c2)) = chars.peek() {
                        chars.next();
                        if c2 == c {
                            break;
                        }
                    }
                    tokens.push(("LIT".to_string(), line_no));
                } else {
                    tokens.push((c.to_string(), line_no));
                }
            }
        }
        tokens
    }

    fn windows(tokens: &[(String, u32)], window_size: usize) -> Vec<(u64, u32, u32)> {
        if tokens.len() < window_size || window_size == 0 {
            return Vec::new();
        }
        let mut out = Vec::with_capacity(tokens.len() - window_size + 1);
        for start in 0..=(tokens.len() - window_size) {
            let window = &tokens[start..start + window_size];
            let joined: String = window.iter().map(|(t, _)| t.as_str()).collect::<Vec<_>>().join(" ");
            let hash = xxh3_64(joined.as_bytes());
            let start_line = window.first().map_or(0, |(_, l)| *l);
            let end_line = window.last().map_or(0, |(_, l)| *l);
            out.push((hash, start_line, end_line));
        }
        out
    }

    /// Builds the cross-scope clone index from `(rel_path, content)` pairs.
    #[must_use]
    pub fn build_index(&self, files: &[(String, String)]) -> CloneIndex {
        let mut clusters: HashMap<u64, Vec<Occurrence>> = HashMap::new();
        for (rel_path, content) in files {
            let tokens = Self::tokenize(content);
            for (hash, start_line, end_line) in Self::windows(&tokens, self.window_size as usize) {
                if end_line.saturating_sub(start_line) + 1 < self.min_lines {
                    continue;
                }
                clusters.entry(hash).or_default().push(Occurrence {
                    file_path: rel_path.clone(),
                    start_line,
                    end_line,
                });
            }
        }
        clusters.retain(|_, occ| occ.len() >= 2);
        CloneIndex { clusters }
    }
}

const KEYWORDS: &[&str] = &[
    "fn", "let", "if", "else", "for", "while", "return", "struct", "enum", "impl", "pub", "def",
    "class", "function", "const", "var", "import", "from", "use",
];

impl Analyzer for ClonesAnalyzer {
    fn name(&self) -> &'static str {
        "clones"
    }

    fn analyze(&self, ctx: &AnalyzerContext<'_>) -> FindingsResult<Vec<Finding>> {
        let Some(index) = ctx.clone_index else {
            return Ok(Vec::new());
        };

        let mut findings = Vec::new();
        let mut seen_hashes = std::collections::HashSet::new();
        let tokens = Self::tokenize(ctx.content);
        for (hash, start_line, end_line) in Self::windows(&tokens, self.window_size as usize) {
            if !seen_hashes.insert(hash) {
                continue;
            }
            let Some(occurrences) = index.clusters.get(&hash) else {
                continue;
            };
            if occurrences.len() < 2 || !occurrences.iter().any(|o| o.file_path == ctx.rel_path) {
                continue;
            }

            let mut metadata = BTreeMap::new();
            metadata.insert("occurrences".to_string(), occurrences.len().to_string());
            let locations: Vec<String> = occurrences
                .iter()
                .map(|o| format!("{}:{}-{}", o.file_path, o.start_line, o.end_line))
                .collect();
            metadata.insert("locations".to_string(), locations.join(", "));

            findings.push(Finding {
                id: Id::new(),
                analyzer: self.name().to_string(),
                severity: Severity::Info,
                category: "clones".to_string(),
                file_path: ctx.rel_path.to_string(),
                line: start_line,
                end_line,
                title: format!("near-duplicate code ({} occurrences)", occurrences.len()),
                detail: format!("{}-token window recurs across: {}", self.window_size, locations.join(", ")),
                metadata,
                created_at: Timestamp::now(),
            });
        }

        Ok(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicated_block_across_two_files_is_clustered() {
        let analyzer = ClonesAnalyzer::new(6, 1);
        let body = "fn helper() {\n    let a = 1;\n    let b = 2;\n    a + b\n}\n";
        let files = vec![
            ("a.rs".to_string(), body.to_string()),
            ("b.rs".to_string(), body.to_string()),
        ];
        let index = analyzer.build_index(&files);

        let ctx_a = AnalyzerContext {
            rel_path: "a.rs",
            content: body,
            symbols: &[],
            all_symbols: &[],
            clone_index: Some(&index),
        };
        let findings = analyzer.analyze(&ctx_a).unwrap();
        assert!(!findings.is_empty());
        assert_eq!(findings[0].metadata.get("occurrences").map(String::as_str), Some("2"));
    }

    #[test]
    fn unique_file_yields_no_clones() {
        let analyzer = ClonesAnalyzer::new(6, 1);
        let files = vec![("only.rs".to_string(), "fn unique_thing() { 42 }".to_string())];
        let index = analyzer.build_index(&files);
        let ctx = AnalyzerContext {
            rel_path: "only.rs",
            content: "fn unique_thing() { 42 }",
            symbols: &[],
            all_symbols: &[],
            clone_index: Some(&index),
        };
        assert!(analyzer.analyze(&ctx).unwrap().is_empty());
    }
}
