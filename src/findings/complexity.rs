//! McCabe cyclomatic complexity analyzer (spec §4.4.1).

use super::{Analyzer, AnalyzerContext};
use crate::error::FindingsResult;
use crate::store::findings::Finding;
use crate::types::{Id, Severity, Timestamp};
use std::collections::BTreeMap;

/// Branch keywords/operators that each add one to McCabe complexity, across
/// the language-neutral surface the code indexer extracts from. Lexical
/// counting (not an AST walk) per spec's "no language semantics" non-goal.
const BRANCH_TOKENS: &[&str] = &[
    "if ", "if(", "for ", "for(", "while ", "while(", "case ", "&&", "||", "catch ", "catch(",
    "elif ", "except ", "rescue ",
];

pub struct ComplexityAnalyzer {
    pub threshold: u32,
}

impl ComplexityAnalyzer {
    #[must_use]
    pub fn new(threshold: u32) -> Self {
        Self { threshold }
    }

    fn complexity_of(body: &str) -> u32 {
        let mut complexity = 1u32;
        for token in BRANCH_TOKENS {
            complexity += body.matches(token).count() as u32;
        }
        complexity
    }
}

impl Analyzer for ComplexityAnalyzer {
    fn name(&self) -> &'static str {
        "complexity"
    }

    fn analyze(&self, ctx: &AnalyzerContext<'_>) -> FindingsResult<Vec<Finding>> {
        let mut findings = Vec::new();
        let lines: Vec<&str> = ctx.content.lines().collect();

        for symbol in ctx.symbols {
            if !matches!(symbol.kind.as_str(), "function" | "method") {
                continue;
            }
            let start = symbol.start_line.saturating_sub(1) as usize;
            let end = (symbol.end_line as usize).min(lines.len());
            if start >= end {
                continue;
            }
            let body = lines[start..end].join("\n");
            let complexity = Self::complexity_of(&body);

            if complexity < self.threshold {
                continue;
            }
            let severity = if complexity >= self.threshold * 2 {
                Severity::Critical
            } else {
                Severity::Warning
            };

            let mut metadata = BTreeMap::new();
            metadata.insert("function".to_string(), symbol.name.clone());
            metadata.insert("complexity".to_string(), complexity.to_string());
            metadata.insert("threshold".to_string(), self.threshold.to_string());

            findings.push(Finding {
                id: Id::new(),
                analyzer: self.name().to_string(),
                severity,
                category: "complexity".to_string(),
                file_path: ctx.rel_path.to_string(),
                line: symbol.start_line,
                end_line: symbol.end_line,
                title: format!("{} has cyclomatic complexity {complexity}", symbol.name),
                detail: format!(
                    "function `{}` has cyclomatic complexity {complexity} (threshold {})",
                    symbol.name, self.threshold
                ),
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
    use crate::store::code::Symbol;

    fn symbol(start: u32, end: u32) -> Symbol {
        Symbol {
            id: Id::new(),
            name: "complex".into(),
            kind: "function".into(),
            signature: None,
            doc_comment: None,
            file_path: "a.rs".into(),
            start_line: start,
            end_line: end,
            language: "rust".into(),
            created_at: Timestamp::now(),
        }
    }

    #[test]
    fn simple_function_yields_no_finding() {
        let analyzer = ComplexityAnalyzer::new(10);
        let content = "fn simple() {\n    1 + 1;\n}\n";
        let symbols = vec![symbol(1, 3)];
        let ctx = AnalyzerContext {
            rel_path: "a.rs",
            content,
            symbols: &symbols,
            all_symbols: &[],
            clone_index: None,
        };
        let findings = analyzer.analyze(&ctx).unwrap();
        assert!(findings.is_empty());
    }

    #[test]
    fn branchy_function_crosses_warning_then_critical_band() {
        let analyzer = ComplexityAnalyzer::new(3);
        let content = "fn complex(a: i32) {\n    if a > 0 {}\n    if a > 1 {}\n    if a > 2 {}\n}\n";
        let symbols = vec![symbol(1, 5)];
        let ctx = AnalyzerContext {
            rel_path: "a.rs",
            content,
            symbols: &symbols,
            all_symbols: &[],
            clone_index: None,
        };
        let findings = analyzer.analyze(&ctx).unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Warning);
    }
}
