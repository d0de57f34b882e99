//! Import coupling analyzer (spec §4.4.2).
//!
//! Fan-out is counted lexically from import-like lines (no semantic module
//! resolution, per the crate's "no language semantics" non-goal). Fan-in is
//! approximated over the symbol index: the number of other indexed files
//! that declare a symbol sharing a name with one of this file's symbols,
//! standing in for "files that reference this file's exports" since the
//! indexer does not resolve cross-file references.

use super::{Analyzer, AnalyzerContext};
use crate::error::FindingsResult;
use crate::store::findings::Finding;
use crate::types::{Id, Severity, Timestamp};
use std::collections::{BTreeMap, HashSet};

const IMPORT_PREFIXES: &[&str] = &[
    "use ", "import ", "from ", "require(", "require ", "#include", "require_relative",
];

/// `None` disables the corresponding check entirely (no finding is ever
/// emitted for it), rather than falling back to a guessed default — coupling
/// thresholds are opt-in per `config::CouplingConfig`'s own doc comment.
pub struct CouplingAnalyzer {
    pub fan_out_threshold: Option<u32>,
    pub fan_in_threshold: Option<u32>,
}

impl CouplingAnalyzer {
    #[must_use]
    pub fn new(fan_out_threshold: Option<u32>, fan_in_threshold: Option<u32>) -> Self {
        Self {
            fan_out_threshold,
            fan_in_threshold,
        }
    }

    fn fan_out(content: &str) -> u32 {
        let mut targets = HashSet::new();
        for line in content.lines() {
            let trimmed = line.trim();
            if IMPORT_PREFIXES.iter().any(|p| trimmed.starts_with(p)) {
                targets.insert(trimmed.to_string());
            }
        }
        targets.len() as u32
    }

    fn fan_in(ctx: &AnalyzerContext<'_>) -> u32 {
        let own_names: HashSet<&str> = ctx.symbols.iter().map(|s| s.name.as_str()).collect();
        if own_names.is_empty() {
            return 0;
        }
        ctx.all_symbols
            .iter()
            .filter(|s| s.file_path != ctx.rel_path && own_names.contains(s.name.as_str()))
            .map(|s| s.file_path.as_str())
            .collect::<HashSet<_>>()
            .len() as u32
    }
}

impl Analyzer for CouplingAnalyzer {
    fn name(&self) -> &'static str {
        "coupling"
    }

    fn analyze(&self, ctx: &AnalyzerContext<'_>) -> FindingsResult<Vec<Finding>> {
        let mut findings = Vec::new();

        if let Some(threshold) = self.fan_out_threshold {
            let fan_out = Self::fan_out(ctx.content);
            if fan_out > threshold {
                let mut metadata = BTreeMap::new();
                metadata.insert("fanOut".to_string(), fan_out.to_string());
                metadata.insert("threshold".to_string(), threshold.to_string());
                findings.push(Finding {
                    id: Id::new(),
                    analyzer: self.name().to_string(),
                    severity: Severity::Warning,
                    category: "coupling".to_string(),
                    file_path: ctx.rel_path.to_string(),
                    line: 1,
                    end_line: 1,
                    title: format!("high fan-out ({fan_out})"),
                    detail: format!(
                        "{} imports {fan_out} distinct modules (threshold {threshold})",
                        ctx.rel_path
                    ),
                    metadata,
                    created_at: Timestamp::now(),
                });
            }
        }

        if let Some(threshold) = self.fan_in_threshold {
            let fan_in = Self::fan_in(ctx);
            if fan_in > threshold {
                let mut metadata = BTreeMap::new();
                metadata.insert("fanIn".to_string(), fan_in.to_string());
                metadata.insert("threshold".to_string(), threshold.to_string());
                findings.push(Finding {
                    id: Id::new(),
                    analyzer: self.name().to_string(),
                    severity: Severity::Warning,
                    category: "coupling".to_string(),
                    file_path: ctx.rel_path.to_string(),
                    line: 1,
                    end_line: 1,
                    title: format!("high fan-in ({fan_in})"),
                    detail: format!(
                        "{} symbols are referenced from {fan_in} other files (threshold {threshold})",
                        ctx.rel_path
                    ),
                    metadata,
                    created_at: Timestamp::now(),
                });
            }
        }

        Ok(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::code::Symbol;

    fn sym(name: &str, file: &str) -> Symbol {
        Symbol {
            id: Id::new(),
            name: name.into(),
            kind: "function".into(),
            signature: None,
            doc_comment: None,
            file_path: file.into(),
            start_line: 1,
            end_line: 1,
            language: "rust".into(),
            created_at: Timestamp::now(),
        }
    }

    #[test]
    fn fan_out_above_threshold_is_flagged() {
        let analyzer = CouplingAnalyzer::new(Some(2), Some(100));
        let content = "use a;\nuse b;\nuse c;\nfn main() {}\n";
        let symbols = vec![];
        let ctx = AnalyzerContext {
            rel_path: "main.rs",
            content,
            symbols: &symbols,
            all_symbols: &[],
            clone_index: None,
        };
        let findings = analyzer.analyze(&ctx).unwrap();
        assert!(findings.iter().any(|f| f.title.contains("fan-out")));
    }

    #[test]
    fn fan_in_counts_distinct_other_files_sharing_a_symbol_name() {
        let analyzer = CouplingAnalyzer::new(Some(100), Some(1));
        let own = vec![sym("helper", "lib.rs")];
        let all = vec![
            sym("helper", "lib.rs"),
            sym("helper", "a.rs"),
            sym("helper", "b.rs"),
        ];
        let ctx = AnalyzerContext {
            rel_path: "lib.rs",
            content: "",
            symbols: &own,
            all_symbols: &all,
            clone_index: None,
        };
        let findings = analyzer.analyze(&ctx).unwrap();
        assert!(findings.iter().any(|f| f.title.contains("fan-in")));
    }

    #[test]
    fn disabled_thresholds_never_emit_findings() {
        let analyzer = CouplingAnalyzer::new(None, None);
        let content = "use a;\nuse b;\nuse c;\nuse d;\nuse e;\nfn main() {}\n";
        let own = vec![sym("helper", "lib.rs")];
        let all = vec![sym("helper", "lib.rs"), sym("helper", "a.rs"), sym("helper", "b.rs")];
        let ctx = AnalyzerContext {
            rel_path: "lib.rs",
            content,
            symbols: &own,
            all_symbols: &all,
            clone_index: None,
        };
        let findings = analyzer.analyze(&ctx).unwrap();
        assert!(findings.is_empty(), "coupling checks left unconfigured must not fire");
    }
}
