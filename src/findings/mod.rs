//! Findings runner: scope, per-analyzer status, idempotent re-run (spec §4.4).

pub mod clones;
pub mod complexity;
pub mod coupling;
pub mod secrets;

use crate::config::FindingsConfig;
use crate::error::FindingsResult;
use crate::ignore::IgnoreMatcher;
use crate::store::code::Symbol;
use crate::store::findings::Finding;
use crate::store::Database;
use crate::types::Timestamp;
use clones::{CloneIndex, ClonesAnalyzer};
use complexity::ComplexityAnalyzer;
use coupling::CouplingAnalyzer;
use secrets::SecretsAnalyzer;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Per-file input an analyzer sees. Cross-file analyzers (coupling, clones)
/// also receive a whole-scope view through `all_symbols`/`clone_index`.
pub struct AnalyzerContext<'a> {
    pub rel_path: &'a str,
    pub content: &'a str,
    pub symbols: &'a [Symbol],
    pub all_symbols: &'a [Symbol],
    pub clone_index: Option<&'a CloneIndex>,
}

/// One pluggable static-analysis check. New analyzers are added purely by
/// registration in `Runner::with_analyzers`, per spec §9's trait-object
/// polymorphism design.
pub trait Analyzer: Send + Sync {
    fn name(&self) -> &'static str;

    /// # Errors
    ///
    /// Returns `FindingsError` if the analyzer cannot complete (storage
    /// errors only; malformed source is tolerated, not an error).
    fn analyze(&self, ctx: &AnalyzerContext<'_>) -> FindingsResult<Vec<Finding>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Error(String),
}

#[derive(Debug, Clone)]
pub struct AnalyzerStatus {
    pub state: RunState,
    pub scope: Option<String>,
    pub last_run: Option<Timestamp>,
    pub last_duration_ms: Option<u64>,
    pub findings_count: u64,
}

impl Default for AnalyzerStatus {
    fn default() -> Self {
        Self {
            state: RunState::Idle,
            scope: None,
            last_run: None,
            last_duration_ms: None,
            findings_count: 0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub files_scanned: u64,
    pub findings_by_analyzer: BTreeMap<String, u64>,
}

/// Runs the configured analyzer set over a scope, writing findings to the
/// findings store. Re-running is idempotent: each analyzer clears its prior
/// findings for a file before inserting the new batch.
pub struct Runner {
    findings_db: Arc<Database>,
    ignore: Arc<IgnoreMatcher>,
    analyzers: Vec<Box<dyn Analyzer>>,
    clones: ClonesAnalyzer,
    status: Mutex<HashMap<String, AnalyzerStatus>>,
}

impl Runner {
    /// Builds the default four-analyzer set from `config`.
    #[must_use]
    pub fn new(config: &FindingsConfig, findings_db: Arc<Database>, ignore: Arc<IgnoreMatcher>) -> Self {
        let analyzers: Vec<Box<dyn Analyzer>> = vec![
            Box::new(ComplexityAnalyzer::new(config.complexity.threshold)),
            Box::new(CouplingAnalyzer::new(config.coupling.fan_out, config.coupling.fan_in)),
            Box::new(SecretsAnalyzer),
        ];
        let clones = ClonesAnalyzer::new(config.clones.window_size, config.clones.min_lines);
        Self::with_analyzers(analyzers, clones, findings_db, ignore)
    }

    /// Builds a `Runner` from an explicit analyzer set, the extensibility
    /// entry point named in spec §9.
    #[must_use]
    pub fn with_analyzers(
        analyzers: Vec<Box<dyn Analyzer>>,
        clones: ClonesAnalyzer,
        findings_db: Arc<Database>,
        ignore: Arc<IgnoreMatcher>,
    ) -> Self {
        let mut status = HashMap::new();
        for analyzer in &analyzers {
            status.insert(analyzer.name().to_string(), AnalyzerStatus::default());
        }
        status.insert("clones".to_string(), AnalyzerStatus::default());

        Self {
            findings_db,
            ignore,
            analyzers,
            clones,
            status: Mutex::new(status),
        }
    }

    /// Runs all analyzers over `root` (optionally restricted to `scope`, a
    /// subtree of `root`), using `symbols_by_file` as the code index view
    /// (empty if the code store is disabled — complexity/coupling simply
    /// find nothing to flag).
    ///
    /// # Errors
    ///
    /// Returns `FindingsError::Storage` if a findings-store write fails.
    pub fn run(
        &self,
        root: &Path,
        scope: Option<&Path>,
        symbols_by_file: &HashMap<String, Vec<Symbol>>,
    ) -> FindingsResult<RunSummary> {
        let scope_label = scope.map(|p| p.to_string_lossy().to_string());
        self.mark_all_running(scope_label.clone());

        let walk_root = scope.unwrap_or(root);
        let files = self.collect_files(root, walk_root);

        let all_symbols: Vec<Symbol> = symbols_by_file.values().flatten().cloned().collect();
        let file_contents: Vec<(String, String)> = files
            .iter()
            .filter_map(|(rel, abs)| std::fs::read_to_string(abs).ok().map(|c| (rel.clone(), c)))
            .collect();
        let clone_index = self.clones.build_index(&file_contents);

        let mut summary = RunSummary::default();
        let start = Instant::now();

        for (rel_path, content) in &file_contents {
            summary.files_scanned += 1;
            let file_symbols = symbols_by_file.get(rel_path).map_or(&[][..], Vec::as_slice);
            let ctx = AnalyzerContext {
                rel_path,
                content,
                symbols: file_symbols,
                all_symbols: &all_symbols,
                clone_index: Some(&clone_index),
            };

            for analyzer in &self.analyzers {
                let findings = analyzer.analyze(&ctx)?;
                let count = findings.len() as u64;
                self.findings_db
                    .findings_replace_for_file(analyzer.name(), rel_path, findings)?;
                *summary.findings_by_analyzer.entry(analyzer.name().to_string()).or_insert(0) += count;
            }

            let clone_findings = self.clones.analyze(&ctx)?;
            let count = clone_findings.len() as u64;
            self.findings_db
                .findings_replace_for_file("clones", rel_path, clone_findings)?;
            *summary.findings_by_analyzer.entry("clones".to_string()).or_insert(0) += count;
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        self.mark_all_idle(scope_label, duration_ms, &summary);
        Ok(summary)
    }

    #[must_use]
    pub fn status(&self) -> Vec<(String, AnalyzerStatus)> {
        let guard = self.status.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut entries: Vec<_> = guard.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    fn mark_all_running(&self, scope: Option<String>) {
        let mut guard = self.status.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        for status in guard.values_mut() {
            status.state = RunState::Running;
            status.scope.clone_from(&scope);
        }
    }

    fn mark_all_idle(&self, scope: Option<String>, duration_ms: u64, summary: &RunSummary) {
        let mut guard = self.status.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let now = Timestamp::now();
        for (name, status) in guard.iter_mut() {
            status.state = RunState::Idle;
            status.scope.clone_from(&scope);
            status.last_run = Some(now);
            status.last_duration_ms = Some(duration_ms);
            status.findings_count = summary.findings_by_analyzer.get(name).copied().unwrap_or(0);
        }
    }

    /// Ignore-aware walk of `walk_root`, returning `(root-relative, absolute)`
    /// pairs rooted at `root` even when `walk_root` is a restricted subtree.
    fn collect_files(&self, root: &Path, walk_root: &Path) -> Vec<(String, PathBuf)> {
        let mut out = Vec::new();
        let mut stack = vec![walk_root.to_path_buf()];
        while let Some(dir) = stack.pop() {
            let Ok(entries) = std::fs::read_dir(&dir) else {
                continue;
            };
            for entry in entries.filter_map(Result::ok) {
                let path = entry.path();
                let Ok(file_type) = entry.file_type() else {
                    continue;
                };
                let is_dir = file_type.is_dir();
                let (skip_entry, skip_subtree) = self.ignore.walk_entry(&path, is_dir);
                if skip_entry {
                    if !skip_subtree && is_dir {
                        stack.push(path);
                    }
                    continue;
                }
                if is_dir {
                    stack.push(path);
                } else if file_type.is_file() {
                    let rel = path.strip_prefix(root).unwrap_or(&path);
                    out.push((rel.to_string_lossy().replace('\\', "/"), path.clone()));
                }
            }
        }
        out
    }
}
