//! Code indexer: walk → parse → diff → upsert (spec §4.3).

pub mod languages;
pub mod parser;

use crate::error::{IndexError, IndexResult};
use crate::ignore::IgnoreMatcher;
use crate::store::code::Symbol;
use crate::store::Database;
use crate::types::{Id, Timestamp};
use languages::LanguageRegistry;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use xxhash_rust::xxh3::xxh3_64;

/// Counts returned by `Indexer::index`, mirroring spec §4.3's Index RPC
/// response (`filesIndexed`, `symbolsIndexed`, `filesSkipped`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexStats {
    pub files_indexed: u64,
    pub symbols_indexed: u64,
    pub files_skipped: u64,
}

/// Drives the incremental walk → parse → diff → upsert pipeline over one or
/// more roots, using a single `Database` (the code store) and a shared
/// `IgnoreMatcher`.
pub struct Indexer {
    db: Arc<Database>,
    ignore: Arc<IgnoreMatcher>,
    registry: LanguageRegistry,
}

impl Indexer {
    #[must_use]
    pub fn new(db: Arc<Database>, ignore: Arc<IgnoreMatcher>) -> Self {
        Self {
            db,
            ignore,
            registry: LanguageRegistry::new(),
        }
    }

    /// Runs the incremental indexing algorithm over `roots` (spec §4.3).
    /// `force` re-parses every file regardless of `FileInfo.modTime`
    /// freshness. `cancel`, if set, is checked between files; a cancelled
    /// run returns the counts accumulated so far rather than an error,
    /// since the per-file transaction either committed or did not (spec
    /// §5: cancellation never leaves a partial file).
    ///
    /// # Errors
    ///
    /// Returns `IndexError::Storage` if a database transaction fails.
    pub fn index(
        &self,
        roots: &[PathBuf],
        force: bool,
        cancel: Option<&CancellationToken>,
    ) -> IndexResult<IndexStats> {
        let mut stats = IndexStats::default();

        for root in roots {
            for abs_path in self.walk(root) {
                if cancel.is_some_and(CancellationToken::is_cancelled) {
                    return Ok(stats);
                }

                let Ok(rel) = abs_path.strip_prefix(root) else {
                    continue;
                };
                let rel_path = rel.to_string_lossy().replace('\\', "/");

                let Some(lang) = self.registry.identify(&abs_path) else {
                    continue;
                };
                let Some(parser) = self.registry.parser_for(lang) else {
                    // Recognized but unparsed (Dockerfile/Makefile): nothing
                    // to extract, not a failure.
                    continue;
                };

                let Ok(metadata) = std::fs::metadata(&abs_path) else {
                    continue;
                };
                let mod_time = metadata
                    .modified()
                    .ok()
                    .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                    .map_or(0, |d| d.as_nanos() as i64);

                if !force {
                    if let Ok(Some(existing)) = self.db.code_file_info(&rel_path) {
                        if existing.mod_time == mod_time {
                            stats.files_skipped += 1;
                            continue;
                        }
                    }
                }

                let Ok(content) = std::fs::read_to_string(&abs_path) else {
                    stats.files_skipped += 1;
                    continue;
                };

                let Ok(parsed) = parser.parse(&content) else {
                    stats.files_skipped += 1;
                    continue;
                };

                let now = Timestamp::now();
                let symbols: Vec<Symbol> = parsed
                    .into_iter()
                    .map(|p| Symbol {
                        id: Id::new(),
                        name: p.name,
                        kind: p.kind,
                        signature: p.signature,
                        doc_comment: p.doc_comment,
                        file_path: rel_path.clone(),
                        start_line: p.start_line,
                        end_line: p.end_line,
                        language: lang.as_str().to_string(),
                        created_at: now,
                    })
                    .collect();

                let hash = xxh3_64(content.as_bytes());
                let inserted =
                    self.db
                        .code_replace_file(&rel_path, lang.as_str(), mod_time, hash, symbols)?;

                stats.symbols_indexed += inserted.len() as u64;
                stats.files_indexed += 1;
            }
        }

        Ok(stats)
    }

    /// Parses `path` ad-hoc without persisting, for the Symbols RPC when the
    /// path has not been indexed yet.
    ///
    /// # Errors
    ///
    /// Returns `IndexError::UnsupportedLanguage` if no language is
    /// recognized, and `IndexError::Parse` if parsing fails.
    pub fn symbols_for(&self, path: &Path) -> IndexResult<Vec<Symbol>> {
        let lang = self
            .registry
            .identify(path)
            .ok_or_else(|| IndexError::UnsupportedLanguage {
                path: path.to_path_buf(),
            })?;
        let parser = self
            .registry
            .parser_for(lang)
            .ok_or_else(|| IndexError::UnsupportedLanguage {
                path: path.to_path_buf(),
            })?;

        let content = std::fs::read_to_string(path).map_err(|e| IndexError::FileIndex {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let parsed = parser.parse(&content)?;

        let now = Timestamp::now();
        Ok(parsed
            .into_iter()
            .map(|p| Symbol {
                id: Id::new(),
                name: p.name,
                kind: p.kind,
                signature: p.signature,
                doc_comment: p.doc_comment,
                file_path: path.to_string_lossy().to_string(),
                start_line: p.start_line,
                end_line: p.end_line,
                language: lang.as_str().to_string(),
                created_at: now,
            })
            .collect())
    }

    /// Ignore-aware recursive walk of `root`, yielding files only.
    fn walk(&self, root: &Path) -> Vec<PathBuf> {
        let mut out = Vec::new();
        let mut stack = vec![root.to_path_buf()];
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
                    out.push(path);
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreKind;
    use tempfile::tempdir;

    fn setup() -> (tempfile::TempDir, Indexer) {
        let dir = tempdir().unwrap();
        let db = Arc::new(Database::in_memory(StoreKind::Code).unwrap());
        let ignore = Arc::new(IgnoreMatcher::new(dir.path()).unwrap());
        (dir, Indexer::new(db, ignore))
    }

    #[test]
    fn indexes_new_files_and_extracts_symbols() {
        let (dir, indexer) = setup();
        std::fs::write(dir.path().join("main.rs"), "fn main() {}\n").unwrap();

        let stats = indexer.index(&[dir.path().to_path_buf()], false, None).unwrap();
        assert_eq!(stats.files_indexed, 1);
        assert_eq!(stats.symbols_indexed, 1);
        assert_eq!(stats.files_skipped, 0);
    }

    #[test]
    fn unchanged_file_is_skipped_on_second_run() {
        let (dir, indexer) = setup();
        std::fs::write(dir.path().join("main.rs"), "fn main() {}\n").unwrap();

        indexer.index(&[dir.path().to_path_buf()], false, None).unwrap();
        let second = indexer.index(&[dir.path().to_path_buf()], false, None).unwrap();
        assert_eq!(second.files_indexed, 0);
        assert_eq!(second.files_skipped, 1);
    }

    #[test]
    fn ignored_files_are_never_visited() {
        let (dir, indexer) = setup();
        std::fs::create_dir_all(dir.path().join("target")).unwrap();
        std::fs::write(dir.path().join("target/gen.rs"), "fn gen() {}\n").unwrap();

        let stats = indexer.index(&[dir.path().to_path_buf()], false, None).unwrap();
        assert_eq!(stats.files_indexed, 0);
    }

    #[test]
    fn symbols_for_unindexed_path_parses_without_persisting() {
        let (dir, indexer) = setup();
        let path = dir.path().join("lib.rs");
        std::fs::write(&path, "pub fn greet() {}\n").unwrap();

        let symbols = indexer.symbols_for(&path).unwrap();
        assert_eq!(symbols.len(), 1);
        assert!(indexer.db.code_file_info(&path.to_string_lossy()).unwrap().is_none());
    }
}
