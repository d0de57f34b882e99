//! Gitignore-compatible path filter shared by the indexer, findings runner,
//! and watcher.

mod defaults;

pub use defaults::DEFAULT_PATTERNS;

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use ignore::Match;
use std::path::{Path, PathBuf};

/// Decides whether a path should be excluded from indexing/analysis,
/// combining the built-in defaults with an optional `<root>/.aideignore`.
pub struct IgnoreMatcher {
    gitignore: Gitignore,
    root: PathBuf,
}

impl IgnoreMatcher {
    /// Loads the built-in default pattern list, then appends patterns from
    /// `<root>/.aideignore` if present. A missing file is not an error; I/O
    /// errors other than "not found" fail the call.
    ///
    /// # Errors
    ///
    /// Returns an error if `.aideignore` exists but cannot be read, or if a
    /// pattern is malformed.
    pub fn new(root: &Path) -> std::io::Result<Self> {
        let mut builder = GitignoreBuilder::new(root);

        for pattern in DEFAULT_PATTERNS {
            builder
                .add_line(None, pattern)
                .map_err(|e| std::io::Error::other(e.to_string()))?;
        }

        let override_path = root.join(".aideignore");
        if override_path.exists() {
            if let Some(err) = builder.add(&override_path) {
                return Err(std::io::Error::other(err.to_string()));
            }
        }

        let gitignore = builder
            .build()
            .map_err(|e| std::io::Error::other(e.to_string()))?;

        Ok(Self {
            gitignore,
            root: root.to_path_buf(),
        })
    }

    /// Decides whether `path` (root-relative, forward-slash, no trailing
    /// slash) should be excluded.
    ///
    /// Negation precedence (spec §8 invariant 8) and the ancestor-directory
    /// fallback for isolated file paths (spec §4.1 step 5) are both handled
    /// by `matched_path_or_any_parents`, which walks each ancestor directory
    /// of the path applying the same rule set with `is_dir=true` whenever
    /// the direct match is inconclusive.
    #[must_use]
    pub fn should_ignore(&self, path: &str, is_dir: bool) -> bool {
        matches!(
            self.gitignore.matched_path_or_any_parents(path, is_dir),
            Match::Ignore(_)
        )
    }

    /// Convenience entry point for filesystem walks: converts an absolute
    /// path to root-relative, then returns `(skip_entry, skip_subtree)`.
    /// `skip_subtree` is only meaningful (and only ever `true`) for
    /// directories.
    #[must_use]
    pub fn walk_entry(&self, abs_path: &Path, is_dir: bool) -> (bool, bool) {
        let rel = abs_path.strip_prefix(&self.root).unwrap_or(abs_path);
        let rel_str = rel.to_string_lossy().replace('\\', "/");
        let ignored = self.should_ignore(&rel_str, is_dir);
        (ignored, ignored && is_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn defaults_match_vendor_and_generated_files() {
        let dir = tempdir().unwrap();
        let matcher = IgnoreMatcher::new(dir.path()).unwrap();

        assert!(matcher.should_ignore("vendor/github.com/x/y.go", false));
        assert!(!matcher.should_ignore("src/main.go", false));
        assert!(matcher.should_ignore("api.pb.go", false));
        assert!(!matcher.should_ignore("build", false));
        assert!(matcher.should_ignore("build", true));
    }

    #[test]
    fn negation_overrides_earlier_positive_match() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(".aideignore"), "*.log\n!important.log\n").unwrap();
        let matcher = IgnoreMatcher::new(dir.path()).unwrap();

        assert!(matcher.should_ignore("debug.log", false));
        assert!(!matcher.should_ignore("important.log", false));
    }

    #[test]
    fn missing_aideignore_is_not_an_error() {
        let dir = tempdir().unwrap();
        assert!(IgnoreMatcher::new(dir.path()).is_ok());
    }

    #[test]
    fn isolated_file_under_unwalked_ignored_dir_is_ignored() {
        let dir = tempdir().unwrap();
        let matcher = IgnoreMatcher::new(dir.path()).unwrap();
        // vendor/ is a built-in default; a file deep inside it, handed in
        // isolation (e.g. from the watcher), must still be recognized.
        assert!(matcher.should_ignore("vendor/x/y/z.go", false));
    }

    #[test]
    fn walk_entry_skips_whole_subtree_for_ignored_directories() {
        let dir = tempdir().unwrap();
        let matcher = IgnoreMatcher::new(dir.path()).unwrap();
        let node_modules = dir.path().join("node_modules");

        let (skip_entry, skip_subtree) = matcher.walk_entry(&node_modules, true);
        assert!(skip_entry);
        assert!(skip_subtree);
    }
}
