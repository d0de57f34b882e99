//! Built-in default ignore patterns, the testable baseline for spec §8 E2.

/// Gitignore-syntax default patterns applied before any `.aideignore`
/// entries. Covers common VCS, build-output, dependency, cache, and IDE
/// directories across major language ecosystems, generated-code suffixes,
/// test-fixture directories, and lock files.
pub const DEFAULT_PATTERNS: &[&str] = &[
    // VCS
    ".git/",
    ".hg/",
    ".svn/",
    // Build output
    "target/",
    "dist/",
    "build/",
    "out/",
    // Dependency directories
    "node_modules/",
    "vendor/",
    ".venv/",
    "venv/",
    // Caches
    ".cache/",
    "__pycache__/",
    ".pytest_cache/",
    ".mypy_cache/",
    // IDE
    ".idea/",
    ".vscode/",
    // Generated code
    "*.pb.go",
    "*.gen.go",
    "*.pb.ts",
    "*.generated.*",
    // Test fixtures
    "testdata/",
    "fixtures/",
    // Lock files
    "Cargo.lock",
    "package-lock.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "poetry.lock",
];
