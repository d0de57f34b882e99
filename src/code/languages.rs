//! Language identification and the extension/basename → parser registry.

use super::parser::{Parser, TreeSitterParser};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Languages the code indexer recognizes (spec §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LanguageId {
    Rust,
    Python,
    JavaScript,
    TypeScript,
    Go,
    Java,
    C,
    Cpp,
    Ruby,
    Dockerfile,
    Makefile,
}

impl LanguageId {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            LanguageId::Rust => "rust",
            LanguageId::Python => "python",
            LanguageId::JavaScript => "javascript",
            LanguageId::TypeScript => "typescript",
            LanguageId::Go => "go",
            LanguageId::Java => "java",
            LanguageId::C => "c",
            LanguageId::Cpp => "cpp",
            LanguageId::Ruby => "ruby",
            LanguageId::Dockerfile => "dockerfile",
            LanguageId::Makefile => "makefile",
        }
    }
}

/// Maps extensions and well-known basenames to a `LanguageId` and, where a
/// grammar is registered, a parser. `Dockerfile`/`Makefile` are recognized
/// languages with no structural parser: they are indexed (FileInfo written)
/// but produce no symbols.
pub struct LanguageRegistry {
    by_extension: HashMap<&'static str, LanguageId>,
    by_basename: HashMap<&'static str, LanguageId>,
    parsers: HashMap<&'static str, Arc<dyn Parser>>,
}

impl Default for LanguageRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageRegistry {
    #[must_use]
    pub fn new() -> Self {
        let mut by_extension = HashMap::new();
        let mut by_basename = HashMap::new();
        let mut parsers: HashMap<&'static str, Arc<dyn Parser>> = HashMap::new();

        by_extension.insert("rs", LanguageId::Rust);
        by_extension.insert("py", LanguageId::Python);
        by_extension.insert("pyi", LanguageId::Python);
        by_extension.insert("js", LanguageId::JavaScript);
        by_extension.insert("mjs", LanguageId::JavaScript);
        by_extension.insert("cjs", LanguageId::JavaScript);
        by_extension.insert("jsx", LanguageId::JavaScript);
        by_extension.insert("ts", LanguageId::TypeScript);
        by_extension.insert("tsx", LanguageId::TypeScript);
        by_extension.insert("go", LanguageId::Go);
        by_extension.insert("java", LanguageId::Java);
        by_extension.insert("c", LanguageId::C);
        by_extension.insert("h", LanguageId::C);
        by_extension.insert("cpp", LanguageId::Cpp);
        by_extension.insert("cc", LanguageId::Cpp);
        by_extension.insert("cxx", LanguageId::Cpp);
        by_extension.insert("hpp", LanguageId::Cpp);
        by_extension.insert("rb", LanguageId::Ruby);

        by_basename.insert("dockerfile", LanguageId::Dockerfile);
        by_basename.insert("makefile", LanguageId::Makefile);

        for parser in super::parser::builtin_parsers() {
            parsers.insert(parser.language(), parser);
        }

        Self {
            by_extension,
            by_basename,
            parsers,
        }
    }

    /// Identifies the language of `path` by extension, falling back to a
    /// well-known basename (case-insensitive).
    #[must_use]
    pub fn identify(&self, path: &Path) -> Option<LanguageId> {
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            if let Some(lang) = self.by_extension.get(ext.to_lowercase().as_str()) {
                return Some(*lang);
            }
        }
        let basename = path.file_name()?.to_str()?.to_lowercase();
        self.by_basename.get(basename.as_str()).copied()
    }

    /// The parser for a language, if a tree-sitter grammar is registered.
    #[must_use]
    pub fn parser_for(&self, lang: LanguageId) -> Option<Arc<dyn Parser>> {
        self.parsers.get(lang.as_str()).cloned()
    }
}

pub(super) fn rust_parser() -> TreeSitterParser {
    TreeSitterParser::new(
        "rust",
        tree_sitter_rust::LANGUAGE.into(),
        r"
        (function_item name: (identifier) @name) @function
        (struct_item name: (type_identifier) @name) @struct
        (enum_item name: (type_identifier) @name) @enum
        (trait_item name: (type_identifier) @name) @interface
        (type_item name: (type_identifier) @name) @type
        (const_item name: (identifier) @name) @constant
        (static_item name: (identifier) @name) @constant
        ",
        "//",
    )
}

pub(super) fn python_parser() -> TreeSitterParser {
    TreeSitterParser::new(
        "python",
        tree_sitter_python::LANGUAGE.into(),
        r"
        (function_definition name: (identifier) @name) @function
        (class_definition name: (identifier) @name) @class
        ",
        "#",
    )
}

pub(super) fn javascript_parser() -> TreeSitterParser {
    TreeSitterParser::new(
        "javascript",
        tree_sitter_javascript::LANGUAGE.into(),
        r"
        (function_declaration name: (identifier) @name) @function
        (class_declaration name: (identifier) @name) @class
        (method_definition name: (property_identifier) @name) @method
        ",
        "//",
    )
}

pub(super) fn typescript_parser() -> TreeSitterParser {
    TreeSitterParser::new(
        "typescript",
        tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
        r"
        (function_declaration name: (identifier) @name) @function
        (class_declaration name: (type_identifier) @name) @class
        (interface_declaration name: (type_identifier) @name) @interface
        (method_definition name: (property_identifier) @name) @method
        (type_alias_declaration name: (type_identifier) @name) @type
        ",
        "//",
    )
}

pub(super) fn go_parser() -> TreeSitterParser {
    TreeSitterParser::new(
        "go",
        tree_sitter_go::LANGUAGE.into(),
        r"
        (function_declaration name: (identifier) @name) @function
        (method_declaration name: (field_identifier) @name) @method
        (type_spec name: (type_identifier) @name) @type
        ",
        "//",
    )
}

pub(super) fn java_parser() -> TreeSitterParser {
    TreeSitterParser::new(
        "java",
        tree_sitter_java::LANGUAGE.into(),
        r"
        (class_declaration name: (identifier) @name) @class
        (interface_declaration name: (identifier) @name) @interface
        (enum_declaration name: (identifier) @name) @enum
        (method_declaration name: (identifier) @name) @method
        ",
        "//",
    )
}

pub(super) fn c_parser() -> TreeSitterParser {
    TreeSitterParser::new(
        "c",
        tree_sitter_c::LANGUAGE.into(),
        r"
        (function_definition declarator: (function_declarator declarator: (identifier) @name)) @function
        (struct_specifier name: (type_identifier) @name) @struct
        (enum_specifier name: (type_identifier) @name) @enum
        ",
        "//",
    )
}

pub(super) fn cpp_parser() -> TreeSitterParser {
    TreeSitterParser::new(
        "cpp",
        tree_sitter_cpp::LANGUAGE.into(),
        r"
        (function_definition declarator: (function_declarator declarator: (identifier) @name)) @function
        (class_specifier name: (type_identifier) @name) @class
        (struct_specifier name: (type_identifier) @name) @struct
        (enum_specifier name: (type_identifier) @name) @enum
        ",
        "//",
    )
}

pub(super) fn ruby_parser() -> TreeSitterParser {
    TreeSitterParser::new(
        "ruby",
        tree_sitter_ruby::LANGUAGE.into(),
        r"
        (method name: (identifier) @name) @method
        (class name: (constant) @name) @class
        (module name: (constant) @name) @type
        ",
        "#",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn identifies_by_extension() {
        let registry = LanguageRegistry::new();
        assert_eq!(
            registry.identify(&PathBuf::from("src/main.rs")),
            Some(LanguageId::Rust)
        );
        assert_eq!(
            registry.identify(&PathBuf::from("app/index.tsx")),
            Some(LanguageId::TypeScript)
        );
    }

    #[test]
    fn identifies_by_basename_case_insensitive() {
        let registry = LanguageRegistry::new();
        assert_eq!(
            registry.identify(&PathBuf::from("Dockerfile")),
            Some(LanguageId::Dockerfile)
        );
        assert_eq!(
            registry.identify(&PathBuf::from("makefile")),
            Some(LanguageId::Makefile)
        );
    }

    #[test]
    fn unrecognized_extension_yields_none() {
        let registry = LanguageRegistry::new();
        assert_eq!(registry.identify(&PathBuf::from("notes.txt")), None);
    }

    #[test]
    fn dockerfile_and_makefile_have_no_parser() {
        let registry = LanguageRegistry::new();
        assert!(registry.parser_for(LanguageId::Dockerfile).is_none());
        assert!(registry.parser_for(LanguageId::Makefile).is_none());
    }

    #[test]
    fn every_grammar_language_has_a_parser() {
        let registry = LanguageRegistry::new();
        for lang in [
            LanguageId::Rust,
            LanguageId::Python,
            LanguageId::JavaScript,
            LanguageId::TypeScript,
            LanguageId::Go,
            LanguageId::Java,
            LanguageId::C,
            LanguageId::Cpp,
            LanguageId::Ruby,
        ] {
            assert!(registry.parser_for(lang).is_some(), "{lang:?} missing parser");
        }
    }
}
