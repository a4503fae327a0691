//! Language detection, tree-sitter grammar registry and per-language node classification.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::types::NodeKind;

/// Supported language with its tree-sitter grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    Rust,
    Python,
    JavaScript,
    TypeScript,
    Tsx,
    Go,
    Bash,
    Toml,
    Json,
    Markdown,
}

/// How the chunker should treat a syntax node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
    /// A named definition that becomes its own chunk.
    Definition(NodeKind),
    /// A wrapper whose children are visited in its place (`export`, decorators).
    Transparent,
    /// `const x = () => ...` style bindings; chunked only when they bind a function
    /// or are exported.
    Binding,
    /// Go `type (...)` declarations; each spec is classified by its underlying type.
    TypeGroup,
    Ignore,
}

impl Lang {
    /// Identifier stored in node properties and config.
    #[must_use]
    pub fn id(self) -> &'static str {
        match self {
            Self::Rust => "rust",
            Self::Python => "python",
            Self::JavaScript => "javascript",
            Self::TypeScript => "typescript",
            Self::Tsx => "tsx",
            Self::Go => "go",
            Self::Bash => "bash",
            Self::Toml => "toml",
            Self::Json => "json",
            Self::Markdown => "markdown",
        }
    }

    /// Get the tree-sitter grammar. Returns `None` if the
    /// corresponding feature is not enabled.
    #[must_use]
    pub fn grammar(self) -> Option<tree_sitter::Language> {
        match self {
            #[cfg(feature = "lang-rust")]
            Self::Rust => Some(tree_sitter_rust::LANGUAGE.into()),
            #[cfg(feature = "lang-python")]
            Self::Python => Some(tree_sitter_python::LANGUAGE.into()),
            #[cfg(feature = "lang-js")]
            Self::JavaScript => Some(tree_sitter_javascript::LANGUAGE.into()),
            #[cfg(feature = "lang-js")]
            Self::TypeScript => Some(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
            #[cfg(feature = "lang-js")]
            Self::Tsx => Some(tree_sitter_typescript::LANGUAGE_TSX.into()),
            #[cfg(feature = "lang-go")]
            Self::Go => Some(tree_sitter_go::LANGUAGE.into()),
            #[cfg(feature = "lang-config")]
            Self::Bash => Some(tree_sitter_bash::LANGUAGE.into()),
            #[cfg(feature = "lang-config")]
            Self::Toml => Some(tree_sitter_toml_ng::LANGUAGE.into()),
            #[cfg(feature = "lang-config")]
            Self::Json => Some(tree_sitter_json::LANGUAGE.into()),
            #[cfg(feature = "lang-config")]
            Self::Markdown => Some(tree_sitter_md::LANGUAGE.into()),
            #[allow(unreachable_patterns)]
            _ => None,
        }
    }

    #[must_use]
    pub fn is_js_family(self) -> bool {
        matches!(self, Self::JavaScript | Self::TypeScript | Self::Tsx)
    }

    /// Classify a syntax node kind for chunking.
    #[must_use]
    pub fn role(self, ts_kind: &str) -> NodeRole {
        use NodeKind as K;
        use NodeRole::{Binding, Definition, Ignore, Transparent, TypeGroup};

        match self {
            Self::Rust => match ts_kind {
                "function_item" | "function_signature_item" => Definition(K::Function),
                "struct_item" | "union_item" => Definition(K::Struct),
                "enum_item" => Definition(K::Enum),
                "trait_item" => Definition(K::Trait),
                "impl_item" => Definition(K::Impl),
                "type_item" => Definition(K::TypeAlias),
                "const_item" | "static_item" => Definition(K::Constant),
                "mod_item" => Definition(K::Module),
                _ => Ignore,
            },
            Self::Python => match ts_kind {
                "function_definition" => Definition(K::Function),
                "class_definition" => Definition(K::Class),
                "decorated_definition" => Transparent,
                _ => Ignore,
            },
            Self::JavaScript | Self::TypeScript | Self::Tsx => match ts_kind {
                "function_declaration" | "generator_function_declaration" => {
                    Definition(K::Function)
                }
                "class_declaration" | "abstract_class_declaration" => Definition(K::Class),
                "method_definition" => Definition(K::Method),
                "interface_declaration" => Definition(K::Interface),
                "type_alias_declaration" => Definition(K::TypeAlias),
                "enum_declaration" => Definition(K::Enum),
                "lexical_declaration" | "variable_declaration" => Binding,
                "export_statement" => Transparent,
                _ => Ignore,
            },
            Self::Go => match ts_kind {
                "function_declaration" => Definition(K::Function),
                "method_declaration" => Definition(K::Method),
                "type_declaration" => TypeGroup,
                _ => Ignore,
            },
            Self::Bash | Self::Toml | Self::Json | Self::Markdown => Ignore,
        }
    }

    /// Syntax node kinds that hold import statements.
    #[must_use]
    pub fn import_node_kinds(self) -> &'static [&'static str] {
        match self {
            Self::Rust => &["use_declaration"],
            Self::Python => &["import_statement", "import_from_statement"],
            Self::JavaScript | Self::TypeScript | Self::Tsx => &["import_statement"],
            Self::Go => &["import_declaration"],
            _ => &[],
        }
    }
}

impl std::fmt::Display for Lang {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// Detect language from file extension.
#[must_use]
pub fn detect_language(path: &Path) -> Option<Lang> {
    let ext = path.extension()?.to_str()?;
    match ext {
        "rs" => Some(Lang::Rust),
        "py" | "pyi" => Some(Lang::Python),
        "js" | "jsx" | "mjs" | "cjs" => Some(Lang::JavaScript),
        "ts" | "mts" | "cts" => Some(Lang::TypeScript),
        "tsx" => Some(Lang::Tsx),
        "go" => Some(Lang::Go),
        "sh" | "bash" | "zsh" => Some(Lang::Bash),
        "toml" => Some(Lang::Toml),
        "json" | "jsonc" => Some(Lang::Json),
        "md" | "markdown" => Some(Lang::Markdown),
        _ => None,
    }
}
