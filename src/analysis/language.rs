use serde::Serialize;
use std::path::Path;

use crate::error::{ToolError, ToolResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Rust,
    Python,
    JavaScript,
    TypeScript,
    Tsx,
    Json,
    Go,
    Java,
    C,
    Cpp,
    CSharp,
    Kotlin,
    Swift,
    Php,
    Ruby,
    Css,
    Html,
    Markup,
    Unknown,
}

impl Language {
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "rs" => Language::Rust,
            "py" | "pyw" => Language::Python,
            "js" | "mjs" | "cjs" | "jsx" => Language::JavaScript,
            "ts" | "mts" | "cts" => Language::TypeScript,
            "tsx" => Language::Tsx,
            "json" => Language::Json,
            "go" => Language::Go,
            "java" => Language::Java,
            "c" | "h" => Language::C,
            "cpp" | "cc" | "cxx" | "hpp" | "hh" => Language::Cpp,
            "cs" => Language::CSharp,
            "kt" | "kts" => Language::Kotlin,
            "swift" => Language::Swift,
            "php" => Language::Php,
            "rb" => Language::Ruby,
            "css" | "scss" | "less" => Language::Css,
            "html" | "htm" | "vue" | "svelte" | "xml" => Language::Html,
            "md" | "txt" | "yaml" | "yml" | "toml" | "sql" | "sh" | "bash" => Language::Markup,
            _ => Language::Unknown,
        }
    }

    pub fn from_path(path: impl AsRef<Path>) -> Self {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(Self::from_extension)
            .unwrap_or(Language::Unknown)
    }

    /// Accepts language names as well as extensions ("typescript", "ts").
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "rust" => Language::Rust,
            "python" => Language::Python,
            "javascript" | "node" => Language::JavaScript,
            "typescript" => Language::TypeScript,
            "csharp" | "c#" => Language::CSharp,
            "c++" => Language::Cpp,
            other => Self::from_extension(other),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Language::Rust => "rust",
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Tsx => "tsx",
            Language::Json => "json",
            Language::Go => "go",
            Language::Java => "java",
            Language::C => "c",
            Language::Cpp => "cpp",
            Language::CSharp => "csharp",
            Language::Kotlin => "kotlin",
            Language::Swift => "swift",
            Language::Php => "php",
            Language::Ruby => "ruby",
            Language::Css => "css",
            Language::Html => "html",
            Language::Markup => "text",
            Language::Unknown => "unknown",
        }
    }

    pub fn supports_ast(self) -> bool {
        matches!(
            self,
            Language::Rust
                | Language::Python
                | Language::JavaScript
                | Language::TypeScript
                | Language::Tsx
        )
    }

    /// Languages whose blocks are delimited by braces.
    pub fn uses_braces(self) -> bool {
        matches!(
            self,
            Language::Rust
                | Language::JavaScript
                | Language::TypeScript
                | Language::Tsx
                | Language::Json
                | Language::Go
                | Language::Java
                | Language::C
                | Language::Cpp
                | Language::CSharp
                | Language::Kotlin
                | Language::Swift
                | Language::Php
                | Language::Css
        )
    }

    /// True for source languages the code-intelligence tools understand.
    pub fn is_code(self) -> bool {
        !matches!(
            self,
            Language::Json | Language::Css | Language::Html | Language::Markup | Language::Unknown
        )
    }

    pub fn line_comment(self) -> &'static str {
        match self {
            Language::Python | Language::Ruby => "#",
            _ => "//",
        }
    }

    pub fn tree_sitter_language(self) -> ToolResult<tree_sitter::Language> {
        match self {
            Language::Rust => Ok(tree_sitter_rust::LANGUAGE.into()),
            Language::Python => Ok(tree_sitter_python::LANGUAGE.into()),
            Language::JavaScript => Ok(tree_sitter_javascript::LANGUAGE.into()),
            Language::TypeScript => Ok(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
            Language::Tsx => Ok(tree_sitter_typescript::LANGUAGE_TSX.into()),
            other => Err(ToolError::Unsupported(format!(
                "No syntax tree support for {}",
                other.as_str()
            ))),
        }
    }

    /// Error for tools that need a source language.
    pub fn require_code(self, path: &str) -> ToolResult<()> {
        if self.is_code() {
            Ok(())
        } else {
            Err(ToolError::Unsupported(format!(
                "{} is not a supported source file ({}); code analysis needs a programming language",
                path,
                self.as_str()
            )))
        }
    }
}
