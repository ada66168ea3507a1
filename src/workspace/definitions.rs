//! Regex-based definition extraction.
//!
//! Each extension maps to a language family; every family gets the generic
//! function/class/variable patterns that make sense for it, JavaScript adds
//! arrow functions and class methods, and indented Python `def`s are methods.
//! TODO-style comments and a whole-file entry are emitted for every file.

use regex::Regex;
use std::sync::OnceLock;

use super::index::{Definition, DefinitionKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    JavaScript,
    Python,
    Rust,
    Go,
    Ruby,
    CLike,
    Other,
}

impl Family {
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "js" | "jsx" | "mjs" | "cjs" | "ts" | "tsx" | "vue" | "svelte" => Family::JavaScript,
            "py" | "pyw" => Family::Python,
            "rs" => Family::Rust,
            "go" => Family::Go,
            "rb" => Family::Ruby,
            "java" | "kt" | "c" | "h" | "cpp" | "hpp" | "cc" | "cs" | "swift" | "scala" | "php" => {
                Family::CLike
            }
            _ => Family::Other,
        }
    }

    pub fn from_path(path: &str) -> Self {
        let ext = path.rsplit_once('.').map(|(_, e)| e).unwrap_or_default();
        Self::from_extension(ext)
    }
}

struct Pattern {
    kind: DefinitionKind,
    regex: Regex,
    /// Indented matches are reported as methods.
    indented_is_method: bool,
}

struct Patterns {
    javascript: Vec<Pattern>,
    python: Vec<Pattern>,
    rust: Vec<Pattern>,
    go: Vec<Pattern>,
    ruby: Vec<Pattern>,
    clike: Vec<Pattern>,
    todo: Option<Regex>,
}

const JS_KEYWORDS: &[&str] = &[
    "if", "for", "while", "switch", "catch", "function", "return", "constructor", "else", "do",
    "with", "typeof", "new",
];

fn compile(specs: &[(DefinitionKind, &str, bool)]) -> Vec<Pattern> {
    specs
        .iter()
        .filter_map(|(kind, pattern, indented_is_method)| {
            Regex::new(pattern).ok().map(|regex| Pattern {
                kind: *kind,
                regex,
                indented_is_method: *indented_is_method,
            })
        })
        .collect()
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        javascript: compile(&[
            (
                DefinitionKind::Function,
                r"^\s*(?:export\s+)?(?:default\s+)?(?:async\s+)?function\s*\*?\s*([A-Za-z_$][\w$]*)",
                false,
            ),
            (
                DefinitionKind::Function,
                r"^\s*(?:export\s+)?(?:const|let|var)\s+([A-Za-z_$][\w$]*)\s*(?::[^=]+)?=\s*(?:async\s+)?(?:\([^)]*\)|[A-Za-z_$][\w$]*)\s*(?::[^=]+)?=>",
                false,
            ),
            (
                DefinitionKind::Class,
                r"^\s*(?:export\s+)?(?:default\s+)?(?:abstract\s+)?(?:class|interface)\s+([A-Za-z_$][\w$]*)",
                false,
            ),
            (
                DefinitionKind::Method,
                r"^\s+(?:(?:public|private|protected|static|async|get|set|readonly|override)\s+)*([A-Za-z_$][\w$]*)\s*\([^)]*\)\s*(?::\s*[^{]+)?\{",
                false,
            ),
            (
                DefinitionKind::Variable,
                r"^\s*(?:export\s+)?(?:const|let|var)\s+([A-Za-z_$][\w$]*)\s*(?::[^=]+)?=\s*(?:[^=>\s(]|\((?:[^)]*)\)\s*[^=\s])",
                false,
            ),
        ]),
        python: compile(&[
            (DefinitionKind::Function, r"^(\s*)(?:async\s+)?def\s+([A-Za-z_]\w*)", true),
            (DefinitionKind::Class, r"^\s*class\s+([A-Za-z_]\w*)", false),
            (DefinitionKind::Variable, r"^([A-Za-z_]\w*)\s*(?::[^=]+)?=[^=]", false),
        ]),
        rust: compile(&[
            (
                DefinitionKind::Function,
                r"^(\s*)(?:pub(?:\([^)]*\))?\s+)?(?:const\s+)?(?:async\s+)?(?:unsafe\s+)?(?:extern\s+\S+\s+)?fn\s+([A-Za-z_]\w*)",
                true,
            ),
            (
                DefinitionKind::Class,
                r"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:struct|enum|trait|union|type)\s+([A-Za-z_]\w*)",
                false,
            ),
            (
                DefinitionKind::Variable,
                r"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:const|static)\s+(?:mut\s+)?([A-Za-z_]\w*)\s*:",
                false,
            ),
        ]),
        go: compile(&[
            (DefinitionKind::Method, r"^\s*func\s+\([^)]*\)\s*([A-Za-z_]\w*)", false),
            (DefinitionKind::Function, r"^\s*func\s+([A-Za-z_]\w*)", false),
            (DefinitionKind::Class, r"^\s*type\s+([A-Za-z_]\w*)\s+(?:struct|interface)", false),
            (DefinitionKind::Variable, r"^\s*(?:var|const)\s+([A-Za-z_]\w*)", false),
        ]),
        ruby: compile(&[
            (DefinitionKind::Function, r"^(\s*)def\s+(?:self\.)?([A-Za-z_]\w*[?!]?)", true),
            (DefinitionKind::Class, r"^\s*(?:class|module)\s+([A-Z]\w*)", false),
        ]),
        clike: compile(&[
            (
                DefinitionKind::Class,
                r"^\s*(?:(?:public|private|protected|internal|abstract|final|static|sealed|data|open)\s+)*(?:class|interface|struct|enum|trait|object)\s+([A-Za-z_]\w*)",
                false,
            ),
            (
                DefinitionKind::Method,
                r"^\s*(?:(?:public|private|protected|internal|static|final|override|virtual|async|suspend|open)\s+)+(?:fun\s+)?[\w<>\[\],?]*\s*([A-Za-z_]\w*)\s*\(",
                false,
            ),
            (DefinitionKind::Function, r"^\s*fun\s+([A-Za-z_]\w*)\s*\(", false),
            (DefinitionKind::Function, r"^\s*function\s+([A-Za-z_]\w*)\s*\(", false),
        ]),
        todo: Regex::new(r"(?://|#|/\*|<!--|--|;)\s*(?:TODO|FIXME|HACK|XXX)\b:?\s*(.*)").ok(),
    })
}

fn family_patterns(family: Family) -> &'static [Pattern] {
    let p = patterns();
    match family {
        Family::JavaScript => &p.javascript,
        Family::Python => &p.python,
        Family::Rust => &p.rust,
        Family::Go => &p.go,
        Family::Ruby => &p.ruby,
        Family::CLike => &p.clike,
        Family::Other => &[],
    }
}

/// Extract definitions from `content`. Always includes one `file` entry.
pub fn extract_definitions(path: &str, content: &str) -> Vec<Definition> {
    let family = Family::from_path(path);
    let specs = family_patterns(family);
    let todo = patterns().todo.as_ref();

    let file_name = path.rsplit('/').next().unwrap_or(path);
    let mut definitions = vec![Definition::named(DefinitionKind::File, file_name, 0)];

    for (idx, line) in content.lines().enumerate() {
        let line_no = idx + 1;

        for pattern in specs {
            let Some(caps) = pattern.regex.captures(line) else {
                continue;
            };
            // Patterns with an indentation group capture the name second.
            let (indent, name) = if pattern.indented_is_method {
                (
                    caps.get(1).map(|m| m.as_str()).unwrap_or_default(),
                    caps.get(2).map(|m| m.as_str()),
                )
            } else {
                ("", caps.get(1).map(|m| m.as_str()))
            };
            let Some(name) = name else { continue };

            if family == Family::JavaScript
                && pattern.kind == DefinitionKind::Method
                && JS_KEYWORDS.contains(&name)
            {
                continue;
            }

            let kind = if pattern.indented_is_method && !indent.is_empty() {
                DefinitionKind::Method
            } else {
                pattern.kind
            };
            definitions.push(Definition::named(kind, name, line_no));
            // First matching pattern wins for a line.
            break;
        }

        if let Some(todo) = todo {
            if let Some(caps) = todo.captures(line) {
                let text = caps
                    .get(1)
                    .map(|m| m.as_str().trim().trim_end_matches("*/").trim_end_matches("-->"))
                    .unwrap_or_default()
                    .trim();
                definitions.push(Definition::todo(text, line_no));
            }
        }
    }

    definitions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(defs: &[Definition], kind: DefinitionKind) -> Vec<String> {
        defs.iter()
            .filter(|d| d.kind == kind)
            .map(|d| d.label().to_string())
            .collect()
    }

    #[test]
    fn test_javascript_forms() {
        let src = r#"
export function loadUser(id) {}
const fetchAll = async (ids) => {
  return ids;
};
const LIMIT = 10;
class UserStore {
  async save(user) {
    if (user) {
    }
  }
}
// TODO: cache results
"#;
        let defs = extract_definitions("src/users.js", src);
        assert_eq!(names(&defs, DefinitionKind::File), vec!["users.js"]);
        assert!(names(&defs, DefinitionKind::Function).contains(&"loadUser".to_string()));
        assert!(names(&defs, DefinitionKind::Function).contains(&"fetchAll".to_string()));
        assert_eq!(names(&defs, DefinitionKind::Class), vec!["UserStore"]);
        assert_eq!(names(&defs, DefinitionKind::Method), vec!["save"]);
        assert_eq!(names(&defs, DefinitionKind::Variable), vec!["LIMIT"]);
        assert_eq!(names(&defs, DefinitionKind::Todo), vec!["cache results"]);
    }

    #[test]
    fn test_python_methods_are_indented_defs() {
        let src = "class Cart:\n    def total(self):\n        return 0\n\ndef helper():\n    pass\nMAX = 3\n";
        let defs = extract_definitions("cart.py", src);
        assert_eq!(names(&defs, DefinitionKind::Class), vec!["Cart"]);
        assert_eq!(names(&defs, DefinitionKind::Method), vec!["total"]);
        assert_eq!(names(&defs, DefinitionKind::Function), vec!["helper"]);
        assert_eq!(names(&defs, DefinitionKind::Variable), vec!["MAX"]);
    }

    #[test]
    fn test_rust_items() {
        let src = "pub struct Index;\nimpl Index {\n    pub fn len(&self) -> usize { 0 }\n}\nconst MAX: usize = 3;\nasync fn run() {}\n";
        let defs = extract_definitions("src/lib.rs", src);
        assert_eq!(names(&defs, DefinitionKind::Class), vec!["Index"]);
        assert_eq!(names(&defs, DefinitionKind::Method), vec!["len"]);
        assert_eq!(names(&defs, DefinitionKind::Function), vec!["run"]);
        assert_eq!(names(&defs, DefinitionKind::Variable), vec!["MAX"]);
    }

    #[test]
    fn test_plain_text_only_has_file_entry() {
        let defs = extract_definitions("notes.txt", "function looks like code\n");
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].kind, DefinitionKind::File);
    }
}
