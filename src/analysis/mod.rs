//! Code intelligence: language detection, syntax validation, outlines,
//! symbols, data flow and quality metrics.

pub mod ast;
pub mod flow;
pub mod language;
pub mod quality;
pub mod symbols;
pub mod validator;

pub use ast::{parse_outline, AstOutline, OutlineOptions};
pub use flow::trace_data_flow;
pub use language::Language;
pub use quality::{analyze_quality, architecture_suggestions, complexity_of, QualityReport};
pub use symbols::{build_symbol_table, find_references};
pub use validator::{SyntaxValidator, ValidationReport};
