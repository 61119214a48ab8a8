//! Syntax-light SQL analysis: tokenizing, danger classification and
//! reference extraction.
//!
//! Nothing here builds an AST. The [`lexer`] knows identifiers, quotes,
//! comments and punctuation; the classifier and extractor work on top of it
//! (or on the raw text, for the classifier) and are deliberately conservative.
//!
//! # Example
//!
//! ```
//! use schema_guard::sql::{DangerClassifier, ReferenceExtractor};
//!
//! let sql = "SELECT c.name FROM customers c";
//!
//! assert!(!DangerClassifier::default().classify(sql).blocked);
//! let extraction = ReferenceExtractor::default().extract(sql);
//! assert_eq!(extraction.alias_map["c"], "customers");
//! ```

mod danger;
pub mod lexer;
mod references;

pub use danger::{DEFAULT_DANGEROUS_KEYWORDS, DangerClassifier, DangerPolicy, DangerReport, KeywordVec};
pub use lexer::{normalize_identifier, split_statements};
pub use references::{
    AliasMap, DEFAULT_CLAUSE_KEYWORDS, Extraction, ExtractorConfig, Reference, ReferenceExtractor
};

/// Classify `sql` with the default keyword policy
pub fn classify(sql: &str) -> DangerReport {
    DangerClassifier::default().classify(sql)
}

/// Extract aliases and references with the default configuration
pub fn extract_references(sql: &str) -> Extraction {
    ReferenceExtractor::default().extract(sql)
}
