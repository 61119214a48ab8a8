//! Alias map and dotted reference recovery from raw SQL text.
//!
//! Two passes over the token stream:
//!
//! 1. **Alias pass** - `(FROM|JOIN) <table> [AS] <alias>` records
//!    `alias -> table`. Comma-separated `FROM` lists are followed. A bare word
//!    that is a clause keyword (`WHERE`, `ON`, `LEFT`, ...) is not an alias
//!    unless introduced by `AS`.
//! 2. **Reference pass** - every `<ident> . <ident>` pair, scanned left to
//!    right without overlap.
//!
//! The reference pass does not try to tell alias-qualified columns from
//! schema-qualified tables, function calls or JSON paths. Anything it reports
//! that does not resolve is flagged by the validator.

use std::collections::HashSet;

use compact_str::CompactString;
use indexmap::IndexMap;
use serde::Serialize;

use super::lexer::{Token, TokenKind, tokenize};

/// Normalized alias (or table name) to normalized base table name
pub type AliasMap = IndexMap<String, String>;

/// Words that end a table reference instead of naming its alias
pub const DEFAULT_CLAUSE_KEYWORDS: &[&str] = &[
    "WHERE",
    "ON",
    "USING",
    "JOIN",
    "INNER",
    "LEFT",
    "RIGHT",
    "FULL",
    "OUTER",
    "CROSS",
    "NATURAL",
    "GROUP",
    "ORDER",
    "HAVING",
    "LIMIT",
    "OFFSET",
    "UNION",
    "INTERSECT",
    "EXCEPT",
    "WINDOW",
    "FETCH",
    "FOR",
    "RETURNING",
    "SET",
    "VALUES",
    "SELECT",
    "WITH",
    "LATERAL",
    "AND",
    "OR",
    "NOT",
    "INTO",
    "QUALIFY",
    "TABLESAMPLE"
];

/// A `table-or-alias.column` occurrence, both parts normalized
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reference {
    pub table_or_alias: CompactString,
    pub column:         CompactString
}

impl Reference {
    pub fn new(table_or_alias: impl Into<CompactString>, column: impl Into<CompactString>) -> Self {
        Self {
            table_or_alias: table_or_alias.into(),
            column:         column.into()
        }
    }
}

/// Output of [`ReferenceExtractor::extract`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Extraction {
    pub alias_map:  AliasMap,
    pub references: Vec<Reference>
}

/// Extractor configuration
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    /// Upper-cased words never taken as an implicit alias
    pub clause_keywords: HashSet<String>
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            clause_keywords: DEFAULT_CLAUSE_KEYWORDS
                .iter()
                .map(|k| (*k).to_string())
                .collect()
        }
    }
}

/// Lexer-based alias and reference extractor
#[derive(Debug, Clone, Default)]
pub struct ReferenceExtractor {
    config: ExtractorConfig
}

impl ReferenceExtractor {
    pub fn new(config: ExtractorConfig) -> Self {
        Self {
            config
        }
    }

    /// Recover the alias map and dotted references of `sql`.
    ///
    /// ```
    /// use schema_guard::sql::{Reference, ReferenceExtractor};
    ///
    /// let extraction = ReferenceExtractor::default()
    ///     .extract("SELECT o.id FROM orders o JOIN customers c ON o.cust_id = c.id");
    ///
    /// assert_eq!(extraction.alias_map["o"], "orders");
    /// assert_eq!(extraction.alias_map["c"], "customers");
    /// assert_eq!(
    ///     extraction.references,
    ///     vec![
    ///         Reference::new("o", "id"),
    ///         Reference::new("o", "cust_id"),
    ///         Reference::new("c", "id"),
    ///     ]
    /// );
    /// ```
    pub fn extract(&self, sql: &str) -> Extraction {
        let tokens = tokenize(sql);
        Extraction {
            alias_map:  self.alias_map(&tokens),
            references: references(&tokens)
        }
    }

    fn alias_map(&self, tokens: &[Token<'_>]) -> AliasMap {
        let mut map = AliasMap::new();
        for (i, token) in tokens.iter().enumerate() {
            let is_from = token.is_keyword("FROM");
            if !is_from && !token.is_keyword("JOIN") {
                continue;
            }
            let mut pos = i + 1;
            while let Some((table, alias, next)) = self.table_ref(tokens, pos) {
                if let Some(alias) = alias {
                    // Later occurrences win.
                    map.insert(alias, table);
                }
                match tokens.get(next) {
                    Some(t) if is_from && t.kind == TokenKind::Comma => pos = next + 1,
                    _ => break
                }
            }
        }
        map
    }

    /// Parse `<table> [AS] [<alias>]` at `pos`, returning the index after it
    fn table_ref(
        &self,
        tokens: &[Token<'_>],
        pos: usize
    ) -> Option<(String, Option<String>, usize)> {
        let table = tokens.get(pos)?.identifier()?;
        let mut next = pos + 1;
        let explicit = tokens.get(next).is_some_and(|t| t.is_keyword("AS"));
        if explicit {
            next += 1;
        }
        let alias = tokens
            .get(next)
            .filter(|t| explicit || !self.is_clause_keyword(t))
            .and_then(Token::identifier);
        if alias.is_some() {
            next += 1;
        }
        Some((table, alias, next))
    }

    fn is_clause_keyword(&self, token: &Token<'_>) -> bool {
        token.kind == TokenKind::Word
            && self
                .config
                .clause_keywords
                .contains(&token.text.to_ascii_uppercase())
    }
}

fn references(tokens: &[Token<'_>]) -> Vec<Reference> {
    let mut refs = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        if let [first, dot, second, ..] = &tokens[i..]
            && dot.kind == TokenKind::Dot
            && let (Some(table), Some(column)) = (first.identifier(), second.identifier())
        {
            refs.push(Reference::new(table, column));
            i += 3;
        } else {
            i += 1;
        }
    }
    refs
}
