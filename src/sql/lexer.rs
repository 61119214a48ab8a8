//! Finite SQL token scanner.
//!
//! Recognizes just enough of SQL's lexical structure to find identifiers,
//! dots and statement separators without confusing them with the contents of
//! string literals or comments. It never fails: unterminated quotes and
//! comments run to the end of input.

use std::ops::Range;

/// Kind of a scanned token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Bare word: `[A-Za-z_][A-Za-z0-9_$]*`
    Word,
    /// Double-quoted identifier, quotes included in the token text
    QuotedIdent,
    /// Single-quoted or dollar-quoted string literal
    StringLit,
    Number,
    Dot,
    Comma,
    Semicolon,
    LParen,
    RParen,
    /// Any other single character (operators, `*`, `$1` parts, ...)
    Other
}

/// A token with its source text and byte span
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    pub span: Range<usize>
}

impl Token<'_> {
    /// Whether this token can name a table, alias or column
    pub fn is_identifier(&self) -> bool {
        matches!(self.kind, TokenKind::Word | TokenKind::QuotedIdent)
    }

    /// Normalized identifier value, if this token is an identifier
    pub fn identifier(&self) -> Option<String> {
        self.is_identifier()
            .then(|| normalize_identifier(self.text))
    }

    /// Case-insensitive match of a bare word against a keyword
    pub fn is_keyword(&self, keyword: &str) -> bool {
        self.kind == TokenKind::Word && self.text.eq_ignore_ascii_case(keyword)
    }
}

/// Strip one pair of surrounding double quotes, unescape `""` and lower-case.
///
/// ```
/// use schema_guard::sql::normalize_identifier;
///
/// assert_eq!(normalize_identifier("\"Order\"\"Items\""), "order\"items");
/// assert_eq!(normalize_identifier("Customers"), "customers");
/// ```
pub fn normalize_identifier(raw: &str) -> String {
    let trimmed = raw.trim();
    let unquoted = match trimmed
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
    {
        Some(inner) => inner.replace("\"\"", "\""),
        None => trimmed.to_string()
    };
    unquoted.to_lowercase()
}

/// Scanner over SQL text
pub struct Lexer<'a> {
    input: &'a str,
    pos:   usize
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0
        }
    }

    /// Scan the whole input
    pub fn tokenize(mut self) -> Vec<Token<'a>> {
        let mut tokens = Vec::new();
        while let Some(token) = self.next_token() {
            tokens.push(token);
        }
        tokens
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_next(&self) -> Option<char> {
        let mut chars = self.input[self.pos..].chars();
        chars.next();
        chars.next()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn advance_while(&mut self, pred: impl Fn(char) -> bool) {
        while self.peek().is_some_and(&pred) {
            self.advance();
        }
    }

    fn skip_trivia(&mut self) {
        loop {
            self.advance_while(char::is_whitespace);
            match (self.peek(), self.peek_next()) {
                (Some('-'), Some('-')) => self.advance_while(|c| c != '\n'),
                (Some('/'), Some('*')) => {
                    self.pos += 2;
                    match self.input[self.pos..].find("*/") {
                        Some(end) => self.pos += end + 2,
                        None => self.pos = self.input.len()
                    }
                }
                _ => return
            }
        }
    }

    fn next_token(&mut self) -> Option<Token<'a>> {
        self.skip_trivia();
        let start = self.pos;
        let c = self.advance()?;
        let kind = match c {
            c if is_ident_start(c) => {
                self.advance_while(is_ident_continue);
                TokenKind::Word
            }
            '"' => {
                self.scan_quoted('"');
                TokenKind::QuotedIdent
            }
            '\'' => {
                self.scan_quoted('\'');
                TokenKind::StringLit
            }
            '$' if self.scan_dollar_quoted(start) => TokenKind::StringLit,
            c if c.is_ascii_digit() => {
                self.scan_number();
                TokenKind::Number
            }
            '.' => TokenKind::Dot,
            ',' => TokenKind::Comma,
            ';' => TokenKind::Semicolon,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            _ => TokenKind::Other
        };
        Some(Token {
            kind,
            text: &self.input[start..self.pos],
            span: start..self.pos
        })
    }

    /// Consume up to and including the closing quote; a doubled quote escapes.
    fn scan_quoted(&mut self, quote: char) {
        while let Some(c) = self.advance() {
            if c == quote {
                if self.peek() == Some(quote) {
                    self.advance();
                } else {
                    return;
                }
            }
        }
    }

    /// Postgres `$tag$ ... $tag$`; on no match the position is left untouched.
    fn scan_dollar_quoted(&mut self, start: usize) -> bool {
        let rest = &self.input[self.pos..];
        let tag_len = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(rest.len());
        let tag_body = &rest[..tag_len];
        if !rest[tag_len..].starts_with('$')
            || tag_body.starts_with(|c: char| c.is_ascii_digit())
        {
            return false;
        }
        let delimiter = &self.input[start..self.pos + tag_len + 1];
        self.pos += tag_len + 1;
        match self.input[self.pos..].find(delimiter) {
            Some(end) => self.pos += end + delimiter.len(),
            None => self.pos = self.input.len()
        }
        true
    }

    fn scan_number(&mut self) {
        self.advance_while(is_ident_continue);
        if self.peek() == Some('.') && self.peek_next().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
            self.advance_while(is_ident_continue);
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

/// Scan SQL text into tokens
pub fn tokenize(sql: &str) -> Vec<Token<'_>> {
    Lexer::new(sql).tokenize()
}

/// Split a script into statements on top-level `;`.
///
/// Separators inside literals, quoted identifiers and comments do not split.
/// Pieces are trimmed and empty ones dropped.
///
/// ```
/// use schema_guard::sql::split_statements;
///
/// let parts = split_statements("SELECT ';'; SELECT 2;;");
/// assert_eq!(parts, vec!["SELECT ';'", "SELECT 2"]);
/// ```
pub fn split_statements(sql: &str) -> Vec<&str> {
    let mut statements = Vec::new();
    let mut start = 0;
    for token in tokenize(sql) {
        if token.kind == TokenKind::Semicolon {
            statements.push(&sql[start..token.span.start]);
            start = token.span.end;
        }
    }
    statements.push(&sql[start..]);
    statements
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(sql: &str) -> Vec<TokenKind> {
        tokenize(sql).into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn dollar_param_is_not_a_string() {
        assert_eq!(
            kinds("$1"),
            vec![TokenKind::Other, TokenKind::Number]
        );
    }

    #[test]
    fn dollar_quoted_body_is_one_literal() {
        let tokens = tokenize("SELECT $fn$ a.b; $fn$ x");
        assert_eq!(tokens[1].kind, TokenKind::StringLit);
        assert_eq!(tokens[1].text, "$fn$ a.b; $fn$");
        assert_eq!(tokens[2].text, "x");
    }

    #[test]
    fn decimal_number_keeps_its_dot() {
        assert_eq!(kinds("1.5"), vec![TokenKind::Number]);
    }

    #[test]
    fn unterminated_block_comment_runs_to_end() {
        assert!(tokenize("/* never closed a.b").is_empty());
    }
}
