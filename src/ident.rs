//! Table identifier normalization and keyword filtering.
//!
//! A raw pattern match ("DW.TABLE N1", "`테이블`,", "(A)") is turned into a
//! canonical identifier string by [`normalize`], then judged by
//! [`KeywordFilter::is_table`] before it may enter a lineage result.

use std::collections::HashSet;

/// SQL reserved words that must never be reported as table names, even when a
/// keyword-anchored pattern happens to capture them.
const RESERVED_KEYWORDS: &[&str] = &[
    "SELECT", "FROM", "WHERE", "INSERT", "UPDATE", "DELETE", "JOIN", "LEFT", "RIGHT", "INNER",
    "OUTER", "ON", "AND", "OR", "NOT", "IN", "EXISTS", "BETWEEN", "LIKE", "ORDER", "GROUP", "BY",
    "HAVING", "LIMIT", "OFFSET", "UNION", "ALL", "DISTINCT", "AS", "INTO", "VALUES", "SET",
    "CASCADE", "RESTRICT", "PUBLIC", "PRIVATE", "GRANT", "REVOKE", "COMMIT", "ROLLBACK",
    "SAVEPOINT", "TRANSACTION", "BEGIN", "END", "IF", "THEN", "ELSE", "CASE", "WHEN", "NULL",
    "TRUE", "FALSE", "USING", "STDIN", "STDOUT", "STDERR", "DUAL", "SYSDATE", "CURRENT_DATE",
    "CURRENT_TIME",
];

/// Names accepted as tables even though they would otherwise be filtered
/// (Oracle dictionary views commonly read by the scanned ETL scripts).
const SOURCE_WHITELIST: &[&str] = &["DBA_TABLE", "DBA_TAB_COLUMNS", "USER_TAB_COLUMNS"];

fn is_trailing_separator(c: char) -> bool {
    matches!(c, ',' | ';' | ')' | '\r' | '\n')
}

fn quote_pair(first: char, last: char) -> bool {
    matches!((first, last), ('`', '`') | ('"', '"') | ('[', ']'))
}

/// Strips one layer of surrounding quotes, but only when the opening quote is
/// closed by the final character ("`a`.`b`" keeps its per-segment quoting).
fn strip_outer_quotes(name: &str) -> &str {
    let mut chars = name.chars();
    let (Some(first), Some(last)) = (chars.next(), chars.next_back()) else {
        return name;
    };
    if !quote_pair(first, last) {
        return name;
    }
    let interior = &name[first.len_utf8()..name.len() - last.len_utf8()];
    if interior.is_empty() || interior.contains(first) {
        return name;
    }
    interior
}

/// Canonicalizes a raw matched substring into a comparable table identifier.
///
/// Trims whitespace, drops a trailing alias (everything after the first
/// whitespace), strips trailing separators and wrapping parentheses, removes
/// one outer layer of quoting, and uppercases the result. Uppercasing is a
/// no-op for non-Latin scripts, so quoted Unicode names survive intact.
///
/// The cleanup steps are repeated to a fixpoint, which makes normalization
/// idempotent: `normalize(normalize(x)) == normalize(x)`.
pub fn normalize(raw: &str) -> String {
    let mut name = raw.trim().to_owned();
    loop {
        let before = name.clone();

        name = name
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_owned();
        while name.starts_with('(') {
            name.remove(0);
        }
        while name.ends_with(is_trailing_separator) {
            name.pop();
        }
        name = strip_outer_quotes(name.trim()).to_owned();

        if name == before {
            break;
        }
    }
    name.to_uppercase()
}

/// Decides whether a normalized identifier denotes a real table.
///
/// The reserved-word and whitelist sets are fixed at construction and never
/// mutated afterwards, so a single filter can be shared across parallel
/// analyses.
#[derive(Debug, Clone)]
pub struct KeywordFilter {
    keywords: HashSet<String>,
    whitelist: HashSet<String>,
}

impl Default for KeywordFilter {
    fn default() -> Self {
        Self::new(
            RESERVED_KEYWORDS.iter().map(|kw| (*kw).to_owned()),
            SOURCE_WHITELIST.iter().map(|kw| (*kw).to_owned()),
        )
    }
}

impl KeywordFilter {
    /// Builds a filter from explicit reserved-word and whitelist sets. Both
    /// are compared case-insensitively; whitelist entries win over keywords.
    pub fn new(
        keywords: impl IntoIterator<Item = String>,
        whitelist: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            keywords: keywords.into_iter().map(|kw| kw.to_uppercase()).collect(),
            whitelist: whitelist.into_iter().map(|kw| kw.to_uppercase()).collect(),
        }
    }

    /// Returns true when `normalized` should be treated as a table reference:
    /// longer than one character once quoting is removed, not a reserved word,
    /// or explicitly whitelisted.
    pub fn is_table(&self, normalized: &str) -> bool {
        let bare: String = normalized
            .chars()
            .filter(|c| !matches!(c, '`' | '"' | '[' | ']'))
            .collect();
        if bare.chars().count() <= 1 {
            return false;
        }
        let upper = bare.to_uppercase();
        if self.whitelist.contains(&upper) {
            return true;
        }
        !self.keywords.contains(&upper)
    }
}
