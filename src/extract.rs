//! Keyword-anchored extraction of source and target table references.
//!
//! The extractor is a fixed table of [`PatternKind`] rows, each carrying its
//! regex and its source/target role. Adding a new DML verb means adding a row,
//! not a method. Matches are post-processed by the identifier normalizer, the
//! keyword filter, and (for sources) the CTE name set.
//!
//! Two strategies run behind the same contract: a direct regex pass for
//! ordinary inputs, and a manual keyword-anchored windowed scan for very large
//! inputs, where running full-text regexes is not worth the risk. Callers see
//! neither.

use std::collections::HashSet;

use indexmap::IndexSet;
use regex::Regex;
use serde::Serialize;
use strum::IntoEnumIterator;
use strum_macros::EnumIter;

use crate::{
    ident::{KeywordFilter, normalize},
    scanner::matchable_text,
};

/// CTE declarations sit near the top of a statement; only this much of the
/// text is scanned for them.
const CTE_SCAN_CAP: usize = 100_000;

/// Inputs larger than this skip the full-text regex pass in favor of the
/// manual keyword-anchored scan.
const REGEX_INPUT_CAP: usize = 500_000;

/// Window handed to the anchored identifier regex during a manual scan.
const IDENT_WINDOW: usize = 1024;

/// One identifier segment: backtick/double-quote/bracket quoted, or bare
/// (Unicode letters, digits, `_`, `$`).
const IDENT_PART: &str = r#"(?:`[^`]+`|"[^"]+"|\[[^\]]+\]|[\p{L}\p{N}_$]+)"#;

/// Capture group for a possibly schema-qualified table identifier.
fn table_id() -> String {
    format!(r"({IDENT_PART}(?:\.{IDENT_PART})*)")
}

/// Truncates `text` to at most `cap` bytes without splitting a character.
fn char_floor(text: &str, cap: usize) -> &str {
    if text.len() <= cap {
        return text;
    }
    let mut end = cap;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Whether a pattern contributes tables that are written or read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Target,
    Source,
}

/// The fixed set of keyword-anchored extraction categories.
///
/// Longer keyword phrases (`MERGE INTO`, `DELETE FROM`) are distinct rows
/// rather than fallthrough cases of shorter ones, so precedence never depends
/// on match order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter)]
pub enum PatternKind {
    MergeInto,
    InsertInto,
    DeleteFrom,
    /// Oracle-style `DELETE <table> WHERE ...` without `FROM`.
    DeleteWhere,
    /// `UPDATE <table>`, counted only when a `SET` follows later.
    Update,
    From,
    LeftJoin,
    InnerJoin,
    RightJoin,
    Join,
    /// `MERGE ... USING <table>` source clause.
    Using,
    /// Oracle comma-join lists inside a `FROM` clause span.
    CommaJoin,
}

impl PatternKind {
    pub fn role(self) -> Role {
        match self {
            Self::MergeInto
            | Self::InsertInto
            | Self::DeleteFrom
            | Self::DeleteWhere
            | Self::Update => Role::Target,
            Self::From
            | Self::LeftJoin
            | Self::InnerJoin
            | Self::RightJoin
            | Self::Join
            | Self::Using
            | Self::CommaJoin => Role::Source,
        }
    }

    /// Regex source for this category; `None` for [`PatternKind::CommaJoin`],
    /// which needs clause decomposition instead of a single match.
    fn pattern(self) -> Option<String> {
        let t = table_id();
        let pattern = match self {
            Self::MergeInto => format!(r"(?i)\bMERGE\s+INTO\s+{t}"),
            Self::InsertInto => format!(r"(?i)\bINSERT\s+INTO\s+{t}"),
            Self::DeleteFrom => format!(r"(?i)\bDELETE\s+FROM\s+{t}"),
            Self::DeleteWhere => format!(r"(?i)\bDELETE\s+{t}\s+WHERE\b"),
            Self::Update => format!(r"(?i)\bUPDATE\s+{t}"),
            Self::From => format!(r"(?i)\bFROM\s+{t}"),
            Self::LeftJoin => format!(r"(?i)\bLEFT\s+(?:OUTER\s+)?JOIN\s+{t}"),
            Self::InnerJoin => format!(r"(?i)\bINNER\s+JOIN\s+{t}"),
            Self::RightJoin => format!(r"(?i)\bRIGHT\s+(?:OUTER\s+)?JOIN\s+{t}"),
            Self::Join => format!(r"(?i)\bJOIN\s+{t}"),
            Self::Using => format!(r"(?i)\bUSING\s+{t}"),
            Self::CommaJoin => return None,
        };
        Some(pattern)
    }

    /// Keyword phrase anchoring this category in the manual scan. The
    /// qualified join rows fold into the plain `JOIN` anchor there.
    fn phrase(self) -> Option<&'static [&'static str]> {
        match self {
            Self::MergeInto => Some(&["MERGE", "INTO"]),
            Self::InsertInto => Some(&["INSERT", "INTO"]),
            Self::DeleteFrom => Some(&["DELETE", "FROM"]),
            Self::Update => Some(&["UPDATE"]),
            Self::From => Some(&["FROM"]),
            Self::Join => Some(&["JOIN"]),
            Self::Using => Some(&["USING"]),
            Self::DeleteWhere
            | Self::LeftJoin
            | Self::InnerJoin
            | Self::RightJoin
            | Self::CommaJoin => None,
        }
    }
}

/// The lineage recovered from one script or step block.
///
/// Both sets keep insertion order for deterministic output. A table may
/// legitimately appear in both (read-then-write in the same statement group).
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct LineageResult {
    pub sources: IndexSet<String>,
    pub targets: IndexSet<String>,
}

impl LineageResult {
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty() && self.targets.is_empty()
    }
}

/// Collects the names declared by `WITH name AS (` and `, name AS (` so the
/// extractor can drop them from source tables.
struct CteResolver {
    head: Regex,
    continuation: Regex,
}

impl CteResolver {
    fn new() -> Self {
        let t = table_id();
        Self {
            head: Regex::new(&format!(r"(?i)\bWITH\s+{t}\s+AS\s*\(")).expect("valid regex"),
            continuation: Regex::new(&format!(r"(?i),\s*{t}\s+AS\s*\(")).expect("valid regex"),
        }
    }

    /// Scans a bounded prefix of `sql` (CTEs declared past [`CTE_SCAN_CAP`]
    /// are missed, a documented trade-off for pathological scripts).
    fn resolve(&self, sql: &str) -> HashSet<String> {
        let prefix = char_floor(sql, CTE_SCAN_CAP);
        let mut names = HashSet::new();
        for re in [&self.head, &self.continuation] {
            for caps in re.captures_iter(prefix) {
                if let Some(m) = caps.get(1) {
                    let name = normalize(m.as_str());
                    if !name.is_empty() {
                        names.insert(name);
                    }
                }
            }
        }
        names
    }
}

/// A bare word token of the neutralized text, used by the manual scan.
struct Word {
    upper: String,
    start: usize,
    end: usize,
}

fn split_words(text: &str) -> Vec<Word> {
    let mut words = Vec::new();
    let mut start = None;
    for (i, c) in text.char_indices() {
        let is_word = c.is_alphanumeric() || c == '_' || c == '$';
        match (is_word, start) {
            (true, None) => start = Some(i),
            (false, Some(s)) => {
                words.push(Word {
                    upper: text[s..i].to_uppercase(),
                    start: s,
                    end: i,
                });
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        words.push(Word {
            upper: text[s..].to_uppercase(),
            start: s,
            end: text.len(),
        });
    }
    words
}

/// `words[i..]` spell out `phrase` with only whitespace between the words.
fn phrase_at(text: &str, words: &[Word], i: usize, phrase: &[&str]) -> bool {
    if i + phrase.len() > words.len() {
        return false;
    }
    for (k, part) in phrase.iter().enumerate() {
        if words[i + k].upper != *part {
            return false;
        }
        if k > 0
            && !text[words[i + k - 1].end..words[i + k].start]
                .chars()
                .all(char::is_whitespace)
        {
            return false;
        }
    }
    true
}

/// Extracts source and target table references from SQL text.
///
/// All configuration (keyword filter, compiled pattern table) is fixed at
/// construction; extraction itself is a pure function of the input text, so a
/// single extractor can be shared across threads.
pub struct TableExtractor {
    filter: KeywordFilter,
    cte: CteResolver,
    rules: Vec<(PatternKind, Option<Regex>)>,
    from_clause: Regex,
    first_table: Regex,
    subquery_marker: Regex,
    join_word: Regex,
    set_word: Regex,
    where_follows: Regex,
}

impl Default for TableExtractor {
    fn default() -> Self {
        Self::with_filter(KeywordFilter::default())
    }
}

impl TableExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter(filter: KeywordFilter) -> Self {
        let rules = PatternKind::iter()
            .map(|kind| {
                let re = kind
                    .pattern()
                    .map(|p| Regex::new(&p).expect("valid regex"));
                (kind, re)
            })
            .collect();
        let from_clause = Regex::new(
            r"(?is)\bFROM\s+(.*?)(?:\s+(?:WHERE|GROUP\s+BY|ORDER\s+BY|HAVING|UNION|LIMIT)\b|;|$)",
        )
        .expect("valid regex");
        Self {
            filter,
            cte: CteResolver::new(),
            rules,
            from_clause,
            first_table: Regex::new(&format!(r"^\s*{}", table_id())).expect("valid regex"),
            subquery_marker: Regex::new(r"(?i)\b(?:SELECT|WITH)\b").expect("valid regex"),
            join_word: Regex::new(r"(?i)\bJOIN\b").expect("valid regex"),
            set_word: Regex::new(r"(?i)\bSET\b").expect("valid regex"),
            where_follows: Regex::new(r"(?i)^\s*WHERE\b").expect("valid regex"),
        }
    }

    /// Analyzes one script (or one step block) and returns its lineage.
    ///
    /// Never fails: malformed, partial, or degenerate input yields a partial
    /// or empty result instead of an error.
    pub fn extract(&self, sql: &str) -> LineageResult {
        let text = matchable_text(sql);
        let cte_names = self.cte.resolve(&text);

        let oversized = text.len() > REGEX_INPUT_CAP;
        let words = if oversized {
            log::debug!(
                "input of {} bytes exceeds regex cap, using manual keyword scan",
                text.len()
            );
            split_words(&text)
        } else {
            Vec::new()
        };

        let mut result = LineageResult::default();
        for (kind, re) in &self.rules {
            let candidates = if oversized {
                self.manual_candidates(*kind, &text, &words)
            } else {
                match re {
                    Some(re) => self.regex_candidates(*kind, re, &text),
                    None => self.comma_join_candidates(&text),
                }
            };
            for raw in candidates {
                let name = normalize(&raw);
                if !self.filter.is_table(&name) {
                    continue;
                }
                match kind.role() {
                    // A target is always a physical table, CTE names or not.
                    Role::Target => {
                        result.targets.insert(name);
                    }
                    Role::Source => {
                        if !cte_names.contains(&name) {
                            result.sources.insert(name);
                        }
                    }
                }
            }
        }
        result
    }

    fn regex_candidates(&self, kind: PatternKind, re: &Regex, text: &str) -> Vec<String> {
        re.captures_iter(text)
            .filter(|caps| {
                kind != PatternKind::Update
                    || self
                        .set_word
                        .is_match(&text[caps.get(0).map_or(0, |m| m.end())..])
            })
            .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_owned()))
            .collect()
    }

    fn comma_join_candidates(&self, text: &str) -> Vec<String> {
        let mut out = Vec::new();
        for caps in self.from_clause.captures_iter(text) {
            if let Some(clause) = caps.get(1) {
                self.decompose_from_clause(clause.as_str(), &mut out);
            }
        }
        out
    }

    /// Splits a `FROM` clause span on commas and takes the first
    /// identifier-shaped token of each segment. Clauses containing a nested
    /// `SELECT`/`WITH` are left alone; an inline subquery is not a flat table
    /// list.
    fn decompose_from_clause(&self, clause: &str, out: &mut Vec<String>) {
        if self.subquery_marker.is_match(clause) {
            return;
        }
        let clause = match self.join_word.find(clause) {
            Some(m) if m.start() > 0 => &clause[..m.start()],
            _ => clause,
        };
        for part in clause.split(',') {
            if let Some(m) = self.first_table.captures(part).and_then(|c| c.get(1)) {
                out.push(m.as_str().to_owned());
            }
        }
    }

    /// The first identifier after byte offset `pos`, with its end offset.
    fn ident_after(&self, text: &str, pos: usize) -> Option<(String, usize)> {
        let window = char_floor(&text[pos..], IDENT_WINDOW);
        let m = self.first_table.captures(window)?.get(1)?;
        Some((m.as_str().to_owned(), pos + m.end()))
    }

    fn manual_candidates(&self, kind: PatternKind, text: &str, words: &[Word]) -> Vec<String> {
        let mut out = Vec::new();
        match kind {
            PatternKind::CommaJoin => self.manual_comma_join(text, words, &mut out),
            PatternKind::DeleteWhere => self.manual_delete_where(text, words, &mut out),
            _ => {
                let Some(phrase) = kind.phrase() else {
                    return out;
                };
                for i in 0..words.len() {
                    if !phrase_at(text, words, i, phrase) {
                        continue;
                    }
                    if kind == PatternKind::Update
                        && !words[i + 1..].iter().any(|w| w.upper == "SET")
                    {
                        continue;
                    }
                    if let Some((raw, _)) = self.ident_after(text, words[i + phrase.len() - 1].end)
                    {
                        out.push(raw);
                    }
                }
            }
        }
        out
    }

    fn manual_delete_where(&self, text: &str, words: &[Word], out: &mut Vec<String>) {
        for i in 0..words.len() {
            if words[i].upper != "DELETE" {
                continue;
            }
            if words.get(i + 1).is_some_and(|w| w.upper == "FROM") {
                continue;
            }
            let Some((raw, end)) = self.ident_after(text, words[i].end) else {
                continue;
            };
            if self.where_follows.is_match(&text[end..]) {
                out.push(raw);
            }
        }
    }

    fn manual_comma_join(&self, text: &str, words: &[Word], out: &mut Vec<String>) {
        const CLAUSE_BOUNDARY: [&str; 6] = ["WHERE", "GROUP", "ORDER", "HAVING", "UNION", "LIMIT"];
        for i in 0..words.len() {
            if words[i].upper != "FROM" {
                continue;
            }
            let start = words[i].end;
            let mut end = text.len();
            for word in &words[i + 1..] {
                if CLAUSE_BOUNDARY.contains(&word.upper.as_str()) {
                    end = word.start;
                    break;
                }
            }
            if let Some(semi) = text[start..end].find(';') {
                end = start + semi;
            }
            self.decompose_from_clause(&text[start..end], out);
        }
    }
}
