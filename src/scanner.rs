//! Comment- and string-aware scanning of raw SQL text.
//!
//! The extractor works on regex pattern matching, so before any pattern runs
//! the script is passed through the scanner, which blanks out line and block
//! comments while tracking string literals, so a `--` or `/*` inside a literal
//! never opens a comment. Blanked characters are replaced with spaces
//! (newlines are kept) so every remaining character sits at its original
//! offset.
//!
//! Two variants are exposed: [`neutralize_comments`] leaves string literals
//! byte-for-byte intact, while [`matchable_text`] additionally blanks the
//! interior of single-quoted literals so that keyword patterns cannot match
//! inside them. Double-quoted regions are always preserved because Oracle
//! uses double quotes for identifiers.

/// Lexical region the scan cursor is currently in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Region {
    Code,
    LineComment,
    BlockComment,
    SingleQuoteString,
    DoubleQuoteString,
}

pub struct Scanner {
    source_chars: Vec<char>,
    current: usize,
    region: Region,
    blank_string_literals: bool,
    out: String,
}

impl Scanner {
    pub fn new(source: &str) -> Self {
        Self {
            source_chars: source.chars().collect(),
            current: 0,
            region: Region::Code,
            blank_string_literals: false,
            out: String::with_capacity(source.len()),
        }
    }

    /// Also blank the interior of single-quoted string literals.
    pub fn blank_string_literals(mut self) -> Self {
        self.blank_string_literals = true;
        self
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.source_chars.len()
    }

    fn advance(&mut self) -> char {
        let c = self.source_chars[self.current];
        self.current += 1;
        c
    }

    fn peek(&self) -> char {
        if self.is_at_end() {
            '\0'
        } else {
            self.source_chars[self.current]
        }
    }

    fn peek_prev_i(&self, i: usize) -> Option<char> {
        let idx = self.current.checked_sub(i)?;
        self.source_chars.get(idx).copied()
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.peek() != expected {
            return false;
        }
        self.current += 1;
        true
    }

    /// The closing quote just consumed is escaped when preceded by a single
    /// (itself unescaped) backslash.
    fn quote_escaped(&self) -> bool {
        self.peek_prev_i(2).is_some_and(|prev| prev == '\\')
            && self.peek_prev_i(3).is_none_or(|prev_2| prev_2 != '\\')
    }

    fn push_blanked(&mut self, c: char) {
        if c == '\n' || c == '\r' {
            self.out.push(c);
        } else {
            self.out.push(' ');
        }
    }

    /// Runs the scan and returns the neutralized text.
    ///
    /// Unterminated comments and strings run to end-of-input; the scan never
    /// fails, for any input including the empty string.
    pub fn neutralize(mut self) -> String {
        while !self.is_at_end() {
            let c = self.advance();
            match self.region {
                Region::Code => {
                    if c == '\'' {
                        self.region = Region::SingleQuoteString;
                        self.out.push(c);
                    } else if c == '"' {
                        self.region = Region::DoubleQuoteString;
                        self.out.push(c);
                    } else if c == '-' && self.match_char('-') {
                        self.region = Region::LineComment;
                        self.out.push_str("  ");
                    } else if c == '/' && self.match_char('*') {
                        self.region = Region::BlockComment;
                        self.out.push_str("  ");
                    } else {
                        self.out.push(c);
                    }
                }
                Region::LineComment => {
                    if c == '\n' || c == '\r' {
                        self.region = Region::Code;
                        self.out.push(c);
                    } else {
                        self.out.push(' ');
                    }
                }
                Region::BlockComment => {
                    if c == '*' && self.match_char('/') {
                        self.region = Region::Code;
                        self.out.push_str("  ");
                    } else {
                        self.push_blanked(c);
                    }
                }
                Region::SingleQuoteString => {
                    if c == '\'' && !self.quote_escaped() {
                        self.region = Region::Code;
                        self.out.push(c);
                    } else if self.blank_string_literals {
                        self.push_blanked(c);
                    } else {
                        self.out.push(c);
                    }
                }
                Region::DoubleQuoteString => {
                    self.out.push(c);
                    if c == '"' && !self.quote_escaped() {
                        self.region = Region::Code;
                    }
                }
            }
        }
        self.out
    }
}

/// Blanks out `-- ...` and `/* ... */` comments in `sql`, leaving everything
/// else (string literals included) unchanged and at its original offset.
pub fn neutralize_comments(sql: &str) -> String {
    Scanner::new(sql).neutralize()
}

/// Text prepared for pattern matching: comments blanked and single-quoted
/// literal interiors blanked, so keyword patterns can match neither.
pub fn matchable_text(sql: &str) -> String {
    Scanner::new(sql).blank_string_literals().neutralize()
}

#[cfg(test)]
mod tests {
    use super::{matchable_text, neutralize_comments};

    #[test]
    fn blanks_line_and_block_comments() {
        let sql = "SELECT 1 -- trailing note\nFROM t /* inline */ WHERE x = 1";
        let out = neutralize_comments(sql);
        assert!(!out.contains("trailing"));
        assert!(!out.contains("inline"));
        assert!(out.contains("FROM t"));
        assert!(out.contains("WHERE x = 1"));
    }

    #[test]
    fn preserves_offsets_and_newlines() {
        let sql = "a /* x\ny */ b -- z\nc";
        let out = neutralize_comments(sql);
        assert_eq!(out.chars().count(), sql.chars().count());
        assert_eq!(out.matches('\n').count(), sql.matches('\n').count());
    }

    #[test]
    fn comment_tokens_inside_strings_are_kept() {
        let sql = "SELECT '-- not a comment', \"/* neither */\" FROM t";
        let out = neutralize_comments(sql);
        assert!(out.contains("'-- not a comment'"));
        assert!(out.contains("\"/* neither */\""));
    }

    #[test]
    fn escaped_quote_does_not_close_string() {
        let sql = r"SELECT 'it\'s -- fine' FROM t";
        let out = neutralize_comments(sql);
        assert!(out.contains(r"'it\'s -- fine'"));
    }

    #[test]
    fn unterminated_comment_and_string_run_to_end() {
        assert_eq!(neutralize_comments("a /* open"), "a        ");
        assert_eq!(neutralize_comments("a -- open"), "a        ");
        assert_eq!(neutralize_comments("a 'open"), "a 'open");
        assert_eq!(neutralize_comments(""), "");
    }

    #[test]
    fn matchable_text_blanks_single_quoted_interiors() {
        let sql = "SELECT 'FROM fake_tab' FROM real_tab";
        let out = matchable_text(sql);
        assert!(!out.contains("fake_tab"));
        assert!(out.contains("FROM real_tab"));
        assert_eq!(out.chars().count(), sql.chars().count());
    }

    #[test]
    fn matchable_text_keeps_double_quoted_identifiers() {
        let sql = "SELECT * FROM \"MY TABLE\"";
        assert!(matchable_text(sql).contains("\"MY TABLE\""));
    }
}
