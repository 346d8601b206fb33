//! Step-block segmentation of multi-stage scripts.
//!
//! Legacy ETL scripts mark their stages either with `-- STEPnnn` /
//! `/* STEPnnn */` comments or with `STEPnnn BEGIN ... END` blocks, where the
//! `BEGIN ... END` pairs nest. Both modes split the script into ordered
//! [`StepBlock`]s that are analyzed independently.

use indexmap::IndexMap;
use regex::Regex;

use crate::extract::{LineageResult, TableExtractor};

/// A named, ordered substring of the original script. `start`/`end` are byte
/// offsets of `text` within the parent script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepBlock {
    pub name: String,
    pub text: String,
    pub start: usize,
    pub end: usize,
}

/// Canonical zero-padded step name: `5` and `005` both become `STEP005`.
fn step_name(digits: &str) -> String {
    let trimmed = digits.trim_start_matches('0');
    let number = if trimmed.is_empty() { "0" } else { trimmed };
    format!("STEP{number:0>3}")
}

/// Splits a script into [`StepBlock`]s by marker comments or nested
/// `BEGIN ... END` blocks.
pub struct StepSegmenter {
    marker: Regex,
    block_header: Regex,
    begin_end: Regex,
}

impl Default for StepSegmenter {
    fn default() -> Self {
        Self {
            marker: Regex::new(r"(?i)(?:/\*\s*STEP(\d+)\s*\*/|--[ \t]*STEP(\d+))")
                .expect("valid regex"),
            block_header: Regex::new(r"(?i)\bSTEP(\d+)\s*BEGIN\b").expect("valid regex"),
            begin_end: Regex::new(r"(?i)\b(?:BEGIN|END)\b").expect("valid regex"),
        }
    }
}

impl StepSegmenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Splits on `-- STEPnnn` / `/* STEPnnn */` markers. Each block runs from
    /// just after its marker to just before the next one (or end of script).
    /// Text before the first marker is discarded; a script with no markers at
    /// all becomes a single implicit `STEP000` block.
    pub fn split_by_markers(&self, sql: &str) -> Vec<StepBlock> {
        let marks: Vec<(String, usize, usize)> = self
            .marker
            .captures_iter(sql)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let digits = caps.get(1).or_else(|| caps.get(2))?;
                Some((step_name(digits.as_str()), whole.start(), whole.end()))
            })
            .collect();

        if marks.is_empty() {
            return vec![StepBlock {
                name: step_name("0"),
                text: sql.to_owned(),
                start: 0,
                end: sql.len(),
            }];
        }

        let mut blocks = Vec::new();
        for (i, (name, _, marker_end)) in marks.iter().enumerate() {
            let region_end = marks.get(i + 1).map_or(sql.len(), |next| next.1);
            if let Some(block) = trimmed_block(sql, name, *marker_end, region_end) {
                blocks.push(block);
            }
        }
        blocks
    }

    /// Matches `STEPnnn BEGIN ... END` blocks, counting nested `BEGIN`/`END`
    /// pairs so the block ends at the `END` that balances its own `BEGIN`. A
    /// header whose block never balances is discarded.
    pub fn split_by_blocks(&self, sql: &str) -> Vec<StepBlock> {
        let mut blocks = Vec::new();
        for caps in self.block_header.captures_iter(sql) {
            let (Some(whole), Some(digits)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let name = step_name(digits.as_str());
            match self.find_matching_end(sql, whole.end()) {
                Some(end_keyword_start) => {
                    if let Some(block) = trimmed_block(sql, &name, whole.end(), end_keyword_start) {
                        blocks.push(block);
                    }
                }
                None => {
                    log::warn!("discarding {name}: no matching END for its BEGIN");
                }
            }
        }
        blocks
    }

    /// Offset of the `END` keyword that returns the nesting level to zero, or
    /// `None` for unbalanced input.
    fn find_matching_end(&self, sql: &str, start: usize) -> Option<usize> {
        let mut level = 1u32;
        for m in self.begin_end.find_iter(&sql[start..]) {
            if m.as_str().eq_ignore_ascii_case("BEGIN") {
                level += 1;
            } else {
                level -= 1;
                if level == 0 {
                    return Some(start + m.start());
                }
            }
        }
        None
    }

    /// Marker-mode segmentation followed by per-step extraction. Blocks that
    /// share a step name have their lineage merged.
    pub fn extract_by_step(
        &self,
        extractor: &TableExtractor,
        sql: &str,
    ) -> IndexMap<String, LineageResult> {
        lineage_by_step(extractor, self.split_by_markers(sql))
    }

    /// `BEGIN ... END`-mode segmentation followed by per-step extraction.
    pub fn extract_by_block(
        &self,
        extractor: &TableExtractor,
        sql: &str,
    ) -> IndexMap<String, LineageResult> {
        lineage_by_step(extractor, self.split_by_blocks(sql))
    }
}

fn lineage_by_step(
    extractor: &TableExtractor,
    blocks: Vec<StepBlock>,
) -> IndexMap<String, LineageResult> {
    let mut steps: IndexMap<String, LineageResult> = IndexMap::new();
    for block in blocks {
        let lineage = extractor.extract(&block.text);
        let entry = steps.entry(block.name).or_default();
        entry.sources.extend(lineage.sources);
        entry.targets.extend(lineage.targets);
    }
    steps
}

/// Builds a block for `sql[start..end]` with surrounding whitespace trimmed
/// away from both the text and the recorded offsets; empty regions yield
/// `None`.
fn trimmed_block(sql: &str, name: &str, start: usize, end: usize) -> Option<StepBlock> {
    let region = &sql[start..end];
    let text = region.trim();
    if text.is_empty() {
        return None;
    }
    let lead = region.len() - region.trim_start().len();
    Some(StepBlock {
        name: name.to_owned(),
        text: text.to_owned(),
        start: start + lead,
        end: start + lead + text.len(),
    })
}
