//! Rendering of lineage results: per-file text reports, per-step reports,
//! CSV rows, and the source-table reverse index.

use std::{
    collections::{BTreeMap, BTreeSet},
    io::Write,
};

use indexmap::IndexMap;

use crate::{batch::FileAnalysis, extract::LineageResult};

/// Two-section human-readable report for one file.
pub fn render_file_report(label: &str, lineage: &LineageResult) -> String {
    let mut out = String::new();
    out.push_str(&format!("FILE: {}\n\n", label));

    if lineage.is_empty() {
        out.push_str("(no tables extracted)\n");
        return out;
    }
    if !lineage.sources.is_empty() {
        out.push_str("[Source Tables]\n");
        for (i, table) in lineage.sources.iter().enumerate() {
            out.push_str(&format!("  {}. {}\n", i + 1, table));
        }
        out.push('\n');
    }
    if !lineage.targets.is_empty() {
        out.push_str("[Target Tables]\n");
        for (i, table) in lineage.targets.iter().enumerate() {
            out.push_str(&format!("  {}. {}\n", i + 1, table));
        }
    }
    out
}

/// Sectioned report for a step-keyed lineage map.
pub fn render_step_report(steps: &IndexMap<String, LineageResult>) -> String {
    let rule = "=".repeat(60);
    let mut out = String::new();
    for (name, lineage) in steps {
        out.push_str(&format!("{}\n {}\n{}\n", rule, name, rule));

        out.push_str("\n[Source Tables]\n");
        if lineage.sources.is_empty() {
            out.push_str("(no source tables)\n");
        } else {
            for table in &lineage.sources {
                out.push_str(&format!("{}\n", table));
            }
        }

        out.push_str("\n[Target Tables]\n");
        if lineage.targets.is_empty() {
            out.push_str("(no target tables)\n");
        } else {
            for table in &lineage.targets {
                out.push_str(&format!("{}\n", table));
            }
        }
        out.push('\n');
    }
    out
}

/// One `file,role,table` row per extracted table.
pub fn write_lineage_csv<W: Write>(writer: W, files: &[FileAnalysis]) -> anyhow::Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(["file", "role", "table"])?;
    for file in files {
        let path = file.path.display().to_string();
        for table in &file.lineage.sources {
            csv_writer.write_record([path.as_str(), "source", table.as_str()])?;
        }
        for table in &file.lineage.targets {
            csv_writer.write_record([path.as_str(), "target", table.as_str()])?;
        }
    }
    csv_writer.flush()?;
    Ok(())
}

/// Reverse index: for each source table, which programs read it and which
/// target tables those programs feed. Rows are sorted by source table, then
/// program; target lists are `; `-joined.
pub fn write_reverse_index<W: Write>(writer: W, files: &[FileAnalysis]) -> anyhow::Result<()> {
    let mut mappings: BTreeMap<&str, BTreeMap<String, BTreeSet<&str>>> = BTreeMap::new();
    for file in files {
        let program = file.path.display().to_string();
        for source in &file.lineage.sources {
            mappings
                .entry(source.as_str())
                .or_default()
                .entry(program.clone())
                .or_default()
                .extend(file.lineage.targets.iter().map(String::as_str));
        }
    }

    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(["source_table", "program", "target_tables"])?;
    for (source, programs) in &mappings {
        for (program, targets) in programs {
            let target_list = targets.iter().copied().collect::<Vec<_>>().join("; ");
            csv_writer.write_record([*source, program.as_str(), target_list.as_str()])?;
        }
    }
    csv_writer.flush()?;
    Ok(())
}
