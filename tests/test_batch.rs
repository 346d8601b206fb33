use std::fs;

use pretty_assertions::assert_eq;
use sqlineage::batch::{self, SqlReader};
use sqlineage::extract::TableExtractor;
use sqlineage::report;

#[test]
fn analyzes_a_directory_tree() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let nested = dir.path().join("jobs");
    fs::create_dir(&nested).expect("create nested dir");

    fs::write(
        dir.path().join("load_co.sql"),
        "INSERT INTO bm.co SELECT * FROM dw.co_list, dw.office WHERE 1 = 1;",
    )
    .expect("write sql");
    fs::write(
        nested.join("purge.SQL"),
        "DELETE FROM dw.tmp_load",
    )
    .expect("write sql");
    fs::write(dir.path().join("notes.txt"), "not sql").expect("write txt");

    let reader = SqlReader::default();
    let extractor = TableExtractor::new();
    let analyses = batch::analyze_dir(dir.path(), &reader, &extractor);

    assert_eq!(analyses.len(), 2);
    let load = analyses
        .iter()
        .find(|a| a.path.ends_with("load_co.sql"))
        .expect("load_co analyzed");
    assert!(load.lineage.targets.contains("BM.CO"));
    assert!(load.lineage.sources.contains("DW.CO_LIST"));
    assert!(load.lineage.sources.contains("DW.OFFICE"));

    let purge = analyses
        .iter()
        .find(|a| a.path.ends_with("purge.SQL"))
        .expect("upper-case extension analyzed");
    assert!(purge.lineage.targets.contains("DW.TMP_LOAD"));
}

#[test]
fn unknown_encoding_label_is_an_error() {
    assert!(SqlReader::for_label("no-such-encoding").is_err());
    assert!(SqlReader::for_label("euc-kr").is_ok());
}

#[test]
fn lineage_csv_has_one_row_per_table() {
    let dir = tempfile::tempdir().expect("create temp dir");
    fs::write(
        dir.path().join("one.sql"),
        "INSERT INTO bm.tgt SELECT * FROM dw.src",
    )
    .expect("write sql");

    let analyses = batch::analyze_dir(dir.path(), &SqlReader::default(), &TableExtractor::new());

    let mut out = Vec::new();
    report::write_lineage_csv(&mut out, &analyses).expect("write csv");
    let csv = String::from_utf8(out).expect("utf-8 csv");

    assert!(csv.starts_with("file,role,table\n"));
    assert!(csv.contains(",source,DW.SRC\n"));
    assert!(csv.contains(",target,BM.TGT\n"));
}

#[test]
fn reverse_index_groups_programs_by_source_table() {
    let dir = tempfile::tempdir().expect("create temp dir");
    fs::write(
        dir.path().join("a.sql"),
        "INSERT INTO bm.out1 SELECT * FROM dw.shared",
    )
    .expect("write sql");
    fs::write(
        dir.path().join("b.sql"),
        "INSERT INTO bm.out2 SELECT * FROM dw.shared",
    )
    .expect("write sql");

    let analyses = batch::analyze_dir(dir.path(), &SqlReader::default(), &TableExtractor::new());

    let mut out = Vec::new();
    report::write_reverse_index(&mut out, &analyses).expect("write reverse index");
    let csv = String::from_utf8(out).expect("utf-8 csv");

    assert!(csv.starts_with("source_table,program,target_tables\n"));
    let shared_rows: Vec<&str> = csv
        .lines()
        .filter(|line| line.starts_with("DW.SHARED,"))
        .collect();
    assert_eq!(shared_rows.len(), 2);
    assert!(shared_rows[0].contains("a.sql"));
    assert!(shared_rows[0].ends_with("BM.OUT1"));
    assert!(shared_rows[1].contains("b.sql"));
    assert!(shared_rows[1].ends_with("BM.OUT2"));
}

#[test]
fn file_report_lists_sources_then_targets() {
    let extractor = TableExtractor::new();
    let lineage = extractor.extract("INSERT INTO bm.co SELECT * FROM dw.co_list");
    let text = report::render_file_report("jobs/load_co.sql", &lineage);

    assert!(text.starts_with("FILE: jobs/load_co.sql\n"));
    let sources_at = text.find("[Source Tables]").expect("sources section");
    let targets_at = text.find("[Target Tables]").expect("targets section");
    assert!(sources_at < targets_at);
    assert!(text.contains("  1. DW.CO_LIST\n"));
    assert!(text.contains("  1. BM.CO\n"));

    let empty = report::render_file_report("empty.sql", &extractor.extract(""));
    assert!(empty.contains("(no tables extracted)"));
}
