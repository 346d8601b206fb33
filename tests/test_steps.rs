use pretty_assertions::assert_eq;
use sqlineage::extract::TableExtractor;
use sqlineage::step::StepSegmenter;

const MARKED_SCRIPT: &str = "\
SELECT * FROM dw.preamble;
-- STEP001
INSERT INTO dw.t1 SELECT * FROM dw.s1;
/* STEP002 */
INSERT INTO dw.t2 SELECT * FROM dw.s2;
";

#[test]
fn splits_on_line_and_block_markers() {
    let segmenter = StepSegmenter::new();
    let blocks = segmenter.split_by_markers(MARKED_SCRIPT);

    let names: Vec<&str> = blocks.iter().map(|b| b.name.as_str()).collect();
    assert_eq!(names, vec!["STEP001", "STEP002"]);
    assert!(blocks[0].text.contains("dw.t1"));
    assert!(!blocks[0].text.contains("dw.t2"));
    assert!(blocks[1].text.contains("dw.t2"));
    // Text before the first marker belongs to no step.
    assert!(blocks.iter().all(|b| !b.text.contains("preamble")));
}

#[test]
fn block_offsets_index_into_the_parent_script() {
    let segmenter = StepSegmenter::new();
    for block in segmenter.split_by_markers(MARKED_SCRIPT) {
        assert_eq!(&MARKED_SCRIPT[block.start..block.end], block.text);
    }
}

#[test]
fn step_names_are_zero_padded() {
    let segmenter = StepSegmenter::new();
    let blocks = segmenter.split_by_markers("-- STEP5\nSELECT * FROM dw.x1;\n-- STEP0010\nSELECT * FROM dw.x2;");
    let names: Vec<&str> = blocks.iter().map(|b| b.name.as_str()).collect();
    assert_eq!(names, vec!["STEP005", "STEP010"]);
}

#[test]
fn script_without_markers_is_one_implicit_block() {
    let segmenter = StepSegmenter::new();
    let blocks = segmenter.split_by_markers("INSERT INTO dw.t SELECT * FROM dw.s");
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].name, "STEP000");
    assert!(blocks[0].text.contains("dw.t"));
}

#[test]
fn per_step_lineage_is_keyed_in_script_order() {
    let segmenter = StepSegmenter::new();
    let extractor = TableExtractor::new();
    let steps = segmenter.extract_by_step(&extractor, MARKED_SCRIPT);

    let names: Vec<&str> = steps.keys().map(String::as_str).collect();
    assert_eq!(names, vec!["STEP001", "STEP002"]);
    assert!(steps["STEP001"].targets.contains("DW.T1"));
    assert!(steps["STEP001"].sources.contains("DW.S1"));
    assert!(steps["STEP002"].targets.contains("DW.T2"));
    assert!(!steps["STEP002"].sources.contains("DW.S1"));
}

const NESTED_SCRIPT: &str = "\
STEP001 BEGIN
  INSERT INTO dw.outer_t SELECT * FROM dw.src1;
  BEGIN
    UPDATE dw.inner_t SET x = 1;
  END
  DELETE FROM dw.cleanup;
END
";

#[test]
fn nested_begin_end_matches_the_outer_end() {
    let segmenter = StepSegmenter::new();
    let blocks = segmenter.split_by_blocks(NESTED_SCRIPT);

    assert_eq!(blocks.len(), 1);
    let block = &blocks[0];
    assert_eq!(block.name, "STEP001");
    // The block must run past the inner END, up to the outer one.
    assert!(block.text.contains("dw.inner_t"));
    assert!(block.text.contains("dw.cleanup"));
    assert_eq!(&NESTED_SCRIPT[block.start..block.end], block.text);
}

#[test]
fn sibling_blocks_are_both_found() {
    let sql = "\
STEP001 BEGIN
  INSERT INTO dw.a_t SELECT * FROM dw.a_s;
END
STEP002 BEGIN
  INSERT INTO dw.b_t SELECT * FROM dw.b_s;
END
";
    let segmenter = StepSegmenter::new();
    let extractor = TableExtractor::new();
    let steps = segmenter.extract_by_block(&extractor, sql);

    let names: Vec<&str> = steps.keys().map(String::as_str).collect();
    assert_eq!(names, vec!["STEP001", "STEP002"]);
    assert!(steps["STEP001"].targets.contains("DW.A_T"));
    assert!(steps["STEP002"].sources.contains("DW.B_S"));
}

#[test]
fn unbalanced_block_is_discarded() {
    let sql = "STEP001 BEGIN\nINSERT INTO dw.t SELECT 1;\n";
    let segmenter = StepSegmenter::new();
    assert!(segmenter.split_by_blocks(sql).is_empty());
}

#[test]
fn segmentation_never_fails_on_degenerate_input() {
    let segmenter = StepSegmenter::new();
    for sql in ["", "-- STEP001", "STEP001 BEGIN", "END END END"] {
        let _ = segmenter.split_by_markers(sql);
        let _ = segmenter.split_by_blocks(sql);
    }
}
