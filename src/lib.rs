//! # sqlineage
//!
//! A library for recovering table-level data lineage from legacy Oracle and
//! BigQuery ETL SQL scripts.
//!
//! # Features
//!
//! - Extract the tables a script reads (sources) and writes (targets) from raw
//!   SQL text, without a full parser or a live catalog.
//! - Comment- and string-aware scanning, so `--`/`/* */` inside literals never
//!   confuse extraction.
//! - Exclude CTE names declared with `WITH name AS (...)` from source tables.
//! - Handle schema-qualified, backtick/double-quote/bracket-quoted, and
//!   non-Latin identifiers, ANSI joins and Oracle comma-join lists.
//! - Split multi-stage scripts into `STEPnnn` blocks (marker comments or
//!   nested `BEGIN ... END`) and report lineage per step.
//! - Batch-analyze whole directory trees in parallel and render text, CSV,
//!   reverse-index and JSON reports.
//!
//! # Example
//!
//! ```rust
//! use sqlineage::extract::TableExtractor;
//!
//! let sql = r#"
//!     INSERT INTO BM.CO
//!     SELECT * FROM DW.CO_LIST N1, DW.OFFICE N2
//!     WHERE N1.ID = N2.ID;
//! "#;
//!
//! let extractor = TableExtractor::new();
//! let lineage = extractor.extract(sql);
//!
//! assert!(lineage.targets.contains("BM.CO"));
//! assert!(lineage.sources.contains("DW.CO_LIST"));
//! assert!(lineage.sources.contains("DW.OFFICE"));
//! ```
pub mod batch;
pub mod extract;
pub mod ident;
pub mod report;
pub mod scanner;
pub mod step;
