use std::path::PathBuf;
use std::time::Instant;

use anyhow::anyhow;
use clap::Parser as ClapParser;
use clap::Subcommand;
use indexmap::IndexMap;
use sqlineage::batch::{self, SqlReader};
use sqlineage::extract::{LineageResult, TableExtractor};
use sqlineage::report;
use sqlineage::step::StepSegmenter;

#[derive(clap::Parser)]
#[command(name = "sqlineage")]
#[command(about = "Table-level lineage extractor for Oracle/BigQuery SQL scripts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract source/target tables from a SQL file or directory as JSON.
    Extract(ExtractCommand),
    /// Split one script into STEP blocks and report lineage per step.
    Steps(StepsCommand),
    /// Scan a directory tree and render text and CSV lineage reports.
    Scan(ScanCommand),
}

#[derive(clap::Args)]
struct ExtractCommand {
    /// Path to the SQL file or directory containing SQL files.
    #[arg(value_name = "SQL_[FILE|DIR]")]
    sql: PathBuf,
    /// Character encoding of the input files (e.g. utf-8, euc-kr).
    #[arg(short, long, default_value = "utf-8")]
    encoding: String,
    /// Pretty-print the output JSON.
    #[arg(long)]
    pretty: bool,
}

#[derive(clap::Args)]
struct StepsCommand {
    /// Path to the SQL file.
    sql: PathBuf,
    /// Character encoding of the input file.
    #[arg(short, long, default_value = "utf-8")]
    encoding: String,
    /// Match nested `STEPnnn BEGIN ... END` blocks instead of STEP markers.
    #[arg(long)]
    blocks: bool,
    /// Emit JSON instead of the text report.
    #[arg(long)]
    json: bool,
    /// Pretty-print the output JSON.
    #[arg(long)]
    pretty: bool,
}

#[derive(clap::Args)]
struct ScanCommand {
    /// Root directory to scan recursively for .sql files.
    dir: PathBuf,
    /// Character encoding of the input files.
    #[arg(short, long, default_value = "utf-8")]
    encoding: String,
    /// Write file,role,table rows to this CSV path.
    #[arg(long)]
    csv: Option<PathBuf>,
    /// Write a source-table reverse index to this CSV path.
    #[arg(long)]
    reverse_index: Option<PathBuf>,
}

fn to_json<T: serde::Serialize>(value: &T, pretty: bool) -> anyhow::Result<String> {
    Ok(if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    })
}

fn run_extract(cmd: &ExtractCommand, extractor: &TableExtractor) -> anyhow::Result<()> {
    let reader = SqlReader::for_label(&cmd.encoding)?;
    let out = if cmd.sql.is_dir() {
        let mut file_lineages: IndexMap<String, LineageResult> = IndexMap::new();
        for analysis in batch::analyze_dir(&cmd.sql, &reader, extractor) {
            file_lineages.insert(
                std::path::absolute(&analysis.path)?.display().to_string(),
                analysis.lineage,
            );
        }
        to_json(&file_lineages, cmd.pretty)?
    } else {
        let sql = reader.read(&cmd.sql)?;
        to_json(&extractor.extract(&sql), cmd.pretty)?
    };
    println!("{}", out);
    Ok(())
}

fn run_steps(cmd: &StepsCommand, extractor: &TableExtractor) -> anyhow::Result<()> {
    let reader = SqlReader::for_label(&cmd.encoding)?;
    if cmd.sql.is_dir() {
        return Err(anyhow!(
            "steps analyzes a single script, but {} is a directory",
            cmd.sql.display()
        ));
    }
    let sql = reader.read(&cmd.sql)?;
    let segmenter = StepSegmenter::new();
    let steps = if cmd.blocks {
        segmenter.extract_by_block(extractor, &sql)
    } else {
        segmenter.extract_by_step(extractor, &sql)
    };
    if cmd.json {
        println!("{}", to_json(&steps, cmd.pretty)?);
    } else {
        print!("{}", report::render_step_report(&steps));
    }
    Ok(())
}

fn run_scan(cmd: &ScanCommand, extractor: &TableExtractor) -> anyhow::Result<()> {
    if !cmd.dir.is_dir() {
        return Err(anyhow!("input directory not found: {}", cmd.dir.display()));
    }
    let reader = SqlReader::for_label(&cmd.encoding)?;
    let analyses = batch::analyze_dir(&cmd.dir, &reader, extractor);

    for analysis in &analyses {
        println!(
            "{}",
            report::render_file_report(&analysis.path.display().to_string(), &analysis.lineage)
        );
    }

    if let Some(csv_path) = &cmd.csv {
        let file = std::fs::File::create(csv_path)?;
        report::write_lineage_csv(file, &analyses)?;
        log::info!("wrote lineage CSV to {}", csv_path.display());
    }
    if let Some(index_path) = &cmd.reverse_index {
        let file = std::fs::File::create(index_path)?;
        report::write_reverse_index(file, &analyses)?;
        log::info!("wrote reverse index to {}", index_path.display());
    }

    println!("[done] scanned {} SQL files", analyses.len());
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let now = Instant::now();

    env_logger::init();
    let cli = Cli::parse();
    let extractor = TableExtractor::new();

    match &cli.command {
        Commands::Extract(cmd) => run_extract(cmd, &extractor)?,
        Commands::Steps(cmd) => run_steps(cmd, &extractor)?,
        Commands::Scan(cmd) => run_scan(cmd, &extractor)?,
    }

    let elapsed = now.elapsed();
    log::info!("Elapsed: {:.2?}", elapsed);

    Ok(())
}
