//! CSV Combiner CLI
//!
//! Command-line tool for merging, cleaning, previewing and exporting batches of CSV files.

use clap::{Args, Parser, Subcommand, ValueEnum};
use csvc_core::{
    discover_inputs, export_csv, post_process, process_batch_with_progress, read_table,
    AlignmentStrategy, BatchOptions, CombinedTable, Diagnostic, MergeJob, PostProcessConfig,
    PostProcessed, ReadMode, ReadOptions, Row, RunReport, SourceFile, SourceKind, Stage,
};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Rows shown by `preview` unless `--limit` says otherwise
const DEFAULT_PREVIEW_ROWS: usize = 100;

#[derive(Parser)]
#[command(name = "csvc")]
#[command(about = "Combine multiple CSV files into a single, clean dataset", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Compact, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Compact,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge CSV and ZIP files and export the combined table
    Merge {
        /// CSV files, ZIP files or directories containing them
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        #[command(flatten)]
        options: MergeArgs,

        /// Output file path (defaults to combined_dataset.csv or stacked_data.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Always write a header row
        #[arg(long, conflicts_with = "no_header")]
        header: bool,

        /// Never write a header row
        #[arg(long)]
        no_header: bool,

        /// Write a JSON run report to this path
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Show the first rows of the combined table
    Preview {
        /// CSV files, ZIP files or directories containing them
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        #[command(flatten)]
        options: MergeArgs,

        /// Maximum number of rows to display
        #[arg(short, long, default_value_t = DEFAULT_PREVIEW_ROWS)]
        limit: usize,
    },

    /// List the files (and archive members) that a merge would read
    Inspect {
        /// CSV files, ZIP files or directories containing them
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Read mode used to count rows and columns
        #[arg(long, default_value = "typed")]
        mode: ReadMode,
    },

    /// Run a merge described by a job file
    Run {
        /// Path to job file (JSON)
        #[arg(short, long)]
        job: PathBuf,

        /// Write a JSON run report to this path
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Create a job file template
    CreateJob {
        /// Output path for the job file
        #[arg(short, long)]
        output: PathBuf,

        /// Inputs to include
        #[arg(short, long)]
        input: Vec<PathBuf>,
    },
}

/// Read, alignment and cleaning options shared by `merge` and `preview`
#[derive(Args, Debug, Clone)]
struct MergeArgs {
    /// typed: first row is the header; raw: keep every cell as text, stack by position
    #[arg(long, default_value = "typed")]
    mode: ReadMode,

    /// Column alignment for typed mode (raw mode always stacks by position)
    #[arg(long, default_value = "union")]
    strategy: AlignmentStrategy,

    /// Raw mode: keep rows and columns that are entirely empty
    #[arg(long)]
    keep_empty: bool,

    /// Remove duplicate rows
    #[arg(long)]
    remove_duplicates: bool,

    /// Drop columns with more than this percentage of missing cells
    #[arg(long, default_value_t = 100.0, value_parser = parse_percent)]
    missing_threshold: f64,

    /// Sort by this column
    #[arg(long)]
    sort: Option<String>,

    /// Sort in descending order
    #[arg(long, requires = "sort")]
    descending: bool,
}

impl MergeArgs {
    fn into_job(self, inputs: Vec<PathBuf>) -> MergeJob {
        let mut job = MergeJob::new(inputs);
        job.options = BatchOptions {
            read: ReadOptions {
                mode: self.mode,
                clean_empty: !self.keep_empty,
            },
            strategy: self.strategy,
        };
        job.post_process = PostProcessConfig {
            remove_duplicates: self.remove_duplicates,
            missing_threshold_percent: self.missing_threshold,
            sort_column: self.sort,
            sort_ascending: !self.descending,
        };
        job
    }
}

fn parse_percent(s: &str) -> Result<f64, String> {
    let value: f64 = s.parse().map_err(|_| format!("'{}' is not a number", s))?;
    if (0.0..=100.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("{} is not between 0 and 100", value))
    }
}

fn main() {
    let cli = Cli::parse();
    init_logger(cli.verbose, cli.log_format);

    if let Err(e) = run(cli.command) {
        tracing::error!("{}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_logger(verbose: bool, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("csvc=debug,csvc_core=debug")
        } else {
            EnvFilter::new("csvc=info,csvc_core=info")
        }
    });

    let registry = tracing_subscriber::registry().with(filter);
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    match format {
        LogFormat::Compact => registry.with(layer.compact()).init(),
        LogFormat::Json => registry.with(layer.json()).init(),
    }
}

fn run(command: Commands) -> csvc_core::Result<()> {
    match command {
        Commands::Merge {
            inputs,
            options,
            output,
            header,
            no_header,
            report,
        } => {
            let mut job = options.into_job(inputs);
            job.output = output;
            if header || no_header {
                job.include_header = Some(header);
            }
            cmd_merge(&job, report.as_deref())
        }
        Commands::Preview {
            inputs,
            options,
            limit,
        } => cmd_preview(&options.into_job(inputs), limit),
        Commands::Inspect { inputs, mode } => cmd_inspect(&inputs, mode),
        Commands::Run { job, report } => {
            let job = MergeJob::load(&job)?;
            cmd_merge(&job, report.as_deref())
        }
        Commands::CreateJob { output, input } => cmd_create_job(&output, input),
    }
}

/// Load every input, noting unreadable paths instead of failing
fn load_sources(inputs: &[PathBuf], diagnostics: &mut Vec<Diagnostic>) -> Vec<SourceFile> {
    let (paths, unreachable) = discover_inputs(inputs);
    diagnostics.extend(unreachable);
    tracing::info!(files = paths.len(), "discovered inputs");

    let mut sources = Vec::with_capacity(paths.len());
    for path in &paths {
        match SourceFile::load(path) {
            Ok(source) => sources.push(source),
            Err(e) => {
                tracing::warn!("{}", e);
                diagnostics.push(Diagnostic::from_error(Stage::Discover, &e));
            }
        }
    }
    sources
}

/// Read, merge and post-process the inputs of a job
fn build(job: &MergeJob) -> csvc_core::Result<(CombinedTable, PostProcessed, RunReport)> {
    let mut diagnostics = Vec::new();
    let sources = load_sources(&job.inputs, &mut diagnostics);

    let mut report = RunReport::new(
        sources.iter().map(|s| s.name.clone()).collect(),
        &job.options,
    );

    let outcome = process_batch_with_progress(&sources, &job.options, |done, total, name| {
        tracing::info!("Processed {} of {} files ({})", done, total, name);
    });

    diagnostics.extend(outcome.diagnostics.iter().cloned());
    report.tables_read = outcome.tables_read.clone();
    print_diagnostics(&diagnostics);

    let combined = outcome.into_result()?;
    let processed = post_process(&combined, &job.post_process);
    print_diagnostics(&processed.diagnostics);

    diagnostics.extend(processed.diagnostics.iter().cloned());
    report.diagnostics = diagnostics;
    report.duplicates_removed = processed.duplicates_removed;
    report.dropped_columns = processed.dropped_columns.clone();
    report.record_table(&processed.table);

    Ok((combined, processed, report))
}

fn cmd_merge(job: &MergeJob, report_path: Option<&Path>) -> csvc_core::Result<()> {
    let (combined, processed, mut report) = build(job)?;

    if processed.duplicates_removed > 0 {
        println!("Removed {} duplicate rows.", processed.duplicates_removed);
    }
    if !processed.dropped_columns.is_empty() {
        println!("Dropped columns: {}", processed.dropped_columns.join(", "));
    }
    print_metrics(&processed.table);

    let output = job.output_path();
    let bytes = export_csv(&processed.table, job.include_header())?;
    fs::write(&output, bytes)?;
    report.output = Some(output.clone());

    println!(
        "Merged {} rows from {} files into {}",
        processed.table.row_count(),
        combined.sources.len(),
        output.display()
    );

    if let Some(path) = report_path {
        report.save(path)?;
        println!("Report written to {}", path.display());
    }

    Ok(())
}

fn cmd_preview(job: &MergeJob, limit: usize) -> csvc_core::Result<()> {
    let (_, processed, _) = build(job)?;
    let table = &processed.table;

    print_metrics(table);
    println!();

    // Print header
    let header: Vec<&str> = table.column_names();
    println!("{}", header.join("\t"));
    println!("{}", "-".repeat(header.len() * 12));

    for row in table.head(limit) {
        println!("{}", format_row(row));
    }

    if table.row_count() > limit {
        println!(
            "Showing first {} rows out of {} total rows.",
            limit,
            table.row_count()
        );
    }

    Ok(())
}

fn cmd_inspect(inputs: &[PathBuf], mode: ReadMode) -> csvc_core::Result<()> {
    let mut diagnostics = Vec::new();
    let sources = load_sources(inputs, &mut diagnostics);
    let options = ReadOptions {
        mode,
        ..ReadOptions::default()
    };

    println!("Inputs ({}):", sources.len());
    for source in &sources {
        match source.kind {
            SourceKind::Tabular => {
                println!("  {}", describe(&source.name, &source.bytes, &options));
            }
            SourceKind::Archive => match csvc_core::expand_archive(&source.name, &source.bytes) {
                Ok(members) => {
                    println!("  {} [zip, {} CSV members]", source.name, members.len());
                    for member in &members {
                        println!("    {}", describe(&member.name, &member.bytes, &options));
                    }
                }
                Err(e) => println!("  {} [invalid zip: {}]", source.name, e),
            },
            SourceKind::Unsupported => println!("  {} [unsupported]", source.name),
        }
    }

    print_diagnostics(&diagnostics);
    Ok(())
}

fn describe(name: &str, bytes: &[u8], options: &ReadOptions) -> String {
    match read_table(name, bytes, options) {
        Ok(Some(table)) => format!(
            "{} [{} rows, {} columns]",
            name,
            table.row_count(),
            table.column_count()
        ),
        Ok(None) => format!("{} [blank]", name),
        Err(e) => format!("{} [unreadable: {}]", name, e),
    }
}

fn cmd_create_job(output: &Path, inputs: Vec<PathBuf>) -> csvc_core::Result<()> {
    let inputs = if inputs.is_empty() {
        vec![PathBuf::from("data")]
    } else {
        inputs
    };

    let job = MergeJob::new(inputs);
    job.save(output)?;

    println!("Created job file: {}", output.display());
    println!();
    println!("Edit the file to configure your merge, then run:");
    println!("  csvc run --job {}", output.display());

    Ok(())
}

fn print_metrics(table: &CombinedTable) {
    println!("Total rows: {}", table.row_count());
    println!("Total columns: {}", table.column_count());
    if let Some(n) = table.source_count() {
        println!("Unique source files: {}", n);
    }
}

fn print_diagnostics(diagnostics: &[Diagnostic]) {
    for diag in diagnostics {
        eprintln!("Warning: {}", diag.message);
    }
}

fn format_row(row: &Row) -> String {
    let values: Vec<String> = row.cells.iter().map(|c| c.to_string_value()).collect();
    values.join("\t")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_args_build_job() {
        let cli = Cli::try_parse_from([
            "csvc",
            "merge",
            "a.csv",
            "b.zip",
            "--strategy",
            "intersection",
            "--remove-duplicates",
            "--missing-threshold",
            "40",
            "--sort",
            "id",
            "--descending",
        ])
        .unwrap();

        let Commands::Merge { inputs, options, .. } = cli.command else {
            panic!("expected merge");
        };
        let job = options.into_job(inputs);

        assert_eq!(job.inputs, vec![PathBuf::from("a.csv"), PathBuf::from("b.zip")]);
        assert_eq!(job.options.strategy, AlignmentStrategy::Intersection);
        assert!(job.post_process.remove_duplicates);
        assert_eq!(job.post_process.missing_threshold_percent, 40.0);
        assert_eq!(job.post_process.sort_column.as_deref(), Some("id"));
        assert!(!job.post_process.sort_ascending);
        assert_eq!(job.output_path(), PathBuf::from("combined_dataset.csv"));
    }

    #[test]
    fn test_raw_mode_defaults() {
        let cli = Cli::try_parse_from(["csvc", "merge", "dir", "--mode", "raw"]).unwrap();
        let Commands::Merge { inputs, options, .. } = cli.command else {
            panic!("expected merge");
        };
        let job = options.into_job(inputs);

        assert_eq!(job.options.read, ReadOptions::raw(true));
        assert_eq!(job.output_path(), PathBuf::from("stacked_data.csv"));
        assert!(!job.include_header());
    }

    #[test]
    fn test_threshold_out_of_range_rejected() {
        let args = ["csvc", "merge", "a.csv", "--missing-threshold", "150"];
        assert!(Cli::try_parse_from(args).is_err());
        let args = ["csvc", "merge", "a.csv", "--strategy", "outer"];
        assert!(Cli::try_parse_from(args).is_err());
    }

    #[test]
    fn test_descending_requires_sort() {
        assert!(Cli::try_parse_from(["csvc", "merge", "a.csv", "--descending"]).is_err());
    }

    #[test]
    fn test_merge_writes_output_and_report() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.csv"), "id,name\n1,foo\n2,bar\n").unwrap();
        fs::write(dir.path().join("b.csv"), "id,extra\n2,x\n").unwrap();
        fs::write(dir.path().join("empty.csv"), "").unwrap();

        let output = dir.path().join("out.csv");
        let report = dir.path().join("report.json");
        let mut job = MergeJob::new(vec![dir.path().to_path_buf()]);
        job.output = Some(output.clone());
        job.post_process.sort_column = Some("id".to_string());
        job.post_process.sort_ascending = false;

        cmd_merge(&job, Some(report.as_path())).unwrap();

        let text = fs::read_to_string(&output).unwrap();
        assert_eq!(
            text,
            "id,name,source_file,extra\n2,bar,a.csv,\n2,,b.csv,x\n1,foo,a.csv,\n"
        );

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&report).unwrap()).unwrap();
        assert_eq!(json["rows"], 3);
        assert_eq!(json["source_files"], 2);
        assert_eq!(json["diagnostics"][0]["kind"], "unreadable_file");
    }

    #[test]
    fn test_merge_with_no_data_fails() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("empty.csv"), "").unwrap();

        let job = MergeJob::new(vec![dir.path().to_path_buf()]);
        assert!(matches!(cmd_merge(&job, None), Err(csvc_core::Error::NoDataToMerge)));
    }
}
