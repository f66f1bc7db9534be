/*!
# OneScript CLI

Generates the language artifact and parses OneScript sources.
*/

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use console::{style, Term};
use onescript_syntax::cli_common::{
    self, check_files, collect_source_files, CommonArgs, FileReport, OutputFormat, OutputWriter,
    ProgressReporter,
};
use onescript_syntax::grammar::onescript;
use onescript_syntax::{generate, Config, Language, TableStats};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;

#[derive(Parser)]
#[command(
    name = "onescript",
    version = env!("CARGO_PKG_VERSION"),
    about = "OneScript grammar generator and parser"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate the binary language artifact from the built-in grammar
    Generate {
        /// Artifact path (overrides [generate].output)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also dump the tables as JSON (overrides [generate].json)
        #[arg(long)]
        json: Option<PathBuf>,

        /// Print table sizes
        #[arg(long)]
        stats: bool,
    },

    /// Parse files or directories and report syntax errors
    Parse {
        /// File or directory with .os / .bsl sources
        path: PathBuf,

        /// Print the S-expression of every tree
        #[arg(long)]
        sexp: bool,

        /// Output format (text, json)
        #[arg(short = 'f', long, default_value = "text")]
        format: String,

        /// Number of parallel workers (defaults to the number of CPUs)
        #[arg(short, long)]
        jobs: Option<usize>,
    },

    /// Create a configuration file with default settings
    Init {
        /// Output path for the configuration file
        #[arg(short, long, default_value = onescript_syntax::config::CONFIG_FILE_NAME)]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = cli_common::init_logging(cli.common.log_level()) {
        eprintln!("{:#}", e);
    }

    if let Commands::Init { output, force } = &cli.command {
        match run_init(&cli.common, output, *force) {
            Ok(()) => return,
            Err(e) => {
                cli_common::print_error(&format!("{:#}", e));
                std::process::exit(2);
            }
        }
    }

    let result = Config::discover(cli.common.config.as_deref()).and_then(|config| match cli.command {
        Commands::Generate {
            output,
            json,
            stats,
        } => run_generate(&cli.common, &config, output, json, stats).map(|()| true),
        Commands::Parse {
            path,
            sexp,
            format,
            jobs,
        } => run_parse(&cli.common, &config, path, sexp, &format, jobs),
        Commands::Init { .. } => Ok(true),
    });

    match result {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            cli_common::print_error(&format!("{:#}", e));
            std::process::exit(2);
        }
    }
}

fn run_init(common: &CommonArgs, output: &Path, force: bool) -> Result<()> {
    Config::write_default(output, force)?;
    if common.should_print() {
        cli_common::print_success(&format!("Configuration created: {}", output.display()));
    }
    Ok(())
}

fn run_generate(
    common: &CommonArgs,
    config: &Config,
    output: Option<PathBuf>,
    json: Option<PathBuf>,
    stats: bool,
) -> Result<()> {
    let started = Instant::now();
    let output = output.unwrap_or_else(|| config.generate.output.clone());
    let json = json.or_else(|| config.generate.json.clone());

    let progress = ProgressReporter::spinner("Generating parse tables...", common.should_print());
    let grammar = onescript::grammar().context("Invalid OneScript grammar")?;
    let tables = generate(&grammar);
    progress.finish();
    let tables = tables.context("Failed to generate parse tables")?;

    // Artifact must load back before it is written
    let language = Language::new(tables, &onescript_syntax::scanner::ONESCRIPT_SCANNER)
        .context("Generated tables do not form a valid language")?;

    let bytes = language.to_bytes()?;
    cli_common::ensure_parent_exists(&output)?;
    std::fs::write(&output, &bytes)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    info!(path = %output.display(), bytes = bytes.len(), "language artifact written");

    if let Some(json) = &json {
        cli_common::ensure_parent_exists(json)?;
        let mut writer = OutputWriter::file(json, OutputFormat::Json)?.with_pretty(true);
        writer.write_object(language.tables())?;
        writer.flush()?;
    }

    if common.should_print() {
        let term = Term::stdout();
        if stats {
            let table_stats = TableStats::from(language.tables());
            term.write_line(&format!("{}", style("Parse tables").bold().cyan()))?;
            term.write_line(&format!("   Symbols:      {}", table_stats.symbols))?;
            term.write_line(&format!("   Terminals:    {}", table_stats.terminals))?;
            term.write_line(&format!("   Productions:  {}", table_stats.productions))?;
            term.write_line(&format!("   States:       {}", table_stats.states))?;
            term.write_line(&format!("   Fields:       {}", table_stats.fields))?;
            term.write_line(&format!("   Alias rows:   {}", table_stats.alias_sequences))?;
        }
        cli_common::print_success(&format!(
            "{} written ({} bytes) in {}",
            output.display(),
            bytes.len(),
            cli_common::format_duration(started.elapsed())
        ));
    }
    Ok(())
}

#[derive(Serialize)]
struct ParseSummary<'a> {
    files: usize,
    files_with_errors: usize,
    diagnostics: usize,
    reports: &'a [FileReport],
}

/// Returns `false` when any file has syntax errors.
fn run_parse(
    common: &CommonArgs,
    config: &Config,
    path: PathBuf,
    sexp: bool,
    format: &str,
    jobs: Option<usize>,
) -> Result<bool> {
    let format: OutputFormat = format.parse()?;
    let started = Instant::now();
    let files = collect_source_files(&path, &config.files.extensions)?;
    if files.is_empty() {
        cli_common::print_warning(&format!("No source files found in {}", path.display()));
        return Ok(true);
    }

    let jobs = jobs.unwrap_or_else(num_cpus::get);
    let progress = ProgressReporter::new(
        files.len(),
        "Parsing",
        common.should_print() && format == OutputFormat::Text && files.len() > 1,
    );
    let reports = check_files(
        onescript_syntax::language(),
        &files,
        &config.parse,
        jobs,
        sexp,
        &progress,
    )?;
    progress.finish();

    let files_with_errors = reports.iter().filter(|r| r.has_errors()).count();
    let diagnostics: usize = reports.iter().map(|r| r.diagnostics.len()).sum();

    let mut writer = OutputWriter::stdout(format);
    match format {
        OutputFormat::Json => {
            writer.write_object(&ParseSummary {
                files: reports.len(),
                files_with_errors,
                diagnostics,
                reports: &reports,
            })?;
        }
        OutputFormat::Text => {
            for report in &reports {
                if let Some(error) = &report.read_error {
                    writer.write_line(&format!(
                        "{}: {}",
                        report.path.display(),
                        style(error).red()
                    ))?;
                }
                for diagnostic in &report.diagnostics {
                    writer.write_line(&diagnostic.to_string())?;
                }
                if let Some(sexp) = &report.sexp {
                    writer.write_line(&format!("{}", style(report.path.display()).bold()))?;
                    writer.write_line(sexp)?;
                }
            }
            if common.should_print() {
                writer.write_header("Summary")?;
                writer.write_line(&format!("Files parsed:      {}", reports.len()))?;
                writer.write_line(&format!("Files with errors: {}", files_with_errors))?;
                writer.write_line(&format!("Diagnostics:       {}", diagnostics))?;
                writer.write_line(&format!(
                    "Duration:          {}",
                    cli_common::format_duration(started.elapsed())
                ))?;
            }
        }
    }
    writer.flush()?;

    Ok(files_with_errors == 0)
}
