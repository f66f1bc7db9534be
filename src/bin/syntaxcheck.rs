//! CLI утилита для проверки синтаксиса OneScript файлов

use anyhow::Result;
use clap::Parser as ClapParser;
use console::style;
use onescript_syntax::cli_common::{
    self, check_files, collect_source_files, FileReport, ProgressReporter,
};
use onescript_syntax::Config;
use std::path::PathBuf;

#[derive(ClapParser, Debug)]
#[command(
    name = "syntaxcheck",
    about = "Проверяет синтаксис OneScript файлов",
    long_about = "Утилита для быстрой проверки синтаксиса .os и .bsl файлов; код возврата 1 при ошибках"
)]
struct Args {
    /// Путь к файлу или директории для проверки
    #[arg(help = "Файл .os/.bsl или директория с файлами")]
    path: PathBuf,

    /// Формат вывода
    #[arg(short, long, value_enum, default_value = "human")]
    format: OutputFormat,

    /// Показать статистику
    #[arg(short, long)]
    stats: bool,

    /// Тихий режим (только код возврата)
    #[arg(short, long)]
    quiet: bool,

    /// Файл конфигурации onescript.toml
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(clap::ValueEnum, Clone, Debug, PartialEq, Eq)]
enum OutputFormat {
    Human,
    Json,
}

fn main() -> Result<()> {
    let args = Args::parse();
    cli_common::init_logging(if args.quiet {
        tracing::Level::ERROR
    } else {
        tracing::Level::WARN
    })?;

    let config = Config::discover(args.config.as_deref())?;
    let files = collect_source_files(&args.path, &config.files.extensions)?;
    let progress = ProgressReporter::new(files.len(), "Проверка", false);
    let reports = check_files(
        onescript_syntax::language(),
        &files,
        &config.parse,
        num_cpus::get(),
        false,
        &progress,
    )?;

    if !args.quiet {
        match args.format {
            OutputFormat::Human => print_human(&reports),
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&reports)?),
        }
        if args.stats {
            print_stats(&reports);
        }
    }

    // Возвращаем ненулевой код, если были ошибки
    if reports.iter().any(FileReport::has_errors) {
        std::process::exit(1);
    }
    Ok(())
}

fn print_human(reports: &[FileReport]) {
    for report in reports {
        if let Some(error) = &report.read_error {
            println!("{} {}: {}", style("✗").red(), report.path.display(), error);
            continue;
        }
        if report.diagnostics.is_empty() {
            println!("{} {}", style("✓").green(), report.path.display());
            continue;
        }
        println!("{} {}", style("✗").red(), style(report.path.display()).bold());
        for diagnostic in &report.diagnostics {
            println!(
                "  {}:{} {} {}",
                diagnostic.span.start.line + 1,
                diagnostic.span.start.column + 1,
                style(diagnostic.code).red(),
                diagnostic.message
            );
        }
    }
}

fn print_stats(reports: &[FileReport]) {
    let with_errors = reports.iter().filter(|r| r.has_errors()).count();
    let total: usize = reports.iter().map(|r| r.diagnostics.len()).sum();
    println!("\n{}", style("Статистика").bold().cyan());
    println!("  Проверено файлов: {}", reports.len());
    println!("  Файлов с ошибками: {}", with_errors);
    println!("  Всего ошибок: {}", total);
}
