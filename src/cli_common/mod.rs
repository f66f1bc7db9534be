//! Общий модуль для CLI утилит
//!
//! Shared by `onescript` and `syntaxcheck`: logging setup, colored status
//! lines, source file discovery and the parallel checking pass.

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

use crate::core::fs_utils::has_source_extension;

pub mod args;
pub mod check;
pub mod output;
pub mod progress;

pub use args::CommonArgs;
pub use check::{check_files, FileReport};
pub use output::{OutputFormat, OutputWriter};
pub use progress::ProgressReporter;

/// Инициализирует систему логирования
///
/// `RUST_LOG` adds directives on top of the level chosen by the flags.
pub fn init_logging(level: tracing::Level) -> Result<()> {
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))
}

/// Выводит успешное завершение операции
pub fn print_success(message: &str) {
    println!("{} {}", "✅".green(), message.green());
}

/// Выводит предупреждение
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠️".yellow(), message.yellow());
}

/// Выводит ошибку
pub fn print_error(message: &str) {
    eprintln!("{} {}", "❌".red(), message.red());
}

/// Проверяет существование файла или директории
pub fn validate_path(path: &Path, description: &str) -> Result<()> {
    if !path.exists() {
        return Err(anyhow::anyhow!(
            "{} does not exist: {}",
            description,
            path.display()
        ));
    }
    Ok(())
}

/// Создает родительскую директорию файла если она не существует
pub fn ensure_parent_exists(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() && !parent.exists() => {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))
        }
        _ => Ok(()),
    }
}

/// Файлы исходного кода: сам `path` или все подходящие файлы каталога
///
/// A file given explicitly is taken whatever its extension. Directory
/// entries are sorted so output order does not depend on the file system.
pub fn collect_source_files(path: &Path, extensions: &[String]) -> Result<Vec<PathBuf>> {
    validate_path(path, "Source path")?;
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(path).sort_by_file_name() {
        let entry =
            entry.with_context(|| format!("Failed to walk directory {}", path.display()))?;
        if entry.file_type().is_file() && has_source_extension(entry.path(), extensions) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Форматирует продолжительность в человекочитаемый вид
pub fn format_duration(duration: std::time::Duration) -> String {
    let secs = duration.as_secs();
    let millis = duration.subsec_millis();

    if secs == 0 {
        format!("{}ms", millis)
    } else if secs < 60 {
        format!("{}.{:03}s", secs, millis)
    } else {
        let mins = secs / 60;
        let secs = secs % 60;
        format!("{}m {}s", mins, secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_format_duration() {
        use std::time::Duration;

        assert_eq!(format_duration(Duration::from_millis(500)), "500ms");
        assert_eq!(format_duration(Duration::from_secs(1)), "1.000s");
        assert_eq!(format_duration(Duration::from_secs(65)), "1m 5s");
    }

    #[test]
    fn test_collect_source_files() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("b.os"), "").unwrap();
        std::fs::write(dir.path().join("sub").join("a.BSL"), "").unwrap();
        std::fs::write(dir.path().join("readme.txt"), "").unwrap();

        let extensions = vec!["os".to_string(), "bsl".to_string()];
        let files = collect_source_files(dir.path(), &extensions).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|f| f.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["b.os", "a.BSL"]);

        let single = collect_source_files(&dir.path().join("readme.txt"), &extensions).unwrap();
        assert_eq!(single.len(), 1);
    }

    #[test]
    fn test_missing_path_is_an_error() {
        let dir = TempDir::new().unwrap();
        let err = collect_source_files(&dir.path().join("nope"), &[]).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }
}
