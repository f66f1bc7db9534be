//! Параллельная проверка синтаксиса набора файлов

use anyhow::{Context, Result};
use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;

use super::progress::ProgressReporter;
use crate::core::read_source_file;
use crate::diagnostics::{collect_syntax_diagnostics, Diagnostic};
use crate::language::Language;
use crate::parser::{ParseConfig, Parser};

/// Результат проверки одного файла
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub path: PathBuf,
    pub diagnostics: Vec<Diagnostic>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sexp: Option<String>,
    /// Ошибка чтения файла; диагностик в этом случае нет
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_error: Option<String>,
    pub elapsed_us: u64,
}

impl FileReport {
    pub fn has_errors(&self) -> bool {
        self.read_error.is_some() || self.diagnostics.iter().any(Diagnostic::is_error)
    }
}

/// Parses `files` on `jobs` threads, one [`Parser`] per worker.
///
/// Reports come back in the order of `files`.
pub fn check_files(
    language: &'static Language,
    files: &[PathBuf],
    config: &ParseConfig,
    jobs: usize,
    with_sexp: bool,
    progress: &ProgressReporter,
) -> Result<Vec<FileReport>> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs.max(1))
        .build()
        .context("Failed to build worker pool")?;

    pool.install(|| {
        files
            .par_iter()
            .map_init(
                || Parser::with_config(config.clone()),
                |parser, path| {
                    let report = check_file(parser, language, path, with_sexp);
                    progress.inc();
                    report
                },
            )
            .collect()
    })
}

fn check_file(
    parser: &mut Parser,
    language: &'static Language,
    path: &Path,
    with_sexp: bool,
) -> Result<FileReport> {
    let started = Instant::now();
    let source = match read_source_file(path) {
        Ok(source) => source,
        Err(e) => {
            tracing::warn!("Failed to read {}: {}", path.display(), e);
            return Ok(FileReport {
                path: path.to_path_buf(),
                diagnostics: Vec::new(),
                sexp: None,
                read_error: Some(e.to_string()),
                elapsed_us: 0,
            });
        }
    };

    if parser.language().is_none() {
        parser.set_language(language)?;
    }
    let tree = parser
        .parse(&source, None)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    let diagnostics = collect_syntax_diagnostics(&tree, &source, Some(path));

    Ok(FileReport {
        path: path.to_path_buf(),
        diagnostics,
        sexp: with_sexp.then(|| tree.to_sexp()),
        read_error: None,
        elapsed_us: started.elapsed().as_micros() as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_check_files_keeps_order() {
        let dir = TempDir::new().unwrap();
        let good = dir.path().join("good.os");
        let bad = dir.path().join("bad.os");
        std::fs::write(&good, "А = 1;").unwrap();
        std::fs::write(&bad, "Если А = Тогда").unwrap();
        let missing = dir.path().join("missing.os");

        let files = vec![good.clone(), bad.clone(), missing.clone()];
        let progress = ProgressReporter::new(files.len(), "test", false);
        let reports = check_files(
            crate::language(),
            &files,
            &ParseConfig::default(),
            2,
            true,
            &progress,
        )
        .unwrap();

        assert_eq!(reports.len(), 3);
        assert_eq!(reports[0].path, good);
        assert!(!reports[0].has_errors());
        assert_eq!(
            reports[0].sexp.as_deref(),
            Some("(source_file (assignment left: (identifier) right: (number)))")
        );
        assert!(reports[1].has_errors());
        assert!(reports[2].read_error.is_some());
        assert_eq!(progress.position(), 3);
    }
}
