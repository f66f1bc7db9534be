//! Общие аргументы командной строки для CLI утилит

use clap::Parser;
use std::path::PathBuf;

/// Общие аргументы для всех CLI команд
#[derive(Parser, Debug, Clone)]
pub struct CommonArgs {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to onescript.toml (defaults to ./onescript.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

impl CommonArgs {
    /// Определяет уровень логирования на основе флагов
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::WARN
        }
    }

    /// Проверяет, нужно ли выводить информацию
    pub fn should_print(&self) -> bool {
        !self.quiet
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_from_flags() {
        let args = CommonArgs::parse_from(["test", "--verbose"]);
        assert_eq!(args.log_level(), tracing::Level::DEBUG);
        let args = CommonArgs::parse_from(["test", "-q"]);
        assert_eq!(args.log_level(), tracing::Level::ERROR);
        assert!(!args.should_print());
        let args = CommonArgs::parse_from(["test", "--config", "x.toml"]);
        assert_eq!(args.config, Some(PathBuf::from("x.toml")));
    }
}
