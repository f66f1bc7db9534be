//! Модуль для отображения прогресса выполнения

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::Duration;

/// Репортер прогресса поверх `indicatif`; скрытый в тихом режиме
#[derive(Clone)]
pub struct ProgressReporter {
    bar: ProgressBar,
}

impl ProgressReporter {
    /// Прогресс-бар на `total` шагов
    pub fn new(total: usize, message: impl Into<String>, visible: bool) -> Self {
        let bar = ProgressBar::new(total as u64);
        if let Ok(style) =
            ProgressStyle::default_bar().template("{msg} [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
        {
            bar.set_style(style.progress_chars("█▓░"));
        }
        bar.set_message(message.into());
        Self::with_visibility(bar, visible)
    }

    /// Спиннер для операций без известного числа шагов
    pub fn spinner(message: impl Into<String>, visible: bool) -> Self {
        let bar = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            bar.set_style(style);
        }
        bar.set_message(message.into());
        bar.enable_steady_tick(Duration::from_millis(100));
        Self::with_visibility(bar, visible)
    }

    fn with_visibility(bar: ProgressBar, visible: bool) -> Self {
        if !visible {
            bar.set_draw_target(ProgressDrawTarget::hidden());
        }
        Self { bar }
    }

    /// Увеличивает счетчик на 1
    pub fn inc(&self) {
        self.bar.inc(1);
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hidden_reporter_counts() {
        let progress = ProgressReporter::new(3, "Parsing", false);
        progress.inc();
        progress.inc();
        assert_eq!(progress.position(), 2);
        progress.finish();
    }
}
