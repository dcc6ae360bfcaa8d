//! Terminal presentation for the console and the one-shot tools.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::{Duration, Instant};

use crate::reconstruction::ProgressReport;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UiMode {
    Auto,
    Plain,
    Pretty,
}

#[derive(Clone, Debug)]
pub struct Ui {
    mode: UiMode,
    is_tty: bool,
    disable_pretty: bool,
}

impl Ui {
    pub fn new(mode: UiMode, is_tty: bool, disable_pretty: bool) -> Self {
        Self {
            mode,
            is_tty,
            disable_pretty,
        }
    }

    pub fn from_args(ui_flag: Option<&str>, is_tty: bool, disable_pretty: bool) -> Self {
        let mode = match ui_flag {
            Some("plain") => UiMode::Plain,
            Some("pretty") => UiMode::Pretty,
            _ => UiMode::Auto,
        };
        Self::new(mode, is_tty, disable_pretty)
    }

    fn use_pretty(&self) -> bool {
        self.is_tty
            && match self.mode {
                UiMode::Pretty => true,
                UiMode::Auto => !self.disable_pretty,
                UiMode::Plain => false,
            }
    }

    pub fn stage(&self, name: &str) -> StageGuard {
        if self.use_pretty() {
            let spinner = ProgressBar::new_spinner();
            spinner.set_draw_target(ProgressDrawTarget::stderr());
            spinner.enable_steady_tick(Duration::from_millis(120));
            let style = ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            spinner.set_style(style);
            spinner.set_message(format!("{name}…"));
            StageGuard::new(name.to_string(), Some(spinner))
        } else {
            eprintln!("==> {}", name);
            StageGuard::new(name.to_string(), None)
        }
    }

    /// Progress bar for a reconstruction session, fed from `ProgressReport`s.
    pub fn reconstruction(&self, name: &str) -> ReconstructionProgress {
        let bar = self.use_pretty().then(|| {
            let bar = ProgressBar::new(PROGRESS_SCALE);
            bar.set_draw_target(ProgressDrawTarget::stderr());
            let style = ProgressStyle::with_template("{prefix} [{bar:30}] {percent:>3}% {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> ");
            bar.set_style(style);
            bar.set_prefix(name.to_string());
            bar
        });
        if bar.is_none() {
            eprintln!("==> {}", name);
        }
        ReconstructionProgress {
            name: name.to_string(),
            bar,
            last_decile: None,
        }
    }
}

pub struct StageGuard {
    name: String,
    start: Instant,
    spinner: Option<ProgressBar>,
}

impl StageGuard {
    fn new(name: String, spinner: Option<ProgressBar>) -> Self {
        Self {
            name,
            start: Instant::now(),
            spinner,
        }
    }
}

impl Drop for StageGuard {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        let message = format!("✔ {} ({})", self.name, format_duration(elapsed));
        if let Some(spinner) = &self.spinner {
            spinner.finish_with_message(message);
        } else {
            eprintln!("{message}");
        }
    }
}

const PROGRESS_SCALE: u64 = 1000;

/// Live view of a reconstruction. Plain mode prints every 10%.
pub struct ReconstructionProgress {
    name: String,
    bar: Option<ProgressBar>,
    last_decile: Option<u64>,
}

impl ReconstructionProgress {
    pub fn update(&mut self, report: &ProgressReport) {
        let position = (report.progress * PROGRESS_SCALE as f64).round() as u64;
        match &self.bar {
            Some(bar) => {
                bar.set_position(position.min(PROGRESS_SCALE));
                bar.set_message(report.eta_label());
            }
            None => {
                let decile = position / (PROGRESS_SCALE / 10);
                if self.last_decile != Some(decile) {
                    self.last_decile = Some(decile);
                    eprintln!("    {} {} {}", self.name, report.percent(), report.eta_label());
                }
            }
        }
    }

    pub fn finish(self, message: &str) {
        match &self.bar {
            Some(bar) => bar.finish_with_message(message.to_string()),
            None => eprintln!("{} {}", self.name, message),
        }
    }
}

fn format_duration(duration: Duration) -> String {
    if duration.as_secs() >= 1 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{}ms", duration.as_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_mode_never_draws_bars() {
        let ui = Ui::from_args(Some("plain"), true, false);
        assert!(!ui.use_pretty());
        let mut progress = ui.reconstruction("test");
        progress.update(&ProgressReport {
            progress: 0.42,
            eta: Some(3.0),
            completed: false,
        });
        assert_eq!(progress.last_decile, Some(4));
        progress.finish("done");
    }

    #[test]
    fn auto_mode_respects_tty_and_opt_out() {
        assert!(Ui::from_args(None, true, false).use_pretty());
        assert!(!Ui::from_args(None, false, false).use_pretty());
        assert!(!Ui::from_args(None, true, true).use_pretty());
        assert!(Ui::from_args(Some("pretty"), true, true).use_pretty());
    }

    #[test]
    fn durations_switch_units_at_one_second() {
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
    }
}
