// src/utils/progress_bars/village_progress.rs - Terminal progress over a multi-village run
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::utils::config::env_or;

/// How `land-reconcile run` reports progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressOptions {
    pub show_bar: bool,
    /// Name the village being scored next to the bar.
    pub show_village: bool,
}

impl Default for ProgressOptions {
    fn default() -> Self {
        Self {
            show_bar: true,
            show_village: true,
        }
    }
}

impl ProgressOptions {
    /// `RECONCILE_PROGRESS` and `RECONCILE_PROGRESS_VILLAGE`, both on by default.
    pub fn from_env() -> Self {
        Self {
            show_bar: env_or("RECONCILE_PROGRESS", true),
            show_village: env_or("RECONCILE_PROGRESS_VILLAGE", true),
        }
    }

    pub fn quiet() -> Self {
        Self {
            show_bar: false,
            show_village: false,
        }
    }
}

/// Counts finished villages and the suggestions they produced. The bar is
/// optional; the counters are kept either way for the closing summary.
pub struct VillageProgress {
    bar: Option<ProgressBar>,
    show_village: bool,
    villages_done: usize,
    villages_failed: usize,
    suggestions: usize,
}

impl VillageProgress {
    pub fn start(options: ProgressOptions, villages: usize) -> Self {
        Self::with_target(options, villages, ProgressDrawTarget::stderr())
    }

    fn with_target(options: ProgressOptions, villages: usize, target: ProgressDrawTarget) -> Self {
        let bar = options.show_bar.then(|| {
            let pb = ProgressBar::with_draw_target(Some(villages as u64), target);
            let style = ProgressStyle::default_bar()
                .template("  {spinner:.green} [{elapsed_precise}] {bar:30.cyan/blue} {pos}/{len} villages {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▉▊▋▌▍▎▏  ");
            pb.set_style(style);
            pb
        });
        Self {
            bar,
            show_village: options.show_village,
            villages_done: 0,
            villages_failed: 0,
            suggestions: 0,
        }
    }

    pub fn begin_village(&self, village_id: &str) {
        if let (Some(pb), true) = (&self.bar, self.show_village) {
            pb.set_message(format!("scoring {}", village_id));
        }
    }

    pub fn village_done(&mut self, suggestions: usize) {
        self.villages_done += 1;
        self.suggestions += suggestions;
        self.advance();
    }

    pub fn village_failed(&mut self) {
        self.villages_done += 1;
        self.villages_failed += 1;
        self.advance();
    }

    fn advance(&self) {
        if let Some(pb) = &self.bar {
            pb.inc(1);
        }
    }

    pub fn failed(&self) -> usize {
        self.villages_failed
    }

    pub fn summary(&self) -> String {
        format!(
            "{} villages, {} suggestions, {} failed",
            self.villages_done, self.suggestions, self.villages_failed
        )
    }

    pub fn finish(&self) {
        if let Some(pb) = &self.bar {
            pb.finish_with_message(self.summary());
        }
    }
}
