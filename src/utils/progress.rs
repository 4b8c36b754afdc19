//! Progress reporting built on indicatif.
//!
//! Thin wrapper so commands show the same bar whether the input size is
//! known (plain files) or not (compressed streams, stdin).

use indicatif::{ProgressBar as IndicatifBar, ProgressStyle};

pub struct ProgressBar {
    bar: IndicatifBar,
}

impl ProgressBar {
    /// Bar with a known total, in bytes.
    pub fn new(total: usize, label: &str) -> Self {
        let bar = IndicatifBar::new(total as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{msg} [{bar:40.cyan/blue}] {percent:>3}% ({per_sec}) {eta}")
                .expect("valid progress template")
                .progress_chars("█░"),
        );
        bar.set_message(label.to_string());
        Self { bar }
    }

    /// Spinner for inputs whose size is unknown up front.
    pub fn new_spinner(label: &str) -> Self {
        let bar = IndicatifBar::new_spinner();
        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{msg} {spinner} {pos}")
                .expect("valid spinner template"),
        );
        bar.set_message(label.to_string());
        Self { bar }
    }

    pub fn update(&self, current: usize) {
        self.bar.set_position(current as u64);
    }

    pub fn finish_with_message(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }
}
