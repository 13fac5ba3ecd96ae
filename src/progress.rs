//! Per-transfer console progress.

use indicatif::{ProgressBar, ProgressStyle};

/// Byte progress for one incoming file. Constructed hidden when the daemon
/// runs non-interactively so the receive loop never has to branch.
pub struct TransferProgress {
    bar: ProgressBar,
}

impl TransferProgress {
    pub fn new(file_name: &str, total_bytes: u64, visible: bool) -> Self {
        let bar = if visible {
            ProgressBar::new(total_bytes)
        } else {
            ProgressBar::hidden()
        };
        bar.set_style(
            ProgressStyle::default_bar()
                .template("  {msg} [{bar:30}] {bytes}/{total_bytes} ({bytes_per_sec})")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        bar.set_message(file_name.to_string());
        Self { bar }
    }

    pub fn update(&self, bytes_received: u64) {
        self.bar.set_position(bytes_received);
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}
