//! Display utilities for progress bars and formatting helpers.

use std::sync::Arc;
use std::time::Duration;

use console::style;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use ag_core::ProgressState;
use ag_io::ProgressCallback;

/// Progress styles used by downloads.
pub struct ProgressStyles {
    pub download: ProgressStyle,
    pub spinner: ProgressStyle,
    pub done: ProgressStyle,
}

impl Default for ProgressStyles {
    fn default() -> Self {
        Self {
            download: ProgressStyle::default_bar()
                .template(
                    "    {prefix:<16} {bar:25.cyan/dim} {bytes:>10}/{total_bytes:<10} {eta:>6}",
                )
                .unwrap()
                .progress_chars("━━╸"),
            spinner: ProgressStyle::default_spinner()
                .template("    {prefix:<16} {spinner:.cyan} {bytes:>10} {msg}")
                .unwrap()
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
            done: ProgressStyle::default_spinner()
                .template("    {prefix:<16} {msg}")
                .unwrap(),
        }
    }
}

/// Progress bar for one transfer and the callback that drives it.
///
/// The bar starts as a spinner and switches to a byte bar once the total
/// size is known.
pub fn create_transfer_progress(
    name: &str,
    styles: ProgressStyles,
) -> (ProgressCallback, ProgressBar) {
    let pb = ProgressBar::new_spinner();
    pb.set_draw_target(ProgressDrawTarget::stderr());
    pb.set_style(styles.spinner);
    pb.set_prefix(name.to_string());
    pb.set_message("downloading...");
    pb.enable_steady_tick(Duration::from_millis(80));

    let bar = pb.clone();
    let download_style = styles.download;
    let done_style = styles.done;

    let callback: ProgressCallback = Arc::new(move |state: &ProgressState| {
        if let Some(total) = state.max_value
            && bar.length() != Some(total)
        {
            bar.set_length(total);
            bar.set_style(download_style.clone());
        }
        bar.set_position(state.value);

        if state.is_completed {
            bar.set_style(done_style.clone());
            bar.finish_with_message(format!(
                "{} {}",
                style("✓").green(),
                format_bytes(state.value)
            ));
        }
    });

    (callback, pb)
}

/// Format bytes into a human-readable string (e.g., "1.5 GB").
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}
