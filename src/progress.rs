//! Progress indicators for fmcsync

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

const BAR_TEMPLATE: &str =
    "  {spinner:.green} {prefix:.bold} [{bar:30.cyan/blue}] {pos}/{len} {msg}";
const SPINNER_TEMPLATE: &str = "  {spinner:.green} {msg}";

/// Bar for a known number of operations
pub fn bar(len: u64, prefix: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::with_template(BAR_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-"),
    );
    pb.set_prefix(prefix.to_string());
    pb
}

/// Spinner for work of unknown length, e.g. listing remote objects
pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template(SPINNER_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Hidden bar, used with `--quiet`
pub fn hidden() -> ProgressBar {
    ProgressBar::hidden()
}
