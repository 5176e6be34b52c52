use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::time::Duration;

pub trait MultiProgressNew {
    /// Adds a bar with `style` that keeps ticking while the pipeline waits.
    fn add_with_style(&self, pb: ProgressBar, style: ProgressStyle) -> ProgressBar;
    fn add_spinner(&self, style: ProgressStyle, message: &str) -> ProgressBar;
}

impl MultiProgressNew for MultiProgress {
    fn add_with_style(&self, pb: ProgressBar, style: ProgressStyle) -> ProgressBar {
        let pb = self.add(pb);
        pb.set_style(style);
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }

    fn add_spinner(&self, style: ProgressStyle, message: &str) -> ProgressBar {
        let pb = self.add_with_style(ProgressBar::new_spinner(), style);
        pb.set_message(message.to_string());
        pb
    }
}
