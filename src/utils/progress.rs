//! Build progress spinner that becomes a no-op when the `progress` feature is disabled

#[cfg(feature = "progress")]
use indicatif::{ProgressBar, ProgressStyle};

/// Spinner reporting scanned tokens during a build
#[derive(Clone)]
pub struct BuildProgress {
    #[cfg(feature = "progress")]
    bar: ProgressBar,
}

impl BuildProgress {
    /// Start a spinner with an initial message
    #[cfg(feature = "progress")]
    pub fn start(message: &str) -> Self {
        let bar = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} [{elapsed_precise}] {msg}") {
            bar.set_style(style);
        }
        bar.set_message(message.to_string());
        bar.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { bar }
    }

    #[cfg(not(feature = "progress"))]
    pub fn start(_message: &str) -> Self {
        Self {}
    }

    /// Update the scanned token count
    pub fn tokens(&self, _scanned: u64) {
        #[cfg(feature = "progress")]
        self.bar.set_message(format!("Scanned {} tokens", _scanned));
    }

    pub fn finish(&self, _message: &str) {
        #[cfg(feature = "progress")]
        self.bar.finish_with_message(_message.to_string());
    }
}
