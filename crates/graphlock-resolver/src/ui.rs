//! Progress and trace reporting seam

use std::time::Duration;

use graphlock_common::ResolverConfig;

/// Receives lifecycle, progress, and trace callbacks from the engine.
///
/// `debug` takes a lazy message producer so that message construction is
/// skipped entirely when tracing is disabled.
pub trait ResolverUi {
    /// Called once before resolution begins
    fn before_resolution(&self) {}

    /// Called once after resolution ends, on every exit path
    fn after_resolution(&self) {}

    /// Called at most once per latched iteration interval
    fn indicate_progress(&self) {}

    /// Wall time to observe before latching the progress iteration rate
    fn progress_rate(&self) -> Duration {
        Duration::from_millis(330)
    }

    /// Receive a lazily-built trace message. Implementations decide whether
    /// to evaluate the thunk.
    fn debug(&self, depth: usize, message: &dyn Fn() -> String);
}

/// UI that routes traces through [`tracing`] and takes its progress rate
/// from a [`ResolverConfig`].
#[derive(Debug, Clone, Default)]
pub struct DefaultUi {
    config: ResolverConfig,
}

impl DefaultUi {
    /// Build a UI from an explicit configuration
    pub fn new(config: ResolverConfig) -> Self {
        Self { config }
    }

    /// Build a UI configured from the process environment
    pub fn from_env() -> Self {
        Self::new(ResolverConfig::from_env())
    }
}

impl ResolverUi for DefaultUi {
    fn before_resolution(&self) {
        tracing::debug!("starting resolution");
    }

    fn after_resolution(&self) {
        tracing::debug!("finished resolution");
    }

    fn indicate_progress(&self) {
        tracing::trace!("resolution in progress");
    }

    fn progress_rate(&self) -> Duration {
        self.config.progress_rate()
    }

    fn debug(&self, depth: usize, message: &dyn Fn() -> String) {
        if self.config.debug || tracing::enabled!(tracing::Level::DEBUG) {
            let indent = "  ".repeat(depth);
            tracing::debug!("{indent}{}", message());
        }
    }
}
