//! Load progress notifications.
//!
//! The loader pushes a [`ProgressUpdate`] to a [`LoadProgress`] observer at a
//! cadence of roughly one notice per percent, so callers never poll.

use std::fmt;

use log::info;

/// Progress of an in-flight load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressUpdate {
    /// 1-based index of the row about to be inserted.
    pub index: u64,
    /// Expected number of data rows.
    pub total: u64,
}

impl ProgressUpdate {
    /// Completion in tenths of a percent, rounded half up.
    #[must_use]
    pub fn permille(&self) -> u64 {
        if self.total == 0 {
            return 1000;
        }
        let scaled = u128::from(self.index) * 2000 + u128::from(self.total);
        let tenths = scaled / (u128::from(self.total) * 2);
        u64::try_from(tenths).unwrap_or(u64::MAX)
    }
}

impl fmt::Display for ProgressUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let permille = self.permille();
        write!(
            f,
            "Loading {}/{} ({}.{}%)",
            self.index,
            self.total,
            permille / 10,
            permille % 10
        )
    }
}

/// Decides which rows trigger a notice: every `max(1, total / 100)` rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressCadence {
    every: u64,
}

impl ProgressCadence {
    /// Cadence for a load of `total` rows.
    #[must_use]
    pub fn new(total: u64) -> Self {
        Self {
            every: (total / 100).max(1),
        }
    }

    /// Rows between notices.
    #[must_use]
    pub const fn every(&self) -> u64 {
        self.every
    }

    /// Whether the 1-based row `index` should be reported.
    #[must_use]
    pub const fn is_due(&self, index: u64) -> bool {
        index % self.every == 0
    }
}

/// Observer notified while a load runs.
pub trait LoadProgress {
    /// Called before the row at `update.index` is inserted.
    fn on_progress(&mut self, update: &ProgressUpdate);
}

impl<F> LoadProgress for F
where
    F: FnMut(&ProgressUpdate),
{
    fn on_progress(&mut self, update: &ProgressUpdate) {
        self(update);
    }
}

/// Observer that logs each notice at `info` level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProgress;

impl LoadProgress for LogProgress {
    fn on_progress(&mut self, update: &ProgressUpdate) {
        info!("{update}");
    }
}
