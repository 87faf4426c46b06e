//! Action duration table.
//!
//! Every action kind has a known duration, expressed in abstract time units.
//! The table is environment-specific and injected into the planner.

use serde::{Deserialize, Serialize};

use super::ActionKind;

/// Duration of each action kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostModel {
    /// Live migration of a running VM.
    pub migrate: i64,
    /// Start of a waiting VM.
    pub run: i64,
    /// Stop of a running or sleeping VM.
    pub stop: i64,
    /// Suspend to the current host's storage.
    pub suspend_local: i64,
    /// Suspend to another host's storage.
    pub suspend_remote: i64,
    /// Resume on the host storing the image.
    pub resume_local: i64,
    /// Resume on another host.
    pub resume_remote: i64,
    /// Node power-on.
    pub boot: i64,
    /// Node power-off.
    pub shutdown: i64,
}

impl Default for CostModel {
    fn default() -> Self {
        Self {
            migrate: 6,
            run: 1,
            stop: 2,
            suspend_local: 3,
            suspend_remote: 6,
            resume_local: 3,
            resume_remote: 6,
            boot: 7,
            shutdown: 3,
        }
    }
}

impl CostModel {
    /// Creates the default table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the migration duration.
    pub fn with_migrate(mut self, duration: i64) -> Self {
        self.migrate = duration;
        self
    }

    /// Sets the run duration.
    pub fn with_run(mut self, duration: i64) -> Self {
        self.run = duration;
        self
    }

    /// Sets the stop duration.
    pub fn with_stop(mut self, duration: i64) -> Self {
        self.stop = duration;
        self
    }

    /// Sets the local and remote suspend durations.
    pub fn with_suspend(mut self, local: i64, remote: i64) -> Self {
        self.suspend_local = local;
        self.suspend_remote = remote;
        self
    }

    /// Sets the local and remote resume durations.
    pub fn with_resume(mut self, local: i64, remote: i64) -> Self {
        self.resume_local = local;
        self.resume_remote = remote;
        self
    }

    /// Sets the boot duration.
    pub fn with_boot(mut self, duration: i64) -> Self {
        self.boot = duration;
        self
    }

    /// Sets the shutdown duration.
    pub fn with_shutdown(mut self, duration: i64) -> Self {
        self.shutdown = duration;
        self
    }

    /// Longest duration an action of this kind can take.
    pub fn worst_case(&self, kind: ActionKind) -> i64 {
        match kind {
            ActionKind::Migration => self.migrate,
            ActionKind::Run => self.run,
            ActionKind::Stop => self.stop,
            ActionKind::Suspend => self.suspend_local.max(self.suspend_remote),
            ActionKind::Resume => self.resume_local.max(self.resume_remote),
            ActionKind::Boot => self.boot,
            ActionKind::Shutdown => self.shutdown,
        }
    }

    /// Whether every duration is non-negative.
    pub fn is_valid(&self) -> bool {
        [
            self.migrate,
            self.run,
            self.stop,
            self.suspend_local,
            self.suspend_remote,
            self.resume_local,
            self.resume_remote,
            self.boot,
            self.shutdown,
        ]
        .iter()
        .all(|&d| d >= 0)
    }
}
