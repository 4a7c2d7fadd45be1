use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Orchestrator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    RunningListing,
    RunningResolution,
    Succeeded,
    Failed,
    Cancelled,
}

impl RunState {
    /// A run is in progress; new triggers are rejected.
    pub fn is_active(&self) -> bool {
        matches!(self, RunState::RunningListing | RunState::RunningResolution)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunState::Succeeded | RunState::Failed | RunState::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Idle => "idle",
            RunState::RunningListing => "running_listing",
            RunState::RunningResolution => "running_resolution",
            RunState::Succeeded => "succeeded",
            RunState::Failed => "failed",
            RunState::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolution progress within a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunProgress {
    pub total: usize,
    pub completed: usize,
    pub resolved: usize,
    pub unresolved: usize,
    pub no_handle: usize,
}

/// Process-wide run status, as served by `GET /status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStatus {
    pub state: RunState,
    pub message: String,
    pub updated_at: DateTime<Utc>,
    /// Zero until the first run starts.
    pub run_id: u64,
    pub progress: RunProgress,
}

impl RunStatus {
    pub fn idle() -> Self {
        Self {
            state: RunState::Idle,
            message: "no run started".to_string(),
            updated_at: Utc::now(),
            run_id: 0,
            progress: RunProgress::default(),
        }
    }

    /// Fresh status for a newly accepted run.
    pub fn started(run_id: u64) -> Self {
        Self {
            state: RunState::RunningListing,
            message: "fetching listing".to_string(),
            updated_at: Utc::now(),
            run_id,
            progress: RunProgress::default(),
        }
    }

    pub(crate) fn transition(&mut self, state: RunState, message: impl Into<String>) {
        self.state = state;
        self.message = message.into();
        self.updated_at = Utc::now();
    }
}

impl Default for RunStatus {
    fn default() -> Self {
        Self::idle()
    }
}
