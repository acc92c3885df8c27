use std::{fmt, sync::Arc};

use ml_core::SampleSet;
use serde::{Deserialize, Serialize};

use crate::SchedulerError;

/// Identifies one training run for the lifetime of a scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(u64);

impl SessionId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The knobs captured when a session starts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Hyperparameters {
    pub hidden_units: usize,
    pub learning_rate: f64,
    pub epochs: usize,
}

impl Default for Hyperparameters {
    fn default() -> Self {
        Self {
            hidden_units: 4,
            learning_rate: 0.5,
            epochs: 10_000,
        }
    }
}

impl Hyperparameters {
    /// # Errors
    /// Returns `SchedulerError::InvalidHyperparameters` naming the first bad field.
    pub fn validate(&self) -> Result<(), SchedulerError> {
        if self.hidden_units == 0 {
            return Err(SchedulerError::InvalidHyperparameters(
                "hidden units must be positive",
            ));
        }
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(SchedulerError::InvalidHyperparameters(
                "learning rate must be finite and positive",
            ));
        }
        if self.epochs == 0 {
            return Err(SchedulerError::InvalidHyperparameters(
                "epochs must be positive",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Idle,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// Where the epochs of a session are computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// On a dedicated worker context, reached only through messages.
    Parallel,
    /// In chunks on the controller's own thread, yielding in between.
    Cooperative,
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parallel => write!(f, "parallel"),
            Self::Cooperative => write!(f, "cooperative"),
        }
    }
}

/// One end-to-end training run. Only the scheduler mutates it.
#[derive(Debug, Clone)]
pub struct TrainingSession {
    id: SessionId,
    hyperparameters: Hyperparameters,
    sample_set: Arc<SampleSet>,
    status: SessionStatus,
    current_epoch: usize,
    percent: u8,
    mode: ExecutionMode,
    error: Option<String>,
}

impl TrainingSession {
    pub(crate) fn new(
        id: SessionId,
        hyperparameters: Hyperparameters,
        sample_set: Arc<SampleSet>,
        mode: ExecutionMode,
    ) -> Self {
        Self {
            id,
            hyperparameters,
            sample_set,
            status: SessionStatus::Running,
            current_epoch: 0,
            percent: 0,
            mode,
            error: None,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn hyperparameters(&self) -> &Hyperparameters {
        &self.hyperparameters
    }

    pub fn sample_set(&self) -> &SampleSet {
        &self.sample_set
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Number of epochs known to be finished.
    pub fn current_epoch(&self) -> usize {
        self.current_epoch
    }

    pub fn percent(&self) -> u8 {
        self.percent
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    /// The failure message of a `Failed` session.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub(crate) fn record_progress(&mut self, epochs_done: usize, percent: u8) {
        if self.status == SessionStatus::Running {
            self.current_epoch = self.current_epoch.max(epochs_done);
            self.percent = self.percent.max(percent);
        }
    }

    pub(crate) fn complete(&mut self) {
        if self.status == SessionStatus::Running {
            self.status = SessionStatus::Completed;
            self.current_epoch = self.hyperparameters.epochs;
            self.percent = 100;
        }
    }

    pub(crate) fn fail(&mut self, error: String) {
        if self.status == SessionStatus::Running {
            self.status = SessionStatus::Failed;
            self.error = Some(error);
        }
    }

    pub(crate) fn cancel(&mut self) {
        if self.status == SessionStatus::Running {
            self.status = SessionStatus::Cancelled;
        }
    }
}
