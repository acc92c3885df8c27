//! Trains a small classifier without starving its host and paints the
//! decision surface of the live model as training goes.
//!
//! A [`TrainingScheduler`] runs each session on a worker thread, talking to
//! it only through JSON frames, or in cooperative chunks on the caller's own
//! task when no worker can be started. The host awaits
//! [`TrainingScheduler::next_update`] and redraws through a [`Visualizer`]
//! whenever an [`Update`] asks for it.

pub mod batch;
mod channel;
pub mod config;
mod error;
pub mod progress;
pub mod protocol;
pub mod render;
pub mod scheduler;
pub mod session;
pub mod worker;

pub use channel::Envelope;
pub use config::{ConfigError, PlaygroundConfig};
pub use error::{PredictionError, ProtocolError, SchedulerError, WorkerInitError};
pub use progress::{ProgressReporter, ProgressTick};
pub use render::{Canvas, RasterSurface, RenderError, RenderStyle, Visualizer};
pub use scheduler::{SchedulerConfig, TrainingScheduler, Update};
pub use session::{ExecutionMode, Hyperparameters, SessionId, SessionStatus, TrainingSession};
pub use worker::{ThreadFacility, WorkerFacility};

pub use ml_core::{MlError, Mlp, MlpFactory, Model, ModelFactory, ModelSpec, Sample, SampleSet};
