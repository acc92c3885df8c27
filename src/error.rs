use std::{error::Error, fmt, io};

use ml_core::MlError;

/// Failures of the scheduler's control operations.
#[derive(Debug)]
pub enum SchedulerError {
    /// The model capability refused to build a model.
    Construction(MlError),
    /// Training was requested before any model was created.
    NoModel,
    /// A hyperparameter is out of range.
    InvalidHyperparameters(&'static str),
}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Construction(e) => write!(f, "failed to construct the model: {e}"),
            Self::NoModel => write!(f, "no model has been created yet"),
            Self::InvalidHyperparameters(msg) => write!(f, "invalid hyperparameters: {msg}"),
        }
    }
}

impl Error for SchedulerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Construction(e) => Some(e),
            _ => None,
        }
    }
}

impl From<MlError> for SchedulerError {
    fn from(e: MlError) -> Self {
        Self::Construction(e)
    }
}

/// Failures of the interactive single input prediction.
#[derive(Debug)]
pub enum PredictionError {
    NoModel,
    Shape(MlError),
}

impl fmt::Display for PredictionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoModel => write!(f, "cannot predict without a model"),
            Self::Shape(e) => write!(f, "prediction failed: {e}"),
        }
    }
}

impl Error for PredictionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Shape(e) => Some(e),
            Self::NoModel => None,
        }
    }
}

impl From<MlError> for PredictionError {
    fn from(e: MlError) -> Self {
        Self::Shape(e)
    }
}

/// A worker frame could not be encoded, decoded or delivered.
#[derive(Debug)]
pub enum ProtocolError {
    Encode(serde_json::Error),
    Decode(serde_json::Error),
    /// The other end of the channel is gone.
    Disconnected,
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Encode(e) => write!(f, "failed to encode frame: {e}"),
            Self::Decode(e) => write!(f, "received a malformed frame: {e}"),
            Self::Disconnected => write!(f, "worker channel is disconnected"),
        }
    }
}

impl Error for ProtocolError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Encode(e) | Self::Decode(e) => Some(e),
            Self::Disconnected => None,
        }
    }
}

/// The parallel execution context could not be started.
#[derive(Debug)]
pub enum WorkerInitError {
    Spawn(io::Error),
    Protocol(ProtocolError),
}

impl fmt::Display for WorkerInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spawn(e) => write!(f, "failed to spawn training worker: {e}"),
            Self::Protocol(e) => write!(f, "failed to hand the train request to the worker: {e}"),
        }
    }
}

impl Error for WorkerInitError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Spawn(e) => Some(e),
            Self::Protocol(e) => Some(e),
        }
    }
}

impl From<io::Error> for WorkerInitError {
    fn from(e: io::Error) -> Self {
        Self::Spawn(e)
    }
}

impl From<ProtocolError> for WorkerInitError {
    fn from(e: ProtocolError) -> Self {
        Self::Protocol(e)
    }
}
