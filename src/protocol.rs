//! Wire format spoken between the controller and a training worker.
//!
//! Frames are JSON text shaped as `{ "type": ..., "data": ... }`, so the two
//! execution contexts never share memory: every message is a copy.

use ml_core::{MlError, SampleSet};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::ProtocolError;

/// Controller -> worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum WorkerRequest {
    Train(TrainRequest),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainRequest {
    pub sample_set: SampleSet,
    pub epochs_total: usize,
    pub hidden_units: usize,
    pub learning_rate: f64,
    /// Defaults to the sample set's input length.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_size: Option<usize>,
    /// Defaults to the sample set's target length.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_size: Option<usize>,
}

/// Worker -> controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum WorkerEvent {
    Progress(ProgressReport),
    Complete,
    Error(WorkerFailure),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressReport {
    /// 0-based index of the epoch that just finished.
    pub epoch: usize,
    pub epochs_total: usize,
    /// Flat parameter snapshot of the worker's model after `epoch`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Vec<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerFailure {
    pub error: String,
}

impl WorkerEvent {
    pub fn failure(error: impl ToString) -> Self {
        Self::Error(WorkerFailure {
            error: error.to_string(),
        })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Progress(_) => "progress",
            Self::Complete => "complete",
            Self::Error(_) => "error",
        }
    }
}

impl From<MlError> for WorkerEvent {
    fn from(e: MlError) -> Self {
        Self::failure(e)
    }
}

/// Encodes a message into a text frame.
///
/// # Errors
/// Returns `ProtocolError::Encode` if serialization fails.
pub fn encode<T: Serialize>(msg: &T) -> Result<String, ProtocolError> {
    serde_json::to_string(msg).map_err(ProtocolError::Encode)
}

/// Decodes a text frame.
///
/// # Errors
/// Returns `ProtocolError::Decode` if the frame is malformed.
pub fn decode<T: DeserializeOwned>(frame: &str) -> Result<T, ProtocolError> {
    serde_json::from_str(frame).map_err(ProtocolError::Decode)
}
