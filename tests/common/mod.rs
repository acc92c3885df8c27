#![allow(dead_code)]

use std::{
    io,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex, OnceLock,
    },
};

use tokio_util::sync::CancellationToken;
use xor_playground::{
    worker::Job, MlError, Model, ModelFactory, ModelSpec, Update, WorkerFacility,
};

/// Train calls made by every model of one [`RecordingFactory`].
#[derive(Debug, Default)]
pub struct TrainLog {
    count: AtomicUsize,
    inputs: Option<Mutex<Vec<Vec<f64>>>>,
    cancel_at: OnceLock<(usize, CancellationToken)>,
}

impl TrainLog {
    pub fn len(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    /// Inputs in call order; empty for a counting-only log.
    pub fn inputs(&self) -> Vec<Vec<f64>> {
        self.inputs
            .as_ref()
            .map(|inputs| inputs.lock().unwrap().clone())
            .unwrap_or_default()
    }

    /// Cancels `token` right after the `n`-th train call.
    pub fn cancel_at(&self, n: usize, token: CancellationToken) {
        self.cancel_at.set((n, token)).unwrap();
    }

    fn record(&self, inputs: &[f64]) {
        if let Some(log) = &self.inputs {
            log.lock().unwrap().push(inputs.to_vec());
        }

        let n = self.count.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((at, token)) = self.cancel_at.get() {
            if n == *at {
                token.cancel();
            }
        }
    }
}

/// Deterministic stand-in for a real model: it checks shapes, counts its
/// train calls and predicts the mean of its inputs.
#[derive(Debug, Clone)]
pub struct RecordingFactory {
    pub log: Arc<TrainLog>,
}

impl RecordingFactory {
    pub fn recording() -> Self {
        Self {
            log: Arc::new(TrainLog {
                inputs: Some(Mutex::new(Vec::new())),
                ..Default::default()
            }),
        }
    }

    pub fn counting() -> Self {
        Self {
            log: Arc::new(TrainLog::default()),
        }
    }
}

pub struct RecordingModel {
    spec: ModelSpec,
    trained: usize,
    log: Arc<TrainLog>,
}

impl RecordingModel {
    fn check(what: &'static str, got: usize, expected: usize) -> Result<(), MlError> {
        if got != expected {
            return Err(MlError::ShapeMismatch {
                what,
                got,
                expected,
            });
        }
        Ok(())
    }
}

impl Model for RecordingModel {
    fn input_size(&self) -> usize {
        self.spec.input_size
    }

    fn output_size(&self) -> usize {
        self.spec.output_size
    }

    fn train(&mut self, inputs: &[f64], targets: &[f64]) -> Result<(), MlError> {
        Self::check("inputs", inputs.len(), self.spec.input_size)?;
        Self::check("targets", targets.len(), self.spec.output_size)?;
        self.log.record(inputs);
        self.trained += 1;
        Ok(())
    }

    fn predict(&self, inputs: &[f64]) -> Result<Vec<f64>, MlError> {
        Self::check("inputs", inputs.len(), self.spec.input_size)?;
        let mean = inputs.iter().sum::<f64>() / inputs.len() as f64;
        Ok(vec![mean; self.spec.output_size])
    }

    fn parameters(&self) -> Vec<f64> {
        vec![self.trained as f64]
    }

    fn load_parameters(&mut self, params: &[f64]) -> Result<(), MlError> {
        match params {
            [trained] => {
                self.trained = *trained as usize;
                Ok(())
            }
            _ => Err(MlError::ParameterCount {
                got: params.len(),
                expected: 1,
            }),
        }
    }
}

impl ModelFactory for RecordingFactory {
    type Model = RecordingModel;

    fn construct(&self, spec: ModelSpec) -> Result<RecordingModel, MlError> {
        spec.validate()?;
        Ok(RecordingModel {
            spec,
            trained: 0,
            log: Arc::clone(&self.log),
        })
    }
}

/// A host without threads.
pub struct RefusingFacility;

impl WorkerFacility for RefusingFacility {
    fn spawn(&self, _name: String, _job: Job) -> io::Result<()> {
        Err(io::Error::other("spawning is not supported"))
    }
}

/// Percentages in the order the updates carried them.
pub fn percents(updates: &[Update]) -> Vec<u8> {
    updates.iter().filter_map(Update::percent).collect()
}
