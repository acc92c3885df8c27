use std::{collections::VecDeque, num::NonZeroUsize, sync::Arc};

use log::{debug, info, warn};
use ml_core::{MlError, Model, ModelFactory, ModelSpec, SampleSet};
use tokio_util::sync::CancellationToken;

use crate::{
    batch::{BatchTrainer, ChunkStep},
    channel::{Envelope, WorkerChannel},
    progress::ProgressReporter,
    protocol::{TrainRequest, WorkerEvent, WorkerRequest},
    session::{ExecutionMode, Hyperparameters, SessionId, SessionStatus, TrainingSession},
    worker::{ThreadFacility, WorkerFacility},
    PredictionError, SchedulerError, WorkerInitError,
};

/// Tunables of the scheduler itself, as opposed to those of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Epochs trained between two yields in cooperative mode.
    pub chunk_size: NonZeroUsize,
}

impl SchedulerConfig {
    pub const DEFAULT_CHUNK_SIZE: NonZeroUsize = NonZeroUsize::new(100).unwrap();
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            chunk_size: Self::DEFAULT_CHUNK_SIZE,
        }
    }
}

/// A lifecycle change of the active session, in the order it happened.
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    Started {
        session: SessionId,
        mode: ExecutionMode,
    },
    Progress {
        session: SessionId,
        /// 0-based index of the last finished epoch.
        epoch: usize,
        percent: u8,
        refresh: bool,
    },
    Completed {
        session: SessionId,
    },
    Failed {
        session: SessionId,
        error: String,
    },
    Cancelled {
        session: SessionId,
    },
}

impl Update {
    pub fn session(&self) -> SessionId {
        match self {
            Self::Started { session, .. }
            | Self::Progress { session, .. }
            | Self::Completed { session }
            | Self::Failed { session, .. }
            | Self::Cancelled { session } => *session,
        }
    }

    /// Whether the visualization should be redrawn after this update.
    pub fn refresh(&self) -> bool {
        match self {
            Self::Started { .. } | Self::Completed { .. } => true,
            Self::Progress { refresh, .. } => *refresh,
            Self::Failed { .. } | Self::Cancelled { .. } => false,
        }
    }

    /// Progress percentage carried by this update, if any.
    pub fn percent(&self) -> Option<u8> {
        match self {
            Self::Started { .. } => Some(0),
            Self::Progress { percent, .. } => Some(*percent),
            Self::Completed { .. } => Some(100),
            Self::Failed { .. } | Self::Cancelled { .. } => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed { .. } | Self::Failed { .. } | Self::Cancelled { .. }
        )
    }
}

enum Execution {
    /// Epochs run on the attached worker of the channel.
    Parallel,
    Cooperative(BatchTrainer),
}

struct ActiveRun {
    id: SessionId,
    cancel: CancellationToken,
    reporter: ProgressReporter,
    execution: Execution,
}

enum Step {
    Frame(Envelope),
    Chunk {
        result: Result<ChunkStep, MlError>,
        finished: bool,
    },
    Cancelled,
    Abort(&'static str),
}

/// Owns the model handle and the single training session, and routes every
/// session either to a worker or to the cooperative fallback.
///
/// Nothing runs in the background on its own: the host drives a session by
/// awaiting [`TrainingScheduler::next_update`] (or by calling
/// [`TrainingScheduler::poll_updates`]) and reacts to what it gets back.
pub struct TrainingScheduler<F: ModelFactory> {
    factory: F,
    config: SchedulerConfig,
    channel: Option<WorkerChannel>,
    model: Option<F::Model>,
    session: Option<TrainingSession>,
    run: Option<ActiveRun>,
    pending: VecDeque<Update>,
    next_id: u64,
    discarded_frames: u64,
}

impl<F: ModelFactory> TrainingScheduler<F> {
    /// Creates a new `TrainingScheduler` whose workers run on OS threads.
    ///
    /// # Args
    /// * `factory` - Builds the controller's model and every worker's model.
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            config: SchedulerConfig::default(),
            channel: Some(WorkerChannel::new(Arc::new(ThreadFacility))),
            model: None,
            session: None,
            run: None,
            pending: VecDeque::new(),
            next_id: 0,
            discarded_frames: 0,
        }
    }

    /// Replaces the worker facility. `None` forces cooperative training.
    pub fn with_facility(mut self, facility: Option<Arc<dyn WorkerFacility>>) -> Self {
        self.channel = facility.map(WorkerChannel::new);
        self
    }

    pub fn with_config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    /// Builds a new model handle, replacing the previous one.
    ///
    /// A running session is cancelled once the new model exists; if
    /// construction fails nothing changes.
    ///
    /// # Errors
    /// Returns `SchedulerError::Construction` if the factory rejects the
    /// dimensions or the learning rate.
    pub fn create_model(
        &mut self,
        input_size: usize,
        hidden_units: usize,
        output_size: usize,
        learning_rate: f64,
    ) -> Result<&F::Model, SchedulerError> {
        let model = self.factory.construct(ModelSpec {
            input_size,
            hidden_units,
            output_size,
            learning_rate,
        })?;

        self.cancel();
        info!("created a {input_size}-{hidden_units}-{output_size} model");
        Ok(self.model.insert(model))
    }

    /// Starts a new session, pre-empting the running one.
    ///
    /// The session trains a fresh model shaped like the current handle, with
    /// the session's hidden units and learning rate. It runs on a worker when
    /// one can be started and cooperatively otherwise.
    ///
    /// # Returns
    /// The id of the new session; its `Started` update is queued.
    ///
    /// # Errors
    /// Returns `SchedulerError::NoModel` before the first `create_model` and
    /// `SchedulerError::InvalidHyperparameters` for out of range values.
    pub fn start_training(
        &mut self,
        hyperparameters: Hyperparameters,
        sample_set: impl Into<Arc<SampleSet>>,
    ) -> Result<SessionId, SchedulerError> {
        hyperparameters.validate()?;

        let current = self.model.as_ref().ok_or(SchedulerError::NoModel)?;
        let spec = ModelSpec {
            input_size: current.input_size(),
            hidden_units: hyperparameters.hidden_units,
            output_size: current.output_size(),
            learning_rate: hyperparameters.learning_rate,
        };
        let model = self.factory.construct(spec)?;

        self.cancel();
        self.model = Some(model);

        self.next_id += 1;
        let id = SessionId::new(self.next_id);
        let sample_set = sample_set.into();
        let cancel = CancellationToken::new();

        let execution = match self.open_worker(id, spec, &hyperparameters, &sample_set, &cancel) {
            Some(Ok(())) => Execution::Parallel,
            Some(Err(e)) => {
                warn!("session {id}: {e}, training cooperatively instead");
                self.cooperative(&hyperparameters, &sample_set, &cancel)
            }
            None => self.cooperative(&hyperparameters, &sample_set, &cancel),
        };

        let mode = match execution {
            Execution::Parallel => ExecutionMode::Parallel,
            Execution::Cooperative(_) => ExecutionMode::Cooperative,
        };

        info!(
            "session {id} started ({mode}): {} epochs, {} hidden units, learning rate {}",
            hyperparameters.epochs, hyperparameters.hidden_units, hyperparameters.learning_rate
        );

        self.session = Some(TrainingSession::new(id, hyperparameters, sample_set, mode));
        self.run = Some(ActiveRun {
            id,
            cancel,
            reporter: ProgressReporter::new(hyperparameters.epochs),
            execution,
        });
        self.pending.push_back(Update::Started { session: id, mode });

        Ok(id)
    }

    fn open_worker(
        &mut self,
        id: SessionId,
        spec: ModelSpec,
        hyperparameters: &Hyperparameters,
        sample_set: &SampleSet,
        cancel: &CancellationToken,
    ) -> Option<Result<(), WorkerInitError>> {
        let channel = self.channel.as_mut()?;
        let request = WorkerRequest::Train(TrainRequest {
            sample_set: sample_set.clone(),
            epochs_total: hyperparameters.epochs,
            hidden_units: hyperparameters.hidden_units,
            learning_rate: hyperparameters.learning_rate,
            input_size: Some(spec.input_size),
            output_size: Some(spec.output_size),
        });

        let result = channel
            .open(id, self.factory.clone(), cancel.child_token())
            .and_then(|()| channel.post(&request).map_err(WorkerInitError::from));
        if result.is_err() {
            channel.close();
        }

        Some(result)
    }

    fn cooperative(
        &self,
        hyperparameters: &Hyperparameters,
        sample_set: &Arc<SampleSet>,
        cancel: &CancellationToken,
    ) -> Execution {
        Execution::Cooperative(BatchTrainer::new(
            Arc::clone(sample_set),
            hyperparameters.epochs,
            self.config.chunk_size,
            cancel.clone(),
        ))
    }

    /// Waits for the next update of the active session.
    ///
    /// In cooperative mode this is where training happens: every call
    /// yields to the runtime once and then trains at most one chunk.
    ///
    /// # Returns
    /// `None` once the session reached a terminal state and every update
    /// was handed out, or when no session was ever started.
    pub async fn next_update(&mut self) -> Option<Update> {
        loop {
            if let Some(update) = self.pending.pop_front() {
                return Some(update);
            }

            let run = self.run.as_mut()?;
            let step = match &mut run.execution {
                Execution::Parallel => match self.channel.as_mut() {
                    Some(channel) => {
                        tokio::select! {
                            biased;
                            _ = run.cancel.cancelled() => Step::Cancelled,
                            frame = channel.recv() => match frame {
                                Some(envelope) => Step::Frame(envelope),
                                None => Step::Abort("worker channel closed"),
                            },
                        }
                    }
                    None => Step::Abort("worker channel closed"),
                },
                Execution::Cooperative(trainer) => {
                    tokio::task::yield_now().await;
                    match self.model.as_mut() {
                        Some(model) => {
                            let result = trainer.run_chunk(model);
                            Step::Chunk {
                                result,
                                finished: trainer.is_finished(),
                            }
                        }
                        None => Step::Abort("no model to train"),
                    }
                }
            };

            self.apply(step);
        }
    }

    /// Drains every update that is available without waiting.
    ///
    /// Only frames a worker already sent are processed; cooperative chunks
    /// are never run from here.
    pub fn poll_updates(&mut self) -> Vec<Update> {
        loop {
            let Some(run) = self.run.as_mut() else {
                break;
            };

            let step = if run.cancel.is_cancelled() {
                Step::Cancelled
            } else if let (Execution::Parallel, Some(channel)) = (&run.execution, self.channel.as_mut()) {
                match channel.try_recv() {
                    Some(envelope) => Step::Frame(envelope),
                    None => break,
                }
            } else {
                break;
            };

            self.apply(step);
        }

        self.pending.drain(..).collect()
    }

    /// Cancels the running session. Does nothing when idle.
    ///
    /// A worker is detached immediately; a cooperative session simply never
    /// gets another chunk.
    pub fn cancel(&mut self) {
        let Some(run) = self.finish() else {
            return;
        };

        run.cancel.cancel();
        if let Some(session) = self.session.as_mut() {
            session.cancel();
        }

        info!("session {} cancelled", run.id);
        self.pending.push_back(Update::Cancelled { session: run.id });
    }

    /// A token that cancels the running session when triggered from
    /// anywhere, e.g. another task or a signal handler. The cancellation
    /// is observed by the next `next_update` or `poll_updates` call.
    pub fn cancel_handle(&self) -> Option<CancellationToken> {
        self.run.as_ref().map(|run| run.cancel.clone())
    }

    /// Computes the model output for `inputs`. Never touches any session.
    ///
    /// # Errors
    /// Returns `PredictionError::NoModel` before the first `create_model`
    /// and `PredictionError::Shape` for a wrongly sized input.
    pub fn predict(&self, inputs: &[f64]) -> Result<Vec<f64>, PredictionError> {
        let model = self.model.as_ref().ok_or(PredictionError::NoModel)?;
        Ok(model.predict(inputs)?)
    }

    pub fn status(&self) -> SessionStatus {
        self.session
            .as_ref()
            .map_or(SessionStatus::Idle, TrainingSession::status)
    }

    pub fn progress_percent(&self) -> u8 {
        self.session.as_ref().map_or(0, TrainingSession::percent)
    }

    pub fn is_training(&self) -> bool {
        self.run.is_some()
    }

    /// The latest session, running or not.
    pub fn session(&self) -> Option<&TrainingSession> {
        self.session.as_ref()
    }

    pub fn model(&self) -> Option<&F::Model> {
        self.model.as_ref()
    }

    /// The sample set of the latest session.
    pub fn sample_set(&self) -> Option<&SampleSet> {
        self.session.as_ref().map(TrainingSession::sample_set)
    }

    /// Worker frames dropped because their session was no longer active.
    pub fn discarded_frames(&self) -> u64 {
        self.discarded_frames
    }

    fn apply(&mut self, step: Step) {
        match step {
            Step::Frame(envelope) => self.dispatch(envelope),
            Step::Chunk {
                result: Ok(ChunkStep::Progress { epoch }),
                finished,
            } => {
                self.progress(epoch);
                if finished {
                    self.complete();
                }
            }
            Step::Chunk {
                result: Ok(ChunkStep::Finished),
                ..
            } => self.complete(),
            Step::Chunk {
                result: Ok(ChunkStep::Cancelled),
                ..
            }
            | Step::Cancelled => self.cancel(),
            Step::Chunk { result: Err(e), .. } => self.fail(e.to_string()),
            Step::Abort(reason) => self.fail(reason.to_string()),
        }
    }

    fn dispatch(&mut self, envelope: Envelope) {
        let Envelope { session, event } = envelope;
        if self.run.as_ref().map(|run| run.id) != Some(session) {
            self.discarded_frames += 1;
            warn!("discarding a frame of stale session {session}");
            return;
        }

        match event {
            Ok(WorkerEvent::Progress(report)) => {
                if let Some(parameters) = report.parameters {
                    let loaded = match self.model.as_mut() {
                        Some(model) => model.load_parameters(&parameters),
                        None => Ok(()),
                    };
                    if let Err(e) = loaded {
                        self.fail(format!("bad parameter snapshot: {e}"));
                        return;
                    }
                }
                self.progress(report.epoch);
            }
            Ok(WorkerEvent::Complete) => self.complete(),
            Ok(WorkerEvent::Error(failure)) => self.fail(failure.error),
            Err(e) => self.fail(e.to_string()),
        }
    }

    fn progress(&mut self, epoch: usize) {
        let Some(run) = self.run.as_mut() else {
            return;
        };

        let tick = run.reporter.on_progress(epoch);
        if let Some(session) = self.session.as_mut() {
            session.record_progress(epoch + 1, tick.percent);
        }

        debug!("session {}: epoch {epoch}, {}%", run.id, tick.percent);
        self.pending.push_back(Update::Progress {
            session: run.id,
            epoch,
            percent: tick.percent,
            refresh: tick.refresh,
        });
    }

    fn complete(&mut self) {
        let Some(mut run) = self.finish() else {
            return;
        };

        let tick = run.reporter.on_complete();
        if let Some(session) = self.session.as_mut() {
            session.record_progress(run.reporter.epochs_total(), tick.percent);
            session.complete();
        }

        info!("session {} completed", run.id);
        self.pending.push_back(Update::Completed { session: run.id });
    }

    fn fail(&mut self, error: String) {
        let Some(run) = self.finish() else {
            return;
        };

        if let Some(session) = self.session.as_mut() {
            session.fail(error.clone());
        }

        warn!("session {} failed: {error}", run.id);
        self.pending.push_back(Update::Failed {
            session: run.id,
            error,
        });
    }

    /// Takes the active run and detaches its worker, if any.
    fn finish(&mut self) -> Option<ActiveRun> {
        let run = self.run.take()?;
        if let (Execution::Parallel, Some(channel)) = (&run.execution, self.channel.as_mut()) {
            channel.close();
        }
        Some(run)
    }
}
