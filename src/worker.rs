use std::{io, sync::mpsc, thread};

use log::{debug, info, warn};
use ml_core::{Model, ModelFactory, ModelSpec};
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use crate::{
    batch::train_epoch,
    protocol::{self, ProgressReport, TrainRequest, WorkerEvent, WorkerRequest},
    session::SessionId,
};

/// A progress event is emitted at least once every this many epochs.
pub const PROGRESS_INTERVAL: usize = 100;

/// Work handed to a parallel execution context.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Something able to run a job on an independent execution context.
pub trait WorkerFacility: Send + Sync {
    /// Starts `job` on a new context named `name`. The job is never joined.
    ///
    /// # Errors
    /// Returns the underlying error if the context could not be created.
    fn spawn(&self, name: String, job: Job) -> io::Result<()>;
}

/// Runs every job on a detached OS thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadFacility;

impl WorkerFacility for ThreadFacility {
    fn spawn(&self, name: String, job: Job) -> io::Result<()> {
        thread::Builder::new().name(name).spawn(job)?;
        Ok(())
    }
}

/// Sending half of a worker, stamping every frame with its session.
///
/// If the worker thread unwinds, a final `error` frame is sent on drop so
/// the controller is not left waiting.
#[derive(Debug)]
pub struct Outbox {
    session: SessionId,
    frames: UnboundedSender<(SessionId, String)>,
}

impl Outbox {
    pub(crate) fn new(session: SessionId, frames: UnboundedSender<(SessionId, String)>) -> Self {
        Self { session, frames }
    }

    /// Returns `false` once the controller stopped listening.
    pub fn send(&self, event: &WorkerEvent) -> bool {
        let frame = match protocol::encode(event) {
            Ok(frame) => frame,
            Err(e) => match protocol::encode(&WorkerEvent::failure(e)) {
                Ok(frame) => frame,
                Err(_) => return false,
            },
        };

        self.frames.send((self.session, frame)).is_ok()
    }
}

impl Drop for Outbox {
    fn drop(&mut self) {
        if thread::panicking() {
            self.send(&WorkerEvent::failure("training worker panicked"));
        }
    }
}

/// Worker side of the channel.
///
/// Blocks on `requests` for a single request, answers it and exits. A worker
/// therefore ends with at most one `complete` or `error` and sends nothing
/// after it; later frames are never read.
///
/// # Args
/// * `factory` - Builds the worker's private model.
/// * `requests` - Incoming request frames.
/// * `outbox` - Where event frames go.
/// * `cancel` - Stops the training run between two epochs.
pub fn serve<F: ModelFactory>(
    factory: F,
    requests: mpsc::Receiver<String>,
    outbox: Outbox,
    cancel: CancellationToken,
) {
    let Ok(frame) = requests.recv() else {
        debug!("worker for session {} hung up before a request", outbox.session);
        return;
    };

    if !cancel.is_cancelled() {
        match protocol::decode::<WorkerRequest>(&frame) {
            Ok(WorkerRequest::Train(request)) => {
                run_training(&factory, &request, &cancel, |event| outbox.send(&event));
            }
            Err(e) => {
                warn!("dropping request: {e}");
                outbox.send(&WorkerEvent::failure(e));
            }
        }
    }

    debug!("worker for session {} exiting", outbox.session);
}

/// Trains a fresh model as described by `request`, reporting through `emit`.
///
/// `emit` returns `false` once nobody listens anymore, which stops the run.
/// Nothing is emitted after a cancellation, an `Error` or the `Complete`.
pub fn run_training<F, E>(factory: &F, request: &TrainRequest, cancel: &CancellationToken, mut emit: E)
where
    F: ModelFactory,
    E: FnMut(WorkerEvent) -> bool,
{
    let samples = &request.sample_set;
    let spec = ModelSpec {
        input_size: request.input_size.unwrap_or_else(|| samples.input_size()),
        hidden_units: request.hidden_units,
        output_size: request.output_size.unwrap_or_else(|| samples.output_size()),
        learning_rate: request.learning_rate,
    };

    let mut model = match factory.construct(spec) {
        Ok(model) => model,
        Err(e) => {
            emit(e.into());
            return;
        }
    };

    let total = request.epochs_total;
    info!("training {total} epochs on {} samples", samples.len());

    for epoch in 0..total {
        if cancel.is_cancelled() {
            debug!("cancelled at epoch {epoch}");
            return;
        }

        if let Err(e) = train_epoch(&mut model, samples) {
            warn!("training failed at epoch {epoch}: {e}");
            emit(e.into());
            return;
        }

        if epoch % PROGRESS_INTERVAL == 0 || epoch + 1 == total {
            let report = ProgressReport {
                epoch,
                epochs_total: total,
                parameters: Some(model.parameters()),
            };
            if !emit(WorkerEvent::Progress(report)) {
                return;
            }
        }
    }

    emit(WorkerEvent::Complete);
}
