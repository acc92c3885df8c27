use std::sync::{mpsc, Arc};

use log::debug;
use ml_core::ModelFactory;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio_util::sync::CancellationToken;

use crate::{
    protocol::{self, WorkerEvent, WorkerRequest},
    session::SessionId,
    worker::{self, Outbox, WorkerFacility},
    ProtocolError, WorkerInitError,
};

/// An event received from a worker, tagged with the session that worker
/// was started for.
#[derive(Debug)]
pub struct Envelope {
    pub session: SessionId,
    pub event: Result<WorkerEvent, ProtocolError>,
}

/// The request half of the worker currently attached to the channel.
struct WorkerLink {
    session: SessionId,
    requests: mpsc::Sender<String>,
    cancel: CancellationToken,
}

impl Drop for WorkerLink {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Message passing boundary between the controller and its workers.
///
/// At most one worker is attached at a time. Event frames of every worker
/// ever attached share a single FIFO inbox, so frames a detached worker sent
/// before it noticed its cancellation can still show up later; they carry
/// that worker's session and the receiver is expected to discard them.
pub(crate) struct WorkerChannel {
    facility: Arc<dyn WorkerFacility>,
    frames_tx: UnboundedSender<(SessionId, String)>,
    frames_rx: UnboundedReceiver<(SessionId, String)>,
    link: Option<WorkerLink>,
}

impl WorkerChannel {
    pub(crate) fn new(facility: Arc<dyn WorkerFacility>) -> Self {
        let (frames_tx, frames_rx) = tokio::sync::mpsc::unbounded_channel();
        Self {
            facility,
            frames_tx,
            frames_rx,
            link: None,
        }
    }

    /// Starts a worker for `session`, detaching any previous one first.
    ///
    /// # Args
    /// * `session` - The session every frame of the new worker is tagged with.
    /// * `factory` - Moved into the worker to build its private model.
    /// * `cancel` - Token observed by the worker; cancelled on detach.
    ///
    /// # Errors
    /// Returns `WorkerInitError::Spawn` if the context could not be created.
    pub(crate) fn open<F: ModelFactory>(
        &mut self,
        session: SessionId,
        factory: F,
        cancel: CancellationToken,
    ) -> Result<(), WorkerInitError> {
        self.close();

        let (req_tx, req_rx) = mpsc::channel();
        let outbox = Outbox::new(session, self.frames_tx.clone());
        let token = cancel.clone();
        self.facility.spawn(
            format!("trainer-{}", session.get()),
            Box::new(move || worker::serve(factory, req_rx, outbox, token)),
        )?;

        debug!("worker for session {session} started");
        self.link = Some(WorkerLink {
            session,
            requests: req_tx,
            cancel,
        });
        Ok(())
    }

    /// Sends a request to the attached worker.
    ///
    /// # Errors
    /// Returns `ProtocolError::Disconnected` if no worker is attached or the
    /// attached one already exited.
    pub(crate) fn post(&self, request: &WorkerRequest) -> Result<(), ProtocolError> {
        let link = self.link.as_ref().ok_or(ProtocolError::Disconnected)?;
        let frame = protocol::encode(request)?;
        link.requests
            .send(frame)
            .map_err(|_| ProtocolError::Disconnected)
    }

    /// Detaches the attached worker without waiting for it.
    pub(crate) fn close(&mut self) {
        if let Some(link) = self.link.take() {
            debug!("detaching worker for session {}", link.session);
        }
    }

    /// Waits for the next frame of any worker.
    pub(crate) async fn recv(&mut self) -> Option<Envelope> {
        let (session, frame) = self.frames_rx.recv().await?;
        Some(Envelope {
            session,
            event: protocol::decode(&frame),
        })
    }

    /// Returns the next frame if one already arrived.
    pub(crate) fn try_recv(&mut self) -> Option<Envelope> {
        let (session, frame) = self.frames_rx.try_recv().ok()?;
        Some(Envelope {
            session,
            event: protocol::decode(&frame),
        })
    }
}
