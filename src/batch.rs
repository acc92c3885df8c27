use std::{num::NonZeroUsize, ops::Range, sync::Arc};

use log::debug;
use ml_core::{MlError, Model, SampleSet};
use tokio_util::sync::CancellationToken;

/// Presents every sample once, in sample set order.
pub(crate) fn train_epoch<M: Model + ?Sized>(model: &mut M, samples: &SampleSet) -> Result<(), MlError> {
    for sample in samples {
        model.train(&sample.inputs, &sample.targets)?;
    }
    Ok(())
}

/// Splits `0..epochs_total` into contiguous chunks of at most `size` epochs.
#[derive(Debug, Clone)]
pub struct ChunkPlan {
    next: usize,
    total: usize,
    size: NonZeroUsize,
}

impl ChunkPlan {
    pub fn new(epochs_total: usize, size: NonZeroUsize) -> Self {
        Self {
            next: 0,
            total: epochs_total,
            size,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.next >= self.total
    }
}

impl Iterator for ChunkPlan {
    type Item = Range<usize>;

    fn next(&mut self) -> Option<Range<usize>> {
        if self.is_exhausted() {
            return None;
        }

        let start = self.next;
        let end = start.saturating_add(self.size.get()).min(self.total);
        self.next = end;
        Some(start..end)
    }
}

/// Outcome of one [`BatchTrainer::run_chunk`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkStep {
    /// A chunk finished; `epoch` is the 0-based index of its last epoch.
    Progress { epoch: usize },
    /// Cancellation was observed at a chunk boundary. Nothing is published.
    Cancelled,
    /// Every epoch has been trained.
    Finished,
}

/// Single threaded fallback trainer.
///
/// Trains in chunks on the caller's thread. The caller is expected to yield
/// to its host between chunks; nothing suspends inside a chunk, and
/// cancellation is only looked at on chunk boundaries, so a chunk that has
/// started always runs to completion.
#[derive(Debug)]
pub struct BatchTrainer {
    sample_set: Arc<SampleSet>,
    plan: ChunkPlan,
    cancel: CancellationToken,
}

impl BatchTrainer {
    pub fn new(
        sample_set: Arc<SampleSet>,
        epochs_total: usize,
        chunk_size: NonZeroUsize,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            sample_set,
            plan: ChunkPlan::new(epochs_total, chunk_size),
            cancel,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.plan.is_exhausted()
    }

    /// Trains the next chunk on `model`.
    ///
    /// A cancellation seen after the last chunk is ignored: every epoch has
    /// been trained, so the chunk reports its progress as usual.
    ///
    /// # Errors
    /// Propagates the first model failure; the rest of the chunk is skipped.
    pub fn run_chunk<M: Model + ?Sized>(&mut self, model: &mut M) -> Result<ChunkStep, MlError> {
        if self.cancel.is_cancelled() {
            return Ok(ChunkStep::Cancelled);
        }

        let Some(chunk) = self.plan.next() else {
            return Ok(ChunkStep::Finished);
        };

        debug!("training epochs {}..{}", chunk.start, chunk.end);
        for _ in chunk.clone() {
            train_epoch(model, &self.sample_set)?;
        }

        if self.cancel.is_cancelled() && !self.plan.is_exhausted() {
            debug!("cancelled during epochs {}..{}", chunk.start, chunk.end);
            return Ok(ChunkStep::Cancelled);
        }

        Ok(ChunkStep::Progress {
            epoch: chunk.end - 1,
        })
    }
}
