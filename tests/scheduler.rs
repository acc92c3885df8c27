mod common;

use std::{sync::Arc, thread, time::Duration};

use common::{percents, RecordingFactory, RefusingFacility};
use tokio_test::{assert_pending, assert_ready};
use xor_playground::{
    ExecutionMode, Hyperparameters, MlpFactory, Model, PredictionError, SampleSet, SchedulerError,
    SessionStatus, TrainingScheduler, Update, WorkerFacility,
};

fn hp(epochs: usize) -> Hyperparameters {
    Hyperparameters {
        epochs,
        ..Default::default()
    }
}

async fn drain<F: xor_playground::ModelFactory>(scheduler: &mut TrainingScheduler<F>) -> Vec<Update> {
    let mut updates = Vec::new();
    while let Some(update) = scheduler.next_update().await {
        updates.push(update);
    }
    updates
}

fn cooperative(factory: RecordingFactory) -> TrainingScheduler<RecordingFactory> {
    TrainingScheduler::new(factory).with_facility(None)
}

#[tokio::test]
async fn parallel_session_reaches_one_hundred_exactly_once() {
    let factory = RecordingFactory::counting();
    let log = factory.log.clone();
    let mut scheduler = TrainingScheduler::new(factory);
    scheduler.create_model(2, 4, 1, 0.5).unwrap();
    let id = scheduler.start_training(hp(1_000), SampleSet::xor()).unwrap();

    let updates = drain(&mut scheduler).await;

    assert_eq!(
        updates.first(),
        Some(&Update::Started {
            session: id,
            mode: ExecutionMode::Parallel
        })
    );
    assert_eq!(updates.last(), Some(&Update::Completed { session: id }));

    let percents = percents(&updates);
    assert!(percents.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(percents.iter().filter(|p| **p == 100).count(), 1);
    assert_eq!(percents.last(), Some(&100));

    let epochs: Vec<_> = updates
        .iter()
        .filter_map(|u| match u {
            Update::Progress { epoch, .. } => Some(*epoch),
            _ => None,
        })
        .collect();
    assert_eq!(epochs, vec![0, 100, 200, 300, 400, 500, 600, 700, 800, 900, 999]);

    let refreshed: Vec<_> = updates
        .iter()
        .filter(|u| matches!(u, Update::Progress { refresh: true, .. }))
        .filter_map(Update::percent)
        .collect();
    assert_eq!(refreshed, vec![10, 20, 30, 40, 50, 60, 70, 80, 90]);

    assert_eq!(log.len(), 4_000);
    assert_eq!(scheduler.status(), SessionStatus::Completed);
    assert_eq!(scheduler.progress_percent(), 100);
    assert!(!scheduler.is_training());

    // The controller's model mirrors the worker's last snapshot.
    assert_eq!(scheduler.model().unwrap().parameters(), vec![4_000.0]);
}

#[tokio::test]
async fn restarting_never_interleaves_sessions() {
    let mut scheduler = TrainingScheduler::new(RecordingFactory::counting());
    scheduler.create_model(2, 4, 1, 0.5).unwrap();

    let first = scheduler.start_training(hp(10_000_000), SampleSet::xor()).unwrap();
    assert!(matches!(
        scheduler.next_update().await,
        Some(Update::Started { .. })
    ));
    assert!(matches!(
        scheduler.next_update().await,
        Some(Update::Progress { session, .. }) if session == first
    ));

    // Let the first worker queue up frames nobody reads.
    thread::sleep(Duration::from_millis(20));

    let second = scheduler.start_training(hp(500), SampleSet::xor()).unwrap();
    let updates = drain(&mut scheduler).await;

    assert_eq!(updates[0], Update::Cancelled { session: first });
    assert_eq!(
        updates[1],
        Update::Started {
            session: second,
            mode: ExecutionMode::Parallel
        }
    );
    assert!(updates[1..].iter().all(|u| u.session() == second));
    assert_eq!(updates.last(), Some(&Update::Completed { session: second }));
    assert!(scheduler.discarded_frames() > 0);
}

#[test]
fn predicting_without_a_model_leaves_the_scheduler_idle() {
    let scheduler = TrainingScheduler::new(RecordingFactory::counting());

    assert!(matches!(
        scheduler.predict(&[0.0, 1.0]),
        Err(PredictionError::NoModel)
    ));
    assert_eq!(scheduler.status(), SessionStatus::Idle);
    assert!(scheduler.session().is_none());
    assert!(!scheduler.is_training());
}

#[test]
fn wrongly_sized_predictions_are_reported() {
    let mut scheduler = TrainingScheduler::new(MlpFactory::seeded(3));
    scheduler.create_model(2, 4, 1, 0.5).unwrap();

    assert!(matches!(
        scheduler.predict(&[0.0]),
        Err(PredictionError::Shape(_))
    ));
    assert_eq!(scheduler.status(), SessionStatus::Idle);
}

#[test]
fn zero_hidden_units_cannot_be_constructed() {
    let mut scheduler = TrainingScheduler::new(MlpFactory::default());

    match scheduler.create_model(2, 0, 1, 0.5) {
        Err(SchedulerError::Construction(e)) => assert!(e.is_construction()),
        Err(e) => panic!("unexpected error: {e}"),
        Ok(_) => panic!("a model without hidden units was built"),
    }
    assert!(scheduler.model().is_none());
    assert_eq!(scheduler.status(), SessionStatus::Idle);
}

#[test]
fn invalid_hyperparameters_are_rejected_up_front() {
    let mut scheduler = cooperative(RecordingFactory::counting());
    scheduler.create_model(2, 4, 1, 0.5).unwrap();

    assert!(matches!(
        scheduler.start_training(hp(0), SampleSet::xor()),
        Err(SchedulerError::InvalidHyperparameters(_))
    ));
    assert_eq!(scheduler.status(), SessionStatus::Idle);
}

#[tokio::test]
async fn cooperative_cancel_lets_the_running_chunk_finish() {
    let factory = RecordingFactory::counting();
    let log = factory.log.clone();
    let mut scheduler = cooperative(factory);
    scheduler.create_model(2, 4, 1, 0.5).unwrap();
    let id = scheduler.start_training(hp(1_000), SampleSet::xor()).unwrap();

    // Cancel halfway through the second chunk (epoch 149).
    log.cancel_at(600, scheduler.cancel_handle().unwrap());

    let updates = drain(&mut scheduler).await;
    assert_eq!(
        updates,
        vec![
            Update::Started {
                session: id,
                mode: ExecutionMode::Cooperative
            },
            Update::Progress {
                session: id,
                epoch: 99,
                percent: 9,
                refresh: false
            },
            Update::Cancelled { session: id },
        ]
    );
    assert_eq!(log.len(), 800);
    assert_eq!(scheduler.status(), SessionStatus::Cancelled);
    assert_eq!(scheduler.session().unwrap().current_epoch(), 100);
}

#[tokio::test]
async fn a_cancel_during_the_last_chunk_still_completes() {
    let factory = RecordingFactory::counting();
    let log = factory.log.clone();
    let mut scheduler = cooperative(factory);
    scheduler.create_model(2, 4, 1, 0.5).unwrap();
    let id = scheduler.start_training(hp(150), SampleSet::xor()).unwrap();

    // Epoch 119 of the second and last chunk.
    log.cancel_at(480, scheduler.cancel_handle().unwrap());

    let updates = drain(&mut scheduler).await;
    assert_eq!(
        updates,
        vec![
            Update::Started {
                session: id,
                mode: ExecutionMode::Cooperative
            },
            Update::Progress {
                session: id,
                epoch: 99,
                percent: 66,
                refresh: true
            },
            Update::Progress {
                session: id,
                epoch: 149,
                percent: 99,
                refresh: true
            },
            Update::Completed { session: id },
        ]
    );
    assert_eq!(log.len(), 600);
    assert_eq!(scheduler.status(), SessionStatus::Completed);
}

#[tokio::test]
async fn restarting_a_cooperative_session_never_interleaves() {
    let factory = RecordingFactory::counting();
    let log = factory.log.clone();
    let mut scheduler = cooperative(factory);
    scheduler.create_model(2, 4, 1, 0.5).unwrap();

    let first = scheduler.start_training(hp(1_000), SampleSet::xor()).unwrap();
    assert!(matches!(
        scheduler.next_update().await,
        Some(Update::Started { .. })
    ));
    assert!(matches!(
        scheduler.next_update().await,
        Some(Update::Progress { session, epoch: 99, .. }) if session == first
    ));

    let second = scheduler.start_training(hp(200), SampleSet::xor()).unwrap();
    let updates = drain(&mut scheduler).await;

    assert_eq!(
        updates,
        vec![
            Update::Cancelled { session: first },
            Update::Started {
                session: second,
                mode: ExecutionMode::Cooperative
            },
            Update::Progress {
                session: second,
                epoch: 99,
                percent: 49,
                refresh: true
            },
            Update::Progress {
                session: second,
                epoch: 199,
                percent: 99,
                refresh: true
            },
            Update::Completed { session: second },
        ]
    );
    assert_eq!(log.len(), (100 + 200) * 4);
}

#[tokio::test]
async fn cancelling_a_parallel_session_stops_its_worker() {
    let factory = RecordingFactory::counting();
    let log = factory.log.clone();
    let mut scheduler = TrainingScheduler::new(factory);
    scheduler.create_model(2, 4, 1, 0.5).unwrap();
    let id = scheduler.start_training(hp(10_000_000), SampleSet::xor()).unwrap();

    scheduler.next_update().await;
    scheduler.next_update().await;
    scheduler.cancel();
    scheduler.cancel();

    assert_eq!(scheduler.poll_updates(), vec![Update::Cancelled { session: id }]);
    assert_eq!(scheduler.next_update().await, None);

    thread::sleep(Duration::from_millis(20));
    let stopped_at = log.len();
    thread::sleep(Duration::from_millis(20));
    assert_eq!(log.len(), stopped_at);
    assert!(stopped_at < 40_000_000);
}

#[tokio::test]
async fn worker_init_failure_falls_back_to_cooperative() {
    let facility: Arc<dyn WorkerFacility> = Arc::new(RefusingFacility);
    let mut scheduler =
        TrainingScheduler::new(RecordingFactory::counting()).with_facility(Some(facility));
    scheduler.create_model(2, 4, 1, 0.5).unwrap();
    let id = scheduler.start_training(hp(200), SampleSet::xor()).unwrap();

    let updates = drain(&mut scheduler).await;
    assert_eq!(
        updates.first(),
        Some(&Update::Started {
            session: id,
            mode: ExecutionMode::Cooperative
        })
    );
    assert_eq!(updates.last(), Some(&Update::Completed { session: id }));
    assert_eq!(
        scheduler.session().map(|s| s.mode()),
        Some(ExecutionMode::Cooperative)
    );
}

#[tokio::test]
async fn both_modes_present_the_same_samples_in_the_same_order() {
    let xor = SampleSet::xor();
    let mut logs = Vec::new();

    for parallel in [true, false] {
        let factory = RecordingFactory::recording();
        let log = factory.log.clone();
        let mut scheduler = TrainingScheduler::new(factory);
        if !parallel {
            scheduler = scheduler.with_facility(None);
        }

        scheduler.create_model(2, 4, 1, 0.5).unwrap();
        scheduler.start_training(hp(250), xor.clone()).unwrap();
        let updates = drain(&mut scheduler).await;
        assert!(matches!(updates.last(), Some(Update::Completed { .. })));

        logs.push(log.inputs());
    }

    assert_eq!(logs[0].len(), 250 * xor.len());
    assert_eq!(logs[0], logs[1]);

    let order: Vec<_> = xor.iter().map(|s| s.inputs.clone()).collect();
    assert!(logs[0].chunks(xor.len()).all(|epoch| epoch == order.as_slice()));
}

#[tokio::test]
async fn shape_errors_fail_the_session_in_both_modes() {
    for parallel in [true, false] {
        let mut scheduler = TrainingScheduler::new(RecordingFactory::counting());
        if !parallel {
            scheduler = scheduler.with_facility(None);
        }

        // Three inputs against two-dimensional samples.
        scheduler.create_model(3, 4, 1, 0.5).unwrap();
        let id = scheduler.start_training(hp(100), SampleSet::xor()).unwrap();
        let updates = drain(&mut scheduler).await;

        assert_eq!(updates.len(), 2, "{updates:?}");
        match &updates[1] {
            Update::Failed { session, error } => {
                assert_eq!(*session, id);
                assert!(error.contains("inputs"), "{error}");
            }
            other => panic!("expected a failure, got {other:?}"),
        }
        assert_eq!(scheduler.status(), SessionStatus::Failed);
        assert!(scheduler.session().unwrap().error().is_some());

        // A failed session never blocks the next one.
        scheduler.create_model(2, 4, 1, 0.5).unwrap();
        scheduler.start_training(hp(100), SampleSet::xor()).unwrap();
        let updates = drain(&mut scheduler).await;
        assert!(matches!(updates.last(), Some(Update::Completed { .. })));
    }
}

#[test]
fn cooperative_training_yields_before_every_chunk() {
    let mut scheduler = cooperative(RecordingFactory::counting());
    scheduler.create_model(2, 4, 1, 0.5).unwrap();
    let id = scheduler.start_training(hp(150), SampleSet::xor()).unwrap();

    {
        let mut next = tokio_test::task::spawn(scheduler.next_update());
        assert!(matches!(
            assert_ready!(next.poll()),
            Some(Update::Started { .. })
        ));
    }

    let mut next = tokio_test::task::spawn(scheduler.next_update());
    assert_pending!(next.poll());
    assert!(next.is_woken());
    assert_eq!(
        assert_ready!(next.poll()),
        Some(Update::Progress {
            session: id,
            epoch: 99,
            percent: 66,
            refresh: true
        })
    );
}
