use std::{
    env,
    fs::{self, File},
    io::BufWriter,
    path::PathBuf,
    sync::Arc,
};

use anyhow::{bail, Context, Result};
use log::{info, warn};
use tokio::signal;

use xor_playground::{
    Canvas, MlpFactory, PlaygroundConfig, SampleSet, SessionStatus, ThreadFacility,
    TrainingScheduler, Update, Visualizer, WorkerFacility,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    env_logger::init();

    let path = env::args_os().nth(1).map(PathBuf::from);
    let config = PlaygroundConfig::from_env(path.as_deref()).context("failed to load config")?;

    let facility = config
        .parallel
        .then(|| Arc::new(ThreadFacility) as Arc<dyn WorkerFacility>);
    let mut scheduler = TrainingScheduler::new(MlpFactory::new(config.seed))
        .with_facility(facility)
        .with_config(config.scheduler_config());

    let samples = SampleSet::xor();
    let hp = config.hyperparameters;
    scheduler.create_model(
        samples.input_size(),
        hp.hidden_units,
        samples.output_size(),
        hp.learning_rate,
    )?;

    if let Some(dir) = &config.snapshot_dir {
        fs::create_dir_all(dir)
            .with_context(|| format!("cannot create snapshot dir {}", dir.display()))?;
    }

    let mut canvas = Canvas::new(config.width, config.height);
    let visualizer = Visualizer::default();
    let mut snapshots = 0;

    scheduler.start_training(hp, samples)?;

    let cancel = scheduler
        .cancel_handle()
        .context("session ended before it started")?;
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            info!("received SIGINT, cancelling training");
            cancel.cancel();
        }
    });

    while let Some(update) = scheduler.next_update().await {
        match &update {
            Update::Started { session, mode } => info!("session {session} training in {mode} mode"),
            Update::Progress { percent, refresh: true, .. } => info!("training... {percent}%"),
            _ => {}
        }

        if !update.refresh() {
            continue;
        }

        if let Err(e) = visualizer.render(&mut canvas, scheduler.model(), scheduler.sample_set()) {
            warn!("skipping refresh: {e}");
            continue;
        }

        if let Some(dir) = &config.snapshot_dir {
            let file = dir.join(format!("snapshot-{snapshots:03}.ppm"));
            File::create(&file)
                .and_then(|out| canvas.write_ppm(BufWriter::new(out)))
                .with_context(|| format!("cannot write {}", file.display()))?;
            snapshots += 1;
        }
    }

    match scheduler.session() {
        Some(session) if session.status() == SessionStatus::Completed => {
            info!(
                "training complete after {} epochs",
                session.hyperparameters().epochs
            );
            for sample in session.sample_set() {
                let output = scheduler.predict(&sample.inputs)?;
                println!(
                    "{:?} -> {:.4?} (target {:?})",
                    sample.inputs, output, sample.targets
                );
            }
        }
        Some(session) if session.status() == SessionStatus::Failed => {
            bail!("training failed: {}", session.error().unwrap_or("unknown error"));
        }
        _ => info!("training cancelled"),
    }

    Ok(())
}
