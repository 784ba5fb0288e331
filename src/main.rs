use signpose::config::DEFAULT_CONFIG_FILE;
use signpose::render::PoseSample;
use signpose::{
    AppError, Canvas, ClassifierClient, Configuration, FrameAdmissionAdapter, LatestPose,
    PoseFanout, RecognitionSession, ReplayDetector, SkeletonOverlay, StartupError,
    TestPatternCamera, TrainingSession,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Level, error, info, warn};

fn init_logging(level: &str) {
    let level = level.parse::<Level>().unwrap_or(Level::INFO);
    tracing_subscriber::fmt().with_max_level(level).init();
}

async fn run_timer(seconds: u64) {
    if seconds == 0 {
        std::future::pending::<()>().await;
    } else {
        tokio::time::sleep(Duration::from_secs(seconds)).await;
    }
}

async fn spawn_remote_task(
    configuration: &Configuration,
    latest: watch::Receiver<Option<PoseSample>>,
    cancel_token: CancellationToken,
) -> Result<Option<JoinHandle<()>>, AppError> {
    if !configuration.classifier.enabled {
        return Ok(None);
    }
    let client = ClassifierClient::new(&configuration.classifier)?;
    match client.ping().await {
        Ok(true) => info!("Classification service reachable at {}", client.base_url()),
        Ok(false) => warn!("Classification service at {} answered unexpectedly", client.base_url()),
        Err(e) => {
            error!("Classification service unavailable: {}", e);
            return Ok(None);
        }
    }

    let handle = match &configuration.training.label {
        Some(label) => {
            let mut session = TrainingSession::new(
                configuration.classifier.domain,
                label,
                configuration.training.target_samples,
            )?;
            tokio::spawn(async move { session.run(&client, latest, cancel_token).await })
        }
        None => {
            let mut session = RecognitionSession::new(client, &configuration.classifier);
            tokio::spawn(async move { session.run(latest, cancel_token).await })
        }
    };
    Ok(Some(handle))
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let configuration = Configuration::load(DEFAULT_CONFIG_FILE)?;
    init_logging(&configuration.log_level);

    let recording = configuration.detector.recording.clone().ok_or_else(|| {
        StartupError::DetectorUnavailable("no recording configured (detector.recording)".into())
    })?;
    let detector = ReplayDetector::open(&recording, configuration.detector.clone())?;
    let camera = Arc::new(TestPatternCamera::start(&configuration.camera)?);

    let canvas = Canvas::new(configuration.camera.width, configuration.camera.height);
    let (latest, latest_rx) = LatestPose::new();
    let fanout = PoseFanout::new()
        .with_consumer(SkeletonOverlay::new(canvas.clone()))
        .with_consumer(latest);

    let mut adapter = FrameAdmissionAdapter::new(detector, configuration.detector.clone());
    adapter.start(camera.clone(), fanout)?;

    let cancel_token = CancellationToken::new();
    let remote = spawn_remote_task(&configuration, latest_rx, cancel_token.clone()).await?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Interrupted, shutting down"),
        _ = run_timer(configuration.run_seconds) => info!("Run time elapsed, shutting down"),
    }

    cancel_token.cancel();
    if let Some(handle) = remote {
        if let Err(e) = handle.await {
            warn!("Remote task ended abnormally: {}", e);
        }
    }
    adapter.stop().await?;
    canvas.detach();
    camera.stop();

    let stats = adapter.stats();
    info!(
        "Ticks: {}, admitted: {}, dropped while busy: {}, delivered: {}, failures: {}, overlay writes: {}",
        stats.ticks(),
        stats.admitted(),
        stats.dropped_in_flight(),
        stats.delivered(),
        stats.detection_failures(),
        canvas.writes()
    );
    Ok(())
}
