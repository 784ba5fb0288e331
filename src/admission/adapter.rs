use super::gate::{AdmissionGate, AdmissionPermit};
use crate::capture::{MediaSource, VideoFrame};
use crate::config::DetectorOptions;
use crate::detector::LandmarkDetector;
use crate::error::{AppError, DetectionError, StartupError};
use crate::pose::Pose;
use crate::render::PoseConsumer;
use futures::future::BoxFuture;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, broadcast};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterState {
    Idle,
    Running,
    Stopped,
}

/// Admission counters, readable while the adapter runs.
#[derive(Debug, Default)]
pub struct AdapterStats {
    ticks: AtomicU64,
    admitted: AtomicU64,
    dropped_in_flight: AtomicU64,
    skipped_not_ready: AtomicU64,
    detection_failures: AtomicU64,
    delivered: AtomicU64,
}

impl AdapterStats {
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    pub fn admitted(&self) -> u64 {
        self.admitted.load(Ordering::Relaxed)
    }

    /// Ticks that arrived while a detection was outstanding.
    pub fn dropped_in_flight(&self) -> u64 {
        self.dropped_in_flight.load(Ordering::Relaxed)
    }

    pub fn skipped_not_ready(&self) -> u64 {
        self.skipped_not_ready.load(Ordering::Relaxed)
    }

    pub fn detection_failures(&self) -> u64 {
        self.detection_failures.load(Ordering::Relaxed)
    }

    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    fn bump(counter: &AtomicU64, by: u64) {
        counter.fetch_add(by, Ordering::Relaxed);
    }
}

struct Completion {
    permit: AdmissionPermit,
    frame: VideoFrame,
    result: Result<Option<Pose>, DetectionError>,
}

/// Feeds a ticking [`MediaSource`] into a [`LandmarkDetector`] with at most
/// one detection outstanding.
///
/// Ticks that arrive while a detection runs are dropped. Results go to the
/// [`PoseConsumer`] given to [`start`](Self::start); a failed detection is
/// delivered as "no hand" and the loop keeps going.
pub struct FrameAdmissionAdapter<D: LandmarkDetector> {
    detector: Arc<Mutex<D>>,
    options: DetectorOptions,
    gate: AdmissionGate,
    state: AdapterState,
    stats: Arc<AdapterStats>,
    cancel_token: CancellationToken,
    loop_task: Option<tokio::task::JoinHandle<()>>,
}

impl<D: LandmarkDetector> FrameAdmissionAdapter<D> {
    pub fn new(detector: D, options: DetectorOptions) -> Self {
        Self {
            detector: Arc::new(Mutex::new(detector)),
            options,
            gate: AdmissionGate::new(),
            state: AdapterState::Idle,
            stats: Arc::new(AdapterStats::default()),
            cancel_token: CancellationToken::new(),
            loop_task: None,
        }
    }

    /// Subscribes to `source` and spawns the admission loop. Must be called
    /// from within a tokio runtime.
    pub fn start<S, C>(&mut self, source: Arc<S>, consumer: C) -> Result<(), AppError>
    where
        S: MediaSource,
        C: PoseConsumer,
    {
        match self.state {
            AdapterState::Running => return Err(AppError::AlreadyStarted),
            AdapterState::Stopped => return Err(AppError::AdapterStopped),
            AdapterState::Idle => {}
        }
        if !source.is_ready() {
            return Err(StartupError::SourceNotReady.into());
        }

        let ticks = source.subscribe();
        let admission = AdmissionLoop {
            source,
            ticks,
            consumer,
            detector: self.detector.clone(),
            gate: self.gate.clone(),
            stats: self.stats.clone(),
            cancel_token: self.cancel_token.clone(),
            detect_timeout: self.options.detect_timeout(),
        };
        self.loop_task = Some(tokio::spawn(admission.run()));
        self.state = AdapterState::Running;
        info!("Frame admission adapter started");
        Ok(())
    }

    /// Stops admitting frames and tears everything down.
    ///
    /// A detection still running is awaited and its result discarded. When
    /// this returns the tick subscription, the source and the consumer have
    /// been dropped and the detector is closed. Calling it again is a no-op.
    pub async fn stop(&mut self) -> Result<(), AppError> {
        if self.state == AdapterState::Stopped {
            return Ok(());
        }
        self.state = AdapterState::Stopped;
        self.cancel_token.cancel();

        // The loop closes the detector on its way out; without a loop it is
        // closed here.
        let joined = match self.loop_task.take() {
            Some(task) => task.await.map_err(|e| AppError::Task(e.to_string())),
            None => {
                close_detector(&self.detector).await;
                Ok(())
            }
        };
        info!(
            "Frame admission adapter stopped: {} ticks, {} admitted, {} dropped, {} failed",
            self.stats.ticks(),
            self.stats.admitted(),
            self.stats.dropped_in_flight(),
            self.stats.detection_failures()
        );
        joined
    }

    pub fn state(&self) -> AdapterState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == AdapterState::Running
    }

    pub fn in_flight(&self) -> bool {
        self.gate.in_flight()
    }

    pub fn stats(&self) -> Arc<AdapterStats> {
        self.stats.clone()
    }
}

impl<D: LandmarkDetector> Drop for FrameAdmissionAdapter<D> {
    fn drop(&mut self) {
        // The loop task outlives the adapter long enough to close the detector.
        self.cancel_token.cancel();
    }
}

async fn close_detector<D: LandmarkDetector>(detector: &Mutex<D>) {
    let mut detector = detector.lock().await;
    match detector.close().await {
        Ok(()) => debug!("Closed {} detector", detector.name()),
        Err(e) => warn!("Failed to close {} detector: {}", detector.name(), e),
    }
}

struct AdmissionLoop<S, D, C> {
    source: Arc<S>,
    ticks: broadcast::Receiver<u64>,
    consumer: C,
    detector: Arc<Mutex<D>>,
    gate: AdmissionGate,
    stats: Arc<AdapterStats>,
    cancel_token: CancellationToken,
    detect_timeout: Duration,
}

impl<S, D, C> AdmissionLoop<S, D, C>
where
    S: MediaSource,
    D: LandmarkDetector,
    C: PoseConsumer,
{
    async fn run(mut self) {
        let mut in_flight: Option<BoxFuture<'static, Completion>> = None;
        let mut ticks_open = true;

        loop {
            tokio::select! {
                biased;
                _ = self.cancel_token.cancelled() => break,
                completion = async {
                    match in_flight.as_mut() {
                        Some(detection) => detection.await,
                        None => std::future::pending().await,
                    }
                }, if in_flight.is_some() => {
                    in_flight = None;
                    self.complete(completion);
                }
                tick = self.ticks.recv(), if ticks_open => match tick {
                    Ok(sequence) => {
                        if let Some(detection) = self.on_tick(sequence) {
                            in_flight = Some(detection);
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        AdapterStats::bump(&self.stats.ticks, missed);
                        AdapterStats::bump(&self.stats.dropped_in_flight, missed);
                        debug!("Missed {} ticks while busy", missed);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!("Media source closed its tick channel");
                        ticks_open = false;
                    }
                },
            }
        }

        // The detector has no cancellation primitive: let the outstanding
        // call finish, but deliver nothing.
        if let Some(detection) = in_flight {
            let Completion { permit, frame, .. } = detection.await;
            drop(permit);
            debug!("Discarded detection for frame {} after stop", frame.sequence);
        }

        let AdmissionLoop {
            source,
            ticks,
            consumer,
            detector,
            ..
        } = self;
        drop((ticks, source, consumer));
        close_detector(&detector).await;
    }

    #[instrument(level = "trace", skip(self))]
    fn on_tick(&mut self, sequence: u64) -> Option<BoxFuture<'static, Completion>> {
        AdapterStats::bump(&self.stats.ticks, 1);
        if self.cancel_token.is_cancelled() {
            return None;
        }
        let Some(permit) = self.gate.try_admit() else {
            AdapterStats::bump(&self.stats.dropped_in_flight, 1);
            debug!("Dropping tick {}: detection in flight", sequence);
            return None;
        };
        let frame = match self.source.is_ready() {
            true => self.source.current_frame(),
            false => None,
        };
        let Some(frame) = frame else {
            AdapterStats::bump(&self.stats.skipped_not_ready, 1);
            debug!("Skipping tick {}: source not ready", sequence);
            return None;
        };
        AdapterStats::bump(&self.stats.admitted, 1);

        let detector = self.detector.clone();
        let limit = self.detect_timeout;
        Some(Box::pin(async move {
            let mut detector = detector.lock_owned().await;
            let result = match tokio::time::timeout(limit, detector.detect(&frame)).await {
                Ok(result) => result,
                Err(_) => Err(DetectionError::Timeout(limit)),
            };
            Completion {
                permit,
                frame,
                result,
            }
        }))
    }

    fn complete(&mut self, completion: Completion) {
        let Completion {
            permit,
            frame,
            result,
        } = completion;
        // Free the slot before the consumer runs.
        drop(permit);

        if self.cancel_token.is_cancelled() {
            return;
        }
        let pose = match result {
            Ok(pose) => pose,
            Err(e) => {
                AdapterStats::bump(&self.stats.detection_failures, 1);
                warn!("Detection failed for frame {}: {}", frame.sequence, e);
                None
            }
        };
        AdapterStats::bump(&self.stats.delivered, 1);
        self.consumer.on_pose(&frame, pose.as_ref());
    }
}
