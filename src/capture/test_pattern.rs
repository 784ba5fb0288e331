use super::{MediaSource, VideoFrame};
use crate::config::CameraConfig;
use crate::error::StartupError;
use image::{Rgb, RgbImage};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub const TEST_PATTERN_DEVICE: &str = "test-pattern";

const TICK_CAPACITY: usize = 16;

struct Shared {
    latest: Mutex<Option<VideoFrame>>,
    ready: AtomicBool,
    tick_tx: broadcast::Sender<u64>,
}

/// Synthetic camera producing a scrolling gradient at a fixed frame rate.
pub struct TestPatternCamera {
    shared: Arc<Shared>,
    cancel_token: CancellationToken,
    producer_task: tokio::task::JoinHandle<()>,
}

impl TestPatternCamera {
    /// Must be called from within a tokio runtime. The first frame is
    /// available when this returns.
    pub fn start(config: &CameraConfig) -> Result<Self, StartupError> {
        if config.device != TEST_PATTERN_DEVICE {
            return Err(StartupError::NoDevice(config.device.clone()));
        }
        if !config.is_supported_mode() {
            return Err(StartupError::InvalidCameraMode {
                width: config.width,
                height: config.height,
                fps: config.fps,
            });
        }

        let (tick_tx, _) = broadcast::channel(TICK_CAPACITY);
        let shared = Arc::new(Shared {
            latest: Mutex::new(Some(render_pattern(0, config.width, config.height))),
            ready: AtomicBool::new(true),
            tick_tx,
        });
        let cancel_token = CancellationToken::new();
        let producer_task = Self::start_producer(
            shared.clone(),
            config.clone(),
            cancel_token.clone(),
        );

        info!(
            "Test pattern camera started at {}x{}@{}fps",
            config.width, config.height, config.fps
        );
        Ok(Self {
            shared,
            cancel_token,
            producer_task,
        })
    }

    fn start_producer(
        shared: Arc<Shared>,
        config: CameraConfig,
        cancel_token: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let period = Duration::from_secs(1) / config.fps;
            let mut interval = time::interval_at(time::Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut sequence = 0u64;
            loop {
                tokio::select! {
                    biased;
                    _ = cancel_token.cancelled() => break,
                    _ = interval.tick() => {
                        sequence += 1;
                        let frame = render_pattern(sequence, config.width, config.height);
                        *shared.latest.lock().unwrap_or_else(PoisonError::into_inner) = Some(frame);
                        // No subscribers is not an error for a camera.
                        let _ = shared.tick_tx.send(sequence);
                    }
                }
            }
            debug!("Test pattern producer finished after {} frames", sequence);
        })
    }

    pub fn stop(&self) {
        if self.shared.ready.swap(false, Ordering::SeqCst) {
            info!("Stopping test pattern camera");
        }
        self.cancel_token.cancel();
        *self
            .shared
            .latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn is_producing(&self) -> bool {
        !self.producer_task.is_finished()
    }
}

impl MediaSource for TestPatternCamera {
    fn is_ready(&self) -> bool {
        self.shared.ready.load(Ordering::SeqCst)
    }

    fn current_frame(&self) -> Option<VideoFrame> {
        if !self.is_ready() {
            return None;
        }
        self.shared
            .latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn subscribe(&self) -> broadcast::Receiver<u64> {
        self.shared.tick_tx.subscribe()
    }

    fn subscriber_count(&self) -> usize {
        self.shared.tick_tx.receiver_count()
    }
}

impl Drop for TestPatternCamera {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

fn render_pattern(sequence: u64, width: u32, height: u32) -> VideoFrame {
    let shift = sequence % 256;
    let (w, h) = (u64::from(width.max(1)), u64::from(height.max(1)));
    let image = RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            ((u64::from(x) * 255 / w + shift) % 256) as u8,
            (u64::from(y) * 255 / h % 256) as u8,
            (shift * 3 % 256) as u8,
        ])
    });
    VideoFrame::new(sequence, image)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_camera(fps: u32) -> CameraConfig {
        CameraConfig {
            device: TEST_PATTERN_DEVICE.to_string(),
            width: 8,
            height: 6,
            fps,
        }
    }

    #[tokio::test]
    async fn test_unknown_device_is_a_startup_error() {
        let config = CameraConfig {
            device: "/dev/video9".to_string(),
            ..small_camera(30)
        };
        assert_eq!(
            TestPatternCamera::start(&config).err(),
            Some(StartupError::NoDevice("/dev/video9".to_string()))
        );
    }

    #[tokio::test]
    async fn test_zero_fps_is_rejected() {
        assert!(matches!(
            TestPatternCamera::start(&small_camera(0)),
            Err(StartupError::InvalidCameraMode { fps: 0, .. })
        ));
    }

    #[tokio::test]
    async fn test_out_of_range_modes_are_rejected() {
        for config in [
            small_camera(2_000_000_000),
            CameraConfig {
                width: 17_000_000,
                ..small_camera(30)
            },
            CameraConfig {
                height: CameraConfig::MAX_DIMENSION + 1,
                ..small_camera(30)
            },
        ] {
            assert!(matches!(
                TestPatternCamera::start(&config),
                Err(StartupError::InvalidCameraMode { .. })
            ));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fastest_supported_rate_keeps_ticking() {
        let camera = TestPatternCamera::start(&small_camera(CameraConfig::MAX_FPS)).unwrap();
        let mut ticks = camera.subscribe();
        assert_eq!(ticks.recv().await.unwrap(), 1);
        assert_eq!(ticks.recv().await.unwrap(), 2);
        assert!(camera.is_producing());
    }

    #[test]
    fn test_pattern_handles_wide_frames() {
        let frame = render_pattern(7, 20_000, 1);
        assert_eq!(frame.width(), 20_000);
        assert_eq!(frame.sequence, 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_follow_frame_rate() {
        let camera = TestPatternCamera::start(&small_camera(10)).unwrap();
        assert!(camera.is_ready());
        assert_eq!(camera.current_frame().unwrap().sequence, 0);

        let mut ticks = camera.subscribe();
        assert_eq!(camera.subscriber_count(), 1);
        assert_eq!(ticks.recv().await.unwrap(), 1);
        assert_eq!(ticks.recv().await.unwrap(), 2);

        let frame = camera.current_frame().unwrap();
        assert!(frame.sequence >= 2);
        assert_eq!((frame.width(), frame.height()), (8, 6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_ends_production() {
        let camera = TestPatternCamera::start(&small_camera(30)).unwrap();
        let mut ticks = camera.subscribe();
        ticks.recv().await.unwrap();

        camera.stop();
        assert!(!camera.is_ready());
        assert!(camera.current_frame().is_none());
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!camera.is_producing());
    }
}
