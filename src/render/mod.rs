mod canvas;
mod latest;
mod overlay;

pub use canvas::Canvas;
pub use latest::{LatestPose, PoseSample};
pub use overlay::SkeletonOverlay;

use crate::capture::VideoFrame;
use crate::pose::Pose;

/// Receives the outcome of every completed detection, in completion order.
///
/// `pose` is `None` when no hand was found or the frame could not be
/// analyzed. Never invoked concurrently with itself.
pub trait PoseConsumer: Send + 'static {
    fn on_pose(&mut self, frame: &VideoFrame, pose: Option<&Pose>);
}

/// Forwards each pose to every registered consumer, in registration order.
#[derive(Default)]
pub struct PoseFanout {
    consumers: Vec<Box<dyn PoseConsumer>>,
}

impl PoseFanout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_consumer(mut self, consumer: impl PoseConsumer) -> Self {
        self.consumers.push(Box::new(consumer));
        self
    }

    pub fn len(&self) -> usize {
        self.consumers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.consumers.is_empty()
    }
}

impl PoseConsumer for PoseFanout {
    fn on_pose(&mut self, frame: &VideoFrame, pose: Option<&Pose>) {
        for consumer in &mut self.consumers {
            consumer.on_pose(frame, pose);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;
    use std::sync::{Arc, Mutex};

    struct Tagged {
        tag: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    impl PoseConsumer for Tagged {
        fn on_pose(&mut self, _frame: &VideoFrame, _pose: Option<&Pose>) {
            self.log.lock().unwrap().push(self.tag);
        }
    }

    #[test]
    fn test_fanout_preserves_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut fanout = PoseFanout::new()
            .with_consumer(Tagged {
                tag: "overlay",
                log: log.clone(),
            })
            .with_consumer(Tagged {
                tag: "state",
                log: log.clone(),
            });
        assert_eq!(fanout.len(), 2);

        let frame = VideoFrame::new(1, RgbImage::new(2, 2));
        fanout.on_pose(&frame, None);
        fanout.on_pose(&frame, None);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["overlay", "state", "overlay", "state"]
        );
    }
}
