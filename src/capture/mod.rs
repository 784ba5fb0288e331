mod frame;
mod test_pattern;

pub use frame::VideoFrame;
pub use test_pattern::{TEST_PATTERN_DEVICE, TestPatternCamera};

use tokio::sync::broadcast;

/// A live frame source owned by the caller.
///
/// Every produced frame is announced with a tick carrying its sequence
/// number. Dropping the receiver returned by [`MediaSource::subscribe`] is the
/// unsubscribe.
pub trait MediaSource: Send + Sync + 'static {
    fn is_ready(&self) -> bool;

    /// The most recent frame, or `None` when the source stopped producing.
    fn current_frame(&self) -> Option<VideoFrame>;

    fn subscribe(&self) -> broadcast::Receiver<u64>;

    fn subscriber_count(&self) -> usize;
}
