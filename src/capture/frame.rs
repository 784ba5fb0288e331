use chrono::{DateTime, Utc};
use image::RgbImage;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub image: Arc<RgbImage>,
    pub sequence: u64,
    pub captured_at: DateTime<Utc>,
    pub id: Uuid,
}

impl VideoFrame {
    pub fn new(sequence: u64, image: RgbImage) -> Self {
        Self {
            image: Arc::new(image),
            sequence,
            captured_at: Utc::now(),
            id: Uuid::new_v4(),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}
