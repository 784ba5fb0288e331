use image::RgbImage;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct Surface {
    image: Option<RgbImage>,
    writes: u64,
    rejected_writes: u64,
}

/// Caller-owned render target shared with the overlay.
///
/// Once [`Canvas::detach`] has torn the surface down every draw is refused.
#[derive(Debug, Clone)]
pub struct Canvas {
    surface: Arc<Mutex<Surface>>,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            surface: Arc::new(Mutex::new(Surface {
                image: Some(RgbImage::new(width, height)),
                ..Surface::default()
            })),
        }
    }

    fn surface(&self) -> MutexGuard<'_, Surface> {
        self.surface.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `paint` against the surface. Returns `false` when detached.
    pub fn draw(&self, paint: impl FnOnce(&mut RgbImage)) -> bool {
        let mut surface = self.surface();
        let Surface {
            image,
            writes,
            rejected_writes,
        } = &mut *surface;
        match image {
            Some(image) => {
                paint(image);
                *writes += 1;
                true
            }
            None => {
                *rejected_writes += 1;
                false
            }
        }
    }

    pub fn detach(&self) {
        self.surface().image = None;
    }

    pub fn is_attached(&self) -> bool {
        self.surface().image.is_some()
    }

    pub fn snapshot(&self) -> Option<RgbImage> {
        self.surface().image.clone()
    }

    pub fn writes(&self) -> u64 {
        self.surface().writes
    }

    pub fn rejected_writes(&self) -> u64 {
        self.surface().rejected_writes
    }
}
