use super::{Canvas, PoseConsumer};
use crate::capture::VideoFrame;
use crate::pose::Pose;
use image::{Rgb, RgbImage};
use tracing::debug;

const AQUA: Rgb<u8> = Rgb([0, 255, 255]);
const LIME: Rgb<u8> = Rgb([0, 255, 0]);

/// Draws the camera frame and the hand skeleton onto a [`Canvas`].
pub struct SkeletonOverlay {
    canvas: Canvas,
    bone_color: Rgb<u8>,
    joint_color: Rgb<u8>,
    bone_width: u32,
    joint_radius: u32,
}

impl SkeletonOverlay {
    pub fn new(canvas: Canvas) -> Self {
        Self {
            canvas,
            bone_color: AQUA,
            joint_color: LIME,
            bone_width: 2,
            joint_radius: 5,
        }
    }

    fn paint(&self, image: &mut RgbImage, frame: &VideoFrame, pose: Option<&Pose>) {
        // The canvas follows the frame size, like a video element does.
        image.clone_from(&frame.image);
        let Some(pose) = pose else {
            return;
        };
        let (width, height) = image.dimensions();
        for (from, to) in pose.segments(width, height) {
            draw_line(image, from, to, self.bone_width, self.bone_color);
        }
        for landmark in pose.landmarks() {
            let center = landmark.to_pixel(width, height);
            fill_circle(image, center, self.joint_radius as f32, self.joint_color);
        }
    }
}

impl PoseConsumer for SkeletonOverlay {
    fn on_pose(&mut self, frame: &VideoFrame, pose: Option<&Pose>) {
        let canvas = self.canvas.clone();
        if !canvas.draw(|image| self.paint(image, frame, pose)) {
            debug!("Canvas detached, skipping frame {}", frame.sequence);
        }
    }
}

fn put_clipped(image: &mut RgbImage, x: i64, y: i64, color: Rgb<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < image.width() && (y as u32) < image.height() {
        image.put_pixel(x as u32, y as u32, color);
    }
}

fn draw_line(image: &mut RgbImage, from: (f32, f32), to: (f32, f32), width: u32, color: Rgb<u8>) {
    let half = width as f32 / 2.0;
    let min = (-half, -half);
    let max = (image.width() as f32 + half, image.height() as f32 + half);
    let Some((from, to)) = clip_segment(from, to, min, max) else {
        return;
    };
    let (dx, dy) = (to.0 - from.0, to.1 - from.1);
    let steps = dx.abs().max(dy.abs()).ceil().max(1.0) as u32;
    for step in 0..=steps {
        let t = step as f32 / steps as f32;
        fill_circle(image, (from.0 + dx * t, from.1 + dy * t), half, color);
    }
}

/// Liang-Barsky clip against the box `min..=max`. `None` when the segment
/// misses the box or an endpoint is not finite.
fn clip_segment(
    from: (f32, f32),
    to: (f32, f32),
    min: (f32, f32),
    max: (f32, f32),
) -> Option<((f32, f32), (f32, f32))> {
    let (dx, dy) = (to.0 - from.0, to.1 - from.1);
    if !(dx.is_finite() && dy.is_finite()) {
        return None;
    }
    let (mut enter, mut exit) = (0.0f32, 1.0f32);
    for (p, q) in [
        (-dx, from.0 - min.0),
        (dx, max.0 - from.0),
        (-dy, from.1 - min.1),
        (dy, max.1 - from.1),
    ] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            enter = enter.max(r);
        } else {
            exit = exit.min(r);
        }
        if enter > exit {
            return None;
        }
    }
    Some((
        (from.0 + dx * enter, from.1 + dy * enter),
        (from.0 + dx * exit, from.1 + dy * exit),
    ))
}

fn fill_circle(image: &mut RgbImage, center: (f32, f32), radius: f32, color: Rgb<u8>) {
    let outside = |c: f32, limit: u32| !(-radius..=limit as f32 + radius).contains(&c);
    if outside(center.0, image.width()) || outside(center.1, image.height()) {
        return;
    }
    let reach = radius.ceil() as i64;
    let (cx, cy) = (center.0.round() as i64, center.1.round() as i64);
    for oy in -reach..=reach {
        for ox in -reach..=reach {
            if ((ox * ox + oy * oy) as f32) <= radius * radius {
                put_clipped(image, cx + ox, cy + oy, color);
            }
        }
    }
}
