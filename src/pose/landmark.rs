use crate::error::PoseError;
use serde::{Deserialize, Serialize};

pub const LANDMARK_COUNT: usize = 21;

/// Bone segments between landmarks, one finger at a time from the wrist.
pub const HAND_CONNECTIONS: [(usize, usize); 20] = [
    (0, 1),
    (1, 2),
    (2, 3),
    (3, 4), // thumb
    (0, 5),
    (5, 6),
    (6, 7),
    (7, 8), // index
    (0, 9),
    (9, 10),
    (10, 11),
    (11, 12), // middle
    (0, 13),
    (13, 14),
    (14, 15),
    (15, 16), // ring
    (0, 17),
    (17, 18),
    (18, 19),
    (19, 20), // pinky
];

/// Landmark labels in detector output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandLandmark {
    Wrist = 0,
    ThumbCmc,
    ThumbMcp,
    ThumbIp,
    ThumbTip,
    IndexMcp,
    IndexPip,
    IndexDip,
    IndexTip,
    MiddleMcp,
    MiddlePip,
    MiddleDip,
    MiddleTip,
    RingMcp,
    RingPip,
    RingDip,
    RingTip,
    PinkyMcp,
    PinkyPip,
    PinkyDip,
    PinkyTip,
}

impl HandLandmark {
    pub fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Handedness {
    Left,
    Right,
}

/// Normalized image coordinates; `z` is depth relative to the wrist.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// Position in pixels for an image of the given size.
    pub fn to_pixel(&self, width: u32, height: u32) -> (f32, f32) {
        (self.x * width as f32, self.y * height as f32)
    }
}

/// One frame's detected hand skeleton.
#[derive(Debug, Clone, PartialEq)]
pub struct Pose {
    landmarks: [Landmark; LANDMARK_COUNT],
    score: f32,
    handedness: Option<Handedness>,
}

impl Pose {
    pub fn new(landmarks: [Landmark; LANDMARK_COUNT], score: f32) -> Self {
        Self {
            landmarks,
            score,
            handedness: None,
        }
    }

    pub fn from_landmarks(landmarks: Vec<Landmark>, score: f32) -> Result<Self, PoseError> {
        if let Some(index) = landmarks.iter().position(|landmark| !landmark.is_finite()) {
            return Err(PoseError::NonFinite { index });
        }
        let actual = landmarks.len();
        let landmarks: [Landmark; LANDMARK_COUNT] =
            landmarks.try_into().map_err(|_| PoseError::LandmarkCount {
                expected: LANDMARK_COUNT,
                actual,
            })?;
        Ok(Self::new(landmarks, score))
    }

    pub fn with_handedness(mut self, handedness: Handedness) -> Self {
        self.handedness = Some(handedness);
        self
    }

    pub fn landmarks(&self) -> &[Landmark; LANDMARK_COUNT] {
        &self.landmarks
    }

    pub fn landmark(&self, label: HandLandmark) -> Landmark {
        self.landmarks[label.index()]
    }

    pub fn score(&self) -> f32 {
        self.score
    }

    pub fn handedness(&self) -> Option<Handedness> {
        self.handedness
    }

    /// Bone segments as pixel-space line endpoints.
    pub fn segments(
        &self,
        width: u32,
        height: u32,
    ) -> impl Iterator<Item = ((f32, f32), (f32, f32))> + '_ {
        HAND_CONNECTIONS.iter().map(move |&(from, to)| {
            (
                self.landmarks[from].to_pixel(width, height),
                self.landmarks[to].to_pixel(width, height),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn straight_hand() -> Vec<Landmark> {
        (0..LANDMARK_COUNT)
            .map(|i| Landmark::new(0.5, 1.0 - i as f32 * 0.04, 0.0))
            .collect()
    }

    #[test]
    fn test_pose_requires_exactly_21_landmarks() {
        let mut landmarks = straight_hand();
        landmarks.pop();
        assert_eq!(
            Pose::from_landmarks(landmarks, 0.9),
            Err(PoseError::LandmarkCount {
                expected: 21,
                actual: 20
            })
        );

        let pose = Pose::from_landmarks(straight_hand(), 0.9).unwrap();
        assert_eq!(pose.landmarks().len(), LANDMARK_COUNT);
    }

    #[test]
    fn test_pose_rejects_non_finite_coordinates() {
        let mut landmarks = straight_hand();
        landmarks[7].y = f32::NAN;
        assert_eq!(
            Pose::from_landmarks(landmarks, 0.9),
            Err(PoseError::NonFinite { index: 7 })
        );
    }

    #[test]
    fn test_labels_index_into_detector_order() {
        let pose = Pose::from_landmarks(straight_hand(), 0.9).unwrap();
        assert_eq!(pose.landmark(HandLandmark::Wrist), pose.landmarks()[0]);
        assert_eq!(pose.landmark(HandLandmark::PinkyTip), pose.landmarks()[20]);
        assert_eq!(HandLandmark::IndexTip.index(), 8);
    }

    #[test]
    fn test_connections_cover_every_landmark() {
        let mut seen = [false; LANDMARK_COUNT];
        for (from, to) in HAND_CONNECTIONS {
            seen[from] = true;
            seen[to] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }

    #[test]
    fn test_segments_scale_to_pixels() {
        let pose = Pose::from_landmarks(straight_hand(), 0.9).unwrap();
        let first = pose.segments(640, 480).next().unwrap();
        assert_eq!(first.0, (320.0, 480.0));
        assert!((first.1 .1 - 460.8).abs() < 1e-3);
    }
}
