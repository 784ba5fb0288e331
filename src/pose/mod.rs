mod landmark;

pub use landmark::{HAND_CONNECTIONS, HandLandmark, Handedness, LANDMARK_COUNT, Landmark, Pose};
