mod adapter;
mod gate;

pub use adapter::{AdapterState, AdapterStats, FrameAdmissionAdapter};
pub use gate::{AdmissionGate, AdmissionPermit};
