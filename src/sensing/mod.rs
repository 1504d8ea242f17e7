pub mod controller;
pub mod loop_worker;
pub mod source;

pub use controller::CameraSession;
pub use loop_worker::{Collaborators, LoopReport};
pub use source::{
    load_replay, parse_replay, Frame, FrameSource, HandDetector, ReplayDetector, ReplayEntry,
    ReplaySource,
};
