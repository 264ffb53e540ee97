pub mod commands;
pub mod controller;
pub mod gate;
pub mod state;

pub use controller::{
    CaptureController, CaptureOutcome, CaptureSnapshot, ControllerOptions, DropReason, InFlight,
    UploadOutcome,
};
pub use gate::{DispatchGate, DispatchPermit};
pub use state::{CaptureMode, CaptureState};
