//! Controller layer: session bootstrap, recurring tasks and command routing.

pub mod events;
pub mod orchestration;

pub use events::ControllerError;
pub use orchestration::{Controller, ControllerOptions};
