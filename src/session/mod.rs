//! Session lifecycle: state machine, events and the controller driving them.

pub mod controller;
pub mod events;
pub mod state;

pub use controller::SessionController;
pub use events::TrackerEvent;
pub use state::{SessionState, TrackerSnapshot};
