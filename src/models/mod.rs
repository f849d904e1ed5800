pub mod activity;
pub mod sample;
pub mod session;

pub use activity::ActivityType;
pub use sample::LocationSample;
pub use session::{SessionRecord, SessionStatus};
