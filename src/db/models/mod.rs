pub mod workout;

pub use workout::{StoredPoint, StoredWorkout};
