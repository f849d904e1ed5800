//! SQLite-backed workout store.

mod connection;
mod migrations;
pub mod models;
mod repositories;
mod store;

pub use connection::Database;
pub use models::{StoredPoint, StoredWorkout};
