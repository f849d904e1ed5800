//! Periodic, cancellable location sampling.

mod controller;
mod loop_worker;

pub use controller::{ErrorCallback, LocationSampler, SampleCallback, SamplerHandle};
