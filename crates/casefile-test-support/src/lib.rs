//! Shared test mocks and utilities for the Casefile mystery game engine.

mod clock;
mod generation;
mod repository;
mod rng;

pub use clock::{FixedClock, ManualClock};
pub use generation::{
    FailingGenerator, FailingImageProducer, RoleGenerator, ScriptedGenerator, StaticImageProducer,
};
pub use repository::{FailingStore, InMemoryStore};
pub use rng::SequenceRng;
