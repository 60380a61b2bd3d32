//! # Reinhardt Polymodels Test
//!
//! Testing utilities for polymorphic models.
//!
//! - [`MemoryEngine`]: an in-memory [`QueryEngine`](reinhardt_polymorphic::QueryEngine)
//!   that counts round trips
//! - [`zoo`]: the Animal/Mammal/Monkey/Snake model family
//! - [`fixtures`]: rstest fixtures wiring them together
//! - [`logging`]: `tracing` output for tests

pub mod engine;
pub mod fixtures;
pub mod logging;
pub mod zoo;

pub use engine::{MemoryEngine, Relation};
pub use fixtures::{Zoo, ZooRows, zoo_env};
pub use logging::init_test_logging;
