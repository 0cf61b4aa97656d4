//! Robot haul simulation core.
//!
//! A population of robots repeatedly claims items, carries them to random
//! drop points, and idles for a random cooldown. Each frame runs a fixed
//! pipeline of data-parallel stages over a `bevy_ecs` world; structural
//! changes made by parallel workers go through an ordered deferred mutation
//! buffer so every run with the same inputs produces the same world.

pub mod api;
pub mod commands;
pub mod components;
pub mod config;
pub mod profiler;
pub mod systems;
pub mod world;

pub use api::SimWorld;
pub use commands::{ComponentKind, ComponentValue, Mutation, MutationBuffer, ParallelWriter, PlaybackStats};
pub use components::*;
pub use config::{ConfigError, ConfigOverride, ConfigResolution, SpawnConfig};
pub use profiler::{Profiler, StressProfiler};
pub use systems::*;
pub use world::{ItemSnapshot, RobotSnapshot, Snapshot};
