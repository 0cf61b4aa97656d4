//! Public API for the simulation.
//!
//! `SimWorld` owns the ECS world and the frame schedule and is the only thing
//! a host (demo binary, benchmark, renderer) needs to drive the simulation.
//!
//! ## Frames
//!
//! `advance_frame(dt)` runs the whole pipeline once with the given delta time.
//! `step(dt)` accumulates wall time and runs as many fixed-timestep frames as
//! fit, using `SpawnConfig::fixed_timestep`.
//!
//! ## Startup
//!
//! The spawner runs on the first frame, once the configuration has been
//! resolved. Constructors resolve it immediately; `SimWorld::deferred` leaves
//! it pending until `resolve_config` is called.

use crate::components::*;
use crate::config::{resolve_override, ConfigOverride, ConfigResolution, SpawnConfig};
use crate::profiler::Profiler;
use crate::systems::*;
use crate::world::Snapshot;
use bevy_ecs::prelude::*;
use std::path::Path;

/// The main simulation world container.
pub struct SimWorld {
    world: World,
    schedule: Schedule,
    tick: u64,
    time: f32,
    /// Accumulated time for fixed timestep.
    time_accumulator: f32,
}

impl SimWorld {
    /// Create a simulation with `config` and no file override.
    pub fn new(config: SpawnConfig) -> Self {
        Self::with_override(config, None)
    }

    /// Create a simulation whose spawn values are replaced by `file` if given.
    pub fn with_override(config: SpawnConfig, file: Option<ConfigOverride>) -> Self {
        let mut sim = Self::deferred(config);
        sim.resolve_config(ConfigResolution(file));
        sim
    }

    /// Create a simulation, reading the override from `path` when it exists.
    /// Unreadable or malformed files fall back to `config`.
    pub fn from_config_file(config: SpawnConfig, path: &Path) -> Self {
        let mut sim = Self::deferred(config);
        sim.resolve_config(resolve_override(path));
        sim
    }

    /// Create a simulation whose spawner waits for [`SimWorld::resolve_config`].
    pub fn deferred(config: SpawnConfig) -> Self {
        let mut world = World::new();
        world.insert_resource(DeltaTime(config.fixed_timestep));
        world.insert_resource(StageSeeds::default());
        world.insert_resource(config);
        #[cfg(feature = "profile")]
        world.insert_resource(Profiler::new());

        // Stages run strictly in order; each flushes its mutations before the next gathers.
        let mut schedule = Schedule::default();
        schedule.add_systems(
            (
                spawner_system,
                robot_target_system,
                robot_move_to_carry_system,
                robot_move_to_drop_system,
                robot_cooldown_system,
            )
                .chain(),
        );

        Self {
            world,
            schedule,
            tick: 0,
            time: 0.0,
            time_accumulator: 0.0,
        }
    }

    /// Provide the configuration outcome that gates the spawner.
    pub fn resolve_config(&mut self, resolution: ConfigResolution) {
        self.world.insert_resource(resolution);
    }

    /// Run one frame of the pipeline with delta time `dt`.
    pub fn advance_frame(&mut self, dt: f32) {
        self.world.insert_resource(DeltaTime(dt));
        self.schedule.run(&mut self.world);
        if let Some(mut profiler) = self.world.get_resource_mut::<Profiler>() {
            profiler.end_frame();
        }
        self.tick += 1;
        self.time += dt;
    }

    /// Step the simulation forward by `dt` seconds of wall time using the
    /// fixed timestep. Returns the number of frames run.
    pub fn step(&mut self, dt: f32) -> u32 {
        let fixed_dt = self.world.resource::<SpawnConfig>().fixed_timestep;
        if fixed_dt <= 0.0 {
            self.advance_frame(dt);
            return 1;
        }

        self.time_accumulator += dt;
        let mut frames = 0;
        while self.time_accumulator >= fixed_dt {
            self.advance_frame(fixed_dt);
            self.time_accumulator -= fixed_dt;
            frames += 1;
        }
        frames
    }

    /// Start recording per-stage timings.
    pub fn enable_profiling(&mut self) {
        if !self.world.contains_resource::<Profiler>() {
            self.world.insert_resource(Profiler::new());
        }
    }

    pub fn profiler(&self) -> Option<&Profiler> {
        self.world.get_resource::<Profiler>()
    }

    /// Whether the one-time spawner has run.
    pub fn is_spawned(&self) -> bool {
        self.world.contains_resource::<SpawnerDone>()
    }

    /// Active spawn configuration (after any override was applied).
    pub fn config(&self) -> &SpawnConfig {
        self.world.resource::<SpawnConfig>()
    }

    pub fn robot_count(&mut self) -> usize {
        self.world
            .query_filtered::<Entity, With<Robot>>()
            .iter(&self.world)
            .count()
    }

    pub fn item_count(&mut self) -> usize {
        self.world
            .query_filtered::<Entity, With<ItemTarget>>()
            .iter(&self.world)
            .count()
    }

    pub fn robots(&mut self) -> Vec<Entity> {
        self.world
            .query_filtered::<Entity, With<Robot>>()
            .iter(&self.world)
            .collect()
    }

    pub fn items(&mut self) -> Vec<Entity> {
        self.world
            .query_filtered::<Entity, With<ItemTarget>>()
            .iter(&self.world)
            .collect()
    }

    pub fn idle_robots(&mut self) -> Vec<Entity> {
        idle_robots(&mut self.world)
    }

    pub fn unclaimed_items(&mut self) -> Vec<Entity> {
        unclaimed_items(&mut self.world)
    }

    /// Phase of `robot`, or `None` if it is not a live robot.
    pub fn robot_state(&self, robot: Entity) -> Option<RobotState> {
        self.world.get::<Robot>(robot)?;
        let has_children = self
            .world
            .get::<Children>(robot)
            .is_some_and(|c| !c.is_empty());
        Some(RobotState::classify(
            self.world.get::<CarryTarget>(robot).is_some(),
            self.world.get::<DropTarget>(robot).is_some(),
            self.world.get::<Cooldown>(robot).is_some(),
            has_children,
        ))
    }

    /// World-space position of any entity with a transform.
    pub fn position(&self, entity: Entity) -> Option<Vec3> {
        EntityLookup::new(&self.world).world_position(entity)
    }

    /// Get a snapshot of the current simulation state.
    pub fn snapshot(&mut self) -> Snapshot {
        Snapshot::from_world(&mut self.world, self.tick, self.time)
    }

    /// Get the snapshot as a JSON string.
    pub fn snapshot_json(&mut self) -> String {
        self.snapshot().to_json().unwrap_or_else(|_| "{}".to_string())
    }

    /// Get the current tick number.
    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    /// Get the elapsed simulation time.
    pub fn current_time(&self) -> f32 {
        self.time
    }

    /// Get direct access to the ECS world (for advanced usage).
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Get mutable access to the ECS world (for advanced usage).
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }
}

impl Default for SimWorld {
    fn default() -> Self {
        Self::new(SpawnConfig::default())
    }
}
