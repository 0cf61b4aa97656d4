//! One-time spawner for the robot and item population.

use super::{random_position_on_map, run_stage};
use crate::components::*;
use crate::config::{ConfigResolution, SpawnConfig};
use bevy_ecs::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;

/// Stage name used for spans and profiling.
pub const SPAWNER_STAGE: &str = "spawner";

/// Marker resource inserted once the spawner has run.
#[derive(Resource, Debug, Clone, Copy, Default)]
pub struct SpawnerDone;

/// System that creates `count` items and `count` robots.
///
/// Waits until both [`SpawnConfig`] and [`ConfigResolution`] exist, applies the
/// file override if there is one, then spawns items followed by robots from a
/// single generator seeded with `SpawnConfig::seed`. Inserts [`SpawnerDone`]
/// so it never runs again.
pub fn spawner_system(world: &mut World) {
    if world.contains_resource::<SpawnerDone>() {
        return;
    }
    run_stage(world, SPAWNER_STAGE, |world| {
        let Some(resolution) = world.get_resource::<ConfigResolution>().cloned() else {
            return;
        };
        let Some(mut config) = world.get_resource::<SpawnConfig>().cloned() else {
            return;
        };
        if let Some(file) = &resolution.0 {
            config.apply_override(file);
            world.insert_resource(config.clone());
        }

        let mut rng = StdRng::seed_from_u64(config.seed);
        let items: Vec<ItemBundle> = (0..config.count)
            .map(|_| ItemBundle::at(random_position_on_map(&mut rng, config.max_size)))
            .collect();
        let robots: Vec<RobotBundle> = (0..config.count)
            .map(|_| RobotBundle::at(random_position_on_map(&mut rng, config.max_size)))
            .collect();

        let item_count = world.spawn_batch(items).count();
        let robot_count = world.spawn_batch(robots).count();
        world.insert_resource(SpawnerDone);

        info!(
            items = item_count,
            robots = robot_count,
            max_size = config.max_size,
            robot_speed = config.robot_speed,
            overridden = resolution.0.is_some(),
            "spawned population"
        );
    });
}
