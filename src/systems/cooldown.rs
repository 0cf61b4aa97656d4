//! Cooldown countdown - returns robots to the idle pool.

use super::{dispatch, run_stage, DeltaTime};
use crate::commands::{ComponentKind, MutationBuffer};
use crate::components::*;
use bevy_ecs::prelude::*;
use tracing::debug;

/// Stage name used for spans and profiling.
pub const ROBOT_COOLDOWN_STAGE: &str = "robot_cooldown";

#[derive(Debug, Clone, Copy)]
struct CooldownJob {
    entity: Entity,
    time_left: f32,
    expired: bool,
}

/// System that subtracts delta time from every [`Cooldown`] and removes the
/// component once the remaining time is negative.
pub fn robot_cooldown_system(world: &mut World) {
    run_stage(world, ROBOT_COOLDOWN_STAGE, |world| {
        let delta = world.get_resource::<DeltaTime>().map(|d| d.0).unwrap_or(0.0);

        let mut query = world.query::<(Entity, &Cooldown)>();
        let mut jobs: Vec<CooldownJob> = query
            .iter(world)
            .map(|(entity, cooldown)| CooldownJob {
                entity,
                time_left: cooldown.time_left,
                expired: false,
            })
            .collect();
        if jobs.is_empty() {
            return;
        }

        let mut buffer = MutationBuffer::new();
        let writer = buffer.writer();
        dispatch(&mut jobs, |index, job| {
            job.time_left -= delta;
            if job.time_left < 0.0 {
                job.expired = true;
                writer.record(index as u32, |cmds| {
                    cmds.remove(job.entity, ComponentKind::Cooldown);
                });
            }
        });

        for job in &jobs {
            if let Some(mut cooldown) = world.get_mut::<Cooldown>(job.entity) {
                cooldown.time_left = job.time_left;
            }
        }
        let stats = buffer.playback(world);
        debug!(
            cooling = jobs.len(),
            expired = jobs.iter().filter(|job| job.expired).count(),
            skipped = stats.skipped,
            "cooldown countdown"
        );
    });
}
