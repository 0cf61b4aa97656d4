//! Drop movement - walks loaded robots to their drop point and unloads them.

use super::{
    dispatch, random_position_around, run_stage, step_toward, worker_rng, DeltaTime, EntityLookup,
    StageSeeds, ARRIVAL_DISTANCE_SQ, DROPPED_ITEM_SCALE, DROP_SCATTER_SCALE, MAX_COOLDOWN_SECS,
};
use crate::commands::{ComponentKind, ComponentValue, MutationBuffer};
use crate::components::*;
use crate::config::SpawnConfig;
use bevy_ecs::prelude::*;
use rand::Rng;
use tracing::debug;

/// Stage name used for spans and profiling.
pub const ROBOT_DROP_STAGE: &str = "robot_move_to_drop";

#[derive(Debug, Clone, Copy)]
struct DropJob {
    robot: Entity,
    translation: Vec3,
    target: Vec3,
    arrived: bool,
}

/// System that moves robots holding a [`DropTarget`] toward it.
///
/// On arrival every child is unparented, loses [`AttachedToRobot`] and is
/// placed at a random spot around the robot. The robot then gets a random
/// [`Cooldown`] and loses its drop target, whether or not it carried anything.
///
/// ## Data Access
/// - Reads: DropTarget, Children, SpawnConfig, DeltaTime
/// - Writes: robot Transform
/// - Deferred: Parent/Children, AttachedToRobot, item Transform, Cooldown, DropTarget
pub fn robot_move_to_drop_system(world: &mut World) {
    run_stage(world, ROBOT_DROP_STAGE, |world| {
        let Some(speed) = world.get_resource::<SpawnConfig>().map(|c| c.robot_speed) else {
            return;
        };
        let delta = world.get_resource::<DeltaTime>().map(|d| d.0).unwrap_or(0.0);
        let seed_offset = world
            .get_resource_or_insert_with(StageSeeds::default)
            .advance_drop();

        // GATHER
        let mut query = world.query_filtered::<(Entity, &Transform, &DropTarget), With<Robot>>();
        let mut jobs: Vec<DropJob> = query
            .iter(world)
            .map(|(robot, transform, target)| DropJob {
                robot,
                translation: transform.translation,
                target: target.position,
                arrived: false,
            })
            .collect();
        if jobs.is_empty() {
            return;
        }

        // COMPUTE
        let mut buffer = MutationBuffer::new();
        let writer = buffer.writer();
        let lookup = EntityLookup::new(world);
        dispatch(&mut jobs, |index, job| {
            if job.target.distance_squared(job.translation) >= ARRIVAL_DISTANCE_SQ {
                job.translation = step_toward(job.translation, job.target, speed, delta);
                return;
            }

            let mut rng = worker_rng(seed_offset, index);
            writer.record(index as u32, |cmds| {
                for &child in lookup.children(job.robot) {
                    let position = random_position_around(&mut rng, job.translation, DROP_SCATTER_SCALE);
                    cmds.remove_parent(child)
                        .remove(child, ComponentKind::AttachedToRobot)
                        .set_transform(
                            child,
                            Transform::from_translation(position).with_scale(DROPPED_ITEM_SCALE),
                        );
                }

                let time_left = rng.gen::<f32>() * MAX_COOLDOWN_SECS;
                cmds.insert(job.robot, ComponentValue::Cooldown(Cooldown { time_left }))
                    .remove(job.robot, ComponentKind::DropTarget);
            });
            job.arrived = true;
        });

        // APPLY
        for job in jobs.iter().filter(|job| !job.arrived) {
            if let Some(mut transform) = world.get_mut::<Transform>(job.robot) {
                transform.translation = job.translation;
            }
        }
        let stats = buffer.playback(world);
        debug!(
            robots = jobs.len(),
            dropped = jobs.iter().filter(|job| job.arrived).count(),
            skipped = stats.skipped,
            "drop movement"
        );
    });
}
