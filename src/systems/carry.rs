//! Carry movement - walks robots to their assigned item and picks it up.

use super::{
    dispatch, random_position_on_map, run_stage, step_toward, worker_rng, DeltaTime, EntityLookup,
    StageSeeds, ARRIVAL_DISTANCE_SQ, CARRIED_ITEM_OFFSET, CARRIED_ITEM_SCALE,
};
use crate::commands::{ComponentKind, ComponentValue, MutationBuffer};
use crate::components::*;
use crate::config::SpawnConfig;
use bevy_ecs::prelude::*;
use tracing::{debug, trace};

/// Stage name used for spans and profiling.
pub const ROBOT_CARRY_STAGE: &str = "robot_move_to_carry";

/// Per-robot work entry.
#[derive(Debug, Clone, Copy)]
struct CarryJob {
    robot: Entity,
    translation: Vec3,
    item: Entity,
    arrived: bool,
}

/// System that moves robots holding a [`CarryTarget`] toward the item.
///
/// On arrival the robot gets a random [`DropTarget`] inside the map, loses
/// its carry target, and the item is parented to it at a fixed local offset.
/// A target item that no longer resolves to a position is treated as not
/// yet reached.
///
/// ## Data Access
/// - Reads: CarryTarget, item world position, SpawnConfig, DeltaTime
/// - Writes: robot Transform
/// - Deferred: DropTarget, CarryTarget, Parent/Children, item Transform
pub fn robot_move_to_carry_system(world: &mut World) {
    run_stage(world, ROBOT_CARRY_STAGE, |world| {
        let Some(config) = world.get_resource::<SpawnConfig>().cloned() else {
            return;
        };
        let delta = world.get_resource::<DeltaTime>().map(|d| d.0).unwrap_or(0.0);
        let seed_offset = world
            .get_resource_or_insert_with(StageSeeds::default)
            .advance_carry();

        // GATHER
        let mut query = world.query_filtered::<(Entity, &Transform, &CarryTarget), With<Robot>>();
        let mut jobs: Vec<CarryJob> = query
            .iter(world)
            .map(|(robot, transform, target)| CarryJob {
                robot,
                translation: transform.translation,
                item: target.item,
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
            let Some(target) = lookup.world_position(job.item) else {
                trace!(robot = ?job.robot, item = ?job.item, "carry target has no position");
                return;
            };

            if target.distance_squared(job.translation) < ARRIVAL_DISTANCE_SQ {
                let mut rng = worker_rng(seed_offset, index);
                let drop_position = random_position_on_map(&mut rng, config.max_size);
                writer.record(index as u32, |cmds| {
                    cmds.insert(
                        job.robot,
                        ComponentValue::DropTarget(DropTarget {
                            position: drop_position,
                        }),
                    )
                    .remove(job.robot, ComponentKind::CarryTarget)
                    .set_parent(job.item, job.robot)
                    .set_transform(
                        job.item,
                        Transform::from_translation(CARRIED_ITEM_OFFSET).with_scale(CARRIED_ITEM_SCALE),
                    );
                });
                job.arrived = true;
                return;
            }

            job.translation = step_toward(job.translation, target, config.robot_speed, delta);
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
            picked_up = jobs.iter().filter(|job| job.arrived).count(),
            skipped = stats.skipped,
            "carry movement"
        );
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::systems::robot_target_system;

    fn test_world(speed: f32, delta: f32) -> World {
        let mut world = World::new();
        world.insert_resource(SpawnConfig {
            count: 0,
            max_size: 100.0,
            robot_speed: speed,
            ..Default::default()
        });
        world.insert_resource(DeltaTime(delta));
        world
    }

    #[test]
    fn test_robot_moves_toward_item() {
        let mut world = test_world(2.0, 0.5);
        let item = world.spawn(ItemBundle::at(Vec3::new(10.0, 0.0, 0.0))).id();
        let robot = world
            .spawn((RobotBundle::at(Vec3::ZERO), CarryTarget { item }))
            .id();

        robot_move_to_carry_system(&mut world);

        let pos = world.get::<Transform>(robot).unwrap().translation;
        assert!((pos.x - 1.0).abs() < 1e-5);
        assert!(world.get::<CarryTarget>(robot).is_some());
        assert!(world.get::<DropTarget>(robot).is_none());
    }

    #[test]
    fn test_pickup_on_arrival() {
        let mut world = test_world(2.0, 0.5);
        let item = world.spawn(ItemBundle::at(Vec3::new(0.1, 0.1, 0.0))).id();
        let robot = world
            .spawn((RobotBundle::at(Vec3::ZERO), CarryTarget { item }))
            .id();

        robot_move_to_carry_system(&mut world);

        assert!(world.get::<CarryTarget>(robot).is_none());
        let drop = world.get::<DropTarget>(robot).unwrap().position;
        assert!(drop.x.abs() <= 50.0 && drop.y.abs() <= 50.0);
        assert_eq!(drop.z, 0.0);

        assert_eq!(world.get::<Parent>(item), Some(&Parent(robot)));
        assert_eq!(world.get::<Children>(robot).map(|c| c.0.clone()), Some(vec![item]));
        let local = world.get::<Transform>(item).unwrap();
        assert_eq!(local.translation, CARRIED_ITEM_OFFSET);
        assert_eq!(local.scale, CARRIED_ITEM_SCALE);
        // Robot did not move on the arrival frame.
        assert_eq!(world.get::<Transform>(robot).unwrap().translation, Vec3::ZERO);
    }

    #[test]
    fn test_missing_item_is_not_fatal() {
        let mut world = test_world(2.0, 0.5);
        let item = world.spawn(ItemBundle::default()).id();
        let robot = world
            .spawn((RobotBundle::at(Vec3::new(3.0, 0.0, 0.0)), CarryTarget { item }))
            .id();
        world.despawn(item);

        robot_move_to_carry_system(&mut world);

        assert_eq!(
            world.get::<Transform>(robot).unwrap().translation,
            Vec3::new(3.0, 0.0, 0.0)
        );
        assert!(world.get::<CarryTarget>(robot).is_some());
    }

    #[test]
    fn test_requires_spawn_config() {
        let mut world = World::new();
        world.insert_resource(DeltaTime(1.0));
        let item = world.spawn(ItemBundle::at(Vec3::new(5.0, 0.0, 0.0))).id();
        let robot = world
            .spawn((RobotBundle::at(Vec3::ZERO), CarryTarget { item }))
            .id();

        robot_move_to_carry_system(&mut world);

        assert_eq!(world.get::<Transform>(robot).unwrap().translation, Vec3::ZERO);
    }

    #[test]
    fn test_robot_on_item_picks_up_in_same_frame_as_assignment() {
        let mut world = test_world(5.0, 0.1);
        let item = world.spawn(ItemBundle::at(Vec3::new(4.0, 4.0, 0.0))).id();
        let robot = world.spawn(RobotBundle::at(Vec3::new(4.0, 4.0, 0.0))).id();

        robot_target_system(&mut world);
        robot_move_to_carry_system(&mut world);

        assert!(world.get::<DropTarget>(robot).is_some());
        assert!(world.get::<CarryTarget>(robot).is_none());
        assert_eq!(world.get::<Parent>(item), Some(&Parent(robot)));
    }

    #[test]
    fn test_seed_advances_each_frame() {
        let mut world = test_world(1.0, 0.1);
        robot_move_to_carry_system(&mut world);
        robot_move_to_carry_system(&mut world);
        assert_eq!(world.resource::<StageSeeds>().carry, 2);
    }
}
