//! Target assignment - pairs idle robots with unclaimed items.
//!
//! Workers walk the unclaimed-item list; worker `i` pairs item `i` with idle
//! robot `i`. Every item and every robot appears at most once in its list, so
//! no item can be handed to two robots in the same frame. Surplus items wait
//! for a later frame.

use super::{dispatch, idle_robots, run_stage, unclaimed_items};
use crate::commands::{ComponentValue, MutationBuffer};
use crate::components::*;
use bevy_ecs::prelude::*;
use tracing::{debug, trace};

/// Stage name used for spans and profiling.
pub const ROBOT_TARGET_STAGE: &str = "robot_target";

/// System that claims one unclaimed item per idle robot.
///
/// ## Data Access
/// - Reads: Robot, ItemTarget, AttachedToRobot, Cooldown, CarryTarget, DropTarget, Children
/// - Inserts: CarryTarget on robots, AttachedToRobot on items
pub fn robot_target_system(world: &mut World) {
    run_stage(world, ROBOT_TARGET_STAGE, |world| {
        let idle = idle_robots(world);
        if idle.is_empty() {
            trace!("no idle robots this frame");
            return;
        }

        let mut items = unclaimed_items(world);
        let pairings = idle.len().min(items.len());

        let mut buffer = MutationBuffer::new();
        let writer = buffer.writer();
        dispatch(&mut items, |index, item| {
            let Some(&robot) = idle.get(index) else {
                return;
            };
            writer.record(index as u32, |cmds| {
                cmds.insert(robot, ComponentValue::CarryTarget(CarryTarget { item: *item }))
                    .insert(*item, ComponentValue::AttachedToRobot);
            });
        });

        let stats = buffer.playback(world);
        debug!(
            idle = idle.len(),
            unclaimed = items.len(),
            pairings,
            skipped = stats.skipped,
            "assigned carry targets"
        );
    });
}
