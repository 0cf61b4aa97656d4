//! Serializable snapshots of the simulation state.
//!
//! A `Snapshot` is a flat, render-agnostic view of every robot and item that
//! a presentation layer or a test can consume.

use crate::components::*;
use crate::systems::EntityLookup;
use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

/// Snapshot of a single robot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobotSnapshot {
    /// Entity bits, stable for the life of the simulation.
    pub id: u64,
    pub x: f32,
    pub y: f32,
    pub state: RobotState,
    /// Id of the item the robot is walking to, if any.
    pub carry_target: Option<u64>,
    /// Number of items parented to the robot.
    pub carried: usize,
    pub cooldown: Option<f32>,
}

/// Snapshot of a single item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemSnapshot {
    pub id: u64,
    /// World-space position.
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub claimed: bool,
    /// Id of the robot holding the item, if parented.
    pub parent: Option<u64>,
}

/// Complete simulation state snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Frames advanced so far.
    pub tick: u64,
    /// Elapsed simulation time in seconds.
    pub time: f32,
    pub robots: Vec<RobotSnapshot>,
    pub items: Vec<ItemSnapshot>,
}

impl Snapshot {
    /// Create a snapshot from the ECS world. Entries are sorted by id.
    pub fn from_world(world: &mut World, tick: u64, time: f32) -> Self {
        let mut robot_query = world.query_filtered::<(
            Entity,
            &Transform,
            Option<&CarryTarget>,
            Option<&DropTarget>,
            Option<&Cooldown>,
            Option<&Children>,
        ), With<Robot>>();

        let mut robots: Vec<RobotSnapshot> = robot_query
            .iter(world)
            .map(|(entity, transform, carry, drop, cooldown, children)| {
                let carried = children.map(|c| c.len()).unwrap_or(0);
                RobotSnapshot {
                    id: entity.to_bits(),
                    x: transform.translation.x,
                    y: transform.translation.y,
                    state: RobotState::classify(
                        carry.is_some(),
                        drop.is_some(),
                        cooldown.is_some(),
                        carried > 0,
                    ),
                    carry_target: carry.map(|c| c.item.to_bits()),
                    carried,
                    cooldown: cooldown.map(|c| c.time_left),
                }
            })
            .collect();
        robots.sort_by_key(|r| r.id);

        let mut item_query = world.query_filtered::<(
            Entity,
            Option<&AttachedToRobot>,
            Option<&Parent>,
        ), With<ItemTarget>>();
        let item_rows: Vec<(Entity, bool, Option<Entity>)> = item_query
            .iter(world)
            .map(|(entity, attached, parent)| (entity, attached.is_some(), parent.map(|p| p.0)))
            .collect();

        let lookup = EntityLookup::new(world);
        let mut items: Vec<ItemSnapshot> = item_rows
            .into_iter()
            .map(|(entity, claimed, parent)| {
                let position = lookup.world_position(entity).unwrap_or_default();
                ItemSnapshot {
                    id: entity.to_bits(),
                    x: position.x,
                    y: position.y,
                    z: position.z,
                    claimed,
                    parent: parent.map(|p| p.to_bits()),
                }
            })
            .collect();
        items.sort_by_key(|i| i.id);

        Self {
            tick,
            time,
            robots,
            items,
        }
    }

    /// Robots currently in `state`.
    pub fn count_in_state(&self, state: RobotState) -> usize {
        self.robots.iter().filter(|r| r.state == state).count()
    }

    /// Serialize snapshot to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize snapshot to pretty JSON string.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Parse a snapshot produced by [`Snapshot::to_json`].
    pub fn from_json(data: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reports_states() {
        let mut world = World::new();
        let item = world.spawn(ItemBundle::at(Vec3::new(1.0, 2.0, 0.0))).id();
        world.spawn((RobotBundle::default(), CarryTarget { item }));
        world.spawn((RobotBundle::default(), Cooldown { time_left: 1.0 }));
        world.spawn(RobotBundle::default());
        world.entity_mut(item).insert(AttachedToRobot);

        let snapshot = Snapshot::from_world(&mut world, 3, 0.5);

        assert_eq!(snapshot.tick, 3);
        assert_eq!(snapshot.robots.len(), 3);
        assert_eq!(snapshot.count_in_state(RobotState::Carrying), 1);
        assert_eq!(snapshot.count_in_state(RobotState::CoolingDown), 1);
        assert_eq!(snapshot.count_in_state(RobotState::Idle), 1);
        assert_eq!(snapshot.items.len(), 1);
        assert!(snapshot.items[0].claimed);
        assert_eq!((snapshot.items[0].x, snapshot.items[0].y), (1.0, 2.0));
    }

    #[test]
    fn test_snapshot_json_roundtrip() {
        let mut world = World::new();
        world.spawn(RobotBundle::at(Vec3::new(4.0, 5.0, 0.0)));
        let snapshot = Snapshot::from_world(&mut world, 1, 0.1);

        let json = snapshot.to_json().unwrap();
        assert!(json.contains("\"Idle\""));
        assert_eq!(Snapshot::from_json(&json).unwrap(), snapshot);
    }
}
