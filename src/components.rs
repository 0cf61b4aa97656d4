//! ECS Components for the robot haul simulation.
//!
//! Components are pure data containers attached to entities.
//! All simulation logic lives in the stage systems that query these components.

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Sub};

// ============================================================================
// SPATIAL COMPONENTS
// ============================================================================

/// 3D vector used for positions and offsets. Simulation motion stays in the
/// XY plane; `z` is carried for the local offsets of parented items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn length_squared(self) -> f32 {
        self.x * self.x + self.y * self.y + self.z * self.z
    }

    pub fn length(self) -> f32 {
        self.length_squared().sqrt()
    }

    pub fn distance_squared(self, other: Vec3) -> f32 {
        (self - other).length_squared()
    }

    /// Unit vector in the same direction. Zero-length input yields zero.
    pub fn normalize_or_zero(self) -> Self {
        let len = self.length();
        if len < 1e-6 {
            Self::ZERO
        } else {
            self * (1.0 / len)
        }
    }
}

impl Add for Vec3 {
    type Output = Vec3;

    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Vec3;

    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f32> for Vec3 {
    type Output = Vec3;

    fn mul(self, rhs: f32) -> Vec3 {
        Vec3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

/// Local transform. For a parented entity the translation is relative to the parent.
#[derive(Component, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub translation: Vec3,
    pub scale: f32,
}

impl Transform {
    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            scale: 1.0,
        }
    }

    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::from_translation(Vec3::ZERO)
    }
}

// ============================================================================
// HIERARCHY COMPONENTS
// ============================================================================

/// Parent of an entity. Only the mutation buffer inserts or removes this.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Parent(pub Entity);

/// Children of an entity, kept in attach order. Removed once empty.
#[derive(Component, Debug, Clone, Default, PartialEq, Eq)]
pub struct Children(pub Vec<Entity>);

impl Children {
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ============================================================================
// ROLE TAGS
// ============================================================================

/// Marks an agent that fetches and carries items.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct Robot;

/// Marks a pickable item. Stays on the item for its whole lifetime;
/// whether it is free is decided by the absence of [`AttachedToRobot`].
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct ItemTarget;

/// Marks an item claimed by a robot (walking toward it or carrying it).
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct AttachedToRobot;

// ============================================================================
// ROBOT TASK COMPONENTS
// ============================================================================

/// Robot is walking toward `item` to pick it up.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct CarryTarget {
    pub item: Entity,
}

/// Robot is carrying its children toward `position`.
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct DropTarget {
    pub position: Vec3,
}

/// Robot is idling after a drop. Removed once `time_left` goes negative.
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct Cooldown {
    pub time_left: f32,
}

/// Phase of a robot, derived from which task components it holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RobotState {
    Idle,
    Carrying,
    Dropping,
    CoolingDown,
}

impl RobotState {
    /// Classify a robot from component presence. Priority follows the cycle
    /// order, so a robot that somehow holds two task components reports the
    /// earlier phase.
    pub fn classify(carry: bool, drop: bool, cooldown: bool, has_children: bool) -> Self {
        if carry {
            RobotState::Carrying
        } else if drop || has_children {
            RobotState::Dropping
        } else if cooldown {
            RobotState::CoolingDown
        } else {
            RobotState::Idle
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RobotState::Idle => "Idle",
            RobotState::Carrying => "Carrying",
            RobotState::Dropping => "Dropping",
            RobotState::CoolingDown => "CoolingDown",
        }
    }
}

// ============================================================================
// BUNDLES
// ============================================================================

/// Bundle for spawning an idle robot.
#[derive(Bundle, Default)]
pub struct RobotBundle {
    pub robot: Robot,
    pub transform: Transform,
}

impl RobotBundle {
    pub fn at(position: Vec3) -> Self {
        Self {
            robot: Robot,
            transform: Transform::from_translation(position),
        }
    }
}

/// Bundle for spawning a free item.
#[derive(Bundle, Default)]
pub struct ItemBundle {
    pub target: ItemTarget,
    pub transform: Transform,
}

impl ItemBundle {
    pub fn at(position: Vec3) -> Self {
        Self {
            target: ItemTarget,
            transform: Transform::from_translation(position),
        }
    }
}
