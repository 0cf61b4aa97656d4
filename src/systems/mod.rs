//! Stage systems for the robot haul simulation.
//!
//! Every stage is an exclusive system and runs in a fixed chain each frame:
//!
//! 1. `spawner_system` - one-time population setup, no-op afterwards
//! 2. `robot_target_system` - pairs idle robots with unclaimed items
//! 3. `robot_move_to_carry_system` - walks robots to their item and picks it up
//! 4. `robot_move_to_drop_system` - walks robots to the drop point and scatters the load
//! 5. `robot_cooldown_system` - counts down idle time after a drop
//!
//! ## Stage Structure
//!
//! Stages 2-5 follow the same three phases:
//!
//! - **Gather**: query the world into a work-list of per-entity copies. The
//!   position of an entry in the list is its worker index.
//! - **Compute**: run one worker per entry, in parallel with the `parallel`
//!   feature. Workers only read the world through [`EntityLookup`] and record
//!   structural changes into a [`MutationBuffer`](crate::commands::MutationBuffer)
//!   keyed by worker index.
//! - **Apply**: write back in-place values (robot translation, cooldown time),
//!   then play the buffer back. The next stage gathers only after this.

pub mod assignment;
pub mod carry;
pub mod cooldown;
pub mod dropoff;
pub mod spawner;

pub use assignment::*;
pub use carry::*;
pub use cooldown::*;
pub use dropoff::*;
pub use spawner::*;

use crate::components::*;
use crate::profiler::Profiler;
use bevy_ecs::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info_span;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// A robot has reached its target once the squared distance drops below this.
pub const ARRIVAL_DISTANCE_SQ: f32 = 0.1;
/// Local offset of an item while carried by a robot.
pub const CARRIED_ITEM_OFFSET: Vec3 = Vec3::new(0.0, 0.5, 0.0);
/// Scale of an item while carried.
pub const CARRIED_ITEM_SCALE: f32 = 0.5;
/// Scale of an item after being dropped.
pub const DROPPED_ITEM_SCALE: f32 = 0.5;
/// Dropped items land within `[-1, 1]^2 * DROP_SCATTER_SCALE` of the robot.
pub const DROP_SCATTER_SCALE: f32 = 2.0;
/// Cooldowns are drawn uniformly from `[0, MAX_COOLDOWN_SECS)`.
pub const MAX_COOLDOWN_SECS: f32 = 3.0;
/// Bound on parent chain walks.
const MAX_HIERARCHY_DEPTH: usize = 16;

/// Resource containing the delta time for the current frame.
#[derive(Resource, Debug, Clone, Copy, Default)]
pub struct DeltaTime(pub f32);

/// Per-stage seed counters for worker random generators.
///
/// Each randomized stage advances its own counter once per frame before
/// dispatch, so no two frames of the same stage share a seed.
#[derive(Resource, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageSeeds {
    pub carry: u32,
    pub drop: u32,
}

impl StageSeeds {
    pub fn advance_carry(&mut self) -> u32 {
        self.carry = self.carry.wrapping_add(1);
        self.carry
    }

    pub fn advance_drop(&mut self) -> u32 {
        self.drop = self.drop.wrapping_add(1);
        self.drop
    }
}

/// Seed of the generator for worker `index` in a frame with `seed_offset`.
/// Distinct `(seed_offset, index)` pairs never collide.
#[inline]
pub fn worker_seed(seed_offset: u32, index: usize) -> u64 {
    ((seed_offset as u64) << 32) | (index as u64 & 0xFFFF_FFFF)
}

/// Fresh generator for one worker. Never shared between workers.
pub fn worker_rng(seed_offset: u32, index: usize) -> StdRng {
    StdRng::seed_from_u64(worker_seed(seed_offset, index))
}

/// Uniform position in the square `[-max_size/2, max_size/2]^2` on the z = 0 plane.
pub fn random_position_on_map<R: Rng>(rng: &mut R, max_size: f32) -> Vec3 {
    let x = (rng.gen::<f32>() - 0.5) * max_size;
    let y = (rng.gen::<f32>() - 0.5) * max_size;
    Vec3::new(x, y, 0.0)
}

/// Uniform offset in `[-1, 1]^2 * scale` around `center`, flattened to z = 0.
pub fn random_position_around<R: Rng>(rng: &mut R, center: Vec3, scale: f32) -> Vec3 {
    let x = (rng.gen::<f32>() * 2.0 - 1.0) * scale;
    let y = (rng.gen::<f32>() * 2.0 - 1.0) * scale;
    Vec3::new(center.x + x, center.y + y, 0.0)
}

/// One frame of straight-line motion. Does not clamp at the target.
#[inline]
pub fn step_toward(from: Vec3, to: Vec3, speed: f32, delta: f32) -> Vec3 {
    from + (to - from).normalize_or_zero() * (speed * delta)
}

/// Read-only view of the world shared by all workers of a stage.
#[derive(Clone, Copy)]
pub struct EntityLookup<'w> {
    world: &'w World,
}

impl<'w> EntityLookup<'w> {
    pub fn new(world: &'w World) -> Self {
        Self { world }
    }

    /// World-space position, composing parent transforms.
    /// `None` if the entity is gone or has no transform.
    pub fn world_position(&self, entity: Entity) -> Option<Vec3> {
        let mut position = self.world.get::<Transform>(entity)?.translation;
        let mut current = entity;
        for _ in 0..MAX_HIERARCHY_DEPTH {
            let Some(&Parent(parent)) = self.world.get::<Parent>(current) else {
                return Some(position);
            };
            let parent_transform = self.world.get::<Transform>(parent)?;
            position = parent_transform.translation + position * parent_transform.scale;
            current = parent;
        }
        Some(position)
    }

    /// Children of `entity`, empty if it has none.
    pub fn children(&self, entity: Entity) -> &'w [Entity] {
        self.world
            .get::<Children>(entity)
            .map(|c| c.0.as_slice())
            .unwrap_or(&[])
    }
}

/// Run `worker` once per work-list entry, passing the entry's index.
pub(crate) fn dispatch<T, F>(work: &mut [T], worker: F)
where
    T: Send,
    F: Fn(usize, &mut T) + Send + Sync,
{
    #[cfg(feature = "parallel")]
    {
        work.par_iter_mut()
            .enumerate()
            .for_each(|(index, entry)| worker(index, entry));
    }

    #[cfg(not(feature = "parallel"))]
    {
        for (index, entry) in work.iter_mut().enumerate() {
            worker(index, entry);
        }
    }
}

/// Run a stage body inside its tracing span, recording its time in the
/// [`Profiler`] resource when one is present.
pub(crate) fn run_stage(world: &mut World, name: &'static str, body: impl FnOnce(&mut World)) {
    let _span = info_span!("stage", stage = name).entered();
    if !world.contains_resource::<Profiler>() {
        body(world);
        return;
    }
    let start = std::time::Instant::now();
    body(world);
    let elapsed = start.elapsed();
    if let Some(mut profiler) = world.get_resource_mut::<Profiler>() {
        profiler.record(name, elapsed);
    }
}

/// Robots with no cooldown, carry target, drop target or carried child.
pub fn idle_robots(world: &mut World) -> Vec<Entity> {
    let mut query = world.query_filtered::<Entity, (
        With<Robot>,
        Without<Cooldown>,
        Without<CarryTarget>,
        Without<DropTarget>,
        Without<Children>,
    )>();
    query.iter(world).collect()
}

/// Items tagged as targets and not attached to any robot.
pub fn unclaimed_items(world: &mut World) -> Vec<Entity> {
    let mut query = world.query_filtered::<Entity, (With<ItemTarget>, Without<AttachedToRobot>)>();
    query.iter(world).collect()
}
