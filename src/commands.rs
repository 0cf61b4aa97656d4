//! Deferred structural mutation buffer.
//!
//! Stage workers run concurrently over disjoint entities and only hold `&World`.
//! Anything that changes an entity's archetype (inserting or removing a
//! component, re-parenting, replacing a transform on another entity) is
//! recorded here instead and applied by a single-threaded playback once every
//! worker of the stage has finished.
//!
//! ## Ordering
//!
//! Each worker records under an ordering key, normally its index in the
//! stage's work-list. Playback applies requests in ascending key order;
//! requests sharing a key keep the order the worker emitted them in. The
//! outcome is therefore independent of how rayon scheduled the workers.

use crate::components::*;
use bevy_ecs::prelude::*;
use std::sync::{Mutex, PoisonError};
use tracing::debug;

/// Data-carrying value for an insert request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ComponentValue {
    Robot,
    ItemTarget,
    AttachedToRobot,
    CarryTarget(CarryTarget),
    DropTarget(DropTarget),
    Cooldown(Cooldown),
}

/// Component selector for a remove request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    Robot,
    ItemTarget,
    AttachedToRobot,
    CarryTarget,
    DropTarget,
    Cooldown,
}

/// A single structural change request.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    Insert { entity: Entity, value: ComponentValue },
    Remove { entity: Entity, kind: ComponentKind },
    SetParent { child: Entity, parent: Entity },
    RemoveParent { child: Entity },
    SetTransform { entity: Entity, transform: Transform },
}

impl Mutation {
    /// The entity whose archetype this request changes.
    pub fn target(&self) -> Entity {
        match *self {
            Mutation::Insert { entity, .. }
            | Mutation::Remove { entity, .. }
            | Mutation::SetTransform { entity, .. } => entity,
            Mutation::SetParent { child, .. } | Mutation::RemoveParent { child } => child,
        }
    }
}

/// Result of one playback.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaybackStats {
    /// Requests applied to the world.
    pub applied: usize,
    /// Requests dropped because an entity they referenced no longer exists.
    pub skipped: usize,
}

/// Thread-safe, append-only log of structural mutation requests.
#[derive(Debug, Default)]
pub struct MutationBuffer {
    entries: Mutex<Vec<(u32, Mutation)>>,
}

impl MutationBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle that workers use to record requests. Can be copied into every worker.
    pub fn writer(&self) -> ParallelWriter<'_> {
        ParallelWriter { buffer: self }
    }

    /// Number of pending requests.
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn append(&self, key: u32, mutations: Vec<Mutation>) {
        if mutations.is_empty() {
            return;
        }
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.extend(mutations.into_iter().map(|m| (key, m)));
    }

    /// Pending requests in playback order, without applying them.
    pub fn sorted(&mut self) -> Vec<(u32, Mutation)> {
        let entries = self.entries.get_mut().unwrap_or_else(PoisonError::into_inner);
        let mut sorted = entries.clone();
        sorted.sort_by_key(|(key, _)| *key);
        sorted
    }

    /// Apply every pending request to `world` in ascending key order, then clear.
    ///
    /// Taking `&mut self` guarantees no writer is still alive.
    pub fn playback(&mut self, world: &mut World) -> PlaybackStats {
        let entries = self.entries.get_mut().unwrap_or_else(PoisonError::into_inner);
        let mut pending = std::mem::take(entries);
        // Stable sort keeps per-worker emission order within a key.
        pending.sort_by_key(|(key, _)| *key);

        let mut stats = PlaybackStats::default();
        for (key, mutation) in pending {
            if apply_mutation(world, &mutation) {
                stats.applied += 1;
            } else {
                stats.skipped += 1;
                debug!(key, target = ?mutation.target(), "skipped mutation on missing entity");
            }
        }
        stats
    }
}

/// Shared recording handle for one stage's workers.
#[derive(Debug, Clone, Copy)]
pub struct ParallelWriter<'a> {
    buffer: &'a MutationBuffer,
}

impl<'a> ParallelWriter<'a> {
    /// Record requests for one worker under `key`. The closure fills a local
    /// list that is appended to the shared log in a single lock.
    pub fn record<R>(&self, key: u32, f: impl FnOnce(&mut WorkerCommands) -> R) -> R {
        let mut commands = WorkerCommands::default();
        let result = f(&mut commands);
        self.buffer.append(key, commands.mutations);
        result
    }
}

/// Per-worker request list handed out by [`ParallelWriter::record`].
#[derive(Debug, Default)]
pub struct WorkerCommands {
    mutations: Vec<Mutation>,
}

impl WorkerCommands {
    pub fn insert(&mut self, entity: Entity, value: ComponentValue) -> &mut Self {
        self.mutations.push(Mutation::Insert { entity, value });
        self
    }

    pub fn remove(&mut self, entity: Entity, kind: ComponentKind) -> &mut Self {
        self.mutations.push(Mutation::Remove { entity, kind });
        self
    }

    pub fn set_parent(&mut self, child: Entity, parent: Entity) -> &mut Self {
        self.mutations.push(Mutation::SetParent { child, parent });
        self
    }

    pub fn remove_parent(&mut self, child: Entity) -> &mut Self {
        self.mutations.push(Mutation::RemoveParent { child });
        self
    }

    pub fn set_transform(&mut self, entity: Entity, transform: Transform) -> &mut Self {
        self.mutations.push(Mutation::SetTransform { entity, transform });
        self
    }

    pub fn len(&self) -> usize {
        self.mutations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }
}

/// Apply one request. Returns false when a referenced entity is gone.
fn apply_mutation(world: &mut World, mutation: &Mutation) -> bool {
    match *mutation {
        Mutation::Insert { entity, value } => {
            if !world.entities().contains(entity) {
                return false;
            }
            let mut entity_mut = world.entity_mut(entity);
            match value {
                ComponentValue::Robot => {
                    entity_mut.insert(Robot);
                }
                ComponentValue::ItemTarget => {
                    entity_mut.insert(ItemTarget);
                }
                ComponentValue::AttachedToRobot => {
                    entity_mut.insert(AttachedToRobot);
                }
                ComponentValue::CarryTarget(c) => {
                    entity_mut.insert(c);
                }
                ComponentValue::DropTarget(d) => {
                    entity_mut.insert(d);
                }
                ComponentValue::Cooldown(c) => {
                    entity_mut.insert(c);
                }
            }
            true
        }
        Mutation::Remove { entity, kind } => {
            if !world.entities().contains(entity) {
                return false;
            }
            let mut entity_mut = world.entity_mut(entity);
            match kind {
                ComponentKind::Robot => {
                    entity_mut.remove::<Robot>();
                }
                ComponentKind::ItemTarget => {
                    entity_mut.remove::<ItemTarget>();
                }
                ComponentKind::AttachedToRobot => {
                    entity_mut.remove::<AttachedToRobot>();
                }
                ComponentKind::CarryTarget => {
                    entity_mut.remove::<CarryTarget>();
                }
                ComponentKind::DropTarget => {
                    entity_mut.remove::<DropTarget>();
                }
                ComponentKind::Cooldown => {
                    entity_mut.remove::<Cooldown>();
                }
            }
            true
        }
        Mutation::SetParent { child, parent } => {
            if child == parent
                || !world.entities().contains(child)
                || !world.entities().contains(parent)
            {
                return false;
            }
            if let Some(Parent(previous)) = world.get::<Parent>(child).copied() {
                if previous == parent {
                    return true;
                }
                detach_child(world, previous, child);
            }
            world.entity_mut(child).insert(Parent(parent));
            attach_child(world, parent, child);
            true
        }
        Mutation::RemoveParent { child } => {
            if !world.entities().contains(child) {
                return false;
            }
            if let Some(Parent(parent)) = world.get::<Parent>(child).copied() {
                world.entity_mut(child).remove::<Parent>();
                detach_child(world, parent, child);
            }
            true
        }
        Mutation::SetTransform { entity, transform } => {
            if !world.entities().contains(entity) {
                return false;
            }
            let mut entity_mut = world.entity_mut(entity);
            entity_mut.insert(transform);
            true
        }
    }
}

fn attach_child(world: &mut World, parent: Entity, child: Entity) {
    let mut parent_mut = world.entity_mut(parent);
    if parent_mut.contains::<Children>() {
        if let Some(mut children) = parent_mut.get_mut::<Children>() {
            if !children.0.contains(&child) {
                children.0.push(child);
            }
        }
    } else {
        parent_mut.insert(Children(vec![child]));
    }
}

fn detach_child(world: &mut World, parent: Entity, child: Entity) {
    if !world.entities().contains(parent) {
        return;
    }
    let mut parent_mut = world.entity_mut(parent);
    let now_empty = match parent_mut.get_mut::<Children>() {
        Some(mut children) => {
            children.0.retain(|e| *e != child);
            children.0.is_empty()
        }
        None => false,
    };
    if now_empty {
        parent_mut.remove::<Children>();
    }
}
