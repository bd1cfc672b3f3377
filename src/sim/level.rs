//! Enemy and pellet spawning
//!
//! The level never creates bodies itself. It queues unregistered entities in
//! `new_objects` and the loop instantiates them after the entity pass.

use std::collections::BTreeMap;

use glam::Vec2;
use rand::Rng;
use rand_pcg::Pcg32;

use super::enemy::{Enemy, EnemyKind, EnemySpec};
use super::entity::{Entity, EntityId, EntityKind};
use super::pellet::Pellet;
use crate::{arena_center, mirror_through_center};
use crate::tuning::Tuning;

#[derive(Debug, Clone)]
pub struct Level {
    /// Seconds since the last enemy spawn
    enemy_timer: f32,
    pub new_objects: Vec<Entity>,
}

impl Level {
    /// Fresh level; the first spawn attempt happens on the first tick
    pub fn new(tuning: &Tuning) -> Self {
        Self {
            enemy_timer: tuning.spawn_interval,
            new_objects: Vec::new(),
        }
    }

    pub fn enemy_timer(&self) -> f32 {
        self.enemy_timer
    }

    /// Advance the spawn timer and queue an enemy when it is due
    ///
    /// When every kind is at its cap nothing is queued and the timer keeps
    /// running, so the next free slot is filled straight away.
    pub fn tick(
        &mut self,
        dt: f32,
        player_pos: Vec2,
        entities: &BTreeMap<EntityId, Entity>,
        tuning: &Tuning,
        rng: &mut Pcg32,
    ) {
        self.enemy_timer += dt;
        if self.enemy_timer < tuning.spawn_interval {
            return;
        }

        let eligible: Vec<&EnemySpec> = tuning
            .enemies
            .iter()
            .filter(|spec| live_count(entities, spec.kind) < spec.cap)
            .collect();
        let Some(spec) = pick_weighted(&eligible, rng) else {
            return;
        };

        let position = spawn_position(spec.half_extents(), player_pos, tuning, rng);
        log::debug!("Spawning {} at ({:.0}, {:.0})", spec.kind.name(), position.x, position.y);
        let enemy = Enemy::new(spec.clone(), rng);
        self.new_objects
            .push(Entity::new(EntityKind::Enemy(enemy), position));
        self.enemy_timer = 0.0;
    }

    /// Queue a pellet somewhere away from the walls
    pub fn spawn_pellet(&mut self, tuning: &Tuning, rng: &mut Pcg32) {
        let inset = tuning.pellet.inset;
        let position = Vec2::new(
            rng.random_range(inset..tuning.arena.x - inset),
            rng.random_range(inset..tuning.arena.y - inset),
        );
        log::debug!("Spawning pellet at ({:.0}, {:.0})", position.x, position.y);
        self.new_objects
            .push(Entity::new(EntityKind::Pellet(Pellet::new()), position));
    }
}

/// Living enemies of one kind
pub fn live_count(entities: &BTreeMap<EntityId, Entity>, kind: EnemyKind) -> usize {
    entities
        .values()
        .filter(|entity| entity.is_alive())
        .filter_map(Entity::as_enemy)
        .filter(|enemy| enemy.kind() == kind)
        .count()
}

/// Weighted choice, weights re-normalized over whatever is passed in
pub fn pick_weighted<'a>(specs: &[&'a EnemySpec], rng: &mut Pcg32) -> Option<&'a EnemySpec> {
    let total: f32 = specs.iter().map(|spec| spec.weight).sum();
    if specs.is_empty() || total <= 0.0 {
        return None;
    }
    let mut roll = rng.random_range(0.0..total);
    for spec in specs {
        if roll < spec.weight {
            return Some(*spec);
        }
        roll -= spec.weight;
    }
    // Rounding can leave a sliver past the last weight
    specs.last().copied()
}

/// Where a new enemy with the given half-extent should appear
///
/// With the player near the centre any wall will do. Otherwise the point
/// mirrored through the centre is pulled into the arena and pushed onto the
/// wall on the axis where it is already closer to one.
pub fn spawn_position(half: Vec2, player_pos: Vec2, tuning: &Tuning, rng: &mut Pcg32) -> Vec2 {
    let arena = tuning.arena;
    let center = arena_center(arena);

    if player_pos.distance(center) < tuning.spawn_deadzone {
        let along_x = rng.random_range(half.x..arena.x - half.x);
        let along_y = rng.random_range(half.y..arena.y - half.y);
        return match rng.random_range(0..4) {
            0 => Vec2::new(half.x, along_y),
            1 => Vec2::new(along_x, arena.y - half.y),
            2 => Vec2::new(arena.x - half.x, along_y),
            _ => Vec2::new(along_x, half.y),
        };
    }

    let mut pos = mirror_through_center(player_pos, arena).clamp(half, arena - half);
    let to_wall_x = pos.x.min(arena.x - pos.x).abs();
    let to_wall_y = pos.y.min(arena.y - pos.y).abs();
    if to_wall_x < to_wall_y {
        pos.x = if pos.x < center.x { half.x } else { arena.x - half.x };
    } else {
        pos.y = if pos.y < center.y { half.y } else { arena.y - half.y };
    }
    pos
}
