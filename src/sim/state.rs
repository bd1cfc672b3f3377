//! Round state shared with collision callbacks
//!
//! `Scene` is everything a collision policy may touch: the entity table, the
//! level's spawn queue, the score and the round-over flag. The physics world
//! stays outside it so callbacks can never add or remove bodies mid-step.

use std::collections::BTreeMap;

use glam::Vec2;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::entity::{Entity, EntityId, EntityKind};
use super::level::Level;
use super::physics::PhysicsWorld;
use crate::error::SimError;
use crate::tuning::Tuning;

/// Current phase of the game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GamePhase {
    /// Waiting for a round to start
    Menu,
    /// Round in progress
    Playing,
    /// Player touched a wall; holds the final score
    GameOver { score: u32 },
}

pub struct Scene {
    pub(crate) entities: BTreeMap<EntityId, Entity>,
    pub(crate) level: Level,
    pub(crate) tuning: Tuning,
    pub(crate) rng: Pcg32,
    score: u32,
    /// Score captured when the round ended
    round_over: Option<u32>,
    /// How many times a round-ending contact fired
    round_end_events: u32,
    player: Option<EntityId>,
    next_id: u32,
}

impl Scene {
    pub fn new(tuning: Tuning, rng: Pcg32) -> Self {
        let level = Level::new(&tuning);
        Self {
            entities: BTreeMap::new(),
            level,
            tuning,
            rng,
            score: 0,
            round_over: None,
            round_end_events: 0,
            player: None,
            next_id: 1,
        }
    }

    /// Forget every entity and start the score over (ids keep counting up)
    pub(crate) fn reset(&mut self) {
        self.entities.clear();
        self.level = Level::new(&self.tuning);
        self.score = 0;
        self.round_over = None;
        self.round_end_events = 0;
        self.player = None;
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    /// Final score, once the round has ended
    pub fn round_over(&self) -> Option<u32> {
        self.round_over
    }

    pub fn round_end_events(&self) -> u32 {
        self.round_end_events
    }

    pub fn tuning(&self) -> &Tuning {
        &self.tuning
    }

    pub fn level(&self) -> &Level {
        &self.level
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// Every entity in id order, dead ones included until reaped
    pub fn entities(&self) -> impl Iterator<Item = (EntityId, &Entity)> {
        self.entities.iter().map(|(&id, entity)| (id, entity))
    }

    pub fn player_id(&self) -> Option<EntityId> {
        self.player
    }

    pub fn player_position<C>(&self, physics: &PhysicsWorld<C>) -> Option<Vec2> {
        self.player
            .and_then(|id| self.entities.get(&id))
            .map(|entity| entity.position(physics))
    }

    /// End the round, keeping the score it ended with
    pub fn end_round(&mut self) {
        self.round_end_events += 1;
        if self.round_over.is_none() {
            log::info!("Round over, score {}", self.score);
            self.round_over = Some(self.score);
        }
    }

    /// Player picked up a pellet
    ///
    /// Scores and queues exactly one replacement the first time; a pellet that
    /// is already dead is ignored. Returns whether it counted.
    pub fn collect_pellet(&mut self, id: EntityId) -> Result<bool, SimError> {
        let entity = self
            .entities
            .get_mut(&id)
            .ok_or(SimError::UnknownEntity(id))?;
        if !matches!(entity.kind, EntityKind::Pellet(_)) {
            return Err(SimError::WrongKind {
                id,
                expected: "pellet",
            });
        }
        if !entity.is_alive() {
            return Ok(false);
        }
        entity.die();
        self.score += 1;
        log::debug!("Pellet collected, score {}", self.score);
        self.level.spawn_pellet(&self.tuning, &mut self.rng);
        Ok(true)
    }

    /// Unit direction a slider is lunging (or about to lunge) in
    pub fn slide_direction(&self, id: EntityId) -> Result<Vec2, SimError> {
        let entity = self.entities.get(&id).ok_or(SimError::UnknownEntity(id))?;
        entity
            .as_enemy()
            .and_then(|enemy| enemy.as_slider())
            .map(|slider| slider.direction())
            .ok_or(SimError::WrongKind {
                id,
                expected: "slider",
            })
    }

    /// Give an unregistered entity an id and a body
    ///
    /// An entity that already has a body is left alone and `None` is returned.
    pub(crate) fn register<C>(
        &mut self,
        mut entity: Entity,
        physics: &mut PhysicsWorld<C>,
    ) -> Result<Option<EntityId>, SimError> {
        if entity.actor().is_some() {
            log::debug!("{} {:?} is already registered", entity.kind.name(), entity.id());
            return Ok(None);
        }
        let id = EntityId(self.next_id);
        entity.attach(id, physics, &self.tuning)?;
        self.next_id += 1;
        if matches!(entity.kind, EntityKind::Player(_)) {
            self.player = Some(id);
        }
        self.entities.insert(id, entity);
        Ok(Some(id))
    }

    /// Detach and drop every dead entity, returning how many went
    pub(crate) fn reap<C>(&mut self, physics: &mut PhysicsWorld<C>) -> usize {
        let dead: Vec<EntityId> = self
            .entities
            .iter()
            .filter(|(_, entity)| !entity.is_alive())
            .map(|(&id, _)| id)
            .collect();
        for id in &dead {
            if let Some(mut entity) = self.entities.remove(id) {
                entity.detach(physics);
                log::trace!("Reaped {} {id:?}", entity.kind.name());
            }
            if self.player == Some(*id) {
                self.player = None;
            }
        }
        dead.len()
    }

    pub(crate) fn sync_sprites<C>(&mut self, physics: &PhysicsWorld<C>) {
        for entity in self.entities.values_mut() {
            entity.sync_sprite(physics);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::enemy::{Enemy, EnemyKind, EnemySpec};
    use crate::sim::pellet::Pellet;
    use rand::SeedableRng;

    fn scene() -> Scene {
        Scene::new(Tuning::default(), Pcg32::seed_from_u64(0))
    }

    fn add_pellet(scene: &mut Scene, world: &mut PhysicsWorld<()>) -> EntityId {
        let pellet = Entity::new(EntityKind::Pellet(Pellet::new()), Vec2::new(300.0, 300.0));
        scene.register(pellet, world).unwrap().unwrap()
    }

    #[test]
    fn test_pellet_collection_is_idempotent() {
        let mut scene = scene();
        let mut world: PhysicsWorld<()> = PhysicsWorld::new();
        let id = add_pellet(&mut scene, &mut world);

        assert!(scene.collect_pellet(id).unwrap());
        assert!(!scene.collect_pellet(id).unwrap());
        assert_eq!(scene.score(), 1);
        assert_eq!(scene.level().new_objects.len(), 1);
        assert!(!scene.entity(id).unwrap().is_alive());
    }

    #[test]
    fn test_collecting_unknown_or_wrong_entity_fails() {
        let mut scene = scene();
        let mut world: PhysicsWorld<()> = PhysicsWorld::new();
        assert!(matches!(
            scene.collect_pellet(EntityId(99)),
            Err(SimError::UnknownEntity(EntityId(99)))
        ));

        let mut rng = Pcg32::seed_from_u64(1);
        let pawn = Enemy::new(EnemySpec::default_for(EnemyKind::Pawn), &mut rng);
        let id = scene
            .register(Entity::new(EntityKind::Enemy(pawn), Vec2::ZERO), &mut world)
            .unwrap()
            .unwrap();
        assert!(matches!(scene.collect_pellet(id), Err(SimError::WrongKind { .. })));
        assert!(matches!(scene.slide_direction(id), Err(SimError::WrongKind { .. })));
    }

    #[test]
    fn test_round_end_keeps_first_score() {
        let mut scene = scene();
        let mut world: PhysicsWorld<()> = PhysicsWorld::new();
        let id = add_pellet(&mut scene, &mut world);
        scene.collect_pellet(id).unwrap();
        scene.end_round();
        scene.end_round();
        assert_eq!(scene.round_over(), Some(1));
        assert_eq!(scene.round_end_events(), 2);
    }

    #[test]
    fn test_reap_detaches_dead_entities_once() {
        let mut scene = scene();
        let mut world: PhysicsWorld<()> = PhysicsWorld::new();
        let id = add_pellet(&mut scene, &mut world);
        let other = add_pellet(&mut scene, &mut world);
        assert_eq!(world.body_count(), 2);

        scene.collect_pellet(id).unwrap();
        assert_eq!(scene.reap(&mut world), 1);
        assert_eq!(scene.reap(&mut world), 0);
        assert_eq!(world.body_count(), 1);
        assert!(scene.entity(id).is_none());
        assert!(scene.entity(other).is_some());
    }

    #[test]
    fn test_registered_entities_get_fresh_ids() {
        let mut scene = scene();
        let mut world: PhysicsWorld<()> = PhysicsWorld::new();
        let a = add_pellet(&mut scene, &mut world);
        let b = add_pellet(&mut scene, &mut world);
        assert_ne!(a, b);
        scene.reset();
        let c = add_pellet(&mut scene, &mut world);
        assert!(c > b);
        assert_eq!(scene.entities().count(), 1);
    }
}
