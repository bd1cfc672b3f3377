//! Entities and their physical actors
//!
//! An entity starts out unregistered (no id, no body). Registering it gives it
//! an id, a body/shape pair in the physics world and a sprite. From then on its
//! position is whatever the body says.

use glam::Vec2;
use rand_pcg::Pcg32;

use super::enemy::Enemy;
use super::pellet::Pellet;
use super::physics::{Body, PhysicsBody, PhysicsWorld, Shape};
use super::player::Player;
use crate::error::SimError;
use crate::input::KeyboardState;
use crate::render::{ImageKey, Sprite};
use crate::tuning::Tuning;

/// Stable handle into the entity table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u32);

/// What an entity is, with its per-kind state
#[derive(Debug, Clone)]
pub enum EntityKind {
    Player(Player),
    Pellet(Pellet),
    Enemy(Enemy),
}

impl EntityKind {
    pub fn name(&self) -> &'static str {
        match self {
            EntityKind::Player(_) => "player",
            EntityKind::Pellet(_) => "pellet",
            EntityKind::Enemy(enemy) => enemy.kind().name(),
        }
    }

    fn image(&self) -> ImageKey {
        match self {
            EntityKind::Player(_) => ImageKey::Player,
            EntityKind::Pellet(_) => ImageKey::Pellet,
            EntityKind::Enemy(enemy) => enemy.kind().image(),
        }
    }

    fn physics(&self, tuning: &Tuning) -> Result<(Body, Shape), SimError> {
        let built = match self {
            EntityKind::Player(_) => Player::physics(&tuning.player)?,
            EntityKind::Pellet(_) => Pellet::physics(&tuning.pellet)?,
            EntityKind::Enemy(enemy) => enemy.spec().physics()?,
        };
        Ok(built)
    }

    /// Sprite rotation in radians
    fn facing(&self) -> f32 {
        match self {
            EntityKind::Player(_) => 0.0,
            EntityKind::Pellet(pellet) => pellet.angle(),
            EntityKind::Enemy(enemy) => enemy.facing(),
        }
    }
}

/// Binds an entity to its body and shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub physics: PhysicsBody,
}

/// Per-frame inputs every entity gets to see
pub struct TickContext<'a> {
    pub dt: f32,
    /// Player position at the start of the frame
    pub player_pos: Vec2,
    pub keyboard: &'a dyn KeyboardState,
    pub tuning: &'a Tuning,
    pub rng: &'a mut Pcg32,
}

#[derive(Debug, Clone)]
pub struct Entity {
    id: Option<EntityId>,
    pub kind: EntityKind,
    alive: bool,
    /// Entities this one wants spawned, drained by the loop every frame
    pub new_objects: Vec<Entity>,
    actor: Option<Actor>,
    sprite: Option<Sprite>,
    spawn_position: Vec2,
}

impl Entity {
    /// Unregistered entity that will appear at `position`
    pub fn new(kind: EntityKind, position: Vec2) -> Self {
        Self {
            id: None,
            kind,
            alive: true,
            new_objects: Vec::new(),
            actor: None,
            sprite: None,
            spawn_position: position,
        }
    }

    pub fn id(&self) -> Option<EntityId> {
        self.id
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    /// Mark dead; the loop reaps it at the next cleanup. Calling twice is harmless.
    pub fn die(&mut self) {
        if self.alive {
            log::debug!("{} {:?} died", self.kind.name(), self.id);
        }
        self.alive = false;
    }

    pub fn actor(&self) -> Option<&Actor> {
        self.actor.as_ref()
    }

    pub fn sprite(&self) -> Option<&Sprite> {
        self.sprite.as_ref()
    }

    /// Where the entity is now (its spawn point until it has a body)
    pub fn position<C>(&self, physics: &PhysicsWorld<C>) -> Vec2 {
        self.actor
            .and_then(|actor| physics.body(actor.physics.body))
            .map_or(self.spawn_position, |body| body.position)
    }

    pub fn as_player(&self) -> Option<&Player> {
        match &self.kind {
            EntityKind::Player(player) => Some(player),
            _ => None,
        }
    }

    pub fn as_enemy(&self) -> Option<&Enemy> {
        match &self.kind {
            EntityKind::Enemy(enemy) => Some(enemy),
            _ => None,
        }
    }

    /// Give the entity its id, body and sprite
    ///
    /// Returns false without touching anything if it already has a body.
    pub(crate) fn attach<C>(
        &mut self,
        id: EntityId,
        physics: &mut PhysicsWorld<C>,
        tuning: &Tuning,
    ) -> Result<bool, SimError> {
        if self.actor.is_some() {
            return Ok(false);
        }
        let (body, shape) = self.kind.physics(tuning)?;
        let pair = physics.add(body.with_position(self.spawn_position), shape.with_owner(id));

        let mut sprite = Sprite::new(self.kind.image(), self.spawn_position);
        sprite.rotation = self.kind.facing();

        self.id = Some(id);
        self.actor = Some(Actor { physics: pair });
        self.sprite = Some(sprite);
        Ok(true)
    }

    /// Drop the body and sprite
    pub(crate) fn detach<C>(&mut self, physics: &mut PhysicsWorld<C>) {
        if let Some(actor) = self.actor.take() {
            physics.remove(actor.physics);
        }
        self.sprite = None;
    }

    /// Sync the sprite, then run this kind's behaviour
    pub fn tick<C>(&mut self, ctx: &mut TickContext<'_>, physics: &mut PhysicsWorld<C>) -> Result<(), SimError> {
        let (Some(actor), Some(id)) = (self.actor, self.id) else {
            return Ok(());
        };
        let body = physics
            .body_mut(actor.physics.body)
            .ok_or(SimError::MissingBody(id))?;

        if let Some(sprite) = &mut self.sprite {
            sprite.position = body.position;
        }

        match &mut self.kind {
            EntityKind::Player(player) => player.tick(ctx, body),
            EntityKind::Pellet(pellet) => pellet.tick(ctx.dt, ctx.tuning.pellet.spin),
            EntityKind::Enemy(enemy) => enemy.tick(ctx, body),
        }

        if let Some(sprite) = &mut self.sprite {
            sprite.rotation = self.kind.facing();
        }
        Ok(())
    }

    /// Copy the body position into the sprite
    pub(crate) fn sync_sprite<C>(&mut self, physics: &PhysicsWorld<C>) {
        let position = self.position(physics);
        if let Some(sprite) = &mut self.sprite {
            sprite.position = position;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::KeySet;
    use rand::SeedableRng;

    fn pellet() -> Entity {
        Entity::new(EntityKind::Pellet(Pellet::new()), Vec2::new(200.0, 300.0))
    }

    #[test]
    fn test_attach_once() {
        let tuning = Tuning::default();
        let mut world: PhysicsWorld<()> = PhysicsWorld::new();
        let mut entity = pellet();
        assert!(entity.attach(EntityId(1), &mut world, &tuning).unwrap());
        assert!(!entity.attach(EntityId(2), &mut world, &tuning).unwrap());
        assert_eq!(entity.id(), Some(EntityId(1)));
        assert_eq!(world.body_count(), 1);

        let shape = world.shape(entity.actor().unwrap().physics.shape).unwrap();
        assert_eq!(shape.owner, Some(EntityId(1)));
        assert_eq!(entity.position(&world), Vec2::new(200.0, 300.0));
    }

    #[test]
    fn test_die_is_idempotent() {
        let mut entity = pellet();
        entity.die();
        entity.die();
        assert!(!entity.is_alive());
    }

    #[test]
    fn test_detach_clears_body_and_sprite() {
        let tuning = Tuning::default();
        let mut world: PhysicsWorld<()> = PhysicsWorld::new();
        let mut entity = pellet();
        entity.attach(EntityId(1), &mut world, &tuning).unwrap();
        entity.detach(&mut world);
        assert!(entity.actor().is_none());
        assert!(entity.sprite().is_none());
        assert_eq!(world.body_count(), 0);
    }

    #[test]
    fn test_sprite_follows_body() {
        let tuning = Tuning::default();
        let mut world: PhysicsWorld<()> = PhysicsWorld::new();
        let mut entity = pellet();
        entity.attach(EntityId(1), &mut world, &tuning).unwrap();
        let handle = entity.actor().unwrap().physics.body;
        world.body_mut(handle).unwrap().position = Vec2::new(10.0, 20.0);

        let keys = KeySet::new();
        let mut rng = Pcg32::seed_from_u64(1);
        let mut ctx = TickContext {
            dt: 0.5,
            player_pos: Vec2::ZERO,
            keyboard: &keys,
            tuning: &tuning,
            rng: &mut rng,
        };
        entity.tick(&mut ctx, &mut world).unwrap();
        let sprite = entity.sprite().unwrap();
        assert_eq!(sprite.position, Vec2::new(10.0, 20.0));
        // 90 degrees per second for half a second
        assert!((sprite.rotation - std::f32::consts::FRAC_PI_4).abs() < 1e-5);
    }

    #[test]
    fn test_unregistered_entity_tick_is_noop() {
        let tuning = Tuning::default();
        let mut world: PhysicsWorld<()> = PhysicsWorld::new();
        let mut entity = pellet();
        let keys = KeySet::new();
        let mut rng = Pcg32::seed_from_u64(1);
        let mut ctx = TickContext {
            dt: 1.0,
            player_pos: Vec2::ZERO,
            keyboard: &keys,
            tuning: &tuning,
            rng: &mut rng,
        };
        entity.tick(&mut ctx, &mut world).unwrap();
        assert!(entity.sprite().is_none());
    }
}
