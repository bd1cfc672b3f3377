//! Fixed timestep simulation tick
//!
//! One frame: level scheduling, entity behaviour, reaping, spawning, then a
//! handful of physics sub-steps so fast bodies cannot skip through walls.

use glam::Vec2;
use rand::SeedableRng;
use rand_pcg::Pcg32;

use super::entity::{Entity, EntityKind, TickContext};
use super::physics::{CollisionType, PhysicsWorld, Shape};
use super::player::Player;
use super::rules::register_collision_policies;
use super::state::{GamePhase, Scene};
use crate::arena_center;
use crate::error::SimError;
use crate::input::KeyboardState;
use crate::render::{RenderSink, SpriteView};
use crate::tuning::Tuning;

/// What a frame produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// No round in progress, nothing simulated
    Idle,
    Running,
    /// The round ended during this frame (reported once)
    RoundOver { score: u32 },
}

/// The whole game world: physics, entities and the round around them
pub struct Simulation {
    physics: PhysicsWorld<Scene>,
    scene: Scene,
    phase: GamePhase,
}

impl Simulation {
    /// New simulation sitting in the menu; all randomness comes from `seed`
    pub fn new(tuning: Tuning, seed: u64) -> Result<Self, SimError> {
        tuning.validate()?;
        let rng = Pcg32::seed_from_u64(seed);
        Ok(Self {
            physics: PhysicsWorld::new(),
            scene: Scene::new(tuning, rng),
            phase: GamePhase::Menu,
        })
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn score(&self) -> u32 {
        self.scene.score()
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn physics(&self) -> &PhysicsWorld<Scene> {
        &self.physics
    }

    pub fn tuning(&self) -> &Tuning {
        self.scene.tuning()
    }

    pub fn player(&self) -> Option<&Player> {
        self.scene
            .player_id()
            .and_then(|id| self.scene.entity(id))
            .and_then(Entity::as_player)
    }

    pub fn player_position(&self) -> Option<Vec2> {
        self.scene.player_position(&self.physics)
    }

    /// Throw away the old round and set up a fresh arena
    pub fn start_round(&mut self) -> Result<(), SimError> {
        self.physics = PhysicsWorld::new();
        register_collision_policies(&mut self.physics);
        self.scene.reset();
        self.build_walls()?;

        let tuning = &self.scene.tuning;
        let player = Player::new(&tuning.player, &mut self.scene.rng);
        let center = arena_center(tuning.arena);
        self.scene
            .register(Entity::new(EntityKind::Player(player), center), &mut self.physics)?;

        self.scene
            .level
            .spawn_pellet(&self.scene.tuning, &mut self.scene.rng);
        self.instantiate(Vec::new())?;

        self.phase = GamePhase::Playing;
        log::info!("Round started");
        Ok(())
    }

    /// Static segments just outside the visible arena
    fn build_walls(&mut self) -> Result<(), SimError> {
        let size = self.scene.tuning.arena;
        let m = self.scene.tuning.wall_margin;
        let corners = [
            Vec2::new(-m, -m),
            Vec2::new(size.x + m, -m),
            Vec2::new(size.x + m, size.y + m),
            Vec2::new(-m, size.y + m),
        ];
        for i in 0..corners.len() {
            let (a, b) = (corners[i], corners[(i + 1) % corners.len()]);
            self.physics
                .add_static(Shape::segment(a, b, 0.0, CollisionType::WALL)?);
        }
        Ok(())
    }

    /// Advance one frame
    ///
    /// Outside of a round this does nothing and returns [`FrameOutcome::Idle`].
    pub fn tick(&mut self, keyboard: &dyn KeyboardState, dt: f32) -> Result<FrameOutcome, SimError> {
        if self.phase != GamePhase::Playing {
            return Ok(FrameOutcome::Idle);
        }

        let player_pos = self
            .player_position()
            .unwrap_or_else(|| arena_center(self.scene.tuning.arena));

        let spawns = {
            let Scene {
                entities,
                level,
                tuning,
                rng,
                ..
            } = &mut self.scene;

            level.tick(dt, player_pos, entities, tuning, rng);
            let mut spawns: Vec<Entity> = level.new_objects.drain(..).collect();

            let mut ctx = TickContext {
                dt,
                player_pos,
                keyboard,
                tuning: &*tuning,
                rng,
            };
            for entity in entities.values_mut() {
                if !entity.is_alive() {
                    continue;
                }
                entity.tick(&mut ctx, &mut self.physics)?;
                spawns.append(&mut entity.new_objects);
            }
            spawns
        };

        // Spawns requested by entities that died this frame still happen
        let reaped = self.scene.reap(&mut self.physics);
        if reaped > 0 {
            log::trace!("Reaped {reaped} entities");
        }
        self.instantiate(spawns)?;

        let substeps = self.scene.tuning.substeps.max(1);
        let step_dt = dt / substeps as f32;
        for _ in 0..substeps {
            self.physics.step(step_dt, &mut self.scene)?;
            if self.scene.round_over().is_some() {
                break;
            }
        }

        self.scene.sync_sprites(&self.physics);

        if let Some(score) = self.scene.round_over() {
            self.phase = GamePhase::GameOver { score };
            return Ok(FrameOutcome::RoundOver { score });
        }
        Ok(FrameOutcome::Running)
    }

    /// Register queued entities (plus anything still waiting in the level queue)
    fn instantiate(&mut self, mut spawns: Vec<Entity>) -> Result<(), SimError> {
        spawns.extend(self.scene.level.new_objects.drain(..));
        for entity in spawns {
            if let Some(id) = self.scene.register(entity, &mut self.physics)? {
                log::trace!("Registered {id:?}");
            }
        }
        Ok(())
    }

    /// Hand every visible sprite to the renderer, in id order
    pub fn render(&self, sink: &mut dyn RenderSink) {
        for (entity, e) in self.scene.entities() {
            if !e.is_alive() {
                continue;
            }
            if let Some(sprite) = e.sprite().filter(|s| s.visible) {
                sink.draw(SpriteView { entity, sprite });
            }
        }
    }
}
