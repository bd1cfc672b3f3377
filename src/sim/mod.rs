//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Fixed timestep only
//! - Seeded RNG only
//! - Stable iteration order (by entity ID)
//! - No rendering or platform dependencies

pub mod easing;
pub mod enemy;
pub mod entity;
pub mod level;
pub mod pellet;
pub mod physics;
pub mod player;
pub mod rules;
pub mod state;
pub mod tick;

pub use enemy::{Enemy, EnemyKind, EnemySpec, SliderState};
pub use entity::{Entity, EntityId, EntityKind};
pub use physics::{CollisionType, PhysicsWorld, ShapeFilter};
pub use player::{Direction, Player};
pub use state::{GamePhase, Scene};
pub use tick::{FrameOutcome, Simulation};
