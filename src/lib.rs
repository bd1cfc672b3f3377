//! Hell Arena - dodge the enemies, grab the pellets, stay off the walls
//!
//! Core modules:
//! - `sim`: Simulation core (physics world, entities, collision rules, spawning, tick loop)
//! - `tuning`: Data-driven game balance
//! - `input`: Keyboard state as seen by the simulation
//! - `render`: Sprite snapshot handed to whatever draws the frame
//! - `highscores`: Ranked top-10 list (storage is up to the host)

pub mod error;
pub mod highscores;
pub mod input;
pub mod render;
pub mod sim;
pub mod tuning;

pub use error::{ConfigError, SimError};
pub use highscores::HighScores;
pub use sim::{FrameOutcome, Simulation};
pub use tuning::Tuning;

use glam::Vec2;

/// Game configuration constants
pub mod consts {
    /// Arena dimensions (y axis points up, origin bottom-left)
    pub const WIDTH: f32 = 1280.0;
    pub const HEIGHT: f32 = 960.0;

    /// Logical frames per second
    pub const TPS: f32 = 60.0;
    /// Fixed frame timestep
    pub const SIM_DT: f32 = 1.0 / TPS;
    /// Physics sub-steps per frame (keeps the player from tunnelling through walls)
    pub const PHYSICS_SUBSTEPS: u32 = 10;

    /// Walls sit this far outside the visible arena
    pub const WALL_MARGIN: f32 = 32.0;

    /// Player defaults
    pub const PLAYER_SIZE: f32 = 32.0;
    pub const PLAYER_MASS: f32 = 50.0;
    pub const PLAYER_SPEED: f32 = 400.0;
    /// Seconds between control rebinds
    pub const REBIND_INTERVAL: f32 = 5.0;

    /// Pellet defaults
    pub const PELLET_SIZE: f32 = 16.0;
    pub const PELLET_MASS: f32 = 50.0;
    /// Pellets never spawn closer than this to a wall
    pub const PELLET_INSET: f32 = 100.0;

    /// Seconds between enemy spawn attempts
    pub const ENEMY_SPAWN_INTERVAL: f32 = 2.0;
    /// Radius around the arena centre treated as "player in the middle"
    pub const SPAWN_DEADZONE_RADIUS: f32 = 50.0;

    /// Slider behaviour
    pub const SLIDER_WAIT_TIME: f32 = 3.0;
    pub const SLIDER_INTERCEPT_BAND: f32 = 64.0;
    pub const SLIDER_SLIDE_FACTOR: f32 = 5.0;
}

/// Center of an arena of the given size
#[inline]
pub fn arena_center(size: Vec2) -> Vec2 {
    size * 0.5
}

/// Mirror a point through the arena centre
#[inline]
pub fn mirror_through_center(pos: Vec2, size: Vec2) -> Vec2 {
    size - pos
}
