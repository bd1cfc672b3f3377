//! Game balance and arena parameters
//!
//! Loaded from JSON when the host has a tuning file, otherwise the built-in
//! defaults are used. Every field is optional in the file.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::error::ConfigError;
use crate::sim::enemy::{EnemyKind, EnemySpec};

/// Player parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerTuning {
    pub size: Vec2,
    pub mass: f32,
    /// Movement speed (units/s)
    pub speed: f32,
    /// Seconds between control rebinds (0 disables rebinding)
    pub rebind_interval: f32,
}

impl Default for PlayerTuning {
    fn default() -> Self {
        Self {
            size: Vec2::splat(PLAYER_SIZE),
            mass: PLAYER_MASS,
            speed: PLAYER_SPEED,
            rebind_interval: REBIND_INTERVAL,
        }
    }
}

/// Pellet parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PelletTuning {
    pub size: Vec2,
    pub mass: f32,
    /// Minimum distance from every wall
    pub inset: f32,
    /// Spin in degrees per second (cosmetic)
    pub spin: f32,
}

impl Default for PelletTuning {
    fn default() -> Self {
        Self {
            size: Vec2::splat(PELLET_SIZE),
            mass: PELLET_MASS,
            inset: PELLET_INSET,
            spin: 90.0,
        }
    }
}

/// Slider behaviour parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SliderTuning {
    /// Seconds spent waiting between slides
    pub wait_time: f32,
    /// Half-width of the band in which the slider dashes straight at the player
    pub intercept_band: f32,
    /// Multiplier turning an enemy's speed into slide progress rate
    pub slide_factor: f32,
}

impl Default for SliderTuning {
    fn default() -> Self {
        Self {
            wait_time: SLIDER_WAIT_TIME,
            intercept_band: SLIDER_INTERCEPT_BAND,
            slide_factor: SLIDER_SLIDE_FACTOR,
        }
    }
}

/// Complete tuning table
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    /// Visible arena size
    pub arena: Vec2,
    /// Walls sit this far outside the visible arena
    pub wall_margin: f32,
    /// Physics sub-steps per frame
    pub substeps: u32,
    pub player: PlayerTuning,
    pub pellet: PelletTuning,
    pub slider: SliderTuning,
    /// Enemy kinds that may spawn
    pub enemies: Vec<EnemySpec>,
    /// Seconds between spawn attempts
    pub spawn_interval: f32,
    /// Radius around the centre where spawns go to a random wall instead
    pub spawn_deadzone: f32,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            arena: Vec2::new(WIDTH, HEIGHT),
            wall_margin: WALL_MARGIN,
            substeps: PHYSICS_SUBSTEPS,
            player: PlayerTuning::default(),
            pellet: PelletTuning::default(),
            slider: SliderTuning::default(),
            enemies: vec![
                EnemySpec::default_for(EnemyKind::Pawn),
                EnemySpec::default_for(EnemyKind::Slider),
            ],
            spawn_interval: ENEMY_SPAWN_INTERVAL,
            spawn_deadzone: SPAWN_DEADZONE_RADIUS,
        }
    }
}

impl Tuning {
    /// Parse and validate a JSON tuning file
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let tuning: Tuning = serde_json::from_str(json)?;
        tuning.validate()?;
        log::info!(
            "Loaded tuning: arena {}x{}, {} enemy kinds",
            tuning.arena.x,
            tuning.arena.y,
            tuning.enemies.len()
        );
        Ok(tuning)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject anything that would build a broken physical entity
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_size("arena", self.arena)?;
        if self.substeps == 0 {
            return Err(ConfigError::ZeroSubsteps);
        }
        check_positive("wall margin", self.wall_margin)?;
        check_positive("spawn interval", self.spawn_interval)?;
        check_positive("slider wait time", self.slider.wait_time)?;
        check_positive("slider slide factor", self.slider.slide_factor)?;

        check_mass("player", self.player.mass)?;
        check_size("player", self.player.size)?;
        self.check_fits("player", self.player.size)?;

        check_mass("pellet", self.pellet.mass)?;
        check_size("pellet", self.pellet.size)?;
        let pellet_area = self.arena - Vec2::splat(self.pellet.inset * 2.0);
        if pellet_area.x <= 0.0 || pellet_area.y <= 0.0 {
            return Err(ConfigError::DoesNotFit {
                what: "pellet spawn area",
                width: self.pellet.inset * 2.0,
                height: self.pellet.inset * 2.0,
                arena_w: self.arena.x,
                arena_h: self.arena.y,
            });
        }

        for spec in &self.enemies {
            spec.validate()?;
            self.check_fits(spec.kind.name(), spec.size)?;
        }
        Ok(())
    }

    fn check_fits(&self, what: &'static str, size: Vec2) -> Result<(), ConfigError> {
        if size.x >= self.arena.x || size.y >= self.arena.y {
            return Err(ConfigError::DoesNotFit {
                what,
                width: size.x,
                height: size.y,
                arena_w: self.arena.x,
                arena_h: self.arena.y,
            });
        }
        Ok(())
    }
}

pub(crate) fn check_mass(what: &'static str, mass: f32) -> Result<(), ConfigError> {
    if mass.is_finite() && mass > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidMass { what, mass })
    }
}

pub(crate) fn check_size(what: &'static str, size: Vec2) -> Result<(), ConfigError> {
    if size.is_finite() && size.x > 0.0 && size.y > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::DegenerateSize {
            what,
            width: size.x,
            height: size.y,
        })
    }
}

fn check_positive(what: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NonPositive { what, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        Tuning::default().validate().unwrap();
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let tuning = Tuning::from_json(r#"{ "spawn_interval": 1.5, "player": { "speed": 250.0 } }"#)
            .unwrap();
        assert_eq!(tuning.spawn_interval, 1.5);
        assert_eq!(tuning.player.speed, 250.0);
        assert_eq!(tuning.player.mass, PLAYER_MASS);
        assert_eq!(tuning.arena, Vec2::new(WIDTH, HEIGHT));
        assert_eq!(tuning.enemies.len(), 2);
    }

    #[test]
    fn test_zero_mass_is_rejected() {
        let mut tuning = Tuning::default();
        tuning.player.mass = 0.0;
        assert!(matches!(
            tuning.validate(),
            Err(ConfigError::InvalidMass { what: "player", .. })
        ));
    }

    #[test]
    fn test_degenerate_enemy_size_is_rejected() {
        let json = r#"{ "enemies": [
            { "kind": "Pawn", "mass": 10.0, "size": [0.0, 32.0], "weight": 1.0, "cap": 3, "speed": 100.0 }
        ] }"#;
        assert!(matches!(
            Tuning::from_json(json),
            Err(ConfigError::DegenerateSize { .. })
        ));
    }

    #[test]
    fn test_enemy_larger_than_arena_is_rejected() {
        let mut tuning = Tuning::default();
        tuning.arena = Vec2::new(100.0, 100.0);
        tuning.pellet.inset = 10.0;
        assert!(matches!(
            tuning.validate(),
            Err(ConfigError::DoesNotFit { .. })
        ));
    }

    #[test]
    fn test_zero_substeps_is_rejected() {
        let mut tuning = Tuning::default();
        tuning.substeps = 0;
        assert!(matches!(tuning.validate(), Err(ConfigError::ZeroSubsteps)));
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        assert!(matches!(Tuning::from_json("{ nope"), Err(ConfigError::Json(_))));
    }

    #[test]
    fn test_json_roundtrip_preserves_enemy_table() {
        let json = Tuning::default().to_json().unwrap();
        let back = Tuning::from_json(&json).unwrap();
        assert_eq!(back.enemies, Tuning::default().enemies);
    }
}
