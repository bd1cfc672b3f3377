//! Enemy kinds and their behaviour
//!
//! Pawns walk straight at the player. Sliders sit still, line themselves up,
//! then lunge along a single axis with a bouncing ease and wait again.

use glam::Vec2;
use rand::Rng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::easing::ease_out_bounce;
use super::entity::TickContext;
use super::physics::{Body, CollisionType, Shape, moment_for_box};
use crate::error::ConfigError;
use crate::render::ImageKey;
use crate::tuning::{SliderTuning, check_mass, check_size};

/// Rounding radius of enemy boxes
const ENEMY_ROUNDING: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EnemyKind {
    /// Small chaser
    Pawn,
    /// Big axis-aligned lunger
    Slider,
}

impl EnemyKind {
    pub fn name(self) -> &'static str {
        match self {
            EnemyKind::Pawn => "pawn",
            EnemyKind::Slider => "slider",
        }
    }

    pub fn collision_type(self) -> CollisionType {
        match self {
            EnemyKind::Pawn => CollisionType::EnemyPawn,
            EnemyKind::Slider => CollisionType::EnemySlider,
        }
    }

    pub fn image(self) -> ImageKey {
        match self {
            EnemyKind::Pawn => ImageKey::EnemyPawn,
            EnemyKind::Slider => ImageKey::EnemySlider,
        }
    }
}

/// Static per-kind data, shared by every enemy of that kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnemySpec {
    pub kind: EnemyKind,
    pub mass: f32,
    /// Full box size
    pub size: Vec2,
    /// Relative spawn likelihood
    pub weight: f32,
    /// Most that may be alive at once
    pub cap: usize,
    /// Pawn walking speed, or slider lunge speed
    pub speed: f32,
}

impl EnemySpec {
    pub fn default_for(kind: EnemyKind) -> Self {
        match kind {
            EnemyKind::Pawn => Self {
                kind,
                mass: 10.0,
                size: Vec2::splat(32.0),
                weight: 80.0,
                cap: 8,
                speed: 100.0,
            },
            EnemyKind::Slider => Self {
                kind,
                mass: 500.0,
                size: Vec2::splat(128.0),
                weight: 20.0,
                cap: 2,
                speed: 100.0,
            },
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let what = self.kind.name();
        check_mass(what, self.mass)?;
        check_size(what, self.size)?;
        if !(self.weight.is_finite() && self.weight > 0.0) {
            return Err(ConfigError::InvalidWeight {
                what,
                weight: self.weight,
            });
        }
        if !(self.speed.is_finite() && self.speed > 0.0) {
            return Err(ConfigError::NonPositive {
                what: "enemy speed",
                value: self.speed,
            });
        }
        Ok(())
    }

    pub fn half_extents(&self) -> Vec2 {
        self.size * 0.5
    }

    pub(crate) fn physics(&self) -> Result<(Body, Shape), ConfigError> {
        let body = Body::dynamic(self.mass, moment_for_box(self.mass, self.size))?;
        let shape = Shape::boxed(self.size, ENEMY_ROUNDING, self.kind.collision_type())?;
        Ok((body, shape))
    }
}

/// Slider state machine
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SliderState {
    Waiting { wait_timer: f32 },
    Moving { progress: f32 },
}

#[derive(Debug, Clone)]
pub struct Slider {
    state: SliderState,
    start: Vec2,
    end: Vec2,
    x_axis_preferred: bool,
}

impl Slider {
    fn new(rng: &mut Pcg32) -> Self {
        Self {
            state: SliderState::Waiting { wait_timer: 0.0 },
            start: Vec2::ZERO,
            end: Vec2::ZERO,
            x_axis_preferred: rng.random_bool(0.5),
        }
    }

    pub fn state(&self) -> SliderState {
        self.state
    }

    /// Planned (or current) lunge as start and end points
    pub fn path(&self) -> (Vec2, Vec2) {
        (self.start, self.end)
    }

    /// Unit vector of the planned lunge (zero when it goes nowhere)
    pub fn direction(&self) -> Vec2 {
        (self.end - self.start).normalize_or_zero()
    }

    fn tick(&mut self, spec: &EnemySpec, ctx: &mut TickContext<'_>, body: &mut Body) {
        let tuning = &ctx.tuning.slider;

        if let SliderState::Waiting { wait_timer } = self.state {
            let wait_timer = wait_timer + ctx.dt;
            self.plan(body.position, ctx.player_pos, ctx.tuning.arena, spec.half_extents(), tuning);
            self.state = if wait_timer >= tuning.wait_time {
                SliderState::Moving { progress: 0.0 }
            } else {
                SliderState::Waiting { wait_timer }
            };
        }

        if let SliderState::Moving { progress } = self.state {
            let distance = self.start.distance(self.end);
            let progress = if distance <= f32::EPSILON {
                1.0
            } else {
                progress + ctx.dt * tuning.slide_factor * spec.speed / distance
            };
            body.position = self.start + (self.end - self.start) * ease_out_bounce(progress.min(1.0));

            if progress >= 1.0 {
                self.state = SliderState::Waiting { wait_timer: 0.0 };
                self.x_axis_preferred = ctx.rng.random_bool(0.5);
            } else {
                self.state = SliderState::Moving { progress };
            }
        }

        // Never drift from pushes
        body.velocity = Vec2::ZERO;
    }

    /// Pick the next lunge from where we stand
    fn plan(&mut self, pos: Vec2, player: Vec2, arena: Vec2, half: Vec2, tuning: &SliderTuning) {
        let delta = player - pos;
        let band = tuning.intercept_band;

        self.start = pos;
        self.end = if delta.y.abs() < band {
            let x = if delta.x > 0.0 { arena.x - half.x } else { half.x };
            Vec2::new(x, pos.y)
        } else if delta.x.abs() < band {
            let y = if delta.y > 0.0 { arena.y - half.y } else { half.y };
            Vec2::new(pos.x, y)
        } else if self.x_axis_preferred {
            Vec2::new(player.x, pos.y)
        } else {
            Vec2::new(pos.x, player.y)
        };
    }
}

#[derive(Debug, Clone)]
pub enum Behaviour {
    Pawn,
    Slider(Slider),
}

#[derive(Debug, Clone)]
pub struct Enemy {
    spec: EnemySpec,
    behaviour: Behaviour,
    /// Sprite facing in radians
    facing: f32,
}

impl Enemy {
    pub fn new(spec: EnemySpec, rng: &mut Pcg32) -> Self {
        let behaviour = match spec.kind {
            EnemyKind::Pawn => Behaviour::Pawn,
            EnemyKind::Slider => Behaviour::Slider(Slider::new(rng)),
        };
        Self {
            spec,
            behaviour,
            facing: 0.0,
        }
    }

    pub fn kind(&self) -> EnemyKind {
        self.spec.kind
    }

    pub fn spec(&self) -> &EnemySpec {
        &self.spec
    }

    pub fn facing(&self) -> f32 {
        self.facing
    }

    pub fn as_slider(&self) -> Option<&Slider> {
        match &self.behaviour {
            Behaviour::Slider(slider) => Some(slider),
            Behaviour::Pawn => None,
        }
    }

    pub(crate) fn tick(&mut self, ctx: &mut TickContext<'_>, body: &mut Body) {
        let heading = match &mut self.behaviour {
            Behaviour::Pawn => {
                let to_player = (ctx.player_pos - body.position).normalize_or_zero();
                body.velocity = to_player * self.spec.speed;
                to_player
            }
            Behaviour::Slider(slider) => {
                slider.tick(&self.spec, ctx, body);
                slider.end - slider.start
            }
        };
        if heading != Vec2::ZERO {
            self.facing = heading.y.atan2(heading.x);
        }
    }
}
