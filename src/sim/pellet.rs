//! Pellets: the only way to score

use std::f32::consts::TAU;

use super::physics::{Body, CollisionType, Shape, ShapeFilter, moment_for_box};
use crate::error::ConfigError;
use crate::tuning::PelletTuning;

/// Enemies walk straight through pellets
pub const PELLET_IGNORES: u32 = CollisionType::EnemyPawn.bits() | CollisionType::EnemySlider.bits();

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pellet {
    angle: f32,
}

impl Pellet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current spin angle in radians
    pub fn angle(&self) -> f32 {
        self.angle
    }

    pub(crate) fn tick(&mut self, dt: f32, spin_degrees: f32) {
        self.angle = (self.angle + spin_degrees.to_radians() * dt).rem_euclid(TAU);
    }

    pub(crate) fn physics(tuning: &PelletTuning) -> Result<(Body, Shape), ConfigError> {
        let body = Body::dynamic(tuning.mass, moment_for_box(tuning.mass, tuning.size))?;
        let shape = Shape::boxed(tuning.size, 0.0, CollisionType::Pellet)?
            .with_filter(ShapeFilter::excluding(CollisionType::Pellet, PELLET_IGNORES));
        Ok((body, shape))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spin_wraps_around() {
        let mut pellet = Pellet::new();
        for _ in 0..5 {
            pellet.tick(1.0, 90.0);
        }
        assert!((pellet.angle() - std::f32::consts::FRAC_PI_2).abs() < 1e-4);
    }

    #[test]
    fn test_filter_skips_enemies() {
        let (_, shape) = Pellet::physics(&PelletTuning::default()).unwrap();
        assert_eq!(shape.filter.categories, CollisionType::Pellet.bits());
        assert_eq!(shape.filter.mask & CollisionType::EnemyPawn.bits(), 0);
        assert_eq!(shape.filter.mask & CollisionType::EnemySlider.bits(), 0);
        assert_ne!(shape.filter.mask & CollisionType::Player.bits(), 0);
    }
}
