//! Error types
//!
//! Broken configuration is caught when things are built, never mid-frame.
//! Anything a collision callback reports is a broken invariant and stops the loop.

use thiserror::Error;

use crate::sim::entity::EntityId;
use crate::sim::physics::ShapeHandle;

/// Invalid tuning or entity parameters
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{what}: mass must be finite and positive, got {mass}")]
    InvalidMass { what: &'static str, mass: f32 },
    #[error("{what}: size must be finite and positive on both axes, got {width}x{height}")]
    DegenerateSize {
        what: &'static str,
        width: f32,
        height: f32,
    },
    #[error("{what}: spawn weight must be finite and positive, got {weight}")]
    InvalidWeight { what: &'static str, weight: f32 },
    #[error("{what}: {value} must be finite and positive")]
    NonPositive { what: &'static str, value: f32 },
    #[error("physics sub-steps must be at least 1")]
    ZeroSubsteps,
    #[error("{what} ({width}x{height}) does not fit inside the {arena_w}x{arena_h} arena")]
    DoesNotFit {
        what: &'static str,
        width: f32,
        height: f32,
        arena_w: f32,
        arena_h: f32,
    },
    #[error("segment from {a:?} to {b:?} is not axis-aligned")]
    SkewedSegment { a: (f32, f32), b: (f32, f32) },
    #[error("segment from {a:?} to {b:?} has no length and no radius")]
    DegenerateSegment { a: (f32, f32), b: (f32, f32) },
    #[error("malformed tuning file: {0}")]
    Json(#[from] serde_json::Error),
}

/// Fatal simulation faults
#[derive(Debug, Error)]
pub enum SimError {
    #[error("shape {0:?} has no owning entity")]
    MissingOwner(ShapeHandle),
    #[error("entity {0:?} is not in the entity table")]
    UnknownEntity(EntityId),
    #[error("entity {0:?} lost its physics body")]
    MissingBody(EntityId),
    #[error("entity {id:?} has the wrong kind for {expected}")]
    WrongKind { id: EntityId, expected: &'static str },
    #[error(transparent)]
    Config(#[from] ConfigError),
}
