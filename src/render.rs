//! Sprite snapshot for the rendering collaborator
//!
//! The simulation never draws. Each live entity carries a `Sprite` that the
//! loop keeps in sync with its physics body; the host walks them every frame.

use glam::Vec2;

use crate::sim::entity::EntityId;

/// Which image a sprite shows (resolved by the host's resource table)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageKey {
    Player,
    Pellet,
    EnemyPawn,
    EnemySlider,
}

/// Render state of one entity
#[derive(Debug, Clone, PartialEq)]
pub struct Sprite {
    pub image: ImageKey,
    /// Centre of the sprite in arena coordinates
    pub position: Vec2,
    /// Facing in radians, counter-clockwise from +x
    pub rotation: f32,
    pub visible: bool,
    /// 0 = transparent, 255 = opaque
    pub opacity: u8,
}

impl Sprite {
    pub fn new(image: ImageKey, position: Vec2) -> Self {
        Self {
            image,
            position,
            rotation: 0.0,
            visible: true,
            opacity: 255,
        }
    }
}

/// One sprite as handed to the renderer
#[derive(Debug, Clone, Copy)]
pub struct SpriteView<'a> {
    pub entity: EntityId,
    pub sprite: &'a Sprite,
}

/// Receives sprites each frame
pub trait RenderSink {
    fn draw(&mut self, view: SpriteView<'_>);
}

impl RenderSink for Vec<(EntityId, Sprite)> {
    fn draw(&mut self, view: SpriteView<'_>) {
        self.push((view.entity, view.sprite.clone()));
    }
}
