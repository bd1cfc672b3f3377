//! Collision policies between entity kinds
//!
//! | pair               | hook        | effect                                    |
//! |--------------------|-------------|-------------------------------------------|
//! | player x wall      | post_solve  | first contact ends the round              |
//! | player x pellet    | pre_solve   | collect, no physical response             |
//! | player x slider    | pre_solve   | shove the player along the slider's lunge |
//! | pawn/slider x wall | begin       | ignored, enemies pass through walls       |
//!
//! Enemies never see pellets at all: the pellet's shape filter drops them.

use super::physics::{CollisionType, PhysicsWorld, callback};
use super::state::Scene;

pub fn register_collision_policies(physics: &mut PhysicsWorld<Scene>) {
    physics
        .add_collision_handler(CollisionType::Player, CollisionType::WALL)
        .post_solve = Some(callback(|arbiter, scene: &mut Scene| {
        if arbiter.is_first_contact() {
            log::trace!("Player hit a wall at {:?}", arbiter.point());
            scene.end_round();
        }
        Ok(true)
    }));

    physics
        .add_collision_handler(CollisionType::Player, CollisionType::Pellet)
        .pre_solve = Some(callback(|arbiter, scene: &mut Scene| {
        scene.collect_pellet(arbiter.owner(1)?)?;
        Ok(false)
    }));

    physics
        .add_collision_handler(CollisionType::Player, CollisionType::EnemySlider)
        .pre_solve = Some(callback(|arbiter, scene: &mut Scene| {
        let direction = scene.slide_direction(arbiter.owner(1)?)?;
        let push = direction * arbiter.depth();
        if let Some(player) = arbiter.body_mut(0) {
            player.position += push;
        }
        Ok(false)
    }));

    for enemy in [CollisionType::EnemyPawn, CollisionType::EnemySlider] {
        physics.add_collision_handler(enemy, CollisionType::WALL).begin =
            Some(callback(|_, _: &mut Scene| Ok(false)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::SIM_DT;
    use crate::input::KeySet;
    use crate::sim::enemy::{Enemy, EnemyKind, EnemySpec};
    use crate::sim::entity::{Entity, EntityId, EntityKind, TickContext};
    use crate::sim::pellet::Pellet;
    use crate::sim::physics::{Body, Shape};
    use crate::sim::player::Player;
    use crate::tuning::Tuning;
    use glam::Vec2;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    struct Rig {
        physics: PhysicsWorld<Scene>,
        scene: Scene,
    }

    impl Rig {
        fn new() -> Self {
            let mut physics = PhysicsWorld::new();
            register_collision_policies(&mut physics);
            Self {
                physics,
                scene: Scene::new(Tuning::default(), Pcg32::seed_from_u64(0)),
            }
        }

        fn add(&mut self, kind: EntityKind, at: Vec2) -> EntityId {
            self.scene
                .register(Entity::new(kind, at), &mut self.physics)
                .unwrap()
                .unwrap()
        }

        fn player(&mut self, at: Vec2) -> EntityId {
            let player = Player::new(&self.scene.tuning.player, &mut self.scene.rng);
            self.add(EntityKind::Player(player), at)
        }

        fn enemy(&mut self, kind: EnemyKind, at: Vec2) -> EntityId {
            let enemy = Enemy::new(EnemySpec::default_for(kind), &mut self.scene.rng);
            self.add(EntityKind::Enemy(enemy), at)
        }

        fn wall(&mut self, a: Vec2, b: Vec2) {
            self.physics
                .add_static(Shape::segment(a, b, 0.0, CollisionType::WALL).unwrap());
        }

        fn body(&self, id: EntityId) -> &Body {
            let handle = self.scene.entity(id).unwrap().actor().unwrap().physics.body;
            self.physics.body(handle).unwrap()
        }

        fn tick_entities(&mut self, player_pos: Vec2, dt: f32) {
            let keys = KeySet::new();
            let Scene {
                entities,
                tuning,
                rng,
                ..
            } = &mut self.scene;
            let mut ctx = TickContext {
                dt,
                player_pos,
                keyboard: &keys,
                tuning: &*tuning,
                rng,
            };
            for entity in entities.values_mut() {
                entity.tick(&mut ctx, &mut self.physics).unwrap();
            }
        }

        fn step(&mut self) {
            self.physics.step(0.001, &mut self.scene).unwrap();
        }
    }

    #[test]
    fn test_touching_a_pellet_scores_once() {
        let mut rig = Rig::new();
        let player = rig.player(Vec2::new(100.0, 100.0));
        let pellet = rig.add(EntityKind::Pellet(Pellet::new()), Vec2::new(110.0, 100.0));
        for _ in 0..5 {
            rig.step();
        }
        assert_eq!(rig.scene.score(), 1);
        assert_eq!(rig.scene.level().new_objects.len(), 1);
        assert!(!rig.scene.entity(pellet).unwrap().is_alive());
        // No physical push either way
        assert_eq!(rig.body(player).position, Vec2::new(100.0, 100.0));
    }

    #[test]
    fn test_wall_contact_ends_round_once() {
        let mut rig = Rig::new();
        rig.wall(Vec2::new(0.0, -100.0), Vec2::new(0.0, 500.0));
        // Two units short of the wall (16 half size plus 2 rounding)
        let player = rig.player(Vec2::new(-20.0, 100.0));
        let handle = rig.scene.entity(player).unwrap().actor().unwrap().physics.body;
        for _ in 0..5 {
            // Lean into the wall once per frame, like the player's own tick
            rig.physics.body_mut(handle).unwrap().velocity = Vec2::new(400.0, 0.0);
            for _ in 0..10 {
                rig.physics.step(SIM_DT / 10.0, &mut rig.scene).unwrap();
            }
        }
        assert_eq!(rig.scene.round_over(), Some(0));
        assert_eq!(rig.scene.round_end_events(), 1);
        assert_eq!(rig.physics.contact_count(), 1);
        // Default response still kept the player out of the wall
        let x = rig.body(player).position.x;
        assert!(x <= -18.0 + 0.5, "x = {x}");
    }

    #[test]
    fn test_enemies_ignore_walls() {
        let mut rig = Rig::new();
        rig.wall(Vec2::new(0.0, -100.0), Vec2::new(0.0, 500.0));
        let pawn = rig.enemy(EnemyKind::Pawn, Vec2::new(-5.0, 100.0));
        rig.step();
        assert_eq!(rig.body(pawn).position, Vec2::new(-5.0, 100.0));
        assert_eq!(rig.scene.round_over(), None);
    }

    #[test]
    fn test_enemies_pass_over_pellets() {
        let mut rig = Rig::new();
        let pellet = rig.add(EntityKind::Pellet(Pellet::new()), Vec2::new(300.0, 300.0));
        let pawn = rig.enemy(EnemyKind::Pawn, Vec2::new(305.0, 300.0));
        rig.step();
        assert!(rig.scene.entity(pellet).unwrap().is_alive());
        assert_eq!(rig.body(pawn).position, Vec2::new(305.0, 300.0));
        assert_eq!(rig.physics.contact_count(), 0);
    }

    #[test]
    fn test_slider_shoves_player_along_its_lunge() {
        let mut rig = Rig::new();
        let slider = rig.enemy(EnemyKind::Slider, Vec2::new(400.0, 400.0));
        // Player far right in the slider's row: it plans a lunge towards +x
        rig.tick_entities(Vec2::new(900.0, 400.0), 0.01);

        // Player overlapping the slider's right face by 7 (rounding included)
        let player = rig.player(Vec2::new(476.0, 400.0));
        rig.step();
        let pushed = rig.body(player).position;
        assert!((pushed.x - 483.0).abs() < 1e-2, "{pushed:?}");
        assert_eq!(pushed.y, 400.0);
        // The slider itself does not budge
        assert_eq!(rig.body(slider).position, Vec2::new(400.0, 400.0));
    }
}
