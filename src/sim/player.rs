//! The player and its shuffling controls
//!
//! Movement keys start out as W/A/S/D. Every few seconds one direction is moved
//! to a random unused key; the label of the direction about to change blinks
//! for the last moments before it does.

use glam::Vec2;
use rand::Rng;
use rand::seq::SliceRandom;
use rand_pcg::Pcg32;

use super::easing::{blink, ease_in_cubic, ease_out_cubic};
use super::entity::TickContext;
use super::physics::{Body, CollisionType, Shape, moment_for_box};
use crate::error::ConfigError;
use crate::input::Key;
use crate::tuning::PlayerTuning;

/// Rounding radius of the player's box
const PLAYER_ROUNDING: f32 = 2.0;
/// How long before a rebind the label starts blinking
const BLINK_LEAD: f32 = 1.5;
/// One fade-out/fade-in cycle
const BLINK_PERIOD: f32 = 0.5;

/// Movement direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Left,
    Down,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Left,
        Direction::Down,
        Direction::Right,
    ];

    /// Unit step for this direction (y up)
    pub fn delta(self) -> Vec2 {
        match self {
            Direction::Up => Vec2::Y,
            Direction::Left => Vec2::NEG_X,
            Direction::Down => Vec2::NEG_Y,
            Direction::Right => Vec2::X,
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone)]
pub struct Player {
    /// Key bound to each direction, indexed by `Direction`
    bindings: [Key; 4],
    rebind_timer: f32,
    next_direction: Direction,
    /// Directions still to be rebound before reshuffling
    bag: Vec<Direction>,
    /// Alpha of the label for `next_direction`
    next_alpha: u8,
}

impl Player {
    pub fn new(tuning: &PlayerTuning, rng: &mut Pcg32) -> Self {
        let mut player = Self {
            bindings: [Key('w'), Key('a'), Key('s'), Key('d')],
            rebind_timer: tuning.rebind_interval,
            next_direction: Direction::Up,
            bag: Vec::new(),
            next_alpha: 255,
        };
        player.next_direction = player.draw_direction(rng);
        player
    }

    pub fn binding(&self, direction: Direction) -> Key {
        self.bindings[direction.index()]
    }

    /// Current key for every direction
    pub fn bindings(&self) -> impl Iterator<Item = (Direction, Key)> + '_ {
        Direction::ALL.into_iter().map(|dir| (dir, self.binding(dir)))
    }

    /// Seconds until the next rebind
    pub fn rebind_timer(&self) -> f32 {
        self.rebind_timer
    }

    /// Direction whose key changes next
    pub fn next_direction(&self) -> Direction {
        self.next_direction
    }

    /// Label alpha for a direction (only the next one to change ever blinks)
    pub fn label_alpha(&self, direction: Direction) -> u8 {
        if direction == self.next_direction {
            self.next_alpha
        } else {
            255
        }
    }

    pub(crate) fn physics(tuning: &PlayerTuning) -> Result<(Body, Shape), ConfigError> {
        let body = Body::dynamic(tuning.mass, moment_for_box(tuning.mass, tuning.size))?;
        let shape = Shape::boxed(tuning.size, PLAYER_ROUNDING, CollisionType::Player)?;
        Ok((body, shape))
    }

    pub(crate) fn tick(&mut self, ctx: &mut TickContext<'_>, body: &mut Body) {
        let heading: Vec2 = Direction::ALL
            .into_iter()
            .filter(|&dir| ctx.keyboard.is_down(self.binding(dir)))
            .map(Direction::delta)
            .sum();
        body.velocity = heading.normalize_or_zero() * ctx.tuning.player.speed;

        let interval = ctx.tuning.player.rebind_interval;
        if interval <= 0.0 {
            return;
        }

        self.rebind_timer -= ctx.dt;
        if self.rebind_timer <= 0.0 {
            self.rebind_timer = interval;
            self.rebind(ctx.rng);
        }

        self.next_alpha = if self.rebind_timer < BLINK_LEAD {
            let phase = self.rebind_timer.rem_euclid(BLINK_PERIOD);
            blink(phase, ease_in_cubic, ease_out_cubic, BLINK_PERIOD)
        } else {
            255
        };
    }

    /// Move the pending direction to a random key nobody is using
    fn rebind(&mut self, rng: &mut Pcg32) {
        let free: Vec<Key> = Key::bindable()
            .filter(|key| !self.bindings.contains(key))
            .collect();
        if !free.is_empty() {
            let key = free[rng.random_range(0..free.len())];
            log::debug!("{:?} rebound to {}", self.next_direction, key.label());
            self.bindings[self.next_direction.index()] = key;
        }
        self.next_direction = self.draw_direction(rng);
    }

    fn draw_direction(&mut self, rng: &mut Pcg32) -> Direction {
        if self.bag.is_empty() {
            self.bag.extend(Direction::ALL);
            self.bag.shuffle(rng);
        }
        self.bag.pop().unwrap_or(Direction::Up)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::KeySet;
    use crate::tuning::Tuning;
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn run(player: &mut Player, body: &mut Body, keys: &KeySet, tuning: &Tuning, rng: &mut Pcg32, dt: f32) {
        let mut ctx = TickContext {
            dt,
            player_pos: body.position,
            keyboard: keys,
            tuning,
            rng,
        };
        player.tick(&mut ctx, body);
    }

    fn setup() -> (Player, Body, Tuning, Pcg32) {
        let tuning = Tuning::default();
        let mut rng = Pcg32::seed_from_u64(7);
        let player = Player::new(&tuning.player, &mut rng);
        let (body, _) = Player::physics(&tuning.player).unwrap();
        (player, body, tuning, rng)
    }

    #[test]
    fn test_starts_on_wasd() {
        let (player, ..) = setup();
        let keys: Vec<Key> = player.bindings().map(|(_, key)| key).collect();
        assert_eq!(keys, vec![Key('w'), Key('a'), Key('s'), Key('d')]);
    }

    #[test]
    fn test_diagonal_movement_is_normalized() {
        let (mut player, mut body, tuning, mut rng) = setup();
        let keys: KeySet = ['w', 'd'].into_iter().collect();
        run(&mut player, &mut body, &keys, &tuning, &mut rng, 0.01);
        assert!((body.velocity.length() - tuning.player.speed).abs() < 1e-3);
        assert!(body.velocity.x > 0.0 && body.velocity.y > 0.0);
    }

    #[test]
    fn test_opposite_keys_cancel() {
        let (mut player, mut body, tuning, mut rng) = setup();
        let keys: KeySet = ['a', 'd'].into_iter().collect();
        run(&mut player, &mut body, &keys, &tuning, &mut rng, 0.01);
        assert_eq!(body.velocity, Vec2::ZERO);
    }

    #[test]
    fn test_rebinds_one_direction_per_interval() {
        let (mut player, mut body, tuning, mut rng) = setup();
        let keys = KeySet::new();
        let pending = player.next_direction();
        let before = player.binding(pending);

        run(&mut player, &mut body, &keys, &tuning, &mut rng, 4.9);
        assert_eq!(player.binding(pending), before);

        run(&mut player, &mut body, &keys, &tuning, &mut rng, 0.2);
        assert_ne!(player.binding(pending), before);
        let unique: HashSet<Key> = player.bindings().map(|(_, key)| key).collect();
        assert_eq!(unique.len(), 4);
        assert!((player.rebind_timer() - tuning.player.rebind_interval).abs() < 1e-6);
    }

    #[test]
    fn test_every_direction_rebinds_once_per_bag() {
        let (mut player, mut body, tuning, mut rng) = setup();
        let keys = KeySet::new();
        let mut seen = HashSet::new();
        for _ in 0..4 {
            seen.insert(player.next_direction());
            run(&mut player, &mut body, &keys, &tuning, &mut rng, tuning.player.rebind_interval);
        }
        assert_eq!(seen.len(), 4);
    }

    #[test]
    fn test_pending_label_blinks_before_rebind() {
        let (mut player, mut body, tuning, mut rng) = setup();
        let keys = KeySet::new();
        run(&mut player, &mut body, &keys, &tuning, &mut rng, 1.0);
        assert_eq!(player.label_alpha(player.next_direction()), 255);

        // 1.25 s left: middle of a blink period, fully faded
        run(&mut player, &mut body, &keys, &tuning, &mut rng, 2.75);
        assert_eq!(player.label_alpha(player.next_direction()), 0);
        let other = Direction::ALL
            .into_iter()
            .find(|&dir| dir != player.next_direction())
            .unwrap();
        assert_eq!(player.label_alpha(other), 255);
    }

    #[test]
    fn test_zero_interval_disables_rebinding() {
        let (mut player, mut body, mut tuning, mut rng) = setup();
        tuning.player.rebind_interval = 0.0;
        let keys = KeySet::new();
        for _ in 0..100 {
            run(&mut player, &mut body, &keys, &tuning, &mut rng, 1.0);
        }
        let keys: Vec<Key> = player.bindings().map(|(_, key)| key).collect();
        assert_eq!(keys, vec![Key('w'), Key('a'), Key('s'), Key('d')]);
    }
}
