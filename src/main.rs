//! Hell Arena headless runner
//!
//! Plays rounds with a simple scripted driver and logs how they went. Useful
//! for soak-testing the simulation without a window.
//!
//! Usage: `hell-arena [seed] [frames] [tuning.json]`

#[cfg(not(target_arch = "wasm32"))]
mod driver {
    use glam::Vec2;

    use hell_arena::input::KeySet;
    use hell_arena::sim::{EntityKind, Simulation};

    /// Enemies closer than this push the driver away
    const DANGER_RADIUS: f32 = 220.0;
    /// Distance from the visible edge where the driver starts steering back in
    const EDGE_MARGIN: f32 = 90.0;

    /// Pick the keys to hold this frame: towards the pellet, away from enemies and walls
    pub fn steer(sim: &Simulation) -> KeySet {
        let mut keys = KeySet::new();
        let (Some(player), Some(pos)) = (sim.player(), sim.player_position()) else {
            return keys;
        };
        let physics = sim.physics();
        let arena = sim.tuning().arena;

        let mut want = Vec2::ZERO;
        for (_, entity) in sim.scene().entities().filter(|(_, e)| e.is_alive()) {
            let at = entity.position(physics);
            match entity.kind {
                EntityKind::Pellet(_) => want += (at - pos).normalize_or_zero(),
                EntityKind::Enemy(_) => {
                    let away = pos - at;
                    let dist = away.length();
                    if dist < DANGER_RADIUS {
                        want += away.normalize_or_zero() * 3.0 * (1.0 - dist / DANGER_RADIUS);
                    }
                }
                EntityKind::Player(_) => {}
            }
        }

        // Walls kill: the closer, the harder we turn back
        let near_low = (Vec2::splat(EDGE_MARGIN) - pos).max(Vec2::ZERO);
        let near_high = (pos - (arena - Vec2::splat(EDGE_MARGIN))).max(Vec2::ZERO);
        want += (near_low - near_high) / EDGE_MARGIN * 4.0;

        for (direction, key) in player.bindings() {
            if want.dot(direction.delta()) > 0.3 {
                keys.press(key);
            }
        }
        keys
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn run() -> Result<(), Box<dyn std::error::Error>> {
    use hell_arena::consts::{SIM_DT, TPS};
    use hell_arena::sim::{FrameOutcome, Simulation};
    use hell_arena::{HighScores, Tuning};

    let mut args = std::env::args().skip(1);
    let seed: u64 = args.next().map(|s| s.parse()).transpose()?.unwrap_or(1);
    let frames: u64 = args.next().map(|s| s.parse()).transpose()?.unwrap_or(60 * 60);
    let tuning = match args.next() {
        Some(path) => Tuning::from_json(&std::fs::read_to_string(path)?)?,
        None => Tuning::default(),
    };

    let mut sim = Simulation::new(tuning, seed)?;
    let mut scores = HighScores::new();
    let mut round = 1;
    let mut round_start = 0;
    sim.start_round()?;
    log::info!("Running {frames} frames with seed {seed}");

    for frame in 0..frames {
        let keys = driver::steer(&sim);
        if let FrameOutcome::RoundOver { score } = sim.tick(&keys, SIM_DT)? {
            let seconds = (frame + 1 - round_start) as f32 / TPS;
            round_start = frame + 1;
            log::info!("Round {round} over after {seconds:.1}s with {score} pellets");
            if let Some(rank) = scores.add(format!("bot-{round}"), score) {
                log::debug!("Round {round} ranked #{rank}");
            }
            round += 1;
            sim.start_round()?;
        }
    }

    log::info!(
        "Played {round} rounds, best score {}",
        scores.top_score().unwrap_or(0)
    );
    println!("{}", scores.to_json()?);
    Ok(())
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    log::info!("Hell Arena (headless) starting...");
    if let Err(e) = run() {
        log::error!("{e}");
        std::process::exit(1);
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // Embedders drive `hell_arena::sim::Simulation` directly
}
