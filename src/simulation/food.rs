//! Food targets that prey seek.
//!
//! Targets are relocated together every `food_period` seconds, and a target a
//! prey reaches is respawned on the spot.

use glam::Vec3;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::geometric_utils::random_in_ball;

/// A point prey steer toward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Food {
    /// Position in world space.
    pub pos: Vec3,
}

impl Food {
    /// Creates a food target at a uniformly random point inside a ball.
    ///
    /// # Arguments
    ///
    /// * `radius` - Radius of the ball centered on the origin
    /// * `rng` - Random source
    pub fn new_random<R: Rng + ?Sized>(radius: f32, rng: &mut R) -> Self {
        Self {
            pos: random_in_ball(rng, radius),
        }
    }

    /// Moves this target to a fresh random point inside the ball.
    pub fn respawn<R: Rng + ?Sized>(&mut self, radius: f32, rng: &mut R) {
        self.pos = random_in_ball(rng, radius);
    }
}

/// Index and distance of the food target nearest to `pos`, if any exist.
pub fn nearest(food: &[Food], pos: Vec3) -> Option<(usize, f32)> {
    food.iter()
        .enumerate()
        .map(|(index, item)| (index, item.pos.distance(pos)))
        .min_by(|a, b| a.1.total_cmp(&b.1))
}

/// Advances the relocation clock by `dt` and relocates every target once per
/// elapsed `period`. Returns `true` if a relocation happened.
pub fn advance_phase<R: Rng + ?Sized>(
    food: &mut [Food],
    phase: &mut f32,
    dt: f32,
    period: f32,
    radius: f32,
    rng: &mut R,
) -> bool {
    *phase += dt;
    if *phase < period {
        return false;
    }

    *phase %= period;
    for item in food.iter_mut() {
        item.respawn(radius, rng);
    }
    true
}
