//! The authoritative simulation state owned by the computing role.

use std::path::Path;

use chrono::{DateTime, Utc};
use glam::Vec3;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::agent::{Agent, AgentPool, Species};
use super::food::Food;
use super::geometric_utils::{normalize_or, random_signed_vec3, random_unit_vec3};
use super::params::{HueWrap, RuleSet, SwarmConfig};
use crate::error::SwarmError;

/// Hue given to predators (red).
pub const PREDATOR_HUE: f32 = 0.0;
/// Hue given to prey (magenta).
pub const PREY_HUE: f32 = 5.0 / 6.0;

/// Agent the external camera should track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowTarget {
    /// Fixed overview camera.
    #[default]
    Free,
    /// Chase camera behind the first prey.
    Prey,
    /// Chase camera behind the first predator.
    Predator,
}

/// Eye position and look-at point for the external camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPose {
    /// Camera position.
    pub eye: Vec3,
    /// Point the camera faces.
    pub look_at: Vec3,
}

/// Agents plus every global value the rules read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationState {
    /// All agents, in a fixed order.
    pub agents: AgentPool,
    /// Variant rules and their tunables.
    pub rules: RuleSet,
    /// Hue wraparound policy.
    pub hue_wrap: HueWrap,
    /// Food targets (predator/prey only).
    pub food: Vec<Food>,
    /// Seconds since the last food relocation.
    pub food_phase: f32,
    /// Total simulated time.
    pub time: f32,
    /// Number of completed ticks.
    pub tick: u64,
    /// Camera follow selection.
    pub follow: FollowTarget,
    /// While frozen, ticks are skipped.
    pub frozen: bool,
}

impl SimulationState {
    /// Creates the initial population described by `config`.
    pub fn new<R: Rng + ?Sized>(config: &SwarmConfig, rng: &mut R) -> Self {
        let mut agents = Vec::with_capacity(config.total_agents());
        let mut food = Vec::new();

        match &config.rules {
            RuleSet::ColorSwarm(_) => {
                for id in 0..config.agent_count {
                    agents.push(Agent::new_random(
                        id,
                        Species::Drifter,
                        config.spawn_radius,
                        rng,
                    ));
                }
            }
            RuleSet::PredatorPrey(params) => {
                for id in 0..config.agent_count {
                    let mut prey = Agent::new_random(id, Species::Prey, config.spawn_radius, rng);
                    prey.set_hue(PREY_HUE, config.hue_wrap);
                    agents.push(prey);
                }
                for id in 0..config.predator_count {
                    let mut predator = Agent::new_random(
                        config.agent_count + id,
                        Species::Predator,
                        config.spawn_radius,
                        rng,
                    );
                    predator.set_hue(PREDATOR_HUE, config.hue_wrap);
                    agents.push(predator);
                }
                food = (0..config.food_count)
                    .map(|_| Food::new_random(params.food_radius, rng))
                    .collect();
            }
            RuleSet::Charged { .. } => {
                let mass_distribution =
                    Normal::new(3.0f32, 0.5).expect("standard deviation is positive");
                for id in 0..config.agent_count {
                    let position = random_signed_vec3(rng, config.spawn_radius);
                    let velocity = random_signed_vec3(rng, 0.1);
                    let heading = normalize_or(velocity, random_unit_vec3(rng));
                    let hue = rng.random::<f32>();
                    let mass = mass_distribution.sample(rng);

                    let mut particle =
                        Agent::new(id, Species::Drifter, position, heading, hue, mass);
                    particle.velocity = velocity;
                    particle.force = random_signed_vec3(rng, 1.0);
                    agents.push(particle);
                }
            }
        }

        info!(
            variant = config.rules.label(),
            agents = agents.len(),
            food = food.len(),
            "Created simulation state"
        );

        Self {
            agents: AgentPool::new(agents),
            rules: config.rules.clone(),
            hue_wrap: config.hue_wrap,
            food,
            food_phase: 0.0,
            time: 0.0,
            tick: 0,
            follow: FollowTarget::Free,
            frozen: false,
        }
    }

    /// Gives every agent a fresh random hue.
    pub fn randomize_hues<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let policy = self.hue_wrap;
        for agent in self.agents.iter_mut() {
            agent.set_hue(rng.random::<f32>(), policy);
        }
    }

    /// Where the external camera should be for the current follow target.
    ///
    /// Falls back to the overview pose when no agent of the followed species exists.
    pub fn camera_pose(&self) -> CameraPose {
        let chase = match self.follow {
            FollowTarget::Free => None,
            FollowTarget::Prey => self.agents.first_of(Species::Prey).map(|agent| (agent, 2.0)),
            FollowTarget::Predator => self
                .agents
                .first_of(Species::Predator)
                .map(|agent| (agent, 3.0)),
        };

        match chase {
            Some((agent, distance)) => CameraPose {
                eye: agent.position - agent.forward() * distance,
                look_at: agent.position,
            },
            None => {
                let distance = match self.rules {
                    RuleSet::PredatorPrey(_) => 7.0,
                    _ => 10.0,
                };
                CameraPose {
                    eye: Vec3::new(0.0, 0.0, distance),
                    look_at: Vec3::ZERO,
                }
            }
        }
    }

    /// Saves the state to a JSON file stamped with the current time.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), SwarmError> {
        let saved = SavedState {
            saved_at: Utc::now(),
            state: self.clone(),
        };
        let json = serde_json::to_string_pretty(&saved)?;
        std::fs::write(path.as_ref(), json)?;
        info!(path = %path.as_ref().display(), tick = self.tick, "Saved simulation state");
        Ok(())
    }

    /// Loads a state saved by [`SimulationState::save_to_file`].
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, SwarmError> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let saved: SavedState = serde_json::from_str(&json)?;
        let mut state = saved.state;

        state.rules.tunable_mut().clamp_all();
        state.agents.renumber();
        for agent in state.agents.iter_mut() {
            agent.restore_invariants();
        }

        info!(
            path = %path.as_ref().display(),
            saved_at = %saved.saved_at,
            tick = state.tick,
            "Loaded simulation state"
        );
        Ok(state)
    }
}

#[derive(Serialize, Deserialize)]
struct SavedState {
    saved_at: DateTime<Utc>,
    state: SimulationState,
}
