//! Agent state and the fixed-size pool that owns it.
//!
//! Agents are created once when a run starts and mutated in place by the
//! computing role every tick. Construction enforces the invariants every later
//! mutation preserves: unit-length heading, hue in `[0, 1)`, positive mass.

use glam::Vec3;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::geometric_utils::{self, normalize_or};
use super::params::HueWrap;

/// Smallest mass an agent may carry.
pub const MIN_MASS: f32 = 0.5;

/// Role an agent plays in the interaction rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Species {
    /// Member of a single-species swarm.
    Drifter,
    /// Flocks, feeds and flees predators.
    Prey,
    /// Hunts prey.
    Predator,
}

/// A simulated entity with position, heading and color.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    /// Stable identifier, equal to the agent's index in the pool.
    pub id: usize,
    /// Role in the interaction rules.
    pub species: Species,
    /// Position in world space.
    pub position: Vec3,
    /// Unit heading.
    forward: Vec3,
    /// Velocity (Newtonian) or last displacement (steering).
    pub velocity: Vec3,
    /// Acceleration from the last integration step.
    pub acceleration: Vec3,
    /// External force waiting to be applied by the next step.
    pub force: Vec3,
    /// Mass, never below [`MIN_MASS`].
    mass: f32,
    /// Color hue in `[0, 1)`.
    hue: f32,
}

impl Agent {
    /// Creates an agent, normalizing the heading and clamping hue and mass.
    ///
    /// # Arguments
    ///
    /// * `id` - Index in the pool
    /// * `species` - Role in the interaction rules
    /// * `position` - Starting position
    /// * `forward` - Starting heading (any non-zero length; zero falls back to `-Z`)
    /// * `hue` - Starting hue, wrapped into `[0, 1)`
    /// * `mass` - Mass, floored at [`MIN_MASS`]
    pub fn new(
        id: usize,
        species: Species,
        position: Vec3,
        forward: Vec3,
        hue: f32,
        mass: f32,
    ) -> Self {
        Self {
            id,
            species,
            position,
            forward: normalize_or(forward, Vec3::NEG_Z),
            velocity: Vec3::ZERO,
            acceleration: Vec3::ZERO,
            force: Vec3::ZERO,
            mass: clamp_mass(mass),
            hue: HueWrap::Euclid.apply(hue),
        }
    }

    /// Creates an agent with random position inside a cube of half extent
    /// `spawn_radius`, random heading and random hue.
    pub fn new_random<R: Rng + ?Sized>(
        id: usize,
        species: Species,
        spawn_radius: f32,
        rng: &mut R,
    ) -> Self {
        let position = geometric_utils::random_signed_vec3(rng, spawn_radius);
        let forward = geometric_utils::random_unit_vec3(rng);
        let hue = rng.random::<f32>();
        Self::new(id, species, position, forward, hue, 1.0)
    }

    /// Unit heading.
    pub fn forward(&self) -> Vec3 {
        self.forward
    }

    /// Replaces the heading; near-zero or non-finite input keeps the old heading.
    pub fn set_forward(&mut self, forward: Vec3) {
        self.forward = normalize_or(forward, self.forward);
    }

    /// Hue in `[0, 1)`.
    pub fn hue(&self) -> f32 {
        self.hue
    }

    /// Stores `hue` after bringing it into range with `policy`.
    pub fn set_hue(&mut self, hue: f32, policy: HueWrap) {
        self.hue = policy.apply(hue);
    }

    /// Mass, always at least [`MIN_MASS`].
    pub fn mass(&self) -> f32 {
        self.mass
    }

    /// Replaces the mass, flooring it at [`MIN_MASS`].
    pub fn set_mass(&mut self, mass: f32) {
        self.mass = clamp_mass(mass);
    }

    /// Re-establishes the heading, hue and mass invariants after deserialization.
    pub fn restore_invariants(&mut self) {
        self.forward = normalize_or(self.forward, Vec3::NEG_Z);
        self.hue = HueWrap::Euclid.apply(self.hue);
        self.mass = clamp_mass(self.mass);
    }

    /// `true` when every vector and scalar is finite.
    pub fn is_finite(&self) -> bool {
        self.position.is_finite()
            && self.forward.is_finite()
            && self.velocity.is_finite()
            && self.acceleration.is_finite()
            && self.force.is_finite()
            && self.hue.is_finite()
    }
}

fn clamp_mass(mass: f32) -> f32 {
    if mass.is_finite() { mass.max(MIN_MASS) } else { MIN_MASS }
}

/// Ordered, fixed-size collection of agents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentPool {
    agents: Vec<Agent>,
}

impl AgentPool {
    /// Wraps `agents`, renumbering ids to match their index.
    pub fn new(agents: Vec<Agent>) -> Self {
        let mut pool = Self { agents };
        pool.renumber();
        pool
    }

    /// Resets every id to the agent's index.
    pub fn renumber(&mut self) {
        for (index, agent) in self.agents.iter_mut().enumerate() {
            agent.id = index;
        }
    }

    /// Number of agents.
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// `true` if the pool holds no agents.
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Agent at `index`.
    pub fn get(&self, index: usize) -> Option<&Agent> {
        self.agents.get(index)
    }

    /// Mutable agent at `index`.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut Agent> {
        self.agents.get_mut(index)
    }

    /// Read-only view of every agent.
    pub fn as_slice(&self) -> &[Agent] {
        &self.agents
    }

    /// Mutable view of every agent; the population size cannot change through it.
    pub fn as_mut_slice(&mut self) -> &mut [Agent] {
        &mut self.agents
    }

    /// Iterates agents in index order.
    pub fn iter(&self) -> std::slice::Iter<'_, Agent> {
        self.agents.iter()
    }

    /// Iterates agents mutably in index order.
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Agent> {
        self.agents.iter_mut()
    }

    /// First agent of the given species.
    pub fn first_of(&self, species: Species) -> Option<&Agent> {
        self.agents.iter().find(|agent| agent.species == species)
    }

    /// `true` when every agent is finite.
    pub fn is_finite(&self) -> bool {
        self.agents.iter().all(Agent::is_finite)
    }
}

impl<'a> IntoIterator for &'a AgentPool {
    type Item = &'a Agent;
    type IntoIter = std::slice::Iter<'a, Agent>;

    fn into_iter(self) -> Self::IntoIter {
        self.agents.iter()
    }
}
