//! Pairwise interaction engine.
//!
//! For every agent the engine visits every other agent, in ascending index
//! order, and folds the variant's rules into one [`Adjustment`]. The engine
//! reads a frozen [`SimulationState`]: while agent `i` is evaluated it sees its
//! own running heading and hue, but never another agent's same-tick update.
//! That makes each agent's evaluation independent, so the work can fan out on
//! rayon without changing the result.

use std::f32::consts::{FRAC_PI_2, PI};

use glam::Vec3;
use rayon::prelude::*;
use tracing::warn;

use super::agent::{Agent, AgentPool, Species};
use super::food;
use super::geometric_utils::{EPSILON, blend_heading, face_toward, normalize_or};
use super::params::{ChargeFlip, ChargeParams, ColorSwarmParams, PredatorPreyParams, RuleSet};
use super::spatial::SpatialIndex;
use super::state::SimulationState;

/// What the rules ask of one agent this tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Adjustment {
    /// Heading after every steering rule has been blended in, unit length.
    pub heading: Vec3,
    /// Hue change accumulated by the rules, before wraparound.
    pub hue_delta: f32,
    /// Total force for Newtonian variants.
    pub force: Vec3,
    /// Food target the agent reached this tick.
    pub food_reached: Option<usize>,
}

/// Evaluates the variant's interaction rules for a whole population.
#[derive(Debug, Clone, Copy, Default)]
pub struct InteractionEngine {
    parallel: bool,
    spatial_index: bool,
}

/// Values shared by every agent's evaluation within one tick.
struct TickContext<'a> {
    state: &'a SimulationState,
    index: Option<SpatialIndex>,
    prey_heading: Vec3,
}

impl InteractionEngine {
    /// Creates an engine.
    ///
    /// # Arguments
    ///
    /// * `parallel` - Evaluate agents on the rayon pool
    /// * `spatial_index` - Narrow neighbor visits with a k-d tree
    pub fn new(parallel: bool, spatial_index: bool) -> Self {
        Self {
            parallel,
            spatial_index,
        }
    }

    /// Computes one adjustment per agent, in agent order.
    pub fn evaluate(&self, state: &SimulationState) -> Vec<Adjustment> {
        let index = if self.spatial_index && !matches!(state.rules, RuleSet::Charged { .. }) {
            match SpatialIndex::build(&state.agents) {
                Ok(index) => Some(index),
                Err(err) => {
                    warn!(error = ?err, "Spatial index unavailable, visiting all pairs");
                    None
                }
            }
        } else {
            None
        };

        let prey_heading: Vec3 = state
            .agents
            .iter()
            .filter(|agent| agent.species == Species::Prey)
            .map(Agent::forward)
            .sum();

        let context = TickContext {
            state,
            index,
            prey_heading,
        };

        let count = state.agents.len();
        if self.parallel {
            (0..count)
                .into_par_iter()
                .map(|i| evaluate_agent(&context, i))
                .collect()
        } else {
            (0..count).map(|i| evaluate_agent(&context, i)).collect()
        }
    }
}

fn evaluate_agent(context: &TickContext<'_>, i: usize) -> Adjustment {
    let agents = &context.state.agents;
    match &context.state.rules {
        RuleSet::ColorSwarm(params) => color_swarm(params, agents, context.index.as_ref(), i),
        RuleSet::PredatorPrey(params) => predator_prey(params, context, i),
        RuleSet::Charged { params, flip } => charged(params, *flip, agents, i),
    }
}

/// Calls `visit` for every agent that may lie within `radius` of agent `i`,
/// in ascending index order. Without an index every other agent is visited.
fn visit_neighbors(
    agents: &AgentPool,
    index: Option<&SpatialIndex>,
    i: usize,
    radius: f32,
    mut visit: impl FnMut(usize, &Agent),
) {
    let agents = agents.as_slice();
    match index {
        Some(index) => {
            for j in index.neighbors(agents[i].position, radius, i) {
                visit(j, &agents[j]);
            }
        }
        None => {
            for (j, other) in agents.iter().enumerate() {
                if j != i {
                    visit(j, other);
                }
            }
        }
    }
}

/// Direction used between coincident agents: opposite for the two members of a pair.
fn coincident_direction(i: usize, j: usize) -> Vec3 {
    if j > i { Vec3::X } else { Vec3::NEG_X }
}

/// Heading that turns away from `dir`; straight away when the blend cancels out.
fn away_from(forward: Vec3, dir: Vec3) -> Vec3 {
    let away = forward - dir;
    if away.length() > EPSILON { away } else { -dir }
}

fn color_swarm(
    params: &ColorSwarmParams,
    agents: &AgentPool,
    index: Option<&SpatialIndex>,
    i: usize,
) -> Adjustment {
    let agent = &agents.as_slice()[i];
    let pos = agent.position;
    let mut forward = agent.forward();
    let mut hue = agent.hue();

    // shell pull, then the hard recentering cutoff
    let to_shell = normalize_or(pos, forward) * params.shell_radius - pos;
    if to_shell.length() > params.shell_tolerance {
        forward = blend_heading(forward, forward * 2.0 + to_shell, params.sphere_k);
    }
    if pos.length() > params.cutoff_radius {
        forward = face_toward(forward, pos, Vec3::ZERO, params.recenter_rate);
    }

    let radius = params.sight.max(params.min_dist);
    visit_neighbors(agents, index, i, radius, |j, other| {
        let offset = other.position - pos;
        let distance = offset.length();
        let dir = normalize_or(offset, coincident_direction(i, j));

        let in_view = dir.dot(forward) >= 0.0;
        let hue_diff = (FRAC_PI_2 * (other.hue() - hue)).sin();
        let repulsive = hue_diff.abs() > params.hue_threshold;

        if distance < params.sight && in_view && distance > params.min_dist {
            let desired = if repulsive {
                forward - dir
            } else {
                forward + dir
            };
            forward = blend_heading(forward, desired, params.turn_rate);
            hue += hue_diff * params.hue_drift;
        }
        if distance < params.min_dist {
            forward = blend_heading(forward, away_from(forward, dir), 1.0);
        }
    });

    Adjustment {
        heading: forward,
        hue_delta: hue - agent.hue(),
        ..Adjustment::default()
    }
}

fn predator_prey(params: &PredatorPreyParams, context: &TickContext<'_>, i: usize) -> Adjustment {
    let state = context.state;
    let agent = &state.agents.as_slice()[i];
    let pos = agent.position;
    let mut forward = agent.forward();
    let mut food_reached = None;

    if pos.length() > params.boundary_radius {
        forward = face_toward(forward, pos, Vec3::ZERO, params.recenter_rate);
    }

    let radius = params
        .min_dist
        .max(params.prey_awareness)
        .max(params.pred_awareness);

    match agent.species {
        Species::Prey => {
            forward = blend_heading(forward, context.prey_heading, params.cohesion);

            if let Some((target, distance)) = food::nearest(&state.food, pos) {
                forward = face_toward(forward, pos, state.food[target].pos, params.appetite);
                if distance < params.food_epsilon {
                    food_reached = Some(target);
                }
            }

            visit_neighbors(&state.agents, context.index.as_ref(), i, radius, |_, other| {
                let offset = other.position - pos;
                let distance = offset.length();
                match other.species {
                    Species::Prey if distance < params.min_dist => {
                        forward = blend_heading(forward, forward - offset, params.aversion);
                    }
                    Species::Predator if distance < params.prey_awareness => {
                        forward = blend_heading(forward, forward - offset, params.pred_aversion);
                    }
                    _ => {}
                }
            });
        }
        Species::Predator => {
            visit_neighbors(&state.agents, context.index.as_ref(), i, radius, |_, other| {
                if other.species != Species::Prey {
                    return;
                }
                let offset = other.position - pos;
                let distance = offset.length();
                if distance < params.prey_awareness {
                    forward = blend_heading(forward, forward + offset, params.pred_appetite);
                }
                if distance < params.pred_awareness {
                    forward = blend_heading(forward, forward + offset, params.pred_appetite * 0.5);
                }
            });
        }
        Species::Drifter => {}
    }

    Adjustment {
        heading: forward,
        food_reached,
        ..Adjustment::default()
    }
}

fn charged(params: &ChargeParams, flip: ChargeFlip, agents: &AgentPool, i: usize) -> Adjustment {
    let agents = agents.as_slice();
    let agent = &agents[i];
    let pos = agent.position;

    let spring = (normalize_or(pos, Vec3::ZERO) * params.shell_radius - pos) * params.spring_k;
    let drag = -agent.velocity * params.drag_factor;
    let mut force = agent.force + drag + spring;

    let strength = params.charge_scale * params.charge_k;
    if strength > 0.0 {
        for (j, other) in agents.iter().enumerate() {
            if j == i {
                continue;
            }
            let offset = other.position - pos;
            let distance = offset.length();
            let dir = normalize_or(offset, Vec3::ZERO);

            let dissimilar = (PI * (other.hue() - agent.hue())).sin().abs() > params.charge_threshold;
            let mut charge = if dissimilar { 1.0 } else { -1.0 };
            if flip == ChargeFlip::NearField && distance < params.flip_distance {
                charge = -charge;
            }

            force -= dir * charge * strength / (distance * distance + params.singularity_epsilon);
        }
    }

    Adjustment {
        heading: agent.forward(),
        force,
        ..Adjustment::default()
    }
}
