//! Advances agents once the engine has produced this tick's adjustments.
//!
//! Steering variants move every agent a fixed distance along its heading.
//! The charged variant integrates force into velocity and position with a
//! semi-implicit Euler step.

use glam::Vec3;
use rand::Rng;

use super::agent::Species;
use super::engine::Adjustment;
use super::geometric_utils::{blend_heading, random_unit_vec3};
use super::params::RuleSet;
use super::state::SimulationState;

/// How positions are advanced for a rule set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Integrator {
    /// Heading-driven motion at a fixed move rate.
    Steering,
    /// Force, mass and velocity driven motion.
    Newtonian,
}

/// The agent whose motion changed most abruptly during a steering step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Focus {
    /// Index of the agent.
    pub agent: usize,
    /// Magnitude of the change in acceleration.
    pub jerk: f32,
    /// Whether the agent's hue was bumped to highlight it.
    pub highlighted: bool,
}

impl Integrator {
    /// Picks the integrator that matches a rule set.
    pub fn for_rules(rules: &RuleSet) -> Self {
        match rules {
            RuleSet::ColorSwarm(_) | RuleSet::PredatorPrey(_) => Self::Steering,
            RuleSet::Charged { .. } => Self::Newtonian,
        }
    }

    /// Applies `adjustments` (one per agent, in order) to `state`.
    ///
    /// # Returns
    ///
    /// The tick's focus for steering variants, `None` otherwise.
    pub fn apply<R: Rng + ?Sized>(
        self,
        state: &mut SimulationState,
        adjustments: &[Adjustment],
        rng: &mut R,
    ) -> Option<Focus> {
        debug_assert_eq!(state.agents.len(), adjustments.len());
        match self {
            Self::Steering => steer(state, adjustments, rng),
            Self::Newtonian => {
                integrate_forces(state, adjustments);
                None
            }
        }
    }
}

struct SteeringRates {
    rand_turn: f32,
    move_rate: f32,
    jerk_threshold: f32,
    focus_hue_bump: f32,
}

impl SteeringRates {
    fn from_rules(rules: &RuleSet) -> Self {
        match rules {
            RuleSet::ColorSwarm(params) => Self {
                rand_turn: params.rand_turn,
                move_rate: params.move_rate,
                jerk_threshold: params.jerk_threshold,
                focus_hue_bump: params.focus_hue_bump,
            },
            RuleSet::PredatorPrey(params) => Self {
                rand_turn: 0.0,
                move_rate: params.move_rate,
                jerk_threshold: 0.0,
                focus_hue_bump: 0.0,
            },
            RuleSet::Charged { .. } => Self {
                rand_turn: 0.0,
                move_rate: 0.0,
                jerk_threshold: 0.0,
                focus_hue_bump: 0.0,
            },
        }
    }
}

fn steer<R: Rng + ?Sized>(
    state: &mut SimulationState,
    adjustments: &[Adjustment],
    rng: &mut R,
) -> Option<Focus> {
    let rates = SteeringRates::from_rules(&state.rules);
    let policy = state.hue_wrap;
    let mut focus: Option<Focus> = None;

    for (index, (agent, adjustment)) in state.agents.iter_mut().zip(adjustments).enumerate() {
        agent.set_forward(adjustment.heading);
        agent.set_hue(agent.hue() + adjustment.hue_delta, policy);

        if rates.rand_turn > 0.0 {
            let forward = agent.forward();
            let jitter = random_unit_vec3(rng);
            agent.set_forward(blend_heading(forward, forward + jitter, rates.rand_turn));
        }

        let rate = match agent.species {
            Species::Predator => rates.move_rate * 0.5,
            Species::Prey | Species::Drifter => rates.move_rate,
        };
        let displacement = agent.forward() * rate;
        agent.position += displacement;

        let previous_acceleration = agent.acceleration;
        agent.acceleration = displacement - agent.velocity;
        agent.velocity = displacement;

        let jerk = (agent.acceleration - previous_acceleration).length();
        if focus.is_none_or(|current| jerk > current.jerk) {
            focus = Some(Focus {
                agent: index,
                jerk,
                highlighted: false,
            });
        }
    }

    let mut focus = focus?;
    if rates.focus_hue_bump > 0.0 && focus.jerk > rates.jerk_threshold {
        if let Some(agent) = state.agents.get_mut(focus.agent) {
            agent.set_hue(agent.hue() + rates.focus_hue_bump, policy);
            focus.highlighted = true;
        }
    }
    Some(focus)
}

fn integrate_forces(state: &mut SimulationState, adjustments: &[Adjustment]) {
    let time_step = match &state.rules {
        RuleSet::Charged { params, .. } => params.time_step,
        RuleSet::ColorSwarm(_) | RuleSet::PredatorPrey(_) => 1.0,
    };

    for (agent, adjustment) in state.agents.iter_mut().zip(adjustments) {
        agent.acceleration = adjustment.force / agent.mass();
        agent.velocity += agent.acceleration * time_step;
        agent.position += agent.velocity * time_step;
        agent.set_forward(agent.velocity);
        agent.force = Vec3::ZERO;
    }
}
