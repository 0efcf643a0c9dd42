//! Control events for runtime adjustments.
//!
//! Events are queued from outside the tick (a UI, a test, the binary) and
//! applied serially at the start of the next tick, so a tick never observes a
//! half-applied change.

use rand::Rng;
use tracing::{debug, info, warn};

use super::geometric_utils::{blend_heading, random_signed_vec3, random_unit_vec3};
use super::integrator::Integrator;
use super::state::{FollowTarget, SimulationState};

/// Runtime changes to the simulation.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlEvent {
    /// Sets a tunable of the active rule set, clamped into its range.
    SetParam {
        /// Parameter name.
        name: String,
        /// Requested value.
        value: f32,
    },
    /// Gives every agent a new random hue.
    RandomizeHues,
    /// Kicks every agent in a random direction.
    ///
    /// Newtonian agents receive a random pending force of up to `magnitude`
    /// per axis; steering agents turn toward a random direction at
    /// `min(magnitude, 1)`.
    Impulse {
        /// Kick strength.
        magnitude: f32,
    },
    /// Selects the camera follow target.
    Follow(FollowTarget),
    /// Pauses or resumes ticking.
    ToggleFreeze,
}

/// Queue of control events waiting for the next tick.
#[derive(Debug, Default)]
pub struct ControlQueue {
    events: Vec<ControlEvent>,
}

impl ControlQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Adds an event to the queue.
    pub fn push(&mut self, event: ControlEvent) {
        self.events.push(event);
    }

    /// Number of queued events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// `true` if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Drains all events from the queue.
    pub fn drain(&mut self) -> std::vec::Drain<'_, ControlEvent> {
        self.events.drain(..)
    }
}

/// Applies every queued event to `state` in arrival order.
///
/// A rejected parameter change is logged and skipped; the remaining events
/// still apply.
pub fn apply_events<R: Rng + ?Sized>(
    state: &mut SimulationState,
    queue: &mut ControlQueue,
    rng: &mut R,
) {
    for event in queue.drain() {
        match event {
            ControlEvent::SetParam { name, value } => {
                match state.rules.tunable_mut().set(&name, value) {
                    Ok(applied) => info!(param = %name, requested = value, applied, "Parameter set"),
                    Err(err) => warn!(error = %err, "Ignoring parameter change"),
                }
            }
            ControlEvent::RandomizeHues => {
                state.randomize_hues(rng);
                debug!("Randomized hues");
            }
            ControlEvent::Impulse { magnitude } => apply_impulse(state, magnitude, rng),
            ControlEvent::Follow(target) => {
                state.follow = target;
                debug!(?target, "Follow target changed");
            }
            ControlEvent::ToggleFreeze => {
                state.frozen = !state.frozen;
                info!(frozen = state.frozen, "Freeze toggled");
            }
        }
    }
}

fn apply_impulse<R: Rng + ?Sized>(state: &mut SimulationState, magnitude: f32, rng: &mut R) {
    if !magnitude.is_finite() || magnitude <= 0.0 {
        warn!(magnitude, "Ignoring impulse");
        return;
    }

    match Integrator::for_rules(&state.rules) {
        Integrator::Newtonian => {
            for agent in state.agents.iter_mut() {
                agent.force += random_signed_vec3(rng, magnitude);
            }
        }
        Integrator::Steering => {
            let rate = magnitude.min(1.0);
            for agent in state.agents.iter_mut() {
                let forward = agent.forward();
                let kick = random_unit_vec3(rng);
                agent.set_forward(blend_heading(forward, forward + kick, rate));
            }
        }
    }
    debug!(magnitude, "Impulse applied");
}
