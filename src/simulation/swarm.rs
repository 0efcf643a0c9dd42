//! The computing role: owns the state and drives one tick at a time.

use std::path::Path;
use std::sync::Arc;

use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, info};

use super::engine::InteractionEngine;
use super::events::{ControlEvent, ControlQueue, apply_events};
use super::food;
use super::integrator::{Focus, Integrator};
use super::params::{RuleSet, SwarmConfig};
use super::replication::{Snapshot, SnapshotPublisher, Transport};
use super::state::{CameraPose, SimulationState};
use crate::error::{ParamError, SwarmError};

/// Summary of one call to [`Swarm::step`].
#[derive(Debug, Clone, PartialEq)]
pub struct StepReport {
    /// Tick count after the step.
    pub tick: u64,
    /// `true` if the swarm was frozen and nothing moved.
    pub skipped: bool,
    /// Agent with the largest jerk, for steering variants.
    pub focus: Option<Focus>,
    /// Food targets reached and respawned this tick.
    pub food_eaten: usize,
}

/// A running simulation.
pub struct Swarm {
    state: SimulationState,
    rng: StdRng,
    engine: InteractionEngine,
    integrator: Integrator,
    publisher: Option<SnapshotPublisher>,
    controls: ControlQueue,
}

impl Swarm {
    /// Validates `config` and spawns its initial population.
    pub fn new(mut config: SwarmConfig) -> Result<Self, SwarmError> {
        config.validate()?;
        let mut rng = seeded_rng(config.rng_seed);
        let state = SimulationState::new(&config, &mut rng);
        Ok(Self::assemble(state, rng, &config))
    }

    /// Resumes from an existing state, taking seed and execution flags from `config`.
    ///
    /// The population and rules come from `state`; `config.rules` is ignored.
    pub fn from_state(state: SimulationState, config: &SwarmConfig) -> Result<Self, SwarmError> {
        if state.agents.is_empty() {
            return Err(ParamError::InvalidConfig("population must not be empty").into());
        }
        let rng = seeded_rng(config.rng_seed);
        Ok(Self::assemble(state, rng, config))
    }

    /// Loads a saved state and resumes it.
    pub fn load_from_file(path: impl AsRef<Path>, config: &SwarmConfig) -> Result<Self, SwarmError> {
        let state = SimulationState::load_from_file(path)?;
        Self::from_state(state, config)
    }

    fn assemble(state: SimulationState, rng: StdRng, config: &SwarmConfig) -> Self {
        let integrator = Integrator::for_rules(&state.rules);
        info!(
            variant = state.rules.label(),
            agents = state.agents.len(),
            ?integrator,
            parallel = config.parallel,
            spatial_index = config.spatial_index,
            "Swarm ready"
        );
        Self {
            state,
            rng,
            engine: InteractionEngine::new(config.parallel, config.spatial_index),
            integrator,
            publisher: None,
            controls: ControlQueue::new(),
        }
    }

    /// Attaches a snapshot publisher and publishes the current state.
    ///
    /// Fails if the transport is unavailable.
    pub fn with_publisher(mut self, transport: Arc<dyn Transport>) -> Result<Self, SwarmError> {
        let mut publisher = SnapshotPublisher::new(transport)?;
        publisher.publish(&Snapshot::capture(&self.state))?;
        self.publisher = Some(publisher);
        Ok(self)
    }

    /// Queues a control event for the next tick.
    pub fn queue(&mut self, event: ControlEvent) {
        self.controls.push(event);
    }

    /// Advances the simulation by one tick of `dt` seconds.
    ///
    /// Queued controls apply first. A frozen swarm stops there. Otherwise the
    /// engine evaluates every agent, the integrator moves them, reached food
    /// respawns and the new snapshot is published. A publishing failure is
    /// returned to the caller and should end the run.
    pub fn step(&mut self, dt: f32) -> Result<StepReport, SwarmError> {
        if !dt.is_finite() || dt < 0.0 {
            return Err(ParamError::InvalidConfig("dt must be finite and non-negative").into());
        }

        apply_events(&mut self.state, &mut self.controls, &mut self.rng);
        if self.state.frozen {
            return Ok(StepReport {
                tick: self.state.tick,
                skipped: true,
                focus: None,
                food_eaten: 0,
            });
        }

        let food_radius = match &self.state.rules {
            RuleSet::PredatorPrey(params) => {
                let (period, radius) = (params.food_period, params.food_radius);
                if food::advance_phase(
                    &mut self.state.food,
                    &mut self.state.food_phase,
                    dt,
                    period,
                    radius,
                    &mut self.rng,
                ) {
                    debug!(tick = self.state.tick, "Food relocated");
                }
                Some(radius)
            }
            RuleSet::ColorSwarm(_) | RuleSet::Charged { .. } => None,
        };

        let adjustments = self.engine.evaluate(&self.state);
        let focus = self
            .integrator
            .apply(&mut self.state, &adjustments, &mut self.rng);

        let mut reached: Vec<usize> = adjustments
            .iter()
            .filter_map(|adjustment| adjustment.food_reached)
            .collect();
        reached.sort_unstable();
        reached.dedup();
        if let Some(radius) = food_radius {
            for &target in &reached {
                if let Some(item) = self.state.food.get_mut(target) {
                    item.respawn(radius, &mut self.rng);
                }
            }
        }

        debug_assert!(self.state.agents.is_finite());
        self.state.tick += 1;
        self.state.time += dt;

        if let Some(publisher) = self.publisher.as_mut() {
            publisher.publish(&Snapshot::capture(&self.state))?;
        }

        debug!(
            tick = self.state.tick,
            focus = ?focus.map(|f| f.agent),
            food_eaten = reached.len(),
            "Tick complete"
        );

        Ok(StepReport {
            tick: self.state.tick,
            skipped: false,
            focus,
            food_eaten: reached.len(),
        })
    }

    /// Runs `ticks` steps of `dt` seconds, stopping at the first error.
    pub fn run(&mut self, ticks: u64, dt: f32) -> Result<(), SwarmError> {
        for _ in 0..ticks {
            self.step(dt)?;
        }
        Ok(())
    }

    /// Read-only view of the state.
    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    /// Captures the current state as a snapshot.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::capture(&self.state)
    }

    /// Camera pose for the current follow target.
    pub fn camera_pose(&self) -> CameraPose {
        self.state.camera_pose()
    }

    /// Integrator selected for the active rules.
    pub fn integrator(&self) -> Integrator {
        self.integrator
    }

    /// Saves the state as JSON.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), SwarmError> {
        self.state.save_to_file(path)
    }
}

fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}
