//! Simulation parameters and variant rule sets.
//!
//! Every scalar a variant exposes is a named tunable with a default and an
//! inclusive range, so external controls can adjust it while the simulation
//! runs. Structural choices (population sizes, seeding, policies) live in
//! [`SwarmConfig`].

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ParamError, SwarmError};

/// Hard cap on population size; snapshot frames carry the count as `u32`.
pub const MAX_AGENTS: usize = 65_536;

/// Hard cap on the number of food targets.
pub const MAX_FOOD: usize = 4096;

/// Largest `f32` strictly below one.
const HUE_CEILING: f32 = 1.0 - f32::EPSILON / 2.0;

/// Default, minimum and maximum of one tunable scalar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSpec {
    /// Parameter name as used by controls and config files.
    pub name: &'static str,
    /// Value used when nothing else is configured.
    pub default: f32,
    /// Inclusive lower bound.
    pub min: f32,
    /// Inclusive upper bound.
    pub max: f32,
}

impl ParamSpec {
    /// Clamps `value` into this parameter's range.
    pub fn clamp(&self, value: f32) -> f32 {
        value.clamp(self.min, self.max)
    }
}

/// Named scalar parameters that can be listed, read and adjusted at runtime.
pub trait Tunable {
    /// All parameters with their ranges, in declaration order.
    fn specs(&self) -> &'static [ParamSpec];

    /// Current value of `name`, if it exists.
    fn get(&self, name: &str) -> Option<f32>;

    /// Sets `name` to `value` clamped into range and returns the stored value.
    fn set(&mut self, name: &str, value: f32) -> Result<f32, ParamError>;

    /// Clamps every value into range, resetting non-finite values to their default.
    fn clamp_all(&mut self);

    /// Looks up the spec for `name`.
    fn spec(&self, name: &str) -> Option<&'static ParamSpec> {
        self.specs().iter().find(|spec| spec.name == name)
    }
}

macro_rules! tunable_params {
    (
        $(#[$struct_meta:meta])*
        pub struct $name:ident {
            $(
                $(#[$field_meta:meta])*
                $field:ident = $default:expr, [$min:expr, $max:expr];
            )*
        }
    ) => {
        $(#[$struct_meta])*
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        #[serde(default)]
        pub struct $name {
            $(
                $(#[$field_meta])*
                pub $field: f32,
            )*
        }

        impl $name {
            const SPECS: &'static [ParamSpec] = &[
                $(
                    ParamSpec {
                        name: stringify!($field),
                        default: $default,
                        min: $min,
                        max: $max,
                    },
                )*
            ];
        }

        impl Default for $name {
            fn default() -> Self {
                Self {
                    $( $field: $default, )*
                }
            }
        }

        impl Tunable for $name {
            fn specs(&self) -> &'static [ParamSpec] {
                Self::SPECS
            }

            fn get(&self, name: &str) -> Option<f32> {
                match name {
                    $( stringify!($field) => Some(self.$field), )*
                    _ => None,
                }
            }

            fn set(&mut self, name: &str, value: f32) -> Result<f32, ParamError> {
                let Some(spec) = self.spec(name) else {
                    return Err(ParamError::Unknown(name.to_string()));
                };
                if !value.is_finite() {
                    return Err(ParamError::NonFinite {
                        name: name.to_string(),
                        value,
                    });
                }
                let value = spec.clamp(value);
                match name {
                    $( stringify!($field) => self.$field = value, )*
                    _ => {}
                }
                Ok(value)
            }

            fn clamp_all(&mut self) {
                for spec in Self::SPECS {
                    let current = self.get(spec.name).unwrap_or(spec.default);
                    let value = if current.is_finite() { spec.clamp(current) } else { spec.default };
                    match spec.name {
                        $( stringify!($field) => self.$field = value, )*
                        _ => {}
                    }
                }
            }
        }
    };
}

tunable_params! {
    /// Color-chemotaxis swarm: hue-driven attraction and repulsion with a
    /// spherical shell boundary.
    pub struct ColorSwarmParams {
        /// Point size display hint forwarded in snapshots.
        point_size = 2.0, [0.1, 20.0];
        /// Radius within which neighbors influence an agent.
        sight = 0.45, [0.001, 1.0];
        /// Blend rate toward attraction/repulsion headings.
        turn_rate = 0.35, [0.01, 0.55];
        /// Blend rate toward a random heading each tick.
        rand_turn = 0.01, [0.001, 0.25];
        /// Blend rate of the shell restoring pull.
        sphere_k = 0.14, [0.01, 0.55];
        /// Below this distance neighbors are repelled immediately.
        min_dist = 0.02, [0.0001, 0.25];
        /// Distance moved along the heading per tick.
        move_rate = 0.055, [0.01, 0.25];
        /// Hue difference above which neighbors repel instead of attract.
        hue_threshold = 0.2, [0.0, 1.0];
        /// Hue change per interacting neighbor, scaled by the hue difference.
        hue_drift = 0.002, [0.0, 0.05];
        /// Radius of the shell agents are pulled onto.
        shell_radius = 3.0, [0.5, 10.0];
        /// Distance from the shell tolerated before the pull engages.
        shell_tolerance = 0.25, [0.0, 2.0];
        /// Distance from the origin beyond which agents turn back to the center.
        cutoff_radius = 5.0, [1.0, 20.0];
        /// Blend rate of the recentering turn.
        recenter_rate = 0.15, [0.0, 1.0];
        /// Jerk magnitude a focus agent must exceed to be highlighted.
        jerk_threshold = 7e-7, [0.0, 0.01];
        /// Hue added to the highlighted focus agent; zero disables the highlight.
        focus_hue_bump = 0.125, [0.0, 0.5];
    }
}

tunable_params! {
    /// Predator/prey flocking with food targets.
    pub struct PredatorPreyParams {
        /// Blend rate toward the mean prey heading.
        cohesion = 0.02, [0.0, 0.4];
        /// Blend rate toward the nearest food target.
        appetite = 0.02, [0.002, 0.3];
        /// Prey closer than this steer apart.
        min_dist = 0.2, [0.002, 0.5];
        /// Blend rate of prey separation.
        aversion = 0.12, [0.002, 0.3];
        /// Radius at which prey and predators notice each other.
        prey_awareness = 0.12, [0.002, 0.5];
        /// Blend rate of prey fleeing a predator.
        pred_aversion = 0.22, [0.002, 0.3];
        /// Blend rate of a predator chasing prey.
        pred_appetite = 0.22, [0.002, 0.5];
        /// Wider radius within which predators stalk prey at half appetite.
        pred_awareness = 0.22, [0.02, 1.0];
        /// Prey travel per tick; predators move at half this rate.
        move_rate = 0.02, [0.001, 0.2];
        /// Distance from the origin beyond which agents turn back.
        boundary_radius = 2.0, [0.5, 10.0];
        /// Blend rate of the turn back toward the origin.
        recenter_rate = 0.015, [0.0, 1.0];
        /// Seconds between relocations of every food target.
        food_period = 3.0, [0.1, 30.0];
        /// Radius of the ball food targets are placed in.
        food_radius = 2.0, [0.1, 10.0];
        /// Distance at which prey reach a food target.
        food_epsilon = 0.02, [0.001, 0.5];
        /// Point size display hint forwarded in snapshots.
        point_size = 1.0, [0.1, 20.0];
    }
}

tunable_params! {
    /// Charged particles under Newtonian integration.
    pub struct ChargeParams {
        /// Point size display hint forwarded in snapshots.
        point_size = 1.0, [0.0, 2.0];
        /// Integration step.
        time_step = 0.5, [0.01, 0.6];
        /// Linear drag coefficient.
        drag_factor = 0.8, [0.0, 0.9];
        /// Stiffness of the spring toward the shell.
        spring_k = 0.4, [0.0, 0.99];
        /// Strength of the pairwise charge force.
        charge_k = 0.0, [0.0, 0.99];
        /// Permittivity-like scale applied to every charge force.
        charge_scale = 0.001, [0.0, 0.1];
        /// Added to the squared distance so the force stays bounded.
        singularity_epsilon = 0.001, [0.000_001, 0.1];
        /// Hue dissimilarity above which a pair repels.
        charge_threshold = 0.08, [0.0, 1.0];
        /// Distance below which the near-field flip inverts the charge sign.
        flip_distance = 0.07, [0.0, 1.0];
        /// Radius of the shell the spring pulls toward.
        shell_radius = 2.0, [0.5, 10.0];
    }
}

/// How hues outside `[0, 1)` are brought back into range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HueWrap {
    /// Shift by a single period toward the range, then clamp whatever remains
    /// to the nearest bound.
    #[default]
    Subtract,
    /// Reduce modulo one, however far out of range the hue is.
    Euclid,
}

impl HueWrap {
    /// Applies the policy; the result always lies in `[0, 1)`.
    pub fn apply(self, hue: f32) -> f32 {
        if !hue.is_finite() {
            return 0.0;
        }
        let wrapped = match self {
            HueWrap::Subtract => {
                let shifted = if hue >= 1.0 {
                    hue - 1.0
                } else if hue < 0.0 {
                    hue + 1.0
                } else {
                    hue
                };
                shifted.clamp(0.0, HUE_CEILING)
            }
            HueWrap::Euclid => hue.rem_euclid(1.0),
        };
        if wrapped >= 1.0 { 0.0 } else { wrapped }
    }
}

/// Whether the charge sign inverts for very close pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChargeFlip {
    /// Charge sign depends on hue alone.
    Disabled,
    /// Charge sign inverts when the pair is closer than `flip_distance`.
    #[default]
    NearField,
}

/// The rules of one simulation variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleSet {
    /// Steering swarm driven by hue affinity.
    ColorSwarm(ColorSwarmParams),
    /// Steering flock of prey and predators seeking food.
    PredatorPrey(PredatorPreyParams),
    /// Newtonian charged particles.
    Charged {
        /// Force parameters.
        params: ChargeParams,
        /// Near-field charge policy.
        #[serde(default)]
        flip: ChargeFlip,
    },
}

impl RuleSet {
    /// Tunable view of the active parameters.
    pub fn tunable(&self) -> &dyn Tunable {
        match self {
            RuleSet::ColorSwarm(params) => params,
            RuleSet::PredatorPrey(params) => params,
            RuleSet::Charged { params, .. } => params,
        }
    }

    /// Mutable tunable view of the active parameters.
    pub fn tunable_mut(&mut self) -> &mut dyn Tunable {
        match self {
            RuleSet::ColorSwarm(params) => params,
            RuleSet::PredatorPrey(params) => params,
            RuleSet::Charged { params, .. } => params,
        }
    }

    /// Display hint carried in every snapshot.
    pub fn point_size(&self) -> f32 {
        match self {
            RuleSet::ColorSwarm(params) => params.point_size,
            RuleSet::PredatorPrey(params) => params.point_size,
            RuleSet::Charged { params, .. } => params.point_size,
        }
    }

    /// Short name used in logs.
    pub fn label(&self) -> &'static str {
        match self {
            RuleSet::ColorSwarm(_) => "color_swarm",
            RuleSet::PredatorPrey(_) => "predator_prey",
            RuleSet::Charged { .. } => "charged",
        }
    }
}

/// Structural configuration of a run.
///
/// Population sizes are fixed for the lifetime of a run; only the tunables in
/// [`SwarmConfig::rules`] may change while it is running.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwarmConfig {
    /// Variant rules and their tunables.
    pub rules: RuleSet,
    /// Number of drifters (color swarm, charged) or prey (predator/prey).
    pub agent_count: usize,
    /// Number of predators; only used by the predator/prey variant.
    pub predator_count: usize,
    /// Number of food targets; only used by the predator/prey variant.
    pub food_count: usize,
    /// Half extent of the cube agents are scattered in at start.
    pub spawn_radius: f32,
    /// Optional RNG seed for reproducible runs.
    pub rng_seed: Option<u64>,
    /// Hue wraparound policy.
    pub hue_wrap: HueWrap,
    /// Evaluate agents on the rayon pool.
    pub parallel: bool,
    /// Use a k-d tree to find neighbor candidates.
    pub spatial_index: bool,
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self::color_swarm()
    }
}

impl SwarmConfig {
    /// A thousand hue-chemotaxis drifters on a shell of radius three.
    pub fn color_swarm() -> Self {
        Self {
            rules: RuleSet::ColorSwarm(ColorSwarmParams::default()),
            agent_count: 1000,
            predator_count: 0,
            food_count: 0,
            spawn_radius: 3.0,
            rng_seed: None,
            hue_wrap: HueWrap::Subtract,
            parallel: false,
            spatial_index: false,
        }
    }

    /// A hundred prey, four predators and five food targets.
    pub fn predator_prey() -> Self {
        Self {
            rules: RuleSet::PredatorPrey(PredatorPreyParams::default()),
            agent_count: 100,
            predator_count: 4,
            food_count: 5,
            spawn_radius: 1.0,
            ..Self::color_swarm()
        }
    }

    /// A thousand charged particles.
    pub fn charged() -> Self {
        Self {
            rules: RuleSet::Charged {
                params: ChargeParams::default(),
                flip: ChargeFlip::NearField,
            },
            agent_count: 1000,
            spawn_radius: 5.0,
            ..Self::color_swarm()
        }
    }

    /// Total number of agents the run will hold, saturating at `usize::MAX`.
    pub fn total_agents(&self) -> usize {
        match self.rules {
            RuleSet::PredatorPrey(_) => self.agent_count.saturating_add(self.predator_count),
            _ => self.agent_count,
        }
    }

    /// Checks structural values and clamps every tunable into range.
    pub fn validate(&mut self) -> Result<(), ParamError> {
        if self.agent_count > MAX_AGENTS || self.predator_count > MAX_AGENTS {
            return Err(ParamError::InvalidConfig("population exceeds MAX_AGENTS"));
        }
        if self.food_count > MAX_FOOD {
            return Err(ParamError::InvalidConfig("food_count exceeds MAX_FOOD"));
        }
        let total = match self.rules {
            RuleSet::PredatorPrey(_) => self
                .agent_count
                .checked_add(self.predator_count)
                .ok_or(ParamError::InvalidConfig("population exceeds MAX_AGENTS"))?,
            _ => self.agent_count,
        };
        if total == 0 {
            return Err(ParamError::InvalidConfig("population must not be empty"));
        }
        if total > MAX_AGENTS {
            return Err(ParamError::InvalidConfig("population exceeds MAX_AGENTS"));
        }
        if !self.spawn_radius.is_finite() || self.spawn_radius <= 0.0 {
            return Err(ParamError::InvalidConfig("spawn_radius must be positive"));
        }
        self.rules.tunable_mut().clamp_all();
        Ok(())
    }

    /// Loads and validates a configuration from a JSON file.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, SwarmError> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let mut config: SwarmConfig = serde_json::from_str(&json)?;
        config.validate()?;
        info!(
            path = %path.as_ref().display(),
            variant = config.rules.label(),
            agents = config.total_agents(),
            "Loaded swarm configuration"
        );
        Ok(config)
    }

    /// Writes the configuration as pretty JSON.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), SwarmError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
