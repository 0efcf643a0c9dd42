//! # Swarm - Multi-Agent Swarm Simulation
//!
//! A real-time simulation of many point agents in 3D space that steer, drift
//! in color and exert forces on each other through local pairwise rules. One
//! computing role advances the state tick by tick and publishes an immutable
//! snapshot that any number of consumers replicate.
//!
//! ## Features
//!
//! - Color swarm: hue-affinity steering on a spherical shell
//! - Predator/prey flocking with food targets
//! - Charged particles with drag and a shell spring
//! - Runtime-tunable, range-clamped parameters
//! - Optional rayon parallelism and k-d tree neighbor queries
//! - Fixed-layout snapshot frames with late-joining replicas
//! - Save/load simulation state
//!
//! ## Core Modules
//!
//! - [`simulation::swarm`] - Tick driver
//! - [`simulation::engine`] - Pairwise interaction rules
//! - [`simulation::integrator`] - Position and heading updates
//! - [`simulation::replication`] - Snapshot frames, transport and replicas
//! - [`simulation::params`] - Tunables and run configuration
//! - [`simulation::events`] - Runtime control events

/// Error types shared across the crate.
pub mod error;

/// Core simulation logic and data structures.
pub mod simulation {
    /// Agents and the pool that owns them.
    pub mod agent;
    /// Interaction rules evaluated against a frozen state.
    pub mod engine;
    /// Control events applied at the start of a tick.
    pub mod events;
    /// Food targets for the predator/prey variant.
    pub mod food;
    /// Vector, heading and color helpers.
    pub mod geometric_utils;
    /// Steering and Newtonian integration.
    pub mod integrator;
    /// Tunable parameters, rule sets and run configuration.
    pub mod params;
    /// Snapshot capture, encoding and replication.
    ///
    /// A [`replication::SnapshotPublisher`] on the computing role writes frames
    /// to a [`replication::Transport`]; each [`replication::Replica`] reads the
    /// latest one.
    pub mod replication;
    /// K-d tree neighbor candidates.
    pub mod spatial;
    /// Authoritative simulation state.
    pub mod state;
    /// The tick driver.
    pub mod swarm;
}
