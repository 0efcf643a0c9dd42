//! Snapshot replication from the computing role to any number of consumers.
//!
//! The computing role captures an immutable [`Snapshot`] after each tick and
//! publishes it as a fixed-layout frame: a [`WireHeader`] followed by one
//! [`AgentRecord`] per agent. A [`Transport`] keeps only the latest frame, so
//! consumers that fall behind skip snapshots and a consumer that attaches late
//! gets the full current state on first contact.

use std::mem::size_of;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use bytemuck::{Pod, Zeroable};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::geometric_utils::{hue_to_rgb, rgb_to_hue};
use super::state::SimulationState;
use crate::error::ReplicationError;

/// Leading bytes of every frame.
pub const FRAME_MAGIC: u32 = u32::from_le_bytes(*b"SWRM");
/// Encoded size of [`WireHeader`].
pub const HEADER_LEN: usize = size_of::<WireHeader>();
/// Encoded size of one [`AgentRecord`].
pub const RECORD_LEN: usize = size_of::<AgentRecord>();

/// Fixed frame header.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct WireHeader {
    /// Always [`FRAME_MAGIC`].
    pub magic: u32,
    /// Number of records that follow.
    pub agent_count: u32,
    /// Tick the snapshot was taken after.
    pub tick: u64,
    /// Render size shared by every point.
    pub point_size: f32,
    /// Zero.
    pub reserved: u32,
}

/// Per-agent frame record.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct AgentRecord {
    /// World position.
    pub position: [f32; 3],
    /// RGB derived from the agent's hue.
    pub color: [f32; 3],
}

/// Immutable copy of what a consumer needs to render one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Tick the snapshot was taken after.
    pub tick: u64,
    /// Render size shared by every point.
    pub point_size: f32,
    /// One row of `[x, y, z]` per agent.
    pub positions: Array2<f32>,
    /// One hue per agent.
    pub hues: Array1<f32>,
    /// One row of `[r, g, b]` per agent.
    pub colors: Array2<f32>,
}

impl Snapshot {
    /// Copies positions and colors out of `state`.
    pub fn capture(state: &SimulationState) -> Self {
        let agents = state.agents.as_slice();
        let count = agents.len();
        let colors: Vec<[f32; 3]> = agents.iter().map(|agent| hue_to_rgb(agent.hue())).collect();

        Self {
            tick: state.tick,
            point_size: state.rules.point_size(),
            positions: Array2::from_shape_fn((count, 3), |(i, axis)| agents[i].position[axis]),
            hues: agents.iter().map(|agent| agent.hue()).collect(),
            colors: Array2::from_shape_fn((count, 3), |(i, channel)| colors[i][channel]),
        }
    }

    /// Number of agents in the snapshot.
    pub fn agent_count(&self) -> usize {
        self.positions.nrows()
    }

    /// Position of agent `index` as an array.
    pub fn position(&self, index: usize) -> [f32; 3] {
        let row = self.positions.row(index);
        [row[0], row[1], row[2]]
    }

    /// `true` when every position, hue and color is finite.
    pub fn is_finite(&self) -> bool {
        self.positions.iter().all(|v| v.is_finite())
            && self.hues.iter().all(|v| v.is_finite())
            && self.colors.iter().all(|v| v.is_finite())
    }

    /// Encodes the snapshot as a frame.
    pub fn encode(&self) -> Vec<u8> {
        let count = self.agent_count();
        let header = WireHeader {
            magic: FRAME_MAGIC,
            agent_count: count as u32,
            tick: self.tick,
            point_size: self.point_size,
            reserved: 0,
        };

        let mut frame = Vec::with_capacity(HEADER_LEN + count * RECORD_LEN);
        frame.extend_from_slice(bytemuck::bytes_of(&header));
        for (position, color) in self.positions.rows().into_iter().zip(self.colors.rows()) {
            let record = AgentRecord {
                position: [position[0], position[1], position[2]],
                color: [color[0], color[1], color[2]],
            };
            frame.extend_from_slice(bytemuck::bytes_of(&record));
        }
        frame
    }

    /// Decodes and validates a frame.
    ///
    /// Hues are recovered from the transmitted colors.
    pub fn decode(frame: &[u8]) -> Result<Self, ReplicationError> {
        if frame.len() < HEADER_LEN {
            return Err(corrupt(format!(
                "{} bytes is shorter than the {HEADER_LEN} byte header",
                frame.len()
            )));
        }

        let header: WireHeader = bytemuck::pod_read_unaligned(&frame[..HEADER_LEN]);
        if header.magic != FRAME_MAGIC {
            return Err(corrupt(format!("bad magic {:#010x}", header.magic)));
        }
        if !header.point_size.is_finite() {
            return Err(corrupt("non-finite point size".to_string()));
        }

        let count = header.agent_count as usize;
        let body = &frame[HEADER_LEN..];
        if body.len() != count * RECORD_LEN {
            return Err(corrupt(format!(
                "header announces {count} agents but the body holds {} bytes",
                body.len()
            )));
        }

        let records: Vec<AgentRecord> = body
            .chunks_exact(RECORD_LEN)
            .map(bytemuck::pod_read_unaligned)
            .collect();

        if let Some(index) = records.iter().position(|record| {
            !record
                .position
                .iter()
                .chain(record.color.iter())
                .all(|v| v.is_finite())
        }) {
            return Err(corrupt(format!("agent {index} has non-finite values")));
        }

        Ok(Self {
            tick: header.tick,
            point_size: header.point_size,
            positions: Array2::from_shape_fn((count, 3), |(i, axis)| records[i].position[axis]),
            hues: records.iter().map(|record| rgb_to_hue(record.color)).collect(),
            colors: Array2::from_shape_fn((count, 3), |(i, channel)| records[i].color[channel]),
        })
    }
}

fn corrupt(reason: String) -> ReplicationError {
    ReplicationError::CorruptFrame(reason)
}

/// A channel that carries the most recent frame from publisher to consumers.
pub trait Transport: Send + Sync {
    /// Replaces the held frame.
    fn send(&self, frame: Vec<u8>) -> Result<(), ReplicationError>;

    /// The most recent frame, if one has been sent.
    fn latest(&self) -> Option<Arc<Vec<u8>>>;

    /// `false` once the channel can no longer carry frames.
    fn is_open(&self) -> bool;
}

/// In-process transport holding a single last-write-wins slot.
#[derive(Debug)]
pub struct LoopbackTransport {
    slot: Mutex<Option<Arc<Vec<u8>>>>,
    open: AtomicBool,
}

impl Default for LoopbackTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackTransport {
    /// Creates an open transport with an empty slot.
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            open: AtomicBool::new(true),
        }
    }

    /// Closes the transport; later sends fail.
    pub fn close(&self) {
        self.open.store(false, Ordering::Release);
    }
}

impl Transport for LoopbackTransport {
    fn send(&self, frame: Vec<u8>) -> Result<(), ReplicationError> {
        if !self.is_open() {
            return Err(ReplicationError::ChannelUnavailable);
        }
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(Arc::new(frame));
        Ok(())
    }

    fn latest(&self) -> Option<Arc<Vec<u8>>> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }
}

/// Computing-side publisher that enforces strictly increasing tick ids.
pub struct SnapshotPublisher {
    transport: Arc<dyn Transport>,
    last_tick: Option<u64>,
    published: u64,
}

impl SnapshotPublisher {
    /// Attaches to `transport`.
    ///
    /// Fails with [`ReplicationError::ChannelUnavailable`] if the transport is closed.
    pub fn new(transport: Arc<dyn Transport>) -> Result<Self, ReplicationError> {
        if !transport.is_open() {
            return Err(ReplicationError::ChannelUnavailable);
        }
        info!("Snapshot publisher attached");
        Ok(Self {
            transport,
            last_tick: None,
            published: 0,
        })
    }

    /// Encodes and sends `snapshot`.
    pub fn publish(&mut self, snapshot: &Snapshot) -> Result<(), ReplicationError> {
        if let Some(last) = self.last_tick {
            if snapshot.tick <= last {
                return Err(ReplicationError::StaleTick {
                    tick: snapshot.tick,
                    last,
                });
            }
        }

        self.transport.send(snapshot.encode())?;
        self.last_tick = Some(snapshot.tick);
        self.published += 1;
        debug!(tick = snapshot.tick, agents = snapshot.agent_count(), "Published snapshot");
        Ok(())
    }

    /// Tick of the most recently published snapshot.
    pub fn last_tick(&self) -> Option<u64> {
        self.last_tick
    }

    /// Number of snapshots published.
    pub fn published(&self) -> u64 {
        self.published
    }
}

/// Result of one [`Replica::sync`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// A newer snapshot replaced the current one.
    Updated(u64),
    /// Nothing newer was available.
    Unchanged,
    /// The latest frame was discarded; the previous snapshot is kept.
    Rejected,
}

/// Consumer-side holder of the most recent valid snapshot.
pub struct Replica {
    transport: Arc<dyn Transport>,
    current: Option<Arc<Snapshot>>,
    expected_agents: Option<usize>,
    rejected: u64,
}

impl Replica {
    /// Creates a replica with no snapshot yet.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            current: None,
            expected_agents: None,
            rejected: 0,
        }
    }

    /// Rejects frames whose agent count differs from `count`.
    #[must_use]
    pub fn with_expected_agents(mut self, count: usize) -> Self {
        self.expected_agents = Some(count);
        self
    }

    /// Pulls the latest frame and adopts it if it is valid and newer.
    pub fn sync(&mut self) -> SyncOutcome {
        let Some(frame) = self.transport.latest() else {
            return SyncOutcome::Unchanged;
        };

        let snapshot = match Snapshot::decode(&frame) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(error = %err, "Discarding snapshot frame");
                self.rejected += 1;
                return SyncOutcome::Rejected;
            }
        };

        if let Some(current) = &self.current {
            if snapshot.tick == current.tick {
                return SyncOutcome::Unchanged;
            }
            if snapshot.tick < current.tick {
                let err = ReplicationError::StaleTick {
                    tick: snapshot.tick,
                    last: current.tick,
                };
                warn!(error = %err, "Discarding snapshot frame");
                self.rejected += 1;
                return SyncOutcome::Rejected;
            }
        }

        if let Some(expected) = self.expected_agents {
            if snapshot.agent_count() != expected {
                let err = corrupt(format!(
                    "expected {expected} agents, frame holds {}",
                    snapshot.agent_count()
                ));
                warn!(error = %err, "Discarding snapshot frame");
                self.rejected += 1;
                return SyncOutcome::Rejected;
            }
        }

        let tick = snapshot.tick;
        if self.current.is_none() {
            info!(tick, agents = snapshot.agent_count(), "Replica received first snapshot");
        }
        self.current = Some(Arc::new(snapshot));
        SyncOutcome::Updated(tick)
    }

    /// The current snapshot, if any has been adopted.
    pub fn current(&self) -> Option<Arc<Snapshot>> {
        self.current.clone()
    }

    /// Number of frames discarded so far.
    pub fn rejected_frames(&self) -> u64 {
        self.rejected
    }
}
