//! CPU compute backend
//!
//! Evaluates the force kernel for all live nodes in parallel with rayon,
//! reading the current state texture and writing the next one. The readback
//! can be held back for a configurable number of polls so callers exercise
//! the same poll-until-ready path a GPU needs.

use rayon::prelude::*;

use super::kernel::{KernelInputs, relax_node};
use super::state::{PingPong, StateRecord, StateTexture};
use crate::config::PhysicsConfig;
use crate::driver::ComputeBackend;
use crate::error::GraphResult;
use crate::graph::{AdjacencyIndex, EdgeRecord};

struct PendingReadback {
    records: Vec<StateRecord>,
    polls_left: u32,
}

/// Rayon-parallel ping-pong executor for the force kernel
pub struct CpuBackend {
    buffers: PingPong<StateTexture>,
    edges: Vec<EdgeRecord>,
    starts: Vec<i32>,
    config: PhysicsConfig,
    readback_latency: u32,
    pending: Option<PendingReadback>,
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuBackend {
    pub fn new() -> Self {
        Self {
            buffers: PingPong::new(StateTexture::with_capacity(0), StateTexture::with_capacity(0)),
            edges: Vec::new(),
            starts: Vec::new(),
            config: PhysicsConfig::default(),
            readback_latency: 0,
            pending: None,
        }
    }

    /// Hold each readback back for `polls` unsuccessful polls
    pub fn with_readback_latency(mut self, polls: u32) -> Self {
        self.readback_latency = polls;
        self
    }

    /// The state texture the next pass will read
    pub fn current(&self) -> &StateTexture {
        self.buffers.current()
    }
}

impl ComputeBackend for CpuBackend {
    fn name(&self) -> &str {
        "cpu"
    }

    fn reserve(&mut self, capacity: usize) -> GraphResult<bool> {
        if self.buffers.current().fits(capacity) {
            return Ok(false);
        }
        self.buffers = PingPong::new(
            StateTexture::with_capacity(capacity),
            StateTexture::with_capacity(capacity),
        );
        Ok(true)
    }

    fn upload_state(&mut self, records: &[StateRecord]) -> GraphResult<()> {
        self.buffers.current_mut().upload(records);
        Ok(())
    }

    fn upload_adjacency(&mut self, adjacency: &AdjacencyIndex) -> GraphResult<()> {
        self.edges.clear();
        self.edges.extend_from_slice(adjacency.edges());
        self.starts.clear();
        self.starts.extend_from_slice(adjacency.starts());
        Ok(())
    }

    fn set_params(&mut self, config: &PhysicsConfig) {
        self.config = *config;
    }

    fn dispatch(&mut self, node_count: usize) -> GraphResult<()> {
        let n = node_count.min(self.buffers.current().slot_count());
        let config = &self.config;
        let (current, next) = self.buffers.split();
        let inputs = KernelInputs {
            state: &current.records()[..n],
            edges: &self.edges,
            starts: &self.starts,
        };

        next.records_mut()[..n]
            .par_iter_mut()
            .enumerate()
            .for_each(|(i, out)| *out = relax_node(i, &inputs, config));

        self.buffers.swap();
        self.pending = Some(PendingReadback {
            records: self.buffers.current().records()[..n].to_vec(),
            polls_left: self.readback_latency,
        });
        Ok(())
    }

    fn poll_readback(&mut self) -> Option<GraphResult<Vec<StateRecord>>> {
        let pending = self.pending.as_mut()?;
        if pending.polls_left > 0 {
            pending.polls_left -= 1;
            return None;
        }
        self.pending.take().map(|p| Ok(p.records))
    }
}
