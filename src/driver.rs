//! Simulation driver
//!
//! Moves graph data into a [`ComputeBackend`], runs one kernel pass per tick,
//! and folds the results back into the [`GraphStore`] once the backend reports
//! them ready. One pass is in flight at a time:
//!
//! ```text
//! Idle -> Uploading -> Executing -> ReadingBack -> Idle
//! ```
//!
//! A tick never blocks on the backend. While a readback is outstanding the tick
//! only polls; when it lands the results are applied and the next pass is
//! issued in the same tick.

use tracing::{debug, warn};

use crate::config::PhysicsConfig;
use crate::error::{GraphError, GraphResult};
use crate::graph::{AdjacencyIndex, Connection, DirtyFlags, GraphStore, Node};
use crate::physics::StateRecord;

/// Parallel substrate that executes the force kernel
///
/// Implementations keep two state buffers and alternate them: a pass reads
/// the current buffer, writes the other, then swaps so the freshly written
/// buffer becomes current and is the one read back.
pub trait ComputeBackend {
    /// Short identifier for logs (e.g., "cpu", "gpu")
    fn name(&self) -> &str;

    /// Make room for `capacity` node slots.
    ///
    /// Returns `true` when storage was reallocated and every record must be
    /// uploaded again.
    fn reserve(&mut self, capacity: usize) -> GraphResult<bool>;

    /// Write records into the leading slots of the current buffer
    fn upload_state(&mut self, records: &[StateRecord]) -> GraphResult<()>;

    /// Replace the edge and start-pointer data
    fn upload_adjacency(&mut self, adjacency: &AdjacencyIndex) -> GraphResult<()>;

    /// Replace the force parameters
    fn set_params(&mut self, config: &PhysicsConfig);

    /// Run one pass over the first `node_count` slots, swap buffers and start
    /// reading back the new current buffer
    fn dispatch(&mut self, node_count: usize) -> GraphResult<()>;

    /// Non-blocking check for the outstanding readback
    fn poll_readback(&mut self) -> Option<GraphResult<Vec<StateRecord>>>;
}

/// Consumer of node and connection data for display
pub trait RenderConsumer {
    /// Receive the current graph. Only channels in `dirty` changed since the
    /// previous submission.
    fn submit(&mut self, nodes: &[Node], connections: &[Connection], dirty: DirtyFlags);
}

impl RenderConsumer for () {
    fn submit(&mut self, _nodes: &[Node], _connections: &[Connection], _dirty: DirtyFlags) {}
}

/// Where the driver is in its per-pass cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverPhase {
    Idle,
    Uploading,
    Executing,
    ReadingBack,
}

/// What one tick did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Nodes updated from a completed readback
    pub applied: Option<usize>,
    /// Whether a new pass was issued
    pub launched: bool,
}

/// Counters since the driver was created
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriverStats {
    pub ticks: u64,
    pub passes: u64,
    pub readbacks: u64,
    pub diverged_readbacks: u64,
}

/// Orchestrates upload, kernel execution and readback
pub struct SimulationDriver<B: ComputeBackend> {
    backend: B,
    config: PhysicsConfig,
    phase: DriverPhase,
    adjacency: AdjacencyIndex,
    /// Node count of the last upload, i.e. what the kernel ran on
    uploaded_nodes: usize,
    primed: bool,
    render_dirty: DirtyFlags,
    stats: DriverStats,
}

impl<B: ComputeBackend> SimulationDriver<B> {
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, PhysicsConfig::default())
    }

    pub fn with_config(mut backend: B, config: PhysicsConfig) -> Self {
        backend.set_params(&config);
        Self {
            backend,
            config,
            phase: DriverPhase::Idle,
            adjacency: AdjacencyIndex::default(),
            uploaded_nodes: 0,
            primed: false,
            render_dirty: DirtyFlags::NONE,
            stats: DriverStats::default(),
        }
    }

    pub fn phase(&self) -> DriverPhase {
        self.phase
    }

    pub fn stats(&self) -> DriverStats {
        self.stats
    }

    pub fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    /// Adjacency as of the last upload
    pub fn adjacency(&self) -> &AdjacencyIndex {
        &self.adjacency
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Node count the in-flight or last pass was issued for
    pub fn kernel_node_count(&self) -> usize {
        self.uploaded_nodes
    }

    pub fn set_config(&mut self, config: PhysicsConfig) {
        self.config = config;
        self.backend.set_params(&config);
    }

    /// Advance by one animation frame
    pub fn tick(
        &mut self,
        store: &mut GraphStore,
        render: &mut dyn RenderConsumer,
    ) -> GraphResult<TickReport> {
        self.stats.ticks += 1;
        let mut report = TickReport::default();

        if self.phase == DriverPhase::ReadingBack {
            match self.backend.poll_readback() {
                None => return Ok(report),
                Some(result) => {
                    self.phase = DriverPhase::Idle;
                    let records = result?;
                    report.applied = Some(self.apply_readback(store, &records, render));
                }
            }
        }

        if store.node_count() == 0 {
            return Ok(report);
        }

        if let Err(err) = self.launch(store) {
            self.phase = DriverPhase::Idle;
            return Err(err);
        }
        report.launched = true;
        Ok(report)
    }

    /// Tick until no pass is in flight, yielding between polls
    pub fn finish(
        &mut self,
        store: &mut GraphStore,
        render: &mut dyn RenderConsumer,
    ) -> GraphResult<()> {
        while self.phase == DriverPhase::ReadingBack {
            match self.backend.poll_readback() {
                None => std::thread::yield_now(),
                Some(result) => {
                    self.phase = DriverPhase::Idle;
                    let records = result?;
                    self.apply_readback(store, &records, render);
                }
            }
        }
        Ok(())
    }

    fn launch(&mut self, store: &mut GraphStore) -> GraphResult<()> {
        self.phase = DriverPhase::Uploading;
        self.upload(store)?;

        self.phase = DriverPhase::Executing;
        self.backend.dispatch(self.uploaded_nodes)?;
        self.stats.passes += 1;

        self.phase = DriverPhase::ReadingBack;
        Ok(())
    }

    /// Push whatever changed since the last upload
    fn upload(&mut self, store: &mut GraphStore) -> GraphResult<()> {
        let dirty = store.take_dirty();
        let host_edits = store.take_host_edits();
        self.render_dirty |= dirty;
        let count = store.node_count();

        let regrown = self.backend.reserve(store.capacity().max(count))?;
        let structural = regrown
            || !self.primed
            || count != self.uploaded_nodes
            || dirty.contains(DirtyFlags::CONNECTIONS);

        if structural {
            self.adjacency = AdjacencyIndex::build(store.connections(), count);
            self.backend.upload_adjacency(&self.adjacency)?;
        }
        if structural || host_edits > 0 || dirty.contains(DirtyFlags::NODE_POSITIONS) {
            let records: Vec<StateRecord> =
                store.nodes().iter().map(StateRecord::from_node).collect();
            self.backend.upload_state(&records)?;
            debug!(
                backend = self.backend.name(),
                nodes = count,
                edges = self.adjacency.edges().len(),
                host_edits,
                regrown,
                "uploaded state"
            );
        }

        self.uploaded_nodes = count;
        self.primed = true;
        Ok(())
    }

    /// Fold kernel results into the store.
    ///
    /// If the store gained nodes while the pass was in flight, only the nodes
    /// the kernel actually ran on are updated; the newcomers keep their
    /// host-side state and join the next upload. Nodes the host edited after
    /// the pass was issued are skipped the same way.
    fn apply_readback(
        &mut self,
        store: &mut GraphStore,
        records: &[StateRecord],
        render: &mut dyn RenderConsumer,
    ) -> usize {
        let live = store.node_count();
        if live != self.uploaded_nodes {
            let diverged = GraphError::ReadbackDiverged {
                store: live,
                kernel: self.uploaded_nodes,
            };
            warn!("{diverged}; clamping readback");
            self.stats.diverged_readbacks += 1;
        }

        let n = live.min(self.uploaded_nodes).min(records.len());
        let applied =
            store.apply_kinematics(records[..n].iter().map(|r| (r.position(), r.temperature)));
        self.stats.readbacks += 1;

        let dirty = std::mem::take(&mut self.render_dirty) | DirtyFlags::NODE_POSITIONS;
        render.submit(store.nodes(), store.connections(), dirty);
        applied
    }
}
