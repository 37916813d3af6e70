//! Graph expansion
//!
//! Expanding a node fetches its outbound links and grows the graph: unseen
//! titles become new nodes fanned out around the expanding node, and every
//! link becomes a connection. Only one expansion may be in flight; a second
//! request is rejected, not queued.
//!
//! The flow is split so the fetch can run outside the explorer:
//!
//! ```rust,ignore
//! let ticket = explorer.begin_expansion(index)?;
//! match fetcher.fetch_links(ticket.title()).await {
//!     Ok(links) => explorer.finish_expansion(ticket, links)?,
//!     Err(err) => explorer.abort_expansion(ticket),
//! };
//! ```
//!
//! [`Explorer::expand`] does exactly that in one call.

use std::collections::{HashSet, VecDeque};
use std::f32::consts::TAU;

use tracing::{info, warn};

use crate::config::ExplorerConfig;
use crate::error::{GraphError, GraphResult};
use crate::graph::{GraphStore, Node};
use crate::links::LinkFetcher;

/// Proof that an expansion was started; consumed by finish or abort
#[derive(Debug, PartialEq, Eq)]
pub struct ExpansionTicket {
    index: usize,
    title: String,
    serial: u64,
}

impl ExpansionTicket {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn title(&self) -> &str {
        &self.title
    }
}

/// Outcome of one applied expansion
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpansionReport {
    pub origin: usize,
    /// Indices of nodes created by this expansion, in fan-out order
    pub added_nodes: Vec<usize>,
    pub added_connections: usize,
}

/// Owns the graph and the expansion guard
#[derive(Debug)]
pub struct Explorer {
    store: GraphStore,
    config: ExplorerConfig,
    in_flight: Option<(usize, String, u64)>,
    serial: u64,
}

impl Default for Explorer {
    fn default() -> Self {
        Self::new(ExplorerConfig::default())
    }
}

impl Explorer {
    pub fn new(config: ExplorerConfig) -> Self {
        Self {
            store: GraphStore::with_capacity(config.initial_capacity),
            config,
            in_flight: None,
            serial: 0,
        }
    }

    pub fn store(&self) -> &GraphStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut GraphStore {
        &mut self.store
    }

    pub fn config(&self) -> &ExplorerConfig {
        &self.config
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Add a starting article, or return the existing node with that title
    pub fn add_root(&mut self, title: &str, position: [f32; 2]) -> usize {
        if let Some(index) = self.store.find_node_from_title(title) {
            return index;
        }
        let node = Node::new(title, position[0], position[1])
            .with_temperature(self.config.initial_temperature);
        self.store.push_node(node)
    }

    /// Start expanding node `index`
    pub fn begin_expansion(&mut self, index: usize) -> GraphResult<ExpansionTicket> {
        let title = self.store.node(index)?.title.clone();
        if let Some((_, busy, _)) = &self.in_flight {
            warn!(
                requested = %title,
                busy = %busy,
                "expansion already in flight; dropping request"
            );
            return Err(GraphError::ExpansionInFlight {
                title: busy.clone(),
            });
        }

        self.serial += 1;
        self.in_flight = Some((index, title.clone(), self.serial));
        Ok(ExpansionTicket {
            index,
            title,
            serial: self.serial,
        })
    }

    /// Release the guard without touching the graph
    pub fn abort_expansion(&mut self, ticket: ExpansionTicket) {
        if self.owns(&ticket) {
            self.in_flight = None;
        }
    }

    /// Apply the fetched links of a started expansion
    pub fn finish_expansion(
        &mut self,
        ticket: ExpansionTicket,
        links: Vec<String>,
    ) -> GraphResult<ExpansionReport> {
        if !self.owns(&ticket) {
            return Err(GraphError::UnknownTicket);
        }
        self.in_flight = None;
        self.apply_links(ticket.index, &ticket.title, links)
    }

    /// Fetch and apply the links of node `index`
    pub async fn expand<F: LinkFetcher>(
        &mut self,
        index: usize,
        fetcher: &F,
    ) -> GraphResult<ExpansionReport> {
        let ticket = self.begin_expansion(index)?;
        match fetcher.fetch_links(ticket.title()).await {
            Ok(links) => self.finish_expansion(ticket, links),
            Err(err) => {
                self.abort_expansion(ticket);
                Err(err)
            }
        }
    }

    /// Expand breadth-first from `seed` until the graph holds `max_nodes`
    /// nodes or the frontier runs dry. Fetch failures skip that node.
    pub async fn expand_breadth_first<F: LinkFetcher>(
        &mut self,
        seed: usize,
        fetcher: &F,
        max_nodes: usize,
    ) -> GraphResult<usize> {
        let mut frontier = VecDeque::from([seed]);
        let mut expansions = 0;
        while let Some(index) = frontier.pop_front() {
            if self.store.node_count() >= max_nodes {
                break;
            }
            if self.store.node(index)?.expanded {
                continue;
            }
            match self.expand(index, fetcher).await {
                Ok(report) => {
                    expansions += 1;
                    frontier.extend(report.added_nodes);
                }
                Err(GraphError::Fetch(reason)) => {
                    warn!(index, %reason, "skipping node whose links could not be fetched");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(expansions)
    }

    /// Rebuild a graph from saved titles, positions and index pairs.
    ///
    /// Goes through the same insertion paths as live expansion so ids, title
    /// lookup, the connectivity matrix and masses all come out consistent.
    pub fn restore<N, C>(&mut self, nodes: N, connections: C) -> GraphResult<()>
    where
        N: IntoIterator<Item = (String, [f32; 2])>,
        C: IntoIterator<Item = (usize, usize)>,
    {
        self.store.clear();
        self.in_flight = None;
        for (title, position) in nodes {
            let node = Node::new(title, position[0], position[1])
                .with_temperature(self.config.initial_temperature);
            self.store.push_node(node);
        }
        for (a, b) in connections {
            self.store.set_connected(a, b, true)?;
        }
        Ok(())
    }

    fn owns(&self, ticket: &ExpansionTicket) -> bool {
        matches!(&self.in_flight, Some((_, _, serial)) if *serial == ticket.serial)
    }

    fn apply_links(
        &mut self,
        origin: usize,
        origin_title: &str,
        links: Vec<String>,
    ) -> GraphResult<ExpansionReport> {
        let center = self.store.node(origin)?.position;

        let mut seen = HashSet::new();
        let links: Vec<String> = links
            .into_iter()
            .filter(|l| l != origin_title && seen.insert(l.clone()))
            .collect();

        let mut report = ExpansionReport {
            origin,
            ..Default::default()
        };
        let step = if links.is_empty() {
            0.0
        } else {
            TAU / links.len() as f32
        };

        for (k, title) in links.into_iter().enumerate() {
            let target = match self.store.find_node_from_title(&title) {
                Some(existing) => existing,
                None => {
                    let angle = step * k as f32;
                    let distance = self.config.fan_out_distance;
                    let node = Node::new(
                        title,
                        center[0] + distance * angle.cos(),
                        center[1] + distance * angle.sin(),
                    )
                    .with_temperature(self.config.initial_temperature);
                    let index = self.store.push_node(node);
                    report.added_nodes.push(index);
                    index
                }
            };
            if !self.store.is_connected(origin, target)? {
                self.store.set_connected(origin, target, true)?;
                report.added_connections += 1;
            }
        }

        let node = self.store.node_mut(origin)?;
        node.expanded = true;
        node.temperature = self.config.initial_temperature;

        info!(
            title = origin_title,
            new_nodes = report.added_nodes.len(),
            new_connections = report.added_connections,
            total_nodes = self.store.node_count(),
            "expanded node"
        );
        Ok(report)
    }
}
