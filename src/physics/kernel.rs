//! Per-node force kernel
//!
//! [`relax_node`] is a pure function of the previous tick's global state: it
//! reads every record and writes nothing. Backends evaluate it once per live
//! node and store the results in a separate buffer, so every node sees the
//! same snapshot. The WGSL kernel in the `gpu` module implements the same
//! model line for line.
//!
//! Forces:
//! - **Repulsion**: inverse-square between every pair, scaled by both masses
//! - **Spring**: logarithmic along each connection, zero at the rest distance
//! - **Thermostat**: temperature rises under load and falls when settled, and
//!   scales the resulting displacement

use super::state::StateRecord;
use crate::config::PhysicsConfig;
use crate::graph::{EdgeRecord, incident};

/// Read-only view of everything one kernel invocation may touch
#[derive(Debug, Clone, Copy)]
pub struct KernelInputs<'a> {
    /// Live node records; its length is the iteration bound
    pub state: &'a [StateRecord],
    /// Sorted edges with stride chains
    pub edges: &'a [EdgeRecord],
    /// Per-node first incident edge
    pub starts: &'a [i32],
}

/// Unit direction and distance from `from` to `to`, or `None` when the two
/// points coincide
#[inline]
fn direction(from: [f32; 2], to: [f32; 2], epsilon: f32) -> Option<([f32; 2], f32)> {
    let dx = to[0] - from[0];
    let dy = to[1] - from[1];
    let d = (dx * dx + dy * dy).sqrt();
    if d < epsilon {
        return None;
    }
    Some(([dx / d, dy / d], d))
}

/// Surface-to-surface distance, floored at `node_min_dist`
#[inline]
fn effective_distance(d: f32, me: &StateRecord, other: &StateRecord, cfg: &PhysicsConfig) -> f32 {
    (d - (cfg.radius(me.mass) + cfg.radius(other.mass))).max(cfg.node_min_dist)
}

/// Repulsive force exerted on `me` by `other`
pub fn repulsion(me: &StateRecord, other: &StateRecord, cfg: &PhysicsConfig) -> [f32; 2] {
    let Some((dir, d)) = direction(me.position(), other.position(), cfg.epsilon) else {
        return [0.0, 0.0];
    };
    let eff = effective_distance(d, me, other, cfg);
    let f = cfg.repulsion * me.mass * other.mass / (eff * eff);
    [-dir[0] * f, -dir[1] * f]
}

/// Spring force exerted on `me` by a connected `other`
pub fn spring(me: &StateRecord, other: &StateRecord, cfg: &PhysicsConfig) -> [f32; 2] {
    let Some((dir, d)) = direction(me.position(), other.position(), cfg.epsilon) else {
        return [0.0, 0.0];
    };
    let eff = effective_distance(d, me, other, cfg);
    let f = (eff / cfg.spring_rest_distance).ln() * cfg.spring;
    [dir[0] * f, dir[1] * f]
}

/// Net force on node `i`
pub fn net_force(i: usize, inputs: &KernelInputs<'_>, cfg: &PhysicsConfig) -> [f32; 2] {
    let me = &inputs.state[i];
    let mut force = [0.0f32, 0.0];

    for (j, other) in inputs.state.iter().enumerate() {
        if j == i {
            continue;
        }
        let f = repulsion(me, other, cfg);
        force[0] += f[0];
        force[1] += f[1];
    }

    for (_, j) in incident(inputs.edges, inputs.starts, i) {
        if let Some(other) = inputs.state.get(j) {
            let f = spring(me, other, cfg);
            force[0] += f[0];
            force[1] += f[1];
        }
    }

    force
}

/// Next temperature given the magnitude of the net force
#[inline]
pub fn thermostat(temperature: f32, force_magnitude: f32, cfg: &PhysicsConfig) -> f32 {
    let t = if force_magnitude < cfg.temp_fall_point {
        temperature - cfg.temp_change_rate
    } else {
        temperature + cfg.temp_change_rate
    };
    t.clamp(0.0, 1.0)
}

/// Compute node `i`'s record for the next tick
pub fn relax_node(i: usize, inputs: &KernelInputs<'_>, cfg: &PhysicsConfig) -> StateRecord {
    let me = inputs.state[i];
    if me.mass < cfg.epsilon {
        return me;
    }

    let force = net_force(i, inputs, cfg);
    let magnitude = (force[0] * force[0] + force[1] * force[1]).sqrt();
    let temperature = thermostat(me.temperature, magnitude, cfg);

    let scale = temperature / me.mass;
    let mut velocity = [force[0] * scale, force[1] * scale];
    let speed = (velocity[0] * velocity[0] + velocity[1] * velocity[1]).sqrt();
    if speed > cfg.force_cap {
        let k = cfg.force_cap / speed;
        velocity = [velocity[0] * k, velocity[1] * k];
    }

    StateRecord::new(me.x + velocity[0], me.y + velocity[1], me.mass, temperature)
}
