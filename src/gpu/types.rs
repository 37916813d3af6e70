//! GPU buffer types for the force kernel
//!
//! These types are uploaded directly to GPU buffers and are repr(C) for
//! predictable layout.

use bytemuck::{Pod, Zeroable};

use crate::config::PhysicsConfig;

/// Threads per workgroup in the relax kernel
pub const WORKGROUP_SIZE: u32 = 64;

/// Bytes per state texel (`vec4<u32>`)
pub const STATE_TEXEL_BYTES: u64 = 16;

/// Kernel parameters passed to GPU as uniforms
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct KernelUniforms {
    /// Live nodes; the kernel never iterates past this
    pub node_count: u32,
    /// Sorted edges
    pub edge_count: u32,
    pub base_radius: f32,
    pub mass_to_radius: f32,
    pub repulsion: f32,
    pub spring: f32,
    pub spring_rest_distance: f32,
    pub node_min_dist: f32,
    pub temp_fall_point: f32,
    pub temp_change_rate: f32,
    pub force_cap: f32,
    pub epsilon: f32,
}

impl KernelUniforms {
    pub fn new(config: &PhysicsConfig, node_count: u32, edge_count: u32) -> Self {
        Self {
            node_count,
            edge_count,
            base_radius: config.base_radius,
            mass_to_radius: config.mass_to_radius,
            repulsion: config.repulsion,
            spring: config.spring,
            spring_rest_distance: config.spring_rest_distance,
            node_min_dist: config.node_min_dist,
            temp_fall_point: config.temp_fall_point,
            temp_change_rate: config.temp_change_rate,
            force_cap: config.force_cap,
            epsilon: config.epsilon,
        }
    }
}

impl Default for KernelUniforms {
    fn default() -> Self {
        Self::new(&PhysicsConfig::default(), 0, 0)
    }
}
