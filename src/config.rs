//! Simulation and expansion parameters
//!
//! All physics constants live in [`PhysicsConfig`] and are shared verbatim by
//! the CPU kernel and the GPU uniforms. [`Settings`] bundles both configs for
//! loading from a YAML or JSON file.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

// =============================================================================
// Default Constants
// =============================================================================

/// Radius of a node with zero mass
pub const DEFAULT_BASE_RADIUS: f32 = 10.0;

/// Radius gained per unit of mass
pub const DEFAULT_MASS_TO_RADIUS: f32 = 2.0;

/// Inverse-square repulsion constant
pub const DEFAULT_REPULSION: f32 = 400.0;

/// Logarithmic spring constant
pub const DEFAULT_SPRING: f32 = 2.0;

/// Surface-to-surface distance at which a spring exerts no force
pub const DEFAULT_SPRING_REST_DISTANCE: f32 = 120.0;

/// Floor applied to surface distances before any force evaluation
pub const DEFAULT_NODE_MIN_DIST: f32 = 10.0;

/// Net force below which a node cools down
pub const DEFAULT_TEMP_FALL_POINT: f32 = 1.0;

/// Temperature change per tick
pub const DEFAULT_TEMP_CHANGE_RATE: f32 = 0.01;

/// Maximum displacement per tick
pub const DEFAULT_FORCE_CAP: f32 = 20.0;

/// Distances and masses below this are treated as zero
pub const DEFAULT_EPSILON: f32 = 0.001;

/// Distance from the expanding node at which new nodes are placed
pub const DEFAULT_FAN_OUT_DISTANCE: f32 = 150.0;

/// Node slots reserved before the first capacity doubling
pub const DEFAULT_INITIAL_CAPACITY: usize = 16;

/// Force model parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    /// Radius of a node with zero mass
    pub base_radius: f32,
    /// Radius gained per unit of mass
    pub mass_to_radius: f32,
    /// Inverse-square repulsion constant
    pub repulsion: f32,
    /// Logarithmic spring constant
    pub spring: f32,
    /// Surface-to-surface rest distance of a spring
    pub spring_rest_distance: f32,
    /// Lower bound on the surface-to-surface distance
    pub node_min_dist: f32,
    /// Net force threshold for cooling
    pub temp_fall_point: f32,
    /// Temperature step per tick
    pub temp_change_rate: f32,
    /// Maximum displacement per tick
    pub force_cap: f32,
    /// Coincidence and zero-mass threshold
    pub epsilon: f32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            base_radius: DEFAULT_BASE_RADIUS,
            mass_to_radius: DEFAULT_MASS_TO_RADIUS,
            repulsion: DEFAULT_REPULSION,
            spring: DEFAULT_SPRING,
            spring_rest_distance: DEFAULT_SPRING_REST_DISTANCE,
            node_min_dist: DEFAULT_NODE_MIN_DIST,
            temp_fall_point: DEFAULT_TEMP_FALL_POINT,
            temp_change_rate: DEFAULT_TEMP_CHANGE_RATE,
            force_cap: DEFAULT_FORCE_CAP,
            epsilon: DEFAULT_EPSILON,
        }
    }
}

impl PhysicsConfig {
    /// Radius of a node of the given mass.
    ///
    /// This is the only radius formula in the crate; the WGSL kernel mirrors
    /// it using the same two fields.
    #[inline]
    pub fn radius(&self, mass: f32) -> f32 {
        self.base_radius + mass * self.mass_to_radius
    }
}

/// Graph expansion parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplorerConfig {
    /// Distance from the expanding node at which new nodes are placed
    pub fan_out_distance: f32,
    /// Temperature given to new and freshly expanded nodes
    pub initial_temperature: f32,
    /// Node capacity of a fresh store
    pub initial_capacity: usize,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            fan_out_distance: DEFAULT_FAN_OUT_DISTANCE,
            initial_temperature: 1.0,
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
        }
    }
}

/// Everything a settings file can carry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub physics: PhysicsConfig,
    pub explorer: ExplorerConfig,
}

impl Settings {
    /// Load settings from a `.yaml`/`.yml` or `.json` file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading settings from {}", path.display()))?;
        let settings = match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => serde_json::from_str(&text)?,
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                serde_yaml::from_str(&text)?
            }
            _ => anyhow::bail!("unsupported settings format: {}", path.display()),
        };
        Ok(settings)
    }
}
