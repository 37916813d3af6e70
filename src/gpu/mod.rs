//! GPU compute backend for the force-directed layout (wgpu)
//!
//! Runs the same per-node relax kernel as [`crate::physics::CpuBackend`] in a
//! WGSL compute shader, one invocation per live node. Enabled with the `gpu`
//! feature.
//!
//! # Layout
//!
//! - **State**: two storage buffers of `vec4<u32>` texels, `width * width`
//!   each, holding bit-cast `(x, y, mass, temperature)` records
//! - **Adjacency**: the sorted edge records with their stride chains, plus
//!   one start pointer per node
//! - **Params**: force constants and the live node count as a uniform
//!
//! # Example
//!
//! ```rust,ignore
//! use wikigraph::driver::SimulationDriver;
//! use wikigraph::gpu::GpuBackend;
//!
//! let backend = GpuBackend::new()?;
//! let mut driver = SimulationDriver::new(backend);
//! driver.tick(&mut store, &mut ())?;
//! ```

mod backend;
mod shaders;
mod types;

pub use backend::GpuBackend;
pub use shaders::{RELAX_ENTRY_POINT, relax_shader};
pub use types::{KernelUniforms, STATE_TEXEL_BYTES, WORKGROUP_SIZE};
