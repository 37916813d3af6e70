//! Force-directed layout engine
//!
//! - [`state`]: packed per-node records, square state textures, ping-pong pairs
//! - [`kernel`]: the pure per-node force step
//! - [`cpu`]: rayon backend running the kernel over a ping-pong pair

pub mod cpu;
pub mod kernel;
pub mod state;

pub use cpu::CpuBackend;
pub use kernel::{KernelInputs, relax_node};
pub use state::{MIN_TEXTURE_WIDTH, PingPong, StateRecord, StateTexture, width_for_capacity};
