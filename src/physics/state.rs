//! Per-node physics state records and their double-buffered storage
//!
//! A state "texture" is a square grid of `width * width` record slots; slot
//! `k` sits at cell `(k % width, k / width)`. Only the first `node_count`
//! slots are meaningful and kernels are bounded by that count, never by the
//! grid size.

use crate::graph::Node;

/// Minimum grid edge length
pub const MIN_TEXTURE_WIDTH: usize = 128;

/// Packed `(x, y, mass, temperature)` record for one node slot.
///
/// Layout matches one `vec4<u32>` texel in the WGSL kernel after bit-casting.
#[repr(C)]
#[cfg_attr(feature = "gpu", derive(bytemuck::Pod, bytemuck::Zeroable))]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StateRecord {
    pub x: f32,
    pub y: f32,
    pub mass: f32,
    pub temperature: f32,
}

impl StateRecord {
    pub fn new(x: f32, y: f32, mass: f32, temperature: f32) -> Self {
        Self {
            x,
            y,
            mass,
            temperature,
        }
    }

    pub fn from_node(node: &Node) -> Self {
        Self::new(
            node.position[0],
            node.position[1],
            node.mass,
            node.temperature,
        )
    }

    pub fn position(&self) -> [f32; 2] {
        [self.x, self.y]
    }

    /// IEEE-754 bit patterns for an integer-typed channel
    pub fn to_words(self) -> [u32; 4] {
        [
            self.x.to_bits(),
            self.y.to_bits(),
            self.mass.to_bits(),
            self.temperature.to_bits(),
        ]
    }

    pub fn from_words(words: [u32; 4]) -> Self {
        Self::new(
            f32::from_bits(words[0]),
            f32::from_bits(words[1]),
            f32::from_bits(words[2]),
            f32::from_bits(words[3]),
        )
    }
}

/// Grid edge length needed for `capacity` slots
pub fn width_for_capacity(capacity: usize) -> usize {
    let mut width = (capacity as f64).sqrt().ceil() as usize;
    // Guard against float rounding just below a perfect square
    while width * width < capacity {
        width += 1;
    }
    width.max(MIN_TEXTURE_WIDTH)
}

/// Square grid of state records
#[derive(Debug, Clone, PartialEq)]
pub struct StateTexture {
    width: usize,
    records: Vec<StateRecord>,
}

impl StateTexture {
    /// Allocate a zeroed grid large enough for `capacity` slots
    pub fn with_capacity(capacity: usize) -> Self {
        let width = width_for_capacity(capacity);
        Self {
            width,
            records: vec![StateRecord::default(); width * width],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn slot_count(&self) -> usize {
        self.records.len()
    }

    /// Grid cell of slot `k`
    pub fn cell(&self, k: usize) -> (usize, usize) {
        (k % self.width, k / self.width)
    }

    pub fn records(&self) -> &[StateRecord] {
        &self.records
    }

    pub fn records_mut(&mut self) -> &mut [StateRecord] {
        &mut self.records
    }

    /// Write records into the leading slots
    pub fn upload(&mut self, records: &[StateRecord]) {
        self.records[..records.len()].copy_from_slice(records);
    }

    /// Whether `capacity` slots fit without regrowing
    pub fn fits(&self, capacity: usize) -> bool {
        capacity <= self.records.len()
    }
}

/// Two equally sized buffers with alternating read/write roles
#[derive(Debug, Clone)]
pub struct PingPong<T> {
    buffers: [T; 2],
    current: usize,
}

impl<T> PingPong<T> {
    pub fn new(a: T, b: T) -> Self {
        Self {
            buffers: [a, b],
            current: 0,
        }
    }

    /// The last-written buffer, safe to read
    pub fn current(&self) -> &T {
        &self.buffers[self.current]
    }

    pub fn current_mut(&mut self) -> &mut T {
        &mut self.buffers[self.current]
    }

    /// Read access to the current buffer alongside write access to the next
    pub fn split(&mut self) -> (&T, &mut T) {
        let (first, second) = self.buffers.split_at_mut(1);
        if self.current == 0 {
            (&first[0], &mut second[0])
        } else {
            (&second[0], &mut first[0])
        }
    }

    /// Make the next buffer current
    pub fn swap(&mut self) {
        self.current ^= 1;
    }

    /// Which buffer (0 or 1) is current
    pub fn current_index(&self) -> usize {
        self.current
    }

    /// Both buffers by absolute index, for binding them as a pair
    pub fn both(&self) -> &[T; 2] {
        &self.buffers
    }
}
