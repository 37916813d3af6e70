//! wgpu compute backend
//!
//! Two state storage buffers of `width * width` texels alternate as the
//! kernel's input and output. Bind group `k` reads buffer `k` and writes the
//! other, so swapping roles is a matter of picking the other bind group.
//! After each pass the freshly written buffer is copied into a staging buffer
//! and mapped asynchronously; [`ComputeBackend::poll_readback`] drives the
//! device with `Maintain::Poll` and never waits.

use std::sync::{Arc, Mutex};

use tracing::{debug, info};

use super::shaders::{RELAX_ENTRY_POINT, relax_shader};
use super::types::{KernelUniforms, STATE_TEXEL_BYTES, WORKGROUP_SIZE};
use crate::config::PhysicsConfig;
use crate::driver::ComputeBackend;
use crate::error::{GraphError, GraphResult};
use crate::graph::{AdjacencyIndex, EdgeRecord};
use crate::physics::{PingPong, StateRecord, width_for_capacity};

type MapStatus = Arc<Mutex<Option<Result<(), wgpu::BufferAsyncError>>>>;

struct InFlightReadback {
    node_count: usize,
    status: MapStatus,
}

/// GPU executor for the force kernel
pub struct GpuBackend {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,

    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,

    state: PingPong<wgpu::Buffer>,
    edge_buffer: wgpu::Buffer,
    start_buffer: wgpu::Buffer,
    uniform_buffer: wgpu::Buffer,
    staging_buffer: wgpu::Buffer,

    /// Index `k` reads state buffer `k`
    bind_groups: [wgpu::BindGroup; 2],

    slot_capacity: usize,
    edge_capacity: usize,
    uniforms: KernelUniforms,
    readback: Option<InFlightReadback>,
}

impl GpuBackend {
    /// Acquire an adapter and device, then build the backend on them
    pub fn new() -> GraphResult<Self> {
        let (device, queue) = pollster::block_on(Self::create_device())?;
        Ok(Self::with_device(Arc::new(device), Arc::new(queue)))
    }

    /// Build the backend on an existing device and queue
    pub fn with_device(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>) -> Self {
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Relax Nodes Shader"),
            source: wgpu::ShaderSource::Wgsl(relax_shader().into()),
        });

        let storage = |binding: u32, read_only: bool| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Relax Nodes Bind Group Layout"),
            entries: &[
                storage(0, true),
                storage(1, false),
                storage(2, true),
                storage(3, true),
                wgpu::BindGroupLayoutEntry {
                    binding: 4,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Relax Nodes Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Relax Nodes Pipeline"),
            layout: Some(&pipeline_layout),
            module: &module,
            entry_point: Some(RELAX_ENTRY_POINT),
            compilation_options: Default::default(),
            cache: None,
        });

        let width = width_for_capacity(0);
        let slot_capacity = width * width;
        let edge_capacity = 1;

        let state = PingPong::new(
            state_buffer(&device, slot_capacity, "State Buffer A"),
            state_buffer(&device, slot_capacity, "State Buffer B"),
        );
        let edge_buffer = edge_buffer(&device, edge_capacity);
        let start_buffer = start_buffer(&device, slot_capacity);
        let staging_buffer = staging_buffer(&device, slot_capacity);

        let uniforms = KernelUniforms::default();
        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Kernel Uniform Buffer"),
            size: std::mem::size_of::<KernelUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        queue.write_buffer(&uniform_buffer, 0, bytemuck::bytes_of(&uniforms));

        let bind_groups = bind_groups(
            &device,
            &bind_group_layout,
            &state,
            &edge_buffer,
            &start_buffer,
            &uniform_buffer,
        );

        Self {
            device,
            queue,
            pipeline,
            bind_group_layout,
            state,
            edge_buffer,
            start_buffer,
            uniform_buffer,
            staging_buffer,
            bind_groups,
            slot_capacity,
            edge_capacity,
            uniforms,
            readback: None,
        }
    }

    async fn create_device() -> GraphResult<(wgpu::Device, wgpu::Queue)> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| GraphError::Backend("no suitable GPU adapter".to_string()))?;

        info!(adapter = %adapter.get_info().name, "GPU adapter selected");

        adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Layout Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: wgpu::MemoryHints::default(),
                },
                None,
            )
            .await
            .map_err(|e| GraphError::Backend(format!("failed to create device: {e}")))
    }

    /// State texels currently allocated per buffer
    pub fn slot_capacity(&self) -> usize {
        self.slot_capacity
    }

    fn rebind(&mut self) {
        self.bind_groups = bind_groups(
            &self.device,
            &self.bind_group_layout,
            &self.state,
            &self.edge_buffer,
            &self.start_buffer,
            &self.uniform_buffer,
        );
    }
}

impl ComputeBackend for GpuBackend {
    fn name(&self) -> &str {
        "gpu"
    }

    fn reserve(&mut self, capacity: usize) -> GraphResult<bool> {
        if capacity <= self.slot_capacity {
            return Ok(false);
        }
        if self.readback.is_some() {
            return Err(GraphError::Backend(
                "cannot reallocate while a readback is in flight".to_string(),
            ));
        }

        let width = width_for_capacity(capacity);
        let slots = width * width;
        debug!(width, slots, "reallocating GPU state buffers");

        self.state = PingPong::new(
            state_buffer(&self.device, slots, "State Buffer A"),
            state_buffer(&self.device, slots, "State Buffer B"),
        );
        self.start_buffer = start_buffer(&self.device, slots);
        self.staging_buffer = staging_buffer(&self.device, slots);
        self.slot_capacity = slots;
        self.rebind();
        Ok(true)
    }

    fn upload_state(&mut self, records: &[StateRecord]) -> GraphResult<()> {
        if records.len() > self.slot_capacity {
            return Err(GraphError::IndexOutOfRange {
                index: records.len(),
                len: self.slot_capacity,
            });
        }
        if records.is_empty() {
            return Ok(());
        }
        let words: Vec<[u32; 4]> = records.iter().map(|r| r.to_words()).collect();
        self.queue
            .write_buffer(self.state.current(), 0, bytemuck::cast_slice(&words));
        Ok(())
    }

    fn upload_adjacency(&mut self, adjacency: &AdjacencyIndex) -> GraphResult<()> {
        let edges = adjacency.edges();
        let starts = adjacency.starts();
        if starts.len() > self.slot_capacity {
            return Err(GraphError::IndexOutOfRange {
                index: starts.len(),
                len: self.slot_capacity,
            });
        }

        if edges.len() > self.edge_capacity {
            self.edge_capacity = edges.len().next_power_of_two();
            self.edge_buffer = edge_buffer(&self.device, self.edge_capacity);
            self.rebind();
        }

        if !edges.is_empty() {
            self.queue
                .write_buffer(&self.edge_buffer, 0, bytemuck::cast_slice(edges));
        }
        if !starts.is_empty() {
            self.queue
                .write_buffer(&self.start_buffer, 0, bytemuck::cast_slice(starts));
        }
        self.uniforms.edge_count = edges.len() as u32;
        Ok(())
    }

    fn set_params(&mut self, config: &PhysicsConfig) {
        let KernelUniforms {
            node_count,
            edge_count,
            ..
        } = self.uniforms;
        self.uniforms = KernelUniforms::new(config, node_count, edge_count);
    }

    fn dispatch(&mut self, node_count: usize) -> GraphResult<()> {
        if self.readback.is_some() {
            return Err(GraphError::Backend(
                "dispatch while a readback is in flight".to_string(),
            ));
        }

        let n = node_count.min(self.slot_capacity);
        self.uniforms.node_count = n as u32;
        self.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&self.uniforms));

        let reading = self.state.current_index();
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Relax Nodes Encoder"),
            });

        if n > 0 {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Relax Nodes Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &self.bind_groups[reading], &[]);
            pass.dispatch_workgroups((n as u32).div_ceil(WORKGROUP_SIZE).max(1), 1, 1);
        }

        // The written buffer becomes current and is what gets read back
        self.state.swap();
        let bytes = n as u64 * STATE_TEXEL_BYTES;
        if bytes > 0 {
            encoder.copy_buffer_to_buffer(self.state.current(), 0, &self.staging_buffer, 0, bytes);
        }
        self.queue.submit(std::iter::once(encoder.finish()));

        let status: MapStatus = Arc::new(Mutex::new(None));
        if bytes > 0 {
            let sink = Arc::clone(&status);
            self.staging_buffer
                .slice(..bytes)
                .map_async(wgpu::MapMode::Read, move |result| {
                    if let Ok(mut slot) = sink.lock() {
                        *slot = Some(result);
                    }
                });
        } else if let Ok(mut slot) = status.lock() {
            *slot = Some(Ok(()));
        }

        self.readback = Some(InFlightReadback {
            node_count: n,
            status,
        });
        Ok(())
    }

    fn poll_readback(&mut self) -> Option<GraphResult<Vec<StateRecord>>> {
        let (node_count, status) = {
            let pending = self.readback.as_ref()?;
            (pending.node_count, Arc::clone(&pending.status))
        };

        let _ = self.device.poll(wgpu::Maintain::Poll);

        let outcome = match status.lock() {
            Ok(mut slot) => slot.take()?,
            Err(_) => Err(wgpu::BufferAsyncError),
        };
        self.readback = None;

        if let Err(e) = outcome {
            return Some(Err(GraphError::Backend(format!("readback failed: {e}"))));
        }
        if node_count == 0 {
            return Some(Ok(Vec::new()));
        }

        let bytes = node_count as u64 * STATE_TEXEL_BYTES;
        let records = {
            let data = self.staging_buffer.slice(..bytes).get_mapped_range();
            bytemuck::cast_slice::<u8, [u32; 4]>(&data)
                .iter()
                .map(|words| StateRecord::from_words(*words))
                .collect()
        };
        self.staging_buffer.unmap();
        Some(Ok(records))
    }
}

fn state_buffer(device: &wgpu::Device, slots: usize, label: &str) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: slots as u64 * STATE_TEXEL_BYTES,
        usage: wgpu::BufferUsages::STORAGE
            | wgpu::BufferUsages::COPY_DST
            | wgpu::BufferUsages::COPY_SRC,
        mapped_at_creation: false,
    })
}

fn edge_buffer(device: &wgpu::Device, capacity: usize) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Edge Buffer"),
        size: (capacity.max(1) * std::mem::size_of::<EdgeRecord>()) as u64,
        usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn start_buffer(device: &wgpu::Device, slots: usize) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Start Buffer"),
        size: (slots.max(1) * std::mem::size_of::<i32>()) as u64,
        usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn staging_buffer(device: &wgpu::Device, slots: usize) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Staging Buffer"),
        size: slots as u64 * STATE_TEXEL_BYTES,
        usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn bind_groups(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    state: &PingPong<wgpu::Buffer>,
    edges: &wgpu::Buffer,
    starts: &wgpu::Buffer,
    uniforms: &wgpu::Buffer,
) -> [wgpu::BindGroup; 2] {
    let [a, b] = state.both();
    let group = |label: &str, input: &wgpu::Buffer, output: &wgpu::Buffer| {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: input.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: output.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: edges.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: starts.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: uniforms.as_entire_binding(),
                },
            ],
        })
    };
    [group("Relax A->B", a, b), group("Relax B->A", b, a)]
}
