//! WGSL compute shader for the GPU force kernel
//!
//! One invocation per live node. State texels are `vec4<u32>` holding the
//! bit patterns of `(x, y, mass, temperature)`, so values reach the kernel
//! exactly as the host wrote them.

/// Type definitions and bindings
pub const TYPES: &str = r#"
struct Edge {
    a: u32,
    b: u32,
    stride_a: i32,
    stride_b: i32,
}

struct Params {
    node_count: u32,
    edge_count: u32,
    base_radius: f32,
    mass_to_radius: f32,
    repulsion: f32,
    spring: f32,
    spring_rest_distance: f32,
    node_min_dist: f32,
    temp_fall_point: f32,
    temp_change_rate: f32,
    force_cap: f32,
    epsilon: f32,
}

@group(0) @binding(0) var<storage, read> state_in: array<vec4<u32>>;
@group(0) @binding(1) var<storage, read_write> state_out: array<vec4<u32>>;
@group(0) @binding(2) var<storage, read> edges: array<Edge>;
@group(0) @binding(3) var<storage, read> starts: array<i32>;
@group(0) @binding(4) var<uniform> params: Params;

fn load_state(k: u32) -> vec4<f32> {
    return bitcast<vec4<f32>>(state_in[k]);
}

// Must match PhysicsConfig::radius
fn radius(mass: f32) -> f32 {
    return params.base_radius + mass * params.mass_to_radius;
}

fn effective_distance(d: f32, mass_a: f32, mass_b: f32) -> f32 {
    return max(d - (radius(mass_a) + radius(mass_b)), params.node_min_dist);
}
"#;

/// Relax kernel: repulsion, springs, thermostat, capped integration
pub const RELAX_NODES: &str = r#"
@compute @workgroup_size(64)
fn relax_nodes(@builtin(global_invocation_id) global_id: vec3<u32>) {
    let i = global_id.x;
    if (i >= params.node_count) {
        return;
    }

    let node = load_state(i);

    // Massless nodes are frozen
    if (node.z < params.epsilon) {
        state_out[i] = state_in[i];
        return;
    }

    var force = vec2<f32>(0.0, 0.0);

    for (var j = 0u; j < params.node_count; j++) {
        if (j == i) {
            continue;
        }
        let other = load_state(j);
        let delta = other.xy - node.xy;
        let d = length(delta);
        if (d < params.epsilon) {
            continue;
        }
        let eff = effective_distance(d, node.z, other.z);
        let f = params.repulsion * node.z * other.z / (eff * eff);
        force -= delta / d * f;
    }

    // Walk this node's stride chain
    var e = starts[i];
    loop {
        if (e < 0) {
            break;
        }
        let incident = edges[u32(e)];
        var neighbour = incident.a;
        var stride = incident.stride_b;
        if (incident.a == i) {
            neighbour = incident.b;
            stride = incident.stride_a;
        }

        let other = load_state(neighbour);
        let delta = other.xy - node.xy;
        let d = length(delta);
        if (d >= params.epsilon) {
            let eff = effective_distance(d, node.z, other.z);
            let f = log(eff / params.spring_rest_distance) * params.spring;
            force += delta / d * f;
        }

        if (stride <= 0) {
            break;
        }
        e += stride;
    }

    var temperature = node.w;
    if (length(force) < params.temp_fall_point) {
        temperature -= params.temp_change_rate;
    } else {
        temperature += params.temp_change_rate;
    }
    temperature = clamp(temperature, 0.0, 1.0);

    var velocity = force * temperature / node.z;
    let speed = length(velocity);
    if (speed > params.force_cap) {
        velocity = velocity / speed * params.force_cap;
    }

    let updated = vec4<f32>(node.xy + velocity, node.z, temperature);
    state_out[i] = bitcast<vec4<u32>>(updated);
}
"#;

/// Entry point name of the relax kernel
pub const RELAX_ENTRY_POINT: &str = "relax_nodes";

/// Complete shader source for pipeline creation
pub fn relax_shader() -> String {
    format!("{}\n{}", TYPES, RELAX_NODES)
}
