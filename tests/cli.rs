use std::fs;
use std::process::Command;

use serde_json::Value;

fn wikigraph() -> Command {
    Command::new(env!("CARGO_BIN_EXE_wikigraph"))
}

#[test]
fn layout_prints_json_for_expanded_graph() {
    let dir = tempfile::TempDir::new().unwrap();
    let links = dir.path().join("links.yaml");
    fs::write(&links, "Foo:\n  - Bar\n  - Baz\nBar:\n  - Foo\n  - Baz\n").unwrap();

    let output = wikigraph()
        .args(["layout", "--links", links.to_str().unwrap()])
        .args(["--seed", "Foo", "--ticks", "20"])
        .output()
        .expect("Failed to execute wikigraph");

    assert!(
        output.status.success(),
        "wikigraph exited with error: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let layout: Value = serde_json::from_slice(&output.stdout).expect("stdout is not JSON");
    let nodes = layout["nodes"].as_array().unwrap();
    let connections = layout["connections"].as_array().unwrap();

    // Foo-Bar, Foo-Baz from the seed, Bar-Baz from expanding Bar
    assert_eq!(nodes.len(), 3);
    assert_eq!(connections.len(), 3);
    assert_eq!(nodes[0]["title"], "Foo");
    for node in nodes {
        assert_eq!(node["mass"], 2.0, "every node has two connections");
        assert!(node["x"].as_f64().unwrap().is_finite());
        assert!(node["y"].as_f64().unwrap().is_finite());
    }
}

#[test]
fn layout_honours_settings_file() {
    let dir = tempfile::TempDir::new().unwrap();
    let links = dir.path().join("links.json");
    fs::write(&links, r#"{"Hub": ["Left", "Right"]}"#).unwrap();
    let settings = dir.path().join("settings.yaml");
    fs::write(&settings, "explorer:\n  fan_out_distance: 400.0\n").unwrap();

    let output = wikigraph()
        .args(["layout", "--links", links.to_str().unwrap()])
        .args(["--seed", "Hub", "--ticks", "0"])
        .args(["--config", settings.to_str().unwrap()])
        .output()
        .expect("Failed to execute wikigraph");
    assert!(output.status.success());

    let layout: Value = serde_json::from_slice(&output.stdout).unwrap();
    // No ticks: the first link sits exactly at the fan-out distance, angle 0
    assert_eq!(layout["nodes"][1]["title"], "Left");
    assert_eq!(layout["nodes"][1]["x"], 400.0);
    assert_eq!(layout["nodes"][1]["y"], 0.0);
}

#[test]
fn inspect_prints_adjacency_table() {
    let output = wikigraph()
        .args(["inspect", "--links", "tests/fixtures/links.yaml", "--seed", "Rust"])
        .output()
        .expect("Failed to execute wikigraph");
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("0\tRust\tmass=3"), "Missing seed row:\n{stdout}");
    assert!(stdout.contains("6\tCompiler\tmass=1"), "Missing leaf row:\n{stdout}");
    assert!(stdout.contains("edges:"));
    // Rust's next edge is one slot on, Cargo's is three slots on
    assert!(
        stdout.contains("  0: 0-1 stride_a=1 stride_b=3"),
        "Unexpected first edge:\n{stdout}"
    );
    assert!(stdout.contains("starts:"));
}

#[test]
fn missing_link_map_fails() {
    let output = wikigraph()
        .args(["layout", "--links", "does/not/exist.yaml", "--seed", "X"])
        .output()
        .expect("Failed to execute wikigraph");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("reading link map"));
}

#[cfg(not(feature = "gpu"))]
#[test]
fn gpu_backend_requires_feature() {
    let dir = tempfile::TempDir::new().unwrap();
    let links = dir.path().join("links.yaml");
    fs::write(&links, "A: [B]\n").unwrap();

    let output = wikigraph()
        .args(["layout", "--links", links.to_str().unwrap()])
        .args(["--seed", "A", "--backend", "gpu"])
        .output()
        .expect("Failed to execute wikigraph");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("gpu"));
}
