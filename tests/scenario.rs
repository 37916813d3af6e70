use std::f32::consts::PI;

use wikigraph::{
    CpuBackend, DriverPhase, Explorer, GraphError, GraphResult, LinkFetcher, SimulationDriver,
};

/// Fixed link lists keyed by title
struct Stub;

impl LinkFetcher for Stub {
    async fn fetch_links(&self, title: &str) -> GraphResult<Vec<String>> {
        let links: &[&str] = match title {
            "Origin" => &["Foo", "Bar"],
            "Foo" => &["Origin", "Baz", "Qux"],
            _ => return Err(GraphError::Fetch(format!("no stub for '{title}'"))),
        };
        Ok(links.iter().map(|l| l.to_string()).collect())
    }
}

#[tokio::test]
async fn expanding_one_node_with_two_links() {
    let mut explorer = Explorer::default();
    let origin = explorer.add_root("Origin", [0.0, 0.0]);
    assert_eq!(explorer.store().node(origin).unwrap().mass, 0.0);

    explorer.expand(origin, &Stub).await.unwrap();
    let store = explorer.store();

    assert_eq!(store.node_count(), 3);
    assert_eq!(store.connection_count(), 2);
    assert_eq!(store.node(origin).unwrap().mass, 2.0);

    let foo = store.find_node_from_title("Foo").expect("Foo was added");
    let bar = store.find_node_from_title("Bar").expect("Bar was added");
    assert_eq!(store.node(foo).unwrap().mass, 1.0);
    assert_eq!(store.node(bar).unwrap().mass, 1.0);

    let distance = explorer.config().fan_out_distance;
    assert_eq!(store.node(foo).unwrap().position, [distance, 0.0]);
    let [bx, by] = store.node(bar).unwrap().position;
    assert!((bx - distance * PI.cos()).abs() < 1e-3);
    assert!(by.abs() < 1e-3);
}

#[tokio::test]
async fn simulation_spreads_an_expanded_graph() {
    let mut explorer = Explorer::default();
    let origin = explorer.add_root("Origin", [0.0, 0.0]);
    explorer.expand(origin, &Stub).await.unwrap();

    let before: Vec<[f32; 2]> = explorer.store().nodes().iter().map(|n| n.position).collect();

    let mut driver = SimulationDriver::new(CpuBackend::new());
    for _ in 0..50 {
        driver.tick(explorer.store_mut(), &mut ()).unwrap();
    }
    driver.finish(explorer.store_mut(), &mut ()).unwrap();
    assert_eq!(driver.phase(), DriverPhase::Idle);

    let store = explorer.store();
    let moved = store
        .nodes()
        .iter()
        .zip(&before)
        .any(|(node, start)| node.position != *start);
    assert!(moved, "no node moved after 50 passes");

    // Structure is never touched by the kernel
    assert_eq!(store.node_count(), 3);
    assert_eq!(store.connection_count(), 2);
    assert_eq!(store.node(origin).unwrap().mass, 2.0);
    for node in store.nodes() {
        assert!(node.position.iter().all(|c| c.is_finite()));
    }
}

#[tokio::test]
async fn expansion_during_readback_is_clamped_then_caught_up() {
    let mut explorer = Explorer::default();
    let origin = explorer.add_root("Origin", [0.0, 0.0]);
    explorer.expand(origin, &Stub).await.unwrap();

    let mut driver = SimulationDriver::new(CpuBackend::new().with_readback_latency(2));
    let first = driver.tick(explorer.store_mut(), &mut ()).unwrap();
    assert!(first.launched);
    assert_eq!(driver.kernel_node_count(), 3);

    // Grow the graph while that pass is still being read back
    let foo = explorer.store().find_node_from_title("Foo").unwrap();
    let report = explorer.expand(foo, &Stub).await.unwrap();
    assert_eq!(report.added_nodes.len(), 2);
    let newcomers: Vec<[f32; 2]> = report
        .added_nodes
        .iter()
        .map(|&i| explorer.store().node(i).unwrap().position)
        .collect();
    let foo_before = explorer.store().node(foo).unwrap().position;

    let applied = loop {
        let tick = driver.tick(explorer.store_mut(), &mut ()).unwrap();
        if let Some(applied) = tick.applied {
            break applied;
        }
    };

    // Origin and Bar take kernel results; Foo was reheated by its expansion
    // after the pass was issued, so it keeps its host state
    assert_eq!(applied, 2);
    assert_eq!(driver.stats().diverged_readbacks, 1);
    assert_eq!(explorer.store().node(foo).unwrap().position, foo_before);
    for (&index, start) in report.added_nodes.iter().zip(&newcomers) {
        assert_eq!(explorer.store().node(index).unwrap().position, *start);
    }

    // The pass launched alongside that readback covers every node
    assert_eq!(driver.kernel_node_count(), 5);
    driver.finish(explorer.store_mut(), &mut ()).unwrap();
    assert_eq!(driver.stats().diverged_readbacks, 1);
}

#[tokio::test]
async fn second_expansion_is_rejected_while_one_is_open() {
    let mut explorer = Explorer::default();
    let origin = explorer.add_root("Origin", [0.0, 0.0]);

    let ticket = explorer.begin_expansion(origin).unwrap();
    assert!(explorer.is_busy());
    assert!(matches!(
        explorer.expand(origin, &Stub).await,
        Err(GraphError::ExpansionInFlight { .. })
    ));

    explorer.finish_expansion(ticket, vec!["Foo".into()]).unwrap();
    assert!(!explorer.is_busy());
    assert_eq!(explorer.store().node_count(), 2);
}
