//! End-to-end deploy against a file-backed state store.

use std::sync::Arc;

use forge_core::StackConfig;
use forge_engine::{ChangeKind, Engine, EngineOptions, LocalProvisioner, Plan};
use forge_graph::{GraphBuilder, ResourceGraph};
use forge_state::{ResourceStatus, StateStore};

fn engine(path: &std::path::Path) -> Engine {
    Engine::new(
        StateStore::open(path).unwrap(),
        Arc::new(LocalProvisioner::new("eu-west-1", "000000000000")),
        EngineOptions::default(),
    )
}

fn chat_graph(config: &StackConfig) -> ResourceGraph {
    GraphBuilder::from_stack(config).unwrap()
}

#[tokio::test]
async fn deploy_survives_reopen_and_converges() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.redb");
    let config = StackConfig::scaffold("chat", "eu-west-1");
    let graph = chat_graph(&config);

    {
        let engine = engine(&path);
        let plan = Plan::compute(&graph, &[]).unwrap();
        let report = engine.apply(&graph, &plan).await.unwrap();
        assert!(report.is_success(), "{report}");
        assert!(report.outputs["endpoint"].ends_with(".eu-west-1.lb.forge.local"));
    }

    // Reopened store: nothing left to do.
    let engine = engine(&path);
    let live = engine.store().list_resources("chat").unwrap();
    assert_eq!(live.len(), graph.len());
    let plan = Plan::compute(&graph, &live).unwrap();
    assert!(plan.is_empty(), "{plan}");

    // The webui container environment carries the live database url.
    let task = engine
        .store()
        .get_resource("chat", "task-definition", "webui")
        .unwrap()
        .unwrap();
    assert_eq!(task.status, ResourceStatus::Ready);
    assert!(task.depends_on.iter().any(|d| d == "database/chat-db"));

    // A smaller stack: load balancer gone, everything it fed deleted.
    let mut smaller = config.clone();
    smaller.load_balancers.clear();
    smaller.outputs.remove("endpoint");
    smaller.boundaries.retain(|b| b.name != "lb");
    for boundary in &mut smaller.boundaries {
        boundary.ingress.retain(|rule| rule.peer != "lb");
    }
    let smaller_graph = chat_graph(&smaller);
    let live = engine.store().list_resources("chat").unwrap();
    let plan = Plan::compute(&smaller_graph, &live).unwrap();
    assert!(plan.count(ChangeKind::Delete) >= 4);
    let report = engine.apply(&smaller_graph, &plan).await.unwrap();
    assert!(report.is_success(), "{report}");
    assert!(engine
        .store()
        .get_resource("chat", "load-balancer", "web")
        .unwrap()
        .is_none());
    let outputs = engine.store().list_outputs("chat").unwrap();
    assert_eq!(outputs.len(), 1);
    assert_eq!(outputs[0].name, "admin-secret");

    let destroyed = engine.destroy("chat").await.unwrap();
    assert!(destroyed.is_success(), "{destroyed}");
    assert!(engine.store().list_resources("chat").unwrap().is_empty());
}
