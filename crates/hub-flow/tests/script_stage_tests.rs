//! End-to-end runs of Rhai stage modules over directory-backed stores.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{init_tracing, write_file};
use hub_flow::plugin::{stage_fn, FsPluginStore, StageContext, StageRegistry};
use hub_flow::store::{DocumentStore, FsStore};
use hub_flow::{
    Document, EngineConfig, FailureKind, FlowCoordinator, FlowError, FlowResolver, FlowType,
    JobFinishedListener, JobState,
};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

const FLOW_DIR: &str = "plugins/entities/customer/harmonize/harmonize-customers";

fn write_project(root: &Path) {
    write_file(
        root,
        &format!("{FLOW_DIR}/flow.toml"),
        r#"
stages = ["content", "headers"]

[source]
collection = "customers"

[options]
source = "crm"
"#,
    );
    write_file(
        root,
        &format!("{FLOW_DIR}/content/content.rhai"),
        r#"
if doc.content.name == () {
    throw "customer has no name";
}
doc.content.name = doc.content.name.to_upper();
"#,
    );
    write_file(
        root,
        &format!("{FLOW_DIR}/headers/headers.rhai"),
        r#"
doc.content.headers = #{ source: ctx.options.source, flow: ctx.flow_name };
"#,
    );
}

async fn seed(staging: &FsStore) {
    for (id, body) in [
        (1, json!({"name": "ada"})),
        (2, json!({"name": "grace"})),
        (3, json!({"id": 3})),
    ] {
        let doc = Document::from_json(format!("/customers/{id}.json"), &body).unwrap();
        staging.write(&doc.uri, &doc).await.unwrap();
    }
    let other = Document::from_json("/orders/1.json", &json!({"name": "not a customer"})).unwrap();
    staging.write(&other.uri, &other).await.unwrap();
}

struct Hub {
    _dir: TempDir,
    project: std::path::PathBuf,
    staging: Arc<FsStore>,
    final_store: Arc<FsStore>,
}

async fn hub() -> Hub {
    let dir = TempDir::new().unwrap();
    let project = dir.path().join("project");
    write_project(&project);

    let staging = Arc::new(FsStore::new(dir.path().join("staging")));
    let final_store = Arc::new(FsStore::new(dir.path().join("final")));
    seed(&staging).await;

    Hub {
        _dir: dir,
        project,
        staging,
        final_store,
    }
}

impl Hub {
    fn coordinator(&self) -> FlowCoordinator {
        FlowCoordinator::new(
            self.staging.clone(),
            self.final_store.clone(),
            Arc::new(FsPluginStore::new(&self.project)),
            EngineConfig::default(),
        )
    }
}

#[tokio::test]
async fn test_rhai_stages_harmonize_json() {
    init_tracing();
    let hub = hub().await;
    let flow = FlowResolver::new(&hub.project)
        .get_flow("customer", "harmonize-customers", FlowType::Harmonize)
        .unwrap();

    let waiter = Arc::new(JobFinishedListener::new());
    hub.coordinator().run_flow(flow, 2, 2, waiter.clone()).unwrap();
    let status = waiter.wait_for_finish(None).await.unwrap();

    assert_eq!(status.state, JobState::Completed);
    assert_eq!(status.succeeded, 2);
    assert_eq!(status.failed, 1);

    let failure = &status.errors_by_uri["/customers/3.json"];
    assert_eq!(failure.kind, FailureKind::Stage);
    assert_eq!(failure.stage.as_deref(), Some("content"));
    assert!(failure.message.contains("customer has no name"));

    let ada = hub.final_store.read("/customers/1.json").await.unwrap().as_json().unwrap();
    assert_eq!(ada["name"], "ADA");
    assert_eq!(ada["headers"]["source"], "crm");
    assert_eq!(ada["headers"]["flow"], "harmonize-customers");

    assert!(hub.final_store.read("/orders/1.json").await.is_err());
}

#[tokio::test]
async fn test_rerun_is_idempotent() {
    init_tracing();
    let hub = hub().await;
    let resolver = FlowResolver::new(&hub.project);

    for _ in 0..2 {
        let flow = resolver
            .get_flow("customer", "harmonize-customers", FlowType::Harmonize)
            .unwrap();
        hub.coordinator()
            .run_flow(flow, 10, 3, Arc::new(JobFinishedListener::new()))
            .unwrap()
            .wait()
            .await
            .unwrap();
    }

    assert_eq!(hub.final_store.skipped_writes(), 2);
    let grace = hub.final_store.read("/customers/2.json").await.unwrap().as_json().unwrap();
    assert_eq!(grace["name"], "GRACE");
}

#[tokio::test]
async fn test_unbound_xquery_stage_rejected_at_submission() {
    let hub = hub().await;
    write_file(&hub.project, &format!("{FLOW_DIR}/headers/headers.xqy"), "()");
    std::fs::remove_file(hub.project.join(format!("{FLOW_DIR}/headers/headers.rhai"))).unwrap();

    let flow = FlowResolver::new(&hub.project)
        .get_flow("customer", "harmonize-customers", FlowType::Harmonize)
        .unwrap();
    let listener = Arc::new(JobFinishedListener::new());
    let result = hub.coordinator().run_flow(flow, 10, 1, listener.clone());

    assert!(matches!(result, Err(FlowError::Configuration(_))));
    assert!(listener.job_id().is_none());
}

#[tokio::test]
async fn test_registered_binding_runs_xquery_stage() {
    let hub = hub().await;
    write_file(&hub.project, &format!("{FLOW_DIR}/headers/headers.xqy"), "()");
    std::fs::remove_file(hub.project.join(format!("{FLOW_DIR}/headers/headers.rhai"))).unwrap();

    let registry = Arc::new(StageRegistry::new());
    registry.register(
        "customer",
        "harmonize-customers",
        "headers",
        stage_fn(|mut doc: Document, _ctx: &StageContext| {
            let mut value = doc.as_json()?;
            value["headers"] = json!({"bound": true});
            doc.content = serde_json::to_vec(&value).map_err(|e| hub_flow::StageError::failed(e.to_string()))?;
            Ok(doc)
        }),
    );
    let coordinator = FlowCoordinator::new(
        hub.staging.clone(),
        hub.final_store.clone(),
        Arc::new(FsPluginStore::new(&hub.project).with_registry(registry)),
        EngineConfig::default(),
    );

    let flow = FlowResolver::new(&hub.project)
        .get_flow("customer", "harmonize-customers", FlowType::Harmonize)
        .unwrap();
    let status = coordinator
        .run_flow(flow, 10, 2, Arc::new(JobFinishedListener::new()))
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert_eq!(status.succeeded, 2);
    let ada = hub.final_store.read("/customers/1.json").await.unwrap().as_json().unwrap();
    assert_eq!(ada["headers"]["bound"], true);
}

#[tokio::test]
async fn test_input_script_mints_uris() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let project = dir.path().join("project");
    write_file(
        &project,
        "plugins/entities/customer/input/load-customers/content/content.rhai",
        r#"doc.uri = "/customer" + doc.uri; doc.content.trim();"#,
    );
    write_file(
        &project,
        "plugins/entities/customer/input/load-customers/flow.toml",
        "data_format = \"text\"\nstages = [\"content\"]\n",
    );

    let input = Arc::new(FsStore::new(dir.path().join("input")));
    for name in ["a.txt", "b.txt"] {
        let doc = Document::new(format!("/{name}"), format!("  {name}  "), hub_flow::DataFormat::Text);
        input.write(&doc.uri, &doc).await.unwrap();
    }
    let staging = Arc::new(FsStore::new(dir.path().join("staging")));

    let flow = FlowResolver::new(&project)
        .get_flow("customer", "load-customers", FlowType::Input)
        .unwrap();
    let status = FlowCoordinator::new(
        input,
        staging.clone(),
        Arc::new(FsPluginStore::new(&project)),
        EngineConfig::default(),
    )
    .run_flow(flow, 10, 2, Arc::new(JobFinishedListener::new()))
    .unwrap()
    .wait()
    .await
    .unwrap();

    assert_eq!(status.succeeded, 2);
    let a = staging.read("/customer/a.txt").await.unwrap();
    assert_eq!(a.as_text().unwrap(), "a.txt");
    assert_eq!(a.collections, vec!["customer"]);
}
