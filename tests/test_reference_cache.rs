//! Workspace and pipeline-stage caching.

mod mocks;

use crm_mcp_server::cache::ReferenceCache;
use crm_mcp_server::models::{EntityType, Record, Workspace};
use crm_mcp_server::repositories::RecordRepository;
use mocks::MockRecordRepository;
use std::sync::Arc;

fn stage(id: &str, name: &str, workspace: &str) -> Record {
    let mut record = Record::new(id, name);
    record.workspace_id = Some(workspace.to_string());
    record
}

fn two_workspace_repo() -> MockRecordRepository {
    let repo = MockRecordRepository::new();
    repo.set_workspaces(vec![
        Workspace::new("ws-1", "Personal"),
        Workspace::new("ws-2", "Sales"),
    ]);
    repo.add_records(
        EntityType::PipelineStage,
        vec![
            stage("st-1", "Qualified", "ws-1"),
            stage("st-2", "Won", "ws-1"),
            stage("st-9", "Negotiation", "ws-2"),
        ],
    );
    repo
}

fn cache_for(repo: &MockRecordRepository, preferred: Option<&str>) -> ReferenceCache {
    ReferenceCache::new(
        Arc::new(repo.clone()) as Arc<dyn RecordRepository>,
        preferred.map(str::to_string),
    )
}

#[tokio::test]
async fn test_workspace_resolved_once() {
    let repo = two_workspace_repo();
    let cache = cache_for(&repo, None);

    assert_eq!(cache.ensure_workspace().await.unwrap(), "ws-1");
    assert_eq!(cache.ensure_workspace().await.unwrap(), "ws-1");
    assert_eq!(repo.get_call_count("list_workspaces"), 1);
}

#[tokio::test]
async fn test_preferred_workspace_is_selected() {
    let repo = two_workspace_repo();
    let cache = cache_for(&repo, Some("sales"));
    assert_eq!(cache.ensure_workspace().await.unwrap(), "ws-2");
}

#[tokio::test]
async fn test_no_workspaces_is_an_error() {
    let repo = MockRecordRepository::new();
    repo.set_workspaces(Vec::new());
    let cache = cache_for(&repo, None);
    assert!(cache.ensure_workspace().await.is_err());
}

#[tokio::test]
async fn test_stage_names_loaded_once_per_workspace() {
    let repo = two_workspace_repo();
    let cache = cache_for(&repo, None);

    assert_eq!(cache.resolve_stage_name("st-1").await, "Qualified");
    assert_eq!(cache.resolve_stage_name("st-2").await, "Won");
    assert_eq!(repo.get_call_count("list:pipeline-stages"), 1);
}

#[tokio::test]
async fn test_unknown_stage_returns_id() {
    let repo = two_workspace_repo();
    let cache = cache_for(&repo, None);

    assert_eq!(cache.resolve_stage_name("st-9").await, "st-9");
    assert_eq!(cache.resolve_stage_name("st-404").await, "st-404");
    assert_eq!(repo.get_call_count("list:pipeline-stages"), 1);
}

#[tokio::test]
async fn test_stage_fetch_failure_returns_id_and_retries_later() {
    let repo = two_workspace_repo();
    repo.fail_entity(EntityType::PipelineStage);
    let cache = cache_for(&repo, None);

    assert_eq!(cache.resolve_stage_name("st-1").await, "st-1");

    repo.recover_entity(EntityType::PipelineStage);
    assert_eq!(cache.resolve_stage_name("st-1").await, "Qualified");
    assert_eq!(repo.get_call_count("list:pipeline-stages"), 2);
}

#[tokio::test]
async fn test_switch_workspace_rebuilds_stage_names() {
    let repo = two_workspace_repo();
    let cache = cache_for(&repo, None);

    assert_eq!(cache.resolve_stage_name("st-9").await, "st-9");

    let switched = cache.switch_workspace("Sales").await.unwrap();
    assert_eq!(switched.id, "ws-2");
    assert_eq!(cache.ensure_workspace().await.unwrap(), "ws-2");

    assert_eq!(cache.resolve_stage_name("st-9").await, "Negotiation");
    assert_eq!(cache.resolve_stage_name("st-1").await, "st-1");
    assert_eq!(repo.get_call_count("list:pipeline-stages"), 2);

    let stage_query = repo
        .list_queries_for(EntityType::PipelineStage)
        .pop()
        .unwrap();
    assert_eq!(stage_query.filter["workspaceId"], serde_json::json!("ws-2"));
}

#[tokio::test]
async fn test_switch_to_unknown_workspace_keeps_current() {
    let repo = two_workspace_repo();
    let cache = cache_for(&repo, None);
    cache.ensure_workspace().await.unwrap();

    assert!(cache.switch_workspace("Nowhere").await.is_err());
    assert_eq!(cache.ensure_workspace().await.unwrap(), "ws-1");
}

#[tokio::test]
async fn test_switch_by_id() {
    let repo = two_workspace_repo();
    let cache = cache_for(&repo, None);
    assert_eq!(cache.switch_workspace("ws-2").await.unwrap().name, "Sales");
}
