//! Record and activity tools end to end over the in-memory repository.

mod mocks;

use crm_mcp_server::cache::ReferenceCache;
use crm_mcp_server::models::{EntityType, Record, SortDirection};
use crm_mcp_server::query::FetchStrategy;
use crm_mcp_server::repositories::RecordRepository;
use crm_mcp_server::tools::{
    ActivityTools, ActivityWindowParams, RecordQueryParams, RecordTools, WorkspaceTools,
};
use mocks::MockRecordRepository;
use serde_json::{json, Map};
use std::sync::Arc;

struct Fixture {
    repo: MockRecordRepository,
    records: Arc<RecordTools>,
    activity: ActivityTools,
    workspace: WorkspaceTools,
}

fn fixture() -> Fixture {
    let repo = MockRecordRepository::new();
    repo.add_records(
        EntityType::Company,
        vec![Record::new("co-1", "Acme").with_field("location", json!("Berlin"))],
    );
    repo.add_records(
        EntityType::PipelineStage,
        vec![Record::new("st-1", "Qualified"), Record::new("st-2", "Won")],
    );
    repo.add_records(
        EntityType::Contact,
        vec![Record::new("ct-1", "Ada"), Record::new("ct-2", "Grace")],
    );
    repo.add_records(
        EntityType::Deal,
        vec![
            Record::new("d-1", "Renewal")
                .with_field("companyId", json!("co-1"))
                .with_field("stageId", json!("st-2"))
                .with_field("amount", json!(1200)),
            Record::new("d-2", "Pilot")
                .with_field("companyId", json!("co-9"))
                .with_field("stageId", json!("st-404"))
                .with_field("amount", json!(300)),
        ],
    );
    repo.add_records(
        EntityType::Meeting,
        vec![
            Record::new("m-a", "Weekly Sync")
                .with_field("startTime", json!("2026-02-05T14:00:00.000Z"))
                .with_field("contactIds", json!(["ct-1"]))
                .with_field("companyIds", json!(["co-1"])),
            Record::new("m-b", "Weekly Sync")
                .with_field("startTime", json!("2026-02-05T14:00:29.000Z"))
                .with_field("contactIds", json!(["ct-2"]))
                .with_field("companyIds", json!(["co-1"])),
            Record::new("m-c", "Kickoff")
                .with_field("startTime", json!("2026-02-06T09:00:00.000Z"))
                .with_field("contactIds", json!(["ct-1"]))
                .with_field("companyIds", json!([])),
        ],
    );

    let shared = Arc::new(repo.clone()) as Arc<dyn RecordRepository>;
    let cache = Arc::new(ReferenceCache::new(shared.clone(), None));
    let records = Arc::new(RecordTools::new(shared.clone(), cache.clone()));
    let activity = ActivityTools::new(shared.clone(), cache.clone(), records.clone(), 200);
    let workspace = WorkspaceTools::new(shared, cache);

    Fixture {
        repo,
        records,
        activity,
        workspace,
    }
}

#[tokio::test]
async fn test_deal_query_gets_company_info_and_stage_names() {
    let f = fixture();
    let mut params = RecordQueryParams::new(EntityType::Deal, 50);
    params.order_by = vec![("amount".to_string(), SortDirection::Desc)];

    let response = f.records.query_records(params).await.unwrap();

    assert_eq!(response.count, 2);
    let renewal = &response.records[0];
    assert_eq!(renewal.id, "d-1");
    assert_eq!(renewal.str_field("stageName"), Some("Won"));
    assert_eq!(
        renewal.field("companyInfo"),
        Some(&json!({"name": "Acme", "location": "Berlin"}))
    );

    let pilot = &response.records[1];
    assert_eq!(pilot.str_field("stageName"), Some("st-404"));
    assert_eq!(pilot.field("companyInfo"), Some(&json!({"name": "unknown"})));

    assert_eq!(f.repo.get_call_count("list:pipeline-stages"), 1);
}

#[tokio::test]
async fn test_query_is_scoped_to_workspace_and_normalized() {
    let f = fixture();
    let mut params = RecordQueryParams::new(EntityType::Meeting, 50);
    params.filter = json!({"startTime": {"$gte": "2026-02-01", "$lt": "2026-02-10"}})
        .as_object()
        .cloned()
        .unwrap();

    f.records.query_records(params).await.unwrap();

    let query = &f.repo.list_queries_for(EntityType::Meeting)[0];
    assert_eq!(query.filter["workspaceId"], json!("ws-1"));
    assert_eq!(
        query.filter["startTime"],
        json!({"$between": ["2026-02-01", "2026-02-10"]})
    );
}

#[tokio::test]
async fn test_meetings_are_deduplicated() {
    let f = fixture();
    let response = f
        .records
        .query_records(RecordQueryParams::new(EntityType::Meeting, 50))
        .await
        .unwrap();

    assert_eq!(response.count, 2);
    assert_eq!(response.duplicates_removed, 1);
    assert_eq!(response.records[0].id_list("contactIds"), vec!["ct-1", "ct-2"]);
}

#[tokio::test]
async fn test_dedup_can_be_disabled() {
    let f = fixture();
    let mut params = RecordQueryParams::new(EntityType::Meeting, 50);
    params.deduplicate = false;

    let response = f.records.query_records(params).await.unwrap();
    assert_eq!(response.count, 3);
    assert_eq!(response.duplicates_removed, 0);
}

#[tokio::test]
async fn test_filtered_include_uses_fallback_and_reports_failures() {
    let f = fixture();
    f.repo.fail_entity(EntityType::Contact);

    let mut params = RecordQueryParams::new(EntityType::Meeting, 50);
    params.filter = json!({"name": "Weekly Sync"}).as_object().cloned().unwrap();
    params.include = vec!["contacts".to_string(), "companies".to_string()];

    let response = f.records.query_records(params).await.unwrap();

    assert_eq!(response.strategy, Some(FetchStrategy::Fallback));
    assert_eq!(response.failed_relations, vec!["contacts".to_string()]);
    assert_eq!(response.count, 1);
    let companies = response.records[0].field("companies").unwrap();
    assert_eq!(companies[0]["name"], json!("Acme"));
}

fn contact_names(record: &Record) -> Vec<&str> {
    record
        .field("contacts")
        .and_then(|v| v.as_array())
        .map(|contacts| contacts.iter().filter_map(|c| c["name"].as_str()).collect())
        .unwrap_or_default()
}

#[tokio::test]
async fn test_fallback_relations_cover_merged_duplicates() {
    let f = fixture();
    let mut params = RecordQueryParams::new(EntityType::Meeting, 50);
    params.order_by = vec![("startTime".to_string(), SortDirection::Asc)];
    params.include = vec!["contacts".to_string()];

    let response = f.records.query_records(params).await.unwrap();

    assert_eq!(response.strategy, Some(FetchStrategy::Fallback));
    assert_eq!(response.duplicates_removed, 1);
    let sync = &response.records[0];
    assert_eq!(sync.name.as_deref(), Some("Weekly Sync"));
    assert_eq!(sync.id_list("contactIds"), vec!["ct-1", "ct-2"]);
    assert_eq!(contact_names(sync), vec!["Ada", "Grace"]);

    // One lookup for the merged keys, not one per raw record.
    let lookups = f.repo.list_queries_for(EntityType::Contact);
    assert_eq!(lookups.len(), 1);
    assert_eq!(lookups[0].filter["id"], json!({"$in": ["ct-1", "ct-2"]}));
}

#[tokio::test]
async fn test_inline_relations_cover_merged_duplicates() {
    let f = fixture();
    let mut params = RecordQueryParams::new(EntityType::Meeting, 50);
    params.include = vec!["contacts".to_string()];

    let response = f.records.query_records(params).await.unwrap();

    assert_eq!(response.strategy, Some(FetchStrategy::Inline));
    assert_eq!(response.duplicates_removed, 1);
    let sync = &response.records[0];
    assert_eq!(sync.id_list("contactIds"), vec!["ct-1", "ct-2"]);
    assert_eq!(contact_names(sync), vec!["Ada", "Grace"]);
    assert_eq!(f.repo.get_call_count("list:contacts"), 0);
}

#[tokio::test]
async fn test_find_activity_uses_window_and_company() {
    let f = fixture();
    let response = f
        .activity
        .find_activity(ActivityWindowParams {
            entity: EntityType::Meeting,
            since: "2026-02-05T00:00:00.000Z".to_string(),
            until: "2026-02-06T00:00:00.000Z".to_string(),
            company_id: Some("co-1".to_string()),
            contact_id: None,
            include: Vec::new(),
        })
        .await
        .unwrap();

    assert_eq!(response.count, 1);
    assert_eq!(response.duplicates_removed, 1);

    let query = &f.repo.list_queries_for(EntityType::Meeting)[0];
    assert_eq!(query.filter["companyIds"], json!({"$contains": "co-1"}));
    assert_eq!(query.order_by[0].0, "startTime");
}

#[tokio::test]
async fn test_find_activity_rejects_non_activity_types() {
    let f = fixture();
    let result = f
        .activity
        .find_activity(ActivityWindowParams {
            entity: EntityType::Deal,
            since: "2026-02-05".to_string(),
            until: "2026-02-06".to_string(),
            company_id: None,
            contact_id: None,
            include: Vec::new(),
        })
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_deal_activity_decorates_correlated_deals() {
    let f = fixture();
    let response = f
        .activity
        .deal_activity("2026-02-01T00:00:00.000Z", "2026-02-10T00:00:00.000Z")
        .await
        .unwrap();

    assert_eq!(response.deals.len(), 1);
    let deal = &response.deals[0];
    assert_eq!(deal.id, "d-1");
    assert_eq!(deal.str_field("stageName"), Some("Won"));
    assert_eq!(deal.field("activity").unwrap()["meetings"], json!(2));
    assert_eq!(response.streams.len(), 4);
}

#[tokio::test]
async fn test_get_record_with_relation() {
    let f = fixture();
    let deal = f
        .records
        .get_record(EntityType::Deal, "d-1", &["company".to_string()])
        .await
        .unwrap();

    assert_eq!(deal.relation_name("company"), Some("Acme"));
    assert_eq!(deal.str_field("stageName"), Some("Won"));
}

#[tokio::test]
async fn test_get_missing_record_is_not_found() {
    let f = fixture();
    let result = f.records.get_record(EntityType::Deal, "d-404", &[]).await;
    assert!(matches!(
        result,
        Err(crm_mcp_server::CrmApiError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_create_update_delete_pass_through() {
    let f = fixture();

    let mut fields = Map::new();
    fields.insert("name".to_string(), json!("Follow-up"));
    let created = f
        .records
        .create_record(EntityType::Task, fields)
        .await
        .unwrap();
    assert_eq!(created.workspace_id.as_deref(), Some("ws-1"));

    let mut changes = Map::new();
    changes.insert("dueDate".to_string(), json!("2026-03-01"));
    let updated = f
        .records
        .update_record(EntityType::Task, &created.id, changes)
        .await
        .unwrap();
    assert_eq!(updated.str_field("dueDate"), Some("2026-03-01"));
    assert_eq!(updated.name.as_deref(), Some("Follow-up"));

    f.records
        .delete_record(EntityType::Task, &created.id, true)
        .await
        .unwrap();
    assert_eq!(f.repo.get_call_count("delete"), 1);
    assert!(f
        .records
        .get_record(EntityType::Task, &created.id, &[])
        .await
        .is_err());
}

#[tokio::test]
async fn test_workspace_tools() {
    let f = fixture();
    let overview = f.workspace.current_workspace().await.unwrap();
    assert_eq!(overview.current.id, "ws-1");
    assert_eq!(overview.available.len(), 1);

    assert!(f.workspace.switch_workspace("Elsewhere").await.is_err());
    assert_eq!(f.workspace.switch_workspace("sales").await.unwrap().id, "ws-1");
}
