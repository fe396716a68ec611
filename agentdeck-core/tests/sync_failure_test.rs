mod common;

use std::time::Duration;

use common::{
    attach_without_sync, fail_instance_inserts, ids, project_instances, setup_context, template,
};

#[tokio::test]
async fn test_category_sync_stops_at_failing_project_and_keeps_earlier_ones() {
    let ctx = setup_context().await;
    let landing = ctx.categories().create_category("Landing", false).await.unwrap();
    let first = ctx.create_project("user-1", &landing.id, "First").await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    let second = ctx.create_project("user-2", &landing.id, "Second").await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    let third = ctx.create_project("user-3", &landing.id, "Third").await.unwrap();

    let writer = ctx.create_template(template("Writer"), &[]).await.unwrap();
    attach_without_sync(&ctx, &writer.id, &landing.id).await;
    fail_instance_inserts(&ctx, &second.id).await;

    let err = ctx.sync_category(&landing.id).await.unwrap_err();

    let failed_project = err
        .fields()
        .and_then(|fields| fields.get("project_id"))
        .cloned();
    assert_eq!(failed_project, Some(second.id.clone()));
    assert_eq!(project_instances(&ctx, &first.id).await.len(), 1);
    assert!(project_instances(&ctx, &second.id).await.is_empty());
    assert!(project_instances(&ctx, &third.id).await.is_empty());
}

#[tokio::test]
async fn test_listing_returns_stored_instances_when_self_heal_fails() {
    let ctx = setup_context().await;
    let landing = ctx.categories().create_category("Landing", false).await.unwrap();
    ctx.create_template(template("Writer"), &ids(&[&landing.id]))
        .await
        .unwrap();
    let project = ctx.create_project("user-1", &landing.id, "Site").await.unwrap();

    let editor = ctx.create_template(template("Editor"), &[]).await.unwrap();
    attach_without_sync(&ctx, &editor.id, &landing.id).await;
    fail_instance_inserts(&ctx, &project.id).await;
    assert!(ctx.sync_project(&project.id).await.is_err());

    let listed = ctx.list_project_instances("user-1", &project.id).await.unwrap();

    let names: Vec<&str> = listed.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names, vec!["Writer"]);
}

#[tokio::test]
async fn test_materializer_returns_none_on_store_failure() {
    let ctx = setup_context().await;
    let landing = ctx.categories().create_category("Landing", false).await.unwrap();
    let project = ctx.create_project("user-1", &landing.id, "Site").await.unwrap();
    let writer = ctx.create_template(template("Writer"), &[]).await.unwrap();
    attach_without_sync(&ctx, &writer.id, &landing.id).await;
    fail_instance_inserts(&ctx, &project.id).await;

    let instance = ctx
        .get_or_create_instance(&writer.id, "user-1", Some(&project.id))
        .await;

    assert!(instance.is_none());
    assert!(project_instances(&ctx, &project.id).await.is_empty());
}
