mod common;

use agentdeck_core::database::entities::template_categories;
use common::{attachment_order, ids, setup_context, template};
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};

#[tokio::test]
async fn test_reattach_preserves_existing_order() {
    let ctx = setup_context().await;
    let category = ctx.categories().create_category("Landing", false).await.unwrap();
    let first = ctx
        .create_template(template("Researcher"), &ids(&[&category.id]))
        .await
        .unwrap();
    let second = ctx
        .create_template(template("Writer"), &ids(&[&category.id]))
        .await
        .unwrap();

    assert_eq!(attachment_order(&ctx, &first.id, &category.id).await, Some(0));
    assert_eq!(attachment_order(&ctx, &second.id, &category.id).await, Some(1));

    ctx.attach_template(&second.id, &ids(&[&category.id]))
        .await
        .unwrap();

    assert_eq!(attachment_order(&ctx, &second.id, &category.id).await, Some(1));
    assert_eq!(attachment_order(&ctx, &first.id, &category.id).await, Some(0));
}

#[tokio::test]
async fn test_new_attachment_appends_after_highest_order() {
    let ctx = setup_context().await;
    let category = ctx.categories().create_category("Landing", false).await.unwrap();
    for name in ["A", "B", "C", "D"] {
        ctx.create_template(template(name), &ids(&[&category.id]))
            .await
            .unwrap();
    }

    let late = ctx.create_template(template("Late"), &[]).await.unwrap();
    assert_eq!(attachment_order(&ctx, &late.id, &category.id).await, None);

    ctx.attach_template(&late.id, &ids(&[&category.id]))
        .await
        .unwrap();
    assert_eq!(attachment_order(&ctx, &late.id, &category.id).await, Some(4));
}

#[tokio::test]
async fn test_attach_is_full_replace() {
    let ctx = setup_context().await;
    let landing = ctx.categories().create_category("Landing", false).await.unwrap();
    let blog = ctx.categories().create_category("Blog", false).await.unwrap();
    let shop = ctx.categories().create_category("Shop", false).await.unwrap();

    ctx.create_template(template("Filler"), &ids(&[&shop.id]))
        .await
        .unwrap();
    let writer = ctx
        .create_template(template("Writer"), &ids(&[&landing.id, &blog.id]))
        .await
        .unwrap();

    ctx.attach_template(&writer.id, &ids(&[&blog.id, &shop.id, &shop.id]))
        .await
        .unwrap();

    assert_eq!(attachment_order(&ctx, &writer.id, &landing.id).await, None);
    assert_eq!(attachment_order(&ctx, &writer.id, &blog.id).await, Some(0));
    assert_eq!(attachment_order(&ctx, &writer.id, &shop.id).await, Some(1));

    let rows = template_categories::Entity::find()
        .filter(template_categories::Column::TemplateId.eq(writer.id.as_str()))
        .count(ctx.db())
        .await
        .unwrap();
    assert_eq!(rows, 2);
}

#[tokio::test]
async fn test_unknown_category_and_template_are_skipped() {
    let ctx = setup_context().await;
    let landing = ctx.categories().create_category("Landing", false).await.unwrap();
    let writer = ctx.create_template(template("Writer"), &[]).await.unwrap();

    let report = ctx
        .attach_template(&writer.id, &ids(&["missing-category", &landing.id]))
        .await
        .unwrap();
    assert_eq!(report.projects, 0);
    assert_eq!(attachment_order(&ctx, &writer.id, &landing.id).await, Some(0));

    let report = ctx
        .attach_template("missing-template", &ids(&[&landing.id]))
        .await
        .unwrap();
    assert_eq!(report, Default::default());
}

#[tokio::test]
async fn test_detach_removes_single_row() {
    let ctx = setup_context().await;
    let landing = ctx.categories().create_category("Landing", false).await.unwrap();
    let blog = ctx.categories().create_category("Blog", false).await.unwrap();
    let writer = ctx
        .create_template(template("Writer"), &ids(&[&landing.id, &blog.id]))
        .await
        .unwrap();

    ctx.detach_template(&writer.id, &landing.id).await.unwrap();

    assert_eq!(attachment_order(&ctx, &writer.id, &landing.id).await, None);
    assert_eq!(attachment_order(&ctx, &writer.id, &blog.id).await, Some(0));

    // detaching again is a no-op
    ctx.detach_template(&writer.id, &landing.id).await.unwrap();
}
