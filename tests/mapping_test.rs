mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use schema_automap::automap::RelationshipKind;
use schema_automap::mapping::AutoMap;
use schema_automap::model_graph::{ModelDef, ModelGraph};
use schema_automap::query::{fetch_page, Page};
use schema_automap::signature::signature_of;
use schema_automap::{Error, MappingStatus};

#[tokio::test]
async fn lookup_before_refresh_is_not_initialized() {
    let (_pool, automap) = shop_automap().await;

    assert_eq!(automap.status(), MappingStatus::Stale);
    assert!(matches!(automap.resolve("Item"), Err(Error::NotInitialized)));
    assert!(matches!(automap.resolve("core.Item"), Err(Error::NotInitialized)));
}

#[tokio::test]
async fn no_migrations_gives_empty_but_current_mapping() {
    let (_pool, automap) = shop_automap().await;

    automap.refresh(false).await.unwrap();

    let generation = automap.generation().unwrap();
    assert_eq!(generation.signature(), signature_of(Vec::new()));
    assert!(generation.metadata().is_empty());
    assert!(generation.classes().is_empty());
    assert_eq!(automap.status(), MappingStatus::Current);

    match automap.resolve("Item") {
        Err(Error::TableNotMapped(table)) => assert_eq!(table, "core_item"),
        other => panic!("expected TableNotMapped, got {other:?}"),
    }
}

#[tokio::test]
async fn missing_bookkeeping_table_aborts_refresh() {
    let pool = memory_pool().await;
    let automap = AutoMap::new(pool, shop_graph(), MIGRATIONS_TABLE);

    assert!(matches!(automap.refresh(false).await, Err(Error::Database(_))));
    assert!(automap.generation().is_none());
    assert_eq!(automap.status(), MappingStatus::Stale);
}

#[tokio::test]
async fn failed_refresh_keeps_previous_generation() {
    let (pool, automap) = shop_automap().await;
    apply_migration(&pool, "core", "0001_initial", SUPPLIER_AND_ITEM).await;
    automap.refresh(false).await.unwrap();
    let before = automap.generation().unwrap();

    sqlx::query("DROP TABLE django_migrations")
        .execute(&pool)
        .await
        .unwrap();

    assert!(automap.refresh(true).await.is_err());
    let after = automap.generation().unwrap();
    assert!(Arc::ptr_eq(&before, &after));
    assert_eq!(automap.status(), MappingStatus::Current);
    assert!(automap.resolve("Item").is_ok());
}

#[tokio::test]
async fn status_is_refreshing_while_a_refresh_waits_for_the_database() {
    let (pool, automap) = shop_automap().await;
    apply_migration(&pool, "core", "0001_initial", SUPPLIER_AND_ITEM).await;

    // the pool has a single connection, so the refresh blocks until it is released
    let held = pool.acquire().await.unwrap();
    let refresh = tokio::spawn({
        let automap = Arc::clone(&automap);
        async move { automap.refresh(false).await }
    });

    tokio::time::timeout(Duration::from_secs(5), async {
        while automap.status() != MappingStatus::Refreshing {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("refresh never reported as in flight");
    assert!(automap.generation().is_none());

    drop(held);
    refresh.await.unwrap().unwrap();

    assert_eq!(automap.status(), MappingStatus::Current);
    assert!(automap.resolve("Item").is_ok());
}

#[tokio::test]
async fn foreign_key_yields_scalar_and_collection_accessors() {
    let (pool, automap) = shop_automap().await;
    apply_migration(&pool, "core", "0001_initial", SUPPLIER_AND_ITEM).await;

    automap.refresh(false).await.unwrap();

    let generation = automap.generation().unwrap();
    let names: Vec<&String> = generation.classes().keys().collect();
    assert_eq!(names, ["Item", "Supplier"]);

    let item = automap.resolve("Item").unwrap();
    let supplier_rel = item.relationship("supplier").unwrap();
    assert_eq!(supplier_rel.kind, RelationshipKind::ManyToOne);
    assert_eq!(supplier_rel.target_class, "Supplier");
    assert_eq!(supplier_rel.local_columns, vec!["supplier_id".to_string()]);
    assert_eq!(supplier_rel.remote_columns, vec!["id".to_string()]);

    let supplier = automap.resolve("core.Supplier").unwrap();
    let items_rel = supplier.relationship("item_set").unwrap();
    assert_eq!(items_rel.kind, RelationshipKind::OneToMany);
    assert_eq!(items_rel.target_class, "Item");
}

#[tokio::test]
async fn join_tables_are_mapped() {
    let (pool, automap) = shop_automap().await;
    apply_migration(&pool, "core", "0001_initial", SUPPLIER_AND_ITEM).await;
    apply_migration(&pool, "core", "0002_categories_tags", CATEGORIES_AND_TAGS).await;

    automap.refresh(false).await.unwrap();
    let generation = automap.generation().unwrap();

    // auto-generated join table, named from its identifier only
    let join = generation.class("CoreItemCategories").unwrap();
    assert_eq!(join.table_name(), "core_item_categories");
    assert!(join.relationship("item").is_some());
    assert!(join.relationship("category").is_some());

    // custom through table keeps its extra column next to both keys
    let item_tag = automap.resolve("ItemTag").unwrap();
    let weight = item_tag.column("weight").unwrap();
    assert_eq!(weight.declared_type, "INTEGER");
    assert!(weight.not_null);
    assert_eq!(weight.default_value.as_deref(), Some("0"));
    assert_eq!(item_tag.relationship("item").unwrap().target_class, "Item");
    assert_eq!(item_tag.relationship("tag").unwrap().target_class, "Tag");
    assert_eq!(item_tag.table().foreign_keys.len(), 2);
    let through = generation.metadata().table("core_item_tag").unwrap();
    assert_eq!(through.primary_key, vec!["id".to_string()]);

    let item = automap.resolve("Item").unwrap();
    assert!(item.relationship("itemtag_set").is_some());
    assert!(item.relationship("coreitemcategories_set").is_some());
}

#[tokio::test]
async fn unforced_refresh_without_changes_is_a_no_op() {
    let (pool, automap) = shop_automap().await;
    apply_migration(&pool, "core", "0001_initial", SUPPLIER_AND_ITEM).await;

    automap.refresh(false).await.unwrap();
    let first = automap.generation().unwrap();
    let item = automap.resolve("Item").unwrap();

    automap.refresh(false).await.unwrap();

    assert_eq!(automap.rebuild_count(), 1);
    assert!(Arc::ptr_eq(&first, &automap.generation().unwrap()));
    assert!(Arc::ptr_eq(&item, &automap.resolve("Item").unwrap()));
}

#[tokio::test]
async fn forced_refresh_always_rebuilds() {
    let (pool, automap) = shop_automap().await;
    apply_migration(&pool, "core", "0001_initial", SUPPLIER_AND_ITEM).await;

    automap.refresh(false).await.unwrap();
    let item = automap.resolve("Item").unwrap();

    automap.refresh(true).await.unwrap();

    assert_eq!(automap.rebuild_count(), 2);
    let rebuilt = automap.resolve("Item").unwrap();
    assert!(!Arc::ptr_eq(&item, &rebuilt));
    assert_eq!(item.name(), rebuilt.name());
}

#[tokio::test]
async fn new_migration_changes_signature_and_rebuilds() {
    let (pool, automap) = shop_automap().await;
    apply_migration(&pool, "core", "0001_initial", SUPPLIER_AND_ITEM).await;
    automap.refresh(false).await.unwrap();
    let before = automap.generation().unwrap();
    assert!(matches!(automap.resolve("Tag"), Err(Error::TableNotMapped(_))));

    apply_migration(&pool, "core", "0002_categories_tags", CATEGORIES_AND_TAGS).await;
    automap.refresh(false).await.unwrap();

    let after = automap.generation().unwrap();
    assert_ne!(before.signature(), after.signature());
    assert_eq!(automap.rebuild_count(), 2);
    assert_eq!(automap.resolve("Tag").unwrap().table_name(), "core_tag");
}

#[tokio::test]
async fn tables_outside_the_model_graph_are_not_reflected() {
    let (pool, automap) = shop_automap().await;
    apply_migration(
        &pool,
        "legacy",
        "0001_initial",
        &["CREATE TABLE legacy_report (id INTEGER PRIMARY KEY, body TEXT)"],
    )
    .await;

    automap.refresh(false).await.unwrap();

    let generation = automap.generation().unwrap();
    assert!(!generation.metadata().contains("legacy_report"));
    assert!(!generation.metadata().contains("django_migrations"));
}

#[tokio::test]
async fn bare_names_must_be_unique() {
    let pool = memory_pool().await;
    create_migrations_table(&pool).await;
    apply_migration(
        &pool,
        "core",
        "0001_initial",
        &["CREATE TABLE core_item (id INTEGER PRIMARY KEY, name TEXT)"],
    )
    .await;
    apply_migration(
        &pool,
        "shop",
        "0001_initial",
        &["CREATE TABLE shop_item (id INTEGER PRIMARY KEY, sku TEXT)"],
    )
    .await;
    let graph = ModelGraph::new(vec![
        ModelDef::new("core", "Item"),
        ModelDef::new("shop", "Item"),
        ModelDef::new("shop", "Order"),
    ])
    .unwrap();
    let automap = AutoMap::new(pool, Arc::new(graph), MIGRATIONS_TABLE);
    automap.refresh(false).await.unwrap();

    match automap.resolve("Item") {
        Err(Error::AmbiguousModel { name, app_labels }) => {
            assert_eq!(name, "Item");
            assert_eq!(app_labels, "core, shop");
        }
        other => panic!("expected AmbiguousModel, got {other:?}"),
    }

    let core_item = automap.resolve("core.Item").unwrap();
    let shop_item = automap.resolve("shop.Item").unwrap();
    assert_eq!(core_item.name(), "CoreItem");
    assert_eq!(shop_item.name(), "ShopItem");
    assert!(shop_item.column("sku").is_some());

    let model = automap.graph().get_model("shop", "Item").unwrap().clone();
    assert!(Arc::ptr_eq(&automap.resolve(&model).unwrap(), &shop_item));
}

#[tokio::test]
async fn unknown_models_are_not_found() {
    let (_pool, automap) = shop_automap().await;
    automap.refresh(false).await.unwrap();

    assert!(matches!(automap.resolve("Nope"), Err(Error::ModelNotFound(_))));
    assert!(matches!(automap.resolve("core.Nope"), Err(Error::ModelNotFound(_))));
    assert!(matches!(automap.resolve("billing.Item"), Err(Error::ModelNotFound(_))));
}

#[tokio::test]
async fn rows_are_read_through_the_mapped_class() {
    let (pool, automap) = shop_automap().await;
    apply_migration(&pool, "core", "0001_initial", SUPPLIER_AND_ITEM).await;
    for name in ["Acme", "Globex", "Initech"] {
        sqlx::query("INSERT INTO core_supplier (name) VALUES (?1)")
            .bind(name)
            .execute(&pool)
            .await
            .unwrap();
    }
    sqlx::query("INSERT INTO core_item (name, supplier_id) VALUES ('anvil', 1), ('rope', NULL)")
        .execute(&pool)
        .await
        .unwrap();
    automap.refresh(false).await.unwrap();

    let supplier = automap.resolve("Supplier").unwrap();
    let rows = fetch_page(&pool, &supplier, Page::new(Some(2), Some(1)).unwrap())
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["id"], 2);
    assert_eq!(rows[0]["name"], "Globex");

    let item = automap.resolve("Item").unwrap();
    let rows = fetch_page(&pool, &item, Page::default()).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["supplier_id"], 1);
    assert!(rows[1]["supplier_id"].is_null());
}

#[test]
fn bundled_model_graph_loads() {
    let graph = ModelGraph::load(std::path::Path::new("models.toml")).unwrap();

    let names = graph.class_name_map();
    assert_eq!(names["auth_user"], "User");
    assert_eq!(names["core_item_tag"], "ItemTag");
    assert!(schema_automap::allowlist::build_table_allowlist(&graph).contains("core_item_categories"));
}
