#![allow(dead_code)]

use std::sync::Arc;

use schema_automap::engine::create_pool;
use schema_automap::mapping::AutoMap;
use schema_automap::model_graph::ModelGraph;
use schema_automap::settings::DatabaseSettings;
use sqlx::SqlitePool;

pub const MIGRATIONS_TABLE: &str = "django_migrations";

pub const SHOP_MODELS: &str = r#"
[[models]]
app_label = "auth"
name = "User"

[[models]]
app_label = "core"
name = "Supplier"
db_table = "core_supplier"

[[models]]
app_label = "core"
name = "Category"
db_table = "core_category"

[[models]]
app_label = "core"
name = "Item"
db_table = "core_item"

[[models.many_to_many]]
name = "categories"

[[models.many_to_many]]
name = "tags"
through = "ItemTag"

[[models]]
app_label = "core"
name = "Tag"
db_table = "core_tag"

[[models]]
app_label = "core"
name = "ItemTag"
db_table = "core_item_tag"
"#;

pub const SUPPLIER_AND_ITEM: &[&str] = &[
    "CREATE TABLE core_supplier (id INTEGER PRIMARY KEY AUTOINCREMENT, name VARCHAR(200) NOT NULL)",
    "CREATE TABLE core_item (id INTEGER PRIMARY KEY AUTOINCREMENT, name VARCHAR(200) NOT NULL, \
     supplier_id INTEGER NULL REFERENCES core_supplier (id) ON DELETE CASCADE)",
];

pub const CATEGORIES_AND_TAGS: &[&str] = &[
    "CREATE TABLE core_category (id INTEGER PRIMARY KEY AUTOINCREMENT, title VARCHAR(200) NOT NULL)",
    "CREATE TABLE core_item_categories (id INTEGER PRIMARY KEY AUTOINCREMENT, \
     item_id INTEGER NOT NULL REFERENCES core_item (id), \
     category_id INTEGER NOT NULL REFERENCES core_category (id))",
    "CREATE TABLE core_tag (id INTEGER PRIMARY KEY AUTOINCREMENT, title VARCHAR(100) NOT NULL)",
    "CREATE TABLE core_item_tag (id INTEGER PRIMARY KEY AUTOINCREMENT, \
     weight INTEGER NOT NULL DEFAULT 0, \
     item_id INTEGER NOT NULL REFERENCES core_item (id), \
     tag_id INTEGER NOT NULL REFERENCES core_tag (id))",
];

/// Single-connection in-memory database, so every query sees the same schema.
pub async fn memory_pool() -> SqlitePool {
    create_pool(&DatabaseSettings {
        url: "sqlite::memory:".into(),
        max_connections: 1,
        acquire_timeout_secs: 5,
    })
    .await
    .expect("open in-memory database")
}

pub async fn create_migrations_table(pool: &SqlitePool) {
    sqlx::query(
        "CREATE TABLE django_migrations (id INTEGER PRIMARY KEY AUTOINCREMENT, \
         app VARCHAR(255) NOT NULL, name VARCHAR(255) NOT NULL, applied DATETIME)",
    )
    .execute(pool)
    .await
    .expect("create migrations table");
}

/// Runs the DDL and records the migration the way the migration tool would.
pub async fn apply_migration(pool: &SqlitePool, app: &str, name: &str, ddl: &[&str]) {
    for statement in ddl {
        sqlx::query(statement)
            .execute(pool)
            .await
            .expect("apply migration ddl");
    }
    sqlx::query("INSERT INTO django_migrations (app, name, applied) VALUES (?1, ?2, datetime('now'))")
        .bind(app)
        .bind(name)
        .execute(pool)
        .await
        .expect("record migration");
}

pub fn shop_graph() -> Arc<ModelGraph> {
    Arc::new(ModelGraph::from_toml_str(SHOP_MODELS).expect("parse shop models"))
}

pub async fn shop_automap() -> (SqlitePool, Arc<AutoMap>) {
    let pool = memory_pool().await;
    create_migrations_table(&pool).await;
    let automap = Arc::new(AutoMap::new(pool.clone(), shop_graph(), MIGRATIONS_TABLE));
    (pool, automap)
}
