use sea_query::{Alias, Expr, LikeExpr, Order, Query, QueryStatementWriter, SqliteQueryBuilder};
use sqlx::{Row, SqliteConnection};
use std::collections::{BTreeSet, HashMap};

use crate::error::Result;
use crate::types::{ColumnMeta, ForeignKeyMeta, SchemaMetadata, TableMeta};

const COLUMNS_SQL: &str = r#"SELECT name, type, "notnull", dflt_value, pk FROM pragma_table_info(?1) ORDER BY cid"#;

const FOREIGN_KEYS_SQL: &str = r#"SELECT id, seq, "table", "from", "to", on_update, on_delete FROM pragma_foreign_key_list(?1) ORDER BY id, seq"#;

/// Names of the user tables that currently exist in the database.
pub async fn existing_tables(conn: &mut SqliteConnection) -> Result<BTreeSet<String>> {
    let sql = Query::select()
        .column(Alias::new("name"))
        .from(Alias::new("sqlite_master"))
        .and_where(Expr::col(Alias::new("type")).eq("table"))
        .and_where(
            Expr::col(Alias::new("name")).not_like(LikeExpr::new("sqlite~_%").escape('~')),
        )
        .order_by(Alias::new("name"), Order::Asc)
        .to_string(SqliteQueryBuilder);

    let rows = sqlx::query(&sql).fetch_all(&mut *conn).await?;

    let mut names = BTreeSet::new();
    for row in &rows {
        names.insert(row.try_get::<String, _>("name")?);
    }
    Ok(names)
}

/// Reflects the allow-listed tables that exist. Allow-listed tables missing from the
/// database are left out; an empty intersection gives empty metadata.
pub async fn reflect_schema(
    conn: &mut SqliteConnection,
    allowlist: &BTreeSet<String>,
) -> Result<SchemaMetadata> {
    let existing = existing_tables(&mut *conn).await?;

    let missing: Vec<&String> = allowlist.difference(&existing).collect();
    if !missing.is_empty() {
        tracing::debug!(?missing, "allow-listed tables not present yet");
    }

    let mut tables = Vec::new();
    for name in allowlist.intersection(&existing) {
        tables.push(reflect_table(&mut *conn, name).await?);
    }

    resolve_implicit_references(&mut tables);

    Ok(SchemaMetadata::new(tables))
}

pub async fn reflect_table(conn: &mut SqliteConnection, name: &str) -> Result<TableMeta> {
    let rows = sqlx::query(COLUMNS_SQL)
        .bind(name)
        .fetch_all(&mut *conn)
        .await?;

    let mut columns = Vec::with_capacity(rows.len());
    let mut primary_key: Vec<(i64, String)> = Vec::new();
    for row in &rows {
        let column_name: String = row.try_get("name")?;
        let pk_position: i64 = row.try_get("pk")?;
        if pk_position > 0 {
            primary_key.push((pk_position, column_name.clone()));
        }

        columns.push(ColumnMeta {
            name: column_name,
            declared_type: row.try_get("type")?,
            not_null: row.try_get::<i64, _>("notnull")? != 0,
            default_value: row.try_get("dflt_value")?,
            primary_key: pk_position > 0,
        });
    }
    primary_key.sort();

    Ok(TableMeta {
        name: name.to_string(),
        columns,
        primary_key: primary_key.into_iter().map(|(_, column)| column).collect(),
        foreign_keys: reflect_foreign_keys(conn, name).await?,
    })
}

async fn reflect_foreign_keys(
    conn: &mut SqliteConnection,
    name: &str,
) -> Result<Vec<ForeignKeyMeta>> {
    let rows = sqlx::query(FOREIGN_KEYS_SQL)
        .bind(name)
        .fetch_all(&mut *conn)
        .await?;

    // one row per column, composite keys share an id
    let mut foreign_keys: Vec<ForeignKeyMeta> = Vec::new();
    for row in &rows {
        let id: i64 = row.try_get("id")?;
        let from: String = row.try_get("from")?;
        let to: Option<String> = row.try_get("to")?;

        match foreign_keys.last_mut() {
            Some(fk) if fk.id == id => {
                fk.columns.push(from);
                fk.referred_columns.extend(to);
            }
            _ => foreign_keys.push(ForeignKeyMeta {
                id,
                columns: vec![from],
                referred_table: row.try_get("table")?,
                referred_columns: to.into_iter().collect(),
                on_update: row.try_get("on_update")?,
                on_delete: row.try_get("on_delete")?,
            }),
        }
    }

    Ok(foreign_keys)
}

/// `REFERENCES t` without a column list points at t's primary key.
fn resolve_implicit_references(tables: &mut [TableMeta]) {
    let primary_keys: HashMap<String, Vec<String>> = tables
        .iter()
        .map(|table| (table.name.clone(), table.primary_key.clone()))
        .collect();

    for fk in tables.iter_mut().flat_map(|table| table.foreign_keys.iter_mut()) {
        if fk.referred_columns.is_empty() {
            if let Some(pk) = primary_keys.get(&fk.referred_table) {
                fk.referred_columns = pk.clone();
            }
        }
    }
}
