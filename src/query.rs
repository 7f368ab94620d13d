//! Reading rows through a mapped class.

use sea_query::{Alias, Order, Query, QueryStatementWriter, SqliteQueryBuilder};
use serde_json::{Map, Value};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Row, SqlitePool, TypeInfo, ValueRef};

use crate::automap::MappedClass;
use crate::error::{Error, Result};

pub const DEFAULT_LIMIT: u64 = 100;
pub const MAX_LIMIT: u64 = 1000;
/// SQLite binds `LIMIT` and `OFFSET` as signed 64-bit integers.
pub const MAX_OFFSET: u64 = i64::MAX as u64;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Page {
    pub limit: u64,
    pub offset: u64,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

impl Page {
    pub fn new(limit: Option<u64>, offset: Option<u64>) -> Result<Self> {
        let limit = limit.unwrap_or(DEFAULT_LIMIT);
        if limit == 0 || limit > MAX_LIMIT {
            return Err(Error::InvalidPage(format!(
                "limit must be between 1 and {MAX_LIMIT}, got {limit}"
            )));
        }
        let offset = offset.unwrap_or(0);
        if offset > MAX_OFFSET {
            return Err(Error::InvalidPage(format!(
                "offset must be at most {MAX_OFFSET}, got {offset}"
            )));
        }
        Ok(Self { limit, offset })
    }
}

impl MappedClass {
    /// `SELECT` of every reflected column, ordered by primary key.
    pub fn select_page(&self, page: Page) -> String {
        let mut select = Query::select();
        select
            .columns(self.columns().iter().map(|column| Alias::new(&column.name)))
            .from(Alias::new(self.table_name()));

        for column in self.primary_key() {
            select.order_by(Alias::new(column), Order::Asc);
        }

        select
            .limit(page.limit)
            .offset(page.offset)
            .to_string(SqliteQueryBuilder)
    }
}

/// Runs [`MappedClass::select_page`] and returns each row as a JSON object.
pub async fn fetch_page(
    pool: &SqlitePool,
    class: &MappedClass,
    page: Page,
) -> Result<Vec<Map<String, Value>>> {
    let sql = class.select_page(page);
    tracing::debug!(class = class.name(), %sql, "fetching page");

    let rows = sqlx::query(&sql).fetch_all(pool).await?;
    rows.iter().map(row_to_json).collect()
}

enum Storage {
    Null,
    Integer,
    Real,
    Text,
    Blob,
}

fn row_to_json(row: &SqliteRow) -> Result<Map<String, Value>> {
    let mut object = Map::with_capacity(row.columns().len());

    for (index, column) in row.columns().iter().enumerate() {
        let storage = {
            let raw = row.try_get_raw(index)?;
            if raw.is_null() {
                Storage::Null
            } else {
                match raw.type_info().name() {
                    "INTEGER" => Storage::Integer,
                    "REAL" => Storage::Real,
                    "BLOB" => Storage::Blob,
                    _ => Storage::Text,
                }
            }
        };

        let value = match storage {
            Storage::Null => Value::Null,
            Storage::Integer => Value::from(row.try_get::<i64, _>(index)?),
            Storage::Real => Value::from(row.try_get::<f64, _>(index)?),
            Storage::Text => Value::from(row.try_get::<String, _>(index)?),
            Storage::Blob => Value::from(row.try_get::<Vec<u8>, _>(index)?),
        };
        object.insert(column.name().to_string(), value);
    }

    Ok(object)
}
