//! Fingerprint of the applied migrations.
//!
//! Used as a cheap equality check between refreshes, not as a security boundary.

use sea_query::{Alias, Order, Query, QueryStatementWriter, SqliteQueryBuilder};
use sha2::{Digest, Sha256};
use sqlx::{Row, SqliteConnection};
use std::fmt::Write as _;

use crate::error::Result;

/// Reads `(app, name)` from the migration bookkeeping table and hashes them.
///
/// Fails when the bookkeeping table is missing, which aborts the caller's refresh.
pub async fn migration_signature(
    conn: &mut SqliteConnection,
    migrations_table: &str,
) -> Result<String> {
    let sql = Query::select()
        .columns([Alias::new("app"), Alias::new("name")])
        .from(Alias::new(migrations_table))
        .order_by(Alias::new("app"), Order::Asc)
        .order_by(Alias::new("name"), Order::Asc)
        .to_string(SqliteQueryBuilder);

    let rows = sqlx::query(&sql).fetch_all(&mut *conn).await?;

    let applied = rows
        .iter()
        .map(|row| -> Result<(String, String), sqlx::Error> {
            Ok((row.try_get("app")?, row.try_get("name")?))
        })
        .collect::<Result<Vec<_>, sqlx::Error>>()?;

    Ok(signature_of(applied))
}

/// SHA-256 over `app:name;` for every pair, sorted by app then name, as lower-case hex.
pub fn signature_of(applied: impl IntoIterator<Item = (String, String)>) -> String {
    let mut applied: Vec<(String, String)> = applied.into_iter().collect();
    applied.sort();

    let mut hasher = Sha256::new();
    for (app, name) in &applied {
        hasher.update(app.as_bytes());
        hasher.update(b":");
        hasher.update(name.as_bytes());
        hasher.update(b";");
    }

    let digest = hasher.finalize();
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(hex, "{byte:02x}");
    }
    hex
}
