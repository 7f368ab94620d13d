//! Current mapping generation and the lookup API.
//!
//! A refresh builds a complete [`MappingGeneration`] off to the side and publishes it
//! with a single pointer swap. Readers clone the `Arc` of whatever generation is
//! current and never see a partly built one. A failed refresh publishes nothing.

use parking_lot::RwLock;
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::allowlist::build_table_allowlist;
use crate::automap::{automap, MappedClass};
use crate::database_schema::reflect_schema;
use crate::error::{Error, Result};
use crate::model_graph::{ModelDef, ModelGraph};
use crate::signature::migration_signature;
use crate::types::SchemaMetadata;

/// How a caller names the model it wants the mapped class for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelReference<'a> {
    Model(&'a ModelDef),
    /// `app_label.ModelName`
    Qualified {
        app_label: &'a str,
        model_name: &'a str,
    },
    /// `ModelName`, must be unique across all apps.
    Bare(&'a str),
}

impl<'a> From<&'a ModelDef> for ModelReference<'a> {
    fn from(model: &'a ModelDef) -> Self {
        ModelReference::Model(model)
    }
}

impl<'a> From<&'a str> for ModelReference<'a> {
    fn from(name: &'a str) -> Self {
        let name = name.trim();
        match name.split_once('.') {
            Some((app_label, model_name)) => ModelReference::Qualified {
                app_label,
                model_name,
            },
            None => ModelReference::Bare(name),
        }
    }
}

impl<'a> From<&'a String> for ModelReference<'a> {
    fn from(name: &'a String) -> Self {
        ModelReference::from(name.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MappingStatus {
    /// No generation has been published yet.
    Stale,
    Refreshing,
    Current,
}

#[derive(Debug)]
pub struct MappingGeneration {
    attempt: u64,
    signature: String,
    class_by_table: BTreeMap<String, String>,
    metadata: SchemaMetadata,
    classes: BTreeMap<String, Arc<MappedClass>>,
}

impl MappingGeneration {
    pub fn signature(&self) -> &str {
        &self.signature
    }

    pub fn class_by_table(&self) -> &BTreeMap<String, String> {
        &self.class_by_table
    }

    pub fn metadata(&self) -> &SchemaMetadata {
        &self.metadata
    }

    pub fn classes(&self) -> &BTreeMap<String, Arc<MappedClass>> {
        &self.classes
    }

    pub fn class(&self, name: &str) -> Option<&Arc<MappedClass>> {
        self.classes.get(name)
    }

    fn class_for_table(&self, table: &str) -> Result<Arc<MappedClass>> {
        self.class_by_table
            .get(table)
            .and_then(|name| self.classes.get(name))
            .cloned()
            .ok_or_else(|| Error::TableNotMapped(table.to_string()))
    }
}

/// Owns the current generation for one database and model graph.
pub struct AutoMap {
    pool: SqlitePool,
    graph: Arc<ModelGraph>,
    migrations_table: String,
    current: RwLock<Option<Arc<MappingGeneration>>>,
    attempts: AtomicU64,
    in_flight: AtomicUsize,
    rebuilds: AtomicU64,
}

struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl AutoMap {
    pub fn new(pool: SqlitePool, graph: Arc<ModelGraph>, migrations_table: impl Into<String>) -> Self {
        Self {
            pool,
            graph,
            migrations_table: migrations_table.into(),
            current: RwLock::new(None),
            attempts: AtomicU64::new(0),
            in_flight: AtomicUsize::new(0),
            rebuilds: AtomicU64::new(0),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn graph(&self) -> &ModelGraph {
        &self.graph
    }

    pub fn generation(&self) -> Option<Arc<MappingGeneration>> {
        self.current.read().clone()
    }

    pub fn status(&self) -> MappingStatus {
        if self.in_flight.load(Ordering::SeqCst) > 0 {
            MappingStatus::Refreshing
        } else if self.current.read().is_some() {
            MappingStatus::Current
        } else {
            MappingStatus::Stale
        }
    }

    /// Number of generations built so far (skipped no-op refreshes not counted).
    pub fn rebuild_count(&self) -> u64 {
        self.rebuilds.load(Ordering::SeqCst)
    }

    /// Rebuilds the mapping when the migration signature changed, when nothing has
    /// been published yet, or when `force` is set. Otherwise returns immediately.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn refresh(&self, force: bool) -> Result<()> {
        let _in_flight = InFlight::enter(&self.in_flight);
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;

        // One transaction so the signature and the reflected schema come from the
        // same read snapshot.
        let mut tx = self.pool.begin().await?;

        let signature = migration_signature(&mut *tx, &self.migrations_table).await?;
        if !force {
            if let Some(current) = self.generation() {
                if current.signature == signature {
                    tracing::debug!(%signature, "migration signature unchanged, mapping is current");
                    return Ok(());
                }
            }
        }

        let class_by_table = self.graph.class_name_map();
        let allowlist = build_table_allowlist(&self.graph);
        let metadata = reflect_schema(&mut *tx, &allowlist).await?;
        tx.commit().await?;

        let classes = automap(&metadata, &class_by_table);
        self.rebuilds.fetch_add(1, Ordering::SeqCst);

        if metadata.is_empty() {
            tracing::info!(%signature, "no allow-listed tables exist yet, published empty mapping");
        } else {
            tracing::info!(
                %signature,
                tables = metadata.len(),
                classes = classes.len(),
                force,
                "mapping refreshed"
            );
        }

        let generation = Arc::new(MappingGeneration {
            attempt,
            signature,
            class_by_table,
            metadata,
            classes,
        });
        self.publish(generation);

        Ok(())
    }

    fn publish(&self, generation: Arc<MappingGeneration>) {
        let mut current = self.current.write();
        let published = current.as_ref().map(|existing| existing.attempt);
        if let Some(published) = published.filter(|&published| published > generation.attempt) {
            tracing::debug!(
                attempt = generation.attempt,
                published,
                "newer refresh already published, discarding"
            );
            return;
        }
        *current = Some(generation);
    }

    /// Mapped class for a model, a qualified name or a unique bare name.
    pub fn resolve<'a>(&self, reference: impl Into<ModelReference<'a>>) -> Result<Arc<MappedClass>> {
        let generation = self.generation().ok_or(Error::NotInitialized)?;

        let model = match reference.into() {
            ModelReference::Model(model) => model,
            ModelReference::Qualified {
                app_label,
                model_name,
            } => self
                .graph
                .get_model(app_label, model_name)
                .ok_or_else(|| Error::ModelNotFound(format!("{app_label}.{model_name}")))?,
            ModelReference::Bare(name) => self.unique_model(name)?,
        };

        generation.class_for_table(&model.db_table())
    }

    fn unique_model(&self, name: &str) -> Result<&ModelDef> {
        let matches = self.graph.find_by_name(name);
        match matches.as_slice() {
            [] => Err(Error::ModelNotFound(name.to_string())),
            [model] => Ok(*model),
            _ => {
                let mut app_labels: Vec<&str> = matches.iter().map(|m| m.app_label.as_str()).collect();
                app_labels.sort_unstable();
                app_labels.dedup();
                Err(Error::AmbiguousModel {
                    name: name.to_string(),
                    app_labels: app_labels.join(", "),
                })
            }
        }
    }
}
