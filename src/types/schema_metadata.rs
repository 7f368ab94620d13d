use std::collections::BTreeMap;
use std::sync::Arc;

use super::table_meta::TableMeta;

/// Reflected tables of one mapping generation. Built once, never mutated.
#[derive(Clone, Debug, Default)]
pub struct SchemaMetadata {
    tables: BTreeMap<String, Arc<TableMeta>>,
}

impl SchemaMetadata {
    pub fn new(tables: impl IntoIterator<Item = TableMeta>) -> Self {
        Self {
            tables: tables
                .into_iter()
                .map(|table| (table.name.clone(), Arc::new(table)))
                .collect(),
        }
    }

    pub fn table(&self, name: &str) -> Option<&Arc<TableMeta>> {
        self.tables.get(name)
    }

    pub fn tables(&self) -> impl Iterator<Item = &Arc<TableMeta>> {
        self.tables.values()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
