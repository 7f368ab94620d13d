//! Mapped classes built from reflected metadata.
//!
//! Every reflected table becomes one [`MappedClass`]. Each foreign key between two
//! mapped tables adds a scalar accessor on the referencing class and a collection
//! accessor on the referenced class.

use heck::ToUpperCamelCase;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::types::{ColumnMeta, SchemaMetadata, TableMeta};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RelationshipKind {
    /// Scalar side, from the table holding the foreign key.
    ManyToOne,
    /// Collection side, on the referenced table.
    OneToMany,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Relationship {
    pub name: String,
    pub kind: RelationshipKind,
    pub target_class: String,
    pub target_table: String,
    pub local_columns: Vec<String>,
    pub remote_columns: Vec<String>,
}

#[derive(Debug)]
pub struct MappedClass {
    name: String,
    table: Arc<TableMeta>,
    relationships: Vec<Relationship>,
}

impl MappedClass {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table_name(&self) -> &str {
        &self.table.name
    }

    pub fn table(&self) -> &TableMeta {
        &self.table
    }

    pub fn columns(&self) -> &[ColumnMeta] {
        &self.table.columns
    }

    pub fn column(&self, name: &str) -> Option<&ColumnMeta> {
        self.table.column(name)
    }

    pub fn primary_key(&self) -> &[String] {
        &self.table.primary_key
    }

    pub fn relationships(&self) -> &[Relationship] {
        &self.relationships
    }

    pub fn relationship(&self, name: &str) -> Option<&Relationship> {
        self.relationships.iter().find(|rel| rel.name == name)
    }
}

/// Class name for a table: the fixed name from the model graph, otherwise the table
/// identifier in UpperCamelCase (`core_item_categories` -> `CoreItemCategories`).
pub fn classname_for_table(class_by_table: &BTreeMap<String, String>, table: &str) -> String {
    match class_by_table.get(table) {
        Some(name) => name.clone(),
        None => table.to_upper_camel_case(),
    }
}

pub fn name_for_scalar_relationship(referred_class: &str) -> String {
    referred_class.to_lowercase()
}

pub fn name_for_collection_relationship(referred_class: &str) -> String {
    format!("{}_set", referred_class.to_lowercase())
}

struct ClassBuilder {
    table: Arc<TableMeta>,
    relationships: Vec<Relationship>,
}

impl ClassBuilder {
    fn add(&mut self, class_name: &str, relationship: Relationship) {
        if self.table.column(&relationship.name).is_some() {
            tracing::warn!(
                class = class_name,
                accessor = %relationship.name,
                "relationship accessor shadows a column, skipped"
            );
            return;
        }
        if self.relationships.iter().any(|rel| rel.name == relationship.name) {
            tracing::warn!(
                class = class_name,
                accessor = %relationship.name,
                "duplicate relationship accessor, keeping the first"
            );
            return;
        }
        self.relationships.push(relationship);
    }
}

/// Builds the classes of one generation, keyed by class name.
pub fn automap(
    metadata: &SchemaMetadata,
    class_by_table: &BTreeMap<String, String>,
) -> BTreeMap<String, Arc<MappedClass>> {
    let mut class_of_table: BTreeMap<&str, String> = BTreeMap::new();
    let mut builders: BTreeMap<String, ClassBuilder> = BTreeMap::new();

    for table in metadata.tables() {
        let class_name = classname_for_table(class_by_table, &table.name);
        if builders.contains_key(&class_name) {
            tracing::warn!(
                table = %table.name,
                class = %class_name,
                "class name already taken by another table, table not mapped"
            );
            continue;
        }
        class_of_table.insert(&table.name, class_name.clone());
        builders.insert(
            class_name,
            ClassBuilder {
                table: Arc::clone(table),
                relationships: Vec::new(),
            },
        );
    }

    for table in metadata.tables() {
        let Some(local_class) = class_of_table.get(table.name.as_str()) else {
            continue;
        };

        for fk in &table.foreign_keys {
            let Some(referred_class) = class_of_table.get(fk.referred_table.as_str()) else {
                continue;
            };

            let scalar = Relationship {
                name: name_for_scalar_relationship(referred_class),
                kind: RelationshipKind::ManyToOne,
                target_class: referred_class.clone(),
                target_table: fk.referred_table.clone(),
                local_columns: fk.columns.clone(),
                remote_columns: fk.referred_columns.clone(),
            };
            let collection = Relationship {
                name: name_for_collection_relationship(local_class),
                kind: RelationshipKind::OneToMany,
                target_class: local_class.clone(),
                target_table: table.name.clone(),
                local_columns: fk.referred_columns.clone(),
                remote_columns: fk.columns.clone(),
            };

            if let Some(builder) = builders.get_mut(local_class) {
                builder.add(local_class, scalar);
            }
            if let Some(builder) = builders.get_mut(referred_class) {
                builder.add(referred_class, collection);
            }
        }
    }

    builders
        .into_iter()
        .map(|(name, builder)| {
            let class = MappedClass {
                name: name.clone(),
                table: builder.table,
                relationships: builder.relationships,
            };
            (name, Arc::new(class))
        })
        .collect()
}
