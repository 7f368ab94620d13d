//! The synchronous ORM's declared models.
//!
//! The graph is the ground truth for which tables should exist. It is loaded once
//! from TOML and never changes while the process runs.
//!
//! ```toml
//! [[models]]
//! app_label = "core"
//! name = "Item"
//! db_table = "core_item"
//!
//! [[models.many_to_many]]
//! name = "categories"
//! ```

use heck::ToUpperCamelCase;
use serde_derive::Deserialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};

#[derive(Deserialize, Debug, Clone, Default)]
pub struct ModelGraph {
    #[serde(default)]
    models: Vec<ModelDef>,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ModelDef {
    pub app_label: String,
    pub name: String,
    #[serde(default)]
    db_table: Option<String>,
    #[serde(default)]
    pub many_to_many: Vec<ManyToManyDef>,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ManyToManyDef {
    pub name: String,
    /// Custom join model, as `app_label.Model` or a bare name in the owner's app.
    #[serde(default)]
    pub through: Option<String>,
    #[serde(default)]
    pub db_table: Option<String>,
}

impl ModelDef {
    pub fn new(app_label: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            app_label: app_label.into(),
            name: name.into(),
            db_table: None,
            many_to_many: Vec::new(),
        }
    }

    pub fn with_table(mut self, db_table: impl Into<String>) -> Self {
        self.db_table = Some(db_table.into());
        self
    }

    pub fn with_many_to_many(mut self, m2m: ManyToManyDef) -> Self {
        self.many_to_many.push(m2m);
        self
    }

    pub fn db_table(&self) -> String {
        match &self.db_table {
            Some(table) => table.clone(),
            None => format!("{}_{}", self.app_label, self.name.to_lowercase()),
        }
    }

    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.app_label, self.name)
    }
}

impl ManyToManyDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            through: None,
            db_table: None,
        }
    }

    pub fn through(mut self, through: impl Into<String>) -> Self {
        self.through = Some(through.into());
        self
    }

    pub fn with_table(mut self, db_table: impl Into<String>) -> Self {
        self.db_table = Some(db_table.into());
        self
    }

    /// Name of the table backing this relation, or `None` when it cannot be resolved
    /// (unknown through model, empty name).
    pub fn join_table(&self, owner: &ModelDef, graph: &ModelGraph) -> Option<String> {
        let table = match (&self.through, &self.db_table) {
            (Some(through), _) => {
                let (app_label, name) = through
                    .split_once('.')
                    .unwrap_or((owner.app_label.as_str(), through.as_str()));
                graph.get_model(app_label, name)?.db_table()
            }
            (None, Some(table)) => table.clone(),
            (None, None) => format!("{}_{}", owner.db_table(), self.name),
        };

        if table.is_empty() {
            None
        } else {
            Some(table)
        }
    }
}

impl ModelGraph {
    pub fn new(models: Vec<ModelDef>) -> Result<Self> {
        let graph = Self { models };
        graph.validate()?;
        Ok(graph)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let graph: Self = toml::from_str(content)?;
        graph.validate()?;
        Ok(graph)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let graph = Self::from_toml_str(&fs::read_to_string(path)?)?;
        tracing::info!(path = %path.display(), models = graph.models.len(), "model graph loaded");
        Ok(graph)
    }

    fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for model in &self.models {
            if model.app_label.is_empty() || model.name.is_empty() {
                return Err(Error::InvalidModelGraph(
                    "models need a non-empty app_label and name".into(),
                ));
            }
            if !seen.insert((model.app_label.as_str(), model.name.to_lowercase())) {
                return Err(Error::InvalidModelGraph(format!(
                    "model '{}' is declared twice",
                    model.qualified_name()
                )));
            }
        }
        Ok(())
    }

    pub fn models(&self) -> &[ModelDef] {
        &self.models
    }

    /// App label must match exactly, the model name is compared case-insensitively.
    pub fn get_model(&self, app_label: &str, name: &str) -> Option<&ModelDef> {
        self.models
            .iter()
            .find(|m| m.app_label == app_label && m.name.eq_ignore_ascii_case(name))
    }

    /// Every model whose bare name is exactly `name`, across all apps.
    pub fn find_by_name(&self, name: &str) -> Vec<&ModelDef> {
        self.models.iter().filter(|m| m.name == name).collect()
    }

    /// Table name to class name. A model name unique across the graph is used as is,
    /// otherwise it gets the app label as prefix (`core` + `Item` = `CoreItem`).
    pub fn class_name_map(&self) -> BTreeMap<String, String> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for model in &self.models {
            *counts.entry(model.name.as_str()).or_default() += 1;
        }

        self.models
            .iter()
            .map(|model| {
                let class_name = if counts[model.name.as_str()] == 1 {
                    model.name.clone()
                } else {
                    format!("{}{}", model.app_label.to_upper_camel_case(), model.name)
                };
                (model.db_table(), class_name)
            })
            .collect()
    }
}
