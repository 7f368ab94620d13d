use std::collections::BTreeSet;

use crate::model_graph::ModelGraph;

/// Tables the model graph expects: one per model plus one per forward many-to-many
/// join table. Relations whose join table cannot be resolved are skipped.
pub fn build_table_allowlist(graph: &ModelGraph) -> BTreeSet<String> {
    let mut allow = BTreeSet::new();

    for model in graph.models() {
        allow.insert(model.db_table());

        for m2m in &model.many_to_many {
            match m2m.join_table(model, graph) {
                Some(table) => {
                    allow.insert(table);
                }
                None => tracing::debug!(
                    model = %model.qualified_name(),
                    field = %m2m.name,
                    "skipping many-to-many without a resolvable join table"
                ),
            }
        }
    }

    allow
}
