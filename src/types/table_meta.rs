use super::column_meta::ColumnMeta;
use super::foreign_key_meta::ForeignKeyMeta;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableMeta {
    pub name: String,
    pub columns: Vec<ColumnMeta>,
    pub primary_key: Vec<String>, // in key order
    pub foreign_keys: Vec<ForeignKeyMeta>,
}

impl TableMeta {
    pub fn column(&self, name: &str) -> Option<&ColumnMeta> {
        self.columns.iter().find(|column| column.name == name)
    }
}
