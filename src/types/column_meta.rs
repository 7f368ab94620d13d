#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnMeta {
    pub name: String,
    pub declared_type: String, // as written in the DDL, may be empty
    pub not_null: bool,
    pub default_value: Option<String>,
    pub primary_key: bool,
}
