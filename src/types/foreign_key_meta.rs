#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ForeignKeyMeta {
    pub id: i64,
    pub columns: Vec<String>,
    pub referred_table: String,
    /// Empty until resolved when the DDL references the target's primary key implicitly.
    pub referred_columns: Vec<String>,
    pub on_update: String,
    pub on_delete: String,
}

