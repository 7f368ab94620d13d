pub mod column_meta;
pub mod foreign_key_meta;
pub mod schema_metadata;
pub mod table_meta;

pub use column_meta::ColumnMeta;
pub use foreign_key_meta::ForeignKeyMeta;
pub use schema_metadata::SchemaMetadata;
pub use table_meta::TableMeta;
