//! Migration-aware schema reflection for an async query layer that shares its
//! database with a synchronous ORM.
//!
//! The synchronous side owns the schema and its migrations. This crate mirrors its
//! [`model_graph::ModelGraph`] by reflecting the live database into mapped classes,
//! rebuilds them when the applied migrations change, and resolves model references
//! to the current [`automap::MappedClass`].

pub mod allowlist;
pub mod automap;
pub mod database_schema;
pub mod engine;
pub mod error;
pub mod logging;
pub mod mapping;
pub mod model_graph;
pub mod notify;
pub mod query;
pub mod routes;
pub mod settings;
pub mod signature;
pub mod types;

pub use error::{Error, Result};
pub use mapping::{AutoMap, MappingStatus, ModelReference};
