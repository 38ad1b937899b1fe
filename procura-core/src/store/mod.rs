//! SQLite persistence for canonical procurement records.
//!
//! - [`schema`] materialises the tables and records the schema version.
//! - [`SqliteStore`] implements the lookup and persistence traits on top of it.
#![cfg(feature = "store-sqlite")]

mod schema;
mod sqlite;

pub use schema::{SCHEMA_VERSION, SchemaError, initialise_schema};
pub use sqlite::SqliteStore;

#[cfg(test)]
mod tests;
