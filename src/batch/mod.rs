// src/batch/mod.rs

//! Reading pending-entity batches from disk.
//!
//! Two formats are accepted, picked by file extension:
//!
//! ```toml
//! [[entity]]
//! id = "6f1c..."
//! kind = "Customer"
//! references = ["0b7e..."]
//! payload = { name = "Acme" }
//! ```
//!
//! or a JSON array of objects with the same fields.

pub mod loader;

pub use loader::{load_batch, parse_json_batch, parse_toml_batch, BatchFormat, RawEntity};
