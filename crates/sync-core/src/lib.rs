//! Core types for the journal-sync framework.
//!
//! This crate provides the foundational types shared by the driver boundary
//! and the journal source:
//!
//! - [`PropertyType`] - Closed set of property types a shape can declare
//! - [`Property`] / [`Shape`] - The bound schema of a replicated query
//! - [`SourceValue`] - A scalar read from a source row
//!
//! # Architecture
//!
//! ```text
//! sync-core (this crate)
//!    │
//!    ├─── journal-sync-driver              (rows yield SourceValue)
//!    └─── journal-sync-as400-journal-source (projects rows through a Shape)
//! ```
//!
//! # Example
//!
//! ```rust
//! use sync_core::{PropertyType, SourceValue};
//!
//! let value = SourceValue::Int(42);
//! assert_eq!(value.project(PropertyType::Decimal), serde_json::json!("42"));
//! ```

pub mod schema;
pub mod types;
pub mod values;

// Re-exports for convenience
pub use schema::{Property, SchemaError, Shape};
pub use types::PropertyType;
pub use values::SourceValue;
