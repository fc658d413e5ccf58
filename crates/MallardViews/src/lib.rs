//! # Tabular view definitions over FHIR resources
//!
//! This crate turns declarative ViewDefinitions into flat rows:
//!
//! - [`model`]: the serde data model for ViewDefinition JSON
//! - [`compiler`]: validation and compilation into an immutable [`Plan`]
//! - [`binding`]: the never-failing adapter onto the FHIRPath engine
//! - [`materializer`]: applying a plan to one resource, producing rows
//!   under inner-join (`forEach`), outer-join (`forEachOrNull`) and
//!   `unionAll` semantics
//!
//! ## Usage
//!
//! ```rust
//! use mallard_views::{Materializer, ViewDefinition, compile};
//! use serde_json::json;
//!
//! let view = ViewDefinition::from_json(json!({
//!     "name": "PatientView",
//!     "status": "active",
//!     "resource": "Patient",
//!     "select": [{"column": [
//!         {"path": "getResourceKey()", "name": "patient_id"},
//!         {"path": "gender", "name": "gender"}
//!     ]}]
//! })).unwrap();
//!
//! let plan = compile(&view).unwrap();
//! let materializer = Materializer::new(plan.clone());
//! let rows = materializer.materialize(&json!({
//!     "resourceType": "Patient", "id": "1", "gender": "male"
//! }));
//! assert_eq!(rows.len(), 1);
//! assert_eq!(rows[0].values, vec![Some(json!("1")), Some(json!("male"))]);
//! ```

pub mod binding;
pub mod compiler;
pub mod error;
pub mod materializer;
pub mod model;
pub mod plan;

pub use binding::PathBinding;
pub use compiler::compile;
pub use error::ViewError;
pub use materializer::{Materialized, Materializer, Row};
pub use model::ViewDefinition;
pub use plan::{Branch, BranchKind, Column, Constant, Plan};
