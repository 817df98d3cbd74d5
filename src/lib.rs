//! Core library for the teaching-catalog command line application.
//!
//! The catalog of instructors, modules, and module software lives in a YAML
//! store and is exchanged with people through an Excel workbook. Data
//! representations live in [`model`], structural checks in [`validate`], the
//! row-oriented exchange records in [`records`], persistence in [`store`], and
//! the all-or-nothing import in [`reconcile`]. The spreadsheet adapters sit
//! under [`io`] and [`flatten`], and [`sync`] wires them together.

pub mod audit;
pub mod error;
pub mod flatten;
pub mod io;
pub mod live;
pub mod logging;
pub mod model;
pub mod reconcile;
pub mod records;
pub mod report;
pub mod store;
pub mod sync;
pub mod validate;

pub use error::{CatalogError, Result};
pub use live::LiveCatalog;
pub use model::{Catalog, EntityKind, Instructor, Module, Software};
pub use reconcile::{Reconciler, ReloadSignal};
pub use records::{InstructorRow, ModuleRow, RowSet, SoftwareRow, export_rows};
pub use store::{StoreOptions, YamlStore};
pub use validate::{IssueKind, ValidationIssue, validate};
