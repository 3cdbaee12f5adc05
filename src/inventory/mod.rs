//! Machine inventory
//!
//! Turns the requested services into a Resource Graph query and the query
//! rows into agent sections.
//!
//! # Module Structure
//!
//! - [`query`] - Service selection and the four query templates
//! - [`model`] - Query rows and the per-host machine view
//! - [`aggregate`] - Folding rows into one entry per machine name
//! - [`output`] - Rendering host blocks and sections

pub mod aggregate;
pub mod model;
pub mod output;
pub mod query;

pub use aggregate::{aggregate, MachineMap};
pub use model::{AggregatedMachine, Extension, MachineRow};
pub use output::{format_sections, write_sections, OutputError};
pub use query::{QueryScope, QueryVariant, ResourceGraphRequest, Service, ServiceSelector};
