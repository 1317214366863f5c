//! Listdata – list style input data for groundwater flow models.
//!
//! List data are sparse, row oriented datasets such as boundary condition
//! records. Every row is a [`datatype::Row`] of typed values whose columns are
//! not known at compile time: they follow from a [`structure::DatasetStructure`]
//! describing the fields of the dataset, resolved at run time against the
//! package (auxiliary variables, boundnames, named dimensions) and the model grid.
//!
//! ## Modules
//! * [`structure`] – Field descriptors, resolved columns and the schema repository.
//! * [`datatype`] – Values, cellids and their text forms.
//! * [`storage`] – The storage backing of one container: inline rows, a
//!   constant or an external file, plus the comments attached to them.
//! * [`list`] – The single-period container with its set, append, search,
//!   export and load operations.
//! * [`transient`] – One container per stress period.
//! * [`codec`] – The record encoder that writes one row as one line.
//! * [`reader`] – The line reader (grammar in `list.pest`) decoding lines back into rows.
//! * [`validate`] – Cellid checks against grid bounds and the active domain.
//! * [`array`] – Dense, grid shaped arrays built from list data.
//! * [`grid`], [`context`], [`config`] – What a dataset knows about its
//!   surroundings and how it formats text.
//!
//! ## Quick Start
//! ```
//! use std::sync::Arc;
//! use listdata::config::Settings;
//! use listdata::context::ModelContext;
//! use listdata::datatype::{CellId, Value};
//! use listdata::grid::StructuredGrid;
//! use listdata::list::DataList;
//! use listdata::structure::{DatasetStructure, FieldDescriptor};
//!
//! let structure = DatasetStructure::new(
//!     "wel",
//!     "stress_period_data",
//!     vec![FieldDescriptor::cellid("cellid"), FieldDescriptor::double("q")],
//! );
//! let context = ModelContext::new(Settings::default()).with_model("gwf", Arc::new(StructuredGrid::dis(1, 1, 1)));
//! let mut wel = DataList::new(Arc::new(structure), Arc::new(context));
//! wel.set_data(vec![vec![Value::CellId(CellId::from([0, 0, 0])), Value::Double(5.0)]], false, true).unwrap();
//! assert_eq!(wel.get_file_entry(false).unwrap(), "  0 0 0  5.0\n");
//! ```
//!
//! ## Logging
//! Operations emit `tracing` events; install a subscriber (as the `listdata`
//! binary does) to see them.

pub mod array;
pub mod codec;
pub mod config;
pub mod context;
pub mod datatype;
pub mod error;
pub mod grid;
pub mod list;
pub mod reader;
pub mod storage;
pub mod structure;
pub mod transient;
pub mod validate;

pub use error::{ListError, Result};
