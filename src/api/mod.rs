//! Purpose: Define the stable public Rust API boundary for recfile.
//! Exports: Schema, record, container and export types needed by the CLI and callers.
//! Role: Public, additive-only surface over the core modules.
//! Invariants: Wire-level helpers (header and frame codecs) stay out of this surface.

#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::error::{Error, ErrorKind, FieldError, FormatError, SchemaError};
pub use crate::core::field::FieldDescriptor;
pub use crate::core::field_type::{FieldType, is_binary, is_float};
pub use crate::core::reader::ContainerReader;
pub use crate::core::record::RecordBuffer;
pub use crate::core::schema::Schema;
pub use crate::core::value::Value;
pub use crate::core::writer::ContainerWriter;
pub use crate::csv::{CsvExporter, ExportOptions, ExportState, export_container};
