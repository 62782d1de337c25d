// Core modules implementing the container format, record encoding, and error modeling.
pub mod error;
pub mod field;
pub mod field_type;
pub mod format;
pub mod frame;
pub mod reader;
pub mod record;
pub mod schema;
pub mod value;
pub mod writer;
