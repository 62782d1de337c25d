//! Purpose: Typed binary record container library used by the `recfile` CLI and tests.
//! Exports: `core` (format, schema, records, writer/reader, errors), `api`, `csv`.
//! Role: Engine plus CSV exporter; `api` is the stable path for downstream callers.
//! Invariants: Records are encoded only through schema field descriptors.
//! Invariants: Core modules prefer explicit inputs/outputs over hidden state.
pub mod api;
pub mod core;
pub mod csv;
