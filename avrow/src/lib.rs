//! Read and write Avro records as Arrow rows.
//!
//! A table's Avro schema is taken from its [`TableProperties`], either inline or from a
//! location, and presented to a host engine as an Arrow [`SchemaRef`](arrow_schema::SchemaRef).
//! [`AvroSerde`] converts between Arrow [`RecordBatch`](arrow_array::RecordBatch)es and
//! [`AvroRecord`]s, resolving the schema lazily on first use.

pub use avrow_error as error;
pub use columns::*;
pub use context::*;
pub use convert::*;
pub use nullable::*;
pub use properties::*;
pub use record::*;
pub use resolve::*;
pub use serde::*;

mod columns;
mod context;
mod convert;
mod nullable;
mod properties;
mod record;
mod resolve;
mod serde;
