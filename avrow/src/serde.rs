//! The row codec a host engine plugs in to read and write Avro-backed tables.
//!
//! [`AvroSerde::configure`] only records the table's properties. The schema is resolved and the
//! columns derived on the first call that needs them, so a host can construct and configure a
//! codec for passive introspection without touching the schema's location.

use std::any::type_name;
use std::sync::Arc;

use apache_avro::Schema;
use arrow_array::RecordBatch;
use arrow_schema::SchemaRef;
use avrow_error::{AvrowResult, SerdeResultExt, avrow_err};

use crate::columns::ColumnMetadata;
use crate::context::RuntimeContext;
use crate::convert::{AvroDeserializer, AvroSerializer};
use crate::properties::TableProperties;
use crate::record::AvroRecord;
use crate::resolve::resolve_schema;

/// A pluggable codec between a host engine's Arrow rows and an encoded row type.
pub trait RowSerde {
    /// The carrier of one encoded row through the host's pipeline.
    type Encoded;

    /// Accept a new configuration, discarding anything derived from the previous one.
    fn configure(
        &mut self,
        context: RuntimeContext,
        properties: TableProperties,
    ) -> AvrowResult<()>;

    /// A fixed identifier of [`Self::Encoded`]. Available in any state.
    fn serialized_type(&self) -> &'static str {
        type_name::<Self::Encoded>()
    }

    /// Encode every row of `batch`.
    fn serialize(&mut self, batch: &RecordBatch) -> AvrowResult<Vec<Self::Encoded>>;

    /// Decode `encoded` rows into a single batch.
    fn deserialize(&mut self, encoded: &[Self::Encoded]) -> AvrowResult<RecordBatch>;

    /// The shape of the rows produced by [`Self::deserialize`] and accepted by
    /// [`Self::serialize`].
    fn row_schema(&mut self) -> AvrowResult<SchemaRef>;
}

#[derive(Debug)]
struct Resolved {
    schema: Arc<Schema>,
    columns: ColumnMetadata,
}

#[derive(Debug, Default)]
enum SerdeState {
    #[default]
    Stale,
    Ready(Arc<Resolved>),
}

/// [`RowSerde`] for tables stored as Avro records.
///
/// Not synchronized: a host sharing one table across threads gives each thread its own codec.
#[derive(Debug, Default)]
pub struct AvroSerde {
    context: RuntimeContext,
    properties: Option<TableProperties>,
    state: SerdeState,
    serializer: Option<AvroSerializer>,
    deserializer: Option<AvroDeserializer>,
}

impl AvroSerde {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the schema has been resolved since the last [`RowSerde::configure`].
    pub fn is_ready(&self) -> bool {
        matches!(self.state, SerdeState::Ready(_))
    }

    /// The resolved table schema.
    pub fn schema(&mut self) -> AvrowResult<Arc<Schema>> {
        Ok(self.ensure_ready()?.schema.clone())
    }

    /// The names and types of the table's columns.
    pub fn columns(&mut self) -> AvrowResult<ColumnMetadata> {
        Ok(self.ensure_ready()?.columns.clone())
    }

    fn ensure_ready(&mut self) -> AvrowResult<Arc<Resolved>> {
        if let SerdeState::Ready(resolved) = &self.state {
            return Ok(resolved.clone());
        }
        let resolved = Arc::new(self.resolve().serde_context("Unable to initialize Avro serde")?);
        self.state = SerdeState::Ready(resolved.clone());
        Ok(resolved)
    }

    fn resolve(&self) -> AvrowResult<Resolved> {
        let properties = self.properties.as_ref().ok_or_else(|| {
            avrow_err!(Configuration: "Properties from which to obtain schema cannot be null")
        })?;
        let schema = resolve_schema(properties, &self.context)?;
        let columns = ColumnMetadata::try_from_avro(&schema)?;
        log::debug!(
            "Resolved Avro table with columns [{}]",
            columns.names().join(", ")
        );
        Ok(Resolved {
            schema: Arc::new(schema),
            columns,
        })
    }
}

impl RowSerde for AvroSerde {
    type Encoded = AvroRecord;

    fn configure(
        &mut self,
        context: RuntimeContext,
        properties: TableProperties,
    ) -> AvrowResult<()> {
        log::debug!("Configuring Avro serde with {} properties", properties.len());
        self.context = context;
        self.properties = Some(properties);
        self.state = SerdeState::Stale;
        Ok(())
    }

    fn serialize(&mut self, batch: &RecordBatch) -> AvrowResult<Vec<AvroRecord>> {
        let resolved = self.ensure_ready()?;
        self.serializer
            .get_or_insert_with(AvroSerializer::new)
            .serialize(batch, &batch.schema(), &resolved.columns, &resolved.schema)
            .serde_context("Unable to serialize record batch")
    }

    fn deserialize(&mut self, encoded: &[AvroRecord]) -> AvrowResult<RecordBatch> {
        let resolved = self.ensure_ready()?;
        self.deserializer
            .get_or_insert_with(AvroDeserializer::new)
            .deserialize(&resolved.columns, encoded, &resolved.schema)
            .serde_context("Unable to deserialize Avro records")
    }

    fn row_schema(&mut self) -> AvrowResult<SchemaRef> {
        Ok(self.ensure_ready()?.columns.row_schema().clone())
    }
}

#[cfg(test)]
mod tests {
    use avrow_error::AvrowError;

    use super::*;
    use crate::properties::SCHEMA_LITERAL;

    #[test]
    fn unconfigured_is_serde_configuration_error() {
        let mut serde = AvroSerde::new();
        let err = serde.row_schema().unwrap_err();
        assert!(matches!(err, AvrowError::Serde(..)));
        assert!(matches!(err.root_cause(), AvrowError::Configuration(..)));
        assert!(!serde.is_ready());
    }

    #[test]
    fn serialized_type_needs_no_configuration() {
        assert!(AvroSerde::new().serialized_type().ends_with("AvroRecord"));
    }

    #[test]
    fn configure_resets_state() {
        let mut serde = AvroSerde::new();
        serde
            .configure(
                RuntimeContext::new(),
                TableProperties::new().with(
                    SCHEMA_LITERAL,
                    r#"{"type": "record", "name": "A", "fields": [{"name": "x", "type": "int"}]}"#,
                ),
            )
            .unwrap();
        assert!(!serde.is_ready());
        serde.row_schema().unwrap();
        assert!(serde.is_ready());

        serde
            .configure(RuntimeContext::new(), TableProperties::new())
            .unwrap();
        assert!(!serde.is_ready());
    }
}
