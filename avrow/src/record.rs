use std::sync::Arc;

use apache_avro::types::Value;
use apache_avro::{Schema, from_avro_datum, to_avro_datum};
use avrow_error::{AvrowResult, avrow_bail};

/// An Avro record travelling through a host pipeline, together with the schema it was written
/// with.
///
/// The record may have been written with an older or newer version of a table's schema; it is
/// resolved against the table schema when deserialized.
#[derive(Debug, Clone, PartialEq)]
pub struct AvroRecord {
    value: Value,
    schema: Arc<Schema>,
}

impl AvroRecord {
    /// Wrap a record value written with `schema`.
    pub fn try_new(value: Value, schema: Arc<Schema>) -> AvrowResult<Self> {
        if !matches!(value, Value::Record(_)) {
            avrow_bail!("AvroRecord can only hold record values");
        }
        Ok(Self { value, schema })
    }

    /// Decode a record from its Avro binary encoding.
    pub fn from_bytes(schema: Arc<Schema>, mut bytes: &[u8]) -> AvrowResult<Self> {
        let value = from_avro_datum(&schema, &mut bytes, None)?;
        Self::try_new(value, schema)
    }

    /// The Avro binary encoding of the record, without any header or schema.
    pub fn to_bytes(&self) -> AvrowResult<Vec<u8>> {
        Ok(to_avro_datum(&self.schema, self.value.clone())?)
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    /// The schema the record was written with.
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn into_value(self) -> Value {
        self.value
    }
}
