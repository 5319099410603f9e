use std::any::type_name;
use std::collections::HashMap;
use std::sync::Arc;

use apache_avro::Schema;
use apache_avro::types::Value;
use arrow_array::{
    Array, BinaryArray, BooleanArray, Date32Array, FixedSizeBinaryArray, Float32Array,
    Float64Array, Int32Array, Int64Array, ListArray, MapArray, RecordBatch, StringArray,
    StructArray, Time32MillisecondArray, Time64MicrosecondArray, TimestampMicrosecondArray,
    TimestampMillisecondArray, UnionArray,
};
use arrow_schema::SchemaRef;
use avrow_error::{AvrowResult, avrow_bail, avrow_err};
use itertools::Itertools;

use crate::columns::{ColumnMetadata, NamedTypes};
use crate::nullable::{is_optional, null_branch, unwrap_optional};
use crate::record::AvroRecord;

/// Converts Arrow record batches into Avro records.
#[derive(Debug, Default)]
pub struct AvroSerializer;

impl AvroSerializer {
    pub fn new() -> Self {
        Self
    }

    /// Convert every row of `batch`, described by `shape`, into a record of the table `schema`.
    ///
    /// The shape must have exactly the derived `columns`, with matching types.
    pub fn serialize(
        &self,
        batch: &RecordBatch,
        shape: &SchemaRef,
        columns: &ColumnMetadata,
        schema: &Arc<Schema>,
    ) -> AvrowResult<Vec<AvroRecord>> {
        check_shape(shape, columns)?;
        if batch.num_columns() != shape.fields().len() {
            avrow_bail!(
                "Record batch has {} columns, its shape describes {}",
                batch.num_columns(),
                shape.fields().len()
            );
        }
        let Schema::Record(record) = schema.as_ref() else {
            avrow_bail!("Schema for table must be of type record");
        };

        let encoder = AvroEncoder {
            named: NamedTypes::try_new(schema)?,
        };
        (0..batch.num_rows())
            .map(|row| {
                let fields = record
                    .fields
                    .iter()
                    .zip(batch.columns())
                    .map(|(field, column)| {
                        Ok((
                            field.name.clone(),
                            encoder.value(&field.schema, column.as_ref(), row)?,
                        ))
                    })
                    .collect::<AvrowResult<Vec<_>>>()?;
                AvroRecord::try_new(Value::Record(fields), schema.clone())
            })
            .collect()
    }
}

fn check_shape(shape: &SchemaRef, columns: &ColumnMetadata) -> AvrowResult<()> {
    if shape.fields().len() != columns.len() {
        avrow_bail!(
            "Expected {} columns, found {}",
            columns.len(),
            shape.fields().len()
        );
    }
    for ((field, name), expected) in shape
        .fields()
        .iter()
        .zip_eq(columns.names())
        .zip_eq(columns.types())
    {
        if !field.data_type().equals_datatype(expected) {
            avrow_bail!(
                "Column {name} has type {}, expected {expected}",
                field.data_type()
            );
        }
    }
    Ok(())
}

struct AvroEncoder<'a> {
    named: NamedTypes<'a>,
}

impl<'a> AvroEncoder<'a> {
    /// The Avro value of `array[row]`, typed by `schema`.
    fn value(&self, schema: &'a Schema, array: &dyn Array, row: usize) -> AvrowResult<Value> {
        if is_optional(schema) {
            let null = null_branch(schema)
                .ok_or_else(|| avrow_err!("Optional union without a null branch"))?;
            return Ok(if array.is_null(row) {
                Value::Union(null, Box::new(Value::Null))
            } else {
                Value::Union(
                    1 - null,
                    Box::new(self.value(unwrap_optional(schema), array, row)?),
                )
            });
        }

        let schema = self.named.resolve(schema)?;
        if matches!(schema, Schema::Null) {
            return Ok(Value::Null);
        }
        if array.is_null(row) {
            avrow_bail!(
                "Null value for non-nullable Avro {}",
                schema.canonical_form()
            );
        }

        Ok(match schema {
            Schema::Boolean => Value::Boolean(downcast::<BooleanArray>(array)?.value(row)),
            Schema::Int => Value::Int(downcast::<Int32Array>(array)?.value(row)),
            Schema::Long => Value::Long(downcast::<Int64Array>(array)?.value(row)),
            Schema::Float => Value::Float(downcast::<Float32Array>(array)?.value(row)),
            Schema::Double => Value::Double(downcast::<Float64Array>(array)?.value(row)),
            Schema::Bytes => Value::Bytes(downcast::<BinaryArray>(array)?.value(row).to_vec()),
            Schema::String => Value::String(downcast::<StringArray>(array)?.value(row).to_string()),
            Schema::Enum(enum_schema) => {
                let symbol = downcast::<StringArray>(array)?.value(row);
                let position = enum_schema
                    .symbols
                    .iter()
                    .position(|s| s == symbol)
                    .ok_or_else(|| {
                        avrow_err!(
                            "{symbol} is not a symbol of Avro enum {}",
                            enum_schema.name.fullname(None)
                        )
                    })?;
                Value::Enum(
                    u32::try_from(position)
                        .map_err(|_| avrow_err!("Enum symbol position {position} out of range"))?,
                    symbol.to_string(),
                )
            }
            Schema::Fixed(fixed) => {
                let bytes = downcast::<FixedSizeBinaryArray>(array)?.value(row);
                if bytes.len() != fixed.size {
                    avrow_bail!(
                        "Avro fixed {} holds {} bytes, found {}",
                        fixed.name.fullname(None),
                        fixed.size,
                        bytes.len()
                    );
                }
                Value::Fixed(fixed.size, bytes.to_vec())
            }
            Schema::Date => Value::Date(downcast::<Date32Array>(array)?.value(row)),
            Schema::TimeMillis => {
                Value::TimeMillis(downcast::<Time32MillisecondArray>(array)?.value(row))
            }
            Schema::TimeMicros => {
                Value::TimeMicros(downcast::<Time64MicrosecondArray>(array)?.value(row))
            }
            Schema::TimestampMillis => {
                Value::TimestampMillis(downcast::<TimestampMillisecondArray>(array)?.value(row))
            }
            Schema::TimestampMicros => {
                Value::TimestampMicros(downcast::<TimestampMicrosecondArray>(array)?.value(row))
            }
            Schema::LocalTimestampMillis => Value::LocalTimestampMillis(
                downcast::<TimestampMillisecondArray>(array)?.value(row),
            ),
            Schema::LocalTimestampMicros => Value::LocalTimestampMicros(
                downcast::<TimestampMicrosecondArray>(array)?.value(row),
            ),
            Schema::Array(items) => {
                let elements = downcast::<ListArray>(array)?.value(row);
                Value::Array(
                    (0..elements.len())
                        .map(|idx| self.value(&items.items, elements.as_ref(), idx))
                        .collect::<AvrowResult<Vec<_>>>()?,
                )
            }
            Schema::Map(map) => {
                let entries = downcast::<MapArray>(array)?.value(row);
                let keys = downcast::<StringArray>(entries.column(0).as_ref())?;
                let values = entries.column(1);
                Value::Map(
                    (0..entries.len())
                        .map(|idx| {
                            Ok((
                                keys.value(idx).to_string(),
                                self.value(&map.types, values.as_ref(), idx)?,
                            ))
                        })
                        .collect::<AvrowResult<HashMap<_, _>>>()?,
                )
            }
            Schema::Record(record) => {
                let fields = downcast::<StructArray>(array)?;
                if fields.num_columns() != record.fields.len() {
                    avrow_bail!(
                        "Avro record {} has {} fields, found {} columns",
                        record.name.fullname(None),
                        record.fields.len(),
                        fields.num_columns()
                    );
                }
                Value::Record(
                    record
                        .fields
                        .iter()
                        .zip_eq(fields.columns())
                        .map(|(field, column)| {
                            Ok((
                                field.name.clone(),
                                self.value(&field.schema, column.as_ref(), row)?,
                            ))
                        })
                        .collect::<AvrowResult<Vec<_>>>()?,
                )
            }
            Schema::Union(union) => {
                let union_array = downcast::<UnionArray>(array)?;
                let type_id = union_array.type_id(row);
                let branch = usize::try_from(type_id)
                    .map_err(|_| avrow_err!("Negative union type id {type_id}"))?;
                let variant = union
                    .variants()
                    .get(branch)
                    .ok_or_else(|| avrow_err!("Union branch {branch} out of range"))?;
                let inner = self.value(
                    variant,
                    union_array.child(type_id).as_ref(),
                    union_array.value_offset(row),
                )?;
                Value::Union(
                    u32::try_from(branch)
                        .map_err(|_| avrow_err!("Union branch {branch} out of range"))?,
                    Box::new(inner),
                )
            }
            other => avrow_bail!(Unsupported:
                "Cannot encode Avro {}",
                other.canonical_form()
            ),
        })
    }
}

fn downcast<T: Array + 'static>(array: &dyn Array) -> AvrowResult<&T> {
    array.as_any().downcast_ref::<T>().ok_or_else(|| {
        avrow_err!(
            "Cannot encode Arrow {} as {}",
            array.data_type(),
            type_name::<T>()
        )
    })
}
