use std::borrow::Cow;
use std::sync::Arc;

use apache_avro::Schema;
use apache_avro::types::Value;
use arrow_array::cast::AsArray;
use arrow_array::{
    ArrayRef, BinaryArray, BooleanArray, Date32Array, FixedSizeBinaryArray, Float32Array,
    Float64Array, Int32Array, Int64Array, ListArray, MapArray, NullArray, RecordBatch,
    RecordBatchOptions, StringArray, StructArray, Time32MillisecondArray, Time64MicrosecondArray,
    TimestampMicrosecondArray, TimestampMillisecondArray, UnionArray,
};
use arrow_buffer::{NullBuffer, OffsetBuffer, ScalarBuffer};
use arrow_schema::{DataType, TimeUnit, UnionMode};
use avrow_error::{AvrowResult, avrow_bail, avrow_err};
use itertools::Itertools;

use super::value_kind;
use crate::columns::{ColumnMetadata, NamedTypes};
use crate::nullable::{is_optional, unwrap_optional};
use crate::record::AvroRecord;

/// Converts Avro records into Arrow record batches.
///
/// Holds no per-record state, a single instance can be reused for any number of calls.
#[derive(Debug, Default)]
pub struct AvroDeserializer;

impl AvroDeserializer {
    pub fn new() -> Self {
        Self
    }

    /// Convert `records` into a batch of rows shaped like `columns`.
    ///
    /// Records written with a schema other than the table `schema` are first resolved against it
    /// using Avro's schema resolution rules, filling in defaults for fields they lack.
    pub fn deserialize(
        &self,
        columns: &ColumnMetadata,
        records: &[AvroRecord],
        schema: &Arc<Schema>,
    ) -> AvrowResult<RecordBatch> {
        let values = records
            .iter()
            .map(|record| {
                if Arc::ptr_eq(record.schema(), schema) || record.schema() == schema {
                    Ok(Cow::Borrowed(record.value()))
                } else {
                    log::trace!("Resolving record written with a different schema");
                    Ok(Cow::Owned(record.value().clone().resolve(schema)?))
                }
            })
            .collect::<AvrowResult<Vec<_>>>()?;

        let row_type = DataType::Struct(columns.row_schema().fields().clone());
        let rows = values.iter().map(|v| Some(v.as_ref())).collect::<Vec<_>>();
        let decoder = ArrowDecoder {
            named: NamedTypes::try_new(schema)?,
        };
        let array = decoder.array(schema, &row_type, &rows)?;

        Ok(RecordBatch::try_new_with_options(
            columns.row_schema().clone(),
            array.as_struct().columns().to_vec(),
            &RecordBatchOptions::new().with_row_count(Some(records.len())),
        )?)
    }
}

struct ArrowDecoder<'a> {
    named: NamedTypes<'a>,
}

impl<'a> ArrowDecoder<'a> {
    /// Build an array of `data_type` from the values found at a position typed by `schema`.
    ///
    /// `None` marks a slot whose parent is null.
    fn array(
        &self,
        schema: &'a Schema,
        data_type: &DataType,
        values: &[Option<&Value>],
    ) -> AvrowResult<ArrayRef> {
        let optional = is_optional(schema);
        let values = values
            .iter()
            .map(|v| v.and_then(|v| unwrap_value(v, optional)))
            .collect::<Vec<_>>();
        let schema = self.named.resolve(if optional {
            unwrap_optional(schema)
        } else {
            schema
        })?;

        let array: ArrayRef = match data_type {
            DataType::Null => Arc::new(NullArray::new(values.len())),
            DataType::Boolean => Arc::new(BooleanArray::from(collect(&values, "boolean", |v| {
                match v {
                    Value::Boolean(b) => Some(*b),
                    _ => None,
                }
            })?)),
            DataType::Int32 => Arc::new(Int32Array::from(collect(&values, "int", |v| match v {
                Value::Int(i) => Some(*i),
                _ => None,
            })?)),
            DataType::Int64 => Arc::new(Int64Array::from(collect(&values, "long", |v| match v {
                Value::Long(i) => Some(*i),
                _ => None,
            })?)),
            DataType::Float32 => Arc::new(Float32Array::from(collect(&values, "float", |v| {
                match v {
                    Value::Float(f) => Some(*f),
                    _ => None,
                }
            })?)),
            DataType::Float64 => Arc::new(Float64Array::from(collect(&values, "double", |v| {
                match v {
                    Value::Double(f) => Some(*f),
                    _ => None,
                }
            })?)),
            DataType::Binary => Arc::new(BinaryArray::from_opt_vec(collect(
                &values,
                "bytes",
                |v| match v {
                    Value::Bytes(b) => Some(b.as_slice()),
                    _ => None,
                },
            )?)),
            DataType::Utf8 => Arc::new(StringArray::from(collect(&values, "string", |v| {
                match v {
                    Value::String(s) | Value::Enum(_, s) => Some(s.as_str()),
                    _ => None,
                }
            })?)),
            DataType::FixedSizeBinary(size) => {
                let bytes = collect(&values, "fixed", |v| match v {
                    Value::Fixed(_, b) => Some(b.as_slice()),
                    _ => None,
                })?;
                Arc::new(FixedSizeBinaryArray::try_from_sparse_iter_with_size(
                    bytes.into_iter(),
                    *size,
                )?)
            }
            DataType::Date32 => Arc::new(Date32Array::from(collect(&values, "date", |v| {
                match v {
                    Value::Date(d) => Some(*d),
                    _ => None,
                }
            })?)),
            DataType::Time32(TimeUnit::Millisecond) => Arc::new(Time32MillisecondArray::from(
                collect(&values, "time-millis", |v| match v {
                    Value::TimeMillis(t) => Some(*t),
                    _ => None,
                })?,
            )),
            DataType::Time64(TimeUnit::Microsecond) => Arc::new(Time64MicrosecondArray::from(
                collect(&values, "time-micros", |v| match v {
                    Value::TimeMicros(t) => Some(*t),
                    _ => None,
                })?,
            )),
            DataType::Timestamp(TimeUnit::Millisecond, tz) => Arc::new(
                TimestampMillisecondArray::from(collect(&values, "timestamp-millis", |v| {
                    match v {
                        Value::TimestampMillis(t) | Value::LocalTimestampMillis(t) => Some(*t),
                        _ => None,
                    }
                })?)
                .with_timezone_opt(tz.clone()),
            ),
            DataType::Timestamp(TimeUnit::Microsecond, tz) => Arc::new(
                TimestampMicrosecondArray::from(collect(&values, "timestamp-micros", |v| {
                    match v {
                        Value::TimestampMicros(t) | Value::LocalTimestampMicros(t) => Some(*t),
                        _ => None,
                    }
                })?)
                .with_timezone_opt(tz.clone()),
            ),
            DataType::List(field) => {
                let Schema::Array(array) = schema else {
                    avrow_bail!("Arrow list column requires an Avro array schema");
                };
                let mut lengths = Vec::with_capacity(values.len());
                let mut validity = Vec::with_capacity(values.len());
                let mut items = Vec::new();
                for value in &values {
                    match value {
                        None => {
                            lengths.push(0);
                            validity.push(false);
                        }
                        Some(Value::Array(elements)) => {
                            lengths.push(elements.len());
                            validity.push(true);
                            items.extend(elements.iter().map(Some));
                        }
                        Some(other) => avrow_bail!("Expected Avro array, found {}", value_kind(other)),
                    }
                }
                let child = self.array(&array.items, field.data_type(), &items)?;
                Arc::new(ListArray::try_new(
                    field.clone(),
                    OffsetBuffer::from_lengths(lengths),
                    child,
                    null_buffer(validity),
                )?)
            }
            DataType::Map(entries_field, ordered) => {
                let Schema::Map(map) = schema else {
                    avrow_bail!("Arrow map column requires an Avro map schema");
                };
                let DataType::Struct(entry_fields) = entries_field.data_type() else {
                    avrow_bail!("Arrow map entries must be a struct");
                };
                let mut lengths = Vec::with_capacity(values.len());
                let mut validity = Vec::with_capacity(values.len());
                let mut keys = Vec::new();
                let mut items = Vec::new();
                for value in &values {
                    match value {
                        None => {
                            lengths.push(0);
                            validity.push(false);
                        }
                        Some(Value::Map(entries)) => {
                            let mut entries = entries.iter().collect::<Vec<_>>();
                            entries.sort_unstable_by_key(|(k, _)| *k);
                            lengths.push(entries.len());
                            validity.push(true);
                            for (k, v) in entries {
                                keys.push(k.as_str());
                                items.push(Some(v));
                            }
                        }
                        Some(other) => avrow_bail!("Expected Avro map, found {}", value_kind(other)),
                    }
                }
                let value_type = entry_fields
                    .get(1)
                    .ok_or_else(|| avrow_err!("Arrow map entries must have a value field"))?
                    .data_type();
                let entries = StructArray::try_new(
                    entry_fields.clone(),
                    vec![
                        Arc::new(StringArray::from(keys)) as ArrayRef,
                        self.array(&map.types, value_type, &items)?,
                    ],
                    None,
                )?;
                Arc::new(MapArray::try_new(
                    entries_field.clone(),
                    OffsetBuffer::from_lengths(lengths),
                    entries,
                    null_buffer(validity),
                    *ordered,
                )?)
            }
            DataType::Struct(fields) => {
                let Schema::Record(record) = schema else {
                    avrow_bail!("Arrow struct column requires an Avro record schema");
                };
                if record.fields.len() != fields.len() {
                    avrow_bail!(
                        "Avro record {} has {} fields, expected {}",
                        record.name.fullname(None),
                        record.fields.len(),
                        fields.len()
                    );
                }
                let mut validity = Vec::with_capacity(values.len());
                let rows = values
                    .iter()
                    .map(|value| match value {
                        None => {
                            validity.push(false);
                            Ok(None)
                        }
                        Some(Value::Record(row)) if row.len() == fields.len() => {
                            validity.push(true);
                            Ok(Some(row.as_slice()))
                        }
                        Some(other) => Err(avrow_err!(
                            "Expected Avro record with {} fields, found {}",
                            fields.len(),
                            value_kind(other)
                        )),
                    })
                    .collect::<AvrowResult<Vec<_>>>()?;
                let children = record
                    .fields
                    .iter()
                    .zip_eq(fields.iter())
                    .map(|(avro_field, arrow_field)| {
                        // Fields are matched by name, record values need not be in schema order.
                        let column = rows
                            .iter()
                            .map(|row| {
                                row.map(|row| {
                                    row.iter()
                                        .find(|(name, _)| name == &avro_field.name)
                                        .map(|(_, value)| value)
                                        .ok_or_else(|| {
                                            avrow_err!(
                                                "Avro record {} value has no field {}",
                                                record.name.fullname(None),
                                                avro_field.name
                                            )
                                        })
                                })
                                .transpose()
                            })
                            .collect::<AvrowResult<Vec<_>>>()?;
                        self.array(&avro_field.schema, arrow_field.data_type(), &column)
                    })
                    .collect::<AvrowResult<Vec<_>>>()?;
                Arc::new(StructArray::try_new(
                    fields.clone(),
                    children,
                    null_buffer(validity),
                )?)
            }
            DataType::Union(union_fields, UnionMode::Dense) => {
                let Schema::Union(union) = schema else {
                    avrow_bail!("Arrow union column requires an Avro union schema");
                };
                let variants = union.variants();
                let mut type_ids = Vec::with_capacity(values.len());
                let mut offsets = Vec::with_capacity(values.len());
                let mut branches = vec![Vec::new(); variants.len()];
                for value in &values {
                    // A slot under a null parent is stored as a null in the first branch.
                    let (branch, inner) = match value {
                        None => (0, None),
                        Some(Value::Union(idx, inner)) => (
                            usize::try_from(*idx)
                                .map_err(|_| avrow_err!("Union branch {idx} out of range"))?,
                            Some(inner.as_ref()),
                        ),
                        Some(other) => avrow_bail!("Expected Avro union, found {}", value_kind(other)),
                    };
                    let children = branches
                        .get_mut(branch)
                        .ok_or_else(|| avrow_err!("Union branch {branch} out of range"))?;
                    type_ids.push(
                        i8::try_from(branch)
                            .map_err(|_| avrow_err!("Union branch {branch} out of range"))?,
                    );
                    offsets.push(
                        i32::try_from(children.len())
                            .map_err(|_| avrow_err!("Too many values in union branch {branch}"))?,
                    );
                    children.push(inner);
                }
                let children = union_fields
                    .iter()
                    .zip(variants)
                    .zip(&branches)
                    .map(|(((_, field), variant), values)| {
                        self.array(variant, field.data_type(), values)
                    })
                    .collect::<AvrowResult<Vec<_>>>()?;
                Arc::new(UnionArray::try_new(
                    union_fields.clone(),
                    ScalarBuffer::from(type_ids),
                    Some(ScalarBuffer::from(offsets)),
                    children,
                )?)
            }
            other => avrow_bail!(Unsupported: "Cannot decode Avro values into Arrow {other}"),
        };
        Ok(array)
    }
}

/// Strip the optional-union wrapper from a value; `None` stands for null.
fn unwrap_value(value: &Value, optional: bool) -> Option<&Value> {
    match value {
        Value::Null => None,
        Value::Union(_, inner) if optional => match inner.as_ref() {
            Value::Null => None,
            inner => Some(inner),
        },
        other => Some(other),
    }
}

fn collect<'v, T>(
    values: &[Option<&'v Value>],
    expected: &str,
    extract: impl Fn(&'v Value) -> Option<T>,
) -> AvrowResult<Vec<Option<T>>> {
    values
        .iter()
        .map(|value| match value {
            None => Ok(None),
            Some(v) => extract(v).map(Some).ok_or_else(|| {
                avrow_err!("Expected Avro {expected} value, found {}", value_kind(v))
            }),
        })
        .collect()
}

fn null_buffer(validity: Vec<bool>) -> Option<NullBuffer> {
    validity
        .iter()
        .any(|valid| !valid)
        .then(|| NullBuffer::from(validity))
}
