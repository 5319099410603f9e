use std::collections::HashMap;
use std::sync::Arc;

use apache_avro::Schema;
use apache_avro::schema::{Name, ResolvedSchema};
use arrow_schema::{
    DataType, Field, Fields, Schema as ArrowSchema, SchemaRef, TimeUnit, UnionFields, UnionMode,
};
use avrow_error::{AvrowResult, avrow_bail, avrow_err};

use crate::nullable::{is_optional, unwrap_optional};

/// Timezone attached to Avro `timestamp-*` columns, which always denote UTC instants.
pub const UTC: &str = "+00:00";

/// Name of the Arrow map entry struct.
pub const MAP_ENTRIES: &str = "entries";
/// Name of the Arrow map key field.
pub const MAP_KEYS: &str = "keys";
/// Name of the Arrow map value field.
pub const MAP_VALUES: &str = "values";

/// Arrow unions address their children with an `i8` type id.
const MAX_UNION_BRANCHES: usize = i8::MAX as usize;

/// The columns of a table, derived from the table's Avro record schema.
///
/// Names and types are index-aligned and describe the same fields as [`Self::row_schema`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMetadata {
    names: Vec<String>,
    types: Vec<DataType>,
    row_schema: SchemaRef,
}

impl ColumnMetadata {
    /// Derive the columns of a table from its Avro schema, which must be a record.
    pub fn try_from_avro(schema: &Schema) -> AvrowResult<Self> {
        let Schema::Record(record) = schema else {
            avrow_bail!(
                "Schema for table must be of type record, found {}",
                schema.canonical_form()
            );
        };

        let mut arrow_types = ArrowTypes::try_new(schema)?;
        arrow_types.enclosing.push(record.name.fullname(None));
        let fields = record
            .fields
            .iter()
            .map(|f| arrow_types.field(&f.name, &f.schema))
            .collect::<AvrowResult<Vec<_>>>()?;

        Ok(Self {
            names: fields.iter().map(|f| f.name().clone()).collect(),
            types: fields.iter().map(|f| f.data_type().clone()).collect(),
            row_schema: Arc::new(ArrowSchema::new(fields)),
        })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn types(&self) -> &[DataType] {
        &self.types
    }

    /// The Arrow schema of the rows produced and consumed for this table.
    pub fn row_schema(&self) -> &SchemaRef {
        &self.row_schema
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// The named types declared in a schema, used to follow [`Schema::Ref`].
pub(crate) struct NamedTypes<'a> {
    names: HashMap<Name, &'a Schema>,
}

impl<'a> NamedTypes<'a> {
    pub fn try_new(root: &'a Schema) -> AvrowResult<Self> {
        let resolved = ResolvedSchema::try_from(root)?;
        Ok(Self {
            names: resolved.get_names().clone(),
        })
    }

    /// The schema itself, or the named type it refers to.
    pub fn resolve(&self, schema: &'a Schema) -> AvrowResult<&'a Schema> {
        match schema {
            Schema::Ref { name } => self
                .names
                .get(name)
                .copied()
                .ok_or_else(|| avrow_err!("Unknown Avro named type {}", name.fullname(None))),
            other => Ok(other),
        }
    }
}

struct ArrowTypes<'a> {
    named: NamedTypes<'a>,
    // Full names of the records being expanded, to reject recursive types.
    enclosing: Vec<String>,
}

impl<'a> ArrowTypes<'a> {
    fn try_new(root: &'a Schema) -> AvrowResult<Self> {
        Ok(Self {
            named: NamedTypes::try_new(root)?,
            enclosing: Vec::new(),
        })
    }

    fn field(&mut self, name: &str, schema: &'a Schema) -> AvrowResult<Field> {
        if is_optional(schema) {
            let data_type = self.data_type(unwrap_optional(schema))?;
            return Ok(Field::new(name, data_type, true));
        }

        let data_type = self.data_type(schema)?;
        let nullable = data_type == DataType::Null;
        Ok(Field::new(name, data_type, nullable))
    }

    fn data_type(&mut self, schema: &'a Schema) -> AvrowResult<DataType> {
        Ok(match schema {
            Schema::Null => DataType::Null,
            Schema::Boolean => DataType::Boolean,
            Schema::Int => DataType::Int32,
            Schema::Long => DataType::Int64,
            Schema::Float => DataType::Float32,
            Schema::Double => DataType::Float64,
            Schema::Bytes => DataType::Binary,
            Schema::String | Schema::Enum(_) => DataType::Utf8,
            Schema::Fixed(fixed) => DataType::FixedSizeBinary(
                i32::try_from(fixed.size)
                    .map_err(|_| avrow_err!("Fixed size {} is too large", fixed.size))?,
            ),
            Schema::Date => DataType::Date32,
            Schema::TimeMillis => DataType::Time32(TimeUnit::Millisecond),
            Schema::TimeMicros => DataType::Time64(TimeUnit::Microsecond),
            Schema::TimestampMillis => DataType::Timestamp(TimeUnit::Millisecond, Some(UTC.into())),
            Schema::TimestampMicros => DataType::Timestamp(TimeUnit::Microsecond, Some(UTC.into())),
            Schema::LocalTimestampMillis => DataType::Timestamp(TimeUnit::Millisecond, None),
            Schema::LocalTimestampMicros => DataType::Timestamp(TimeUnit::Microsecond, None),
            Schema::Array(array) => DataType::List(Arc::new(
                self.field(Field::LIST_FIELD_DEFAULT_NAME, &array.items)?,
            )),
            Schema::Map(map) => {
                let entries = Fields::from(vec![
                    Field::new(MAP_KEYS, DataType::Utf8, false),
                    self.field(MAP_VALUES, &map.types)?,
                ]);
                DataType::Map(
                    Arc::new(Field::new(MAP_ENTRIES, DataType::Struct(entries), false)),
                    false,
                )
            }
            Schema::Record(record) => {
                let full_name = record.name.fullname(None);
                if self.enclosing.contains(&full_name) {
                    avrow_bail!(Unsupported: "Recursive Avro record {full_name}");
                }
                self.enclosing.push(full_name);
                let fields = record
                    .fields
                    .iter()
                    .map(|f| self.field(&f.name, &f.schema))
                    .collect::<AvrowResult<Vec<_>>>()?;
                self.enclosing.pop();
                DataType::Struct(Fields::from(fields))
            }
            Schema::Union(_) if is_optional(schema) => {
                self.data_type(unwrap_optional(schema))?
            }
            Schema::Union(union) => {
                let variants = union.variants();
                if variants.len() > MAX_UNION_BRANCHES {
                    avrow_bail!(Unsupported:
                        "Avro union with {} branches, at most {MAX_UNION_BRANCHES} are supported",
                        variants.len()
                    );
                }
                let fields = variants
                    .iter()
                    .enumerate()
                    .map(|(idx, variant)| {
                        self.data_type(variant)
                            .map(|data_type| Field::new(idx.to_string(), data_type, true))
                    })
                    .collect::<AvrowResult<Vec<_>>>()?;
                let type_ids = (0..fields.len())
                    .map(|idx| i8::try_from(idx).map_err(|_| avrow_err!("Union type id {idx}")))
                    .collect::<AvrowResult<Vec<_>>>()?;
                DataType::Union(UnionFields::new(type_ids, fields), UnionMode::Dense)
            }
            Schema::Ref { .. } => {
                let target = self.named.resolve(schema)?;
                self.data_type(target)?
            }
            other => avrow_bail!(Unsupported:
                "Avro type {} has no Arrow equivalent",
                other.canonical_form()
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn single_column(avro_type: &str) -> Field {
        let schema = Schema::parse_str(&format!(
            r#"{{"type": "record", "name": "t", "fields": [{{"name": "c", "type": {avro_type}}}]}}"#
        ))
        .unwrap();
        let columns = ColumnMetadata::try_from_avro(&schema).unwrap();
        assert_eq!(columns.len(), 1);
        columns.row_schema().field(0).clone()
    }

    #[rstest]
    #[case(r#""boolean""#, DataType::Boolean)]
    #[case(r#""int""#, DataType::Int32)]
    #[case(r#""long""#, DataType::Int64)]
    #[case(r#""float""#, DataType::Float32)]
    #[case(r#""double""#, DataType::Float64)]
    #[case(r#""bytes""#, DataType::Binary)]
    #[case(r#""string""#, DataType::Utf8)]
    #[case(r#"{"type": "enum", "name": "e", "symbols": ["A", "B"]}"#, DataType::Utf8)]
    #[case(r#"{"type": "fixed", "name": "f", "size": 16}"#, DataType::FixedSizeBinary(16))]
    #[case(r#"{"type": "int", "logicalType": "date"}"#, DataType::Date32)]
    #[case(
        r#"{"type": "long", "logicalType": "timestamp-millis"}"#,
        DataType::Timestamp(TimeUnit::Millisecond, Some(UTC.into()))
    )]
    #[case(
        r#"{"type": "long", "logicalType": "local-timestamp-micros"}"#,
        DataType::Timestamp(TimeUnit::Microsecond, None)
    )]
    fn primitive_columns(#[case] avro_type: &str, #[case] expected: DataType) {
        let field = single_column(avro_type);
        assert_eq!(field.data_type(), &expected);
        assert!(!field.is_nullable());
    }

    #[rstest]
    #[case(r#"["null", "string"]"#)]
    #[case(r#"["string", "null"]"#)]
    fn optional_column_is_nullable(#[case] avro_type: &str) {
        let field = single_column(avro_type);
        assert_eq!(field.data_type(), &DataType::Utf8);
        assert!(field.is_nullable());
    }

    #[test]
    fn single_int_column() {
        let schema = Schema::parse_str(
            r#"{"type": "record", "name": "A", "fields": [{"name": "x", "type": "int"}]}"#,
        )
        .unwrap();
        let columns = ColumnMetadata::try_from_avro(&schema).unwrap();
        assert_eq!(columns.names(), ["x".to_string()]);
        assert_eq!(columns.types(), [DataType::Int32]);
        assert_eq!(
            columns.row_schema().as_ref(),
            &ArrowSchema::new(vec![Field::new("x", DataType::Int32, false)])
        );
    }

    #[test]
    fn nested_types() {
        let field = single_column(
            r#"{"type": "map", "values": {"type": "array", "items": ["null", "long"]}}"#,
        );
        let DataType::Map(entries, false) = field.data_type() else {
            panic!("expected map, found {}", field.data_type());
        };
        let DataType::Struct(kv) = entries.data_type() else {
            panic!("expected struct entries");
        };
        assert_eq!(kv[0].data_type(), &DataType::Utf8);
        assert_eq!(
            kv[1].data_type(),
            &DataType::List(Arc::new(Field::new_list_field(DataType::Int64, true)))
        );
    }

    #[test]
    fn general_union_is_dense() {
        let field = single_column(r#"["int", "string", "null"]"#);
        let DataType::Union(fields, UnionMode::Dense) = field.data_type() else {
            panic!("expected union, found {}", field.data_type());
        };
        let types = fields
            .iter()
            .map(|(id, f)| (id, f.data_type().clone()))
            .collect::<Vec<_>>();
        assert_eq!(
            types,
            vec![(0, DataType::Int32), (1, DataType::Utf8), (2, DataType::Null)]
        );
    }

    #[test]
    fn named_reference() {
        let schema = Schema::parse_str(
            r#"{"type": "record", "name": "t", "fields": [
                {"name": "a", "type": {"type": "record", "name": "p", "fields": [{"name": "x", "type": "int"}]}},
                {"name": "b", "type": "p"}
            ]}"#,
        )
        .unwrap();
        let columns = ColumnMetadata::try_from_avro(&schema).unwrap();
        assert_eq!(columns.types()[0], columns.types()[1]);
    }

    #[test]
    fn recursive_record_rejected() {
        let schema = Schema::parse_str(
            r#"{"type": "record", "name": "node", "fields": [
                {"name": "value", "type": "long"},
                {"name": "next", "type": ["null", "node"]}
            ]}"#,
        )
        .unwrap();
        assert!(ColumnMetadata::try_from_avro(&schema).is_err());
    }

    #[test]
    fn non_record_rejected() {
        assert!(ColumnMetadata::try_from_avro(&Schema::Int).is_err());
    }
}
