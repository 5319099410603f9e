use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use apache_avro::Reader;
use arrow_array::RecordBatch;
use arrow_cast::pretty::pretty_format_batches;
use avrow::{AvroRecord, AvroSerde, RowSerde, RuntimeContext, SCHEMA_LITERAL, TableProperties};

pub fn exec_cat(file: &Path, properties: TableProperties) -> anyhow::Result<()> {
    let batch = read_table(file, properties)?;
    println!("{}", pretty_format_batches(&[batch])?);
    Ok(())
}

/// Read every record of an Avro object container file as a table with the given properties.
///
/// Without properties the table schema is the file's own.
fn read_table(file: &Path, properties: TableProperties) -> anyhow::Result<RecordBatch> {
    let reader = Reader::new(BufReader::new(File::open(file)?))?;
    let writer_schema = Arc::new(reader.writer_schema().clone());
    let properties = if properties.is_empty() {
        TableProperties::new().with(SCHEMA_LITERAL, serde_json::to_string(writer_schema.as_ref())?)
    } else {
        properties
    };

    let records = reader
        .map(|value| Ok(AvroRecord::try_new(value?, writer_schema.clone())?))
        .collect::<anyhow::Result<Vec<_>>>()?;
    tracing::debug!("Read {} records from {}", records.len(), file.display());

    let mut serde = AvroSerde::new();
    serde.configure(RuntimeContext::new(), properties)?;
    Ok(serde.deserialize(&records)?)
}

#[cfg(test)]
mod tests {
    use apache_avro::types::Value;
    use apache_avro::{Schema, Writer};
    use arrow_array::Array;
    use arrow_array::cast::AsArray;
    use arrow_array::types::Int64Type;

    use super::*;

    const WRITER: &str = r#"{"type": "record", "name": "Event", "fields": [
        {"name": "id", "type": "long"},
        {"name": "kind", "type": {"type": "enum", "name": "Kind", "symbols": ["OPEN", "CLOSE"]}}
    ]}"#;

    fn container() -> tempfile::NamedTempFile {
        let schema = Schema::parse_str(WRITER).unwrap();
        let mut writer = Writer::new(&schema, Vec::new());
        for (id, kind) in [(1, "OPEN"), (2, "CLOSE")] {
            writer
                .append(Value::Record(vec![
                    ("id".into(), Value::Long(id)),
                    ("kind".into(), Value::Enum(u32::from(kind == "CLOSE"), kind.into())),
                ]))
                .unwrap();
        }
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), writer.into_inner().unwrap()).unwrap();
        file
    }

    #[test]
    fn reads_with_file_schema() {
        let file = container();
        let batch = read_table(file.path(), TableProperties::new()).unwrap();

        assert_eq!(batch.num_rows(), 2);
        assert_eq!(batch.column(0).as_primitive::<Int64Type>().values().to_vec(), vec![1, 2]);
        assert_eq!(batch.column(1).as_string::<i32>().value(1), "CLOSE");
    }

    #[test]
    fn reads_with_evolved_table_schema() {
        let file = container();
        let table = r#"{"type": "record", "name": "Event", "fields": [
            {"name": "id", "type": "long"},
            {"name": "source", "type": ["null", "string"], "default": null}
        ]}"#;
        let batch = read_table(
            file.path(),
            TableProperties::new().with(SCHEMA_LITERAL, table),
        )
        .unwrap();

        assert_eq!(batch.num_columns(), 2);
        assert_eq!(batch.column(1).null_count(), 2);
    }
}
