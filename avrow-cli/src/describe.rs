use avrow::error::AvrowResult;
use avrow::{AvroSerde, RowSerde, RuntimeContext, TableProperties};

pub fn exec_describe(properties: TableProperties) -> anyhow::Result<()> {
    let mut serde = AvroSerde::new();
    serde.configure(RuntimeContext::new(), properties)?;
    print!("{}", describe(&mut serde)?);
    Ok(())
}

fn describe(serde: &mut AvroSerde) -> AvrowResult<String> {
    let columns = serde
        .row_schema()?
        .fields()
        .iter()
        .map(|field| {
            let nullable = if field.is_nullable() { "" } else { " not null" };
            format!("{}: {}{nullable}", field.name(), field.data_type())
        })
        .collect::<Vec<_>>();
    Ok(format!(
        "serialized as {}\n{}\n",
        serde.serialized_type(),
        columns.join("\n")
    ))
}

#[cfg(test)]
mod tests {
    use avrow::SCHEMA_LITERAL;
    use avrow::error::AvrowError;

    use super::*;

    #[test]
    fn lists_columns() {
        let mut serde = AvroSerde::new();
        serde
            .configure(
                RuntimeContext::new(),
                TableProperties::new().with(
                    SCHEMA_LITERAL,
                    r#"{"type": "record", "name": "A", "fields": [
                        {"name": "x", "type": "int"},
                        {"name": "s", "type": ["null", "string"]}
                    ]}"#,
                ),
            )
            .unwrap();

        let out = describe(&mut serde).unwrap();
        let lines = out.lines().collect::<Vec<_>>();
        assert!(lines[0].ends_with("AvroRecord"));
        assert_eq!(&lines[1..], ["x: Int32 not null", "s: Utf8"]);
    }

    #[test]
    fn missing_schema() {
        let mut serde = AvroSerde::new();
        serde
            .configure(RuntimeContext::new(), TableProperties::new())
            .unwrap();
        let err = describe(&mut serde).unwrap_err();
        assert!(matches!(err.root_cause(), AvrowError::Configuration(..)));
    }
}
