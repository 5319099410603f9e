//! Avro expresses optional values as a two-branch union with `null`, e.g. `["null", "string"]`.
//! Such unions are presented to the engine as the non-null branch with a nullable column.

use apache_avro::Schema;

/// Whether `schema` is a union of exactly two branches, one of which is `null`.
///
/// Avro forbids duplicate unnamed branches, so `["null", "null"]` never reaches this check.
pub fn is_optional(schema: &Schema) -> bool {
    match schema {
        Schema::Union(union) => {
            let variants = union.variants();
            variants.len() == 2
                && (matches!(variants[0], Schema::Null) || matches!(variants[1], Schema::Null))
        }
        _ => false,
    }
}

/// The non-null branch of an optional union.
///
/// The schema is not checked with [`is_optional`]: any schema other than a two-branch union is
/// returned unchanged, and the first branch is returned when neither branch is `null`.
pub fn unwrap_optional(schema: &Schema) -> &Schema {
    match schema {
        Schema::Union(union) => match union.variants() {
            [Schema::Null, other] | [other, _] => other,
            _ => schema,
        },
        _ => schema,
    }
}

/// The index of the `null` branch within an optional union.
pub(crate) fn null_branch(schema: &Schema) -> Option<u32> {
    match schema {
        Schema::Union(union) => union
            .variants()
            .iter()
            .position(|s| matches!(s, Schema::Null))
            .and_then(|idx| u32::try_from(idx).ok()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn parse(json: &str) -> Schema {
        Schema::parse_str(json).unwrap()
    }

    #[rstest]
    #[case(r#"["null", "string"]"#, Schema::String)]
    #[case(r#"["string", "null"]"#, Schema::String)]
    #[case(r#"["null", "long"]"#, Schema::Long)]
    #[case(r#"["double", "null"]"#, Schema::Double)]
    fn optional_unions(#[case] json: &str, #[case] inner: Schema) {
        let schema = parse(json);
        assert!(is_optional(&schema));
        assert_eq!(unwrap_optional(&schema), &inner);
    }

    #[test]
    fn optional_record_branch() {
        let schema = parse(
            r#"["null", {"type": "record", "name": "A", "fields": [{"name": "x", "type": "int"}]}]"#,
        );
        assert!(is_optional(&schema));
        assert!(matches!(unwrap_optional(&schema), Schema::Record(_)));
    }

    #[rstest]
    #[case(r#""string""#)]
    #[case(r#""null""#)]
    #[case(r#"["int", "string"]"#)]
    #[case(r#"["null", "int", "string"]"#)]
    #[case(r#"["null"]"#)]
    #[case(r#"{"type": "array", "items": ["null", "int"]}"#)]
    fn not_optional(#[case] json: &str) {
        assert!(!is_optional(&parse(json)));
    }

    #[rstest]
    #[case(r#""string""#, r#""string""#)]
    #[case(r#""null""#, r#""null""#)]
    #[case(r#"["int", "string"]"#, r#""int""#)]
    #[case(r#"["null", "int", "string"]"#, r#"["null", "int", "string"]"#)]
    #[case(r#"["null"]"#, r#"["null"]"#)]
    fn unwrap_not_optional(#[case] json: &str, #[case] expected: &str) {
        assert_eq!(unwrap_optional(&parse(json)), &parse(expected));
    }

    #[test]
    fn null_branch_position() {
        assert_eq!(null_branch(&parse(r#"["null", "int"]"#)), Some(0));
        assert_eq!(null_branch(&parse(r#"["int", "null"]"#)), Some(1));
        assert_eq!(null_branch(&parse(r#"["int", "string"]"#)), None);
        assert_eq!(null_branch(&Schema::Int), None);
    }
}
