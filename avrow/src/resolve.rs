use std::fs::File;
use std::io::Read;

use apache_avro::Schema;
use avrow_error::{AvrowError, AvrowResult, avrow_bail, avrow_err};
use object_store::path::Path;
use url::Url;

use crate::context::RuntimeContext;
use crate::properties::{SCHEMA_LITERAL, SCHEMA_URL, TableProperties};

/// URL scheme identifying schemas stored on a distributed filesystem.
pub const HDFS_SCHEME: &str = "hdfs";

/// Determine the Avro schema of a table from its properties.
///
/// The inline [`SCHEMA_LITERAL`] wins over [`SCHEMA_URL`]. Distributed filesystem locations are
/// read through the object store registered in `context`, and any failure to read them is
/// reported as [`AvrowError::Retrieval`]. Every other location is fetched directly; its read
/// and parse errors are returned as they are.
pub fn resolve_schema(
    properties: &TableProperties,
    context: &RuntimeContext,
) -> AvrowResult<Schema> {
    if let Some(literal) = properties.get(SCHEMA_LITERAL) {
        log::debug!("Parsing Avro schema from {SCHEMA_LITERAL}");
        return Schema::parse_str(literal).map_err(AvrowError::Parse);
    }

    let location = properties.get(SCHEMA_URL).ok_or_else(|| {
        avrow_err!(Configuration:
            "Neither {SCHEMA_LITERAL} nor {SCHEMA_URL} specified, can't determine table schema"
        )
    })?;

    if location.starts_with(&format!("{HDFS_SCHEME}://")) {
        log::debug!("Reading Avro schema from distributed filesystem {location}");
        let bytes = read_object(location, context).map_err(|e| AvrowError::Retrieval {
            location: location.to_string().into(),
            source: Box::new(e),
        })?;
        return Schema::parse_reader(&mut bytes.as_slice()).map_err(AvrowError::Parse);
    }

    log::debug!("Reading Avro schema from {location}");
    let mut reader = open_url(location)?;
    Schema::parse_reader(&mut reader).map_err(AvrowError::Parse)
}

fn read_object(location: &str, context: &RuntimeContext) -> AvrowResult<Vec<u8>> {
    let url = Url::parse(location)?;
    let store = context.object_store(&url)?;
    let path = Path::from_url_path(url.path()).map_err(object_store::Error::from)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let bytes = runtime.block_on(async { store.get(&path).await?.bytes().await })?;
    Ok(bytes.to_vec())
}

fn open_url(location: &str) -> AvrowResult<Box<dyn Read>> {
    let url = Url::parse(location)?;
    match url.scheme() {
        "file" => {
            let path = url
                .to_file_path()
                .map_err(|_| avrow_err!("Invalid file URL {location}"))?;
            Ok(Box::new(File::open(path)?))
        }
        "http" | "https" => {
            let response = reqwest::blocking::get(url)?.error_for_status()?;
            Ok(Box::new(response))
        }
        other => avrow_bail!(Configuration: "Unsupported scheme {other} in {SCHEMA_URL} {location}"),
    }
}

#[cfg(test)]
mod tests {
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;
    use std::sync::Arc;
    use std::thread;

    use object_store::memory::InMemory;
    use object_store::{ObjectStore, PutPayload};

    use super::*;

    const SCHEMA: &str = r#"{"type": "record", "name": "A", "fields": [{"name": "x", "type": "int"}]}"#;

    fn literal(json: &str) -> TableProperties {
        TableProperties::new().with(SCHEMA_LITERAL, json)
    }

    #[test]
    fn literal_matches_direct_parse() {
        let resolved = resolve_schema(&literal(SCHEMA), &RuntimeContext::new()).unwrap();
        assert_eq!(resolved, Schema::parse_str(SCHEMA).unwrap());
    }

    #[test]
    fn literal_wins_over_url() {
        let props = literal(SCHEMA).with(SCHEMA_URL, "hdfs://nowhere/schema.avsc");
        let resolved = resolve_schema(&props, &RuntimeContext::new()).unwrap();
        assert_eq!(resolved, Schema::parse_str(SCHEMA).unwrap());
    }

    #[test]
    fn neither_property() {
        let err = resolve_schema(&TableProperties::new(), &RuntimeContext::new()).unwrap_err();
        assert!(matches!(err, AvrowError::Configuration(..)));
        assert!(err.to_string().contains(SCHEMA_URL));
    }

    #[test]
    fn malformed_literal() {
        let err = resolve_schema(&literal("{\"type\": \"nope\"}"), &RuntimeContext::new())
            .unwrap_err();
        assert!(matches!(err, AvrowError::Parse(_)));
    }

    #[test]
    fn from_file_url() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SCHEMA.as_bytes()).unwrap();
        let url = Url::from_file_path(file.path()).unwrap();

        let props = TableProperties::new().with(SCHEMA_URL, url.as_str());
        let resolved = resolve_schema(&props, &RuntimeContext::new()).unwrap();
        assert_eq!(resolved, Schema::parse_str(SCHEMA).unwrap());
    }

    #[test]
    fn missing_file_is_not_retrieval() {
        let dir = tempfile::tempdir().unwrap();
        let url = Url::from_file_path(dir.path().join("missing.avsc")).unwrap();

        let props = TableProperties::new().with(SCHEMA_URL, url.as_str());
        let err = resolve_schema(&props, &RuntimeContext::new()).unwrap_err();
        assert!(matches!(err, AvrowError::Io(_)));
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"not a schema").unwrap();
        let url = Url::from_file_path(file.path()).unwrap();

        let props = TableProperties::new().with(SCHEMA_URL, url.as_str());
        let err = resolve_schema(&props, &RuntimeContext::new()).unwrap_err();
        assert!(matches!(err, AvrowError::Parse(_)));
    }

    #[test]
    fn unsupported_scheme() {
        let props = TableProperties::new().with(SCHEMA_URL, "ftp://host/schema.avsc");
        let err = resolve_schema(&props, &RuntimeContext::new()).unwrap_err();
        assert!(matches!(err, AvrowError::Configuration(..)));
    }

    #[test]
    fn from_hdfs() {
        let store = Arc::new(InMemory::new());
        let payload = PutPayload::from(SCHEMA.as_bytes().to_vec());
        futures::executor::block_on(store.put(&Path::from("warehouse/a.avsc"), payload)).unwrap();
        let ctx = RuntimeContext::new()
            .with_object_store(&Url::parse("hdfs://namenode:8020").unwrap(), store);

        let props =
            TableProperties::new().with(SCHEMA_URL, "hdfs://namenode:8020/warehouse/a.avsc");
        let resolved = resolve_schema(&props, &ctx).unwrap();
        assert_eq!(resolved, Schema::parse_str(SCHEMA).unwrap());
    }

    #[test]
    fn hdfs_missing_object() {
        let ctx = RuntimeContext::new().with_object_store(
            &Url::parse("hdfs://namenode").unwrap(),
            Arc::new(InMemory::new()),
        );
        let props = TableProperties::new().with(SCHEMA_URL, "hdfs://namenode/missing.avsc");
        let err = resolve_schema(&props, &ctx).unwrap_err();
        assert!(matches!(err, AvrowError::Retrieval { .. }));
    }

    #[test]
    fn hdfs_unreachable() {
        let props = TableProperties::new().with(SCHEMA_URL, "hdfs://host/path/schema.avsc");
        let err = resolve_schema(&props, &RuntimeContext::new()).unwrap_err();
        assert!(matches!(err, AvrowError::Retrieval { .. }));
    }

    #[test]
    fn from_http() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut line = String::new();
            while reader.read_line(&mut line).unwrap() > 2 {
                line.clear();
            }
            write!(
                stream,
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{SCHEMA}",
                SCHEMA.len()
            )
            .unwrap();
        });

        let props =
            TableProperties::new().with(SCHEMA_URL, format!("http://{addr}/schemas/a.avsc"));
        let resolved = resolve_schema(&props, &RuntimeContext::new()).unwrap();
        assert_eq!(resolved, Schema::parse_str(SCHEMA).unwrap());
        server.join().unwrap();
    }
}
