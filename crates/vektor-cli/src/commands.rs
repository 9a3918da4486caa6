//! Subcommand implementations. Each returns the text to print.

use anyhow::{bail, Context, Result};
use std::fmt::Write as _;
use std::path::Path;
use tracing::info;
use vektor_codec::{compile, decompile, encode_schema};
use vektor_ir::{SchemaProvider, StaticCatalog};

use crate::config::OutputFormat;

pub fn load_catalog(path: &Path) -> Result<StaticCatalog> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading catalog {}", path.display()))?;
    serde_yaml::from_str(&contents).with_context(|| format!("parsing catalog {}", path.display()))
}

/// Decode a binary query file and render it
pub fn inspect(path: &Path, format: OutputFormat) -> Result<String> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let query = vektor_proto::decode_query(&bytes)
        .with_context(|| format!("decoding {}", path.display()))?;
    let expr = decompile(&query).context("rebuilding expression")?;
    info!(
        file = %path.display(),
        table_refs = query.table_refs().len(),
        "inspected query"
    );

    match format {
        OutputFormat::Json => Ok(vektor_proto::to_json(&query)?),
        OutputFormat::Debug => {
            let mut out = String::new();
            writeln!(out, "fingerprint: {}", vektor_proto::fingerprint(&query))?;
            writeln!(out, "type: {}", expr.type_display())?;
            for (i, table) in query.table_refs().iter().enumerate() {
                writeln!(out, "ref {}: {} {}", i + 1, table.opname, table.r#type)?;
            }
            if expr.is_table() {
                for field in expr.schema()?.fields {
                    writeln!(out, "  {}: {}", field.name, field.data_type)?;
                }
            }
            writeln!(out, "{:#?}", expr)?;
            Ok(out)
        }
    }
}

/// Print the schema of a catalog table
pub fn describe(catalog: &StaticCatalog, table: &str, format: OutputFormat) -> Result<String> {
    let schema = catalog.get_table_schema(table)?;
    match format {
        OutputFormat::Json => Ok(vektor_proto::to_json(&encode_schema(&schema))?),
        OutputFormat::Debug => {
            let mut out = String::new();
            writeln!(out, "{}", table)?;
            for field in &schema.fields {
                writeln!(out, "  {}: {}", field.name, field.data_type)?;
            }
            Ok(out)
        }
    }
}

/// Compile a scan of `table`, optionally projected and limited, and write
/// the binary query to `output`
pub fn scan(
    catalog: &StaticCatalog,
    table: &str,
    columns: &[String],
    limit: Option<i64>,
    output: &Path,
) -> Result<String> {
    let mut expr = catalog.table(table)?;
    if !columns.is_empty() {
        let items = columns
            .iter()
            .map(|c| expr.column(c.as_str()))
            .collect::<Result<Vec<_>, _>>()?;
        expr = expr.select(items)?;
    }
    if let Some(n) = limit {
        if n < 0 {
            bail!("limit must not be negative, got {}", n);
        }
        expr = expr.limit(n, 0)?;
    }

    let query = compile(&expr)?;
    let bytes = vektor_proto::encode_query(&query);
    std::fs::write(output, &bytes).with_context(|| format!("writing {}", output.display()))?;

    let fingerprint = vektor_proto::fingerprint(&query);
    info!(
        table,
        bytes = bytes.len(),
        fingerprint = %fingerprint,
        "wrote query"
    );
    Ok(format!(
        "wrote {} bytes to {} ({})",
        bytes.len(),
        output.display(),
        fingerprint
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"
tables:
  - name: ports_v1
    columns:
      - { name: port_name, type: string }
      - { name: harbor_size, type: string }
      - { name: port_geom, type: "geography:geography;4326" }
  - name: vessels
    columns:
      - { name: mmsi, type: int64 }
      - { name: updated_at, type: timestamp }
"#;

    fn catalog() -> StaticCatalog {
        serde_yaml::from_str(CATALOG).unwrap()
    }

    #[test]
    fn test_load_catalog() {
        let path = std::env::temp_dir().join("vektor_test_catalog.yaml");
        std::fs::write(&path, CATALOG).unwrap();
        let catalog = load_catalog(&path).unwrap();
        assert_eq!(catalog.table_names(), vec!["ports_v1", "vessels"]);
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_describe() {
        let out = describe(&catalog(), "vessels", OutputFormat::Debug).unwrap();
        assert!(out.contains("mmsi: int64"));
        assert!(describe(&catalog(), "harbors", OutputFormat::Debug).is_err());

        let json = describe(&catalog(), "vessels", OutputFormat::Json).unwrap();
        assert!(json.contains("Timestamp"));
    }

    #[test]
    fn test_scan_then_inspect() {
        let path = std::env::temp_dir().join("vektor_test_scan.bin");
        let columns = vec!["port_name".to_string(), "port_geom".to_string()];
        scan(&catalog(), "ports_v1", &columns, Some(10), &path).unwrap();

        let out = inspect(&path, OutputFormat::Debug).unwrap();
        assert!(out.contains("ref 1: DatabaseTable table"));
        assert!(out.contains("ref 2: Selection table"));
        assert!(out.contains("port_geom: geography"));

        let json = inspect(&path, OutputFormat::Json).unwrap();
        assert!(json.contains("\"Limit\""));
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_scan_unknown_column() {
        let path = std::env::temp_dir().join("vektor_test_scan_bad.bin");
        let columns = vec!["draught".to_string()];
        assert!(scan(&catalog(), "vessels", &columns, None, &path).is_err());
    }
}
