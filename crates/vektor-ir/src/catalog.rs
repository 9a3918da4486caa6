//! Table catalogs: where physical tables and their schemas come from

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::{DataType, FieldType, Schema};
use crate::{Expr, IrError};

/// Resolves table names to schemas.
///
/// Implemented by anything that knows the tables of a database; the
/// deserializer and the CLI only ever see this trait.
pub trait SchemaProvider {
    /// Get schema for a table by name
    fn get_table_schema(&self, table_name: &str) -> Result<Schema, IrError>;

    /// Bound table expression for `table_name`
    fn table(&self, table_name: &str) -> Result<Expr, IrError> {
        let schema = self.get_table_schema(table_name)?;
        Ok(Expr::database_table(table_name, schema))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    /// Type signature, e.g. `int64` or `array<string>`
    #[serde(rename = "type")]
    pub data_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableInfo {
    pub name: String,
    pub columns: Vec<ColumnInfo>,
}

impl TableInfo {
    pub fn schema(&self) -> Result<Schema, IrError> {
        let fields = self
            .columns
            .iter()
            .map(|col| Ok(FieldType::new(&col.name, col.data_type.parse::<DataType>()?)))
            .collect::<Result<Vec<_>, IrError>>()?;
        Ok(Schema::new(fields))
    }
}

/// In-memory catalog, usually loaded from a YAML or JSON document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaticCatalog {
    #[serde(default)]
    pub tables: Vec<TableInfo>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_table(&mut self, name: impl Into<String>, schema: &Schema) {
        let name = name.into();
        self.tables.retain(|t| t.name != name);
        self.tables.push(TableInfo {
            name,
            columns: schema
                .fields
                .iter()
                .map(|f| ColumnInfo {
                    name: f.name.clone(),
                    data_type: f.data_type.to_string(),
                })
                .collect(),
        });
    }

    pub fn table_names(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.name.as_str()).collect()
    }

    /// Schemas of every table, keyed by name
    pub fn schemas(&self) -> Result<BTreeMap<String, Schema>, IrError> {
        self.tables
            .iter()
            .map(|t| Ok((t.name.clone(), t.schema()?)))
            .collect()
    }
}

impl SchemaProvider for StaticCatalog {
    fn get_table_schema(&self, table_name: &str) -> Result<Schema, IrError> {
        self.tables
            .iter()
            .find(|t| t.name == table_name)
            .ok_or_else(|| IrError::TableNotFound(table_name.to_string()))?
            .schema()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_from_json() {
        let catalog: StaticCatalog = serde_json::from_str(
            r#"{"tables": [{"name": "ports_v1", "columns": [
                {"name": "port_name", "type": "string"},
                {"name": "port_geom", "type": "geography:geography;4326"}
            ]}]}"#,
        )
        .unwrap();

        let schema = catalog.get_table_schema("ports_v1").unwrap();
        assert_eq!(schema.names(), vec!["port_name", "port_geom"]);
        assert_eq!(schema.fields[1].data_type, DataType::geography(4326));

        let table = catalog.table("ports_v1").unwrap();
        assert_eq!(table.get_name().as_deref(), Some("ports_v1"));
    }

    #[test]
    fn test_missing_table() {
        let catalog = StaticCatalog::new();
        assert!(matches!(
            catalog.get_table_schema("nope"),
            Err(IrError::TableNotFound(_))
        ));
    }

    #[test]
    fn test_bad_column_type() {
        let mut catalog = StaticCatalog::new();
        catalog.tables.push(TableInfo {
            name: "t".to_string(),
            columns: vec![ColumnInfo {
                name: "x".to_string(),
                data_type: "quaternion".to_string(),
            }],
        });
        assert!(catalog.table("t").is_err());
    }

    #[test]
    fn test_add_table_round_trips_signatures() {
        let schema = Schema::from_pairs([
            ("id", DataType::Int64),
            ("tags", DataType::set(DataType::String)),
            ("price", DataType::decimal(12, 2)),
        ]);
        let mut catalog = StaticCatalog::new();
        catalog.add_table("items", &schema);
        assert_eq!(catalog.get_table_schema("items").unwrap(), schema);
    }
}
