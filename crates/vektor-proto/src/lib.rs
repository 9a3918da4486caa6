//! Wire format for serialized query ASTs
//!
//! Protobuf messages exchanged with the Vektor execution service, plus the
//! helpers to build, encode and fingerprint them.

use prost::Message;
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

mod helpers;
mod messages;

pub use helpers::*;
pub use messages::*;

#[derive(Debug, Error)]
pub enum ProtoError {
    #[error("Protobuf decoding failed: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("JSON conversion failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Message has no {0}")]
    MissingField(&'static str),
}

/// Encode a query to binary protobuf
pub fn encode_query(query: &Query) -> Vec<u8> {
    query.encode_to_vec()
}

/// Decode a query from binary protobuf
pub fn decode_query(bytes: &[u8]) -> Result<Query, ProtoError> {
    let query = Query::decode(bytes)?;
    if query.expr().is_none() {
        return Err(ProtoError::MissingField("query expression"));
    }
    Ok(query)
}

pub fn decode_schema(bytes: &[u8]) -> Result<Schema, ProtoError> {
    Ok(Schema::decode(bytes)?)
}

/// SHA-256 of the message's binary encoding.
///
/// Operand maps are ordered, so equal messages always produce equal bytes
/// and therefore equal digests.
pub fn digest<M: Message>(msg: &M) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(msg.encode_to_vec());
    hasher.finalize().into()
}

/// Hex rendering of [`digest`]
pub fn fingerprint<M: Message>(msg: &M) -> String {
    digest(msg).iter().map(|b| format!("{:02x}", b)).collect()
}

pub fn to_json<M: Serialize>(msg: &M) -> Result<String, ProtoError> {
    Ok(serde_json::to_string_pretty(msg)?)
}

pub fn query_from_json(json: &str) -> Result<Query, ProtoError> {
    let query: Query = serde_json::from_str(json)?;
    if query.expr().is_none() {
        return Err(ProtoError::MissingField("query expression"));
    }
    Ok(query)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn table_node() -> Expr {
        let mut value = BTreeMap::new();
        value.insert("name".to_string(), make_map_value(make_primitive("ports_v1")));
        value.insert(
            "schema".to_string(),
            make_map_value(make_schema(
                vec!["port_name".to_string()],
                vec![make_schema_type("String", None)],
            )),
        );
        make_expr("DatabaseTable", "table", 1, None, value)
    }

    fn column_node() -> Expr {
        let mut value = BTreeMap::new();
        value.insert("name".to_string(), make_map_value(make_primitive("port_name")));
        value.insert("table".to_string(), make_map_value(make_primitive(1i64)));
        make_expr("TableColumn", "string*", 0, None, value)
    }

    #[test]
    fn test_binary_round_trip() {
        let query = make_query(column_node(), vec![table_node().without_alias()]);
        let bytes = encode_query(&query);
        let decoded = decode_query(&bytes).unwrap();
        assert_eq!(decoded, query);
    }

    #[test]
    fn test_decode_rejects_empty_query() {
        let bytes = encode_query(&Query::default());
        assert!(matches!(
            decode_query(&bytes),
            Err(ProtoError::MissingField(_))
        ));
        assert!(matches!(
            decode_query(&[0xff, 0xff, 0xff]),
            Err(ProtoError::Decode(_))
        ));
    }

    #[test]
    fn test_digest_is_insertion_order_independent() {
        let a = column_node();

        let mut value = BTreeMap::new();
        value.insert("table".to_string(), make_map_value(make_primitive(1i64)));
        value.insert("name".to_string(), make_map_value(make_primitive("port_name")));
        let b = make_expr("TableColumn", "string*", 0, None, value);

        assert_eq!(digest(&a), digest(&b));
        assert_ne!(digest(&a), digest(&table_node()));
        assert_eq!(fingerprint(&a).len(), 64);
    }

    #[test]
    fn test_digest_sees_alias() {
        let node = table_node();
        assert_ne!(digest(&node), digest(&node.without_alias()));
    }

    #[test]
    fn test_json_round_trip() {
        let query = make_query(column_node(), vec![table_node().without_alias()]);
        let json = to_json(&query).unwrap();
        assert!(json.contains("\"opname\": \"TableColumn\""));
        assert!(json.contains("\"type\": \"query\""));
        assert_eq!(query_from_json(&json).unwrap(), query);
    }

    #[test]
    fn test_schema_file_lists_every_message() {
        let schema = include_str!("../proto/vektor.proto");
        for name in [
            "Expr", "MapValue", "MapValueList", "Primitive", "Literal", "Geometry", "IntList",
            "BoolList", "DoubleList", "StringList", "Schema", "SchemaValue", "SchemaType",
            "ArraySchemaValue", "GeospatialSchemaValue", "DecimalSchemaValue", "Window",
            "WindowValue", "WindowParam", "WindowTuple", "Query", "QueryValue",
        ] {
            assert!(schema.contains(&format!("message {} {{", name)), "{} missing", name);
        }
        assert!(schema.contains("map<string, MapValue> value = 5;"));
    }
}
