// Wire messages for the query AST.
//
// Mirrors proto/vektor.proto with the prost derives written out, so no
// protoc is needed at build time; tags are part of the wire contract and
// must not be renumbered.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

fn is_zero(v: &u32) -> bool {
    *v == 0
}

/// One node of an expression tree
#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
pub struct Expr {
    #[prost(string, tag = "1")]
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub opname: String,
    #[prost(string, tag = "2")]
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub r#type: String,
    #[prost(string, tag = "3")]
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// 1-based index into `QueryValue.table_refs`; 0 when unset
    #[prost(uint32, tag = "4")]
    #[serde(default, skip_serializing_if = "is_zero")]
    pub alias: u32,
    #[prost(btree_map = "string, message", tag = "5")]
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub value: BTreeMap<String, MapValue>,
}

#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
pub struct MapValue {
    #[prost(oneof = "map_value::Value", tags = "1, 2, 3, 4, 5, 6")]
    #[serde(flatten)]
    pub value: Option<map_value::Value>,
}

pub mod map_value {
    use serde::{Deserialize, Serialize};

    #[derive(Clone, PartialEq, ::prost::Oneof, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum Value {
        #[prost(message, tag = "1")]
        List(super::MapValueList),
        #[prost(message, tag = "2")]
        Expr(Box<super::Expr>),
        #[prost(message, tag = "3")]
        Literal(super::Literal),
        #[prost(message, tag = "4")]
        Schema(super::Schema),
        #[prost(message, tag = "5")]
        Window(Box<super::Window>),
        #[prost(message, tag = "6")]
        Primitive(super::Primitive),
    }
}

#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
pub struct MapValueList {
    #[prost(message, repeated, tag = "1")]
    #[serde(default)]
    pub values: Vec<MapValue>,
}

/// Scalar operand such as a column name or a limit
#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
pub struct Primitive {
    #[prost(oneof = "primitive::Value", tags = "1, 2, 3, 4, 5")]
    #[serde(flatten)]
    pub value: Option<primitive::Value>,
}

pub mod primitive {
    use serde::{Deserialize, Serialize};

    #[derive(Clone, PartialEq, ::prost::Oneof, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum Value {
        #[prost(bool, tag = "1")]
        Bool(bool),
        #[prost(int64, tag = "2")]
        Int(i64),
        #[prost(uint64, tag = "3")]
        Uint(u64),
        #[prost(double, tag = "4")]
        Double(f64),
        #[prost(string, tag = "5")]
        String(String),
    }
}

#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
pub struct Literal {
    #[prost(string, tag = "1")]
    #[serde(default)]
    pub opname: String,
    #[prost(string, tag = "2")]
    #[serde(default)]
    pub dtype: String,
    #[prost(oneof = "literal::Value", tags = "3, 4, 5, 6, 7, 8, 9, 10, 11, 12")]
    #[serde(flatten)]
    pub value: Option<literal::Value>,
}

pub mod literal {
    use serde::{Deserialize, Serialize};

    #[derive(Clone, PartialEq, ::prost::Oneof, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum Value {
        #[prost(bool, tag = "3")]
        Bool(bool),
        #[prost(int64, tag = "4")]
        Int(i64),
        #[prost(uint64, tag = "5")]
        Uint(u64),
        #[prost(double, tag = "6")]
        Double(f64),
        #[prost(string, tag = "7")]
        String(String),
        #[prost(message, tag = "8")]
        Geometry(super::Geometry),
        #[prost(message, tag = "9")]
        IntList(super::IntList),
        #[prost(message, tag = "10")]
        BoolList(super::BoolList),
        #[prost(message, tag = "11")]
        DoubleList(super::DoubleList),
        #[prost(message, tag = "12")]
        StringList(super::StringList),
    }
}

#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
pub struct Geometry {
    #[prost(string, tag = "1")]
    pub wkt: String,
    #[prost(string, optional, tag = "2")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crs: Option<String>,
}

#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
pub struct IntList {
    #[prost(int64, repeated, tag = "1")]
    #[serde(default)]
    pub value: Vec<i64>,
}

#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
pub struct BoolList {
    #[prost(bool, repeated, tag = "1")]
    #[serde(default)]
    pub value: Vec<bool>,
}

#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
pub struct DoubleList {
    #[prost(double, repeated, tag = "1")]
    #[serde(default)]
    pub value: Vec<f64>,
}

#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
pub struct StringList {
    #[prost(string, repeated, tag = "1")]
    #[serde(default)]
    pub value: Vec<String>,
}

#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
pub struct Schema {
    #[prost(string, tag = "1")]
    pub r#type: String,
    #[prost(message, optional, tag = "2")]
    pub value: Option<SchemaValue>,
}

#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
pub struct SchemaValue {
    #[prost(string, repeated, tag = "1")]
    #[serde(default)]
    pub names: Vec<String>,
    #[prost(message, repeated, tag = "2")]
    #[serde(default)]
    pub types: Vec<SchemaType>,
}

#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
pub struct SchemaType {
    /// Class name of the data type, e.g. `Int64` or `Array`
    #[prost(string, tag = "1")]
    pub r#type: String,
    #[prost(oneof = "schema_type::Value", tags = "2, 3, 4, 5")]
    #[serde(flatten)]
    pub value: Option<schema_type::Value>,
}

pub mod schema_type {
    use serde::{Deserialize, Serialize};

    #[derive(Clone, PartialEq, ::prost::Oneof, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum Value {
        #[prost(message, tag = "2")]
        Struct(super::SchemaValue),
        #[prost(message, tag = "3")]
        Array(super::ArraySchemaValue),
        #[prost(message, tag = "4")]
        Geospatial(super::GeospatialSchemaValue),
        #[prost(message, tag = "5")]
        Decimal(super::DecimalSchemaValue),
    }
}

#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
pub struct ArraySchemaValue {
    #[prost(message, optional, boxed, tag = "1")]
    pub value_type: Option<Box<SchemaType>>,
}

#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
pub struct GeospatialSchemaValue {
    #[prost(string, tag = "1")]
    #[serde(default)]
    pub geotype: String,
    /// 0 when unknown
    #[prost(uint32, tag = "2")]
    #[serde(default)]
    pub srid: u32,
}

#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
pub struct DecimalSchemaValue {
    #[prost(uint32, tag = "1")]
    pub precision: u32,
    #[prost(uint32, tag = "2")]
    pub scale: u32,
}

#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
pub struct Window {
    #[prost(string, tag = "1")]
    pub r#type: String,
    #[prost(message, optional, tag = "2")]
    pub value: Option<WindowValue>,
}

#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
pub struct WindowValue {
    #[prost(message, repeated, tag = "1")]
    #[serde(default)]
    pub group_by: Vec<MapValue>,
    #[prost(message, repeated, tag = "2")]
    #[serde(default)]
    pub order_by: Vec<MapValue>,
    #[prost(message, optional, tag = "3")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preceding: Option<WindowParam>,
    #[prost(message, optional, tag = "4")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub following: Option<WindowParam>,
    #[prost(message, optional, tag = "5")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_lookback: Option<WindowParam>,
    #[prost(string, tag = "6")]
    #[serde(default)]
    pub how: String,
}

#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
pub struct WindowParam {
    #[prost(oneof = "window_param::Value", tags = "1, 2, 3, 4")]
    #[serde(flatten)]
    pub value: Option<window_param::Value>,
}

pub mod window_param {
    use serde::{Deserialize, Serialize};

    #[derive(Clone, PartialEq, ::prost::Oneof, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum Value {
        #[prost(int64, tag = "1")]
        Offset(i64),
        #[prost(message, tag = "2")]
        Tuple(super::WindowTuple),
        #[prost(message, tag = "3")]
        Expr(Box<super::Expr>),
        #[prost(message, tag = "4")]
        Literal(super::Literal),
    }
}

/// `(start, end)` frame bound; an unset side is unbounded
#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
pub struct WindowTuple {
    #[prost(int64, optional, tag = "1")]
    #[serde(default)]
    pub start_value: Option<i64>,
    #[prost(int64, optional, tag = "2")]
    #[serde(default)]
    pub end_value: Option<i64>,
}

/// Top-level envelope: the root expression plus its shared table references
#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
pub struct Query {
    #[prost(string, tag = "1")]
    pub r#type: String,
    #[prost(message, optional, tag = "2")]
    pub value: Option<QueryValue>,
}

#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
pub struct QueryValue {
    #[prost(message, optional, tag = "1")]
    pub expr: Option<Expr>,
    #[prost(message, repeated, tag = "2")]
    #[serde(default)]
    pub table_refs: Vec<Expr>,
}
