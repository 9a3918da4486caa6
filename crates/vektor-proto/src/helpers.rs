//! Construction helpers for the wire messages

use std::collections::BTreeMap;

use crate::messages::*;

pub const QUERY_TYPE: &str = "query";
pub const SCHEMA_TYPE: &str = "schema";
pub const WINDOW_TYPE: &str = "window";
pub const LITERAL_OPNAME: &str = "Literal";

impl From<bool> for primitive::Value {
    fn from(v: bool) -> Self {
        primitive::Value::Bool(v)
    }
}

impl From<i64> for primitive::Value {
    fn from(v: i64) -> Self {
        primitive::Value::Int(v)
    }
}

impl From<u64> for primitive::Value {
    fn from(v: u64) -> Self {
        primitive::Value::Uint(v)
    }
}

impl From<f64> for primitive::Value {
    fn from(v: f64) -> Self {
        primitive::Value::Double(v)
    }
}

impl From<&str> for primitive::Value {
    fn from(v: &str) -> Self {
        primitive::Value::String(v.to_string())
    }
}

impl From<String> for primitive::Value {
    fn from(v: String) -> Self {
        primitive::Value::String(v)
    }
}

pub fn make_primitive(value: impl Into<primitive::Value>) -> Primitive {
    Primitive {
        value: Some(value.into()),
    }
}

pub fn make_literal(dtype: impl Into<String>, value: literal::Value) -> Literal {
    Literal {
        opname: LITERAL_OPNAME.to_string(),
        dtype: dtype.into(),
        value: Some(value),
    }
}

pub fn make_geometry(wkt: impl Into<String>, crs: Option<String>) -> Geometry {
    Geometry {
        wkt: wkt.into(),
        crs,
    }
}

impl From<Expr> for MapValue {
    fn from(v: Expr) -> Self {
        MapValue {
            value: Some(map_value::Value::Expr(Box::new(v))),
        }
    }
}

impl From<Literal> for MapValue {
    fn from(v: Literal) -> Self {
        MapValue {
            value: Some(map_value::Value::Literal(v)),
        }
    }
}

impl From<Schema> for MapValue {
    fn from(v: Schema) -> Self {
        MapValue {
            value: Some(map_value::Value::Schema(v)),
        }
    }
}

impl From<Window> for MapValue {
    fn from(v: Window) -> Self {
        MapValue {
            value: Some(map_value::Value::Window(Box::new(v))),
        }
    }
}

impl From<Primitive> for MapValue {
    fn from(v: Primitive) -> Self {
        MapValue {
            value: Some(map_value::Value::Primitive(v)),
        }
    }
}

impl From<Vec<MapValue>> for MapValue {
    fn from(values: Vec<MapValue>) -> Self {
        MapValue {
            value: Some(map_value::Value::List(MapValueList { values })),
        }
    }
}

/// Wrap anything that can sit in an operand map
pub fn make_map_value(value: impl Into<MapValue>) -> MapValue {
    value.into()
}

pub fn make_expr(
    opname: impl Into<String>,
    r#type: impl Into<String>,
    alias: u32,
    name: Option<String>,
    value: BTreeMap<String, MapValue>,
) -> Expr {
    Expr {
        opname: opname.into(),
        r#type: r#type.into(),
        name: name.unwrap_or_default(),
        alias,
        value,
    }
}

/// Alias-only reference to entry `alias` of the enclosing query's table refs
pub fn make_table_ref(opname: impl Into<String>, r#type: impl Into<String>, alias: u32) -> Expr {
    make_expr(opname, r#type, alias, None, BTreeMap::new())
}

pub fn make_query(expr: Expr, table_refs: Vec<Expr>) -> Query {
    Query {
        r#type: QUERY_TYPE.to_string(),
        value: Some(QueryValue {
            expr: Some(expr),
            table_refs,
        }),
    }
}

pub fn make_schema(names: Vec<String>, types: Vec<SchemaType>) -> Schema {
    Schema {
        r#type: SCHEMA_TYPE.to_string(),
        value: Some(SchemaValue { names, types }),
    }
}

pub fn make_schema_type(class_name: impl Into<String>, payload: Option<schema_type::Value>) -> SchemaType {
    SchemaType {
        r#type: class_name.into(),
        value: payload,
    }
}

pub fn make_window_param(value: Option<window_param::Value>) -> Option<WindowParam> {
    value.map(|v| WindowParam { value: Some(v) })
}

pub fn make_window_tuple(start: Option<i64>, end: Option<i64>) -> window_param::Value {
    window_param::Value::Tuple(WindowTuple {
        start_value: start,
        end_value: end,
    })
}

pub fn make_window(
    group_by: Vec<MapValue>,
    order_by: Vec<MapValue>,
    preceding: Option<window_param::Value>,
    following: Option<window_param::Value>,
    max_lookback: Option<window_param::Value>,
    how: impl Into<String>,
) -> Window {
    Window {
        r#type: WINDOW_TYPE.to_string(),
        value: Some(WindowValue {
            group_by,
            order_by,
            preceding: make_window_param(preceding),
            following: make_window_param(following),
            max_lookback: make_window_param(max_lookback),
            how: how.into(),
        }),
    }
}

impl Expr {
    /// Operand `name`, if present
    pub fn operand(&self, name: &str) -> Option<&map_value::Value> {
        self.value.get(name).and_then(|v| v.value.as_ref())
    }

    /// Copy of this node with the alias cleared
    pub fn without_alias(&self) -> Expr {
        Expr {
            alias: 0,
            ..self.clone()
        }
    }
}

impl Query {
    pub fn expr(&self) -> Option<&Expr> {
        self.value.as_ref().and_then(|v| v.expr.as_ref())
    }

    pub fn table_refs(&self) -> &[Expr] {
        self.value
            .as_ref()
            .map(|v| v.table_refs.as_slice())
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_make_expr_omits_empty_name() {
        let mut value = BTreeMap::new();
        value.insert("name".to_string(), make_map_value(make_primitive("ports_v1")));
        let expr = make_expr("UnboundTable", "table", 1, None, value);

        assert_eq!(expr.name, "");
        assert_eq!(expr.alias, 1);
        assert!(matches!(
            expr.operand("name"),
            Some(map_value::Value::Primitive(Primitive {
                value: Some(primitive::Value::String(s))
            })) if s == "ports_v1"
        ));
        assert_eq!(expr.without_alias().alias, 0);
    }

    #[test]
    fn test_make_window_params() {
        let window = make_window(
            vec![],
            vec![],
            Some(window_param::Value::Offset(3)),
            Some(make_window_tuple(None, Some(0))),
            None,
            "rows",
        );
        let value = window.value.unwrap();
        assert_eq!(window.r#type, WINDOW_TYPE);
        assert_eq!(
            value.preceding.unwrap().value,
            Some(window_param::Value::Offset(3))
        );
        assert_eq!(
            value.following.unwrap().value,
            Some(window_param::Value::Tuple(WindowTuple {
                start_value: None,
                end_value: Some(0)
            }))
        );
        assert!(value.max_lookback.is_none());
    }

    #[test]
    fn test_list_map_value() {
        let list = make_map_value(vec![
            make_map_value(make_primitive(1i64)),
            make_map_value(make_primitive(2i64)),
        ]);
        match list.value {
            Some(map_value::Value::List(l)) => assert_eq!(l.values.len(), 2),
            other => panic!("expected list, got {:?}", other),
        }
    }

    #[test]
    fn test_query_accessors() {
        let query = make_query(make_table_ref("UnboundTable", "table", 1), vec![]);
        assert_eq!(query.r#type, QUERY_TYPE);
        assert_eq!(query.expr().unwrap().alias, 1);
        assert!(query.table_refs().is_empty());
        assert!(Query::default().expr().is_none());
    }
}
