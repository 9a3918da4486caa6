//! Expression tree to wire messages

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::{debug, trace};
use vektor_ir::{Arg, Expr, Operation};
use vektor_proto::{
    self as proto, make_expr, make_map_value, make_primitive, make_query, make_table_ref, MapValue,
};
use vektor_registry::OperatorRegistry;

use crate::literal::encode_literal;
use crate::schema::encode_schema;
use crate::{builtin_registry, EncodeError};

/// Table references found while walking one tree.
///
/// Aliases are 1-based so that 0 can mean "not a reference" on the wire.
/// Leaf tables are shared structurally: two handles to the same named table
/// with the same schema get one alias.
#[derive(Debug, Default)]
pub struct FormatMemo {
    aliases: HashMap<usize, u32>,
    refs: Vec<Expr>,
    formatted: Vec<proto::Expr>,
    column_parents: HashSet<usize>,
    visited: HashSet<usize>,
}

impl FormatMemo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `expr` as a table reference, returning its alias
    pub fn observe(&mut self, expr: &Expr) -> u32 {
        let id = expr.node_id();
        if let Some(alias) = self.aliases.get(&id) {
            return *alias;
        }
        let alias = self.find_equal_table(expr).unwrap_or_else(|| {
            self.refs.push(expr.clone());
            self.refs.len() as u32
        });
        self.aliases.insert(id, alias);
        alias
    }

    fn find_equal_table(&self, expr: &Expr) -> Option<u32> {
        if !matches!(expr.op(), Operation::Table(_)) {
            return None;
        }
        self.refs
            .iter()
            .position(|r| matches!(r.op(), Operation::Table(_)) && r == expr)
            .map(|i| i as u32 + 1)
    }

    pub fn get_alias(&self, expr: &Expr) -> Option<u32> {
        self.aliases.get(&expr.node_id()).copied()
    }

    pub fn len(&self) -> usize {
        self.refs.len()
    }

    /// Mark a node visited; false if it already was
    fn visit(&mut self, expr: &Expr) -> bool {
        self.visited.insert(expr.node_id())
    }
}

/// Serializes one expression tree.
///
/// ```ignore
/// let mut ser = AstSerializer::new(&expr);
/// let ast = ser.serialize()?;
/// let query = make_query(ast, ser.table_refs());
/// ```
pub struct AstSerializer<'a> {
    expr: Expr,
    registry: &'a OperatorRegistry,
    memo: FormatMemo,
}

impl AstSerializer<'static> {
    pub fn new(expr: &Expr) -> Self {
        AstSerializer::with_registry(expr, builtin_registry())
    }
}

impl<'a> AstSerializer<'a> {
    pub fn with_registry(expr: &Expr, registry: &'a OperatorRegistry) -> Self {
        Self {
            expr: expr.clone(),
            registry,
            memo: FormatMemo::new(),
        }
    }

    pub fn memo(&self) -> &FormatMemo {
        &self.memo
    }

    /// Formatted table-ref definitions, in alias order, with their own alias
    /// stripped. Empty until [`AstSerializer::serialize`] has run.
    pub fn table_refs(&self) -> Vec<proto::Expr> {
        self.memo.formatted.clone()
    }

    /// Emit the root expression, filling in the table-ref list as a side
    /// effect
    pub fn serialize(&mut self) -> Result<proto::Expr, EncodeError> {
        let root = self.expr.clone();
        let mut seen = HashSet::new();
        self.find_column_parents(&root, &mut seen);
        self.memoize_tables(&root, true);

        let emitter = Emitter {
            registry: self.registry,
            memo: &self.memo,
        };
        let formatted = self
            .memo
            .refs
            .iter()
            .map(|table| Ok(emitter.format_node(table)?.without_alias()))
            .collect::<Result<Vec<_>, EncodeError>>()?;
        let ast = emitter.format_node(&root)?;
        self.memo.formatted = formatted;
        debug!(
            opname = %ast.opname,
            table_refs = self.memo.len(),
            registry = self.registry.version(),
            "serialized expression"
        );
        Ok(ast)
    }

    /// Serialize and wrap in a query envelope
    pub fn into_query(mut self) -> Result<proto::Query, EncodeError> {
        let ast = self.serialize()?;
        Ok(make_query(ast, self.memo.formatted))
    }

    /// Tables that columns read from. These are sent once as references
    /// rather than inlined under every column.
    fn find_column_parents(&mut self, expr: &Expr, seen: &mut HashSet<usize>) {
        if !seen.insert(expr.node_id()) {
            return;
        }
        if let Operation::TableColumn { table, .. } = expr.op() {
            self.memo.column_parents.insert(table.node_id());
        }
        for child in expr.op().children() {
            self.find_column_parents(child, seen);
        }
    }

    /// Post-order walk registering table references. Operands are visited
    /// before the node, so a reference always gets a smaller alias than
    /// any reference that consumes it.
    fn memoize_tables(&mut self, expr: &Expr, is_root: bool) {
        if !self.memo.visit(expr) {
            return;
        }
        let op = expr.op();
        if let Operation::Table(_) = op {
            self.memo.observe(expr);
            return;
        }
        for child in op.children() {
            self.memoize_tables(child, false);
        }
        let shared_table = matches!(
            op,
            Operation::Selection { .. } | Operation::Aggregation { .. } | Operation::SelfReference { .. }
        ) || self.memo.column_parents.contains(&expr.node_id());
        if shared_table && !is_root {
            self.memo.observe(expr);
        }
    }
}

/// Formats nodes against a finished memo
pub(crate) struct Emitter<'a> {
    pub(crate) registry: &'a OperatorRegistry,
    pub(crate) memo: &'a FormatMemo,
}

impl Emitter<'_> {
    /// Full emission of one operator node
    fn format_node(&self, expr: &Expr) -> Result<proto::Expr, EncodeError> {
        let op = expr.op();
        trace!(opname = op.opname(), "formatting node");
        if let Operation::Literal { value, dtype } = op {
            return Ok(literal_node(expr, encode_literal(value, dtype)?));
        }
        self.registry.check_operation(op)?;

        let mut value = BTreeMap::new();
        for (name, arg) in op.args() {
            let formatted = match (op, name, arg) {
                (Operation::TableColumn { .. }, "table", Arg::Expr(table)) => {
                    match self.memo.get_alias(table) {
                        Some(alias) => make_map_value(make_primitive(alias as i64)),
                        None => make_map_value(self.format_node(table)?),
                    }
                }
                (_, _, Arg::Expr(e)) => self.format_operand(e)?,
                (_, _, Arg::Exprs(es)) => {
                    if es.is_empty() {
                        continue;
                    }
                    let items = es
                        .iter()
                        .map(|e| self.format_operand(e))
                        .collect::<Result<Vec<_>, _>>()?;
                    make_map_value(items)
                }
                (_, _, Arg::Str(s)) => make_map_value(make_primitive(s)),
                (_, _, Arg::Int(i)) => make_map_value(make_primitive(i)),
                (_, _, Arg::Bool(b)) => make_map_value(make_primitive(b)),
                (_, _, Arg::DataType(dt)) => {
                    make_map_value(make_expr("", dt.to_string(), 0, None, BTreeMap::new()))
                }
                (_, _, Arg::Window(w)) => make_map_value(self.format_window(w)?),
                (_, _, Arg::Schema(s)) => make_map_value(encode_schema(s)),
            };
            value.insert(name.to_string(), formatted);
        }

        Ok(make_expr(
            op.opname(),
            expr.type_display(),
            self.memo.get_alias(expr).unwrap_or(0),
            expr.explicit_name().map(String::from),
            value,
        ))
    }

    /// A sub-expression in operand position: unnamed literals become bare
    /// literal messages, registered tables become alias-only references
    pub(crate) fn format_operand(&self, expr: &Expr) -> Result<MapValue, EncodeError> {
        match expr.op() {
            Operation::Literal { value, dtype } if expr.explicit_name().is_none() => {
                Ok(make_map_value(encode_literal(value, dtype)?))
            }
            _ => Ok(make_map_value(self.format_subexpr(expr)?)),
        }
    }

    /// A sub-expression that needs an `Expr` node of its own
    pub(crate) fn format_subexpr(&self, expr: &Expr) -> Result<proto::Expr, EncodeError> {
        match self.memo.get_alias(expr) {
            Some(alias) => {
                let mut node = make_table_ref(expr.op().opname(), expr.type_display(), alias);
                node.name = expr.explicit_name().unwrap_or_default().to_string();
                Ok(node)
            }
            None => self.format_node(expr),
        }
    }
}

/// `Literal` node wrapping the literal message, for literals that carry a
/// name or stand at the root
fn literal_node(expr: &Expr, literal: proto::Literal) -> proto::Expr {
    let mut value = BTreeMap::new();
    value.insert("value".to_string(), make_map_value(literal));
    make_expr(
        proto::LITERAL_OPNAME,
        expr.type_display(),
        0,
        expr.explicit_name().map(String::from),
        value,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use vektor_ir::{DataType, Schema};
    use vektor_proto::{map_value, primitive};

    fn table(name: &str) -> Expr {
        Expr::database_table(
            name,
            Schema::from_pairs([
                ("wof_id", DataType::Int64),
                ("wof_name", DataType::String),
                ("geom", DataType::geography(4326)),
            ]),
        )
    }

    #[test]
    fn test_single_table_scan() {
        let t = table("whosonfirst");
        let expr = t
            .select(vec![t.column("geom").unwrap(), t.column("wof_id").unwrap()])
            .unwrap()
            .filter(vec![t.column("wof_id").unwrap().gt(100)])
            .unwrap();

        let mut ser = AstSerializer::new(&expr);
        let ast = ser.serialize().unwrap();
        let refs = ser.table_refs();

        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].opname, "DatabaseTable");
        assert_eq!(refs[0].alias, 0);

        assert_eq!(ast.opname, "Selection");
        assert_eq!(ast.r#type, "table");
        assert_eq!(ast.alias, 0);

        // the selection's own table operand is an alias-only reference
        match ast.operand("table") {
            Some(map_value::Value::Expr(node)) => {
                assert_eq!(node.alias, 1);
                assert!(node.value.is_empty());
            }
            other => panic!("expected table ref, got {:?}", other),
        }

        // columns point at the table by alias
        let selections = match ast.operand("selections") {
            Some(map_value::Value::List(list)) => list.values.clone(),
            other => panic!("expected list, got {:?}", other),
        };
        assert_eq!(selections.len(), 2);
        for sel in selections {
            let node = match sel.value {
                Some(map_value::Value::Expr(node)) => node,
                other => panic!("expected expr, got {:?}", other),
            };
            assert_eq!(node.opname, "TableColumn");
            assert_eq!(
                node.operand("table"),
                Some(&map_value::Value::Primitive(proto::Primitive {
                    value: Some(primitive::Value::Int(1))
                }))
            );
        }
        assert!(ast.operand("sort_keys").is_none());
    }

    #[test]
    fn test_root_table_keeps_alias() {
        let t = table("whosonfirst");
        let mut ser = AstSerializer::new(&t);
        let ast = ser.serialize().unwrap();
        assert_eq!(ast.alias, 1);
        assert_eq!(ser.table_refs().len(), 1);
        assert_eq!(ser.table_refs()[0], ast.without_alias());
    }

    #[test]
    fn test_equal_tables_share_alias() {
        let a = table("whosonfirst");
        let b = table("whosonfirst");
        let expr = a.union(&b, false).unwrap();
        let mut ser = AstSerializer::new(&expr);
        ser.serialize().unwrap();
        assert_eq!(ser.memo().len(), 1);
        assert_eq!(ser.memo().get_alias(&a), ser.memo().get_alias(&b));
    }

    #[test]
    fn test_nested_selection_is_registered_after_its_table() {
        let t = table("whosonfirst");
        let inner = t.filter(vec![t.column("wof_id").unwrap().gt(1)]).unwrap();
        let expr = inner.limit(10, 0).unwrap();

        let mut ser = AstSerializer::new(&expr);
        let ast = ser.serialize().unwrap();
        assert_eq!(ser.memo().get_alias(&t), Some(1));
        assert_eq!(ser.memo().get_alias(&inner), Some(2));
        assert_eq!(ser.memo().get_alias(&expr), None);
        assert_eq!(ast.opname, "Limit");
    }

    #[test]
    fn test_explicit_name_emitted() {
        let t = table("whosonfirst");
        let expr = t
            .select(vec![t.column("wof_name").unwrap().name("name"), t.column("wof_id").unwrap().name("wof_id")])
            .unwrap();
        let mut ser = AstSerializer::new(&expr);
        let ast = ser.serialize().unwrap();
        let names: Vec<String> = match ast.operand("selections") {
            Some(map_value::Value::List(list)) => list
                .values
                .iter()
                .filter_map(|v| match &v.value {
                    Some(map_value::Value::Expr(e)) => Some(e.name.clone()),
                    _ => None,
                })
                .collect(),
            other => panic!("expected list, got {:?}", other),
        };
        assert_eq!(names, vec!["name".to_string(), String::new()]);
    }

    #[test]
    fn test_cast_target_is_type_node() {
        let t = table("whosonfirst");
        let expr = t
            .select(vec![t.column("wof_id").unwrap().cast(DataType::Float64).name("f")])
            .unwrap();
        let mut ser = AstSerializer::new(&expr);
        let ast = ser.serialize().unwrap();
        let cast = match ast.operand("selections") {
            Some(map_value::Value::List(list)) => match &list.values[0].value {
                Some(map_value::Value::Expr(e)) => e.as_ref().clone(),
                other => panic!("expected expr, got {:?}", other),
            },
            other => panic!("expected list, got {:?}", other),
        };
        assert_eq!(cast.opname, "Cast");
        match cast.operand("to") {
            Some(map_value::Value::Expr(to)) => {
                assert_eq!(to.opname, "");
                assert_eq!(to.r#type, "float64");
            }
            other => panic!("expected type node, got {:?}", other),
        }
    }

    fn ports() -> Expr {
        Expr::database_table(
            "ports",
            Schema::from_pairs([("port_id", DataType::Int64), ("port_name", DataType::String)]),
        )
    }

    fn count_opname(node: &proto::Expr, opname: &str) -> usize {
        let own = usize::from(node.opname == opname && !node.value.is_empty());
        own + node
            .value
            .values()
            .filter_map(|v| v.value.as_ref())
            .map(|v| count_in(v, opname))
            .sum::<usize>()
    }

    fn count_in(value: &map_value::Value, opname: &str) -> usize {
        match value {
            map_value::Value::Expr(e) => count_opname(e, opname),
            map_value::Value::List(list) => list
                .values
                .iter()
                .filter_map(|v| v.value.as_ref())
                .map(|v| count_in(v, opname))
                .sum(),
            _ => 0,
        }
    }

    #[test]
    fn test_join_read_by_columns_is_sent_once() {
        let a = table("whosonfirst");
        let b = ports();
        let joined = a
            .inner_join(&b, vec![a.column("wof_id").unwrap().eq(b.column("port_id").unwrap())])
            .unwrap();
        let expr = joined
            .select(vec![
                joined.column("wof_name").unwrap(),
                joined.column("port_name").unwrap(),
                joined.column("port_id").unwrap(),
            ])
            .unwrap();

        let mut ser = AstSerializer::new(&expr);
        let ast = ser.serialize().unwrap();
        let refs = ser.table_refs();

        let opnames: Vec<&str> = refs.iter().map(|r| r.opname.as_str()).collect();
        assert_eq!(opnames, vec!["DatabaseTable", "DatabaseTable", "InnerJoin"]);
        assert_eq!(ser.memo().get_alias(&joined), Some(3));
        assert_eq!(count_opname(&ast, "InnerJoin"), 0);
        assert_eq!(refs.iter().map(|r| count_opname(r, "InnerJoin")).sum::<usize>(), 1);
    }

    #[test]
    fn test_named_literal_is_wrapped() {
        let t = table("whosonfirst");
        let expr = t
            .select(vec![
                t.column("wof_id").unwrap(),
                Expr::literal(1).unwrap().name("one"),
                Expr::literal(2).unwrap(),
            ])
            .unwrap();
        let mut ser = AstSerializer::new(&expr);
        let ast = ser.serialize().unwrap();
        let values = match ast.operand("selections") {
            Some(map_value::Value::List(list)) => list.values.clone(),
            other => panic!("expected list, got {:?}", other),
        };
        match &values[1].value {
            Some(map_value::Value::Expr(node)) => {
                assert_eq!(node.opname, "Literal");
                assert_eq!(node.name, "one");
                assert!(matches!(node.operand("value"), Some(map_value::Value::Literal(_))));
            }
            other => panic!("expected literal node, got {:?}", other),
        }
        assert!(matches!(values[2].value, Some(map_value::Value::Literal(_))));
    }

    #[test]
    fn test_root_literal_is_a_node() {
        let mut ser = AstSerializer::new(&Expr::literal(5).unwrap());
        let ast = ser.serialize().unwrap();
        assert_eq!(ast.opname, "Literal");
        assert!(ser.table_refs().is_empty());
        assert!(matches!(ast.operand("value"), Some(map_value::Value::Literal(_))));
    }
}
