//! Wire messages back to expression trees

use std::collections::HashMap;

use sha2::{Digest, Sha256};
use tracing::{debug, trace, warn};
use vektor_ir::{
    BinaryOp, DataType, Expr, GeoBinaryOp, JoinKind, Operation, PhysicalTable, ReductionOp,
    Schema, SetOpKind, TableKind, UnaryOp, Window,
};
use vektor_proto::{self as proto, map_value, primitive};
use vektor_registry::OperatorRegistry;

use crate::literal::decode_literal;
use crate::schema::decode_schema;
use crate::{builtin_registry, DeserializeError};

type Result<T> = std::result::Result<T, DeserializeError>;

/// Result of decoding one `Expr` message: either an operator node or a bare
/// type node (empty opname, only `type` set)
enum Decoded {
    Expr(Expr),
    DataType(DataType),
}

/// Decoded nodes keyed by the content digest of their wire node
#[derive(Default)]
struct DigestMemo {
    arena: Vec<Expr>,
    index: HashMap<[u8; 32], usize>,
}

impl DigestMemo {
    fn get(&self, key: &[u8; 32]) -> Option<Expr> {
        self.index.get(key).map(|&i| self.arena[i].clone())
    }

    fn insert(&mut self, key: [u8; 32], expr: Expr) {
        self.index.insert(key, self.arena.len());
        self.arena.push(expr);
    }
}

/// Rebuilds expression trees from wire messages.
///
/// Structurally identical subtrees decode to one shared node, and inside a
/// query every alias resolves to the table-ref decoded at that position.
pub struct AstDeserializer<'a> {
    registry: &'a OperatorRegistry,
    table_refs: Option<Vec<Expr>>,
    memo: DigestMemo,
    /// Content digests of the wire nodes currently borrowed for decoding,
    /// keyed by node address. Cleared when each top-level call returns.
    digests: HashMap<usize, [u8; 32]>,
}

impl AstDeserializer<'static> {
    pub fn new() -> Self {
        AstDeserializer::with_registry(builtin_registry())
    }
}

impl Default for AstDeserializer<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> AstDeserializer<'a> {
    pub fn with_registry(registry: &'a OperatorRegistry) -> Self {
        Self {
            registry,
            table_refs: None,
            memo: DigestMemo::default(),
            digests: HashMap::new(),
        }
    }

    /// Decode a query: table refs first, in order, then the root.
    ///
    /// A ref may only point at refs before it; the root may point at any.
    pub fn deserialize_query(&mut self, query: &proto::Query) -> Result<Expr> {
        if !query.r#type.is_empty() && query.r#type != proto::QUERY_TYPE {
            warn!(r#type = %query.r#type, "query envelope has unexpected type");
        }
        let root = query
            .expr()
            .ok_or_else(|| DeserializeError::invalid("Query has no expression"))?;
        let refs = query.table_refs();
        debug!(
            opname = %root.opname,
            table_refs = refs.len(),
            "deserializing query"
        );

        self.scoped(Vec::with_capacity(refs.len()), |de| de.decode_query_body(root, refs))
    }

    /// Decode `expr` against tables the caller has already rebuilt. Alias
    /// `n` resolves to `table_refs[n - 1]`.
    pub fn deserialize_with_refs(&mut self, expr: &proto::Expr, table_refs: &[Expr]) -> Result<Expr> {
        debug!(
            opname = %expr.opname,
            table_refs = table_refs.len(),
            "deserializing expression"
        );
        self.scoped(table_refs.to_vec(), |de| de.decode_expr(expr))
    }

    /// Run `decode` with its own table refs and memo; aliases and digests
    /// are only meaningful within one query
    fn scoped<T>(&mut self, refs: Vec<Expr>, decode: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let saved_refs = self.table_refs.replace(refs);
        let saved_memo = std::mem::take(&mut self.memo);
        let result = decode(self);
        self.table_refs = saved_refs;
        self.memo = saved_memo;
        self.digests.clear();
        result
    }

    fn decode_query_body(&mut self, root: &proto::Expr, refs: &[proto::Expr]) -> Result<Expr> {
        for (i, node) in refs.iter().enumerate() {
            // a definition's own alias is its position, not a reference
            let table = match self.decode_definition(node)? {
                Decoded::Expr(expr) => expr,
                Decoded::DataType(dt) => {
                    return Err(DeserializeError::invalid(format!(
                        "Table reference {} is the data type {}",
                        i + 1,
                        dt
                    )))
                }
            };
            if !table.is_table() {
                warn!(position = i + 1, opname = %node.opname, "table ref is not a table");
                return Err(DeserializeError::invalid(format!(
                    "Table reference {} is a {}, not a table",
                    i + 1,
                    node.opname
                )));
            }
            if let Some(decoded) = self.table_refs.as_mut() {
                decoded.push(table);
            }
        }
        self.decode_expr(root)
    }

    /// Decode a single expression outside of any query. Alias references
    /// cannot be resolved here.
    pub fn deserialize(&mut self, expr: &proto::Expr) -> Result<Expr> {
        debug!(opname = %expr.opname, "deserializing expression");
        let result = self.decode_expr(expr);
        self.digests.clear();
        result
    }

    pub(crate) fn decode_expr(&mut self, node: &proto::Expr) -> Result<Expr> {
        match self.decode_node(node)? {
            Decoded::Expr(expr) => Ok(expr),
            Decoded::DataType(dt) => Err(DeserializeError::invalid(format!(
                "Expected an expression, found data type {}",
                dt
            ))),
        }
    }

    pub(crate) fn decode_literal_expr(&mut self, lit: &proto::Literal) -> Result<Expr> {
        let (value, dtype) = decode_literal(lit)?;
        Ok(Expr::literal_typed(value, dtype))
    }

    /// Any operand that stands for an expression
    pub(crate) fn decode_operand(&mut self, value: &map_value::Value) -> Result<Expr> {
        match value {
            map_value::Value::Expr(node) => self.decode_expr(node),
            map_value::Value::Literal(lit) => self.decode_literal_expr(lit),
            other => Err(DeserializeError::invalid(format!(
                "Expected an expression operand, found {}",
                kind_of(other)
            ))),
        }
    }

    fn decode_node(&mut self, node: &proto::Expr) -> Result<Decoded> {
        if node.alias != 0 && self.table_refs.is_some() {
            let table = self.resolve_alias(i64::from(node.alias))?;
            return Ok(Decoded::Expr(match node.name.as_str() {
                "" => table,
                name => table.name(name),
            }));
        }
        self.decode_definition(node)
    }

    /// Decode the node's own content, ignoring its alias
    fn decode_definition(&mut self, node: &proto::Expr) -> Result<Decoded> {
        if node.opname.is_empty() {
            if node.r#type.is_empty() {
                warn!("rejecting node with neither opname nor type");
                return Err(DeserializeError::Operation(
                    "No opname or type defined in Expr".to_string(),
                ));
            }
            let dt = node.r#type.parse::<DataType>().map_err(|e| {
                warn!(type_name = %node.r#type, "rejecting unknown data type");
                DeserializeError::DataType(format!("{}: {}", node.r#type, e))
            })?;
            return Ok(Decoded::DataType(dt));
        }

        let key = self.node_digest(node);
        if let Some(expr) = self.memo.get(&key) {
            trace!(opname = %node.opname, "reusing decoded node");
            return Ok(Decoded::Expr(expr));
        }

        if node.opname == proto::LITERAL_OPNAME {
            let expr = match operand(node, "value")? {
                map_value::Value::Literal(lit) => self.decode_literal_expr(lit)?,
                other => return Err(mismatch(node, "value", "literal", other)),
            };
            let expr = match node.name.as_str() {
                "" => expr,
                name => expr.name(name),
            };
            self.memo.insert(key, expr.clone());
            return Ok(Decoded::Expr(expr));
        }
        let registry = self.registry;
        let sig = registry.lookup(&node.opname).map_err(|e| {
            warn!(opname = %node.opname, "rejecting unknown operation");
            DeserializeError::Operation(e.to_string())
        })?;
        sig.check_operands(node.value.keys().map(String::as_str))
            .map_err(|e| DeserializeError::invalid(e.to_string()))?;

        trace!(opname = %node.opname, operands = node.value.len(), "decoding node");
        let expr = self.build(node)?;
        let expr = match node.name.as_str() {
            "" => expr,
            name => expr.name(name),
        };
        self.memo.insert(key, expr.clone());
        Ok(Decoded::Expr(expr))
    }

    /// Digest of everything in `node` except its own alias. Child nodes
    /// contribute their alias and their own digest, so each wire node is
    /// hashed once.
    fn node_digest(&mut self, node: &proto::Expr) -> [u8; 32] {
        let addr = node as *const proto::Expr as usize;
        if let Some(digest) = self.digests.get(&addr) {
            return *digest;
        }
        let mut hasher = Sha256::new();
        feed(&mut hasher, node.opname.as_bytes());
        feed(&mut hasher, node.r#type.as_bytes());
        feed(&mut hasher, node.name.as_bytes());
        for (name, value) in &node.value {
            feed(&mut hasher, name.as_bytes());
            let digest = self.value_digest(value);
            hasher.update(digest);
        }
        let digest: [u8; 32] = hasher.finalize().into();
        self.digests.insert(addr, digest);
        digest
    }

    fn value_digest(&mut self, value: &proto::MapValue) -> [u8; 32] {
        let mut hasher = Sha256::new();
        match &value.value {
            None => hasher.update(b"none"),
            Some(map_value::Value::Expr(child)) => {
                hasher.update(b"expr");
                hasher.update(child.alias.to_le_bytes());
                hasher.update(self.node_digest(child));
            }
            Some(map_value::Value::List(list)) => {
                hasher.update(b"list");
                hasher.update((list.values.len() as u64).to_le_bytes());
                for item in &list.values {
                    hasher.update(self.value_digest(item));
                }
            }
            Some(map_value::Value::Literal(lit)) => {
                hasher.update(b"literal");
                hasher.update(proto::digest(lit));
            }
            Some(map_value::Value::Schema(schema)) => {
                hasher.update(b"schema");
                hasher.update(proto::digest(schema));
            }
            Some(map_value::Value::Window(window)) => {
                hasher.update(b"window");
                hasher.update(proto::digest(window.as_ref()));
            }
            Some(map_value::Value::Primitive(primitive)) => {
                hasher.update(b"primitive");
                hasher.update(proto::digest(primitive));
            }
        }
        hasher.finalize().into()
    }

    fn resolve_alias(&self, alias: i64) -> Result<Expr> {
        let refs = self.table_refs.as_deref().unwrap_or(&[]);
        usize::try_from(alias)
            .ok()
            .and_then(|a| a.checked_sub(1))
            .and_then(|i| refs.get(i))
            .cloned()
            .ok_or_else(|| {
                warn!(alias, known = refs.len(), "alias outside table refs");
                DeserializeError::invalid(format!(
                    "Table reference {} out of range, {} known",
                    alias,
                    refs.len()
                ))
            })
    }

    fn build(&mut self, node: &proto::Expr) -> Result<Expr> {
        let op = match node.opname.as_str() {
            "DatabaseTable" | "UnboundTable" => Operation::Table(PhysicalTable {
                kind: TableKind::Unbound,
                name: self.string(node, "name")?,
                schema: self.schema(node, "schema")?,
            }),
            "Selection" => Operation::Selection {
                table: self.table(node, "table")?,
                selections: self.exprs(node, "selections")?,
                predicates: self.exprs(node, "predicates")?,
                sort_keys: self.exprs(node, "sort_keys")?,
            },
            "Aggregation" => Operation::Aggregation {
                table: self.table(node, "table")?,
                metrics: self.exprs(node, "metrics")?,
                by: self.exprs(node, "by")?,
                having: self.exprs(node, "having")?,
                predicates: self.exprs(node, "predicates")?,
                sort_keys: self.exprs(node, "sort_keys")?,
            },
            "SelfReference" => Operation::SelfReference {
                table: self.table(node, "table")?,
            },
            "Distinct" => Operation::Distinct {
                table: self.table(node, "table")?,
            },
            "Limit" => Operation::Limit {
                table: self.table(node, "table")?,
                n: self.int(node, "n")?,
                offset: self.opt_int(node, "offset")?.unwrap_or(0),
            },
            "CrossJoin" => return self.cross_join(node),
            "TableColumn" => return self.table_column(node),
            "StructField" => {
                let arg = self.expr(node, "arg")?;
                let field = self.string(node, "field")?;
                return arg
                    .field(field)
                    .map_err(|e| DeserializeError::invalid(e.to_string()));
            }
            "Cast" => Operation::Cast {
                arg: self.expr(node, "arg")?,
                to: self.dtype(node, "to")?,
            },
            "Contains" => Operation::Contains {
                value: self.expr(node, "value")?,
                options: self.exprs(node, "options")?,
            },
            "GeoDWithin" => Operation::GeoDWithin {
                left: self.expr(node, "left")?,
                right: self.expr(node, "right")?,
                distance: self.expr(node, "distance")?,
            },
            "GeoArea" => Operation::GeoArea {
                arg: self.expr(node, "arg")?,
            },
            "SortKey" => Operation::SortKey {
                expr: self.expr(node, "expr")?,
                ascending: self.opt_bool(node, "ascending")?.unwrap_or(true),
            },
            "WindowOp" => Operation::WindowOp {
                expr: self.expr(node, "expr")?,
                window: self.window(node, "window")?,
            },
            opname => self.build_family(opname, node)?,
        };
        Ok(Expr::new(op))
    }

    /// Operators that share a node shape and differ only by kind
    fn build_family(&mut self, opname: &str, node: &proto::Expr) -> Result<Operation> {
        if let Some(kind) = JoinKind::from_opname(opname) {
            return Ok(Operation::Join {
                kind,
                left: self.table(node, "left")?,
                right: self.table(node, "right")?,
                predicates: self.exprs(node, "predicates")?,
            });
        }
        if let Some(kind) = SetOpKind::from_opname(opname) {
            return Ok(Operation::SetOp {
                kind,
                left: self.table(node, "left")?,
                right: self.table(node, "right")?,
                distinct: self.opt_bool(node, "distinct")?.unwrap_or(false),
            });
        }
        if let Some(op) = BinaryOp::from_opname(opname) {
            return Ok(Operation::Binary {
                op,
                left: self.expr(node, "left")?,
                right: self.expr(node, "right")?,
            });
        }
        if let Some(op) = UnaryOp::from_opname(opname) {
            return Ok(Operation::Unary {
                op,
                arg: self.expr(node, "arg")?,
            });
        }
        if let Some(op) = ReductionOp::from_opname(opname) {
            return Ok(Operation::Reduction {
                op,
                arg: self.expr(node, "arg")?,
                where_: self.opt_expr(node, "where")?,
            });
        }
        if let Some(op) = GeoBinaryOp::from_opname(opname) {
            return Ok(Operation::GeoBinary {
                op,
                left: self.expr(node, "left")?,
                right: self.expr(node, "right")?,
            });
        }
        Err(DeserializeError::Operation(format!(
            "Operation not found: {}",
            opname
        )))
    }

    /// `CrossJoin(left, right)`, then any further `tables` folded from the
    /// left
    fn cross_join(&mut self, node: &proto::Expr) -> Result<Expr> {
        let mut joined = Expr::new(Operation::Join {
            kind: JoinKind::Cross,
            left: self.table(node, "left")?,
            right: self.table(node, "right")?,
            predicates: self.exprs(node, "predicates")?,
        });
        for table in self.exprs(node, "tables")? {
            joined = joined
                .join(JoinKind::Cross, &table, vec![])
                .map_err(|e| DeserializeError::invalid(e.to_string()))?;
        }
        Ok(joined)
    }

    /// The `table` operand is either an alias into the query's table refs
    /// or an inline table node
    fn table_column(&mut self, node: &proto::Expr) -> Result<Expr> {
        let table = match operand(node, "table")? {
            map_value::Value::Primitive(proto::Primitive {
                value: Some(primitive::Value::Int(alias)),
            }) => self.column_table(*alias)?,
            map_value::Value::Primitive(proto::Primitive {
                value: Some(primitive::Value::Uint(alias)),
            }) => self.column_table(i64::try_from(*alias).unwrap_or(i64::MAX))?,
            map_value::Value::Expr(inner) => self.decode_expr(inner)?,
            other => {
                return Err(DeserializeError::invalid(format!(
                    "TableColumn table must be an alias or a table, found {}",
                    kind_of(other)
                )))
            }
        };
        if !table.is_table() {
            return Err(DeserializeError::invalid(format!(
                "TableColumn table is a {}, not a table",
                table.op().opname()
            )));
        }
        let name = self.string(node, "name")?;
        Expr::table_column(&table, name).map_err(|e| DeserializeError::invalid(e.to_string()))
    }

    fn column_table(&self, alias: i64) -> Result<Expr> {
        if self.table_refs.is_none() {
            return Err(DeserializeError::invalid(format!(
                "TableColumn refers to unknown table_ref {}",
                alias
            )));
        }
        self.resolve_alias(alias).map_err(|_| {
            DeserializeError::invalid(format!(
                "TableColumn refers to unknown table_ref {}",
                alias
            ))
        })
    }

    // ------------------------------------------------------------------
    // Operand accessors
    // ------------------------------------------------------------------

    fn expr(&mut self, node: &proto::Expr, name: &str) -> Result<Expr> {
        let value = operand(node, name)?;
        self.decode_operand(value)
    }

    fn table(&mut self, node: &proto::Expr, name: &str) -> Result<Expr> {
        let table = self.expr(node, name)?;
        if !table.is_table() {
            return Err(DeserializeError::invalid(format!(
                "{} operand '{}' must be a table, found {}",
                node.opname,
                name,
                table.op().opname()
            )));
        }
        Ok(table)
    }

    fn opt_expr(&mut self, node: &proto::Expr, name: &str) -> Result<Option<Expr>> {
        match node.operand(name) {
            Some(value) => self.decode_operand(value).map(Some),
            None => Ok(None),
        }
    }

    /// A list operand; absent lists are empty
    fn exprs(&mut self, node: &proto::Expr, name: &str) -> Result<Vec<Expr>> {
        match node.operand(name) {
            None => Ok(vec![]),
            Some(map_value::Value::List(list)) => list
                .values
                .iter()
                .map(|item| match &item.value {
                    Some(value) => self.decode_operand(value),
                    None => Err(DeserializeError::invalid(format!(
                        "{} operand '{}' has an empty entry",
                        node.opname, name
                    ))),
                })
                .collect(),
            Some(other) => Err(mismatch(node, name, "list", other)),
        }
    }

    fn string(&self, node: &proto::Expr, name: &str) -> Result<String> {
        match operand(node, name)? {
            map_value::Value::Primitive(proto::Primitive {
                value: Some(primitive::Value::String(s)),
            }) => Ok(s.clone()),
            other => Err(mismatch(node, name, "string", other)),
        }
    }

    fn int(&self, node: &proto::Expr, name: &str) -> Result<i64> {
        self.opt_int(node, name)?
            .ok_or_else(|| missing(node, name))
    }

    fn opt_int(&self, node: &proto::Expr, name: &str) -> Result<Option<i64>> {
        match node.operand(name) {
            None => Ok(None),
            Some(map_value::Value::Primitive(proto::Primitive {
                value: Some(primitive::Value::Int(i)),
            })) => Ok(Some(*i)),
            Some(map_value::Value::Primitive(proto::Primitive {
                value: Some(primitive::Value::Uint(u)),
            })) => i64::try_from(*u).map(Some).map_err(|_| {
                DeserializeError::invalid(format!(
                    "{} operand '{}' is out of range: {}",
                    node.opname, name, u
                ))
            }),
            Some(other) => Err(mismatch(node, name, "integer", other)),
        }
    }

    fn opt_bool(&self, node: &proto::Expr, name: &str) -> Result<Option<bool>> {
        match node.operand(name) {
            None => Ok(None),
            Some(map_value::Value::Primitive(proto::Primitive {
                value: Some(primitive::Value::Bool(b)),
            })) => Ok(Some(*b)),
            Some(other) => Err(mismatch(node, name, "boolean", other)),
        }
    }

    fn dtype(&mut self, node: &proto::Expr, name: &str) -> Result<DataType> {
        match operand(node, name)? {
            map_value::Value::Expr(inner) => match self.decode_node(inner)? {
                Decoded::DataType(dt) => Ok(dt),
                Decoded::Expr(e) => Err(DeserializeError::invalid(format!(
                    "{} operand '{}' must be a data type, found {}",
                    node.opname,
                    name,
                    e.op().opname()
                ))),
            },
            other => Err(mismatch(node, name, "data type", other)),
        }
    }

    fn window(&mut self, node: &proto::Expr, name: &str) -> Result<Window> {
        match operand(node, name)? {
            map_value::Value::Window(window) => self.decode_window(window),
            other => Err(mismatch(node, name, "window", other)),
        }
    }

    fn schema(&self, node: &proto::Expr, name: &str) -> Result<Schema> {
        match operand(node, name)? {
            map_value::Value::Schema(schema) => decode_schema(schema),
            other => Err(mismatch(node, name, "schema", other)),
        }
    }
}

/// Length-prefixed so adjacent fields cannot run together
fn feed(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}

fn operand<'n>(node: &'n proto::Expr, name: &str) -> Result<&'n map_value::Value> {
    node.operand(name).ok_or_else(|| missing(node, name))
}

fn missing(node: &proto::Expr, name: &str) -> DeserializeError {
    DeserializeError::invalid(format!("{} is missing operand '{}'", node.opname, name))
}

fn mismatch(node: &proto::Expr, name: &str, expected: &str, found: &map_value::Value) -> DeserializeError {
    DeserializeError::invalid(format!(
        "{} operand '{}' must be a {}, found {}",
        node.opname,
        name,
        expected,
        kind_of(found)
    ))
}

fn kind_of(value: &map_value::Value) -> &'static str {
    match value {
        map_value::Value::List(_) => "list",
        map_value::Value::Expr(_) => "expression",
        map_value::Value::Literal(_) => "literal",
        map_value::Value::Schema(_) => "schema",
        map_value::Value::Window(_) => "window",
        map_value::Value::Primitive(_) => "primitive",
    }
}
