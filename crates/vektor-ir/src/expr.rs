//! Expression handles and the query-building API

use std::fmt;
use std::sync::Arc;

use crate::ops::{
    BinaryOp, GeoBinaryOp, JoinKind, Operation, PhysicalTable, ReductionOp, SetOpKind, TableKind,
    UnaryOp,
};
use crate::types::{DataType, FieldType, Schema};
use crate::value::{GeometryValue, Value};
use crate::window::Window;
use crate::IrError;

/// Handle to one node of an expression tree.
///
/// Cloning is cheap and keeps pointing at the same node, so a sub-tree used
/// in several places is one node with several owners. Equality is
/// structural; [`Expr::same_node`] tests identity.
#[derive(Clone)]
pub struct Expr {
    op: Arc<Operation>,
    name: Option<String>,
}

/// Result shape of an expression
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Shape {
    Scalar,
    Column,
    Table,
    SortKey,
}

impl Expr {
    pub fn new(op: Operation) -> Self {
        Self {
            op: Arc::new(op),
            name: None,
        }
    }

    pub fn op(&self) -> &Operation {
        &self.op
    }

    /// Stable identity of the underlying node for the lifetime of the tree
    pub fn node_id(&self) -> usize {
        Arc::as_ptr(&self.op) as usize
    }

    pub fn same_node(&self, other: &Expr) -> bool {
        Arc::ptr_eq(&self.op, &other.op)
    }

    /// Name given through [`Expr::name`], if it differs from the natural one
    pub fn explicit_name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Name the node has without any rename
    pub fn natural_name(&self) -> Option<String> {
        match self.op() {
            Operation::Table(table) => Some(table.name.clone()),
            Operation::TableColumn { name, .. } => Some(name.clone()),
            Operation::StructField { field, .. } => Some(field.clone()),
            Operation::Reduction { op, .. } => Some(reduction_name(*op).to_string()),
            Operation::Binary { left: first, .. }
            | Operation::GeoBinary { left: first, .. }
            | Operation::GeoDWithin { left: first, .. }
            | Operation::Unary { arg: first, .. }
            | Operation::GeoArea { arg: first }
            | Operation::Cast { arg: first, .. }
            | Operation::Contains { value: first, .. }
            | Operation::SortKey { expr: first, .. }
            | Operation::WindowOp { expr: first, .. } => first.get_name(),
            _ => None,
        }
    }

    pub fn get_name(&self) -> Option<String> {
        self.name.clone().or_else(|| self.natural_name())
    }

    /// Rename the output of this expression. Renaming to the natural name
    /// clears the rename.
    pub fn name(&self, name: impl Into<String>) -> Expr {
        let name = name.into();
        let explicit = if self.natural_name().as_deref() == Some(name.as_str()) {
            None
        } else {
            Some(name)
        };
        Expr {
            op: Arc::clone(&self.op),
            name: explicit,
        }
    }

    pub fn is_table(&self) -> bool {
        self.op.is_table()
    }

    pub fn shape(&self) -> Shape {
        match self.op() {
            op if op.is_table() => Shape::Table,
            Operation::TableColumn { .. } | Operation::WindowOp { .. } => Shape::Column,
            Operation::Literal { .. } | Operation::Reduction { .. } => Shape::Scalar,
            Operation::SortKey { .. } => Shape::SortKey,
            Operation::Binary { left, right, .. } | Operation::GeoBinary { left, right, .. } => {
                left.shape().max(right.shape())
            }
            Operation::GeoDWithin {
                left,
                right,
                distance,
            } => left.shape().max(right.shape()).max(distance.shape()),
            Operation::Unary { arg, .. }
            | Operation::GeoArea { arg }
            | Operation::StructField { arg, .. }
            | Operation::Cast { arg, .. } => arg.shape(),
            Operation::Contains { value, options } => options
                .iter()
                .map(Expr::shape)
                .fold(value.shape(), Shape::max),
            _ => Shape::Table,
        }
    }

    /// Data type of a value expression; `None` for tables and sort keys
    pub fn dtype(&self) -> Option<DataType> {
        let dt = match self.op() {
            Operation::TableColumn { table, name } => {
                return table
                    .schema()
                    .ok()?
                    .find_field(name)
                    .map(|f| f.data_type.clone())
            }
            Operation::Literal { dtype, .. } => dtype.clone(),
            Operation::Binary { op, left, right } => {
                if op.is_comparison() || op.is_logical() {
                    DataType::Boolean
                } else if *op == BinaryOp::Divide {
                    DataType::Float64
                } else {
                    DataType::promote(&left.dtype()?, &right.dtype()?)
                }
            }
            Operation::Unary { op, arg } => match op {
                UnaryOp::Negate => arg.dtype()?,
                UnaryOp::Not | UnaryOp::IsNull | UnaryOp::NotNull => DataType::Boolean,
            },
            Operation::Reduction { op, arg, .. } => match op {
                ReductionOp::Count | ReductionOp::CountDistinct => DataType::Int64,
                ReductionOp::Mean => DataType::Float64,
                ReductionOp::Sum => {
                    let dt = arg.dtype()?;
                    if dt.is_integer() {
                        DataType::Int64
                    } else if dt.is_floating() {
                        DataType::Float64
                    } else {
                        dt
                    }
                }
                ReductionOp::Min | ReductionOp::Max => arg.dtype()?,
            },
            Operation::StructField { arg, field } => match arg.dtype()? {
                DataType::Struct(fields) => fields.into_iter().find(|f| &f.name == field)?.data_type,
                _ => return None,
            },
            Operation::Cast { to, .. } => to.clone(),
            Operation::Contains { .. } | Operation::GeoDWithin { .. } => DataType::Boolean,
            Operation::GeoBinary { op, .. } => match op {
                GeoBinaryOp::Distance => DataType::Float64,
                _ => DataType::Boolean,
            },
            Operation::GeoArea { .. } => DataType::Float64,
            Operation::WindowOp { expr, .. } => expr.dtype()?,
            _ => return None,
        };
        Some(dt)
    }

    /// Result type signature: `table`, `sortkey`, `<dtype>*` for columns,
    /// `<dtype>` for scalars
    pub fn type_display(&self) -> String {
        match self.shape() {
            Shape::Table => "table".to_string(),
            Shape::SortKey => "sortkey".to_string(),
            shape => {
                let dtype = self
                    .dtype()
                    .map(|dt| dt.to_string())
                    .unwrap_or_else(|| "unknown".to_string());
                if shape == Shape::Column {
                    format!("{}*", dtype)
                } else {
                    dtype
                }
            }
        }
    }

    /// Output schema of a table expression
    pub fn schema(&self) -> Result<Schema, IrError> {
        match self.op() {
            Operation::Table(table) => Ok(table.schema.clone()),
            Operation::Selection {
                table, selections, ..
            } => {
                if selections.is_empty() {
                    return table.schema();
                }
                let mut fields = Vec::new();
                for item in selections {
                    if item.is_table() {
                        fields.extend(item.schema()?.fields);
                    } else {
                        fields.push(value_field(item)?);
                    }
                }
                Ok(Schema::new(fields))
            }
            Operation::Aggregation { by, metrics, .. } => {
                let fields = by
                    .iter()
                    .chain(metrics.iter())
                    .map(value_field)
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Schema::new(fields))
            }
            Operation::Join {
                kind, left, right, ..
            } => {
                let mut fields = left.schema()?.fields;
                if !matches!(kind, JoinKind::LeftSemi | JoinKind::LeftAnti) {
                    fields.extend(right.schema()?.fields);
                }
                Ok(Schema::new(fields))
            }
            Operation::SetOp { left, .. } => left.schema(),
            Operation::SelfReference { table }
            | Operation::Limit { table, .. }
            | Operation::Distinct { table } => table.schema(),
            _ => Err(IrError::NotATable(self.op().opname().to_string())),
        }
    }

    /// Tables whose columns this value expression reads directly
    pub fn column_tables(&self) -> Vec<Expr> {
        let mut out = Vec::new();
        collect_column_tables(self, &mut out);
        out
    }

    // ------------------------------------------------------------------
    // Leaves
    // ------------------------------------------------------------------

    /// A physical table bound to the catalog it came from
    pub fn database_table(name: impl Into<String>, schema: Schema) -> Expr {
        Expr::new(Operation::Table(PhysicalTable {
            kind: TableKind::Database,
            name: name.into(),
            schema,
        }))
    }

    /// A table known only by name and schema
    pub fn unbound_table(name: impl Into<String>, schema: Schema) -> Expr {
        Expr::new(Operation::Table(PhysicalTable {
            kind: TableKind::Unbound,
            name: name.into(),
            schema,
        }))
    }

    /// Literal with an inferred type
    pub fn literal(value: impl Into<Value>) -> Result<Expr, IrError> {
        let value = value.into();
        let dtype = value.infer_type()?;
        Ok(Expr::literal_typed(value, dtype))
    }

    pub fn literal_typed(value: impl Into<Value>, dtype: DataType) -> Expr {
        Expr::new(Operation::Literal {
            value: value.into(),
            dtype,
        })
    }

    /// Column `name` of `table`, checked against the table's schema
    pub fn table_column(table: &Expr, name: impl Into<String>) -> Result<Expr, IrError> {
        let name = name.into();
        let schema = table.schema()?;
        if schema.find_field(&name).is_none() {
            return Err(IrError::ColumnNotFound {
                column: name,
                available: schema.names().into_iter().map(String::from).collect(),
            });
        }
        Ok(Expr::new(Operation::TableColumn {
            table: table.clone(),
            name,
        }))
    }

    pub fn column(&self, name: impl Into<String>) -> Result<Expr, IrError> {
        Expr::table_column(self, name)
    }

    // ------------------------------------------------------------------
    // Table operations
    // ------------------------------------------------------------------

    pub fn select(&self, items: Vec<Expr>) -> Result<Expr, IrError> {
        self.expect_table()?;
        let expr = Expr::new(Operation::Selection {
            table: self.clone(),
            selections: items,
            predicates: vec![],
            sort_keys: vec![],
        });
        expr.schema()?;
        Ok(expr)
    }

    /// Filter rows. When this is a selection and every predicate reads only
    /// from the selection's own input, the predicates are folded into it.
    pub fn filter(&self, predicates: Vec<Expr>) -> Result<Expr, IrError> {
        self.expect_table()?;
        for pred in &predicates {
            pred.expect_value()?;
        }
        if let Operation::Selection {
            table,
            selections,
            predicates: existing,
            sort_keys,
        } = self.op()
        {
            let fusable = predicates
                .iter()
                .all(|p| p.column_tables().iter().all(|t| t.same_node(table)));
            if fusable {
                let mut merged = existing.clone();
                merged.extend(predicates);
                return Ok(Expr::new(Operation::Selection {
                    table: table.clone(),
                    selections: selections.clone(),
                    predicates: merged,
                    sort_keys: sort_keys.clone(),
                }));
            }
        }
        Ok(Expr::new(Operation::Selection {
            table: self.clone(),
            selections: vec![],
            predicates,
            sort_keys: vec![],
        }))
    }

    pub fn sort_by(&self, keys: Vec<Expr>) -> Result<Expr, IrError> {
        self.expect_table()?;
        let sort_keys = keys
            .into_iter()
            .map(|k| match k.op() {
                Operation::SortKey { .. } => k,
                _ => k.asc(),
            })
            .collect();
        Ok(Expr::new(Operation::Selection {
            table: self.clone(),
            selections: vec![],
            predicates: vec![],
            sort_keys,
        }))
    }

    pub fn aggregate(&self, metrics: Vec<Expr>, by: Vec<Expr>) -> Result<Expr, IrError> {
        self.expect_table()?;
        let expr = Expr::new(Operation::Aggregation {
            table: self.clone(),
            metrics,
            by,
            having: vec![],
            predicates: vec![],
            sort_keys: vec![],
        });
        expr.schema()?;
        Ok(expr)
    }

    pub fn group_by(&self, keys: Vec<Expr>) -> GroupedTable {
        GroupedTable {
            table: self.clone(),
            by: keys,
            having: vec![],
        }
    }

    pub fn join(&self, kind: JoinKind, right: &Expr, predicates: Vec<Expr>) -> Result<Expr, IrError> {
        self.expect_table()?;
        right.expect_table()?;
        Ok(Expr::new(Operation::Join {
            kind,
            left: self.clone(),
            right: right.clone(),
            predicates,
        }))
    }

    pub fn inner_join(&self, right: &Expr, predicates: Vec<Expr>) -> Result<Expr, IrError> {
        self.join(JoinKind::Inner, right, predicates)
    }

    pub fn left_join(&self, right: &Expr, predicates: Vec<Expr>) -> Result<Expr, IrError> {
        self.join(JoinKind::Left, right, predicates)
    }

    /// Cross join with any number of tables, folded from the left:
    /// `a.cross_join(&[b, c])` is `CrossJoin(CrossJoin(a, b), c)`.
    pub fn cross_join(&self, others: &[Expr]) -> Result<Expr, IrError> {
        let mut acc = self.clone();
        for other in others {
            acc = acc.join(JoinKind::Cross, other, vec![])?;
        }
        Ok(acc)
    }

    pub fn set_op(&self, kind: SetOpKind, right: &Expr, distinct: bool) -> Result<Expr, IrError> {
        self.expect_table()?;
        right.expect_table()?;
        Ok(Expr::new(Operation::SetOp {
            kind,
            left: self.clone(),
            right: right.clone(),
            distinct,
        }))
    }

    pub fn union(&self, right: &Expr, distinct: bool) -> Result<Expr, IrError> {
        self.set_op(SetOpKind::Union, right, distinct)
    }

    /// A distinct reference to this table, for self joins
    pub fn view(&self) -> Result<Expr, IrError> {
        self.expect_table()?;
        Ok(Expr::new(Operation::SelfReference {
            table: self.clone(),
        }))
    }

    pub fn limit(&self, n: i64, offset: i64) -> Result<Expr, IrError> {
        self.expect_table()?;
        Ok(Expr::new(Operation::Limit {
            table: self.clone(),
            n,
            offset,
        }))
    }

    pub fn distinct(&self) -> Result<Expr, IrError> {
        self.expect_table()?;
        Ok(Expr::new(Operation::Distinct {
            table: self.clone(),
        }))
    }

    // ------------------------------------------------------------------
    // Value operations
    // ------------------------------------------------------------------

    pub fn binary(&self, op: BinaryOp, other: impl IntoExpr) -> Expr {
        Expr::new(Operation::Binary {
            op,
            left: self.clone(),
            right: other.into_expr(),
        })
    }

    pub fn eq(&self, other: impl IntoExpr) -> Expr {
        self.binary(BinaryOp::Equals, other)
    }

    pub fn ne(&self, other: impl IntoExpr) -> Expr {
        self.binary(BinaryOp::NotEquals, other)
    }

    pub fn gt(&self, other: impl IntoExpr) -> Expr {
        self.binary(BinaryOp::Greater, other)
    }

    pub fn ge(&self, other: impl IntoExpr) -> Expr {
        self.binary(BinaryOp::GreaterEqual, other)
    }

    pub fn lt(&self, other: impl IntoExpr) -> Expr {
        self.binary(BinaryOp::Less, other)
    }

    pub fn le(&self, other: impl IntoExpr) -> Expr {
        self.binary(BinaryOp::LessEqual, other)
    }

    pub fn add(&self, other: impl IntoExpr) -> Expr {
        self.binary(BinaryOp::Add, other)
    }

    pub fn sub(&self, other: impl IntoExpr) -> Expr {
        self.binary(BinaryOp::Subtract, other)
    }

    pub fn mul(&self, other: impl IntoExpr) -> Expr {
        self.binary(BinaryOp::Multiply, other)
    }

    pub fn div(&self, other: impl IntoExpr) -> Expr {
        self.binary(BinaryOp::Divide, other)
    }

    pub fn and(&self, other: impl IntoExpr) -> Expr {
        self.binary(BinaryOp::And, other)
    }

    pub fn or(&self, other: impl IntoExpr) -> Expr {
        self.binary(BinaryOp::Or, other)
    }

    pub fn unary(&self, op: UnaryOp) -> Expr {
        Expr::new(Operation::Unary {
            op,
            arg: self.clone(),
        })
    }

    pub fn negate(&self) -> Expr {
        self.unary(UnaryOp::Negate)
    }

    pub fn not(&self) -> Expr {
        self.unary(UnaryOp::Not)
    }

    pub fn is_null(&self) -> Expr {
        self.unary(UnaryOp::IsNull)
    }

    pub fn reduce(&self, op: ReductionOp, where_: Option<Expr>) -> Expr {
        Expr::new(Operation::Reduction {
            op,
            arg: self.clone(),
            where_,
        })
    }

    pub fn count(&self) -> Expr {
        self.reduce(ReductionOp::Count, None)
    }

    pub fn sum(&self) -> Expr {
        self.reduce(ReductionOp::Sum, None)
    }

    pub fn mean(&self) -> Expr {
        self.reduce(ReductionOp::Mean, None)
    }

    pub fn min(&self) -> Expr {
        self.reduce(ReductionOp::Min, None)
    }

    pub fn max(&self) -> Expr {
        self.reduce(ReductionOp::Max, None)
    }

    /// Field of a struct-typed value
    pub fn field(&self, name: impl Into<String>) -> Result<Expr, IrError> {
        let name = name.into();
        match self.dtype() {
            Some(DataType::Struct(fields)) if fields.iter().any(|f| f.name == name) => {
                Ok(Expr::new(Operation::StructField {
                    arg: self.clone(),
                    field: name,
                }))
            }
            _ => Err(IrError::FieldNotFound(name)),
        }
    }

    pub fn cast(&self, to: DataType) -> Expr {
        Expr::new(Operation::Cast {
            arg: self.clone(),
            to,
        })
    }

    pub fn isin(&self, options: Vec<Expr>) -> Expr {
        Expr::new(Operation::Contains {
            value: self.clone(),
            options,
        })
    }

    pub fn geo(&self, op: GeoBinaryOp, other: impl IntoExpr) -> Expr {
        Expr::new(Operation::GeoBinary {
            op,
            left: self.clone(),
            right: other.into_expr(),
        })
    }

    pub fn intersects(&self, other: impl IntoExpr) -> Expr {
        self.geo(GeoBinaryOp::Intersects, other)
    }

    pub fn geo_equals(&self, other: impl IntoExpr) -> Expr {
        self.geo(GeoBinaryOp::Equals, other)
    }

    pub fn contains(&self, other: impl IntoExpr) -> Expr {
        self.geo(GeoBinaryOp::Contains, other)
    }

    pub fn within(&self, other: impl IntoExpr) -> Expr {
        self.geo(GeoBinaryOp::Within, other)
    }

    pub fn distance(&self, other: impl IntoExpr) -> Expr {
        self.geo(GeoBinaryOp::Distance, other)
    }

    /// True where the two geometries lie within `distance` of each other
    pub fn d_within(&self, other: impl IntoExpr, distance: impl IntoExpr) -> Expr {
        Expr::new(Operation::GeoDWithin {
            left: self.clone(),
            right: other.into_expr(),
            distance: distance.into_expr(),
        })
    }

    pub fn area(&self) -> Expr {
        Expr::new(Operation::GeoArea { arg: self.clone() })
    }

    pub fn asc(&self) -> Expr {
        Expr::new(Operation::SortKey {
            expr: self.clone(),
            ascending: true,
        })
    }

    pub fn desc(&self) -> Expr {
        Expr::new(Operation::SortKey {
            expr: self.clone(),
            ascending: false,
        })
    }

    /// Evaluate this expression over a window
    pub fn over(&self, window: Window) -> Expr {
        Expr::new(Operation::WindowOp {
            expr: self.clone(),
            window,
        })
    }

    fn expect_table(&self) -> Result<(), IrError> {
        if self.is_table() {
            Ok(())
        } else {
            Err(IrError::NotATable(self.op().opname().to_string()))
        }
    }

    fn expect_value(&self) -> Result<(), IrError> {
        if self.is_table() {
            Err(IrError::NotAValue(self.op().opname().to_string()))
        } else {
            Ok(())
        }
    }
}

fn reduction_name(op: ReductionOp) -> &'static str {
    match op {
        ReductionOp::Count => "count",
        ReductionOp::CountDistinct => "nunique",
        ReductionOp::Sum => "sum",
        ReductionOp::Mean => "mean",
        ReductionOp::Min => "min",
        ReductionOp::Max => "max",
    }
}

fn value_field(item: &Expr) -> Result<FieldType, IrError> {
    let name = item
        .get_name()
        .ok_or_else(|| IrError::Unnamed(item.op().opname().to_string()))?;
    let dtype = item
        .dtype()
        .ok_or_else(|| IrError::NotAValue(item.op().opname().to_string()))?;
    Ok(FieldType::new(name, dtype))
}

fn collect_column_tables(expr: &Expr, out: &mut Vec<Expr>) {
    match expr.op() {
        Operation::TableColumn { table, .. } => {
            if !out.iter().any(|t| t.same_node(table)) {
                out.push(table.clone());
            }
        }
        op if op.is_table() => {}
        op => {
            for child in op.children() {
                collect_column_tables(child, out);
            }
        }
    }
}

impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && (self.same_node(other) || *self.op == *other.op)
    }
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{:?} AS {:?}", self.op, name),
            None => write!(f, "{:?}", self.op),
        }
    }
}

/// Result of [`Expr::group_by`], awaiting its metrics
#[derive(Debug, Clone)]
pub struct GroupedTable {
    table: Expr,
    by: Vec<Expr>,
    having: Vec<Expr>,
}

impl GroupedTable {
    pub fn having(mut self, predicates: Vec<Expr>) -> Self {
        self.having.extend(predicates);
        self
    }

    pub fn aggregate(self, metrics: Vec<Expr>) -> Result<Expr, IrError> {
        self.table.expect_table()?;
        let expr = Expr::new(Operation::Aggregation {
            table: self.table,
            metrics,
            by: self.by,
            having: self.having,
            predicates: vec![],
            sort_keys: vec![],
        });
        expr.schema()?;
        Ok(expr)
    }
}

/// Anything usable as an operand: expressions and plain constants
pub trait IntoExpr {
    fn into_expr(self) -> Expr;
}

impl IntoExpr for Expr {
    fn into_expr(self) -> Expr {
        self
    }
}

impl IntoExpr for &Expr {
    fn into_expr(self) -> Expr {
        self.clone()
    }
}

macro_rules! literal_operand {
    ($($ty:ty => $dtype:expr),+ $(,)?) => {
        $(
            impl IntoExpr for $ty {
                fn into_expr(self) -> Expr {
                    Expr::literal_typed(Value::from(self), $dtype)
                }
            }
        )+
    };
}

literal_operand!(
    bool => DataType::Boolean,
    i32 => DataType::Int64,
    i64 => DataType::Int64,
    f64 => DataType::Float64,
    &str => DataType::String,
    String => DataType::String,
);

impl IntoExpr for GeometryValue {
    fn into_expr(self) -> Expr {
        let value = Value::Geometry(self);
        let dtype = value
            .infer_type()
            .unwrap_or_else(|_| DataType::spatial(crate::GeoKind::Geometry));
        Expr::literal_typed(value, dtype)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GeoKind;

    fn ports() -> Expr {
        Expr::database_table(
            "ports_v1",
            Schema::from_pairs([
                ("port_name", DataType::String),
                ("harbor_size", DataType::Int64),
                ("port_geom", DataType::geography(4326)),
            ]),
        )
    }

    #[test]
    fn test_column_lookup() {
        let t = ports();
        let col = t.column("port_name").unwrap();
        assert_eq!(col.type_display(), "string*");
        assert_eq!(col.get_name().as_deref(), Some("port_name"));
        assert!(matches!(
            t.column("nope"),
            Err(IrError::ColumnNotFound { .. })
        ));
    }

    #[test]
    fn test_rename_to_natural_name_is_noop() {
        let col = ports().column("port_name").unwrap();
        assert_eq!(col.name("port_name").explicit_name(), None);
        assert_eq!(col.name("name").explicit_name(), Some("name"));
        assert!(col.name("name").same_node(&col));
    }

    #[test]
    fn test_type_display() {
        let t = ports();
        assert_eq!(t.type_display(), "table");
        let pred = t.column("harbor_size").unwrap().gt(100);
        assert_eq!(pred.type_display(), "boolean*");
        assert_eq!(t.column("harbor_size").unwrap().count().type_display(), "int64");
        assert_eq!(Expr::literal(1.5).unwrap().type_display(), "float64");
    }

    #[test]
    fn test_filter_fuses_into_projection() {
        let t = ports();
        let proj = t
            .select(vec![t.column("port_name").unwrap(), t.column("harbor_size").unwrap()])
            .unwrap();
        let filtered = proj
            .filter(vec![t.column("harbor_size").unwrap().gt(100)])
            .unwrap();
        match filtered.op() {
            Operation::Selection {
                table,
                selections,
                predicates,
                ..
            } => {
                assert!(table.same_node(&t));
                assert_eq!(selections.len(), 2);
                assert_eq!(predicates.len(), 1);
            }
            other => panic!("expected selection, got {:?}", other),
        }
    }

    #[test]
    fn test_filter_on_own_columns_wraps() {
        let t = ports();
        let proj = t.select(vec![t.column("harbor_size").unwrap()]).unwrap();
        let filtered = proj
            .filter(vec![proj.column("harbor_size").unwrap().eq(0)])
            .unwrap();
        match filtered.op() {
            Operation::Selection { table, .. } => assert!(table.same_node(&proj)),
            other => panic!("expected selection, got {:?}", other),
        }
    }

    #[test]
    fn test_aggregate_schema() {
        let t = ports();
        let agg = t
            .group_by(vec![t.column("port_name").unwrap()])
            .aggregate(vec![t.column("port_name").unwrap().count()])
            .unwrap();
        let schema = agg.schema().unwrap();
        assert_eq!(schema.names(), vec!["port_name", "count"]);
        assert_eq!(schema.types(), vec![&DataType::String, &DataType::Int64]);
    }

    #[test]
    fn test_cross_join_folds_left() {
        let a = ports();
        let b = ports().view().unwrap();
        let c = ports().view().unwrap();
        let joined = a.cross_join(&[b.clone(), c.clone()]).unwrap();
        match joined.op() {
            Operation::Join { left, right, .. } => {
                assert!(right.same_node(&c));
                assert!(matches!(left.op(), Operation::Join { .. }));
            }
            other => panic!("expected join, got {:?}", other),
        }
    }

    #[test]
    fn test_struct_field() {
        let t = Expr::database_table(
            "vessels_v1",
            Schema::from_pairs([(
                "capacity",
                DataType::structure([("teu", DataType::Float64)]),
            )]),
        );
        let teu = t.column("capacity").unwrap().field("teu").unwrap();
        assert_eq!(teu.dtype(), Some(DataType::Float64));
        assert_eq!(teu.get_name().as_deref(), Some("teu"));
        assert!(t.column("capacity").unwrap().field("dwt").is_err());
    }

    #[test]
    fn test_bound_and_unbound_tables_compare_equal() {
        let schema = Schema::from_pairs([("id", DataType::Int64)]);
        let bound = Expr::database_table("t", schema.clone());
        let unbound = Expr::unbound_table("t", schema);
        assert_eq!(bound, unbound);
        assert_eq!(
            bound.column("id").unwrap().gt(1),
            unbound.column("id").unwrap().gt(1)
        );
    }

    #[test]
    fn test_geometry_operand() {
        let t = ports();
        let point = GeometryValue::new("POINT (10 -10)");
        let pred = t.column("port_geom").unwrap().d_within(point, 5000.0);
        assert_eq!(pred.type_display(), "boolean*");
        match pred.op() {
            Operation::GeoDWithin { right, .. } => {
                assert_eq!(right.dtype(), Some(DataType::spatial(GeoKind::Point)));
            }
            other => panic!("expected GeoDWithin, got {:?}", other),
        }
    }
}
