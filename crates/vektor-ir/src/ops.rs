//! Operator nodes of the expression tree

use crate::types::{DataType, Schema};
use crate::value::Value;
use crate::window::{Window, WindowBound};
use crate::Expr;

/// Declares a closed family of operators that share one node shape.
macro_rules! op_kind {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $opname:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn opname(&self) -> &'static str {
                match self {
                    $($name::$variant => $opname),+
                }
            }

            pub fn from_opname(name: &str) -> Option<Self> {
                match name {
                    $($opname => Some($name::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

op_kind!(
    /// Leaf table flavours
    TableKind {
        Database => "DatabaseTable",
        Unbound => "UnboundTable",
    }
);

op_kind!(
    JoinKind {
        Inner => "InnerJoin",
        Left => "LeftJoin",
        Right => "RightJoin",
        Outer => "OuterJoin",
        LeftSemi => "LeftSemiJoin",
        LeftAnti => "LeftAntiJoin",
        Cross => "CrossJoin",
    }
);

op_kind!(
    SetOpKind {
        Union => "Union",
        Intersection => "Intersection",
        Difference => "Difference",
    }
);

op_kind!(
    BinaryOp {
        // Arithmetic
        Add => "Add",
        Subtract => "Subtract",
        Multiply => "Multiply",
        Divide => "Divide",
        Modulus => "Modulus",
        // Comparison
        Equals => "Equals",
        NotEquals => "NotEquals",
        Greater => "Greater",
        GreaterEqual => "GreaterEqual",
        Less => "Less",
        LessEqual => "LessEqual",
        // Logical
        And => "And",
        Or => "Or",
    }
);

op_kind!(
    UnaryOp {
        Negate => "Negate",
        Not => "Not",
        IsNull => "IsNull",
        NotNull => "NotNull",
    }
);

op_kind!(
    ReductionOp {
        Count => "Count",
        CountDistinct => "CountDistinct",
        Sum => "Sum",
        Mean => "Mean",
        Min => "Min",
        Max => "Max",
    }
);

op_kind!(
    GeoBinaryOp {
        Intersects => "GeoIntersects",
        Equals => "GeoEquals",
        Contains => "GeoContains",
        Within => "GeoWithin",
        Distance => "GeoDistance",
    }
);

impl BinaryOp {
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Equals
                | BinaryOp::NotEquals
                | BinaryOp::Greater
                | BinaryOp::GreaterEqual
                | BinaryOp::Less
                | BinaryOp::LessEqual
        )
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }
}

/// A leaf table: a named relation with a known schema.
///
/// Bound (`DatabaseTable`) and unbound tables compare equal when their
/// name and schema match, so a tree rebuilt from the wire compares equal
/// to the tree that was sent.
#[derive(Debug, Clone)]
pub struct PhysicalTable {
    pub kind: TableKind,
    pub name: String,
    pub schema: Schema,
}

impl PartialEq for PhysicalTable {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.schema == other.schema
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    // Tables
    Table(PhysicalTable),
    Selection {
        table: Expr,
        selections: Vec<Expr>,
        predicates: Vec<Expr>,
        sort_keys: Vec<Expr>,
    },
    Aggregation {
        table: Expr,
        metrics: Vec<Expr>,
        by: Vec<Expr>,
        having: Vec<Expr>,
        predicates: Vec<Expr>,
        sort_keys: Vec<Expr>,
    },
    SelfReference {
        table: Expr,
    },
    Join {
        kind: JoinKind,
        left: Expr,
        right: Expr,
        predicates: Vec<Expr>,
    },
    SetOp {
        kind: SetOpKind,
        left: Expr,
        right: Expr,
        distinct: bool,
    },
    Limit {
        table: Expr,
        n: i64,
        offset: i64,
    },
    Distinct {
        table: Expr,
    },

    // Values
    TableColumn {
        table: Expr,
        name: String,
    },
    Literal {
        value: Value,
        dtype: DataType,
    },
    Binary {
        op: BinaryOp,
        left: Expr,
        right: Expr,
    },
    Unary {
        op: UnaryOp,
        arg: Expr,
    },
    Reduction {
        op: ReductionOp,
        arg: Expr,
        where_: Option<Expr>,
    },
    StructField {
        arg: Expr,
        field: String,
    },
    Cast {
        arg: Expr,
        to: DataType,
    },
    Contains {
        value: Expr,
        options: Vec<Expr>,
    },
    GeoBinary {
        op: GeoBinaryOp,
        left: Expr,
        right: Expr,
    },
    GeoDWithin {
        left: Expr,
        right: Expr,
        distance: Expr,
    },
    GeoArea {
        arg: Expr,
    },

    // Ordering and analytics
    SortKey {
        expr: Expr,
        ascending: bool,
    },
    WindowOp {
        expr: Expr,
        window: Window,
    },
}

/// A borrowed operand, as handed to the wire formatter
#[derive(Debug, Clone, Copy)]
pub enum Arg<'a> {
    Expr(&'a Expr),
    Exprs(&'a [Expr]),
    Str(&'a str),
    Int(i64),
    Bool(bool),
    DataType(&'a DataType),
    Window(&'a Window),
    Schema(&'a Schema),
}

impl Operation {
    /// Operator name carried in `Expr.opname`
    pub fn opname(&self) -> &'static str {
        match self {
            Operation::Table(table) => table.kind.opname(),
            Operation::Selection { .. } => "Selection",
            Operation::Aggregation { .. } => "Aggregation",
            Operation::SelfReference { .. } => "SelfReference",
            Operation::Join { kind, .. } => kind.opname(),
            Operation::SetOp { kind, .. } => kind.opname(),
            Operation::Limit { .. } => "Limit",
            Operation::Distinct { .. } => "Distinct",
            Operation::TableColumn { .. } => "TableColumn",
            Operation::Literal { .. } => "Literal",
            Operation::Binary { op, .. } => op.opname(),
            Operation::Unary { op, .. } => op.opname(),
            Operation::Reduction { op, .. } => op.opname(),
            Operation::StructField { .. } => "StructField",
            Operation::Cast { .. } => "Cast",
            Operation::Contains { .. } => "Contains",
            Operation::GeoBinary { op, .. } => op.opname(),
            Operation::GeoDWithin { .. } => "GeoDWithin",
            Operation::GeoArea { .. } => "GeoArea",
            Operation::SortKey { .. } => "SortKey",
            Operation::WindowOp { .. } => "WindowOp",
        }
    }

    pub fn is_table(&self) -> bool {
        matches!(
            self,
            Operation::Table(_)
                | Operation::Selection { .. }
                | Operation::Aggregation { .. }
                | Operation::SelfReference { .. }
                | Operation::Join { .. }
                | Operation::SetOp { .. }
                | Operation::Limit { .. }
                | Operation::Distinct { .. }
        )
    }

    /// Named operands in wire order. Absent optionals are skipped.
    ///
    /// Literals carry their payload out of band and report no operands.
    pub fn args(&self) -> Vec<(&'static str, Arg<'_>)> {
        match self {
            Operation::Table(table) => vec![
                ("name", Arg::Str(&table.name)),
                ("schema", Arg::Schema(&table.schema)),
            ],
            Operation::Selection {
                table,
                selections,
                predicates,
                sort_keys,
            } => vec![
                ("table", Arg::Expr(table)),
                ("selections", Arg::Exprs(selections)),
                ("predicates", Arg::Exprs(predicates)),
                ("sort_keys", Arg::Exprs(sort_keys)),
            ],
            Operation::Aggregation {
                table,
                metrics,
                by,
                having,
                predicates,
                sort_keys,
            } => vec![
                ("table", Arg::Expr(table)),
                ("metrics", Arg::Exprs(metrics)),
                ("by", Arg::Exprs(by)),
                ("having", Arg::Exprs(having)),
                ("predicates", Arg::Exprs(predicates)),
                ("sort_keys", Arg::Exprs(sort_keys)),
            ],
            Operation::SelfReference { table } | Operation::Distinct { table } => {
                vec![("table", Arg::Expr(table))]
            }
            Operation::Join {
                left,
                right,
                predicates,
                ..
            } => vec![
                ("left", Arg::Expr(left)),
                ("right", Arg::Expr(right)),
                ("predicates", Arg::Exprs(predicates)),
            ],
            Operation::SetOp {
                left,
                right,
                distinct,
                ..
            } => vec![
                ("left", Arg::Expr(left)),
                ("right", Arg::Expr(right)),
                ("distinct", Arg::Bool(*distinct)),
            ],
            Operation::Limit { table, n, offset } => vec![
                ("table", Arg::Expr(table)),
                ("n", Arg::Int(*n)),
                ("offset", Arg::Int(*offset)),
            ],
            Operation::TableColumn { table, name } => vec![
                ("name", Arg::Str(name)),
                ("table", Arg::Expr(table)),
            ],
            Operation::Literal { .. } => vec![],
            Operation::Binary { left, right, .. } | Operation::GeoBinary { left, right, .. } => {
                vec![("left", Arg::Expr(left)), ("right", Arg::Expr(right))]
            }
            Operation::Unary { arg, .. } | Operation::GeoArea { arg } => {
                vec![("arg", Arg::Expr(arg))]
            }
            Operation::Reduction { arg, where_, .. } => {
                let mut args = vec![("arg", Arg::Expr(arg))];
                if let Some(w) = where_ {
                    args.push(("where", Arg::Expr(w)));
                }
                args
            }
            Operation::StructField { arg, field } => {
                vec![("arg", Arg::Expr(arg)), ("field", Arg::Str(field))]
            }
            Operation::Cast { arg, to } => {
                vec![("arg", Arg::Expr(arg)), ("to", Arg::DataType(to))]
            }
            Operation::Contains { value, options } => vec![
                ("value", Arg::Expr(value)),
                ("options", Arg::Exprs(options)),
            ],
            Operation::GeoDWithin {
                left,
                right,
                distance,
            } => vec![
                ("left", Arg::Expr(left)),
                ("right", Arg::Expr(right)),
                ("distance", Arg::Expr(distance)),
            ],
            Operation::SortKey { expr, ascending } => vec![
                ("expr", Arg::Expr(expr)),
                ("ascending", Arg::Bool(*ascending)),
            ],
            Operation::WindowOp { expr, window } => {
                vec![("expr", Arg::Expr(expr)), ("window", Arg::Window(window))]
            }
        }
    }

    /// Every sub-expression this node depends on, including those nested in
    /// a window specification.
    pub fn children(&self) -> Vec<&Expr> {
        let mut out = Vec::new();
        for (_, arg) in self.args() {
            match arg {
                Arg::Expr(e) => out.push(e),
                Arg::Exprs(es) => out.extend(es.iter()),
                Arg::Window(w) => {
                    out.extend(w.group_by.iter());
                    out.extend(w.order_by.iter());
                    for bound in [&w.preceding, &w.following, &w.max_lookback] {
                        if let Some(WindowBound::Expr(e)) = bound {
                            out.push(e);
                        }
                    }
                }
                _ => {}
            }
        }
        out
    }
}
