//! Vektor expression tree
//!
//! In-memory model of analytic queries: tables, columns, literals and the
//! operators that combine them. Trees are immutable and share sub-trees
//! through reference counting, so a table used twice in one query is a
//! single node.

mod catalog;
mod error;
mod expr;
mod ops;
mod types;
mod value;
mod window;

pub use catalog::{ColumnInfo, SchemaProvider, StaticCatalog, TableInfo};
pub use error::IrError;
pub use expr::{Expr, GroupedTable, IntoExpr, Shape};
pub use ops::{
    Arg, BinaryOp, GeoBinaryOp, JoinKind, Operation, PhysicalTable, ReductionOp, SetOpKind,
    TableKind, UnaryOp,
};
pub use types::{ClassName, DataType, FieldType, GeoKind, GeoSpatial, GeoType, Schema};
pub use value::{GeometryKind, GeometryValue, Value, WGS84_CRS};
pub use window::{FrameMode, Window, WindowBound};
