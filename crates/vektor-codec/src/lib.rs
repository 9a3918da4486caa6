//! Expression tree codec
//!
//! Turns [`vektor_ir::Expr`] trees into `vektor_proto` messages and back.
//!
//! Encoding walks the tree once to collect table references (physical
//! tables, plus selections and aggregations that are consumed by other
//! nodes). Each reference gets a 1-based alias in an order where a reference
//! only ever points at references before it. The query then carries the
//! references' full definitions once, and every other mention is an
//! alias-only node.
//!
//! Decoding rebuilds the references in order and resolves aliases against
//! them, memoizing every node by the digest of its encoding so identical
//! subtrees come back as one shared node.
//!
//! ```ignore
//! let query = vektor_codec::compile(&expr)?;
//! let bytes = vektor_proto::encode_query(&query);
//! let back = vektor_codec::decompile(&vektor_proto::decode_query(&bytes)?)?;
//! assert_eq!(back, expr);
//! ```

use std::sync::OnceLock;

use vektor_ir::Expr;
use vektor_registry::OperatorRegistry;

mod deserializer;
mod error;
mod literal;
mod schema;
mod serializer;
mod window;

pub use deserializer::AstDeserializer;
pub use error::{DeserializeError, EncodeError};
pub use literal::{decode_literal, encode_literal};
pub use schema::{decode_schema, decode_type, encode_schema, encode_type};
pub use serializer::{AstSerializer, FormatMemo};
pub use window::{decode_window, encode_window};

/// The registry used when none is supplied
pub fn builtin_registry() -> &'static OperatorRegistry {
    static REGISTRY: OnceLock<OperatorRegistry> = OnceLock::new();
    REGISTRY.get_or_init(OperatorRegistry::default)
}

/// Serialize `expr` into a query envelope
pub fn compile(expr: &Expr) -> Result<vektor_proto::Query, EncodeError> {
    AstSerializer::new(expr).into_query()
}

/// Rebuild the expression carried by a query envelope
pub fn decompile(query: &vektor_proto::Query) -> Result<Expr, DeserializeError> {
    AstDeserializer::new().deserialize_query(query)
}
