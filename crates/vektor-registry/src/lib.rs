//! Operator registry
//!
//! The fixed table of operators the codec understands: for each operator
//! name, its operands in wire order and the kind of result it produces.
//! Both directions of the codec consult it, so an operator is either fully
//! supported or rejected up front.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use vektor_ir::{
    BinaryOp, GeoBinaryOp, JoinKind, Operation, ReductionOp, SetOpKind, TableKind, UnaryOp,
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Operation not found: {0}")]
    OperatorNotFound(String),

    #[error("Operation {op} has no operand named '{arg}'")]
    UnknownArgument { op: String, arg: String },

    #[error("Operation {op} is missing required operand '{arg}'")]
    MissingArgument { op: String, arg: String },
}

/// How an operand is carried in `Expr.value`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArgKind {
    Expr,
    ExprList,
    OptionalExpr,
    Str,
    Int,
    Bool,
    DataType,
    Window,
    Schema,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    Table,
    Value,
    Reduction,
    Analytic,
    SortKey,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgSpec {
    pub name: String,
    pub kind: ArgKind,
    /// Absent operands of non-required kinds take their default
    /// (empty list, `None`, `0`, `false` or `true` as the operator defines)
    pub required: bool,
}

impl ArgSpec {
    fn required(name: &str, kind: ArgKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            required: true,
        }
    }

    fn optional(name: &str, kind: ArgKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            required: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperatorSignature {
    pub name: String,
    pub args: Vec<ArgSpec>,
    pub category: Category,
}

impl OperatorSignature {
    pub fn arg(&self, name: &str) -> Option<&ArgSpec> {
        self.args.iter().find(|a| a.name == name)
    }

    /// Check a set of operand names against this signature
    pub fn check_operands<'a>(
        &self,
        present: impl IntoIterator<Item = &'a str>,
    ) -> Result<(), RegistryError> {
        let present: Vec<&str> = present.into_iter().collect();
        if let Some(unknown) = present.iter().find(|n| self.arg(n).is_none()) {
            return Err(RegistryError::UnknownArgument {
                op: self.name.clone(),
                arg: unknown.to_string(),
            });
        }
        if let Some(missing) = self
            .args
            .iter()
            .find(|a| a.required && !present.contains(&a.name.as_str()))
        {
            return Err(RegistryError::MissingArgument {
                op: self.name.clone(),
                arg: missing.name.clone(),
            });
        }
        Ok(())
    }
}

pub struct OperatorRegistry {
    operators: HashMap<String, OperatorSignature>,
    version: String, // Semver of the wire vocabulary
}

impl OperatorRegistry {
    pub fn new(version: impl Into<String>) -> Self {
        let mut registry = Self {
            operators: HashMap::new(),
            version: version.into(),
        };
        registry.register_builtins();
        registry
    }

    fn register_builtins(&mut self) {
        use ArgKind::*;
        let req = ArgSpec::required;
        let opt = ArgSpec::optional;

        // Tables
        for kind in TableKind::ALL {
            self.add(kind.opname(), Category::Table, vec![req("name", Str), req("schema", Schema)]);
        }
        self.add(
            "Selection",
            Category::Table,
            vec![
                req("table", Expr),
                opt("selections", ExprList),
                opt("predicates", ExprList),
                opt("sort_keys", ExprList),
            ],
        );
        self.add(
            "Aggregation",
            Category::Table,
            vec![
                req("table", Expr),
                opt("metrics", ExprList),
                opt("by", ExprList),
                opt("having", ExprList),
                opt("predicates", ExprList),
                opt("sort_keys", ExprList),
            ],
        );
        self.add("SelfReference", Category::Table, vec![req("table", Expr)]);
        self.add("Distinct", Category::Table, vec![req("table", Expr)]);
        self.add(
            "Limit",
            Category::Table,
            vec![req("table", Expr), req("n", Int), opt("offset", Int)],
        );
        for kind in JoinKind::ALL {
            let mut args = vec![req("left", Expr), req("right", Expr), opt("predicates", ExprList)];
            if *kind == JoinKind::Cross {
                // further tables of an n-ary cross join, folded from the left
                args.push(opt("tables", ExprList));
            }
            self.add(kind.opname(), Category::Table, args);
        }
        for kind in SetOpKind::ALL {
            self.add(
                kind.opname(),
                Category::Table,
                vec![req("left", Expr), req("right", Expr), opt("distinct", Bool)],
            );
        }

        // Values
        self.add("TableColumn", Category::Value, vec![req("name", Str), req("table", Expr)]);
        self.add("Literal", Category::Value, vec![]);
        for op in BinaryOp::ALL {
            self.add(op.opname(), Category::Value, vec![req("left", Expr), req("right", Expr)]);
        }
        for op in UnaryOp::ALL {
            self.add(op.opname(), Category::Value, vec![req("arg", Expr)]);
        }
        for op in ReductionOp::ALL {
            self.add(
                op.opname(),
                Category::Reduction,
                vec![req("arg", Expr), opt("where", OptionalExpr)],
            );
        }
        self.add("StructField", Category::Value, vec![req("arg", Expr), req("field", Str)]);
        self.add("Cast", Category::Value, vec![req("arg", Expr), req("to", DataType)]);
        self.add(
            "Contains",
            Category::Value,
            vec![req("value", Expr), opt("options", ExprList)],
        );
        for op in GeoBinaryOp::ALL {
            self.add(op.opname(), Category::Value, vec![req("left", Expr), req("right", Expr)]);
        }
        self.add(
            "GeoDWithin",
            Category::Value,
            vec![req("left", Expr), req("right", Expr), req("distance", Expr)],
        );
        self.add("GeoArea", Category::Value, vec![req("arg", Expr)]);

        // Ordering and analytics
        self.add(
            "SortKey",
            Category::SortKey,
            vec![req("expr", Expr), opt("ascending", Bool)],
        );
        self.add(
            "WindowOp",
            Category::Analytic,
            vec![req("expr", Expr), req("window", Window)],
        );
    }

    fn add(&mut self, name: &str, category: Category, args: Vec<ArgSpec>) {
        self.register(OperatorSignature {
            name: name.to_string(),
            args,
            category,
        });
    }

    pub fn register(&mut self, sig: OperatorSignature) {
        self.operators.insert(sig.name.clone(), sig);
    }

    pub fn lookup(&self, name: &str) -> Result<&OperatorSignature, RegistryError> {
        self.operators
            .get(name)
            .ok_or_else(|| RegistryError::OperatorNotFound(name.to_string()))
    }

    /// Check that an in-memory operation matches its registered signature
    pub fn check_operation(&self, op: &Operation) -> Result<&OperatorSignature, RegistryError> {
        let sig = self.lookup(op.opname())?;
        sig.check_operands(op.args().into_iter().map(|(name, _)| name))?;
        Ok(sig)
    }

    pub fn version(&self) -> &str {
        &self.version
    }
}

impl Default for OperatorRegistry {
    fn default() -> Self {
        Self::new("0.1.0")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vektor_ir::{DataType, Expr, Schema};

    #[test]
    fn test_builtin_lookup() {
        let registry = OperatorRegistry::default();

        let sig = registry.lookup("TableColumn").unwrap();
        assert_eq!(sig.category, Category::Value);
        assert_eq!(sig.arg("table").unwrap().kind, ArgKind::Expr);

        let sig = registry.lookup("Count").unwrap();
        assert_eq!(sig.category, Category::Reduction);
        assert!(!sig.arg("where").unwrap().required);
    }

    #[test]
    fn test_unknown_operator() {
        let registry = OperatorRegistry::default();
        assert_eq!(
            registry.lookup("Median").unwrap_err(),
            RegistryError::OperatorNotFound("Median".to_string())
        );
    }

    #[test]
    fn test_every_join_and_table_kind_registered() {
        let registry = OperatorRegistry::default();
        for name in [
            "DatabaseTable",
            "UnboundTable",
            "CrossJoin",
            "LeftAntiJoin",
            "Difference",
            "GeoIntersects",
            "GeoDWithin",
            "WindowOp",
        ] {
            assert!(registry.lookup(name).is_ok(), "{} missing", name);
        }
    }

    #[test]
    fn test_check_operands() {
        let registry = OperatorRegistry::default();
        let sig = registry.lookup("Limit").unwrap();

        assert!(sig.check_operands(["table", "n"]).is_ok());
        assert!(matches!(
            sig.check_operands(["table"]),
            Err(RegistryError::MissingArgument { .. })
        ));
        assert!(matches!(
            sig.check_operands(["table", "n", "percent"]),
            Err(RegistryError::UnknownArgument { .. })
        ));
    }

    #[test]
    fn test_check_operation_matches_tree() {
        let registry = OperatorRegistry::default();
        let t = Expr::database_table("t", Schema::from_pairs([("x", DataType::Int64)]));
        let x = t.column("x").unwrap();
        let exprs = [
            t.clone(),
            x.clone(),
            x.gt(1),
            x.sum(),
            x.desc(),
            t.filter(vec![x.gt(1)]).unwrap(),
            t.limit(10, 0).unwrap(),
            t.cross_join(&[t.view().unwrap()]).unwrap(),
        ];
        for expr in exprs {
            assert!(registry.check_operation(expr.op()).is_ok(), "{:?}", expr);
        }
    }

    #[test]
    fn test_signatures_serialize() {
        let registry = OperatorRegistry::default();
        let json = serde_json::to_string(registry.lookup("Cast").unwrap()).unwrap();
        assert!(json.contains("\"DataType\""));
    }
}
