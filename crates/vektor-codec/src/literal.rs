//! Literal codec

use tracing::warn;
use vektor_ir::{DataType, GeometryKind, GeometryValue, Value};
use vektor_proto::{
    self as proto, literal, make_geometry, make_literal, BoolList, DoubleList, IntList, StringList,
};

use crate::{DeserializeError, EncodeError};

/// Element kind of a homogeneous literal list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListKind {
    Int,
    Bool,
    Double,
    String,
}

impl ListKind {
    fn of_value(value: &Value) -> Option<Self> {
        match value {
            Value::Int(_) => Some(ListKind::Int),
            Value::Bool(_) => Some(ListKind::Bool),
            Value::Float(_) => Some(ListKind::Double),
            Value::String(_) => Some(ListKind::String),
            _ => None,
        }
    }

    fn of_type(dtype: &DataType) -> Option<Self> {
        match dtype {
            dt if dt.is_integer() => Some(ListKind::Int),
            DataType::Boolean => Some(ListKind::Bool),
            dt if dt.is_floating() => Some(ListKind::Double),
            DataType::String => Some(ListKind::String),
            _ => None,
        }
    }
}

/// Fit an integer into the signed or unsigned 64-bit wire field
fn encode_int(v: i128) -> Result<literal::Value, EncodeError> {
    if let Ok(i) = i64::try_from(v) {
        Ok(literal::Value::Int(i))
    } else if let Ok(u) = u64::try_from(v) {
        Ok(literal::Value::Uint(u))
    } else {
        Err(EncodeError::IntegerOutOfRange(v))
    }
}

pub fn encode_literal(value: &Value, dtype: &DataType) -> Result<proto::Literal, EncodeError> {
    let encoded = match value {
        Value::Bool(b) => literal::Value::Bool(*b),
        Value::Int(v) => encode_int(*v)?,
        Value::Float(f) => literal::Value::Double(*f),
        Value::String(s) => literal::Value::String(s.clone()),
        Value::Geometry(g) => literal::Value::Geometry(make_geometry(&g.wkt, g.crs.clone())),
        Value::List(items) | Value::Set(items) => encode_list(items, dtype)?,
    };
    Ok(make_literal(dtype.to_string(), encoded))
}

fn encode_list(items: &[Value], dtype: &DataType) -> Result<literal::Value, EncodeError> {
    let kind = match items.first() {
        Some(first) => ListKind::of_value(first),
        None => dtype.value_type().and_then(ListKind::of_type),
    }
    .ok_or_else(|| {
        EncodeError::UnsupportedLiteral(format!("Unsupported element type for sequence of {}", dtype))
    })?;

    let mismatch = || {
        EncodeError::UnsupportedLiteral(format!("Mixed element types in sequence of {}", dtype))
    };
    let encoded = match kind {
        ListKind::Int => literal::Value::IntList(IntList {
            value: items
                .iter()
                .map(|v| match v {
                    Value::Int(i) => i64::try_from(*i).map_err(|_| EncodeError::IntegerOutOfRange(*i)),
                    _ => Err(mismatch()),
                })
                .collect::<Result<_, _>>()?,
        }),
        ListKind::Bool => literal::Value::BoolList(BoolList {
            value: items
                .iter()
                .map(|v| match v {
                    Value::Bool(b) => Ok(*b),
                    _ => Err(mismatch()),
                })
                .collect::<Result<_, _>>()?,
        }),
        ListKind::Double => literal::Value::DoubleList(DoubleList {
            value: items
                .iter()
                .map(|v| match v {
                    Value::Float(f) => Ok(*f),
                    _ => Err(mismatch()),
                })
                .collect::<Result<_, _>>()?,
        }),
        ListKind::String => literal::Value::StringList(StringList {
            value: items
                .iter()
                .map(|v| match v {
                    Value::String(s) => Ok(s.clone()),
                    _ => Err(mismatch()),
                })
                .collect::<Result<_, _>>()?,
        }),
    };
    Ok(encoded)
}

fn literal_error(msg: impl Into<String>) -> DeserializeError {
    let msg = msg.into();
    warn!(reason = %msg, "rejecting literal");
    DeserializeError::Literal(msg)
}

/// Decode a literal into its value and (possibly normalized) type.
///
/// Geometries tagged with the WGS84 CRS come back as `geography;4326`
/// whatever their declared type.
pub fn decode_literal(lit: &proto::Literal) -> Result<(Value, DataType), DeserializeError> {
    let mut dtype: DataType = lit
        .dtype
        .parse()
        .map_err(|_| DeserializeError::DataType(format!("Data type not found: {}", lit.dtype)))?;

    let raw = lit
        .value
        .as_ref()
        .ok_or_else(|| literal_error(format!("Literal of type {} has no value", lit.dtype)))?;

    let value = match raw {
        literal::Value::Bool(b) => Value::Bool(*b),
        literal::Value::Int(i) => Value::Int(*i as i128),
        literal::Value::Uint(u) => Value::Int(*u as i128),
        literal::Value::Double(f) => Value::Float(*f),
        literal::Value::String(s) => Value::String(s.clone()),
        literal::Value::Geometry(g) => Value::Geometry(decode_geometry(g)?),
        literal::Value::IntList(l) => collect(&dtype, l.value.iter().map(|i| Value::Int(*i as i128)))?,
        literal::Value::BoolList(l) => collect(&dtype, l.value.iter().copied().map(Value::Bool))?,
        literal::Value::DoubleList(l) => collect(&dtype, l.value.iter().copied().map(Value::Float))?,
        literal::Value::StringList(l) => collect(&dtype, l.value.iter().cloned().map(Value::String))?,
    };

    if let Value::Geometry(geom) = &value {
        if dtype.is_geospatial() && geom.is_wgs84() {
            dtype = DataType::geography(DataType::WGS84_SRID);
        }
    }

    let value = conform(value, &dtype).ok_or_else(|| {
        literal_error(format!(
            "Unable to deserialize `{}` to data type {}",
            describe(raw),
            dtype
        ))
    })?;
    Ok((value, dtype))
}

fn decode_geometry(g: &proto::Geometry) -> Result<GeometryValue, DeserializeError> {
    let geom = GeometryValue {
        wkt: g.wkt.clone(),
        crs: g.crs.clone(),
    };
    match geom.kind() {
        Ok(GeometryKind::GeometryCollection) => Err(literal_error(
            "Shapes of type GeometryCollection not supported.",
        )),
        Ok(_) => Ok(geom),
        Err(_) => Err(literal_error(format!("Not a valid shape:{}", g.wkt))),
    }
}

/// Rebuild the collection the type asks for: sets drop order, arrays keep it
fn collect(dtype: &DataType, items: impl Iterator<Item = Value>) -> Result<Value, DeserializeError> {
    match dtype {
        DataType::Set(_) => Ok(Value::set(items)),
        DataType::Array(_) => Ok(Value::list(items)),
        other => Err(literal_error(format!(
            "List literal cannot have non-collection type {}",
            other
        ))),
    }
}

/// Check `value` against `dtype`, widening ints for float and decimal types
fn conform(value: Value, dtype: &DataType) -> Option<Value> {
    match (value, dtype) {
        (Value::Bool(b), DataType::Boolean) => Some(Value::Bool(b)),
        (Value::Int(i), dt) if dt.is_integer() => {
            let (lo, hi) = dt.integer_bounds()?;
            (lo..=hi).contains(&i).then_some(Value::Int(i))
        }
        (Value::Int(i), dt) if dt.is_floating() => Some(Value::Float(i as f64)),
        (Value::Int(i), DataType::Decimal { .. }) => Some(Value::Int(i)),
        (Value::Float(f), dt) if dt.is_floating() => Some(Value::Float(f)),
        (Value::Float(f), DataType::Decimal { .. }) => Some(Value::Float(f)),
        (
            Value::String(s),
            DataType::String | DataType::Date | DataType::Time | DataType::Timestamp,
        ) => Some(Value::String(s)),
        (Value::Geometry(g), dt) if dt.is_geospatial() => Some(Value::Geometry(g)),
        (Value::List(items), DataType::Array(inner)) => items
            .into_iter()
            .map(|v| conform(v, inner))
            .collect::<Option<Vec<_>>>()
            .map(Value::List),
        (Value::Set(items), DataType::Set(inner)) => items
            .into_iter()
            .map(|v| conform(v, inner))
            .collect::<Option<Vec<_>>>()
            .map(Value::set),
        _ => None,
    }
}

fn describe(raw: &literal::Value) -> String {
    match raw {
        literal::Value::Bool(b) => b.to_string(),
        literal::Value::Int(i) => i.to_string(),
        literal::Value::Uint(u) => u.to_string(),
        literal::Value::Double(f) => f.to_string(),
        literal::Value::String(s) => format!("{:?}", s),
        literal::Value::Geometry(g) => g.wkt.clone(),
        literal::Value::IntList(l) => format!("{:?}", l.value),
        literal::Value::BoolList(l) => format!("{:?}", l.value),
        literal::Value::DoubleList(l) => format!("{:?}", l.value),
        literal::Value::StringList(l) => format!("{:?}", l.value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vektor_ir::{GeoKind, WGS84_CRS};

    fn decode(lit: proto::Literal) -> Result<(Value, DataType), DeserializeError> {
        decode_literal(&lit)
    }

    #[test]
    fn test_integer_fields() {
        let lit = encode_literal(&Value::Int(-5), &DataType::Int64).unwrap();
        assert_eq!(lit.value, Some(literal::Value::Int(-5)));
        assert_eq!(lit.opname, "Literal");
        assert_eq!(lit.dtype, "int64");

        let lit = encode_literal(&Value::Int(1 << 63), &DataType::UInt64).unwrap();
        assert_eq!(lit.value, Some(literal::Value::Uint(1 << 63)));

        let lit = encode_literal(&Value::Int(u64::MAX as i128), &DataType::UInt64).unwrap();
        assert_eq!(lit.value, Some(literal::Value::Uint(u64::MAX)));

        assert_eq!(
            encode_literal(&Value::Int(1 << 64), &DataType::UInt64),
            Err(EncodeError::IntegerOutOfRange(1 << 64))
        );
        assert!(encode_literal(&Value::Int(i64::MIN as i128 - 1), &DataType::Int64).is_err());
    }

    #[test]
    fn test_unsigned_round_trip() {
        let big = Value::Int(u64::MAX as i128);
        let lit = encode_literal(&big, &DataType::UInt64).unwrap();
        assert_eq!(decode(lit).unwrap(), (big, DataType::UInt64));
    }

    #[test]
    fn test_set_and_array_collections() {
        let set = Value::set([Value::from(3), Value::from(1), Value::from(2)]);
        let lit = encode_literal(&set, &DataType::set(DataType::Int8)).unwrap();
        assert!(matches!(lit.value, Some(literal::Value::IntList(_))));
        let (value, dtype) = decode(lit).unwrap();
        assert_eq!(dtype, DataType::set(DataType::Int8));
        assert_eq!(value, Value::set([Value::from(1), Value::from(2), Value::from(3)]));

        let list = Value::list([Value::from("b"), Value::from("a")]);
        let lit = encode_literal(&list, &DataType::array(DataType::String)).unwrap();
        let (value, _) = decode(lit).unwrap();
        assert_eq!(value, list);
        assert_ne!(value, Value::list([Value::from("a"), Value::from("b")]));
    }

    #[test]
    fn test_set_sent_as_array_keeps_serialized_order() {
        let set = Value::set([Value::from(3), Value::from(1), Value::from(2)]);
        let lit = encode_literal(&set, &DataType::array(DataType::Int8)).unwrap();
        assert_eq!(
            lit.value,
            Some(literal::Value::IntList(IntList { value: vec![3, 1, 2] }))
        );
        let (value, dtype) = decode(lit).unwrap();
        assert_eq!(dtype, DataType::array(DataType::Int8));
        assert!(matches!(value, Value::List(_)));
        assert_eq!(value, Value::list([Value::from(3), Value::from(1), Value::from(2)]));
    }

    #[test]
    fn test_list_sent_as_set_decodes_to_members() {
        let list = Value::list([Value::from(3), Value::from(1), Value::from(3)]);
        let lit = encode_literal(&list, &DataType::set(DataType::Int8)).unwrap();
        let (value, dtype) = decode(lit).unwrap();
        assert_eq!(dtype, DataType::set(DataType::Int8));
        assert!(matches!(&value, Value::Set(members) if members.len() == 2));
        assert_eq!(value, Value::set([Value::from(1), Value::from(3)]));
    }

    #[test]
    fn test_decode_int8_array() {
        let lit = make_literal(
            "array<int8>",
            literal::Value::IntList(IntList { value: vec![1, 2, 3, 4] }),
        );
        let (value, dtype) = decode(lit).unwrap();
        assert_eq!(dtype, DataType::array(DataType::Int8));
        assert_eq!(
            value,
            Value::list([Value::from(1), Value::from(2), Value::from(3), Value::from(4)])
        );
        assert_ne!(
            value,
            Value::list([Value::from(4), Value::from(3), Value::from(2), Value::from(1)])
        );
    }

    #[test]
    fn test_empty_list_uses_element_type() {
        let lit = encode_literal(&Value::List(vec![]), &DataType::array(DataType::Float64)).unwrap();
        assert_eq!(
            lit.value,
            Some(literal::Value::DoubleList(DoubleList { value: vec![] }))
        );
    }

    #[test]
    fn test_mixed_list_rejected() {
        let mixed = Value::list([Value::from(1), Value::from("a")]);
        assert!(matches!(
            encode_literal(&mixed, &DataType::array(DataType::Int64)),
            Err(EncodeError::UnsupportedLiteral(_))
        ));
    }

    #[test]
    fn test_wgs84_geometry_becomes_geography() {
        let point = GeometryValue::new("POINT (10 -10)").with_crs(WGS84_CRS);
        let lit = encode_literal(&Value::Geometry(point.clone()), &DataType::spatial(GeoKind::Point))
            .unwrap();
        let (value, dtype) = decode(lit).unwrap();
        assert_eq!(dtype, DataType::geography(4326));
        assert_eq!(value, Value::Geometry(point));
    }

    #[test]
    fn test_untagged_geometry_keeps_type() {
        let point = GeometryValue::new("POINT (10 -10)");
        let lit = encode_literal(&Value::Geometry(point), &DataType::spatial(GeoKind::Point)).unwrap();
        let (_, dtype) = decode(lit).unwrap();
        assert_eq!(dtype, DataType::spatial(GeoKind::Point));
    }

    #[test]
    fn test_unsupported_shapes() {
        for wkt in [
            "GEOMETRYCOLLECTION (POINT (1 2))",
            "LINEARRING (0 0, 1 1, 1 0, 0 0)",
            "NOT A SHAPE",
        ] {
            let lit = make_literal("geometry", literal::Value::Geometry(make_geometry(wkt, None)));
            let err = decode(lit).unwrap_err();
            assert!(err.is_literal_error(), "{}: {:?}", wkt, err);
        }
    }

    #[test]
    fn test_value_must_fit_dtype() {
        let lit = make_literal("int8", literal::Value::Int(1000));
        assert!(decode(lit).unwrap_err().is_literal_error());

        let lit = make_literal("boolean", literal::Value::String("yes".to_string()));
        assert!(decode(lit).unwrap_err().is_literal_error());

        let lit = make_literal("float64", literal::Value::Int(2));
        assert_eq!(decode(lit).unwrap(), (Value::Float(2.0), DataType::Float64));
    }

    #[test]
    fn test_unknown_dtype() {
        let lit = make_literal("quaternion", literal::Value::Int(1));
        assert!(decode(lit).unwrap_err().is_data_type_error());
    }

    #[test]
    fn test_missing_value() {
        let lit = proto::Literal {
            opname: "Literal".to_string(),
            dtype: "int64".to_string(),
            value: None,
        };
        assert!(decode(lit).unwrap_err().is_literal_error());
    }
}
