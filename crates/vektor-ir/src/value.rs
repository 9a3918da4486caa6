//! Constant values carried by literal nodes

use std::fmt;
use std::str::FromStr;

use crate::types::{DataType, GeoKind};
use crate::IrError;

/// CRS tag identifying long/lat coordinates
pub const WGS84_CRS: &str = "EPSG:4326";

/// A literal constant.
///
/// `List` keeps element order; `Set` does not, and compares equal to any
/// permutation of the same members.
#[derive(Debug, Clone)]
pub enum Value {
    Bool(bool),
    Int(i128),
    Float(f64),
    String(String),
    Geometry(GeometryValue),
    List(Vec<Value>),
    Set(Vec<Value>),
}

impl Value {
    /// Build a set, dropping repeated members
    pub fn set<I: IntoIterator<Item = Value>>(items: I) -> Self {
        let mut members: Vec<Value> = Vec::new();
        for item in items {
            if !members.contains(&item) {
                members.push(item);
            }
        }
        Value::Set(members)
    }

    pub fn list<I: IntoIterator<Item = Value>>(items: I) -> Self {
        Value::List(items.into_iter().collect())
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Geometry(_) => "geometry",
            Value::List(_) => "list",
            Value::Set(_) => "set",
        }
    }

    pub fn elements(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) | Value::Set(items) => Some(items),
            _ => None,
        }
    }

    /// Infer the logical type of this value.
    ///
    /// Geometries tagged with [`WGS84_CRS`] are geography on srid 4326.
    pub fn infer_type(&self) -> Result<DataType, IrError> {
        let dt = match self {
            Value::Bool(_) => DataType::Boolean,
            Value::Int(v) if *v > i64::MAX as i128 => DataType::UInt64,
            Value::Int(_) => DataType::Int64,
            Value::Float(_) => DataType::Float64,
            Value::String(_) => DataType::String,
            Value::Geometry(geom) => {
                if geom.is_wgs84() {
                    DataType::geography(DataType::WGS84_SRID)
                } else {
                    DataType::spatial(geom.kind()?.data_kind())
                }
            }
            Value::List(items) => DataType::array(element_type(items)?),
            Value::Set(items) => DataType::set(element_type(items)?),
        };
        Ok(dt)
    }
}

fn element_type(items: &[Value]) -> Result<DataType, IrError> {
    items
        .first()
        .ok_or(IrError::EmptyCollection)?
        .infer_type()
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Geometry(a), Value::Geometry(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Set(a), Value::Set(b)) => {
                a.len() == b.len() && a.iter().all(|x| b.contains(x)) && b.iter().all(|x| a.contains(x))
            }
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v as i128)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i128)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::Int(v as i128)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<GeometryValue> for Value {
    fn from(v: GeometryValue) -> Self {
        Value::Geometry(v)
    }
}

/// Shape kind of a parsed geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryKind {
    Point,
    LineString,
    Polygon,
    MultiPoint,
    MultiLineString,
    MultiPolygon,
    GeometryCollection,
}

impl GeometryKind {
    /// Geospatial data type matching this shape
    pub fn data_kind(&self) -> GeoKind {
        match self {
            GeometryKind::Point => GeoKind::Point,
            GeometryKind::LineString => GeoKind::LineString,
            GeometryKind::Polygon => GeoKind::Polygon,
            GeometryKind::MultiPoint => GeoKind::MultiPoint,
            GeometryKind::MultiLineString => GeoKind::MultiLineString,
            GeometryKind::MultiPolygon => GeoKind::MultiPolygon,
            GeometryKind::GeometryCollection => GeoKind::Geometry,
        }
    }
}

/// Geometry held as WKT text plus an optional CRS tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeometryValue {
    pub wkt: String,
    pub crs: Option<String>,
}

impl GeometryValue {
    pub fn new(wkt: impl Into<String>) -> Self {
        Self {
            wkt: wkt.into(),
            crs: None,
        }
    }

    pub fn with_crs(mut self, crs: impl Into<String>) -> Self {
        self.crs = Some(crs.into());
        self
    }

    pub fn is_wgs84(&self) -> bool {
        self.crs.as_deref() == Some(WGS84_CRS)
    }

    /// Parse the WKT text and report its shape kind
    pub fn kind(&self) -> Result<GeometryKind, IrError> {
        let parsed = wkt::Wkt::<f64>::from_str(&self.wkt)
            .map_err(|e| IrError::InvalidGeometry(format!("{}: {}", e, self.wkt)))?;
        let kind = match parsed {
            wkt::Wkt::Point(_) => GeometryKind::Point,
            wkt::Wkt::LineString(_) => GeometryKind::LineString,
            wkt::Wkt::Polygon(_) => GeometryKind::Polygon,
            wkt::Wkt::MultiPoint(_) => GeometryKind::MultiPoint,
            wkt::Wkt::MultiLineString(_) => GeometryKind::MultiLineString,
            wkt::Wkt::MultiPolygon(_) => GeometryKind::MultiPolygon,
            wkt::Wkt::GeometryCollection(_) => GeometryKind::GeometryCollection,
        };
        Ok(kind)
    }
}

impl fmt::Display for GeometryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.crs {
            Some(crs) => write!(f, "{} [{}]", self.wkt, crs),
            None => write!(f, "{}", self.wkt),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_ignores_order_and_duplicates() {
        let a = Value::set([Value::from(1), Value::from(2), Value::from(2)]);
        let b = Value::set([Value::from(2), Value::from(1)]);
        assert_eq!(a, b);
        assert_eq!(a.elements().unwrap().len(), 2);
    }

    #[test]
    fn test_list_keeps_order() {
        let a = Value::list([Value::from(1), Value::from(2)]);
        let b = Value::list([Value::from(2), Value::from(1)]);
        assert_ne!(a, b);
        assert_ne!(a, Value::set([Value::from(1), Value::from(2)]));
    }

    #[test]
    fn test_infer_type() {
        assert_eq!(Value::from(true).infer_type().unwrap(), DataType::Boolean);
        assert_eq!(Value::from(100).infer_type().unwrap(), DataType::Int64);
        assert_eq!(Value::from(u64::MAX).infer_type().unwrap(), DataType::UInt64);
        assert_eq!(
            Value::list([Value::from("a")]).infer_type().unwrap(),
            DataType::array(DataType::String)
        );
        assert!(matches!(
            Value::List(vec![]).infer_type(),
            Err(IrError::EmptyCollection)
        ));
    }

    #[test]
    fn test_geometry_kind() {
        let polygon = GeometryValue::new("POLYGON ((0 1, 1 1, 1 0, 0 1))");
        assert_eq!(polygon.kind().unwrap(), GeometryKind::Polygon);
        assert_eq!(
            Value::Geometry(polygon.clone()).infer_type().unwrap(),
            DataType::spatial(GeoKind::Polygon)
        );

        let tagged = polygon.with_crs(WGS84_CRS);
        assert_eq!(
            Value::Geometry(tagged).infer_type().unwrap(),
            DataType::geography(4326)
        );

        assert!(GeometryValue::new("DODECAHEDRON").kind().is_err());
    }
}
