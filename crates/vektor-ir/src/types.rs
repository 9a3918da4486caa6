//! Type system for the expression tree
//!
//! Every [`DataType`] has two spellings: the lower-case signature used in
//! expression `type` and literal `dtype` fields (`array<int8>`, `decimal(38, 9)`)
//! and the CamelCase class name carried by schema messages (`Array`, `Decimal`).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::IrError;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    // Primitives
    Boolean,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    Decimal { precision: u32, scale: u32 },

    // Text
    String,

    // Binary
    Binary,

    // Temporal
    Date,
    Time,
    Timestamp,
    Interval,

    // Complex
    Array(Box<DataType>),
    Set(Box<DataType>),
    Struct(Vec<FieldType>),

    // Geospatial
    Spatial(GeoSpatial),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldType {
    pub name: String,
    pub data_type: DataType,
}

impl FieldType {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// Concrete geospatial family member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeoKind {
    Geometry,
    Geography,
    Point,
    LineString,
    Polygon,
    MultiPoint,
    MultiLineString,
    MultiPolygon,
}

impl GeoKind {
    const ALL: [GeoKind; 8] = [
        GeoKind::Geometry,
        GeoKind::Geography,
        GeoKind::Point,
        GeoKind::LineString,
        GeoKind::Polygon,
        GeoKind::MultiPoint,
        GeoKind::MultiLineString,
        GeoKind::MultiPolygon,
    ];

    pub fn class_name(&self) -> &'static str {
        match self {
            GeoKind::Geometry => "Geometry",
            GeoKind::Geography => "Geography",
            GeoKind::Point => "Point",
            GeoKind::LineString => "LineString",
            GeoKind::Polygon => "Polygon",
            GeoKind::MultiPoint => "MultiPoint",
            GeoKind::MultiLineString => "MultiLineString",
            GeoKind::MultiPolygon => "MultiPolygon",
        }
    }

    fn from_class_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.class_name() == name)
    }

    fn from_signature(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|k| k.class_name().eq_ignore_ascii_case(name))
    }
}

/// Interpretation of coordinates: planar or on the ellipsoid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeoType {
    Geometry,
    Geography,
}

impl GeoType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GeoType::Geometry => "geometry",
            GeoType::Geography => "geography",
        }
    }
}

impl FromStr for GeoType {
    type Err = IrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "geometry" => Ok(GeoType::Geometry),
            "geography" => Ok(GeoType::Geography),
            other => Err(IrError::InvalidType(format!("unknown geotype '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GeoSpatial {
    pub kind: GeoKind,
    pub geotype: Option<GeoType>,
    pub srid: Option<u32>,
}

impl DataType {
    /// Geography on the canonical long/lat reference system
    pub const WGS84_SRID: u32 = 4326;

    pub fn array(value_type: DataType) -> Self {
        DataType::Array(Box::new(value_type))
    }

    pub fn set(value_type: DataType) -> Self {
        DataType::Set(Box::new(value_type))
    }

    pub fn decimal(precision: u32, scale: u32) -> Self {
        DataType::Decimal { precision, scale }
    }

    pub fn structure<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = (S, DataType)>,
        S: Into<String>,
    {
        DataType::Struct(
            fields
                .into_iter()
                .map(|(name, dt)| FieldType::new(name, dt))
                .collect(),
        )
    }

    /// A geospatial type with no geotype or srid
    pub fn spatial(kind: GeoKind) -> Self {
        DataType::Spatial(GeoSpatial {
            kind,
            geotype: None,
            srid: None,
        })
    }

    /// `Geography` with its default geotype and the given srid
    pub fn geography(srid: u32) -> Self {
        DataType::Spatial(GeoSpatial {
            kind: GeoKind::Geography,
            geotype: Some(GeoType::Geography),
            srid: Some(srid),
        })
    }

    pub fn with_srid(self, srid: u32) -> Self {
        match self {
            DataType::Spatial(mut geo) => {
                geo.srid = Some(srid);
                DataType::Spatial(geo)
            }
            other => other,
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            DataType::Int8
                | DataType::Int16
                | DataType::Int32
                | DataType::Int64
                | DataType::UInt8
                | DataType::UInt16
                | DataType::UInt32
                | DataType::UInt64
        )
    }

    pub fn is_floating(&self) -> bool {
        matches!(self, DataType::Float32 | DataType::Float64)
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integer() || self.is_floating() || matches!(self, DataType::Decimal { .. })
    }

    pub fn is_geospatial(&self) -> bool {
        matches!(self, DataType::Spatial(_))
    }

    /// Element type of an array or set
    pub fn value_type(&self) -> Option<&DataType> {
        match self {
            DataType::Array(inner) | DataType::Set(inner) => Some(inner),
            _ => None,
        }
    }

    /// Inclusive bounds of an integer type
    pub fn integer_bounds(&self) -> Option<(i128, i128)> {
        let bounds = match self {
            DataType::Int8 => (i8::MIN as i128, i8::MAX as i128),
            DataType::Int16 => (i16::MIN as i128, i16::MAX as i128),
            DataType::Int32 => (i32::MIN as i128, i32::MAX as i128),
            DataType::Int64 => (i64::MIN as i128, i64::MAX as i128),
            DataType::UInt8 => (0, u8::MAX as i128),
            DataType::UInt16 => (0, u16::MAX as i128),
            DataType::UInt32 => (0, u32::MAX as i128),
            DataType::UInt64 => (0, u64::MAX as i128),
            _ => return None,
        };
        Some(bounds)
    }

    fn integer_rank(&self) -> Option<(bool, u8)> {
        let rank = match self {
            DataType::Int8 => (true, 1),
            DataType::Int16 => (true, 2),
            DataType::Int32 => (true, 3),
            DataType::Int64 => (true, 4),
            DataType::UInt8 => (false, 1),
            DataType::UInt16 => (false, 2),
            DataType::UInt32 => (false, 3),
            DataType::UInt64 => (false, 4),
            _ => return None,
        };
        Some(rank)
    }

    /// Result type of arithmetic between two numeric operands
    pub fn promote(left: &DataType, right: &DataType) -> DataType {
        if left.is_floating() || right.is_floating() {
            return DataType::Float64;
        }
        match (left.integer_rank(), right.integer_rank()) {
            (Some((ls, lr)), Some((rs, rr))) => {
                let widest = if lr >= rr { left } else { right };
                if ls == rs || lr != rr {
                    widest.clone()
                } else {
                    // same width, mixed signedness
                    DataType::Int64
                }
            }
            _ => left.clone(),
        }
    }

    /// Class name carried by `SchemaType.type`
    pub fn class_name(&self) -> &'static str {
        match self {
            DataType::Boolean => "Boolean",
            DataType::Int8 => "Int8",
            DataType::Int16 => "Int16",
            DataType::Int32 => "Int32",
            DataType::Int64 => "Int64",
            DataType::UInt8 => "UInt8",
            DataType::UInt16 => "UInt16",
            DataType::UInt32 => "UInt32",
            DataType::UInt64 => "UInt64",
            DataType::Float32 => "Float32",
            DataType::Float64 => "Float64",
            DataType::Decimal { .. } => "Decimal",
            DataType::String => "String",
            DataType::Binary => "Binary",
            DataType::Date => "Date",
            DataType::Time => "Time",
            DataType::Timestamp => "Timestamp",
            DataType::Interval => "Interval",
            DataType::Array(_) => "Array",
            DataType::Set(_) => "Set",
            DataType::Struct(_) => "Struct",
            DataType::Spatial(geo) => geo.kind.class_name(),
        }
    }

    /// Inverse of [`DataType::class_name`] for types without parameters.
    ///
    /// Parameterised classes (`Decimal`, `Array`, `Set`, `Struct`, the
    /// geospatial family) are recognised by [`ClassName::parse`] instead.
    pub fn from_class_name(name: &str) -> Option<DataType> {
        let dt = match name {
            "Boolean" => DataType::Boolean,
            "Int8" => DataType::Int8,
            "Int16" => DataType::Int16,
            "Int32" => DataType::Int32,
            "Int64" => DataType::Int64,
            "UInt8" => DataType::UInt8,
            "UInt16" => DataType::UInt16,
            "UInt32" => DataType::UInt32,
            "UInt64" => DataType::UInt64,
            "Float32" => DataType::Float32,
            "Float64" => DataType::Float64,
            "String" => DataType::String,
            "Binary" => DataType::Binary,
            "Date" => DataType::Date,
            "Time" => DataType::Time,
            "Timestamp" => DataType::Timestamp,
            "Interval" => DataType::Interval,
            _ => return None,
        };
        Some(dt)
    }
}

/// Classification of a schema type name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassName {
    Leaf,
    Decimal,
    Array,
    Set,
    Struct,
    Spatial(GeoKind),
}

impl ClassName {
    pub fn parse(name: &str) -> Option<ClassName> {
        match name {
            "Decimal" => Some(ClassName::Decimal),
            "Array" => Some(ClassName::Array),
            "Set" => Some(ClassName::Set),
            "Struct" => Some(ClassName::Struct),
            other => {
                if DataType::from_class_name(other).is_some() {
                    Some(ClassName::Leaf)
                } else {
                    GeoKind::from_class_name(other).map(ClassName::Spatial)
                }
            }
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Decimal { precision, scale } => write!(f, "decimal({}, {})", precision, scale),
            DataType::Array(inner) => write!(f, "array<{}>", inner),
            DataType::Set(inner) => write!(f, "set<{}>", inner),
            DataType::Struct(fields) => {
                write!(f, "struct<")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", field.name, field.data_type)?;
                }
                write!(f, ">")
            }
            DataType::Spatial(geo) => {
                write!(f, "{}", geo.kind.class_name().to_lowercase())?;
                if let Some(geotype) = geo.geotype {
                    write!(f, ":{}", geotype.as_str())?;
                }
                if let Some(srid) = geo.srid {
                    write!(f, ";{}", srid)?;
                }
                Ok(())
            }
            other => write!(f, "{}", other.class_name().to_lowercase()),
        }
    }
}

impl FromStr for DataType {
    type Err = IrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parser = SignatureParser::new(s);
        let dt = parser.parse_type()?;
        parser.skip_ws();
        if !parser.at_end() {
            return Err(parser.error("trailing characters"));
        }
        Ok(dt)
    }
}

/// Recursive-descent parser for type signatures
struct SignatureParser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> SignatureParser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn skip_ws(&mut self) {
        let trimmed = self.rest().trim_start();
        self.pos = self.input.len() - trimmed.len();
    }

    fn error(&self, reason: &str) -> IrError {
        IrError::InvalidType(format!("{} in '{}' at offset {}", reason, self.input, self.pos))
    }

    fn eat(&mut self, c: char) -> bool {
        self.skip_ws();
        if self.rest().starts_with(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, c: char) -> Result<(), IrError> {
        if self.eat(c) {
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", c)))
        }
    }

    fn ident(&mut self) -> Result<&'a str, IrError> {
        self.skip_ws();
        let rest = self.rest();
        let len = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(rest.len());
        if len == 0 {
            return Err(self.error("expected identifier"));
        }
        self.pos += len;
        Ok(&rest[..len])
    }

    fn number(&mut self) -> Result<u32, IrError> {
        let word = self.ident()?;
        word.parse()
            .map_err(|_| self.error(&format!("expected number, found '{}'", word)))
    }

    fn parse_type(&mut self) -> Result<DataType, IrError> {
        let name = self.ident()?.to_ascii_lowercase();
        let dt = match name.as_str() {
            "boolean" | "bool" => DataType::Boolean,
            "int8" => DataType::Int8,
            "int16" => DataType::Int16,
            "int32" => DataType::Int32,
            "int64" | "int" => DataType::Int64,
            "uint8" => DataType::UInt8,
            "uint16" => DataType::UInt16,
            "uint32" => DataType::UInt32,
            "uint64" => DataType::UInt64,
            "float32" | "halffloat" => DataType::Float32,
            "float64" | "double" | "float" => DataType::Float64,
            "string" => DataType::String,
            "binary" => DataType::Binary,
            "date" => DataType::Date,
            "time" => DataType::Time,
            "timestamp" => DataType::Timestamp,
            "interval" => DataType::Interval,
            "decimal" => {
                if self.eat('(') {
                    let precision = self.number()?;
                    self.expect(',')?;
                    let scale = self.number()?;
                    self.expect(')')?;
                    DataType::Decimal { precision, scale }
                } else {
                    DataType::Decimal {
                        precision: 38,
                        scale: 9,
                    }
                }
            }
            "array" => {
                self.expect('<')?;
                let inner = self.parse_type()?;
                self.expect('>')?;
                DataType::array(inner)
            }
            "set" => {
                self.expect('<')?;
                let inner = self.parse_type()?;
                self.expect('>')?;
                DataType::set(inner)
            }
            "struct" => {
                self.expect('<')?;
                let mut fields = Vec::new();
                if !self.eat('>') {
                    loop {
                        let field_name = self.ident()?.to_string();
                        self.expect(':')?;
                        let field_type = self.parse_type()?;
                        fields.push(FieldType::new(field_name, field_type));
                        if self.eat('>') {
                            break;
                        }
                        self.expect(',')?;
                    }
                }
                DataType::Struct(fields)
            }
            other => match GeoKind::from_signature(other) {
                Some(kind) => self.parse_spatial(kind)?,
                None => return Err(IrError::InvalidType(format!("unknown type '{}'", other))),
            },
        };
        Ok(dt)
    }

    fn parse_spatial(&mut self, kind: GeoKind) -> Result<DataType, IrError> {
        let geotype = if self.eat(':') {
            Some(self.ident()?.parse::<GeoType>()?)
        } else {
            None
        };
        let srid = if self.eat(';') {
            Some(self.number()?)
        } else {
            None
        };
        Ok(DataType::Spatial(GeoSpatial { kind, geotype, srid }))
    }
}

/// Ordered collection of named, typed columns
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Schema {
    pub fields: Vec<FieldType>,
}

impl Schema {
    pub fn new(fields: Vec<FieldType>) -> Self {
        Self { fields }
    }

    /// Build from parallel `(name, type)` pairs
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, DataType)>,
        S: Into<String>,
    {
        Self {
            fields: pairs
                .into_iter()
                .map(|(name, dt)| FieldType::new(name, dt))
                .collect(),
        }
    }

    pub fn find_field(&self, name: &str) -> Option<&FieldType> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn types(&self) -> Vec<&DataType> {
        self.fields.iter().map(|f| &f.data_type).collect()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
