//! Type and schema codec

use tracing::warn;
use vektor_ir::{ClassName, DataType, FieldType, GeoSpatial, GeoType, Schema};
use vektor_proto::{
    self as proto, make_schema, make_schema_type, schema_type, ArraySchemaValue,
    DecimalSchemaValue, GeospatialSchemaValue, SchemaValue,
};

use crate::DeserializeError;

/// Precision and scale of a decimal that arrives without parameters
const DEFAULT_DECIMAL: (u32, u32) = (38, 9);

pub fn encode_type(dtype: &DataType) -> proto::SchemaType {
    let payload = match dtype {
        DataType::Struct(fields) => Some(schema_type::Value::Struct(encode_fields(fields))),
        DataType::Array(inner) | DataType::Set(inner) => {
            Some(schema_type::Value::Array(ArraySchemaValue {
                value_type: Some(Box::new(encode_type(inner))),
            }))
        }
        DataType::Spatial(geo) => Some(schema_type::Value::Geospatial(GeospatialSchemaValue {
            geotype: geo.geotype.map(|g| g.as_str().to_string()).unwrap_or_default(),
            srid: geo.srid.unwrap_or(0),
        })),
        DataType::Decimal { precision, scale } => {
            Some(schema_type::Value::Decimal(DecimalSchemaValue {
                precision: *precision,
                scale: *scale,
            }))
        }
        _ => None,
    };
    make_schema_type(dtype.class_name(), payload)
}

fn encode_fields(fields: &[FieldType]) -> SchemaValue {
    SchemaValue {
        names: fields.iter().map(|f| f.name.clone()).collect(),
        types: fields.iter().map(|f| encode_type(&f.data_type)).collect(),
    }
}

pub fn encode_schema(schema: &Schema) -> proto::Schema {
    let value = encode_fields(&schema.fields);
    make_schema(value.names, value.types)
}

/// Inverse of [`encode_type`]; unknown class names are a `DataType` error
pub fn decode_type(st: &proto::SchemaType) -> Result<DataType, DeserializeError> {
    let class = ClassName::parse(&st.r#type).ok_or_else(|| {
        warn!(type_name = %st.r#type, "rejecting unknown data type");
        DeserializeError::DataType(format!("Data type not found: {}", st.r#type))
    })?;

    let dtype = match class {
        ClassName::Leaf => DataType::from_class_name(&st.r#type)
            .ok_or_else(|| DeserializeError::DataType(format!("Data type not found: {}", st.r#type)))?,
        ClassName::Decimal => match &st.value {
            Some(schema_type::Value::Decimal(d)) => DataType::decimal(d.precision, d.scale),
            None => DataType::decimal(DEFAULT_DECIMAL.0, DEFAULT_DECIMAL.1),
            Some(_) => return Err(payload_mismatch(st)),
        },
        ClassName::Array | ClassName::Set => {
            let inner = match &st.value {
                Some(schema_type::Value::Array(ArraySchemaValue {
                    value_type: Some(inner),
                })) => decode_type(inner)?,
                _ => return Err(payload_mismatch(st)),
            };
            if class == ClassName::Set {
                DataType::set(inner)
            } else {
                DataType::array(inner)
            }
        }
        ClassName::Struct => match &st.value {
            Some(schema_type::Value::Struct(value)) => DataType::Struct(decode_fields(value)?),
            _ => return Err(payload_mismatch(st)),
        },
        ClassName::Spatial(kind) => {
            let mut geo = GeoSpatial {
                kind,
                geotype: None,
                srid: None,
            };
            match &st.value {
                Some(schema_type::Value::Geospatial(g)) => {
                    if !g.geotype.is_empty() {
                        let geotype = g.geotype.parse::<GeoType>().map_err(|_| {
                            DeserializeError::DataType(format!("Unknown geotype: {}", g.geotype))
                        })?;
                        geo.geotype = Some(geotype);
                    }
                    geo.srid = (g.srid != 0).then_some(g.srid);
                }
                None => {}
                Some(_) => return Err(payload_mismatch(st)),
            }
            DataType::Spatial(geo)
        }
    };
    Ok(dtype)
}

fn payload_mismatch(st: &proto::SchemaType) -> DeserializeError {
    DeserializeError::DataType(format!(
        "Missing or mismatched parameters for data type {}",
        st.r#type
    ))
}

fn decode_fields(value: &SchemaValue) -> Result<Vec<FieldType>, DeserializeError> {
    if value.names.len() != value.types.len() {
        return Err(DeserializeError::invalid(format!(
            "Schema has {} names but {} types",
            value.names.len(),
            value.types.len()
        )));
    }
    value
        .names
        .iter()
        .zip(&value.types)
        .map(|(name, st)| Ok(FieldType::new(name, decode_type(st)?)))
        .collect()
}

/// Decode a standalone schema message, as returned by a schema lookup
pub fn decode_schema(schema: &proto::Schema) -> Result<Schema, DeserializeError> {
    if !schema.r#type.is_empty() && schema.r#type != proto::SCHEMA_TYPE {
        return Err(DeserializeError::invalid(format!(
            "Expected a schema, got {}",
            schema.r#type
        )));
    }
    match &schema.value {
        Some(value) => Ok(Schema::new(decode_fields(value)?)),
        None => Ok(Schema::default()),
    }
}
