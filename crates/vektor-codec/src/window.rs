//! Window codec

use vektor_ir::{Expr, FrameMode, Operation, Window, WindowBound};
use vektor_proto::{self as proto, make_window, make_window_tuple, window_param};

use crate::deserializer::AstDeserializer;
use crate::literal::encode_literal;
use crate::serializer::{Emitter, FormatMemo};
use crate::{builtin_registry, DeserializeError, EncodeError};

impl Emitter<'_> {
    pub(crate) fn format_window(&self, window: &Window) -> Result<proto::Window, EncodeError> {
        let group_by = window
            .group_by
            .iter()
            .map(|e| self.format_operand(e))
            .collect::<Result<Vec<_>, _>>()?;
        let order_by = window
            .order_by
            .iter()
            .map(|e| self.format_operand(e))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(make_window(
            group_by,
            order_by,
            self.format_bound(window.preceding.as_ref())?,
            self.format_bound(window.following.as_ref())?,
            self.format_bound(window.max_lookback.as_ref())?,
            window.how.as_str(),
        ))
    }

    fn format_bound(
        &self,
        bound: Option<&WindowBound>,
    ) -> Result<Option<window_param::Value>, EncodeError> {
        let param = match bound {
            None => return Ok(None),
            Some(WindowBound::Offset(n)) => window_param::Value::Offset(*n),
            Some(WindowBound::Range(start, end)) => make_window_tuple(*start, *end),
            Some(WindowBound::Expr(e)) => match e.op() {
                Operation::Literal { value, dtype } => {
                    window_param::Value::Literal(encode_literal(value, dtype)?)
                }
                _ => window_param::Value::Expr(Box::new(self.format_subexpr(e)?)),
            },
        };
        Ok(Some(param))
    }
}

impl AstDeserializer<'_> {
    pub(crate) fn decode_window(&mut self, window: &proto::Window) -> Result<Window, DeserializeError> {
        if !window.r#type.is_empty() && window.r#type != proto::WINDOW_TYPE {
            return Err(DeserializeError::invalid(format!(
                "Expected a window, got {}",
                window.r#type
            )));
        }
        let value = window
            .value
            .as_ref()
            .ok_or_else(|| DeserializeError::invalid("Window has no value"))?;

        let how = if value.how.is_empty() {
            FrameMode::default()
        } else {
            value
                .how
                .parse::<FrameMode>()
                .map_err(|e| DeserializeError::invalid(e.to_string()))?
        };

        let mut decoded = Window {
            how,
            ..Window::default()
        };
        for item in &value.group_by {
            decoded.group_by.push(self.decode_map_value(item)?);
        }
        for item in &value.order_by {
            decoded.order_by.push(self.decode_map_value(item)?);
        }
        decoded.preceding = self.decode_bound(value.preceding.as_ref())?;
        decoded.following = self.decode_bound(value.following.as_ref())?;
        decoded.max_lookback = self.decode_bound(value.max_lookback.as_ref())?;
        Ok(decoded)
    }

    fn decode_bound(
        &mut self,
        param: Option<&proto::WindowParam>,
    ) -> Result<Option<WindowBound>, DeserializeError> {
        let Some(value) = param.and_then(|p| p.value.as_ref()) else {
            return Ok(None);
        };
        let bound = match value {
            window_param::Value::Offset(n) => WindowBound::Offset(*n),
            window_param::Value::Tuple(t) => WindowBound::Range(t.start_value, t.end_value),
            window_param::Value::Expr(node) => WindowBound::Expr(self.decode_expr(node)?),
            window_param::Value::Literal(lit) => WindowBound::Expr(self.decode_literal_expr(lit)?),
        };
        Ok(Some(bound))
    }

    fn decode_map_value(&mut self, item: &proto::MapValue) -> Result<Expr, DeserializeError> {
        match &item.value {
            Some(value) => self.decode_operand(value),
            None => Err(DeserializeError::invalid("Empty window key")),
        }
    }
}

/// Encode a standalone window. Expressions inside it are emitted inline.
pub fn encode_window(window: &Window) -> Result<proto::Window, EncodeError> {
    let memo = FormatMemo::new();
    Emitter {
        registry: builtin_registry(),
        memo: &memo,
    }
    .format_window(window)
}

/// Decode a standalone window; alias references inside it are rejected
pub fn decode_window(window: &proto::Window) -> Result<Window, DeserializeError> {
    AstDeserializer::new().decode_window(window)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vektor_ir::{DataType, Schema};

    fn events() -> Expr {
        Expr::database_table(
            "events",
            Schema::from_pairs([("user", DataType::String), ("ts", DataType::Int64)]),
        )
    }

    #[test]
    fn test_window_round_trip() {
        let t = events();
        let window = Window::rows()
            .group_by([t.column("user").unwrap()])
            .order_by([t.column("ts").unwrap().desc()])
            .preceding(5i64)
            .following((None, Some(0i64)))
            .max_lookback(Expr::literal(100).unwrap());

        let wire = encode_window(&window).unwrap();
        let value = wire.value.as_ref().unwrap();
        assert_eq!(value.how, "rows");
        assert!(matches!(
            value.max_lookback.as_ref().unwrap().value,
            Some(window_param::Value::Literal(_))
        ));

        let decoded = decode_window(&wire).unwrap();
        assert_eq!(decoded, window);
    }

    #[test]
    fn test_empty_how_defaults_to_rows() {
        let mut wire = encode_window(&Window::range()).unwrap();
        assert_eq!(wire.value.as_ref().unwrap().how, "range");
        wire.value.as_mut().unwrap().how = String::new();
        assert_eq!(decode_window(&wire).unwrap().how, FrameMode::Rows);
    }

    #[test]
    fn test_unknown_how_rejected() {
        let mut wire = encode_window(&Window::rows()).unwrap();
        wire.value.as_mut().unwrap().how = "groups".to_string();
        assert!(matches!(
            decode_window(&wire),
            Err(DeserializeError::Invalid(_))
        ));
    }
}
