//! Window (analytic frame) specifications

use std::fmt;
use std::str::FromStr;

use crate::{Expr, IrError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FrameMode {
    #[default]
    Rows,
    Range,
}

impl FrameMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FrameMode::Rows => "rows",
            FrameMode::Range => "range",
        }
    }
}

impl fmt::Display for FrameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FrameMode {
    type Err = IrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rows" => Ok(FrameMode::Rows),
            "range" => Ok(FrameMode::Range),
            other => Err(IrError::InvalidType(format!("unknown window frame unit '{}'", other))),
        }
    }
}

/// One edge of a window frame
#[derive(Debug, Clone, PartialEq)]
pub enum WindowBound {
    /// Fixed number of rows (or range units) from the current row
    Offset(i64),
    /// `(start, end)` pair; `None` means unbounded on that side
    Range(Option<i64>, Option<i64>),
    /// Bound computed by an expression, usually a literal
    Expr(Expr),
}

impl From<i64> for WindowBound {
    fn from(v: i64) -> Self {
        WindowBound::Offset(v)
    }
}

impl From<(Option<i64>, Option<i64>)> for WindowBound {
    fn from(v: (Option<i64>, Option<i64>)) -> Self {
        WindowBound::Range(v.0, v.1)
    }
}

impl From<Expr> for WindowBound {
    fn from(v: Expr) -> Self {
        WindowBound::Expr(v)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Window {
    pub group_by: Vec<Expr>,
    pub order_by: Vec<Expr>,
    pub preceding: Option<WindowBound>,
    pub following: Option<WindowBound>,
    pub max_lookback: Option<WindowBound>,
    pub how: FrameMode,
}

impl Window {
    pub fn rows() -> Self {
        Self::default()
    }

    pub fn range() -> Self {
        Self {
            how: FrameMode::Range,
            ..Self::default()
        }
    }

    pub fn group_by(mut self, keys: impl IntoIterator<Item = Expr>) -> Self {
        self.group_by.extend(keys);
        self
    }

    pub fn order_by(mut self, keys: impl IntoIterator<Item = Expr>) -> Self {
        self.order_by.extend(keys);
        self
    }

    pub fn preceding(mut self, bound: impl Into<WindowBound>) -> Self {
        self.preceding = Some(bound.into());
        self
    }

    pub fn following(mut self, bound: impl Into<WindowBound>) -> Self {
        self.following = Some(bound.into());
        self
    }

    pub fn max_lookback(mut self, bound: impl Into<WindowBound>) -> Self {
        self.max_lookback = Some(bound.into());
        self
    }
}
