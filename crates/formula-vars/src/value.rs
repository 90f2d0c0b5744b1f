use std::fmt;
use std::sync::Arc;

use crate::error::{VarError, VarResult};
use crate::registry::VarHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueClass {
    Number,
    Matrix,
    Text,
    Tree,
    Reference,
}

impl ValueClass {
    pub fn as_str(self) -> &'static str {
        match self {
            ValueClass::Number => "number",
            ValueClass::Matrix => "matrix",
            ValueClass::Text => "string",
            ValueClass::Tree => "tree",
            ValueClass::Reference => "variable reference",
        }
    }
}

impl fmt::Display for ValueClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A dense row-major numeric matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Matrix {
    pub fn new(rows: usize, cols: usize, data: Vec<f64>) -> VarResult<Self> {
        let expected = rows.saturating_mul(cols);
        if data.len() != expected {
            return Err(VarError::MatrixShape {
                rows,
                cols,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { rows, cols, data })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        self.data.get(row * self.cols + col).copied()
    }
}

impl fmt::Display for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for row in 0..self.rows {
            if row > 0 {
                f.write_str(",")?;
            }
            f.write_str("{")?;
            for col in 0..self.cols {
                if col > 0 {
                    f.write_str(",")?;
                }
                write!(f, "{}", self.data[row * self.cols + col])?;
            }
            f.write_str("}")?;
        }
        f.write_str("}")
    }
}

/// Opaque tree payload. Tree layout and algorithms live outside this crate; the engine only
/// needs to recognize tree-classified values and carry their source text around.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeValue {
    source: Arc<str>,
}

impl TreeValue {
    pub fn new(source: impl Into<Arc<str>>) -> Self {
        Self {
            source: source.into(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

/// The result of computing a variable or formula.
///
/// Cloning is the duplicate operation: heavy payloads are reference counted, so a clone of a
/// cached matrix still points at the cached allocation.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Matrix(Arc<Matrix>),
    Text(Arc<str>),
    Tree(Arc<TreeValue>),
    /// Another variable standing in as this value. Computing, change detection and
    /// change acknowledgement all defer to the referenced variable.
    Reference(VarHandle),
}

impl Value {
    pub fn class(&self) -> ValueClass {
        match self {
            Value::Number(_) => ValueClass::Number,
            Value::Matrix(_) => ValueClass::Matrix,
            Value::Text(_) => ValueClass::Text,
            Value::Tree(_) => ValueClass::Tree,
            Value::Reference(_) => ValueClass::Reference,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn expect_number(&self) -> VarResult<f64> {
        self.as_number().ok_or(VarError::Type {
            expected: ValueClass::Number,
            actual: self.class(),
        })
    }

    pub fn is_variable_like(&self) -> bool {
        matches!(self, Value::Reference(_))
    }

    /// Whether the value can never change underneath its holder.
    pub fn is_constant(&self) -> bool {
        !self.is_variable_like()
    }

    /// Whether the value can be rendered without computing anything.
    pub fn is_printable(&self) -> bool {
        !self.is_variable_like()
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Number(value as f64)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(Arc::from(value))
    }
}

impl From<Matrix> for Value {
    fn from(value: Matrix) -> Self {
        Value::Matrix(Arc::new(value))
    }
}

impl From<TreeValue> for Value {
    fn from(value: TreeValue) -> Self {
        Value::Tree(Arc::new(value))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{n}"),
            Value::Matrix(m) => write!(f, "{m}"),
            Value::Text(s) => f.write_str(s),
            Value::Tree(t) => f.write_str(t.source()),
            Value::Reference(h) => write!(f, "{h}"),
        }
    }
}
