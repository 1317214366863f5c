// used to print out readable forms of a value
use std::fmt;

/// One data line: an ordered, fixed-arity tuple of values, one per resolved column.
pub type Row = Vec<Value>;

// ------------- CellId -------------
/// Grid coordinates of one cell, zero based. Components are signed so that
/// out-of-range input survives until validation can report it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellId(Vec<i64>);

impl CellId {
    pub fn new(components: Vec<i64>) -> Self {
        Self(components)
    }
    pub fn components(&self) -> &[i64] {
        &self.0
    }
    pub fn len(&self) -> usize {
        self.0.len()
    }
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
    /// Position of this cell in a row-major array of the given shape, if it is inside it.
    pub fn flat_index(&self, shape: &[usize]) -> Option<usize> {
        if self.0.len() != shape.len() {
            return None;
        }
        let mut index = 0usize;
        for (component, bound) in self.0.iter().zip(shape) {
            let component = usize::try_from(*component).ok()?;
            if component >= *bound {
                return None;
            }
            index = index * bound + component;
        }
        Some(index)
    }
}
impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|c| c.to_string()).collect();
        write!(f, "({})", parts.join(", "))
    }
}
impl From<Vec<i64>> for CellId {
    fn from(components: Vec<i64>) -> Self {
        Self(components)
    }
}
impl<const N: usize> From<[i64; N]> for CellId {
    fn from(components: [i64; N]) -> Self {
        Self(components.to_vec())
    }
}
impl From<(i64, i64, i64)> for CellId {
    fn from((k, i, j): (i64, i64, i64)) -> Self {
        Self(vec![k, i, j])
    }
}
impl From<(i64, i64)> for CellId {
    fn from((k, cell): (i64, i64)) -> Self {
        Self(vec![k, cell])
    }
}

// ------------- Value -------------
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Double(f64),
    Text(String),
    CellId(CellId),
}

impl Value {
    /// Null and NaN both mean "no value in this column".
    pub fn is_absent(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Double(x) => x.is_nan(),
            _ => false,
        }
    }
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(n) => Some(*n as f64),
            Value::Double(x) => Some(*x),
            _ => None,
        }
    }
    pub fn as_cellid(&self) -> Option<&CellId> {
        match self {
            Value::CellId(c) => Some(c),
            _ => None,
        }
    }
    pub fn data_type(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Integer(_) => "Integer",
            Value::Double(_) => "Double",
            Value::Text(_) => "Text",
            Value::CellId(_) => "CellId",
        }
    }
}
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Null => write!(f, "None"),
            Value::Integer(n) => write!(f, "{}", n),
            Value::Double(x) => write!(f, "{:?}", x),
            Value::Text(s) => write!(f, "{}", s),
            Value::CellId(c) => write!(f, "{}", c),
        }
    }
}
impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}
impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Integer(n as i64)
    }
}
impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Double(x)
    }
}
impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}
impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}
impl From<CellId> for Value {
    fn from(c: CellId) -> Self {
        Value::CellId(c)
    }
}
impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

// ------------- Text forms -------------
/// Shortest round-trip form, or scientific notation with `precision` digits
/// after the decimal point when one is requested.
pub fn format_double(value: f64, precision: Option<usize>) -> String {
    match precision {
        Some(digits) => format!("{:.*E}", digits, value),
        None => format!("{:?}", value),
    }
}

/// `None` when a component plus the offset leaves the `i64` range.
pub fn format_cellid(cellid: &CellId, offset: i64) -> Option<String> {
    let parts: Option<Vec<String>> = cellid
        .components()
        .iter()
        .map(|c| c.checked_add(offset).map(|c| c.to_string()))
        .collect();
    parts.map(|parts| parts.join(" "))
}

/// True when a token written bare would not read back as the same text:
/// it is empty, or holds a separator, a quote or a comment marker.
pub fn needs_quotes(text: &str) -> bool {
    text.is_empty()
        || text.contains("//")
        || text
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, ',' | '#' | '!' | '\'' | '"'))
}

/// Quotes text that cannot be written bare. `None` when it holds both quote
/// characters, since no quoted form of it can be read back.
pub fn quote_text(text: &str) -> Option<String> {
    if !needs_quotes(text) {
        Some(text.to_string())
    } else if !text.contains('\'') {
        Some(format!("'{}'", text))
    } else if !text.contains('"') {
        Some(format!("\"{}\"", text))
    } else {
        None
    }
}

/// Accepts Fortran style `D` exponents as well as the usual forms.
pub fn parse_double(token: &str) -> Option<f64> {
    token
        .parse::<f64>()
        .ok()
        .or_else(|| token.replace(['d', 'D'], "E").parse::<f64>().ok())
}

pub fn parse_integer(token: &str) -> Option<i64> {
    token.parse::<i64>().ok().or_else(|| {
        parse_double(token).filter(|x| x.is_finite() && x.fract() == 0.0).map(|x| x as i64)
    })
}
