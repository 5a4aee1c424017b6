use std::fmt;

use num_bigint::BigInt;
use num_traits::{ToPrimitive, Zero};
use rust_decimal::Decimal;

/// Widest integer a value may hold. Literals and results beyond this are
/// `Overflow` errors rather than unbounded allocations.
pub const MAX_INTEGER_BITS: u64 = 1 << 16;

/// A runtime value produced by evaluation.
///
/// Integers, floats and decimals are kept apart: arithmetic follows the usual
/// promotion rules (integer with float gives float, integer with decimal gives
/// decimal) instead of collapsing everything into one number type. Integers
/// that leave the 64-bit range move to `BigInt` and come back once they fit.
///
/// # Examples
///
/// ```
/// use safe_expr::Value;
///
/// let null = Value::Null;
/// let boolean = Value::Boolean(true);
/// let integer = Value::Integer(42);
/// let float = Value::Float(3.5);
/// let string = Value::String("hello".to_string());
/// let list = Value::List(vec![Value::Integer(1), Value::Integer(2)]);
///
/// assert!(!null.is_truthy());
/// assert_eq!(list.to_string(), "[1, 2]");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Absence of a value (`None`)
    Null,

    /// `True` / `False`
    Boolean(bool),

    /// 64-bit signed integer
    Integer(i64),

    /// Integer outside the `i64` range; never holds a value that fits in
    /// `Integer`
    BigInt(BigInt),

    /// Double-precision float
    Float(f64),

    /// UTF-8 string
    String(String),

    /// Ordered list of values
    List(Vec<Value>),

    /// Arbitrary-precision decimal, only produced by `Decimal(...)`
    Decimal(Decimal),
}

impl Value {
    /// Truthiness used by `not`, `any`, `all` and the forgiving `sum`.
    ///
    /// Zero of any numeric type, the empty string, the empty list, `False`
    /// and `None` are falsy; everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        use Value::*;
        match self {
            Null => false,
            Boolean(b) => *b,
            Integer(n) => *n != 0,
            Value::BigInt(n) => !n.is_zero(),
            Float(n) => *n != 0.0,
            String(s) => !s.is_empty(),
            List(items) => !items.is_empty(),
            Decimal(d) => !d.is_zero(),
        }
    }

    /// Human-readable type name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Integer(_) | Value::BigInt(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Decimal(_) => "decimal",
        }
    }

    /// Normalizing constructor: values that fit in 64 bits become `Integer`.
    pub fn from_bigint(n: BigInt) -> Value {
        match n.to_i64() {
            Some(small) => Value::Integer(small),
            None => Value::BigInt(n),
        }
    }

    /// Integer view of 64-bit integers and booleans.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            Value::Boolean(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    /// Integer view of any integer or boolean, however wide.
    pub fn as_bigint(&self) -> Option<BigInt> {
        match self {
            Value::BigInt(n) => Some(n.clone()),
            other => other.as_int().map(BigInt::from),
        }
    }

    /// Float view of any numeric value; `None` for integers too large to
    /// be a finite float.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Integer(n) => Some(*n as f64),
            Value::BigInt(n) => n.to_f64().filter(|x| x.is_finite()),
            Value::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Float(n) => Some(*n),
            Value::Decimal(d) => d.to_f64(),
            _ => None,
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, Value::Integer(_) | Value::BigInt(_) | Value::Boolean(_))
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integer() || matches!(self, Value::Float(_) | Value::Decimal(_))
    }

    /// Source-like rendering: strings are quoted, decimals show their
    /// constructor. This is how values appear inside lists.
    pub fn repr(&self) -> String {
        match self {
            Value::String(s) => quote_string(s),
            Value::Decimal(d) => format!("Decimal('{}')", d),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "None"),
            Value::Boolean(true) => write!(f, "True"),
            Value::Boolean(false) => write!(f, "False"),
            Value::Integer(n) => write!(f, "{}", n),
            Value::BigInt(n) => write!(f, "{}", n),
            Value::Float(n) => write!(f, "{}", format_float(*n)),
            Value::String(s) => write!(f, "{}", s),
            Value::Decimal(d) => write!(f, "{}", d),
            Value::List(items) => {
                let parts: Vec<String> = items.iter().map(Value::repr).collect();
                write!(f, "[{}]", parts.join(", "))
            }
        }
    }
}

/// Parses unsigned digits in `radix`, without sign, prefix or separators.
///
/// Returns `None` for invalid digits and for numbers wider than
/// [`MAX_INTEGER_BITS`]; the width is bounded before any parsing work.
pub fn parse_big_integer(digits: &str, radix: u32) -> Option<BigInt> {
    let significant = digits.trim_start_matches('0');
    if significant.len() as u64 > MAX_INTEGER_BITS {
        return None;
    }
    if significant.is_empty() {
        return digits.chars().all(|c| c == '0').then(BigInt::zero);
    }
    BigInt::parse_bytes(significant.as_bytes(), radix).filter(|n| n.bits() <= MAX_INTEGER_BITS)
}

/// Shortest round-tripping text for a float.
///
/// Whole numbers keep a trailing `.0`; very large or very small magnitudes
/// switch to exponent form with a signed, two-digit exponent (`1e+16`,
/// `1e-05`).
pub fn format_float(n: f64) -> String {
    if n.is_nan() {
        return "nan".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if n == 0.0 {
        return if n.is_sign_negative() { "-0.0" } else { "0.0" }.to_string();
    }

    // `{:e}` yields the shortest round-trip digits, e.g. "1.5e-7"
    let scientific = format!("{:e}", n);
    let (mantissa, exponent) = match scientific.split_once('e') {
        Some((m, e)) => (m.to_string(), e.parse::<i32>().unwrap_or(0)),
        None => (scientific.clone(), 0),
    };

    if (-4..16).contains(&exponent) {
        let plain = format!("{}", n);
        if plain.contains('.') {
            plain
        } else {
            format!("{}.0", plain)
        }
    } else {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", mantissa, sign, exponent.abs())
    }
}

fn quote_string(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') {
        '"'
    } else {
        '\''
    };

    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if c.is_control() => out.push_str(&format!("\\x{:02x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<BigInt> for Value {
    fn from(n: BigInt) -> Self {
        Value::from_bigint(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Decimal> for Value {
    fn from(d: Decimal) -> Self {
        Value::Decimal(d)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}
