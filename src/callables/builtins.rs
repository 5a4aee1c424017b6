//! Conversions, rounding and aggregates outside the math library.

use std::str::FromStr;

use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{Signed, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};

use super::{Arity, Callable, iterate};
use crate::{
    evaluator::EvalError,
    operations::{
        add_numbers, bigint_to_decimal, bigint_to_float, decimal_from_float, decimal_to_int,
        float_to_int, int_overflow, integer_result,
    },
    value::{Value, parse_big_integer},
};

pub(super) static CALLABLES: &[Callable] = &[
    Callable::new("sum", Arity::Exact(1), forgiving_sum),
    Callable::new("any", Arity::Exact(1), any),
    Callable::new("all", Arity::Exact(1), all),
    Callable::new("round", Arity::Range(1, 2), round),
    Callable::new("int", Arity::Range(0, 2), int),
    Callable::new("str", Arity::Range(0, 1), str),
    Callable::new("float", Arity::Range(0, 1), float),
    Callable::new("Decimal", Arity::Range(0, 1), decimal),
];

/// Sums an iterable, counting every falsy element (`None`, `0`, `''`,
/// `False`, `[]`) as integer zero.
fn forgiving_sum(args: &[Value]) -> Result<Value, EvalError> {
    iterate("sum", &args[0])?
        .iter()
        .try_fold(Value::Integer(0), |total, item| {
            if item.is_truthy() {
                add_numbers(&total, item)
            } else {
                add_numbers(&total, &Value::Integer(0))
            }
        })
}

fn any(args: &[Value]) -> Result<Value, EvalError> {
    let items = iterate("any", &args[0])?;
    Ok(Value::Boolean(items.iter().any(Value::is_truthy)))
}

fn all(args: &[Value]) -> Result<Value, EvalError> {
    let items = iterate("all", &args[0])?;
    Ok(Value::Boolean(items.iter().all(Value::is_truthy)))
}

// ========================================
// round
// ========================================

/// `round(x)` rounds half to even and returns an integer; `round(x, n)`
/// keeps the type of `x`. A negative `n` rounds to tens, hundreds, ...
fn round(args: &[Value]) -> Result<Value, EvalError> {
    let ndigits = match args.get(1) {
        None | Some(Value::Null) => None,
        // Digit counts beyond 64 bits behave like the nearest 64-bit one
        Some(value) => Some(match value.as_bigint() {
            Some(n) => n
                .to_i64()
                .unwrap_or(if n.is_negative() { i64::MIN } else { i64::MAX }),
            None => {
                return Err(EvalError::TypeError(format!(
                    "{} object cannot be interpreted as an integer",
                    value.type_name()
                )));
            }
        }),
    };

    match (&args[0], ndigits) {
        (value, digits) if value.is_integer() => {
            let n = value.as_bigint().unwrap_or_default();
            match digits {
                None => Ok(Value::from_bigint(n)),
                Some(digits) => round_int(n, digits),
            }
        }
        (Value::Float(x), None) => float_to_int(x.round_ties_even()),
        (Value::Float(x), Some(digits)) => round_float(*x, digits).map(Value::Float),
        (Value::Decimal(d), None) => {
            decimal_to_int(d.round_dp_with_strategy(0, RoundingStrategy::MidpointNearestEven))
        }
        (Value::Decimal(d), Some(digits)) => round_decimal(*d, digits).map(Value::Decimal),
        (other, _) => Err(EvalError::TypeError(format!(
            "type {} doesn't support round()",
            other.type_name()
        ))),
    }
}

fn round_int(n: BigInt, digits: i64) -> Result<Value, EvalError> {
    if digits >= 0 {
        return Ok(Value::from_bigint(n));
    }
    let exponent = digits.unsigned_abs();
    // 10^exponent > 2^(3 * exponent), which already exceeds 2|n|
    if exponent.saturating_mul(3) > n.bits() + 1 {
        return Ok(Value::Integer(0));
    }
    let unit = BigInt::from(10).pow(u32::try_from(exponent).map_err(|_| int_overflow())?);
    let remainder = n.mod_floor(&unit);
    let mut rounded = &n - &remainder;
    let twice = &remainder * 2;
    if twice > unit || (twice == unit && (&rounded / &unit).is_odd()) {
        rounded += &unit;
    }
    integer_result(rounded)
}

fn round_float(x: f64, digits: i64) -> Result<f64, EvalError> {
    if !x.is_finite() || x == 0.0 || digits > 400 {
        return Ok(x);
    }
    if digits >= 0 {
        // Formatting rounds the exact binary value half to even
        let precision = usize::try_from(digits).unwrap_or(0);
        return format!("{:.*}", precision, x)
            .parse::<f64>()
            .map_err(|e| EvalError::ValueError(e.to_string()));
    }
    if digits < -308 {
        return Ok(0.0f64.copysign(x));
    }
    let unit = 10f64.powi(i32::try_from(-digits).unwrap_or(308));
    let rounded = (x / unit).round_ties_even() * unit;
    if rounded.is_infinite() {
        return Err(EvalError::Overflow("rounded value too large to represent".to_string()));
    }
    Ok(rounded)
}

fn round_decimal(d: Decimal, digits: i64) -> Result<Decimal, EvalError> {
    if digits >= 0 {
        let dp = u32::try_from(digits.min(28)).unwrap_or(28);
        return Ok(d.round_dp_with_strategy(dp, RoundingStrategy::MidpointNearestEven));
    }
    let exponent = digits.unsigned_abs();
    if exponent > 28 {
        return Ok(Decimal::ZERO);
    }
    let unit = Decimal::try_from_i128_with_scale(10i128.pow(exponent as u32), 0)
        .map_err(|e| EvalError::Overflow(e.to_string()))?;
    (d / unit)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointNearestEven)
        .checked_mul(unit)
        .ok_or_else(|| EvalError::Overflow("decimal result out of range".to_string()))
}

// ========================================
// Conversions
// ========================================

fn int(args: &[Value]) -> Result<Value, EvalError> {
    match args {
        [] => Ok(Value::Integer(0)),
        [value] => match value {
            Value::Integer(_) | Value::Boolean(_) | Value::BigInt(_) => {
                Ok(Value::from_bigint(value.as_bigint().unwrap_or_default()))
            }
            Value::Float(x) => float_to_int(*x),
            Value::Decimal(d) => decimal_to_int(*d),
            Value::String(s) => parse_int(s, 10),
            other => Err(EvalError::TypeError(format!(
                "int() argument must be a string or a number, not {}",
                other.type_name()
            ))),
        },
        [value, base] => {
            let base = match base.as_int() {
                Some(b) if b == 0 || (2..=36).contains(&b) => b as u32,
                Some(_) => {
                    return Err(EvalError::ValueError(
                        "int() base must be >= 2 and <= 36, or 0".to_string(),
                    ));
                }
                None => {
                    return Err(EvalError::TypeError(format!(
                        "{} object cannot be interpreted as an integer",
                        base.type_name()
                    )));
                }
            };
            match value {
                Value::String(s) => parse_int(s, base),
                _ => Err(EvalError::TypeError(
                    "int() can't convert non-string with explicit base".to_string(),
                )),
            }
        }
        _ => Err(EvalError::TypeError(format!(
            "int() takes at most 2 arguments ({} given)",
            args.len()
        ))),
    }
}

/// Strips underscores that sit between two digits; any other underscore
/// makes the literal invalid.
fn strip_digit_separators(text: &str, base: u32) -> Option<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    for (i, &c) in chars.iter().enumerate() {
        if c == '_' {
            let before = i.checked_sub(1).and_then(|j| chars.get(j));
            let after = chars.get(i + 1);
            match (before, after) {
                (Some(b), Some(a)) if b.is_digit(base) && a.is_digit(base) => continue,
                _ => return None,
            }
        }
        out.push(c);
    }
    Some(out)
}

/// Parses an integer literal the way `int(text, base)` does: surrounding
/// whitespace, a sign, a `0x`/`0o`/`0b` prefix matching the base, and
/// underscores between digits are accepted. Base 0 infers the base from
/// the prefix.
fn parse_int(text: &str, base: u32) -> Result<Value, EvalError> {
    let invalid = || {
        EvalError::ValueError(format!(
            "invalid literal for int() with base {}: {}",
            base,
            Value::from(text).repr()
        ))
    };

    let trimmed = text.trim();
    let (negative, unsigned) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };

    let lower = unsigned.to_ascii_lowercase();
    let prefixed = |p: &str, b: u32| (base == 0 || base == b) && lower.starts_with(p);
    let (radix, digits) = if prefixed("0x", 16) {
        (16, prefix_body(&unsigned[2..]))
    } else if prefixed("0o", 8) {
        (8, prefix_body(&unsigned[2..]))
    } else if prefixed("0b", 2) {
        (2, prefix_body(&unsigned[2..]))
    } else if base == 0 {
        // Decimal literals may not carry leading zeros
        if unsigned.len() > 1
            && unsigned.starts_with('0')
            && unsigned.chars().any(|c| c != '0' && c != '_')
        {
            return Err(invalid());
        }
        (10, unsigned)
    } else {
        (base, unsigned)
    };
    let cleaned = strip_digit_separators(digits, radix).ok_or_else(invalid)?;
    if cleaned.is_empty() || !cleaned.chars().all(|c| c.is_digit(radix)) {
        return Err(invalid());
    }

    let magnitude = parse_big_integer(&cleaned, radix).ok_or_else(int_overflow)?;
    Ok(Value::from_bigint(if negative { -magnitude } else { magnitude }))
}

/// Digits after a base prefix may open with one separator (`0x_ff`).
fn prefix_body(digits: &str) -> &str {
    digits.strip_prefix('_').unwrap_or(digits)
}

fn float(args: &[Value]) -> Result<Value, EvalError> {
    let Some(value) = args.first() else {
        return Ok(Value::Float(0.0));
    };
    match value {
        Value::Float(x) => Ok(Value::Float(*x)),
        Value::BigInt(n) => bigint_to_float(n).map(Value::Float),
        Value::Integer(_) | Value::Boolean(_) | Value::Decimal(_) => value
            .as_float()
            .map(Value::Float)
            .ok_or_else(|| EvalError::Overflow("decimal too large to convert to float".to_string())),
        Value::String(s) => parse_float(s).map(Value::Float),
        other => Err(EvalError::TypeError(format!(
            "float() argument must be a string or a real number, not {}",
            other.type_name()
        ))),
    }
}

fn parse_float(text: &str) -> Result<f64, EvalError> {
    let invalid = || {
        EvalError::ValueError(format!(
            "could not convert string to float: {}",
            Value::from(text).repr()
        ))
    };

    let trimmed = text.trim();
    let unsigned = trimmed.trim_start_matches(['+', '-']);
    if trimmed.len() - unsigned.len() > 1 {
        return Err(invalid());
    }
    let negative = trimmed.starts_with('-');
    let special = match unsigned.to_ascii_lowercase().as_str() {
        "inf" | "infinity" => Some(f64::INFINITY),
        "nan" => Some(f64::NAN),
        _ => None,
    };
    if let Some(value) = special {
        return Ok(if negative { -value } else { value });
    }

    if !unsigned.starts_with(|c: char| c.is_ascii_digit() || c == '.') {
        return Err(invalid());
    }
    let cleaned = strip_digit_separators(trimmed, 10).ok_or_else(invalid)?;
    cleaned.parse::<f64>().map_err(|_| invalid())
}

fn str(args: &[Value]) -> Result<Value, EvalError> {
    Ok(Value::String(
        args.first().map(Value::to_string).unwrap_or_default(),
    ))
}

fn decimal(args: &[Value]) -> Result<Value, EvalError> {
    let Some(value) = args.first() else {
        return Ok(Value::Decimal(Decimal::ZERO));
    };
    match value {
        Value::Decimal(d) => Ok(Value::Decimal(*d)),
        Value::Integer(_) | Value::Boolean(_) | Value::BigInt(_) => value
            .as_bigint()
            .map_or(Ok(Decimal::ZERO), |n| bigint_to_decimal(&n))
            .map(Value::Decimal),
        Value::Float(x) if x.is_finite() => decimal_from_float(*x).map(Value::Decimal),
        Value::Float(_) => Err(EvalError::ValueError(format!(
            "cannot convert {} to decimal",
            value
        ))),
        Value::String(s) => parse_decimal(s).map(Value::Decimal),
        other => Err(EvalError::TypeError(format!(
            "conversion from {} to Decimal is not supported",
            other.type_name()
        ))),
    }
}

fn parse_decimal(text: &str) -> Result<Decimal, EvalError> {
    let invalid = || {
        EvalError::ValueError(format!(
            "invalid literal for Decimal: {}",
            Value::from(text).repr()
        ))
    };

    let cleaned = strip_digit_separators(text.trim(), 10).ok_or_else(invalid)?;
    if cleaned.contains(['e', 'E']) {
        Decimal::from_scientific(&cleaned).map_err(|_| invalid())
    } else {
        Decimal::from_str(&cleaned).map_err(|_| invalid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_round_half_even() {
        assert_eq!(round(&[Value::Float(2.5)]), Ok(Value::Integer(2)));
        assert_eq!(round(&[Value::Float(3.5)]), Ok(Value::Integer(4)));
        assert_eq!(round(&[Value::Float(1.234), Value::Integer(1)]), Ok(Value::Float(1.2)));
        assert_eq!(round(&[Value::Float(2.675), Value::Integer(2)]), Ok(Value::Float(2.67)));
        assert_eq!(round(&[Value::Integer(25), Value::Integer(-1)]), Ok(Value::Integer(20)));
        assert_eq!(round(&[Value::Integer(35), Value::Integer(-1)]), Ok(Value::Integer(40)));
        assert_eq!(round(&[Value::Float(1234.5), Value::Integer(-2)]), Ok(Value::Float(1200.0)));
        assert_eq!(round(&[Value::Integer(-25), Value::Integer(-1)]), Ok(Value::Integer(-20)));
        assert_eq!(round(&[Value::Integer(-26), Value::Integer(-1)]), Ok(Value::Integer(-30)));
    }

    #[test]
    fn test_round_wide_integers() {
        let wide: BigInt = BigInt::from(u64::MAX) * 1000 + 500;
        // The tie goes to the even multiple
        assert_eq!(
            round(&[Value::BigInt(wide.clone()), Value::Integer(-3)]),
            Ok(Value::BigInt((BigInt::from(u64::MAX) + 1) * 1000))
        );
        assert_eq!(
            round(&[Value::BigInt(wide.clone()), Value::Integer(-400)]),
            Ok(Value::Integer(0))
        );
        // An oversized digit count keeps the value
        assert_eq!(
            round(&[Value::Integer(7), Value::BigInt(BigInt::from(u64::MAX) + 1)]),
            Ok(Value::Integer(7))
        );
        assert_eq!(
            round(&[Value::Float(1e20)]),
            Ok(Value::BigInt(BigInt::from(100_000_000_000_000_000_000u128)))
        );
        assert_eq!(round(&[Value::Integer(7), Value::BigInt(-wide)]), Ok(Value::Integer(0)));
    }

    #[test]
    fn test_round_keeps_decimals() {
        let d = Decimal::from_str("2.345").unwrap();
        assert_eq!(
            round(&[Value::Decimal(d), Value::Integer(2)]),
            Ok(Value::Decimal(Decimal::from_str("2.34").unwrap()))
        );
        assert_eq!(round(&[Value::Decimal(d)]), Ok(Value::Integer(2)));
    }

    #[test]
    fn test_parse_int_forms() {
        let cases = vec![
            (" -42 ", 10, -42),
            ("1_000", 10, 1000),
            ("0x1f", 0, 31),
            ("0x_1f", 16, 31),
            ("ff", 16, 255),
            ("z", 36, 35),
            ("000", 0, 0),
            ("-9223372036854775808", 10, i64::MIN),
        ];
        for (text, base, expected) in cases {
            assert_eq!(
                parse_int(text, base),
                Ok(Value::Integer(expected)),
                "Failed for input: {}",
                text
            );
        }
        assert!(matches!(parse_int("010", 0), Err(EvalError::ValueError(_))));
        assert!(matches!(parse_int("1__0", 10), Err(EvalError::ValueError(_))));
        assert!(matches!(parse_int("1.5", 10), Err(EvalError::ValueError(_))));
    }

    #[test]
    fn test_parse_int_wide() {
        assert_eq!(
            parse_int("-99999999999999999999", 10),
            Ok(Value::BigInt(-BigInt::from(99_999_999_999_999_999_999u128)))
        );
        assert_eq!(
            parse_int("0x1_0000_0000_0000_0000", 0),
            Ok(Value::BigInt(BigInt::from(u64::MAX) + 1))
        );
        assert!(matches!(
            parse_int(&"9".repeat(70_000), 10),
            Err(EvalError::Overflow(_))
        ));
    }

    #[test]
    fn test_parse_float_forms() {
        assert_eq!(parse_float(" 1.5 "), Ok(1.5));
        assert_eq!(parse_float("1_000.25"), Ok(1000.25));
        assert_eq!(parse_float("-Infinity"), Ok(f64::NEG_INFINITY));
        assert_eq!(parse_float(".5e1"), Ok(5.0));
        assert!(parse_float("nan").is_ok_and(f64::is_nan));
        assert!(parse_float("--1").is_err());
        assert!(parse_float("abc").is_err());
    }

    #[test]
    fn test_decimal_conversion() {
        assert_eq!(
            decimal(&[Value::from("1.10")]),
            Ok(Value::Decimal(Decimal::new(110, 2)))
        );
        assert_eq!(
            decimal(&[Value::from("1e3")]),
            Ok(Value::Decimal(Decimal::new(1000, 0)))
        );
        assert!(matches!(
            decimal(&[Value::Float(f64::NAN)]),
            Err(EvalError::ValueError(_))
        ));
        assert!(matches!(decimal(&[Value::Null]), Err(EvalError::TypeError(_))));
        assert_eq!(
            decimal(&[Value::BigInt(BigInt::from(u64::MAX) + 1)]),
            Ok(Value::Decimal(Decimal::from(u64::MAX) + Decimal::ONE))
        );
        assert!(matches!(
            decimal(&[Value::BigInt(BigInt::from(1) << 200u32)]),
            Err(EvalError::Overflow(_))
        ));
    }
}
