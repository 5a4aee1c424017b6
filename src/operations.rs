//! Operator handlers.
//!
//! Every operator kind the parser knows maps here either to a handler or to
//! an `UnsupportedConstruct` error. The lookups are plain exhaustive matches,
//! so adding an operator to the syntax tree forces a decision about it.

use std::cmp::Ordering;

use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{FromPrimitive, One, Signed, ToPrimitive, Zero};
use rust_decimal::{Decimal, MathematicalOps};

use crate::{
    ast::{BinOp, BoolOp, CmpOp, UnaryOp},
    evaluator::EvalError,
    limits::EvalLimits,
    value::{MAX_INTEGER_BITS, Value},
};

pub type UnaryHandler = fn(&Value) -> Result<Value, EvalError>;
pub type BinaryHandler = fn(&Value, &Value, &EvalLimits) -> Result<Value, EvalError>;
/// Called as `handler(left, right)`; `in` handlers test `left` for
/// membership in `right`.
pub type CompareHandler = fn(&Value, &Value) -> Result<Value, EvalError>;

pub fn unary_handler(op: UnaryOp) -> Result<UnaryHandler, EvalError> {
    match op {
        UnaryOp::Not => Ok(not),
        UnaryOp::USub | UnaryOp::UAdd | UnaryOp::Invert => {
            Err(EvalError::UnsupportedConstruct(op.kind()))
        }
    }
}

pub fn binary_handler(op: BinOp) -> Result<BinaryHandler, EvalError> {
    match op {
        BinOp::Add => Ok(add),
        BinOp::Sub => Ok(subtract),
        BinOp::Mult => Ok(multiply),
        BinOp::Div => Ok(divide),
        BinOp::Pow => Ok(power),
        BinOp::BitAnd => Ok(bit_and),
        BinOp::BitOr => Ok(bit_or),
        BinOp::BitXor => Ok(bit_xor),
        BinOp::FloorDiv | BinOp::Mod | BinOp::MatMult | BinOp::LShift | BinOp::RShift => {
            Err(EvalError::UnsupportedConstruct(op.kind()))
        }
    }
}

/// Pairwise combinator of a boolean chain.
///
/// This is the bitwise operator, not a short-circuiting one: both operands
/// are already evaluated when it runs, and `1 and 2` yields `1 & 2`.
pub fn bool_combinator(op: BoolOp) -> BinaryHandler {
    match op {
        BoolOp::And => bit_and,
        BoolOp::Or => bit_or,
    }
}

pub fn compare_handler(op: CmpOp) -> CompareHandler {
    match op {
        CmpOp::Eq => equal,
        CmpOp::NotEq => not_equal,
        CmpOp::Lt => less,
        CmpOp::LtE => less_equal,
        CmpOp::Gt => greater,
        CmpOp::GtE => greater_equal,
        CmpOp::Is => is,
        CmpOp::IsNot => is_not,
        CmpOp::In => member,
        CmpOp::NotIn => not_member,
    }
}

fn not(operand: &Value) -> Result<Value, EvalError> {
    Ok(Value::Boolean(!operand.is_truthy()))
}

// ========================================
// Arithmetic
// ========================================

/// Operands of a numeric operation after promotion to a common type.
///
/// `Ints` is the fast path; `Bigs` is used as soon as one side does not
/// fit in 64 bits.
enum Numbers {
    Ints(i64, i64),
    Bigs(BigInt, BigInt),
    Floats(f64, f64),
    Decimals(Decimal, Decimal),
}

fn promote(left: &Value, right: &Value, symbol: &str) -> Result<Numbers, EvalError> {
    let mismatch = || unsupported_operands(symbol, left, right);
    match (left, right) {
        (Value::Decimal(a), Value::Decimal(b)) => Ok(Numbers::Decimals(*a, *b)),
        (Value::Decimal(a), _) => {
            let b = integer_to_decimal(right).ok_or_else(mismatch)??;
            Ok(Numbers::Decimals(*a, b))
        }
        (_, Value::Decimal(b)) => {
            let a = integer_to_decimal(left).ok_or_else(mismatch)??;
            Ok(Numbers::Decimals(a, *b))
        }
        (Value::Float(_), _) | (_, Value::Float(_)) => {
            let a = float_operand(left).ok_or_else(mismatch)??;
            let b = float_operand(right).ok_or_else(mismatch)??;
            Ok(Numbers::Floats(a, b))
        }
        _ => match (left.as_int(), right.as_int()) {
            (Some(a), Some(b)) => Ok(Numbers::Ints(a, b)),
            _ => match (left.as_bigint(), right.as_bigint()) {
                (Some(a), Some(b)) => Ok(Numbers::Bigs(a, b)),
                _ => Err(mismatch()),
            },
        },
    }
}

/// Decimal view of an integer operand; `None` for anything else.
fn integer_to_decimal(value: &Value) -> Option<Result<Decimal, EvalError>> {
    value.as_bigint().map(|n| bigint_to_decimal(&n))
}

/// Float view of an integer or float operand; `None` for anything else.
fn float_operand(value: &Value) -> Option<Result<f64, EvalError>> {
    match value {
        Value::BigInt(n) => Some(bigint_to_float(n)),
        Value::Decimal(_) => None,
        other => other.as_float().map(Ok),
    }
}

fn unsupported_operands(symbol: &str, left: &Value, right: &Value) -> EvalError {
    EvalError::TypeError(format!(
        "unsupported operand types for {}: {} and {}",
        symbol,
        left.type_name(),
        right.type_name()
    ))
}

pub(crate) fn int_overflow() -> EvalError {
    EvalError::Overflow(format!(
        "integer result wider than {} bits",
        MAX_INTEGER_BITS
    ))
}

fn decimal_overflow() -> EvalError {
    EvalError::Overflow("decimal result out of range".to_string())
}

/// Wraps an integer result, refusing it when it is wider than
/// `MAX_INTEGER_BITS`.
pub(crate) fn integer_result(n: BigInt) -> Result<Value, EvalError> {
    if n.bits() > MAX_INTEGER_BITS {
        return Err(int_overflow());
    }
    Ok(Value::from_bigint(n))
}

pub(crate) fn bigint_to_float(n: &BigInt) -> Result<f64, EvalError> {
    n.to_f64()
        .filter(|x| x.is_finite())
        .ok_or_else(|| EvalError::Overflow("int too large to convert to float".to_string()))
}

pub(crate) fn bigint_to_decimal(n: &BigInt) -> Result<Decimal, EvalError> {
    n.to_i128()
        .and_then(|n| Decimal::try_from_i128_with_scale(n, 0).ok())
        .ok_or_else(|| EvalError::Overflow("integer too large for a decimal".to_string()))
}

fn check_len(len: usize, limits: &EvalLimits) -> Result<(), EvalError> {
    if len > limits.max_sequence_len {
        return Err(EvalError::Overflow(format!(
            "sequence of length {} exceeds the limit of {}",
            len, limits.max_sequence_len
        )));
    }
    Ok(())
}

fn add(left: &Value, right: &Value, limits: &EvalLimits) -> Result<Value, EvalError> {
    match (left, right) {
        (Value::String(a), Value::String(b)) => {
            check_len(a.chars().count() + b.chars().count(), limits)?;
            Ok(Value::String(format!("{}{}", a, b)))
        }
        (Value::List(a), Value::List(b)) => {
            check_len(a.len() + b.len(), limits)?;
            Ok(Value::List(a.iter().chain(b).cloned().collect()))
        }
        _ => add_numbers(left, right),
    }
}

/// Numeric `+`. Float overflow gives an infinity, as native floats do.
pub(crate) fn add_numbers(left: &Value, right: &Value) -> Result<Value, EvalError> {
    match promote(left, right, "+")? {
        Numbers::Ints(a, b) => Ok(a
            .checked_add(b)
            .map_or_else(|| Value::from_bigint(BigInt::from(a) + b), Value::Integer)),
        Numbers::Bigs(a, b) => integer_result(a + b),
        Numbers::Floats(a, b) => Ok(Value::Float(a + b)),
        Numbers::Decimals(a, b) => a
            .checked_add(b)
            .map(Value::Decimal)
            .ok_or_else(decimal_overflow),
    }
}

fn subtract(left: &Value, right: &Value, _limits: &EvalLimits) -> Result<Value, EvalError> {
    match promote(left, right, "-")? {
        Numbers::Ints(a, b) => Ok(a
            .checked_sub(b)
            .map_or_else(|| Value::from_bigint(BigInt::from(a) - b), Value::Integer)),
        Numbers::Bigs(a, b) => integer_result(a - b),
        Numbers::Floats(a, b) => Ok(Value::Float(a - b)),
        Numbers::Decimals(a, b) => a
            .checked_sub(b)
            .map(Value::Decimal)
            .ok_or_else(decimal_overflow),
    }
}

/// Repetition count of `sequence * n`; negative counts repeat nothing.
fn repeat_count(count: &Value) -> Result<usize, EvalError> {
    let n = count.as_bigint().unwrap_or_default();
    if n.is_negative() {
        return Ok(0);
    }
    n.to_usize().ok_or_else(|| {
        EvalError::Overflow("repeat count does not fit in a sequence index".to_string())
    })
}

fn repeat<T: Clone>(items: &[T], times: usize, limits: &EvalLimits) -> Result<Vec<T>, EvalError> {
    if items.is_empty() {
        return Ok(Vec::new());
    }
    check_len(items.len().saturating_mul(times), limits)?;
    Ok(std::iter::repeat_n(items, times).flatten().cloned().collect())
}

fn multiply(left: &Value, right: &Value, limits: &EvalLimits) -> Result<Value, EvalError> {
    match (left, right) {
        (Value::String(s), count) | (count, Value::String(s)) if count.is_integer() => {
            let chars: Vec<char> = s.chars().collect();
            let repeated = repeat(&chars, repeat_count(count)?, limits)?;
            Ok(Value::String(repeated.into_iter().collect()))
        }
        (Value::List(items), count) | (count, Value::List(items)) if count.is_integer() => {
            Ok(Value::List(repeat(items, repeat_count(count)?, limits)?))
        }
        _ => multiply_numbers(left, right),
    }
}

/// Numeric `*`.
pub(crate) fn multiply_numbers(left: &Value, right: &Value) -> Result<Value, EvalError> {
    match promote(left, right, "*")? {
        Numbers::Ints(a, b) => Ok(a
            .checked_mul(b)
            .map_or_else(|| Value::from_bigint(BigInt::from(a) * b), Value::Integer)),
        Numbers::Bigs(a, b) => {
            // The product has at least bits(a) + bits(b) - 1 bits
            if a.bits() + b.bits() > MAX_INTEGER_BITS + 1 {
                return Err(int_overflow());
            }
            integer_result(a * b)
        }
        Numbers::Floats(a, b) => Ok(Value::Float(a * b)),
        Numbers::Decimals(a, b) => a
            .checked_mul(b)
            .map(Value::Decimal)
            .ok_or_else(decimal_overflow),
    }
}

/// True division: integers divide to a float.
fn divide(left: &Value, right: &Value, _limits: &EvalLimits) -> Result<Value, EvalError> {
    match promote(left, right, "/")? {
        Numbers::Ints(_, 0) => Err(EvalError::ZeroDivision),
        Numbers::Ints(a, b) => Ok(Value::Float(a as f64 / b as f64)),
        Numbers::Bigs(_, b) if b.is_zero() => Err(EvalError::ZeroDivision),
        Numbers::Bigs(a, b) => wide_true_divide(&a, &b).map(Value::Float),
        Numbers::Floats(_, b) if b == 0.0 => Err(EvalError::ZeroDivision),
        Numbers::Floats(a, b) => Ok(Value::Float(a / b)),
        Numbers::Decimals(_, b) if b.is_zero() => Err(EvalError::ZeroDivision),
        Numbers::Decimals(a, b) => a
            .checked_div(b)
            .map(Value::Decimal)
            .ok_or_else(decimal_overflow),
    }
}

/// Quotient of integers that may not convert to floats on their own. Both
/// are first shifted down to at most 1000 significant bits.
fn wide_true_divide(a: &BigInt, b: &BigInt) -> Result<f64, EvalError> {
    let excess = a.bits().max(b.bits()).saturating_sub(1000);
    let x = bigint_to_float(&(a >> excess))?;
    let y = bigint_to_float(&(b >> excess))?;
    let quotient = x / y;
    if !quotient.is_finite() {
        return Err(EvalError::Overflow(
            "integer division result too large for a float".to_string(),
        ));
    }
    Ok(quotient)
}

fn power(left: &Value, right: &Value, _limits: &EvalLimits) -> Result<Value, EvalError> {
    match promote(left, right, "**")? {
        Numbers::Ints(a, b) if b >= 0 => {
            match u32::try_from(b).ok().and_then(|exponent| a.checked_pow(exponent)) {
                Some(n) => Ok(Value::Integer(n)),
                None => integer_power(BigInt::from(a), &BigInt::from(b)),
            }
        }
        Numbers::Bigs(a, b) if !b.is_negative() => integer_power(a, &b),
        // A negative integer exponent leaves the integers
        Numbers::Ints(a, b) => float_power(a as f64, b as f64),
        Numbers::Bigs(a, b) => float_power(bigint_to_float(&a)?, bigint_to_float(&b)?),
        Numbers::Floats(a, b) => float_power(a, b),
        Numbers::Decimals(a, b) => {
            if a.is_zero() && b.is_sign_negative() && !b.is_zero() {
                return Err(EvalError::ZeroDivision);
            }
            let result = if b.is_integer() {
                b.to_i64().and_then(|n| a.checked_powi(n))
            } else if a.is_sign_negative() {
                return Err(EvalError::ValueError(
                    "negative decimal cannot be raised to a fractional power".to_string(),
                ));
            } else {
                a.checked_powd(b)
            };
            result.map(Value::Decimal).ok_or_else(decimal_overflow)
        }
    }
}

/// `base ** exponent` for a non-negative exponent. Results that would be
/// wider than `MAX_INTEGER_BITS` are refused before any multiplication.
fn integer_power(base: BigInt, exponent: &BigInt) -> Result<Value, EvalError> {
    if exponent.is_zero() {
        return Ok(Value::Integer(1));
    }
    if base.is_zero() || base.is_one() {
        return Ok(Value::from_bigint(base));
    }
    if base == BigInt::from(-1) {
        return Ok(Value::Integer(if exponent.is_even() { 1 } else { -1 }));
    }
    // |base| >= 2 here, so every factor adds at least bits(base) - 1 bits
    let exponent = exponent
        .to_u64()
        .filter(|e| (base.bits() - 1).saturating_mul(*e) < MAX_INTEGER_BITS)
        .and_then(|e| u32::try_from(e).ok())
        .ok_or_else(int_overflow)?;
    integer_result(base.pow(exponent))
}

/// Float `**`. Unlike the other float operators it reports overflow.
fn float_power(a: f64, b: f64) -> Result<Value, EvalError> {
    if a == 0.0 && b < 0.0 {
        return Err(EvalError::ZeroDivision);
    }
    if a < 0.0 && b.is_finite() && b.fract() != 0.0 {
        return Err(EvalError::ValueError(
            "negative number cannot be raised to a fractional power".to_string(),
        ));
    }
    let result = a.powf(b);
    if result.is_infinite() && a.is_finite() && b.is_finite() {
        return Err(EvalError::Overflow("numerical result out of range".to_string()));
    }
    Ok(Value::Float(result))
}

// ========================================
// Bitwise
// ========================================

fn bitwise(
    left: &Value,
    right: &Value,
    symbol: &str,
    on_bools: fn(bool, bool) -> bool,
    on_ints: fn(i64, i64) -> i64,
    on_bigs: fn(&BigInt, &BigInt) -> BigInt,
) -> Result<Value, EvalError> {
    match (left, right) {
        (Value::Boolean(a), Value::Boolean(b)) => Ok(Value::Boolean(on_bools(*a, *b))),
        _ => match (left.as_int(), right.as_int()) {
            (Some(a), Some(b)) => Ok(Value::Integer(on_ints(a, b))),
            _ => match (left.as_bigint(), right.as_bigint()) {
                (Some(a), Some(b)) => Ok(Value::from_bigint(on_bigs(&a, &b))),
                _ => Err(unsupported_operands(symbol, left, right)),
            },
        },
    }
}

fn bit_and(left: &Value, right: &Value, _limits: &EvalLimits) -> Result<Value, EvalError> {
    bitwise(left, right, "&", |a, b| a & b, |a, b| a & b, |a, b| a & b)
}

fn bit_or(left: &Value, right: &Value, _limits: &EvalLimits) -> Result<Value, EvalError> {
    bitwise(left, right, "|", |a, b| a | b, |a, b| a | b, |a, b| a | b)
}

fn bit_xor(left: &Value, right: &Value, _limits: &EvalLimits) -> Result<Value, EvalError> {
    bitwise(left, right, "^", |a, b| a ^ b, |a, b| a ^ b, |a, b| a ^ b)
}

// ========================================
// Comparison
// ========================================

/// Equality as `==` sees it: numbers compare by value across types
/// (`1 == 1.0 == True`), lists compare element-wise, and values of
/// unrelated types are simply unequal.
pub fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Null, Value::Null) => true,
        (Value::String(a), Value::String(b)) => a == b,
        (Value::List(a), Value::List(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_equal(x, y))
        }
        (l, r) if l.is_numeric() && r.is_numeric() => {
            numeric_order(l, r) == Some(Ordering::Equal)
        }
        _ => false,
    }
}

/// Orders two numeric values; `None` when either side is NaN.
fn numeric_order(left: &Value, right: &Value) -> Option<Ordering> {
    match promote(left, right, "<") {
        Ok(Numbers::Ints(a, b)) => Some(a.cmp(&b)),
        Ok(Numbers::Bigs(a, b)) => Some(a.cmp(&b)),
        Ok(Numbers::Floats(a, b)) => a.partial_cmp(&b),
        Ok(Numbers::Decimals(a, b)) => Some(a.cmp(&b)),
        // Pairs with no common type: decimal against float, or an integer
        // too wide for the other side
        Err(_) => match (left, right) {
            (Value::Decimal(d), Value::Float(f)) => {
                Decimal::from_f64_retain(*f).map(|f| d.cmp(&f))
            }
            (Value::Float(f), Value::Decimal(d)) => {
                Decimal::from_f64_retain(*f).map(|f| f.cmp(d))
            }
            (Value::BigInt(n), Value::Float(f)) => wide_float_order(n, *f),
            (Value::Float(f), Value::BigInt(n)) => wide_float_order(n, *f).map(Ordering::reverse),
            (Value::BigInt(n), Value::Decimal(_)) => Some(sign_order(n)),
            (Value::Decimal(_), Value::BigInt(n)) => Some(sign_order(n).reverse()),
            _ => None,
        },
    }
}

/// Order of an integer beyond every value of the other type.
fn sign_order(n: &BigInt) -> Ordering {
    if n.is_negative() {
        Ordering::Less
    } else {
        Ordering::Greater
    }
}

/// Exact order of a wide integer against a float.
fn wide_float_order(n: &BigInt, f: f64) -> Option<Ordering> {
    if f.is_nan() {
        return None;
    }
    if f.is_infinite() {
        return Some(if f > 0.0 { Ordering::Less } else { Ordering::Greater });
    }
    let whole = BigInt::from_f64(f.trunc())?;
    let fraction = 0.0f64.partial_cmp(&f.fract()).unwrap_or(Ordering::Equal);
    Some(n.cmp(&whole).then(fraction))
}

fn partial_order(left: &Value, right: &Value, op: CmpOp) -> Result<Option<Ordering>, EvalError> {
    match (left, right) {
        (l, r) if l.is_numeric() && r.is_numeric() => Ok(numeric_order(l, r)),
        (Value::String(a), Value::String(b)) => Ok(Some(a.cmp(b))),
        (Value::List(a), Value::List(b)) => {
            // The first unequal pair decides; otherwise the shorter list is smaller
            match a.iter().zip(b).find(|(x, y)| !values_equal(x, y)) {
                Some((x, y)) => partial_order(x, y, op),
                None => Ok(Some(a.len().cmp(&b.len()))),
            }
        }
        _ => Err(EvalError::TypeError(format!(
            "'{}' not supported between {} and {}",
            op.symbol(),
            left.type_name(),
            right.type_name()
        ))),
    }
}

fn ordered(
    left: &Value,
    right: &Value,
    op: CmpOp,
    accept: fn(Ordering) -> bool,
) -> Result<Value, EvalError> {
    let ordering = partial_order(left, right, op)?;
    Ok(Value::Boolean(ordering.is_some_and(accept)))
}

fn equal(left: &Value, right: &Value) -> Result<Value, EvalError> {
    Ok(Value::Boolean(values_equal(left, right)))
}

fn not_equal(left: &Value, right: &Value) -> Result<Value, EvalError> {
    Ok(Value::Boolean(!values_equal(left, right)))
}

fn less(left: &Value, right: &Value) -> Result<Value, EvalError> {
    ordered(left, right, CmpOp::Lt, Ordering::is_lt)
}

fn less_equal(left: &Value, right: &Value) -> Result<Value, EvalError> {
    ordered(left, right, CmpOp::LtE, Ordering::is_le)
}

fn greater(left: &Value, right: &Value) -> Result<Value, EvalError> {
    ordered(left, right, CmpOp::Gt, Ordering::is_gt)
}

fn greater_equal(left: &Value, right: &Value) -> Result<Value, EvalError> {
    ordered(left, right, CmpOp::GtE, Ordering::is_ge)
}

fn is(left: &Value, right: &Value) -> Result<Value, EvalError> {
    Ok(Value::Boolean(identical(left, right)))
}

fn is_not(left: &Value, right: &Value) -> Result<Value, EvalError> {
    Ok(Value::Boolean(!identical(left, right)))
}

fn member(left: &Value, right: &Value) -> Result<Value, EvalError> {
    contains(right, left).map(Value::Boolean)
}

fn not_member(left: &Value, right: &Value) -> Result<Value, EvalError> {
    contains(right, left).map(|found| Value::Boolean(!found))
}

/// Identity as `is` sees it.
///
/// `None`, booleans, integers, floats and strings are immutable scalars
/// and are identical when they have the same type and value. Lists,
/// decimals and integers wider than 64 bits are built fresh by every
/// evaluation, so two of them are never the same object.
fn identical(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Null, Value::Null) => true,
        (Value::Boolean(a), Value::Boolean(b)) => a == b,
        (Value::Integer(a), Value::Integer(b)) => a == b,
        (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
        (Value::String(a), Value::String(b)) => a == b,
        _ => false,
    }
}

/// Membership test: list elements by equality, substrings of strings.
pub(crate) fn contains(container: &Value, item: &Value) -> Result<bool, EvalError> {
    match (container, item) {
        (Value::List(items), _) => Ok(items.iter().any(|x| values_equal(x, item))),
        (Value::String(haystack), Value::String(needle)) => Ok(haystack.contains(needle.as_str())),
        (Value::String(_), other) => Err(EvalError::TypeError(format!(
            "'in <string>' requires string as left operand, not {}",
            other.type_name()
        ))),
        (other, _) => Err(EvalError::TypeError(format!(
            "argument of type {} is not iterable",
            other.type_name()
        ))),
    }
}

/// Converts a float to the integer it truncates to.
pub(crate) fn float_to_int(value: f64) -> Result<Value, EvalError> {
    if value.is_nan() {
        return Err(EvalError::ValueError(
            "cannot convert float NaN to integer".to_string(),
        ));
    }
    if value.is_infinite() {
        return Err(EvalError::Overflow(
            "cannot convert float infinity to integer".to_string(),
        ));
    }
    BigInt::from_f64(value.trunc())
        .map(Value::from_bigint)
        .ok_or_else(int_overflow)
}

/// Converts a decimal to the integer it truncates to.
pub(crate) fn decimal_to_int(value: Decimal) -> Result<Value, EvalError> {
    value
        .trunc()
        .to_i128()
        .map(|n| Value::from_bigint(BigInt::from(n)))
        .ok_or_else(int_overflow)
}

/// Exact decimal for an integer-valued or any finite float.
pub(crate) fn decimal_from_float(value: f64) -> Result<Decimal, EvalError> {
    Decimal::from_f64_retain(value)
        .or_else(|| Decimal::from_f64(value))
        .ok_or_else(|| EvalError::ValueError(format!("cannot convert {} to decimal", value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn limits() -> EvalLimits {
        EvalLimits::default()
    }

    #[test]
    fn test_unsupported_operators_fail_closed() {
        assert_eq!(
            binary_handler(BinOp::FloorDiv).err(),
            Some(EvalError::UnsupportedConstruct("FloorDiv"))
        );
        assert_eq!(
            unary_handler(UnaryOp::USub).err(),
            Some(EvalError::UnsupportedConstruct("USub"))
        );
    }

    #[test]
    fn test_numeric_promotion() {
        assert_eq!(
            add(&Value::Integer(1), &Value::Float(0.5), &limits()),
            Ok(Value::Float(1.5))
        );
        assert_eq!(
            add(&Value::Boolean(true), &Value::Integer(1), &limits()),
            Ok(Value::Integer(2))
        );
        assert_eq!(
            divide(&Value::Integer(1), &Value::Integer(4), &limits()),
            Ok(Value::Float(0.25))
        );
        assert_eq!(
            power(&Value::Integer(2), &Value::Integer(-1), &limits()),
            Ok(Value::Float(0.5))
        );
        assert!(matches!(
            add(&Value::Decimal(Decimal::ONE), &Value::Float(1.0), &limits()),
            Err(EvalError::TypeError(_))
        ));
    }

    // ========================================
    // Wide Integers
    // ========================================

    #[test]
    fn test_integer_overflow_promotes() {
        let two_pow_64: BigInt = BigInt::from(u64::MAX) + 1;
        assert_eq!(
            multiply(&Value::Integer(i64::MAX), &Value::Integer(2), &limits()),
            Ok(Value::BigInt(BigInt::from(i64::MAX) * 2))
        );
        assert_eq!(
            power(&Value::Integer(2), &Value::Integer(64), &limits()),
            Ok(Value::BigInt(two_pow_64.clone()))
        );
        // Results that fit again come back as plain integers
        assert_eq!(
            subtract(&Value::BigInt(two_pow_64.clone()), &Value::BigInt(two_pow_64), &limits()),
            Ok(Value::Integer(0))
        );
        assert_eq!(
            add(&Value::Integer(i64::MAX), &Value::Integer(1), &limits()),
            Ok(Value::BigInt(BigInt::from(i64::MAX) + 1))
        );
    }

    #[test]
    fn test_integer_width_is_bounded() {
        let cases = vec![
            (Value::Integer(2), Value::Integer(70_000)),
            (Value::Integer(10), Value::BigInt(BigInt::from(u64::MAX) + 1)),
        ];
        for (base, exponent) in cases {
            assert_eq!(
                power(&base, &exponent, &limits()),
                Err(int_overflow()),
                "Failed for input: {} ** {}",
                base,
                exponent
            );
        }
        // Trivial bases never grow
        let huge = Value::BigInt(BigInt::from(u64::MAX) * 1000);
        assert_eq!(power(&Value::Integer(1), &huge, &limits()), Ok(Value::Integer(1)));
        assert_eq!(power(&Value::Integer(-1), &huge, &limits()), Ok(Value::Integer(1)));
        assert_eq!(power(&Value::Integer(0), &huge, &limits()), Ok(Value::Integer(0)));
    }

    #[test]
    fn test_wide_integer_division_and_floats() {
        let wide = Value::BigInt(BigInt::from(1) << 2000u32);
        assert_eq!(divide(&wide, &wide, &limits()), Ok(Value::Float(1.0)));
        assert!(matches!(
            divide(&wide, &Value::Integer(3), &limits()),
            Err(EvalError::Overflow(_))
        ));
        assert!(matches!(
            add(&wide, &Value::Float(1.0), &limits()),
            Err(EvalError::Overflow(_))
        ));
        assert_eq!(
            divide(&Value::BigInt(BigInt::from(u64::MAX) + 1), &Value::Integer(0), &limits()),
            Err(EvalError::ZeroDivision)
        );
    }

    #[test]
    fn test_wide_integer_ordering() {
        let wide = Value::BigInt(BigInt::from(1) << 2000u32);
        let negative = Value::BigInt(-(BigInt::from(1) << 2000u32));
        assert_eq!(numeric_order(&wide, &Value::Float(1e308)), Some(Ordering::Greater));
        assert_eq!(numeric_order(&wide, &Value::Float(f64::INFINITY)), Some(Ordering::Less));
        assert_eq!(numeric_order(&negative, &Value::Decimal(Decimal::MIN)), Some(Ordering::Less));
        assert_eq!(numeric_order(&Value::Float(f64::NAN), &wide), None);
        assert_eq!(wide_float_order(&BigInt::from(3), 3.5), Some(Ordering::Less));
        assert_eq!(wide_float_order(&BigInt::from(-3), -3.5), Some(Ordering::Greater));
        assert_eq!(wide_float_order(&BigInt::from(-3), -3.0), Some(Ordering::Equal));
        assert!(!identical(&wide, &wide));
    }

    #[test]
    fn test_wide_bitwise() {
        let two_pow_64: BigInt = BigInt::from(u64::MAX) + 1;
        assert_eq!(
            bit_or(&Value::BigInt(two_pow_64.clone()), &Value::Integer(1), &limits()),
            Ok(Value::BigInt(&two_pow_64 + 1))
        );
        assert_eq!(
            bit_and(&Value::BigInt(two_pow_64), &Value::Integer(-1), &limits()),
            Ok(Value::BigInt(BigInt::from(u64::MAX) + 1))
        );
    }

    // ========================================
    // Floats
    // ========================================

    #[test]
    fn test_float_overflow_is_infinite() {
        let cases = vec![
            (add as BinaryHandler, 1e308, 1e308, f64::INFINITY),
            (subtract as BinaryHandler, -1e308, 1e308, f64::NEG_INFINITY),
            (multiply as BinaryHandler, 1e308, 10.0, f64::INFINITY),
            (divide as BinaryHandler, 1e308, 0.1, f64::INFINITY),
        ];
        for (handler, a, b, expected) in cases {
            assert_eq!(
                handler(&Value::Float(a), &Value::Float(b), &limits()),
                Ok(Value::Float(expected)),
                "Failed for input: {} and {}",
                a,
                b
            );
        }
        // Only the power operator reports it
        assert!(matches!(
            power(&Value::Float(10.0), &Value::Integer(400), &limits()),
            Err(EvalError::Overflow(_))
        ));
        assert_eq!(
            power(&Value::Float(f64::INFINITY), &Value::Integer(2), &limits()),
            Ok(Value::Float(f64::INFINITY))
        );
    }

    #[test]
    fn test_bitwise_keeps_booleans() {
        assert_eq!(
            bit_and(&Value::Boolean(true), &Value::Boolean(false), &limits()),
            Ok(Value::Boolean(false))
        );
        assert_eq!(
            bit_or(&Value::Boolean(true), &Value::Integer(2), &limits()),
            Ok(Value::Integer(3))
        );
        assert!(matches!(
            bit_xor(&Value::Float(1.0), &Value::Integer(2), &limits()),
            Err(EvalError::TypeError(_))
        ));
    }

    #[test]
    fn test_cross_type_equality() {
        assert!(values_equal(&Value::Integer(1), &Value::Float(1.0)));
        assert!(values_equal(&Value::Boolean(true), &Value::Integer(1)));
        assert!(values_equal(&Value::Decimal(Decimal::new(15, 1)), &Value::Float(1.5)));
        assert!(!values_equal(&Value::from("1"), &Value::Integer(1)));
        assert!(!values_equal(&Value::Float(f64::NAN), &Value::Float(f64::NAN)));
    }

    #[test]
    fn test_list_ordering_is_lexicographic() {
        let small = Value::from(vec![1i64, 2]);
        let large = Value::from(vec![1i64, 3]);
        let prefix = Value::from(vec![1i64]);
        assert_eq!(ordered(&small, &large, CmpOp::Lt, Ordering::is_lt), Ok(Value::Boolean(true)));
        assert_eq!(ordered(&prefix, &small, CmpOp::Lt, Ordering::is_lt), Ok(Value::Boolean(true)));
    }

    #[test]
    fn test_repetition_respects_limit() {
        let tight = EvalLimits {
            max_sequence_len: 4,
            ..EvalLimits::default()
        };
        assert_eq!(
            multiply(&Value::from("ab"), &Value::Integer(2), &tight),
            Ok(Value::from("abab"))
        );
        assert_eq!(
            multiply(&Value::Integer(-3), &Value::from("ab"), &tight),
            Ok(Value::from(""))
        );
        assert!(matches!(
            multiply(&Value::from("ab"), &Value::Integer(3), &tight),
            Err(EvalError::Overflow(_))
        ));
    }

    #[test]
    fn test_repeating_non_copy_items() {
        let nested = Value::List(vec![Value::from(vec![1i64]), Value::from("a")]);
        assert_eq!(
            multiply(&nested, &Value::Integer(2), &limits()),
            Ok(Value::List(vec![
                Value::from(vec![1i64]),
                Value::from("a"),
                Value::from(vec![1i64]),
                Value::from("a"),
            ]))
        );
        // Empty sequences stay empty for any index-sized count
        assert_eq!(
            multiply(&Value::List(vec![]), &Value::Integer(i64::MAX), &limits()),
            Ok(Value::List(vec![]))
        );
        let huge = Value::BigInt(BigInt::from(u64::MAX) * 4);
        assert!(matches!(
            multiply(&Value::from("a"), &huge, &limits()),
            Err(EvalError::Overflow(_))
        ));
    }

    #[test]
    fn test_float_to_int_bounds() {
        assert_eq!(float_to_int(-2.7), Ok(Value::Integer(-2)));
        assert_eq!(
            float_to_int(9.3e18),
            Ok(Value::BigInt(BigInt::from(9_300_000_000_000_000_000u64)))
        );
        assert!(matches!(float_to_int(f64::NAN), Err(EvalError::ValueError(_))));
        assert!(matches!(float_to_int(f64::INFINITY), Err(EvalError::Overflow(_))));
    }

    #[test]
    fn test_decimal_to_int() {
        assert_eq!(decimal_to_int(Decimal::new(-27, 1)), Ok(Value::Integer(-2)));
        assert!(matches!(decimal_to_int(Decimal::MAX), Ok(Value::BigInt(_))));
    }
}
