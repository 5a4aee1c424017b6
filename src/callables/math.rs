//! The numeric library: float functions backed by `f64` (special functions
//! through `libm`), integer functions on arbitrary-precision integers.
//!
//! Errors follow one rule. A NaN produced from non-NaN input is a domain
//! error (`ValueError`), an infinity produced from finite input is a range
//! error (`Overflow`). Poles such as `log(0)` are domain errors and are
//! checked before computing.

use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{One, Signed, ToPrimitive, Zero};
use rust_decimal::Decimal;

use super::{Arity, Callable, iterate};
use crate::{
    evaluator::EvalError,
    operations::{
        bigint_to_float, decimal_to_int, float_to_int, int_overflow, integer_result,
        multiply_numbers,
    },
    value::{MAX_INTEGER_BITS, Value},
};

pub(super) static CALLABLES: &[Callable] = &[
    // Trigonometric and hyperbolic
    Callable::new("acos", Arity::Exact(1), |args| unary(args, "acos", f64::acos)),
    Callable::new("asin", Arity::Exact(1), |args| unary(args, "asin", f64::asin)),
    Callable::new("atan", Arity::Exact(1), |args| unary(args, "atan", f64::atan)),
    Callable::new("atan2", Arity::Exact(2), |args| binary(args, "atan2", f64::atan2)),
    Callable::new("cos", Arity::Exact(1), |args| unary(args, "cos", f64::cos)),
    Callable::new("sin", Arity::Exact(1), |args| unary(args, "sin", f64::sin)),
    Callable::new("tan", Arity::Exact(1), |args| unary(args, "tan", f64::tan)),
    Callable::new("acosh", Arity::Exact(1), |args| unary(args, "acosh", f64::acosh)),
    Callable::new("asinh", Arity::Exact(1), |args| unary(args, "asinh", f64::asinh)),
    Callable::new("atanh", Arity::Exact(1), atanh),
    Callable::new("cosh", Arity::Exact(1), |args| unary(args, "cosh", f64::cosh)),
    Callable::new("sinh", Arity::Exact(1), |args| unary(args, "sinh", f64::sinh)),
    Callable::new("tanh", Arity::Exact(1), |args| unary(args, "tanh", f64::tanh)),
    Callable::new("degrees", Arity::Exact(1), |args| unary(args, "degrees", f64::to_degrees)),
    Callable::new("radians", Arity::Exact(1), |args| unary(args, "radians", f64::to_radians)),
    // Powers and logarithms
    Callable::new("exp", Arity::Exact(1), |args| unary(args, "exp", f64::exp)),
    Callable::new("exp2", Arity::Exact(1), |args| unary(args, "exp2", f64::exp2)),
    Callable::new("expm1", Arity::Exact(1), |args| unary(args, "expm1", f64::exp_m1)),
    Callable::new("sqrt", Arity::Exact(1), |args| unary(args, "sqrt", f64::sqrt)),
    Callable::new("cbrt", Arity::Exact(1), |args| unary(args, "cbrt", f64::cbrt)),
    Callable::new("pow", Arity::Exact(2), pow),
    Callable::new("log", Arity::Range(1, 2), log),
    Callable::new("log2", Arity::Exact(1), |args| logarithm(args, "log2", f64::log2)),
    Callable::new("log10", Arity::Exact(1), |args| logarithm(args, "log10", f64::log10)),
    Callable::new("log1p", Arity::Exact(1), log1p),
    // Special functions
    Callable::new("erf", Arity::Exact(1), |args| unary(args, "erf", libm::erf)),
    Callable::new("erfc", Arity::Exact(1), |args| unary(args, "erfc", libm::erfc)),
    Callable::new("gamma", Arity::Exact(1), gamma),
    Callable::new("lgamma", Arity::Exact(1), lgamma),
    // Float manipulation
    Callable::new("fabs", Arity::Exact(1), |args| unary(args, "fabs", f64::abs)),
    Callable::new("copysign", Arity::Exact(2), |args| binary(args, "copysign", f64::copysign)),
    Callable::new("fmod", Arity::Exact(2), |args| binary(args, "fmod", |x, y| x % y)),
    Callable::new("remainder", Arity::Exact(2), remainder),
    Callable::new("frexp", Arity::Exact(1), frexp),
    Callable::new("ldexp", Arity::Exact(2), ldexp),
    Callable::new("modf", Arity::Exact(1), modf),
    Callable::new("nextafter", Arity::Exact(2), nextafter),
    Callable::new("ulp", Arity::Exact(1), ulp),
    // Rounding to integers
    Callable::new("ceil", Arity::Exact(1), |args| {
        to_integer(args, "ceil", f64::ceil, Decimal::ceil)
    }),
    Callable::new("floor", Arity::Exact(1), |args| {
        to_integer(args, "floor", f64::floor, Decimal::floor)
    }),
    Callable::new("trunc", Arity::Exact(1), |args| {
        to_integer(args, "trunc", f64::trunc, Decimal::trunc)
    }),
    // Classification and comparison
    Callable::new("isfinite", Arity::Exact(1), |args| classify(args, "isfinite", f64::is_finite)),
    Callable::new("isinf", Arity::Exact(1), |args| classify(args, "isinf", f64::is_infinite)),
    Callable::new("isnan", Arity::Exact(1), |args| classify(args, "isnan", f64::is_nan)),
    Callable::new("isclose", Arity::Exact(2), isclose),
    // Distances
    Callable::new("hypot", Arity::Any, hypot),
    Callable::new("dist", Arity::Exact(2), dist),
    // Number theory
    Callable::new("factorial", Arity::Exact(1), factorial),
    Callable::new("comb", Arity::Exact(2), comb),
    Callable::new("perm", Arity::Range(1, 2), perm),
    Callable::new("gcd", Arity::Any, gcd),
    Callable::new("lcm", Arity::Any, lcm),
    Callable::new("isqrt", Arity::Exact(1), isqrt),
    // Aggregates
    Callable::new("fsum", Arity::Exact(1), fsum),
    Callable::new("prod", Arity::Exact(1), prod),
];

fn domain_error() -> EvalError {
    EvalError::ValueError("math domain error".to_string())
}

fn range_error() -> EvalError {
    EvalError::Overflow("math range error".to_string())
}

/// Float view of a numeric argument.
fn real(name: &str, value: &Value) -> Result<f64, EvalError> {
    match value {
        Value::BigInt(n) => bigint_to_float(n),
        Value::Integer(_) | Value::Boolean(_) | Value::Float(_) | Value::Decimal(_) => {
            value.as_float().ok_or_else(range_error)
        }
        other => Err(EvalError::TypeError(format!(
            "{}() must be a real number, not {}",
            name,
            other.type_name()
        ))),
    }
}

/// Integer view of an argument; floats are rejected, not truncated.
fn integral(name: &str, value: &Value) -> Result<BigInt, EvalError> {
    value.as_bigint().ok_or_else(|| {
        EvalError::TypeError(format!(
            "{}() expects an integer, not {}",
            name,
            value.type_name()
        ))
    })
}

fn checked(result: f64, inputs: &[f64]) -> Result<f64, EvalError> {
    if result.is_nan() && !inputs.iter().any(|x| x.is_nan()) {
        return Err(domain_error());
    }
    if result.is_infinite() && inputs.iter().all(|x| x.is_finite()) {
        return Err(range_error());
    }
    Ok(result)
}

fn unary(args: &[Value], name: &str, f: fn(f64) -> f64) -> Result<Value, EvalError> {
    let x = real(name, &args[0])?;
    checked(f(x), &[x]).map(Value::Float)
}

fn binary(args: &[Value], name: &str, f: fn(f64, f64) -> f64) -> Result<Value, EvalError> {
    let x = real(name, &args[0])?;
    let y = real(name, &args[1])?;
    checked(f(x, y), &[x, y]).map(Value::Float)
}

fn classify(args: &[Value], name: &str, f: fn(f64) -> bool) -> Result<Value, EvalError> {
    real(name, &args[0]).map(|x| Value::Boolean(f(x)))
}

fn to_integer(
    args: &[Value],
    name: &str,
    on_float: fn(f64) -> f64,
    on_decimal: fn(&Decimal) -> Decimal,
) -> Result<Value, EvalError> {
    match &args[0] {
        Value::Decimal(d) => decimal_to_int(on_decimal(d)),
        Value::Float(x) => float_to_int(on_float(*x)),
        other => integral(name, other).map(Value::from_bigint),
    }
}

fn atanh(args: &[Value]) -> Result<Value, EvalError> {
    let x = real("atanh", &args[0])?;
    if x.abs() >= 1.0 {
        return Err(domain_error());
    }
    Ok(Value::Float(x.atanh()))
}

/// `math.pow`: always a float, unlike the `**` operator.
fn pow(args: &[Value]) -> Result<Value, EvalError> {
    let x = real("pow", &args[0])?;
    let y = real("pow", &args[1])?;
    if x == 0.0 && y < 0.0 && y.is_finite() {
        return Err(domain_error());
    }
    checked(x.powf(y), &[x, y]).map(Value::Float)
}

/// `f(value)` for a logarithm `f`. Integers too wide for a float are
/// scaled by a power of two first, so `log(10 ** 400)` is still finite.
fn log_of(name: &str, value: &Value, f: fn(f64) -> f64) -> Result<f64, EvalError> {
    if let Value::BigInt(n) = value {
        if !n.is_positive() {
            return Err(domain_error());
        }
        let shift = n.bits().saturating_sub(1000);
        let x = bigint_to_float(&(n >> shift))?;
        return Ok(f(x) + shift as f64 * f(2.0));
    }
    let x = real(name, value)?;
    if x <= 0.0 {
        return Err(domain_error());
    }
    checked(f(x), &[x])
}

fn logarithm(args: &[Value], name: &str, f: fn(f64) -> f64) -> Result<Value, EvalError> {
    log_of(name, &args[0], f).map(Value::Float)
}

fn log(args: &[Value]) -> Result<Value, EvalError> {
    let numerator = log_of("log", &args[0], f64::ln)?;
    let Some(base) = args.get(1) else {
        return Ok(Value::Float(numerator));
    };
    let denominator = log_of("log", base, f64::ln)?;
    if denominator == 0.0 {
        return Err(EvalError::ZeroDivision);
    }
    Ok(Value::Float(numerator / denominator))
}

fn log1p(args: &[Value]) -> Result<Value, EvalError> {
    let x = real("log1p", &args[0])?;
    if x <= -1.0 {
        return Err(domain_error());
    }
    checked(x.ln_1p(), &[x]).map(Value::Float)
}

/// Zero and the negative integers, where gamma has poles.
fn at_pole(x: f64) -> bool {
    x <= 0.0 && x == x.floor()
}

fn gamma(args: &[Value]) -> Result<Value, EvalError> {
    let x = real("gamma", &args[0])?;
    // Also rejects -inf
    if at_pole(x) {
        return Err(domain_error());
    }
    checked(libm::tgamma(x), &[x]).map(Value::Float)
}

/// Natural logarithm of `|gamma(x)|`.
fn lgamma(args: &[Value]) -> Result<Value, EvalError> {
    let x = real("lgamma", &args[0])?;
    if x.is_finite() && at_pole(x) {
        return Err(domain_error());
    }
    checked(libm::lgamma(x), &[x]).map(Value::Float)
}

/// IEEE 754 remainder: `x - n*y` with `n` the integer nearest `x/y`, ties
/// to even.
fn remainder(args: &[Value]) -> Result<Value, EvalError> {
    let x = real("remainder", &args[0])?;
    let y = real("remainder", &args[1])?;
    if x.is_nan() || y.is_nan() {
        return Ok(Value::Float(f64::NAN));
    }
    if x.is_infinite() || y == 0.0 {
        return Err(domain_error());
    }
    if y.is_infinite() {
        return Ok(Value::Float(x));
    }

    let (absx, absy) = (x.abs(), y.abs());
    let m = absx % absy;
    let c = absy - m;
    let r = if m < c {
        m
    } else if m > c {
        -c
    } else {
        // Exact half: pick the even multiple
        m - 2.0 * ((0.5 * (absx - m)) % absy)
    };
    Ok(Value::Float(1.0f64.copysign(x) * r))
}

/// Splits `x` into `[m, e]` with `x == m * 2**e` and `0.5 <= |m| < 1`.
fn frexp(args: &[Value]) -> Result<Value, EvalError> {
    let (mantissa, exponent) = split_exponent(real("frexp", &args[0])?);
    Ok(Value::List(vec![
        Value::Float(mantissa),
        Value::Integer(i64::from(exponent)),
    ]))
}

fn split_exponent(x: f64) -> (f64, i32) {
    if x == 0.0 || !x.is_finite() {
        return (x, 0);
    }
    let bits = x.to_bits();
    let biased = ((bits >> 52) & 0x7ff) as i32;
    if biased == 0 {
        // Subnormal: scale into the normal range first
        let (mantissa, exponent) = split_exponent(x * 2f64.powi(54));
        return (mantissa, exponent - 54);
    }
    let mantissa = f64::from_bits((bits & !(0x7ff << 52)) | (1022 << 52));
    (mantissa, biased - 1022)
}

fn ldexp(args: &[Value]) -> Result<Value, EvalError> {
    let x = real("ldexp", &args[0])?;
    let exponent = integral("ldexp", &args[1])?;
    if x == 0.0 || !x.is_finite() {
        return Ok(Value::Float(x));
    }

    // Scale in steps that stay representable
    let exponent = exponent
        .to_i64()
        .unwrap_or(if exponent.is_negative() { i64::MIN } else { i64::MAX });
    let mut remaining = exponent.clamp(-2200, 2200) as i32;
    let mut result = x;
    while remaining != 0 {
        let step = remaining.clamp(-1000, 1000);
        result *= 2f64.powi(step);
        remaining -= step;
    }
    checked(result, &[x]).map(Value::Float)
}

/// Fractional and integer parts of `x`, both carrying the sign of `x`.
fn modf(args: &[Value]) -> Result<Value, EvalError> {
    let x = real("modf", &args[0])?;
    let (fraction, whole) = if x.is_infinite() {
        (0.0f64.copysign(x), x)
    } else {
        (x.fract(), x.trunc())
    };
    Ok(Value::List(vec![Value::Float(fraction), Value::Float(whole)]))
}

fn nextafter(args: &[Value]) -> Result<Value, EvalError> {
    let x = real("nextafter", &args[0])?;
    let y = real("nextafter", &args[1])?;
    let next = if x.is_nan() || y.is_nan() {
        f64::NAN
    } else if x == y {
        y
    } else if y > x {
        x.next_up()
    } else {
        x.next_down()
    };
    Ok(Value::Float(next))
}

/// Value of the least significant bit of `x`.
fn ulp(args: &[Value]) -> Result<Value, EvalError> {
    let x = real("ulp", &args[0])?.abs();
    let unit = if !x.is_finite() {
        x
    } else if x == f64::MAX {
        x - x.next_down()
    } else {
        x.next_up() - x
    };
    Ok(Value::Float(unit))
}

fn isclose(args: &[Value]) -> Result<Value, EvalError> {
    const REL_TOL: f64 = 1e-9;

    let a = real("isclose", &args[0])?;
    let b = real("isclose", &args[1])?;
    if a == b {
        return Ok(Value::Boolean(true));
    }
    if a.is_infinite() || b.is_infinite() {
        return Ok(Value::Boolean(false));
    }
    let diff = (b - a).abs();
    Ok(Value::Boolean(
        diff <= (REL_TOL * b).abs() || diff <= (REL_TOL * a).abs(),
    ))
}

/// Euclidean norm, scaled by the largest magnitude to avoid overflow.
fn norm(values: &[f64]) -> f64 {
    if values.iter().any(|x| x.is_infinite()) {
        return f64::INFINITY;
    }
    if values.iter().any(|x| x.is_nan()) {
        return f64::NAN;
    }
    let max = values.iter().fold(0.0f64, |m, x| m.max(x.abs()));
    if max == 0.0 {
        return 0.0;
    }
    values.iter().map(|x| (x / max).powi(2)).sum::<f64>().sqrt() * max
}

fn hypot(args: &[Value]) -> Result<Value, EvalError> {
    let coordinates = args
        .iter()
        .map(|arg| real("hypot", arg))
        .collect::<Result<Vec<_>, _>>()?;
    checked(norm(&coordinates), &coordinates).map(Value::Float)
}

fn dist(args: &[Value]) -> Result<Value, EvalError> {
    let point = |value: &Value| -> Result<Vec<f64>, EvalError> {
        match value {
            Value::List(items) => items.iter().map(|item| real("dist", item)).collect(),
            other => Err(EvalError::TypeError(format!(
                "dist() expects lists of coordinates, not {}",
                other.type_name()
            ))),
        }
    };
    let p = point(&args[0])?;
    let q = point(&args[1])?;
    if p.len() != q.len() {
        return Err(EvalError::ValueError(
            "both points must have the same number of dimensions".to_string(),
        ));
    }
    let deltas: Vec<f64> = p.iter().zip(&q).map(|(a, b)| a - b).collect();
    checked(norm(&deltas), &deltas).map(Value::Float)
}

fn non_negative(name: &str, what: &str, value: &Value) -> Result<BigInt, EvalError> {
    let n = integral(name, value)?;
    if n.is_negative() {
        return Err(EvalError::ValueError(format!(
            "{} must be a non-negative integer",
            what
        )));
    }
    Ok(n)
}

/// Narrows a count whose result has at least `count` bits.
fn bounded_count(count: &BigInt) -> Result<u64, EvalError> {
    count
        .to_u64()
        .filter(|n| *n <= MAX_INTEGER_BITS)
        .ok_or_else(int_overflow)
}

/// Multiplies the factors in order, giving up as soon as the running
/// product is too wide.
fn bounded_product(factors: impl Iterator<Item = BigInt>) -> Result<Value, EvalError> {
    let mut result = BigInt::one();
    for factor in factors {
        result *= factor;
        if result.bits() > MAX_INTEGER_BITS {
            return Err(int_overflow());
        }
    }
    Ok(Value::from_bigint(result))
}

fn factorial(args: &[Value]) -> Result<Value, EvalError> {
    let n = integral("factorial", &args[0])?;
    if n.is_negative() {
        return Err(EvalError::ValueError(
            "factorial() not defined for negative values".to_string(),
        ));
    }
    let n = bounded_count(&n)?;
    bounded_product((2..=n).map(BigInt::from))
}

/// Ways to choose `k` items from `n` without order.
fn comb(args: &[Value]) -> Result<Value, EvalError> {
    let n = non_negative("comb", "n", &args[0])?;
    let k = non_negative("comb", "k", &args[1])?;
    if k > n {
        return Ok(Value::Integer(0));
    }
    let k = bounded_count(&k.clone().min(&n - &k))?;
    let mut result = BigInt::one();
    for i in 0..k {
        // Exact at every step: result is C(n, i + 1) afterwards
        result = result * (&n - i) / (i + 1);
        if result.bits() > MAX_INTEGER_BITS {
            return Err(int_overflow());
        }
    }
    Ok(Value::from_bigint(result))
}

/// Ways to choose `k` items from `n` with order; `k` defaults to `n`.
fn perm(args: &[Value]) -> Result<Value, EvalError> {
    let n = non_negative("perm", "n", &args[0])?;
    let k = match args.get(1) {
        None | Some(Value::Null) => n.clone(),
        Some(value) => non_negative("perm", "k", value)?,
    };
    if k > n {
        return Ok(Value::Integer(0));
    }
    let k = bounded_count(&k)?;
    bounded_product((0..k).map(|i| &n - i))
}

fn integers(name: &str, args: &[Value]) -> Result<Vec<BigInt>, EvalError> {
    args.iter().map(|arg| integral(name, arg)).collect()
}

fn gcd(args: &[Value]) -> Result<Value, EvalError> {
    let result = integers("gcd", args)?
        .iter()
        .fold(BigInt::zero(), |acc, n| acc.gcd(n));
    Ok(Value::from_bigint(result))
}

fn lcm(args: &[Value]) -> Result<Value, EvalError> {
    let mut result = BigInt::one();
    for n in integers("lcm", args)? {
        if n.is_zero() || result.is_zero() {
            result = BigInt::zero();
            continue;
        }
        result = result.lcm(&n);
        if result.bits() > MAX_INTEGER_BITS {
            return Err(int_overflow());
        }
    }
    integer_result(result)
}

/// Floor of the exact square root.
fn isqrt(args: &[Value]) -> Result<Value, EvalError> {
    let n = integral("isqrt", &args[0])?;
    if n.is_negative() {
        return Err(EvalError::ValueError(
            "isqrt() argument must be nonnegative".to_string(),
        ));
    }
    Ok(Value::from_bigint(n.sqrt()))
}

/// Sum of floats without intermediate rounding loss (Shewchuk's algorithm).
fn fsum(args: &[Value]) -> Result<Value, EvalError> {
    let values = iterate("fsum", &args[0])?
        .iter()
        .map(|item| real("fsum", item))
        .collect::<Result<Vec<_>, _>>()?;

    if values.iter().any(|x| !x.is_finite()) {
        if values.iter().any(|x| x.is_nan()) {
            return Ok(Value::Float(f64::NAN));
        }
        let positive = values.contains(&f64::INFINITY);
        let negative = values.contains(&f64::NEG_INFINITY);
        if positive && negative {
            return Err(EvalError::ValueError("-inf + inf in fsum".to_string()));
        }
        return Ok(Value::Float(if positive { f64::INFINITY } else { f64::NEG_INFINITY }));
    }

    let mut partials: Vec<f64> = Vec::new();
    for &value in &values {
        let mut x = value;
        let mut kept = 0;
        for j in 0..partials.len() {
            let mut y = partials[j];
            if x.abs() < y.abs() {
                std::mem::swap(&mut x, &mut y);
            }
            let hi = x + y;
            let lo = y - (hi - x);
            if lo != 0.0 {
                partials[kept] = lo;
                kept += 1;
            }
            x = hi;
        }
        if x.is_infinite() {
            return Err(EvalError::Overflow("intermediate overflow in fsum".to_string()));
        }
        partials.truncate(kept);
        partials.push(x);
    }

    let Some(mut hi) = partials.pop() else {
        return Ok(Value::Float(0.0));
    };
    let mut lo = 0.0;
    while let Some(y) = partials.pop() {
        let x = hi;
        hi = x + y;
        lo = y - (hi - x);
        if lo != 0.0 {
            break;
        }
    }
    // Round half-way cases using the sign of the next partial
    if let Some(&next) = partials.last()
        && ((lo < 0.0 && next < 0.0) || (lo > 0.0 && next > 0.0))
    {
        let y = lo * 2.0;
        let x = hi + y;
        if y == x - hi {
            hi = x;
        }
    }
    Ok(Value::Float(hi))
}

/// Product of numbers, starting from integer one.
fn prod(args: &[Value]) -> Result<Value, EvalError> {
    iterate("prod", &args[0])?
        .iter()
        .try_fold(Value::Integer(1), |acc, item| {
            if !item.is_numeric() {
                return Err(EvalError::TypeError(format!(
                    "prod() expects numbers, not {}",
                    item.type_name()
                )));
            }
            multiply_numbers(&acc, item)
        })
}
