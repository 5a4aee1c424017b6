// tests/callables_tests.rs

use num_bigint::BigInt;
use pretty_assertions::assert_eq;
use safe_expr::callables::{self, Arity};
use safe_expr::{Error, EvalError, Value, safe_eval};

fn eval_ok(expr_str: &str) -> Value {
    safe_eval(expr_str).unwrap_or_else(|e| panic!("{:?} failed: {}", expr_str, e))
}

fn eval_err(expr_str: &str) -> EvalError {
    match safe_eval(expr_str) {
        Err(Error::Eval(e)) => e,
        other => panic!("expected an evaluation error for {:?}, got {:?}", expr_str, other),
    }
}

fn float(expr_str: &str) -> f64 {
    match eval_ok(expr_str) {
        Value::Float(x) => x,
        other => panic!("expected a float from {:?}, got {:?}", expr_str, other),
    }
}

fn ints(values: &[i64]) -> Value {
    Value::List(values.iter().copied().map(Value::Integer).collect())
}

// ============================================================================
// Registry
// ============================================================================

#[test]
fn test_fixed_extra_set_is_registered() {
    for name in ["sum", "any", "all", "round", "int", "str", "float", "Decimal"] {
        assert!(callables::is_allowed(name), "missing {}", name);
    }
}

#[test]
fn test_builtins_shadow_math() {
    // A forgiving sum, not a float-only one
    assert_eq!(eval_ok("sum([None, 2])"), Value::Integer(2));
    assert_eq!(callables::lookup("sum").unwrap().arity(), Arity::Exact(1));
}

#[test]
fn test_constants_are_not_callable() {
    assert_eq!(eval_err("pi"), EvalError::UnsupportedConstruct("Name"));
    assert_eq!(eval_err("pi()"), EvalError::UnknownCallable("pi".to_string()));
    assert!(!callables::is_allowed("e"));
}

#[test]
fn test_names_listing() {
    let names = callables::names();
    assert!(names.contains(&"sqrt"));
    assert!(names.contains(&"Decimal"));
    assert!(!names.iter().any(|name| name.contains("__")));
}

#[test]
fn test_arity_errors() {
    assert_eq!(
        eval_err("sqrt(1, 2)"),
        EvalError::TypeError("sqrt() takes exactly one argument (2 given)".to_string())
    );
    assert_eq!(
        eval_err("atan2(1)"),
        EvalError::TypeError("atan2() takes exactly 2 arguments (1 given)".to_string())
    );
    assert_eq!(
        eval_err("round()"),
        EvalError::TypeError("round() takes from 1 to 2 arguments (0 given)".to_string())
    );
}

// ============================================================================
// Float Functions
// ============================================================================

#[test]
fn test_roots_and_powers() {
    assert_eq!(eval_ok("sqrt(16)"), Value::Float(4.0));
    assert!((float("cbrt(27)") - 3.0).abs() < 1e-12);
    assert_eq!(eval_ok("pow(2, 10)"), Value::Float(1024.0));
    assert_eq!(eval_ok("exp(0)"), Value::Float(1.0));
    assert_eq!(eval_ok("exp2(3)"), Value::Float(8.0));
}

#[test]
fn test_logarithms() {
    assert_eq!(eval_ok("log(1)"), Value::Float(0.0));
    assert_eq!(eval_ok("log2(8)"), Value::Float(3.0));
    assert_eq!(eval_ok("log10(1000)"), Value::Float(3.0));
    assert!((float("log(100, 10)") - 2.0).abs() < 1e-12);
    assert_eq!(eval_ok("log1p(0)"), Value::Float(0.0));
}

#[test]
fn test_trigonometry() {
    assert_eq!(eval_ok("sin(0)"), Value::Float(0.0));
    assert_eq!(eval_ok("cos(0)"), Value::Float(1.0));
    assert_eq!(eval_ok("degrees(0)"), Value::Float(0.0));
    assert!(float("degrees(atan(1)) - 45").abs() < 1e-12);
    assert!(float("tanh(0.5) - sinh(0.5) / cosh(0.5)").abs() < 1e-12);
}

#[test]
fn test_domain_errors() {
    for input in [
        "sqrt(0 - 1)",
        "log(0)",
        "log(0 - 1)",
        "log10(0)",
        "log1p(0 - 1)",
        "acos(2)",
        "atanh(1)",
        "pow(0, 0 - 1)",
        "fmod(1, 0)",
        "remainder(1, 0)",
    ] {
        assert_eq!(
            eval_err(input),
            EvalError::ValueError("math domain error".to_string()),
            "Failed for input: {}",
            input
        );
    }
    assert_eq!(eval_err("log(2, 1)"), EvalError::ZeroDivision);
}

#[test]
fn test_range_errors() {
    for input in ["exp(1000)", "cosh(1000)", "pow(10, 400)", "ldexp(1, 2000)"] {
        assert_eq!(
            eval_err(input),
            EvalError::Overflow("math range error".to_string()),
            "Failed for input: {}",
            input
        );
    }
}

#[test]
fn test_special_functions() {
    assert_eq!(eval_ok("erf(0)"), Value::Float(0.0));
    assert_eq!(eval_ok("erfc(0)"), Value::Float(1.0));
    assert!((float("erf(1) + erfc(1)") - 1.0).abs() < 1e-15);
    assert_eq!(eval_ok("gamma(5)"), Value::Float(24.0));
    assert!((float("gamma(0.5) ** 2") - std::f64::consts::PI).abs() < 1e-12);
    assert_eq!(eval_ok("lgamma(1)"), Value::Float(0.0));
    assert!((float("lgamma(10)") - 362_880f64.ln()).abs() < 1e-12);
    assert_eq!(eval_ok("gamma(0 - 0.5) < 0"), Value::Boolean(true));
}

#[test]
fn test_special_function_errors() {
    for input in ["gamma(0)", "gamma(0 - 1)", "gamma(float('-inf'))", "lgamma(0)", "lgamma(0 - 2)"] {
        assert_eq!(
            eval_err(input),
            EvalError::ValueError("math domain error".to_string()),
            "Failed for input: {}",
            input
        );
    }
    for input in ["gamma(200)", "lgamma(1e308)"] {
        assert_eq!(
            eval_err(input),
            EvalError::Overflow("math range error".to_string()),
            "Failed for input: {}",
            input
        );
    }
    assert_eq!(eval_ok("lgamma(float('inf'))"), Value::Float(f64::INFINITY));
}

#[test]
fn test_non_finite_inputs_pass_through() {
    assert!(float("sqrt(float('nan'))").is_nan());
    assert_eq!(eval_ok("exp(float('inf'))"), Value::Float(f64::INFINITY));
    assert_eq!(eval_ok("isnan(float('nan'))"), Value::Boolean(true));
    assert_eq!(eval_ok("isinf(float('-inf'))"), Value::Boolean(true));
    assert_eq!(eval_ok("isfinite(1e308)"), Value::Boolean(true));
}

#[test]
fn test_non_numeric_arguments() {
    assert!(matches!(eval_err("sqrt('4')"), EvalError::TypeError(_)));
    assert!(matches!(eval_err("floor(None)"), EvalError::TypeError(_)));
    assert!(matches!(eval_err("factorial(5.0)"), EvalError::TypeError(_)));
}

#[test]
fn test_float_manipulation() {
    assert_eq!(eval_ok("fabs(0 - 3)"), Value::Float(3.0));
    assert_eq!(eval_ok("copysign(2, 0 - 1)"), Value::Float(-2.0));
    assert_eq!(eval_ok("fmod(7, 3)"), Value::Float(1.0));
    assert_eq!(eval_ok("remainder(5, 2)"), Value::Float(1.0));
    assert_eq!(eval_ok("remainder(7, 2)"), Value::Float(-1.0));
    assert_eq!(
        eval_ok("frexp(8)"),
        Value::List(vec![Value::Float(0.5), Value::Integer(4)])
    );
    assert_eq!(eval_ok("ldexp(0.5, 4)"), Value::Float(8.0));
    assert_eq!(
        eval_ok("modf(2.5)"),
        Value::List(vec![Value::Float(0.5), Value::Float(2.0)])
    );
    assert_eq!(eval_ok("nextafter(1, 1)"), Value::Float(1.0));
    assert!(float("nextafter(1, 2)") > 1.0);
    assert_eq!(eval_ok("ulp(1)"), Value::Float(f64::EPSILON));
}

#[test]
fn test_isclose() {
    assert_eq!(eval_ok("isclose(0.1 + 0.2, 0.3)"), Value::Boolean(true));
    assert_eq!(eval_ok("isclose(1, 1.001)"), Value::Boolean(false));
    assert_eq!(
        eval_ok("isclose(float('inf'), float('inf'))"),
        Value::Boolean(true)
    );
}

#[test]
fn test_distances() {
    assert_eq!(eval_ok("hypot(3, 4)"), Value::Float(5.0));
    assert_eq!(eval_ok("hypot()"), Value::Float(0.0));
    assert_eq!(eval_ok("dist([0, 0], [3, 4])"), Value::Float(5.0));
    assert!(matches!(eval_err("dist([0], [1, 2])"), EvalError::ValueError(_)));
}

// ============================================================================
// Rounding to Integers
// ============================================================================

#[test]
fn test_rounding_functions_return_integers() {
    assert_eq!(eval_ok("floor(2.5)"), Value::Integer(2));
    assert_eq!(eval_ok("ceil(2.1)"), Value::Integer(3));
    assert_eq!(eval_ok("trunc(0 - 2.7)"), Value::Integer(-2));
    assert_eq!(eval_ok("floor(0 - 2.5)"), Value::Integer(-3));
    assert_eq!(eval_ok("floor(3)"), Value::Integer(3));
    assert_eq!(eval_ok("ceil(True)"), Value::Integer(1));
    assert_eq!(eval_ok("floor(Decimal('2.5'))"), Value::Integer(2));
    assert_eq!(eval_ok("ceil(Decimal('2.5'))"), Value::Integer(3));
}

#[test]
fn test_rounding_non_finite() {
    assert!(matches!(eval_err("floor(float('inf'))"), EvalError::Overflow(_)));
    assert!(matches!(eval_err("ceil(float('nan'))"), EvalError::ValueError(_)));
}

// ============================================================================
// Integer Functions
// ============================================================================

#[test]
fn test_factorial() {
    assert_eq!(eval_ok("factorial(0)"), Value::Integer(1));
    assert_eq!(eval_ok("factorial(5)"), Value::Integer(120));
    assert_eq!(eval_ok("factorial(20)"), Value::Integer(2_432_902_008_176_640_000));
    assert_eq!(
        eval_ok("factorial(21)"),
        Value::BigInt(BigInt::from(51_090_942_171_709_440_000u128))
    );
    assert!(matches!(eval_err("factorial(100000)"), EvalError::Overflow(_)));
    assert!(matches!(eval_err("factorial(0 - 1)"), EvalError::ValueError(_)));
}

#[test]
fn test_combinatorics() {
    assert_eq!(eval_ok("comb(5, 2)"), Value::Integer(10));
    assert_eq!(eval_ok("comb(2, 5)"), Value::Integer(0));
    assert_eq!(eval_ok("comb(60, 30)"), Value::Integer(118_264_581_564_861_424));
    assert_eq!(eval_ok("perm(5, 2)"), Value::Integer(20));
    assert_eq!(eval_ok("perm(4)"), Value::Integer(24));
    assert!(matches!(eval_err("comb(0 - 1, 2)"), EvalError::ValueError(_)));
}

#[test]
fn test_gcd_and_lcm() {
    assert_eq!(eval_ok("gcd(12, 18)"), Value::Integer(6));
    assert_eq!(eval_ok("gcd(12, 18, 8)"), Value::Integer(2));
    assert_eq!(eval_ok("gcd()"), Value::Integer(0));
    assert_eq!(eval_ok("gcd(0 - 4, 6)"), Value::Integer(2));
    assert_eq!(eval_ok("lcm(4, 6)"), Value::Integer(12));
    assert_eq!(eval_ok("lcm(4, 0)"), Value::Integer(0));
    assert_eq!(eval_ok("lcm()"), Value::Integer(1));
}

#[test]
fn test_wide_integer_arguments() {
    assert_eq!(eval_ok("isqrt(2 ** 128)"), Value::BigInt(BigInt::from(u64::MAX) + 1));
    assert_eq!(eval_ok("gcd(2 ** 70, 2 ** 65 * 3)"), Value::BigInt(BigInt::from(1) << 65u32));
    assert_eq!(eval_ok("comb(70, 35) > 2 ** 64"), Value::Boolean(true));
    assert_eq!(eval_ok("floor(2 ** 64)"), Value::BigInt(BigInt::from(u64::MAX) + 1));
    assert_eq!(eval_ok("log2(2 ** 2000)"), Value::Float(2000.0));
    assert!(matches!(eval_err("sqrt(10 ** 400)"), EvalError::Overflow(_)));
}

#[test]
fn test_isqrt() {
    assert_eq!(eval_ok("isqrt(0)"), Value::Integer(0));
    assert_eq!(eval_ok("isqrt(17)"), Value::Integer(4));
    assert_eq!(eval_ok("isqrt(9223372036854775807)"), Value::Integer(3_037_000_499));
    assert!(matches!(eval_err("isqrt(0 - 1)"), EvalError::ValueError(_)));
}

// ============================================================================
// Aggregates
// ============================================================================

#[test]
fn test_fsum_is_exact() {
    assert_eq!(eval_ok("fsum([0.1] * 10)"), Value::Float(1.0));
    assert_ne!(eval_ok("sum([0.1] * 10)"), Value::Float(1.0));
    assert_eq!(eval_ok("fsum([1e100, 1.0, 0 - 1e100])"), Value::Float(1.0));
    assert_eq!(eval_ok("fsum([])"), Value::Float(0.0));
}

#[test]
fn test_prod() {
    assert_eq!(eval_ok("prod([1, 2, 3, 4])"), Value::Integer(24));
    assert_eq!(eval_ok("prod([])"), Value::Integer(1));
    assert_eq!(eval_ok("prod([2, 0.5])"), Value::Float(1.0));
    assert!(matches!(eval_err("prod(['a', 2])"), EvalError::TypeError(_)));
}

#[test]
fn test_aggregates_only_combine_numbers() {
    let cases = vec![
        ("sum([9223372036854775807, 1])", Value::BigInt(BigInt::from(i64::MAX) + 1)),
        ("prod([4294967296, 4294967296])", Value::BigInt(BigInt::from(1) << 64u32)),
        ("sum([2 ** 64, 0 - 2 ** 64])", Value::Integer(0)),
        ("prod([1e200, 1e200])", Value::Float(f64::INFINITY)),
    ];
    for (input, expected) in cases {
        assert_eq!(eval_ok(input), expected, "Failed for input: {}", input);
    }

    for input in ["sum(['a', 'b'])", "sum([[1], [2]])", "prod([[1], 3])", "prod(['ab', 3])"] {
        assert!(
            matches!(eval_err(input), EvalError::TypeError(_)),
            "Failed for input: {}",
            input
        );
    }
}

#[test]
fn test_iterables_accept_strings() {
    assert_eq!(eval_ok("any('')"), Value::Boolean(false));
    assert_eq!(eval_ok("all('abc')"), Value::Boolean(true));
    assert!(matches!(eval_err("any(1)"), EvalError::TypeError(_)));
}

#[test]
fn test_lists_of_results() {
    assert_eq!(eval_ok("[gcd(4, 6), lcm(4, 6), isqrt(16)]"), ints(&[2, 12, 4]));
}
