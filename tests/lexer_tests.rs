// tests/lexer_tests.rs

use num_bigint::BigInt;
use pretty_assertions::assert_eq;
use safe_expr::ast::Token;
use safe_expr::lexer::{LexError, Lexer};

fn tokens(input: &str) -> Vec<Token> {
    Lexer::new(input).tokenize().unwrap()
}

fn single(input: &str) -> Token {
    let mut lexer = Lexer::new(input);
    let token = lexer.next_token().unwrap();
    assert_eq!(lexer.next_token().unwrap(), Token::Eof, "trailing input in {:?}", input);
    token
}

// ============================================================================
// Operators and Delimiters
// ============================================================================

#[test]
fn test_single_char_tokens() {
    let test_cases = vec![
        ("+", Token::Plus),
        ("-", Token::Minus),
        ("*", Token::Star),
        ("/", Token::Slash),
        ("%", Token::Percent),
        ("@", Token::At),
        ("&", Token::Ampersand),
        ("|", Token::Pipe),
        ("^", Token::Caret),
        ("~", Token::Tilde),
        ("<", Token::Lt),
        (">", Token::Gt),
        ("=", Token::Assign),
        ("(", Token::LParen),
        (")", Token::RParen),
        ("[", Token::LBracket),
        ("]", Token::RBracket),
        ("{", Token::LBrace),
        ("}", Token::RBrace),
        (",", Token::Comma),
        (":", Token::Colon),
        (".", Token::Dot),
    ];

    for (input, expected) in test_cases {
        assert_eq!(single(input), expected, "Failed for input: {}", input);
    }
}

#[test]
fn test_two_char_tokens() {
    let test_cases = vec![
        ("**", Token::DoubleStar),
        ("//", Token::DoubleSlash),
        ("==", Token::EqEq),
        ("!=", Token::NotEq),
        ("<=", Token::LtEq),
        (">=", Token::GtEq),
        ("<<", Token::LeftShift),
        (">>", Token::RightShift),
    ];

    for (input, expected) in test_cases {
        assert_eq!(single(input), expected, "Failed for input: {}", input);
    }
}

#[test]
fn test_lone_bang_is_rejected() {
    assert!(matches!(
        Lexer::new("!x").next_token(),
        Err(LexError::UnexpectedChar { ch: '!', .. })
    ));
}

// ============================================================================
// Keywords and Identifiers
// ============================================================================

#[test]
fn test_keywords() {
    assert_eq!(
        tokens("and or not in is if else for lambda"),
        vec![
            Token::And,
            Token::Or,
            Token::Not,
            Token::In,
            Token::Is,
            Token::If,
            Token::Else,
            Token::For,
            Token::Lambda,
            Token::Eof,
        ]
    );
}

#[test]
fn test_constants_are_case_sensitive() {
    assert_eq!(single("True"), Token::Boolean(true));
    assert_eq!(single("False"), Token::Boolean(false));
    assert_eq!(single("None"), Token::None);
    assert_eq!(single("true"), Token::Identifier("true".to_string()));
    assert_eq!(single("none"), Token::Identifier("none".to_string()));
}

#[test]
fn test_identifiers() {
    assert_eq!(single("Decimal"), Token::Identifier("Decimal".to_string()));
    assert_eq!(single("_private1"), Token::Identifier("_private1".to_string()));
    assert_eq!(single("notable"), Token::Identifier("notable".to_string()));
}

// ============================================================================
// Numbers
// ============================================================================

#[test]
fn test_integers() {
    assert_eq!(single("0"), Token::Integer(0));
    assert_eq!(single("42"), Token::Integer(42));
    assert_eq!(single("1_000_000"), Token::Integer(1_000_000));
    assert_eq!(single("000"), Token::Integer(0));
    assert_eq!(single("0xff"), Token::Integer(255));
    assert_eq!(single("0o17"), Token::Integer(15));
    assert_eq!(single("0b1010"), Token::Integer(10));
    assert_eq!(single("0x_ff"), Token::Integer(255));
}

#[test]
fn test_floats() {
    assert_eq!(single("3.14"), Token::Float(3.14));
    assert_eq!(single(".5"), Token::Float(0.5));
    assert_eq!(single("1."), Token::Float(1.0));
    assert_eq!(single("1e3"), Token::Float(1000.0));
    assert_eq!(single("2.5E-1"), Token::Float(0.25));
    assert_eq!(single("1_0.0_1"), Token::Float(10.01));
}

#[test]
fn test_wide_integers() {
    assert_eq!(single("9223372036854775807"), Token::Integer(i64::MAX));
    assert_eq!(
        single("9223372036854775808"),
        Token::BigInteger(BigInt::from(i64::MAX) + 1)
    );
    assert_eq!(
        single("0x1_0000_0000_0000_0000"),
        Token::BigInteger(BigInt::from(u64::MAX) + 1)
    );
}

#[test]
fn test_invalid_numbers() {
    assert!(matches!(
        Lexer::new("007").next_token(),
        Err(LexError::InvalidNumber { .. })
    ));
    assert!(matches!(
        Lexer::new("12abc").next_token(),
        Err(LexError::InvalidNumber { .. })
    ));
    assert!(matches!(
        Lexer::new("0x").next_token(),
        Err(LexError::InvalidNumber { .. })
    ));
    assert!(matches!(
        Lexer::new(&"9".repeat(70_000)).next_token(),
        Err(LexError::IntegerTooLarge { digits: 70_000, .. })
    ));
    assert!(matches!(
        Lexer::new("3j").next_token(),
        Err(LexError::Unsupported { what: "imaginary literals", .. })
    ));
}

#[test]
fn test_minus_is_a_separate_token() {
    assert_eq!(
        tokens("-1"),
        vec![Token::Minus, Token::Integer(1), Token::Eof]
    );
}

// ============================================================================
// Strings
// ============================================================================

#[test]
fn test_quote_styles() {
    assert_eq!(single("'single'"), Token::String("single".to_string()));
    assert_eq!(single("\"double\""), Token::String("double".to_string()));
    assert_eq!(single("'it\"s'"), Token::String("it\"s".to_string()));
    assert_eq!(single("''"), Token::String(String::new()));
}

#[test]
fn test_escapes() {
    assert_eq!(single(r"'a\nb'"), Token::String("a\nb".to_string()));
    assert_eq!(single(r"'tab\there'"), Token::String("tab\there".to_string()));
    assert_eq!(single(r"'\'quoted\''"), Token::String("'quoted'".to_string()));
    assert_eq!(single(r"'\x41é'"), Token::String("A\u{e9}".to_string()));
    assert_eq!(single(r"'\101'"), Token::String("A".to_string()));
    assert_eq!(single(r"'\d'"), Token::String("\\d".to_string()));
}

#[test]
fn test_raw_and_triple_quoted_strings() {
    assert_eq!(single(r"r'\d+'"), Token::String("\\d+".to_string()));
    assert_eq!(
        single("'''line one\nline two'''"),
        Token::String("line one\nline two".to_string())
    );
    assert_eq!(single("u'text'"), Token::String("text".to_string()));
}

#[test]
fn test_unsupported_string_prefixes() {
    assert!(matches!(
        Lexer::new("b'bytes'").next_token(),
        Err(LexError::Unsupported { what: "bytes literals", .. })
    ));
    assert!(matches!(
        Lexer::new("f'{x}'").next_token(),
        Err(LexError::Unsupported { what: "formatted string literals", .. })
    ));
}

#[test]
fn test_unterminated_string() {
    assert!(matches!(
        Lexer::new("'open").next_token(),
        Err(LexError::UnterminatedString { .. })
    ));
    assert!(matches!(
        Lexer::new("'line\nbreak'").next_token(),
        Err(LexError::UnterminatedString { .. })
    ));
}

// ============================================================================
// Whitespace and Comments
// ============================================================================

#[test]
fn test_comments_and_continuations() {
    assert_eq!(
        tokens("1 + \\\n 2  # trailing comment"),
        vec![Token::Integer(1), Token::Plus, Token::Integer(2), Token::Eof]
    );
}

#[test]
fn test_full_expression() {
    assert_eq!(
        tokens("round(x, 2) >= 1.5 and 'a' not in ['b']"),
        vec![
            Token::Identifier("round".to_string()),
            Token::LParen,
            Token::Identifier("x".to_string()),
            Token::Comma,
            Token::Integer(2),
            Token::RParen,
            Token::GtEq,
            Token::Float(1.5),
            Token::And,
            Token::String("a".to_string()),
            Token::Not,
            Token::In,
            Token::LBracket,
            Token::String("b".to_string()),
            Token::RBracket,
            Token::Eof,
        ]
    );
}
