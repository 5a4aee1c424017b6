use num_bigint::BigInt;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals
    /// Integer literal, in decimal, hex, octal or binary
    ///
    /// # Examples
    /// ```text
    /// 42
    /// 1_000
    /// 0xff
    /// ```
    Integer(i64),

    /// Integer literal too wide for 64 bits
    BigInteger(BigInt),

    /// Floating-point literal
    ///
    /// # Examples
    /// ```text
    /// 3.14
    /// .5
    /// 1e-3
    /// ```
    Float(f64),

    /// String literal in single or double quotes
    ///
    /// # Examples
    /// ```text
    /// "hello"
    /// 'item #1'
    /// ```
    String(String),

    /// `True` / `False`
    Boolean(bool),

    /// `None`
    None,

    /// Identifier
    ///
    /// Must start with a letter or underscore, followed by letters, digits,
    /// or underscores.
    ///
    /// # Examples
    /// ```text
    /// round
    /// Decimal
    /// _private
    /// ```
    Identifier(String),

    // Keywords
    And,
    Or,
    Not,
    In,
    Is,
    If,
    Else,
    For,
    Lambda,

    // Arithmetic
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Star,
    /// `**`
    DoubleStar,
    /// `/`
    Slash,
    /// `//`
    DoubleSlash,
    /// `%`
    Percent,
    /// `@`
    At,

    // Bitwise
    /// `&`
    Ampersand,
    /// `|`
    Pipe,
    /// `^`
    Caret,
    /// `~`
    Tilde,
    /// `<<`
    LeftShift,
    /// `>>`
    RightShift,

    // Comparison
    /// `==`
    EqEq,
    /// `!=`
    NotEq,
    /// `<`
    Lt,
    /// `>`
    Gt,
    /// `<=`
    LtEq,
    /// `>=`
    GtEq,

    /// `=`, only legal in keyword arguments
    Assign,

    // Delimiters
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Dot,

    /// End of input
    Eof,
}

impl Token {
    /// Short description used in parse error messages.
    pub fn describe(&self) -> String {
        match self {
            Token::Integer(n) => format!("integer {}", n),
            Token::BigInteger(n) => format!("integer {}", n),
            Token::Float(n) => format!("float {}", n),
            Token::String(s) => format!("string {:?}", s),
            Token::Boolean(true) => "'True'".to_string(),
            Token::Boolean(false) => "'False'".to_string(),
            Token::None => "'None'".to_string(),
            Token::Identifier(name) => format!("identifier '{}'", name),
            Token::Eof => "end of input".to_string(),
            other => format!("'{}'", other.symbol()),
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            Token::And => "and",
            Token::Or => "or",
            Token::Not => "not",
            Token::In => "in",
            Token::Is => "is",
            Token::If => "if",
            Token::Else => "else",
            Token::For => "for",
            Token::Lambda => "lambda",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::DoubleStar => "**",
            Token::Slash => "/",
            Token::DoubleSlash => "//",
            Token::Percent => "%",
            Token::At => "@",
            Token::Ampersand => "&",
            Token::Pipe => "|",
            Token::Caret => "^",
            Token::Tilde => "~",
            Token::LeftShift => "<<",
            Token::RightShift => ">>",
            Token::EqEq => "==",
            Token::NotEq => "!=",
            Token::Lt => "<",
            Token::Gt => ">",
            Token::LtEq => "<=",
            Token::GtEq => ">=",
            Token::Assign => "=",
            Token::LParen => "(",
            Token::RParen => ")",
            Token::LBracket => "[",
            Token::RBracket => "]",
            Token::LBrace => "{",
            Token::RBrace => "}",
            Token::Comma => ",",
            Token::Colon => ":",
            Token::Dot => ".",
            _ => "?",
        }
    }
}
