use std::fmt;

use crate::ast::Token;
use crate::value::parse_big_integer;

/// Location of a character in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    /// Character offset from the start of the input
    pub offset: usize,
    /// 1-based line number
    pub line: usize,
    /// 1-based column number
    pub column: usize,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// Errors raised while splitting the input into tokens.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LexError {
    #[error("unexpected character '{ch}' at {position}")]
    UnexpectedChar { ch: char, position: Position },

    #[error("unterminated string literal starting at {position}")]
    UnterminatedString { position: Position },

    #[error("invalid number literal '{text}' at {position}")]
    InvalidNumber { text: String, position: Position },

    #[error("integer literal at {position} is too large ({digits} digits)")]
    IntegerTooLarge { digits: usize, position: Position },

    #[error("{what} are not supported (at {position})")]
    Unsupported {
        what: &'static str,
        position: Position,
    },
}

pub struct Lexer {
    input: Vec<char>,
    position: usize,
    line: usize,
    column: usize,
    token_start: Position,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Lexer {
            input: input.chars().collect(),
            position: 0,
            line: 1,
            column: 1,
            token_start: Position {
                offset: 0,
                line: 1,
                column: 1,
            },
        }
    }

    /// Position where the most recently returned token starts.
    pub fn token_start(&self) -> Position {
        self.token_start
    }

    fn here(&self) -> Position {
        Position {
            offset: self.position,
            line: self.line,
            column: self.column,
        }
    }

    fn current_char(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek_char(&self, offset: usize) -> Option<char> {
        self.input.get(self.position + offset).copied()
    }

    fn advance(&mut self) {
        if let Some(ch) = self.current_char() {
            if ch == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
            self.position += 1;
        }
    }

    fn advance_by(&mut self, n: usize) {
        for _ in 0..n {
            self.advance();
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        while let Some(ch) = self.current_char() {
            if ch == '#' {
                while let Some(c) = self.current_char() {
                    if c == '\n' {
                        break;
                    }
                    self.advance();
                }
            } else if ch == '\\' && self.peek_char(1) == Some('\n') {
                // explicit line continuation
                self.advance_by(2);
            } else if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn read_identifier(&mut self) -> String {
        let mut result = String::new();
        while let Some(ch) = self.current_char() {
            if ch.is_alphanumeric() || ch == '_' {
                result.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        result
    }

    fn read_string(&mut self, raw: bool) -> Result<String, LexError> {
        let start = self.here();
        let quote = match self.current_char() {
            Some(q) => q,
            None => return Err(LexError::UnterminatedString { position: start }),
        };
        let triple = self.peek_char(1) == Some(quote) && self.peek_char(2) == Some(quote);
        if triple {
            self.advance_by(3);
        } else {
            self.advance();
        }

        let mut result = String::new();
        while let Some(ch) = self.current_char() {
            if ch == quote
                && (!triple || (self.peek_char(1) == Some(quote) && self.peek_char(2) == Some(quote)))
            {
                self.advance_by(if triple { 3 } else { 1 });
                return Ok(result);
            }
            match ch {
                '\n' if !triple => break,
                '\\' if raw => {
                    // Raw strings keep the backslash, but it still protects the quote
                    result.push('\\');
                    self.advance();
                    if let Some(next) = self.current_char() {
                        result.push(next);
                        self.advance();
                    }
                }
                '\\' => {
                    self.advance();
                    self.read_escape(&mut result, start)?;
                }
                _ => {
                    result.push(ch);
                    self.advance();
                }
            }
        }

        Err(LexError::UnterminatedString { position: start })
    }

    fn read_escape(&mut self, out: &mut String, start: Position) -> Result<(), LexError> {
        let Some(ch) = self.current_char() else {
            return Err(LexError::UnterminatedString { position: start });
        };
        match ch {
            '\n' => {}
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'a' => out.push('\u{07}'),
            'b' => out.push('\u{08}'),
            'f' => out.push('\u{0c}'),
            'v' => out.push('\u{0b}'),
            '\\' => out.push('\\'),
            '\'' => out.push('\''),
            '"' => out.push('"'),
            'x' | 'u' | 'U' => {
                let width = match ch {
                    'x' => 2,
                    'u' => 4,
                    _ => 8,
                };
                let digits: String = (1..=width).filter_map(|i| self.peek_char(i)).collect();
                let code = if digits.len() == width {
                    u32::from_str_radix(&digits, 16).ok()
                } else {
                    None
                };
                match code.and_then(char::from_u32) {
                    Some(c) => {
                        out.push(c);
                        self.advance_by(width);
                    }
                    None => {
                        return Err(LexError::Unsupported {
                            what: "malformed unicode escapes",
                            position: self.here(),
                        });
                    }
                }
            }
            '0'..='7' => {
                let mut code = 0u32;
                let mut taken = 0;
                while taken < 3
                    && let Some(d) = self.current_char().and_then(|c| c.to_digit(8))
                {
                    code = code * 8 + d;
                    taken += 1;
                    self.advance();
                }
                if let Some(c) = char::from_u32(code) {
                    out.push(c);
                }
                return Ok(());
            }
            // Unknown escapes are kept verbatim
            other => {
                out.push('\\');
                out.push(other);
            }
        }
        self.advance();
        Ok(())
    }

    fn read_digits(&mut self, text: &mut String, radix: u32) {
        while let Some(ch) = self.current_char() {
            if ch.is_digit(radix) {
                text.push(ch);
                self.advance();
            } else if ch == '_' && self.peek_char(1).is_some_and(|c| c.is_digit(radix)) {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn read_number(&mut self) -> Result<Token, LexError> {
        let start = self.here();

        if self.current_char() == Some('0')
            && let Some(prefix) = self.peek_char(1)
        {
            let radix = match prefix {
                'x' | 'X' => Some(16),
                'o' | 'O' => Some(8),
                'b' | 'B' => Some(2),
                _ => None,
            };
            if let Some(radix) = radix {
                self.advance_by(2);
                if self.current_char() == Some('_') {
                    self.advance();
                }
                let mut digits = String::new();
                self.read_digits(&mut digits, radix);
                let literal = format!("0{}{}", prefix, digits);
                if digits.is_empty() || self.current_char().is_some_and(|c| c.is_alphanumeric()) {
                    return Err(LexError::InvalidNumber {
                        text: literal,
                        position: start,
                    });
                }
                return integer_token(&digits, radix, start);
            }
        }

        let mut number = String::new();
        let mut is_float = false;

        self.read_digits(&mut number, 10);

        if self.current_char() == Some('.') {
            is_float = true;
            number.push('.');
            self.advance();
            self.read_digits(&mut number, 10);
        }

        if matches!(self.current_char(), Some('e' | 'E')) {
            let sign_len = usize::from(matches!(self.peek_char(1), Some('+' | '-')));
            if self.peek_char(1 + sign_len).is_some_and(|c| c.is_ascii_digit()) {
                is_float = true;
                number.push('e');
                self.advance();
                if sign_len == 1
                    && let Some(sign) = self.current_char()
                {
                    number.push(sign);
                    self.advance();
                }
                self.read_digits(&mut number, 10);
            }
        }

        match self.current_char() {
            Some('j' | 'J') => {
                return Err(LexError::Unsupported {
                    what: "imaginary literals",
                    position: start,
                });
            }
            Some(ch) if ch.is_alphanumeric() || ch == '_' => {
                number.push(ch);
                return Err(LexError::InvalidNumber {
                    text: number,
                    position: start,
                });
            }
            _ => {}
        }

        if is_float {
            return number
                .parse::<f64>()
                .map(Token::Float)
                .map_err(|_| LexError::InvalidNumber {
                    text: number.clone(),
                    position: start,
                });
        }

        // "007" is rejected, "000" is fine
        if number.len() > 1 && number.starts_with('0') && number.chars().any(|c| c != '0') {
            return Err(LexError::InvalidNumber {
                text: number,
                position: start,
            });
        }

        integer_token(&number, 10, start)
    }

    /// Reads a string literal with an optional prefix (`r'..'`, `u'..'`).
    fn read_prefixed_string(&mut self, prefix: &str) -> Result<Token, LexError> {
        let start = self.here();
        let lower = prefix.to_ascii_lowercase();
        if lower.contains('b') {
            return Err(LexError::Unsupported {
                what: "bytes literals",
                position: start,
            });
        }
        if lower.contains('f') {
            return Err(LexError::Unsupported {
                what: "formatted string literals",
                position: start,
            });
        }
        self.advance_by(prefix.chars().count());
        self.read_string(lower.contains('r')).map(Token::String)
    }

    fn string_prefix_len(&self) -> Option<usize> {
        let mut len = 0;
        while len < 2
            && self
                .peek_char(len)
                .is_some_and(|c| matches!(c.to_ascii_lowercase(), 'r' | 'u' | 'b' | 'f'))
        {
            len += 1;
        }
        if len > 0 && matches!(self.peek_char(len), Some('\'' | '"')) {
            Some(len)
        } else {
            None
        }
    }

    fn single(&mut self, token: Token) -> Result<Token, LexError> {
        self.advance();
        Ok(token)
    }

    fn double(&mut self, token: Token) -> Result<Token, LexError> {
        self.advance_by(2);
        Ok(token)
    }

    pub fn next_token(&mut self) -> Result<Token, LexError> {
        self.skip_whitespace_and_comments();
        self.token_start = self.here();

        let Some(ch) = self.current_char() else {
            return Ok(Token::Eof);
        };
        let next = self.peek_char(1);

        match ch {
            '+' => self.single(Token::Plus),
            '-' => self.single(Token::Minus),
            '*' if next == Some('*') => self.double(Token::DoubleStar),
            '*' => self.single(Token::Star),
            '/' if next == Some('/') => self.double(Token::DoubleSlash),
            '/' => self.single(Token::Slash),
            '%' => self.single(Token::Percent),
            '@' => self.single(Token::At),
            '&' => self.single(Token::Ampersand),
            '|' => self.single(Token::Pipe),
            '^' => self.single(Token::Caret),
            '~' => self.single(Token::Tilde),
            '<' if next == Some('<') => self.double(Token::LeftShift),
            '<' if next == Some('=') => self.double(Token::LtEq),
            '<' => self.single(Token::Lt),
            '>' if next == Some('>') => self.double(Token::RightShift),
            '>' if next == Some('=') => self.double(Token::GtEq),
            '>' => self.single(Token::Gt),
            '=' if next == Some('=') => self.double(Token::EqEq),
            '=' => self.single(Token::Assign),
            '!' if next == Some('=') => self.double(Token::NotEq),
            '(' => self.single(Token::LParen),
            ')' => self.single(Token::RParen),
            '[' => self.single(Token::LBracket),
            ']' => self.single(Token::RBracket),
            '{' => self.single(Token::LBrace),
            '}' => self.single(Token::RBrace),
            ',' => self.single(Token::Comma),
            ':' => self.single(Token::Colon),
            '.' if next.is_some_and(|c| c.is_ascii_digit()) => self.read_number(),
            '.' => self.single(Token::Dot),
            '"' | '\'' => self.read_string(false).map(Token::String),
            c if c.is_ascii_digit() => self.read_number(),
            c if c.is_alphabetic() || c == '_' => {
                if let Some(len) = self.string_prefix_len() {
                    let prefix: String = (0..len).filter_map(|i| self.peek_char(i)).collect();
                    return self.read_prefixed_string(&prefix);
                }

                let ident = self.read_identifier();
                Ok(match ident.as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    "in" => Token::In,
                    "is" => Token::Is,
                    "if" => Token::If,
                    "else" => Token::Else,
                    "for" => Token::For,
                    "lambda" => Token::Lambda,
                    "True" => Token::Boolean(true),
                    "False" => Token::Boolean(false),
                    "None" => Token::None,
                    _ => Token::Identifier(ident),
                })
            }
            other => Err(LexError::UnexpectedChar {
                ch: other,
                position: self.token_start,
            }),
        }
    }

    /// Splits the whole input into tokens, ending with `Token::Eof`.
    pub fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token == Token::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }
}

/// Integer token for validated digits: `i64` when it fits, wide otherwise.
fn integer_token(digits: &str, radix: u32, start: Position) -> Result<Token, LexError> {
    if let Ok(n) = i64::from_str_radix(digits, radix) {
        return Ok(Token::Integer(n));
    }
    parse_big_integer(digits, radix)
        .map(Token::BigInteger)
        .ok_or(LexError::IntegerTooLarge {
            digits: digits.len(),
            position: start,
        })
}

#[test]
fn test_keywords() {
    let tokens = Lexer::new("and or not in is True False None").tokenize().unwrap();
    assert_eq!(
        tokens,
        vec![
            Token::And,
            Token::Or,
            Token::Not,
            Token::In,
            Token::Is,
            Token::Boolean(true),
            Token::Boolean(false),
            Token::None,
            Token::Eof,
        ]
    );
}

#[test]
fn test_chained_comparison() {
    let mut lexer = Lexer::new("1 <= x<3");
    assert_eq!(lexer.next_token().unwrap(), Token::Integer(1));
    assert_eq!(lexer.next_token().unwrap(), Token::LtEq);
    assert_eq!(lexer.next_token().unwrap(), Token::Identifier("x".to_string()));
    assert_eq!(lexer.next_token().unwrap(), Token::Lt);
    assert_eq!(lexer.next_token().unwrap(), Token::Integer(3));
    assert_eq!(lexer.next_token().unwrap(), Token::Eof);
}

#[test]
fn test_token_positions() {
    let mut lexer = Lexer::new("1 +\n  22");
    lexer.next_token().unwrap();
    lexer.next_token().unwrap();
    assert_eq!(lexer.next_token().unwrap(), Token::Integer(22));
    assert_eq!(
        lexer.token_start(),
        Position {
            offset: 6,
            line: 2,
            column: 3
        }
    );
}
