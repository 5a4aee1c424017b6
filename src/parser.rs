use std::mem;

use crate::{
    ast::{BinOp, BoolOp, CmpOp, Comprehension, Expr, Expression, Keyword, Token, UnaryOp},
    lexer::{LexError, Lexer, Position},
    value::Value,
};

/// Nesting of brackets and prefix operators accepted when no explicit limit
/// is given. Each level costs a couple of dozen parser frames.
pub const DEFAULT_MAX_DEPTH: usize = 50;

/// Height of the syntax tree accepted when no explicit limit is given.
/// Operator chains such as `1 + 1 + 1` count one level per operator.
pub const DEFAULT_MAX_HEIGHT: usize = 200;

/// Errors raised while building the syntax tree.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error(transparent)]
    Lex(#[from] LexError),

    #[error("expected {expected}, found {found} at {position}")]
    UnexpectedToken {
        expected: String,
        found: String,
        position: Position,
    },

    #[error("invalid syntax at {position}: {message}")]
    InvalidSyntax { message: String, position: Position },

    #[error("expression nested more than {limit} levels deep at {position}")]
    TooDeep { limit: usize, position: Position },

    #[error("expression tree grows past {limit} levels at {position}")]
    TooComplex { limit: usize, position: Position },
}

pub struct Parser {
    lexer: Lexer,
    current_token: Token,
    current_position: Position,
    depth: usize,
    max_depth: usize,
    height: usize,
    max_height: usize,
}

impl Parser {
    pub fn new(mut lexer: Lexer) -> Result<Self, ParseError> {
        let current_token = lexer.next_token()?;
        let current_position = lexer.token_start();
        Ok(Parser {
            lexer,
            current_token,
            current_position,
            depth: 0,
            max_depth: DEFAULT_MAX_DEPTH,
            height: 0,
            max_height: DEFAULT_MAX_HEIGHT,
        })
    }

    /// Limits how deeply brackets and prefix operators may nest.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Limits the height of the tree, counting every node on the path from
    /// the root, including each link of an operator chain.
    pub fn with_max_height(mut self, max_height: usize) -> Self {
        self.max_height = max_height;
        self
    }

    fn advance(&mut self) -> Result<(), ParseError> {
        self.current_token = self.lexer.next_token()?;
        self.current_position = self.lexer.token_start();
        Ok(())
    }

    /// Takes the current token and moves to the next one.
    fn bump(&mut self) -> Result<Token, ParseError> {
        let token = mem::replace(&mut self.current_token, Token::Eof);
        self.advance()?;
        Ok(token)
    }

    fn check(&self, token: &Token) -> bool {
        mem::discriminant(&self.current_token) == mem::discriminant(token)
    }

    fn eat(&mut self, token: &Token) -> Result<bool, ParseError> {
        if self.check(token) {
            self.advance()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn expect(&mut self, expected: Token) -> Result<(), ParseError> {
        if self.check(&expected) {
            self.advance()
        } else {
            Err(self.unexpected(expected.describe()))
        }
    }

    fn unexpected(&self, expected: impl Into<String>) -> ParseError {
        ParseError::UnexpectedToken {
            expected: expected.into(),
            found: self.current_token.describe(),
            position: self.current_position,
        }
    }

    fn invalid(&self, message: impl Into<String>) -> ParseError {
        ParseError::InvalidSyntax {
            message: message.into(),
            position: self.current_position,
        }
    }

    fn enter(&mut self) -> Result<(), ParseError> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(ParseError::TooDeep {
                limit: self.max_depth,
                position: self.current_position,
            });
        }
        self.grow()
    }

    fn leave(&mut self) {
        self.depth -= 1;
        self.height -= 1;
    }

    fn grow(&mut self) -> Result<(), ParseError> {
        self.height += 1;
        if self.height > self.max_height {
            return Err(ParseError::TooComplex {
                limit: self.max_height,
                position: self.current_position,
            });
        }
        Ok(())
    }

    /// Runs `f` one nesting level deeper.
    fn nested<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        self.enter()?;
        let result = f(self);
        self.leave();
        result
    }

    /// Parses the whole input as a single expression.
    ///
    /// A top-level comma list (`1, 2`) becomes a tuple, as in the standard
    /// expression grammar.
    pub fn parse(&mut self) -> Result<Expression, ParseError> {
        let body = self.parse_expression_list()?;
        if !self.check(&Token::Eof) {
            return Err(self.unexpected("end of input"));
        }
        Ok(Expression::new(body))
    }

    fn parse_expression_list(&mut self) -> Result<Expr, ParseError> {
        let first = self.parse_star_or_expression()?;
        if !self.check(&Token::Comma) {
            return Ok(first);
        }

        let mut items = vec![first];
        while self.eat(&Token::Comma)? {
            if self.starts_expression() {
                items.push(self.parse_star_or_expression()?);
            } else {
                break;
            }
        }
        Ok(Expr::Tuple(items))
    }

    fn starts_expression(&self) -> bool {
        !matches!(
            self.current_token,
            Token::Eof
                | Token::RParen
                | Token::RBracket
                | Token::RBrace
                | Token::Comma
                | Token::Colon
                | Token::Assign
                | Token::For
        )
    }

    fn parse_star_or_expression(&mut self) -> Result<Expr, ParseError> {
        if self.eat(&Token::Star)? {
            let operand = self.nested(|p| p.parse_bitor())?;
            return Ok(Expr::Starred(operand.boxed()));
        }
        self.parse_expression()
    }

    pub fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        if self.check(&Token::Lambda) {
            return self.nested(|p| p.parse_lambda());
        }

        let body = self.parse_disjunction()?;
        if !self.eat(&Token::If)? {
            return Ok(body);
        }

        self.nested(|p| {
            let test = p.parse_disjunction()?;
            p.expect(Token::Else)?;
            let orelse = p.parse_expression()?;
            Ok(Expr::IfExp {
                test: test.boxed(),
                body: body.boxed(),
                orelse: orelse.boxed(),
            })
        })
    }

    fn parse_lambda(&mut self) -> Result<Expr, ParseError> {
        self.advance()?; // consume 'lambda'

        let mut params = vec![];
        while let Token::Identifier(_) = self.current_token {
            if let Token::Identifier(name) = self.bump()? {
                params.push(name);
            }
            if !self.eat(&Token::Comma)? {
                break;
            }
        }

        self.expect(Token::Colon)?;
        let body = self.parse_expression()?;
        Ok(Expr::Lambda {
            params,
            body: body.boxed(),
        })
    }

    fn parse_disjunction(&mut self) -> Result<Expr, ParseError> {
        let first = self.parse_conjunction()?;
        if !self.check(&Token::Or) {
            return Ok(first);
        }

        let mut values = vec![first];
        while self.eat(&Token::Or)? {
            values.push(self.parse_conjunction()?);
        }
        Ok(Expr::BoolOp {
            op: BoolOp::Or,
            values,
        })
    }

    fn parse_conjunction(&mut self) -> Result<Expr, ParseError> {
        let first = self.parse_inversion()?;
        if !self.check(&Token::And) {
            return Ok(first);
        }

        let mut values = vec![first];
        while self.eat(&Token::And)? {
            values.push(self.parse_inversion()?);
        }
        Ok(Expr::BoolOp {
            op: BoolOp::And,
            values,
        })
    }

    fn parse_inversion(&mut self) -> Result<Expr, ParseError> {
        if self.eat(&Token::Not)? {
            let operand = self.nested(|p| p.parse_inversion())?;
            return Ok(Expr::UnaryOp {
                op: UnaryOp::Not,
                operand: operand.boxed(),
            });
        }
        self.parse_comparison()
    }

    fn comparison_operator(&mut self) -> Result<Option<CmpOp>, ParseError> {
        let op = match self.current_token {
            Token::EqEq => CmpOp::Eq,
            Token::NotEq => CmpOp::NotEq,
            Token::Lt => CmpOp::Lt,
            Token::LtEq => CmpOp::LtE,
            Token::Gt => CmpOp::Gt,
            Token::GtEq => CmpOp::GtE,
            Token::In => CmpOp::In,
            Token::Is => {
                self.advance()?;
                return Ok(Some(if self.eat(&Token::Not)? {
                    CmpOp::IsNot
                } else {
                    CmpOp::Is
                }));
            }
            // After an operand, `not` can only start `not in`
            Token::Not => {
                self.advance()?;
                self.expect(Token::In)?;
                return Ok(Some(CmpOp::NotIn));
            }
            _ => return Ok(None),
        };
        self.advance()?;
        Ok(Some(op))
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let left = self.parse_bitor()?;

        let mut ops = vec![];
        let mut comparators = vec![];
        while let Some(op) = self.comparison_operator()? {
            ops.push(op);
            comparators.push(self.parse_bitor()?);
        }

        if ops.is_empty() {
            return Ok(left);
        }
        Ok(Expr::Compare {
            left: left.boxed(),
            ops,
            comparators,
        })
    }

    /// Parses `operand (op operand)*` into a left-leaning tree.
    ///
    /// The chain needs no recursion to parse, but every operator puts one
    /// more level above the first operand, so each counts toward the height
    /// limit until the chain is complete.
    fn parse_left_assoc(
        &mut self,
        operator: fn(&Token) -> Option<BinOp>,
        operand: fn(&mut Self) -> Result<Expr, ParseError>,
    ) -> Result<Expr, ParseError> {
        let base = self.height;
        let result = self.fold_left_assoc(operator, operand);
        self.height = base;
        result
    }

    fn fold_left_assoc(
        &mut self,
        operator: fn(&Token) -> Option<BinOp>,
        operand: fn(&mut Self) -> Result<Expr, ParseError>,
    ) -> Result<Expr, ParseError> {
        let mut left = operand(self)?;
        while let Some(op) = operator(&self.current_token) {
            self.advance()?;
            self.grow()?;
            let right = operand(self)?;
            left = binop(op, left, right);
        }
        Ok(left)
    }

    fn parse_bitor(&mut self) -> Result<Expr, ParseError> {
        self.parse_left_assoc(
            |token| matches!(token, Token::Pipe).then_some(BinOp::BitOr),
            Self::parse_bitxor,
        )
    }

    fn parse_bitxor(&mut self) -> Result<Expr, ParseError> {
        self.parse_left_assoc(
            |token| matches!(token, Token::Caret).then_some(BinOp::BitXor),
            Self::parse_bitand,
        )
    }

    fn parse_bitand(&mut self) -> Result<Expr, ParseError> {
        self.parse_left_assoc(
            |token| matches!(token, Token::Ampersand).then_some(BinOp::BitAnd),
            Self::parse_shift,
        )
    }

    fn parse_shift(&mut self) -> Result<Expr, ParseError> {
        self.parse_left_assoc(
            |token| match token {
                Token::LeftShift => Some(BinOp::LShift),
                Token::RightShift => Some(BinOp::RShift),
                _ => None,
            },
            Self::parse_additive,
        )
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        self.parse_left_assoc(
            |token| match token {
                Token::Plus => Some(BinOp::Add),
                Token::Minus => Some(BinOp::Sub),
                _ => None,
            },
            Self::parse_multiplicative,
        )
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        self.parse_left_assoc(
            |token| match token {
                Token::Star => Some(BinOp::Mult),
                Token::Slash => Some(BinOp::Div),
                Token::DoubleSlash => Some(BinOp::FloorDiv),
                Token::Percent => Some(BinOp::Mod),
                Token::At => Some(BinOp::MatMult),
                _ => None,
            },
            Self::parse_factor,
        )
    }

    fn parse_factor(&mut self) -> Result<Expr, ParseError> {
        let op = match self.current_token {
            Token::Minus => UnaryOp::USub,
            Token::Plus => UnaryOp::UAdd,
            Token::Tilde => UnaryOp::Invert,
            _ => return self.parse_power(),
        };
        self.advance()?;
        let operand = self.nested(|p| p.parse_factor())?;
        Ok(Expr::UnaryOp {
            op,
            operand: operand.boxed(),
        })
    }

    fn parse_power(&mut self) -> Result<Expr, ParseError> {
        let base = self.parse_primary()?;
        if !self.eat(&Token::DoubleStar)? {
            return Ok(base);
        }
        // Right-associative: 2 ** 3 ** 2 == 2 ** (3 ** 2)
        let exponent = self.nested(|p| p.parse_factor())?;
        Ok(binop(BinOp::Pow, base, exponent))
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let base = self.height;
        let result = self.parse_trailers();
        self.height = base;
        result
    }

    /// Attribute, call and subscript trailers; like an operator chain, each
    /// one adds a tree level.
    fn parse_trailers(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_atom()?;

        loop {
            if matches!(self.current_token, Token::Dot | Token::LParen | Token::LBracket) {
                self.grow()?;
            }
            match self.current_token {
                Token::Dot => {
                    self.advance()?;
                    let attr = match self.bump()? {
                        Token::Identifier(name) => name,
                        other => {
                            return Err(ParseError::UnexpectedToken {
                                expected: "attribute name".to_string(),
                                found: other.describe(),
                                position: self.current_position,
                            });
                        }
                    };
                    expr = Expr::Attribute {
                        value: expr.boxed(),
                        attr,
                    };
                }
                Token::LParen => {
                    self.advance()?;
                    expr = self.nested(|p| p.parse_call(expr))?;
                }
                Token::LBracket => {
                    self.advance()?;
                    let index = self.nested(|p| p.parse_subscript())?;
                    expr = Expr::Subscript {
                        value: expr.boxed(),
                        index: index.boxed(),
                    };
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_call(&mut self, func: Expr) -> Result<Expr, ParseError> {
        let mut args = vec![];
        let mut keywords = vec![];

        while !self.check(&Token::RParen) {
            if self.check(&Token::DoubleStar) {
                return Err(self.invalid("keyword argument unpacking is not supported"));
            }

            let arg = self.parse_star_or_expression()?;

            if self.check(&Token::For) {
                // sum(x for x in xs): a bare generator as the only argument
                let generators = self.parse_comprehension_clauses()?;
                args.push(Expr::GeneratorExp {
                    elt: arg.boxed(),
                    generators,
                });
            } else if self.eat(&Token::Assign)? {
                let Expr::Name(name) = &arg else {
                    return Err(self.invalid("keyword argument name must be an identifier"));
                };
                let name = name.clone();
                let value = self.parse_expression()?;
                keywords.push(Keyword { arg: name, value });
            } else if !keywords.is_empty() {
                return Err(self.invalid("positional argument follows keyword argument"));
            } else {
                args.push(arg);
            }

            if !self.eat(&Token::Comma)? {
                break;
            }
        }

        self.expect(Token::RParen)?;
        Ok(Expr::Call {
            func: func.boxed(),
            args,
            keywords,
        })
    }

    fn parse_subscript(&mut self) -> Result<Expr, ParseError> {
        let first = self.parse_slice_item()?;
        let index = if self.check(&Token::Comma) {
            let mut items = vec![first];
            while self.eat(&Token::Comma)? {
                if self.check(&Token::RBracket) {
                    break;
                }
                items.push(self.parse_slice_item()?);
            }
            Expr::Tuple(items)
        } else {
            first
        };
        self.expect(Token::RBracket)?;
        Ok(index)
    }

    fn parse_slice_item(&mut self) -> Result<Expr, ParseError> {
        let lower = if self.check(&Token::Colon) {
            None
        } else {
            let expr = self.parse_expression()?;
            if !self.check(&Token::Colon) {
                return Ok(expr);
            }
            Some(expr.boxed())
        };

        self.expect(Token::Colon)?;
        let upper = self.parse_optional_slice_bound()?;
        let step = if self.eat(&Token::Colon)? {
            self.parse_optional_slice_bound()?
        } else {
            None
        };

        Ok(Expr::Slice { lower, upper, step })
    }

    fn parse_optional_slice_bound(&mut self) -> Result<Option<Box<Expr>>, ParseError> {
        if matches!(
            self.current_token,
            Token::Colon | Token::Comma | Token::RBracket
        ) {
            Ok(None)
        } else {
            Ok(Some(self.parse_expression()?.boxed()))
        }
    }

    /// Parse atoms: literals, names, and bracketed displays
    fn parse_atom(&mut self) -> Result<Expr, ParseError> {
        match self.current_token {
            Token::Integer(_)
            | Token::BigInteger(_)
            | Token::Float(_)
            | Token::Boolean(_)
            | Token::None
            | Token::Identifier(_) => match self.bump()? {
                Token::Integer(n) => Ok(Expr::Constant(Value::Integer(n))),
                Token::BigInteger(n) => Ok(Expr::Constant(Value::from_bigint(n))),
                Token::Float(n) => Ok(Expr::Constant(Value::Float(n))),
                Token::Boolean(b) => Ok(Expr::Constant(Value::Boolean(b))),
                Token::Identifier(name) => Ok(Expr::Name(name)),
                _ => Ok(Expr::Constant(Value::Null)),
            },
            Token::String(_) => {
                // Adjacent literals concatenate: 'a' "b" == 'ab'
                let mut text = String::new();
                while let Token::String(_) = self.current_token {
                    if let Token::String(s) = self.bump()? {
                        text.push_str(&s);
                    }
                }
                Ok(Expr::Constant(Value::String(text)))
            }
            Token::LParen => {
                self.advance()?;
                self.nested(|p| p.parse_parenthesized())
            }
            Token::LBracket => {
                self.advance()?;
                self.nested(|p| p.parse_list_display())
            }
            Token::LBrace => {
                self.advance()?;
                self.nested(|p| p.parse_brace_display())
            }
            _ => Err(self.unexpected("an expression")),
        }
    }

    fn parse_parenthesized(&mut self) -> Result<Expr, ParseError> {
        if self.eat(&Token::RParen)? {
            return Ok(Expr::Tuple(vec![]));
        }

        let first = self.parse_star_or_expression()?;

        if self.check(&Token::For) {
            let generators = self.parse_comprehension_clauses()?;
            self.expect(Token::RParen)?;
            return Ok(Expr::GeneratorExp {
                elt: first.boxed(),
                generators,
            });
        }

        if !self.check(&Token::Comma) {
            self.expect(Token::RParen)?;
            return Ok(first);
        }

        let mut items = vec![first];
        while self.eat(&Token::Comma)? {
            if self.check(&Token::RParen) {
                break;
            }
            items.push(self.parse_star_or_expression()?);
        }
        self.expect(Token::RParen)?;
        Ok(Expr::Tuple(items))
    }

    fn parse_list_display(&mut self) -> Result<Expr, ParseError> {
        if self.eat(&Token::RBracket)? {
            return Ok(Expr::List(vec![]));
        }

        let first = self.parse_star_or_expression()?;

        if self.check(&Token::For) {
            let generators = self.parse_comprehension_clauses()?;
            self.expect(Token::RBracket)?;
            return Ok(Expr::ListComp {
                elt: first.boxed(),
                generators,
            });
        }

        let mut elements = vec![first];
        while self.eat(&Token::Comma)? {
            if self.check(&Token::RBracket) {
                break;
            }
            elements.push(self.parse_star_or_expression()?);
        }
        self.expect(Token::RBracket)?;
        Ok(Expr::List(elements))
    }

    fn parse_brace_display(&mut self) -> Result<Expr, ParseError> {
        if self.eat(&Token::RBrace)? {
            return Ok(Expr::Dict(vec![]));
        }

        if self.check(&Token::DoubleStar) {
            return self.parse_dict_entries(None);
        }

        let first = self.parse_star_or_expression()?;
        if self.eat(&Token::Colon)? {
            let value = self.parse_expression()?;
            return self.parse_dict_entries(Some((first, value)));
        }

        if self.check(&Token::For) {
            return Err(self.invalid("set comprehensions are not supported"));
        }

        let mut items = vec![first];
        while self.eat(&Token::Comma)? {
            if self.check(&Token::RBrace) {
                break;
            }
            items.push(self.parse_star_or_expression()?);
        }
        self.expect(Token::RBrace)?;
        Ok(Expr::Set(items))
    }

    fn parse_dict_entries(&mut self, first: Option<(Expr, Expr)>) -> Result<Expr, ParseError> {
        let mut entries = vec![];
        if let Some((key, value)) = first {
            if self.check(&Token::For) {
                return Err(self.invalid("dict comprehensions are not supported"));
            }
            entries.push((Some(key), value));
            if !self.eat(&Token::Comma)? {
                self.expect(Token::RBrace)?;
                return Ok(Expr::Dict(entries));
            }
        }

        while !self.check(&Token::RBrace) {
            if self.eat(&Token::DoubleStar)? {
                entries.push((None, self.parse_bitor()?));
            } else {
                let key = self.parse_expression()?;
                self.expect(Token::Colon)?;
                entries.push((Some(key), self.parse_expression()?));
            }
            if !self.eat(&Token::Comma)? {
                break;
            }
        }
        self.expect(Token::RBrace)?;
        Ok(Expr::Dict(entries))
    }

    fn parse_comprehension_clauses(&mut self) -> Result<Vec<Comprehension>, ParseError> {
        let mut generators = vec![];
        while self.eat(&Token::For)? {
            let first = self.parse_bitor()?;
            let target = if self.check(&Token::Comma) {
                let mut names = vec![first];
                while self.eat(&Token::Comma)? {
                    if self.check(&Token::In) {
                        break;
                    }
                    names.push(self.parse_bitor()?);
                }
                Expr::Tuple(names)
            } else {
                first
            };

            self.expect(Token::In)?;
            let iter = self.parse_disjunction()?;

            let mut ifs = vec![];
            while self.eat(&Token::If)? {
                ifs.push(self.parse_disjunction()?);
            }
            generators.push(Comprehension { target, iter, ifs });
        }
        Ok(generators)
    }
}

fn binop(op: BinOp, left: Expr, right: Expr) -> Expr {
    Expr::BinOp {
        op,
        left: left.boxed(),
        right: right.boxed(),
    }
}

/// Parses `input` into a syntax tree with the default nesting limit.
pub fn parse(input: &str) -> Result<Expression, ParseError> {
    Parser::new(Lexer::new(input))?.parse()
}
