//! # Syntax tree
//!
//! This module defines the tree the parser produces and the evaluator walks.
//!
//! ## Organization
//!
//! - **[tokens]** - Lexical tokens produced by the lexer
//! - **[expressions]** - Expression nodes and the [`Expression`] root wrapper
//! - **[operators]** - Unary, binary, boolean and comparison operator kinds
//!
//! ## Supported subset
//!
//! The tree covers the full expression grammar so that anything a user can
//! write has a node. Only a subset is ever evaluated:
//!
//! | Node       | Evaluated operators                                  |
//! |------------|------------------------------------------------------|
//! | `Constant` | n/a                                                  |
//! | `List`     | n/a                                                  |
//! | `UnaryOp`  | `not`                                                |
//! | `BinOp`    | `+ - * / ** & \| ^`                                  |
//! | `BoolOp`   | `and or`                                             |
//! | `Compare`  | `== != < <= > >= is` `is not` `in` `not in`          |
//! | `Call`     | bare function name, positional arguments only        |
//!
//! Everything else (names, attributes, subscripts, lambdas, `//`, `%`,
//! unary minus, ...) is rejected when evaluation reaches it.
//!
//! ## Example
//!
//! ```text
//! round(sum([1.25, None, 2]) * 2, 1) >= 6 and 'a' in ['a', 'b']
//! ```
pub mod expressions;
pub mod operators;
pub mod tokens;

pub use expressions::{Comprehension, Expr, Expression, Keyword};
pub use operators::{BinOp, BoolOp, CmpOp, UnaryOp};
pub use tokens::Token;
