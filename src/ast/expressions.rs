use std::mem;

use crate::ast::{BinOp, BoolOp, CmpOp, UnaryOp};
use crate::operations;
use crate::value::Value;

/// Root of a parsed expression.
///
/// The parser always wraps the top-level node in an `Expression`, and
/// evaluation always starts here.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub body: Expr,
}

/// Keyword argument in a call (`name=value`).
#[derive(Debug, Clone, PartialEq)]
pub struct Keyword {
    pub arg: String,
    pub value: Expr,
}

/// One `for target in iter if cond...` clause of a comprehension.
#[derive(Debug, Clone, PartialEq)]
pub struct Comprehension {
    pub target: Expr,
    pub iter: Expr,
    pub ifs: Vec<Expr>,
}

/// Syntax-tree node for a single expression.
///
/// The parser produces the whole expression grammar, including kinds the
/// evaluator refuses to run. Only `Constant`, `List`, `UnaryOp`, `BinOp`,
/// `BoolOp`, `Compare` and `Call` (on a bare name) are evaluated; every
/// other kind fails closed.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Literal integer, float, string, boolean or null
    ///
    /// # Examples
    /// ```text
    /// 42
    /// 1.5e3
    /// 'hello'
    /// True
    /// None
    /// ```
    Constant(Value),

    /// List literal
    ///
    /// # Example
    /// ```text
    /// [1, 2, 3]
    /// ```
    List(Vec<Expr>),

    /// Unary operation (`not a`, `-a`, `+a`, `~a`)
    UnaryOp { op: UnaryOp, operand: Box<Expr> },

    /// Binary arithmetic or bitwise operation
    BinOp {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    /// Flattened boolean chain; `a and b and c` is one node with three values
    BoolOp { op: BoolOp, values: Vec<Expr> },

    /// Comparison chain; `a < b <= c` has `ops = [Lt, LtE]` and
    /// `comparators = [b, c]`
    Compare {
        left: Box<Expr>,
        ops: Vec<CmpOp>,
        comparators: Vec<Expr>,
    },

    /// Function call
    ///
    /// # Examples
    /// ```text
    /// round(1.234, 1)
    /// sum([1, 2, 3])
    /// ```
    Call {
        func: Box<Expr>,
        args: Vec<Expr>,
        keywords: Vec<Keyword>,
    },

    // Parsed but never evaluated
    /// Bare identifier
    Name(String),

    /// Attribute access (`a.b`)
    Attribute { value: Box<Expr>, attr: String },

    /// Subscript (`a[i]`, `a[1:2]`)
    Subscript { value: Box<Expr>, index: Box<Expr> },

    /// Slice inside a subscript (`lower:upper:step`)
    Slice {
        lower: Option<Box<Expr>>,
        upper: Option<Box<Expr>>,
        step: Option<Box<Expr>>,
    },

    /// Tuple (`(1, 2)`, `1,`)
    Tuple(Vec<Expr>),

    /// Dict display; a `None` key marks `**mapping` unpacking
    Dict(Vec<(Option<Expr>, Expr)>),

    /// Set display (`{1, 2}`)
    Set(Vec<Expr>),

    /// Anonymous function (`lambda x: x`)
    Lambda { params: Vec<String>, body: Box<Expr> },

    /// Conditional expression (`a if cond else b`)
    IfExp {
        test: Box<Expr>,
        body: Box<Expr>,
        orelse: Box<Expr>,
    },

    /// Starred operand (`*items`)
    Starred(Box<Expr>),

    /// List comprehension (`[x for x in y]`)
    ListComp {
        elt: Box<Expr>,
        generators: Vec<Comprehension>,
    },

    /// Generator expression (`(x for x in y)`)
    GeneratorExp {
        elt: Box<Expr>,
        generators: Vec<Comprehension>,
    },
}

impl Expr {
    /// Node-kind name reported in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Expr::Constant(_) => "Constant",
            Expr::List(_) => "List",
            Expr::UnaryOp { .. } => "UnaryOp",
            Expr::BinOp { .. } => "BinOp",
            Expr::BoolOp { .. } => "BoolOp",
            Expr::Compare { .. } => "Compare",
            Expr::Call { .. } => "Call",
            Expr::Name(_) => "Name",
            Expr::Attribute { .. } => "Attribute",
            Expr::Subscript { .. } => "Subscript",
            Expr::Slice { .. } => "Slice",
            Expr::Tuple(_) => "Tuple",
            Expr::Dict(_) => "Dict",
            Expr::Set(_) => "Set",
            Expr::Lambda { .. } => "Lambda",
            Expr::IfExp { .. } => "IfExp",
            Expr::Starred(_) => "Starred",
            Expr::ListComp { .. } => "ListComp",
            Expr::GeneratorExp { .. } => "GeneratorExp",
        }
    }

    pub(crate) fn boxed(self) -> Box<Expr> {
        Box::new(self)
    }
}

impl Expression {
    pub fn new(body: Expr) -> Self {
        Expression { body }
    }

    /// Returns the kind of the first node (depth-first, left to right) that
    /// evaluation would reject, without evaluating anything.
    ///
    /// This only looks at the shape of the tree: an expression that passes
    /// can still fail at run time with a type or value error, or with an
    /// unknown callable name.
    pub fn first_unsupported(&self) -> Option<&'static str> {
        first_unsupported(&self.body)
    }

    pub fn is_supported(&self) -> bool {
        self.first_unsupported().is_none()
    }
}

fn first_unsupported(root: &Expr) -> Option<&'static str> {
    // Children are pushed right to left so the leftmost is visited first
    let mut pending = vec![root];
    while let Some(expr) = pending.pop() {
        match expr {
            Expr::Constant(_) => {}
            Expr::List(elements) => pending.extend(elements.iter().rev()),
            Expr::UnaryOp { op, operand } => {
                if operations::unary_handler(*op).is_err() {
                    return Some(op.kind());
                }
                pending.push(operand);
            }
            Expr::BinOp { op, left, right } => {
                if operations::binary_handler(*op).is_err() {
                    return Some(op.kind());
                }
                pending.push(right);
                pending.push(left);
            }
            Expr::BoolOp { values, .. } => pending.extend(values.iter().rev()),
            Expr::Compare {
                left, comparators, ..
            } => {
                pending.extend(comparators.iter().rev());
                pending.push(left);
            }
            Expr::Call {
                func,
                args,
                keywords,
            } => match func.as_ref() {
                Expr::Name(_) if keywords.is_empty() => pending.extend(args.iter().rev()),
                Expr::Name(_) => return Some("keyword"),
                other => return Some(other.kind()),
            },
            other => return Some(other.kind()),
        }
    }
    None
}

impl Expr {
    /// Moves every direct child onto `out`, leaving placeholders behind.
    fn detach_children(&mut self, out: &mut Vec<Expr>) {
        fn take(slot: &mut Expr, out: &mut Vec<Expr>) {
            out.push(mem::replace(slot, Expr::Constant(Value::Null)));
        }

        match self {
            Expr::Constant(_) | Expr::Name(_) => {}
            Expr::List(items)
            | Expr::Tuple(items)
            | Expr::Set(items)
            | Expr::BoolOp { values: items, .. } => out.append(items),
            Expr::UnaryOp { operand: child, .. }
            | Expr::Attribute { value: child, .. }
            | Expr::Lambda { body: child, .. }
            | Expr::Starred(child) => take(child, out),
            Expr::BinOp { left, right, .. }
            | Expr::Subscript {
                value: left,
                index: right,
            } => {
                take(left, out);
                take(right, out);
            }
            Expr::Compare {
                left, comparators, ..
            } => {
                take(left, out);
                out.append(comparators);
            }
            Expr::Call {
                func,
                args,
                keywords,
            } => {
                take(func, out);
                out.append(args);
                out.extend(keywords.drain(..).map(|keyword| keyword.value));
            }
            Expr::Slice { lower, upper, step } => {
                let bounds = [lower.take(), upper.take(), step.take()];
                out.extend(bounds.into_iter().flatten().map(|bound| *bound));
            }
            Expr::Dict(entries) => {
                for (key, value) in entries.drain(..) {
                    out.extend(key);
                    out.push(value);
                }
            }
            Expr::IfExp { test, body, orelse } => {
                take(test, out);
                take(body, out);
                take(orelse, out);
            }
            Expr::ListComp { elt, generators } | Expr::GeneratorExp { elt, generators } => {
                take(elt, out);
                for generator in generators.drain(..) {
                    out.push(generator.target);
                    out.push(generator.iter);
                    out.extend(generator.ifs);
                }
            }
        }
    }
}

/// Trees built from long operator chains are deep; dropping them node by
/// node on the heap keeps the stack flat.
impl Drop for Expr {
    fn drop(&mut self) {
        let mut pending = Vec::new();
        self.detach_children(&mut pending);
        while let Some(mut child) = pending.pop() {
            child.detach_children(&mut pending);
        }
    }
}
