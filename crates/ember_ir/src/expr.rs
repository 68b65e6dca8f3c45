//! Expression trees for update-rule bodies.
//!
//! Expressions have self-determined widths: see `ember_analyze::width` for
//! the rules. [`Expr::Int`] literals are unsized and take the width of the
//! other operand of the operator they appear under.

use crate::ids::{ArrayId, SignalId};
use ember_common::{Bits, Ident};
use serde::{Deserialize, Serialize};

/// A unary operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    /// Bitwise NOT (`~`).
    Not,
    /// Two's-complement negation (`-`).
    Neg,
    /// Logical NOT (`!`), 1 bit.
    LogicNot,
    /// Reduction AND, 1 bit.
    RedAnd,
    /// Reduction OR, 1 bit.
    RedOr,
    /// Reduction XOR, 1 bit.
    RedXor,
}

/// A binary operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    /// Addition (`+`).
    Add,
    /// Subtraction (`-`).
    Sub,
    /// Multiplication (`*`).
    Mul,
    /// Unsigned division (`/`).
    Div,
    /// Unsigned remainder (`%`).
    Rem,
    /// Bitwise AND (`&`).
    And,
    /// Bitwise OR (`|`).
    Or,
    /// Bitwise XOR (`^`).
    Xor,
    /// Logical left shift (`<<`).
    Shl,
    /// Logical right shift (`>>`).
    Shr,
    /// Equality (`==`).
    Eq,
    /// Inequality (`!=`).
    Ne,
    /// Unsigned less than (`<`).
    Lt,
    /// Unsigned less than or equal (`<=`).
    Le,
    /// Unsigned greater than (`>`).
    Gt,
    /// Unsigned greater than or equal (`>=`).
    Ge,
    /// Logical AND (`&&`).
    LogicAnd,
    /// Logical OR (`||`).
    LogicOr,
}

impl BinaryOp {
    /// Returns `true` for operators producing a 1-bit result.
    pub fn is_boolean(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq
                | BinaryOp::Ne
                | BinaryOp::Lt
                | BinaryOp::Le
                | BinaryOp::Gt
                | BinaryOp::Ge
                | BinaryOp::LogicAnd
                | BinaryOp::LogicOr
        )
    }

    /// Returns `true` for comparisons, whose operands are sized against each other.
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }

    /// Returns `true` for shifts, whose result keeps the left operand's width.
    pub fn is_shift(self) -> bool {
        matches!(self, BinaryOp::Shl | BinaryOp::Shr)
    }
}

/// An expression in a rule body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// The current value of a signal.
    Signal(SignalId),
    /// A sized constant.
    Const(Bits),
    /// An unsized integer literal.
    Int(i64),
    /// A temporary or loop variable of the enclosing rule.
    Local(Ident),
    /// A unary operation.
    Unary {
        /// The operator.
        op: UnaryOp,
        /// The operand.
        operand: Box<Expr>,
    },
    /// A binary operation.
    Binary {
        /// The operator.
        op: BinaryOp,
        /// Left operand.
        lhs: Box<Expr>,
        /// Right operand.
        rhs: Box<Expr>,
    },
    /// `cond ? then_val : else_val`; any nonzero condition selects `then_val`.
    Mux {
        /// Selector.
        cond: Box<Expr>,
        /// Value when the selector is nonzero.
        then_val: Box<Expr>,
        /// Value when the selector is zero.
        else_val: Box<Expr>,
    },
    /// Concatenation; the first part occupies the most significant bits.
    Concat(Vec<Expr>),
    /// Zero-extension (or truncation) to a fixed width.
    Zext {
        /// The value.
        value: Box<Expr>,
        /// Result width.
        width: u32,
    },
    /// Sign-extension (or truncation) to a fixed width.
    Sext {
        /// The value.
        value: Box<Expr>,
        /// Result width.
        width: u32,
    },
    /// A single-bit select.
    Index {
        /// The value selected from.
        base: Box<Expr>,
        /// Bit position; may be dynamic.
        index: Box<Expr>,
    },
    /// A half-open bit slice `base[lo:hi)`.
    Slice {
        /// The value sliced.
        base: Box<Expr>,
        /// Lowest bit, inclusive.
        lo: Box<Expr>,
        /// Highest bit, exclusive.
        hi: Box<Expr>,
    },
    /// A named field of a struct-typed value.
    Field {
        /// The struct value.
        base: Box<Expr>,
        /// The field name.
        field: Ident,
    },
    /// The element of a signal array at an index; may be dynamic.
    Element {
        /// The array.
        array: ArrayId,
        /// Element position.
        index: Box<Expr>,
    },
    /// A function call. Never supported inside rule bodies.
    Call {
        /// Callee name.
        name: Ident,
        /// Arguments.
        args: Vec<Expr>,
    },
}

impl Expr {
    /// Reads a signal.
    pub fn signal(id: SignalId) -> Self {
        Expr::Signal(id)
    }

    /// An unsized integer literal.
    pub fn int(value: i64) -> Self {
        Expr::Int(value)
    }

    /// A sized literal holding the low `width` bits of `value`.
    pub fn lit(width: u32, value: u64) -> Self {
        Expr::Const(Bits::truncated(width, value))
    }

    /// Reads a local.
    pub fn local(name: Ident) -> Self {
        Expr::Local(name)
    }

    /// Builds a unary operation.
    pub fn unary(op: UnaryOp, operand: Expr) -> Self {
        Expr::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    /// Builds a binary operation.
    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    /// Builds a multiplexer.
    pub fn mux(cond: Expr, then_val: Expr, else_val: Expr) -> Self {
        Expr::Mux {
            cond: Box::new(cond),
            then_val: Box::new(then_val),
            else_val: Box::new(else_val),
        }
    }

    /// Builds a half-open slice `self[lo:hi)`.
    pub fn slice(self, lo: Expr, hi: Expr) -> Self {
        Expr::Slice {
            base: Box::new(self),
            lo: Box::new(lo),
            hi: Box::new(hi),
        }
    }

    /// Builds a static half-open slice `self[lo:hi)`.
    pub fn bits(self, lo: i64, hi: i64) -> Self {
        self.slice(Expr::Int(lo), Expr::Int(hi))
    }

    /// Builds a bit select.
    pub fn bit(self, index: Expr) -> Self {
        Expr::Index {
            base: Box::new(self),
            index: Box::new(index),
        }
    }

    /// Builds a field access.
    pub fn field(self, field: Ident) -> Self {
        Expr::Field {
            base: Box::new(self),
            field,
        }
    }

    /// Selects an array element.
    pub fn element(array: ArrayId, index: Expr) -> Self {
        Expr::Element {
            array,
            index: Box::new(index),
        }
    }

    /// Zero-extends or truncates to `width`.
    pub fn zext(self, width: u32) -> Self {
        Expr::Zext {
            value: Box::new(self),
            width,
        }
    }

    /// Sign-extends or truncates to `width`.
    pub fn sext(self, width: u32) -> Self {
        Expr::Sext {
            value: Box::new(self),
            width,
        }
    }

    /// Returns the direct subexpressions in evaluation order.
    pub fn children(&self) -> Vec<&Expr> {
        match self {
            Expr::Signal(_) | Expr::Const(_) | Expr::Int(_) | Expr::Local(_) => Vec::new(),
            Expr::Unary { operand, .. } => vec![operand.as_ref()],
            Expr::Binary { lhs, rhs, .. } => vec![lhs.as_ref(), rhs.as_ref()],
            Expr::Mux {
                cond,
                then_val,
                else_val,
            } => vec![cond.as_ref(), then_val.as_ref(), else_val.as_ref()],
            Expr::Concat(parts) => parts.iter().collect(),
            Expr::Zext { value, .. } | Expr::Sext { value, .. } => vec![value.as_ref()],
            Expr::Index { base, index } => vec![base.as_ref(), index.as_ref()],
            Expr::Slice { base, lo, hi } => vec![base.as_ref(), lo.as_ref(), hi.as_ref()],
            Expr::Field { base, .. } => vec![base.as_ref()],
            Expr::Element { index, .. } => vec![index.as_ref()],
            Expr::Call { args, .. } => args.iter().collect(),
        }
    }

    /// Visits this expression and all subexpressions in pre-order.
    pub fn walk(&self, f: &mut impl FnMut(&Expr)) {
        f(self);
        for child in self.children() {
            child.walk(f);
        }
    }

    /// Returns `true` if the expression mentions local `name`.
    pub fn mentions_local(&self, name: Ident) -> bool {
        let mut found = false;
        self.walk(&mut |e| {
            if *e == Expr::Local(name) {
                found = true;
            }
        });
        found
    }
}

impl From<SignalId> for Expr {
    fn from(id: SignalId) -> Self {
        Expr::Signal(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operator_classes() {
        assert!(BinaryOp::Lt.is_boolean());
        assert!(BinaryOp::Lt.is_comparison());
        assert!(BinaryOp::LogicOr.is_boolean());
        assert!(!BinaryOp::LogicOr.is_comparison());
        assert!(BinaryOp::Shr.is_shift());
        assert!(!BinaryOp::Add.is_boolean());
    }

    #[test]
    fn walk_visits_all_nodes() {
        let a = SignalId::from_raw(0);
        let b = SignalId::from_raw(1);
        let e = Expr::mux(
            Expr::binary(BinaryOp::Lt, a.into(), b.into()),
            Expr::signal(a),
            Expr::signal(b).bits(0, 4),
        );
        let mut signals = Vec::new();
        let mut count = 0;
        e.walk(&mut |n| {
            count += 1;
            if let Expr::Signal(s) = n {
                signals.push(*s);
            }
        });
        assert_eq!(signals, vec![a, b, a, b]);
        assert_eq!(count, 9);
    }

    #[test]
    fn mentions_local() {
        let i = Ident::from_raw(5);
        let e = Expr::signal(SignalId::from_raw(0)).bit(Expr::binary(
            BinaryOp::Add,
            Expr::local(i),
            Expr::int(1),
        ));
        assert!(e.mentions_local(i));
        assert!(!e.mentions_local(Ident::from_raw(6)));
    }

    #[test]
    fn serde_roundtrip() {
        let e = Expr::element(ArrayId::from_raw(2), Expr::lit(2, 1)).zext(16);
        let json = serde_json::to_string(&e).unwrap();
        let back: Expr = serde_json::from_str(&json).unwrap();
        assert_eq!(e, back);
    }
}
