//! Statements and assignment targets for update-rule bodies.

use crate::expr::Expr;
use crate::ids::{ArrayId, SignalId};
use ember_common::Ident;
use serde::{Deserialize, Serialize};

/// The destination of an assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Target {
    /// A whole signal.
    Signal(SignalId),
    /// A temporary of the enclosing rule.
    Local(Ident),
    /// One bit of a target.
    Index {
        /// The target written into.
        base: Box<Target>,
        /// Bit position; may be dynamic.
        index: Expr,
    },
    /// A half-open bit range `[lo:hi)` of a target.
    Slice {
        /// The target written into.
        base: Box<Target>,
        /// Lowest bit, inclusive.
        lo: Expr,
        /// Highest bit, exclusive.
        hi: Expr,
    },
    /// A named field of a struct-typed target.
    Field {
        /// The struct target.
        base: Box<Target>,
        /// The field name.
        field: Ident,
    },
    /// An element of a signal array; the index may be dynamic.
    Element {
        /// The array.
        array: ArrayId,
        /// Element position.
        index: Expr,
    },
}

impl Target {
    /// A whole signal.
    pub fn signal(id: SignalId) -> Self {
        Target::Signal(id)
    }

    /// A local temporary.
    pub fn local(name: Ident) -> Self {
        Target::Local(name)
    }

    /// An array element.
    pub fn element(array: ArrayId, index: Expr) -> Self {
        Target::Element { array, index }
    }

    /// The half-open range `self[lo:hi)`.
    pub fn slice(self, lo: Expr, hi: Expr) -> Self {
        Target::Slice {
            base: Box::new(self),
            lo,
            hi,
        }
    }

    /// The static half-open range `self[lo:hi)`.
    pub fn bits(self, lo: i64, hi: i64) -> Self {
        self.slice(Expr::Int(lo), Expr::Int(hi))
    }

    /// A single bit of `self`.
    pub fn bit(self, index: Expr) -> Self {
        Target::Index {
            base: Box::new(self),
            index,
        }
    }

    /// A struct field of `self`.
    pub fn field(self, field: Ident) -> Self {
        Target::Field {
            base: Box::new(self),
            field,
        }
    }

    /// Visits every expression embedded in the target (indices and bounds).
    pub fn walk_exprs(&self, f: &mut impl FnMut(&Expr)) {
        match self {
            Target::Signal(_) | Target::Local(_) => {}
            Target::Index { base, index } => {
                base.walk_exprs(f);
                index.walk(f);
            }
            Target::Slice { base, lo, hi } => {
                base.walk_exprs(f);
                lo.walk(f);
                hi.walk(f);
            }
            Target::Field { base, .. } => base.walk_exprs(f),
            Target::Element { index, .. } => index.walk(f),
        }
    }
}

impl From<SignalId> for Target {
    fn from(id: SignalId) -> Self {
        Target::Signal(id)
    }
}

/// A statement in a rule body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stmt {
    /// Immediate write, visible to later reads in the same cycle.
    Assign {
        /// Destination.
        target: Target,
        /// Value.
        value: Expr,
    },
    /// Deferred write, visible after the next commit.
    AssignNext {
        /// Destination.
        target: Target,
        /// Value.
        value: Expr,
    },
    /// Declares (or re-assigns) a rule-local temporary.
    Let {
        /// Temporary name.
        name: Ident,
        /// Explicit width; inferred from `value` when absent.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        width: Option<u32>,
        /// Initial value.
        value: Expr,
    },
    /// Conditional.
    If {
        /// Condition; any nonzero value is true.
        cond: Expr,
        /// Taken branch.
        then_body: Box<Stmt>,
        /// Optional else branch.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        else_body: Option<Box<Stmt>>,
    },
    /// Counted loop over `range(start, stop, step)`; bounds must be static.
    For {
        /// Loop variable.
        var: Ident,
        /// First value.
        start: Expr,
        /// Exclusive bound.
        stop: Expr,
        /// Increment; nonzero, may be negative.
        step: i64,
        /// Loop body.
        body: Box<Stmt>,
    },
    /// Sequence of statements.
    Block(Vec<Stmt>),
    /// Condition-controlled loop. Never supported inside rule bodies.
    While {
        /// Condition.
        cond: Expr,
        /// Body.
        body: Box<Stmt>,
    },
    /// No operation.
    Nop,
}

impl Stmt {
    /// Immediate assignment.
    pub fn assign(target: impl Into<Target>, value: impl Into<Expr>) -> Self {
        Stmt::Assign {
            target: target.into(),
            value: value.into(),
        }
    }

    /// Deferred assignment.
    pub fn assign_next(target: impl Into<Target>, value: impl Into<Expr>) -> Self {
        Stmt::AssignNext {
            target: target.into(),
            value: value.into(),
        }
    }

    /// Temporary with inferred width.
    pub fn let_(name: Ident, value: Expr) -> Self {
        Stmt::Let {
            name,
            width: None,
            value,
        }
    }

    /// Temporary with explicit width.
    pub fn let_sized(name: Ident, width: u32, value: Expr) -> Self {
        Stmt::Let {
            name,
            width: Some(width),
            value,
        }
    }

    /// `if cond { then_body }`.
    pub fn if_then(cond: Expr, then_body: Stmt) -> Self {
        Stmt::If {
            cond,
            then_body: Box::new(then_body),
            else_body: None,
        }
    }

    /// `if cond { then_body } else { else_body }`.
    pub fn if_else(cond: Expr, then_body: Stmt, else_body: Stmt) -> Self {
        Stmt::If {
            cond,
            then_body: Box::new(then_body),
            else_body: Some(Box::new(else_body)),
        }
    }

    /// `for var in range(start, stop)`.
    pub fn for_range(var: Ident, start: i64, stop: i64, body: Stmt) -> Self {
        Stmt::for_step(var, Expr::Int(start), Expr::Int(stop), 1, body)
    }

    /// `for var in range(start, stop, step)`.
    pub fn for_step(var: Ident, start: Expr, stop: Expr, step: i64, body: Stmt) -> Self {
        Stmt::For {
            var,
            start,
            stop,
            step,
            body: Box::new(body),
        }
    }

    /// Sequence of statements.
    pub fn block(stmts: Vec<Stmt>) -> Self {
        Stmt::Block(stmts)
    }

    /// Returns the direct child statements.
    pub fn children(&self) -> Vec<&Stmt> {
        match self {
            Stmt::If {
                then_body,
                else_body,
                ..
            } => {
                let mut v = vec![then_body.as_ref()];
                if let Some(e) = else_body {
                    v.push(e.as_ref());
                }
                v
            }
            Stmt::For { body, .. } | Stmt::While { body, .. } => vec![body.as_ref()],
            Stmt::Block(stmts) => stmts.iter().collect(),
            _ => Vec::new(),
        }
    }

    /// Visits this statement and all nested statements in pre-order.
    pub fn walk(&self, f: &mut impl FnMut(&Stmt)) {
        f(self);
        for child in self.children() {
            child.walk(f);
        }
    }

    /// Visits every expression in this statement tree, including target
    /// indices, loop bounds, and conditions.
    pub fn walk_exprs(&self, f: &mut impl FnMut(&Expr)) {
        self.walk(&mut |stmt| match stmt {
            Stmt::Assign { target, value } | Stmt::AssignNext { target, value } => {
                target.walk_exprs(f);
                value.walk(f);
            }
            Stmt::Let { value, .. } => value.walk(f),
            Stmt::If { cond, .. } | Stmt::While { cond, .. } => cond.walk(f),
            Stmt::For { start, stop, .. } => {
                start.walk(f);
                stop.walk(f);
            }
            Stmt::Block(_) | Stmt::Nop => {}
        });
    }
}
