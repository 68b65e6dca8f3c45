//! Structured Verilog-2001 syntax for lowered designs.
//!
//! The tree covers what the lowering produces and nothing more: one flat
//! module with ANSI-style ports, net and variable declarations, continuous
//! assignments, and `always` blocks. [`emit_verilog`](crate::emit_verilog)
//! renders it as text and [`LoweredSim`](crate::LoweredSim) executes it.
//!
//! Every value in the tree is unsigned except `integer` loop variables and
//! [`VExpr::Int`] literals, which follow the Verilog rules for signed
//! integers.

use ember_common::Bits;
use ember_ir::{BinaryOp, PortDirection, UnaryOp};

/// A lowered top-level module.
#[derive(Debug, Clone, PartialEq)]
pub struct LoweredModule {
    /// Module name, taken from the top module.
    pub name: String,
    /// Ports in declaration order, the clock first when present.
    pub ports: Vec<VPort>,
    /// Internal declarations: nets, then temporaries, then loop variables.
    pub decls: Vec<VDecl>,
    /// Continuous assignments and procedural blocks in rule order.
    pub items: Vec<VItem>,
    /// Name of the clock input, present when the design has sequential rules.
    pub clock: Option<String>,
}

impl LoweredModule {
    /// Looks up a port by name.
    pub fn port(&self, name: &str) -> Option<&VPort> {
        self.ports.iter().find(|p| p.name == name)
    }

    /// Looks up an internal declaration by name.
    pub fn decl(&self, name: &str) -> Option<&VDecl> {
        self.decls.iter().find(|d| d.name == name)
    }

    /// Number of continuous assignments.
    pub fn assign_count(&self) -> usize {
        self.items
            .iter()
            .filter(|i| matches!(i, VItem::Assign(_)))
            .count()
    }

    /// Procedural blocks in item order.
    pub fn blocks(&self) -> impl Iterator<Item = &VBlock> {
        self.items.iter().filter_map(|i| match i {
            VItem::Always(b) => Some(b),
            VItem::Assign(_) => None,
        })
    }
}

/// Whether a declared name is a net or a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    /// Driven by continuous assignment (`wire`).
    Wire,
    /// Assigned in procedural blocks (`reg`).
    Reg,
    /// A 32-bit signed loop counter (`integer`).
    Integer,
}

/// One port of the lowered module.
#[derive(Debug, Clone, PartialEq)]
pub struct VPort {
    /// Port name.
    pub name: String,
    /// Direction.
    pub direction: PortDirection,
    /// `wire` or `reg`; inputs are always `wire`.
    pub kind: VarKind,
    /// Width in bits.
    pub width: u32,
    /// Power-on value; only emitted for `output reg` ports.
    pub init: Option<Bits>,
}

/// An internal declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct VDecl {
    /// Declaration kind.
    pub kind: VarKind,
    /// Declared name.
    pub name: String,
    /// Width in bits; 32 for integers.
    pub width: u32,
    /// Power-on value of a `reg`.
    pub init: Option<Bits>,
}

/// A module-level item.
#[derive(Debug, Clone, PartialEq)]
pub enum VItem {
    /// `assign lhs = rhs;`
    Assign(VAssign),
    /// `always @(...) begin ... end`
    Always(VBlock),
}

/// A continuous assignment.
#[derive(Debug, Clone, PartialEq)]
pub struct VAssign {
    /// Written net.
    pub lhs: VLValue,
    /// Driving expression.
    pub rhs: VExpr,
}

/// What wakes a procedural block.
#[derive(Debug, Clone, PartialEq)]
pub enum Trigger {
    /// `@(a or b or ...)`; an empty list renders as `@*`.
    Signals(Vec<String>),
    /// `@(posedge clk)`.
    Posedge(String),
    /// An `initial` block, run once at time zero.
    Initial,
}

/// A procedural block.
#[derive(Debug, Clone, PartialEq)]
pub struct VBlock {
    /// Sensitivity.
    pub trigger: Trigger,
    /// Paths of the rules this block implements, emitted as a comment.
    pub rules: Vec<String>,
    /// Statements.
    pub body: Vec<VStmt>,
}

impl VBlock {
    /// Returns `true` for the clocked block.
    pub fn is_clocked(&self) -> bool {
        matches!(self.trigger, Trigger::Posedge(_))
    }
}

/// A procedural statement.
#[derive(Debug, Clone, PartialEq)]
pub enum VStmt {
    /// `lhs = rhs;` or `lhs <= rhs;`
    Assign {
        /// Destination.
        lhs: VLValue,
        /// Value.
        rhs: VExpr,
        /// `=` when `true`, `<=` otherwise.
        blocking: bool,
    },
    /// `if (cond) ... else ...`
    If {
        /// Condition; any nonzero value is true.
        cond: VExpr,
        /// Taken branch.
        then_body: Vec<VStmt>,
        /// Other branch; empty for no `else`.
        else_body: Vec<VStmt>,
    },
    /// `case (selector) ... endcase` over constant items.
    Case {
        /// The selector.
        selector: VExpr,
        /// Item width; `None` when the selector is an integer expression.
        width: Option<u32>,
        /// Arms in ascending item order.
        arms: Vec<VCaseArm>,
        /// The `default` arm.
        default: Vec<VStmt>,
    },
    /// `for (var = start; var < stop; var = var + step)` with static bounds.
    For {
        /// The `integer` loop variable.
        var: String,
        /// First value.
        start: i64,
        /// Exclusive bound.
        stop: i64,
        /// Nonzero increment; negative steps count down to `stop`.
        step: i64,
        /// Loop body.
        body: Vec<VStmt>,
    },
    /// `$fatal(1, "message");`
    Fatal {
        /// Message argument.
        message: String,
    },
}

/// One `case` arm.
#[derive(Debug, Clone, PartialEq)]
pub struct VCaseArm {
    /// The matched item.
    pub item: u64,
    /// Statements run on a match.
    pub body: Vec<VStmt>,
}

/// An assignment destination.
#[derive(Debug, Clone, PartialEq)]
pub enum VLValue {
    /// A whole net or variable.
    Ident(String),
    /// `name[index]`.
    Bit {
        /// Declared name.
        name: String,
        /// Bit position.
        index: VExpr,
    },
    /// `name[msb:lsb]`.
    Range {
        /// Declared name.
        name: String,
        /// Highest bit, inclusive.
        msb: u32,
        /// Lowest bit, inclusive.
        lsb: u32,
    },
    /// `name[lo +: width]`.
    Part {
        /// Declared name.
        name: String,
        /// Lowest bit.
        lo: VExpr,
        /// Width in bits.
        width: u32,
    },
}

impl VLValue {
    /// The declared name written into.
    pub fn name(&self) -> &str {
        match self {
            VLValue::Ident(n)
            | VLValue::Bit { name: n, .. }
            | VLValue::Range { name: n, .. }
            | VLValue::Part { name: n, .. } => n,
        }
    }
}

/// An expression.
#[derive(Debug, Clone, PartialEq)]
pub enum VExpr {
    /// A declared net, variable, or port.
    Ident(String),
    /// A sized literal, `W'hX`.
    Literal(Bits),
    /// An unsized decimal integer.
    Int(i64),
    /// A unary operator.
    Unary {
        /// The operator.
        op: UnaryOp,
        /// The operand.
        operand: Box<VExpr>,
    },
    /// A binary operator.
    Binary {
        /// The operator.
        op: BinaryOp,
        /// Left operand.
        lhs: Box<VExpr>,
        /// Right operand.
        rhs: Box<VExpr>,
    },
    /// `cond ? then_val : else_val`.
    Ternary {
        /// Selector.
        cond: Box<VExpr>,
        /// Nonzero result.
        then_val: Box<VExpr>,
        /// Zero result.
        else_val: Box<VExpr>,
    },
    /// `{a, b, ...}`; each part is self-determined.
    Concat(Vec<VExpr>),
    /// `{count{value}}`.
    Repeat {
        /// Repetition count.
        count: u32,
        /// Repeated value.
        value: Box<VExpr>,
    },
    /// `name[index]`.
    Bit {
        /// Declared name.
        name: String,
        /// Bit position.
        index: Box<VExpr>,
    },
    /// `name[msb:lsb]`.
    Range {
        /// Declared name.
        name: String,
        /// Highest bit, inclusive.
        msb: u32,
        /// Lowest bit, inclusive.
        lsb: u32,
    },
    /// `name[lo +: width]`.
    Part {
        /// Declared name.
        name: String,
        /// Lowest bit.
        lo: Box<VExpr>,
        /// Width in bits.
        width: u32,
    },
}

impl VExpr {
    /// A reference to a declared name.
    pub fn ident(name: impl Into<String>) -> Self {
        VExpr::Ident(name.into())
    }

    /// A sized literal.
    pub fn literal(width: u32, value: u64) -> Self {
        VExpr::Literal(Bits::truncated(width, value))
    }

    /// Builds a binary operation.
    pub fn binary(op: BinaryOp, lhs: VExpr, rhs: VExpr) -> Self {
        VExpr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    /// Returns `true` when evaluating the expression in a context wider than
    /// its own width gives more than its zero-extended value, so it must be
    /// braced to stay self-determined.
    pub fn widens_with_context(&self) -> bool {
        match self {
            VExpr::Unary { op, .. } => matches!(op, UnaryOp::Not | UnaryOp::Neg),
            VExpr::Binary { op, .. } => !op.is_boolean(),
            VExpr::Ternary { .. } => true,
            _ => false,
        }
    }

    /// Wraps the expression in a one-part concatenation, making it
    /// self-determined wherever it appears.
    pub fn braced(self) -> Self {
        match self {
            VExpr::Concat(_) => self,
            other => VExpr::Concat(vec![other]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_sensitivity() {
        let a = VExpr::ident("a");
        assert!(!a.widens_with_context());
        let sum = VExpr::binary(BinaryOp::Add, a.clone(), VExpr::ident("b"));
        assert!(sum.widens_with_context());
        let cmp = VExpr::binary(BinaryOp::Lt, a.clone(), VExpr::ident("b"));
        assert!(!cmp.widens_with_context());
        let braced = sum.braced();
        assert!(!braced.widens_with_context());
        assert_eq!(braced.clone().braced(), braced);
    }

    #[test]
    fn lvalue_names() {
        let lv = VLValue::Part {
            name: "y".into(),
            lo: VExpr::ident("i"),
            width: 2,
        };
        assert_eq!(lv.name(), "y");
    }
}
