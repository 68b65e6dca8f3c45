//! Static width inference for rule expressions.
//!
//! Widths are self-determined. Arithmetic and bitwise operators take the
//! wider operand's width, shifts keep the left operand's width, and
//! comparisons, logical operators and reductions produce one bit. Unsized
//! integers ([`Expr::Int`] and loop variables) take the width of the sized
//! operand they meet; an expression made only of unsized integers stays
//! unsized and folds to an `i64`.

use ember_common::Ident;
use ember_ir::{BinaryOp, Design, Expr, FieldInfo, Target, TypeId, UnaryOp};

/// The static width of an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    /// A fixed number of bits.
    Sized(u32),
    /// An unsized integer.
    Unsized,
}

impl Width {
    /// Returns the bit count of a sized width.
    pub fn bits(self) -> Option<u32> {
        match self {
            Width::Sized(w) => Some(w),
            Width::Unsized => None,
        }
    }

    /// Width of an arithmetic or bitwise combination of two operands.
    pub fn max(self, other: Width) -> Width {
        match (self, other) {
            (Width::Sized(a), Width::Sized(b)) => Width::Sized(a.max(b)),
            (Width::Sized(a), Width::Unsized) | (Width::Unsized, Width::Sized(a)) => {
                Width::Sized(a)
            }
            (Width::Unsized, Width::Unsized) => Width::Unsized,
        }
    }
}

/// Why a width could not be computed. Converted to an
/// [`AnalyzeError`](crate::AnalyzeError) by the caller, which knows the rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WidthError {
    /// The width depends on run-time values.
    Ambiguous(String),
    /// The expression is outside the supported subset.
    Unsupported(String),
    /// A struct has no field of this name.
    UnknownField(String),
}

/// Names visible inside a rule body besides signals.
pub trait LocalScope {
    /// Declared width of a temporary, if one with this name exists.
    fn local_width(&self, name: Ident) -> Option<u32>;

    /// Returns `true` if `name` is an enclosing loop variable.
    fn is_loop_var(&self, name: Ident) -> bool;
}

/// Folds an expression built only from unsized integers.
///
/// `bindings` supplies loop variable values. Returns `None` when the
/// expression references anything else or the arithmetic overflows.
pub fn fold_int(expr: &Expr, bindings: &dyn Fn(Ident) -> Option<i64>) -> Option<i64> {
    match expr {
        Expr::Int(v) => Some(*v),
        Expr::Local(name) => bindings(*name),
        Expr::Unary { op, operand } => fold_unary(*op, fold_int(operand, bindings)?),
        Expr::Binary { op, lhs, rhs } => {
            fold_binary(*op, fold_int(lhs, bindings)?, fold_int(rhs, bindings)?)
        }
        Expr::Mux {
            cond,
            then_val,
            else_val,
        } => {
            if fold_int(cond, bindings)? != 0 {
                fold_int(then_val, bindings)
            } else {
                fold_int(else_val, bindings)
            }
        }
        _ => None,
    }
}

/// Applies a unary operator to an unsized integer.
pub fn fold_unary(op: UnaryOp, v: i64) -> Option<i64> {
    match op {
        UnaryOp::Not => Some(!v),
        UnaryOp::Neg => v.checked_neg(),
        UnaryOp::LogicNot => Some(i64::from(v == 0)),
        UnaryOp::RedAnd | UnaryOp::RedOr | UnaryOp::RedXor => None,
    }
}

/// Applies a binary operator to two unsized integers.
///
/// Returns `None` on overflow, division by zero, or an out-of-range shift.
pub fn fold_binary(op: BinaryOp, a: i64, b: i64) -> Option<i64> {
    match op {
        BinaryOp::Add => a.checked_add(b),
        BinaryOp::Sub => a.checked_sub(b),
        BinaryOp::Mul => a.checked_mul(b),
        BinaryOp::Div => a.checked_div(b),
        BinaryOp::Rem => a.checked_rem(b),
        BinaryOp::And => Some(a & b),
        BinaryOp::Or => Some(a | b),
        BinaryOp::Xor => Some(a ^ b),
        BinaryOp::Shl => {
            let shift = u32::try_from(b).ok().filter(|s| *s < 63)?;
            let shifted = a.checked_shl(shift)?;
            (shifted >> shift == a).then_some(shifted)
        }
        BinaryOp::Shr => u32::try_from(b)
            .ok()
            .map(|s| if s >= 64 { a >> 63 } else { a >> s }),
        BinaryOp::Eq => Some(i64::from(a == b)),
        BinaryOp::Ne => Some(i64::from(a != b)),
        BinaryOp::Lt => Some(i64::from(a < b)),
        BinaryOp::Le => Some(i64::from(a <= b)),
        BinaryOp::Gt => Some(i64::from(a > b)),
        BinaryOp::Ge => Some(i64::from(a >= b)),
        BinaryOp::LogicAnd => Some(i64::from(a != 0 && b != 0)),
        BinaryOp::LogicOr => Some(i64::from(a != 0 || b != 0)),
    }
}

/// Smallest width that holds a non-negative integer (at least 1).
pub fn min_width(value: u64) -> u32 {
    (64 - value.leading_zeros()).max(1)
}

fn no_bindings(_: Ident) -> Option<i64> {
    None
}

/// Width of the slice `[lo:hi)` when it does not depend on run-time values.
///
/// Either both bounds are integer constants, or one bound is the other plus
/// a constant (`[e : e + k)` or `[e - k : e)`), which keeps the width fixed
/// even when `e` varies.
pub fn static_slice_width(lo: &Expr, hi: &Expr) -> Option<u32> {
    if let (Some(l), Some(h)) = (fold_int(lo, &no_bindings), fold_int(hi, &no_bindings)) {
        return if l >= 0 && h > l {
            u32::try_from(h - l).ok()
        } else {
            None
        };
    }
    let offset = match hi {
        Expr::Binary {
            op: BinaryOp::Add,
            lhs,
            rhs,
        } if **lhs == *lo => fold_int(rhs, &no_bindings),
        Expr::Binary {
            op: BinaryOp::Add,
            lhs,
            rhs,
        } if **rhs == *lo => fold_int(lhs, &no_bindings),
        _ => None,
    }
    .or_else(|| match lo {
        Expr::Binary {
            op: BinaryOp::Sub,
            lhs,
            rhs,
        } if **lhs == *hi => fold_int(rhs, &no_bindings),
        _ => None,
    })?;
    if offset > 0 {
        u32::try_from(offset).ok()
    } else {
        None
    }
}

/// Struct or bit-vector type of a value that names storage directly.
pub fn expr_type(design: &Design, expr: &Expr) -> Option<TypeId> {
    match expr {
        Expr::Signal(s) => Some(design.signals.try_get(*s)?.ty),
        Expr::Element { array, .. } => element_type(design, *array),
        Expr::Field { base, field } => {
            let ty = expr_type(design, base)?;
            Some(design.types.field(ty, *field)?.ty)
        }
        _ => None,
    }
}

/// Type of an assignment target, `None` for temporaries and bit ranges.
pub fn target_type(design: &Design, target: &Target) -> Option<TypeId> {
    match target {
        Target::Signal(s) => Some(design.signals.try_get(*s)?.ty),
        Target::Element { array, .. } => element_type(design, *array),
        Target::Field { base, field } => {
            let ty = target_type(design, base)?;
            Some(design.types.field(ty, *field)?.ty)
        }
        Target::Local(_) | Target::Index { .. } | Target::Slice { .. } => None,
    }
}

fn element_type(design: &Design, array: ember_ir::ArrayId) -> Option<TypeId> {
    let first = *design.arrays.try_get(array)?.elements.first()?;
    Some(design.signals.try_get(first)?.ty)
}

/// Looks up `field` in the struct type `base`.
pub fn resolve_field(
    design: &Design,
    base: Option<TypeId>,
    field: Ident,
) -> Result<FieldInfo, WidthError> {
    let name = design.name(field);
    let Some(ty) = base else {
        return Err(WidthError::Unsupported(format!(
            "field access `.{name}` on a value that is not a struct signal"
        )));
    };
    if !matches!(design.types.get(ty), ember_ir::Type::Struct { .. }) {
        return Err(WidthError::Unsupported(format!(
            "field access `.{name}` on a bit-vector value"
        )));
    }
    design
        .types
        .field(ty, field)
        .ok_or_else(|| WidthError::UnknownField(name.to_string()))
}

/// Computes the self-determined width of an expression.
pub fn expr_width(
    design: &Design,
    scope: &dyn LocalScope,
    expr: &Expr,
) -> Result<Width, WidthError> {
    let width = |e: &Expr| expr_width(design, scope, e);
    match expr {
        Expr::Signal(s) => Ok(Width::Sized(design.signal_width(*s))),
        Expr::Const(bits) => Ok(Width::Sized(bits.width())),
        Expr::Int(_) => Ok(Width::Unsized),
        Expr::Local(name) => {
            if scope.is_loop_var(*name) {
                Ok(Width::Unsized)
            } else {
                scope.local_width(*name).map(Width::Sized).ok_or_else(|| {
                    WidthError::Unsupported(format!(
                        "use of undeclared temporary `{}`",
                        design.name(*name)
                    ))
                })
            }
        }
        Expr::Unary { op, operand } => {
            let inner = width(operand)?;
            match op {
                UnaryOp::Not | UnaryOp::Neg | UnaryOp::LogicNot if inner == Width::Unsized => {
                    Ok(Width::Unsized)
                }
                UnaryOp::Not | UnaryOp::Neg => Ok(inner),
                UnaryOp::LogicNot => Ok(Width::Sized(1)),
                UnaryOp::RedAnd | UnaryOp::RedOr | UnaryOp::RedXor => match inner {
                    Width::Sized(_) => Ok(Width::Sized(1)),
                    Width::Unsized => Err(WidthError::Ambiguous(
                        "reduction of an unsized integer".into(),
                    )),
                },
            }
        }
        Expr::Binary { op, lhs, rhs } => {
            let (a, b) = (width(lhs)?, width(rhs)?);
            if a == Width::Unsized && b == Width::Unsized {
                Ok(Width::Unsized)
            } else if op.is_boolean() {
                Ok(Width::Sized(1))
            } else if op.is_shift() {
                match a {
                    Width::Sized(w) => Ok(Width::Sized(w)),
                    Width::Unsized => Err(WidthError::Ambiguous(
                        "unsized integer shifted by a sized amount".into(),
                    )),
                }
            } else {
                Ok(a.max(b))
            }
        }
        Expr::Mux {
            cond,
            then_val,
            else_val,
        } => {
            width(cond)?;
            Ok(width(then_val)?.max(width(else_val)?))
        }
        Expr::Concat(parts) => {
            if parts.is_empty() {
                return Err(WidthError::Unsupported("empty concatenation".into()));
            }
            let mut total: u32 = 0;
            for part in parts {
                match width(part)? {
                    Width::Sized(w) => total += w,
                    Width::Unsized => {
                        return Err(WidthError::Ambiguous(
                            "unsized integer inside a concatenation".into(),
                        ))
                    }
                }
            }
            Ok(Width::Sized(total))
        }
        Expr::Zext { value, width: w } | Expr::Sext { value, width: w } => {
            width(value)?;
            if *w == 0 {
                return Err(WidthError::Unsupported("extension to zero bits".into()));
            }
            Ok(Width::Sized(*w))
        }
        Expr::Index { base, index } => {
            if width(base)? == Width::Unsized {
                return Err(WidthError::Ambiguous(
                    "bit select of an unsized integer".into(),
                ));
            }
            width(index)?;
            Ok(Width::Sized(1))
        }
        Expr::Slice { base, lo, hi } => {
            if width(base)? == Width::Unsized {
                return Err(WidthError::Ambiguous("slice of an unsized integer".into()));
            }
            width(lo)?;
            width(hi)?;
            static_slice_width(lo, hi)
                .map(Width::Sized)
                .ok_or_else(|| {
                    WidthError::Ambiguous(
                        "slice width cannot be determined statically".into(),
                    )
                })
        }
        Expr::Field { base, field } => {
            width(base)?;
            let info = resolve_field(design, expr_type(design, base), *field)?;
            Ok(Width::Sized(info.width))
        }
        Expr::Element { array, index } => {
            width(index)?;
            let ty = element_type(design, *array).ok_or_else(|| {
                WidthError::Unsupported(format!(
                    "empty signal array `{}`",
                    design.array_path(*array)
                ))
            })?;
            Ok(Width::Sized(design.types.bit_width(ty)))
        }
        Expr::Call { name, .. } => Err(WidthError::Unsupported(format!(
            "call to `{}`",
            design.name(*name)
        ))),
    }
}

/// Computes the width of an assignment target.
pub fn target_width(
    design: &Design,
    scope: &dyn LocalScope,
    target: &Target,
) -> Result<u32, WidthError> {
    match target {
        Target::Signal(s) => Ok(design.signal_width(*s)),
        Target::Local(name) => {
            if scope.is_loop_var(*name) {
                return Err(WidthError::Unsupported(format!(
                    "assignment to loop variable `{}`",
                    design.name(*name)
                )));
            }
            scope.local_width(*name).ok_or_else(|| {
                WidthError::Unsupported(format!(
                    "assignment to undeclared temporary `{}`",
                    design.name(*name)
                ))
            })
        }
        Target::Index { base, .. } => {
            target_width(design, scope, base)?;
            Ok(1)
        }
        Target::Slice { base, lo, hi } => {
            target_width(design, scope, base)?;
            static_slice_width(lo, hi).ok_or_else(|| {
                WidthError::Ambiguous("slice width cannot be determined statically".into())
            })
        }
        Target::Field { base, field } => {
            target_width(design, scope, base)?;
            Ok(resolve_field(design, target_type(design, base), *field)?.width)
        }
        Target::Element { array, .. } => element_type(design, *array)
            .map(|ty| design.types.bit_width(ty))
            .ok_or_else(|| {
                WidthError::Unsupported(format!(
                    "empty signal array `{}`",
                    design.array_path(*array)
                ))
            }),
    }
}

/// Returns `true` when values assigned to `target` are sign-extended.
pub fn target_signed(design: &Design, target: &Target) -> bool {
    target_type(design, target).is_some_and(|ty| design.types.is_signed(ty))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_common::Bits;
    use ember_ir::DesignBuilder;
    use std::collections::HashMap;

    struct Scope {
        temps: HashMap<Ident, u32>,
        loops: Vec<Ident>,
    }

    impl LocalScope for Scope {
        fn local_width(&self, name: Ident) -> Option<u32> {
            self.temps.get(&name).copied()
        }

        fn is_loop_var(&self, name: Ident) -> bool {
            self.loops.contains(&name)
        }
    }

    fn empty() -> Scope {
        Scope {
            temps: HashMap::new(),
            loops: Vec::new(),
        }
    }

    #[test]
    fn arithmetic_takes_the_wider_operand() {
        let mut b = DesignBuilder::new("top");
        let top = b.top();
        let a = b.input(top, "a", 8);
        let c = b.input(top, "c", 4);
        let d = b.finish().unwrap();
        let sum = Expr::binary(BinaryOp::Add, Expr::signal(a), Expr::signal(c));
        assert_eq!(expr_width(&d, &empty(), &sum), Ok(Width::Sized(8)));
        let shl = Expr::binary(BinaryOp::Shl, Expr::signal(c), Expr::signal(a));
        assert_eq!(expr_width(&d, &empty(), &shl), Ok(Width::Sized(4)));
        let lt = Expr::binary(BinaryOp::Lt, Expr::signal(a), Expr::int(3));
        assert_eq!(expr_width(&d, &empty(), &lt), Ok(Width::Sized(1)));
        let cat = Expr::Concat(vec![Expr::signal(a), Expr::signal(c)]);
        assert_eq!(expr_width(&d, &empty(), &cat), Ok(Width::Sized(12)));
    }

    #[test]
    fn unsized_integers_fold() {
        let d = DesignBuilder::new("top").finish().unwrap();
        let e = Expr::binary(BinaryOp::Mul, Expr::int(6), Expr::int(7));
        assert_eq!(expr_width(&d, &empty(), &e), Ok(Width::Unsized));
        assert_eq!(fold_int(&e, &no_bindings), Some(42));
        let i = d.interner.get_or_intern("i");
        let shifted = Expr::binary(BinaryOp::Add, Expr::local(i), Expr::int(1));
        assert_eq!(fold_int(&shifted, &|n| (n == i).then_some(4)), Some(5));
        assert_eq!(fold_int(&Expr::lit(4, 3), &no_bindings), None);
    }

    #[test]
    fn concat_of_unsized_is_ambiguous() {
        let mut b = DesignBuilder::new("top");
        let top = b.top();
        let a = b.input(top, "a", 8);
        let d = b.finish().unwrap();
        let cat = Expr::Concat(vec![Expr::signal(a), Expr::int(1)]);
        assert!(matches!(
            expr_width(&d, &empty(), &cat),
            Err(WidthError::Ambiguous(_))
        ));
    }

    #[test]
    fn slice_widths() {
        let mut b = DesignBuilder::new("top");
        let top = b.top();
        let x = b.input(top, "x", 16);
        let sel = b.input(top, "sel", 4);
        let d = b.finish().unwrap();
        let i = d.interner.get_or_intern("i");
        assert_eq!(static_slice_width(&Expr::int(2), &Expr::int(6)), Some(4));
        assert_eq!(static_slice_width(&Expr::int(6), &Expr::int(6)), None);
        let lo = Expr::signal(sel);
        let hi = Expr::binary(BinaryOp::Add, Expr::signal(sel), Expr::int(3));
        assert_eq!(static_slice_width(&lo, &hi), Some(3));
        let top_lo = Expr::binary(BinaryOp::Sub, Expr::local(i), Expr::int(2));
        assert_eq!(static_slice_width(&top_lo, &Expr::local(i)), Some(2));

        let scope = Scope {
            temps: HashMap::new(),
            loops: vec![i],
        };
        let varying = Expr::signal(x).slice(Expr::int(0), Expr::local(i));
        assert!(matches!(
            expr_width(&d, &scope, &varying),
            Err(WidthError::Ambiguous(_))
        ));
    }

    #[test]
    fn struct_fields() {
        let mut b = DesignBuilder::new("top");
        let top = b.top();
        let byte = b.bits_type(8, false);
        let nib = b.bits_type(4, true);
        let pkt = b.struct_type("Pkt", &[("lo", nib), ("hi", byte)]);
        let p = b.signal(top, "p", pkt, ember_ir::SignalKind::Wire);
        let d = b.finish().unwrap();
        let hi = d.interner.get_or_intern("hi");
        let lo = d.interner.get_or_intern("lo");
        let missing = d.interner.get_or_intern("missing");
        assert_eq!(
            expr_width(&d, &empty(), &Expr::signal(p).field(hi)),
            Ok(Width::Sized(8))
        );
        assert!(target_signed(&d, &Target::signal(p).field(lo)));
        assert!(!target_signed(&d, &Target::signal(p)));
        assert_eq!(
            expr_width(&d, &empty(), &Expr::signal(p).field(missing)),
            Err(WidthError::UnknownField("missing".into()))
        );
    }

    #[test]
    fn locals_and_loop_vars() {
        let d = DesignBuilder::new("top").finish().unwrap();
        let t = d.interner.get_or_intern("t");
        let i = d.interner.get_or_intern("i");
        let scope = Scope {
            temps: HashMap::from([(t, 5)]),
            loops: vec![i],
        };
        assert_eq!(expr_width(&d, &scope, &Expr::local(t)), Ok(Width::Sized(5)));
        assert_eq!(expr_width(&d, &scope, &Expr::local(i)), Ok(Width::Unsized));
        assert!(matches!(
            target_width(&d, &scope, &Target::local(i)),
            Err(WidthError::Unsupported(_))
        ));
        assert_eq!(
            expr_width(&d, &scope, &Expr::Const(Bits::zero(3))),
            Ok(Width::Sized(3))
        );
    }

    #[test]
    fn minimal_widths() {
        assert_eq!(min_width(0), 1);
        assert_eq!(min_width(1), 1);
        assert_eq!(min_width(5), 3);
        assert_eq!(min_width(255), 8);
    }
}
