//! Run-time values and operator semantics.
//!
//! A [`Value`] is either a sized [`Bits`] vector or an unsized integer (a
//! literal or loop variable). Mixing the two converts the integer to the
//! sized operand's width before the operation.

use std::cmp::Ordering;

use ember_common::Bits;
use ember_ir::{BinaryOp, UnaryOp};

/// A value produced while evaluating a rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// A sized bit vector.
    Bits(Bits),
    /// An unsized integer.
    Int(i64),
}

/// Why an operator could not produce a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpError {
    /// Division or remainder by zero.
    DivisionByZero,
    /// The operator needs a sized operand.
    Unsized,
}

/// Two's-complement bits of `value` at `width`, sign-extended past 64 bits.
pub fn int_bits(value: i64, width: u32) -> Bits {
    Bits::from_i64(width, value)
}

impl Value {
    /// Converts to `width` bits: integers are truncated, sized values are
    /// fitted with the given signedness.
    pub fn to_width(&self, width: u32, signed: bool) -> Bits {
        match self {
            Value::Bits(b) => b.fit(width, signed),
            Value::Int(v) => int_bits(*v, width),
        }
    }

    /// Returns the sized value, or `None` for an unsized integer.
    pub fn as_bits(&self) -> Option<&Bits> {
        match self {
            Value::Bits(b) => Some(b),
            Value::Int(_) => None,
        }
    }

    /// Interprets the value as a position; `None` if negative or wider than 64 bits.
    pub fn as_index(&self) -> Option<u64> {
        match self {
            Value::Bits(b) => b.to_u64(),
            Value::Int(v) => u64::try_from(*v).ok(),
        }
    }

    /// Any nonzero value is true.
    pub fn is_true(&self) -> bool {
        match self {
            Value::Bits(b) => !b.is_zero(),
            Value::Int(v) => *v != 0,
        }
    }

    fn width(&self) -> Option<u32> {
        self.as_bits().map(Bits::width)
    }
}

fn flag(b: bool) -> Value {
    Value::Bits(Bits::from_bool(b))
}

/// Applies a unary operator.
pub fn unary(op: UnaryOp, value: &Value) -> Result<Value, OpError> {
    match value {
        Value::Int(v) => match op {
            UnaryOp::Not => Ok(Value::Int(!v)),
            UnaryOp::Neg => Ok(Value::Int(v.wrapping_neg())),
            UnaryOp::LogicNot => Ok(Value::Int(i64::from(*v == 0))),
            UnaryOp::RedAnd | UnaryOp::RedOr | UnaryOp::RedXor => Err(OpError::Unsized),
        },
        Value::Bits(b) => Ok(match op {
            UnaryOp::Not => Value::Bits(!b),
            UnaryOp::Neg => Value::Bits(b.neg()),
            UnaryOp::LogicNot => flag(b.is_zero()),
            UnaryOp::RedAnd => flag(b.reduce_and()),
            UnaryOp::RedOr => flag(b.reduce_or()),
            UnaryOp::RedXor => flag(b.reduce_xor()),
        }),
    }
}

/// Applies a binary operator.
pub fn binary(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value, OpError> {
    if let (Value::Int(a), Value::Int(b)) = (lhs, rhs) {
        return int_binary(op, *a, *b).map(Value::Int);
    }
    let width = lhs.width().into_iter().chain(rhs.width()).max().ok_or(OpError::Unsized)?;
    let a = lhs.to_width(width, false);
    let b = rhs.to_width(width, false);
    let out = match op {
        BinaryOp::Add => Value::Bits(a.add(&b)),
        BinaryOp::Sub => Value::Bits(a.sub(&b)),
        BinaryOp::Mul => Value::Bits(a.mul(&b)),
        BinaryOp::Div => Value::Bits(a.checked_div(&b).ok_or(OpError::DivisionByZero)?),
        BinaryOp::Rem => Value::Bits(a.checked_rem(&b).ok_or(OpError::DivisionByZero)?),
        BinaryOp::And => Value::Bits(&a & &b),
        BinaryOp::Or => Value::Bits(&a | &b),
        BinaryOp::Xor => Value::Bits(&a ^ &b),
        BinaryOp::Shl | BinaryOp::Shr => {
            let base = lhs.as_bits().ok_or(OpError::Unsized)?;
            let amount = rhs.as_index().unwrap_or(u64::MAX);
            Value::Bits(if op == BinaryOp::Shl {
                base.shl(amount)
            } else {
                base.shr(amount)
            })
        }
        BinaryOp::Eq => flag(a == b),
        BinaryOp::Ne => flag(a != b),
        BinaryOp::Lt => flag(a.cmp_unsigned(&b) == Ordering::Less),
        BinaryOp::Le => flag(a.cmp_unsigned(&b) != Ordering::Greater),
        BinaryOp::Gt => flag(a.cmp_unsigned(&b) == Ordering::Greater),
        BinaryOp::Ge => flag(a.cmp_unsigned(&b) != Ordering::Less),
        BinaryOp::LogicAnd => flag(lhs.is_true() && rhs.is_true()),
        BinaryOp::LogicOr => flag(lhs.is_true() || rhs.is_true()),
    };
    Ok(out)
}

/// Integer arithmetic on two unsized operands, wrapping on overflow.
pub fn int_binary(op: BinaryOp, a: i64, b: i64) -> Result<i64, OpError> {
    Ok(match op {
        BinaryOp::Add => a.wrapping_add(b),
        BinaryOp::Sub => a.wrapping_sub(b),
        BinaryOp::Mul => a.wrapping_mul(b),
        BinaryOp::Div if b == 0 => return Err(OpError::DivisionByZero),
        BinaryOp::Rem if b == 0 => return Err(OpError::DivisionByZero),
        BinaryOp::Div => a.wrapping_div(b),
        BinaryOp::Rem => a.wrapping_rem(b),
        BinaryOp::And => a & b,
        BinaryOp::Or => a | b,
        BinaryOp::Xor => a ^ b,
        BinaryOp::Shl => match u32::try_from(b) {
            Ok(s) if s < 64 => a.wrapping_shl(s),
            _ => 0,
        },
        BinaryOp::Shr => match u32::try_from(b) {
            Ok(s) if s < 64 => a >> s,
            _ => a >> 63,
        },
        BinaryOp::Eq => i64::from(a == b),
        BinaryOp::Ne => i64::from(a != b),
        BinaryOp::Lt => i64::from(a < b),
        BinaryOp::Le => i64::from(a <= b),
        BinaryOp::Gt => i64::from(a > b),
        BinaryOp::Ge => i64::from(a >= b),
        BinaryOp::LogicAnd => i64::from(a != 0 && b != 0),
        BinaryOp::LogicOr => i64::from(a != 0 || b != 0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bits(width: u32, v: u64) -> Value {
        Value::Bits(Bits::truncated(width, v))
    }

    #[test]
    fn int_takes_the_sized_width() {
        let sum = binary(BinaryOp::Add, &bits(4, 15), &Value::Int(1)).unwrap();
        assert_eq!(sum, bits(4, 0));
        let lt = binary(BinaryOp::Lt, &Value::Int(3), &bits(8, 200)).unwrap();
        assert_eq!(lt, bits(1, 1));
    }

    #[test]
    fn mixed_widths_zero_extend() {
        let sum = binary(BinaryOp::Add, &bits(8, 0xff), &bits(4, 1)).unwrap();
        assert_eq!(sum, bits(8, 0));
        let eq = binary(BinaryOp::Eq, &bits(8, 5), &bits(3, 5)).unwrap();
        assert_eq!(eq, bits(1, 1));
    }

    #[test]
    fn shifts_keep_left_width() {
        assert_eq!(
            binary(BinaryOp::Shl, &bits(4, 0b0011), &bits(8, 2)).unwrap(),
            bits(4, 0b1100)
        );
        assert_eq!(
            binary(BinaryOp::Shr, &bits(4, 0b1000), &Value::Int(9)).unwrap(),
            bits(4, 0)
        );
        assert_eq!(
            binary(BinaryOp::Shl, &Value::Int(1), &bits(2, 1)),
            Err(OpError::Unsized)
        );
    }

    #[test]
    fn division_by_zero_is_reported() {
        assert_eq!(
            binary(BinaryOp::Div, &bits(8, 3), &bits(8, 0)),
            Err(OpError::DivisionByZero)
        );
        assert_eq!(int_binary(BinaryOp::Rem, 3, 0), Err(OpError::DivisionByZero));
        assert_eq!(int_binary(BinaryOp::Div, 7, 2), Ok(3));
    }

    #[test]
    fn unary_ops() {
        assert_eq!(unary(UnaryOp::Not, &bits(4, 0b1010)).unwrap(), bits(4, 0b0101));
        assert_eq!(unary(UnaryOp::Neg, &bits(4, 1)).unwrap(), bits(4, 0xf));
        assert_eq!(unary(UnaryOp::RedXor, &bits(4, 0b0111)).unwrap(), bits(1, 1));
        assert_eq!(unary(UnaryOp::LogicNot, &Value::Int(0)).unwrap(), Value::Int(1));
        assert_eq!(unary(UnaryOp::RedOr, &Value::Int(3)), Err(OpError::Unsized));
    }

    #[test]
    fn negative_ints_sign_extend_to_wide_targets() {
        let v = int_bits(-1, 70);
        assert_eq!(v, Bits::ones(70));
        assert_eq!(Value::Int(-2).to_width(4, false), Bits::truncated(4, 0xe));
    }

    #[test]
    fn logic_ops_are_one_bit() {
        assert_eq!(
            binary(BinaryOp::LogicAnd, &bits(8, 4), &Value::Int(1)).unwrap(),
            bits(1, 1)
        );
        assert_eq!(
            binary(BinaryOp::LogicOr, &bits(8, 0), &bits(2, 0)).unwrap(),
            bits(1, 0)
        );
    }
}
