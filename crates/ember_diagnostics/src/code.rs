//! Stable identifiers for each kind of finding.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which pass raised a diagnostic, shown as the code's letter.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum Category {
    /// Usage analysis findings, `W`.
    Warning,
    /// Lowering decisions, `L`.
    Lowering,
}

impl Category {
    /// The letter printed before the number.
    pub fn prefix(self) -> char {
        match self {
            Category::Warning => 'W',
            Category::Lowering => 'L',
        }
    }
}

/// A diagnostic code such as `W301`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct DiagnosticCode {
    /// Raising pass.
    pub category: Category,
    /// Number within the pass, printed with three digits.
    pub number: u16,
}

impl DiagnosticCode {
    /// Creates a code.
    pub const fn new(category: Category, number: u16) -> Self {
        Self { category, number }
    }

    /// A combinational rule writes a signal only on some paths.
    pub const LATCH_HAZARD: Self = Self::new(Category::Warning, 301);
    /// A sequential rule never writes anything.
    pub const EMPTY_SEQUENTIAL: Self = Self::new(Category::Warning, 302);
    /// A wire nothing reads or drives.
    pub const UNUSED_SIGNAL: Self = Self::new(Category::Warning, 303);
    /// A static loop exceeded the unroll limit and was kept as a loop.
    pub const LOOP_NOT_UNROLLED: Self = Self::new(Category::Lowering, 401);
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:03}", self.category.prefix(), self.number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_print_with_three_digits() {
        assert_eq!(DiagnosticCode::LATCH_HAZARD.to_string(), "W301");
        assert_eq!(DiagnosticCode::LOOP_NOT_UNROLLED.to_string(), "L401");
        assert_eq!(DiagnosticCode::new(Category::Warning, 7).to_string(), "W007");
    }

    #[test]
    fn json_keeps_category_and_number() {
        let json = serde_json::to_string(&DiagnosticCode::UNUSED_SIGNAL).unwrap();
        assert_eq!(json, r#"{"category":"Warning","number":303}"#);
        let back: DiagnosticCode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, DiagnosticCode::UNUSED_SIGNAL);
    }
}
