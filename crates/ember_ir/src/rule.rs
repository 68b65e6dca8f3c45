//! Update rules: procedural bodies attached to modules.

use crate::ids::ModuleId;
use crate::stmt::Stmt;
use ember_common::Ident;
use serde::{Deserialize, Serialize};

/// Whether a rule's writes take effect immediately or at the next commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuleKind {
    /// Re-evaluated whenever a read dependency changes; writes are immediate.
    Combinational,
    /// Evaluated once per clock edge; writes become visible after commit.
    Sequential,
}

impl RuleKind {
    /// Returns `true` for combinational rules.
    pub fn is_combinational(self) -> bool {
        self == RuleKind::Combinational
    }
}

/// An update rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    /// Rule name, unique within its module.
    pub name: Ident,
    /// Combinational or sequential.
    pub kind: RuleKind,
    /// The module the rule is attached to.
    pub owner: ModuleId,
    /// The procedural body.
    pub body: Stmt,
}
