//! Top-level design container, naming, and traversal.
//!
//! A [`Design`] holds every module, signal, array, and rule of one elaborated
//! hardware description, plus the interner and type database they refer to.
//! Its topology is immutable once built; simulators share it behind an `Arc`
//! and keep their own value storage.

use crate::arena::Arena;
use crate::error::ElabError;
use crate::ids::{ArrayId, ModuleId, RuleId, SignalId};
use crate::module::Module;
use crate::rule::Rule;
use crate::signal::{Signal, SignalArray};
use crate::types::TypeDb;
use crate::validate;
use ember_common::{Ident, Interner};
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};

/// A complete elaborated design.
#[derive(Debug, Serialize, Deserialize)]
pub struct Design {
    /// Names of modules, signals, rules, fields, and locals.
    pub interner: Interner,
    /// Signal types.
    pub types: TypeDb,
    /// All module instances.
    pub modules: Arena<ModuleId, Module>,
    /// All signals of all modules.
    pub signals: Arena<SignalId, Signal>,
    /// All signal arrays of all modules.
    pub arrays: Arena<ArrayId, SignalArray>,
    /// All update rules of all modules.
    pub rules: Arena<RuleId, Rule>,
    /// The root of the instance tree.
    pub top: ModuleId,
}

impl Design {
    /// Checks the structural invariants of the model graph.
    ///
    /// Verifies ID ranges, exclusive ownership, widths, constants, arrays,
    /// connection scopes and widths, and that every rule only references
    /// signals of its own module or ports of its direct children.
    pub fn validate(&self) -> Result<(), ElabError> {
        validate::validate(self)
    }

    /// Resolves an identifier to its string.
    pub fn name(&self, ident: Ident) -> &str {
        self.interner.try_resolve(ident).unwrap_or("<unnamed>")
    }

    /// Returns a reference to the top-level module.
    pub fn top_module(&self) -> &Module {
        &self.modules[self.top]
    }

    /// Returns the dotted instance path of a module, e.g. `top.sorter.s0`.
    pub fn module_path(&self, id: ModuleId) -> String {
        let mut parts = Vec::new();
        let mut cur = Some(id);
        while let Some(m) = cur {
            let Some(module) = self.modules.try_get(m) else {
                break;
            };
            parts.push(self.name(module.name));
            if parts.len() > self.modules.len() {
                break;
            }
            cur = module.parent;
        }
        parts.reverse();
        parts.join(".")
    }

    /// Returns the dotted path of a signal, e.g. `top.sorter.in_0`.
    pub fn signal_path(&self, id: SignalId) -> String {
        match self.signals.try_get(id) {
            Some(s) => format!("{}.{}", self.module_path(s.owner), self.name(s.name)),
            None => format!("<signal {}>", id.as_raw()),
        }
    }

    /// Returns the dotted path of a signal array.
    pub fn array_path(&self, id: ArrayId) -> String {
        match self.arrays.try_get(id) {
            Some(a) => format!("{}.{}", self.module_path(a.owner), self.name(a.name)),
            None => format!("<array {}>", id.as_raw()),
        }
    }

    /// Returns the path of a rule, e.g. `top.sorter::stage0`.
    pub fn rule_path(&self, id: RuleId) -> String {
        match self.rules.try_get(id) {
            Some(r) => format!("{}::{}", self.module_path(r.owner), self.name(r.name)),
            None => format!("<rule {}>", id.as_raw()),
        }
    }

    /// Returns the bit width of a signal.
    pub fn signal_width(&self, id: SignalId) -> u32 {
        self.types.bit_width(self.signals[id].ty)
    }

    /// Returns `true` if narrower values are sign-extended into this signal.
    pub fn signal_signed(&self, id: SignalId) -> bool {
        self.types.is_signed(self.signals[id].ty)
    }

    /// Returns the number of ancestors of a module (0 for the top).
    pub fn depth(&self, id: ModuleId) -> usize {
        let mut depth = 0;
        let mut cur = self.modules.try_get(id).and_then(|m| m.parent);
        while let Some(p) = cur {
            depth += 1;
            if depth > self.modules.len() {
                break;
            }
            cur = self.modules.try_get(p).and_then(|m| m.parent);
        }
        depth
    }

    /// Enumerates modules depth-first (pre-order, children in declaration order).
    pub fn walk_depth_first(&self) -> Vec<ModuleId> {
        let mut order = Vec::new();
        let mut seen = HashSet::new();
        let mut stack = vec![self.top];
        while let Some(id) = stack.pop() {
            if !self.modules.contains(id) || !seen.insert(id) {
                continue;
            }
            order.push(id);
            for child in self.modules[id].children.iter().rev() {
                stack.push(*child);
            }
        }
        order
    }

    /// Enumerates modules breadth-first (level by level, declaration order).
    pub fn walk_breadth_first(&self) -> Vec<ModuleId> {
        let mut order = Vec::new();
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([self.top]);
        while let Some(id) = queue.pop_front() {
            if !self.modules.contains(id) || !seen.insert(id) {
                continue;
            }
            order.push(id);
            queue.extend(self.modules[id].children.iter().copied());
        }
        order
    }

    /// Returns the update rules attached to a module.
    pub fn rules_of(&self, module: ModuleId) -> &[RuleId] {
        &self.modules[module].rules
    }

    /// Returns every rule reachable from the top, modules in depth-first order.
    pub fn rules_depth_first(&self) -> Vec<RuleId> {
        self.walk_depth_first()
            .into_iter()
            .flat_map(|m| self.rules_of(m).iter().copied())
            .collect()
    }

    /// Returns the top module's ports in declaration order.
    pub fn top_ports(&self) -> Vec<SignalId> {
        self.top_module()
            .signals
            .iter()
            .copied()
            .filter(|s| self.signals[*s].kind.is_port())
            .collect()
    }

    /// Finds a signal by its dotted path.
    pub fn find_signal(&self, path: &str) -> Option<SignalId> {
        self.signals.ids().find(|id| self.signal_path(*id) == path)
    }

    /// Finds a top-level port by its bare name.
    pub fn find_port(&self, name: &str) -> Option<SignalId> {
        self.top_ports()
            .into_iter()
            .find(|id| self.name(self.signals[*id].name) == name)
    }

    /// Finds a module by its dotted path.
    pub fn find_module(&self, path: &str) -> Option<ModuleId> {
        self.modules.ids().find(|id| self.module_path(*id) == path)
    }

    /// Finds a rule by its path (`module.path::name`).
    pub fn find_rule(&self, path: &str) -> Option<RuleId> {
        self.rules.ids().find(|id| self.rule_path(*id) == path)
    }

    /// Returns `true` if code attached to `module` may reference `signal`:
    /// it is declared in `module`, or it is a port of a direct child.
    pub fn signal_visible_from(&self, signal: SignalId, module: ModuleId) -> bool {
        let Some(s) = self.signals.try_get(signal) else {
            return false;
        };
        if s.owner == module {
            return true;
        }
        s.kind.is_port()
            && self
                .modules
                .try_get(s.owner)
                .is_some_and(|owner| owner.parent == Some(module))
    }

    /// Returns `true` if code attached to `module` may reference `array`:
    /// it is declared in `module`, or it is a child's array made of that child's ports.
    pub fn array_visible_from(&self, array: ArrayId, module: ModuleId) -> bool {
        let Some(a) = self.arrays.try_get(array) else {
            return false;
        };
        if a.owner == module {
            return true;
        }
        a.elements
            .iter()
            .all(|e| self.signal_visible_from(*e, module))
            && self
                .modules
                .try_get(a.owner)
                .is_some_and(|owner| owner.parent == Some(module))
    }
}
