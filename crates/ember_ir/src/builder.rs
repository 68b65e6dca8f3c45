//! Programmatic construction of designs.
//!
//! [`DesignBuilder`] is the interface through which a front-end (or a test)
//! materializes a model graph. Declarations are appended in call order, which
//! fixes port order and rule indices.

use crate::arena::Arena;
use crate::design::Design;
use crate::error::ElabError;
use crate::ids::{ArrayId, ModuleId, RuleId, SignalId, TypeId};
use crate::module::{Connection, Module};
use crate::rule::{Rule, RuleKind};
use crate::signal::{PortDirection, Signal, SignalArray, SignalKind};
use crate::stmt::Stmt;
use crate::types::{Type, TypeDb};
use ember_common::{Bits, Ident, Interner};

/// Incrementally builds a [`Design`].
pub struct DesignBuilder {
    design: Design,
}

impl DesignBuilder {
    /// Starts a design whose top module instance is called `top_name`.
    pub fn new(top_name: &str) -> Self {
        let interner = Interner::new();
        let mut modules = Arena::new();
        let top = modules.alloc(Module::new(interner.get_or_intern(top_name), None));
        Self {
            design: Design {
                interner,
                types: TypeDb::new(),
                modules,
                signals: Arena::new(),
                arrays: Arena::new(),
                rules: Arena::new(),
                top,
            },
        }
    }

    /// Returns the top module.
    pub fn top(&self) -> ModuleId {
        self.design.top
    }

    /// Interns a name (for locals, loop variables, and struct fields).
    pub fn ident(&self, name: &str) -> Ident {
        self.design.interner.get_or_intern(name)
    }

    /// Interns a bit-vector type.
    pub fn bits_type(&mut self, width: u32, signed: bool) -> TypeId {
        self.design.types.bits(width, signed)
    }

    /// Interns a struct type; the first field occupies the low bits.
    pub fn struct_type(&mut self, name: &str, fields: &[(&str, TypeId)]) -> TypeId {
        let name = self.ident(name);
        let fields = fields.iter().map(|(n, ty)| (self.ident(n), *ty)).collect();
        self.design.types.intern(Type::Struct { name, fields })
    }

    /// Adds a child instance under `parent`.
    pub fn child(&mut self, parent: ModuleId, name: &str) -> ModuleId {
        let name = self.ident(name);
        let id = self.design.modules.alloc(Module::new(name, Some(parent)));
        self.design.modules[parent].children.push(id);
        id
    }

    /// Declares a signal of any type and kind.
    pub fn signal(&mut self, module: ModuleId, name: &str, ty: TypeId, kind: SignalKind) -> SignalId {
        let name = self.ident(name);
        let id = self.design.signals.alloc(Signal {
            name,
            ty,
            kind,
            owner: module,
            init: None,
        });
        self.design.modules[module].signals.push(id);
        id
    }

    /// Declares an unsigned input port.
    pub fn input(&mut self, module: ModuleId, name: &str, width: u32) -> SignalId {
        let ty = self.bits_type(width, false);
        self.signal(module, name, ty, SignalKind::Port(PortDirection::Input))
    }

    /// Declares an unsigned output port.
    pub fn output(&mut self, module: ModuleId, name: &str, width: u32) -> SignalId {
        let ty = self.bits_type(width, false);
        self.signal(module, name, ty, SignalKind::Port(PortDirection::Output))
    }

    /// Declares an unsigned wire.
    pub fn wire(&mut self, module: ModuleId, name: &str, width: u32) -> SignalId {
        let ty = self.bits_type(width, false);
        self.signal(module, name, ty, SignalKind::Wire)
    }

    /// Declares a constant whose type is an unsigned vector of the value's width.
    pub fn constant(&mut self, module: ModuleId, name: &str, value: Bits) -> SignalId {
        let ty = self.bits_type(value.width(), false);
        let id = self.signal(module, name, ty, SignalKind::Constant);
        self.design.signals[id].init = Some(value);
        id
    }

    /// Sets the initial value of a signal.
    pub fn set_init(&mut self, signal: SignalId, value: Bits) {
        self.design.signals[signal].init = Some(value);
    }

    /// Declares `count` signals `name_0 .. name_{count-1}` of one type and
    /// groups them into an array called `name`.
    pub fn signal_array(
        &mut self,
        module: ModuleId,
        name: &str,
        count: usize,
        ty: TypeId,
        kind: SignalKind,
    ) -> (ArrayId, Vec<SignalId>) {
        let elements: Vec<SignalId> = (0..count)
            .map(|i| self.signal(module, &format!("{name}_{i}"), ty, kind))
            .collect();
        let array = self.array(module, name, elements.clone());
        (array, elements)
    }

    /// Groups existing signals into an array.
    pub fn array(&mut self, module: ModuleId, name: &str, elements: Vec<SignalId>) -> ArrayId {
        let name = self.ident(name);
        let id = self.design.arrays.alloc(SignalArray {
            name,
            owner: module,
            elements,
        });
        self.design.modules[module].arrays.push(id);
        id
    }

    /// Connects two signals so they share storage.
    pub fn connect(&mut self, module: ModuleId, a: SignalId, b: SignalId) {
        self.design.modules[module]
            .connections
            .push(Connection { a, b });
    }

    /// Attaches a rule to a module.
    pub fn rule(&mut self, module: ModuleId, name: &str, kind: RuleKind, body: Stmt) -> RuleId {
        let name = self.ident(name);
        let id = self.design.rules.alloc(Rule {
            name,
            kind,
            owner: module,
            body,
        });
        self.design.modules[module].rules.push(id);
        id
    }

    /// Attaches a combinational rule.
    pub fn comb(&mut self, module: ModuleId, name: &str, body: Stmt) -> RuleId {
        self.rule(module, name, RuleKind::Combinational, body)
    }

    /// Attaches a sequential rule.
    pub fn seq(&mut self, module: ModuleId, name: &str, body: Stmt) -> RuleId {
        self.rule(module, name, RuleKind::Sequential, body)
    }

    /// Gives read access to the design under construction.
    pub fn design(&self) -> &Design {
        &self.design
    }

    /// Validates and returns the design.
    pub fn finish(self) -> Result<Design, ElabError> {
        self.design.validate()?;
        Ok(self.design)
    }

    /// Returns the design without validating it.
    pub fn finish_unchecked(self) -> Design {
        self.design
    }
}
