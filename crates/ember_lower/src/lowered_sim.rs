//! Cycle execution of a [`LoweredModule`] under two-state Verilog rules.
//!
//! This executor exists to check a lowering against the native simulator.
//! It follows the Verilog-2001 sizing rules rather than the rule-language
//! ones: operands take the width of their context, `integer` values and
//! unsized decimals are signed, and bit or part selects outside the
//! declared range read as zero and drop their writes. Values are two-state,
//! so where Verilog would produce `x` this executor produces zero.
//!
//! One clock cycle settles the continuous logic, runs the clocked block once
//! with nonblocking writes queued until it finishes, then settles again.
//!
//! Settling is event driven. A continuous assignment runs when one of its
//! operands changes, and a combinational block runs when a name in its
//! sensitivity list changes; a block never wakes itself. At power-on every
//! continuous assignment, every block with a sensitivity list, and every
//! `initial` block runs once. An `always @*` block with an empty list has
//! nothing to wait on and never runs.

use std::cmp::Ordering;
use std::collections::HashMap;

use ember_analyze::range_values;
use ember_analyze::width::min_width;
use ember_common::Bits;
use ember_ir::{BinaryOp, PortDirection, UnaryOp};

use crate::error::ExecError;
use crate::vast::{LoweredModule, Trigger, VExpr, VItem, VLValue, VStmt, VarKind};

/// Where the executor is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Between cycles.
    Idle,
    /// Running continuous logic to a fixed point.
    Settling,
    /// Running the clocked block and applying its nonblocking writes.
    Committing,
    /// An error ended execution; only [`LoweredSim::reset_state`] recovers.
    Failed,
}

/// A declared name.
#[derive(Debug, Clone)]
struct Slot {
    width: u32,
    /// `integer` variables are signed.
    signed: bool,
    /// Driven from outside through [`LoweredSim::set`].
    input: bool,
    port: bool,
}

/// A nonblocking write waiting for the end of the clocked block.
struct Pending {
    slot: usize,
    lo: u32,
    value: Bits,
}

/// Executes a lowered module one clock cycle at a time.
pub struct LoweredSim {
    module: LoweredModule,
    index: HashMap<String, usize>,
    slots: Vec<Slot>,
    values: Vec<Bits>,
    initial: Vec<Bits>,
    /// Values at the end of the last settle.
    settled: Vec<Bits>,
    /// Items woken by a change of each slot.
    watchers: Vec<Vec<usize>>,
    /// Items that run at power-on.
    power_on: Vec<usize>,
    max_settle_passes: u32,
    phase: Phase,
    cycle: u64,
}

impl LoweredSim {
    /// Prepares `module` for execution and settles its power-on state.
    ///
    /// `max_settle_passes` bounds each settle; hitting it is an
    /// [`ExecError::Oscillation`].
    pub fn new(module: LoweredModule, max_settle_passes: u32) -> Result<Self, ExecError> {
        let mut index = HashMap::new();
        let mut slots = Vec::new();
        let mut initial = Vec::new();
        for port in &module.ports {
            index.insert(port.name.clone(), slots.len());
            let is_clock = module.clock.as_deref() == Some(port.name.as_str());
            slots.push(Slot {
                width: port.width,
                signed: false,
                input: port.direction == PortDirection::Input && !is_clock,
                port: !is_clock,
            });
            initial.push(port.init.clone().unwrap_or_else(|| Bits::zero(port.width)));
        }
        for decl in &module.decls {
            index.insert(decl.name.clone(), slots.len());
            slots.push(Slot {
                width: decl.width,
                signed: decl.kind == VarKind::Integer,
                input: false,
                port: false,
            });
            initial.push(decl.init.clone().unwrap_or_else(|| Bits::zero(decl.width)));
        }

        let mut watchers: Vec<Vec<usize>> = vec![Vec::new(); slots.len()];
        let mut power_on = Vec::new();
        for (i, item) in module.items.iter().enumerate() {
            let mut reads = Vec::new();
            match item {
                VItem::Assign(a) => {
                    lvalue_reads(&a.lhs, &index, &mut reads);
                    expr_reads(&a.rhs, &index, &mut reads);
                    power_on.push(i);
                }
                VItem::Always(block) => match &block.trigger {
                    Trigger::Signals(names) => {
                        for name in names {
                            let slot = index.get(name).ok_or_else(|| ExecError::Undeclared {
                                name: name.clone(),
                            })?;
                            reads.push(*slot);
                        }
                        if !names.is_empty() {
                            power_on.push(i);
                        }
                    }
                    Trigger::Initial => power_on.push(i),
                    Trigger::Posedge(_) => {}
                },
            }
            for slot in reads {
                if !watchers[slot].contains(&i) {
                    watchers[slot].push(i);
                }
            }
        }

        let mut sim = Self {
            module,
            index,
            slots,
            values: initial.clone(),
            settled: initial.clone(),
            initial,
            watchers,
            power_on,
            max_settle_passes,
            phase: Phase::Idle,
            cycle: 0,
        };
        sim.phase = Phase::Settling;
        let result = sim.settle(true);
        sim.finish_phase(result)?;
        Ok(sim)
    }

    /// The executed module.
    pub fn module(&self) -> &LoweredModule {
        &self.module
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Clock cycles completed since construction or the last reset.
    pub fn cycle_count(&self) -> u64 {
        self.cycle
    }

    /// Drives an input port. The value must have the port's width.
    pub fn set(&mut self, name: &str, value: Bits) -> Result<(), ExecError> {
        self.ensure_live()?;
        let slot = self.port_slot(name)?;
        if !self.slots[slot].input {
            return Err(ExecError::NotAnInput {
                name: name.to_string(),
            });
        }
        let expected = self.slots[slot].width;
        if value.width() != expected {
            return Err(ExecError::WidthMismatch {
                name: name.to_string(),
                expected,
                actual: value.width(),
            });
        }
        self.values[slot] = value;
        Ok(())
    }

    /// Drives an input port from an integer that must fit its width.
    pub fn set_u64(&mut self, name: &str, value: u64) -> Result<(), ExecError> {
        self.ensure_live()?;
        let expected = self.slots[self.port_slot(name)?].width;
        let bits = Bits::new(expected, value).map_err(|_| ExecError::WidthMismatch {
            name: name.to_string(),
            expected,
            actual: min_width(value),
        })?;
        self.set(name, bits)
    }

    /// Reads a port.
    pub fn get(&self, name: &str) -> Result<Bits, ExecError> {
        self.ensure_live()?;
        Ok(self.values[self.port_slot(name)?].clone())
    }

    /// Reads a port that fits in 64 bits.
    pub fn get_u64(&self, name: &str) -> Result<u64, ExecError> {
        let value = self.get(name)?;
        value.to_u64().ok_or_else(|| ExecError::WidthMismatch {
            name: name.to_string(),
            expected: 64,
            actual: value.width(),
        })
    }

    /// Reads any declared name, including internal nets and temporaries.
    pub fn peek(&self, name: &str) -> Result<Bits, ExecError> {
        self.ensure_live()?;
        let slot = self.slot(name)?;
        Ok(self.values[slot].clone())
    }

    /// Values of every port except the clock, in declaration order.
    pub fn port_values(&self) -> Vec<(String, Bits)> {
        self.module
            .ports
            .iter()
            .filter(|p| self.slots[self.index[&p.name]].port)
            .map(|p| (p.name.clone(), self.values[self.index[&p.name]].clone()))
            .collect()
    }

    /// Runs one clock cycle.
    pub fn step(&mut self) -> Result<(), ExecError> {
        self.ensure_live()?;
        let result = self.run_cycle();
        self.finish_phase(result)?;
        self.cycle += 1;
        tracing::trace!(cycle = self.cycle, "lowered cycle complete");
        Ok(())
    }

    /// Runs `cycles` clock cycles, stopping at the first error.
    pub fn step_n(&mut self, cycles: u64) -> Result<(), ExecError> {
        for _ in 0..cycles {
            self.step()?;
        }
        Ok(())
    }

    /// Restores power-on values and clears a failure.
    pub fn reset_state(&mut self) -> Result<(), ExecError> {
        self.values.clone_from(&self.initial);
        self.settled.clone_from(&self.initial);
        self.cycle = 0;
        self.phase = Phase::Settling;
        let result = self.settle(true);
        self.finish_phase(result)
    }

    fn ensure_live(&self) -> Result<(), ExecError> {
        if self.phase == Phase::Failed {
            Err(ExecError::Failed)
        } else {
            Ok(())
        }
    }

    fn finish_phase(&mut self, result: Result<(), ExecError>) -> Result<(), ExecError> {
        match result {
            Ok(()) => {
                self.phase = Phase::Idle;
                Ok(())
            }
            Err(e) => {
                tracing::debug!(error = %e, cycle = self.cycle, "lowered execution failed");
                self.phase = Phase::Failed;
                Err(e)
            }
        }
    }

    fn slot(&self, name: &str) -> Result<usize, ExecError> {
        self.index.get(name).copied().ok_or_else(|| ExecError::Undeclared {
            name: name.to_string(),
        })
    }

    fn port_slot(&self, name: &str) -> Result<usize, ExecError> {
        match self.index.get(name) {
            Some(slot) if self.module.port(name).is_some() => Ok(*slot),
            _ => Err(ExecError::NotAPort {
                name: name.to_string(),
            }),
        }
    }

    fn run_cycle(&mut self) -> Result<(), ExecError> {
        self.phase = Phase::Settling;
        self.settle(false)?;
        self.phase = Phase::Committing;
        let module = std::mem::replace(&mut self.module, empty_module());
        let result = self.clock_edge(&module);
        self.module = module;
        result?;
        self.phase = Phase::Settling;
        self.settle(false)
    }

    fn clock_edge(&mut self, module: &LoweredModule) -> Result<(), ExecError> {
        let mut pending = Vec::new();
        for block in module.blocks().filter(|b| b.is_clocked()) {
            self.exec(&block.body, &mut pending)?;
        }
        for p in pending {
            self.values[p.slot] = self.values[p.slot].with_slice(p.lo, &p.value);
        }
        Ok(())
    }

    fn settle(&mut self, power_on: bool) -> Result<(), ExecError> {
        let module = std::mem::replace(&mut self.module, empty_module());
        let result = self.settle_items(&module, power_on);
        self.module = module;
        if result.is_ok() {
            self.settled.clone_from(&self.values);
        }
        result
    }

    fn settle_items(&mut self, module: &LoweredModule, power_on: bool) -> Result<(), ExecError> {
        let mut queued = vec![false; module.items.len()];
        if power_on {
            for &i in &self.power_on {
                queued[i] = true;
            }
        }
        for slot in 0..self.values.len() {
            if self.values[slot] != self.settled[slot] {
                for &i in &self.watchers[slot] {
                    queued[i] = true;
                }
            }
        }

        for pass in 1..=self.max_settle_passes {
            if !queued.contains(&true) {
                tracing::trace!(passes = pass - 1, "lowered logic settled");
                return Ok(());
            }
            for (i, item) in module.items.iter().enumerate() {
                if !queued[i] {
                    continue;
                }
                queued[i] = false;
                let before = self.values.clone();
                let mut pending = Vec::new();
                let wakes_itself = match item {
                    VItem::Assign(a) => {
                        self.assign(&a.lhs, &a.rhs, true, &mut pending)?;
                        true
                    }
                    VItem::Always(block) => {
                        self.exec(&block.body, &mut pending)?;
                        false
                    }
                };
                for slot in 0..self.values.len() {
                    if self.values[slot] == before[slot] {
                        continue;
                    }
                    for &w in &self.watchers[slot] {
                        if w != i || wakes_itself {
                            queued[w] = true;
                        }
                    }
                }
            }
        }
        if queued.contains(&true) {
            return Err(ExecError::Oscillation {
                passes: self.max_settle_passes,
            });
        }
        Ok(())
    }

    fn exec(&mut self, stmts: &[VStmt], pending: &mut Vec<Pending>) -> Result<(), ExecError> {
        for stmt in stmts {
            match stmt {
                VStmt::Assign { lhs, rhs, blocking } => self.assign(lhs, rhs, *blocking, pending)?,
                VStmt::If {
                    cond,
                    then_body,
                    else_body,
                } => {
                    if self.eval_self(cond)?.is_zero() {
                        self.exec(else_body, pending)?;
                    } else {
                        self.exec(then_body, pending)?;
                    }
                }
                VStmt::Case {
                    selector,
                    arms,
                    default,
                    ..
                } => {
                    let key = self.index_value(selector)?;
                    let body = arms
                        .iter()
                        .find(|arm| Some(arm.item) == key)
                        .map_or(default.as_slice(), |arm| arm.body.as_slice());
                    self.exec(body, pending)?;
                }
                VStmt::For {
                    var,
                    start,
                    stop,
                    step,
                    body,
                } => {
                    let slot = self.slot(var)?;
                    let values = range_values(*start, *stop, *step);
                    let after = start.saturating_add(step.saturating_mul(values.len() as i64));
                    for v in values {
                        self.values[slot] = Bits::from_i64(self.slots[slot].width, v);
                        self.exec(body, pending)?;
                    }
                    self.values[slot] = Bits::from_i64(self.slots[slot].width, after);
                }
                VStmt::Fatal { message } => {
                    return Err(ExecError::Fatal {
                        message: message.clone(),
                    })
                }
            }
        }
        Ok(())
    }

    fn assign(
        &mut self,
        lhs: &VLValue,
        rhs: &VExpr,
        blocking: bool,
        pending: &mut Vec<Pending>,
    ) -> Result<(), ExecError> {
        let slot = self.slot(lhs.name())?;
        let slot_width = self.slots[slot].width;
        let (lo, width) = match lhs {
            VLValue::Ident(_) => (Some(0), slot_width),
            VLValue::Bit { index, .. } => (self.index_value(index)?, 1),
            VLValue::Range { msb, lsb, .. } => (Some(u64::from(*lsb)), msb - lsb + 1),
            VLValue::Part { lo, width, .. } => (self.index_value(lo)?, *width),
        };
        let context = width.max(self.self_width(rhs)?);
        let value = self
            .eval(rhs, context, self.is_signed(rhs)?)
            .map_err(|e| in_item(e, lhs.name()))?
            .truncate(width);
        let Some(lo) = lo.and_then(|l| u32::try_from(l).ok()) else {
            return Ok(());
        };
        if lo >= slot_width {
            return Ok(());
        }
        if blocking {
            self.values[slot] = self.values[slot].with_slice(lo, &value);
        } else {
            pending.push(Pending { slot, lo, value });
        }
        Ok(())
    }

    /// A self-determined expression read as a non-negative position; `None`
    /// for negative integers.
    fn index_value(&self, e: &VExpr) -> Result<Option<u64>, ExecError> {
        let signed = self.is_signed(e)?;
        let v = self.eval(e, self.self_width(e)?, signed)?;
        if signed && v.msb() {
            return Ok(None);
        }
        Ok(Some(v.to_u64().unwrap_or(u64::MAX)))
    }

    fn eval_self(&self, e: &VExpr) -> Result<Bits, ExecError> {
        self.eval(e, self.self_width(e)?, self.is_signed(e)?)
    }

    fn self_width(&self, e: &VExpr) -> Result<u32, ExecError> {
        Ok(match e {
            VExpr::Ident(name) => self.slots[self.slot(name)?].width,
            VExpr::Literal(b) => b.width(),
            VExpr::Int(_) => 32,
            VExpr::Unary { op, operand } => match op {
                UnaryOp::Not | UnaryOp::Neg => self.self_width(operand)?,
                _ => 1,
            },
            VExpr::Binary { op, lhs, rhs } => {
                if op.is_boolean() {
                    1
                } else if op.is_shift() {
                    self.self_width(lhs)?
                } else {
                    self.self_width(lhs)?.max(self.self_width(rhs)?)
                }
            }
            VExpr::Ternary {
                then_val, else_val, ..
            } => self.self_width(then_val)?.max(self.self_width(else_val)?),
            VExpr::Concat(parts) => {
                let mut total = 0;
                for p in parts {
                    total += self.self_width(p)?;
                }
                total
            }
            VExpr::Repeat { count, value } => count * self.self_width(value)?,
            VExpr::Bit { .. } => 1,
            VExpr::Range { msb, lsb, .. } => msb - lsb + 1,
            VExpr::Part { width, .. } => *width,
        })
    }

    fn is_signed(&self, e: &VExpr) -> Result<bool, ExecError> {
        Ok(match e {
            VExpr::Ident(name) => self.slots[self.slot(name)?].signed,
            VExpr::Int(_) => true,
            VExpr::Unary { op, operand } => {
                matches!(op, UnaryOp::Not | UnaryOp::Neg) && self.is_signed(operand)?
            }
            VExpr::Binary { op, lhs, rhs } => {
                if op.is_boolean() {
                    false
                } else if op.is_shift() {
                    self.is_signed(lhs)?
                } else {
                    self.is_signed(lhs)? && self.is_signed(rhs)?
                }
            }
            VExpr::Ternary {
                then_val, else_val, ..
            } => self.is_signed(then_val)? && self.is_signed(else_val)?,
            _ => false,
        })
    }

    /// Evaluates `e` in a context `width` bits wide; `signed` is the
    /// signedness of the whole context.
    fn eval(&self, e: &VExpr, width: u32, signed: bool) -> Result<Bits, ExecError> {
        let ext = |b: Bits, s: bool| b.fit(width, s);
        match e {
            VExpr::Ident(name) => Ok(ext(self.values[self.slot(name)?].clone(), signed)),
            VExpr::Literal(b) => Ok(ext(b.clone(), false)),
            VExpr::Int(v) => Ok(ext(Bits::from_i64(32, *v), signed)),
            VExpr::Unary { op, operand } => match op {
                UnaryOp::Not => Ok(!&self.eval(operand, width, signed)?),
                UnaryOp::Neg => Ok(self.eval(operand, width, signed)?.neg()),
                UnaryOp::LogicNot => {
                    let v = self.eval_self(operand)?;
                    Ok(ext(Bits::from_bool(v.is_zero()), false))
                }
                UnaryOp::RedAnd => Ok(ext(Bits::from_bool(self.eval_self(operand)?.reduce_and()), false)),
                UnaryOp::RedOr => Ok(ext(Bits::from_bool(self.eval_self(operand)?.reduce_or()), false)),
                UnaryOp::RedXor => Ok(ext(Bits::from_bool(self.eval_self(operand)?.reduce_xor()), false)),
            },
            VExpr::Binary { op, lhs, rhs } => self.binary(*op, lhs, rhs, width, signed),
            VExpr::Ternary {
                cond,
                then_val,
                else_val,
            } => {
                if self.eval_self(cond)?.is_zero() {
                    self.eval(else_val, width, signed)
                } else {
                    self.eval(then_val, width, signed)
                }
            }
            VExpr::Concat(parts) => {
                let values = parts
                    .iter()
                    .map(|p| self.eval_self(p))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(ext(Bits::concat(&values), false))
            }
            VExpr::Repeat { count, value } => {
                let v = self.eval_self(value)?;
                let parts = vec![v; *count as usize];
                Ok(ext(Bits::concat(&parts), false))
            }
            VExpr::Bit { name, index } => {
                let base = &self.values[self.slot(name)?];
                let bit = match self.index_value(index)? {
                    Some(i) if i < u64::from(base.width()) => base.bit(i as u32),
                    _ => false,
                };
                Ok(ext(Bits::from_bool(bit), false))
            }
            VExpr::Range { name, msb, lsb } => {
                let base = &self.values[self.slot(name)?];
                Ok(ext(base.slice(*lsb, msb - lsb + 1), false))
            }
            VExpr::Part { name, lo, width: w } => {
                let base = &self.values[self.slot(name)?];
                let part = match self.index_value(lo)? {
                    Some(l) if l < u64::from(base.width()) => base.slice(l as u32, *w),
                    _ => Bits::zero(*w),
                };
                Ok(ext(part, false))
            }
        }
    }

    fn binary(
        &self,
        op: BinaryOp,
        lhs: &VExpr,
        rhs: &VExpr,
        width: u32,
        signed: bool,
    ) -> Result<Bits, ExecError> {
        let flag = |b: bool| Bits::from_bool(b).zext(width);
        if op.is_comparison() {
            let w = self.self_width(lhs)?.max(self.self_width(rhs)?);
            let s = self.is_signed(lhs)? && self.is_signed(rhs)?;
            let a = self.eval(lhs, w, s)?;
            let b = self.eval(rhs, w, s)?;
            let ord = compare(&a, &b, s);
            return Ok(flag(match op {
                BinaryOp::Eq => ord == Ordering::Equal,
                BinaryOp::Ne => ord != Ordering::Equal,
                BinaryOp::Lt => ord == Ordering::Less,
                BinaryOp::Le => ord != Ordering::Greater,
                BinaryOp::Gt => ord == Ordering::Greater,
                _ => ord != Ordering::Less,
            }));
        }
        match op {
            BinaryOp::LogicAnd => {
                let a = !self.eval_self(lhs)?.is_zero();
                Ok(flag(a && !self.eval_self(rhs)?.is_zero()))
            }
            BinaryOp::LogicOr => {
                let a = !self.eval_self(lhs)?.is_zero();
                Ok(flag(a || !self.eval_self(rhs)?.is_zero()))
            }
            BinaryOp::Shl | BinaryOp::Shr => {
                let value = self.eval(lhs, width, signed)?;
                let amount = self.eval_self(rhs)?.to_u64().unwrap_or(u64::MAX);
                Ok(if op == BinaryOp::Shl {
                    value.shl(amount)
                } else {
                    value.shr(amount)
                })
            }
            _ => {
                let a = self.eval(lhs, width, signed)?;
                let b = self.eval(rhs, width, signed)?;
                let zero = || ExecError::DivisionByZero {
                    item: String::new(),
                };
                Ok(match op {
                    BinaryOp::Add => a.add(&b),
                    BinaryOp::Sub => a.sub(&b),
                    BinaryOp::Mul => a.mul(&b).truncate(width),
                    BinaryOp::Div if signed => signed_divmod(&a, &b, true).ok_or_else(zero)?,
                    BinaryOp::Rem if signed => signed_divmod(&a, &b, false).ok_or_else(zero)?,
                    BinaryOp::Div => a.checked_div(&b).ok_or_else(zero)?,
                    BinaryOp::Rem => a.checked_rem(&b).ok_or_else(zero)?,
                    BinaryOp::And => &a & &b,
                    BinaryOp::Or => &a | &b,
                    _ => &a ^ &b,
                })
            }
        }
    }
}

fn compare(a: &Bits, b: &Bits, signed: bool) -> Ordering {
    if signed && a.msb() != b.msb() {
        return if a.msb() {
            Ordering::Less
        } else {
            Ordering::Greater
        };
    }
    a.cmp_unsigned(b)
}

/// Two's-complement division or remainder, truncating toward zero.
fn signed_divmod(a: &Bits, b: &Bits, quotient: bool) -> Option<Bits> {
    let magnitude = |v: &Bits| if v.msb() { v.neg() } else { v.clone() };
    let (ma, mb) = (magnitude(a), magnitude(b));
    if quotient {
        let q = ma.checked_div(&mb)?;
        Some(if a.msb() != b.msb() { q.neg() } else { q })
    } else {
        let r = ma.checked_rem(&mb)?;
        Some(if a.msb() { r.neg() } else { r })
    }
}

fn in_item(err: ExecError, name: &str) -> ExecError {
    match err {
        ExecError::DivisionByZero { .. } => ExecError::DivisionByZero {
            item: name.to_string(),
        },
        other => other,
    }
}

/// Slots an expression reads.
fn expr_reads(expr: &VExpr, index: &HashMap<String, usize>, out: &mut Vec<usize>) {
    let name = |n: &str, out: &mut Vec<usize>| {
        if let Some(slot) = index.get(n) {
            out.push(*slot);
        }
    };
    match expr {
        VExpr::Ident(n) | VExpr::Range { name: n, .. } => name(n, out),
        VExpr::Literal(_) | VExpr::Int(_) => {}
        VExpr::Unary { operand, .. } => expr_reads(operand, index, out),
        VExpr::Binary { lhs, rhs, .. } => {
            expr_reads(lhs, index, out);
            expr_reads(rhs, index, out);
        }
        VExpr::Ternary {
            cond,
            then_val,
            else_val,
        } => {
            expr_reads(cond, index, out);
            expr_reads(then_val, index, out);
            expr_reads(else_val, index, out);
        }
        VExpr::Concat(parts) => {
            for part in parts {
                expr_reads(part, index, out);
            }
        }
        VExpr::Repeat { value, .. } => expr_reads(value, index, out),
        VExpr::Bit { name: n, index: i } => {
            name(n, out);
            expr_reads(i, index, out);
        }
        VExpr::Part { name: n, lo, .. } => {
            name(n, out);
            expr_reads(lo, index, out);
        }
    }
}

/// Slots read by the position expressions of an assignment target.
fn lvalue_reads(lhs: &VLValue, index: &HashMap<String, usize>, out: &mut Vec<usize>) {
    match lhs {
        VLValue::Bit { index: i, .. } => expr_reads(i, index, out),
        VLValue::Part { lo, .. } => expr_reads(lo, index, out),
        VLValue::Ident(_) | VLValue::Range { .. } => {}
    }
}

fn empty_module() -> LoweredModule {
    LoweredModule {
        name: String::new(),
        ports: Vec::new(),
        decls: Vec::new(),
        items: Vec::new(),
        clock: None,
    }
}
