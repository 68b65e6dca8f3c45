//! Rule body execution.
//!
//! [`RuleExec`] runs one rule against the net storage. Immediate assignments
//! to signals land in storage right away, so later statements of the same
//! rule read them back. Deferred assignments collect into a pending map that
//! the simulator commits after every sequential rule has run.

use std::collections::{BTreeMap, HashMap};

use ember_analyze::width::{expr_type, resolve_field, target_type};
use ember_analyze::{
    expr_width, fold_int, range_values, static_slice_width, DesignAnalysis, LocalScope, RuleUsage,
    Width,
};
use ember_common::{Bits, Ident, InternalError};
use ember_config::IndexPolicy;
use ember_ir::{ArrayId, Design, Expr, NetId, RuleId, SignalId, Stmt, Target};

use crate::error::SimError;
use crate::value::{binary, unary, OpError, Value};

/// Where a resolved assignment lands.
#[derive(Debug, Clone, Copy)]
enum Slot {
    Net(NetId),
    Temp(Ident),
}

/// A bit range inside a slot. Writes are clipped at `limit`, the end of the
/// enclosing range.
#[derive(Debug, Clone, Copy)]
struct Place {
    slot: Slot,
    lo: u32,
    width: u32,
    limit: u32,
    signed: bool,
}

/// Executes one rule body.
pub(crate) struct RuleExec<'a> {
    design: &'a Design,
    analysis: &'a DesignAnalysis,
    usage: &'a RuleUsage,
    rule: RuleId,
    readable: &'a [bool],
    policy: IndexPolicy,
    values: &'a mut [Bits],
    pending: Option<&'a mut BTreeMap<NetId, Bits>>,
    temps: HashMap<Ident, Bits>,
    loops: Vec<(Ident, i64)>,
}

impl LocalScope for RuleExec<'_> {
    fn local_width(&self, name: Ident) -> Option<u32> {
        self.usage.local_width(name)
    }

    fn is_loop_var(&self, name: Ident) -> bool {
        self.loops.iter().any(|(n, _)| *n == name)
    }
}

impl<'a> RuleExec<'a> {
    /// Prepares to run `rule`. Sequential rules need a pending map.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        design: &'a Design,
        analysis: &'a DesignAnalysis,
        rule: RuleId,
        readable: &'a [bool],
        policy: IndexPolicy,
        values: &'a mut [Bits],
        pending: Option<&'a mut BTreeMap<NetId, Bits>>,
    ) -> Self {
        Self {
            design,
            analysis,
            usage: analysis.usage(rule),
            rule,
            readable,
            policy,
            values,
            pending,
            temps: HashMap::new(),
            loops: Vec::new(),
        }
    }

    /// Runs the rule body once.
    pub(crate) fn run(mut self) -> Result<(), SimError> {
        let design = self.design;
        self.exec(&design.rules[self.rule].body)
    }

    fn path(&self) -> String {
        self.design.rule_path(self.rule)
    }

    fn internal(&self, message: impl Into<String>) -> SimError {
        SimError::Internal {
            rule: self.path(),
            source: InternalError::new(message),
        }
    }

    fn op_error(&self, err: OpError) -> SimError {
        match err {
            OpError::DivisionByZero => SimError::DivisionByZero { rule: self.path() },
            OpError::Unsized => self.internal("operator applied to an unsized integer"),
        }
    }

    fn loop_value(&self, name: Ident) -> Option<i64> {
        self.loops
            .iter()
            .rev()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| *v)
    }

    fn exec(&mut self, stmt: &Stmt) -> Result<(), SimError> {
        match stmt {
            Stmt::Nop => Ok(()),
            Stmt::Block(stmts) => stmts.iter().try_for_each(|s| self.exec(s)),
            Stmt::Let { name, value, .. } => {
                let width = self
                    .usage
                    .local_width(*name)
                    .ok_or_else(|| self.internal("temporary without a width"))?;
                let v = self.eval(value)?.to_width(width, false);
                self.temps.insert(*name, v);
                Ok(())
            }
            Stmt::Assign { target, value } => {
                let v = self.eval(value)?;
                self.store(target, &v, false)
            }
            Stmt::AssignNext { target, value } => {
                let v = self.eval(value)?;
                self.store(target, &v, true)
            }
            Stmt::If {
                cond,
                then_body,
                else_body,
            } => {
                if self.eval(cond)?.is_true() {
                    self.exec(then_body)
                } else if let Some(e) = else_body {
                    self.exec(e)
                } else {
                    Ok(())
                }
            }
            Stmt::For {
                var,
                start,
                stop,
                step,
                body,
            } => {
                let bound = |e: &Expr| fold_int(e, &|n| self.loop_value(n));
                let (Some(start), Some(stop)) = (bound(start), bound(stop)) else {
                    return Err(self.internal("loop bounds are not static"));
                };
                for v in range_values(start, stop, *step) {
                    self.loops.push((*var, v));
                    let result = self.exec(body);
                    self.loops.pop();
                    result?;
                }
                Ok(())
            }
            Stmt::While { .. } => Err(self.internal("while loop reached the evaluator")),
        }
    }

    fn read_signal(&self, signal: SignalId) -> Result<Bits, SimError> {
        let net = self.analysis.nets.net_of(signal);
        if !self.readable[net.index()] {
            return Err(SimError::UndrivenSignal {
                signal: self.design.signal_path(signal),
                rule: self.path(),
            });
        }
        Ok(self.values[net.index()].clone())
    }

    fn select(&self, array: ArrayId, index: &Value) -> Result<SignalId, SimError> {
        let elements = &self.design.arrays[array].elements;
        let position = index.as_index().and_then(|i| usize::try_from(i).ok());
        if let Some(s) = position.and_then(|i| elements.get(i)) {
            return Ok(*s);
        }
        match (self.policy, elements.last()) {
            (IndexPolicy::Clamp, Some(last)) => Ok(*last),
            _ => Err(SimError::IndexOutOfRange {
                rule: self.path(),
                array: self.design.array_path(array),
                index: index.as_index().unwrap_or(u64::MAX),
                len: elements.len(),
            }),
        }
    }

    fn sized(&self, value: Value) -> Result<Bits, SimError> {
        match value {
            Value::Bits(b) => Ok(b),
            Value::Int(_) => Err(self.internal("unsized integer where a sized value is required")),
        }
    }

    fn slice_width(&self, lo: &Expr, hi: &Expr) -> Result<u32, SimError> {
        static_slice_width(lo, hi).ok_or_else(|| self.internal("slice width is not static"))
    }

    fn eval(&self, expr: &Expr) -> Result<Value, SimError> {
        match expr {
            Expr::Signal(s) => Ok(Value::Bits(self.read_signal(*s)?)),
            Expr::Const(b) => Ok(Value::Bits(b.clone())),
            Expr::Int(v) => Ok(Value::Int(*v)),
            Expr::Local(name) => {
                if let Some(v) = self.loop_value(*name) {
                    return Ok(Value::Int(v));
                }
                self.temps
                    .get(name)
                    .map(|b| Value::Bits(b.clone()))
                    .ok_or_else(|| self.internal("temporary read before assignment"))
            }
            Expr::Unary { op, operand } => {
                let v = self.eval(operand)?;
                unary(*op, &v).map_err(|e| self.op_error(e))
            }
            Expr::Binary { op, lhs, rhs } => {
                let a = self.eval(lhs)?;
                let b = self.eval(rhs)?;
                binary(*op, &a, &b).map_err(|e| self.op_error(e))
            }
            Expr::Mux {
                cond,
                then_val,
                else_val,
            } => {
                let chosen = if self.eval(cond)?.is_true() {
                    then_val
                } else {
                    else_val
                };
                let v = self.eval(chosen)?;
                match expr_width(self.design, self, expr) {
                    Ok(Width::Sized(w)) => Ok(Value::Bits(v.to_width(w, false))),
                    Ok(Width::Unsized) => Ok(v),
                    Err(_) => Err(self.internal("mux width is not static")),
                }
            }
            Expr::Concat(parts) => {
                let bits = parts
                    .iter()
                    .map(|p| self.eval(p).and_then(|v| self.sized(v)))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::Bits(Bits::concat(&bits)))
            }
            Expr::Zext { value, width } => Ok(Value::Bits(self.eval(value)?.to_width(*width, false))),
            Expr::Sext { value, width } => Ok(Value::Bits(self.eval(value)?.to_width(*width, true))),
            Expr::Index { base, index } => {
                let base = self.eval(base).and_then(|v| self.sized(v))?;
                let bit = match self.eval(index)?.as_index() {
                    Some(i) if i < u64::from(base.width()) => base.bit(i as u32),
                    _ => false,
                };
                Ok(Value::Bits(Bits::from_bool(bit)))
            }
            Expr::Slice { base, lo, hi } => {
                let width = self.slice_width(lo, hi)?;
                let base = self.eval(base).and_then(|v| self.sized(v))?;
                let out = match self.eval(lo)?.as_index() {
                    Some(l) if l < u64::from(base.width()) => base.slice(l as u32, width),
                    _ => Bits::zero(width),
                };
                Ok(Value::Bits(out))
            }
            Expr::Field { base, field } => {
                let info = resolve_field(self.design, expr_type(self.design, base), *field)
                    .map_err(|_| self.internal("field access on a non-struct value"))?;
                let base = self.eval(base).and_then(|v| self.sized(v))?;
                Ok(Value::Bits(base.slice(info.offset, info.width)))
            }
            Expr::Element { array, index } => {
                let index = self.eval(index)?;
                let signal = self.select(*array, &index)?;
                Ok(Value::Bits(self.read_signal(signal)?))
            }
            Expr::Call { .. } => Err(self.internal("call reached the evaluator")),
        }
    }

    /// Resolves a target to a slot and bit range. `None` means the write
    /// falls entirely outside its base and is dropped.
    fn place(&self, target: &Target) -> Result<Option<Place>, SimError> {
        let whole = |slot: Slot, width: u32, signed: bool| Place {
            slot,
            lo: 0,
            width,
            limit: width,
            signed,
        };
        match target {
            Target::Signal(s) => Ok(Some(whole(
                Slot::Net(self.analysis.nets.net_of(*s)),
                self.design.signal_width(*s),
                self.design.signal_signed(*s),
            ))),
            Target::Local(name) => {
                let width = self
                    .usage
                    .local_width(*name)
                    .ok_or_else(|| self.internal("temporary without a width"))?;
                Ok(Some(whole(Slot::Temp(*name), width, false)))
            }
            Target::Element { array, index } => {
                let index = self.eval(index)?;
                let s = self.select(*array, &index)?;
                Ok(Some(whole(
                    Slot::Net(self.analysis.nets.net_of(s)),
                    self.design.signal_width(s),
                    self.design.signal_signed(s),
                )))
            }
            Target::Index { base, index } => {
                let Some(outer) = self.place(base)? else {
                    return Ok(None);
                };
                let position = self.eval(index)?.as_index();
                Ok(narrow(outer, position, 1, false))
            }
            Target::Slice { base, lo, hi } => {
                let width = self.slice_width(lo, hi)?;
                let Some(outer) = self.place(base)? else {
                    return Ok(None);
                };
                let position = self.eval(lo)?.as_index();
                Ok(narrow(outer, position, width, false))
            }
            Target::Field { base, field } => {
                let info = resolve_field(self.design, target_type(self.design, base), *field)
                    .map_err(|_| self.internal("field access on a non-struct target"))?;
                let Some(outer) = self.place(base)? else {
                    return Ok(None);
                };
                let signed = self.design.types.is_signed(info.ty);
                Ok(narrow(outer, Some(u64::from(info.offset)), info.width, signed))
            }
        }
    }

    fn store(&mut self, target: &Target, value: &Value, deferred: bool) -> Result<(), SimError> {
        let Some(place) = self.place(target)? else {
            return Ok(());
        };
        let kept = place.width.min(place.limit.saturating_sub(place.lo));
        let bits = value.to_width(place.width, place.signed).truncate(kept);
        match place.slot {
            Slot::Temp(name) => {
                let width = self.usage.local_width(name).unwrap_or(place.limit);
                let current = self.temps.remove(&name).unwrap_or_else(|| Bits::zero(width));
                self.temps.insert(name, current.with_slice(place.lo, &bits));
            }
            Slot::Net(net) if deferred => {
                let current = &self.values[net.index()];
                let pending = self
                    .pending
                    .as_deref_mut()
                    .ok_or_else(|| SimError::Internal {
                        rule: self.design.rule_path(self.rule),
                        source: InternalError::new("deferred assignment outside a sequential rule"),
                    })?;
                let slot = pending.entry(net).or_insert_with(|| current.clone());
                *slot = slot.with_slice(place.lo, &bits);
            }
            Slot::Net(net) => {
                let current = &self.values[net.index()];
                self.values[net.index()] = current.with_slice(place.lo, &bits);
            }
        }
        Ok(())
    }
}

/// Narrows `outer` to `width` bits at `position`, clipping at the outer range.
fn narrow(outer: Place, position: Option<u64>, width: u32, signed: bool) -> Option<Place> {
    let position = position.filter(|p| *p < u64::from(outer.width))? as u32;
    Some(Place {
        slot: outer.slot,
        lo: outer.lo + position,
        width,
        limit: outer.limit.min(outer.lo + outer.width),
        signed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_diagnostics::DiagnosticSink;
    use ember_ir::{BinaryOp, DesignBuilder};

    fn run_once(design: &Design, rule: RuleId, values: &mut [Bits], policy: IndexPolicy) -> Result<(), SimError> {
        let analysis = ember_analyze::analyze_design(design, &DiagnosticSink::new())?;
        let readable = vec![true; analysis.nets.len()];
        RuleExec::new(design, &analysis, rule, &readable, policy, values, None).run()
    }

    #[test]
    fn immediate_writes_are_read_back() {
        let mut b = DesignBuilder::new("top");
        let top = b.top();
        let a = b.input(top, "a", 8);
        let w = b.wire(top, "w", 8);
        let y = b.output(top, "y", 8);
        let r = b.comb(
            top,
            "twice",
            Stmt::block(vec![
                Stmt::assign(w, Expr::binary(BinaryOp::Add, a.into(), Expr::int(1))),
                Stmt::assign(y, Expr::binary(BinaryOp::Add, w.into(), w.into())),
            ]),
        );
        let d = b.finish().unwrap();
        let mut values = vec![Bits::truncated(8, 20), Bits::zero(8), Bits::zero(8)];
        run_once(&d, r, &mut values, IndexPolicy::Error).unwrap();
        assert_eq!(values[1], Bits::truncated(8, 21));
        assert_eq!(values[2], Bits::truncated(8, 42));
    }

    #[test]
    fn partial_writes_merge() {
        let mut b = DesignBuilder::new("top");
        let top = b.top();
        let a = b.input(top, "a", 4);
        let y = b.output(top, "y", 8);
        let r = b.comb(
            top,
            "halves",
            Stmt::block(vec![
                Stmt::assign(Target::signal(y).bits(4, 8), a),
                Stmt::assign(Target::signal(y).bits(0, 4), Expr::lit(4, 0x5)),
            ]),
        );
        let d = b.finish().unwrap();
        let mut values = vec![Bits::truncated(4, 0xc), Bits::zero(8)];
        run_once(&d, r, &mut values, IndexPolicy::Error).unwrap();
        assert_eq!(values[1], Bits::truncated(8, 0xc5));
    }

    #[test]
    fn signed_targets_sign_extend() {
        let mut b = DesignBuilder::new("top");
        let top = b.top();
        let a = b.input(top, "a", 4);
        let s8 = b.bits_type(8, true);
        let y = b.signal(top, "y", s8, ember_ir::SignalKind::Port(ember_ir::PortDirection::Output));
        let r = b.comb(top, "widen", Stmt::assign(y, a));
        let d = b.finish().unwrap();
        let mut values = vec![Bits::truncated(4, 0b1010), Bits::zero(8)];
        run_once(&d, r, &mut values, IndexPolicy::Error).unwrap();
        assert_eq!(values[1], Bits::truncated(8, 0xfa));
    }

    #[test]
    fn dynamic_element_respects_policy() {
        let mut b = DesignBuilder::new("top");
        let top = b.top();
        let byte = b.bits_type(8, false);
        let (arr, _) = b.signal_array(
            top,
            "r",
            3,
            byte,
            ember_ir::SignalKind::Port(ember_ir::PortDirection::Input),
        );
        let sel = b.input(top, "sel", 2);
        let y = b.output(top, "y", 8);
        let r = b.comb(top, "pick", Stmt::assign(y, Expr::element(arr, sel.into())));
        let d = b.finish().unwrap();
        let fresh = || {
            vec![
                Bits::truncated(8, 10),
                Bits::truncated(8, 11),
                Bits::truncated(8, 12),
                Bits::truncated(2, 3),
                Bits::zero(8),
            ]
        };
        let mut values = fresh();
        run_once(&d, r, &mut values, IndexPolicy::Clamp).unwrap();
        assert_eq!(values[4], Bits::truncated(8, 12));

        let mut values = fresh();
        let err = run_once(&d, r, &mut values, IndexPolicy::Error).unwrap_err();
        assert_eq!(
            err,
            SimError::IndexOutOfRange {
                rule: "top::pick".into(),
                array: "top.r".into(),
                index: 3,
                len: 3,
            }
        );
    }

    #[test]
    fn mux_result_takes_the_wider_branch() {
        let mut b = DesignBuilder::new("top");
        let top = b.top();
        let c = b.input(top, "c", 1);
        let a = b.input(top, "a", 4);
        let y = b.output(top, "y", 8);
        let r = b.comb(
            top,
            "pick",
            Stmt::assign(
                y,
                Expr::binary(
                    BinaryOp::Add,
                    Expr::mux(c.into(), a.into(), Expr::lit(8, 0)),
                    Expr::lit(4, 1),
                ),
            ),
        );
        let d = b.finish().unwrap();
        // the carry survives only if the mux result is already 8 bits wide
        let mut values = vec![Bits::truncated(1, 1), Bits::truncated(4, 0xf), Bits::zero(8)];
        run_once(&d, r, &mut values, IndexPolicy::Error).unwrap();
        assert_eq!(values[2], Bits::truncated(8, 0x10));
    }

    #[test]
    fn division_by_zero_names_the_rule() {
        let mut b = DesignBuilder::new("top");
        let top = b.top();
        let a = b.input(top, "a", 4);
        let z = b.input(top, "z", 4);
        let y = b.output(top, "y", 4);
        let r = b.comb(top, "div", Stmt::assign(y, Expr::binary(BinaryOp::Div, a.into(), z.into())));
        let d = b.finish().unwrap();
        let mut values = vec![Bits::truncated(4, 3), Bits::zero(4), Bits::zero(4)];
        assert_eq!(
            run_once(&d, r, &mut values, IndexPolicy::Error),
            Err(SimError::DivisionByZero {
                rule: "top::div".into()
            })
        );
    }
}
