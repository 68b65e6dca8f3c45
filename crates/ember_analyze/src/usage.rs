//! Per-rule read/write analysis.
//!
//! A single structural walk over a rule body collects the signals it reads and
//! writes. Conditionals fork the walk state and intersect write coverage at the
//! merge; loops with static bounds are unrolled logically, so an array element
//! selected by a loop-derived index resolves to a concrete signal. Any other
//! index stays dynamic and the read or write covers the whole array.

use std::collections::{HashMap, HashSet};

use ember_common::Ident;
use ember_ir::{Design, Expr, RuleId, RuleKind, SignalId, Stmt, Target};

use crate::error::AnalyzeError;
use crate::width::{
    expr_width, fold_int, min_width, resolve_field, static_slice_width, target_type,
    target_width, LocalScope, Width, WidthError,
};

/// Upper bound on the trip count of a single loop.
pub const MAX_TRIP_COUNT: usize = 1 << 16;

/// Whether a signal is written on every path through a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coverage {
    /// Every bit is assigned on every path.
    Definite,
    /// Some path leaves some bit unassigned.
    Conditional,
}

/// What one rule reads and writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleUsage {
    /// The analyzed rule.
    pub rule: RuleId,
    /// Combinational or sequential.
    pub kind: RuleKind,
    /// Signals read before this rule fully assigns them, in first-read order.
    ///
    /// Only these reads create combinational dependencies. A signal the rule
    /// has already assigned in full on the current path is read back from
    /// the rule's own write and is not listed.
    pub reads: Vec<SignalId>,
    /// Array elements reachable through run-time indices.
    pub dynamic_reads: Vec<SignalId>,
    /// Written signals in first-write order.
    pub writes: Vec<(SignalId, Coverage)>,
    /// Temporaries and their widths in declaration order.
    pub locals: Vec<(Ident, u32)>,
}

impl RuleUsage {
    /// Returns the coverage of `signal`, or `None` if the rule never writes it.
    pub fn coverage(&self, signal: SignalId) -> Option<Coverage> {
        self.writes
            .iter()
            .find(|(s, _)| *s == signal)
            .map(|(_, c)| *c)
    }

    /// Returns `true` if the rule writes `signal` on some path.
    pub fn writes_signal(&self, signal: SignalId) -> bool {
        self.coverage(signal).is_some()
    }

    /// Returns the declared width of a temporary.
    pub fn local_width(&self, name: Ident) -> Option<u32> {
        self.locals.iter().find(|(n, _)| *n == name).map(|(_, w)| *w)
    }

    /// Static and dynamic reads together.
    pub fn all_reads(&self) -> impl Iterator<Item = SignalId> + '_ {
        self.reads.iter().chain(self.dynamic_reads.iter()).copied()
    }

    /// Signals written on only some paths.
    pub fn conditional_writes(&self) -> impl Iterator<Item = SignalId> + '_ {
        self.writes
            .iter()
            .filter(|(_, c)| *c == Coverage::Conditional)
            .map(|(s, _)| *s)
    }
}

/// Bits of one signal assigned on the current path.
#[derive(Debug, Clone)]
struct BitCover {
    bits: Vec<bool>,
}

impl BitCover {
    fn new(width: u32) -> Self {
        Self {
            bits: vec![false; width as usize],
        }
    }

    fn set(&mut self, lo: u32, width: u32) {
        let end = (lo + width).min(self.bits.len() as u32);
        for i in lo..end {
            self.bits[i as usize] = true;
        }
    }

    fn is_full(&self) -> bool {
        self.bits.iter().all(|b| *b)
    }

    fn intersect(&mut self, other: &BitCover) {
        for (a, b) in self.bits.iter_mut().zip(&other.bits) {
            *a = *a && *b;
        }
    }
}

/// Facts that hold along the current control path.
#[derive(Debug, Clone, Default)]
struct PathState {
    cover: HashMap<SignalId, BitCover>,
    assigned: HashSet<Ident>,
}

impl PathState {
    fn merge(mut self, other: PathState) -> PathState {
        self.cover.retain(|sig, cover| match other.cover.get(sig) {
            Some(o) => {
                cover.intersect(o);
                true
            }
            None => false,
        });
        self.assigned.retain(|n| other.assigned.contains(n));
        self
    }
}

/// Where an assignment lands.
enum Resolved {
    /// One signal; `bits` is the static `(lo, width)` range when known.
    Signal {
        signal: SignalId,
        bits: Option<(u32, u32)>,
    },
    /// Every element of an array, through a run-time index.
    Dynamic(Vec<SignalId>),
    /// A temporary; `full` when the whole temporary is assigned.
    Local { name: Ident, full: bool },
}

struct RuleAnalyzer<'a> {
    design: &'a Design,
    rule: RuleId,
    kind: RuleKind,
    locals: Vec<(Ident, u32)>,
    loops: Vec<(Ident, i64)>,
    reads: Vec<SignalId>,
    read_set: HashSet<SignalId>,
    dynamic_reads: Vec<SignalId>,
    dynamic_set: HashSet<SignalId>,
    writes: Vec<SignalId>,
    state: PathState,
}

impl LocalScope for RuleAnalyzer<'_> {
    fn local_width(&self, name: Ident) -> Option<u32> {
        self.locals.iter().find(|(n, _)| *n == name).map(|(_, w)| *w)
    }

    fn is_loop_var(&self, name: Ident) -> bool {
        self.loops.iter().any(|(n, _)| *n == name)
    }
}

/// Analyzes one rule body.
pub fn analyze_rule(design: &Design, rule: RuleId) -> Result<RuleUsage, AnalyzeError> {
    let r = &design.rules[rule];
    let mut analyzer = RuleAnalyzer {
        design,
        rule,
        kind: r.kind,
        locals: Vec::new(),
        loops: Vec::new(),
        reads: Vec::new(),
        read_set: HashSet::new(),
        dynamic_reads: Vec::new(),
        dynamic_set: HashSet::new(),
        writes: Vec::new(),
        state: PathState::default(),
    };
    analyzer.stmt(&r.body)?;
    let writes = analyzer
        .writes
        .iter()
        .map(|s| {
            let full = analyzer.state.cover.get(s).is_some_and(BitCover::is_full);
            let coverage = if full {
                Coverage::Definite
            } else {
                Coverage::Conditional
            };
            (*s, coverage)
        })
        .collect();
    Ok(RuleUsage {
        rule,
        kind: r.kind,
        reads: analyzer.reads,
        dynamic_reads: analyzer.dynamic_reads,
        writes,
        locals: analyzer.locals,
    })
}

impl RuleAnalyzer<'_> {
    fn path(&self) -> String {
        self.design.rule_path(self.rule)
    }

    fn unsupported(&self, construct: impl Into<String>) -> AnalyzeError {
        AnalyzeError::UnsupportedConstruct {
            rule: self.path(),
            construct: construct.into(),
        }
    }

    fn ambiguous(&self, detail: impl Into<String>) -> AnalyzeError {
        AnalyzeError::AmbiguousWidth {
            rule: self.path(),
            detail: detail.into(),
        }
    }

    fn lift(&self, err: WidthError) -> AnalyzeError {
        match err {
            WidthError::Ambiguous(detail) => self.ambiguous(detail),
            WidthError::Unsupported(construct) => self.unsupported(construct),
            WidthError::UnknownField(field) => ember_ir::ElabError::UnknownField {
                user: self.path(),
                field,
            }
            .into(),
        }
    }

    fn width(&self, expr: &Expr) -> Result<Width, AnalyzeError> {
        expr_width(self.design, self, expr).map_err(|e| self.lift(e))
    }

    fn fold(&self, expr: &Expr) -> Option<i64> {
        fold_int(expr, &|name| {
            self.loops
                .iter()
                .rev()
                .find(|(n, _)| *n == name)
                .map(|(_, v)| *v)
        })
    }

    fn name(&self, ident: Ident) -> &str {
        self.design.name(ident)
    }

    fn stmt(&mut self, stmt: &Stmt) -> Result<(), AnalyzeError> {
        match stmt {
            Stmt::Nop => Ok(()),
            Stmt::Block(stmts) => stmts.iter().try_for_each(|s| self.stmt(s)),
            Stmt::Let { name, width, value } => self.declare(*name, *width, value),
            Stmt::Assign { target, value } => self.assign(target, value, false),
            Stmt::AssignNext { target, value } => self.assign(target, value, true),
            Stmt::If {
                cond,
                then_body,
                else_body,
            } => {
                self.read_expr(cond)?;
                self.width(cond)?;
                if let Some(v) = self.fold(cond) {
                    return match (v != 0, else_body) {
                        (true, _) => self.stmt(then_body),
                        (false, Some(e)) => self.stmt(e),
                        (false, None) => Ok(()),
                    };
                }
                let before = self.state.clone();
                self.stmt(then_body)?;
                let taken = std::mem::replace(&mut self.state, before);
                if let Some(e) = else_body {
                    self.stmt(e)?;
                }
                let skipped = std::mem::take(&mut self.state);
                self.state = taken.merge(skipped);
                Ok(())
            }
            Stmt::For {
                var,
                start,
                stop,
                step,
                body,
            } => self.unroll(*var, start, stop, *step, body),
            Stmt::While { .. } => Err(self.unsupported("while loop without a static bound")),
        }
    }

    fn declare(&mut self, name: Ident, width: Option<u32>, value: &Expr) -> Result<(), AnalyzeError> {
        if self.is_loop_var(name) {
            return Err(self.unsupported(format!(
                "temporary `{}` shadows a loop variable",
                self.name(name)
            )));
        }
        self.read_expr(value)?;
        let value_width = self.width(value)?;
        let w = match (width, value_width) {
            (Some(0), _) => {
                return Err(self.unsupported(format!(
                    "temporary `{}` declared with zero width",
                    self.name(name)
                )))
            }
            (Some(w), _) => w,
            (None, Width::Sized(w)) => w,
            (None, Width::Unsized) => match fold_int(value, &|_| None) {
                Some(v) if v >= 0 => min_width(v as u64),
                _ => {
                    return Err(self.ambiguous(format!(
                        "cannot infer the width of temporary `{}` from an unsized value",
                        self.name(name)
                    )))
                }
            },
        };
        match self.local_width(name) {
            Some(existing) if existing != w => {
                return Err(self.unsupported(format!(
                    "temporary `{}` redeclared with width {w} (was {existing})",
                    self.name(name)
                )))
            }
            Some(_) => {}
            None => self.locals.push((name, w)),
        }
        self.state.assigned.insert(name);
        Ok(())
    }

    fn assign(&mut self, target: &Target, value: &Expr, deferred: bool) -> Result<(), AnalyzeError> {
        let mut root = target;
        loop {
            match root {
                Target::Index { base, .. }
                | Target::Slice { base, .. }
                | Target::Field { base, .. } => root = base,
                _ => break,
            }
        }
        match root {
            Target::Local(name) if deferred => {
                return Err(self.unsupported(format!(
                    "deferred assignment to temporary `{}`",
                    self.name(*name)
                )))
            }
            Target::Local(_) => {}
            _ if deferred && self.kind == RuleKind::Combinational => {
                return Err(self.unsupported(
                    "deferred assignment in a combinational rule",
                ))
            }
            _ if !deferred && self.kind == RuleKind::Sequential => {
                return Err(self.unsupported(
                    "immediate assignment to a signal in a sequential rule",
                ))
            }
            _ => {}
        }

        self.read_expr(value)?;
        self.width(value)?;
        target_width(self.design, &*self, target).map_err(|e| self.lift(e))?;
        match self.resolve(target)? {
            Resolved::Signal { signal, bits } => {
                self.record_write(signal);
                if let Some((lo, width)) = bits {
                    let sig_width = self.design.signal_width(signal);
                    self.state
                        .cover
                        .entry(signal)
                        .or_insert_with(|| BitCover::new(sig_width))
                        .set(lo, width);
                }
            }
            Resolved::Dynamic(signals) => {
                for s in signals {
                    self.record_write(s);
                }
            }
            Resolved::Local { name, full } => {
                if full {
                    self.state.assigned.insert(name);
                } else if !self.state.assigned.contains(&name) {
                    return Err(self.unsupported(format!(
                        "partial assignment to temporary `{}` before it is assigned",
                        self.name(name)
                    )));
                }
            }
        }
        Ok(())
    }

    fn record_write(&mut self, signal: SignalId) {
        if !self.writes.contains(&signal) {
            self.writes.push(signal);
        }
    }

    /// Resolves a target to the storage it writes, recording index reads.
    fn resolve(&mut self, target: &Target) -> Result<Resolved, AnalyzeError> {
        match target {
            Target::Signal(s) => Ok(Resolved::Signal {
                signal: *s,
                bits: Some((0, self.design.signal_width(*s))),
            }),
            Target::Local(name) => Ok(Resolved::Local {
                name: *name,
                full: true,
            }),
            Target::Element { array, index } => {
                self.read_expr(index)?;
                match self.static_element(*array, index)? {
                    Some(signal) => Ok(Resolved::Signal {
                        signal,
                        bits: Some((0, self.design.signal_width(signal))),
                    }),
                    None => Ok(Resolved::Dynamic(self.design.arrays[*array].elements.clone())),
                }
            }
            Target::Index { base, index } => {
                let inner = self.resolve(base)?;
                self.read_expr(index)?;
                let base_width = target_width(self.design, &*self, base).map_err(|e| self.lift(e))?;
                let offset = self.static_range(index, None, base_width)?;
                Ok(narrow(inner, offset.map(|lo| (lo, 1))))
            }
            Target::Slice { base, lo, hi } => {
                let inner = self.resolve(base)?;
                self.read_expr(lo)?;
                self.read_expr(hi)?;
                let base_width = target_width(self.design, &*self, base).map_err(|e| self.lift(e))?;
                let width = static_slice_width(lo, hi)
                    .ok_or_else(|| self.ambiguous("slice width cannot be determined statically"))?;
                let offset = self.static_range(lo, Some(width), base_width)?;
                Ok(narrow(inner, offset.map(|l| (l, width))))
            }
            Target::Field { base, field } => {
                let inner = self.resolve(base)?;
                let info = resolve_field(self.design, target_type(self.design, base), *field)
                    .map_err(|e| self.lift(e))?;
                Ok(narrow(inner, Some((info.offset, info.width))))
            }
        }
    }

    /// Folds a bit position and checks a static range against `base_width`.
    ///
    /// Returns `None` for positions only known at run time.
    fn static_range(
        &self,
        lo: &Expr,
        width: Option<u32>,
        base_width: u32,
    ) -> Result<Option<u32>, AnalyzeError> {
        let Some(lo) = self.fold(lo) else {
            return Ok(None);
        };
        let width = i64::from(width.unwrap_or(1));
        if lo < 0 || lo + width > i64::from(base_width) {
            return Err(self.unsupported(format!(
                "bits [{lo}:{}) out of range for a {base_width}-bit value",
                lo + width
            )));
        }
        Ok(Some(lo as u32))
    }

    /// Resolves a loop-derived index to a concrete element.
    fn static_element(
        &self,
        array: ember_ir::ArrayId,
        index: &Expr,
    ) -> Result<Option<SignalId>, AnalyzeError> {
        let Some(i) = self.fold(index) else {
            return Ok(None);
        };
        let elements = &self.design.arrays[array].elements;
        usize::try_from(i)
            .ok()
            .and_then(|i| elements.get(i).copied())
            .map(Some)
            .ok_or_else(|| {
                self.unsupported(format!(
                    "constant index {i} out of range for array `{}` of {} elements",
                    self.design.array_path(array),
                    elements.len()
                ))
            })
    }

    fn read_signal(&mut self, signal: SignalId) {
        if self.kind == RuleKind::Combinational
            && self.state.cover.get(&signal).is_some_and(BitCover::is_full)
        {
            return;
        }
        if self.read_set.insert(signal) {
            self.reads.push(signal);
        }
    }

    fn read_expr(&mut self, expr: &Expr) -> Result<(), AnalyzeError> {
        match expr {
            Expr::Signal(s) => {
                self.read_signal(*s);
                Ok(())
            }
            Expr::Const(_) | Expr::Int(_) => Ok(()),
            Expr::Local(name) => {
                if self.is_loop_var(*name) || self.state.assigned.contains(name) {
                    Ok(())
                } else if self.local_width(*name).is_some() {
                    Err(self.unsupported(format!(
                        "temporary `{}` may be read before it is assigned",
                        self.name(*name)
                    )))
                } else {
                    Err(self.unsupported(format!(
                        "use of undeclared temporary `{}`",
                        self.name(*name)
                    )))
                }
            }
            Expr::Element { array, index } => {
                self.read_expr(index)?;
                match self.static_element(*array, index)? {
                    Some(s) => self.read_signal(s),
                    None => {
                        for s in &self.design.arrays[*array].elements {
                            if self.dynamic_set.insert(*s) {
                                self.dynamic_reads.push(*s);
                            }
                        }
                    }
                }
                Ok(())
            }
            Expr::Index { base, index } => {
                self.read_expr(base)?;
                self.read_expr(index)?;
                if let Width::Sized(w) = self.width(base)? {
                    self.static_range(index, None, w)?;
                }
                Ok(())
            }
            Expr::Slice { base, lo, hi } => {
                self.read_expr(base)?;
                self.read_expr(lo)?;
                self.read_expr(hi)?;
                if let (Width::Sized(w), Some(sw)) = (self.width(base)?, static_slice_width(lo, hi)) {
                    self.static_range(lo, Some(sw), w)?;
                }
                Ok(())
            }
            Expr::Call { name, .. } => Err(self.unsupported(format!(
                "call to `{}`",
                self.name(*name)
            ))),
            other => other.children().into_iter().try_for_each(|c| self.read_expr(c)),
        }
    }

    fn unroll(
        &mut self,
        var: Ident,
        start: &Expr,
        stop: &Expr,
        step: i64,
        body: &Stmt,
    ) -> Result<(), AnalyzeError> {
        if step == 0 {
            return Err(self.unsupported("loop with a zero step"));
        }
        if self.is_loop_var(var) || self.local_width(var).is_some() {
            return Err(self.unsupported(format!(
                "loop variable `{}` shadows another name",
                self.name(var)
            )));
        }
        let (Some(start), Some(stop)) = (self.fold(start), self.fold(stop)) else {
            return Err(self.unsupported(format!(
                "loop over `{}` without static bounds",
                self.name(var)
            )));
        };
        let values = range_values(start, stop, step);
        if values.len() > MAX_TRIP_COUNT {
            return Err(self.unsupported(format!(
                "loop over `{}` runs more than {MAX_TRIP_COUNT} iterations",
                self.name(var)
            )));
        }
        for v in values {
            self.loops.push((var, v));
            let result = self.stmt(body);
            self.loops.pop();
            result?;
        }
        Ok(())
    }
}

/// Values of `range(start, stop, step)`; `step` is nonzero.
pub fn range_values(start: i64, stop: i64, step: i64) -> Vec<i64> {
    let mut values = Vec::new();
    let mut v = start;
    while (step > 0 && v < stop) || (step < 0 && v > stop) {
        values.push(v);
        if values.len() > MAX_TRIP_COUNT {
            break;
        }
        match v.checked_add(step) {
            Some(next) => v = next,
            None => break,
        }
    }
    values
}

fn narrow(inner: Resolved, range: Option<(u32, u32)>) -> Resolved {
    match inner {
        Resolved::Signal { signal, bits } => Resolved::Signal {
            signal,
            bits: bits.zip(range).map(|((base, _), (lo, w))| (base + lo, w)),
        },
        Resolved::Local { name, .. } => Resolved::Local { name, full: false },
        dynamic => dynamic,
    }
}
