//! Translation of an analyzed design into a flat [`LoweredModule`].
//!
//! The hierarchy is flattened: every storage net becomes one declaration
//! named after its canonical signal, with child signals written
//! `child$port`. Straight-line combinational rules become continuous
//! assignments, other combinational rules become `always` blocks sensitive
//! to their read sets, and all sequential rules share one block clocked on
//! the configured clock.
//!
//! Rule expressions are self-determined while Verilog sizes operands from
//! their context. Every operand that could change value in a wider context
//! is therefore braced, and every width change at an assignment is spelled
//! out as a part-select or a concatenation.

use std::collections::{HashMap, HashSet};

use ember_analyze::width::{expr_type, fold_binary, fold_unary, resolve_field, target_type};
use ember_analyze::{
    analyze_design, expr_width, fold_int, range_values, static_slice_width, DesignAnalysis,
    Driver, LocalScope, RuleUsage, Width,
};
use ember_common::{Bits, Ident};
use ember_config::{IndexPolicy, LowerConfig};
use ember_diagnostics::{Diagnostic, DiagnosticCode, DiagnosticSink};
use ember_ir::{
    ArrayId, BinaryOp, Design, Expr, NetId, PortDirection, RuleId, SignalId, Stmt, Target,
    UnaryOp,
};

use crate::error::LowerError;
use crate::vast::{
    LoweredModule, Trigger, VAssign, VBlock, VCaseArm, VDecl, VExpr, VItem, VLValue, VPort,
    VStmt, VarKind,
};

/// Reserved words of IEEE 1364-2001, sorted.
const KEYWORDS: &[&str] = &[
    "always", "and", "assign", "automatic", "begin", "buf", "bufif0", "bufif1", "case", "casex",
    "casez", "cell", "cmos", "config", "deassign", "default", "defparam", "design", "disable",
    "edge", "else", "end", "endcase", "endconfig", "endfunction", "endgenerate", "endmodule",
    "endprimitive", "endspecify", "endtable", "endtask", "event", "for", "force", "forever",
    "fork", "function", "generate", "genvar", "highz0", "highz1", "if", "ifnone", "incdir",
    "include", "initial", "inout", "input", "instance", "integer", "join", "large", "liblist",
    "library", "localparam", "macromodule", "medium", "module", "nand", "negedge", "nmos",
    "nor", "noshowcancelled", "not", "notif0", "notif1", "or", "output", "parameter", "pmos",
    "posedge", "primitive", "pull0", "pull1", "pulldown", "pullup", "pulsestyle_ondetect",
    "pulsestyle_onevent", "rcmos", "real", "realtime", "reg", "release", "repeat", "rnmos",
    "rpmos", "rtran", "rtranif0", "rtranif1", "scalared", "showcancelled", "signed", "small",
    "specify", "specparam", "strong0", "strong1", "supply0", "supply1", "table", "task", "time",
    "tran", "tranif0", "tranif1", "tri", "tri0", "tri1", "triand", "trior", "trireg",
    "unsigned", "use", "vectored", "wait", "wand", "weak0", "weak1", "while", "wire", "wor",
    "xnor", "xor",
];

/// Analyzes and lowers `design`.
///
/// Analysis warnings and lowering notes (`L401` for loops kept as loops) go
/// to `sink`.
pub fn lower(
    design: &Design,
    config: &LowerConfig,
    sink: &DiagnosticSink,
) -> Result<LoweredModule, LowerError> {
    let analysis = analyze_design(design, sink)?;
    lower_analyzed(design, &analysis, config, sink)
}

/// Lowers a design that has already been analyzed.
pub fn lower_analyzed(
    design: &Design,
    analysis: &DesignAnalysis,
    config: &LowerConfig,
    sink: &DiagnosticSink,
) -> Result<LoweredModule, LowerError> {
    let net_names: Vec<String> = analysis
        .nets
        .iter()
        .map(|(_, net)| flat_name(design, net.canonical))
        .collect();
    let mut widths = HashMap::new();
    for (id, net) in analysis.nets.iter() {
        widths.insert(net_names[id.index()].clone(), net.width);
    }
    let mut cx = Lowering {
        design,
        analysis,
        config,
        sink,
        net_names,
        widths,
        locals: Vec::new(),
    };

    let mut rule_items = Vec::new();
    let mut clocked = VBlock {
        trigger: Trigger::Posedge(config.clock.clone()),
        rules: Vec::new(),
        body: Vec::new(),
    };
    // Nets set up by `initial` blocks, which also carry their init values.
    let mut once_written: HashSet<String> = HashSet::new();
    for rule in design.rules_depth_first() {
        let path = design.rule_path(rule);
        let body = RuleLowering::new(&mut cx, rule).run()?;
        if !design.rules[rule].kind.is_combinational() {
            clocked.rules.push(path);
            clocked.body.extend(body);
            continue;
        }
        let locals: HashSet<&str> = cx.locals.iter().map(|d| d.name.as_str()).collect();
        match as_continuous(&body, &locals) {
            Some(assigns) => {
                tracing::debug!(rule = %path, assigns = assigns.len(), "lowered to continuous assignments");
                rule_items.extend(assigns.into_iter().map(VItem::Assign));
            }
            None => {
                let reads = cx.sensitivity(analysis.usage(rule));
                if reads.is_empty() {
                    // Nothing would ever wake an `always` block; run it once.
                    let mut written = HashSet::new();
                    collect_written(&body, &mut written);
                    let mut once = Vec::new();
                    for (id, _) in analysis.nets.iter() {
                        let name = &cx.net_names[id.index()];
                        if !written.contains(name) {
                            continue;
                        }
                        if let Some(init) = cx.initial_value(id) {
                            once.push(VStmt::Assign {
                                lhs: VLValue::Ident(name.clone()),
                                rhs: VExpr::Literal(init),
                                blocking: true,
                            });
                        }
                        once_written.insert(name.clone());
                    }
                    once.extend(body);
                    tracing::debug!(rule = %path, statements = once.len(), "lowered to an initial block");
                    rule_items.push(VItem::Always(VBlock {
                        trigger: Trigger::Initial,
                        rules: vec![path],
                        body: once,
                    }));
                } else {
                    tracing::debug!(rule = %path, statements = body.len(), "lowered to an always block");
                    rule_items.push(VItem::Always(VBlock {
                        trigger: Trigger::Signals(reads),
                        rules: vec![path],
                        body,
                    }));
                }
            }
        }
    }
    let clock = (!clocked.rules.is_empty()).then(|| config.clock.clone());
    if clock.is_some() {
        rule_items.push(VItem::Always(clocked));
    }

    let mut regs = HashSet::new();
    for item in &rule_items {
        if let VItem::Always(block) = item {
            collect_written(&block.body, &mut regs);
        }
    }

    let mut ports = Vec::new();
    let mut items = Vec::new();
    if let Some(clk) = &clock {
        if cx.widths.contains_key(clk) {
            return Err(LowerError::Translation {
                rule: design.module_path(design.top),
                construct: format!("`{clk}` is already declared and cannot name the clock"),
            });
        }
        ports.push(VPort {
            name: clk.clone(),
            direction: PortDirection::Input,
            kind: VarKind::Wire,
            width: 1,
            init: None,
        });
    }
    for port in design.top_ports() {
        let name = flat_name(design, port);
        if clock.as_deref() == Some(name.as_str()) {
            return Err(LowerError::Translation {
                rule: design.module_path(design.top),
                construct: format!("port `{name}` has the same name as the clock"),
            });
        }
        let net = analysis.nets.net_of(port);
        let net_name = &cx.net_names[net.index()];
        let direction = if design.signals[port].kind.is_input() {
            PortDirection::Input
        } else {
            PortDirection::Output
        };
        let init = cx.initial_value(net);
        let owns_net = *net_name == name;
        if !owns_net {
            let (lhs, rhs) = match direction {
                PortDirection::Input => (net_name.clone(), name.clone()),
                PortDirection::Output => (name.clone(), net_name.clone()),
            };
            items.push(VItem::Assign(VAssign {
                lhs: VLValue::Ident(lhs),
                rhs: VExpr::Ident(rhs),
            }));
        }
        let kind = if direction == PortDirection::Output
            && owns_net
            && (regs.contains(&name) || (analysis.driver(net).is_none() && init.is_some()))
        {
            VarKind::Reg
        } else {
            VarKind::Wire
        };
        cx.widths.insert(name.clone(), design.signal_width(port));
        let init = if once_written.contains(&name) { None } else { init };
        ports.push(VPort {
            name,
            direction,
            kind,
            width: design.signal_width(port),
            init,
        });
    }

    let mut decls = Vec::new();
    for (id, net) in analysis.nets.iter() {
        let name = cx.net_names[id.index()].clone();
        let driver = analysis.driver(id);
        if let Some(Driver::Constant(_, value)) = driver {
            items.push(VItem::Assign(VAssign {
                lhs: VLValue::Ident(name.clone()),
                rhs: VExpr::Literal(value.fit(net.width, false)),
            }));
        }
        let canonical = &design.signals[net.canonical];
        if canonical.owner == design.top && canonical.kind.is_port() {
            continue;
        }
        let init = cx.initial_value(id);
        let kind = if regs.contains(&name) || (driver.is_none() && init.is_some()) {
            VarKind::Reg
        } else {
            VarKind::Wire
        };
        let init = if kind == VarKind::Reg && !once_written.contains(&name) {
            init
        } else {
            None
        };
        decls.push(VDecl {
            kind,
            name,
            width: net.width,
            init,
        });
    }
    decls.append(&mut cx.locals);
    items.extend(rule_items);

    let module = LoweredModule {
        name: design.name(design.top_module().name).to_string(),
        ports,
        decls,
        items,
        clock,
    };
    tracing::info!(
        module = %module.name,
        ports = module.ports.len(),
        decls = module.decls.len(),
        items = module.items.len(),
        "design lowered"
    );
    Ok(module)
}

/// Verilog name of a signal: its path below the top module joined by `$`.
pub fn flat_name(design: &Design, signal: SignalId) -> String {
    let path = design.signal_path(signal);
    let mut name = path.split('.').skip(1).collect::<Vec<_>>().join("$");
    if KEYWORDS.binary_search(&name.as_str()).is_ok() {
        name.push('_');
    }
    name
}

/// `index < limit`, compared unsigned so negative integer indices fall out
/// of range.
fn index_below(index: &Lowered, limit: u32) -> VExpr {
    let lhs = match index.width {
        Width::Sized(w) if w < 32 && index.expr.widens_with_context() => index.expr.clone().braced(),
        _ => index.expr.clone(),
    };
    VExpr::binary(BinaryOp::Lt, lhs, VExpr::literal(32, u64::from(limit)))
}

/// Returns the statements as continuous assignments if every one writes a
/// distinct whole net.
fn as_continuous(body: &[VStmt], locals: &HashSet<&str>) -> Option<Vec<VAssign>> {
    let mut seen = HashSet::new();
    body.iter()
        .map(|stmt| match stmt {
            VStmt::Assign {
                lhs: VLValue::Ident(name),
                rhs,
                blocking: true,
            } if !locals.contains(name.as_str()) && seen.insert(name.as_str()) => Some(VAssign {
                lhs: VLValue::Ident(name.clone()),
                rhs: rhs.clone(),
            }),
            _ => None,
        })
        .collect()
}

fn collect_written(stmts: &[VStmt], names: &mut HashSet<String>) {
    for stmt in stmts {
        match stmt {
            VStmt::Assign { lhs, .. } => {
                names.insert(lhs.name().to_string());
            }
            VStmt::If {
                then_body,
                else_body,
                ..
            } => {
                collect_written(then_body, names);
                collect_written(else_body, names);
            }
            VStmt::Case { arms, default, .. } => {
                for arm in arms {
                    collect_written(&arm.body, names);
                }
                collect_written(default, names);
            }
            VStmt::For { body, .. } => collect_written(body, names),
            VStmt::Fatal { .. } => {}
        }
    }
}

/// Module-wide lowering state.
struct Lowering<'a> {
    design: &'a Design,
    analysis: &'a DesignAnalysis,
    config: &'a LowerConfig,
    sink: &'a DiagnosticSink,
    /// Declared name per net.
    net_names: Vec<String>,
    /// Width of every declared name.
    widths: HashMap<String, u32>,
    /// Temporaries and loop counters.
    locals: Vec<VDecl>,
}

impl Lowering<'_> {
    fn initial_value(&self, net: NetId) -> Option<Bits> {
        let net = self.analysis.nets.net(net);
        net.members
            .iter()
            .find_map(|s| self.design.signals[*s].init.clone())
            .map(|v| v.fit(net.width, false))
    }

    fn sensitivity(&self, usage: &RuleUsage) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for signal in usage.all_reads() {
            let name = &self.net_names[self.analysis.nets.net_of(signal).index()];
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        names
    }
}

/// A lowered expression with its width in the rule's width system.
#[derive(Debug, Clone)]
struct Lowered {
    expr: VExpr,
    width: Width,
    /// Value of an unsized expression that folds to a constant.
    constant: Option<i64>,
}

impl Lowered {
    fn sized(expr: VExpr, width: u32) -> Self {
        Self {
            expr,
            width: Width::Sized(width),
            constant: None,
        }
    }

    fn int(value: i64) -> Self {
        Self {
            expr: VExpr::Int(value),
            width: Width::Unsized,
            constant: Some(value),
        }
    }

    fn integer(expr: VExpr) -> Self {
        Self {
            expr,
            width: Width::Unsized,
            constant: None,
        }
    }

    /// The position this value selects, when known statically. The inner
    /// `None` is a position that can never be in range.
    fn static_position(&self) -> Option<Option<u64>> {
        if let Some(v) = self.constant {
            return Some(u64::try_from(v).ok());
        }
        match &self.expr {
            VExpr::Literal(b) => Some(b.to_u64()),
            _ => None,
        }
    }
}

/// Bits of one declared name.
struct Region {
    name: String,
    lo: u32,
    width: u32,
}

/// Where an assignment lands once its target is resolved.
enum Placement {
    /// The write falls outside its base and is dropped.
    Dropped,
    /// A static bit range. Writes are clipped at `limit`.
    Static {
        name: String,
        lo: u32,
        width: u32,
        limit: u32,
        signed: bool,
    },
    /// A run-time bit or part select of a whole name.
    Dynamic { lhs: VLValue, width: u32 },
    /// One placement per array element, chosen by a `case`.
    Select {
        selector: VExpr,
        item_width: Option<u32>,
        arms: Vec<(u64, Placement)>,
        fallback: Fallback,
    },
}

/// The `default` arm of a selector.
enum Fallback {
    Place(Box<Placement>),
    Fatal(String),
}

/// Lowers one rule body.
struct RuleLowering<'c, 'a> {
    cx: &'c mut Lowering<'a>,
    design: &'a Design,
    usage: &'a RuleUsage,
    rule: RuleId,
    policy: IndexPolicy,
    /// Unrolled loop variables and their current values.
    bindings: Vec<(Ident, i64)>,
    /// Loop variables kept as `integer` counters.
    counters: Vec<(Ident, String)>,
    hoisted: usize,
}

impl LocalScope for RuleLowering<'_, '_> {
    fn local_width(&self, name: Ident) -> Option<u32> {
        self.usage.local_width(name)
    }

    fn is_loop_var(&self, name: Ident) -> bool {
        self.bindings.iter().any(|(n, _)| *n == name) || self.counters.iter().any(|(n, _)| *n == name)
    }
}

impl<'c, 'a> RuleLowering<'c, 'a> {
    fn new(cx: &'c mut Lowering<'a>, rule: RuleId) -> Self {
        let design = cx.design;
        let usage = cx.analysis.usage(rule);
        let policy = cx.config.index_policy;
        Self {
            cx,
            design,
            usage,
            rule,
            policy,
            bindings: Vec::new(),
            counters: Vec::new(),
            hoisted: 0,
        }
    }

    fn run(mut self) -> Result<Vec<VStmt>, LowerError> {
        let usage = self.usage;
        for (name, width) in &usage.locals {
            let temp = self.temp_name(*name);
            self.declare(temp, VarKind::Reg, *width)?;
        }
        let mut out = Vec::new();
        let design = self.design;
        self.stmt(&design.rules[self.rule].body, &mut out)?;
        Ok(out)
    }

    fn path(&self) -> String {
        self.design.rule_path(self.rule)
    }

    fn translation(&self, construct: impl Into<String>) -> LowerError {
        LowerError::Translation {
            rule: self.path(),
            construct: construct.into(),
        }
    }

    fn temp_name(&self, name: Ident) -> String {
        format!("{}__{}", self.design.name(name), self.rule.index())
    }

    fn net_name(&self, signal: SignalId) -> String {
        self.cx.net_names[self.cx.analysis.nets.net_of(signal).index()].clone()
    }

    fn declared_width(&self, name: &str) -> Option<u32> {
        self.cx.widths.get(name).copied()
    }

    fn declare(&mut self, name: String, kind: VarKind, width: u32) -> Result<(), LowerError> {
        if self.cx.widths.contains_key(&name) {
            let same = self
                .cx
                .locals
                .iter()
                .any(|d| d.name == name && d.kind == kind && d.width == width);
            if same {
                return Ok(());
            }
            return Err(self.translation(format!("`{name}` collides with another declaration")));
        }
        self.cx.widths.insert(name.clone(), width);
        self.cx.locals.push(VDecl {
            kind,
            name,
            width,
            init: None,
        });
        Ok(())
    }

    fn new_temp(&mut self, width: u32) -> Result<String, LowerError> {
        loop {
            let name = format!("_t{}__{}", self.hoisted, self.rule.index());
            self.hoisted += 1;
            if !self.cx.widths.contains_key(&name) {
                self.declare(name.clone(), VarKind::Reg, width)?;
                return Ok(name);
            }
        }
    }

    /// Assigns `expr` to a fresh temporary of `width` bits.
    fn hoist(&mut self, expr: VExpr, width: u32, out: &mut Vec<VStmt>) -> Result<String, LowerError> {
        let name = self.new_temp(width)?;
        out.push(VStmt::Assign {
            lhs: VLValue::Ident(name.clone()),
            rhs: expr,
            blocking: true,
        });
        Ok(name)
    }

    fn binding(&self, name: Ident) -> Option<i64> {
        self.bindings
            .iter()
            .rev()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| *v)
    }

    fn fold(&self, expr: &Expr) -> Option<i64> {
        fold_int(expr, &|n| self.binding(n))
    }

    fn stmt(&mut self, stmt: &Stmt, out: &mut Vec<VStmt>) -> Result<(), LowerError> {
        match stmt {
            Stmt::Nop => Ok(()),
            Stmt::Block(stmts) => stmts.iter().try_for_each(|s| self.stmt(s, out)),
            Stmt::Let { name, value, .. } => {
                let width = self
                    .usage
                    .local_width(*name)
                    .ok_or_else(|| self.translation("temporary without a width"))?;
                let v = self.expr(value, out)?;
                let rhs = self.fit(&v, width, false, out)?;
                out.push(VStmt::Assign {
                    lhs: VLValue::Ident(self.temp_name(*name)),
                    rhs,
                    blocking: true,
                });
                Ok(())
            }
            Stmt::Assign { target, value } => self.assign(target, value, true, out),
            Stmt::AssignNext { target, value } => self.assign(target, value, false, out),
            Stmt::If {
                cond,
                then_body,
                else_body,
            } => {
                let c = self.expr(cond, out)?;
                if let Some(v) = c.constant {
                    return match (v != 0, else_body) {
                        (true, _) => self.stmt(then_body, out),
                        (false, Some(e)) => self.stmt(e, out),
                        (false, None) => Ok(()),
                    };
                }
                let mut then_out = Vec::new();
                self.stmt(then_body, &mut then_out)?;
                let mut else_out = Vec::new();
                if let Some(e) = else_body {
                    self.stmt(e, &mut else_out)?;
                }
                out.push(VStmt::If {
                    cond: c.expr,
                    then_body: then_out,
                    else_body: else_out,
                });
                Ok(())
            }
            Stmt::For {
                var,
                start,
                stop,
                step,
                body,
            } => self.for_loop(*var, start, stop, *step, body, out),
            Stmt::While { .. } => Err(self.translation("while loop")),
        }
    }

    fn for_loop(
        &mut self,
        var: Ident,
        start: &Expr,
        stop: &Expr,
        step: i64,
        body: &Stmt,
        out: &mut Vec<VStmt>,
    ) -> Result<(), LowerError> {
        let (Some(first), Some(last)) = (self.fold(start), self.fold(stop)) else {
            return Err(self.translation(format!(
                "loop over `{}` whose bounds are not static once unrolled",
                self.design.name(var)
            )));
        };
        let values = range_values(first, last, step);
        if values.len() <= self.cx.config.unroll_limit as usize {
            for v in values {
                self.bindings.push((var, v));
                let result = self.stmt(body, out);
                self.bindings.pop();
                result?;
            }
            return Ok(());
        }
        let fits = |v: i64| i32::try_from(v).is_ok();
        if !fits(first) || !fits(last) || !fits(step) {
            return Err(self.translation(format!(
                "loop over `{}` has bounds outside the range of an integer",
                self.design.name(var)
            )));
        }

        let counter = self.temp_name(var);
        self.declare(counter.clone(), VarKind::Integer, 32)?;
        self.counters.push((var, counter.clone()));
        let mut inner = Vec::new();
        let result = self.stmt(body, &mut inner);
        self.counters.pop();
        result?;

        self.cx.sink.emit(
            Diagnostic::note(
                DiagnosticCode::LOOP_NOT_UNROLLED,
                format!(
                    "loop over `{}` runs {} iterations, more than the unroll limit of {}; kept as an integer loop",
                    self.design.name(var),
                    values.len(),
                    self.cx.config.unroll_limit
                ),
            )
            .at(self.path()),
        );
        out.push(VStmt::For {
            var: counter,
            start: first,
            stop: last,
            step,
            body: inner,
        });
        Ok(())
    }

    fn assign(
        &mut self,
        target: &Target,
        value: &Expr,
        blocking: bool,
        out: &mut Vec<VStmt>,
    ) -> Result<(), LowerError> {
        let v = self.expr(value, out)?;
        let place = self.place(target, out)?;
        self.write(place, &v, blocking, out)
    }

    fn write(
        &mut self,
        place: Placement,
        value: &Lowered,
        blocking: bool,
        out: &mut Vec<VStmt>,
    ) -> Result<(), LowerError> {
        match place {
            Placement::Dropped => Ok(()),
            Placement::Static {
                name,
                lo,
                width,
                limit,
                signed,
            } => {
                let kept = width.min(limit.saturating_sub(lo));
                if kept == 0 {
                    return Ok(());
                }
                let rhs = self.fit(value, kept, signed, out)?;
                let lhs = if lo == 0 && self.declared_width(&name) == Some(kept) {
                    VLValue::Ident(name)
                } else {
                    VLValue::Range {
                        name,
                        msb: lo + kept - 1,
                        lsb: lo,
                    }
                };
                out.push(VStmt::Assign { lhs, rhs, blocking });
                Ok(())
            }
            Placement::Dynamic { lhs, width } => {
                let rhs = self.fit(value, width, false, out)?;
                out.push(VStmt::Assign { lhs, rhs, blocking });
                Ok(())
            }
            Placement::Select {
                selector,
                item_width,
                arms,
                fallback,
            } => {
                let mut case_arms = Vec::with_capacity(arms.len());
                for (item, p) in arms {
                    let mut body = Vec::new();
                    self.write(p, value, blocking, &mut body)?;
                    case_arms.push(VCaseArm { item, body });
                }
                let default = match fallback {
                    Fallback::Place(p) => {
                        let mut body = Vec::new();
                        self.write(*p, value, blocking, &mut body)?;
                        body
                    }
                    Fallback::Fatal(message) => vec![VStmt::Fatal { message }],
                };
                out.push(VStmt::Case {
                    selector,
                    width: item_width,
                    arms: case_arms,
                    default,
                });
                Ok(())
            }
        }
    }

    fn signal_place(&self, signal: SignalId) -> Placement {
        let width = self.design.signal_width(signal);
        Placement::Static {
            name: self.net_name(signal),
            lo: 0,
            width,
            limit: width,
            signed: self.design.signal_signed(signal),
        }
    }

    fn place(&mut self, target: &Target, out: &mut Vec<VStmt>) -> Result<Placement, LowerError> {
        match target {
            Target::Signal(s) => Ok(self.signal_place(*s)),
            Target::Local(name) => {
                if self.is_loop_var(*name) {
                    return Err(self.translation(format!(
                        "assignment to loop variable `{}`",
                        self.design.name(*name)
                    )));
                }
                let width = self
                    .usage
                    .local_width(*name)
                    .ok_or_else(|| self.translation("temporary without a width"))?;
                Ok(Placement::Static {
                    name: self.temp_name(*name),
                    lo: 0,
                    width,
                    limit: width,
                    signed: false,
                })
            }
            Target::Element { array, index } => {
                let i = self.expr(index, out)?;
                if let Some(position) = i.static_position() {
                    let signal = self.static_element(*array, position)?;
                    return Ok(self.signal_place(signal));
                }
                let elements = &self.design.arrays[*array].elements;
                let arms = reachable(elements.len(), i.width.bits())
                    .into_iter()
                    .map(|k| (k, self.signal_place(elements[k as usize])))
                    .collect();
                let fallback = match (self.policy, elements.last()) {
                    (IndexPolicy::Clamp, Some(last)) => {
                        Fallback::Place(Box::new(self.signal_place(*last)))
                    }
                    _ => Fallback::Fatal(self.out_of_range_message(*array)),
                };
                Ok(Placement::Select {
                    selector: i.expr,
                    item_width: i.width.bits(),
                    arms,
                    fallback,
                })
            }
            Target::Field { base, field } => {
                let info = resolve_field(self.design, target_type(self.design, base), *field)
                    .map_err(|_| self.translation("field access on a non-struct target"))?;
                let outer = self.place(base, out)?;
                let signed = self.design.types.is_signed(info.ty);
                self.narrow_static(outer, Some(u64::from(info.offset)), info.width, signed)
            }
            Target::Index { base, index } => {
                let outer = self.place(base, out)?;
                let i = self.expr(index, out)?;
                match i.static_position() {
                    Some(position) => self.narrow_static(outer, position, 1, false),
                    None => self.narrow_dynamic(outer, &i.expr, 1),
                }
            }
            Target::Slice { base, lo, hi } => {
                let width = static_slice_width(lo, hi)
                    .ok_or_else(|| self.translation("slice without a static width"))?;
                let outer = self.place(base, out)?;
                let l = self.expr(lo, out)?;
                match l.static_position() {
                    Some(position) => self.narrow_static(outer, position, width, false),
                    None => self.narrow_dynamic(outer, &l.expr, width),
                }
            }
        }
    }

    fn narrow_static(
        &self,
        outer: Placement,
        position: Option<u64>,
        width: u32,
        signed: bool,
    ) -> Result<Placement, LowerError> {
        match outer {
            Placement::Dropped => Ok(Placement::Dropped),
            Placement::Static {
                name,
                lo,
                width: outer_width,
                limit,
                ..
            } => match position.filter(|p| *p < u64::from(outer_width)) {
                Some(p) => Ok(Placement::Static {
                    name,
                    lo: lo + p as u32,
                    width,
                    limit: limit.min(lo + outer_width),
                    signed,
                }),
                None => Ok(Placement::Dropped),
            },
            Placement::Dynamic { .. } => {
                Err(self.translation("select inside a run-time bit or part select"))
            }
            Placement::Select {
                selector,
                item_width,
                arms,
                fallback,
            } => self.map_select(selector, item_width, arms, fallback, &mut |this, p| {
                this.narrow_static(p, position, width, signed)
            }),
        }
    }

    fn narrow_dynamic(
        &self,
        outer: Placement,
        index: &VExpr,
        width: u32,
    ) -> Result<Placement, LowerError> {
        match outer {
            Placement::Dropped => Ok(Placement::Dropped),
            Placement::Static {
                name,
                lo: 0,
                width: outer_width,
                limit,
                ..
            } if limit == outer_width && self.declared_width(&name) == Some(outer_width) => {
                let lhs = if width == 1 {
                    VLValue::Bit {
                        name,
                        index: index.clone(),
                    }
                } else {
                    VLValue::Part {
                        name,
                        lo: index.clone(),
                        width,
                    }
                };
                Ok(Placement::Dynamic { lhs, width })
            }
            Placement::Static { .. } | Placement::Dynamic { .. } => Err(self.translation(
                "run-time bit select inside a struct field or slice",
            )),
            Placement::Select {
                selector,
                item_width,
                arms,
                fallback,
            } => self.map_select(selector, item_width, arms, fallback, &mut |this, p| {
                this.narrow_dynamic(p, index, width)
            }),
        }
    }

    fn map_select(
        &self,
        selector: VExpr,
        item_width: Option<u32>,
        arms: Vec<(u64, Placement)>,
        fallback: Fallback,
        f: &mut dyn FnMut(&Self, Placement) -> Result<Placement, LowerError>,
    ) -> Result<Placement, LowerError> {
        let arms = arms
            .into_iter()
            .map(|(k, p)| Ok((k, f(self, p)?)))
            .collect::<Result<Vec<_>, LowerError>>()?;
        let fallback = match fallback {
            Fallback::Place(p) => Fallback::Place(Box::new(f(self, *p)?)),
            fatal => fatal,
        };
        Ok(Placement::Select {
            selector,
            item_width,
            arms,
            fallback,
        })
    }

    fn out_of_range_message(&self, array: ArrayId) -> String {
        format!(
            "index out of range for {} in {}",
            self.design.array_path(array),
            self.path()
        )
    }

    /// Resolves a statically known element position, applying the index
    /// policy past the end.
    fn static_element(&self, array: ArrayId, position: Option<u64>) -> Result<SignalId, LowerError> {
        let elements = &self.design.arrays[array].elements;
        if let Some(s) = position
            .and_then(|p| usize::try_from(p).ok())
            .and_then(|p| elements.get(p))
        {
            return Ok(*s);
        }
        match (self.policy, elements.last()) {
            (IndexPolicy::Clamp, Some(last)) => Ok(*last),
            _ => Err(self.translation(format!(
                "constant index out of range for array `{}`",
                self.design.array_path(array)
            ))),
        }
    }

    /// A bit range of a declared name, as an expression.
    fn region_expr(&self, name: &str, lo: u32, width: u32) -> VExpr {
        if lo == 0 && self.declared_width(name) == Some(width) {
            VExpr::Ident(name.to_string())
        } else {
            VExpr::Range {
                name: name.to_string(),
                msb: lo + width - 1,
                lsb: lo,
            }
        }
    }

    /// Names the bits of a sized value, hoisting anything that is not
    /// already a declared name or a static range of one.
    fn region(&mut self, x: Lowered, out: &mut Vec<VStmt>) -> Result<Region, LowerError> {
        let width = x
            .width
            .bits()
            .ok_or_else(|| self.translation("bit select of an unsized integer"))?;
        match x.expr {
            VExpr::Ident(name) => Ok(Region { name, lo: 0, width }),
            VExpr::Range { name, msb, lsb } => Ok(Region {
                name,
                lo: lsb,
                width: msb - lsb + 1,
            }),
            other => {
                let name = self.hoist(other, width, out)?;
                Ok(Region { name, lo: 0, width })
            }
        }
    }

    /// A declared name holding exactly the region's bits.
    fn whole(&mut self, region: Region, out: &mut Vec<VStmt>) -> Result<String, LowerError> {
        if region.lo == 0 && self.declared_width(&region.name) == Some(region.width) {
            return Ok(region.name);
        }
        let expr = self.region_expr(&region.name, region.lo, region.width);
        self.hoist(expr, region.width, out)
    }

    /// `width` bits of `region` starting at a run-time position. Bits past
    /// the end of the region read as zero: the part-select is taken only when
    /// it lies entirely inside, and a shift supplies the zero fill otherwise.
    fn dynamic_part(
        &mut self,
        region: Region,
        lo: Lowered,
        width: u32,
        out: &mut Vec<VStmt>,
    ) -> Result<VExpr, LowerError> {
        let limit = region.width;
        let name = self.whole(region, out)?;
        let shifted = Lowered::sized(
            VExpr::binary(BinaryOp::Shr, VExpr::Ident(name.clone()), lo.expr.clone()),
            limit,
        );
        let filled = self.fit(&shifted, width, false, out)?;
        if width > limit {
            return Ok(filled);
        }
        Ok(VExpr::Ternary {
            cond: Box::new(index_below(&lo, limit - width + 1)),
            then_val: Box::new(VExpr::Part {
                name,
                lo: Box::new(lo.expr),
                width,
            }),
            else_val: Box::new(filled),
        })
    }

    /// Converts `x` to exactly `width` bits. Narrowing keeps the low bits
    /// through a part-select; widening is an explicit zero or sign-extending
    /// concatenation.
    fn fit(
        &mut self,
        x: &Lowered,
        width: u32,
        signed: bool,
        out: &mut Vec<VStmt>,
    ) -> Result<VExpr, LowerError> {
        let w = match x.width {
            Width::Sized(w) => w,
            Width::Unsized => {
                return match x.constant {
                    Some(v) => Ok(VExpr::Literal(Bits::from_i64(width, v))),
                    None => Ok(VExpr::Ident(self.hoist(x.expr.clone(), width, out)?)),
                }
            }
        };
        if w == width {
            return Ok(x.expr.clone());
        }
        if let VExpr::Literal(b) = &x.expr {
            return Ok(VExpr::Literal(b.fit(width, signed)));
        }
        if w > width {
            let region = self.region(x.clone(), out)?;
            return Ok(self.region_expr(&region.name, region.lo, width));
        }
        if !signed {
            return Ok(VExpr::Concat(vec![
                VExpr::Literal(Bits::zero(width - w)),
                x.expr.clone(),
            ]));
        }
        let region = self.region(x.clone(), out)?;
        let msb = VExpr::Bit {
            name: region.name.clone(),
            index: Box::new(VExpr::Int(i64::from(region.lo + w - 1))),
        };
        Ok(VExpr::Concat(vec![
            VExpr::Repeat {
                count: width - w,
                value: Box::new(msb),
            },
            self.region_expr(&region.name, region.lo, w),
        ]))
    }

    /// Sizes an operand for a context of `width` bits.
    fn operand(&mut self, x: Lowered, width: u32, out: &mut Vec<VStmt>) -> Result<VExpr, LowerError> {
        match (x.width, x.constant) {
            (Width::Unsized, Some(v)) => Ok(VExpr::Literal(Bits::from_i64(width, v))),
            (Width::Unsized, None) => Ok(VExpr::Ident(self.hoist(x.expr, width, out)?)),
            (Width::Sized(w), _) if w < width && x.expr.widens_with_context() => Ok(x.expr.braced()),
            _ => Ok(x.expr),
        }
    }

    fn expr(&mut self, expr: &Expr, out: &mut Vec<VStmt>) -> Result<Lowered, LowerError> {
        match expr {
            Expr::Signal(s) => Ok(Lowered::sized(
                VExpr::Ident(self.net_name(*s)),
                self.design.signal_width(*s),
            )),
            Expr::Const(b) => Ok(Lowered::sized(VExpr::Literal(b.clone()), b.width())),
            Expr::Int(v) => Ok(Lowered::int(*v)),
            Expr::Local(name) => {
                if let Some(v) = self.binding(*name) {
                    return Ok(Lowered::int(v));
                }
                if let Some((_, counter)) = self.counters.iter().rev().find(|(n, _)| n == name) {
                    return Ok(Lowered::integer(VExpr::Ident(counter.clone())));
                }
                let width = self.usage.local_width(*name).ok_or_else(|| {
                    self.translation(format!("use of undeclared temporary `{}`", self.design.name(*name)))
                })?;
                Ok(Lowered::sized(VExpr::Ident(self.temp_name(*name)), width))
            }
            Expr::Unary { op, operand } => {
                let x = self.expr(operand, out)?;
                self.unary(*op, x)
            }
            Expr::Binary { op, lhs, rhs } => {
                let a = self.expr(lhs, out)?;
                let b = self.expr(rhs, out)?;
                self.binary(*op, a, b, out)
            }
            Expr::Mux {
                cond,
                then_val,
                else_val,
            } => self.mux(expr, cond, then_val, else_val, out),
            Expr::Concat(parts) => {
                let mut total = 0;
                let mut exprs = Vec::with_capacity(parts.len());
                for part in parts {
                    let x = self.expr(part, out)?;
                    let w = x
                        .width
                        .bits()
                        .ok_or_else(|| self.translation("unsized integer inside a concatenation"))?;
                    total += w;
                    exprs.push(x.expr);
                }
                Ok(Lowered::sized(VExpr::Concat(exprs), total))
            }
            Expr::Zext { value, width } => {
                let x = self.expr(value, out)?;
                Ok(Lowered::sized(self.fit(&x, *width, false, out)?, *width))
            }
            Expr::Sext { value, width } => {
                let x = self.expr(value, out)?;
                Ok(Lowered::sized(self.fit(&x, *width, true, out)?, *width))
            }
            Expr::Index { base, index } => {
                let b = self.expr(base, out)?;
                let region = self.region(b, out)?;
                let i = self.expr(index, out)?;
                let bit = match i.static_position() {
                    Some(Some(p)) if p < u64::from(region.width) => VExpr::Bit {
                        name: region.name,
                        index: Box::new(VExpr::Int(i64::from(region.lo) + p as i64)),
                    },
                    Some(_) => VExpr::literal(1, 0),
                    None => {
                        let limit = region.width;
                        VExpr::Ternary {
                            cond: Box::new(index_below(&i, limit)),
                            then_val: Box::new(VExpr::Bit {
                                name: self.whole(region, out)?,
                                index: Box::new(i.expr),
                            }),
                            else_val: Box::new(VExpr::literal(1, 0)),
                        }
                    }
                };
                Ok(Lowered::sized(bit, 1))
            }
            Expr::Slice { base, lo, hi } => {
                let width = static_slice_width(lo, hi)
                    .ok_or_else(|| self.translation("slice without a static width"))?;
                let b = self.expr(base, out)?;
                let region = self.region(b, out)?;
                let l = self.expr(lo, out)?;
                let sliced = match l.static_position() {
                    Some(Some(p)) if p < u64::from(region.width) => {
                        let p = p as u32;
                        let kept = width.min(region.width - p);
                        let bits = self.region_expr(&region.name, region.lo + p, kept);
                        if kept < width {
                            VExpr::Concat(vec![VExpr::Literal(Bits::zero(width - kept)), bits])
                        } else {
                            bits
                        }
                    }
                    Some(_) => VExpr::Literal(Bits::zero(width)),
                    None => self.dynamic_part(region, l, width, out)?,
                };
                Ok(Lowered::sized(sliced, width))
            }
            Expr::Field { base, field } => {
                let info = resolve_field(self.design, expr_type(self.design, base), *field)
                    .map_err(|_| self.translation("field access on a non-struct value"))?;
                let b = self.expr(base, out)?;
                let region = self.region(b, out)?;
                Ok(Lowered::sized(
                    self.region_expr(&region.name, region.lo + info.offset, info.width),
                    info.width,
                ))
            }
            Expr::Element { array, index } => {
                let i = self.expr(index, out)?;
                self.element(*array, i, out)
            }
            Expr::Call { name, .. } => {
                Err(self.translation(format!("call to `{}`", self.design.name(*name))))
            }
        }
    }

    fn unary(&mut self, op: UnaryOp, x: Lowered) -> Result<Lowered, LowerError> {
        match x.width {
            Width::Unsized => {
                if let Some(v) = x.constant {
                    if let Some(r) = fold_unary(op, v) {
                        return Ok(Lowered::int(r));
                    }
                }
                if matches!(op, UnaryOp::RedAnd | UnaryOp::RedOr | UnaryOp::RedXor) {
                    return Err(self.translation("reduction of an unsized integer"));
                }
                Ok(Lowered::integer(VExpr::Unary {
                    op,
                    operand: Box::new(x.expr),
                }))
            }
            Width::Sized(w) => {
                let width = if matches!(op, UnaryOp::Not | UnaryOp::Neg) { w } else { 1 };
                Ok(Lowered::sized(
                    VExpr::Unary {
                        op,
                        operand: Box::new(x.expr),
                    },
                    width,
                ))
            }
        }
    }

    fn binary(
        &mut self,
        op: BinaryOp,
        a: Lowered,
        b: Lowered,
        out: &mut Vec<VStmt>,
    ) -> Result<Lowered, LowerError> {
        if let (Width::Unsized, Width::Unsized) = (a.width, b.width) {
            if let (Some(x), Some(y)) = (a.constant, b.constant) {
                if let Some(r) = fold_binary(op, x, y) {
                    return Ok(Lowered::int(r));
                }
            }
            return Ok(Lowered::integer(VExpr::binary(op, a.expr, b.expr)));
        }
        if op.is_shift() {
            let Width::Sized(w) = a.width else {
                return Err(self.translation("unsized integer shifted by a sized amount"));
            };
            return Ok(Lowered::sized(VExpr::binary(op, a.expr, b.expr), w));
        }
        if matches!(op, BinaryOp::LogicAnd | BinaryOp::LogicOr) {
            let truth = |x: Lowered| match x.constant {
                Some(v) => VExpr::literal(1, u64::from(v != 0)),
                None => x.expr,
            };
            return Ok(Lowered::sized(VExpr::binary(op, truth(a), truth(b)), 1));
        }
        let Width::Sized(width) = a.width.max(b.width) else {
            return Err(self.translation("operator applied to unsized integers"));
        };
        let lhs = self.operand(a, width, out)?;
        let rhs = self.operand(b, width, out)?;
        let result = if op.is_boolean() { 1 } else { width };
        Ok(Lowered::sized(VExpr::binary(op, lhs, rhs), result))
    }

    fn mux(
        &mut self,
        whole: &Expr,
        cond: &Expr,
        then_val: &Expr,
        else_val: &Expr,
        out: &mut Vec<VStmt>,
    ) -> Result<Lowered, LowerError> {
        let width = expr_width(self.design, &*self, whole)
            .map_err(|_| self.translation("multiplexer without a static width"))?;
        let c = self.expr(cond, out)?;
        if let Some(v) = c.constant {
            let chosen = self.expr(if v != 0 { then_val } else { else_val }, out)?;
            return match width {
                Width::Sized(w) => Ok(Lowered::sized(self.fit(&chosen, w, false, out)?, w)),
                Width::Unsized => Ok(chosen),
            };
        }

        let mut then_out = Vec::new();
        let t = self.expr(then_val, &mut then_out)?;
        let mut else_out = Vec::new();
        let e = self.expr(else_val, &mut else_out)?;
        let Width::Sized(w) = width else {
            if !then_out.is_empty() || !else_out.is_empty() {
                return Err(self.translation("integer multiplexer that needs temporaries"));
            }
            return Ok(Lowered::integer(VExpr::Ternary {
                cond: Box::new(c.expr),
                then_val: Box::new(t.expr),
                else_val: Box::new(e.expr),
            }));
        };
        let t = self.operand(t, w, &mut then_out)?;
        let e = self.operand(e, w, &mut else_out)?;
        if then_out.is_empty() && else_out.is_empty() {
            return Ok(Lowered::sized(
                VExpr::Ternary {
                    cond: Box::new(c.expr),
                    then_val: Box::new(t),
                    else_val: Box::new(e),
                },
                w,
            ));
        }

        // branches with their own temporaries only run when selected
        let name = self.new_temp(w)?;
        then_out.push(VStmt::Assign {
            lhs: VLValue::Ident(name.clone()),
            rhs: t,
            blocking: true,
        });
        else_out.push(VStmt::Assign {
            lhs: VLValue::Ident(name.clone()),
            rhs: e,
            blocking: true,
        });
        out.push(VStmt::If {
            cond: c.expr,
            then_body: then_out,
            else_body: else_out,
        });
        Ok(Lowered::sized(VExpr::Ident(name), w))
    }

    fn element(&mut self, array: ArrayId, index: Lowered, out: &mut Vec<VStmt>) -> Result<Lowered, LowerError> {
        let design = self.design;
        let elements = &design.arrays[array].elements;
        let first = *elements
            .first()
            .ok_or_else(|| self.translation(format!("empty signal array `{}`", design.array_path(array))))?;
        let width = design.signal_width(first);
        if let Some(position) = index.static_position() {
            let signal = self.static_element(array, position)?;
            return Ok(Lowered::sized(VExpr::Ident(self.net_name(signal)), width));
        }

        let name = self.new_temp(width)?;
        let load = |this: &Self, signal: SignalId| {
            vec![VStmt::Assign {
                lhs: VLValue::Ident(name.clone()),
                rhs: VExpr::Ident(this.net_name(signal)),
                blocking: true,
            }]
        };
        let arms = reachable(elements.len(), index.width.bits())
            .into_iter()
            .map(|k| VCaseArm {
                item: k,
                body: load(self, elements[k as usize]),
            })
            .collect();
        let default = match (self.policy, elements.last()) {
            (IndexPolicy::Clamp, Some(last)) => load(self, *last),
            _ => vec![VStmt::Fatal {
                message: self.out_of_range_message(array),
            }],
        };
        out.push(VStmt::Case {
            selector: index.expr,
            width: index.width.bits(),
            arms,
            default,
        });
        Ok(Lowered::sized(VExpr::Ident(name), width))
    }
}

/// Element positions a selector of `width` bits can reach.
fn reachable(len: usize, width: Option<u32>) -> Vec<u64> {
    (0..len as u64)
        .filter(|k| match width {
            Some(w) if w < 64 => *k < (1u64 << w),
            _ => true,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_ir::{DesignBuilder, SignalKind};

    fn lower_default(design: &Design) -> LoweredModule {
        lower(design, &LowerConfig::default(), &DiagnosticSink::new()).unwrap()
    }

    #[test]
    fn hierarchy_is_flattened() {
        let mut b = DesignBuilder::new("top");
        let top = b.top();
        let x = b.input(top, "x", 4);
        let z = b.output(top, "z", 4);
        let inc = b.child(top, "inc");
        let a = b.input(inc, "a", 4);
        let t = b.wire(inc, "t", 4);
        let y = b.output(inc, "y", 4);
        b.comb(
            inc,
            "bump",
            Stmt::block(vec![
                Stmt::assign(t, Expr::binary(BinaryOp::Add, a.into(), Expr::int(1))),
                Stmt::assign(y, t),
            ]),
        );
        b.connect(top, x, a);
        b.connect(top, y, z);
        let m = lower_default(&b.finish().unwrap());

        assert_eq!(m.name, "top");
        assert_eq!(m.clock, None);
        let names: Vec<&str> = m.ports.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["x", "z"]);
        assert_eq!(m.port("z").unwrap().kind, VarKind::Wire);
        assert_eq!(
            m.decl("inc$t"),
            Some(&VDecl {
                kind: VarKind::Wire,
                name: "inc$t".into(),
                width: 4,
                init: None,
            })
        );
        assert_eq!(
            m.items,
            vec![
                VItem::Assign(VAssign {
                    lhs: VLValue::Ident("inc$t".into()),
                    rhs: VExpr::binary(BinaryOp::Add, VExpr::ident("x"), VExpr::literal(4, 1)),
                }),
                VItem::Assign(VAssign {
                    lhs: VLValue::Ident("z".into()),
                    rhs: VExpr::ident("inc$t"),
                }),
            ]
        );
    }

    #[test]
    fn sequential_rules_share_one_clocked_block() {
        let mut b = DesignBuilder::new("top");
        let top = b.top();
        let x = b.output(top, "x", 8);
        let y = b.output(top, "y", 8);
        b.set_init(x, Bits::truncated(8, 1));
        b.set_init(y, Bits::truncated(8, 2));
        b.seq(top, "take_y", Stmt::assign_next(x, y));
        b.seq(top, "take_x", Stmt::assign_next(y, x));
        let m = lower_default(&b.finish().unwrap());

        assert_eq!(m.clock.as_deref(), Some("clk"));
        assert_eq!(m.ports[0].name, "clk");
        assert_eq!(m.port("x").unwrap().kind, VarKind::Reg);
        assert_eq!(m.port("x").unwrap().init, Some(Bits::truncated(8, 1)));
        let blocks: Vec<&VBlock> = m.blocks().collect();
        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].is_clocked());
        assert_eq!(blocks[0].rules, vec!["top::take_y", "top::take_x"]);
        assert_eq!(
            blocks[0].body[0],
            VStmt::Assign {
                lhs: VLValue::Ident("x".into()),
                rhs: VExpr::ident("y"),
                blocking: false,
            }
        );
    }

    #[test]
    fn branching_rules_become_always_blocks() {
        let mut b = DesignBuilder::new("top");
        let top = b.top();
        let en = b.input(top, "en", 1);
        let a = b.input(top, "a", 4);
        let y = b.output(top, "y", 4);
        b.comb(
            top,
            "gate",
            Stmt::if_else(en.into(), Stmt::assign(y, a), Stmt::assign(y, Expr::int(0))),
        );
        let m = lower_default(&b.finish().unwrap());

        assert_eq!(m.assign_count(), 0);
        let block = m.blocks().next().unwrap();
        assert_eq!(block.trigger, Trigger::Signals(vec!["en".into(), "a".into()]));
        assert_eq!(m.port("y").unwrap().kind, VarKind::Reg);
        assert_eq!(
            block.body,
            vec![VStmt::If {
                cond: VExpr::ident("en"),
                then_body: vec![VStmt::Assign {
                    lhs: VLValue::Ident("y".into()),
                    rhs: VExpr::ident("a"),
                    blocking: true,
                }],
                else_body: vec![VStmt::Assign {
                    lhs: VLValue::Ident("y".into()),
                    rhs: VExpr::literal(4, 0),
                    blocking: true,
                }],
            }]
        );
    }

    #[test]
    fn widths_are_explicit() {
        let mut b = DesignBuilder::new("top");
        let top = b.top();
        let a = b.input(top, "a", 4);
        let c = b.input(top, "c", 4);
        let wide = b.input(top, "wide", 12);
        let sum = b.output(top, "sum", 8);
        let low = b.output(top, "low", 4);
        let s8 = b.bits_type(8, true);
        let sext = b.signal(top, "sext", s8, SignalKind::Port(PortDirection::Output));
        b.comb(
            top,
            "widths",
            Stmt::block(vec![
                Stmt::assign(sum, Expr::binary(BinaryOp::Add, a.into(), c.into())),
                Stmt::assign(low, wide),
                Stmt::assign(sext, a),
            ]),
        );
        let m = lower_default(&b.finish().unwrap());
        let rhs: Vec<&VExpr> = m
            .items
            .iter()
            .filter_map(|i| match i {
                VItem::Assign(a) => Some(&a.rhs),
                VItem::Always(_) => None,
            })
            .collect();
        // the 4-bit sum wraps before it is zero-extended
        assert_eq!(
            rhs[0],
            &VExpr::Concat(vec![
                VExpr::Literal(Bits::zero(4)),
                VExpr::binary(BinaryOp::Add, VExpr::ident("a"), VExpr::ident("c")),
            ])
        );
        assert_eq!(
            rhs[1],
            &VExpr::Range {
                name: "wide".into(),
                msb: 3,
                lsb: 0,
            }
        );
        assert_eq!(
            rhs[2],
            &VExpr::Concat(vec![
                VExpr::Repeat {
                    count: 4,
                    value: Box::new(VExpr::Bit {
                        name: "a".into(),
                        index: Box::new(VExpr::Int(3)),
                    }),
                },
                VExpr::ident("a"),
            ])
        );
    }

    #[test]
    fn temporaries_are_declared_at_module_scope() {
        let mut b = DesignBuilder::new("top");
        let top = b.top();
        let a = b.input(top, "a", 8);
        let y = b.output(top, "y", 8);
        let t = b.ident("t");
        b.comb(
            top,
            "twice",
            Stmt::block(vec![
                Stmt::let_(t, Expr::binary(BinaryOp::Add, a.into(), a.into())),
                Stmt::assign(y, Expr::local(t)),
            ]),
        );
        let m = lower_default(&b.finish().unwrap());
        assert_eq!(m.decl("t__0").map(|d| (d.kind, d.width)), Some((VarKind::Reg, 8)));
        assert_eq!(m.assign_count(), 0);
    }

    #[test]
    fn loops_unroll_up_to_the_limit() {
        let build = || {
            let mut b = DesignBuilder::new("top");
            let top = b.top();
            let a = b.input(top, "a", 4);
            let y = b.output(top, "y", 4);
            let i = b.ident("i");
            b.comb(
                top,
                "reverse",
                Stmt::for_range(
                    i,
                    0,
                    4,
                    Stmt::assign(
                        ember_ir::Target::from(y).bit(Expr::local(i)),
                        Expr::from(a).bit(Expr::binary(BinaryOp::Sub, Expr::int(3), Expr::local(i))),
                    ),
                ),
            );
            b.finish().unwrap()
        };

        let unrolled = lower_default(&build());
        let block = unrolled.blocks().next().unwrap();
        assert_eq!(block.body.len(), 4);
        assert_eq!(
            block.body[0],
            VStmt::Assign {
                lhs: VLValue::Range {
                    name: "y".into(),
                    msb: 0,
                    lsb: 0,
                },
                rhs: VExpr::Bit {
                    name: "a".into(),
                    index: Box::new(VExpr::Int(3)),
                },
                blocking: true,
            }
        );

        let sink = DiagnosticSink::new();
        let config = LowerConfig {
            unroll_limit: 2,
            ..LowerConfig::default()
        };
        let looped = lower(&build(), &config, &sink).unwrap();
        assert_eq!(looped.decl("i__0").map(|d| d.kind), Some(VarKind::Integer));
        let block = looped.blocks().next().unwrap();
        assert!(matches!(
            &block.body[0],
            VStmt::For { var, start: 0, stop: 4, step: 1, .. } if var == "i__0"
        ));
        let codes: Vec<String> = sink.diagnostics().iter().map(|d| d.code.to_string()).collect();
        assert_eq!(codes, vec!["L401"]);
    }

    #[test]
    fn dynamic_elements_become_case_selectors() {
        let mut b = DesignBuilder::new("top");
        let top = b.top();
        let byte = b.bits_type(8, false);
        let (arr, _) = b.signal_array(top, "r", 3, byte, SignalKind::Port(PortDirection::Input));
        let sel = b.input(top, "sel", 2);
        let y = b.output(top, "y", 8);
        b.comb(top, "pick", Stmt::assign(y, Expr::element(arr, sel.into())));
        let design = b.finish().unwrap();

        let m = lower_default(&design);
        let block = m.blocks().next().unwrap();
        let VStmt::Case {
            selector,
            width,
            arms,
            default,
        } = &block.body[0]
        else {
            panic!("expected a case statement, got {:?}", block.body[0]);
        };
        assert_eq!(selector, &VExpr::ident("sel"));
        assert_eq!(*width, Some(2));
        assert_eq!(arms.iter().map(|a| a.item).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert!(matches!(&default[0], VStmt::Fatal { message } if message.contains("top.r")));

        let clamp = LowerConfig {
            index_policy: IndexPolicy::Clamp,
            ..LowerConfig::default()
        };
        let m = lower(&design, &clamp, &DiagnosticSink::new()).unwrap();
        let block = m.blocks().next().unwrap();
        let VStmt::Case { default, .. } = &block.body[0] else {
            panic!("expected a case statement");
        };
        assert_eq!(
            default,
            &vec![VStmt::Assign {
                lhs: VLValue::Ident("_t0__0".into()),
                rhs: VExpr::ident("r_2"),
                blocking: true,
            }]
        );
    }

    #[test]
    fn dynamic_bit_inside_a_field_is_rejected() {
        let mut b = DesignBuilder::new("top");
        let top = b.top();
        let nib = b.bits_type(4, false);
        let pair = b.struct_type("pair", &[("lo", nib), ("hi", nib)]);
        let p = b.signal(top, "p", pair, SignalKind::Port(PortDirection::Output));
        let sel = b.input(top, "sel", 2);
        let hi = b.ident("hi");
        b.comb(
            top,
            "poke",
            Stmt::block(vec![
                Stmt::assign(p, Expr::lit(8, 0)),
                Stmt::assign(
                    ember_ir::Target::from(p).field(hi).bit(sel.into()),
                    Expr::lit(1, 1),
                ),
            ]),
        );
        let err = lower(&b.finish().unwrap(), &LowerConfig::default(), &DiagnosticSink::new())
            .unwrap_err();
        assert!(matches!(
            err,
            LowerError::Translation { rule, construct }
                if rule == "top::poke" && construct.contains("struct field")
        ));
    }

    #[test]
    fn keywords_are_renamed() {
        let mut b = DesignBuilder::new("top");
        let top = b.top();
        let a = b.input(top, "reg", 1);
        let y = b.output(top, "y", 1);
        b.comb(top, "copy", Stmt::assign(y, a));
        let m = lower_default(&b.finish().unwrap());
        assert!(m.port("reg_").is_some());
    }

    #[test]
    fn gate_and_event_keywords_are_renamed() {
        assert!(KEYWORDS.windows(2).all(|w| w[0] < w[1]));
        let mut b = DesignBuilder::new("top");
        let top = b.top();
        let a = b.input(top, "xor", 1);
        let y = b.output(top, "event", 1);
        b.comb(top, "copy", Stmt::assign(y, a));
        let m = lower_default(&b.finish().unwrap());
        assert!(m.port("xor_").is_some());
        assert!(m.port("event_").is_some());
        let text = crate::emit_verilog(&m, 2);
        assert!(!text.contains(" xor;") && !text.contains(" event;"), "{text}");
    }

    #[test]
    fn rules_without_reads_become_initial_blocks() {
        let mut b = DesignBuilder::new("top");
        let top = b.top();
        let y = b.output(top, "y", 4);
        b.set_init(y, Bits::truncated(4, 3));
        let t = b.ident("t");
        b.comb(
            top,
            "five",
            Stmt::block(vec![Stmt::let_(t, Expr::int(5)), Stmt::assign(y, Expr::local(t))]),
        );
        let m = lower_default(&b.finish().unwrap());

        let block = m.blocks().next().unwrap();
        assert_eq!(block.trigger, Trigger::Initial);
        assert_eq!(
            block.body[0],
            VStmt::Assign {
                lhs: VLValue::Ident("y".into()),
                rhs: VExpr::literal(4, 3),
                blocking: true,
            }
        );
        let port = m.port("y").unwrap();
        assert_eq!((port.kind, port.init.clone()), (VarKind::Reg, None));
        let text = crate::emit_verilog(&m, 2);
        assert!(text.contains("initial begin"), "{text}");
        assert!(!text.contains("always @"), "{text}");
    }
}
