//! Whole-design analysis: nets, rule usage, drivers, and dependencies.

use ember_common::Bits;
use ember_diagnostics::{Diagnostic, DiagnosticCode, DiagnosticSink};
use ember_ir::{Design, ElabError, NetId, NetMap, RuleId, RuleKind, SignalId, SignalKind};

use crate::deps::DependencyGraph;
use crate::error::AnalyzeError;
use crate::usage::{analyze_rule, RuleUsage};

/// The single source of a net's value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Driver {
    /// A top-level input port set by the caller.
    Input(SignalId),
    /// A constant signal.
    Constant(SignalId, Bits),
    /// An update rule.
    Rule(RuleId),
}

/// Everything the simulator and the lowering engine need to know about a
/// validated design.
#[derive(Debug, Clone)]
pub struct DesignAnalysis {
    /// Storage nets.
    pub nets: NetMap,
    /// Per-rule usage, indexed by rule.
    pub usages: Vec<RuleUsage>,
    /// Per-net driver, indexed by net; `None` for undriven nets.
    pub drivers: Vec<Option<Driver>>,
    /// Combinational dependencies and ranks.
    pub deps: DependencyGraph,
}

impl DesignAnalysis {
    /// Usage of one rule.
    pub fn usage(&self, rule: RuleId) -> &RuleUsage {
        &self.usages[rule.index()]
    }

    /// Driver of one net.
    pub fn driver(&self, net: NetId) -> Option<&Driver> {
        self.drivers[net.index()].as_ref()
    }

    /// Rules that read `net` statically or through a run-time index.
    pub fn readers_of(&self, net: NetId) -> Vec<RuleId> {
        self.usages
            .iter()
            .filter(|u| u.all_reads().any(|s| self.nets.net_of(s) == net))
            .map(|u| u.rule)
            .collect()
    }
}

/// Validates the design and analyzes every rule.
///
/// Non-fatal findings go to `sink`: latch hazards (`W301`), sequential
/// rules that write nothing (`W302`), and wires nothing uses (`W303`).
pub fn analyze_design(design: &Design, sink: &DiagnosticSink) -> Result<DesignAnalysis, AnalyzeError> {
    design.validate()?;
    let nets = NetMap::build(design)?;

    let usages = design
        .rules
        .ids()
        .map(|rule| {
            let usage = analyze_rule(design, rule)?;
            tracing::trace!(
                rule = %design.rule_path(rule),
                reads = usage.reads.len(),
                dynamic_reads = usage.dynamic_reads.len(),
                writes = usage.writes.len(),
                "analyzed rule"
            );
            Ok(usage)
        })
        .collect::<Result<Vec<_>, AnalyzeError>>()?;

    let drivers = resolve_drivers(design, &nets, &usages)?;
    report_hazards(design, &nets, &usages, &drivers, sink);
    let deps = DependencyGraph::build(design, &nets, &usages)?;

    tracing::info!(
        modules = design.modules.len(),
        rules = usages.len(),
        nets = nets.len(),
        "design analyzed"
    );
    Ok(DesignAnalysis {
        nets,
        usages,
        drivers,
        deps,
    })
}

fn resolve_drivers(
    design: &Design,
    nets: &NetMap,
    usages: &[RuleUsage],
) -> Result<Vec<Option<Driver>>, ElabError> {
    let mut candidates: Vec<Vec<Driver>> = vec![Vec::new(); nets.len()];
    for (id, signal) in design.signals.iter() {
        let net = nets.net_of(id).index();
        match signal.kind {
            SignalKind::Port(_) if signal.kind.is_input() && signal.owner == design.top => {
                candidates[net].push(Driver::Input(id));
            }
            SignalKind::Constant => {
                if let Some(value) = &signal.init {
                    candidates[net].push(Driver::Constant(id, value.clone()));
                }
            }
            _ => {}
        }
    }
    for usage in usages {
        for (signal, _) in &usage.writes {
            let net = nets.net_of(*signal).index();
            let driver = Driver::Rule(usage.rule);
            if !candidates[net].contains(&driver) {
                candidates[net].push(driver);
            }
        }
    }

    candidates
        .into_iter()
        .enumerate()
        .map(|(i, mut found)| {
            if found.len() > 1 {
                let net = nets.net(NetId::from_raw(i as u32));
                return Err(ElabError::MultipleDrivers {
                    net: design.signal_path(net.canonical),
                    drivers: found.iter().map(|d| describe(design, d)).collect(),
                });
            }
            Ok(found.pop())
        })
        .collect()
}

fn describe(design: &Design, driver: &Driver) -> String {
    match driver {
        Driver::Input(s) => format!("input port {}", design.signal_path(*s)),
        Driver::Constant(s, _) => format!("constant {}", design.signal_path(*s)),
        Driver::Rule(r) => format!("rule {}", design.rule_path(*r)),
    }
}

fn report_hazards(
    design: &Design,
    nets: &NetMap,
    usages: &[RuleUsage],
    drivers: &[Option<Driver>],
    sink: &DiagnosticSink,
) {
    for usage in usages {
        let path = design.rule_path(usage.rule);
        match usage.kind {
            RuleKind::Combinational => {
                for signal in usage.conditional_writes() {
                    let net = nets.net(nets.net_of(signal));
                    if net.members.iter().any(|s| design.signals[*s].init.is_some()) {
                        continue;
                    }
                    let name = design.signal_path(signal);
                    tracing::warn!(rule = %path, signal = %name, "latch hazard");
                    sink.emit(
                        Diagnostic::warning(
                            DiagnosticCode::LATCH_HAZARD,
                            format!("`{name}` is not assigned on every path of a combinational rule"),
                        )
                        .at(path.clone())
                        .with_note("the value is held from an earlier evaluation, which infers a latch")
                        .with_help("assign a default value at the start of the rule"),
                    );
                }
            }
            RuleKind::Sequential => {
                if usage.writes.is_empty() {
                    tracing::warn!(rule = %path, "sequential rule writes nothing");
                    sink.emit(
                        Diagnostic::warning(
                            DiagnosticCode::EMPTY_SEQUENTIAL,
                            "sequential rule never assigns a next value",
                        )
                        .at(path),
                    );
                }
            }
        }
    }

    for (net_id, net) in nets.iter() {
        let all_wires = net
            .members
            .iter()
            .all(|s| design.signals[*s].kind == SignalKind::Wire);
        let used = drivers[net_id.index()].is_some()
            || usages
                .iter()
                .any(|u| u.all_reads().any(|s| nets.net_of(s) == net_id));
        if all_wires && !used {
            let name = design.signal_path(net.canonical);
            sink.emit(
                Diagnostic::warning(DiagnosticCode::UNUSED_SIGNAL, format!("wire `{name}` is never used"))
                    .at(name),
            );
        }
    }
}
