//! The cycle-stepping simulator.
//!
//! A [`Simulator`] owns the value of every storage net of one design. Each
//! [`step`](Simulator::step) runs the cycle state machine:
//!
//! 1. **Settling**: combinational rules whose inputs changed are re-run in
//!    dependency-rank order until no net changes. Rules reached only through
//!    run-time indices are caught by the same fixed-point loop, which gives up
//!    with [`SimError::Oscillation`] after `max_settle_passes` passes.
//! 2. **Committing**: every sequential rule runs against the settled values
//!    and collects its deferred writes; all of them are then applied at once,
//!    so no sequential rule sees another's new value in the same cycle.
//! 3. **Settling** again, so register outputs reach the combinational logic
//!    before the cycle ends.

use std::collections::BTreeMap;
use std::sync::Arc;

use ember_analyze::{analyze_design, DesignAnalysis};
use ember_common::Bits;
use ember_config::SimConfig;
use ember_diagnostics::{Diagnostic, DiagnosticSink};
use ember_ir::{Design, NetId, RuleId, RuleKind, SignalId};

use crate::error::SimError;
use crate::eval::RuleExec;
use crate::trace::{format_line, TraceSink};

/// Where the simulator is in its cycle state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Between cycles; outputs are stable.
    Idle,
    /// Re-running combinational rules towards a fixed point.
    Settling,
    /// Applying deferred writes of sequential rules.
    Committing,
    /// A run-time error ended the simulation; only `reset_state` recovers.
    Failed,
}

/// Cycle-accurate simulation of one design.
pub struct Simulator {
    design: Arc<Design>,
    analysis: DesignAnalysis,
    config: SimConfig,
    /// Current value per net.
    values: Vec<Bits>,
    /// Value per net after construction and `reset_state`.
    initial: Vec<Bits>,
    /// Whether a net has a driver or an initial value.
    readable: Vec<bool>,
    /// Combinational rules that read each net.
    readers: Vec<Vec<RuleId>>,
    /// Nets written by each rule, indexed by rule.
    written: Vec<Vec<NetId>>,
    /// Combinational rules awaiting re-evaluation, indexed by rule.
    stale: Vec<bool>,
    sequential: Vec<RuleId>,
    ports: Vec<SignalId>,
    phase: Phase,
    cycle: u64,
    diagnostics: Vec<Diagnostic>,
    trace: Option<Box<dyn TraceSink>>,
}

impl Simulator {
    /// Elaborates and analyzes `design`, then settles the initial values.
    ///
    /// Structural problems (multiple drivers, unsupported constructs,
    /// combinational cycles) are returned as [`SimError::Analyze`].
    pub fn new(design: Arc<Design>, config: SimConfig) -> Result<Self, SimError> {
        let sink = DiagnosticSink::new();
        let analysis = analyze_design(&design, &sink)?;

        let initial: Vec<Bits> = analysis
            .nets
            .iter()
            .map(|(_, net)| {
                net.members
                    .iter()
                    .find_map(|s| design.signals[*s].init.clone())
                    .map_or_else(|| Bits::zero(net.width), |v| v.fit(net.width, false))
            })
            .collect();
        let readable: Vec<bool> = analysis
            .nets
            .iter()
            .map(|(id, net)| {
                analysis.driver(id).is_some()
                    || net.members.iter().any(|s| design.signals[*s].init.is_some())
            })
            .collect();

        let mut readers: Vec<Vec<RuleId>> = vec![Vec::new(); analysis.nets.len()];
        let mut written: Vec<Vec<NetId>> = Vec::with_capacity(design.rules.len());
        for usage in &analysis.usages {
            let mut nets: Vec<NetId> = usage
                .writes
                .iter()
                .map(|(s, _)| analysis.nets.net_of(*s))
                .collect();
            nets.sort();
            nets.dedup();
            written.push(nets);
            if usage.kind != RuleKind::Combinational {
                continue;
            }
            for signal in usage.all_reads() {
                let list = &mut readers[analysis.nets.net_of(signal).index()];
                if !list.contains(&usage.rule) {
                    list.push(usage.rule);
                }
            }
        }
        let sequential = design
            .rules_depth_first()
            .into_iter()
            .filter(|r| design.rules[*r].kind == RuleKind::Sequential)
            .collect();
        let ports = design.top_ports();

        let mut sim = Self {
            values: initial.clone(),
            initial,
            readable,
            readers,
            written,
            stale: vec![false; design.rules.len()],
            sequential,
            ports,
            phase: Phase::Idle,
            cycle: 0,
            diagnostics: sink.take_all(),
            trace: None,
            analysis,
            config,
            design,
        };
        sim.reset_state()?;
        tracing::info!(
            nets = sim.values.len(),
            rules = sim.design.rules.len(),
            "simulator ready"
        );
        Ok(sim)
    }

    /// The simulated design.
    pub fn design(&self) -> &Arc<Design> {
        &self.design
    }

    /// The analysis the simulator runs from.
    pub fn analysis(&self) -> &DesignAnalysis {
        &self.analysis
    }

    /// Warnings found while analyzing the design.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Current state-machine phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Number of completed cycles since construction or the last reset.
    pub fn cycle_count(&self) -> u64 {
        self.cycle
    }

    /// Attaches a sink that receives the port values after every cycle.
    pub fn set_trace(&mut self, sink: Box<dyn TraceSink>) {
        self.trace = Some(sink);
    }

    /// Flushes and detaches the trace sink, if any.
    pub fn finish_trace(&mut self) -> Result<(), SimError> {
        match self.trace.take() {
            Some(mut sink) => sink.finish(),
            None => Ok(()),
        }
    }

    /// Restores every net to its initial value, clears a failure, and
    /// settles again. The cycle count restarts at zero.
    pub fn reset_state(&mut self) -> Result<(), SimError> {
        self.values.clone_from(&self.initial);
        self.cycle = 0;
        self.phase = Phase::Idle;
        self.mark_all_stale();
        let result = self.settle();
        self.finish_phase(result).map(|_| ())
    }

    /// Drives a top-level input port. The value must have the port's width.
    ///
    /// Combinational consequences become visible at the next
    /// [`step`](Self::step) or [`settle_all`](Self::settle_all).
    pub fn set(&mut self, name: &str, value: Bits) -> Result<(), SimError> {
        self.ensure_live()?;
        let signal = self.input_port(name)?;
        let expected = self.design.signal_width(signal);
        if value.width() != expected {
            return Err(SimError::WidthMismatch {
                signal: name.to_string(),
                expected,
                actual: value.width(),
            });
        }
        let net = self.analysis.nets.net_of(signal);
        if self.values[net.index()] != value {
            self.values[net.index()] = value;
            self.mark_readers(net);
        }
        Ok(())
    }

    /// Drives a top-level input port from an integer that must fit its width.
    pub fn set_u64(&mut self, name: &str, value: u64) -> Result<(), SimError> {
        self.ensure_live()?;
        let signal = self.input_port(name)?;
        let expected = self.design.signal_width(signal);
        let bits = Bits::new(expected, value).map_err(|_| SimError::WidthMismatch {
            signal: name.to_string(),
            expected,
            actual: 64 - value.leading_zeros(),
        })?;
        self.set(name, bits)
    }

    /// Reads a top-level port.
    pub fn get(&self, name: &str) -> Result<Bits, SimError> {
        self.ensure_live()?;
        let signal = self
            .design
            .find_port(name)
            .ok_or_else(|| SimError::NotAPort {
                name: name.to_string(),
            })?;
        self.read(signal)
    }

    /// Reads a top-level port of at most 64 bits as an integer.
    pub fn get_u64(&self, name: &str) -> Result<u64, SimError> {
        let value = self.get(name)?;
        value.to_u64().ok_or_else(|| SimError::WidthMismatch {
            signal: name.to_string(),
            expected: 64,
            actual: value.width(),
        })
    }

    /// Reads any signal by its dotted path, e.g. `top.sorter.lo`.
    pub fn peek(&self, path: &str) -> Result<Bits, SimError> {
        self.ensure_live()?;
        let signal = self
            .design
            .find_signal(path)
            .ok_or_else(|| SimError::UnknownSignal {
                path: path.to_string(),
            })?;
        self.read(signal)
    }

    /// Top-level port names and values in declaration order.
    ///
    /// Fails with [`SimError::UndrivenRead`] if a port has neither a driver
    /// nor an initial value.
    pub fn port_values(&self) -> Result<Vec<(String, Bits)>, SimError> {
        self.ports
            .iter()
            .map(|s| {
                let name = self.design.name(self.design.signals[*s].name).to_string();
                Ok((name, self.read(*s)?))
            })
            .collect()
    }

    /// Renders the current port values as one trace line.
    pub fn line_trace(&self) -> Result<String, SimError> {
        Ok(format_line(self.cycle, &self.port_values()?))
    }

    /// Advances one clock cycle.
    pub fn step(&mut self) -> Result<(), SimError> {
        self.ensure_live()?;
        let result = self.run_cycle();
        self.finish_phase(result)?;
        self.cycle += 1;
        if self.trace.is_some() {
            let ports = self.port_values()?;
            if let Some(sink) = self.trace.as_mut() {
                sink.record(self.cycle, &ports)?;
            }
        }
        Ok(())
    }

    /// Advances `cycles` clock cycles, stopping at the first error.
    pub fn step_n(&mut self, cycles: u64) -> Result<(), SimError> {
        for _ in 0..cycles {
            self.step()?;
        }
        Ok(())
    }

    /// Re-runs every combinational rule to a fixed point and returns how
    /// many nets changed. On a settled simulator this is zero.
    pub fn settle_all(&mut self) -> Result<usize, SimError> {
        self.ensure_live()?;
        self.mark_all_stale();
        let result = self.settle();
        self.finish_phase(result)
    }

    fn ensure_live(&self) -> Result<(), SimError> {
        if self.phase == Phase::Failed {
            return Err(SimError::Failed);
        }
        Ok(())
    }

    fn finish_phase<T>(&mut self, result: Result<T, SimError>) -> Result<T, SimError> {
        match &result {
            Ok(_) => self.phase = Phase::Idle,
            Err(err) => {
                tracing::debug!(cycle = self.cycle, error = %err, "simulation failed");
                self.phase = Phase::Failed;
            }
        }
        result
    }

    fn input_port(&self, name: &str) -> Result<SignalId, SimError> {
        let signal = self
            .design
            .find_port(name)
            .ok_or_else(|| SimError::NotAPort {
                name: name.to_string(),
            })?;
        if !self.design.signals[signal].kind.is_input() {
            return Err(SimError::NotAnInput {
                name: name.to_string(),
            });
        }
        Ok(signal)
    }

    fn read(&self, signal: SignalId) -> Result<Bits, SimError> {
        let net = self.analysis.nets.net_of(signal).index();
        if !self.readable[net] {
            return Err(SimError::UndrivenRead {
                signal: self.design.signal_path(signal),
            });
        }
        Ok(self.values[net].clone())
    }

    fn mark_all_stale(&mut self) {
        for rule in self.analysis.deps.order() {
            self.stale[rule.index()] = true;
        }
    }

    fn mark_readers(&mut self, net: NetId) {
        for rule in &self.readers[net.index()] {
            self.stale[rule.index()] = true;
        }
    }

    fn run_cycle(&mut self) -> Result<(), SimError> {
        self.settle()?;
        self.commit()?;
        self.settle()?;
        Ok(())
    }

    /// Runs stale combinational rules until none is left.
    fn settle(&mut self) -> Result<usize, SimError> {
        self.phase = Phase::Settling;
        let max = self.config.max_settle_passes;
        let mut changed = 0;
        let mut passes = 0u32;
        loop {
            if !self.analysis.deps.order().iter().any(|r| self.stale[r.index()]) {
                break;
            }
            if passes == max {
                let rules = self
                    .analysis
                    .deps
                    .order()
                    .iter()
                    .filter(|r| self.stale[r.index()])
                    .map(|r| self.design.rule_path(*r))
                    .collect();
                return Err(SimError::Oscillation {
                    passes: max,
                    rules,
                });
            }
            passes += 1;
            let before = changed;
            for i in 0..self.analysis.deps.order().len() {
                let rule = self.analysis.deps.order()[i];
                if self.stale[rule.index()] {
                    self.stale[rule.index()] = false;
                    changed += self.eval_combinational(rule)?;
                }
            }
            tracing::debug!(
                cycle = self.cycle,
                pass = passes,
                changed = changed - before,
                "settle pass"
            );
        }
        Ok(changed)
    }

    /// Runs one combinational rule and marks the readers of every net it
    /// changed. Returns the number of changed nets.
    fn eval_combinational(&mut self, rule: RuleId) -> Result<usize, SimError> {
        let before: Vec<Bits> = self.written[rule.index()]
            .iter()
            .map(|n| self.values[n.index()].clone())
            .collect();
        RuleExec::new(
            &self.design,
            &self.analysis,
            rule,
            &self.readable,
            self.config.index_policy,
            &mut self.values,
            None,
        )
        .run()?;

        let changed: Vec<NetId> = self.written[rule.index()]
            .iter()
            .zip(before)
            .filter(|(n, old)| self.values[n.index()] != *old)
            .map(|(n, _)| *n)
            .collect();
        tracing::trace!(
            rule = %self.design.rule_path(rule),
            changed = changed.len(),
            "evaluated combinational rule"
        );
        for net in &changed {
            self.mark_readers(*net);
        }
        Ok(changed.len())
    }

    /// Runs every sequential rule against the settled values, then applies
    /// all deferred writes at once.
    fn commit(&mut self) -> Result<(), SimError> {
        self.phase = Phase::Committing;
        let mut pending: BTreeMap<NetId, Bits> = BTreeMap::new();
        for &rule in &self.sequential {
            RuleExec::new(
                &self.design,
                &self.analysis,
                rule,
                &self.readable,
                self.config.index_policy,
                &mut self.values,
                Some(&mut pending),
            )
            .run()?;
            tracing::trace!(rule = %self.design.rule_path(rule), "evaluated sequential rule");
        }

        let mut committed = 0usize;
        for (net, value) in pending {
            if self.values[net.index()] != value {
                self.values[net.index()] = value;
                self.mark_readers(net);
                committed += 1;
            }
        }
        tracing::debug!(cycle = self.cycle, committed, "committed sequential writes");
        Ok(())
    }
}
