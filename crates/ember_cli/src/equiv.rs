//! `ember equiv`: native simulation against the lowered Verilog.
//!
//! Both executors receive the same random inputs every cycle and their port
//! values are compared after power-on and after every clock edge. A run-time
//! failure counts as agreement only when both sides fail on the same cycle.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use ember_common::Bits;
use ember_config::{EmberConfig, SimConfig};
use ember_diagnostics::DiagnosticSink;
use ember_ir::Design;
use ember_lower::LoweredSim;
use ember_sim::Simulator;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::pipeline::{input_ports, load_design, load_settings, random_inputs, render_diagnostics};
use crate::{EquivArgs, GlobalArgs};

/// Result of a side-by-side run.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Every compared cycle matched.
    Equivalent {
        /// Number of clock edges compared.
        cycles: u64,
    },
    /// Both executors failed on the same cycle.
    BothFailed {
        /// Cycle whose edge failed.
        cycle: u64,
        /// The native simulator's error.
        native: String,
        /// The lowered executor's error.
        lowered: String,
    },
    /// The executors disagreed.
    Diverged {
        /// First cycle that disagreed; 0 is power-on.
        cycle: u64,
        /// What differed.
        detail: String,
    },
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Equivalent { cycles } => write!(f, "equivalent over {cycles} cycle(s)"),
            Outcome::BothFailed {
                cycle,
                native,
                lowered,
            } => write!(
                f,
                "both failed at cycle {cycle} (native: {native}; lowered: {lowered})"
            ),
            Outcome::Diverged { cycle, detail } => write!(f, "diverged at cycle {cycle}: {detail}"),
        }
    }
}

/// Runs the `ember equiv` command. Returns exit code 1 on divergence.
pub fn run(args: &EquivArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let design_path = Path::new(&args.design);
    let config = load_settings(global, design_path)?;
    let design = Arc::new(load_design(design_path)?);

    if !global.quiet {
        eprintln!(
            "   Comparing {} over {} cycle(s)",
            design.name(design.top_module().name),
            args.cycles
        );
    }

    let outcome = compare(design, &config, args.cycles, args.seed, global.color)?;
    match outcome {
        Outcome::Diverged { .. } => {
            println!("{outcome}");
            Ok(1)
        }
        _ => {
            if !global.quiet {
                println!("{outcome}");
            }
            Ok(0)
        }
    }
}

/// Lowers `design` and runs both executors for `cycles` edges.
///
/// The lowering's index policy is used for the native simulator too so the
/// two sides agree on out-of-range selections.
pub fn compare(
    design: Arc<Design>,
    config: &EmberConfig,
    cycles: u64,
    seed: u64,
    color: bool,
) -> Result<Outcome, Box<dyn std::error::Error>> {
    let sim_config = SimConfig {
        index_policy: config.lower.index_policy,
        ..config.sim.clone()
    };
    let passes = sim_config.max_settle_passes;
    let mut native = Simulator::new(Arc::clone(&design), sim_config)?;
    render_diagnostics(native.diagnostics(), color);

    let module = ember_lower::lower(&design, &config.lower, &DiagnosticSink::new())?;
    let mut lowered = LoweredSim::new(module, passes)?;

    let ports = input_ports(&design);
    let mut rng = StdRng::seed_from_u64(seed);

    if let Some(detail) = first_difference(&native.port_values()?, &lowered.port_values()) {
        return Ok(Outcome::Diverged { cycle: 0, detail });
    }
    for index in 0..cycles {
        let cycle = index + 1;
        for (name, value) in random_inputs(&mut rng, &ports) {
            native.set(&name, value.clone())?;
            lowered.set(&name, value)?;
        }
        match (native.step(), lowered.step()) {
            (Ok(()), Ok(())) => {}
            (Err(n), Err(l)) => {
                return Ok(Outcome::BothFailed {
                    cycle,
                    native: n.to_string(),
                    lowered: l.to_string(),
                })
            }
            (Err(n), Ok(())) => {
                return Ok(Outcome::Diverged {
                    cycle,
                    detail: format!("only the native simulator failed: {n}"),
                })
            }
            (Ok(()), Err(l)) => {
                return Ok(Outcome::Diverged {
                    cycle,
                    detail: format!("only the lowered module failed: {l}"),
                })
            }
        }
        if let Some(detail) = first_difference(&native.port_values()?, &lowered.port_values()) {
            tracing::debug!(cycle, "port mismatch");
            return Ok(Outcome::Diverged { cycle, detail });
        }
    }
    Ok(Outcome::Equivalent { cycles })
}

/// Describes the first port whose values differ, if any.
fn first_difference(native: &[(String, Bits)], lowered: &[(String, Bits)]) -> Option<String> {
    for (n, l) in native.iter().zip(lowered) {
        if n.0 != l.0 {
            return Some(format!("port order differs: '{}' vs '{}'", n.0, l.0));
        }
        if n.1 != l.1 {
            return Some(format!(
                "port '{}' is {} natively but {} in the lowered module",
                n.0,
                n.1.to_hex(),
                l.1.to_hex()
            ));
        }
    }
    if native.len() != lowered.len() {
        return Some(format!(
            "{} native ports vs {} lowered ports",
            native.len(),
            lowered.len()
        ));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_config::IndexPolicy;
    use ember_ir::{BinaryOp, DesignBuilder, Expr, PortDirection, SignalKind, Stmt};

    fn selector() -> Arc<Design> {
        let mut b = DesignBuilder::new("top");
        let top = b.top();
        let byte = b.bits_type(8, false);
        let (arr, _) = b.signal_array(top, "r", 3, byte, SignalKind::Port(PortDirection::Input));
        let sel = b.input(top, "sel", 2);
        let acc = b.output(top, "acc", 8);
        b.set_init(acc, Bits::zero(8));
        b.seq(
            top,
            "sum",
            Stmt::assign_next(
                acc,
                Expr::binary(BinaryOp::Add, acc.into(), Expr::element(arr, sel.into())),
            ),
        );
        Arc::new(b.finish().unwrap())
    }

    #[test]
    fn clamped_selector_is_equivalent() {
        let mut config = EmberConfig::default();
        config.lower.index_policy = IndexPolicy::Clamp;
        let outcome = compare(selector(), &config, 200, 9, false).unwrap();
        assert_eq!(outcome, Outcome::Equivalent { cycles: 200 });
    }

    #[test]
    fn out_of_range_selection_fails_on_both_sides() {
        let outcome = compare(selector(), &EmberConfig::default(), 200, 9, false).unwrap();
        match outcome {
            Outcome::BothFailed { cycle, native, .. } => {
                assert!(cycle >= 1);
                assert!(native.contains("top.r") || native.contains("index"), "{native}");
            }
            other => panic!("expected both sides to fail, got {other}"),
        }
    }

    #[test]
    fn differences_name_the_port() {
        let a = vec![("y".to_string(), Bits::truncated(8, 1))];
        let b = vec![("y".to_string(), Bits::truncated(8, 2))];
        assert_eq!(
            first_difference(&a, &b).unwrap(),
            "port 'y' is 01 natively but 02 in the lowered module"
        );
        assert_eq!(first_difference(&a, &a), None);
        assert!(first_difference(&a, &[]).is_some());
    }
}
