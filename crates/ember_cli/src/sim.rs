//! `ember sim`: run a design cycle by cycle.
//!
//! Inputs come from a stimulus file when one is given and from a seeded random
//! source otherwise. With `--trace` (or `sim.trace` in `ember.toml`) one line
//! of port values is printed per cycle; otherwise only the final line is.

use std::path::Path;
use std::sync::Arc;

use ember_sim::{LineTrace, Simulator};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::pipeline::{
    input_ports, load_design, load_settings, parse_stimulus, random_inputs, render_diagnostics,
    CycleInputs,
};
use crate::{GlobalArgs, SimArgs};

/// Cycles run when neither `--cycles` nor a stimulus file is given.
const DEFAULT_CYCLES: u64 = 16;

/// Runs the `ember sim` command.
pub fn run(args: &SimArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let design_path = Path::new(&args.design);
    let config = load_settings(global, design_path)?;
    let design = Arc::new(load_design(design_path)?);
    let ports = input_ports(&design);

    let stimulus = match &args.stimulus {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .map_err(|e| format!("cannot read stimulus '{path}': {e}"))?;
            Some(parse_stimulus(&design, &text)?)
        }
        None => None,
    };
    let cycles = args.cycles.unwrap_or_else(|| match &stimulus {
        Some(s) => s.len() as u64,
        None => DEFAULT_CYCLES,
    });

    if !global.quiet {
        eprintln!(
            "  Simulating {} for {cycles} cycle(s)",
            design.name(design.top_module().name)
        );
    }

    let trace = args.trace || config.sim.trace;
    let mut sim = Simulator::new(Arc::clone(&design), config.sim)?;
    render_diagnostics(sim.diagnostics(), global.color);
    if trace {
        println!("{}", sim.line_trace()?);
        sim.set_trace(Box::new(LineTrace::new(std::io::stdout())));
    }

    let mut rng = StdRng::seed_from_u64(args.seed);
    for cycle in 0..cycles {
        let inputs: CycleInputs = match &stimulus {
            Some(s) => s.get(cycle as usize).cloned().unwrap_or_default(),
            None => random_inputs(&mut rng, &ports),
        };
        for (name, value) in inputs {
            sim.set(&name, value)?;
        }
        sim.step()?;
    }
    sim.finish_trace()?;

    if !trace && !global.quiet {
        println!("{}", sim.line_trace()?);
    }
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_common::Bits;
    use ember_ir::{BinaryOp, DesignBuilder, Expr, Stmt};
    use tempfile::TempDir;

    fn write_counter(dir: &Path) -> String {
        let mut b = DesignBuilder::new("top");
        let top = b.top();
        let en = b.input(top, "en", 1);
        let count = b.output(top, "count", 4);
        b.set_init(count, Bits::zero(4));
        b.seq(
            top,
            "tick",
            Stmt::if_then(
                Expr::signal(en),
                Stmt::assign_next(count, Expr::binary(BinaryOp::Add, count.into(), Expr::int(1))),
            ),
        );
        let path = dir.join("counter.json");
        std::fs::write(&path, serde_json::to_string(&b.finish().unwrap()).unwrap()).unwrap();
        path.display().to_string()
    }

    fn quiet() -> GlobalArgs {
        GlobalArgs {
            quiet: true,
            verbose: 0,
            color: false,
            config: None,
        }
    }

    fn args(design: String) -> SimArgs {
        SimArgs {
            design,
            stimulus: None,
            cycles: None,
            seed: 0,
            trace: false,
        }
    }

    #[test]
    fn random_run_succeeds() {
        let tmp = TempDir::new().unwrap();
        let design = write_counter(tmp.path());
        assert_eq!(run(&args(design), &quiet()).unwrap(), 0);
    }

    #[test]
    fn stimulus_run_succeeds() {
        let tmp = TempDir::new().unwrap();
        let design = write_counter(tmp.path());
        let stim = tmp.path().join("stim.json");
        std::fs::write(&stim, r#"[{"en": 1}, {}, {"en": 0}]"#).unwrap();
        let mut a = args(design);
        a.stimulus = Some(stim.display().to_string());
        a.trace = true;
        assert_eq!(run(&a, &quiet()).unwrap(), 0);
    }

    #[test]
    fn driving_an_output_fails() {
        let tmp = TempDir::new().unwrap();
        let design = write_counter(tmp.path());
        let stim = tmp.path().join("stim.json");
        std::fs::write(&stim, r#"[{"count": 1}]"#).unwrap();
        let mut a = args(design);
        a.stimulus = Some(stim.display().to_string());
        let err = run(&a, &quiet()).unwrap_err();
        assert!(err.to_string().contains("count"), "{err}");
    }

    #[test]
    fn bad_config_is_reported() {
        let tmp = TempDir::new().unwrap();
        let design = write_counter(tmp.path());
        std::fs::write(tmp.path().join("ember.toml"), "[sim]\nmax_settle_passes = 0\n").unwrap();
        assert!(run(&args(design), &quiet()).is_err());
    }
}
