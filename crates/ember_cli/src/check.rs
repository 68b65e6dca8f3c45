//! `ember check`: validation and rule analysis.
//!
//! Loads the design, runs the usage analyzer and dependency builder, renders
//! the resulting warnings, and with `--verbose` lists every rule with its
//! topological rank and read/write sets.

use std::path::Path;

use ember_analyze::{analyze_design, Coverage, DesignAnalysis};
use ember_diagnostics::DiagnosticSink;
use ember_ir::{Design, RuleKind};

use crate::pipeline::{load_design, render_diagnostics};
use crate::{CheckArgs, GlobalArgs};

/// Runs the `ember check` command.
///
/// Returns exit code 0 when the design analyzes cleanly; structural errors
/// are returned as `Err`.
pub fn run(args: &CheckArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let design = load_design(Path::new(&args.design))?;
    let top = design.name(design.top_module().name).to_string();

    if !global.quiet {
        eprintln!("   Checking {top}");
    }

    let sink = DiagnosticSink::new();
    let analysis = analyze_design(&design, &sink)?;
    let warnings = render_diagnostics(&sink.diagnostics(), global.color);

    if global.verbose > 0 && !global.quiet {
        for line in rule_report(&design, &analysis) {
            println!("{line}");
        }
    }

    if !global.quiet {
        eprintln!(
            "    Finished {top}: {} modules, {} rules, {} nets, {warnings} warning(s)",
            design.modules.len(),
            design.rules.len(),
            analysis.nets.len()
        );
    }
    Ok(0)
}

/// One line per rule: combinational rules in rank order, then sequential
/// rules in design order.
pub fn rule_report(design: &Design, analysis: &DesignAnalysis) -> Vec<String> {
    let sequential = design
        .rules_depth_first()
        .into_iter()
        .filter(|r| design.rules[*r].kind == RuleKind::Sequential);
    analysis
        .deps
        .order()
        .iter()
        .copied()
        .chain(sequential)
        .map(|rule| {
            let usage = analysis.usage(rule);
            let rank = match analysis.deps.rank(rule) {
                Some(rank) => format!("comb {rank}"),
                None => "seq".to_string(),
            };
            let mut reads: Vec<String> =
                usage.reads.iter().map(|s| design.signal_path(*s)).collect();
            reads.extend(
                usage
                    .dynamic_reads
                    .iter()
                    .map(|s| format!("{}?", design.signal_path(*s))),
            );
            let writes: Vec<String> = usage
                .writes
                .iter()
                .map(|(s, coverage)| match coverage {
                    Coverage::Definite => design.signal_path(*s),
                    Coverage::Conditional => format!("{}~", design.signal_path(*s)),
                })
                .collect();
            format!(
                "{:<8} {}  reads [{}]  writes [{}]",
                rank,
                design.rule_path(rule),
                reads.join(", "),
                writes.join(", ")
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_ir::{BinaryOp, DesignBuilder, Expr, Stmt};

    #[test]
    fn rules_are_listed_by_rank() {
        let mut b = DesignBuilder::new("top");
        let top = b.top();
        let a = b.input(top, "a", 4);
        let en = b.input(top, "en", 1);
        let mid = b.wire(top, "mid", 4);
        let y = b.output(top, "y", 4);
        let r = b.output(top, "r", 4);
        b.comb(
            top,
            "second",
            Stmt::assign(y, Expr::binary(BinaryOp::Add, mid.into(), Expr::int(1))),
        );
        b.comb(top, "first", Stmt::assign(mid, a));
        b.seq(top, "hold", Stmt::if_then(Expr::signal(en), Stmt::assign_next(r, a)));
        let design = b.finish().unwrap();

        let analysis = analyze_design(&design, &DiagnosticSink::new()).unwrap();
        let report = rule_report(&design, &analysis);
        assert_eq!(report.len(), 3);
        assert!(report[0].starts_with("comb 0   top::first"), "{}", report[0]);
        assert!(report[0].ends_with("reads [top.a]  writes [top.mid]"), "{}", report[0]);
        assert!(report[1].starts_with("comb 1   top::second"), "{}", report[1]);
        assert!(report[2].starts_with("seq      top::hold"), "{}", report[2]);
        assert!(report[2].ends_with("writes [top.r~]"), "{}", report[2]);
    }
}
