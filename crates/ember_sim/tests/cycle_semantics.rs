//! Commit snapshots, settling failures, width discipline, index policy, and
//! trace output.

use std::io::BufWriter;
use std::sync::Arc;

use ember_analyze::AnalyzeError;
use ember_common::Bits;
use ember_ir::{BinaryOp, Design, DesignBuilder, Expr, PortDirection, SignalKind, Stmt, UnaryOp};
use ember_sim::{IndexPolicy, LineTrace, Phase, SimConfig, SimError, Simulator};

fn sim(design: Design) -> Simulator {
    Simulator::new(Arc::new(design), SimConfig::default()).unwrap()
}

#[test]
fn registers_swap_from_one_snapshot() {
    let mut b = DesignBuilder::new("top");
    let top = b.top();
    let x = b.output(top, "x", 8);
    let y = b.output(top, "y", 8);
    b.set_init(x, Bits::truncated(8, 1));
    b.set_init(y, Bits::truncated(8, 2));
    b.seq(top, "take_y", Stmt::assign_next(x, y));
    b.seq(top, "take_x", Stmt::assign_next(y, x));
    let mut sim = sim(b.finish().unwrap());

    sim.step().unwrap();
    assert_eq!((sim.get_u64("x").unwrap(), sim.get_u64("y").unwrap()), (2, 1));
    sim.step().unwrap();
    assert_eq!((sim.get_u64("x").unwrap(), sim.get_u64("y").unwrap()), (1, 2));
}

#[test]
fn registered_outputs_feed_combinational_logic_in_the_same_cycle() {
    let mut b = DesignBuilder::new("top");
    let top = b.top();
    let q = b.wire(top, "q", 4);
    b.set_init(q, Bits::zero(4));
    let doubled = b.output(top, "doubled", 4);
    b.seq(
        top,
        "count",
        Stmt::assign_next(q, Expr::binary(BinaryOp::Add, q.into(), Expr::int(1))),
    );
    b.comb(
        top,
        "double",
        Stmt::assign(doubled, Expr::binary(BinaryOp::Shl, q.into(), Expr::int(1))),
    );
    let mut sim = sim(b.finish().unwrap());
    sim.step_n(3).unwrap();
    assert_eq!(sim.peek("top.q").unwrap(), Bits::truncated(4, 3));
    assert_eq!(sim.get_u64("doubled").unwrap(), 6);
}

#[test]
fn combinational_cycle_is_rejected_at_construction() {
    let mut b = DesignBuilder::new("top");
    let top = b.top();
    let x = b.wire(top, "x", 1);
    let y = b.wire(top, "y", 1);
    b.comb(top, "invert", Stmt::assign(x, Expr::unary(UnaryOp::Not, y.into())));
    b.comb(top, "copy", Stmt::assign(y, x));
    let result = Simulator::new(Arc::new(b.finish().unwrap()), SimConfig::default());
    assert_eq!(
        result.err(),
        Some(SimError::Analyze(AnalyzeError::CombinationalCycle {
            cycle: vec!["top::invert".into(), "top::copy".into(), "top::invert".into()],
        }))
    );
}

fn ring() -> Design {
    // y = ~arr[sel] with arr = [a, y]: a loop only through a run-time index
    let mut b = DesignBuilder::new("top");
    let top = b.top();
    let a = b.input(top, "a", 1);
    let sel = b.input(top, "sel", 1);
    let y = b.output(top, "y", 1);
    let arr = b.array(top, "arr", vec![a, y]);
    b.comb(
        top,
        "flip",
        Stmt::assign(y, Expr::unary(UnaryOp::Not, Expr::element(arr, sel.into()))),
    );
    b.finish().unwrap()
}

#[test]
fn dynamic_loop_oscillates_and_poisons_until_reset() {
    let mut sim = sim(ring());
    assert_eq!(sim.get_u64("y").unwrap(), 1);

    sim.set_u64("sel", 1).unwrap();
    assert_eq!(
        sim.step(),
        Err(SimError::Oscillation {
            passes: 64,
            rules: vec!["top::flip".into()],
        })
    );
    assert_eq!(sim.phase(), Phase::Failed);
    assert_eq!(sim.get("y"), Err(SimError::Failed));
    assert_eq!(sim.step(), Err(SimError::Failed));

    sim.reset_state().unwrap();
    assert_eq!(sim.phase(), Phase::Idle);
    assert_eq!(sim.get_u64("sel").unwrap(), 0);
    assert_eq!(sim.get_u64("y").unwrap(), 1);
}

#[test]
fn oscillation_bound_is_configurable() {
    let config = SimConfig {
        max_settle_passes: 3,
        ..SimConfig::default()
    };
    let mut sim = Simulator::new(Arc::new(ring()), config).unwrap();
    sim.set_u64("sel", 1).unwrap();
    assert!(matches!(
        sim.step(),
        Err(SimError::Oscillation { passes: 3, .. })
    ));
}

#[test]
fn reading_an_undriven_wire_fails_at_run_time() {
    let mut b = DesignBuilder::new("top");
    let top = b.top();
    let en = b.input(top, "en", 1);
    let floating = b.wire(top, "floating", 4);
    let y = b.output(top, "y", 4);
    b.comb(
        top,
        "pick",
        Stmt::assign(y, Expr::mux(en.into(), floating.into(), Expr::lit(4, 0))),
    );
    let mut sim = sim(b.finish().unwrap());
    sim.step().unwrap();

    sim.set_u64("en", 1).unwrap();
    assert_eq!(
        sim.step(),
        Err(SimError::UndrivenSignal {
            signal: "top.floating".into(),
            rule: "top::pick".into(),
        })
    );
    assert_eq!(sim.phase(), Phase::Failed);
}

#[test]
fn stepping_api_requires_exact_widths() {
    let mut b = DesignBuilder::new("top");
    let top = b.top();
    let a = b.input(top, "a", 4);
    let y = b.output(top, "y", 4);
    b.comb(top, "pass", Stmt::assign(y, a));
    let mut sim = sim(b.finish().unwrap());

    assert_eq!(
        sim.set_u64("a", 16),
        Err(SimError::WidthMismatch {
            signal: "a".into(),
            expected: 4,
            actual: 5,
        })
    );
    assert_eq!(
        sim.set("a", Bits::truncated(8, 1)),
        Err(SimError::WidthMismatch {
            signal: "a".into(),
            expected: 4,
            actual: 8,
        })
    );
    sim.set_u64("a", 15).unwrap();
    sim.step().unwrap();
    assert_eq!(sim.get_u64("y").unwrap(), 15);
}

#[test]
fn assignment_widths_truncate_and_extend() {
    let mut b = DesignBuilder::new("top");
    let top = b.top();
    let wide = b.input(top, "wide", 12);
    let nib = b.input(top, "nib", 4);
    let low = b.output(top, "low", 4);
    let zext = b.output(top, "zext", 8);
    let s8 = b.bits_type(8, true);
    let sext = b.signal(top, "sext", s8, SignalKind::Port(PortDirection::Output));
    b.comb(
        top,
        "widths",
        Stmt::block(vec![
            Stmt::assign(low, wide),
            Stmt::assign(zext, nib),
            Stmt::assign(sext, nib),
        ]),
    );
    let mut sim = sim(b.finish().unwrap());

    sim.set_u64("wide", 0xabc).unwrap();
    sim.set_u64("nib", 0b1010).unwrap();
    sim.step().unwrap();
    assert_eq!(sim.get_u64("low").unwrap(), 0xc);
    assert_eq!(sim.get_u64("zext").unwrap(), 0x0a);
    assert_eq!(sim.get_u64("sext").unwrap(), 0xfa);

    sim.set_u64("nib", 0b0101).unwrap();
    sim.step().unwrap();
    assert_eq!(sim.get_u64("zext").unwrap(), 0x05);
    assert_eq!(sim.get_u64("sext").unwrap(), 0x05);
}

fn selector() -> Design {
    let mut b = DesignBuilder::new("top");
    let top = b.top();
    let byte = b.bits_type(8, false);
    let (arr, _) = b.signal_array(top, "r", 3, byte, SignalKind::Port(PortDirection::Input));
    let sel = b.input(top, "sel", 2);
    let y = b.output(top, "y", 8);
    b.comb(top, "pick", Stmt::assign(y, Expr::element(arr, sel.into())));
    b.finish().unwrap()
}

fn load(sim: &mut Simulator) {
    for (i, v) in [10u64, 11, 12].iter().enumerate() {
        sim.set_u64(&format!("r_{i}"), *v).unwrap();
    }
}

#[test]
fn out_of_range_index_clamps() {
    let config = SimConfig {
        index_policy: IndexPolicy::Clamp,
        ..SimConfig::default()
    };
    let mut sim = Simulator::new(Arc::new(selector()), config).unwrap();
    load(&mut sim);
    sim.set_u64("sel", 1).unwrap();
    sim.step().unwrap();
    assert_eq!(sim.get_u64("y").unwrap(), 11);
    sim.set_u64("sel", 3).unwrap();
    sim.step().unwrap();
    assert_eq!(sim.get_u64("y").unwrap(), 12);
}

#[test]
fn out_of_range_index_errors() {
    let mut sim = sim(selector());
    load(&mut sim);
    sim.set_u64("sel", 3).unwrap();
    assert_eq!(
        sim.step(),
        Err(SimError::IndexOutOfRange {
            rule: "top::pick".into(),
            array: "top.r".into(),
            index: 3,
            len: 3,
        })
    );
}

#[test]
fn division_by_zero_fails_the_cycle() {
    let mut b = DesignBuilder::new("top");
    let top = b.top();
    let n = b.input(top, "n", 8);
    let d = b.input(top, "d", 8);
    b.set_init(d, Bits::truncated(8, 1));
    let q = b.output(top, "q", 8);
    b.comb(top, "divide", Stmt::assign(q, Expr::binary(BinaryOp::Div, n.into(), d.into())));
    let mut sim = sim(b.finish().unwrap());
    sim.set_u64("n", 9).unwrap();
    sim.step().unwrap();
    assert_eq!(sim.get_u64("q").unwrap(), 9);
    sim.set_u64("d", 0).unwrap();
    assert_eq!(
        sim.step(),
        Err(SimError::DivisionByZero {
            rule: "top::divide".into()
        })
    );
}

#[test]
fn trace_lines_go_to_a_file() {
    let mut b = DesignBuilder::new("top");
    let top = b.top();
    let en = b.input(top, "en", 1);
    let count = b.output(top, "count", 8);
    b.set_init(count, Bits::zero(8));
    b.seq(
        top,
        "tick",
        Stmt::if_then(
            en.into(),
            Stmt::assign_next(count, Expr::binary(BinaryOp::Add, count.into(), Expr::int(1))),
        ),
    );
    let mut sim = sim(b.finish().unwrap());

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("count.trace");
    let file = std::fs::File::create(&path).unwrap();
    sim.set_trace(Box::new(LineTrace::new(BufWriter::new(file))));
    sim.set_u64("en", 1).unwrap();
    sim.step_n(3).unwrap();
    sim.finish_trace().unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert_eq!(
        text.lines().collect::<Vec<_>>(),
        vec!["   1: en=1 count=01", "   2: en=1 count=02", "   3: en=1 count=03"]
    );
}

#[test]
fn construction_reports_analysis_warnings() {
    let mut b = DesignBuilder::new("top");
    let top = b.top();
    let en = b.input(top, "en", 1);
    let a = b.input(top, "a", 4);
    let y = b.output(top, "y", 4);
    b.comb(top, "latchy", Stmt::if_then(en.into(), Stmt::assign(y, a)));
    let sim = Simulator::new(Arc::new(b.finish().unwrap()), SimConfig::default()).unwrap();
    let codes: Vec<String> = sim.diagnostics().iter().map(|d| d.code.to_string()).collect();
    assert_eq!(codes, vec!["W301"]);
}
