//! A four-input sorting network built from compare-and-swap children, with
//! registered inputs.

use std::sync::Arc;

use ember_common::Bits;
use ember_ir::{BinaryOp, Design, DesignBuilder, Expr, ModuleId, SignalId, Stmt};
use ember_sim::{SimConfig, Simulator};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

struct MinMax {
    a: SignalId,
    b: SignalId,
    lo: SignalId,
    hi: SignalId,
}

fn min_max(b: &mut DesignBuilder, parent: ModuleId, name: &str) -> MinMax {
    let m = b.child(parent, name);
    let a = b.input(m, "a", 8);
    let bb = b.input(m, "b", 8);
    let lo = b.output(m, "lo", 8);
    let hi = b.output(m, "hi", 8);
    let less = Expr::binary(BinaryOp::Lt, a.into(), bb.into());
    b.comb(
        m,
        "order",
        Stmt::block(vec![
            Stmt::assign(lo, Expr::mux(less.clone(), a.into(), bb.into())),
            Stmt::assign(hi, Expr::mux(less, bb.into(), a.into())),
        ]),
    );
    MinMax { a, b: bb, lo, hi }
}

fn sorter() -> Arc<Design> {
    let mut b = DesignBuilder::new("top");
    let top = b.top();
    let ins: Vec<SignalId> = (0..4).map(|i| b.input(top, &format!("i{i}"), 8)).collect();
    let outs: Vec<SignalId> = (0..4).map(|i| b.output(top, &format!("o{i}"), 8)).collect();
    let regs: Vec<SignalId> = (0..4).map(|i| b.wire(top, &format!("r{i}"), 8)).collect();
    for r in &regs {
        b.set_init(*r, Bits::zero(8));
    }
    b.seq(
        top,
        "capture",
        Stmt::block(
            regs.iter()
                .zip(&ins)
                .map(|(r, i)| Stmt::assign_next(*r, *i))
                .collect(),
        ),
    );

    // (0,1) (2,3) / (0,2) (1,3) / (1,2)
    let s0 = min_max(&mut b, top, "s0");
    let s1 = min_max(&mut b, top, "s1");
    let s2 = min_max(&mut b, top, "s2");
    let s3 = min_max(&mut b, top, "s3");
    let s4 = min_max(&mut b, top, "s4");
    for (from, to) in [
        (regs[0], s0.a),
        (regs[1], s0.b),
        (regs[2], s1.a),
        (regs[3], s1.b),
        (s0.lo, s2.a),
        (s1.lo, s2.b),
        (s0.hi, s3.a),
        (s1.hi, s3.b),
        (s2.hi, s4.a),
        (s3.lo, s4.b),
        (s2.lo, outs[0]),
        (s4.lo, outs[1]),
        (s4.hi, outs[2]),
        (s3.hi, outs[3]),
    ] {
        b.connect(top, from, to);
    }
    Arc::new(b.finish().unwrap())
}

fn apply(sim: &mut Simulator, inputs: [u64; 4]) {
    for (i, v) in inputs.iter().enumerate() {
        sim.set_u64(&format!("i{i}"), *v).unwrap();
    }
}

fn outputs(sim: &Simulator) -> Vec<u64> {
    (0..4).map(|i| sim.get_u64(&format!("o{i}")).unwrap()).collect()
}

#[test]
fn sorts_with_one_cycle_latency() {
    let mut sim = Simulator::new(sorter(), SimConfig::default()).unwrap();
    let vectors = [
        [1, 2, 3, 4],
        [3, 5, 8, 2],
        [9, 8, 7, 6],
        [5, 4, 5, 5],
        [5, 2, 9, 4],
    ];
    let mut previous: Option<Vec<u64>> = None;
    for v in vectors {
        apply(&mut sim, v);
        if let Some(expected) = &previous {
            assert_eq!(&outputs(&sim), expected, "outputs change only on a step");
        }
        sim.step().unwrap();
        let mut expected = v.to_vec();
        expected.sort_unstable();
        assert_eq!(outputs(&sim), expected, "inputs {v:?}");
        previous = Some(expected);
    }
    assert_eq!(sim.cycle_count(), 5);
}

#[test]
fn internal_signals_can_be_peeked() {
    let mut sim = Simulator::new(sorter(), SimConfig::default()).unwrap();
    apply(&mut sim, [7, 3, 0, 0]);
    sim.step().unwrap();
    assert_eq!(sim.peek("top.s0.lo").unwrap(), Bits::truncated(8, 3));
    assert_eq!(sim.peek("top.s0.hi").unwrap(), Bits::truncated(8, 7));
    // connected signals share storage
    assert_eq!(sim.peek("top.s0.a").unwrap(), sim.peek("top.r0").unwrap());
    assert_eq!(sim.peek("top.s2.lo").unwrap(), sim.get("o0").unwrap());
}

#[test]
fn random_inputs_always_sort() {
    let mut sim = Simulator::new(sorter(), SimConfig::default()).unwrap();
    let mut rng = StdRng::seed_from_u64(0x5eed);
    for _ in 0..200 {
        let v: [u64; 4] = [
            rng.gen_range(0..256),
            rng.gen_range(0..256),
            rng.gen_range(0..256),
            rng.gen_range(0..256),
        ];
        apply(&mut sim, v);
        sim.step().unwrap();
        let mut expected = v.to_vec();
        expected.sort_unstable();
        assert_eq!(outputs(&sim), expected);
    }
}

#[test]
fn simulators_sharing_a_design_are_independent_and_deterministic() {
    let design = sorter();
    let mut first = Simulator::new(Arc::clone(&design), SimConfig::default()).unwrap();
    let mut second = Simulator::new(Arc::clone(&design), SimConfig::default()).unwrap();
    let mut idle = Simulator::new(design, SimConfig::default()).unwrap();

    let run = |sim: &mut Simulator| {
        let mut rng = StdRng::seed_from_u64(42);
        let mut lines = Vec::new();
        for _ in 0..50 {
            let v = [rng.gen(), rng.gen(), rng.gen(), rng.gen()].map(|x: u8| u64::from(x));
            apply(sim, v);
            sim.step().unwrap();
            lines.push(sim.line_trace().unwrap());
        }
        lines
    };
    assert_eq!(run(&mut first), run(&mut second));
    assert_eq!(outputs(&idle), vec![0, 0, 0, 0]);
    assert_eq!(idle.settle_all().unwrap(), 0);
}

#[test]
fn settling_twice_changes_nothing() {
    let mut sim = Simulator::new(sorter(), SimConfig::default()).unwrap();
    apply(&mut sim, [4, 1, 3, 2]);
    assert_eq!(sim.settle_all().unwrap(), 0, "inputs only reach the registers");
    sim.step().unwrap();
    assert_eq!(sim.settle_all().unwrap(), 0);
    assert_eq!(outputs(&sim), vec![1, 2, 3, 4]);
}

#[test]
fn sorter_loaded_from_json_traces_identically() {
    let design = sorter();
    let json = serde_json::to_string(design.as_ref()).unwrap();
    let loaded: Design = serde_json::from_str(&json).unwrap();
    let mut native = Simulator::new(design, SimConfig::default()).unwrap();
    let mut reloaded = Simulator::new(Arc::new(loaded), SimConfig::default()).unwrap();
    for v in [[7, 3, 9, 1], [0, 255, 128, 64], [5, 5, 2, 5]] {
        apply(&mut native, v);
        apply(&mut reloaded, v);
        native.step().unwrap();
        reloaded.step().unwrap();
        assert_eq!(native.line_trace().unwrap(), reloaded.line_trace().unwrap());
    }
}
