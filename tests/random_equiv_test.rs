// SPDX-License-Identifier: Apache-2.0

//! Randomised end-to-end check: simplification must preserve the function of
//! arbitrary binary-basis circuits and never grow them. Seeds are fixed so
//! failures reproduce.

use std::sync::Arc;

use rand::Rng;
use rand_xoshiro::rand_core::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

use simpl8r::circuit_db::{Basis, CircuitDb, DbRegistry};
use simpl8r::gate::{Circuit, GateType};
use simpl8r::sim::output_patterns;
use simpl8r::simplify::{simplify, SimplifyOptions};
use simpl8r::topo::topo_sort;

const DB_TEXT: &str = "\
2 1 6 2 XOR 0 1
2 1 14 5 NOT 0 NOT 1 AND 2 3 NOT 4
3 1 232 6 AND 0 1 OR 0 1 AND 2 4 OR 3 5
3 1 8 5 NOT 2 AND 0 1 AND 4 3
3 1 150 8 AND 0 1 NOR 0 1 NOR 3 4 XOR 5 2 NOT 6 NOT 7
";

const GATE_POOL: [GateType; 7] = [
    GateType::Not,
    GateType::And,
    GateType::Or,
    GateType::Nand,
    GateType::Nor,
    GateType::Xor,
    GateType::Xnor,
];

fn random_circuit(rng: &mut Xoshiro256PlusPlus, inputs: usize, extra_gates: usize) -> Circuit {
    let mut c = Circuit::new();
    for _ in 0..inputs {
        c.add_gate(GateType::Input, vec![]);
    }
    for _ in 0..extra_gates {
        let ty = GATE_POOL[rng.gen_range(0..GATE_POOL.len())];
        let operands: Vec<_> = (0..ty.arity())
            .map(|_| simpl8r::gate::GateId {
                id: rng.gen_range(0..c.gate_count()),
            })
            .collect();
        c.add_gate(ty, operands);
    }
    // A few outputs, always including the last gate so the deep structure is
    // observable.
    let last = simpl8r::gate::GateId {
        id: c.gate_count() - 1,
    };
    c.add_output(last);
    for _ in 0..2 {
        c.add_output(simpl8r::gate::GateId {
            id: rng.gen_range(0..c.gate_count()),
        });
    }
    c
}

#[test]
fn simplify_preserves_function_on_random_circuits() {
    let db = CircuitDb::load_from_str(DB_TEXT).unwrap();
    for sub in db.subcircuits() {
        assert_eq!(sub.eval_patterns(), sub.patterns);
    }
    let mut registry = DbRegistry::default();
    registry.insert(Basis::Bench, Arc::new(db));
    let options = SimplifyOptions {
        basis: Basis::Bench,
        enable_three_coloring: true,
        min_cone_size: 2,
    };

    for seed in 0..24u64 {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        let circuit = random_circuit(&mut rng, 4, 40);
        let before = output_patterns(&circuit);
        let initial_gates = circuit.gate_count();

        let (simplified, report) = simplify(circuit, &registry, &options)
            .unwrap_or_else(|e| panic!("seed {}: simplify failed: {}", seed, e));

        topo_sort(&simplified)
            .unwrap_or_else(|e| panic!("seed {}: result is cyclic: {}", seed, e));
        assert_eq!(
            output_patterns(&simplified),
            before,
            "seed {}: function changed",
            seed
        );
        assert!(
            simplified.gate_count() <= initial_gates,
            "seed {}: grew from {} to {} gates",
            seed,
            initial_gates,
            simplified.gate_count()
        );
        assert_eq!(report.final_gates, simplified.gate_count());
    }
}

#[test]
fn repeated_simplification_reaches_a_fixed_point() {
    let db = CircuitDb::load_from_str(DB_TEXT).unwrap();
    let mut registry = DbRegistry::default();
    registry.insert(Basis::Bench, Arc::new(db));
    let options = SimplifyOptions::default();

    let mut rng = Xoshiro256PlusPlus::seed_from_u64(7);
    let mut circuit = random_circuit(&mut rng, 4, 40);
    let reference = output_patterns(&circuit);
    let mut last_count = circuit.gate_count();
    for round in 0..4 {
        let (next, _) = simplify(circuit, &registry, &options)
            .unwrap_or_else(|e| panic!("round {}: {}", round, e));
        assert!(next.gate_count() <= last_count);
        assert_eq!(output_patterns(&next), reference);
        last_count = next.gate_count();
        circuit = next;
    }
}
