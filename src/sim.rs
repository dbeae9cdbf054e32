// SPDX-License-Identifier: Apache-2.0

//! Reference evaluator for whole circuits.
//!
//! This is the slow, obviously-correct path: it exists so that tests (and the
//! database round-trip check) can compare a simplified circuit against the
//! original under every input assignment. The rewriting pass itself evaluates
//! bounded cones and never calls into this module.

use crate::gate::{Circuit, GateId, GateType};
use crate::topo::topo_sort;

/// Returns the circuit's input gates in ascending id order. This is the
/// assignment order used by `eval` and `output_patterns`.
pub fn input_ids(circuit: &Circuit) -> Vec<GateId> {
    circuit
        .ids()
        .filter(|&g| circuit.gate_type(g) == GateType::Input)
        .collect()
}

/// Evaluates every primary output under the given assignment (one bool per
/// input, in `input_ids` order).
pub fn eval(circuit: &Circuit, assignment: &[bool]) -> Vec<bool> {
    let inputs = input_ids(circuit);
    assert_eq!(
        assignment.len(),
        inputs.len(),
        "eval: assignment covers {} inputs, circuit has {}",
        assignment.len(),
        inputs.len()
    );
    let mut values = vec![false; circuit.gate_count()];
    for (input, &value) in inputs.iter().zip(assignment) {
        values[input.id] = value;
    }
    let order = topo_sort(circuit).expect("eval: circuit must be acyclic");
    let mut operand_values: Vec<bool> = Vec::with_capacity(3);
    for g in order {
        let ty = circuit.gate_type(g);
        if ty == GateType::Input {
            continue;
        }
        operand_values.clear();
        operand_values.extend(circuit.operands(g).iter().map(|op| values[op.id]));
        values[g.id] = ty.eval(&operand_values);
    }
    circuit.outputs().iter().map(|o| values[o.id]).collect()
}

/// Truth table of every primary output over all `2^k` assignments, bit `i`
/// holding the output under the assignment whose binary representation is `i`
/// (input 0 is the least significant bit). Only sensible for small `k`; the
/// assert keeps the table inside a `u64`.
pub fn output_patterns(circuit: &Circuit) -> Vec<u64> {
    let inputs = input_ids(circuit);
    assert!(
        inputs.len() <= 6,
        "output_patterns: {} inputs will not fit a u64 table",
        inputs.len()
    );
    let mut patterns = vec![0u64; circuit.outputs().len()];
    for assign in 0u64..(1 << inputs.len()) {
        let assignment: Vec<bool> = (0..inputs.len()).map(|i| (assign >> i) & 1 != 0).collect();
        for (out_index, value) in eval(circuit, &assignment).into_iter().enumerate() {
            if value {
                patterns[out_index] |= 1 << assign;
            }
        }
    }
    patterns
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::GateType;

    #[test]
    fn evaluates_mixed_basis() {
        let mut c = Circuit::new();
        let a = c.add_gate(GateType::Input, vec![]);
        let b = c.add_gate(GateType::Input, vec![]);
        let g = c.add_gate(GateType::And, vec![a, b]);
        let h = c.add_gate(GateType::Or, vec![a, b]);
        let k = c.add_gate(GateType::Xor, vec![g, h]);
        c.add_output(k);
        // XOR(AND(a,b), OR(a,b)) is exactly a XOR b.
        assert_eq!(output_patterns(&c), vec![0b0110]);
    }

    #[test]
    fn constants_and_unary_gates() {
        let mut c = Circuit::new();
        let a = c.add_gate(GateType::Input, vec![]);
        let t = c.add_gate(GateType::ConstTrue, vec![]);
        let n = c.add_gate(GateType::Not, vec![a]);
        let buf = c.add_gate(GateType::Buff, vec![n]);
        let g = c.add_gate(GateType::And, vec![buf, t]);
        c.add_output(g);
        assert_eq!(output_patterns(&c), vec![0b01]);
    }
}
