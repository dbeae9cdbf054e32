// SPDX-License-Identifier: Apache-2.0

//! Depth-first topological sort of the circuit store.
//!
//! Produces an order in which every operand precedes its users. The traversal
//! is iterative (explicit frame stack) so circuits millions of gates deep do
//! not overflow the call stack, and ties among siblings are broken by the
//! operand-list order, which makes the result deterministic; downstream
//! passes rely on that for reproducibility.

use std::fmt;

use crate::gate::{Circuit, GateId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleError {
    /// A gate on the cycle (the first one re-entered by the traversal).
    pub gate: GateId,
}

impl fmt::Display for CycleError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "cycle detected through gate {}", self.gate)
    }
}

impl std::error::Error for CycleError {}

const WHITE: u8 = 0; // unvisited
const GRAY: u8 = 1; // on the current DFS path
const BLACK: u8 = 2; // emitted

/// Returns all gate ids in operands-before-users order, or the offending gate
/// if a cycle is found. A valid circuit never cycles; an `Err` from here on a
/// freshly built store indicates corrupted input.
pub fn topo_sort(circuit: &Circuit) -> Result<Vec<GateId>, CycleError> {
    let n = circuit.gate_count();
    let mut state = vec![WHITE; n];
    let mut order: Vec<GateId> = Vec::with_capacity(n);

    for seed in circuit.ids() {
        if state[seed.id] != WHITE {
            continue;
        }
        state[seed.id] = GRAY;
        let mut stack: Vec<(GateId, usize)> = vec![(seed, 0)];
        while let Some(frame) = stack.last_mut() {
            let (gate, next) = (frame.0, frame.1);
            let operands = circuit.operands(gate);
            if next < operands.len() {
                frame.1 += 1;
                let op = operands[next];
                match state[op.id] {
                    WHITE => {
                        state[op.id] = GRAY;
                        stack.push((op, 0));
                    }
                    GRAY => return Err(CycleError { gate: op }),
                    _ => {}
                }
            } else {
                state[gate.id] = BLACK;
                order.push(gate);
                stack.pop();
            }
        }
    }
    Ok(order)
}

/// Panics (after logging) if the circuit contains a cycle. Debug builds only.
pub fn debug_assert_acyclic(circuit: &Circuit, context: &str) {
    if !cfg!(debug_assertions) {
        return;
    }
    if let Err(e) = topo_sort(circuit) {
        log::error!("[{}] {}", context, e);
        panic!("cycle detected in circuit (context: {}): {}", context, e);
    }
}
