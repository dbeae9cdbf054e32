// SPDX-License-Identifier: Apache-2.0

//! Worklist-based sweep of gates unreachable from the primary outputs,
//! followed by id compaction. Primary inputs are always retained so the
//! circuit interface is stable.

use std::collections::HashSet;

use crate::gate::{Circuit, GateId, GateType};
use crate::topo::topo_sort;

pub struct DceResult {
    pub circuit: Circuit,
    /// Old id to new id; `None` for swept gates.
    pub remap: Vec<Option<GateId>>,
    pub swept: usize,
}

pub fn dce(circuit: &Circuit) -> DceResult {
    let mut reachable: HashSet<GateId> = HashSet::new();
    let mut worklist: Vec<GateId> = circuit.outputs().to_vec();
    for g in circuit.ids() {
        if circuit.gate_type(g) == GateType::Input {
            reachable.insert(g);
        }
    }
    while let Some(current) = worklist.pop() {
        if !reachable.insert(current) {
            continue;
        }
        worklist.extend(circuit.operands(current).iter().copied());
    }

    // Rebuild in topological order so operands exist before their users.
    let order = topo_sort(circuit).expect("dce: circuit must be acyclic");
    let mut remap: Vec<Option<GateId>> = vec![None; circuit.gate_count()];
    let mut compact = Circuit::new();
    for g in order {
        if !reachable.contains(&g) {
            continue;
        }
        let operands: Vec<GateId> = circuit
            .operands(g)
            .iter()
            .map(|op| remap[op.id].expect("dce: operand of a reachable gate must be reachable"))
            .collect();
        remap[g.id] = Some(compact.add_gate(circuit.gate_type(g), operands));
    }
    for &out in circuit.outputs() {
        compact.add_output(remap[out.id].expect("dce: primary output must be reachable"));
    }

    let swept = circuit.gate_count() - compact.gate_count();
    if swept > 0 {
        log::debug!("dce: swept {} unreachable gates", swept);
    }
    DceResult {
        circuit: compact,
        remap,
        swept,
    }
}
