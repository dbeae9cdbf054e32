// SPDX-License-Identifier: Apache-2.0

//! Structural duplicate removal: gates with the same type and (for
//! commutative operators, order-insensitive) operand list collapse onto one
//! representative, and every user is rewired onto it. Runs in topological
//! order so chains of duplicates collapse in a single pass.

use std::collections::HashMap;

use crate::gate::{Circuit, GateId, GateType, StoreError};
use crate::topo::topo_sort;

fn signature(circuit: &Circuit, g: GateId) -> (GateType, Vec<GateId>) {
    let ty = circuit.gate_type(g);
    let mut operands = circuit.operands(g).to_vec();
    let commutative = matches!(
        ty,
        GateType::And | GateType::Or | GateType::Nand | GateType::Nor | GateType::Xor | GateType::Xnor
    );
    if commutative {
        operands.sort_unstable();
    }
    (ty, operands)
}

/// Returns the number of gates merged away.
pub fn dedupe(circuit: &mut Circuit) -> Result<usize, StoreError> {
    let order = topo_sort(circuit).expect("dedupe: circuit must be acyclic");
    let mut representative: HashMap<(GateType, Vec<GateId>), GateId> = HashMap::new();
    let mut merged = 0usize;
    for g in order {
        if circuit.gate_type(g) == GateType::Input {
            continue;
        }
        // Users rewired by earlier merges are already canonical here because
        // the walk is operands-first.
        let key = signature(circuit, g);
        match representative.get(&key).copied() {
            Some(rep) => {
                circuit.replace_uses(g, rep)?;
                merged += 1;
            }
            None => {
                representative.insert(key, g);
            }
        }
    }
    if merged > 0 {
        log::debug!("dedupe: merged {} duplicate gates", merged);
    }
    Ok(merged)
}
