// SPDX-License-Identifier: Apache-2.0

//! Constant propagation: gates whose value is forced by constant operands are
//! redirected to a shared constant gate, and identity-like gates (BUFF, AND
//! with a true operand, ...) are short-circuited to the surviving operand.
//! Reductions that would need a fresh negation are left alone; they are the
//! database pass's business.

use crate::gate::{Circuit, GateId, GateType, StoreError};
use crate::topo::topo_sort;

struct ConstGates {
    false_gate: Option<GateId>,
    true_gate: Option<GateId>,
}

impl ConstGates {
    fn locate(circuit: &Circuit) -> ConstGates {
        let mut cg = ConstGates {
            false_gate: None,
            true_gate: None,
        };
        for g in circuit.ids() {
            match circuit.gate_type(g) {
                GateType::ConstFalse if cg.false_gate.is_none() => cg.false_gate = Some(g),
                GateType::ConstTrue if cg.true_gate.is_none() => cg.true_gate = Some(g),
                _ => {}
            }
        }
        cg
    }

    fn get(&mut self, circuit: &mut Circuit, value: bool) -> GateId {
        let (slot, ty) = if value {
            (&mut self.true_gate, GateType::ConstTrue)
        } else {
            (&mut self.false_gate, GateType::ConstFalse)
        };
        *slot.get_or_insert_with(|| circuit.add_gate(ty, vec![]))
    }
}

enum Folding {
    Constant(bool),
    Forward(GateId),
}

fn classify(ty: GateType, operands: &[GateId], values: &[Option<bool>]) -> Option<Folding> {
    let value_of = |g: GateId| values.get(g.id).copied().flatten();
    let known: Vec<Option<bool>> = operands.iter().map(|&op| value_of(op)).collect();
    if known.iter().all(|v| v.is_some()) && ty != GateType::Input {
        let concrete: Vec<bool> = known.iter().map(|v| v.unwrap()).collect();
        return Some(Folding::Constant(ty.eval(&concrete)));
    }
    match ty {
        GateType::Buff => Some(Folding::Forward(operands[0])),
        GateType::And => match (known[0], known[1]) {
            (Some(false), _) | (_, Some(false)) => Some(Folding::Constant(false)),
            (Some(true), _) => Some(Folding::Forward(operands[1])),
            (_, Some(true)) => Some(Folding::Forward(operands[0])),
            _ => None,
        },
        GateType::Or => match (known[0], known[1]) {
            (Some(true), _) | (_, Some(true)) => Some(Folding::Constant(true)),
            (Some(false), _) => Some(Folding::Forward(operands[1])),
            (_, Some(false)) => Some(Folding::Forward(operands[0])),
            _ => None,
        },
        GateType::Nand => match (known[0], known[1]) {
            (Some(false), _) | (_, Some(false)) => Some(Folding::Constant(true)),
            _ => None,
        },
        GateType::Nor => match (known[0], known[1]) {
            (Some(true), _) | (_, Some(true)) => Some(Folding::Constant(false)),
            _ => None,
        },
        GateType::Xor => match (known[0], known[1]) {
            (Some(false), _) => Some(Folding::Forward(operands[1])),
            (_, Some(false)) => Some(Folding::Forward(operands[0])),
            _ => None,
        },
        GateType::Xnor => match (known[0], known[1]) {
            (Some(true), _) => Some(Folding::Forward(operands[1])),
            (_, Some(true)) => Some(Folding::Forward(operands[0])),
            _ => None,
        },
        GateType::Mux => match value_of(operands[0]) {
            Some(true) => Some(Folding::Forward(operands[1])),
            Some(false) => Some(Folding::Forward(operands[2])),
            None => None,
        },
        _ => None,
    }
}

/// Returns the number of gates folded away.
pub fn const_fold(circuit: &mut Circuit) -> Result<usize, StoreError> {
    let order = topo_sort(circuit).expect("const_fold: circuit must be acyclic");
    let mut values: Vec<Option<bool>> = vec![None; circuit.gate_count()];
    let mut consts = ConstGates::locate(circuit);
    let mut folded = 0usize;
    for g in order {
        let ty = circuit.gate_type(g);
        match ty {
            GateType::Input => continue,
            GateType::ConstFalse => {
                values[g.id] = Some(false);
                continue;
            }
            GateType::ConstTrue => {
                values[g.id] = Some(true);
                continue;
            }
            _ => {}
        }
        let operands = circuit.operands(g).to_vec();
        match classify(ty, &operands, &values) {
            Some(Folding::Constant(v)) => {
                values[g.id] = Some(v);
                let cst = consts.get(circuit, v);
                if values.len() < circuit.gate_count() {
                    values.resize(circuit.gate_count(), None);
                    values[cst.id] = Some(v);
                }
                if cst != g {
                    circuit.replace_uses(g, cst)?;
                    folded += 1;
                }
            }
            Some(Folding::Forward(target)) => {
                values[g.id] = values.get(target.id).copied().flatten();
                circuit.replace_uses(g, target)?;
                folded += 1;
            }
            None => {}
        }
    }
    if folded > 0 {
        log::debug!("const_fold: folded {} gates", folded);
    }
    Ok(folded)
}
