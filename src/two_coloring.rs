// SPDX-License-Identifier: Apache-2.0

//! Two-coloring: assigns each binary gate at most one color identifying the
//! pair of ancestor gates its two operands reach through already-colored
//! ancestors. This is the lattice the three-coloring pass builds on.

use std::collections::HashMap;

use crate::gate::{Circuit, GateId};

pub type ColorId = usize;

/// An equivalence class of gates over one unordered parent pair.
#[derive(Debug, Clone)]
pub struct TwoColor {
    /// Parent ids, ascending.
    pub first_parent: GateId,
    pub second_parent: GateId,
    gates: Vec<GateId>,
}

impl TwoColor {
    fn new(parents: (GateId, GateId)) -> TwoColor {
        TwoColor {
            first_parent: parents.0,
            second_parent: parents.1,
            gates: Vec::new(),
        }
    }

    pub fn gates(&self) -> &[GateId] {
        &self.gates
    }

    pub fn has_parent(&self, gate: GateId) -> bool {
        self.first_parent == gate || self.second_parent == gate
    }

    pub fn sorted_parents(a: GateId, b: GateId) -> (GateId, GateId) {
        if a <= b {
            (a, b)
        } else {
            (b, a)
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TwoColoring {
    pub colors: Vec<TwoColor>,
    /// Per gate: the single color it is painted with, if any.
    pub gate_color: Vec<Option<ColorId>>,
    /// One-to-one map between sorted parent pairs and color ids.
    pub parents_to_color: HashMap<(GateId, GateId), ColorId>,
}

impl TwoColoring {
    /// Paints the circuit in operands-before-users order (`order` must come
    /// from `topo::topo_sort`).
    ///
    /// Inputs, constants, and unary gates stay uncolored; a binary gate whose
    /// operands carry the same color propagates that color (its function is
    /// already bounded by that pair), otherwise the gate founds the color of
    /// its own operand pair.
    pub fn build(circuit: &Circuit, order: &[GateId]) -> TwoColoring {
        let mut coloring = TwoColoring {
            colors: Vec::new(),
            gate_color: vec![None; circuit.gate_count()],
            parents_to_color: HashMap::new(),
        };

        for &gate in order {
            let operands = circuit.operands(gate);
            if operands.len() != 2 {
                continue;
            }
            let (a, b) = (operands[0], operands[1]);
            if a == b {
                // A single repeated ancestor is not a pair; dedupe/const-fold
                // cleans these gates up instead.
                continue;
            }
            let color = match (coloring.gate_color[a.id], coloring.gate_color[b.id]) {
                (Some(ca), Some(cb)) if ca == cb => ca,
                _ => coloring.find_or_add_color(TwoColor::sorted_parents(a, b)),
            };
            coloring.paint(gate, color);
        }
        coloring
    }

    pub fn color_count(&self) -> usize {
        self.colors.len()
    }

    /// The sorted parent pair of the color painted on `gate`, if any.
    pub fn parents_of(&self, gate: GateId) -> Option<(GateId, GateId)> {
        self.gate_color[gate.id]
            .map(|c| (self.colors[c].first_parent, self.colors[c].second_parent))
    }

    fn find_or_add_color(&mut self, parents: (GateId, GateId)) -> ColorId {
        if let Some(&color) = self.parents_to_color.get(&parents) {
            return color;
        }
        let color = self.colors.len();
        self.colors.push(TwoColor::new(parents));
        self.parents_to_color.insert(parents, color);
        color
    }

    fn paint(&mut self, gate: GateId, color: ColorId) {
        debug_assert!(self.gate_color[gate.id].is_none(), "gate {} painted twice", gate);
        self.colors[color].gates.push(gate);
        self.gate_color[gate.id] = Some(color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::GateType;
    use crate::topo::topo_sort;

    fn build(circuit: &Circuit) -> TwoColoring {
        TwoColoring::build(circuit, &topo_sort(circuit).unwrap())
    }

    #[test]
    fn sibling_gates_share_a_color() {
        let mut c = Circuit::new();
        let a = c.add_gate(GateType::Input, vec![]);
        let b = c.add_gate(GateType::Input, vec![]);
        let g = c.add_gate(GateType::And, vec![a, b]);
        let h = c.add_gate(GateType::Or, vec![b, a]); // reversed operand order
        c.add_output(g);
        c.add_output(h);
        let coloring = build(&c);
        assert_eq!(coloring.color_count(), 1);
        assert_eq!(coloring.gate_color[g.id], coloring.gate_color[h.id]);
        assert_eq!(coloring.parents_of(g), Some((a, b)));
        assert_eq!(coloring.colors[0].gates(), &[g, h]);
    }

    #[test]
    fn same_colored_operands_propagate() {
        let mut c = Circuit::new();
        let a = c.add_gate(GateType::Input, vec![]);
        let b = c.add_gate(GateType::Input, vec![]);
        let g = c.add_gate(GateType::And, vec![a, b]);
        let h = c.add_gate(GateType::Or, vec![a, b]);
        let k = c.add_gate(GateType::Xor, vec![g, h]);
        c.add_output(k);
        let coloring = build(&c);
        // g and h share the (a, b) color, so k is a function of (a, b) too and
        // inherits the color rather than founding (g, h).
        assert_eq!(coloring.color_count(), 1);
        assert_eq!(coloring.parents_of(k), Some((a, b)));
    }

    #[test]
    fn unary_and_input_gates_stay_uncolored() {
        let mut c = Circuit::new();
        let a = c.add_gate(GateType::Input, vec![]);
        let b = c.add_gate(GateType::Input, vec![]);
        let n = c.add_gate(GateType::Not, vec![a]);
        let g = c.add_gate(GateType::And, vec![n, b]);
        c.add_output(g);
        let coloring = build(&c);
        assert_eq!(coloring.gate_color[a.id], None);
        assert_eq!(coloring.gate_color[n.id], None);
        assert_eq!(coloring.parents_of(g), Some((b, n)));
    }

    #[test]
    fn parent_pairs_are_bijective() {
        let mut c = Circuit::new();
        let a = c.add_gate(GateType::Input, vec![]);
        let b = c.add_gate(GateType::Input, vec![]);
        let d = c.add_gate(GateType::Input, vec![]);
        let g = c.add_gate(GateType::And, vec![a, b]);
        let h = c.add_gate(GateType::Or, vec![b, d]);
        let k = c.add_gate(GateType::Nand, vec![g, h]);
        c.add_output(k);
        let coloring = build(&c);
        assert_eq!(coloring.parents_to_color.len(), coloring.color_count());
        for (parents, &color) in &coloring.parents_to_color {
            assert!(parents.0 < parents.1);
            assert_eq!(
                (coloring.colors[color].first_parent, coloring.colors[color].second_parent),
                *parents
            );
        }
    }
}
