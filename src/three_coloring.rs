// SPDX-License-Identifier: Apache-2.0

//! Three-coloring: extends the two-coloring by painting each gate with up to
//! two colors, each identifying a triple of ancestor gates that bounds the
//! gate's function. Cones of gates sharing a triple are what the database
//! rewrite pass extracts and replaces.
//!
//! A gate with two binary operands can contribute to at most two distinct
//! parent triples through the two-coloring lattice, hence the hard two-color
//! bound per gate.

use std::collections::HashMap;
use std::fmt;

use crate::gate::{Circuit, GateId, GateType};
use crate::two_coloring::{ColorId, TwoColoring};

/// An equivalence class of gates over one unordered parent triple.
#[derive(Debug, Clone)]
pub struct ThreeColor {
    /// Parent ids, ascending.
    parents: [GateId; 3],
    gates: Vec<GateId>,
}

impl ThreeColor {
    fn new(parents: [GateId; 3]) -> ThreeColor {
        ThreeColor {
            parents,
            gates: Vec::new(),
        }
    }

    pub fn parents(&self) -> [GateId; 3] {
        self.parents
    }

    pub fn gates(&self) -> &[GateId] {
        &self.gates
    }

    pub fn has_parent(&self, gate: GateId) -> bool {
        self.parents.contains(&gate)
    }

    pub fn sorted_parents(a: GateId, b: GateId, c: GateId) -> [GateId; 3] {
        let mut parents = [a, b, c];
        parents.sort();
        parents
    }
}

/// The circuit contains a gate outside the binary basis; the coloring (and
/// everything downstream of it) is only defined for unary/binary gates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NonBinaryGate {
    pub gate: GateId,
}

impl fmt::Display for NonBinaryGate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "non-binary gate at id {}", self.gate.id)
    }
}

impl std::error::Error for NonBinaryGate {}

#[derive(Debug, Clone, Default)]
pub struct ThreeColoring {
    pub colors: Vec<ThreeColor>,
    /// Per gate: up to two colors.
    pub gate_colors: Vec<Vec<ColorId>>,
    /// One-to-one map between sorted parent triples and color ids.
    pub parents_to_color: HashMap<[GateId; 3], ColorId>,
    /// Per gate: an existing NOT user of the gate, if one exists. The rewrite
    /// pass reuses these instead of allocating duplicate negations.
    pub negation_users: Vec<Option<GateId>>,
}

impl ThreeColoring {
    /// Paints the circuit in operands-before-users order (`order` must come
    /// from `topo::topo_sort`), consuming the two-coloring lattice.
    pub fn build(
        circuit: &Circuit,
        order: &[GateId],
        two: &TwoColoring,
    ) -> Result<ThreeColoring, NonBinaryGate> {
        let mut tc = ThreeColoring {
            colors: Vec::new(),
            gate_colors: vec![Vec::new(); circuit.gate_count()],
            parents_to_color: HashMap::new(),
            negation_users: vec![None; circuit.gate_count()],
        };

        for &gate in order {
            let operands = circuit.operands(gate);
            if operands.is_empty() {
                continue;
            }
            if operands.len() == 1 {
                // Unary gates are transparent: they live in whichever cones
                // their operand lives in.
                for color in tc.gate_colors[operands[0].id].clone() {
                    tc.paint(gate, color);
                }
                if circuit.gate_type(gate) == GateType::Not {
                    tc.negation_users[operands[0].id] = Some(gate);
                }
                continue;
            }
            if operands.len() > 2 {
                return Err(NonBinaryGate { gate });
            }

            let Some((child_1, child_2)) = two.parents_of(gate) else {
                continue;
            };
            // Both two-color parents unpainted at the pair level means no
            // triple can bound this gate.
            if two.gate_color[child_1.id].is_none() && two.gate_color[child_2.id].is_none() {
                continue;
            }

            // Classify the children's color patterns.
            let mut common_colors: Vec<ColorId> = Vec::new();
            let mut color_31: Option<ColorId> = None; // child_1 color whose triple holds child_2
            let mut color_13: Option<ColorId> = None; // child_2 color whose triple holds child_1
            for &c1 in &tc.gate_colors[child_1.id] {
                for &c2 in &tc.gate_colors[child_2.id] {
                    if c1 == c2 {
                        common_colors.push(c1);
                    } else if tc.colors[c2].has_parent(child_1) {
                        color_13 = Some(c2);
                    }
                }
                if tc.colors[c1].has_parent(child_2) {
                    color_31 = Some(c1);
                }
            }

            if common_colors.len() == 2 {
                tc.paint(gate, common_colors[0]);
                tc.paint(gate, common_colors[1]);
                continue;
            }
            if common_colors.len() == 1 {
                tc.paint(gate, common_colors[0]);
                if let Some(c) = color_13 {
                    tc.paint(gate, c);
                } else if let Some(c) = color_31 {
                    tc.paint(gate, c);
                }
                continue;
            }

            if let Some(c) = color_13 {
                tc.paint(gate, c);
                // Secondary scan: a second triple may bound this gate through
                // child_1's own parent pair.
                if let Some((p1, p2)) = two.parents_of(child_1) {
                    let found = tc.find_color_with_parents_of(child_2, p1, p2);
                    let c2 = match found {
                        Some(c2) => c2,
                        None => {
                            let triple = ThreeColor::sorted_parents(p1, p2, child_2);
                            tc.find_or_add_color(triple)
                        }
                    };
                    tc.paint(gate, c2);
                }
                continue;
            }
            if let Some(c) = color_31 {
                tc.paint(gate, c);
                if let Some((p1, p2)) = two.parents_of(child_2) {
                    let found = tc.find_color_with_parents_of(child_1, p1, p2);
                    let c2 = match found {
                        Some(c2) => c2,
                        None => {
                            let triple = ThreeColor::sorted_parents(p1, p2, child_1);
                            tc.find_or_add_color(triple)
                        }
                    };
                    tc.paint(gate, c2);
                }
                continue;
            }

            // No direct match: look for a 3-2 / 2-3 pattern, one child's
            // triple covering the other child's parent pair.
            if let Some((p1, p2)) = two.parents_of(child_2) {
                let found = tc.find_color_with_parents_of(child_1, p1, p2);
                if let Some(c) = found {
                    tc.paint(gate, c);
                    continue;
                }
            }
            if let Some((p1, p2)) = two.parents_of(child_1) {
                let found = tc.find_color_with_parents_of(child_2, p1, p2);
                if let Some(c) = found {
                    tc.paint(gate, c);
                    continue;
                }
            }

            // 2-2 pattern: both children carry pairs.
            if let (Some((p1, p2)), Some((p3, p4))) =
                (two.parents_of(child_1), two.parents_of(child_2))
            {
                let second_pair = &two.colors[two.gate_color[child_2.id].unwrap()];
                if second_pair.has_parent(p1) {
                    let triple = ThreeColor::sorted_parents(p2, p3, p4);
                    let c = tc.find_or_add_color(triple);
                    tc.paint(gate, c);
                } else if second_pair.has_parent(p2) {
                    let triple = ThreeColor::sorted_parents(p1, p3, p4);
                    let c = tc.find_or_add_color(triple);
                    tc.paint(gate, c);
                } else {
                    let triple = ThreeColor::sorted_parents(p1, p2, child_2);
                    let c = tc.find_or_add_color(triple);
                    tc.paint(gate, c);
                    let triple = ThreeColor::sorted_parents(p3, p4, child_1);
                    let c = tc.find_or_add_color(triple);
                    tc.paint(gate, c);
                }
                continue;
            }

            // Exactly one child carries a pair: synthesize the triple from
            // that pair and the other child.
            let triple = if let Some((p1, p2)) = two.parents_of(child_1) {
                ThreeColor::sorted_parents(p1, p2, child_2)
            } else {
                let (p1, p2) = two
                    .parents_of(child_2)
                    .expect("one of the children must be pair-colored here");
                ThreeColor::sorted_parents(p1, p2, child_1)
            };
            let c = tc.find_or_add_color(triple);
            tc.paint(gate, c);
        }

        Ok(tc)
    }

    pub fn color_count(&self) -> usize {
        self.colors.len()
    }

    /// A color already painted on `gate` whose triple covers both parents.
    fn find_color_with_parents_of(&self, gate: GateId, p1: GateId, p2: GateId) -> Option<ColorId> {
        self.gate_colors[gate.id]
            .iter()
            .copied()
            .find(|&c| self.colors[c].has_parent(p1) && self.colors[c].has_parent(p2))
    }

    fn find_or_add_color(&mut self, parents: [GateId; 3]) -> ColorId {
        debug_assert!(parents[0] <= parents[1] && parents[1] <= parents[2]);
        if let Some(&color) = self.parents_to_color.get(&parents) {
            return color;
        }
        let color = self.colors.len();
        self.colors.push(ThreeColor::new(parents));
        self.parents_to_color.insert(parents, color);
        color
    }

    fn paint(&mut self, gate: GateId, color: ColorId) {
        assert!(color < self.colors.len(), "color id {} out of range", color);
        self.colors[color].gates.push(gate);
        let painted = &mut self.gate_colors[gate.id];
        painted.push(color);
        assert!(
            painted.len() <= 2,
            "gate {} painted with more than two colors",
            gate
        );
    }
}
