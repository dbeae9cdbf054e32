// SPDX-License-Identifier: Apache-2.0

//! Database-driven cone rewriting.
//!
//! For each color produced by the coloring passes, this pass bounds the cone
//! of gates over the color's parents, fingerprints the cone's outputs as
//! truth-table patterns, and asks the subcircuit database for a smaller
//! implementation. On a hit the replacement is spliced in: new gates are
//! allocated (reusing the cone's inputs and their existing negations), every
//! outside user of a cone output is rewired, and the superseded gates are
//! left unreachable for the dce sweep to reclaim.
//!
//! The benefit test counts only the gates a splice would actually orphan:
//! region gates that keep an outside observer survive the splice, and so
//! does everything they reach, so they are no saving at all.
//!
//! Cones are visited in reverse topological order of their apex gates, so a
//! splice can never invalidate a cone that is still pending; a cone whose
//! outputs lost all users to an earlier splice simply extracts as empty and
//! is skipped.

use std::collections::{HashMap, HashSet};

use crate::circuit_db::{CircuitDb, DbSubcircuit};
use crate::gate::{Circuit, GateId, GateType, StoreError};
use crate::three_coloring::ThreeColoring;
use crate::two_coloring::TwoColoring;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RewriteStats {
    pub cones_examined: usize,
    pub db_hits: usize,
    pub cones_replaced: usize,
    pub gates_allocated: usize,
    pub users_rewired: usize,
}

impl RewriteStats {
    pub fn absorb(&mut self, other: RewriteStats) {
        self.cones_examined += other.cones_examined;
        self.db_hits += other.db_hits;
        self.cones_replaced += other.cones_replaced;
        self.gates_allocated += other.gates_allocated;
        self.users_rewired += other.users_rewired;
    }
}

/// A candidate cone: the parents bounding it and the gates painted with its
/// color.
struct Cone {
    parents: Vec<GateId>,
    painted: Vec<GateId>,
}

/// Rewrites the cones of a three-coloring. `order` must be the topological
/// order the coloring was built from.
pub fn rewrite_three_color_cones(
    circuit: &mut Circuit,
    db: &CircuitDb,
    three: &ThreeColoring,
    order: &[GateId],
    min_cone_size: usize,
) -> Result<RewriteStats, StoreError> {
    let cones: Vec<Cone> = three
        .colors
        .iter()
        .map(|c| Cone {
            parents: c.parents().to_vec(),
            painted: c.gates().to_vec(),
        })
        .collect();
    rewrite_cones(circuit, db, cones, &three.negation_users, order, min_cone_size)
}

/// Rewrites the cones of a two-coloring (pair-bounded cones).
pub fn rewrite_two_color_cones(
    circuit: &mut Circuit,
    db: &CircuitDb,
    two: &TwoColoring,
    order: &[GateId],
    min_cone_size: usize,
) -> Result<RewriteStats, StoreError> {
    let cones: Vec<Cone> = two
        .colors
        .iter()
        .map(|c| Cone {
            parents: vec![c.first_parent, c.second_parent],
            painted: c.gates().to_vec(),
        })
        .collect();
    let negation_users = scan_negation_users(circuit);
    rewrite_cones(circuit, db, cones, &negation_users, order, min_cone_size)
}

/// One NOT user per gate, scanned directly from the store. The three-coloring
/// pass records the same table as a byproduct; this is the standalone path.
fn scan_negation_users(circuit: &Circuit) -> Vec<Option<GateId>> {
    let mut negation_users = vec![None; circuit.gate_count()];
    for g in circuit.ids() {
        if circuit.gate_type(g) == GateType::Not {
            negation_users[circuit.operands(g)[0].id] = Some(g);
        }
    }
    negation_users
}

fn rewrite_cones(
    circuit: &mut Circuit,
    db: &CircuitDb,
    mut cones: Vec<Cone>,
    negation_users: &[Option<GateId>],
    order: &[GateId],
    min_cone_size: usize,
) -> Result<RewriteStats, StoreError> {
    let mut position = vec![usize::MAX; circuit.gate_count()];
    for (i, &g) in order.iter().enumerate() {
        position[g.id] = i;
    }
    // Reverse topological order of apexes: the deepest painted gate decides.
    cones.sort_by_key(|cone| {
        std::cmp::Reverse(cone.painted.iter().map(|g| position[g.id]).max().unwrap_or(0))
    });

    let mut stats = RewriteStats::default();
    for cone in &cones {
        stats.absorb(try_rewrite_cone(circuit, db, cone, negation_users, min_cone_size)?);
    }
    log::info!(
        "db rewrite: examined={} hits={} replaced={} allocated={} rewired={}",
        stats.cones_examined,
        stats.db_hits,
        stats.cones_replaced,
        stats.gates_allocated,
        stats.users_rewired
    );
    Ok(stats)
}

/// How one local gate of the replacement is realised in the circuit.
#[derive(Clone, Copy)]
enum Source {
    /// An existing gate already computes this function.
    Existing(GateId),
    /// The local gate at this index provides the function (itself, when the
    /// index is its own, or an earlier planned twin).
    Local(usize),
}

fn try_rewrite_cone(
    circuit: &mut Circuit,
    db: &CircuitDb,
    cone: &Cone,
    negation_users: &[Option<GateId>],
    min_cone_size: usize,
) -> Result<RewriteStats, StoreError> {
    let mut stats = RewriteStats {
        cones_examined: 1,
        ..RewriteStats::default()
    };

    let painted: HashSet<GateId> = cone.painted.iter().copied().collect();
    let primary: HashSet<GateId> = circuit.outputs().iter().copied().collect();

    // A painted gate is a cone output if anything outside the cone observes
    // it. After an earlier overlapping splice this set shrinks, possibly to
    // empty, which retires the cone.
    let cone_outputs: Vec<GateId> = cone
        .painted
        .iter()
        .copied()
        .filter(|&g| {
            primary.contains(&g) || circuit.users(g).iter().any(|u| !painted.contains(u))
        })
        .collect();
    if cone_outputs.is_empty() {
        return Ok(stats);
    }

    let parents = &cone.parents;
    let Some(region) = bounded_region(circuit, &cone_outputs, parents) else {
        return Ok(stats);
    };
    if region.len() < min_cone_size {
        return Ok(stats);
    }

    let k = parents.len();
    let mask = table_mask(k);
    let region_tts = eval_region(circuit, &region, parents, mask);

    // Canonical key: output patterns ascending, remembering which cone output
    // owns which pattern.
    let mut keyed_outputs: Vec<(u64, GateId)> = cone_outputs
        .iter()
        .map(|&g| (region_tts[&g], g))
        .collect();
    keyed_outputs.sort_unstable();
    let key: Vec<u64> = keyed_outputs.iter().map(|&(tt, _)| tt).collect();

    let Some(sub) = db.lookup(&key) else {
        return Ok(stats);
    };
    stats.db_hits += 1;
    if sub.inputs_number != k {
        log::warn!(
            "db rewrite: pattern key {:?} matched a {}-input record for a {}-input cone; skipping",
            key,
            sub.inputs_number,
            k
        );
        return Ok(stats);
    }

    // Plan the instantiation: the cone inputs and their pre-existing
    // negations are free, planned gates are shared by function, and the rest
    // must be allocated.
    let local_tts = eval_subcircuit_tts(sub, mask);
    let mut by_tt: HashMap<u64, Source> = HashMap::new();
    for (i, &p) in parents.iter().enumerate() {
        by_tt.insert(var_pattern(i, mask), Source::Existing(p));
        if let Some(n) = negation_users.get(p.id).copied().flatten() {
            // The recorded negation may have been rewired since; verify it
            // still is NOT(p) before trusting it.
            if circuit.gate_type(n) == GateType::Not && circuit.operands(n).first() == Some(&p) {
                by_tt
                    .entry(!var_pattern(i, mask) & mask)
                    .or_insert(Source::Existing(n));
            }
        }
    }
    let mut plan: Vec<Source> = parents.iter().map(|&p| Source::Existing(p)).collect();
    let mut to_allocate = 0usize;
    for j in 0..sub.operations.len() {
        let local = k + j;
        match by_tt.get(&local_tts[local]).copied() {
            Some(src) => plan.push(src),
            None => {
                to_allocate += 1;
                plan.push(Source::Local(local));
                by_tt.insert(local_tts[local], Source::Local(local));
            }
        }
    }

    // Savings: region gates that will actually be orphaned by the splice.
    // Anything with a surviving observer (outside user, a primary-output slot
    // of an unpainted gate, or reuse by the plan itself) stays, and keeps its
    // own operands alive.
    let region_set: HashSet<GateId> = region.iter().copied().collect();
    let outputs_set: HashSet<GateId> = cone_outputs.iter().copied().collect();
    let mut alive: HashSet<GateId> = HashSet::new();
    for src in &plan {
        if let Source::Existing(g) = *src {
            if region_set.contains(&g) {
                alive.insert(g);
            }
        }
    }
    for &g in &region {
        if outputs_set.contains(&g) {
            continue;
        }
        if primary.contains(&g) || circuit.users(g).iter().any(|u| !region_set.contains(u)) {
            alive.insert(g);
        }
    }
    for &g in region.iter().rev() {
        if alive.contains(&g) {
            for &op in circuit.operands(g) {
                if region_set.contains(&op) {
                    alive.insert(op);
                }
            }
        }
    }
    let orphaned = region.len() - alive.len();
    if to_allocate >= orphaned {
        // No size win: silently skip.
        return Ok(stats);
    }

    // Splice. Allocation follows the plan in local-id order, so operand
    // references always resolve to already-realised gates.
    let mut mapped: Vec<GateId> = Vec::with_capacity(plan.len());
    for (local, src) in plan.iter().enumerate() {
        let gate = match *src {
            Source::Existing(g) => g,
            Source::Local(l) if l < local => mapped[l],
            Source::Local(_) => {
                let j = local - k;
                let gate_operands: Vec<GateId> =
                    sub.operands[j].iter().map(|&x| mapped[x]).collect();
                stats.gates_allocated += 1;
                circuit.add_gate(sub.operations[j], gate_operands)
            }
        };
        mapped.push(gate);
    }

    // Match cone outputs to replacement outputs positionally through the
    // shared ascending pattern order, then rewire the world.
    let mut keyed_new: Vec<(u64, GateId)> = sub
        .outputs
        .iter()
        .map(|&local| (local_tts[local], mapped[local]))
        .collect();
    keyed_new.sort_unstable();
    for (&(tt_old, old), &(tt_new, new)) in keyed_outputs.iter().zip(keyed_new.iter()) {
        debug_assert_eq!(tt_old, tt_new, "database entry disagrees with its key");
        if old == new {
            continue;
        }
        let users: Vec<GateId> = circuit.users(old).iter().copied().collect();
        for user in users {
            let new_operands: Vec<GateId> = circuit
                .operands(user)
                .iter()
                .map(|&op| if op == old { new } else { op })
                .collect();
            match circuit.rewire(user, new_operands) {
                Ok(()) => stats.users_rewired += 1,
                Err(StoreError::WouldCycle { .. }) => {
                    // The user feeds the replacement itself; leaving it on the
                    // old gate is functionally identical.
                    log::debug!("db rewrite: left user {} of {} in place", user, old);
                }
                Err(e) => return Err(e),
            }
        }
        stats.users_rewired += circuit.replace_output_refs(old, new);
    }
    stats.cones_replaced += 1;
    log::debug!(
        "db rewrite: replaced cone over {:?} ({} gates orphaned, {} allocated)",
        parents,
        orphaned,
        to_allocate
    );
    Ok(stats)
}

fn table_mask(inputs: usize) -> u64 {
    let bits = 1u32 << inputs;
    if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

/// Truth table of input variable `i` under `mask`.
fn var_pattern(i: usize, mask: u64) -> u64 {
    let mut tt = 0u64;
    let mut assign = 0u64;
    while assign < 64 && (1u64 << assign) & mask != 0 {
        if (assign >> i) & 1 != 0 {
            tt |= 1 << assign;
        }
        assign += 1;
    }
    tt
}

/// The gates between the cone outputs and the parents, operands-first. Stops
/// descending at parents; returns None if the region escapes to a primary
/// input that is not a parent (the coloring would have to be corrupt for
/// that to happen, so the cone is abandoned rather than miscompiled).
fn bounded_region(
    circuit: &Circuit,
    cone_outputs: &[GateId],
    parents: &[GateId],
) -> Option<Vec<GateId>> {
    let parent_set: HashSet<GateId> = parents.iter().copied().collect();
    let mut region: Vec<GateId> = Vec::new();
    let mut state: HashMap<GateId, u8> = HashMap::new(); // 1 = open, 2 = done
    for &out in cone_outputs {
        if parent_set.contains(&out) || state.get(&out) == Some(&2) {
            continue;
        }
        let mut stack: Vec<(GateId, usize)> = vec![(out, 0)];
        state.insert(out, 1);
        while let Some(frame) = stack.last_mut() {
            let (gate, next) = (frame.0, frame.1);
            let operands = circuit.operands(gate);
            if next < operands.len() {
                frame.1 += 1;
                let op = operands[next];
                if parent_set.contains(&op) || state.get(&op).is_some() {
                    continue;
                }
                if circuit.gate_type(op) == GateType::Input {
                    log::warn!(
                        "db rewrite: cone over {:?} leaks to input {}; skipping",
                        parents,
                        op
                    );
                    return None;
                }
                state.insert(op, 1);
                stack.push((op, 0));
            } else {
                state.insert(gate, 2);
                region.push(gate);
                stack.pop();
            }
        }
    }
    Some(region)
}

/// Bitwise-parallel truth tables for every gate in the region (and the
/// parents), one u64 per gate, all assignments at once.
fn eval_region(
    circuit: &Circuit,
    region: &[GateId],
    parents: &[GateId],
    mask: u64,
) -> HashMap<GateId, u64> {
    let mut tts: HashMap<GateId, u64> = HashMap::new();
    for (i, &p) in parents.iter().enumerate() {
        tts.insert(p, var_pattern(i, mask));
    }
    for &g in region {
        let operand_tts: Vec<u64> = circuit.operands(g).iter().map(|op| tts[op]).collect();
        tts.insert(g, eval_tt(circuit.gate_type(g), &operand_tts, mask));
    }
    tts
}

/// Local truth tables of a database subcircuit: inputs first, then gates.
fn eval_subcircuit_tts(sub: &DbSubcircuit, mask: u64) -> Vec<u64> {
    let mut tts: Vec<u64> = (0..sub.inputs_number).map(|i| var_pattern(i, mask)).collect();
    for (j, &ty) in sub.operations.iter().enumerate() {
        let operand_tts: Vec<u64> = sub.operands[j].iter().map(|&x| tts[x]).collect();
        tts.push(eval_tt(ty, &operand_tts, mask));
    }
    tts
}

fn eval_tt(ty: GateType, operands: &[u64], mask: u64) -> u64 {
    match ty {
        GateType::Not => !operands[0] & mask,
        GateType::Buff => operands[0],
        GateType::And => operands[0] & operands[1],
        GateType::Or => operands[0] | operands[1],
        GateType::Nand => !(operands[0] & operands[1]) & mask,
        GateType::Nor => !(operands[0] | operands[1]) & mask,
        GateType::Xor => operands[0] ^ operands[1],
        GateType::Xnor => !(operands[0] ^ operands[1]) & mask,
        GateType::Mux => (operands[0] & operands[1]) | (!operands[0] & mask & operands[2]),
        GateType::ConstFalse => 0,
        GateType::ConstTrue => mask,
        GateType::Input => unreachable!("inputs are seeded, not evaluated"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit_db::CircuitDb;
    use crate::sim::output_patterns;
    use crate::three_coloring::ThreeColoring;
    use crate::topo::{debug_assert_acyclic, topo_sort};
    use crate::two_coloring::TwoColoring;

    fn xor_of_and_or() -> (Circuit, GateId) {
        let mut c = Circuit::new();
        let a = c.add_gate(GateType::Input, vec![]);
        let b = c.add_gate(GateType::Input, vec![]);
        let g = c.add_gate(GateType::And, vec![a, b]);
        let h = c.add_gate(GateType::Or, vec![a, b]);
        let k = c.add_gate(GateType::Xor, vec![g, h]);
        c.add_output(k);
        (c, k)
    }

    #[test]
    fn pair_cone_collapses_to_single_xor() {
        let (mut c, _) = xor_of_and_or();
        let before = output_patterns(&c);
        let db = CircuitDb::load_from_str("2 1 6 2 XOR 0 1\n").unwrap();
        let order = topo_sort(&c).unwrap();
        let two = TwoColoring::build(&c, &order);
        let stats = rewrite_two_color_cones(&mut c, &db, &two, &order, 2).unwrap();
        assert_eq!(stats.cones_replaced, 1);
        assert_eq!(stats.gates_allocated, 1);
        debug_assert_acyclic(&c, "after pair rewrite");
        assert_eq!(output_patterns(&c), before);
        // The primary output now points at the fresh XOR gate.
        let out = c.outputs()[0];
        assert_eq!(c.gate_type(out), GateType::Xor);
        assert_eq!(c.operands(out).len(), 2);
    }

    #[test]
    fn miss_and_no_benefit_are_no_ops() {
        let (mut c, k) = xor_of_and_or();
        // Empty database: miss.
        let db = CircuitDb::load_from_str("").unwrap();
        let order = topo_sort(&c).unwrap();
        let two = TwoColoring::build(&c, &order);
        let stats = rewrite_two_color_cones(&mut c, &db, &two, &order, 2).unwrap();
        assert_eq!(stats.cones_replaced, 0);
        assert_eq!(c.outputs()[0], k);

        // Same-size replacement: hit but no win, still a no-op.
        let db = CircuitDb::load_from_str("2 1 6 4 AND 0 1 OR 0 1 XOR 2 3\n").unwrap();
        let stats = rewrite_two_color_cones(&mut c, &db, &two, &order, 2).unwrap();
        assert_eq!(stats.db_hits, 1);
        assert_eq!(stats.cones_replaced, 0);
    }

    #[test]
    fn min_cone_size_gates_small_cones() {
        let (mut c, _) = xor_of_and_or();
        let db = CircuitDb::load_from_str("2 1 6 2 XOR 0 1\n").unwrap();
        let order = topo_sort(&c).unwrap();
        let two = TwoColoring::build(&c, &order);
        let stats = rewrite_two_color_cones(&mut c, &db, &two, &order, 4).unwrap();
        assert_eq!(stats.cones_replaced, 0);
    }

    #[test]
    fn cone_with_two_observed_outputs_matches_a_two_output_record() {
        // The inner AND also feeds a NOT outside the cone, so the cone
        // presents two outputs (patterns 6 and 8) and must match a two-output
        // database record; both observers get rewired onto the replacement.
        let mut c = Circuit::new();
        let a = c.add_gate(GateType::Input, vec![]);
        let b = c.add_gate(GateType::Input, vec![]);
        let g = c.add_gate(GateType::And, vec![a, b]);
        let h = c.add_gate(GateType::Or, vec![a, b]);
        let k = c.add_gate(GateType::Xor, vec![g, h]);
        let n = c.add_gate(GateType::Not, vec![g]);
        c.add_output(k);
        c.add_output(n);
        let before = output_patterns(&c);
        let db = CircuitDb::load_from_str("2 2 6 8 3 2 AND 0 1 XOR 0 1\n").unwrap();
        let order = topo_sort(&c).unwrap();
        let two = TwoColoring::build(&c, &order);
        let stats = rewrite_two_color_cones(&mut c, &db, &two, &order, 2).unwrap();
        assert_eq!(stats.cones_replaced, 1);
        assert_eq!(stats.gates_allocated, 2);
        debug_assert_acyclic(&c, "after multi-output rewrite");
        assert_eq!(output_patterns(&c), before);
        // The NOT observer now reads the fresh AND.
        let n_operand = c.operands(n)[0];
        assert_eq!(c.gate_type(n_operand), GateType::And);
        assert_ne!(n_operand, g);
    }

    #[test]
    fn triple_cone_rewrites_through_three_coloring() {
        // Majority of three inputs, written wastefully with 5 binary gates:
        // maj = OR(OR(AND(a,b), AND(a,c)), AND(b,c)).
        let mut c = Circuit::new();
        let a = c.add_gate(GateType::Input, vec![]);
        let b = c.add_gate(GateType::Input, vec![]);
        let d = c.add_gate(GateType::Input, vec![]);
        let ab = c.add_gate(GateType::And, vec![a, b]);
        let ad = c.add_gate(GateType::And, vec![a, d]);
        let bd = c.add_gate(GateType::And, vec![b, d]);
        let o1 = c.add_gate(GateType::Or, vec![ab, ad]);
        let o2 = c.add_gate(GateType::Or, vec![o1, bd]);
        c.add_output(o2);
        let before = output_patterns(&c);
        assert_eq!(before, vec![0b11101000]);

        // Majority in 4 binary gates: maj(a,b,c) = OR(AND(a,b), AND(c, OR(a,b))).
        let db_text = "3 1 232 6 AND 0 1 OR 0 1 AND 2 4 OR 3 5\n";
        let db = CircuitDb::load_from_str(db_text).unwrap();
        for sub in db.subcircuits() {
            assert_eq!(sub.eval_patterns(), sub.patterns);
        }

        let order = topo_sort(&c).unwrap();
        let two = TwoColoring::build(&c, &order);
        let three = ThreeColoring::build(&c, &order, &two).unwrap();
        let stats = rewrite_three_color_cones(&mut c, &db, &three, &order, 2).unwrap();
        assert_eq!(stats.cones_replaced, 1);
        debug_assert_acyclic(&c, "after triple rewrite");
        assert_eq!(output_patterns(&c), before);
    }

    #[test]
    fn parent_negation_is_reused() {
        // A five-gate cone over (a, b) that boils down to OR(a, b). The
        // database implements OR through De Morgan with three NOT gates; the
        // circuit already carries NOT(a), which the splice must pick up
        // instead of allocating a twin.
        let mut c = Circuit::new();
        let a = c.add_gate(GateType::Input, vec![]);
        let b = c.add_gate(GateType::Input, vec![]);
        let na = c.add_gate(GateType::Not, vec![a]);
        let g = c.add_gate(GateType::And, vec![a, b]);
        let h = c.add_gate(GateType::Or, vec![a, b]);
        let k1 = c.add_gate(GateType::And, vec![g, h]);
        let k2 = c.add_gate(GateType::Xor, vec![g, h]);
        let out = c.add_gate(GateType::Or, vec![k1, k2]);
        c.add_output(na);
        c.add_output(out);
        let before = output_patterns(&c);

        // OR(a, b) as NOT(AND(NOT a, NOT b)): one binary gate.
        let db_text = "2 1 14 5 NOT 0 NOT 1 AND 2 3 NOT 4\n";
        let db = CircuitDb::load_from_str(db_text).unwrap();
        let order = topo_sort(&c).unwrap();
        let two = TwoColoring::build(&c, &order);
        let stats = rewrite_two_color_cones(&mut c, &db, &two, &order, 2).unwrap();
        assert_eq!(stats.cones_replaced, 1);
        // NOT(b), the AND, and the outer NOT are fresh; NOT(a) is reused.
        assert_eq!(stats.gates_allocated, 3);
        assert_eq!(output_patterns(&c), before);
    }
}
