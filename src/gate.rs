// SPDX-License-Identifier: Apache-2.0

//! The owning representation of a combinational circuit: gates, their operand
//! lists, the primary-output list, and a materialised user (fanout) index.
//!
//! Gate ids are dense and stable until an explicit compaction pass (see
//! `dce`). `rewire` is the only mutator of existing operand lists, which keeps
//! the user index cheap to maintain incrementally.

use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct GateId {
    pub id: usize,
}

impl fmt::Display for GateId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "%{}", self.id)
    }
}

/// The closed set of gate types a circuit may contain.
///
/// The subcircuit database uses only the "basic" subset (`Not` plus the
/// binary operators); `Buff` covers both the BUFF and IFF spellings found in
/// BENCH files.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub enum GateType {
    Input,
    Not,
    And,
    Or,
    Nand,
    Nor,
    Xor,
    Xnor,
    Buff,
    Mux,
    ConstFalse,
    ConstTrue,
}

impl GateType {
    /// Number of operands this gate type carries.
    pub fn arity(self) -> usize {
        match self {
            GateType::Input | GateType::ConstFalse | GateType::ConstTrue => 0,
            GateType::Not | GateType::Buff => 1,
            GateType::Mux => 3,
            _ => 2,
        }
    }

    /// True for the operator subset the replacement database is expressed in.
    pub fn is_basic(self) -> bool {
        matches!(
            self,
            GateType::Not
                | GateType::And
                | GateType::Or
                | GateType::Nand
                | GateType::Nor
                | GateType::Xor
                | GateType::Xnor
        )
    }

    pub fn is_binary_op(self) -> bool {
        self.is_basic() && self != GateType::Not
    }

    /// Evaluates the gate on already-evaluated operand values.
    ///
    /// Panics on `Input` (inputs take their value from the assignment, not
    /// from evaluation) and on operand-count mismatch; both indicate a bug in
    /// the caller.
    pub fn eval(self, operands: &[bool]) -> bool {
        debug_assert_eq!(
            operands.len(),
            self.arity(),
            "GateType::eval: arity mismatch for {:?}",
            self
        );
        match self {
            GateType::Input => unreachable!("inputs are not evaluated"),
            GateType::Not => !operands[0],
            GateType::Buff => operands[0],
            GateType::And => operands[0] && operands[1],
            GateType::Or => operands[0] || operands[1],
            GateType::Nand => !(operands[0] && operands[1]),
            GateType::Nor => !(operands[0] || operands[1]),
            GateType::Xor => operands[0] ^ operands[1],
            GateType::Xnor => !(operands[0] ^ operands[1]),
            GateType::Mux => {
                if operands[0] {
                    operands[1]
                } else {
                    operands[2]
                }
            }
            GateType::ConstFalse => false,
            GateType::ConstTrue => true,
        }
    }

    /// Parses an operator token as found in BENCH files and the subcircuit
    /// database (case-insensitive). `IFF` is accepted as a `Buff` spelling.
    pub fn from_token(token: &str) -> Option<GateType> {
        match token.to_ascii_uppercase().as_str() {
            "NOT" => Some(GateType::Not),
            "AND" => Some(GateType::And),
            "OR" => Some(GateType::Or),
            "NAND" => Some(GateType::Nand),
            "NOR" => Some(GateType::Nor),
            "XOR" => Some(GateType::Xor),
            "XNOR" => Some(GateType::Xnor),
            "BUFF" | "IFF" => Some(GateType::Buff),
            "MUX" => Some(GateType::Mux),
            "CONST_FALSE" => Some(GateType::ConstFalse),
            "CONST_TRUE" => Some(GateType::ConstTrue),
            _ => None,
        }
    }
}

impl fmt::Display for GateType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            GateType::Input => "INPUT",
            GateType::Not => "NOT",
            GateType::And => "AND",
            GateType::Or => "OR",
            GateType::Nand => "NAND",
            GateType::Nor => "NOR",
            GateType::Xor => "XOR",
            GateType::Xnor => "XNOR",
            GateType::Buff => "BUFF",
            GateType::Mux => "MUX",
            GateType::ConstFalse => "CONST_FALSE",
            GateType::ConstTrue => "CONST_TRUE",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gate {
    pub ty: GateType,
    pub operands: Vec<GateId>,
}

#[derive(Debug)]
pub enum StoreError {
    UnknownGate { gate: GateId, referenced_by: usize },
    ArityMismatch { gate: GateId, ty: GateType, got: usize },
    WouldCycle { gate: GateId, via: GateId },
    UnknownOutput { gate: GateId },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StoreError::UnknownGate { gate, referenced_by } => {
                write!(f, "operand {} of gate %{} does not exist", gate, referenced_by)
            }
            StoreError::ArityMismatch { gate, ty, got } => write!(
                f,
                "gate {} of type {} given {} operands (expects {})",
                gate,
                ty,
                got,
                ty.arity()
            ),
            StoreError::WouldCycle { gate, via } => {
                write!(f, "rewiring gate {} through {} would create a cycle", gate, via)
            }
            StoreError::UnknownOutput { gate } => {
                write!(f, "primary output {} does not exist", gate)
            }
        }
    }
}

impl std::error::Error for StoreError {}

/// The circuit store. Every other pass borrows from this; at most one pass
/// mutates it at a time.
#[derive(Debug, Clone, Default)]
pub struct Circuit {
    gates: Vec<Gate>,
    outputs: Vec<GateId>,
    users: Vec<BTreeSet<GateId>>,
}

impl Circuit {
    pub fn new() -> Self {
        Circuit::default()
    }

    /// Builds a circuit from parsed parts, validating operand references and
    /// arities and materialising the user index. Cycles are not detected here;
    /// `topo::topo_sort` reports them.
    pub fn from_parts(gates: Vec<Gate>, outputs: Vec<GateId>) -> Result<Circuit, StoreError> {
        let n = gates.len();
        let mut users: Vec<BTreeSet<GateId>> = vec![BTreeSet::new(); n];
        for (i, gate) in gates.iter().enumerate() {
            if gate.operands.len() != gate.ty.arity() {
                return Err(StoreError::ArityMismatch {
                    gate: GateId { id: i },
                    ty: gate.ty,
                    got: gate.operands.len(),
                });
            }
            for &op in &gate.operands {
                if op.id >= n {
                    return Err(StoreError::UnknownGate {
                        gate: op,
                        referenced_by: i,
                    });
                }
                users[op.id].insert(GateId { id: i });
            }
        }
        for &o in &outputs {
            if o.id >= n {
                return Err(StoreError::UnknownOutput { gate: o });
            }
        }
        Ok(Circuit { gates, outputs, users })
    }

    pub fn gate_count(&self) -> usize {
        self.gates.len()
    }

    pub fn ids(&self) -> impl Iterator<Item = GateId> {
        (0..self.gates.len()).map(|id| GateId { id })
    }

    pub fn gate(&self, id: GateId) -> &Gate {
        &self.gates[id.id]
    }

    pub fn gate_type(&self, id: GateId) -> GateType {
        self.gates[id.id].ty
    }

    pub fn operands(&self, id: GateId) -> &[GateId] {
        &self.gates[id.id].operands
    }

    /// The gates whose operand lists reference `id`. Kept consistent by
    /// `add_gate` and `rewire`; primary-output references are tracked
    /// separately in `outputs`.
    pub fn users(&self, id: GateId) -> &BTreeSet<GateId> {
        &self.users[id.id]
    }

    pub fn outputs(&self) -> &[GateId] {
        &self.outputs
    }

    pub fn add_output(&mut self, id: GateId) {
        assert!(id.id < self.gates.len(), "add_output: unknown gate {}", id);
        self.outputs.push(id);
    }

    /// Appends a new gate and returns its id. Operand references must already
    /// exist, which also keeps the graph acyclic by construction.
    pub fn add_gate(&mut self, ty: GateType, operands: Vec<GateId>) -> GateId {
        assert_eq!(
            operands.len(),
            ty.arity(),
            "add_gate: arity mismatch for {}",
            ty
        );
        let id = GateId {
            id: self.gates.len(),
        };
        for &op in &operands {
            assert!(op.id < self.gates.len(), "add_gate: unknown operand {}", op);
        }
        self.users.push(BTreeSet::new());
        for &op in &operands {
            self.users[op.id].insert(id);
        }
        self.gates.push(Gate { ty, operands });
        id
    }

    /// Replaces the operand list of `id`. Fails if a new operand does not
    /// exist or if the new wiring would create a cycle. The user index is
    /// updated in place.
    pub fn rewire(&mut self, id: GateId, new_operands: Vec<GateId>) -> Result<(), StoreError> {
        let ty = self.gates[id.id].ty;
        if new_operands.len() != ty.arity() {
            return Err(StoreError::ArityMismatch {
                gate: id,
                ty,
                got: new_operands.len(),
            });
        }
        for &op in &new_operands {
            if op.id >= self.gates.len() {
                return Err(StoreError::UnknownGate {
                    gate: op,
                    referenced_by: id.id,
                });
            }
            if self.reaches(op, id) {
                return Err(StoreError::WouldCycle { gate: id, via: op });
            }
        }
        let old_operands = std::mem::take(&mut self.gates[id.id].operands);
        for &op in &old_operands {
            self.users[op.id].remove(&id);
        }
        for &op in &new_operands {
            self.users[op.id].insert(id);
        }
        self.gates[id.id].operands = new_operands;
        Ok(())
    }

    /// Rewires every user of `old` (and every primary-output reference) to
    /// point at `new` instead. Returns the number of rewritten references.
    pub fn replace_uses(&mut self, old: GateId, new: GateId) -> Result<usize, StoreError> {
        let mut rewritten = 0;
        let user_snapshot: Vec<GateId> = self.users[old.id].iter().copied().collect();
        for user in user_snapshot {
            let new_operands: Vec<GateId> = self.gates[user.id]
                .operands
                .iter()
                .map(|&op| if op == old { new } else { op })
                .collect();
            self.rewire(user, new_operands)?;
            rewritten += 1;
        }
        for out in self.outputs.iter_mut() {
            if *out == old {
                *out = new;
                rewritten += 1;
            }
        }
        Ok(rewritten)
    }

    /// Redirects primary-output slots referencing `old` to `new`, leaving
    /// operand lists alone. Returns the number of slots rewritten.
    pub fn replace_output_refs(&mut self, old: GateId, new: GateId) -> usize {
        assert!(new.id < self.gates.len(), "replace_output_refs: unknown gate {}", new);
        let mut rewritten = 0;
        for out in self.outputs.iter_mut() {
            if *out == old {
                *out = new;
                rewritten += 1;
            }
        }
        rewritten
    }

    /// True if `to` is reachable from `from` through operand edges (i.e. `to`
    /// lies in the fan-in cone of `from`).
    fn reaches(&self, from: GateId, to: GateId) -> bool {
        if from == to {
            return true;
        }
        let mut worklist = vec![from];
        let mut visited = BTreeSet::new();
        while let Some(current) = worklist.pop() {
            if !visited.insert(current) {
                continue;
            }
            for &op in &self.gates[current.id].operands {
                if op == to {
                    return true;
                }
                worklist.push(op);
            }
        }
        false
    }
}
