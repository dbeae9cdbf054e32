// SPDX-License-Identifier: Apache-2.0

//! The precomputed database of optimal small subcircuits.
//!
//! The on-disk format is whitespace-delimited text, one subcircuit per
//! record:
//!
//! 1. number of inputs (inputs are numbered `0..inputs_number`);
//! 2. number of outputs;
//! 3. one decimal truth-table pattern per output (bit `i` is the output under
//!    the assignment whose binary representation is `i`);
//! 4. one gate id per output (ids are `>= inputs_number`);
//! 5. gate descriptions for ids `inputs_number..=max_id`: an operator token
//!    followed by one operand (NOT) or two operands, all referencing earlier
//!    ids.
//!
//! The sorted pattern vector is the lookup key. The database is loaded once
//! at startup and immutable afterwards; passes receive an `Arc` handle from
//! the registry rather than reaching for process-wide state.

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use crate::gate::GateType;

/// The gate basis a circuit (and its database) is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Basis {
    Aig,
    Bench,
}

impl Basis {
    /// Database file name for this basis inside the database directory.
    pub fn db_file_name(self) -> &'static str {
        match self {
            Basis::Aig => "aig_db.txt",
            Basis::Bench => "bench_db.txt",
        }
    }
}

impl fmt::Display for Basis {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Basis::Aig => write!(f, "AIG"),
            Basis::Bench => write!(f, "BENCH"),
        }
    }
}

impl FromStr for Basis {
    type Err = String;

    fn from_str(s: &str) -> Result<Basis, String> {
        match s.to_ascii_uppercase().as_str() {
            "AIG" => Ok(Basis::Aig),
            "BENCH" => Ok(Basis::Bench),
            other => Err(format!("unsupported basis '{}' (choose AIG or BENCH)", other)),
        }
    }
}

#[derive(Debug)]
pub enum LoadError {
    Io(io::Error),
    Parse { line: usize, message: String },
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LoadError::Io(e) => write!(f, "database io error: {}", e),
            LoadError::Parse { line, message } => {
                write!(f, "database parse error at line {}: {}", line, message)
            }
        }
    }
}

impl std::error::Error for LoadError {}

impl From<io::Error> for LoadError {
    fn from(e: io::Error) -> Self {
        LoadError::Io(e)
    }
}

/// One replacement subcircuit. Local gate ids `0..inputs_number` are the
/// inputs; gate `inputs_number + j` is described by `operations[j]` /
/// `operands[j]`.
#[derive(Debug, Clone)]
pub struct DbSubcircuit {
    pub inputs_number: usize,
    /// Truth-table patterns in record order, parallel to `outputs`.
    pub patterns: Vec<u64>,
    /// Local gate ids of the outputs, parallel to `patterns`.
    pub outputs: Vec<usize>,
    pub operations: Vec<GateType>,
    pub operands: Vec<Vec<usize>>,
    /// Number of binary (non-NOT) gates; the replacement cost measure.
    pub binary_op_count: usize,
}

impl DbSubcircuit {
    pub fn gate_count(&self) -> usize {
        self.operations.len()
    }

    /// Evaluates the subcircuit over every input assignment, returning the
    /// truth table of each declared output in record order. Used to verify
    /// database integrity (the result must equal `patterns`).
    pub fn eval_patterns(&self) -> Vec<u64> {
        let mut result = vec![0u64; self.outputs.len()];
        let total = self.inputs_number + self.operations.len();
        let mut values = vec![false; total];
        for assign in 0u64..(1 << self.inputs_number) {
            for i in 0..self.inputs_number {
                values[i] = (assign >> i) & 1 != 0;
            }
            for (j, &op) in self.operations.iter().enumerate() {
                let operand_values: Vec<bool> =
                    self.operands[j].iter().map(|&k| values[k]).collect();
                values[self.inputs_number + j] = op.eval(&operand_values);
            }
            for (out_index, &out_id) in self.outputs.iter().enumerate() {
                if values[out_id] {
                    result[out_index] |= 1 << assign;
                }
            }
        }
        result
    }
}

/// Immutable lookup table: canonical (ascending-sorted) pattern vector to
/// replacement subcircuit.
#[derive(Debug, Default)]
pub struct CircuitDb {
    pattern_to_index: HashMap<Vec<u64>, usize>,
    subcircuits: Vec<DbSubcircuit>,
}

struct Tokens<'a> {
    tokens: Vec<(usize, &'a str)>,
    pos: usize,
}

impl<'a> Tokens<'a> {
    fn new(text: &'a str) -> Tokens<'a> {
        let mut tokens = Vec::new();
        for (i, line) in text.lines().enumerate() {
            for token in line.split_whitespace() {
                tokens.push((i + 1, token));
            }
        }
        Tokens { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<(usize, &'a str)> {
        self.tokens.get(self.pos).copied()
    }

    fn next_or_error(&mut self, what: &str) -> Result<(usize, &'a str), LoadError> {
        match self.tokens.get(self.pos) {
            Some(&t) => {
                self.pos += 1;
                Ok(t)
            }
            None => {
                let line = self.tokens.last().map(|&(l, _)| l).unwrap_or(1);
                Err(LoadError::Parse {
                    line,
                    message: format!("unexpected end of file, expected {}", what),
                })
            }
        }
    }

    fn next_number(&mut self, what: &str) -> Result<(usize, u64), LoadError> {
        let (line, token) = self.next_or_error(what)?;
        let value = token.parse::<u64>().map_err(|_| LoadError::Parse {
            line,
            message: format!("expected {} as a number, got '{}'", what, token),
        })?;
        Ok((line, value))
    }
}

impl CircuitDb {
    pub fn load_from_path(path: &Path) -> Result<CircuitDb, LoadError> {
        let text = std::fs::read_to_string(path)?;
        CircuitDb::load_from_str(&text)
    }

    pub fn load_from_str(text: &str) -> Result<CircuitDb, LoadError> {
        let mut tokens = Tokens::new(text);
        let mut db = CircuitDb::default();

        while tokens.peek().is_some() {
            let sub = parse_record(&mut tokens)?;
            let mut key = sub.patterns.clone();
            key.sort_unstable();
            let index = db.subcircuits.len();
            db.subcircuits.push(sub);
            match db.pattern_to_index.get(&key).copied() {
                Some(existing) => {
                    // Keep the first record; duplicates in an "optimal"
                    // database are an integrity smell worth surfacing.
                    log::warn!(
                        "database: duplicate pattern key {:?} (records {} and {}); keeping the first",
                        key,
                        existing,
                        index
                    );
                }
                None => {
                    db.pattern_to_index.insert(key, index);
                }
            }
        }

        log::debug!("database: loaded {} subcircuits", db.subcircuits.len());
        Ok(db)
    }

    pub fn len(&self) -> usize {
        self.subcircuits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subcircuits.is_empty()
    }

    pub fn subcircuits(&self) -> &[DbSubcircuit] {
        &self.subcircuits
    }

    /// Looks up a canonical (ascending-sorted) pattern vector.
    pub fn lookup(&self, sorted_patterns: &[u64]) -> Option<&DbSubcircuit> {
        debug_assert!(sorted_patterns.windows(2).all(|w| w[0] <= w[1]));
        self.pattern_to_index
            .get(sorted_patterns)
            .map(|&i| &self.subcircuits[i])
    }
}

fn parse_record(tokens: &mut Tokens) -> Result<DbSubcircuit, LoadError> {
    let (line, inputs_number) = tokens.next_number("inputs count")?;
    let inputs_number = inputs_number as usize;
    if inputs_number == 0 || inputs_number > 6 {
        return Err(LoadError::Parse {
            line,
            message: format!("inputs count {} out of supported range 1..=6", inputs_number),
        });
    }
    let (_, outputs_number) = tokens.next_number("outputs count")?;
    let outputs_number = outputs_number as usize;
    if outputs_number == 0 {
        return Err(LoadError::Parse {
            line,
            message: "record declares zero outputs".to_string(),
        });
    }

    let table_bits = 1u64 << inputs_number;
    let mut patterns = Vec::with_capacity(outputs_number);
    for _ in 0..outputs_number {
        let (line, pattern) = tokens.next_number("output pattern")?;
        if table_bits < 64 && pattern >= (1u64 << table_bits) {
            return Err(LoadError::Parse {
                line,
                message: format!(
                    "pattern {} does not fit a {}-input truth table",
                    pattern, inputs_number
                ),
            });
        }
        patterns.push(pattern);
    }

    let mut outputs = Vec::with_capacity(outputs_number);
    let mut max_id = 0usize;
    for _ in 0..outputs_number {
        let (line, id) = tokens.next_number("output gate id")?;
        let id = id as usize;
        if id < inputs_number {
            return Err(LoadError::Parse {
                line,
                message: format!("output id {} names an input gate", id),
            });
        }
        max_id = max_id.max(id);
        outputs.push(id);
    }

    let mut operations = Vec::new();
    let mut operands: Vec<Vec<usize>> = Vec::new();
    let mut binary_op_count = 0usize;
    for id in inputs_number..=max_id {
        let (line, token) = tokens.next_or_error("gate operator")?;
        let ty = GateType::from_token(token).ok_or_else(|| LoadError::Parse {
            line,
            message: format!("unknown operator '{}'", token),
        })?;
        if !ty.is_basic() {
            return Err(LoadError::Parse {
                line,
                message: format!("operator {} is outside the basic database set", ty),
            });
        }
        let mut gate_operands = Vec::with_capacity(ty.arity());
        for _ in 0..ty.arity() {
            let (line, operand) = tokens.next_number("gate operand")?;
            let operand = operand as usize;
            if operand >= id {
                return Err(LoadError::Parse {
                    line,
                    message: format!("gate {} references operand {} out of order", id, operand),
                });
            }
            gate_operands.push(operand);
        }
        if ty.is_binary_op() {
            binary_op_count += 1;
        }
        operations.push(ty);
        operands.push(gate_operands);
    }

    Ok(DbSubcircuit {
        inputs_number,
        patterns,
        outputs,
        operations,
        operands,
        binary_op_count,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MissingDb {
    pub basis: Basis,
}

impl fmt::Display for MissingDb {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "no {} database is loaded", self.basis)
    }
}

impl std::error::Error for MissingDb {}

/// Holder for the per-basis databases, loaded once at startup and threaded
/// into passes as an explicit handle.
#[derive(Debug, Default)]
pub struct DbRegistry {
    aig: Option<Arc<CircuitDb>>,
    bench: Option<Arc<CircuitDb>>,
}

impl DbRegistry {
    /// Loads whichever per-basis files exist under `dir` (`aig_db.txt`,
    /// `bench_db.txt`). A missing file leaves that basis unavailable; a
    /// present-but-malformed file is an error.
    pub fn load_from_dir(dir: &Path) -> Result<DbRegistry, LoadError> {
        let mut registry = DbRegistry::default();
        for basis in [Basis::Aig, Basis::Bench] {
            let path = dir.join(basis.db_file_name());
            if !path.exists() {
                continue;
            }
            let db = Arc::new(CircuitDb::load_from_path(&path)?);
            log::info!("loaded {} database: {} subcircuits", basis, db.len());
            registry.insert(basis, db);
        }
        Ok(registry)
    }

    pub fn insert(&mut self, basis: Basis, db: Arc<CircuitDb>) {
        match basis {
            Basis::Aig => self.aig = Some(db),
            Basis::Bench => self.bench = Some(db),
        }
    }

    pub fn get(&self, basis: Basis) -> Result<Arc<CircuitDb>, MissingDb> {
        let slot = match basis {
            Basis::Aig => &self.aig,
            Basis::Bench => &self.bench,
        };
        slot.clone().ok_or(MissingDb { basis })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    // XOR of two inputs expressed directly: one record, one output.
    const XOR_RECORD: &str = "2 1 6 2 XOR 0 1\n";

    #[test]
    fn parses_single_record() {
        let db = CircuitDb::load_from_str(XOR_RECORD).unwrap();
        assert_eq!(db.len(), 1);
        let sub = db.lookup(&[6]).unwrap();
        assert_eq!(sub.inputs_number, 2);
        assert_eq!(sub.outputs, vec![2]);
        assert_eq!(sub.operations, vec![GateType::Xor]);
        assert_eq!(sub.operands, vec![vec![0, 1]]);
        assert_eq!(sub.binary_op_count, 1);
    }

    #[test]
    fn eval_patterns_round_trips_stored_key() {
        // AND3 plus a NOT: two outputs over three inputs.
        // Gate 3 = AND(0, 1), gate 4 = AND(3, 2), gate 5 = NOT(4).
        let text = "3 2 128 127 4 5 AND 0 1 AND 3 2 NOT 4\n";
        let db = CircuitDb::load_from_str(text).unwrap();
        for sub in db.subcircuits() {
            assert_eq!(sub.eval_patterns(), sub.patterns);
        }
    }

    #[test]
    fn duplicate_keys_keep_the_first_record() {
        // Second record has the same pattern but a wasteful implementation.
        let text = "2 1 6 2 XOR 0 1\n2 1 6 4 AND 0 1 OR 0 1 XOR 3 2\n";
        let db = CircuitDb::load_from_str(text).unwrap();
        assert_eq!(db.len(), 2);
        assert_eq!(db.lookup(&[6]).unwrap().gate_count(), 1);
    }

    #[test]
    fn reports_line_of_malformed_token() {
        let text = "2 1 6 2\nXOR 0 banana\n";
        let err = CircuitDb::load_from_str(text).unwrap_err();
        match err {
            LoadError::Parse { line, .. } => assert_eq!(line, 2),
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn rejects_forward_operand_references() {
        let text = "2 1 6 2 XOR 0 3\n";
        assert!(CircuitDb::load_from_str(text).is_err());
    }

    #[test]
    fn registry_reports_missing_basis() {
        let registry = DbRegistry::default();
        let err = registry.get(Basis::Aig).unwrap_err();
        assert_eq!(err.basis, Basis::Aig);
    }
}
