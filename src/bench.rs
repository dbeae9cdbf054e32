// SPDX-License-Identifier: Apache-2.0

//! Reader and writer for the textual BENCH circuit format.
//!
//! The accepted grammar is line-oriented: `INPUT(name)`, `OUTPUT(name)`, and
//! `name = OP(operand, ...)` lines, with `#` starting a comment. Gate names
//! are arbitrary strings; the reader interns them to dense integer ids in
//! first-appearance order and permits forward references, so declaration
//! order in the file is unconstrained.
//!
//! The reader is intentionally strict: undefined or doubly-defined names,
//! arity mismatches, and cyclic definitions are all reported with the line
//! they occur on, so downstream passes can rely on a well-formed store.

use std::collections::HashMap;
use std::fmt;

use string_interner::backend::StringBackend;
use string_interner::symbol::SymbolU32;
use string_interner::StringInterner;

use crate::gate::{Circuit, Gate, GateId, GateType};
use crate::topo::topo_sort;

pub type NameId = SymbolU32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub line: usize,
    pub message: String,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "bench parse error at line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for ParseError {}

#[derive(Debug)]
pub struct LoadBenchResult {
    pub circuit: Circuit,
    /// Original gate names, indexed by gate id.
    pub names: Vec<String>,
}

struct SlotInfo {
    /// Line of the definition, or of the first reference while undefined.
    line: usize,
    defined: bool,
    ty: GateType,
    operands: Vec<GateId>,
}

struct Reader {
    interner: StringInterner<StringBackend<SymbolU32>>,
    slot_of: HashMap<NameId, usize>,
    slots: Vec<SlotInfo>,
    slot_names: Vec<NameId>,
    outputs: Vec<(NameId, usize)>,
}

impl Reader {
    fn new() -> Reader {
        Reader {
            interner: StringInterner::new(),
            slot_of: HashMap::new(),
            slots: Vec::new(),
            slot_names: Vec::new(),
            outputs: Vec::new(),
        }
    }

    fn slot(&mut self, name: &str, line: usize) -> usize {
        let sym = self.interner.get_or_intern(name);
        match self.slot_of.get(&sym).copied() {
            Some(slot) => slot,
            None => {
                let slot = self.slots.len();
                self.slot_of.insert(sym, slot);
                self.slots.push(SlotInfo {
                    line,
                    defined: false,
                    ty: GateType::Input,
                    operands: Vec::new(),
                });
                self.slot_names.push(sym);
                slot
            }
        }
    }

    fn define(
        &mut self,
        name: &str,
        ty: GateType,
        operands: Vec<GateId>,
        line: usize,
    ) -> Result<(), ParseError> {
        let slot = self.slot(name, line);
        if self.slots[slot].defined {
            return Err(ParseError {
                line,
                message: format!("gate '{}' is defined twice", name),
            });
        }
        let info = &mut self.slots[slot];
        info.defined = true;
        info.line = line;
        info.ty = ty;
        info.operands = operands;
        Ok(())
    }
}

/// Splits `OP(arg, arg, ...)` into the operator token and its argument list.
fn split_call(expr: &str) -> Option<(&str, Vec<&str>)> {
    let open = expr.find('(')?;
    let close = expr.rfind(')')?;
    if close != expr.len() - 1 || close < open {
        return None;
    }
    let op = expr[..open].trim();
    let inner = &expr[open + 1..close];
    let args: Vec<&str> = if inner.trim().is_empty() {
        Vec::new()
    } else {
        inner.split(',').map(str::trim).collect()
    };
    if op.is_empty() || args.iter().any(|a| a.is_empty()) {
        return None;
    }
    Some((op, args))
}

pub fn load_bench(src: &str) -> Result<LoadBenchResult, ParseError> {
    let mut reader = Reader::new();

    for (i, raw_line) in src.lines().enumerate() {
        let line_no = i + 1;
        let line = match raw_line.find('#') {
            Some(pos) => &raw_line[..pos],
            None => raw_line,
        }
        .trim();
        if line.is_empty() {
            continue;
        }

        if let Some(eq) = line.find('=') {
            let name = line[..eq].trim();
            let expr = line[eq + 1..].trim();
            if name.is_empty() {
                return Err(ParseError {
                    line: line_no,
                    message: "missing gate name before '='".to_string(),
                });
            }
            let (op, args) = split_call(expr).ok_or_else(|| ParseError {
                line: line_no,
                message: format!("malformed gate expression '{}'", expr),
            })?;
            let ty = GateType::from_token(op).ok_or_else(|| ParseError {
                line: line_no,
                message: format!("unknown operator '{}'", op),
            })?;
            if ty == GateType::Input {
                return Err(ParseError {
                    line: line_no,
                    message: "INPUT is declared as INPUT(name), not assigned".to_string(),
                });
            }
            if args.len() != ty.arity() {
                return Err(ParseError {
                    line: line_no,
                    message: format!(
                        "operator {} takes {} operands, got {}",
                        ty,
                        ty.arity(),
                        args.len()
                    ),
                });
            }
            let operands: Vec<GateId> = args
                .iter()
                .map(|a| GateId {
                    id: reader.slot(a, line_no),
                })
                .collect();
            reader.define(name, ty, operands, line_no)?;
        } else {
            let (op, args) = split_call(line).ok_or_else(|| ParseError {
                line: line_no,
                message: format!("unrecognised line '{}'", line),
            })?;
            if args.len() != 1 {
                return Err(ParseError {
                    line: line_no,
                    message: format!("{} takes exactly one name", op.to_ascii_uppercase()),
                });
            }
            if op.eq_ignore_ascii_case("INPUT") {
                reader.define(args[0], GateType::Input, Vec::new(), line_no)?;
            } else if op.eq_ignore_ascii_case("OUTPUT") {
                let sym = reader.interner.get_or_intern(args[0]);
                reader.outputs.push((sym, line_no));
            } else {
                return Err(ParseError {
                    line: line_no,
                    message: format!("unrecognised declaration '{}'", op),
                });
            }
        }
    }

    // Every referenced name must have been defined by now.
    for (slot, info) in reader.slots.iter().enumerate() {
        if !info.defined {
            let name = reader
                .interner
                .resolve(reader.slot_names[slot])
                .unwrap_or("<unknown>");
            return Err(ParseError {
                line: info.line,
                message: format!("gate '{}' is referenced but never defined", name),
            });
        }
    }

    let gates: Vec<Gate> = reader
        .slots
        .iter()
        .map(|info| Gate {
            ty: info.ty,
            operands: info.operands.clone(),
        })
        .collect();
    let mut outputs = Vec::with_capacity(reader.outputs.len());
    for &(sym, line) in &reader.outputs {
        let slot = reader.slot_of.get(&sym).copied().ok_or_else(|| ParseError {
            line,
            message: "output names an undefined gate".to_string(),
        })?;
        outputs.push(GateId { id: slot });
    }

    let circuit = Circuit::from_parts(gates, outputs).map_err(|e| ParseError {
        line: 0,
        message: e.to_string(),
    })?;
    if let Err(e) = topo_sort(&circuit) {
        let name = reader
            .interner
            .resolve(reader.slot_names[e.gate.id])
            .unwrap_or("<unknown>");
        return Err(ParseError {
            line: reader.slots[e.gate.id].line,
            message: format!("definition of '{}' is cyclic", name),
        });
    }

    let names: Vec<String> = reader
        .slot_names
        .iter()
        .map(|&sym| reader.interner.resolve(sym).unwrap_or_default().to_string())
        .collect();
    log::debug!(
        "bench: loaded {} gates, {} outputs",
        circuit.gate_count(),
        circuit.outputs().len()
    );
    Ok(LoadBenchResult { circuit, names })
}

/// Writes the circuit back out in BENCH syntax with generated `n{id}` names
/// (passes renumber gates, so original names do not survive simplification).
pub fn emit_bench(circuit: &Circuit) -> String {
    let mut out = String::new();
    for g in circuit.ids() {
        if circuit.gate_type(g) == GateType::Input {
            out.push_str(&format!("INPUT(n{})\n", g.id));
        }
    }
    for o in circuit.outputs() {
        out.push_str(&format!("OUTPUT(n{})\n", o.id));
    }
    for g in circuit.ids() {
        let ty = circuit.gate_type(g);
        if ty == GateType::Input {
            continue;
        }
        let operands: Vec<String> = circuit
            .operands(g)
            .iter()
            .map(|op| format!("n{}", op.id))
            .collect();
        out.push_str(&format!("n{} = {}({})\n", g.id, ty, operands.join(", ")));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::output_patterns;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_forward_references_and_comments() {
        let src = "\
# tiny example
OUTPUT(k)
k = XOR(g, h)   # apex
INPUT(a)
INPUT(b)
g = AND(a, b)
h = OR(a, b)
";
        let result = load_bench(src).unwrap();
        assert_eq!(result.circuit.gate_count(), 5);
        assert_eq!(result.circuit.outputs().len(), 1);
        let apex = result.circuit.outputs()[0];
        assert_eq!(result.names[apex.id], "k");
        assert_eq!(output_patterns(&result.circuit), vec![0b0110]);
    }

    #[test]
    fn round_trips_through_emit() {
        let src = "INPUT(a)\nINPUT(b)\nOUTPUT(o)\no = NAND(a, b)\n";
        let first = load_bench(src).unwrap();
        let emitted = emit_bench(&first.circuit);
        let second = load_bench(&emitted).unwrap();
        assert_eq!(
            output_patterns(&first.circuit),
            output_patterns(&second.circuit)
        );
    }

    #[test]
    fn undefined_reference_is_an_error() {
        let err = load_bench("INPUT(a)\nOUTPUT(g)\ng = AND(a, ghost)\n").unwrap_err();
        assert_eq!(err.line, 3);
        assert!(err.message.contains("ghost"));
    }

    #[test]
    fn arity_mismatch_is_an_error() {
        let err = load_bench("INPUT(a)\nINPUT(b)\nINPUT(c)\ng = AND(a, b, c)\n").unwrap_err();
        assert_eq!(err.line, 4);
        assert!(err.message.contains("2 operands"));
    }

    #[test]
    fn double_definition_is_an_error() {
        let err = load_bench("INPUT(a)\na = NOT(a)\n").unwrap_err();
        assert_eq!(err.line, 2);
    }

    #[test]
    fn cyclic_definitions_are_rejected() {
        let err = load_bench("INPUT(a)\ng = AND(a, h)\nh = NOT(g)\nOUTPUT(h)\n").unwrap_err();
        assert!(err.message.contains("cyclic"));
    }

    #[test]
    fn mux_parses_with_three_operands() {
        let src = "INPUT(s)\nINPUT(a)\nINPUT(b)\nOUTPUT(m)\nm = MUX(s, a, b)\n";
        let result = load_bench(src).unwrap();
        let m = result.circuit.outputs()[0];
        assert_eq!(result.circuit.gate_type(m), GateType::Mux);
    }
}
