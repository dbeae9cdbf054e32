// SPDX-License-Identifier: Apache-2.0

//! Orchestration of one simplification run: cleanup passes, the colorings,
//! the database rewrite, and the final sweep. The database registry is an
//! explicit handle; the run fails with a configuration error before touching
//! the circuit if the requested basis has no database.

use std::fmt;

use crate::circuit_db::{Basis, DbRegistry, MissingDb};
use crate::const_fold::const_fold;
use crate::db_rewrite::{rewrite_three_color_cones, rewrite_two_color_cones, RewriteStats};
use crate::dce::dce;
use crate::dedupe::dedupe;
use crate::gate::{Circuit, StoreError};
use crate::three_coloring::{NonBinaryGate, ThreeColoring};
use crate::topo::{topo_sort, CycleError};
use crate::two_coloring::TwoColoring;

#[derive(Debug, Clone, Copy)]
pub struct SimplifyOptions {
    pub basis: Basis,
    /// When false, only pair-bounded cones are rewritten.
    pub enable_three_coloring: bool,
    /// Smallest number of gates a cone must contain to be considered.
    pub min_cone_size: usize,
}

impl Default for SimplifyOptions {
    fn default() -> Self {
        SimplifyOptions {
            basis: Basis::Bench,
            enable_three_coloring: true,
            min_cone_size: 2,
        }
    }
}

#[derive(Debug)]
pub enum SimplifyError {
    /// Missing database for the requested basis.
    Config(MissingDb),
    /// The circuit violates a structural invariant (cycle, non-binary gate,
    /// corrupt reference). Indicates a bug or corrupted input.
    Invariant(String),
}

impl fmt::Display for SimplifyError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SimplifyError::Config(e) => write!(f, "{}", e),
            SimplifyError::Invariant(msg) => write!(f, "invariant violation: {}", msg),
        }
    }
}

impl std::error::Error for SimplifyError {}

impl From<MissingDb> for SimplifyError {
    fn from(e: MissingDb) -> Self {
        SimplifyError::Config(e)
    }
}

impl From<CycleError> for SimplifyError {
    fn from(e: CycleError) -> Self {
        SimplifyError::Invariant(e.to_string())
    }
}

impl From<NonBinaryGate> for SimplifyError {
    fn from(e: NonBinaryGate) -> Self {
        SimplifyError::Invariant(e.to_string())
    }
}

impl From<StoreError> for SimplifyError {
    fn from(e: StoreError) -> Self {
        SimplifyError::Invariant(e.to_string())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SimplifyReport {
    pub initial_gates: usize,
    pub final_gates: usize,
    pub folded: usize,
    pub merged: usize,
    pub swept: usize,
    pub rewrite: RewriteStats,
}

/// Runs cleanup and one database-rewrite round over `circuit`, returning the
/// simplified replacement and a report. An empty transformation (no database
/// hits) is success, not an error.
pub fn simplify(
    circuit: Circuit,
    registry: &DbRegistry,
    options: &SimplifyOptions,
) -> Result<(Circuit, SimplifyReport), SimplifyError> {
    let db = registry.get(options.basis)?;
    // The colorings are only defined over the binary basis; reject wider
    // gates up front rather than partway through a mutation.
    for g in circuit.ids() {
        if circuit.operands(g).len() > 2 {
            return Err(NonBinaryGate { gate: g }.into());
        }
    }
    let mut report = SimplifyReport {
        initial_gates: circuit.gate_count(),
        ..SimplifyReport::default()
    };

    // Cleanup first: constant folding and duplicate removal give the
    // colorings a canonical circuit, and the compaction keeps ids dense.
    let mut circuit = circuit;
    report.folded += const_fold(&mut circuit)?;
    report.merged += dedupe(&mut circuit)?;
    let swept = dce(&circuit);
    report.swept += swept.swept;
    circuit = swept.circuit;

    if options.enable_three_coloring {
        let order = topo_sort(&circuit)?;
        let two = TwoColoring::build(&circuit, &order);
        let three = ThreeColoring::build(&circuit, &order, &two)?;
        log::info!(
            "three-coloring: {} colors over {} gates",
            three.color_count(),
            circuit.gate_count()
        );
        report.rewrite.absorb(rewrite_three_color_cones(
            &mut circuit,
            &db,
            &three,
            &order,
            options.min_cone_size,
        )?);
        let swept = dce(&circuit);
        report.swept += swept.swept;
        circuit = swept.circuit;
    }

    // Pair cones run on the (possibly already rewritten) circuit with fresh
    // colorings.
    let order = topo_sort(&circuit)?;
    let two = TwoColoring::build(&circuit, &order);
    log::info!(
        "two-coloring: {} colors over {} gates",
        two.color_count(),
        circuit.gate_count()
    );
    report.rewrite.absorb(rewrite_two_color_cones(
        &mut circuit,
        &db,
        &two,
        &order,
        options.min_cone_size,
    )?);

    // Final sweep: splices leave superseded cones unreachable, and fresh
    // gates may duplicate survivors.
    report.merged += dedupe(&mut circuit)?;
    let swept = dce(&circuit);
    report.swept += swept.swept;
    circuit = swept.circuit;

    report.final_gates = circuit.gate_count();
    log::info!(
        "simplify: {} -> {} gates (replaced {} cones)",
        report.initial_gates,
        report.final_gates,
        report.rewrite.cones_replaced
    );
    Ok((circuit, report))
}
