// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use simpl8r::bench::{emit_bench, load_bench};
use simpl8r::circuit_db::{Basis, DbRegistry, LoadError};
use simpl8r::simplify::{simplify, SimplifyError, SimplifyOptions};

const EXIT_BAD_ARGS: i32 = 1;
const EXIT_MISSING_DB: i32 = 2;
const EXIT_PARSE_ERROR: i32 = 3;
const EXIT_INVARIANT: i32 = 4;

/// Simplifies a combinational BENCH circuit against a database of optimal
/// subcircuits.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// The gate basis the circuit (and database) is expressed in.
    #[arg(long, default_value = "bench")]
    basis: Basis,

    /// Directory holding the per-basis database files (aig_db.txt,
    /// bench_db.txt).
    #[arg(long)]
    db_dir: PathBuf,

    /// Whether to rewrite triple-bounded cones (three-coloring).
    #[arg(long, default_value_t = true)]
    #[arg(action = clap::ArgAction::Set)]
    enable_three_coloring: bool,

    /// Smallest cone (in gates) worth submitting to the database.
    #[arg(long, default_value_t = 2)]
    min_cone_size: usize,

    /// Where to write the simplified circuit; stdout when omitted.
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// The path to the BENCH circuit file.
    input: PathBuf,
}

struct Failure {
    code: i32,
    error: anyhow::Error,
}

fn fail(code: i32, error: anyhow::Error) -> Failure {
    Failure { code, error }
}

fn run(args: &Args) -> Result<(), Failure> {
    if args.min_cone_size < 2 {
        return Err(fail(
            EXIT_BAD_ARGS,
            anyhow::anyhow!("--min-cone-size must be at least 2"),
        ));
    }

    let registry = DbRegistry::load_from_dir(&args.db_dir).map_err(|e| {
        let code = match e {
            LoadError::Io(_) => EXIT_MISSING_DB,
            LoadError::Parse { .. } => EXIT_PARSE_ERROR,
        };
        fail(code, anyhow::Error::new(e).context("loading database directory"))
    })?;

    let src = std::fs::read_to_string(&args.input).map_err(|e| {
        fail(
            EXIT_PARSE_ERROR,
            anyhow::Error::new(e).context(format!("reading {}", args.input.display())),
        )
    })?;
    let loaded = load_bench(&src).map_err(|e| {
        fail(
            EXIT_PARSE_ERROR,
            anyhow::Error::new(e).context(format!("parsing {}", args.input.display())),
        )
    })?;

    let options = SimplifyOptions {
        basis: args.basis,
        enable_three_coloring: args.enable_three_coloring,
        min_cone_size: args.min_cone_size,
    };
    let (simplified, report) = simplify(loaded.circuit, &registry, &options).map_err(|e| {
        let code = match e {
            SimplifyError::Config(_) => EXIT_MISSING_DB,
            SimplifyError::Invariant(_) => EXIT_INVARIANT,
        };
        fail(code, anyhow::Error::new(e))
    })?;

    log::info!(
        "{}: {} -> {} gates",
        args.input.display(),
        report.initial_gates,
        report.final_gates
    );
    let text = emit_bench(&simplified);
    match &args.output {
        Some(path) => std::fs::write(path, text)
            .with_context(|| format!("writing {}", path.display()))
            .map_err(|e| fail(EXIT_BAD_ARGS, e))?,
        None => print!("{}", text),
    }
    Ok(())
}

fn main() {
    let _ = env_logger::builder().try_init();
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            std::process::exit(EXIT_BAD_ARGS);
        }
    };
    if let Err(failure) = run(&args) {
        eprintln!("error: {:#}", failure.error);
        std::process::exit(failure.code);
    }
}
