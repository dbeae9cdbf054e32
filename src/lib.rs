// SPDX-License-Identifier: Apache-2.0

pub mod bench;
pub mod circuit_db;
pub mod const_fold;
pub mod db_rewrite;
pub mod dce;
pub mod dedupe;
pub mod gate;
pub mod sim;
pub mod simplify;
pub mod three_coloring;
pub mod topo;
pub mod two_coloring;
