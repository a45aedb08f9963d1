//! # Tutte Polynomial Engine
//!
//! Computes the Tutte polynomial `T(G; X, Y)` of undirected multigraphs with loops.
//!
//! This crate provides:
//! - A bit-packed multigraph with O(1) multiplicity lookup, word-skipping row scans
//!   and a live-vertex list, so contraction never renumbers vertices.
//! - Structural recognition of forests, single (multi)cycles and blocks via an
//!   iterative Hopcroft–Tarjan decomposition.
//! - A delete-contract solver that strips loops, splits at articulation points,
//!   applies closed forms to bridges and cycles, and memoizes intermediate results
//!   in a concurrent cache with a memory budget.
//! - Arbitrary-precision, lazily factored polynomial arithmetic.
//!
//! ## Quick Start
//!
//! ```
//! use tutte::prelude::*;
//!
//! // Triangle with one doubled edge.
//! let g: Multigraph = Multigraph::from_weighted_edges([(0, 1, 1), (1, 2, 1), (2, 0, 2)]);
//! let t = tutte(g).unwrap().expand();
//! assert_eq!(t.to_string(), "X^2 + X*Y + X + Y^2 + Y");
//! ```
//!
//! ## Tuning a Solve
//!
//! ```
//! use tutte::prelude::*;
//!
//! let solver = Solver::new(SolverConfig {
//!     selector: EdgeSelector::new(Heuristic::MinimiseSumDegree),
//!     parallel: true,
//!     ..Default::default()
//! });
//! let ctx = SolveContext::new(CacheConfig::default());
//!
//! let k4 = parse_edge_list("0 1  0 2  0 3  1 2  1 3  2 3").unwrap();
//! let t = solver.solve(k4, &ctx).unwrap().expand();
//!
//! // T(1, 1) is the coefficient sum: the spanning trees of K4.
//! let trees: num_bigint::BigUint = t.terms().map(|(_, _, c)| c).sum();
//! assert_eq!(trees.to_string(), "16");
//! ```
//!
//! ## Modules
//!
//! - [`table`]: Multiplicity storage (packed and dense).
//! - [`graph`]: The multigraph, its fingerprint and construction helpers.
//! - [`structure`]: Forest, cycle and block recognition.
//! - [`poly`]: Expanded and factored polynomials.
//! - [`select`]: Edge-selection heuristics for delete-contract.
//! - [`cache`]: Memoization with probabilistic eviction.
//! - [`solver`]: The solver, its configuration and statistics.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::similar_names)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::inline_always)] // Intentional for hot-path code
#![allow(clippy::many_single_char_names)] // Graph notation: u, v, w, m
#![allow(clippy::needless_range_loop)] // Often clearer for matrix indexing
#![allow(clippy::doc_markdown)]
#![allow(clippy::multiple_crate_versions)] // Cargo.lock management is external

pub mod cache;
pub mod error;
pub mod graph;
pub mod poly;
pub mod select;
pub mod solver;
pub mod structure;
pub mod table;

/// Re-export commonly used types for convenience.
pub mod prelude {
    pub use crate::cache::{CacheConfig, CacheStats, MemoCache};
    pub use crate::error::{GraphError, SolveError};
    pub use crate::graph::{parse_edge_list, Fingerprint, Multigraph};
    pub use crate::poly::{FactoredPolynomial, Polynomial};
    pub use crate::select::{EdgeGroup, EdgeSelector, Heuristic};
    pub use crate::solver::{tutte, SolveContext, Solver, SolverConfig, SolverStats};
    pub use crate::table::{DenseTable, MultiplicityTable, PackedTable};
}
