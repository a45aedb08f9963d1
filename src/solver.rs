//! Tutte polynomial solver: loop stripping, structural reductions, memoization and
//! delete-contract.
//!
//! Each call to [`Solver::solve`] owns its graph. Branches clone it, so sibling
//! subproblems never share mutable state and can run on different rayon workers.
//! Shared state lives in a [`SolveContext`] (the cache and the counters) and is
//! only ever touched through atomics and the concurrent map.
//!
//! Per-call flow:
//! 1. Strip self-loops (a factor `Y^L`, never cached).
//! 2. Probe the cache if the graph is large enough and not forest-like.
//! 3. Classify: single cycle (closed form), not biconnected (split into blocks over
//!    a bridge product), or general (delete-contract on a selected edge group).
//! 4. Store the loop-free value under the step 2 key and multiply by `Y^L`.

use crate::cache::{CacheConfig, CacheStats, MemoCache};
use crate::error::SolveError;
use crate::graph::Multigraph;
use crate::poly::FactoredPolynomial;
use crate::select::EdgeSelector;
use crate::table::{DenseTable, MultiplicityTable};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

// ============================================================================
// Configuration
// ============================================================================

/// Solver parameters.
#[derive(Clone, Debug)]
pub struct SolverConfig {
    /// How delete-contract picks its edge group.
    pub selector: EdgeSelector,
    /// Recognise single (multi)cycles and use their closed form.
    pub reduce_multicycles: bool,
    /// Run delete and contract branches on the rayon pool.
    pub parallel: bool,
    /// Smallest edge count for which branches are forked instead of run inline.
    pub parallel_min_edges: usize,
    /// Abort with [`SolveError::Aborted`] once this much time has passed.
    pub deadline: Option<Duration>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            selector: EdgeSelector::default(),
            reduce_multicycles: true,
            parallel: false,
            parallel_min_edges: 12,
            deadline: None,
        }
    }
}

// ============================================================================
// Context and statistics
// ============================================================================

/// Counters snapshot for one [`SolveContext`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SolverStats {
    /// Recursive solve calls.
    pub calls: u64,
    /// Self-loops stripped on entry.
    pub loops_stripped: u64,
    /// Single-cycle closed forms applied.
    pub cycles: u64,
    /// Graphs split at articulation points.
    pub decompositions: u64,
    /// Blocks extracted by those splits.
    pub blocks: u64,
    /// Bridge bundles multiplied in by forest products.
    pub bridges: u64,
    /// Delete-contract steps.
    pub delete_contract: u64,
    /// Deepest recursion reached.
    pub max_depth: usize,
    /// Cache counters.
    pub cache: CacheStats,
}

impl fmt::Display for SolverStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "calls:            {}", self.calls)?;
        writeln!(f, "max depth:        {}", self.max_depth)?;
        writeln!(f, "delete-contract:  {}", self.delete_contract)?;
        writeln!(f, "cycle forms:      {}", self.cycles)?;
        writeln!(
            f,
            "decompositions:   {} ({} blocks, {} bridges)",
            self.decompositions, self.blocks, self.bridges
        )?;
        writeln!(f, "loops stripped:   {}", self.loops_stripped)?;
        write!(
            f,
            "cache:            {} accesses, {} hits, {} misses, {} entries, {} evicted in {} passes",
            self.cache.accesses,
            self.cache.hits,
            self.cache.misses,
            self.cache.entries,
            self.cache.evicted,
            self.cache.eviction_passes
        )
    }
}

#[derive(Debug, Default)]
struct Counters {
    calls: AtomicU64,
    loops_stripped: AtomicU64,
    cycles: AtomicU64,
    decompositions: AtomicU64,
    blocks: AtomicU64,
    bridges: AtomicU64,
    delete_contract: AtomicU64,
    max_depth: AtomicUsize,
}

#[inline]
fn bump(counter: &AtomicU64, by: u64) {
    counter.fetch_add(by, Ordering::Relaxed);
}

/// Shared state for one or more solves: the memo cache and the counters.
///
/// Reusing a context across solves keeps the cache warm.
#[derive(Debug, Default)]
pub struct SolveContext {
    cache: MemoCache,
    counters: Counters,
}

impl SolveContext {
    /// Creates a context with a fresh cache.
    pub fn new(cache: CacheConfig) -> Self {
        Self {
            cache: MemoCache::new(cache),
            counters: Counters::default(),
        }
    }

    /// The memo cache.
    pub fn cache(&self) -> &MemoCache {
        &self.cache
    }

    /// Snapshot of all counters.
    pub fn stats(&self) -> SolverStats {
        let c = &self.counters;
        SolverStats {
            calls: c.calls.load(Ordering::Relaxed),
            loops_stripped: c.loops_stripped.load(Ordering::Relaxed),
            cycles: c.cycles.load(Ordering::Relaxed),
            decompositions: c.decompositions.load(Ordering::Relaxed),
            blocks: c.blocks.load(Ordering::Relaxed),
            bridges: c.bridges.load(Ordering::Relaxed),
            delete_contract: c.delete_contract.load(Ordering::Relaxed),
            max_depth: c.max_depth.load(Ordering::Relaxed),
            cache: self.cache.stats(),
        }
    }
}

// ============================================================================
// Solver
// ============================================================================

/// Computes Tutte polynomials under a fixed [`SolverConfig`].
#[derive(Clone, Debug, Default)]
pub struct Solver {
    config: SolverConfig,
}

impl Solver {
    /// Creates a solver.
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }

    /// The configuration in use.
    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Computes the Tutte polynomial of `graph`.
    ///
    /// Contraction merges bundles, and no merged bundle can exceed the total edge
    /// count. A graph with more edges than its table's cell capacity is therefore
    /// solved on a [`DenseTable`] copy.
    ///
    /// # Errors
    /// Returns [`SolveError::Aborted`] if the configured deadline passes. Nothing
    /// computed by unfinished frames is cached. Returns
    /// [`SolveError::CapacityExceeded`] if the graph is too large even for a
    /// [`DenseTable`].
    pub fn solve<T: MultiplicityTable>(
        &self,
        graph: Multigraph<T>,
        ctx: &SolveContext,
    ) -> Result<FactoredPolynomial, SolveError> {
        let edges = graph.num_edges();
        if edges <= T::MAX_MULTIPLICITY as usize {
            return self.run(graph, ctx);
        }
        if edges > DenseTable::MAX_MULTIPLICITY as usize {
            return Err(SolveError::CapacityExceeded {
                edges,
                capacity: DenseTable::MAX_MULTIPLICITY,
            });
        }
        debug!(
            edges,
            capacity = T::MAX_MULTIPLICITY,
            "edge count exceeds cell capacity; solving on a dense table"
        );
        self.run(graph.to_table::<DenseTable>(), ctx)
    }

    fn run<T: MultiplicityTable>(
        &self,
        graph: Multigraph<T>,
        ctx: &SolveContext,
    ) -> Result<FactoredPolynomial, SolveError> {
        let started = Instant::now();
        let run = Run {
            config: &self.config,
            ctx,
            started,
            deadline: self.config.deadline.map(|d| started + d),
        };
        debug!(
            vertices = graph.num_vertices(),
            edges = graph.num_edges(),
            heuristic = %self.config.selector.heuristic,
            parallel = self.config.parallel,
            "solve started"
        );
        let result = run.solve(graph, 0);
        debug!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            "solve finished"
        );
        result
    }
}

/// Computes the Tutte polynomial with the default configuration and a fresh context.
///
/// # Errors
/// The default configuration has no deadline, so this only mirrors [`Solver::solve`].
pub fn tutte<T: MultiplicityTable>(graph: Multigraph<T>) -> Result<FactoredPolynomial, SolveError> {
    Solver::default().solve(graph, &SolveContext::default())
}

/// One solve in progress.
struct Run<'a> {
    config: &'a SolverConfig,
    ctx: &'a SolveContext,
    started: Instant,
    deadline: Option<Instant>,
}

impl Run<'_> {
    fn check_deadline(&self) -> Result<(), SolveError> {
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(SolveError::Aborted {
                elapsed: self.started.elapsed(),
            }),
            _ => Ok(()),
        }
    }

    fn solve<T: MultiplicityTable>(
        &self,
        mut g: Multigraph<T>,
        depth: usize,
    ) -> Result<FactoredPolynomial, SolveError> {
        self.check_deadline()?;
        let counters = &self.ctx.counters;
        bump(&counters.calls, 1);
        counters.max_depth.fetch_max(depth, Ordering::Relaxed);

        let loops = g.strip_loops();
        bump(&counters.loops_stripped, loops as u64);
        let loop_factor = FactoredPolynomial::y(loops as u32);

        let key = (self.ctx.cache.admits(g.num_vertices()) && !g.is_forest_like())
            .then(|| g.fingerprint());
        if let Some(key) = &key {
            if let Some(hit) = self.ctx.cache.get(key) {
                trace!(depth, vertices = g.num_vertices(), "cache hit");
                return Ok(hit.times_copy(&loop_factor));
            }
        }

        let value = self.classify(g, depth)?;
        if let Some(key) = key {
            self.ctx.cache.add(key, &value);
        }
        Ok(value.times_copy(&loop_factor))
    }

    /// Solves a loop-free graph.
    fn classify<T: MultiplicityTable>(
        &self,
        mut g: Multigraph<T>,
        depth: usize,
    ) -> Result<FactoredPolynomial, SolveError> {
        if self.config.reduce_multicycles {
            if let Some(bundles) = g.cycle_bundles() {
                bump(&self.ctx.counters.cycles, 1);
                trace!(depth, length = bundles.len(), "cycle closed form");
                return Ok(cycle_polynomial(&bundles));
            }
        }

        if !g.is_biconnected() {
            let blocks = g.extract_biconnected_components();
            let (product, bridges) = forest_product_counted(&g);
            let counters = &self.ctx.counters;
            bump(&counters.decompositions, 1);
            bump(&counters.blocks, blocks.len() as u64);
            bump(&counters.bridges, bridges as u64);
            debug!(depth, blocks = blocks.len(), bridges, "split at articulation points");

            let parts = if self.config.parallel && blocks.len() > 1 {
                blocks
                    .into_par_iter()
                    .map(|block| self.solve_block(block, depth))
                    .collect::<Result<Vec<_>, _>>()?
            } else {
                blocks
                    .into_iter()
                    .map(|block| self.solve_block(block, depth))
                    .collect::<Result<Vec<_>, _>>()?
            };
            let mut result = product;
            for part in &parts {
                result.times(part);
            }
            return Ok(result);
        }

        self.delete_contract(g, depth)
    }

    fn solve_block<T: MultiplicityTable>(
        &self,
        block: Multigraph<T>,
        depth: usize,
    ) -> Result<FactoredPolynomial, SolveError> {
        if self.config.reduce_multicycles {
            if let Some(bundles) = block.cycle_bundles() {
                bump(&self.ctx.counters.cycles, 1);
                return Ok(cycle_polynomial(&bundles));
            }
        }
        self.solve(block, depth + 1)
    }

    fn delete_contract<T: MultiplicityTable>(
        &self,
        g: Multigraph<T>,
        depth: usize,
    ) -> Result<FactoredPolynomial, SolveError> {
        let Some(group) = self.config.selector.select(&g) else {
            return Ok(FactoredPolynomial::one());
        };
        bump(&self.ctx.counters.delete_contract, 1);
        let (u, v, m) = (group.u, group.v, group.multiplicity);

        let mut contracted = g.clone();
        contracted.remove_edge(u, v, m)?;
        contracted.contract_edge(u, v)?;
        let mut deleted = g;
        deleted.remove_edge(u, v, 1)?;
        trace!(depth, u, v, multiplicity = m, edges = deleted.num_edges(), "delete-contract");

        let (deleted, contracted) =
            if self.config.parallel && deleted.num_edges() >= self.config.parallel_min_edges {
                let (d, c) = rayon::join(
                    || self.solve(deleted, depth + 1),
                    || self.solve(contracted, depth + 1),
                );
                (d?, c?)
            } else {
                let d = self.solve(deleted, depth + 1)?;
                let c = self.solve(contracted, depth + 1)?;
                (d, c)
            };

        let mut result = deleted;
        let mut contracted = contracted;
        if m > 1 {
            contracted.times(&FactoredPolynomial::y(m - 1));
        }
        result.add(&contracted);
        Ok(result)
    }
}

// ============================================================================
// Closed forms
// ============================================================================

/// `B(m) = X + Y + … + Y^(m-1)`: the Tutte polynomial of a bundle of `m` parallel
/// edges between two vertices. `B(1) = X`.
pub fn bridge_polynomial(m: u32) -> FactoredPolynomial {
    let mut b = FactoredPolynomial::x(1);
    b.add(&FactoredPolynomial::y_range(1, m.saturating_sub(1)));
    b
}

/// `G(m) = 1 + Y + … + Y^(m-1)`.
fn geometric(m: u32) -> FactoredPolynomial {
    FactoredPolynomial::y_range(0, m.saturating_sub(1))
}

/// Product of [`bridge_polynomial`] over every non-loop bundle of `g`.
///
/// Exact for forest-like graphs without loops.
pub fn forest_product<T: MultiplicityTable>(g: &Multigraph<T>) -> FactoredPolynomial {
    forest_product_counted(g).0
}

fn forest_product_counted<T: MultiplicityTable>(g: &Multigraph<T>) -> (FactoredPolynomial, usize) {
    let mut shared: BTreeMap<u32, FactoredPolynomial> = BTreeMap::new();
    let mut result = FactoredPolynomial::one();
    let mut bridges = 0;
    for (_, _, m) in g.edges().filter(|&(u, v, _)| u != v) {
        let b = shared.entry(m).or_insert_with(|| bridge_polynomial(m));
        result.times(b);
        bridges += 1;
    }
    (result, bridges)
}

/// Tutte polynomial of a cycle whose consecutive bundles have multiplicities `bundles`
/// (at least three of them).
///
/// With `B` and `G` as above and `b_0 … b_(k-1)` in cyclic order:
///
/// ```text
/// acc = partial = B(b_0)
/// for i in 1..k-1:  partial = partial·G(b_(i+1)) + acc·B(b_i);  acc = acc·B(b_i)
/// T = partial + Y^(b_0) · G(b_1) ⋯ G(b_(k-1))
/// ```
///
/// With all bundles simple this is `X^(k-1) + … + X + Y`.
pub fn cycle_polynomial(bundles: &[u32]) -> FactoredPolynomial {
    let k = bundles.len();
    debug_assert!(k >= 3, "a cycle needs at least three bundles, got {k}");

    let mut acc = bridge_polynomial(bundles[0]);
    let mut partial = acc.clone();
    for i in 1..k - 1 {
        if bundles[i + 1] > 1 {
            partial.times(&geometric(bundles[i + 1]));
        }
        acc.times(&bridge_polynomial(bundles[i]));
        partial.add(&acc);
    }

    let mut loop_term = FactoredPolynomial::y(bundles[0]);
    for &m in &bundles[1..] {
        if m > 1 {
            loop_term.times(&geometric(m));
        }
    }
    partial.add(&loop_term);
    partial
}

// ============================================================================
// Tests
// ============================================================================
