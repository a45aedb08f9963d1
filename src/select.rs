//! Edge selection for the delete-contract step.
//!
//! The choice of edge never changes the resulting polynomial, only the shape and
//! size of the recursion tree. All heuristics read the graph and never mutate it.

use crate::graph::Multigraph;
use crate::table::MultiplicityTable;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Types
// ============================================================================

/// Strategy for picking the next edge to delete and contract.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Heuristic {
    /// Lowest live vertex with a neighbor, paired with its lowest neighbor.
    #[default]
    VertexOrder,
    /// A vertex of minimum simple degree and its minimum-degree neighbor.
    MinimiseDegree,
    /// A vertex of maximum simple degree and its maximum-degree neighbor.
    MaximiseDegree,
    /// The edge minimising the sum of its endpoints' simple degrees.
    MinimiseSumDegree,
    /// The bundle with the highest multiplicity.
    MaximiseMultiplicity,
    /// A uniform choice derived from `seed` and the graph fingerprint.
    Random {
        /// Base seed mixed with the graph's fingerprint hash.
        seed: u64,
    },
}

impl fmt::Display for Heuristic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Heuristic::VertexOrder => f.write_str("vertex-order"),
            Heuristic::MinimiseDegree => f.write_str("min-degree"),
            Heuristic::MaximiseDegree => f.write_str("max-degree"),
            Heuristic::MinimiseSumDegree => f.write_str("min-sum-degree"),
            Heuristic::MaximiseMultiplicity => f.write_str("max-multiplicity"),
            Heuristic::Random { seed } => write!(f, "random:{seed}"),
        }
    }
}

impl FromStr for Heuristic {
    type Err = String;

    /// Parses the names printed by `Display`. `random` alone uses seed 0.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, arg) = match s.split_once(':') {
            Some((name, arg)) => (name, Some(arg)),
            None => (s, None),
        };
        let heuristic = match name {
            "vertex-order" => Heuristic::VertexOrder,
            "min-degree" => Heuristic::MinimiseDegree,
            "max-degree" => Heuristic::MaximiseDegree,
            "min-sum-degree" => Heuristic::MinimiseSumDegree,
            "max-multiplicity" => Heuristic::MaximiseMultiplicity,
            "random" => {
                let seed = match arg {
                    Some(a) => a.parse().map_err(|e| format!("bad random seed {a:?}: {e}"))?,
                    None => 0,
                };
                return Ok(Heuristic::Random { seed });
            }
            other => return Err(format!("unknown heuristic {other:?}")),
        };
        match arg {
            Some(a) => Err(format!("heuristic {name} takes no argument (got {a:?})")),
            None => Ok(heuristic),
        }
    }
}

/// The edge chosen for one delete-contract step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EdgeGroup {
    /// Surviving endpoint after contraction.
    pub u: usize,
    /// Endpoint merged into `u`.
    pub v: usize,
    /// Copies removed before contracting: the bundle size when coalescing, else 1.
    pub multiplicity: u32,
}

/// Picks edges according to a [`Heuristic`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EdgeSelector {
    /// Which edge to pick.
    pub heuristic: Heuristic,
    /// Treat a whole bundle as one group instead of peeling one copy at a time.
    pub coalesce_multiedges: bool,
}

impl Default for EdgeSelector {
    fn default() -> Self {
        Self {
            heuristic: Heuristic::default(),
            coalesce_multiedges: true,
        }
    }
}

// ============================================================================
// Selection
// ============================================================================

impl EdgeSelector {
    /// Creates a selector with coalescing on.
    pub fn new(heuristic: Heuristic) -> Self {
        Self {
            heuristic,
            coalesce_multiedges: true,
        }
    }

    /// Returns the next edge group, or `None` if `graph` has no non-loop edge.
    pub fn select<T: MultiplicityTable>(&self, graph: &Multigraph<T>) -> Option<EdgeGroup> {
        let (u, v, m) = match self.heuristic {
            Heuristic::VertexOrder => vertex_order(graph),
            Heuristic::MinimiseDegree => by_degree(graph, |a, b| a < b),
            Heuristic::MaximiseDegree => by_degree(graph, |a, b| a > b),
            Heuristic::MinimiseSumDegree => min_sum_degree(graph),
            Heuristic::MaximiseMultiplicity => proper_edges(graph).max_by_key(|&(u, v, m)| {
                // Earliest bundle wins ties.
                (m, std::cmp::Reverse((u, v)))
            }),
            Heuristic::Random { seed } => random_edge(graph, seed),
        }?;
        Some(EdgeGroup {
            u,
            v,
            multiplicity: if self.coalesce_multiedges { m } else { 1 },
        })
    }
}

/// Bundles with distinct endpoints, each once with `u < v`.
fn proper_edges<T: MultiplicityTable>(
    graph: &Multigraph<T>,
) -> impl Iterator<Item = (usize, usize, u32)> + '_ {
    graph.edges().filter(|&(u, v, _)| u != v)
}

fn vertex_order<T: MultiplicityTable>(graph: &Multigraph<T>) -> Option<(usize, usize, u32)> {
    graph.vertices().find_map(|u| {
        graph
            .neighbors(u)
            .find(|&(w, _)| w != u)
            .map(|(w, m)| (u, w, m))
    })
}

/// Picks the vertex whose simple degree is best under `better`, then its best neighbor.
fn by_degree<T, F>(graph: &Multigraph<T>, better: F) -> Option<(usize, usize, u32)>
where
    T: MultiplicityTable,
    F: Fn(usize, usize) -> bool,
{
    let mut best: Option<(usize, usize)> = None;
    for v in graph.vertices() {
        let d = graph.simple_degree(v);
        if d == 0 {
            continue;
        }
        if best.map_or(true, |(_, bd)| better(d, bd)) {
            best = Some((v, d));
        }
    }
    let (u, _) = best?;

    let mut pick: Option<(usize, u32, usize)> = None;
    for (w, m) in graph.neighbors(u) {
        if w == u {
            continue;
        }
        let d = graph.simple_degree(w);
        if pick.map_or(true, |(_, _, pd)| better(d, pd)) {
            pick = Some((w, m, d));
        }
    }
    pick.map(|(w, m, _)| (u, w, m))
}

fn min_sum_degree<T: MultiplicityTable>(graph: &Multigraph<T>) -> Option<(usize, usize, u32)> {
    let mut degree = vec![0usize; graph.domain_size()];
    for v in graph.vertices() {
        degree[v] = graph.simple_degree(v);
    }
    proper_edges(graph).min_by_key(|&(u, v, _)| (degree[u] + degree[v], u, v))
}

fn random_edge<T: MultiplicityTable>(graph: &Multigraph<T>, seed: u64) -> Option<(usize, usize, u32)> {
    let candidates: Vec<(usize, usize, u32)> = proper_edges(graph).collect();
    if candidates.is_empty() {
        return None;
    }
    let r = splitmix64(seed ^ graph.fingerprint().hash64());
    Some(candidates[(r % candidates.len() as u64) as usize])
}

/// SplitMix64 finaliser.
#[inline]
fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

// ============================================================================
// Tests
// ============================================================================
