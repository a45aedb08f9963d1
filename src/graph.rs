//! Undirected multigraph over a fixed vertex domain, plus construction and parsing helpers.
//!
//! Representation:
//! - `table` holds the symmetric multiplicity matrix (see [`crate::table`]).
//! - The live vertices form a doubly linked list threaded through `next`/`prev`, mirrored
//!   by the `live` bitset, so traversal costs O(live) regardless of the domain size.
//! - `num_edges` counts every parallel copy (a loop cell counts once per copy);
//!   `num_distinct_edges` counts non-zero cells with `u <= v`.
//!
//! Vertex ids are never reused. A cleared vertex stays out of the graph for its whole
//! lifetime; clone the graph to branch.

use crate::error::GraphError;
use crate::table::{MultiplicityTable, PackedTable};
use rand::Rng;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};

const NIL: usize = usize::MAX;

#[inline(always)]
const fn bit(v: usize) -> u64 {
    1u64 << (v % 64)
}

// ============================================================================
// Multigraph
// ============================================================================

/// An undirected multigraph with loops, backed by a [`MultiplicityTable`].
#[derive(Clone)]
pub struct Multigraph<T: MultiplicityTable = PackedTable> {
    table: T,
    next: Vec<usize>,
    prev: Vec<usize>,
    head: usize,
    live: Vec<u64>,
    num_vertices: usize,
    num_edges: usize,
    num_distinct_edges: usize,
}

impl Multigraph {
    /// Creates an edgeless graph on vertices `0..domain` using the packed table.
    pub fn new(domain: usize) -> Self {
        Self::with_domain(domain)
    }
}

impl<T: MultiplicityTable> Multigraph<T> {
    /// Creates an edgeless graph on vertices `0..domain` with any table type.
    pub fn with_domain(domain: usize) -> Self {
        let mut next = vec![NIL; domain];
        let mut prev = vec![NIL; domain];
        for v in 0..domain {
            if v + 1 < domain {
                next[v] = v + 1;
            }
            if v > 0 {
                prev[v] = v - 1;
            }
        }
        let mut live = vec![0u64; domain.div_ceil(64)];
        for v in 0..domain {
            live[v / 64] |= bit(v);
        }
        Self {
            table: T::new(domain),
            next,
            prev,
            head: if domain == 0 { NIL } else { 0 },
            live,
            num_vertices: domain,
            num_edges: 0,
            num_distinct_edges: 0,
        }
    }

    /// Builds a graph from an edge list over arbitrary labels.
    ///
    /// Labels are mapped to dense ids `0..n` in order of first appearance.
    pub fn from_edges<L, I>(edges: I) -> Self
    where
        L: Eq + Hash,
        I: IntoIterator<Item = (L, L)>,
    {
        Self::from_weighted_edges(edges.into_iter().map(|(a, b)| (a, b, 1)))
    }

    /// Builds a graph from `(from, to, multiplicity)` triples over arbitrary labels.
    ///
    /// # Panics
    /// Panics if an accumulated multiplicity overflows the table's cell capacity.
    pub fn from_weighted_edges<L, I>(edges: I) -> Self
    where
        L: Eq + Hash,
        I: IntoIterator<Item = (L, L, u32)>,
    {
        let mut ids: HashMap<L, usize> = HashMap::new();
        let mut dense = Vec::new();
        for (a, b, m) in edges {
            let next_id = ids.len();
            let u = *ids.entry(a).or_insert(next_id);
            let next_id = ids.len();
            let v = *ids.entry(b).or_insert(next_id);
            dense.push((u, v, m));
        }
        let mut g = Self::with_domain(ids.len());
        for (u, v, m) in dense {
            g.link(u, v, m);
        }
        g
    }

    /// Generates a random multigraph on `vertices` vertices with `edges` edge bundles, each
    /// of multiplicity `1..=max_multiplicity`. Endpoints are uniform, so loops and repeated
    /// bundles occur.
    ///
    /// # Panics
    /// Panics if `edges > 0` while `vertices` or `max_multiplicity` is zero.
    pub fn random<R: Rng>(rng: &mut R, vertices: usize, edges: usize, max_multiplicity: u32) -> Self {
        assert!(
            edges == 0 || (vertices > 0 && max_multiplicity > 0),
            "cannot place {edges} edges on {vertices} vertices with multiplicity up to {max_multiplicity}"
        );
        let mut g = Self::with_domain(vertices);
        for _ in 0..edges {
            let u = rng.random_range(0..vertices);
            let v = rng.random_range(0..vertices);
            let m = rng.random_range(1..=max_multiplicity);
            g.link(u, v, m);
        }
        g
    }

    /// Copies this graph onto another table type, keeping vertex ids and the live set.
    ///
    /// # Panics
    /// Panics if a bundle exceeds the target table's cell capacity.
    pub fn to_table<U: MultiplicityTable>(&self) -> Multigraph<U> {
        let mut g = Multigraph::<U>::with_domain(self.domain_size());
        for v in (0..self.domain_size()).filter(|&v| !self.contains_vertex(v)) {
            g.unlink(v);
        }
        for (u, v, m) in self.edges() {
            g.link(u, v, m);
        }
        g
    }

    // ------------------------------------------------------------------------
    // Counts and lookups
    // ------------------------------------------------------------------------

    /// Size of the vertex domain the graph was created with.
    #[inline]
    pub fn domain_size(&self) -> usize {
        self.table.domain()
    }

    /// Number of live vertices.
    #[inline]
    pub fn num_vertices(&self) -> usize {
        self.num_vertices
    }

    /// Number of edges, counting every parallel copy and every loop.
    #[inline]
    pub fn num_edges(&self) -> usize {
        self.num_edges
    }

    /// Number of distinct vertex pairs (including loop cells) carrying at least one edge.
    #[inline]
    pub fn num_distinct_edges(&self) -> usize {
        self.num_distinct_edges
    }

    /// Number of surplus parallel copies: `num_edges - num_distinct_edges`.
    #[inline]
    pub fn num_multi_edges(&self) -> usize {
        self.num_edges - self.num_distinct_edges
    }

    /// Returns `true` if some pair carries more than one edge.
    #[inline]
    pub fn is_multigraph(&self) -> bool {
        self.num_multi_edges() > 0
    }

    /// Returns `true` if `v` is inside the domain and has not been cleared.
    #[inline]
    pub fn contains_vertex(&self, v: usize) -> bool {
        v < self.domain_size() && (self.live[v / 64] & bit(v)) != 0
    }

    /// Number of edges between `u` and `v` (the loop count when `u == v`).
    ///
    /// Unchecked: a cleared vertex reads as isolated, so this returns 0 for it. Use
    /// [`Self::try_multiplicity`] to have stale ids reported.
    #[inline]
    pub fn multiplicity(&self, u: usize, v: usize) -> u32 {
        debug_assert!(u < self.domain_size() && v < self.domain_size());
        self.table.get(u, v)
    }

    /// Like [`Self::multiplicity`], but rejects ids that are out of range or cleared.
    ///
    /// # Errors
    /// Returns [`GraphError::VertexOutOfRange`] or [`GraphError::StaleVertex`].
    pub fn try_multiplicity(&self, u: usize, v: usize) -> Result<u32, GraphError> {
        self.check_vertex(u)?;
        self.check_vertex(v)?;
        Ok(self.table.get(u, v))
    }

    /// Degree of `v` with multiplicity; each loop contributes two.
    pub fn degree(&self, v: usize) -> usize {
        self.neighbors(v)
            .map(|(w, m)| if w == v { 2 * m as usize } else { m as usize })
            .sum()
    }

    /// Number of distinct neighbors of `v`, ignoring loops.
    pub fn simple_degree(&self, v: usize) -> usize {
        self.neighbors(v).filter(|&(w, _)| w != v).count()
    }

    /// Total number of self-loops.
    pub fn loops(&self) -> usize {
        self.vertices().map(|v| self.table.get(v, v) as usize).sum()
    }

    fn check_vertex(&self, v: usize) -> Result<(), GraphError> {
        if v >= self.domain_size() {
            return Err(GraphError::VertexOutOfRange {
                vertex: v,
                domain: self.domain_size(),
            });
        }
        if !self.contains_vertex(v) {
            return Err(GraphError::StaleVertex { vertex: v });
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Traversal
    // ------------------------------------------------------------------------

    /// Iterates live vertices in list order (ascending id unless built otherwise).
    pub fn vertices(&self) -> Vertices<'_, T> {
        Vertices {
            graph: self,
            cursor: self.head,
        }
    }

    /// Iterates `(neighbor, multiplicity)` for `v`, including `(v, loops)` if `v` has loops.
    ///
    /// Unchecked: a cleared vertex yields nothing. See [`Self::try_neighbors`].
    pub fn neighbors(&self, v: usize) -> Neighbors<'_, T> {
        debug_assert!(v < self.domain_size());
        Neighbors {
            table: &self.table,
            row: v,
            from: 0,
        }
    }

    /// Like [`Self::neighbors`], but rejects ids that are out of range or cleared.
    ///
    /// # Errors
    /// Returns [`GraphError::VertexOutOfRange`] or [`GraphError::StaleVertex`].
    pub fn try_neighbors(&self, v: usize) -> Result<Neighbors<'_, T>, GraphError> {
        self.check_vertex(v)?;
        Ok(self.neighbors(v))
    }

    /// Iterates every bundle once as `(u, v, multiplicity)` with `u <= v`.
    pub fn edges(&self) -> impl Iterator<Item = (usize, usize, u32)> + '_ {
        self.vertices().flat_map(move |u| {
            self.neighbors(u)
                .filter(move |&(w, _)| w >= u)
                .map(move |(w, m)| (u, w, m))
        })
    }

    // ------------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------------

    /// Adds `count` parallel edges between `u` and `v` (`u == v` adds loops).
    ///
    /// # Errors
    /// Returns an error if either endpoint is outside the domain or has been removed.
    ///
    /// # Panics
    /// Panics if the resulting multiplicity exceeds the table's cell capacity.
    pub fn add_edge(&mut self, u: usize, v: usize, count: u32) -> Result<(), GraphError> {
        self.check_vertex(u)?;
        self.check_vertex(v)?;
        self.link(u, v, count);
        Ok(())
    }

    /// Removes up to `count` parallel edges between `u` and `v`. Removing more than exist
    /// drops the whole bundle.
    ///
    /// # Errors
    /// Returns [`GraphError::MissingEdge`] if there is no edge between `u` and `v`; the
    /// graph is left unchanged.
    pub fn remove_edge(&mut self, u: usize, v: usize, count: u32) -> Result<(), GraphError> {
        self.check_vertex(u)?;
        self.check_vertex(v)?;
        let current = self.table.get(u, v);
        if current == 0 {
            return Err(GraphError::MissingEdge { u, v });
        }
        let removed = count.min(current);
        self.store(u, v, current - removed);
        self.num_edges -= removed as usize;
        if removed == current {
            self.num_distinct_edges -= 1;
        }
        Ok(())
    }

    /// Removes the whole bundle between `u` and `v`, returning how many edges it held.
    ///
    /// # Errors
    /// Returns an error if either endpoint is outside the domain or has been removed.
    pub fn remove_all_edges(&mut self, u: usize, v: usize) -> Result<u32, GraphError> {
        self.check_vertex(u)?;
        self.check_vertex(v)?;
        Ok(self.take_bundle(u, v))
    }

    /// Strips every self-loop and returns the number removed.
    pub fn strip_loops(&mut self) -> usize {
        let mut removed = 0;
        let mut v = self.head;
        while v != NIL {
            removed += self.take_bundle(v, v) as usize;
            v = self.next[v];
        }
        removed
    }

    /// Merges `v` into `u`: every edge at `v` is redirected to `u` (edges between `u` and
    /// `v` become loops at `u`), then `v` is removed.
    ///
    /// # Errors
    /// Returns an error if either endpoint is outside the domain or has been removed.
    ///
    /// # Panics
    /// Panics if `u == v`; contracting a loop is never valid.
    pub fn contract_edge(&mut self, u: usize, v: usize) -> Result<(), GraphError> {
        self.check_vertex(u)?;
        self.check_vertex(v)?;
        assert!(u != v, "cannot contract a loop at vertex {u}");

        let incident: Vec<(usize, u32)> = self.neighbors(v).collect();
        for &(w, m) in &incident {
            self.take_bundle(v, w);
            let target = if w == v || w == u { u } else { w };
            self.link(u, target, m);
        }
        self.unlink(v);
        Ok(())
    }

    /// Isolates `v` and removes it from the live vertex list.
    ///
    /// # Panics
    /// Panics if `v` is outside the domain or was already cleared.
    pub fn clear(&mut self, v: usize) {
        assert!(
            self.contains_vertex(v),
            "vertex {v} has already been removed (or is outside the domain)"
        );
        let incident: Vec<usize> = self.neighbors(v).map(|(w, _)| w).collect();
        for w in incident {
            self.take_bundle(v, w);
        }
        self.unlink(v);
    }

    /// Adds `count` copies without validating the endpoints.
    pub(crate) fn link(&mut self, u: usize, v: usize, count: u32) {
        if count == 0 {
            return;
        }
        let current = self.table.get(u, v);
        let updated = match current.checked_add(count) {
            Some(m) if m <= T::MAX_MULTIPLICITY => m,
            _ => panic!(
                "multiplicity overflow at ({u}, {v}): {current} + {count} exceeds the cell capacity {}",
                T::MAX_MULTIPLICITY
            ),
        };
        self.store(u, v, updated);
        self.num_edges += count as usize;
        if current == 0 {
            self.num_distinct_edges += 1;
        }
    }

    /// Zeroes the bundle `(u, v)` and returns its former multiplicity.
    pub(crate) fn take_bundle(&mut self, u: usize, v: usize) -> u32 {
        let current = self.table.get(u, v);
        if current != 0 {
            self.store(u, v, 0);
            self.num_edges -= current as usize;
            self.num_distinct_edges -= 1;
        }
        current
    }

    #[inline(always)]
    fn store(&mut self, u: usize, v: usize, value: u32) {
        self.table.set(u, v, value);
        if u != v {
            self.table.set(v, u, value);
        }
    }

    fn unlink(&mut self, v: usize) {
        debug_assert!(self.contains_vertex(v));
        let (p, n) = (self.prev[v], self.next[v]);
        if p == NIL {
            self.head = n;
        } else {
            self.next[p] = n;
        }
        if n != NIL {
            self.prev[n] = p;
        }
        self.next[v] = NIL;
        self.prev[v] = NIL;
        self.live[v / 64] &= !bit(v);
        self.num_vertices -= 1;
        self.table.clear_row(v);
    }

    // ------------------------------------------------------------------------
    // Fingerprint
    // ------------------------------------------------------------------------

    /// Returns the exact structural key of this graph: the live-vertex set plus every cell.
    ///
    /// Two graphs share a fingerprint iff they have the same table type, the same
    /// domain, the same live vertices and the same multiplicities under the same labels.
    /// Relabelled copies of one graph get different fingerprints.
    pub fn fingerprint(&self) -> Fingerprint {
        let mut words = Vec::with_capacity(self.live.len() + 2);
        words.push(u64::from(T::MAX_MULTIPLICITY));
        words.push(self.domain_size() as u64);
        words.extend_from_slice(&self.live);
        self.table.fingerprint_words(&mut words);
        Fingerprint::new(words)
    }
}

impl<T: MultiplicityTable> PartialEq for Multigraph<T> {
    fn eq(&self, other: &Self) -> bool {
        self.num_edges == other.num_edges
            && self.num_distinct_edges == other.num_distinct_edges
            && self.fingerprint() == other.fingerprint()
    }
}

impl<T: MultiplicityTable> Eq for Multigraph<T> {}

impl<T: MultiplicityTable> fmt::Debug for Multigraph<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Multigraph")
            .field("domain", &self.domain_size())
            .field("vertices", &self.num_vertices)
            .field("edges", &self.num_edges)
            .field("distinct_edges", &self.num_distinct_edges)
            .finish()
    }
}

impl<T: MultiplicityTable> fmt::Display for Multigraph<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (u, v, m) in self.edges() {
            writeln!(f, "{u} -- {v} x{m}")?;
        }
        Ok(())
    }
}

// ============================================================================
// Iterators
// ============================================================================

/// Iterator over live vertices. See [`Multigraph::vertices`].
pub struct Vertices<'a, T: MultiplicityTable> {
    graph: &'a Multigraph<T>,
    cursor: usize,
}

impl<T: MultiplicityTable> Iterator for Vertices<'_, T> {
    type Item = usize;

    #[inline]
    fn next(&mut self) -> Option<usize> {
        if self.cursor == NIL {
            return None;
        }
        let v = self.cursor;
        self.cursor = self.graph.next[v];
        Some(v)
    }
}

/// Iterator over the non-zero cells of one row. See [`Multigraph::neighbors`].
pub struct Neighbors<'a, T: MultiplicityTable> {
    table: &'a T,
    row: usize,
    from: usize,
}

impl<T: MultiplicityTable> Iterator for Neighbors<'_, T> {
    type Item = (usize, u32);

    #[inline]
    fn next(&mut self) -> Option<(usize, u32)> {
        let (w, m) = self.table.next_in_row(self.row, self.from)?;
        self.from = w + 1;
        Some((w, m))
    }
}

// ============================================================================
// Fingerprint
// ============================================================================

/// Exact structural key of a [`Multigraph`], with a precomputed 64-bit hash.
#[derive(Clone, Debug)]
pub struct Fingerprint {
    hash: u64,
    words: Box<[u64]>,
}

impl Fingerprint {
    fn new(words: Vec<u64>) -> Self {
        Self {
            hash: compute_hash(&words),
            words: words.into_boxed_slice(),
        }
    }

    /// The precomputed FNV-1a hash of the key words.
    #[inline]
    pub fn hash64(&self) -> u64 {
        self.hash
    }

    /// Approximate heap footprint of this key.
    #[inline]
    pub fn size_bytes(&self) -> usize {
        self.words.len() * std::mem::size_of::<u64>()
    }
}

impl PartialEq for Fingerprint {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.words == other.words
    }
}

impl Eq for Fingerprint {}

impl Hash for Fingerprint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

/// FNV-1a over whole words.
fn compute_hash(words: &[u64]) -> u64 {
    let mut hash = 0xcbf2_9ce4_8422_2325u64;
    for &w in words {
        hash ^= w;
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash
}

// ============================================================================
// Parsing
// ============================================================================

/// Parses an edge list: integers separated by any non-digit characters, read in
/// `from to` pairs. Labels are remapped to dense ids in order of first appearance,
/// and repeated pairs accumulate multiplicity.
///
/// # Errors
/// Returns [`GraphError::Parse`] if a number does not fit in `u64` or the count is odd.
pub fn parse_edge_list(text: &str) -> Result<Multigraph, GraphError> {
    let numbers = text
        .split(|c: char| !c.is_ascii_digit())
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<u64>()
                .map_err(|e| GraphError::Parse(format!("bad vertex label {s:?}: {e}")))
        })
        .collect::<Result<Vec<u64>, GraphError>>()?;

    if numbers.len() % 2 != 0 {
        return Err(GraphError::Parse(format!(
            "expected pairs of vertex labels, found {} numbers",
            numbers.len()
        )));
    }

    Ok(Multigraph::from_edges(
        numbers.chunks_exact(2).map(|pair| (pair[0], pair[1])),
    ))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::DenseTable;
    use rand::SeedableRng;
    use rand_xorshift::XorShiftRng;

    /// Recounts edges and distinct edges directly from the cells.
    fn recount<T: MultiplicityTable>(g: &Multigraph<T>) -> (usize, usize) {
        let mut edges = 0;
        let mut distinct = 0;
        for u in 0..g.domain_size() {
            for v in u..g.domain_size() {
                let m = g.multiplicity(u, v) as usize;
                assert_eq!(m, g.multiplicity(v, u) as usize, "asymmetric at ({u},{v})");
                if m > 0 {
                    assert!(g.contains_vertex(u) && g.contains_vertex(v), "edge on dead vertex");
                    edges += m;
                    distinct += 1;
                }
            }
        }
        (edges, distinct)
    }

    fn assert_counts<T: MultiplicityTable>(g: &Multigraph<T>) {
        let (edges, distinct) = recount(g);
        assert_eq!(g.num_edges(), edges, "edge count drifted");
        assert_eq!(g.num_distinct_edges(), distinct, "distinct count drifted");
        assert_eq!(g.num_multi_edges(), edges - distinct);
        assert_eq!(g.vertices().count(), g.num_vertices());
    }

    #[test]
    fn add_and_remove_keep_counts() {
        let mut g = Multigraph::new(4);
        g.add_edge(0, 1, 3).unwrap();
        g.add_edge(1, 2, 1).unwrap();
        g.add_edge(2, 2, 2).unwrap();
        assert_eq!(g.num_edges(), 6);
        assert_eq!(g.num_distinct_edges(), 3);
        assert_eq!(g.num_multi_edges(), 3);
        assert_eq!(g.multiplicity(1, 0), 3);
        assert_counts(&g);

        g.remove_edge(0, 1, 2).unwrap();
        assert_eq!(g.multiplicity(0, 1), 1);
        g.remove_edge(0, 1, 5).unwrap();
        assert_eq!(g.multiplicity(0, 1), 0);
        assert_eq!(g.remove_all_edges(2, 2).unwrap(), 2);
        assert_eq!(g.num_edges(), 1);
        assert_counts(&g);
    }

    #[test]
    fn removing_missing_edge_reports_and_changes_nothing() {
        let mut g = Multigraph::new(3);
        g.add_edge(0, 1, 1).unwrap();
        let before = g.clone();
        assert_eq!(g.remove_edge(1, 2, 1), Err(GraphError::MissingEdge { u: 1, v: 2 }));
        assert_eq!(g, before);
    }

    #[test]
    fn invalid_vertices_are_reported() {
        let mut g = Multigraph::new(3);
        assert_eq!(
            g.add_edge(0, 7, 1),
            Err(GraphError::VertexOutOfRange { vertex: 7, domain: 3 })
        );
        g.clear(2);
        assert_eq!(g.add_edge(0, 2, 1), Err(GraphError::StaleVertex { vertex: 2 }));
        assert_eq!(g.contract_edge(2, 0), Err(GraphError::StaleVertex { vertex: 2 }));
    }

    #[test]
    fn contract_redirects_edges_and_turns_parallels_into_loops() {
        // 0 =2= 1, 1 -- 2, 1 has a loop, 0 -- 3
        let mut g = Multigraph::new(4);
        g.add_edge(0, 1, 2).unwrap();
        g.add_edge(1, 2, 1).unwrap();
        g.add_edge(1, 1, 1).unwrap();
        g.add_edge(0, 3, 1).unwrap();

        g.contract_edge(0, 1).unwrap();
        assert!(!g.contains_vertex(1));
        assert_eq!(g.num_vertices(), 3);
        assert_eq!(g.multiplicity(0, 0), 3); // two former 0-1 edges plus the 1-1 loop
        assert_eq!(g.multiplicity(0, 2), 1);
        assert_eq!(g.multiplicity(0, 3), 1);
        assert_eq!(g.num_edges(), 5);
        assert_counts(&g);
    }

    #[test]
    fn contract_accumulates_parallel_bundles() {
        // Triangle: contracting 0-1 doubles the edge to 2.
        let mut g = Multigraph::new(3);
        g.add_edge(0, 1, 1).unwrap();
        g.add_edge(1, 2, 1).unwrap();
        g.add_edge(2, 0, 1).unwrap();
        g.remove_edge(0, 1, 1).unwrap();
        g.contract_edge(0, 1).unwrap();
        assert_eq!(g.multiplicity(0, 2), 2);
        assert_eq!(g.loops(), 0);
        assert_counts(&g);
    }

    #[test]
    #[should_panic(expected = "cannot contract a loop")]
    fn contracting_a_loop_is_fatal() {
        let mut g = Multigraph::new(2);
        g.add_edge(1, 1, 1).unwrap();
        let _ = g.contract_edge(1, 1);
    }

    #[test]
    #[should_panic(expected = "already been removed")]
    fn clearing_twice_is_fatal() {
        let mut g = Multigraph::new(3);
        g.clear(1);
        g.clear(1);
    }

    #[test]
    #[should_panic(expected = "multiplicity overflow")]
    fn packed_cell_overflow_is_fatal() {
        let mut g = Multigraph::new(2);
        g.add_edge(0, 1, PackedTable::MAX_MULTIPLICITY).unwrap();
        g.add_edge(0, 1, 1).unwrap();
    }

    #[test]
    fn clear_unlinks_from_traversal() {
        let mut g = Multigraph::new(5);
        g.add_edge(0, 2, 1).unwrap();
        g.add_edge(2, 4, 2).unwrap();
        g.clear(0);
        g.clear(2);
        assert_eq!(g.vertices().collect::<Vec<_>>(), vec![1, 3, 4]);
        assert_eq!(g.num_edges(), 0);
        g.clear(4);
        g.clear(1);
        g.clear(3);
        assert_eq!(g.vertices().next(), None);
        assert_counts(&g);
    }

    #[test]
    fn clone_is_independent() {
        let mut rng = XorShiftRng::seed_from_u64(0xC10E);
        let g: Multigraph = Multigraph::random(&mut rng, 8, 14, 3);
        let order: Vec<usize> = g.vertices().collect();
        let (edges, distinct, multi) = (g.num_edges(), g.num_distinct_edges(), g.num_multi_edges());

        let mut h = g.clone();
        let (a, b, _) = h.edges().find(|&(a, b, _)| a != b).unwrap();
        h.contract_edge(a, b).unwrap();
        h.clear(a);

        assert_eq!(g.vertices().collect::<Vec<_>>(), order);
        assert_eq!(g.num_edges(), edges);
        assert_eq!(g.num_distinct_edges(), distinct);
        assert_eq!(g.num_multi_edges(), multi);
        assert_counts(&g);
    }

    #[test]
    fn random_mutations_keep_invariants_on_both_tables() {
        fn run<T: MultiplicityTable>(seed: u64) -> Fingerprint {
            let mut rng = XorShiftRng::seed_from_u64(seed);
            let mut g: Multigraph<T> = Multigraph::random(&mut rng, 12, 30, 3);
            for _ in 0..200 {
                let live: Vec<usize> = g.vertices().collect();
                if live.len() < 2 {
                    break;
                }
                let u = live[rng.random_range(0..live.len())];
                let v = live[rng.random_range(0..live.len())];
                match rng.random_range(0..4) {
                    0 => g.add_edge(u, v, rng.random_range(1..3)).unwrap(),
                    1 => {
                        let _ = g.remove_edge(u, v, 1);
                    }
                    2 if u != v && g.degree(u) + g.degree(v) < 60 => g.contract_edge(u, v).unwrap(),
                    _ => {
                        let _ = g.remove_all_edges(u, v).unwrap();
                    }
                }
                assert_counts(&g);
            }
            g.fingerprint()
        }
        for seed in 0..8 {
            // Same operations on the same structure: the key words differ by table layout,
            // so only the invariants are compared across tables.
            run::<PackedTable>(seed);
            run::<DenseTable>(seed);
        }
    }

    #[test]
    fn strip_loops_counts_every_copy() {
        let mut g = Multigraph::new(3);
        g.add_edge(0, 0, 2).unwrap();
        g.add_edge(2, 2, 1).unwrap();
        g.add_edge(0, 1, 1).unwrap();
        assert_eq!(g.loops(), 3);
        assert_eq!(g.strip_loops(), 3);
        assert_eq!(g.loops(), 0);
        assert_eq!(g.num_edges(), 1);
    }

    #[test]
    fn degrees_count_loops_twice() {
        let mut g = Multigraph::new(3);
        g.add_edge(0, 0, 1).unwrap();
        g.add_edge(0, 1, 2).unwrap();
        g.add_edge(0, 2, 1).unwrap();
        assert_eq!(g.degree(0), 5);
        assert_eq!(g.simple_degree(0), 2);
    }

    #[test]
    fn fingerprint_is_label_exact() {
        let a: Multigraph = Multigraph::from_edges([(0, 1), (1, 2)]);
        let b: Multigraph = Multigraph::from_edges([(0, 1), (1, 2)]);
        let c: Multigraph = Multigraph::from_edges([(0, 1), (0, 2)]);
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
    }

    #[test]
    fn fingerprint_tells_table_types_apart() {
        let packed: Multigraph = Multigraph::from_edges([(0, 1), (1, 2)]);
        let dense: Multigraph<DenseTable> = packed.to_table();
        assert_ne!(packed.fingerprint().hash64(), dense.fingerprint().hash64());
    }

    #[test]
    fn to_table_keeps_ids_live_set_and_bundles() {
        let mut g = Multigraph::new(5);
        g.add_edge(0, 1, 200).unwrap();
        g.add_edge(1, 4, 3).unwrap();
        g.add_edge(4, 4, 1).unwrap();
        g.clear(2);

        let mut dense: Multigraph<DenseTable> = g.to_table();
        assert_eq!(dense.domain_size(), 5);
        assert_eq!(dense.vertices().collect::<Vec<_>>(), vec![0, 1, 3, 4]);
        assert_eq!(dense.edges().collect::<Vec<_>>(), g.edges().collect::<Vec<_>>());
        assert_eq!(dense.num_edges(), g.num_edges());
        assert_eq!(dense.num_distinct_edges(), g.num_distinct_edges());

        // Beyond the packed cell capacity.
        dense.add_edge(0, 1, 200).unwrap();
        assert_eq!(dense.multiplicity(0, 1), 400);
        assert_counts(&dense);
    }

    #[test]
    fn checked_accessors_report_cleared_vertices() {
        let mut g: Multigraph = Multigraph::from_edges([(0, 1), (1, 2)]);
        assert_eq!(g.try_multiplicity(0, 1), Ok(1));
        assert_eq!(g.try_neighbors(1).unwrap().count(), 2);

        g.clear(1);
        assert_eq!(g.multiplicity(0, 1), 0);
        assert_eq!(g.neighbors(1).count(), 0);
        assert_eq!(g.try_multiplicity(0, 1), Err(GraphError::StaleVertex { vertex: 1 }));
        assert_eq!(
            g.try_neighbors(1).err(),
            Some(GraphError::StaleVertex { vertex: 1 })
        );
        assert_eq!(
            g.try_neighbors(7).err(),
            Some(GraphError::VertexOutOfRange { vertex: 7, domain: 3 })
        );
    }

    #[test]
    fn random_without_vertices_is_empty() {
        let mut rng = XorShiftRng::seed_from_u64(5);
        let g: Multigraph = Multigraph::random(&mut rng, 0, 0, 1);
        assert_eq!(g.num_vertices(), 0);
        assert_eq!(g.num_edges(), 0);
    }

    #[test]
    #[should_panic(expected = "cannot place 3 edges on 0 vertices")]
    fn random_rejects_edges_without_vertices() {
        let mut rng = XorShiftRng::seed_from_u64(5);
        let _: Multigraph = Multigraph::random(&mut rng, 0, 3, 1);
    }

    #[test]
    fn from_edges_remaps_labels_in_first_seen_order() {
        let g: Multigraph = Multigraph::from_edges([("b", "z"), ("z", "q"), ("b", "z")]);
        assert_eq!(g.domain_size(), 3);
        assert_eq!(g.multiplicity(0, 1), 2);
        assert_eq!(g.multiplicity(1, 2), 1);
    }

    #[test]
    fn parse_edge_list_accepts_loose_separators() {
        let g = parse_edge_list("10 20\n20,30\n(30 - 10)\n10 20").unwrap();
        assert_eq!(g.num_vertices(), 3);
        assert_eq!(g.num_edges(), 4);
        assert_eq!(g.multiplicity(0, 1), 2);
    }

    #[test]
    fn parse_edge_list_rejects_odd_counts() {
        let err = parse_edge_list("1 2 3").unwrap_err();
        assert!(matches!(err, GraphError::Parse(_)));
    }

    #[test]
    fn display_lists_each_bundle_once() {
        let g: Multigraph = Multigraph::from_weighted_edges([(0, 1, 2), (1, 1, 1)]);
        assert_eq!(g.to_string(), "0 -- 1 x2\n1 -- 1 x1\n");
    }
}
