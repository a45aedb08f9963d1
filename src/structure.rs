//! Structural recognition on the underlying simple graph.
//!
//! Every predicate here collapses multiplicities to presence and ignores self-loops
//! and isolated vertices. Block decomposition is the Hopcroft–Tarjan low-point DFS,
//! run iteratively with an explicit frame stack so deep graphs cannot overflow the
//! call stack.

use crate::graph::{Multigraph, Neighbors};
use crate::table::MultiplicityTable;

const UNSEEN: usize = usize::MAX;

/// A simple edge of one block, as `(u, v)`.
pub type BlockEdge = (usize, usize);

struct Frame<'a, T: MultiplicityTable> {
    v: usize,
    parent: usize,
    neighbors: Neighbors<'a, T>,
}

impl<T: MultiplicityTable> Multigraph<T> {
    /// Number of live vertices with at least one non-loop neighbor.
    pub fn num_non_isolated(&self) -> usize {
        self.vertices().filter(|&v| self.simple_degree(v) > 0).count()
    }

    /// Returns `true` if the underlying simple graph is a forest.
    pub fn is_forest_like(&self) -> bool {
        let domain = self.domain_size();
        let mut seen = vec![false; domain];
        let mut stack = Vec::new();
        let mut non_isolated = 0usize;
        let mut components = 0usize;
        let mut simple_edges = 0usize;

        for root in self.vertices() {
            if seen[root] || self.simple_degree(root) == 0 {
                continue;
            }
            components += 1;
            seen[root] = true;
            stack.push(root);
            while let Some(v) = stack.pop() {
                non_isolated += 1;
                for (w, _) in self.neighbors(v) {
                    if w == v {
                        continue;
                    }
                    if w > v {
                        simple_edges += 1;
                    }
                    if !seen[w] {
                        seen[w] = true;
                        stack.push(w);
                    }
                }
            }
        }
        simple_edges + components == non_isolated
    }

    /// Returns `true` if the underlying simple graph is one cycle of length at least 3.
    pub fn is_single_cycle(&self) -> bool {
        self.cycle_bundles().is_some()
    }

    /// If the underlying simple graph is a single cycle, returns the bundle
    /// multiplicities in traversal order, starting at the lowest non-isolated vertex.
    pub fn cycle_bundles(&self) -> Option<Vec<u32>> {
        let mut start = None;
        let mut length = 0usize;
        for v in self.vertices() {
            match self.simple_degree(v) {
                0 => {}
                2 => {
                    length += 1;
                    start.get_or_insert(v);
                }
                _ => return None,
            }
        }
        let start = start?;
        if length < 3 {
            return None;
        }

        let mut bundles = Vec::with_capacity(length);
        let (mut prev, mut cur) = (UNSEEN, start);
        loop {
            let (next, m) = self.neighbors(cur).find(|&(w, _)| w != cur && w != prev)?;
            bundles.push(m);
            prev = cur;
            cur = next;
            if cur == start || bundles.len() > length {
                break;
            }
        }
        // A shorter walk means a second cycle elsewhere.
        (cur == start && bundles.len() == length).then_some(bundles)
    }

    /// Returns `true` if there are at least 3 non-isolated vertices and they form a single
    /// block (connected, no articulation vertex).
    pub fn is_biconnected(&self) -> bool {
        self.num_non_isolated() >= 3 && self.blocks().len() == 1
    }

    /// Splits the underlying simple graph into blocks, each given by its simple edges.
    ///
    /// Bridges come out as one-edge blocks. Isolated vertices and loops belong to none.
    pub fn blocks(&self) -> Vec<Vec<BlockEdge>> {
        let domain = self.domain_size();
        let mut disc = vec![UNSEEN; domain];
        let mut low = vec![0usize; domain];
        let mut time = 0usize;
        let mut frames: Vec<Frame<'_, T>> = Vec::new();
        let mut edge_stack: Vec<BlockEdge> = Vec::new();
        let mut blocks = Vec::new();

        for root in self.vertices() {
            if disc[root] != UNSEEN || self.simple_degree(root) == 0 {
                continue;
            }
            disc[root] = time;
            low[root] = time;
            time += 1;
            frames.push(Frame {
                v: root,
                parent: UNSEEN,
                neighbors: self.neighbors(root),
            });

            while let Some(frame) = frames.last_mut() {
                let (v, parent) = (frame.v, frame.parent);
                match frame.neighbors.next() {
                    Some((w, _)) if w == v || w == parent => {}
                    Some((w, _)) if disc[w] == UNSEEN => {
                        edge_stack.push((v, w));
                        disc[w] = time;
                        low[w] = time;
                        time += 1;
                        frames.push(Frame {
                            v: w,
                            parent: v,
                            neighbors: self.neighbors(w),
                        });
                    }
                    Some((w, _)) => {
                        // Back edge to an ancestor; the descendant side records it once.
                        if disc[w] < disc[v] {
                            edge_stack.push((v, w));
                            low[v] = low[v].min(disc[w]);
                        }
                    }
                    None => {
                        frames.pop();
                        if parent == UNSEEN {
                            continue;
                        }
                        low[parent] = low[parent].min(low[v]);
                        if low[v] >= disc[parent] {
                            let mut block = Vec::new();
                            while let Some(e) = edge_stack.pop() {
                                block.push(e);
                                if e == (parent, v) {
                                    break;
                                }
                            }
                            blocks.push(block);
                        }
                    }
                }
            }
        }
        blocks
    }

    /// Moves every block with at least two simple edges into its own graph.
    ///
    /// Each returned graph keeps the block's bundle multiplicities on a compact domain
    /// `0..k`, where the block's vertices are numbered in ascending order of their ids
    /// in `self`. The block's bundles are removed from `self`, so what remains is
    /// forest-like.
    pub fn extract_biconnected_components(&mut self) -> Vec<Multigraph<T>> {
        let mut extracted = Vec::new();
        let mut local = vec![UNSEEN; self.domain_size()];
        let mut members: Vec<usize> = Vec::new();

        for block in self.blocks().into_iter().filter(|b| b.len() >= 2) {
            for &(u, w) in &block {
                for x in [u, w] {
                    if local[x] == UNSEEN {
                        local[x] = 0;
                        members.push(x);
                    }
                }
            }
            members.sort_unstable();
            for (id, &x) in members.iter().enumerate() {
                local[x] = id;
            }

            let mut g = Multigraph::<T>::with_domain(members.len());
            for &(u, w) in &block {
                let m = self.take_bundle(u, w);
                g.link(local[u], local[w], m);
            }
            for x in members.drain(..) {
                local[x] = UNSEEN;
            }
            extracted.push(g);
        }
        extracted
    }
}

#[cfg(test)]
mod tests {
    use crate::graph::Multigraph;
    use crate::table::DenseTable;
    use rand::SeedableRng;
    use rand_xorshift::XorShiftRng;

    fn graph(edges: &[(usize, usize)]) -> Multigraph {
        Multigraph::from_edges(edges.iter().copied())
    }

    #[test]
    fn forest_detection_ignores_multiplicity_and_loops() {
        let mut g = graph(&[(0, 1), (1, 2), (1, 3)]);
        assert!(g.is_forest_like());
        g.add_edge(0, 1, 4).unwrap();
        g.add_edge(2, 2, 1).unwrap();
        assert!(g.is_forest_like());
        g.add_edge(2, 3, 1).unwrap();
        assert!(!g.is_forest_like());
        assert!(Multigraph::new(3).is_forest_like());
    }

    #[test]
    fn cycle_detection_reports_bundles_in_order() {
        let mut g = graph(&[(0, 1), (1, 2), (2, 3), (3, 0)]);
        g.add_edge(1, 2, 2).unwrap();
        assert_eq!(g.cycle_bundles(), Some(vec![1, 3, 1, 1]));
        assert!(g.is_single_cycle());
    }

    #[test]
    fn cycle_detection_rejects_non_cycles() {
        // Two disjoint triangles: all degrees 2, not connected.
        let g = graph(&[(0, 1), (1, 2), (2, 0), (3, 4), (4, 5), (5, 3)]);
        assert!(!g.is_single_cycle());
        // A double edge is a 2-cycle only as a multigraph.
        let g = graph(&[(0, 1), (0, 1)]);
        assert!(!g.is_single_cycle());
        // A path.
        assert!(!graph(&[(0, 1), (1, 2)]).is_single_cycle());
    }

    #[test]
    fn cycle_detection_skips_isolated_vertices() {
        let mut g = Multigraph::new(6);
        g.add_edge(1, 3, 1).unwrap();
        g.add_edge(3, 5, 1).unwrap();
        g.add_edge(5, 1, 1).unwrap();
        assert_eq!(g.cycle_bundles(), Some(vec![1, 1, 1]));
        assert!(g.is_biconnected());
    }

    #[test]
    fn biconnectivity() {
        assert!(graph(&[(0, 1), (1, 2), (2, 0)]).is_biconnected());
        assert!(!graph(&[(0, 1), (1, 2)]).is_biconnected());
        assert!(!graph(&[(0, 1), (0, 1)]).is_biconnected());
        assert!(!Multigraph::new(4).is_biconnected());
        // Bowtie: two triangles sharing vertex 2.
        let bowtie = graph(&[(0, 1), (1, 2), (2, 0), (2, 3), (3, 4), (4, 2)]);
        assert!(!bowtie.is_biconnected());
        // K4 is biconnected.
        let k4 = graph(&[(0, 1), (0, 2), (0, 3), (1, 2), (1, 3), (2, 3)]);
        assert!(k4.is_biconnected());
    }

    #[test]
    fn blocks_of_a_mixed_graph() {
        // Triangle 0-1-2, bridge 2-3, square 3-4-5-6, pendant 6-7.
        let g = graph(&[
            (0, 1), (1, 2), (2, 0),
            (2, 3),
            (3, 4), (4, 5), (5, 6), (6, 3),
            (6, 7),
        ]);
        let mut sizes: Vec<usize> = g.blocks().iter().map(Vec::len).collect();
        sizes.sort_unstable();
        assert_eq!(sizes, vec![1, 1, 3, 4]);
    }

    #[test]
    fn extraction_leaves_a_forest_and_preserves_multiplicity() {
        let mut g = graph(&[(0, 1), (1, 2), (2, 0), (2, 3), (3, 4), (4, 5), (5, 3)]);
        g.add_edge(0, 1, 2).unwrap();
        g.add_edge(2, 3, 1).unwrap();
        let total = g.num_edges();

        let parts = g.extract_biconnected_components();
        assert_eq!(parts.len(), 2);
        assert!(g.is_forest_like());
        assert_eq!(g.multiplicity(2, 3), 2);

        let moved: usize = parts.iter().map(Multigraph::num_edges).sum();
        assert_eq!(moved + g.num_edges(), total);
        for part in &parts {
            assert_eq!(part.domain_size(), 3);
            assert_eq!(part.num_vertices(), 3);
            assert!(part.is_single_cycle());
        }
        // Triangle 0-1-2 keeps its labels; triangle 3-4-5 becomes 0-1-2.
        let triangle = parts.iter().find(|p| p.num_edges() == 5).unwrap();
        assert_eq!(triangle.multiplicity(0, 1), 3);
        let other = parts.iter().find(|p| p.num_edges() == 3).unwrap();
        assert_eq!(other.multiplicity(0, 1), 1);
        assert_eq!(other.multiplicity(2, 0), 1);
    }

    #[test]
    fn long_block_chains_extract_into_small_graphs() {
        // 500 triangles glued in a chain at shared vertices: 2k + 1 vertices.
        let k = 500;
        let mut edges = Vec::new();
        for i in 0..k {
            let (a, b, c) = (2 * i, 2 * i + 1, 2 * i + 2);
            edges.extend([(a, b), (b, c), (c, a)]);
        }
        let mut g = graph(&edges);
        assert_eq!(g.domain_size(), 2 * k + 1);

        let parts = g.extract_biconnected_components();
        assert_eq!(parts.len(), k);
        assert_eq!(g.num_edges(), 0);
        for part in &parts {
            assert_eq!(part.domain_size(), 3);
            assert_eq!(part.cycle_bundles(), Some(vec![1, 1, 1]));
        }
    }

    #[test]
    fn deep_paths_do_not_overflow_the_stack() {
        let n = 3_000;
        let edges: Vec<(usize, usize)> = (0..n - 1).map(|i| (i, i + 1)).collect();
        let g = graph(&edges);
        assert_eq!(g.blocks().len(), n - 1);
        assert!(g.is_forest_like());
    }

    #[test]
    fn packed_and_dense_agree_on_structure() {
        let mut rng = XorShiftRng::seed_from_u64(0x57_4C);
        for _ in 0..40 {
            let seed_graph: Multigraph = Multigraph::random(&mut rng, 9, 11, 2);
            let dense: Multigraph<DenseTable> = Multigraph::from_weighted_edges(
                seed_graph.edges().collect::<Vec<_>>(),
            );
            let packed: Multigraph = Multigraph::from_weighted_edges(
                seed_graph.edges().collect::<Vec<_>>(),
            );
            assert_eq!(packed.is_forest_like(), dense.is_forest_like());
            assert_eq!(packed.is_biconnected(), dense.is_biconnected());
            assert_eq!(packed.cycle_bundles(), dense.cycle_bundles());
            assert_eq!(packed.blocks().len(), dense.blocks().len());
        }
    }
}
