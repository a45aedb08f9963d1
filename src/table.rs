//! Multiplicity tables: storage for the symmetric N×N edge-count matrix of a multigraph.
//!
//! [`PackedTable`] stores one byte-wide counter per cell, eight cells to a `u64` word,
//! with every row starting on a word boundary. Row scans skip whole zero words, which
//! is the hot path of every traversal. [`DenseTable`] is a plain `u32` matrix that
//! serves as the reference implementation: the test suite runs the same graphs
//! through both and expects identical answers.
//!
//! Tables do not know about symmetry; [`crate::graph::Multigraph`] writes both
//! `(u, v)` and `(v, u)`.

use std::fmt;

// ============================================================================
// Interface
// ============================================================================

/// Cell storage behind a multigraph.
pub trait MultiplicityTable: Clone + fmt::Debug + Send + Sync {
    /// Largest value a cell can hold. Writing more is an invariant violation.
    const MAX_MULTIPLICITY: u32;

    /// Creates an all-zero table over the vertex domain `0..domain`.
    fn new(domain: usize) -> Self;

    /// Returns the domain size this table was created with.
    fn domain(&self) -> usize;

    /// Returns the multiplicity stored at `(u, v)`.
    fn get(&self, u: usize, v: usize) -> u32;

    /// Stores `value` at `(u, v)`.
    ///
    /// # Panics
    /// Panics if `value > Self::MAX_MULTIPLICITY`.
    fn set(&mut self, u: usize, v: usize, value: u32);

    /// Returns the first non-zero cell `(w, value)` of row `u` with `w >= from`.
    fn next_in_row(&self, u: usize, from: usize) -> Option<(usize, u32)>;

    /// Zeroes every cell of row `u`.
    fn clear_row(&mut self, u: usize) {
        let mut from = 0;
        while let Some((w, _)) = self.next_in_row(u, from) {
            self.set(u, w, 0);
            from = w + 1;
        }
    }

    /// Appends the raw cell contents to `out`. Two tables with equal cells produce
    /// equal word sequences.
    fn fingerprint_words(&self, out: &mut Vec<u64>);
}

#[inline(always)]
fn overflow(u: usize, v: usize, value: u32, max: u32) -> ! {
    panic!("multiplicity overflow at ({u}, {v}): {value} exceeds the cell capacity {max}")
}

// ============================================================================
// PackedTable
// ============================================================================

const CELL_BITS: usize = 8;
const CELLS_PER_WORD: usize = 64 / CELL_BITS;
const CELL_MASK: u64 = (1u64 << CELL_BITS) - 1;

/// Bit-packed table: 8-bit counters, 8 per `u64` word, word-aligned rows.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct PackedTable {
    domain: usize,
    words_per_row: usize,
    words: Vec<u64>,
}

impl PackedTable {
    #[inline(always)]
    fn locate(&self, u: usize, v: usize) -> (usize, usize) {
        debug_assert!(u < self.domain && v < self.domain);
        (
            u * self.words_per_row + v / CELLS_PER_WORD,
            (v % CELLS_PER_WORD) * CELL_BITS,
        )
    }
}

impl MultiplicityTable for PackedTable {
    const MAX_MULTIPLICITY: u32 = CELL_MASK as u32;

    fn new(domain: usize) -> Self {
        let words_per_row = domain.div_ceil(CELLS_PER_WORD);
        Self {
            domain,
            words_per_row,
            words: vec![0u64; domain * words_per_row],
        }
    }

    #[inline]
    fn domain(&self) -> usize {
        self.domain
    }

    #[inline(always)]
    fn get(&self, u: usize, v: usize) -> u32 {
        let (word, shift) = self.locate(u, v);
        ((self.words[word] >> shift) & CELL_MASK) as u32
    }

    #[inline(always)]
    fn set(&mut self, u: usize, v: usize, value: u32) {
        if value > Self::MAX_MULTIPLICITY {
            overflow(u, v, value, Self::MAX_MULTIPLICITY);
        }
        let (word, shift) = self.locate(u, v);
        let w = &mut self.words[word];
        *w = (*w & !(CELL_MASK << shift)) | (u64::from(value) << shift);
    }

    fn next_in_row(&self, u: usize, from: usize) -> Option<(usize, u32)> {
        if from >= self.domain {
            return None;
        }
        let row = u * self.words_per_row;
        let mut idx = from / CELLS_PER_WORD;
        // Mask off cells below `from` in the first word.
        let mut t = self.words[row + idx] & (u64::MAX << ((from % CELLS_PER_WORD) * CELL_BITS));
        loop {
            if t != 0 {
                let cell = t.trailing_zeros() as usize / CELL_BITS;
                let w = idx * CELLS_PER_WORD + cell;
                let value = ((t >> (cell * CELL_BITS)) & CELL_MASK) as u32;
                return Some((w, value));
            }
            idx += 1;
            if idx == self.words_per_row {
                return None;
            }
            t = self.words[row + idx];
        }
    }

    fn clear_row(&mut self, u: usize) {
        let row = u * self.words_per_row;
        self.words[row..row + self.words_per_row].fill(0);
    }

    fn fingerprint_words(&self, out: &mut Vec<u64>) {
        out.extend_from_slice(&self.words);
    }
}

impl fmt::Debug for PackedTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PackedTable")
            .field("domain", &self.domain)
            .field("nonzero_words", &self.words.iter().filter(|&&w| w != 0).count())
            .finish()
    }
}

// ============================================================================
// DenseTable
// ============================================================================

/// Reference table: one `u32` per cell, row-major.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DenseTable {
    domain: usize,
    cells: Vec<u32>,
}

impl MultiplicityTable for DenseTable {
    const MAX_MULTIPLICITY: u32 = u32::MAX;

    fn new(domain: usize) -> Self {
        Self {
            domain,
            cells: vec![0; domain * domain],
        }
    }

    #[inline]
    fn domain(&self) -> usize {
        self.domain
    }

    #[inline]
    fn get(&self, u: usize, v: usize) -> u32 {
        self.cells[u * self.domain + v]
    }

    #[inline]
    fn set(&mut self, u: usize, v: usize, value: u32) {
        self.cells[u * self.domain + v] = value;
    }

    fn next_in_row(&self, u: usize, from: usize) -> Option<(usize, u32)> {
        let row = &self.cells[u * self.domain..(u + 1) * self.domain];
        row.iter()
            .enumerate()
            .skip(from)
            .find(|(_, &m)| m != 0)
            .map(|(w, &m)| (w, m))
    }

    fn fingerprint_words(&self, out: &mut Vec<u64>) {
        out.extend(
            self.cells
                .chunks(2)
                .map(|pair| u64::from(pair[0]) | (u64::from(pair.get(1).copied().unwrap_or(0)) << 32)),
        );
    }
}

// ============================================================================
// Tests
// ============================================================================
