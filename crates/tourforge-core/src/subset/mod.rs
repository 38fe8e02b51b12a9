//! Enumeration of city subsets for subtour-elimination constraints.
//!
//! For `n` cities the DFJ formulation needs one constraint per proper subset
//! of size `2..=n-1`. Subsets are produced size by size; within a size they
//! are strictly increasing and ordered lexicographically.
//!
//! # Algorithm
//!
//! Each size `k` is filled position by position into one contiguous buffer.
//! For position `p` and candidate city `c`, the number of subsets sharing the
//! prefix ending in `c` is `C(n - 1 - c, k - 1 - p)`, so the block of rows for
//! that prefix is known in advance and the next position is filled inside it.
//! Recursion depth is bounded by `k`.
//!
//! # Example
//!
//! ```
//! use tourforge_core::SubsetEnumerator;
//!
//! let subsets = SubsetEnumerator::new(4).enumerate().unwrap();
//! assert_eq!(subsets.len(), 10);
//!
//! let first: Vec<&[usize]> = subsets.iter().take(3).collect();
//! assert_eq!(first, vec![&[0, 1][..], &[0, 2][..], &[0, 3][..]]);
//! ```

mod cache;

use rayon::prelude::*;
use tracing::debug;

use crate::error::{Result, TourForgeError};
use crate::instance::CityIndex;

pub use cache::SubsetCache;

/// Binomial coefficient `C(n, k)` computed multiplicatively.
///
/// After step `i` the accumulator holds `C(n, i + 1)`, so every division is
/// exact. Returns `None` if an intermediate product overflows `u128`.
pub fn binomial(n: u64, k: u64) -> Option<u128> {
    if k > n {
        return Some(0);
    }
    let k = k.min(n - k);
    let mut result: u128 = 1;
    for i in 0..k {
        result = result.checked_mul(u128::from(n - i))? / u128::from(i + 1);
    }
    Some(result)
}

/// Number of subsets of size `2..=n-1` for `n` cities, or `None` on overflow.
pub fn subset_count(n: usize) -> Option<u128> {
    let n = n as u64;
    (2..n).try_fold(0u128, |total, k| total.checked_add(binomial(n, k)?))
}

/// All subsets of one size, stored row-major in a single buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubsetBlock {
    size: usize,
    cities: Vec<CityIndex>,
}

impl SubsetBlock {
    /// Number of cities in every subset of this block.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of subsets in this block.
    pub fn len(&self) -> usize {
        self.cities.len() / self.size
    }

    pub fn is_empty(&self) -> bool {
        self.cities.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&[CityIndex]> {
        let start = index.checked_mul(self.size)?;
        self.cities.get(start..start + self.size)
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = &[CityIndex]> + '_ {
        self.cities.chunks_exact(self.size)
    }
}

/// Every proper subset (size `2..=n-1`) of `n` cities, sizes ascending.
///
/// Derived purely from `n`; immutable once built and shareable between
/// models of the same size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubsetCollection {
    city_count: usize,
    blocks: Vec<SubsetBlock>,
}

impl SubsetCollection {
    /// Number of cities the subsets were drawn from.
    pub fn city_count(&self) -> usize {
        self.city_count
    }

    /// Total number of subsets over all sizes.
    pub fn len(&self) -> usize {
        self.blocks.iter().map(SubsetBlock::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.iter().all(SubsetBlock::is_empty)
    }

    /// The block holding subsets of size `k`, if `2 <= k <= n - 1`.
    pub fn by_size(&self, k: usize) -> Option<&SubsetBlock> {
        self.blocks.iter().find(|block| block.size == k)
    }

    pub fn blocks(&self) -> &[SubsetBlock] {
        &self.blocks
    }

    /// Iterates every subset, sizes ascending, lexicographic within a size.
    pub fn iter(&self) -> impl Iterator<Item = &[CityIndex]> + '_ {
        self.blocks.iter().flat_map(SubsetBlock::iter)
    }
}

/// Generates the [`SubsetCollection`] for a city count.
#[derive(Debug, Clone)]
pub struct SubsetEnumerator {
    city_count: usize,
    parallel: bool,
    max_subsets: Option<u64>,
}

impl SubsetEnumerator {
    pub fn new(city_count: usize) -> Self {
        Self {
            city_count,
            parallel: false,
            max_subsets: None,
        }
    }

    /// Enumerates sizes on the rayon pool. Output order is unchanged.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Rejects city counts whose subset total exceeds `limit`.
    pub fn with_max_subsets(mut self, limit: Option<u64>) -> Self {
        self.max_subsets = limit;
        self
    }

    pub fn city_count(&self) -> usize {
        self.city_count
    }

    /// Checks that the subset total fits the configured limit and memory.
    /// Returns the total.
    pub fn check_limits(&self) -> Result<usize> {
        let n = self.city_count;
        let total = subset_count(n).ok_or_else(|| {
            TourForgeError::InvalidInstance(format!("subset count for {} cities overflows", n))
        })?;
        if let Some(limit) = self.max_subsets {
            if total > u128::from(limit) {
                return Err(TourForgeError::InvalidInstance(format!(
                    "{} cities need {} subtour constraints, limit is {}",
                    n, total, limit
                )));
            }
        }
        let cells = (2..n as u64).try_fold(0u128, |cells, k| {
            cells.checked_add(binomial(n as u64, k)?.checked_mul(u128::from(k))?)
        });
        let bytes = cells.and_then(|c| c.checked_mul(std::mem::size_of::<CityIndex>() as u128));
        if bytes.map_or(true, |b| b > isize::MAX as u128) {
            return Err(TourForgeError::InvalidInstance(format!(
                "{} subsets for {} cities do not fit in memory",
                total, n
            )));
        }
        Ok(total as usize)
    }

    /// Produces every subset of size `2..=n-1`. Empty for `n < 3`.
    pub fn enumerate(&self) -> Result<SubsetCollection> {
        let n = self.city_count;
        let total = self.check_limits()?;
        let counts = CompletionCounts::new(n)?;

        let blocks: Vec<SubsetBlock> = if self.parallel {
            (2..n)
                .into_par_iter()
                .map(|k| fill_block(n, k, &counts))
                .collect()
        } else {
            (2..n).map(|k| fill_block(n, k, &counts)).collect()
        };

        let collection = SubsetCollection {
            city_count: n,
            blocks,
        };
        debug_assert_eq!(collection.len(), total);
        debug!(
            city_count = n,
            subsets = total,
            parallel = self.parallel,
            "Subsets enumerated"
        );
        Ok(collection)
    }
}

/// Table of `C(m, j)` for `m < n`, `j < n`, checked to fit `usize`.
struct CompletionCounts {
    n: usize,
    table: Vec<usize>,
}

impl CompletionCounts {
    fn new(n: usize) -> Result<Self> {
        let mut table = Vec::with_capacity(n * n);
        for m in 0..n {
            for j in 0..n {
                let count = binomial(m as u64, j as u64)
                    .and_then(|c| usize::try_from(c).ok())
                    .ok_or_else(|| {
                        TourForgeError::InvalidInstance(format!(
                            "C({}, {}) does not fit in usize",
                            m, j
                        ))
                    })?;
                table.push(count);
            }
        }
        Ok(Self { n, table })
    }

    #[inline]
    fn get(&self, m: usize, j: usize) -> usize {
        self.table[m * self.n + j]
    }
}

fn fill_block(n: usize, k: usize, counts: &CompletionCounts) -> SubsetBlock {
    // C(n, k) = C(n - 1, k - 1) + C(n - 1, k)
    let rows = counts.get(n - 1, k - 1) + counts.get(n - 1, k);
    let mut cities = vec![0; rows * k];
    fill_position(&mut cities, n, k, counts, 0, 0, 0);
    SubsetBlock { size: k, cities }
}

/// Writes column `position` for every row starting at `first_row`, choosing
/// cities from `first_city` upward, then recurses into each prefix block.
fn fill_position(
    cities: &mut [CityIndex],
    n: usize,
    k: usize,
    counts: &CompletionCounts,
    first_row: usize,
    first_city: CityIndex,
    position: usize,
) {
    let remaining = k - position - 1;
    let mut row = first_row;
    for city in first_city..n {
        let after = n - city - 1;
        if after < remaining {
            break;
        }
        let block = counts.get(after, remaining);
        for r in row..row + block {
            cities[r * k + position] = city;
        }
        if remaining > 0 {
            fill_position(cities, n, k, counts, row, city + 1, position + 1);
        }
        row += block;
    }
}
