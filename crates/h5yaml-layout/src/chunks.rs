//! Chunk-size advisor.
//!
//! Picks between contiguous storage and a concrete chunk shape for a variable,
//! given its extents and element size. An extent of `0` marks the unlimited
//! (growable) axis.
//!
//! The heuristic:
//!
//! - Fixed arrays whose total footprint is below
//!   [`ChunkPolicy::contiguous_threshold`] are stored contiguously; no chunk
//!   index is worth paying for.
//! - Larger fixed arrays keep every axis whole except the leading one, which is
//!   cut so that one chunk holds about [`ChunkPolicy::target_chunk_bytes`].
//! - A one-dimensional unlimited variable always gets
//!   [`ChunkPolicy::unlimited_chunk`] elements per chunk.
//! - A multi-dimensional unlimited variable keeps the fixed axes whole and sizes
//!   the unlimited axis inversely to the byte footprint of one slice.
//!
//! This is a tunable heuristic, not an optimizer.

/// Outcome of [`ChunkPolicy::advise`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkAdvice {
    /// Store the variable as one contiguous block.
    Contiguous,
    /// Store the variable in chunks of this shape.
    Chunked(Vec<u64>),
}

impl ChunkAdvice {
    pub fn is_contiguous(&self) -> bool {
        matches!(self, ChunkAdvice::Contiguous)
    }

    /// The chunk shape, if chunked.
    pub fn shape(&self) -> Option<&[u64]> {
        match self {
            ChunkAdvice::Contiguous => None,
            ChunkAdvice::Chunked(dims) => Some(dims),
        }
    }
}

/// Tunable constants of the chunk heuristic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkPolicy {
    /// Fixed arrays smaller than this many bytes are stored contiguously.
    pub contiguous_threshold: u64,
    /// Desired number of bytes per chunk.
    pub target_chunk_bytes: u64,
    /// Chunk length along an unlimited axis for small slices.
    pub unlimited_chunk: u64,
    /// Chunk length along an unlimited axis of a variable-length variable.
    pub vlen_unlimited_chunk: u64,
    /// Chunk length of an unlimited coordinate variable without `_chunks`.
    pub dimension_unlimited_chunk: u64,
}

impl Default for ChunkPolicy {
    fn default() -> Self {
        Self {
            contiguous_threshold: 64_000,
            target_chunk_bytes: 2 * 1024 * 1024,
            unlimited_chunk: 1024,
            vlen_unlimited_chunk: 16,
            dimension_unlimited_chunk: 50,
        }
    }
}

impl ChunkPolicy {
    /// Create the default policy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the small-footprint threshold in bytes.
    pub fn contiguous_threshold(mut self, bytes: u64) -> Self {
        self.contiguous_threshold = bytes;
        self
    }

    /// Set the target chunk size in bytes.
    pub fn target_chunk_bytes(mut self, bytes: u64) -> Self {
        self.target_chunk_bytes = bytes;
        self
    }

    /// Set the default chunk length along an unlimited axis.
    pub fn unlimited_chunk(mut self, len: u64) -> Self {
        self.unlimited_chunk = len;
        self
    }

    /// Advise a storage layout for `shape` with elements of `element_size`
    /// bytes. At most one extent may be `0`; further zeros are treated as
    /// fixed axes of length one.
    pub fn advise(&self, shape: &[u64], element_size: usize) -> ChunkAdvice {
        let elem = element_size.max(1) as u64;
        if shape.is_empty() {
            return ChunkAdvice::Contiguous;
        }

        let Some(udim) = shape.iter().position(|&n| n == 0) else {
            let total = footprint(elem, shape);
            if total < self.contiguous_threshold {
                return ChunkAdvice::Contiguous;
            }
            let slice = footprint(elem, &shape[1..]);
            let lead = (self.target_chunk_bytes / slice).clamp(1, shape[0]);
            let mut dims = shape.to_vec();
            dims[0] = lead;
            return ChunkAdvice::Chunked(dims);
        };

        if shape.len() == 1 {
            return ChunkAdvice::Chunked(vec![self.unlimited_chunk]);
        }

        let fixed = footprint(elem, shape);
        let len = if fixed < self.contiguous_threshold {
            self.unlimited_chunk
        } else {
            (self.target_chunk_bytes / fixed).max(1)
        };
        let mut dims: Vec<u64> = shape.iter().map(|&n| n.max(1)).collect();
        dims[udim] = len;
        ChunkAdvice::Chunked(dims)
    }
}

/// Advise a layout with the default [`ChunkPolicy`].
pub fn advise(shape: &[u64], element_size: usize) -> ChunkAdvice {
    ChunkPolicy::default().advise(shape, element_size)
}

/// Bytes covered by the nonzero extents of `shape`.
fn footprint(elem: u64, shape: &[u64]) -> u64 {
    shape
        .iter()
        .filter(|&&n| n > 0)
        .fold(elem, |acc, &n| acc.saturating_mul(n))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_fixed_arrays_are_contiguous() {
        assert_eq!(advise(&[100], 4), ChunkAdvice::Contiguous);
        assert_eq!(advise(&[100, 100], 4), ChunkAdvice::Contiguous);
        assert_eq!(advise(&[10, 20, 30], 8), ChunkAdvice::Contiguous);
        // 63 999 bytes is still below the threshold.
        assert_eq!(advise(&[63_999], 1), ChunkAdvice::Contiguous);
    }

    #[test]
    fn threshold_is_exclusive() {
        assert_eq!(advise(&[64_000], 1), ChunkAdvice::Chunked(vec![64_000]));
    }

    #[test]
    fn scalar_shape_is_contiguous() {
        assert_eq!(advise(&[], 8), ChunkAdvice::Contiguous);
    }

    #[test]
    fn large_fixed_arrays_cut_leading_axis() {
        // One row of 1000 f8 is 8000 bytes; 2 MiB holds 262 rows.
        let advice = advise(&[5000, 1000], 8);
        assert_eq!(advice, ChunkAdvice::Chunked(vec![262, 1000]));
    }

    #[test]
    fn leading_axis_never_exceeds_extent() {
        // 1-D fixed: the whole array fits in one target-sized chunk.
        assert_eq!(advise(&[100_000], 4), ChunkAdvice::Chunked(vec![100_000]));
    }

    #[test]
    fn huge_rows_floor_at_one() {
        let advice = advise(&[10, 1_000_000], 8);
        assert_eq!(advice, ChunkAdvice::Chunked(vec![1, 1_000_000]));
    }

    #[test]
    fn one_dimensional_unlimited_is_fixed_length() {
        for elem in [1, 2, 4, 8, 16, 1000] {
            assert_eq!(advise(&[0], elem), ChunkAdvice::Chunked(vec![1024]));
        }
    }

    #[test]
    fn unlimited_with_small_slices() {
        assert_eq!(advise(&[0, 100], 4), ChunkAdvice::Chunked(vec![1024, 100]));
        assert_eq!(advise(&[100, 0], 4), ChunkAdvice::Chunked(vec![100, 1024]));
    }

    #[test]
    fn unlimited_with_large_slices() {
        // One slice of 512 x 256 f4 is 524 288 bytes: 4 slices per 2 MiB.
        assert_eq!(
            advise(&[0, 512, 256], 4),
            ChunkAdvice::Chunked(vec![4, 512, 256])
        );
        // A slice bigger than the target floors at 1.
        assert_eq!(
            advise(&[0, 2048, 2048], 8),
            ChunkAdvice::Chunked(vec![1, 2048, 2048])
        );
    }

    #[test]
    fn custom_policy() {
        let policy = ChunkPolicy::new()
            .contiguous_threshold(10)
            .unlimited_chunk(64);
        assert_eq!(policy.advise(&[4], 1), ChunkAdvice::Contiguous);
        assert_eq!(policy.advise(&[0], 4), ChunkAdvice::Chunked(vec![64]));
        assert_eq!(policy.advise(&[0, 2], 1), ChunkAdvice::Chunked(vec![64, 2]));
    }

    #[test]
    fn advice_accessors() {
        assert!(ChunkAdvice::Contiguous.is_contiguous());
        assert_eq!(ChunkAdvice::Contiguous.shape(), None);
        let chunked = ChunkAdvice::Chunked(vec![8, 2]);
        assert_eq!(chunked.shape(), Some(&[8u64, 2][..]));
    }
}
