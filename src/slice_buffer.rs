use log::{debug, trace};

use crate::grid::GridDims;
use crate::popcount::{hamming_distance, popcount};

/// Number of slices kept alive at once: current, previous, previous-previous.
pub const NUM_SLICES: usize = 3;

/// Fixed-width bit array recording which cells received events in a slice.
#[derive(Clone, Debug)]
pub struct PresenceBitmap {
    words: Vec<u64>,
    len: usize,
}

impl PresenceBitmap {
    pub fn new(len: usize) -> Self {
        Self {
            words: vec![0; len.div_ceil(64)],
            len,
        }
    }

    #[inline]
    pub fn set(&mut self, bit: usize) {
        assert!(bit < self.len, "bit {} out of range {}", bit, self.len);
        self.words[bit / 64] |= 1u64 << (bit % 64);
    }

    pub fn get(&self, bit: usize) -> bool {
        bit < self.len && (self.words[bit / 64] >> (bit % 64)) & 1 == 1
    }

    pub fn clear(&mut self) {
        self.words.fill(0);
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn words(&self) -> &[u64] {
        &self.words
    }

    pub fn count_ones(&self) -> u32 {
        self.words.iter().map(|&w| popcount(w)).sum()
    }
}

/// Read-only views of the three live planes.
#[derive(Clone, Copy, Debug)]
pub struct SliceSnapshot<'a> {
    pub current: &'a [i32],
    pub previous: &'a [i32],
    pub prev_prev: &'a [i32],
}

/// Ring of signed event histograms ("slices") in subsampled space.
///
/// Exactly one plane (`current`) receives events; the other two are the most
/// recently completed slices and are only read. Planes are row-major,
/// `y * sub_size_x + x`.
pub struct SliceBuffer {
    planes: [Vec<i32>; NUM_SLICES],
    bitmaps: [PresenceBitmap; NUM_SLICES],
    dims: GridDims,
    current: usize,
    previous: usize,
    prev_prev: usize,
    rotations: u64,
}

impl SliceBuffer {
    pub fn new(dims: GridDims) -> Self {
        let cells = dims.cells();
        Self {
            planes: std::array::from_fn(|_| vec![0; cells]),
            bitmaps: std::array::from_fn(|_| PresenceBitmap::new(Self::bitmap_len(&dims))),
            dims,
            current: 0,
            previous: 1,
            prev_prev: 2,
            rotations: 0,
        }
    }

    // Presence bits are addressed as (x + 1) + y * sub_size_x, so the last
    // cell of the last row needs one bit past the plane size.
    fn bitmap_len(dims: &GridDims) -> usize {
        dims.cells() + 1
    }

    /// Zero every plane and bitmap, reallocating if `dims` changed, and put the
    /// rotation indices back in canonical order.
    pub fn reset(&mut self, dims: GridDims) {
        if dims != self.dims {
            debug!(
                "slice buffer resized {}x{} -> {}x{}",
                self.dims.sub_size_x, self.dims.sub_size_y, dims.sub_size_x, dims.sub_size_y
            );
            *self = Self::new(dims);
            return;
        }
        for plane in &mut self.planes {
            plane.fill(0);
        }
        for bitmap in &mut self.bitmaps {
            bitmap.clear();
        }
        self.current = 0;
        self.previous = 1;
        self.prev_prev = 2;
        self.rotations = 0;
    }

    /// Add `sign` to cell `(x, y)` of the current slice and mark it present.
    ///
    /// # Panics
    /// Panics if `(x, y)` is outside the subsampled grid.
    #[inline]
    pub fn accumulate(&mut self, x: usize, y: usize, sign: i32) {
        assert!(
            x < self.dims.sub_size_x && y < self.dims.sub_size_y,
            "accumulate at ({}, {}) outside {}x{} grid",
            x,
            y,
            self.dims.sub_size_x,
            self.dims.sub_size_y
        );
        let w = self.dims.sub_size_x;
        self.planes[self.current][y * w + x] += sign;
        self.bitmaps[self.current].set((x + 1) + y * w);
    }

    /// Retire the current slice: current becomes previous, previous becomes
    /// previous-previous, and the old previous-previous is zeroed and reused as
    /// the new current.
    pub fn rotate(&mut self) {
        let recycled = self.prev_prev;
        self.prev_prev = self.previous;
        self.previous = self.current;
        self.current = recycled;
        self.planes[recycled].fill(0);
        self.bitmaps[recycled].clear();
        self.rotations += 1;
        trace!(
            "slice rotation {}: current={} previous={} prev_prev={}",
            self.rotations,
            self.current,
            self.previous,
            self.prev_prev
        );
    }

    pub fn snapshot(&self) -> SliceSnapshot<'_> {
        SliceSnapshot {
            current: &self.planes[self.current],
            previous: &self.planes[self.previous],
            prev_prev: &self.planes[self.prev_prev],
        }
    }

    pub fn current_bitmap(&self) -> &PresenceBitmap {
        &self.bitmaps[self.current]
    }

    pub fn previous_bitmap(&self) -> &PresenceBitmap {
        &self.bitmaps[self.previous]
    }

    pub fn prev_prev_bitmap(&self) -> &PresenceBitmap {
        &self.bitmaps[self.prev_prev]
    }

    /// Number of cells whose presence differs between the two completed slices.
    pub fn presence_distance(&self) -> u32 {
        hamming_distance(
            self.bitmaps[self.previous].words(),
            self.bitmaps[self.prev_prev].words(),
        )
    }

    /// Rotations since the last reset.
    pub fn rotations(&self) -> u64 {
        self.rotations
    }

    pub fn dims(&self) -> GridDims {
        self.dims
    }

    /// Indices of (current, previous, previous-previous) into the ring.
    pub fn indices(&self) -> (usize, usize, usize) {
        (self.current, self.previous, self.prev_prev)
    }
}
