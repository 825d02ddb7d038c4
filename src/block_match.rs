use crate::grid::GridDims;

/// Best shift found by the block search.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Displacement {
    pub dx: i32,
    pub dy: i32,
    /// Sum of absolute differences at the chosen shift. Lower is better.
    pub match_cost: u32,
}

impl Displacement {
    pub const ZERO: Displacement = Displacement {
        dx: 0,
        dy: 0,
        match_cost: 0,
    };
}

/// Exhaustive sum-of-absolute-differences block matcher.
///
/// For a query cell `(x, y)` the reference window is the `2sd x 2sd` block
/// `[x - sd, x + sd) x [y - sd, y + sd)` of the current plane. Every shift
/// `dx, dy` in `[-sd, sd)` is tried against the previous plane and the shift
/// with the lowest SAD wins.
///
/// Ties go to the candidate visited last (dx outer, dy inner, both
/// ascending) because candidates are accepted on `cost <= best`.
///
/// Queries whose search would read outside the plane for any candidate
/// (`x < 2sd` or `x + 2sd - 1 > width`, same for y) return
/// [`Displacement::ZERO`] without searching.
#[derive(Clone, Copy, Debug)]
pub struct BlockMatcher {
    search_distance: usize,
    width: usize,
    height: usize,
}

impl BlockMatcher {
    pub fn new(dims: &GridDims, search_distance: u32) -> Self {
        assert!(search_distance > 0, "search distance must be positive");
        Self {
            search_distance: search_distance as usize,
            width: dims.sub_size_x,
            height: dims.sub_size_y,
        }
    }

    pub fn search_distance(&self) -> usize {
        self.search_distance
    }

    /// Find the shift of `prev` that best explains the neighborhood of
    /// `(x, y)` in `curr`.
    ///
    /// Query cells where a full search does not fit in the plane return
    /// [`Displacement::ZERO`].
    pub fn best_shift(&self, x: usize, y: usize, prev: &[i32], curr: &[i32]) -> Displacement {
        let sd = self.search_distance;
        let n = self.width * self.height;
        assert!(
            prev.len() == n && curr.len() == n,
            "plane size does not match {}x{} grid",
            self.width,
            self.height
        );
        if !self.search_fits(x, y) {
            return Displacement::ZERO;
        }

        let sdi = sd as i32;
        let mut best = Displacement {
            dx: 0,
            dy: 0,
            match_cost: u32::MAX,
        };
        for dx in -sdi..sdi {
            for dy in -sdi..sdi {
                let cost = self.sad(x, y, dx, dy, prev, curr);
                if cost <= best.match_cost {
                    best = Displacement {
                        dx,
                        dy,
                        match_cost: cost,
                    };
                }
            }
        }
        best
    }

    /// True if the query window and every shifted candidate window lie
    /// inside the plane. Shifted windows span `[x - 2sd, x + 2sd - 1)`.
    pub fn search_fits(&self, x: usize, y: usize) -> bool {
        let sd = self.search_distance;
        x >= 2 * sd
            && y >= 2 * sd
            && x + sd < self.width
            && y + sd < self.height
            && x + 2 * sd - 1 <= self.width
            && y + 2 * sd - 1 <= self.height
    }

    /// SAD between the window at `(x, y)` in `curr` and the window at
    /// `(x + dx, y + dy)` in `prev`. Callers check `search_fits` first.
    #[inline]
    fn sad(&self, x: usize, y: usize, dx: i32, dy: i32, prev: &[i32], curr: &[i32]) -> u32 {
        let sd = self.search_distance as i64;
        let cx = x as i64 + dx as i64;
        let cy = y as i64 + dy as i64;
        debug_assert!(cx >= sd && cy >= sd);

        let side = 2 * self.search_distance;
        let w = self.width;
        let cur_x0 = x - self.search_distance;
        let cur_y0 = y - self.search_distance;
        let prev_x0 = (cx - sd) as usize;
        let prev_y0 = (cy - sd) as usize;

        let mut sad = 0u32;
        for row in 0..side {
            let c = (cur_y0 + row) * w + cur_x0;
            let p = (prev_y0 + row) * w + prev_x0;
            sad += curr[c..c + side]
                .iter()
                .zip(&prev[p..p + side])
                .map(|(&cv, &pv)| pv.abs_diff(cv))
                .sum::<u32>();
        }
        sad
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::configure;

    const W: usize = 32;

    fn matcher(sd: u32) -> BlockMatcher {
        BlockMatcher::new(&configure(W as u32, W as u32, 0, sd).unwrap(), sd)
    }

    fn plane(cells: &[(usize, usize, i32)]) -> Vec<i32> {
        let mut p = vec![0; W * W];
        for &(x, y, v) in cells {
            p[y * W + x] = v;
        }
        p
    }

    #[test]
    fn test_border_returns_zero() {
        let m = matcher(2);
        let prev = plane(&[(1, 1, 5)]);
        let curr = plane(&[(0, 0, 3), (1, 1, 7), (30, 30, 2)]);
        for &(x, y) in &[(0, 0), (1, 16), (16, 1), (30, 16), (16, 30), (31, 31)] {
            assert_eq!(m.best_shift(x, y, &prev, &curr), Displacement::ZERO, "({x}, {y})");
        }
    }

    #[test]
    fn test_detects_shift() {
        let m = matcher(3);
        // Pattern moved by (+2, +1) between prev and curr; the matcher reports
        // where in prev the current patch came from.
        let prev = plane(&[(14, 14, 3), (15, 14, 1), (14, 16, 2)]);
        let curr = plane(&[(16, 15, 3), (17, 15, 1), (16, 17, 2)]);
        let d = m.best_shift(16, 16, &prev, &curr);
        assert_eq!((d.dx, d.dy, d.match_cost), (-2, -1, 0));
    }

    #[test]
    fn test_identical_planes_prefer_zero_shift_pattern() {
        let m = matcher(2);
        let p = plane(&[(15, 15, 2), (16, 15, -1), (16, 16, 4), (17, 17, 1)]);
        let d = m.best_shift(16, 16, &p, &p);
        assert_eq!((d.dx, d.dy, d.match_cost), (0, 0, 0));
    }

    #[test]
    fn test_uniform_cost_returns_last_candidate() {
        // Every candidate costs 0; `<=` keeps the last one visited.
        let m = matcher(2);
        let zero = plane(&[]);
        let d = m.best_shift(16, 16, &zero, &zero);
        assert_eq!((d.dx, d.dy, d.match_cost), (1, 1, 0));
    }

    #[test]
    fn test_tie_break_keeps_later_candidate() {
        // Two shifts, (-2, 0) and (1, -2), both match exactly. A strict `<`
        // would keep (-2, 0); the `<=` comparison keeps the later (1, -2).
        let m = matcher(2);
        let prev = plane(&[(14, 16, 1), (17, 14, 1)]);
        let curr = plane(&[(16, 16, 1)]);
        for _ in 0..3 {
            let d = m.best_shift(16, 16, &prev, &curr);
            assert_eq!((d.dx, d.dy, d.match_cost), (1, -2, 0));
        }
    }

    #[test]
    fn test_empty_reference_costs_patch_mass() {
        let m = matcher(2);
        let prev = plane(&[]);
        let curr = plane(&[(16, 16, -3), (15, 17, 2)]);
        let d = m.best_shift(16, 16, &prev, &curr);
        assert_eq!(d.match_cost, 5);
        assert_eq!((d.dx, d.dy), (1, 1));
    }

    #[test]
    fn test_edge_band_returns_zero() {
        // Inside [sd, sub - sd) but some shifted windows would leave the plane.
        let m = matcher(2);
        let prev = plane(&[]);
        let curr = plane(&[(2, 16, 9), (3, 16, 4), (16, 3, 4), (29, 16, 2)]);
        for &(x, y) in &[(2, 16), (3, 16), (16, 2), (16, 3)] {
            assert_eq!(m.best_shift(x, y, &prev, &curr), Displacement::ZERO, "({x}, {y})");
        }
        // sd = 2 reaches x + 2sd - 1 = 32 at x = 29, still inside.
        assert!(m.search_fits(29, 16));
        assert_eq!(m.best_shift(29, 16, &prev, &curr).match_cost, 2);
    }

    #[test]
    fn test_edge_band_right_side_larger_distance() {
        let m = matcher(3);
        let prev = plane(&[]);
        let curr = plane(&[(28, 16, 5)]);
        // 28 + 2*3 - 1 = 33 > 32.
        assert!(!m.search_fits(28, 16));
        assert_eq!(m.best_shift(28, 16, &prev, &curr), Displacement::ZERO);
        assert!(m.search_fits(27, 16));
        assert!(m.search_fits(6, 6));
        assert!(!m.search_fits(5, 16));
    }

    #[test]
    #[should_panic(expected = "plane size does not match")]
    fn test_wrong_plane_size_panics() {
        let m = matcher(2);
        m.best_shift(16, 16, &[0; 4], &[0; 4]);
    }
}
