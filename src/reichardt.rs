use crate::block_match::Displacement;
use crate::config::FlowConfig;
use crate::engine::MotionEstimator;
use crate::event::Event;

const NO_EVENT: i64 = i64::MIN;

/// Correlation-based direction detector (Reichardt-style).
///
/// Keeps the most recent timestamp per pixel and polarity. An event at `p`
/// supports motion vector `v` when the same-polarity pixel at `p - v` fired
/// within `(0, max_dt_us]` before it. Candidate vectors cover
/// `[-search_distance, search_distance]` on both axes; the last supporting
/// vector in scan order (vx outer, vy inner) is reported, with the time gap
/// as its match cost.
///
/// Unlike the patch matcher, the reported vector points along the motion.
pub struct ReichardtFlow {
    timestamps: Vec<i64>,
    width: usize,
    height: usize,
    search_distance: usize,
    max_dt_us: i64,
    scale_factor: f32,
}

impl ReichardtFlow {
    pub fn new(width: u32, height: u32, search_distance: u32, max_dt_us: i64) -> Self {
        assert!(width > 0 && height > 0, "dimensions must be positive");
        assert!(
            width <= crate::MAX_SENSOR_DIM && height <= crate::MAX_SENSOR_DIM,
            "dimensions exceed maximum"
        );
        assert!(search_distance > 0, "search distance must be positive");
        assert!(search_distance <= 64, "search distance must be at most 64");
        assert!(max_dt_us > 0, "max_dt_us must be positive");
        let w = width as usize;
        let h = height as usize;
        let n = w.checked_mul(h).expect("dimension overflow");
        Self {
            timestamps: vec![NO_EVENT; 2 * n],
            width: w,
            height: h,
            search_distance: search_distance as usize,
            max_dt_us,
            scale_factor: 1.0,
        }
    }

    pub fn from_config(width: u32, height: u32, config: &FlowConfig) -> Self {
        let mut flow = Self::new(width, height, config.search_distance, config.max_dt_us);
        flow.scale_factor = config.scale_factor;
        flow
    }

    #[inline]
    fn index(&self, x: usize, y: usize, on: bool) -> usize {
        2 * (y * self.width + x) + on as usize
    }

    /// Most recent timestamp at a pixel for one polarity, if any.
    pub fn last_timestamp(&self, x: u16, y: u16, polarity: i8) -> Option<i64> {
        let (x, y) = (x as usize, y as usize);
        if x >= self.width || y >= self.height {
            return None;
        }
        let ts = self.timestamps[self.index(x, y, polarity > 0)];
        (ts != NO_EVENT).then_some(ts)
    }

    pub fn reset(&mut self) {
        self.timestamps.fill(NO_EVENT);
    }
}

impl MotionEstimator for ReichardtFlow {
    fn estimate(&mut self, event: &Event) -> Option<Displacement> {
        let on = event.polarity_sign()? > 0;
        let x = event.x as usize;
        let y = event.y as usize;
        let sd = self.search_distance;
        if x < sd || y < sd || x + sd >= self.width || y + sd >= self.height {
            return None;
        }
        let ts = event.timestamp;
        let idx = self.index(x, y, on);
        self.timestamps[idx] = ts;

        let sdi = sd as i64;
        let mut found = None;
        for vx in -sdi..=sdi {
            for vy in -sdi..=sdi {
                let px = (x as i64 - vx) as usize;
                let py = (y as i64 - vy) as usize;
                let dt = ts.saturating_sub(self.timestamps[self.index(px, py, on)]);
                if dt > 0 && dt <= self.max_dt_us {
                    found = Some(Displacement {
                        dx: vx as i32,
                        dy: vy as i32,
                        match_cost: dt.min(u32::MAX as i64) as u32,
                    });
                }
            }
        }
        found
    }

    fn reset_state(&mut self) {
        self.reset();
    }

    fn scale_factor(&self) -> f32 {
        self.scale_factor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_border_returns_none() {
        let mut rf = ReichardtFlow::new(16, 16, 2, 10_000);
        assert!(rf.estimate(&Event::new(1, 8, 100, 1)).is_none());
        assert!(rf.estimate(&Event::new(8, 14, 100, 1)).is_none());
        // Border events do not touch the timestamp map.
        assert_eq!(rf.last_timestamp(1, 8, 1), None);
    }

    #[test]
    fn test_isolated_event_has_no_support() {
        let mut rf = ReichardtFlow::new(16, 16, 2, 10_000);
        assert!(rf.estimate(&Event::new(8, 8, 100, 1)).is_none());
        assert_eq!(rf.last_timestamp(8, 8, 1), Some(100));
    }

    #[test]
    fn test_rightward_motion() {
        let mut rf = ReichardtFlow::new(16, 16, 2, 10_000);
        rf.estimate(&Event::new(7, 8, 1000, 1));
        let d = rf.estimate(&Event::new(8, 8, 1500, 1)).unwrap();
        assert_eq!((d.dx, d.dy, d.match_cost), (1, 0, 500));
    }

    #[test]
    fn test_diagonal_motion() {
        let mut rf = ReichardtFlow::new(16, 16, 2, 10_000);
        rf.estimate(&Event::new(10, 10, 1000, -1));
        let d = rf.estimate(&Event::new(8, 8, 3000, -1)).unwrap();
        assert_eq!((d.dx, d.dy), (-2, -2));
    }

    #[test]
    fn test_polarities_are_separate() {
        let mut rf = ReichardtFlow::new(16, 16, 2, 10_000);
        rf.estimate(&Event::new(7, 8, 1000, -1));
        assert!(rf.estimate(&Event::new(8, 8, 1500, 1)).is_none());
    }

    #[test]
    fn test_stale_neighbor_ignored() {
        let mut rf = ReichardtFlow::new(16, 16, 2, 1000);
        rf.estimate(&Event::new(7, 8, 1000, 1));
        assert!(rf.estimate(&Event::new(8, 8, 5000, 1)).is_none());
    }

    #[test]
    fn test_same_timestamp_not_support() {
        let mut rf = ReichardtFlow::new(16, 16, 2, 1000);
        rf.estimate(&Event::new(7, 8, 1000, 1));
        assert!(rf.estimate(&Event::new(8, 8, 1000, 1)).is_none());
    }

    #[test]
    fn test_last_supporting_vector_wins() {
        let mut rf = ReichardtFlow::new(16, 16, 2, 10_000);
        rf.estimate(&Event::new(7, 8, 1000, 1)); // supports (1, 0)
        rf.estimate(&Event::new(9, 9, 1200, 1)); // supports (-1, -1)
        let d = rf.estimate(&Event::new(8, 8, 1500, 1)).unwrap();
        // (1, 0) is scanned after (-1, -1).
        assert_eq!((d.dx, d.dy, d.match_cost), (1, 0, 500));
    }

    #[test]
    fn test_flow_uses_scale_factor() {
        let config = FlowConfig {
            search_distance: 2,
            scale_factor: 5.0,
            ..FlowConfig::default()
        };
        let mut rf = ReichardtFlow::from_config(16, 16, &config);
        rf.flow(&Event::new(8, 7, 1000, 1));
        let rec = rf.flow(&Event::new(8, 8, 1100, 1)).unwrap();
        assert_eq!(rec.vx, 0.0);
        assert_eq!(rec.vy, 5.0);
    }

    #[test]
    fn test_reset() {
        let mut rf = ReichardtFlow::new(16, 16, 2, 10_000);
        rf.estimate(&Event::new(8, 8, 100, 1));
        rf.reset_state();
        assert_eq!(rf.last_timestamp(8, 8, 1), None);
    }
}
