use crate::error::{FlowError, Result};

/// Working grid dimensions in subsampled space.
///
/// Sensor coordinates are right-shifted by `subsample_shift` before they are
/// used to index any slice plane.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GridDims {
    pub sub_size_x: usize,
    pub sub_size_y: usize,
    pub subsample_shift: u32,
}

impl GridDims {
    pub fn cells(&self) -> usize {
        self.sub_size_x * self.sub_size_y
    }

    /// Map a full-resolution sensor coordinate into subsampled space.
    pub fn to_subsampled(&self, x: u16, y: u16) -> (usize, usize) {
        (
            (x as usize) >> self.subsample_shift,
            (y as usize) >> self.subsample_shift,
        )
    }

    /// True if `(sx, sy)` lies in `[sd, sub_size - sd)` on both axes, i.e. a
    /// full match window fits around it.
    pub fn in_match_margin(&self, sx: usize, sy: usize, search_distance: usize) -> bool {
        sx >= search_distance
            && sy >= search_distance
            && sx + search_distance < self.sub_size_x
            && sy + search_distance < self.sub_size_y
    }
}

/// Derive the subsampled grid for a sensor.
///
/// Fails with `InvalidDimensions` when either subsampled side is not larger
/// than `2 * search_distance`.
pub fn configure(
    sensor_width: u32,
    sensor_height: u32,
    subsample_shift: u32,
    search_distance: u32,
) -> Result<GridDims> {
    let invalid = || FlowError::InvalidDimensions {
        width: sensor_width.checked_shr(subsample_shift).unwrap_or(0),
        height: sensor_height.checked_shr(subsample_shift).unwrap_or(0),
        search_distance,
    };
    if sensor_width > crate::MAX_SENSOR_DIM || sensor_height > crate::MAX_SENSOR_DIM {
        return Err(invalid());
    }
    let sub_x = sensor_width.checked_shr(subsample_shift).unwrap_or(0);
    let sub_y = sensor_height.checked_shr(subsample_shift).unwrap_or(0);
    let margin = 2 * search_distance as u64;
    if sub_x as u64 <= margin || sub_y as u64 <= margin {
        return Err(invalid());
    }
    Ok(GridDims {
        sub_size_x: sub_x as usize,
        sub_size_y: sub_y as usize,
        subsample_shift,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_resolution() {
        let dims = configure(128, 128, 0, 3).unwrap();
        assert_eq!(dims.sub_size_x, 128);
        assert_eq!(dims.sub_size_y, 128);
        assert_eq!(dims.cells(), 128 * 128);
    }

    #[test]
    fn test_subsampled() {
        let dims = configure(240, 180, 2, 3).unwrap();
        assert_eq!(dims.sub_size_x, 60);
        assert_eq!(dims.sub_size_y, 45);
        assert_eq!(dims.to_subsampled(239, 179), (59, 44));
        assert_eq!(dims.to_subsampled(3, 4), (0, 1));
    }

    #[test]
    fn test_too_small_rejected() {
        // 8 >> 1 = 4 <= 2*2
        let err = configure(8, 64, 1, 2).unwrap_err();
        match err {
            FlowError::InvalidDimensions {
                width,
                height,
                search_distance,
            } => {
                assert_eq!((width, height, search_distance), (4, 32, 2));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_exactly_one_cell_over_margin_accepted() {
        assert!(configure(5, 5, 0, 2).is_ok());
        assert!(configure(4, 5, 0, 2).is_err());
    }

    #[test]
    fn test_zero_and_oversized_rejected() {
        assert!(configure(0, 128, 0, 1).is_err());
        assert!(configure(crate::MAX_SENSOR_DIM + 1, 128, 0, 1).is_err());
    }

    #[test]
    fn test_match_margin() {
        let dims = configure(32, 32, 0, 2).unwrap();
        assert!(dims.in_match_margin(2, 2, 2));
        assert!(dims.in_match_margin(29, 29, 2));
        assert!(!dims.in_match_margin(1, 16, 2));
        assert!(!dims.in_match_margin(16, 30, 2));
        assert!(!dims.in_match_margin(30, 16, 2));
    }
}
