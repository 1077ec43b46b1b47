//! Screen geometry and resolution-independent coordinate conversion.
//!
//! All pointer targets travel through the system as ratios in `[0,1]×[0,1]`
//! relative to the logical screen (top-left origin). Conversion to native
//! event coordinates happens at the last possible moment, against geometry
//! queried fresh for that operation, so a display configuration change
//! between steps never leaves a stale mapping behind.

use tracing::debug;

/// Logical screen dimensions plus the physical pixel scale (e.g. 2.0 on
/// Retina). Queried per operation, never cached by callers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenGeometry {
    pub logical_width: u32,
    pub logical_height: u32,
    pub pixel_scale: f64,
}

/// Integer point-space correction applied after ratio→point conversion.
///
/// Loaded once at startup from the `X_OFFSET` / `Y_OFFSET` keys; only the
/// interactive calibration procedure writes new values (through an explicit
/// env-file persist).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CalibrationOffset {
    pub dx: i32,
    pub dy: i32,
}

impl CalibrationOffset {
    /// Read persisted offsets from the process environment. Absent or
    /// malformed values fall back to zero.
    pub fn from_env() -> Self {
        let read = |key: &str| {
            std::env::var(key)
                .ok()
                .and_then(|v| v.trim().parse::<i32>().ok())
                .unwrap_or(0)
        };
        Self {
            dx: read("X_OFFSET"),
            dy: read("Y_OFFSET"),
        }
    }
}

impl ScreenGeometry {
    /// Convert a ratio pair to a logical point, clamping each axis into
    /// `[0,1]` first. Out-of-range input is corrected, not rejected.
    pub fn to_point(&self, ratio_x: f64, ratio_y: f64) -> (i32, i32) {
        let rx = ratio_x.clamp(0.0, 1.0);
        let ry = ratio_y.clamp(0.0, 1.0);

        let x = (rx * self.logical_width.saturating_sub(1) as f64) as i32;
        let y = (ry * self.logical_height.saturating_sub(1) as f64) as i32;

        debug!(
            "ratio ({:.3}, {:.3}) -> point ({}, {}) [{}x{} @ {:.1}x]",
            rx, ry, x, y, self.logical_width, self.logical_height, self.pixel_scale
        );
        (x, y)
    }

    /// Ratio→point conversion with the calibration offset applied,
    /// producing the final native event coordinate.
    pub fn to_point_calibrated(
        &self,
        ratio_x: f64,
        ratio_y: f64,
        offset: CalibrationOffset,
    ) -> (i32, i32) {
        let (x, y) = self.to_point(ratio_x, ratio_y);
        (x + offset.dx, y + offset.dy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_hd() -> ScreenGeometry {
        ScreenGeometry {
            logical_width: 1920,
            logical_height: 1080,
            pixel_scale: 1.0,
        }
    }

    #[test]
    fn out_of_range_ratios_clamp_to_boundaries() {
        let geo = full_hd();
        assert_eq!(geo.to_point(-0.2, 1.4), (0, 1079));
        assert_eq!(geo.to_point(1.4, -0.2), (1919, 0));
    }

    #[test]
    fn center_maps_to_midpoint() {
        let geo = full_hd();
        assert_eq!(geo.to_point(0.5, 0.5), (959, 539));
    }

    #[test]
    fn corners_map_to_extremes() {
        let geo = full_hd();
        assert_eq!(geo.to_point(0.0, 0.0), (0, 0));
        assert_eq!(geo.to_point(1.0, 1.0), (1919, 1079));
    }

    #[test]
    fn calibration_offset_round_trip() {
        let geo = full_hd();
        let offset = CalibrationOffset::default();
        assert_eq!(geo.to_point_calibrated(0.5, 0.5, offset), (959, 539));

        let offset = CalibrationOffset { dx: 7, dy: -3 };
        assert_eq!(geo.to_point_calibrated(0.5, 0.5, offset), (966, 536));
    }

    #[test]
    fn degenerate_display_stays_in_bounds() {
        let geo = ScreenGeometry {
            logical_width: 1,
            logical_height: 1,
            pixel_scale: 1.0,
        };
        assert_eq!(geo.to_point(1.0, 1.0), (0, 0));
    }
}
