//! Battery-current to bus-current-delta lookup.

use super::types::Error;

/// Bus-current delta is rounded down to this step after cell scaling.
pub const PLC_DELTA_ISTEP: i32 = 50;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InterpolationPoint {
    pub battery_current_threshold_ma: i32,
    pub current_delta_ma: i32,
}

const fn point(ibat: i32, delta: i32) -> InterpolationPoint {
    InterpolationPoint {
        battery_current_threshold_ma: ibat,
        current_delta_ma: delta,
    }
}

pub const DEFAULT_DELTA_TABLE: [InterpolationPoint; 7] = [
    point(0, 0),
    point(100, 50),
    point(200, 100),
    point(400, 200),
    point(600, 300),
    point(800, 400),
    point(10000, 500),
];

/// Ascending piecewise-linear table, clamped at both ends.
#[derive(Copy, Clone, Debug)]
pub struct DeltaCurrentTable<'a> {
    points: &'a [InterpolationPoint],
}

impl<'a> DeltaCurrentTable<'a> {
    /// Thresholds must be strictly ascending and deltas non-decreasing.
    pub fn new(points: &'a [InterpolationPoint]) -> Result<Self, Error> {
        if points.is_empty() {
            return Err(Error::InvalidTable);
        }
        let ascending = points.windows(2).all(|w| {
            w[0].battery_current_threshold_ma < w[1].battery_current_threshold_ma
                && w[0].current_delta_ma <= w[1].current_delta_ma
        });
        if !ascending {
            return Err(Error::InvalidTable);
        }
        Ok(Self { points })
    }

    /// Delta for an absolute battery current.
    pub fn interpolate(&self, abs_ibat_ma: i32) -> i32 {
        let first = self.points[0];
        let last = self.points[self.points.len() - 1];

        if abs_ibat_ma <= first.battery_current_threshold_ma {
            return first.current_delta_ma;
        }
        if abs_ibat_ma >= last.battery_current_threshold_ma {
            return last.current_delta_ma;
        }

        let mut lo = first;
        let mut hi = last;
        for p in &self.points[1..] {
            if abs_ibat_ma < p.battery_current_threshold_ma {
                hi = *p;
                break;
            }
            lo = *p;
        }

        let (t1, d1) = (lo.battery_current_threshold_ma as i64, lo.current_delta_ma as i64);
        let (t2, d2) = (hi.battery_current_threshold_ma as i64, hi.current_delta_ma as i64);
        let x = abs_ibat_ma as i64;
        (d1 + (x - t1) * (d2 - d1) / (t2 - t1)) as i32
    }

    /// Delta for a signed average battery current on a pack of `cells` in series,
    /// floored to [`PLC_DELTA_ISTEP`].
    pub fn delta_for(&self, avg_ibat_ma: i32, cells: u8) -> i32 {
        let delta = self
            .interpolate(avg_ibat_ma.saturating_abs())
            .saturating_mul(cells as i32);
        (delta / PLC_DELTA_ISTEP) * PLC_DELTA_ISTEP
    }
}

impl Default for DeltaCurrentTable<'static> {
    fn default() -> Self {
        Self { points: &DEFAULT_DELTA_TABLE }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn breakpoints_and_ends() {
        let t = DeltaCurrentTable::default();
        assert_eq!(t.interpolate(0), 0);
        assert_eq!(t.interpolate(100), 50);
        assert_eq!(t.interpolate(200), 100);
        assert_eq!(t.interpolate(800), 400);
        assert_eq!(t.interpolate(10000), 500);
        assert_eq!(t.interpolate(25000), 500);
    }

    #[test]
    fn interpolates_between_breakpoints() {
        let t = DeltaCurrentTable::default();
        assert_eq!(t.interpolate(300), 150);
        assert_eq!(t.interpolate(150), 75);
        // 800 -> 10000 spans 100 mA of delta over 9200 mA
        assert_eq!(t.interpolate(5400), 450);
        assert_eq!(t.interpolate(801), 400);
    }

    #[test]
    fn non_decreasing_over_range() {
        let t = DeltaCurrentTable::default();
        let mut prev = t.interpolate(0);
        for x in (0..=12000).step_by(7) {
            let d = t.interpolate(x);
            assert!(d >= prev, "interpolate({}) = {} < {}", x, d, prev);
            prev = d;
        }
    }

    #[test]
    fn delta_scales_by_cells_and_floors_to_step() {
        let t = DeltaCurrentTable::default();
        // 150 -> 75 -> x2 = 150
        assert_eq!(t.delta_for(150, 2), 150);
        // 130 -> 65 -> x1 = 65 -> 50
        assert_eq!(t.delta_for(130, 1), 50);
        // sign does not matter
        assert_eq!(t.delta_for(-300, 2), 300);
        assert_eq!(t.delta_for(i32::MIN, 2), 1000);
    }

    #[test]
    fn large_deltas_saturate() {
        let steep = [point(0, 0), point(100, i32::MAX)];
        let t = DeltaCurrentTable::new(&steep).unwrap();
        assert_eq!(t.delta_for(1000, 4), (i32::MAX / PLC_DELTA_ISTEP) * PLC_DELTA_ISTEP);
    }

    #[test]
    fn rejects_bad_tables() {
        assert_eq!(DeltaCurrentTable::new(&[]).err(), Some(Error::InvalidTable));
        let unsorted = [point(0, 0), point(200, 100), point(100, 150)];
        assert!(DeltaCurrentTable::new(&unsorted).is_err());
        let single = [point(50, 250)];
        let t = DeltaCurrentTable::new(&single).unwrap();
        assert_eq!(t.interpolate(0), 250);
        assert_eq!(t.interpolate(9999), 250);
    }
}
