//! Parameter grid construction for the sweep.
//!
//! A [`ParameterPoint`] identifies one simulator invocation; its label doubles
//! as the raw-output file name and as the column key in the aggregated table.

use anyhow::{Context, Result, bail};
use serde::Serialize;
use std::cmp::Ordering;

/// One (R0, R1, shift) combination driving a single simulator run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ParameterPoint {
    pub r0: f64,
    pub r1: f64,
    pub shift: i64,
}

impl ParameterPoint {
    /// Filesystem-safe label, used as the raw-output file name.
    pub fn label(&self) -> String {
        format!("R0={}_R1={}_shift={}", self.r0, self.r1, self.shift)
    }

    /// Column key in the aggregated-curves table: `<r0>_<r1>_<shift>`.
    pub fn column_key(&self) -> String {
        format!("{}_{}_{}", self.r0, self.r1, self.shift)
    }

    /// Strict inverse of [`label`](Self::label).
    ///
    /// A raw-output file whose name does not match the label format exactly is
    /// rejected rather than guessed at, since a misparsed parameter value
    /// would corrupt the loss distribution.
    pub fn parse_label(name: &str) -> Result<Self> {
        let parts: Vec<&str> = name.split('_').collect();
        if parts.len() != 3 {
            bail!("malformed output file name: {name:?}");
        }
        let r0 = parts[0]
            .strip_prefix("R0=")
            .with_context(|| format!("missing R0 field in {name:?}"))?
            .parse::<f64>()
            .with_context(|| format!("bad R0 value in {name:?}"))?;
        let r1 = parts[1]
            .strip_prefix("R1=")
            .with_context(|| format!("missing R1 field in {name:?}"))?
            .parse::<f64>()
            .with_context(|| format!("bad R1 value in {name:?}"))?;
        let shift = parts[2]
            .strip_prefix("shift=")
            .with_context(|| format!("missing shift field in {name:?}"))?
            .parse::<i64>()
            .with_context(|| format!("bad shift value in {name:?}"))?;
        Ok(ParameterPoint { r0, r1, shift })
    }

    /// Total order by (r0, r1, shift), used to sort output table columns.
    pub fn cmp_params(&self, other: &Self) -> Ordering {
        self.r0
            .total_cmp(&other.r0)
            .then(self.r1.total_cmp(&other.r1))
            .then(self.shift.cmp(&other.shift))
    }
}

/// `num` evenly spaced samples over `[center - std, center + std]`.
///
/// `num == 1` yields the lower bound, which is the center itself whenever
/// `std` is zero (the degenerate single-value range).
pub fn linspace(center: f64, std: f64, num: usize) -> Vec<f64> {
    let a = center - std;
    let b = center + std;
    if num <= 1 {
        return vec![a];
    }
    (0..num)
        .map(|i| a + (b - a) * i as f64 / (num - 1) as f64)
        .collect()
}

/// Full Cartesian product of the R0, R1 and shift distributions, in input
/// iteration order (R0 outermost) so repeated sweeps enumerate identically.
pub fn cartesian(r0s: &[f64], r1s: &[f64], shifts: &[i64]) -> Vec<ParameterPoint> {
    let mut points = Vec::with_capacity(r0s.len() * r1s.len() * shifts.len());
    for &r0 in r0s {
        for &r1 in r1s {
            for &shift in shifts {
                points.push(ParameterPoint { r0, r1, shift });
            }
        }
    }
    points
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linspace_degenerate() {
        assert_eq!(linspace(2.5, 0.0, 1), vec![2.5]);
        assert_eq!(linspace(2.5, 0.0, 3), vec![2.5, 2.5, 2.5]);
    }

    #[test]
    fn test_linspace_spread() {
        let v = linspace(2.0, 1.0, 3);
        assert_eq!(v, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_cartesian_order_and_count() {
        let points = cartesian(&[1.0, 2.0], &[0.5], &[100, 110]);
        assert_eq!(points.len(), 4);
        assert_eq!(points[0].label(), "R0=1_R1=0.5_shift=100");
        assert_eq!(points[1].label(), "R0=1_R1=0.5_shift=110");
        assert_eq!(points[2].label(), "R0=2_R1=0.5_shift=100");
    }

    #[test]
    fn test_zero_width_grid_shares_r_values() {
        let points = cartesian(
            &linspace(2.2, 0.0, 1),
            &linspace(1.6, 0.0, 1),
            &[100, 110, 120],
        );
        assert_eq!(points.len(), 3);
        assert!(points.iter().all(|p| p.r0 == 2.2 && p.r1 == 1.6));
    }

    #[test]
    fn test_label_roundtrip() {
        let p = ParameterPoint {
            r0: 2.7617185266303697,
            r1: 1.05,
            shift: 120,
        };
        let parsed = ParameterPoint::parse_label(&p.label()).unwrap();
        assert_eq!(parsed, p);
    }

    #[test]
    fn test_parse_label_rejects_garbage() {
        assert!(ParameterPoint::parse_label("notes.txt").is_err());
        assert!(ParameterPoint::parse_label("R0=2.5_R1=1.6").is_err());
        assert!(ParameterPoint::parse_label("R0=x_R1=1.6_shift=100").is_err());
        assert!(ParameterPoint::parse_label("R0=2.5_R1=1.6_shift=1.5").is_err());
        assert!(ParameterPoint::parse_label("r0=2.5_R1=1.6_shift=100").is_err());
    }

    #[test]
    fn test_cmp_params_ordering() {
        let a = ParameterPoint { r0: 1.0, r1: 2.0, shift: 100 };
        let b = ParameterPoint { r0: 1.0, r1: 2.0, shift: 110 };
        let c = ParameterPoint { r0: 1.5, r1: 0.0, shift: 0 };
        assert_eq!(a.cmp_params(&b), Ordering::Less);
        assert_eq!(b.cmp_params(&c), Ordering::Less);
        assert_eq!(a.cmp_params(&a), Ordering::Equal);
    }
}
