//! Target heat release curves and candidate fire locations

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::template::{interpolate, Table};
use crate::error::{SafirError, SafirResult};

/// Heat release curve the schedule should follow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetCurve {
    /// `Q(t) = alpha * t^2`
    TSquared { alpha: f64 },
    /// Arbitrary `(time, RHR)` rows, linearly interpolated
    Tabulated(Table),
}

impl TargetCurve {
    /// Curve value at every whole second from 0 to `t_end`
    pub fn values(&self, t_end: usize) -> Vec<f64> {
        (0..=t_end)
            .map(|t| match self {
                Self::TSquared { alpha } => alpha * (t * t) as f64,
                Self::Tabulated(table) => interpolate(table, t as f64),
            })
            .collect()
    }

    /// Read a tabulated curve: one `time value` pair per line, spaces or commas
    pub fn parse_table(text: &str) -> SafirResult<Self> {
        let rows = numeric_rows(text)?
            .into_iter()
            .map(|(i, row)| match row.as_slice() {
                [t, q] => Ok((*t, *q)),
                _ => Err(SafirError::malformed(i + 1, "curve row needs a time and a value")),
            })
            .collect::<SafirResult<Table>>()?;
        if rows.windows(2).any(|w| w[1].0 < w[0].0) {
            return Err(SafirError::InvalidInput("curve times must be increasing".to_string()));
        }
        if rows.is_empty() {
            return Err(SafirError::InvalidInput("empty fire curve".to_string()));
        }
        Ok(Self::Tabulated(rows))
    }

    pub fn load_table(path: impl AsRef<Path>) -> SafirResult<Self> {
        Self::parse_table(&std::fs::read_to_string(path)?)
    }
}

/// Read candidate fire points, `x y z` per line (spaces or commas)
pub fn parse_points(text: &str) -> SafirResult<Vec<[f64; 3]>> {
    numeric_rows(text)?
        .into_iter()
        .map(|(i, row)| match row.as_slice() {
            [x, y] => Ok([*x, *y, 0.0]),
            [x, y, z] => Ok([*x, *y, *z]),
            _ => Err(SafirError::malformed(i + 1, "point needs two or three coordinates")),
        })
        .collect()
}

pub fn load_points(path: impl AsRef<Path>) -> SafirResult<Vec<[f64; 3]>> {
    parse_points(&std::fs::read_to_string(path)?)
}

/// Order points by distance from `origin`, nearest first; ties keep file order
pub fn sort_by_distance(points: &mut [[f64; 3]], origin: [f64; 3]) {
    let distance = |p: &[f64; 3]| {
        p.iter()
            .zip(origin)
            .map(|(a, b)| (a - b) * (a - b))
            .sum::<f64>()
    };
    points.sort_by(|a, b| distance(a).total_cmp(&distance(b)));
}

/// Non-empty, non-comment lines split on whitespace or commas
fn numeric_rows(text: &str) -> SafirResult<Vec<(usize, Vec<f64>)>> {
    let mut rows = Vec::new();
    for (i, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let row = line
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|t| !t.is_empty())
            .map(|t| {
                t.parse::<f64>()
                    .map_err(|_| SafirError::malformed(i + 1, format!("non-numeric value '{t}'")))
            })
            .collect::<SafirResult<Vec<_>>>()?;
        rows.push((i, row));
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_t_squared_values() {
        let values = TargetCurve::TSquared { alpha: 11.72 }.values(10);
        assert_eq!(values.len(), 11);
        assert_relative_eq!(values[10], 1172.0);
    }

    #[test]
    fn test_tabulated_curve() {
        let curve = TargetCurve::parse_table("# t q\n0, 0\n10, 1000\n").unwrap();
        let values = curve.values(20);
        assert_relative_eq!(values[5], 500.0);
        assert_relative_eq!(values[20], 1000.0);
    }

    #[test]
    fn test_points_sorted_stably() {
        let mut points = parse_points("3 0 0\n1,0,0\n0 1\n-1 0 0\n").unwrap();
        sort_by_distance(&mut points, [0.0, 0.0, 0.0]);
        assert_eq!(points, vec![[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [-1.0, 0.0, 0.0], [3.0, 0.0, 0.0]]);
    }

    #[test]
    fn test_bad_point() {
        assert!(matches!(parse_points("1 2 3 4\n"), Err(SafirError::Malformed { line: 1, .. })));
    }
}
