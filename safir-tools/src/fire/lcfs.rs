//! LOCAFI multi-fire (LCF) file writer

use std::fmt::{self, Write as _};
use std::path::Path;

use super::scheduler::FireScheduler;
use super::template::{interpolate, Table};
use crate::error::{SafirError, SafirResult};

/// Shift a template table to start at `ignition` and cut it at `t_end`.
/// Times stay global; a leading `(0, 0)` row covers the time before ignition.
pub fn shift_table(table: &[(f64, f64)], ignition: f64, t_end: f64) -> Table {
    let mut shifted = Table::new();
    if let Some(&(first, _)) = table.first() {
        if first + ignition > 0.0 {
            shifted.push((0.0, 0.0));
        }
    }
    for &(t, value) in table {
        let time = t + ignition;
        if time <= t_end {
            shifted.push((time, value));
            continue;
        }
        // Row past the end: close the table at t_end
        let closing = match shifted.last() {
            Some(&(last, _)) if last >= t_end => None,
            Some(&(last, previous)) => {
                let dt = time - last;
                if dt <= 0.0 {
                    Some(0.0)
                } else {
                    Some(interpolate(&[(last, previous), (time, value)], t_end))
                }
            }
            None => Some(value),
        };
        if let Some(value) = closing {
            shifted.push((t_end, value));
        }
        break;
    }
    shifted
}

fn write_table(out: &mut String, name: &str, end: &str, table: &[(f64, f64)]) -> fmt::Result {
    writeln!(out, "{name}\n")?;
    for (t, value) in table {
        writeln!(out, "\t{t} {value}")?;
    }
    writeln!(out, "{end}\n")
}

/// One fire block: position, ceiling, plume and its shifted tables
fn write_fire(
    out: &mut String,
    point: [f64; 3],
    z_ceiling: f64,
    diameter: &[(f64, f64)],
    rhr: &[(f64, f64)],
) -> fmt::Result {
    let [x, y, z] = point;
    writeln!(out, "FIRE_POS  {x} {y} {z}")?;
    writeln!(out, "Z_CEILING  {z_ceiling}")?;
    writeln!(out, "PLUME_TYPE CONIC")?;
    write_table(out, "DIAMETER", "END_DIAM", diameter)?;
    write_table(out, "RHR", "END_RHR", rhr)
}

impl FireScheduler {
    /// Render the current schedule as an LCF file: one fire per ignition,
    /// placed at the next unused candidate point
    pub fn make_lcfs(&self) -> SafirResult<String> {
        let n_of_fires = self.n_of_fires();
        let total = n_of_fires.last().copied().unwrap_or(0);
        if total > self.points().len() {
            return Err(SafirError::NotEnoughFirePoints {
                required: total,
                available: self.points().len(),
            });
        }

        let template = self.template();
        let t_end = self.t_end() as f64;
        let mut out = String::new();
        writeln!(out, "NFIRE {total}\n")?;

        let mut points = self.points().iter();
        let mut burning = 0;
        for (t, &count) in n_of_fires.iter().enumerate() {
            for _ in burning..count {
                let Some(&point) = points.next() else {
                    return Err(SafirError::NotEnoughFirePoints {
                        required: total,
                        available: self.points().len(),
                    });
                };
                let ignition = t as f64;
                write_fire(
                    &mut out,
                    point,
                    template.z_ceiling,
                    &shift_table(&template.diameter, ignition, t_end),
                    &shift_table(&template.rhr, ignition, t_end),
                )?;
            }
            burning = burning.max(count);
        }

        log::info!("LCF file written for {total} fires");
        Ok(out)
    }

    /// Write the LCF file to `path`
    pub fn save_lcfs(&self, path: impl AsRef<Path>) -> SafirResult<()> {
        let text = self.make_lcfs()?;
        crate::io::write_atomic(path.as_ref(), &text)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fire::{FireTemplate, TargetCurve};
    use approx::assert_relative_eq;

    const TEMPLATE: &str = "\
FIRE_POS 0.0 0.0 0.0
Z_CEILING 3.5
DIAMETER
0.0 1.0
10.0 2.0
END_DIAM
RHR
0.0 0.0
4.0 100.0
10.0 100.0
END_RHR
";

    fn scheduler(points: Vec<[f64; 3]>) -> FireScheduler {
        let template = FireTemplate::parse(TEMPLATE).unwrap();
        FireScheduler::new(template, points, &TargetCurve::TSquared { alpha: 1.0 }, 1).unwrap()
    }

    #[test]
    fn test_shift_table_truncates() {
        let table = vec![(0.0, 0.0), (4.0, 100.0), (10.0, 100.0)];
        let shifted = shift_table(&table, 5.0, 10.0);
        assert_eq!(shifted.len(), 4);
        assert_eq!(shifted[0], (0.0, 0.0));
        assert_eq!(shifted[1], (5.0, 0.0));
        assert_eq!(shifted[2], (9.0, 100.0));
        assert_relative_eq!(shifted[3].0, 10.0);
        assert_relative_eq!(shifted[3].1, 100.0);
    }

    #[test]
    fn test_shift_table_interpolates_end() {
        let table = vec![(0.0, 0.0), (10.0, 100.0)];
        let shifted = shift_table(&table, 0.0, 5.0);
        assert_eq!(shifted, vec![(0.0, 0.0), (5.0, 50.0)]);
    }

    #[test]
    fn test_write_fire_block() {
        let mut out = String::new();
        write_fire(&mut out, [1.0, 2.5, 0.0], 4.0, &[(0.0, 0.5)], &[(0.0, 0.0), (60.0, 1e6)]).unwrap();
        assert_eq!(
            out,
            "FIRE_POS  1 2.5 0\nZ_CEILING  4\nPLUME_TYPE CONIC\nDIAMETER\n\n\t0 0.5\nEND_DIAM\n\n\
             RHR\n\n\t0 0\n\t60 1000000\nEND_RHR\n\n"
        );
    }

    #[test]
    fn test_make_lcfs() {
        let mut s = scheduler(vec![[2.0, 0.0, 3.5], [1.0, 0.0, 3.5]]);
        s.set_schedule(vec![0, 1, 1, 1, 1, 2, 2, 2, 2, 2]).unwrap();
        let text = s.make_lcfs().unwrap();

        assert!(text.starts_with("NFIRE 2\n\n"));
        assert_eq!(text.matches("FIRE_POS").count(), 2);
        let first = text.find("FIRE_POS  1 0 3.5").unwrap();
        let second = text.find("FIRE_POS  2 0 3.5").unwrap();
        assert!(first < second);
        assert!(text.contains("Z_CEILING  3.5\nPLUME_TYPE CONIC\nDIAMETER\n\n\t0 0\n\t1 1\n"));
        assert!(text.contains("RHR\n\n\t0 0\n\t5 0\n\t9 100\n\t10 100\nEND_RHR\n\n"));
    }

    #[test]
    fn test_make_lcfs_needs_points() {
        let mut s = scheduler(vec![[1.0, 0.0, 0.0], [2.0, 0.0, 0.0]]);
        s.set_schedule(vec![0; 10]).unwrap();
        assert_eq!(s.make_lcfs().unwrap(), "NFIRE 0\n\n");
        assert!(s.set_schedule(vec![0, 1, 1, 2, 2, 3, 3, 3, 3, 3]).is_err());
    }
}
