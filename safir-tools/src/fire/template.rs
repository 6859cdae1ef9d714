//! Single-fire template read from a LOCAFI fire file

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{SafirError, SafirResult};

/// Table of `(time, value)` rows
pub type Table = Vec<(f64, f64)>;

/// The fire every ignition point copies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FireTemplate {
    /// Last time of the diameter table, in whole seconds
    pub end_time: usize,
    pub z_ceiling: f64,
    pub diameter: Table,
    pub rhr: Table,
    /// Fire origin (`FIRE_POS`)
    pub origin: [f64; 3],
    /// Peak rate of heat release [W]
    pub q_max: f64,
}

#[derive(Clone, Copy, PartialEq)]
enum Reading {
    Nothing,
    Diameter,
    Rhr,
}

impl FireTemplate {
    /// Parse a LOCAFI fire file
    pub fn parse(text: &str) -> SafirResult<Self> {
        let mut origin = None;
        let mut z_ceiling = 0.0;
        let mut diameter = Table::new();
        let mut rhr = Table::new();
        let mut reading = Reading::Nothing;

        for (i, line) in text.lines().enumerate() {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            let Some(&first) = tokens.first() else {
                continue;
            };
            match first {
                "FIRE_POS" => {
                    let coords = parse_floats(&tokens[1..], i)?;
                    let point: [f64; 3] = coords
                        .try_into()
                        .map_err(|_| SafirError::malformed(i + 1, "FIRE_POS needs three coordinates"))?;
                    origin = Some(point);
                }
                "Z_CEILING" => {
                    z_ceiling = parse_floats(&tokens[tokens.len() - 1..], i)?[0];
                }
                "DIAMETER" => reading = Reading::Diameter,
                "RHR" => reading = Reading::Rhr,
                "END_DIAM" | "END_RHR" => reading = Reading::Nothing,
                _ if reading != Reading::Nothing => {
                    let row = parse_floats(&tokens, i)?;
                    if row.len() < 2 {
                        return Err(SafirError::malformed(i + 1, "table row needs a time and a value"));
                    }
                    let table = if reading == Reading::Diameter { &mut diameter } else { &mut rhr };
                    table.push((row[0], row[1]));
                }
                _ => {}
            }
        }

        let origin = origin.ok_or_else(|| SafirError::InvalidInput("fire template has no FIRE_POS".to_string()))?;
        let end_time = diameter
            .last()
            .map(|(t, _)| *t as usize)
            .ok_or_else(|| SafirError::InvalidInput("fire template has no DIAMETER table".to_string()))?;
        let q_max = rhr.iter().map(|(_, q)| *q).fold(f64::NEG_INFINITY, f64::max);
        if rhr.is_empty() || q_max <= 0.0 {
            return Err(SafirError::InvalidInput("fire template has no positive RHR".to_string()));
        }

        log::info!("Fire template imported: t_end = {end_time} s, q_max = {q_max} W");
        Ok(Self {
            end_time,
            z_ceiling,
            diameter,
            rhr,
            origin,
            q_max,
        })
    }

    pub fn load(path: impl AsRef<Path>) -> SafirResult<Self> {
        Self::parse(&std::fs::read_to_string(path)?)
    }

    /// Single-fire RHR at every whole second from 0 to the last RHR time
    pub fn kernel(&self) -> Vec<f64> {
        let last = self.rhr.last().map(|(t, _)| *t as usize).unwrap_or(0);
        (0..=last).map(|t| interpolate(&self.rhr, t as f64)).collect()
    }
}

fn parse_floats(tokens: &[&str], i: usize) -> SafirResult<Vec<f64>> {
    tokens
        .iter()
        .map(|t| {
            t.parse::<f64>()
                .map_err(|_| SafirError::malformed(i + 1, format!("non-numeric value '{t}'")))
        })
        .collect()
}

/// Linear interpolation in a table sorted by time, clamped at both ends
pub fn interpolate(table: &[(f64, f64)], t: f64) -> f64 {
    let (Some(first), Some(last)) = (table.first(), table.last()) else {
        return 0.0;
    };
    if t <= first.0 {
        return first.1;
    }
    if t >= last.0 {
        return last.1;
    }
    for pair in table.windows(2) {
        let ((t0, v0), (t1, v1)) = (pair[0], pair[1]);
        if t <= t1 {
            if t1 - t0 <= 0.0 {
                return v1;
            }
            return v0 + (t - t0) / (t1 - t0) * (v1 - v0);
        }
    }
    last.1
}
